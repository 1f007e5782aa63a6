// XMPSWEEP SATURATION SEARCH DRIVER
// SWEEPING -> DONE      FIRST ROW WITH AVG LATENCY ABOVE THRESHOLD
// SWEEPING -> EXTENDING BASE SEQUENCE EXHAUSTED WITHOUT A CROSSING
// EXTENDING -> DONE     PASS COMPLETE AND (CROSSED OR NO PASSES LEFT)
//
// AN EXTENSION PASS RE-RUNS THE WHOLE BASE SEQUENCE SHIFTED UP AND ALWAYS
// RUNS TO COMPLETION. SATURATION STATE IS STILL UPDATED FOR EVERY ROW SO
// THE NEXT PASS (IF ANY) KNOWS WHETHER TO START.
//
// STRICTLY SEQUENTIAL: ONE CHILD IN FLIGHT, NO RETRIES, NO SHARED STATE.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::capacity::{ServiceModel, DEFAULT_THRESHOLD_MULTIPLIER};
use crate::config::ExperimentConfig;
use crate::error::{exit_label, SweepError};
use crate::load::{self, LoadPoint};
use crate::report::{ReportContext, StatsRow};
use crate::runner::Runner;
use crate::sink::{PhaseTag, ResultSink, SweepRow};

// REFERENCE EXTENSION SHIFT, IN LAMBDA UNITS
pub const DEFAULT_EXTENSION_OFFSET: f64 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepPolicy {
    // FALSE: PROBE EVERY BASE FRACTION EVEN AFTER A CROSSING
    pub stop_on_crossing: bool,
    pub max_extension_passes: u32,
    pub extension_offset: f64,
    pub threshold_multiplier: f64,
}

impl Default for SweepPolicy {
    fn default() -> Self {
        Self {
            stop_on_crossing: true,
            max_extension_passes: 1,
            extension_offset: DEFAULT_EXTENSION_OFFSET,
            threshold_multiplier: DEFAULT_THRESHOLD_MULTIPLIER,
        }
    }
}

impl SweepPolicy {
    // FIXED-LEVEL SWEEP: EVERY FRACTION ONCE, NO EARLY STOP, NO EXTENSION
    pub fn exhaustive() -> Self {
        Self {
            stop_on_crossing: false,
            max_extension_passes: 0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), SweepError> {
        if !(self.extension_offset >= 0.0) || !self.extension_offset.is_finite() {
            return Err(SweepError::invalid(format!(
                "extension offset must be non-negative, got {}",
                self.extension_offset
            )));
        }
        if !(self.threshold_multiplier > 0.0) || !self.threshold_multiplier.is_finite() {
            return Err(SweepError::invalid(format!(
                "threshold multiplier must be positive, got {}",
                self.threshold_multiplier
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Sweeping,
    Extending { pass: u32 },
    Done,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SaturationState {
    threshold: f64,
    last_avg_latency: Option<f64>,
    crossed: bool,
    crossing: Option<LoadPoint>,
}

impl SaturationState {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            last_avg_latency: None,
            crossed: false,
            crossing: None,
        }
    }

    pub fn from_model(model: &ServiceModel, multiplier: f64) -> Self {
        Self::new(model.saturation_threshold(multiplier))
    }

    // RETURNS TRUE ONLY ON THE FIRST CROSSING
    pub fn observe(&mut self, point: LoadPoint, avg_latency: f64) -> bool {
        self.last_avg_latency = Some(avg_latency);
        if avg_latency > self.threshold && !self.crossed {
            self.crossed = true;
            self.crossing = Some(point);
            return true;
        }
        false
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn last_avg_latency(&self) -> Option<f64> {
        self.last_avg_latency
    }

    pub fn crossed(&self) -> bool {
        self.crossed
    }

    pub fn crossing(&self) -> Option<LoadPoint> {
        self.crossing
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SweepOutcome {
    pub crossed: bool,
    pub crossing: Option<LoadPoint>,
    pub invocations: usize,
    pub extension_passes: u32,
}

pub struct SweepDriver<'a, R: Runner> {
    config: &'a ExperimentConfig,
    runner: R,
    model: ServiceModel,
    base: Vec<LoadPoint>,
    state: SaturationState,
    phase: Phase,
    sink: ResultSink,
    invocations: usize,
    extension_passes: u32,
    last_lambda: Option<f64>,
}

impl<'a, R: Runner> SweepDriver<'a, R> {
    pub fn new(config: &'a ExperimentConfig, runner: R) -> Result<Self, SweepError> {
        Self::with_sink(config, runner, ResultSink::new())
    }

    pub fn with_sink(config: &'a ExperimentConfig, runner: R, sink: ResultSink) -> Result<Self, SweepError> {
        config.validate()?;
        let model = config.service_model()?;
        let base = load::generate(&model, &config.fractions);
        let lambdas: Vec<f64> = base.iter().map(|p| p.lambda).collect();
        if lambdas.iter().any(|l| !l.is_finite()) || !load::is_strictly_increasing(&lambdas) {
            return Err(SweepError::invalid(
                "load points must be finite and strictly increasing",
            ));
        }
        let state = SaturationState::from_model(&model, config.sweep.threshold_multiplier);
        Ok(Self {
            config,
            runner,
            model,
            base,
            state,
            phase: Phase::Sweeping,
            sink,
            invocations: 0,
            extension_passes: 0,
            last_lambda: None,
        })
    }

    pub fn model(&self) -> &ServiceModel {
        &self.model
    }

    pub fn plan(&self) -> &[LoadPoint] {
        &self.base
    }

    pub fn state(&self) -> &SaturationState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn sink(&self) -> &ResultSink {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut ResultSink {
        &mut self.sink
    }

    pub fn into_sink(self) -> ResultSink {
        self.sink
    }

    // PER-PASS SHIFT. AT LEAST THE TOP BASE LAMBDA, SO EVERY EXTENSION POINT
    // LANDS STRICTLY ABOVE EVERYTHING PROBED BEFORE IT.
    pub fn extension_shift(&self) -> f64 {
        let top = self.base.last().map(|p| p.lambda).unwrap_or(0.0);
        self.config.sweep.extension_offset.max(top)
    }

    pub fn extension_points(&self, pass: u32) -> Vec<LoadPoint> {
        load::shift(&self.base, self.extension_shift() * pass as f64)
    }

    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<SweepOutcome, SweepError> {
        let policy = self.config.sweep;
        tracing::info!(
            threshold = self.state.threshold(),
            points = self.base.len(),
            capacity_rps = self.model.total_capacity(),
            "starting sweep"
        );

        loop {
            match self.phase {
                Phase::Sweeping => {
                    let points = self.base.clone();
                    for point in points {
                        self.probe(point, PhaseTag::Sweep, shutdown)?;
                        if self.state.crossed() && policy.stop_on_crossing {
                            break;
                        }
                    }
                    self.phase = if self.state.crossed() || policy.max_extension_passes == 0 {
                        Phase::Done
                    } else {
                        tracing::info!(
                            last_avg = ?self.state.last_avg_latency(),
                            threshold = self.state.threshold(),
                            "no saturation within the planned range, extending"
                        );
                        Phase::Extending { pass: 1 }
                    };
                }
                Phase::Extending { pass } => {
                    for point in self.extension_points(pass) {
                        self.probe(point, PhaseTag::Extension(pass), shutdown)?;
                    }
                    self.extension_passes = pass;
                    self.phase = if self.state.crossed() || pass >= policy.max_extension_passes {
                        Phase::Done
                    } else {
                        Phase::Extending { pass: pass + 1 }
                    };
                }
                Phase::Done => break,
            }
        }

        Ok(SweepOutcome {
            crossed: self.state.crossed(),
            crossing: self.state.crossing(),
            invocations: self.invocations,
            extension_passes: self.extension_passes,
        })
    }

    fn probe(&mut self, point: LoadPoint, phase: PhaseTag, shutdown: &AtomicBool) -> Result<(), SweepError> {
        let lambda = point.lambda;
        if shutdown.load(Ordering::Relaxed) {
            return Err(SweepError::Cancelled { lambda });
        }
        // EXTENSION SHIFTS CAN COLLAPSE NEARBY POINTS IN FLOATING POINT
        if let Some(prev) = self.last_lambda {
            if !(lambda > prev) {
                return Err(SweepError::invalid(format!(
                    "load point lambda={} does not exceed previous lambda={}",
                    lambda, prev
                )));
            }
        }

        tracing::info!(phase = %phase.label(), fraction = point.fraction, lambda, "running simulator");
        let params = self.config.sim_params(lambda);
        let inv = self.runner.invoke(&params, shutdown)?;
        self.invocations += 1;
        self.last_lambda = Some(lambda);
        self.sink.record_output(&inv)?;

        if !inv.success() {
            if self.config.strict_exit {
                return Err(SweepError::NonZeroExit { lambda, code: inv.exit_code });
            }
            tracing::warn!(
                lambda,
                status = %exit_label(&inv.exit_code),
                stderr = %inv.stderr_tail(),
                "simulator exited abnormally, parsing captured output anyway"
            );
        }

        let row = StatsRow::parse(&inv.stdout).map_err(|_| SweepError::NoDataFound {
            lambda,
            output: inv.stdout.clone(),
        })?;
        let context = ReportContext::parse(&inv.stdout);

        if self.state.observe(point, row.avg_latency) {
            tracing::info!(
                lambda,
                avg_latency = row.avg_latency,
                threshold = self.state.threshold(),
                "saturation point reached"
            );
        }
        tracing::debug!(lambda, avg = row.avg_latency, p99 = row.p99, count = row.count, "parsed stats row");

        self.sink.push(SweepRow {
            phase,
            point,
            exit_code: inv.exit_code,
            row,
            context,
        });
        Ok(())
    }
}
