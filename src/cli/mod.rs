// XMPSWEEP SUBCOMMANDS
// SHARED EXPERIMENT FLAGS LIVE HERE. EACH SUBCOMMAND TURNS THEM INTO AN
// ExperimentConfig, EITHER FROM FLAGS OR FROM A JSON FILE.

pub mod check;
pub mod csv;
pub mod plan;
pub mod run;

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;

use xmpsweep::capacity::{PhaseRatios, TopologyParams, DEFAULT_THRESHOLD_MULTIPLIER, MICROS_PER_SEC};
use xmpsweep::config::{ExperimentConfig, DEFAULT_DURATION, DEFAULT_MU, DEFAULT_SIMULATOR};
use xmpsweep::load;
use xmpsweep::sweep::{SweepPolicy, DEFAULT_EXTENSION_OFFSET};
use xmpsweep::OffloadFlags;

#[derive(Args, Debug)]
pub struct ExperimentArgs {
    // JSON EXPERIMENT FILE. WHEN GIVEN, THE FLAGS BELOW ARE IGNORED
    #[arg(long)]
    pub config: Option<PathBuf>,

    // SIMULATOR BINARY
    #[arg(long, default_value = DEFAULT_SIMULATOR)]
    pub simulator: PathBuf,

    #[arg(long, default_value_t = 4)]
    pub topo: u32,

    // MEAN SERVICE RATE PER MICROSECOND (0.02 = 50US)
    #[arg(long, default_value_t = DEFAULT_MU)]
    pub mu: f64,

    #[arg(long, default_value_t = 0)]
    pub gen_type: u32,

    #[arg(long, default_value_t = 0.25)]
    pub phase_one_ratio: f64,

    // OFFLOADED PHASE
    #[arg(long, default_value_t = 0.5)]
    pub phase_two_ratio: f64,

    #[arg(long, default_value_t = 0.25)]
    pub phase_three_ratio: f64,

    // ACCELERATOR SPEEDUP ON PHASE TWO
    #[arg(long, default_value_t = 1.0)]
    pub speedup: f64,

    #[arg(long, default_value_t = 16)]
    pub num_cores: u32,

    #[arg(long, default_value_t = 8)]
    pub num_accelerators: u32,

    #[arg(long = "buffersize", default_value_t = 32)]
    pub buffer_size: u32,

    // SIMULATED TIME UNITS PER RUN
    #[arg(long, default_value_t = DEFAULT_DURATION)]
    pub duration: u64,

    // COMMA-SEPARATED LOAD FRACTIONS (DEFAULT 0.1,0.2,...,1.0)
    #[arg(long, value_delimiter = ',')]
    pub fractions: Vec<f64>,

    // THREE-PHASE OFFLOAD FLAGS: ALL THREE OR NONE
    #[arg(long)]
    pub gpcore_offload_style: Option<String>,

    #[arg(long)]
    pub axcore_notify_recipient: Option<String>,

    #[arg(long)]
    pub gpcore_input_queue_selector: Option<String>,

    // PROBE EVERY FRACTION ONCE: NO EARLY STOP, NO EXTENSION
    #[arg(long)]
    pub exhaustive: bool,

    #[arg(long, default_value_t = 1)]
    pub max_extension_passes: u32,

    // MINIMUM LAMBDA SHIFT PER EXTENSION PASS
    #[arg(long, default_value_t = DEFAULT_EXTENSION_OFFSET)]
    pub extension_offset: f64,

    // SATURATION THRESHOLD = MULTIPLIER * UNLOADED SERVICE TIME
    #[arg(long, default_value_t = DEFAULT_THRESHOLD_MULTIPLIER)]
    pub threshold_multiplier: f64,

    // WALL-CLOCK LIMIT PER SIMULATOR RUN (SECONDS)
    #[arg(long)]
    pub timeout_secs: Option<f64>,

    // ABORT ON A NON-ZERO SIMULATOR EXIT
    #[arg(long)]
    pub strict_exit: bool,

    #[arg(long, default_value_t = MICROS_PER_SEC)]
    pub time_units_per_sec: f64,

    // PASSED THROUGH VERBATIM AFTER THE GENERATED FLAGS
    #[arg(last = true)]
    pub extra_args: Vec<String>,
}

impl ExperimentArgs {
    pub fn into_config(self) -> Result<ExperimentConfig> {
        if let Some(path) = &self.config {
            let config = ExperimentConfig::load(path)?;
            tracing::debug!(path = %path.display(), "loaded experiment config");
            return Ok(config);
        }

        let offload = match (
            self.gpcore_offload_style,
            self.axcore_notify_recipient,
            self.gpcore_input_queue_selector,
        ) {
            (None, None, None) => None,
            (Some(style), Some(recipient), Some(selector)) => Some(OffloadFlags {
                gpcore_offload_style: style,
                axcore_notify_recipient: recipient,
                gpcore_input_queue_selector: selector,
            }),
            _ => bail!(
                "--gpcore-offload-style, --axcore-notify-recipient and \
                 --gpcore-input-queue-selector must be given together"
            ),
        };

        let mut sweep = if self.exhaustive {
            SweepPolicy::exhaustive()
        } else {
            SweepPolicy {
                max_extension_passes: self.max_extension_passes,
                ..SweepPolicy::default()
            }
        };
        sweep.extension_offset = self.extension_offset;
        sweep.threshold_multiplier = self.threshold_multiplier;

        Ok(ExperimentConfig {
            simulator: self.simulator,
            topology: TopologyParams {
                topo: self.topo,
                num_cores: self.num_cores,
                num_accelerators: self.num_accelerators,
                buffer_size: self.buffer_size,
                speedup: self.speedup,
                gen_type: self.gen_type,
                phase_ratios: PhaseRatios {
                    one: self.phase_one_ratio,
                    two: self.phase_two_ratio,
                    three: self.phase_three_ratio,
                },
            },
            mu: self.mu,
            duration: self.duration,
            fractions: if self.fractions.is_empty() {
                load::default_fractions()
            } else {
                self.fractions
            },
            offload,
            extra_args: self.extra_args,
            sweep,
            timeout_secs: self.timeout_secs,
            strict_exit: self.strict_exit,
            time_units_per_sec: self.time_units_per_sec,
        })
    }
}

// SHARED BANNER: THE MODEL EVERY SUBCOMMAND REASONS ABOUT
pub fn print_model(config: &ExperimentConfig) -> Result<()> {
    let model = config.service_model()?;
    let t = &config.topology;
    let r = t.phase_ratios;
    println!("SIMULATOR:       {}", config.simulator.display());
    println!(
        "TOPOLOGY:        {} ({} cores, {} accelerators, buffer {})",
        t.topo, t.num_cores, t.num_accelerators, t.buffer_size
    );
    println!(
        "PHASES:          {}/{}/{} (speedup {}x)",
        r.one, r.two, r.three, t.speedup
    );
    println!("MU:              {}", model.mu());
    println!("SERVICE TIME:    {:.3} us", model.service_time());
    println!("PER-CORE RATE:   {:.1} rps", model.rate_per_core());
    println!(
        "CAPACITY:        {:.1} rps (lambda {:.6})",
        model.total_capacity(),
        model.total_capacity_lambda()
    );
    println!(
        "THRESHOLD:       {:.3} us ({}x service time)",
        model.saturation_threshold(config.sweep.threshold_multiplier),
        config.sweep.threshold_multiplier
    );
    if let Some(o) = &config.offload {
        println!(
            "OFFLOAD:         style={} notify={} queue={}",
            o.gpcore_offload_style, o.axcore_notify_recipient, o.gpcore_input_queue_selector
        );
    }
    Ok(())
}
