// XMPSWEEP CAPACITY MODEL
// PURE FUNCTIONS: TOPOLOGY + SERVICE RATE -> PER-CORE AND AGGREGATE CAPACITY.
//
// SERVICE TIME PER CORE = (1/MU)*R1 + (1/MU)*R2/SPEEDUP + (1/MU)*R3
// PHASE 2 IS THE OFFLOADED PHASE: AN ACCELERATOR FINISHES IT SPEEDUP-X FASTER.
// MU AND LAMBDA SHARE ONE TIME UNIT (MICROSECONDS BY DEFAULT).

use serde::{Deserialize, Serialize};

use crate::error::SweepError;

// SIMULATOR TIME UNITS PER SECOND (MU/LAMBDA ARE PER-MICROSECOND)
pub const MICROS_PER_SEC: f64 = 1_000_000.0;

// SATURATION: AVG LATENCY ABOVE 100X THE UNLOADED PER-CORE SERVICE TIME
pub const DEFAULT_THRESHOLD_MULTIPLIER: f64 = 100.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseRatios {
    pub one: f64,
    pub two: f64,
    pub three: f64,
}

impl Default for PhaseRatios {
    fn default() -> Self {
        Self { one: 0.25, two: 0.5, three: 0.25 }
    }
}

// IMMUTABLE PER EXPERIMENT. RATIOS ARE NOT REQUIRED TO SUM TO 1;
// THAT IS FOR THE SIMULATOR TO JUDGE.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyParams {
    pub topo: u32,
    pub num_cores: u32,
    pub num_accelerators: u32,
    pub buffer_size: u32,
    pub speedup: f64,
    pub gen_type: u32,
    pub phase_ratios: PhaseRatios,
}

impl Default for TopologyParams {
    fn default() -> Self {
        Self {
            topo: 4,
            num_cores: 16,
            num_accelerators: 8,
            buffer_size: 32,
            speedup: 1.0,
            gen_type: 0,
            phase_ratios: PhaseRatios::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ServiceModel {
    mu: f64,
    service_time: f64,
    num_cores: u32,
    time_units_per_sec: f64,
}

impl ServiceModel {
    pub fn new(topology: &TopologyParams, mu: f64) -> Result<Self, SweepError> {
        Self::with_time_units(topology, mu, MICROS_PER_SEC)
    }

    pub fn with_time_units(
        topology: &TopologyParams,
        mu: f64,
        time_units_per_sec: f64,
    ) -> Result<Self, SweepError> {
        if !(mu > 0.0) || !mu.is_finite() {
            return Err(SweepError::invalid(format!("mu must be positive, got {}", mu)));
        }
        if !(time_units_per_sec > 0.0) || !time_units_per_sec.is_finite() {
            return Err(SweepError::invalid(format!(
                "time units per second must be positive, got {}",
                time_units_per_sec
            )));
        }

        let r = topology.phase_ratios;
        let mean = 1.0 / mu;
        let service_time = mean * r.one + mean * r.two / topology.speedup + mean * r.three;

        // CATCHES ZERO RATIOS, NEGATIVE RATIOS AND SPEEDUP <= 0 (INF/NAN)
        if !(service_time > 0.0) || !service_time.is_finite() {
            return Err(SweepError::invalid(format!(
                "degenerate service time {} (mu={}, ratios={}/{}/{}, speedup={})",
                service_time, mu, r.one, r.two, r.three, topology.speedup
            )));
        }

        Ok(Self {
            mu,
            service_time,
            num_cores: topology.num_cores,
            time_units_per_sec,
        })
    }

    pub fn mu(&self) -> f64 {
        self.mu
    }

    // UNLOADED SERVICE TIME OF ONE REQUEST ON ONE CORE, IN SIMULATOR TIME UNITS
    pub fn service_time(&self) -> f64 {
        self.service_time
    }

    pub fn time_units_per_sec(&self) -> f64 {
        self.time_units_per_sec
    }

    // REQUESTS PER SECOND
    pub fn rate_per_core(&self) -> f64 {
        self.time_units_per_sec / self.service_time
    }

    // REQUESTS PER SECOND, ALL CORES
    pub fn total_capacity(&self) -> f64 {
        self.rate_per_core() * self.num_cores as f64
    }

    // AGGREGATE CAPACITY IN THE SIMULATOR'S LAMBDA UNITS (REQUESTS PER TIME UNIT)
    pub fn total_capacity_lambda(&self) -> f64 {
        self.total_capacity() / self.time_units_per_sec
    }

    pub fn saturation_threshold(&self, multiplier: f64) -> f64 {
        multiplier * self.service_time
    }
}
