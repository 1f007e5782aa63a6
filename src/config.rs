// XMPSWEEP EXPERIMENT CONFIGURATION
// EVERYTHING ONE SWEEP NEEDS. BUILT FROM CLI FLAGS OR LOADED FROM JSON.
// VALIDATED ONCE, BEFORE ANY PROCESS IS SPAWNED.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capacity::{ServiceModel, TopologyParams, MICROS_PER_SEC};
use crate::error::SweepError;
use crate::load;
use crate::runner::{OffloadFlags, SimParams};
use crate::sweep::SweepPolicy;

pub const DEFAULT_SIMULATOR: &str = "./xmp_sched_sim";
pub const DEFAULT_MU: f64 = 0.02; // 50US MEAN SERVICE TIME
pub const DEFAULT_DURATION: u64 = 100_000;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub simulator: PathBuf,
    pub topology: TopologyParams,
    pub mu: f64,
    pub duration: u64,
    pub fractions: Vec<f64>,
    pub offload: Option<OffloadFlags>,
    pub extra_args: Vec<String>,
    pub sweep: SweepPolicy,
    pub timeout_secs: Option<f64>,
    // TREAT A NON-ZERO EXIT AS FATAL INSTEAD OF A WARNING
    pub strict_exit: bool,
    pub time_units_per_sec: f64,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            simulator: PathBuf::from(DEFAULT_SIMULATOR),
            topology: TopologyParams::default(),
            mu: DEFAULT_MU,
            duration: DEFAULT_DURATION,
            fractions: load::default_fractions(),
            offload: None,
            extra_args: Vec::new(),
            sweep: SweepPolicy::default(),
            timeout_secs: None,
            strict_exit: false,
            time_units_per_sec: MICROS_PER_SEC,
        }
    }
}

impl ExperimentConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let file = File::open(path)
            .with_context(|| format!("Unable to open config file {}", path.display()))?;
        let config = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Unable to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SweepError> {
        let t = &self.topology;
        if t.num_cores == 0 {
            return Err(SweepError::invalid("num_cores must be at least 1"));
        }
        if !(t.speedup > 0.0) {
            return Err(SweepError::invalid(format!("speedup must be positive, got {}", t.speedup)));
        }
        let r = t.phase_ratios;
        if [r.one, r.two, r.three].iter().any(|v| !(*v >= 0.0)) {
            return Err(SweepError::invalid(format!(
                "phase ratios must be non-negative, got {}/{}/{}",
                r.one, r.two, r.three
            )));
        }
        if self.fractions.is_empty() {
            return Err(SweepError::invalid("at least one load fraction is required"));
        }
        if self.fractions.iter().any(|f| !(*f > 0.0) || !f.is_finite()) {
            return Err(SweepError::invalid("load fractions must be positive and finite"));
        }
        if !load::is_strictly_increasing(&self.fractions) {
            return Err(SweepError::invalid("load fractions must be strictly increasing"));
        }
        if let Some(secs) = self.timeout_secs {
            if !(secs > 0.0) || Duration::try_from_secs_f64(secs).is_err() {
                return Err(SweepError::invalid(format!(
                    "timeout must be a positive, representable number of seconds, got {}",
                    secs
                )));
            }
        }
        self.sweep.validate()?;

        // MU AND SERVICE-TIME CHECKS LIVE IN THE MODEL ITSELF
        self.service_model().map(|_| ())
    }

    pub fn service_model(&self) -> Result<ServiceModel, SweepError> {
        ServiceModel::with_time_units(&self.topology, self.mu, self.time_units_per_sec)
    }

    pub fn timeout(&self) -> Option<Duration> {
        // UNREPRESENTABLE VALUES ARE REJECTED BY validate()
        self.timeout_secs.and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    pub fn sim_params(&self, lambda: f64) -> SimParams<'_> {
        SimParams {
            topology: &self.topology,
            mu: self.mu,
            lambda,
            duration: self.duration,
            offload: self.offload.as_ref(),
            extra_args: &self.extra_args,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        ExperimentConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_bad_fractions() {
        let mut c = ExperimentConfig::default();
        c.fractions = vec![0.2, 0.1];
        assert!(matches!(c.validate(), Err(SweepError::InvalidConfiguration(_))));

        c.fractions = vec![];
        assert!(c.validate().is_err());

        c.fractions = vec![0.0, 0.5];
        assert!(c.validate().is_err());

        c.fractions = vec![0.5, 0.5];
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_bad_topology() {
        let mut c = ExperimentConfig::default();
        c.topology.num_cores = 0;
        assert!(c.validate().is_err());

        let mut c = ExperimentConfig::default();
        c.topology.phase_ratios.two = -0.1;
        assert!(c.validate().is_err());

        let mut c = ExperimentConfig::default();
        c.mu = 0.0;
        assert!(matches!(c.validate(), Err(SweepError::InvalidConfiguration(_))));
    }

    #[test]
    fn rejects_zero_timeout() {
        let mut c = ExperimentConfig::default();
        c.timeout_secs = Some(0.0);
        assert!(c.validate().is_err());
        c.timeout_secs = Some(1.5);
        assert_eq!(c.timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn rejects_unrepresentable_timeout() {
        let mut c = ExperimentConfig::default();
        for secs in [1e30, f64::INFINITY, f64::NAN] {
            c.timeout_secs = Some(secs);
            assert!(matches!(c.validate(), Err(SweepError::InvalidConfiguration(_))));
            // NO PANIC EVEN WITHOUT VALIDATION
            assert_eq!(c.timeout(), None);
        }
    }

    #[test]
    fn rejects_infinite_time_units() {
        let mut c = ExperimentConfig::default();
        c.time_units_per_sec = f64::INFINITY;
        assert!(matches!(c.validate(), Err(SweepError::InvalidConfiguration(_))));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let json = r#"{
            "mu": 0.1,
            "topology": { "num_cores": 16, "speedup": 2.0 },
            "offload": {
                "gpcore_offload_style": "1",
                "axcore_notify_recipient": "0",
                "gpcore_input_queue_selector": "2"
            }
        }"#;
        let c: ExperimentConfig = serde_json::from_str(json).unwrap();
        assert_eq!(c.mu, 0.1);
        assert_eq!(c.topology.num_accelerators, 8);
        assert_eq!(c.duration, DEFAULT_DURATION);
        assert_eq!(c.fractions.len(), 10);
        assert!(c.offload.is_some());
        c.validate().unwrap();
    }
}
