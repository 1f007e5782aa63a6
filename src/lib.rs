// XMPSWEEP LIBRARY
// LOAD-SWEEP / SATURATION-SEARCH DRIVER FOR THE XMP SCHEDULER SIMULATOR.
// SHARED BETWEEN THE BINARY (src/main.rs, src/cli/) AND THE TESTS (tests/).

pub mod capacity;
pub mod config;
pub mod error;
pub mod load;
pub mod logger;
pub mod report;
pub mod runner;
pub mod sink;
pub mod sweep;
pub mod tsv;

pub use capacity::{PhaseRatios, ServiceModel, TopologyParams};
pub use config::ExperimentConfig;
pub use error::SweepError;
pub use load::LoadPoint;
pub use report::{ReportContext, ReportRecord, StatsRow};
pub use runner::{Invocation, OffloadFlags, ProcessRunner, Runner, SimParams};
pub use sink::{ResultSink, SweepRow};
pub use sweep::{Phase, SaturationState, SweepDriver, SweepOutcome, SweepPolicy};
