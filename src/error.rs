// XMPSWEEP ERROR TAXONOMY
// CONFIGURATION AND LAUNCH ERRORS ABORT BEFORE/AT SPAWN.
// PARSE ERRORS ABORT THE CURRENT SWEEP; COLLECTED ROWS STAY IN THE SINK.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SweepError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("failed to launch simulator {}: {source}", .binary.display())]
    ProcessLaunchFailure {
        binary: PathBuf,
        #[source]
        source: io::Error,
    },

    // ONLY RAISED WHEN STRICT EXIT CHECKING IS ON
    #[error("simulator exited with {} at lambda={lambda}", exit_label(.code))]
    NonZeroExit { lambda: f64, code: Option<i32> },

    #[error("no stats row in simulator output at lambda={lambda}\n--- CAPTURED OUTPUT ---\n{output}")]
    NoDataFound { lambda: f64, output: String },

    #[error("simulator timed out after {timeout:?} at lambda={lambda}")]
    Timeout { lambda: f64, timeout: Duration },

    #[error("sweep cancelled at lambda={lambda}")]
    Cancelled { lambda: f64 },

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl SweepError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}

pub fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {}", c),
        None => "signal".to_string(),
    }
}
