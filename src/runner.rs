// XMPSWEEP PROCESS RUNNER
// ONE SIMULATOR CHILD PER LOAD POINT. BLOCKS UNTIL IT EXITS AND ITS STDOUT
// IS FULLY READ. THE CHILD RUNS IN ITS OWN PROCESS GROUP SO A TIMEOUT OR
// CTRL+C TAKES DOWN ANYTHING IT FORKED.

use std::io::Read;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::capacity::TopologyParams;
use crate::error::SweepError;

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const STOP_GRACE: Duration = Duration::from_millis(500);
const STDERR_TAIL_LINES: usize = 5;

// THREE-PHASE VARIANT ONLY. VALUES ARE OPAQUE TO US.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OffloadFlags {
    pub gpcore_offload_style: String,
    pub axcore_notify_recipient: String,
    pub gpcore_input_queue_selector: String,
}

// FULL PARAMETER SET FOR ONE INVOCATION
#[derive(Clone, Copy, Debug)]
pub struct SimParams<'a> {
    pub topology: &'a TopologyParams,
    pub mu: f64,
    pub lambda: f64,
    pub duration: u64,
    pub offload: Option<&'a OffloadFlags>,
    pub extra_args: &'a [String],
}

impl SimParams<'_> {
    pub fn to_args(&self) -> Vec<String> {
        let t = self.topology;
        let r = t.phase_ratios;
        let mut args = vec![
            format!("--topo={}", t.topo),
            format!("--mu={}", self.mu),
            format!("--genType={}", t.gen_type),
            format!("--phase_one_ratio={}", r.one),
            format!("--phase_two_ratio={}", r.two),
            format!("--phase_three_ratio={}", r.three),
            format!("--speedup={}", t.speedup),
            format!("--lambda={}", self.lambda),
            format!("--num_cores={}", t.num_cores),
            format!("--num_accelerators={}", t.num_accelerators),
            format!("--buffersize={}", t.buffer_size),
            format!("--duration={}", self.duration),
        ];
        if let Some(o) = self.offload {
            args.push(format!("--gpcore_offload_style={}", o.gpcore_offload_style));
            args.push(format!("--axcore_notify_recipient={}", o.axcore_notify_recipient));
            args.push(format!("--gpcore_input_queue_selector={}", o.gpcore_input_queue_selector));
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

// CAPTURED RESULT OF ONE SIMULATOR RUN
#[derive(Clone, Debug, PartialEq)]
pub struct Invocation {
    pub lambda: f64,
    pub stdout: String,
    pub stderr: String,
    // NONE WHEN THE CHILD WAS KILLED BY A SIGNAL
    pub exit_code: Option<i32>,
}

impl Invocation {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn stderr_tail(&self) -> String {
        let lines: Vec<&str> = self.stderr.lines().collect();
        let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
        lines[start..].join("\n")
    }
}

// SEAM FOR THE SWEEP DRIVER: REAL PROCESSES IN PRODUCTION, STUBS IN TESTS
pub trait Runner {
    fn invoke(&mut self, params: &SimParams<'_>, shutdown: &AtomicBool) -> Result<Invocation, SweepError>;
}

impl<R: Runner + ?Sized> Runner for &mut R {
    fn invoke(&mut self, params: &SimParams<'_>, shutdown: &AtomicBool) -> Result<Invocation, SweepError> {
        (**self).invoke(params, shutdown)
    }
}

pub struct ProcGuard {
    child: Option<Child>,
    pgid: i32,
}

impl ProcGuard {
    pub fn new(child: Child) -> Self {
        let pgid = child.id() as i32;
        Self {
            child: Some(child),
            pgid,
        }
    }

    fn try_wait(&mut self) -> std::io::Result<Option<std::process::ExitStatus>> {
        match self.child.as_mut() {
            Some(c) => c.try_wait(),
            None => Ok(None),
        }
    }

    // SIGINT THE GROUP, ESCALATE TO SIGKILL AFTER THE GRACE PERIOD
    pub fn stop(&mut self) {
        let child = match self.child.as_mut() {
            Some(c) => c,
            None => return,
        };
        if let Ok(Some(_)) = child.try_wait() {
            return;
        }
        unsafe { libc::killpg(self.pgid, libc::SIGINT); }
        let deadline = Instant::now() + STOP_GRACE;
        loop {
            match child.try_wait() {
                Ok(Some(_)) => return,
                Ok(None) if Instant::now() >= deadline => break,
                Ok(None) => std::thread::sleep(Duration::from_millis(50)),
                Err(_) => break,
            }
        }
        unsafe { libc::killpg(self.pgid, libc::SIGKILL); }
        let _ = child.wait();
    }

    // LEFTOVER GROUP MEMBERS (BACKGROUNDED GRANDCHILDREN) STILL HOLD THE
    // STDOUT/STDERR PIPES. KILL THEM SO DRAINING REACHES EOF.
    fn kill_stragglers(&self) {
        unsafe { libc::killpg(self.pgid, libc::SIGKILL); }
    }

    fn release(&mut self) {
        self.child = None;
    }
}

impl Drop for ProcGuard {
    fn drop(&mut self) {
        if self.child.is_some() {
            self.stop();
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut p| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = p.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

#[derive(Clone, Debug)]
pub struct ProcessRunner {
    binary: PathBuf,
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new(binary: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn command_line(&self, params: &SimParams<'_>) -> String {
        let mut parts = vec![self.binary.display().to_string()];
        parts.extend(params.to_args());
        parts.join(" ")
    }
}

impl Runner for ProcessRunner {
    fn invoke(&mut self, params: &SimParams<'_>, shutdown: &AtomicBool) -> Result<Invocation, SweepError> {
        let lambda = params.lambda;
        tracing::debug!(command = %self.command_line(params), "spawning simulator");
        let mut child = Command::new(&self.binary)
            .args(params.to_args())
            .process_group(0)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SweepError::ProcessLaunchFailure {
                binary: self.binary.clone(),
                source,
            })?;

        // READ BOTH PIPES CONCURRENTLY SO A CHATTY CHILD CANNOT FILL ONE AND STALL
        let out = drain(child.stdout.take());
        let err = drain(child.stderr.take());
        let mut guard = ProcGuard::new(child);

        // AN UNREPRESENTABLE DEADLINE MEANS NO DEADLINE
        let deadline = self.timeout.and_then(|t| Instant::now().checked_add(t));
        let status = loop {
            if let Some(status) = guard.try_wait()? {
                break status;
            }
            if shutdown.load(Ordering::Relaxed) {
                guard.stop();
                guard.kill_stragglers();
                guard.release();
                let _ = (collect(out), collect(err));
                return Err(SweepError::Cancelled { lambda });
            }
            if let (Some(d), Some(timeout)) = (deadline, self.timeout) {
                if Instant::now() >= d {
                    guard.stop();
                    guard.kill_stragglers();
                    guard.release();
                    let _ = (collect(out), collect(err));
                    return Err(SweepError::Timeout { lambda, timeout });
                }
            }
            std::thread::sleep(POLL_INTERVAL);
        };
        guard.kill_stragglers();
        guard.release();

        Ok(Invocation {
            lambda,
            stdout: collect(out),
            stderr: collect(err),
            exit_code: status.code(),
        })
    }
}
