// XMPSWEEP PROCESS RUNNER TESTS
// REAL CHILD PROCESSES: SMALL /bin/sh SCRIPTS STAND IN FOR THE SIMULATOR.
//
// UNIX ONLY. ALL SCRIPTS ARE WRITTEN ONCE, BEFORE ANY TEST SPAWNS, SO NO
// FORKED CHILD CAN HOLD A SCRIPT OPEN FOR WRITING WHEN IT IS EXECUTED.

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use xmpsweep::sink::{read_archive, Archive};
use xmpsweep::{
    ExperimentConfig, ProcessRunner, ResultSink, Runner, SweepDriver, SweepError,
};

// ---------------------------------------------------------------------------
// FAKE SIMULATORS
// ---------------------------------------------------------------------------

fn script(name: &str, body: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("xmpsweep-{}-{}.sh", std::process::id(), name));
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

// ECHOES ITS LAMBDA AND REPORTS A FIXED LATENCY
const REPORTING_SIM: &str = r#"
for arg in "$@"; do
    case "$arg" in
        --lambda=*) lambda="${arg#--lambda=}" ;;
    esac
done
echo "Selected topology: 4"
printf 'Cores:16\tAccelerators:8\tLambda:%s\n' "$lambda"
echo "Stats collector: Main Stats"
printf 'Count\tStolen\tAVG\tSTDDev\t50th\t90th\t95th\t99th\tReqs/time_unit\n'
printf '2178\t0\t7.6\t10.4\t5.1\t17.6\t23.0\t36.7\t0.0217\n'
"#;

struct Sims {
    reporting: PathBuf,
    crash: PathBuf,
    hang: PathBuf,
    nodata: PathBuf,
    orphan: PathBuf,
}

fn sims() -> &'static Sims {
    static SIMS: OnceLock<Sims> = OnceLock::new();
    SIMS.get_or_init(|| Sims {
        reporting: script("report", REPORTING_SIM),
        crash: script("crash", "echo partial\necho 'bad flag' >&2\nexit 3"),
        hang: script("hang", "sleep 5"),
        nodata: script("nodata", "echo 'Selected topology: 4'\necho 'collector crashed'"),
        // EXITS AT ONCE, LEAVES A BACKGROUND CHILD HOLDING STDOUT
        orphan: script("orphan", "sleep 6 &\necho done"),
    })
}

fn config_for(simulator: PathBuf) -> ExperimentConfig {
    let mut config = ExperimentConfig::default();
    config.simulator = simulator;
    config.fractions = vec![0.5, 1.0];
    config
}

// ---------------------------------------------------------------------------
// SINGLE INVOCATIONS
// ---------------------------------------------------------------------------

#[test]
fn captures_stdout_and_exit_code() {
    let sim = sims().reporting.clone();
    let config = config_for(sim.clone());
    let mut runner = ProcessRunner::new(&sim, None);
    let shutdown = AtomicBool::new(false);

    let inv = runner.invoke(&config.sim_params(0.25), &shutdown).unwrap();
    assert!(inv.success());
    assert_eq!(inv.lambda, 0.25);
    assert!(inv.stdout.contains("Lambda:0.25"));
    assert!(inv.stdout.contains("Stats collector: Main Stats"));
}

#[test]
fn nonzero_exit_keeps_output() {
    let sim = sims().crash.clone();
    let config = config_for(sim.clone());
    let mut runner = ProcessRunner::new(&sim, None);
    let shutdown = AtomicBool::new(false);

    let inv = runner.invoke(&config.sim_params(0.1), &shutdown).unwrap();
    assert!(!inv.success());
    assert_eq!(inv.exit_code, Some(3));
    assert_eq!(inv.stdout, "partial\n");
    assert_eq!(inv.stderr_tail(), "bad flag");
}

#[test]
fn missing_binary_is_a_launch_failure() {
    sims();
    let sim = std::env::temp_dir().join("xmpsweep-no-such-simulator");
    let config = config_for(sim.clone());
    let mut runner = ProcessRunner::new(&sim, None);
    let shutdown = AtomicBool::new(false);

    let err = runner.invoke(&config.sim_params(0.1), &shutdown).unwrap_err();
    match err {
        SweepError::ProcessLaunchFailure { binary, .. } => assert_eq!(binary, sim),
        other => panic!("expected ProcessLaunchFailure, got {other:?}"),
    }
}

#[test]
fn hung_simulator_times_out() {
    let sim = sims().hang.clone();
    let config = config_for(sim.clone());
    let mut runner = ProcessRunner::new(&sim, Some(Duration::from_millis(200)));
    let shutdown = AtomicBool::new(false);

    let start = Instant::now();
    let err = runner.invoke(&config.sim_params(0.1), &shutdown).unwrap_err();
    assert!(matches!(err, SweepError::Timeout { .. }));
    // KILLED, NOT WAITED OUT
    assert!(start.elapsed() < Duration::from_secs(4));
}

#[test]
fn preset_shutdown_stops_the_child() {
    let sim = sims().hang.clone();
    let config = config_for(sim.clone());
    let mut runner = ProcessRunner::new(&sim, None);
    let shutdown = AtomicBool::new(true);

    let start = Instant::now();
    let err = runner.invoke(&config.sim_params(0.1), &shutdown).unwrap_err();
    assert!(matches!(err, SweepError::Cancelled { .. }));
    assert!(start.elapsed() < Duration::from_secs(4));
}

#[test]
fn background_grandchild_does_not_hold_the_run_open() {
    let sim = sims().orphan.clone();
    let config = config_for(sim.clone());
    let mut runner = ProcessRunner::new(&sim, Some(Duration::from_millis(300)));
    let shutdown = AtomicBool::new(false);

    let start = Instant::now();
    let inv = runner.invoke(&config.sim_params(0.1), &shutdown).unwrap();
    assert!(inv.success());
    assert_eq!(inv.stdout, "done\n");
    // THE LEFTOVER sleep IS KILLED, NOT WAITED OUT
    assert!(start.elapsed() < Duration::from_secs(3));
}

// ---------------------------------------------------------------------------
// FULL SWEEP THROUGH A REAL CHILD
// ---------------------------------------------------------------------------

#[test]
fn sweep_archives_every_run() {
    let sim = sims().reporting.clone();
    let out = std::env::temp_dir().join(format!("xmpsweep-{}-sweep-out.txt", std::process::id()));
    let config = config_for(sim.clone());
    let shutdown = AtomicBool::new(false);

    let archive = Archive::create(&out).unwrap();
    let runner = ProcessRunner::new(&sim, Some(Duration::from_secs(10)));
    let mut driver = SweepDriver::with_sink(&config, runner, ResultSink::with_archive(archive)).unwrap();
    let outcome = driver.run(&shutdown).unwrap();

    // 7.6US NEVER CROSSES 5000US: SWEEP + ONE EXTENSION
    assert!(!outcome.crossed);
    assert_eq!(outcome.invocations, 4);

    let mut sink = driver.into_sink();
    sink.finish().unwrap();
    let text = read_archive(&out).unwrap();
    assert_eq!(text.matches("Selected topology").count(), 4);
    assert_eq!(sink.rows().len(), 4);
    assert_eq!(sink.rows()[0].row.count, 2178);

    let _ = std::fs::remove_file(&out);
}

#[test]
fn sweep_without_data_aborts_with_output() {
    let sim = sims().nodata.clone();
    let config = config_for(sim.clone());
    let shutdown = AtomicBool::new(false);

    let mut driver = SweepDriver::new(&config, ProcessRunner::new(&sim, None)).unwrap();
    let err = driver.run(&shutdown).unwrap_err();
    match err {
        SweepError::NoDataFound { output, .. } => assert!(output.contains("collector crashed")),
        other => panic!("expected NoDataFound, got {other:?}"),
    }
    assert!(driver.sink().rows().is_empty());
    assert_eq!(driver.sink().outputs().len(), 1);
}
