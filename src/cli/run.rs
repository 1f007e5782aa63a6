use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use xmpsweep::sink::{Archive, SweepRow};
use xmpsweep::sweep::SweepOutcome;
use xmpsweep::{tsv, ExperimentConfig, ProcessRunner, ResultSink, SaturationState, SweepDriver};

use super::{print_model, ExperimentArgs};

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub experiment: ExperimentArgs,

    // RAW SIMULATOR OUTPUT, ONE BLOCK PER RUN (".gz" COMPRESSES)
    #[arg(long, short, default_value = "out.txt")]
    pub output: PathBuf,

    // PARSED ROWS AS TSV
    #[arg(long)]
    pub tsv: Option<PathBuf>,

    // PARSED ROWS PLUS SATURATION RESULT AS JSON
    #[arg(long)]
    pub json: Option<PathBuf>,

    // DUMP THE EFFECTIVE CONFIG AS JSON BEFORE RUNNING
    #[arg(long)]
    pub print_config: bool,
}

#[derive(Serialize)]
struct RunReport<'a> {
    config: &'a ExperimentConfig,
    service_time: f64,
    threshold: f64,
    crossed: bool,
    crossing_lambda: Option<f64>,
    complete: bool,
    rows: &'a [SweepRow],
}

pub fn run_sweep(args: RunArgs, shutdown: &AtomicBool) -> Result<()> {
    let config = args.experiment.into_config()?;
    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
    }
    config.validate()?;

    println!("XMPSWEEP");
    print_model(&config)?;
    println!("OUTPUT:          {}", args.output.display());
    println!();

    let archive = Archive::create(&args.output)
        .with_context(|| format!("Unable to create output file {}", args.output.display()))?;
    let runner = ProcessRunner::new(&config.simulator, config.timeout());
    let mut driver = SweepDriver::with_sink(&config, runner, ResultSink::with_archive(archive))?;

    let result = driver.run(shutdown);
    let state = *driver.state();
    let service_time = driver.model().service_time();
    let mut sink = driver.into_sink();

    // PARTIAL RESULTS ARE WRITTEN ON ABORT TOO
    sink.finish()
        .with_context(|| format!("Unable to finish output file {}", args.output.display()))?;
    if let Some(path) = &args.tsv {
        write_tsv(path, &sink)?;
    }
    if let Some(path) = &args.json {
        let report = RunReport {
            config: &config,
            service_time,
            threshold: state.threshold(),
            crossed: state.crossed(),
            crossing_lambda: state.crossing().map(|p| p.lambda),
            complete: result.is_ok(),
            rows: sink.rows(),
        };
        write_json(path, &report)?;
    }

    print_rows(sink.rows());
    match result {
        Ok(outcome) => {
            print_outcome(&outcome, &state);
            Ok(())
        }
        Err(e) => {
            println!();
            println!("SWEEP ABORTED AFTER {} ROWS", sink.rows().len());
            Err(e.into())
        }
    }
}

fn write_tsv(path: &Path, sink: &ResultSink) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Unable to create TSV file {}", path.display()))?;
    tsv::write_records(&mut BufWriter::new(file), &sink.records())?;
    tracing::info!(path = %path.display(), rows = sink.rows().len(), "wrote tsv");
    Ok(())
}

fn write_json(path: &Path, report: &RunReport<'_>) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Unable to create JSON file {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)?;
    tracing::info!(path = %path.display(), "wrote json report");
    Ok(())
}

fn print_rows(rows: &[SweepRow]) {
    println!();
    println!(
        "{:<8} {:>8} {:>12} {:>8} {:>12} {:>12} {:>12}",
        "PHASE", "FRACTION", "LAMBDA", "COUNT", "AVG (us)", "P99 (us)", "THROUGHPUT"
    );
    for r in rows {
        println!(
            "{:<8} {:>8.3} {:>12.6} {:>8} {:>12.3} {:>12.3} {:>12.6}",
            r.phase.label(),
            r.point.fraction,
            r.point.lambda,
            r.row.count,
            r.row.avg_latency,
            r.row.p99,
            r.row.throughput,
        );
    }
}

fn print_outcome(outcome: &SweepOutcome, state: &SaturationState) {
    println!();
    println!("INVOCATIONS:     {}", outcome.invocations);
    println!("EXTENSIONS:      {}", outcome.extension_passes);
    match outcome.crossing {
        Some(p) => println!(
            "SATURATED AT:    lambda {:.6} (fraction {:.3}), threshold {:.3} us",
            p.lambda,
            p.fraction,
            state.threshold()
        ),
        None => println!(
            "NOT SATURATED:   last avg {} us <= threshold {:.3} us",
            state
                .last_avg_latency()
                .map(|v| format!("{:.3}", v))
                .unwrap_or_else(|| "-".to_string()),
            state.threshold()
        ),
    }
}
