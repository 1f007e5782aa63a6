// XMPSWEEP -- LOAD SWEEP AND SATURATION SEARCH FOR XMP_SCHED_SIM
// COMPUTES A CAPACITY MODEL, PROBES THE SIMULATOR AT RISING ARRIVAL RATES,
// STOPS AT THE FIRST SATURATED POINT OR EXTENDS PAST THE PLANNED RANGE.

mod cli;

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use clap::{Parser, Subcommand};

use xmpsweep::logger;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

#[derive(Parser)]
#[command(name = "xmpsweep")]
#[command(about = "XMPSWEEP -- LOAD SWEEP AND SATURATION SEARCH FOR XMP_SCHED_SIM")]
struct Cli {
    // DEBUG-LEVEL DIAGNOSTICS ON STDERR (RUST_LOG OVERRIDES)
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the sweep against the simulator
    Run(cli::run::RunArgs),

    /// Print the capacity model and load points without running anything
    Plan(cli::ExperimentArgs),

    /// Convert a raw report archive into a TSV table
    Csv(cli::csv::CsvArgs),

    /// Check the simulator binary and the configuration
    Check(cli::ExperimentArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    match cli.command {
        Command::Run(args) => {
            // CTRL+C STOPS THE IN-FLIGHT CHILD AND ENDS THE SWEEP
            ctrlc::set_handler(move || {
                SHUTDOWN.store(true, Ordering::Relaxed);
            })?;
            cli::run::run_sweep(args, &SHUTDOWN)
        }
        Command::Plan(args) => cli::plan::run_plan(args),
        Command::Csv(args) => cli::csv::run_csv(args),
        Command::Check(args) => cli::check::run_check(args),
    }
}
