use anyhow::Result;

use xmpsweep::{ProcessRunner, SweepDriver};

use super::{print_model, ExperimentArgs};

// DRY RUN: NOTHING IS SPAWNED
pub fn run_plan(args: ExperimentArgs) -> Result<()> {
    let config = args.into_config()?;
    let runner = ProcessRunner::new(&config.simulator, config.timeout());
    let driver = SweepDriver::new(&config, runner.clone())?;

    println!("XMPSWEEP PLAN");
    print_model(&config)?;
    println!();

    println!("{:<8} {:>8} {:>12}  COMMAND", "PHASE", "FRACTION", "LAMBDA");
    for p in driver.plan() {
        let params = config.sim_params(p.lambda);
        println!(
            "{:<8} {:>8.3} {:>12.6}  {}",
            "SWEEP",
            p.fraction,
            p.lambda,
            runner.command_line(&params)
        );
    }

    let passes = config.sweep.max_extension_passes;
    if passes > 0 {
        println!();
        println!(
            "IF UNSATURATED: UP TO {} EXTENSION PASS(ES), SHIFT {:.6} PER PASS",
            passes,
            driver.extension_shift()
        );
        for pass in 1..=passes {
            let points = driver.extension_points(pass);
            let lambdas: Vec<String> = points.iter().map(|p| format!("{:.6}", p.lambda)).collect();
            println!("  EXT{:<4} {}", pass, lambdas.join(" "));
        }
    }
    Ok(())
}
