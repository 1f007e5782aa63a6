use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Result;

use super::ExperimentArgs;

fn which(name: &Path) -> Option<PathBuf> {
    let out = Command::new("which").arg(name).output().ok()?;
    if !out.status.success() {
        return None;
    }
    let path = String::from_utf8_lossy(&out.stdout).trim().to_string();
    (!path.is_empty()).then(|| PathBuf::from(path))
}

// BARE NAMES GO THROUGH PATH, ANYTHING WITH A SEPARATOR IS TAKEN AS-IS
fn resolve(binary: &Path) -> Option<PathBuf> {
    if binary.components().count() > 1 {
        binary.exists().then(|| binary.to_path_buf())
    } else {
        which(binary)
    }
}

fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

pub fn run_check(args: ExperimentArgs) -> Result<()> {
    println!("XMPSWEEP CHECK");
    println!();

    let mut ok = true;

    let config = match args.into_config() {
        Ok(c) => {
            println!("  {:<24}OK", "config");
            Some(c)
        }
        Err(e) => {
            println!("  {:<24}UNREADABLE ({:#})", "config", e);
            ok = false;
            None
        }
    };

    if let Some(config) = &config {
        match config.validate() {
            Ok(()) => println!("  {:<24}OK", "parameters"),
            Err(e) => {
                println!("  {:<24}INVALID ({})", "parameters", e);
                ok = false;
            }
        }

        let name = config.simulator.display().to_string();
        match resolve(&config.simulator) {
            Some(path) if is_executable(&path) => {
                println!("  {:<24}OK ({})", name, path.display());
            }
            Some(path) => {
                println!("  {:<24}NOT EXECUTABLE ({})", name, path.display());
                ok = false;
            }
            None => {
                println!("  {:<24}MISSING", name);
                ok = false;
            }
        }
        println!();

        if config.validate().is_ok() {
            super::print_model(config)?;
            println!();
        }
    }

    if ok {
        println!("ALL CHECKS PASSED");
    } else {
        println!("SOME CHECKS FAILED");
        if let Some(config) = &config {
            if resolve(&config.simulator).is_none() {
                println!("  Build the simulator or pass --simulator <PATH>");
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
