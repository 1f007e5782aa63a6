use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use xmpsweep::report::parse_archive;
use xmpsweep::sink::read_archive;
use xmpsweep::tsv;

#[derive(Args, Debug)]
pub struct CsvArgs {
    // RAW ARCHIVE WRITTEN BY `run` (".gz" IS DECOMPRESSED)
    #[arg(default_value = "out.txt")]
    pub input: PathBuf,

    #[arg(long, short, default_value = "out.csv")]
    pub output: PathBuf,
}

pub fn run_csv(args: CsvArgs) -> Result<()> {
    let text = read_archive(&args.input)
        .with_context(|| format!("Unable to read archive {}", args.input.display()))?;
    let records = parse_archive(&text);

    let missing = records.iter().filter(|r| r.row.is_none()).count();
    if missing > 0 {
        tracing::warn!(blocks = missing, "archive blocks without a data row");
    }

    let file = File::create(&args.output)
        .with_context(|| format!("Unable to create {}", args.output.display()))?;
    tsv::write_records(&mut BufWriter::new(file), &records)?;

    println!(
        "{} RECORDS ({} WITHOUT DATA) -> {}",
        records.len(),
        missing,
        args.output.display()
    );
    Ok(())
}
