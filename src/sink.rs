// XMPSWEEP RESULT SINK
// APPEND-ONLY, OWNED BY THE DRIVER. RAW STDOUT IS WRITTEN THROUGH TO THE
// ARCHIVE THE MOMENT IT IS CAPTURED, BEFORE PARSING, SO A LATER FAILURE
// NEVER LOSES EARLIER OUTPUT.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;

use crate::load::LoadPoint;
use crate::report::{ReportContext, ReportRecord, StatsRow};
use crate::runner::Invocation;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PhaseTag {
    Sweep,
    // 1-BASED PASS NUMBER
    Extension(u32),
}

impl PhaseTag {
    pub fn label(self) -> String {
        match self {
            Self::Sweep => "SWEEP".to_string(),
            Self::Extension(pass) => format!("EXT{}", pass),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SweepRow {
    pub phase: PhaseTag,
    pub point: LoadPoint,
    pub exit_code: Option<i32>,
    pub row: StatsRow,
    pub context: ReportContext,
}

impl SweepRow {
    pub fn to_record(&self) -> ReportRecord {
        ReportRecord {
            context: self.context.clone(),
            row: Some(self.row),
        }
    }
}

pub enum Archive {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl Archive {
    // A ".gz" SUFFIX SELECTS GZIP
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = BufWriter::new(File::create(path)?);
        if is_gzip(path) {
            Ok(Self::Gzip(GzEncoder::new(file, Compression::default())))
        } else {
            Ok(Self::Plain(file))
        }
    }

    pub fn finish(self) -> io::Result<()> {
        match self {
            Self::Plain(mut w) => w.flush(),
            Self::Gzip(enc) => enc.finish()?.flush(),
        }
    }
}

impl Write for Archive {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            Self::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::Gzip(w) => w.flush(),
        }
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension().map(|e| e == "gz").unwrap_or(false)
}

pub fn read_archive(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    let mut text = String::new();
    if is_gzip(path) {
        GzDecoder::new(file).read_to_string(&mut text)?;
    } else {
        let mut file = file;
        file.read_to_string(&mut text)?;
    }
    Ok(text)
}

#[derive(Default)]
pub struct ResultSink {
    archive: Option<Archive>,
    outputs: Vec<String>,
    rows: Vec<SweepRow>,
}

impl ResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_archive(archive: Archive) -> Self {
        Self {
            archive: Some(archive),
            ..Self::default()
        }
    }

    // CALLED FOR EVERY INVOCATION, PARSEABLE OR NOT. THE IN-MEMORY COPY IS
    // KEPT EVEN WHEN THE ARCHIVE WRITE FAILS.
    pub fn record_output(&mut self, inv: &Invocation) -> io::Result<()> {
        self.outputs.push(inv.stdout.clone());
        if let Some(a) = self.archive.as_mut() {
            a.write_all(inv.stdout.as_bytes())?;
            a.flush()?;
        }
        Ok(())
    }

    pub fn push(&mut self, row: SweepRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[SweepRow] {
        &self.rows
    }

    // RAW STDOUT OF EVERY INVOCATION, IN ORDER
    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn records(&self) -> Vec<ReportRecord> {
        self.rows.iter().map(SweepRow::to_record).collect()
    }

    pub fn finish(&mut self) -> io::Result<()> {
        match self.archive.take() {
            Some(a) => a.finish(),
            None => Ok(()),
        }
    }
}
