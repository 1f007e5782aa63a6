// XMPSWEEP REPORT PARSER
// THE SIMULATOR PRINTS A COMMENTARY BLOCK FOLLOWED BY ONE DATA LINE:
//
//   Selected topology: 4
//   Cores:16  Accelerators:8  Mu:0.100000  Lambda:0.021333  ...
//   Stats collector: Main Stats
//   Count  Stolen  AVG  STDDev  50th  90th  95th  99th  Reqs/time_unit
//   2178   0       7.57 10.42   5.16  17.61 23.05 36.77 0.0217
//
// A DATA LINE IS EXACTLY NINE WHITESPACE-SEPARATED TOKENS: TWO INTEGERS,
// THEN SEVEN FINITE REALS. ANYTHING ELSE IS COMMENTARY. NO DATA LINE IS AN
// ERROR, NEVER A ZERO RECORD.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

pub const METRIC_COLUMNS: [&str; 9] = [
    "Count", "Stolen", "AVG", "STDDev", "50th", "90th", "95th", "99th", "Reqs/time_unit",
];

// ECHOED PARAMETER KEYS, IN THE ORDER THE SIMULATOR PRINTS THEM
pub const CONTEXT_KEYS: [&str; 10] = [
    "Cores",
    "Accelerators",
    "Mu",
    "Lambda",
    "axCoreQueueSize",
    "axCoreSpeedup",
    "genType",
    "phase_one_ratio",
    "phase_two_ratio",
    "phase_three_ratio",
];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReportError {
    #[error("no stats row found in simulator output")]
    NoDataFound,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct StatsRow {
    pub count: u64,
    pub stolen: u64,
    pub avg_latency: f64,
    pub stddev_latency: f64,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub throughput: f64,
}

impl StatsRow {
    // STRICT LINE GRAMMAR. RETURNS NONE FOR ANY NON-DATA LINE.
    pub fn parse_line(line: &str) -> Option<Self> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != METRIC_COLUMNS.len() {
            return None;
        }

        let count = tokens[0].parse::<u64>().ok()?;
        let stolen = tokens[1].parse::<u64>().ok()?;
        let mut reals = [0.0f64; 7];
        for (slot, tok) in reals.iter_mut().zip(&tokens[2..]) {
            let v = tok.parse::<f64>().ok()?;
            if !v.is_finite() {
                return None;
            }
            *slot = v;
        }

        Some(Self {
            count,
            stolen,
            avg_latency: reals[0],
            stddev_latency: reals[1],
            p50: reals[2],
            p90: reals[3],
            p95: reals[4],
            p99: reals[5],
            throughput: reals[6],
        })
    }

    // FIRST MATCHING LINE WINS: ONE INVOCATION, ONE RESULT BLOCK
    pub fn parse(text: &str) -> Result<Self, ReportError> {
        text.lines()
            .find_map(Self::parse_line)
            .ok_or(ReportError::NoDataFound)
    }

    // CELLS IN METRIC_COLUMNS ORDER
    pub fn cells(&self) -> [String; 9] {
        [
            self.count.to_string(),
            self.stolen.to_string(),
            self.avg_latency.to_string(),
            self.stddev_latency.to_string(),
            self.p50.to_string(),
            self.p90.to_string(),
            self.p95.to_string(),
            self.p99.to_string(),
            self.throughput.to_string(),
        ]
    }
}

fn topology_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:#\s*)?Selected topology:\s*(\S+)").expect("topology pattern")
    })
}

fn param_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([A-Za-z_][A-Za-z0-9_]*):(\S+)").expect("param pattern"))
}

// INFORMATIONAL CONTEXT ECHOED BY THE SIMULATOR. NOT USED FOR DECISIONS.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ReportContext {
    pub topology: Option<String>,
    pub params: BTreeMap<String, String>,
}

impl ReportContext {
    fn topology_of(line: &str) -> Option<String> {
        topology_re()
            .captures(line)
            .map(|c| c[1].to_string())
    }

    fn absorb_params(&mut self, line: &str) {
        for cap in param_re().captures_iter(line) {
            self.params.insert(cap[1].to_string(), cap[2].to_string());
        }
    }

    // CONTEXT OF THE FIRST BLOCK IN `text`
    pub fn parse(text: &str) -> Self {
        let mut ctx = Self::default();
        for line in text.lines() {
            if let Some(topo) = Self::topology_of(line) {
                if ctx.topology.is_some() {
                    break;
                }
                ctx.topology = Some(topo);
                continue;
            }
            if StatsRow::parse_line(line).is_some() {
                break;
            }
            ctx.absorb_params(line);
        }
        ctx
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ReportRecord {
    pub context: ReportContext,
    pub row: Option<StatsRow>,
}

// SPLIT A RAW ARCHIVE (CONCATENATED SIMULATOR OUTPUTS) INTO ONE RECORD PER
// "Selected topology" BLOCK. A BLOCK KEEPS ITS FIRST DATA LINE ONLY.
pub fn parse_archive(text: &str) -> Vec<ReportRecord> {
    let mut records = Vec::new();
    let mut current: Option<ReportRecord> = None;

    for line in text.lines() {
        if let Some(topo) = ReportContext::topology_of(line) {
            if let Some(done) = current.take() {
                records.push(done);
            }
            current = Some(ReportRecord {
                context: ReportContext {
                    topology: Some(topo),
                    params: BTreeMap::new(),
                },
                row: None,
            });
            continue;
        }

        if let Some(row) = StatsRow::parse_line(line) {
            let rec = current.get_or_insert_with(ReportRecord::default);
            if rec.row.is_none() {
                rec.row = Some(row);
            }
            continue;
        }

        if let Some(rec) = current.as_mut() {
            rec.context.absorb_params(line);
        }
    }

    if let Some(done) = current {
        records.push(done);
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Selected topology: 4\n\
Cores:16\tAccelerators:8\tMu:0.100000\tLambda:0.021333\taxCoreQueueSize:128\taxCoreSpeedup:2.000000\tgenType:0\tphase_one_ratio:0.250000\tphase_two_ratio:0.500000\tphase_three_ratio:0.250000\n\
Stats collector: Main Stats\n\
Count\tStolen\tAVG\tSTDDev\t50th\t90th\t95th\t99th\tReqs/time_unit\n\
2178\t0\t7.577755927922724\t10.425712204294848\t5.162795236057718\t17.610952936767717\t23.057183618526324\t36.77609786470566\t0.021769663390111535\n";

    #[test]
    fn parses_reference_output() {
        let row = StatsRow::parse(SAMPLE).unwrap();
        assert_eq!(row.count, 2178);
        assert_eq!(row.stolen, 0);
        assert_eq!(row.avg_latency, 7.577755927922724);
        assert_eq!(row.p99, 36.77609786470566);
        assert_eq!(row.throughput, 0.021769663390111535);
    }

    #[test]
    fn parse_is_idempotent() {
        assert_eq!(StatsRow::parse(SAMPLE), StatsRow::parse(SAMPLE));
    }

    #[test]
    fn no_data_is_an_error() {
        let header_only = "Selected topology: 4\nStats collector: Main Stats\n\
Count\tStolen\tAVG\tSTDDev\t50th\t90th\t95th\t99th\tReqs/time_unit\n";
        assert_eq!(StatsRow::parse(header_only), Err(ReportError::NoDataFound));
        assert_eq!(StatsRow::parse(""), Err(ReportError::NoDataFound));
    }

    #[test]
    fn rejects_malformed_lines() {
        // EIGHT TOKENS
        assert!(StatsRow::parse_line("1 0 1.0 1.0 1.0 1.0 1.0 1.0").is_none());
        // TEN TOKENS
        assert!(StatsRow::parse_line("1 0 1.0 1.0 1.0 1.0 1.0 1.0 1.0 1.0").is_none());
        // FRACTIONAL COUNT
        assert!(StatsRow::parse_line("1.5 0 1.0 1.0 1.0 1.0 1.0 1.0 1.0").is_none());
        // NEGATIVE STOLEN
        assert!(StatsRow::parse_line("1 -1 1.0 1.0 1.0 1.0 1.0 1.0 1.0").is_none());
        // NON-FINITE REAL
        assert!(StatsRow::parse_line("1 0 NaN 1.0 1.0 1.0 1.0 1.0 1.0").is_none());
        assert!(StatsRow::parse_line("1 0 inf 1.0 1.0 1.0 1.0 1.0 1.0").is_none());
    }

    #[test]
    fn first_block_wins() {
        let text = format!("{}{}", SAMPLE, SAMPLE.replace("2178\t", "9999\t"));
        assert_eq!(StatsRow::parse(&text).unwrap().count, 2178);
    }

    #[test]
    fn context_echo() {
        let ctx = ReportContext::parse(SAMPLE);
        assert_eq!(ctx.topology.as_deref(), Some("4"));
        assert_eq!(ctx.get("Cores"), Some("16"));
        assert_eq!(ctx.get("Lambda"), Some("0.021333"));
        assert_eq!(ctx.get("phase_three_ratio"), Some("0.250000"));
        // "Stats collector: Main Stats" HAS A SPACE AFTER THE COLON
        assert!(ctx.get("collector").is_none());
        for key in CONTEXT_KEYS {
            assert!(ctx.get(key).is_some(), "MISSING {}", key);
        }
    }

    #[test]
    fn archive_splits_blocks() {
        let second = SAMPLE
            .replace("Lambda:0.021333", "Lambda:0.426667")
            .replace("2178\t", "42451\t");
        let text = format!("{}{}", SAMPLE, second);
        let records = parse_archive(&text);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].row.unwrap().count, 2178);
        assert_eq!(records[1].row.unwrap().count, 42451);
        assert_eq!(records[1].context.get("Lambda"), Some("0.426667"));
    }

    #[test]
    fn archive_keeps_blocks_without_data() {
        let truncated = "Selected topology: 5\nCores:4\tAccelerators:2\n";
        let text = format!("{}{}", truncated, SAMPLE);
        let records = parse_archive(&text);
        assert_eq!(records.len(), 2);
        assert!(records[0].row.is_none());
        assert_eq!(records[0].context.topology.as_deref(), Some("5"));
        assert!(records[1].row.is_some());
    }
}
