// XMPSWEEP TSV WRITER
// ONE ROW PER RECORD: ECHOED CONTEXT COLUMNS, THEN THE NINE METRICS.
// MISSING VALUES ARE EMPTY CELLS.

use std::io::{self, Write};

use crate::report::{ReportRecord, CONTEXT_KEYS, METRIC_COLUMNS};

pub fn header() -> Vec<&'static str> {
    let mut cols = vec!["topology"];
    cols.extend(CONTEXT_KEYS);
    cols.extend(METRIC_COLUMNS);
    cols
}

fn cells(record: &ReportRecord) -> Vec<String> {
    let ctx = &record.context;
    let mut out = Vec::with_capacity(header().len());
    out.push(ctx.topology.clone().unwrap_or_default());
    for key in CONTEXT_KEYS {
        out.push(ctx.get(key).unwrap_or_default().to_string());
    }
    match &record.row {
        Some(row) => out.extend(row.cells()),
        None => out.extend(METRIC_COLUMNS.iter().map(|_| String::new())),
    }
    out
}

pub fn write_records<W: Write>(w: &mut W, records: &[ReportRecord]) -> io::Result<()> {
    writeln!(w, "{}", header().join("\t"))?;
    for record in records {
        writeln!(w, "{}", cells(record).join("\t"))?;
    }
    w.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::parse_archive;

    #[test]
    fn header_matches_results_layout() {
        assert_eq!(
            header().join(" "),
            "topology Cores Accelerators Mu Lambda axCoreQueueSize axCoreSpeedup genType \
             phase_one_ratio phase_two_ratio phase_three_ratio Count Stolen AVG STDDev \
             50th 90th 95th 99th Reqs/time_unit"
        );
    }

    #[test]
    fn writes_one_line_per_record() {
        let text = "Selected topology: 4\n\
Cores:16\tAccelerators:8\tMu:0.100000\tLambda:0.021333\n\
2178\t0\t7.5\t10.4\t5.1\t17.6\t23.0\t36.7\t0.0217\n\
Selected topology: 4\n\
Cores:16\n";
        let mut buf = Vec::new();
        write_records(&mut buf, &parse_archive(text)).unwrap();
        let out = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);

        let first: Vec<&str> = lines[1].split('\t').collect();
        assert_eq!(first.len(), 20);
        assert_eq!(first[0], "4");
        assert_eq!(first[1], "16");
        assert_eq!(first[4], "0.021333");
        // axCoreQueueSize NOT ECHOED
        assert_eq!(first[5], "");
        assert_eq!(first[11], "2178");
        assert_eq!(first[13], "7.5");

        // BLOCK WITHOUT DATA: EMPTY METRIC CELLS
        let second: Vec<&str> = lines[2].split('\t').collect();
        assert_eq!(second.len(), 20);
        assert!(second[11..].iter().all(|c| c.is_empty()));
    }
}
