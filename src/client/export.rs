//! CSV export of per-packet records.
//!
//! The plot generator reads columns by header name, so optional columns
//! may come and go without breaking it.

use crate::client::aggregator::PacketRecord;
use crate::client::error::Result;
use chrono::Local;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const NS_PER_MS: i64 = 1_000_000;

/// Which optional columns to emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CsvColumns {
    /// `server_proc_ms` and `net_latency_ms`
    pub server_timing: bool,
    /// `late`
    pub late: bool,
}

impl CsvColumns {
    pub fn header(&self) -> Vec<&'static str> {
        let mut header = vec!["seq", "sent_time", "recv_time", "latency_ms", "lost"];
        if self.server_timing {
            header.extend(["server_proc_ms", "net_latency_ms"]);
        }
        if self.late {
            header.push("late");
        }
        header
    }

    fn row(&self, r: &PacketRecord) -> Vec<String> {
        let mut row = vec![
            r.sequence.0.to_string(),
            (r.sent_time_ns / NS_PER_MS).to_string(),
            (r.recv_time_ns / NS_PER_MS).to_string(),
            format!("{:.2}", r.latency_ms),
            r.lost.to_string(),
        ];
        if self.server_timing {
            row.push(format!("{:.2}", r.server_proc_ms));
            row.push(format!("{:.2}", r.net_latency_ms));
        }
        if self.late {
            row.push(r.late.to_string());
        }
        row
    }
}

/// `packet-test_<local timestamp>.csv` in the working directory
pub fn default_output_path() -> PathBuf {
    PathBuf::from(format!(
        "packet-test_{}.csv",
        Local::now().format("%Y-%m-%d_%H-%M-%S")
    ))
}

/// Write records, ordered by sequence number, as CSV
pub fn write_csv<W: Write>(mut out: W, records: &[PacketRecord], columns: CsvColumns) -> Result<()> {
    let mut sorted = records.to_vec();
    sorted.sort_by_key(|r| r.sequence);

    writeln!(out, "{}", columns.header().join(","))?;
    for record in &sorted {
        writeln!(out, "{}", columns.row(record).join(","))?;
    }
    out.flush()?;
    debug!(rows = sorted.len(), "CSV rows written");
    Ok(())
}

pub fn save_csv(path: &Path, records: &[PacketRecord], columns: CsvColumns) -> Result<()> {
    let file = File::create(path)?;
    write_csv(BufWriter::new(file), records, columns)?;
    info!(path = %path.display(), rows = records.len(), "Results saved");
    Ok(())
}
