//! HTML report generation from an exported CSV file.
//!
//! The report is a pure function of the CSV text. Columns are located by
//! header name; `seq`, `recv_time`, `latency_ms` and `lost` are required,
//! `net_latency_ms` and `server_proc_ms` are optional.

use crate::client::constants::{MIN_LOSS_WINDOW, PLOT_SLOW_LATENCY_MS, THROUGHPUT_BUCKET_MS};
use crate::client::error::{ClientError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const TEMPLATE: &str = include_str!("assets/report.html");

/// One CSV row as fed to the charts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotPoint {
    pub seq: u64,
    #[serde(rename = "recvTime")]
    pub recv_time_ms: i64,
    pub latency: f64,
    pub net: Option<f64>,
    pub server: Option<f64>,
    pub lost: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThroughputPoint {
    /// Seconds since the first echo, one decimal
    pub time: String,
    pub pps: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LossPoint {
    /// Sequence position at the middle of the window
    pub seq: u64,
    pub loss: f64,
}

/// Headline numbers shown above the charts
#[derive(Debug, Clone, PartialEq)]
pub struct ReportTotals {
    pub total: usize,
    pub lost: usize,
    pub loss_percent: f64,
    pub avg_latency: f64,
    pub max_latency: f64,
    pub avg_net: Option<f64>,
    pub avg_server: Option<f64>,
}

struct Columns {
    seq: usize,
    recv_time: usize,
    latency: usize,
    lost: usize,
    net: Option<usize>,
    server: Option<usize>,
}

impl Columns {
    fn from_header(header: &str) -> Result<Self> {
        let index: HashMap<&str, usize> = header
            .split(',')
            .enumerate()
            .map(|(i, name)| (name.trim(), i))
            .collect();
        let required = |name: &str| {
            index
                .get(name)
                .copied()
                .ok_or_else(|| ClientError::Report(format!("CSV missing required column: {}", name)))
        };

        Ok(Self {
            seq: required("seq")?,
            recv_time: required("recv_time")?,
            latency: required("latency_ms")?,
            lost: required("lost")?,
            net: index.get("net_latency_ms").copied(),
            server: index.get("server_proc_ms").copied(),
        })
    }

    fn has_net(&self) -> bool {
        self.net.is_some()
    }

    fn has_server(&self) -> bool {
        self.server.is_some()
    }

    /// Parse a data row; rows missing a required field are skipped
    fn parse(&self, line: &str) -> Option<PlotPoint> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let field = |i: usize| fields.get(i).copied();
        let optional = |i: Option<usize>| i.and_then(field).and_then(|v| v.parse::<f64>().ok());

        Some(PlotPoint {
            seq: field(self.seq)?.parse().ok()?,
            recv_time_ms: field(self.recv_time)?.parse().unwrap_or(0),
            latency: field(self.latency)?.parse().unwrap_or(0.0),
            lost: field(self.lost)? == "true",
            net: optional(self.net),
            server: optional(self.server),
        })
    }
}

/// Parse CSV text into chart points
pub fn parse_csv(csv_text: &str) -> Result<(Vec<PlotPoint>, bool, bool)> {
    let mut lines = csv_text.lines().filter(|l| !l.trim().is_empty());
    let header = lines
        .next()
        .ok_or_else(|| ClientError::Report("CSV file is empty or has no data rows".into()))?;
    let columns = Columns::from_header(header)?;

    let points: Vec<PlotPoint> = lines.filter_map(|l| columns.parse(l)).collect();
    if points.is_empty() {
        return Err(ClientError::Report("CSV file is empty or has no data rows".into()));
    }
    debug!(rows = points.len(), "CSV parsed");
    Ok((points, columns.has_net(), columns.has_server()))
}

pub fn totals(points: &[PlotPoint], has_net: bool, has_server: bool) -> ReportTotals {
    let received: Vec<&PlotPoint> = points.iter().filter(|p| !p.lost).collect();
    let lost = points.len() - received.len();
    let count = received.len() as f64;

    let avg_of = |f: fn(&PlotPoint) -> Option<f64>| {
        (!received.is_empty()).then(|| received.iter().filter_map(|p| f(p)).sum::<f64>() / count)
    };

    ReportTotals {
        total: points.len(),
        lost,
        loss_percent: if points.is_empty() {
            0.0
        } else {
            lost as f64 / points.len() as f64 * 100.0
        },
        avg_latency: avg_of(|p| Some(p.latency)).unwrap_or(0.0),
        max_latency: received.iter().map(|p| p.latency).fold(0.0, f64::max),
        avg_net: if has_net { avg_of(|p| p.net) } else { None },
        avg_server: if has_server { avg_of(|p| p.server) } else { None },
    }
}

/// Received packets per second over fixed buckets of receive time
pub fn throughput_series(points: &[PlotPoint], bucket_ms: i64) -> Vec<ThroughputPoint> {
    let times: Vec<i64> = points
        .iter()
        .filter(|p| !p.lost && p.recv_time_ms > 0)
        .map(|p| p.recv_time_ms)
        .collect();
    let (Some(&min), Some(&max)) = (times.iter().min(), times.iter().max()) else {
        return Vec::new();
    };

    let mut series = Vec::new();
    let mut start = min;
    while start < max {
        let end = start + bucket_ms;
        let count = times.iter().filter(|&&t| t >= start && t < end).count();
        series.push(ThroughputPoint {
            time: format!("{:.1}", (start - min) as f64 / 1000.0),
            pps: count as f64 / bucket_ms as f64 * 1000.0,
        });
        start = end;
    }
    series
}

/// Loss percentage over consecutive windows in sequence order
pub fn loss_series(points: &[PlotPoint]) -> Vec<LossPoint> {
    let mut sorted: Vec<&PlotPoint> = points.iter().collect();
    sorted.sort_by_key(|p| p.seq);
    let window = MIN_LOSS_WINDOW.max(sorted.len() / 100);

    sorted
        .chunks(window)
        .enumerate()
        .map(|(i, chunk)| LossPoint {
            seq: (i * window + window / 2) as u64,
            loss: chunk.iter().filter(|p| p.lost).count() as f64 / chunk.len() as f64 * 100.0,
        })
        .collect()
}

fn format_avg(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{:.1}ms", v))
}

/// Render the complete HTML report for a CSV export
pub fn render_report(csv_text: &str) -> Result<String> {
    let (mut points, has_net, has_server) = parse_csv(csv_text)?;
    points.sort_by_key(|p| p.seq);

    let totals = totals(&points, has_net, has_server);
    let throughput = throughput_series(&points, THROUGHPUT_BUCKET_MS);
    let loss = loss_series(&points);

    Ok(TEMPLATE
        .replace("{{TOTAL_PACKETS}}", &totals.total.to_string())
        .replace("{{LOSS_PERCENT}}", &format!("{:.2}", totals.loss_percent))
        .replace("{{AVG_LATENCY}}", &format!("{:.1}", totals.avg_latency))
        .replace("{{MAX_LATENCY}}", &format!("{:.1}", totals.max_latency))
        .replace("{{AVG_NET_LATENCY}}", &format_avg(totals.avg_net))
        .replace("{{AVG_SERVER_PROC}}", &format_avg(totals.avg_server))
        .replace("{{SLOW_LATENCY_MS}}", &PLOT_SLOW_LATENCY_MS.to_string())
        .replace("{{DATA_JSON}}", &serde_json::to_string(&points)?)
        .replace("{{THROUGHPUT_JSON}}", &serde_json::to_string(&throughput)?)
        .replace("{{LOSS_JSON}}", &serde_json::to_string(&loss)?))
}

/// Write `<name>.html` next to the CSV and return its path
pub fn generate_report(csv_path: &Path) -> Result<PathBuf> {
    let csv_text = fs::read_to_string(csv_path).map_err(|e| {
        ClientError::Report(format!("Failed to open CSV {}: {}", csv_path.display(), e))
    })?;
    let html = render_report(&csv_text)?;

    let html_path = csv_path.with_extension("html");
    fs::write(&html_path, html)?;
    info!(path = %html_path.display(), "Report generated");
    Ok(html_path)
}
