use anyhow::{Context, Result};
use clap::Parser;
use pathprobe::client::{generate_report, init_logging, open_in_browser};
use std::path::PathBuf;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "pathprobe-plot")]
#[command(about = "Render an HTML report from a Pathprobe CSV file")]
struct Args {
    /// CSV file produced by the client
    csv: PathBuf,

    /// Write the report without opening a browser
    #[arg(long)]
    no_open: bool,
}

fn main() {
    let args = Args::parse();
    init_logging();

    if let Err(e) = run(&args) {
        error!(error = %e, "Report generation failed");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let report = generate_report(&args.csv)
        .with_context(|| format!("Failed to render {}", args.csv.display()))?;
    println!("Report written to {}", report.display());
    if !args.no_open {
        open_in_browser(&report);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::try_parse_from(["plot", "run.csv", "--no-open"]).unwrap();
        assert_eq!(args.csv, PathBuf::from("run.csv"));
        assert!(args.no_open);
        assert!(Args::try_parse_from(["plot"]).is_err());
    }
}
