//! Offline dissector: runs the histogram-stream decoder over a captured raw
//! blob and reports per-camera rows plus resync/error counters, the same way
//! `data-processing/parse_data_v2.py`'s `process_bin_file` turned a capture
//! into a CSV for offline analysis.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;

use motion_host::histogram::{self, HistogramRecord};

#[derive(Parser)]
#[command(name = "motion-dissect", about = "Dissect a captured histogram-stream blob into a CSV")]
struct Cli {
    /// Path to the raw capture file.
    input: PathBuf,

    /// Where to write the decoded CSV. Defaults to `<input>.csv`.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print every skipped byte range during resynchronization.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let output = cli.output.clone().unwrap_or_else(|| cli.input.with_extension("csv"));

    let data = fs::read(&cli.input).with_context(|| format!("reading {}", cli.input.display()))?;
    let report = histogram::parse_histogram_stream(&data);

    write_csv(&output, &report.records).with_context(|| format!("writing {}", output.display()))?;

    if cli.verbose {
        for (start, end) in &report.skipped_ranges {
            println!("{} bytes [{start}, {end})", "resync".yellow());
        }
    }

    println!(
        "{}: {} ok, {} crc failures, {} parse failures, {} other failures, {} rows",
        cli.input.display(),
        report.ok.to_string().green(),
        report.crc_failures.to_string().red(),
        report.parse_failures.to_string().red(),
        report.other_failures.to_string().red(),
        report.records.len(),
    );

    if report.crc_failures + report.parse_failures + report.other_failures > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn write_csv(path: &PathBuf, records: &[HistogramRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["cam_id".to_string(), "frame_id".to_string()];
    header.extend((0..histogram::HISTO_BINS).map(|i| i.to_string()));
    header.push("temperature".to_string());
    header.push("sum".to_string());
    writer.write_record(&header)?;

    for record in records {
        let mut row = vec![record.camera_id.to_string(), record.frame_id.to_string()];
        row.extend(record.bins.iter().map(|b| b.to_string()));
        row.push(record.temperature_c.to_string());
        row.push(record.row_sum.to_string());
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}
