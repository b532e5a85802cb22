mod batch;
mod config;
mod error;
mod normalizer;
mod output;
mod reader;
mod record;

use anyhow::Result;
use clap::Parser;
use config::{BatchConfig, RecordPolicy, TimestampMode};
use tracing::{debug, trace};

/// Convert line-delimited JSON traffic logs into deduplicated CSV files.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the `.json` input files
    #[arg(short = 'i', long = "input_path")]
    input_path: String,

    /// Existing directory for the `.csv` outputs
    #[arg(short = 'o', long = "output_path")]
    output_path: String,

    /// Keep timestamps as UNIX epoch seconds
    #[arg(short = 'u', long = "unix_timestamp")]
    unix_timestamp: bool,

    /// Abort on the first record error (missing `t`/`hc`, `ll` not of
    /// length 2, wrongly typed field, non-object line, unrepresentable epoch)
    #[arg(long)]
    strict: bool,

    /// Process files in directory listing order
    #[arg(long)]
    unsorted: bool,

    #[arg(long)]
    benchmark: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = BatchConfig {
        timestamp_mode: if args.unix_timestamp {
            TimestampMode::Unix
        } else {
            TimestampMode::Iso
        },
        record_policy: if args.strict {
            RecordPolicy::Strict
        } else {
            RecordPolicy::Skip
        },
        sort_files: !args.unsorted,
        ..BatchConfig::new(&args.input_path, &args.output_path)
    };
    debug!(?config, "starting batch");

    let summary = batch::run(&config)?;

    if args.benchmark {
        print_benchmark_results(&summary);
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2)
        .with_line_number(verbose >= 3)
        .init();

    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());
}

fn print_benchmark_results(summary: &batch::BatchSummary) {
    let duration_secs = summary.elapsed.as_secs_f64();
    let totals = &summary.totals;
    let throughput_lines = totals.lines as f64 / duration_secs;

    eprintln!("\n=== BENCHMARK RESULTS ===");
    eprintln!("Files: {}", summary.files);
    eprintln!("Total lines: {}", totals.lines);
    eprintln!("Malformed lines: {}", totals.skipped_lines);
    eprintln!("Rejected records: {}", totals.rejected_records);
    eprintln!("Duplicate rows: {}", totals.duplicates);
    eprintln!("Rows written: {}", totals.rows);
    eprintln!("Processing time: {:.3}s", duration_secs);
    eprintln!("Throughput: {:.0} lines/s", throughput_lines);
    if totals.lines > 0 {
        eprintln!(
            "Row yield: {:.1}%",
            (totals.rows as f64 / totals.lines as f64) * 100.0
        );
    }
}
