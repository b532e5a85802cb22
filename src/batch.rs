use crate::config::{BatchConfig, RecordPolicy};
use crate::{normalizer, output, reader};
use anyhow::{anyhow, bail, Context, Result};
use crossbeam::channel::{unbounded, Sender};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

const INPUT_SUFFIX: &str = ".json";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FileStats {
    pub lines: usize,
    pub skipped_lines: usize,
    pub rejected_records: usize,
    pub duplicates: usize,
    pub rows: usize,
}

impl FileStats {
    fn add(&mut self, other: &FileStats) {
        self.lines += other.lines;
        self.skipped_lines += other.skipped_lines;
        self.rejected_records += other.rejected_records;
        self.duplicates += other.duplicates;
        self.rows += other.rows;
    }
}

#[derive(Debug)]
pub struct FileReport {
    pub file_name: String,
    pub destination: PathBuf,
    pub stats: FileStats,
}

#[derive(Debug)]
pub struct BatchSummary {
    pub files: usize,
    pub totals: FileStats,
    pub elapsed: Duration,
}

/// Convert every `.json` file in the input directory to CSV.
pub fn run(config: &BatchConfig) -> Result<BatchSummary> {
    let start_time = Instant::now();

    if !config.output_dir.is_dir() {
        bail!("Output directory does not exist: {}", config.output_dir.display());
    }
    let files = list_input_files(&config.input_dir, config.sort_files)?;
    info!(count = files.len(), dir = %config.input_dir.display(), "found input files");

    // reports funnel into one thread so console lines never interleave
    let (tx, rx) = unbounded::<FileReport>();
    let reporter = std::thread::spawn(move || {
        let mut done = 0;
        let mut totals = FileStats::default();
        for report in rx {
            println!(
                "File {} transformed with {} rows and saved to {}",
                report.file_name,
                report.stats.rows,
                report.destination.display()
            );
            done += 1;
            totals.add(&report.stats);
        }
        (done, totals)
    });

    let result = process_all(&files, config, &tx);
    drop(tx);
    let (files, totals) = reporter
        .join()
        .map_err(|_| anyhow!("Reporter thread panicked"))?;
    result?;

    let elapsed = start_time.elapsed();
    println!("Total execution time: {} seconds", elapsed.as_secs_f64());

    Ok(BatchSummary {
        files,
        totals,
        elapsed,
    })
}

#[cfg(not(feature = "parallel"))]
fn process_all(files: &[PathBuf], config: &BatchConfig, tx: &Sender<FileReport>) -> Result<()> {
    for path in files {
        let report = process_file(path, config)?;
        tx.send(report)?;
    }
    Ok(())
}

#[cfg(feature = "parallel")]
fn process_all(files: &[PathBuf], config: &BatchConfig, tx: &Sender<FileReport>) -> Result<()> {
    files.par_iter().try_for_each(|path| {
        let report = process_file(path, config)?;
        tx.send(report)?;
        Ok(())
    })
}

/// Parse, map, dedup and write a single file.
pub fn process_file(path: &Path, config: &BatchConfig) -> Result<FileReport> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("Not a file path: {}", path.display()))?;

    let parsed = reader::read_records(path)?;
    let mut stats = FileStats {
        lines: parsed.lines,
        skipped_lines: parsed.skipped,
        ..FileStats::default()
    };

    let mut rows = Vec::with_capacity(parsed.records.len());
    for (line_no, value) in parsed.records {
        match normalizer::normalize(value, config.timestamp_mode) {
            Ok(row) => rows.push(row),
            Err(err) => match config.record_policy {
                RecordPolicy::Strict => {
                    return Err(err)
                        .with_context(|| format!("Invalid record in {} line {}", path.display(), line_no));
                }
                RecordPolicy::Skip => {
                    warn!("Skipping record in {} line {}: {}", path.display(), line_no, err);
                    stats.rejected_records += 1;
                }
            },
        }
    }

    let mapped = rows.len();
    let rows = normalizer::dedup_rows(rows);
    stats.duplicates = mapped - rows.len();
    stats.rows = rows.len();

    let destination = config.output_dir.join(output_name(&file_name));
    let mut writer = output::create_writer(&destination)?;
    writer.write_batch(&rows)?;
    writer.finish()?;

    debug!(file = %file_name, ?stats, "file done");
    Ok(FileReport {
        file_name,
        destination,
        stats,
    })
}

/// `<stem>.csv` for `<stem>.json`.
fn output_name(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    format!("{stem}.csv")
}

/// Non-recursive listing of regular files ending in `.json`.
pub fn list_input_files(dir: &Path, sort: bool) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Cannot read input directory: {}", dir.display()))?;

    let mut files: Vec<(OsString, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Cannot read input directory: {}", dir.display()))?;
        let name = entry.file_name();
        if !name.to_string_lossy().ends_with(INPUT_SUFFIX) {
            continue;
        }
        let path = entry.path();
        if path.is_file() {
            files.push((name, path));
        }
    }

    if sort {
        files.sort_by(|a, b| a.0.cmp(&b.0));
    }
    Ok(files.into_iter().map(|(_, path)| path).collect())
}
