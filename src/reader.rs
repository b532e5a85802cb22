use anyhow::{Context, Result};
use memchr::memchr2_iter;
use memmap2::Mmap;
use serde_json::Value;
use std::fs::File;
use std::path::Path;
use tracing::{debug, warn};

/// Records of one input file, in file order.
#[derive(Debug, Default)]
pub struct ParsedFile {
    /// `(1-based line number, record)`
    pub records: Vec<(usize, Value)>,
    pub lines: usize,
    /// Lines that were not valid JSON.
    pub skipped: usize,
}

pub fn read_records(path: &Path) -> Result<ParsedFile> {
    let file = File::open(path).with_context(|| format!("Cannot open input file: {}", path.display()))?;
    let len = file
        .metadata()
        .with_context(|| format!("Cannot stat input file: {}", path.display()))?
        .len();

    let mut parsed = ParsedFile::default();
    // zero-length maps are rejected on some platforms
    if len == 0 {
        return Ok(parsed);
    }

    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("Cannot map input file: {}", path.display()))?;
    parse_chunk(&mmap, path, &mut parsed);

    debug!(
        file = %path.display(),
        lines = parsed.lines,
        records = parsed.records.len(),
        skipped = parsed.skipped,
        "read input file"
    );
    Ok(parsed)
}

// `\n`, `\r\n` and a lone `\r` all end a line
fn parse_chunk(bytes: &[u8], path: &Path, out: &mut ParsedFile) {
    let mut start = 0;
    for pos in memchr2_iter(b'\n', b'\r', bytes) {
        // second half of a `\r\n` pair
        if pos < start {
            continue;
        }
        parse_line(&bytes[start..pos], path, out);
        start = pos + 1;
        if bytes[pos] == b'\r' && bytes.get(pos + 1) == Some(&b'\n') {
            start += 1;
        }
    }
    if start < bytes.len() {
        parse_line(&bytes[start..], path, out);
    }
}

fn parse_line(line: &[u8], path: &Path, out: &mut ParsedFile) {
    out.lines += 1;
    match serde_json::from_slice::<Value>(line) {
        Ok(value) => out.records.push((out.lines, value)),
        Err(err) => {
            warn!("Error decoding JSON in {} line {}: {}", path.display(), out.lines, err);
            out.skipped += 1;
        }
    }
}
