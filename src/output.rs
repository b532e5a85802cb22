use crate::record::OutputRow;
use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;

pub const HEADER: [&str; 10] = [
    "web_browser",
    "operating_sys",
    "from_url",
    "to_url",
    "city",
    "longitude",
    "latitude",
    "time_zone",
    "time_in",
    "time_out",
];

/// CSV sink. The header is written on construction so an empty table still
/// produces a valid file.
pub struct Writer<W: Write> {
    inner: csv::Writer<W>,
}

impl<W: Write> Writer<W> {
    pub fn new(sink: W) -> Result<Self> {
        let mut inner = csv::WriterBuilder::new().has_headers(false).from_writer(sink);
        inner.write_record(HEADER)?;
        Ok(Self { inner })
    }

    pub fn write_batch(&mut self, rows: &[OutputRow]) -> Result<()> {
        for row in rows {
            self.inner.serialize(row)?;
        }
        Ok(())
    }

    pub fn finish(self) -> Result<W> {
        self.inner
            .into_inner()
            .map_err(|err| anyhow!("Failed to flush CSV output: {}", err.error()))
    }
}

pub fn create_writer(path: &Path) -> Result<Writer<File>> {
    let file = File::create(path)
        .with_context(|| format!("Cannot create output file: {}", path.display()))?;
    Writer::new(file)
}
