use std::path::PathBuf;

/// How `time_in` / `time_out` are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampMode {
    /// UTC `YYYY-MM-DD HH:MM:SS`.
    #[default]
    Iso,
    /// Raw epoch seconds.
    Unix,
}

/// What happens to a line that is valid JSON but not a usable record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordPolicy {
    /// Log it and move on.
    #[default]
    Skip,
    /// Abort the run.
    Strict,
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub timestamp_mode: TimestampMode,
    pub record_policy: RecordPolicy,
    /// Process files in name order instead of directory listing order.
    pub sort_files: bool,
}

impl BatchConfig {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            timestamp_mode: TimestampMode::default(),
            record_policy: RecordPolicy::default(),
            sort_files: true,
        }
    }
}
