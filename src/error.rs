use serde_json::Number;
use thiserror::Error;

/// Why a well-formed JSON line could not become a row.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("invalid field: {0}")]
    InvalidField(#[from] serde_json::Error),

    #[error("missing required timestamp '{0}'")]
    MissingTimestamp(&'static str),

    #[error("'ll' must hold exactly 2 elements, found {0}")]
    BadCoordinates(usize),

    #[error("timestamp {0} is out of range")]
    TimestampOutOfRange(Number),
}
