use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Number;

/// One traffic log line as it appears in the input.
///
/// Every field is optional. `cy`, `tz`, `t` and `hc` keep the difference
/// between a missing key (`None`) and an explicit `null` (`Some(None)`).
#[derive(Debug, Default, Deserialize)]
pub struct RawRecord {
    /// User agent, e.g. `"Firefox 99 Linux"`.
    pub a: Option<String>,
    /// Referrer URL.
    pub r: Option<String>,
    /// Target URL.
    pub u: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub cy: Option<Option<String>>,
    /// `[longitude, latitude]`.
    pub ll: Option<Vec<Option<Number>>>,
    #[serde(default, deserialize_with = "present")]
    pub tz: Option<Option<String>>,
    /// Entry time, epoch seconds.
    #[serde(default, deserialize_with = "present")]
    pub t: Option<Option<Number>>,
    /// Exit time, epoch seconds.
    #[serde(default, deserialize_with = "present")]
    pub hc: Option<Option<Number>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Timestamp {
    /// UTC, `YYYY-MM-DD HH:MM:SS`.
    Formatted(String),
    /// Epoch seconds, exactly as read.
    Epoch(Number),
}

/// A flattened row. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRow {
    pub web_browser: Option<String>,
    pub operating_sys: Option<String>,
    pub from_url: String,
    pub to_url: String,
    pub city: Option<String>,
    pub longitude: Option<Number>,
    pub latitude: Option<Number>,
    pub time_zone: Option<String>,
    pub time_in: Option<Timestamp>,
    pub time_out: Option<Timestamp>,
}
