use crate::config::TimestampMode;
use crate::error::RecordError;
use crate::record::{OutputRow, RawRecord, Timestamp};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::{Number, Value};
use std::collections::HashSet;
use std::sync::LazyLock;

static UNKNOWN: &str = "Unknown";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// optional `scheme:` then `//authority`
static NETLOC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z][A-Za-z0-9+.\-]*:)?//([^/?#]*)").expect("static regex")
});

/// Turn one parsed JSON line into a row.
pub fn normalize(value: Value, mode: TimestampMode) -> Result<OutputRow, RecordError> {
    if !value.is_object() {
        return Err(RecordError::NotAnObject);
    }
    let record: RawRecord = serde_json::from_value(value)?;
    map_record(record, mode)
}

pub fn map_record(record: RawRecord, mode: TimestampMode) -> Result<OutputRow, RecordError> {
    let t = record.t.ok_or(RecordError::MissingTimestamp("t"))?;
    let hc = record.hc.ok_or(RecordError::MissingTimestamp("hc"))?;

    let (web_browser, operating_sys) = record
        .a
        .as_deref()
        .map(split_user_agent)
        .unwrap_or_default();

    let (longitude, latitude) = match record.ll {
        None => (None, None),
        Some(ll) => {
            let len = ll.len();
            let mut it = ll.into_iter();
            match (it.next(), it.next(), it.next()) {
                (Some(lon), Some(lat), None) => (lon, lat),
                _ => return Err(RecordError::BadCoordinates(len)),
            }
        }
    };

    Ok(OutputRow {
        web_browser,
        operating_sys,
        from_url: extract_domain(record.r.as_deref().unwrap_or("")),
        to_url: extract_domain(record.u.as_deref().unwrap_or("")),
        city: record.cy.unwrap_or_else(|| Some(UNKNOWN.to_string())),
        longitude,
        latitude,
        time_zone: record.tz.unwrap_or_else(|| Some(UNKNOWN.to_string())),
        time_in: convert_timestamp(t.as_ref(), mode)?,
        time_out: convert_timestamp(hc.as_ref(), mode)?,
    })
}

/// First two whitespace tokens of the user agent, or nothing.
pub fn split_user_agent(agent: &str) -> (Option<String>, Option<String>) {
    let mut tokens = agent.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some(browser), Some(os)) => (Some(browser.to_string()), Some(os.to_string())),
        _ => (None, None),
    }
}

/// Host/authority part of a URL, cut at the first `/`.
pub fn extract_domain(url: &str) -> String {
    let url = url.trim_start_matches(|c: char| c <= ' ');
    let netloc = NETLOC
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map_or("", |m| m.as_str());
    netloc.split('/').next().unwrap_or_default().to_string()
}

/// Zero, null and absent all map to no timestamp.
pub fn convert_timestamp(
    epoch: Option<&Number>,
    mode: TimestampMode,
) -> Result<Option<Timestamp>, RecordError> {
    let Some(epoch) = epoch else {
        return Ok(None);
    };
    if epoch.as_f64() == Some(0.0) {
        return Ok(None);
    }

    match mode {
        TimestampMode::Unix => Ok(Some(Timestamp::Epoch(epoch.clone()))),
        TimestampMode::Iso => {
            let out_of_range = || RecordError::TimestampOutOfRange(epoch.clone());
            let secs = match epoch.as_i64() {
                Some(secs) => secs,
                None => {
                    let secs = epoch.as_f64().ok_or_else(out_of_range)?.floor();
                    if !secs.is_finite() || secs < i64::MIN as f64 || secs >= i64::MAX as f64 {
                        return Err(out_of_range());
                    }
                    secs as i64
                }
            };
            let datetime = DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(out_of_range)?;
            Ok(Some(Timestamp::Formatted(datetime.format(TIME_FORMAT).to_string())))
        }
    }
}

/// Drop rows equal to an earlier row, keeping order.
///
/// Numbers compare by value, so `2` and `2.0` are the same coordinate or
/// epoch. The first row's spelling is the one written out.
pub fn dedup_rows(rows: Vec<OutputRow>) -> Vec<OutputRow> {
    let keep: Vec<bool> = {
        let mut seen = HashSet::with_capacity(rows.len());
        rows.iter().map(|row| seen.insert(RowKey::of(row))).collect()
    };
    rows.into_iter()
        .zip(keep)
        .filter_map(|(row, keep)| keep.then_some(row))
        .collect()
}

#[derive(PartialEq, Eq, Hash)]
enum TimeKey<'a> {
    Formatted(&'a str),
    Epoch(u64),
}

#[derive(PartialEq, Eq, Hash)]
struct RowKey<'a> {
    web_browser: Option<&'a str>,
    operating_sys: Option<&'a str>,
    from_url: &'a str,
    to_url: &'a str,
    city: Option<&'a str>,
    longitude: Option<u64>,
    latitude: Option<u64>,
    time_zone: Option<&'a str>,
    time_in: Option<TimeKey<'a>>,
    time_out: Option<TimeKey<'a>>,
}

impl<'a> RowKey<'a> {
    fn of(row: &'a OutputRow) -> Self {
        let time = |ts: &'a Option<Timestamp>| {
            ts.as_ref().map(|ts| match ts {
                Timestamp::Formatted(s) => TimeKey::Formatted(s),
                Timestamp::Epoch(n) => TimeKey::Epoch(number_bits(n)),
            })
        };
        Self {
            web_browser: row.web_browser.as_deref(),
            operating_sys: row.operating_sys.as_deref(),
            from_url: &row.from_url,
            to_url: &row.to_url,
            city: row.city.as_deref(),
            longitude: row.longitude.as_ref().map(number_bits),
            latitude: row.latitude.as_ref().map(number_bits),
            time_zone: row.time_zone.as_deref(),
            time_in: time(&row.time_in),
            time_out: time(&row.time_out),
        }
    }
}

fn number_bits(n: &Number) -> u64 {
    match n.as_f64() {
        // -0.0 == 0.0
        Some(f) if f == 0.0 => 0.0f64.to_bits(),
        Some(f) => f.to_bits(),
        None => u64::MAX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "a": "Firefox 99 Linux",
            "r": "https://ref.example/x",
            "u": "https://dst.example/y",
            "cy": "Paris",
            "ll": [2.35, 48.85],
            "tz": "Europe/Paris",
            "t": 1700000000,
            "hc": 1700000100
        })
    }

    fn formatted(s: &str) -> Option<Timestamp> {
        Some(Timestamp::Formatted(s.to_string()))
    }

    #[test]
    fn maps_full_record() {
        let row = normalize(sample(), TimestampMode::Iso).unwrap();
        assert_eq!(row.web_browser.as_deref(), Some("Firefox"));
        assert_eq!(row.operating_sys.as_deref(), Some("99"));
        assert_eq!(row.from_url, "ref.example");
        assert_eq!(row.to_url, "dst.example");
        assert_eq!(row.city.as_deref(), Some("Paris"));
        assert_eq!(row.longitude.unwrap().as_f64(), Some(2.35));
        assert_eq!(row.latitude.unwrap().as_f64(), Some(48.85));
        assert_eq!(row.time_zone.as_deref(), Some("Europe/Paris"));
        assert_eq!(row.time_in, formatted("2023-11-14 22:13:20"));
        assert_eq!(row.time_out, formatted("2023-11-14 22:15:00"));
    }

    #[test]
    fn unix_mode_passes_epoch_through() {
        let row = normalize(sample(), TimestampMode::Unix).unwrap();
        assert_eq!(row.time_in, Some(Timestamp::Epoch(Number::from(1700000000u64))));
        assert_eq!(row.time_out, Some(Timestamp::Epoch(Number::from(1700000100u64))));
    }

    #[test]
    fn user_agent_takes_first_two_tokens() {
        assert_eq!(
            split_user_agent("Chrome 1.0 Windows 10"),
            (Some("Chrome".to_string()), Some("1.0".to_string()))
        );
        assert_eq!(split_user_agent("curl"), (None, None));
        assert_eq!(split_user_agent("  "), (None, None));
    }

    #[test]
    fn domain_extraction() {
        assert_eq!(extract_domain("https://example.com/path?query"), "example.com");
        assert_eq!(extract_domain(""), "");
        assert_eq!(extract_domain("http://user@host.example:8080"), "user@host.example:8080");
        assert_eq!(extract_domain("//cdn.example/lib.js"), "cdn.example");
        assert_eq!(extract_domain("https://q.example?x=/y"), "q.example");
        assert_eq!(extract_domain("example.com/path"), "");
    }

    #[test]
    fn defaults_for_missing_fields() {
        let row = normalize(json!({"t": 1700000000, "hc": 0}), TimestampMode::Iso).unwrap();
        assert_eq!(row.web_browser, None);
        assert_eq!(row.from_url, "");
        assert_eq!(row.city.as_deref(), Some("Unknown"));
        assert_eq!(row.time_zone.as_deref(), Some("Unknown"));
        assert_eq!(row.longitude, None);
        assert_eq!(row.latitude, None);
        assert_eq!(row.time_out, None);
    }

    #[test]
    fn null_city_stays_empty() {
        let row = normalize(json!({"cy": null, "t": 1, "hc": null}), TimestampMode::Iso).unwrap();
        assert_eq!(row.city, None);
        assert_eq!(row.time_in, formatted("1970-01-01 00:00:01"));
        assert_eq!(row.time_out, None);
    }

    #[test]
    fn fractional_epoch_is_truncated() {
        let n = Number::from_f64(1700000000.9).unwrap();
        assert_eq!(
            convert_timestamp(Some(&n), TimestampMode::Iso).unwrap(),
            formatted("2023-11-14 22:13:20")
        );
        let zero = Number::from_f64(0.0).unwrap();
        assert_eq!(convert_timestamp(Some(&zero), TimestampMode::Unix).unwrap(), None);
    }

    #[test]
    fn rejects_bad_records() {
        let missing = normalize(json!({"t": 1}), TimestampMode::Iso);
        assert!(matches!(missing, Err(RecordError::MissingTimestamp("hc"))));

        let ll = normalize(json!({"t": 1, "hc": 2, "ll": [1.0]}), TimestampMode::Iso);
        assert!(matches!(ll, Err(RecordError::BadCoordinates(1))));

        let typed = normalize(json!({"t": 1, "hc": 2, "a": 5}), TimestampMode::Iso);
        assert!(matches!(typed, Err(RecordError::InvalidField(_))));

        let array = normalize(json!([1, 2]), TimestampMode::Iso);
        assert!(matches!(array, Err(RecordError::NotAnObject)));

        let huge = normalize(json!({"t": 1e300, "hc": 2}), TimestampMode::Iso);
        assert!(matches!(huge, Err(RecordError::TimestampOutOfRange(_))));
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let a = normalize(sample(), TimestampMode::Iso).unwrap();
        let mut b = a.clone();
        b.city = None;
        let rows = dedup_rows(vec![a.clone(), b.clone(), a.clone(), b.clone()]);
        assert_eq!(rows, vec![a, b]);
    }

    #[test]
    fn dedup_compares_numbers_by_value() {
        let ints = normalize(
            json!({"t": 1700000000, "hc": 1700000100, "ll": [2, 48]}),
            TimestampMode::Unix,
        )
        .unwrap();
        let floats = normalize(
            json!({"t": 1700000000.0, "hc": 1700000100, "ll": [2.0, 48.0]}),
            TimestampMode::Unix,
        )
        .unwrap();
        assert_ne!(ints, floats);

        let rows = dedup_rows(vec![ints.clone(), floats]);
        assert_eq!(rows, vec![ints]);
        assert_eq!(rows[0].longitude, Some(Number::from(2)));

        let moved = normalize(
            json!({"t": 1700000000, "hc": 1700000100, "ll": [2.5, 48]}),
            TimestampMode::Unix,
        )
        .unwrap();
        assert_eq!(dedup_rows(vec![rows[0].clone(), moved]).len(), 2);
    }
}
