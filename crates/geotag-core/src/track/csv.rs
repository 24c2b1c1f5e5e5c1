use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::{parse_time, ParsedTime, TrackPoint};
use crate::date::normalize;
use crate::error::{GeotagError, Result};
use crate::ThrottledProgress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CsvTimeFormat {
    /// A 10-digit integer in the first row means Unix seconds, anything
    /// else a date string
    Auto,
    /// Unix seconds
    Timestamp,
    /// Date string (ISO 8601 or similar)
    Iso,
}

impl std::str::FromStr for CsvTimeFormat {
    type Err = GeotagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(CsvTimeFormat::Auto),
            "timestamp" => Ok(CsvTimeFormat::Timestamp),
            "iso" => Ok(CsvTimeFormat::Iso),
            other => Err(GeotagError::Configuration(format!(
                "unsupported CSV time format {other:?} (expected auto, timestamp or iso)"
            ))),
        }
    }
}

/// Column mapping and time interpretation for CSV tracks.
///
/// Tracking-app exports often use other names, e.g. `dataTime`,
/// `latitude`, `longitude`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    pub time_column: String,
    pub lat_column: String,
    pub lon_column: String,
    pub time_format: CsvTimeFormat,
    /// Whether zone-less date strings are already UTC
    pub time_is_utc: bool,
    /// Offset applied to zone-less date strings when `time_is_utc` is false
    pub tz_offset_hours: f64,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            time_column: "time".to_string(),
            lat_column: "lat".to_string(),
            lon_column: "lon".to_string(),
            time_format: CsvTimeFormat::Auto,
            time_is_utc: true,
            tz_offset_hours: 0.0,
        }
    }
}

/// Parse a CSV track with a header row. Rows that fail to parse are
/// skipped; a missing required column is an error.
pub fn parse_csv(text: &str, options: &CsvOptions, progress: &ThrottledProgress) -> Result<Vec<TrackPoint>> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header_line = lines
        .next()
        .ok_or_else(|| GeotagError::TrackParse("CSV track is empty".to_string()))?;
    let header: Vec<String> = split_record(header_line.trim_start_matches('\u{feff}'))
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect();

    let find = |name: &str| header.iter().position(|h| h == name);
    let required = [&options.time_column, &options.lat_column, &options.lon_column];
    let missing: Vec<&str> = required
        .iter()
        .filter(|name| find(name).is_none())
        .map(|name| name.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(GeotagError::TrackParse(format!(
            "CSV track is missing column(s) {missing:?}; available: {header:?}"
        )));
    }
    // all three were found above
    let (time_idx, lat_idx, lon_idx) = match (
        find(&options.time_column),
        find(&options.lat_column),
        find(&options.lon_column),
    ) {
        (Some(t), Some(la), Some(lo)) => (t, la, lo),
        _ => return Err(GeotagError::TrackParse("CSV header changed while reading".to_string())),
    };

    let rows: Vec<Vec<String>> = lines.map(split_record).collect();
    let format = match options.time_format {
        CsvTimeFormat::Auto => detect_time_format(rows.first().and_then(|r| r.get(time_idx))),
        explicit => explicit,
    };

    let total = rows.len() as u64;
    let mut points = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;
    for (n, row) in rows.iter().enumerate() {
        let point = (|| {
            let t = parse_row_time(row.get(time_idx)?, format, options)?;
            let lat = row.get(lat_idx)?.trim().parse::<f64>().ok()?;
            let lon = row.get(lon_idx)?.trim().parse::<f64>().ok()?;
            TrackPoint::new(t, lat, lon).ok()
        })();
        match point {
            Some(p) => points.push(p),
            None => skipped += 1,
        }
        if (n + 1) % 1000 == 0 {
            progress.report("track", n as u64 + 1, total, "Reading CSV rows");
        }
    }

    if skipped > 0 {
        tracing::debug!(skipped, "CSV rows without usable time or coordinates");
    }
    if points.is_empty() {
        return Err(GeotagError::EmptyTrack);
    }
    progress.report("track", total, total, &format!("Read {} CSV points", points.len()));
    Ok(points)
}

fn detect_time_format(sample: Option<&String>) -> CsvTimeFormat {
    match sample.map(|s| s.trim()) {
        Some(s) if s.len() == 10 && s.bytes().all(|b| b.is_ascii_digit()) => CsvTimeFormat::Timestamp,
        _ => CsvTimeFormat::Iso,
    }
}

fn parse_row_time(value: &str, format: CsvTimeFormat, options: &CsvOptions) -> Option<NaiveDateTime> {
    let value = value.trim();
    match format {
        CsvTimeFormat::Timestamp => parse_unix_seconds(value),
        CsvTimeFormat::Iso | CsvTimeFormat::Auto => match parse_time(value)? {
            ParsedTime::Utc(t) => Some(t),
            ParsedTime::Naive(t) if options.time_is_utc => Some(t),
            ParsedTime::Naive(t) => Some(normalize(t, options.tz_offset_hours, 0.0)),
        },
    }
}

fn parse_unix_seconds(value: &str) -> Option<NaiveDateTime> {
    if let Ok(secs) = value.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc());
    }
    let secs = value.parse::<f64>().ok().filter(|s| s.is_finite())?;
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos).map(|dt| dt.naive_utc())
}

/// Split one CSV record. Handles double-quoted fields with `""` escapes.
fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}
