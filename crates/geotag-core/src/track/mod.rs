pub mod csv;
pub mod gpx;

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::error::{GeotagError, Result};
use crate::gps::{is_valid_lat, is_valid_lon};
use crate::ThrottledProgress;

pub use self::csv::{CsvOptions, CsvTimeFormat};

/// A single GPS fix. Coordinates are validated at construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackPoint {
    t_utc: NaiveDateTime,
    lat: f64,
    lon: f64,
}

impl TrackPoint {
    pub fn new(t_utc: NaiveDateTime, lat: f64, lon: f64) -> Result<Self> {
        if !is_valid_lat(lat) || !is_valid_lon(lon) {
            return Err(GeotagError::InvalidTrackPoint(format!(
                "lat={lat}, lon={lon} at {t_utc}"
            )));
        }
        Ok(Self { t_utc, lat, lon })
    }

    /// UTC instant of the fix (zone-naive).
    pub fn time(&self) -> NaiveDateTime {
        self.t_utc
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }
}

/// Time-sorted, read-only view of a track with binary-search lookups.
///
/// Points are sorted with a stable sort, so fixes sharing a timestamp keep
/// their input order: the earliest input index comes first.
#[derive(Debug, Clone)]
pub struct TrackIndex {
    points: Vec<TrackPoint>,
}

/// The fixes on either side of a query time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    /// Last fix strictly before the query
    pub before: Option<TrackPoint>,
    /// First fix at or after the query
    pub after: Option<TrackPoint>,
}

impl TrackIndex {
    pub fn new(mut points: Vec<TrackPoint>) -> Result<Self> {
        if points.is_empty() {
            return Err(GeotagError::EmptyTrack);
        }
        points.sort_by_key(|p| p.t_utc);
        Ok(Self { points })
    }

    /// Lower-bound lookup. Before the first fix: `(None, first)`; after the
    /// last: `(last, None)`; otherwise `before.t < query <= after.t`.
    pub fn bracket(&self, query: NaiveDateTime) -> Bracket {
        let idx = self.points.partition_point(|p| p.t_utc < query);
        Bracket {
            before: idx.checked_sub(1).map(|i| self.points[i]),
            after: self.points.get(idx).copied(),
        }
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false; an index cannot be built from an empty track.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> &TrackPoint {
        &self.points[0]
    }

    pub fn last(&self) -> &TrackPoint {
        &self.points[self.points.len() - 1]
    }

    /// Time covered from the first to the last fix.
    pub fn span(&self) -> TimeDelta {
        self.last().t_utc - self.first().t_utc
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackFormat {
    Gpx,
    Csv,
}

impl TrackFormat {
    /// Guess from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "gpx" => Some(TrackFormat::Gpx),
            "csv" => Some(TrackFormat::Csv),
            _ => None,
        }
    }
}

impl std::str::FromStr for TrackFormat {
    type Err = GeotagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gpx" => Ok(TrackFormat::Gpx),
            "csv" => Ok(TrackFormat::Csv),
            other => Err(GeotagError::Configuration(format!(
                "unsupported track format {other:?} (expected \"gpx\" or \"csv\")"
            ))),
        }
    }
}

/// A timestamp read from a track file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParsedTime {
    /// Carried an explicit offset and has been converted to UTC
    Utc(NaiveDateTime),
    /// No zone information in the text
    Naive(NaiveDateTime),
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
];

const ZONED_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

pub(crate) fn parse_time(s: &str) -> Option<ParsedTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(ParsedTime::Utc(dt.naive_utc()));
    }
    for fmt in ZONED_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(ParsedTime::Utc(dt.naive_utc()));
        }
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(ParsedTime::Naive)
}

/// Read a track file. The format is taken from `format` or, when absent,
/// from the file extension. Returned points are sorted by time.
pub fn read_track(
    path: &Path,
    format: Option<TrackFormat>,
    csv_options: &CsvOptions,
    progress: &ThrottledProgress,
) -> anyhow::Result<Vec<TrackPoint>> {
    let format = match format.or_else(|| TrackFormat::from_path(path)) {
        Some(f) => f,
        None => {
            return Err(GeotagError::Configuration(format!(
                "cannot tell the track format of {}; pass it explicitly",
                path.display()
            ))
            .into())
        }
    };

    let bytes = std::fs::read(path)
        .map_err(|e| anyhow::anyhow!("Failed to read track {}: {e}", path.display()))?;
    let mut points = match format {
        TrackFormat::Gpx => gpx::parse_gpx(&bytes, progress)?,
        TrackFormat::Csv => csv::parse_csv(&String::from_utf8_lossy(&bytes), csv_options, progress)?,
    };
    points.sort_by_key(|p| p.time());
    Ok(points)
}
