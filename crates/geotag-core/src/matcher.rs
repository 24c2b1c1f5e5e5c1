use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::date::normalize::{validate_camera_offset, validate_tz_offset};
use crate::date::{normalize, seconds_between};
use crate::error::{GeotagError, Result};
use crate::gps::{check_range, haversine_distance};
use crate::photo::{PhotoRecord, PhotoStatus};
use crate::track::{TrackIndex, TrackPoint};
use crate::ThrottledProgress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum MatchMethod {
    /// Coordinates of the closest track point in time
    Nearest,
    /// Straight-line blend of the two bracketing track points
    #[default]
    Interp,
}

impl MatchMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchMethod::Nearest => "nearest",
            MatchMethod::Interp => "interp",
        }
    }
}

impl std::fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MatchMethod {
    type Err = GeotagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(MatchMethod::Nearest),
            "interp" => Ok(MatchMethod::Interp),
            _ => Err(GeotagError::InvalidMethod(s.to_string())),
        }
    }
}

impl TryFrom<String> for MatchMethod {
    type Error = GeotagError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Matched,
    Unmatched,
    TooFar,
    AlreadyGps,
    NoTime,
    WriteFailed,
}

impl MatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Matched => "matched",
            MatchStatus::Unmatched => "unmatched",
            MatchStatus::TooFar => "too_far",
            MatchStatus::AlreadyGps => "already_gps",
            MatchStatus::NoTime => "no_time",
            MatchStatus::WriteFailed => "write_failed",
        }
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome for one photo.
///
/// A MATCHED result always carries range-valid coordinates and a method;
/// every other status carries none. Results are never edited in place: a
/// failed write produces a new result via [`MatchResult::to_write_failed`].
/// Deserializing checks the same rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MatchResultRecord")]
pub struct MatchResult {
    photo_path: PathBuf,
    lat: Option<f64>,
    lon: Option<f64>,
    error_sec: Option<f64>,
    method: Option<MatchMethod>,
    status: MatchStatus,
    reason: Option<String>,
}

/// Unchecked wire form of [`MatchResult`].
#[derive(Deserialize)]
struct MatchResultRecord {
    photo_path: PathBuf,
    lat: Option<f64>,
    lon: Option<f64>,
    error_sec: Option<f64>,
    method: Option<MatchMethod>,
    status: MatchStatus,
    reason: Option<String>,
}

impl TryFrom<MatchResultRecord> for MatchResult {
    type Error = GeotagError;

    fn try_from(r: MatchResultRecord) -> Result<Self> {
        let has_coords = r.lat.is_some() || r.lon.is_some();
        if r.status == MatchStatus::Matched {
            match (r.lat, r.lon, r.method) {
                (Some(lat), Some(lon), Some(_)) => check_range(lat, lon)?,
                _ => {
                    return Err(GeotagError::InvalidResult(format!(
                        "{}: matched without coordinates or method",
                        r.photo_path.display()
                    )))
                }
            }
        } else if has_coords || r.method.is_some() {
            return Err(GeotagError::InvalidResult(format!(
                "{}: {} result carries coordinates",
                r.photo_path.display(),
                r.status
            )));
        }
        Ok(Self {
            photo_path: r.photo_path,
            lat: r.lat,
            lon: r.lon,
            error_sec: r.error_sec,
            method: r.method,
            status: r.status,
            reason: r.reason,
        })
    }
}

impl MatchResult {
    fn matched(path: &Path, point: (f64, f64), error_sec: f64, method: MatchMethod, reason: Option<String>) -> Self {
        Self {
            photo_path: path.to_path_buf(),
            lat: Some(point.0),
            lon: Some(point.1),
            error_sec: Some(error_sec),
            method: Some(method),
            status: MatchStatus::Matched,
            reason,
        }
    }

    fn too_far(path: &Path, error_sec: f64, reason: String) -> Self {
        Self {
            photo_path: path.to_path_buf(),
            lat: None,
            lon: None,
            error_sec: Some(error_sec),
            method: None,
            status: MatchStatus::TooFar,
            reason: Some(reason),
        }
    }

    fn unmatched(path: &Path, reason: String) -> Self {
        Self {
            photo_path: path.to_path_buf(),
            lat: None,
            lon: None,
            error_sec: None,
            method: None,
            status: MatchStatus::Unmatched,
            reason: Some(reason),
        }
    }

    /// Result for a photo that was not eligible for matching.
    pub fn pass_through(photo: &PhotoRecord) -> Self {
        let status = match photo.status() {
            PhotoStatus::AlreadyGps => MatchStatus::AlreadyGps,
            PhotoStatus::NoTime => MatchStatus::NoTime,
            PhotoStatus::NeedsMatch => MatchStatus::Unmatched,
        };
        Self {
            photo_path: photo.path().to_path_buf(),
            lat: None,
            lon: None,
            error_sec: None,
            method: None,
            status,
            reason: None,
        }
    }

    /// Derive the WRITE_FAILED result for this photo. Coordinates are
    /// dropped; the match error is kept for the report.
    pub fn to_write_failed(&self, reason: impl Into<String>) -> Self {
        Self {
            photo_path: self.photo_path.clone(),
            lat: None,
            lon: None,
            error_sec: self.error_sec,
            method: None,
            status: MatchStatus::WriteFailed,
            reason: Some(reason.into()),
        }
    }

    pub fn photo_path(&self) -> &Path {
        &self.photo_path
    }

    pub fn lat(&self) -> Option<f64> {
        self.lat
    }

    pub fn lon(&self) -> Option<f64> {
        self.lon
    }

    /// `(lat, lon)` when both are present.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.lat?, self.lon?))
    }

    pub fn error_sec(&self) -> Option<f64> {
        self.error_sec
    }

    pub fn method(&self) -> Option<MatchMethod> {
        self.method
    }

    pub fn status(&self) -> MatchStatus {
        self.status
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Same result with its coordinates swapped, bypassing every check.
    #[cfg(test)]
    pub(crate) fn with_raw_coordinates(&self, lat: f64, lon: f64) -> Self {
        Self {
            lat: Some(lat),
            lon: Some(lon),
            ..self.clone()
        }
    }
}

/// Matching parameters, checked by [`MatchParams::validate`] before any
/// photo is looked at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchParams {
    pub tz_offset_hours: f64,
    pub camera_offset_sec: f64,
    pub max_error_sec: f64,
    pub method: MatchMethod,
    /// Degrade interpolation to nearest-point when the bracketing points
    /// are further apart than this (meters)
    pub max_distance_m: Option<f64>,
}

impl Default for MatchParams {
    fn default() -> Self {
        Self {
            tz_offset_hours: 8.0,
            camera_offset_sec: 0.0,
            max_error_sec: 120.0,
            method: MatchMethod::Interp,
            max_distance_m: None,
        }
    }
}

impl MatchParams {
    pub fn validate(&self) -> Result<()> {
        validate_tz_offset(self.tz_offset_hours)?;
        validate_camera_offset(self.camera_offset_sec)?;
        if !(self.max_error_sec.is_finite() && self.max_error_sec > 0.0) {
            return Err(GeotagError::Configuration(format!(
                "max error must be a positive number of seconds, got {}",
                self.max_error_sec
            )));
        }
        if let Some(d) = self.max_distance_m {
            if !(d.is_finite() && d > 0.0) {
                return Err(GeotagError::Configuration(format!(
                    "max distance must be a positive number of meters, got {d}"
                )));
            }
        }
        Ok(())
    }
}

/// Match every photo against the track. Returns one result per photo, in
/// input order. Parameters are validated first; after that no single photo
/// can fail the batch.
pub fn match_photos(
    photos: &[PhotoRecord],
    index: &TrackIndex,
    params: &MatchParams,
    progress: &ThrottledProgress,
) -> Result<Vec<MatchResult>> {
    params.validate()?;

    let total = photos.len() as u64;
    let done = AtomicU64::new(0);
    let results: Vec<MatchResult> = photos
        .par_iter()
        .map(|photo| {
            let result = match_photo(photo, index, params);
            let current = done.fetch_add(1, Ordering::Relaxed) + 1;
            progress.report("match", current, total, "Matching photos");
            result
        })
        .collect();

    let matched = results.iter().filter(|r| r.status == MatchStatus::Matched).count();
    progress.report("match", total, total, &format!("Matched {matched}/{total} photos"));
    Ok(results)
}

/// Match a single photo. Photos not waiting for a match pass through.
pub fn match_photo(photo: &PhotoRecord, index: &TrackIndex, params: &MatchParams) -> MatchResult {
    match photo.match_time() {
        Some(local) => {
            let query = normalize(local, params.tz_offset_hours, params.camera_offset_sec);
            match_instant(photo.path(), query, index, params)
        }
        None => MatchResult::pass_through(photo),
    }
}

fn match_instant(path: &Path, query: NaiveDateTime, index: &TrackIndex, params: &MatchParams) -> MatchResult {
    let bracket = index.bracket(query);
    match (bracket.before, bracket.after) {
        (None, Some(first)) => {
            let error_sec = gap(query, &first);
            let note = format!("photo time is before the start of the track ({error_sec:.1} s)");
            let matched_note = (error_sec > 0.0).then(|| note.clone());
            judge_nearest(path, Nearest { point: first, error_sec }, params, note, matched_note)
        }
        (Some(last), None) => {
            let error_sec = gap(query, &last);
            let note = format!("photo time is after the end of the track ({error_sec:.1} s)");
            let matched_note = (error_sec > 0.0).then(|| note.clone());
            judge_nearest(path, Nearest { point: last, error_sec }, params, note, matched_note)
        }
        (Some(before), Some(after)) => match params.method {
            MatchMethod::Nearest => {
                let nearest = Nearest::of(query, &before, &after);
                let note = format!("nearest point is {:.1} s away, over the limit", nearest.error_sec);
                judge_nearest(path, nearest, params, note, None)
            }
            MatchMethod::Interp => {
                if let Some(limit) = params.max_distance_m {
                    let distance = haversine_distance(before.lat(), before.lon(), after.lat(), after.lon());
                    if distance > limit {
                        tracing::debug!(path = %path.display(), distance, "interpolation degraded to nearest point");
                        let note = format!("track points {distance:.0} m apart, fell back to nearest point");
                        let nearest = Nearest::of(query, &before, &after);
                        return judge_nearest(path, nearest, params, note.clone(), Some(note));
                    }
                }
                interpolate(path, query, &before, &after, params)
            }
        },
        (None, None) => MatchResult::unmatched(path, "track has no points".to_string()),
    }
}

/// Closest of two track points, with the time gap to it.
struct Nearest {
    point: TrackPoint,
    error_sec: f64,
}

impl Nearest {
    /// Ties go to `before`.
    fn of(query: NaiveDateTime, before: &TrackPoint, after: &TrackPoint) -> Self {
        let (gap_before, gap_after) = (gap(query, before), gap(query, after));
        if gap_before <= gap_after {
            Nearest { point: *before, error_sec: gap_before }
        } else {
            Nearest { point: *after, error_sec: gap_after }
        }
    }
}

/// Apply the error threshold to a nearest-point candidate.
fn judge_nearest(
    path: &Path,
    nearest: Nearest,
    params: &MatchParams,
    too_far_note: String,
    matched_note: Option<String>,
) -> MatchResult {
    if nearest.error_sec > params.max_error_sec {
        MatchResult::too_far(path, nearest.error_sec, too_far_note)
    } else {
        MatchResult::matched(
            path,
            (nearest.point.lat(), nearest.point.lon()),
            nearest.error_sec,
            MatchMethod::Nearest,
            matched_note,
        )
    }
}

fn interpolate(
    path: &Path,
    query: NaiveDateTime,
    before: &TrackPoint,
    after: &TrackPoint,
    params: &MatchParams,
) -> MatchResult {
    let span = seconds_between(after.time(), before.time());
    let (point, error_sec) = if span <= 0.0 {
        ((before.lat(), before.lon()), gap(query, before))
    } else {
        let ratio = seconds_between(query, before.time()) / span;
        let lat = blend(before.lat(), after.lat(), ratio).clamp(-90.0, 90.0);
        let lon = blend(before.lon(), after.lon(), ratio).clamp(-180.0, 180.0);
        ((lat, lon), gap(query, before).min(gap(query, after)))
    };

    if error_sec > params.max_error_sec {
        MatchResult::too_far(
            path,
            error_sec,
            format!("interpolation error {error_sec:.1} s is over the limit"),
        )
    } else {
        MatchResult::matched(path, point, error_sec, MatchMethod::Interp, None)
    }
}

/// `a` at ratio 0, `b` at ratio 1, exactly.
fn blend(a: f64, b: f64, ratio: f64) -> f64 {
    a * (1.0 - ratio) + b * ratio
}

fn gap(query: NaiveDateTime, point: &TrackPoint) -> f64 {
    seconds_between(query, point.time()).abs()
}
