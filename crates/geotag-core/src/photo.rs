use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Scan-time classification of a photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoStatus {
    /// EXIF already carries a complete GPS block
    AlreadyGps,
    /// No GPS, but a capture time to match against the track
    NeedsMatch,
    /// No GPS and no usable capture time
    NoTime,
}

/// A photo found by the scanner.
///
/// The status is derived from `has_gps` and `capture_time` at construction,
/// so a record can never carry an inconsistent combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    path: PathBuf,
    has_gps: bool,
    /// Wall-clock capture time as recorded by the camera (no zone)
    capture_time: Option<NaiveDateTime>,
    status: PhotoStatus,
}

impl PhotoRecord {
    pub fn new(path: impl Into<PathBuf>, has_gps: bool, capture_time: Option<NaiveDateTime>) -> Self {
        let status = if has_gps {
            PhotoStatus::AlreadyGps
        } else if capture_time.is_some() {
            PhotoStatus::NeedsMatch
        } else {
            PhotoStatus::NoTime
        };
        Self {
            path: path.into(),
            has_gps,
            capture_time,
            status,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_gps(&self) -> bool {
        self.has_gps
    }

    pub fn capture_time(&self) -> Option<NaiveDateTime> {
        self.capture_time
    }

    pub fn status(&self) -> PhotoStatus {
        self.status
    }

    /// Capture time, only when the photo is waiting to be matched.
    pub fn match_time(&self) -> Option<NaiveDateTime> {
        match self.status {
            PhotoStatus::NeedsMatch => self.capture_time,
            PhotoStatus::AlreadyGps | PhotoStatus::NoTime => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    #[test]
    fn test_status_classification() {
        let gps = PhotoRecord::new("a.jpg", true, Some(noon()));
        assert_eq!(gps.status(), PhotoStatus::AlreadyGps);
        assert_eq!(gps.capture_time(), Some(noon()));
        assert_eq!(gps.match_time(), None);

        let pending = PhotoRecord::new("b.jpg", false, Some(noon()));
        assert_eq!(pending.status(), PhotoStatus::NeedsMatch);
        assert_eq!(pending.match_time(), Some(noon()));

        let no_time = PhotoRecord::new("c.jpg", false, None);
        assert_eq!(no_time.status(), PhotoStatus::NoTime);
        assert!(no_time.capture_time().is_none());
    }

    #[test]
    fn test_gps_without_time_is_already_gps() {
        let r = PhotoRecord::new("d.jpg", true, None);
        assert_eq!(r.status(), PhotoStatus::AlreadyGps);
        assert!(r.has_gps());
    }
}
