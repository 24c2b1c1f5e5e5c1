use chrono::{NaiveDateTime, TimeDelta};

use crate::error::{GeotagError, Result};

/// Westernmost fixed UTC offset accepted for photo times (hours)
pub const MIN_TZ_OFFSET_HOURS: f64 = -12.0;
/// Easternmost fixed UTC offset accepted for photo times (hours)
pub const MAX_TZ_OFFSET_HOURS: f64 = 14.0;

/// Convert a camera wall-clock time to a zone-naive UTC instant.
///
/// `local` is read as wall-clock time at a fixed offset of `tz_offset_hours`
/// (fractional hours allowed, e.g. 5.5 or -3.5). `camera_offset_sec` is then
/// added to compensate for camera clock drift against the track's time
/// source. Offsets are checked at configuration time; see
/// [`validate_tz_offset`] and [`validate_camera_offset`].
pub fn normalize(local: NaiveDateTime, tz_offset_hours: f64, camera_offset_sec: f64) -> NaiveDateTime {
    local - seconds_delta(tz_offset_hours * 3600.0) + seconds_delta(camera_offset_sec)
}

/// Fractional seconds as a `TimeDelta`, at microsecond precision.
pub fn seconds_delta(secs: f64) -> TimeDelta {
    TimeDelta::microseconds((secs * 1_000_000.0).round() as i64)
}

pub fn validate_tz_offset(hours: f64) -> Result<()> {
    if hours.is_finite() && (MIN_TZ_OFFSET_HOURS..=MAX_TZ_OFFSET_HOURS).contains(&hours) {
        Ok(())
    } else {
        Err(GeotagError::Configuration(format!(
            "timezone offset {hours} h is outside [{MIN_TZ_OFFSET_HOURS}, {MAX_TZ_OFFSET_HOURS}]"
        )))
    }
}

pub fn validate_camera_offset(secs: f64) -> Result<()> {
    // i64 microseconds overflow well past anything a camera clock could drift
    if secs.is_finite() && secs.abs() < 1.0e12 {
        Ok(())
    } else {
        Err(GeotagError::Configuration(format!("camera offset {secs} s is not a usable number")))
    }
}
