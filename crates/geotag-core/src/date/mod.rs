pub mod exif;
pub mod normalize;

use chrono::NaiveDateTime;

pub use normalize::normalize;

/// Signed difference `a - b` in fractional seconds.
pub fn seconds_between(a: NaiveDateTime, b: NaiveDateTime) -> f64 {
    let delta = a - b;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1_000.0,
    }
}
