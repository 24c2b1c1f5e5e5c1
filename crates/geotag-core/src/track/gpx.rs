use super::{parse_time, ParsedTime, TrackPoint};
use crate::error::{GeotagError, Result};
use crate::ThrottledProgress;

/// Track point of a GPX waypoint, or None when it has no usable time or
/// its coordinates are out of range.
fn track_point(waypoint: &gpx::Waypoint) -> Option<TrackPoint> {
    let stamp = waypoint.time?.format().ok()?;
    let time = match parse_time(&stamp)? {
        ParsedTime::Utc(t) | ParsedTime::Naive(t) => t,
    };
    let position = waypoint.point();
    TrackPoint::new(time, position.y(), position.x()).ok()
}

/// Collect every track point (`trk` > `trkseg` > `trkpt`) that has a time.
/// Times are converted to UTC.
pub fn parse_gpx(bytes: &[u8], progress: &ThrottledProgress) -> Result<Vec<TrackPoint>> {
    let gpx = gpx::read(bytes).map_err(|e| GeotagError::TrackParse(format!("GPX: {e}")))?;

    let mut points = Vec::new();
    let mut skipped = 0usize;
    let mut segments = 0u64;
    for track in &gpx.tracks {
        for segment in &track.segments {
            segments += 1;
            progress.report("track", segments, 0, "Reading GPX segments");
            for waypoint in &segment.points {
                match track_point(waypoint) {
                    Some(point) => points.push(point),
                    None => skipped += 1,
                }
            }
        }
    }

    if skipped > 0 {
        tracing::debug!(skipped, "GPX points without usable time or coordinates");
    }
    if points.is_empty() {
        return Err(GeotagError::EmptyTrack);
    }

    let total = points.len() as u64;
    progress.report("track", total, total, &format!("Read {total} GPX points"));
    Ok(points)
}
