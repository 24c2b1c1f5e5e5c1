use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::matcher::{MatchResult, MatchStatus};

pub const REPORT_FILENAME: &str = "geotag_report.csv";

const HEADER: [&str; 8] = ["path", "filename", "status", "error_sec", "lat", "lon", "method", "note"];

/// Counts over a result set. `unmatched` includes TOO_FAR.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: u64,
    pub already_gps: u64,
    pub needs_match: u64,
    pub no_time: u64,
    pub matched: u64,
    pub unmatched: u64,
    pub write_failed: u64,
}

impl ReportSummary {
    pub fn from_results(results: &[MatchResult]) -> Self {
        let mut s = ReportSummary {
            total: results.len() as u64,
            ..Default::default()
        };
        for r in results {
            match r.status() {
                MatchStatus::AlreadyGps => s.already_gps += 1,
                MatchStatus::NoTime => s.no_time += 1,
                MatchStatus::Matched => s.matched += 1,
                MatchStatus::Unmatched | MatchStatus::TooFar => s.unmatched += 1,
                MatchStatus::WriteFailed => s.write_failed += 1,
            }
        }
        s.needs_match = s.total - s.already_gps - s.no_time;
        s
    }
}

/// Quote a field if it contains a comma, quote, or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn note(result: &MatchResult) -> &str {
    match result.status() {
        MatchStatus::AlreadyGps => "photo already has GPS data",
        MatchStatus::NoTime => "photo has no usable capture time",
        _ => result.reason().unwrap_or(""),
    }
}

fn row(result: &MatchResult) -> [String; 8] {
    let path = result.photo_path();
    [
        path.display().to_string(),
        path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
        result.status().to_string(),
        result.error_sec().map(|e| format!("{e:.2}")).unwrap_or_default(),
        result.lat().map(|v| format!("{v:.6}")).unwrap_or_default(),
        result.lon().map(|v| format!("{v:.6}")).unwrap_or_default(),
        result.method().map(|m| m.to_string()).unwrap_or_default(),
        note(result).to_string(),
    ]
}

/// Write one CSV row per result, in result order.
pub fn write_report(results: &[MatchResult], path: &Path) -> anyhow::Result<ReportSummary> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "{}", HEADER.join(","))?;
    for result in results {
        let fields: Vec<String> = row(result).iter().map(|f| csv_field(f)).collect();
        writeln!(out, "{}", fields.join(","))?;
    }
    out.flush()?;

    Ok(ReportSummary::from_results(results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{match_photo, MatchParams};
    use crate::photo::PhotoRecord;
    use crate::track::{TrackIndex, TrackPoint};
    use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

    fn t(secs: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap() + TimeDelta::seconds(secs)
    }

    fn sample_results() -> Vec<MatchResult> {
        let index = TrackIndex::new(vec![
            TrackPoint::new(t(0), 10.0, 20.0).unwrap(),
            TrackPoint::new(t(100), 10.01, 20.02).unwrap(),
        ])
        .unwrap();
        let params = MatchParams {
            tz_offset_hours: 0.0,
            ..MatchParams::default()
        };
        let photos = [
            PhotoRecord::new("/photos/a.jpg", false, Some(t(25))),
            PhotoRecord::new("/photos/b, final.jpg", true, None),
            PhotoRecord::new("/photos/c.jpg", false, None),
            PhotoRecord::new("/photos/d.jpg", false, Some(t(500))),
        ];
        let mut results: Vec<MatchResult> = photos.iter().map(|p| match_photo(p, &index, &params)).collect();
        results.push(results[0].to_write_failed("disk \"full\""));
        results
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_summary_counts() {
        let s = ReportSummary::from_results(&sample_results());
        assert_eq!(
            s,
            ReportSummary {
                total: 5,
                already_gps: 1,
                needs_match: 3,
                no_time: 1,
                matched: 1,
                unmatched: 1,
                write_failed: 1,
            }
        );
    }

    #[test]
    fn test_report_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join(REPORT_FILENAME);
        let summary = write_report(&sample_results(), &path).unwrap();
        assert_eq!(summary.total, 5);

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "path,filename,status,error_sec,lat,lon,method,note");
        assert_eq!(lines[1], "/photos/a.jpg,a.jpg,matched,25.00,10.002500,20.005000,interp,");
        assert_eq!(
            lines[2],
            "\"/photos/b, final.jpg\",\"b, final.jpg\",already_gps,,,,,photo already has GPS data"
        );
        assert_eq!(lines[3], "/photos/c.jpg,c.jpg,no_time,,,,,photo has no usable capture time");
        assert!(lines[4].starts_with("/photos/d.jpg,d.jpg,too_far,400.00,,,,"), "{}", lines[4]);
        assert_eq!(lines[5], "/photos/a.jpg,a.jpg,write_failed,25.00,,,,\"disk \"\"full\"\"\"");
    }
}
