pub mod config;
pub mod date;
pub mod error;
pub mod gps;
pub mod jpeg;
pub mod matcher;
pub mod metadata;
pub mod photo;
pub mod report;
pub mod scan;
pub mod track;
pub mod writer;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

pub use config::{OutputMode, ProcessOptions};
pub use error::{GeotagError, Result};
pub use matcher::{match_photos, MatchMethod, MatchParams, MatchResult, MatchStatus};
pub use photo::{PhotoRecord, PhotoStatus};
pub use report::ReportSummary;
pub use track::{TrackFormat, TrackIndex, TrackPoint};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResult {
    pub summary: ReportSummary,
    pub track_points: u64,
    pub files_written: u64,
    pub files_failed: u64,
    /// Where copies went; None when originals were overwritten
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub report_path: Option<PathBuf>,
    /// Per-photo outcomes, in scan order
    #[serde(default)]
    pub results: Vec<MatchResult>,
}

/// Type alias for progress callback: `(stage, completed, total, message)`.
/// A total of 0 means the total is not known yet. The callback may borrow
/// from the caller for `'a`.
pub type ProgressCallback<'a> = dyn Fn(&str, u64, u64, &str) + Send + Sync + 'a;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(200);

/// Throttled progress reporter: emits at most every 200ms, and always on
/// completion.
pub struct ThrottledProgress<'a> {
    inner: &'a ProgressCallback<'a>,
    last_emit: std::sync::Mutex<Instant>,
}

impl<'a> ThrottledProgress<'a> {
    pub fn new(inner: &'a ProgressCallback<'a>) -> Self {
        Self {
            inner,
            last_emit: std::sync::Mutex::new(Instant::now() - Duration::from_secs(1)),
        }
    }

    pub fn report(&self, stage: &str, current: u64, total: u64, message: &str) {
        let is_done = total > 0 && current >= total;
        if !is_done {
            let mut last = self.last_emit.lock().unwrap_or_else(|e| e.into_inner());
            if last.elapsed() < PROGRESS_INTERVAL {
                return;
            }
            *last = Instant::now();
        }
        (self.inner)(stage, current, total, message);
    }
}

/// Run the full pipeline: read track, scan photos, match, write, report.
///
/// Options are validated before anything is read. An empty track aborts
/// the run; problems with individual photos only show up in the results.
pub fn process(options: &ProcessOptions, progress_callback: &ProgressCallback<'_>) -> anyhow::Result<ProcessResult> {
    options.validate()?;
    let tp = ThrottledProgress::new(progress_callback);

    // Stage 1: track
    let points = track::read_track(&options.track_path, options.track_format, &options.csv, &tp)?;
    let index = TrackIndex::new(points)?;
    tracing::info!(
        points = index.len(),
        start = %index.first().time(),
        end = %index.last().time(),
        "track loaded"
    );

    // Stage 2: scan
    let scan = scan::scan_photos(&options.photo_dir, options.recursive, &tp)?;
    if scan.vanished > 0 {
        tracing::warn!(count = scan.vanished, "files disappeared during the scan");
    }

    // Stage 3: match
    let matched = match_photos(&scan.photos, &index, &options.match_params(), &tp)?;

    // Stage 4: write
    let mode = options.write_mode();
    let written = writer::write_results(&matched, &mode, &tp)?;

    // Stage 5: report
    let report_path = options.report_path();
    let summary = match &report_path {
        Some(path) => report::write_report(&written.results, path)?,
        None => ReportSummary::from_results(&written.results),
    };

    Ok(ProcessResult {
        summary,
        track_points: index.len() as u64,
        files_written: written.written.len() as u64,
        files_failed: written.files_failed,
        output_dir: match mode {
            writer::WriteMode::Copy { output_dir } => Some(output_dir),
            writer::WriteMode::Overwrite => None,
        },
        report_path,
        results: written.results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_throttle_always_emits_completion() {
        let calls = AtomicUsize::new(0);
        let cb = |_: &str, _: u64, _: u64, _: &str| {
            calls.fetch_add(1, Ordering::SeqCst);
        };
        let tp = ThrottledProgress::new(&cb);
        // first report passes (last emit starts in the past), the rest are throttled
        for i in 1..50 {
            tp.report("scan", i, 100, "");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        tp.report("scan", 100, 100, "done");
        tp.report("scan", 100, 100, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_unknown_total_is_throttled() {
        let calls = AtomicUsize::new(0);
        let cb = |_: &str, _: u64, _: u64, _: &str| {
            calls.fetch_add(1, Ordering::SeqCst);
        };
        let tp = ThrottledProgress::new(&cb);
        for i in 0..10 {
            tp.report("track", i, 0, "");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalid_options_fail_before_reading() {
        let options = ProcessOptions {
            photo_dir: PathBuf::from("/does/not/exist"),
            track_path: PathBuf::from("/does/not/exist.gpx"),
            max_error_sec: 0.0,
            ..ProcessOptions::default()
        };
        let stages = std::sync::Mutex::new(Vec::<String>::new());
        let err = process(&options, &|stage, _, _, _| {
            stages.lock().unwrap().push(stage.to_string());
        })
        .unwrap_err();
        assert!(matches!(err.downcast_ref::<GeotagError>(), Some(GeotagError::Configuration(_))));
        assert!(stages.lock().unwrap().is_empty());
    }
}
