use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use rayon::prelude::*;

use crate::metadata::read_photo_metadata;
use crate::photo::{PhotoRecord, PhotoStatus};
use crate::ThrottledProgress;

/// Result of scanning a photo directory
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Classified photos, in path order
    pub photos: Vec<PhotoRecord>,
    /// Files listed but gone (or unopenable) by the time they were read
    pub vanished: u64,
}

impl ScanResult {
    pub fn count(&self, status: PhotoStatus) -> usize {
        self.photos.iter().filter(|p| p.status() == status).count()
    }
}

fn is_jpeg(path: &Path) -> bool {
    mime_guess::from_path(path)
        .first()
        .map_or(false, |mime| mime == mime_guess::mime::IMAGE_JPEG)
}

fn list_jpegs(dir: &Path, recursive: bool, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            if recursive {
                // unreadable subdirectories are skipped, not fatal
                if let Err(e) = list_jpegs(&path, true, out) {
                    tracing::warn!(dir = %path.display(), error = %e, "cannot list directory");
                }
            }
        } else if is_jpeg(&path) {
            out.push(path);
        }
    }
    Ok(())
}

/// Find the JPEGs in `dir` and classify each by its EXIF.
///
/// A photo with a complete GPS block is ALREADY_GPS, one with a capture
/// time is NEEDS_MATCH, anything else (including unreadable EXIF) NO_TIME.
pub fn scan_photos(dir: &Path, recursive: bool, progress: &ThrottledProgress) -> anyhow::Result<ScanResult> {
    let meta = fs::metadata(dir).with_context(|| format!("Photo directory {} not found", dir.display()))?;
    if !meta.is_dir() {
        anyhow::bail!("{} is not a directory", dir.display());
    }

    let mut paths = Vec::new();
    list_jpegs(dir, recursive, &mut paths).with_context(|| format!("Failed to list {}", dir.display()))?;
    paths.sort();

    let total = paths.len() as u64;
    progress.report("scan", 0, total, &format!("Found {total} JPEG files"));

    let done = AtomicU64::new(0);
    let read: Vec<Option<PhotoRecord>> = paths
        .into_par_iter()
        .map(|path| {
            let record = match read_photo_metadata(&path) {
                Ok(m) => Some(PhotoRecord::new(path, m.has_gps, m.capture_time)),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable file");
                    None
                }
            };
            let current = done.fetch_add(1, Ordering::Relaxed) + 1;
            progress.report("scan", current, total, "Reading EXIF");
            record
        })
        .collect();

    let vanished = read.iter().filter(|r| r.is_none()).count() as u64;
    let photos: Vec<PhotoRecord> = read.into_iter().flatten().collect();
    progress.report("scan", total, total, &format!("Scanned {} photos", photos.len()));

    Ok(ScanResult { photos, vanished })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gps::tags::gps_fields;
    use crate::jpeg::tests::{datetime_field, jpeg_with_fields, BARE_JPEG};
    use exif::Tag;

    fn scan(dir: &Path, recursive: bool) -> anyhow::Result<ScanResult> {
        let cb = |_: &str, _: u64, _: u64, _: &str| {};
        let tp = ThrottledProgress::new(&cb);
        scan_photos(dir, recursive, &tp)
    }

    fn populate(dir: &Path) {
        let mut with_gps = gps_fields(35.0, 139.0).unwrap();
        with_gps.push(datetime_field(Tag::DateTimeOriginal, "2024:03:01 10:00:00"));
        fs::write(dir.join("a_gps.jpg"), jpeg_with_fields(&with_gps)).unwrap();

        let timed = vec![datetime_field(Tag::DateTime, "2024:03:01 10:05:00")];
        fs::write(dir.join("b_time.JPG"), jpeg_with_fields(&timed)).unwrap();

        fs::write(dir.join("c_bare.jpeg"), BARE_JPEG).unwrap();
        fs::write(dir.join("notes.txt"), "not a photo").unwrap();
        fs::write(dir.join("d.png"), BARE_JPEG).unwrap();

        fs::create_dir(dir.join("sub")).unwrap();
        fs::write(dir.join("sub").join("e_time.jpg"), jpeg_with_fields(&timed)).unwrap();
    }

    #[test]
    fn test_classifies_top_level() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path());

        let result = scan(dir.path(), false).unwrap();
        let names: Vec<_> = result
            .photos
            .iter()
            .map(|p| p.path().file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a_gps.jpg", "b_time.JPG", "c_bare.jpeg"]);

        let statuses: Vec<_> = result.photos.iter().map(|p| p.status()).collect();
        assert_eq!(
            statuses,
            vec![PhotoStatus::AlreadyGps, PhotoStatus::NeedsMatch, PhotoStatus::NoTime]
        );
        assert_eq!(result.count(PhotoStatus::NeedsMatch), 1);
        assert_eq!(result.vanished, 0);
    }

    #[test]
    fn test_recursive() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path());

        let result = scan(dir.path(), true).unwrap();
        assert_eq!(result.photos.len(), 4);
        assert_eq!(result.count(PhotoStatus::NeedsMatch), 2);
        assert!(result.photos.iter().any(|p| p.path().ends_with("sub/e_time.jpg")));
    }

    #[test]
    fn test_missing_or_file_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan(&dir.path().join("nope"), false).is_err());

        let file = dir.path().join("x.jpg");
        fs::write(&file, BARE_JPEG).unwrap();
        assert!(scan(&file, false).is_err());
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = scan(dir.path(), true).unwrap();
        assert!(result.photos.is_empty());
    }
}
