use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;

use crate::jpeg::insert_gps;
use crate::matcher::{MatchResult, MatchStatus};
use crate::ThrottledProgress;

/// Where tagged photos go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteMode {
    /// Write tagged copies into `output_dir`; originals are left alone
    Copy { output_dir: PathBuf },
    /// Rewrite the originals in place
    Overwrite,
}

/// Result of the write phase.
pub struct WriteResult {
    /// One result per input, in input order. Failed writes are WRITE_FAILED.
    pub results: Vec<MatchResult>,
    /// Destination of each successful write
    pub written: Vec<PathBuf>,
    pub files_failed: u64,
}

/// File names directly inside `dir`, to avoid one exists() call per photo.
fn existing_names(dir: &Path) -> HashSet<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return HashSet::new();
    };
    entries.flatten().map(|e| e.path()).collect()
}

/// Assign copy destinations in input order. Collisions with files on disk
/// or earlier assignments become `name(1).jpg`, `name(2).jpg`, ...
fn assign_destinations(sources: &[&Path], output_dir: &Path) -> Vec<PathBuf> {
    let existing = existing_names(output_dir);
    let mut name_counters: HashMap<PathBuf, u32> = HashMap::new();
    let mut used: HashSet<PathBuf> = HashSet::new();
    let mut assignments = Vec::with_capacity(sources.len());

    for src in sources {
        let filename = src.file_name().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("photo.jpg"));
        let base = output_dir.join(&filename);
        let counter = name_counters.entry(base.clone()).or_insert(0);

        let dest = if *counter == 0 && !used.contains(&base) && !existing.contains(&base) {
            base
        } else {
            let stem = filename.file_stem().and_then(|s| s.to_str()).unwrap_or("photo");
            let ext = filename.extension().and_then(|s| s.to_str()).unwrap_or("");
            loop {
                *counter += 1;
                let name = if ext.is_empty() {
                    format!("{}({})", stem, counter)
                } else {
                    format!("{}({}).{}", stem, counter, ext)
                };
                let candidate = output_dir.join(name);
                if !used.contains(&candidate) && !existing.contains(&candidate) {
                    break candidate;
                }
            }
        };

        used.insert(dest.clone());
        assignments.push(dest);
    }
    assignments
}

/// Tag one photo: read `src`, insert the GPS block, write `dest`.
/// In place (`src == dest`) goes through a temp file and a rename.
fn write_one(src: &Path, dest: &Path, lat: f64, lon: f64) -> anyhow::Result<()> {
    let bytes = fs::read(src)?;
    let tagged = insert_gps(&bytes, lat, lon)?;
    let meta = fs::metadata(src)?;
    let mtime = filetime::FileTime::from_last_modification_time(&meta);

    if src == dest {
        let file_name = dest.file_name().and_then(|n| n.to_str()).unwrap_or("photo");
        let temp_path = dest.with_file_name(format!(".{file_name}.geotag.tmp"));
        // the temp file replaces the original, so it takes over its mode bits
        let replaced = fs::write(&temp_path, &tagged)
            .and_then(|_| fs::set_permissions(&temp_path, meta.permissions()))
            .and_then(|_| fs::rename(&temp_path, dest));
        if let Err(e) = replaced {
            fs::remove_file(&temp_path).ok();
            return Err(e.into());
        }
    } else {
        fs::write(dest, &tagged)?;
    }

    filetime::set_file_mtime(dest, mtime).ok();
    Ok(())
}

/// Write GPS into every MATCHED photo. Other results pass through
/// unchanged. Only failing to create the output directory is fatal; a
/// failed photo becomes WRITE_FAILED and the batch continues.
pub fn write_results(
    results: &[MatchResult],
    mode: &WriteMode,
    progress: &ThrottledProgress,
) -> anyhow::Result<WriteResult> {
    let work: Vec<(usize, &MatchResult)> = results
        .iter()
        .enumerate()
        .filter(|(_, r)| r.status() == MatchStatus::Matched)
        .collect();

    // Phase 1: destinations (sequential, collision tracking)
    let destinations: Vec<PathBuf> = match mode {
        WriteMode::Copy { output_dir } => {
            fs::create_dir_all(output_dir)?;
            let sources: Vec<&Path> = work.iter().map(|(_, r)| r.photo_path()).collect();
            assign_destinations(&sources, output_dir)
        }
        WriteMode::Overwrite => work.iter().map(|(_, r)| r.photo_path().to_path_buf()).collect(),
    };

    // Phase 2: write in parallel
    let total = work.len() as u64;
    let done = AtomicU64::new(0);
    let outcomes: Vec<(usize, Result<PathBuf, String>)> = work
        .par_iter()
        .zip(destinations.par_iter())
        .map(|(&(idx, result), dest)| {
            let outcome = match result.coordinates() {
                Some((lat, lon)) => write_one(result.photo_path(), dest, lat, lon)
                    .map(|_| dest.clone())
                    .map_err(|e| format!("{e:#}")),
                None => Err("matched result has no coordinates".to_string()),
            };
            if let Err(reason) = &outcome {
                tracing::warn!(path = %result.photo_path().display(), %reason, "write failed");
            }
            let current = done.fetch_add(1, Ordering::Relaxed) + 1;
            progress.report("write", current, total, "Writing GPS");
            (idx, outcome)
        })
        .collect();

    let mut results = results.to_vec();
    let mut written = Vec::with_capacity(outcomes.len());
    let mut files_failed = 0u64;
    for (idx, outcome) in outcomes {
        match outcome {
            Ok(dest) => written.push(dest),
            Err(reason) => {
                results[idx] = results[idx].to_write_failed(reason);
                files_failed += 1;
            }
        }
    }
    progress.report("write", total, total, &format!("Wrote {} photos", written.len()));

    Ok(WriteResult {
        results,
        written,
        files_failed,
    })
}
