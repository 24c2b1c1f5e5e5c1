use std::fs::File;
use std::io::{BufRead, BufReader, Seek};
use std::path::Path;

use chrono::NaiveDateTime;
use exif::{Exif, Reader};

use crate::date::exif::extract_capture_time;
use crate::gps::tags::has_gps;

/// What the scanner needs from a photo's EXIF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhotoMetadata {
    pub has_gps: bool,
    pub capture_time: Option<NaiveDateTime>,
}

impl PhotoMetadata {
    pub fn from_exif(exif: &Exif) -> Self {
        Self {
            has_gps: has_gps(exif),
            capture_time: extract_capture_time(exif),
        }
    }
}

fn tolerant_reader() -> Reader {
    let mut reader = Reader::new();
    reader.continue_on_error(true);
    reader
}

/// Keep whatever fields survived a damaged read.
fn recover(result: std::result::Result<Exif, exif::Error>) -> Option<Exif> {
    match result {
        Ok(exif) => Some(exif),
        Err(exif::Error::PartialResult(partial)) => {
            let (exif, errors) = partial.into_inner();
            tracing::debug!(errors = errors.len(), "EXIF read with recoverable errors");
            Some(exif)
        }
        Err(e) => {
            tracing::debug!(error = %e, "no readable EXIF");
            None
        }
    }
}

/// Read EXIF from an image container, tolerating recoverable damage.
/// Returns None when no EXIF can be recovered at all.
pub fn read_exif<R: BufRead + Seek>(reader: &mut R) -> Option<Exif> {
    recover(tolerant_reader().read_from_container(reader))
}

/// Same as [`read_exif`], for a bare TIFF payload (an APP1 segment
/// without its `Exif\0\0` prefix).
pub fn read_exif_tiff(tiff: Vec<u8>) -> Option<Exif> {
    recover(tolerant_reader().read_raw(tiff))
}

/// Read a photo's metadata. Unreadable or corrupt EXIF yields
/// `has_gps = false` and no capture time; only opening the file can fail.
pub fn read_photo_metadata(path: &Path) -> std::io::Result<PhotoMetadata> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    Ok(read_exif(&mut reader)
        .map(|exif| PhotoMetadata::from_exif(&exif))
        .unwrap_or_default())
}
