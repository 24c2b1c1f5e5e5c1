use std::io::Cursor;

use exif::experimental::Writer;
use exif::{Context, Field, In, Tag, Value};
use img_parts::jpeg::{markers, Jpeg, JpegSegment};
use img_parts::{Bytes, ImageEXIF};

use crate::error::{GeotagError, Result};
use crate::gps::tags::gps_fields;
use crate::metadata::read_exif_tiff;

/// Serialize EXIF fields into a TIFF stream (the payload of the APP1
/// "Exif" segment, without the `Exif\0\0` prefix).
pub fn encode_tiff(fields: &[&Field], little_endian: bool) -> Result<Vec<u8>> {
    let mut writer = Writer::new();
    for &field in fields {
        writer.push_field(field);
    }
    let mut buf = Cursor::new(Vec::new());
    writer.write(&mut buf, little_endian)?;
    Ok(buf.into_inner())
}

const EXIF_PREFIX: &[u8] = b"Exif\0\0";

/// Largest payload a single JPEG segment can hold (length field minus
/// itself).
const MAX_SEGMENT_CONTENTS: usize = u16::MAX as usize - 2;

/// Replace a JPEG's EXIF segment with the given TIFF payload.
pub fn embed_exif(jpeg_bytes: &[u8], tiff: Vec<u8>) -> Result<Vec<u8>> {
    let mut jpeg = parse_jpeg(jpeg_bytes)?;
    replace_exif_segment(&mut jpeg, tiff)?;
    Ok(jpeg.encoder().bytes().to_vec())
}

/// Return a copy of `jpeg_bytes` whose EXIF carries a GPS block for
/// (`lat`, `lon`).
///
/// Primary-IFD fields of the existing EXIF are carried over, including
/// those recovered from a partly damaged block; any previous GPS fields
/// are replaced. Thumbnail IFD, MakerNote and fields of unknown type
/// cannot be re-serialized and are dropped. A missing or unreadable EXIF
/// segment is replaced by one holding only the GPS block.
pub fn insert_gps(jpeg_bytes: &[u8], lat: f64, lon: f64) -> Result<Vec<u8>> {
    let gps = gps_fields(lat, lon)?;
    let mut jpeg = parse_jpeg(jpeg_bytes)?;

    let existing = jpeg.exif().and_then(|tiff| read_exif_tiff(tiff.to_vec()));
    let little_endian = existing.as_ref().map_or(false, |e| e.little_endian());

    let mut fields: Vec<&Field> = existing
        .as_ref()
        .map(|e| e.fields().filter(|f| is_carried_over(f)).collect())
        .unwrap_or_default();
    fields.extend(gps.iter());

    let tiff = encode_tiff(&fields, little_endian)?;
    replace_exif_segment(&mut jpeg, tiff)?;
    Ok(jpeg.encoder().bytes().to_vec())
}

fn parse_jpeg(bytes: &[u8]) -> Result<Jpeg> {
    Jpeg::from_bytes(Bytes::copy_from_slice(bytes)).map_err(|e| GeotagError::Jpeg(e.to_string()))
}

fn is_exif_segment(segment: &JpegSegment) -> bool {
    segment.marker() == markers::APP1 && segment.contents().starts_with(EXIF_PREFIX)
}

/// Drop every EXIF APP1 segment and put the new one right after the
/// leading APP0 (JFIF) segments, or first when there are none.
fn replace_exif_segment(jpeg: &mut Jpeg, tiff: Vec<u8>) -> Result<()> {
    let mut contents = Vec::with_capacity(EXIF_PREFIX.len() + tiff.len());
    contents.extend_from_slice(EXIF_PREFIX);
    contents.extend_from_slice(&tiff);
    if contents.len() > MAX_SEGMENT_CONTENTS {
        return Err(GeotagError::Jpeg(format!(
            "EXIF block of {} bytes does not fit in one segment",
            contents.len()
        )));
    }

    let segments = jpeg.segments_mut();
    segments.retain(|s| !is_exif_segment(s));
    let at = segments
        .iter()
        .take_while(|s| s.marker() == markers::APP0)
        .count();
    segments.insert(at, JpegSegment::new_with_contents(markers::APP1, Bytes::from(contents)));
    Ok(())
}

fn is_carried_over(field: &Field) -> bool {
    field.ifd_num == In::PRIMARY
        && field.tag.context() != Context::Gps
        && field.tag != Tag::MakerNote
        && !matches!(field.value, Value::Unknown(..))
}
