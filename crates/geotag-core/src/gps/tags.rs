use exif::{Exif, Field, In, Tag, Value};

use super::{to_dms, Dms, Hemisphere};
use crate::error::Result;

/// A GPS block only counts when all four of these are present.
const REQUIRED_GPS_TAGS: [Tag; 4] = [
    Tag::GPSLatitude,
    Tag::GPSLatitudeRef,
    Tag::GPSLongitude,
    Tag::GPSLongitudeRef,
];

/// GPSVersionID written with every new block (2.3.0.0)
const GPS_VERSION: [u8; 4] = [2, 3, 0, 0];

/// True only if latitude, longitude and both hemisphere references exist.
/// Partial blocks are treated as absent.
pub fn has_gps(exif: &Exif) -> bool {
    REQUIRED_GPS_TAGS
        .iter()
        .all(|tag| exif.get_field(*tag, In::PRIMARY).is_some())
}

/// Decode the GPS block into signed decimal degrees.
pub fn read_gps(exif: &Exif) -> Option<(f64, f64)> {
    let lat = read_axis(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef)?;
    let lon = read_axis(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef)?;
    Some((lat, lon))
}

fn read_axis(exif: &Exif, value_tag: Tag, ref_tag: Tag) -> Option<f64> {
    let reference = match &exif.get_field(ref_tag, In::PRIMARY)?.value {
        Value::Ascii(parts) => parts
            .first()
            .and_then(|p| p.first())
            .and_then(|b| Hemisphere::from_char(*b as char))?,
        _ => return None,
    };
    let rationals = match &exif.get_field(value_tag, In::PRIMARY)?.value {
        Value::Rational(v) if v.len() >= 3 => v,
        _ => return None,
    };
    if rationals.iter().take(3).any(|r| r.denom == 0) {
        return None;
    }

    let magnitude =
        rationals[0].to_f64() + rationals[1].to_f64() / 60.0 + rationals[2].to_f64() / 3600.0;
    Some(reference.sign() * magnitude)
}

/// Build the GPS IFD fields for a coordinate pair. Fails with
/// `OutOfRange` before anything is built.
pub fn gps_fields(lat: f64, lon: f64) -> Result<Vec<Field>> {
    let (lat_dms, lon_dms) = to_dms(lat, lon)?;
    Ok(vec![
        Field {
            tag: Tag::GPSVersionID,
            ifd_num: In::PRIMARY,
            value: Value::Byte(GPS_VERSION.to_vec()),
        },
        ref_field(Tag::GPSLatitudeRef, &lat_dms),
        dms_field(Tag::GPSLatitude, &lat_dms),
        ref_field(Tag::GPSLongitudeRef, &lon_dms),
        dms_field(Tag::GPSLongitude, &lon_dms),
    ])
}

fn ref_field(tag: Tag, dms: &Dms) -> Field {
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![vec![dms.reference.as_char() as u8]]),
    }
}

fn dms_field(tag: Tag, dms: &Dms) -> Field {
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value: Value::Rational(dms.rationals()),
    }
}
