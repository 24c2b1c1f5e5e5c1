use chrono::NaiveDateTime;
use exif::{Exif, In, Tag, Value};

/// EXIF datetimes have no timezone info - they are camera local time as-is.
pub const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

type CaptureTimeExtractor = fn(&Exif) -> Option<NaiveDateTime>;

/// Tried in order; the first one that yields a valid time wins.
const CAPTURE_TIME_CHAIN: &[CaptureTimeExtractor] =
    &[date_time_original, date_time_digitized, date_time];

fn date_time_original(exif: &Exif) -> Option<NaiveDateTime> {
    field_datetime(exif, Tag::DateTimeOriginal)
}

fn date_time_digitized(exif: &Exif) -> Option<NaiveDateTime> {
    field_datetime(exif, Tag::DateTimeDigitized)
}

fn date_time(exif: &Exif) -> Option<NaiveDateTime> {
    field_datetime(exif, Tag::DateTime)
}

/// Best-available capture time: DateTimeOriginal, then DateTimeDigitized,
/// then DateTime. Missing and malformed fields fall through to the next one.
pub fn extract_capture_time(exif: &Exif) -> Option<NaiveDateTime> {
    CAPTURE_TIME_CHAIN.iter().find_map(|extract| extract(exif))
}

fn field_datetime(exif: &Exif, tag: Tag) -> Option<NaiveDateTime> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Ascii(parts) => parts.iter().find_map(|raw| parse_exif_datetime(raw)),
        _ => None,
    }
}

/// Parse the raw ASCII value of an EXIF datetime field.
pub fn parse_exif_datetime(raw: &[u8]) -> Option<NaiveDateTime> {
    let s = std::str::from_utf8(raw).ok()?;
    let s = s.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    NaiveDateTime::parse_from_str(s, EXIF_DATETIME_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg::tests::{datetime_field, jpeg_with_fields};
    use chrono::NaiveDate;
    use exif::Field;
    use std::io::Cursor;

    fn exif_of(fields: &[Field]) -> Exif {
        let bytes = jpeg_with_fields(fields);
        exif::Reader::new()
            .read_from_container(&mut Cursor::new(bytes))
            .unwrap()
    }

    fn dt(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 3, 4).unwrap().and_hms_opt(h, 5, 6).unwrap()
    }

    #[test]
    fn test_parse_exif_datetime() {
        assert_eq!(parse_exif_datetime(b"2021:03:04 10:05:06"), Some(dt(10)));
        assert_eq!(parse_exif_datetime(b"2021:03:04 10:05:06\0"), Some(dt(10)));
        assert_eq!(parse_exif_datetime(b"2021-03-04 10:05:06"), None);
        assert_eq!(parse_exif_datetime(b"    :  :     :  :  "), None);
        assert_eq!(parse_exif_datetime(b"0000:00:00 00:00:00"), None);
        assert_eq!(parse_exif_datetime(&[0xFF, 0xFE]), None);
    }

    #[test]
    fn test_original_wins() {
        let exif = exif_of(&[
            datetime_field(Tag::DateTime, "2021:03:04 12:05:06"),
            datetime_field(Tag::DateTimeDigitized, "2021:03:04 11:05:06"),
            datetime_field(Tag::DateTimeOriginal, "2021:03:04 10:05:06"),
        ]);
        assert_eq!(extract_capture_time(&exif), Some(dt(10)));
    }

    #[test]
    fn test_falls_back_past_malformed_fields() {
        let exif = exif_of(&[
            datetime_field(Tag::DateTime, "2021:03:04 12:05:06"),
            datetime_field(Tag::DateTimeDigitized, "2021:03:04 11:05:06"),
            datetime_field(Tag::DateTimeOriginal, "garbage"),
        ]);
        assert_eq!(extract_capture_time(&exif), Some(dt(11)));

        let exif = exif_of(&[
            datetime_field(Tag::DateTime, "2021:03:04 12:05:06"),
            datetime_field(Tag::DateTimeDigitized, "not a date"),
        ]);
        assert_eq!(extract_capture_time(&exif), Some(dt(12)));
    }

    #[test]
    fn test_no_time_fields() {
        let exif = exif_of(&[datetime_field(Tag::Software, "editor")]);
        assert_eq!(extract_capture_time(&exif), None);
    }
}
