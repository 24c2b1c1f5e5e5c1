use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::Mutex;

use exif::{Field, In, Tag, Value};
use geotag_core::gps::tags::read_gps;
use geotag_core::jpeg::{embed_exif, encode_tiff};
use geotag_core::metadata::read_exif;
use geotag_core::report::REPORT_FILENAME;
use geotag_core::{process, GeotagError, MatchMethod, MatchStatus, OutputMode, ProcessOptions};

const BARE_JPEG: &[u8] = &[
    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00, 0x01,
    0x00, 0x01, 0x00, 0x00, 0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3F, 0x00, 0x12, 0x34,
    0xFF, 0xD9,
];

fn ascii(tag: Tag, value: &str) -> Field {
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![value.as_bytes().to_vec()]),
    }
}

fn photo_taken_at(path: &Path, exif_time: &str) {
    let field = ascii(Tag::DateTimeOriginal, exif_time);
    let tiff = encode_tiff(&[&field], false).unwrap();
    fs::write(path, embed_exif(BARE_JPEG, tiff).unwrap()).unwrap();
}

fn photo_with_gps(path: &Path) {
    let mut fields = geotag_core::gps::tags::gps_fields(51.5, -0.12).unwrap();
    fields.push(ascii(Tag::DateTimeOriginal, "2024:01:01 08:00:30"));
    let refs: Vec<&Field> = fields.iter().collect();
    fs::write(path, embed_exif(BARE_JPEG, encode_tiff(&refs, true).unwrap()).unwrap()).unwrap();
}

fn gps_of(path: &Path) -> Option<(f64, f64)> {
    let exif = read_exif(&mut Cursor::new(fs::read(path).unwrap()))?;
    read_gps(&exif)
}

const GPX: &str = r#"<?xml version="1.0"?>
<gpx version="1.1" creator="logger">
  <trk><trkseg>
    <trkpt lat="10.01" lon="20.02"><time>2024-01-01T00:01:40Z</time></trkpt>
    <trkpt lat="10.0" lon="20.0"><time>2024-01-01T00:00:00Z</time></trkpt>
  </trkseg></trk>
</gpx>"#;

#[test]
fn test_copy_mode_end_to_end() {
    let root = tempfile::tempdir().unwrap();
    let photos = root.path().join("photos");
    fs::create_dir(&photos).unwrap();
    // camera at UTC+8
    photo_taken_at(&photos.join("a.jpg"), "2024:01:01 08:00:25");
    photo_with_gps(&photos.join("b.jpg"));
    fs::write(photos.join("c.jpg"), BARE_JPEG).unwrap();
    photo_taken_at(&photos.join("d.jpg"), "2024:01:01 08:08:20");
    fs::write(photos.join("readme.txt"), "ignored").unwrap();

    let track = root.path().join("ride.gpx");
    fs::write(&track, GPX).unwrap();

    let options = ProcessOptions {
        photo_dir: photos.clone(),
        track_path: track,
        output_dir: root.path().join("out"),
        ..ProcessOptions::default()
    };
    let stages = Mutex::new(Vec::<String>::new());
    let result = process(&options, &|stage, _, _, _| {
        let mut seen = stages.lock().unwrap();
        if seen.last().map(String::as_str) != Some(stage) {
            seen.push(stage.to_string());
        }
    })
    .unwrap();
    assert_eq!(*stages.lock().unwrap(), vec!["track", "scan", "match", "write"]);

    assert_eq!(result.track_points, 2);
    assert_eq!(result.summary.total, 4);
    assert_eq!(result.summary.matched, 1);
    assert_eq!(result.summary.unmatched, 1);
    assert_eq!(result.summary.already_gps, 1);
    assert_eq!(result.summary.no_time, 1);
    assert_eq!(result.summary.needs_match, 2);
    assert_eq!(result.files_written, 1);
    assert_eq!(result.files_failed, 0);

    let statuses: Vec<_> = result.results.iter().map(|r| r.status()).collect();
    assert_eq!(
        statuses,
        vec![MatchStatus::Matched, MatchStatus::AlreadyGps, MatchStatus::NoTime, MatchStatus::TooFar]
    );
    assert_eq!(result.results[0].method(), Some(MatchMethod::Interp));
    assert_eq!(result.results[3].error_sec(), Some(400.0));

    let (lat, lon) = gps_of(&root.path().join("out").join("a.jpg")).unwrap();
    assert!((lat - 10.0025).abs() < 1e-6);
    assert!((lon - 20.005).abs() < 1e-6);
    // original untouched, other photos not copied
    assert!(gps_of(&photos.join("a.jpg")).is_none());
    assert!(!root.path().join("out").join("d.jpg").exists());

    let report = fs::read_to_string(root.path().join("out").join(REPORT_FILENAME)).unwrap();
    assert_eq!(report.lines().count(), 5);
    assert!(report.lines().nth(1).unwrap().contains(",matched,25.00,10.002500,20.005000,interp,"));
    assert_eq!(result.report_path, Some(root.path().join("out").join(REPORT_FILENAME)));
}

#[test]
fn test_overwrite_mode_with_csv_track() {
    let root = tempfile::tempdir().unwrap();
    let photos = root.path().join("photos");
    fs::create_dir_all(photos.join("day2")).unwrap();
    photo_taken_at(&photos.join("top.jpg"), "2024:01:01 00:00:40");
    photo_taken_at(&photos.join("day2").join("nested.jpg"), "2024:01:01 00:01:30");

    // tracking-app export: unix seconds, custom column names
    let track = root.path().join("export.csv");
    fs::write(
        &track,
        "dataTime,locType,longitude,latitude\n1704067200,1,20.0,10.0\n1704067300,1,20.0,10.1\n",
    )
    .unwrap();

    let mut options = ProcessOptions {
        photo_dir: photos.clone(),
        track_path: track,
        output_mode: OutputMode::Overwrite,
        recursive: true,
        tz_offset_hours: 0.0,
        method: MatchMethod::Nearest,
        ..ProcessOptions::default()
    };
    options.csv.time_column = "dataTime".to_string();
    options.csv.lat_column = "latitude".to_string();
    options.csv.lon_column = "longitude".to_string();

    let result = process(&options, &|_, _, _, _| {}).unwrap();
    assert_eq!(result.summary.matched, 2);
    assert_eq!(result.output_dir, None);

    assert_eq!(gps_of(&photos.join("top.jpg")).map(|(lat, _)| (lat * 1e6).round() / 1e6), Some(10.0));
    let (lat, _) = gps_of(&photos.join("day2").join("nested.jpg")).unwrap();
    assert!((lat - 10.1).abs() < 1e-6);
    assert!(photos.join(REPORT_FILENAME).exists());
}

#[test]
fn test_empty_track_aborts_before_scanning() {
    let root = tempfile::tempdir().unwrap();
    let photos = root.path().join("photos");
    fs::create_dir(&photos).unwrap();
    photo_taken_at(&photos.join("a.jpg"), "2024:01:01 08:00:25");
    let track = root.path().join("empty.gpx");
    fs::write(&track, r#"<gpx version="1.1" creator="logger"><trk><trkseg></trkseg></trk></gpx>"#).unwrap();

    let options = ProcessOptions {
        photo_dir: photos,
        track_path: track,
        output_dir: root.path().join("out"),
        ..ProcessOptions::default()
    };
    let err = process(&options, &|_, _, _, _| {}).unwrap_err();
    assert!(matches!(err.downcast_ref::<GeotagError>(), Some(GeotagError::EmptyTrack)));
    assert!(!root.path().join("out").exists());
}

#[test]
fn test_unknown_track_extension() {
    let root = tempfile::tempdir().unwrap();
    let track = root.path().join("track.kml");
    fs::write(&track, "<kml/>").unwrap();
    let options = ProcessOptions {
        photo_dir: root.path().to_path_buf(),
        track_path: track,
        ..ProcessOptions::default()
    };
    assert!(process(&options, &|_, _, _, _| {}).is_err());
}
