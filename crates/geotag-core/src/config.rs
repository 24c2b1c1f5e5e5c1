use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::date::normalize::validate_tz_offset;
use crate::error::{GeotagError, Result};
use crate::matcher::{MatchMethod, MatchParams};
use crate::report::REPORT_FILENAME;
use crate::track::{CsvOptions, TrackFormat};
use crate::writer::WriteMode;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Tagged copies in `output_dir`
    #[default]
    Copy,
    /// Rewrite originals in place
    Overwrite,
}

/// Everything a run needs. Missing JSON keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessOptions {
    pub photo_dir: PathBuf,
    pub track_path: PathBuf,
    /// Taken from the track file extension when absent
    pub track_format: Option<TrackFormat>,
    pub output_dir: PathBuf,
    pub output_mode: OutputMode,
    pub generate_report: bool,
    pub recursive: bool,
    /// UTC offset of the camera clock, hours
    pub tz_offset_hours: f64,
    /// Added to every photo time after zone conversion
    pub camera_offset_sec: f64,
    pub max_error_sec: f64,
    pub method: MatchMethod,
    pub max_distance_m: Option<f64>,
    pub csv: CsvOptions,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        let params = MatchParams::default();
        Self {
            photo_dir: PathBuf::new(),
            track_path: PathBuf::new(),
            track_format: None,
            output_dir: PathBuf::from("output"),
            output_mode: OutputMode::Copy,
            generate_report: true,
            recursive: false,
            tz_offset_hours: params.tz_offset_hours,
            camera_offset_sec: params.camera_offset_sec,
            max_error_sec: params.max_error_sec,
            method: params.method,
            max_distance_m: params.max_distance_m,
            csv: CsvOptions::default(),
        }
    }
}

impl ProcessOptions {
    /// Load options from a JSON file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path).with_context(|| format!("Failed to open config {}", path.display()))?;
        let options = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(options)
    }

    /// Save options as pretty JSON, via a temp file and a rename.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let temp_path = path.with_extension("json.tmp");
        let file = File::create(&temp_path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    pub fn match_params(&self) -> MatchParams {
        MatchParams {
            tz_offset_hours: self.tz_offset_hours,
            camera_offset_sec: self.camera_offset_sec,
            max_error_sec: self.max_error_sec,
            method: self.method,
            max_distance_m: self.max_distance_m,
        }
    }

    pub fn write_mode(&self) -> WriteMode {
        match self.output_mode {
            OutputMode::Copy => WriteMode::Copy {
                output_dir: self.output_dir.clone(),
            },
            OutputMode::Overwrite => WriteMode::Overwrite,
        }
    }

    /// Report location: the output directory when copying, the photo
    /// directory when overwriting. None when reporting is off.
    pub fn report_path(&self) -> Option<PathBuf> {
        if !self.generate_report {
            return None;
        }
        Some(match self.output_mode {
            OutputMode::Copy => self.output_dir.join(REPORT_FILENAME),
            OutputMode::Overwrite => self.photo_dir.join(REPORT_FILENAME),
        })
    }

    /// Check every option before any work starts.
    pub fn validate(&self) -> Result<()> {
        if self.photo_dir.as_os_str().is_empty() {
            return Err(GeotagError::Configuration("photo directory is not set".to_string()));
        }
        if self.track_path.as_os_str().is_empty() {
            return Err(GeotagError::Configuration("track file is not set".to_string()));
        }
        if self.output_mode == OutputMode::Copy && self.output_dir.as_os_str().is_empty() {
            return Err(GeotagError::Configuration("output directory is not set".to_string()));
        }
        self.match_params().validate()?;

        let csv = &self.csv;
        for (what, name) in [("time", &csv.time_column), ("lat", &csv.lat_column), ("lon", &csv.lon_column)] {
            if name.trim().is_empty() {
                return Err(GeotagError::Configuration(format!("CSV {what} column name is empty")));
            }
        }
        if !csv.time_is_utc {
            validate_tz_offset(csv.tz_offset_hours)?;
        }
        Ok(())
    }
}
