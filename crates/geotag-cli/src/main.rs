use std::path::PathBuf;
use std::sync::Mutex;

use clap::Parser;
use geotag_core::track::CsvTimeFormat;
use geotag_core::{MatchMethod, OutputMode, ProcessOptions, TrackFormat};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "geotag-rs-cli", version, about = "Geotag photos by matching capture times against a GPS track")]
struct Cli {
    /// Directory containing the JPEG photos
    #[arg(short, long)]
    photos: Option<PathBuf>,

    /// GPS track file (.gpx or .csv)
    #[arg(short, long)]
    track: Option<PathBuf>,

    /// Track format: "gpx" or "csv" (default: from the file extension)
    #[arg(long)]
    track_format: Option<TrackFormat>,

    /// Output directory for tagged copies
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write GPS into the original files instead of making copies
    #[arg(long)]
    overwrite: bool,

    /// Do not write the CSV report
    #[arg(long)]
    no_report: bool,

    /// Also scan subdirectories
    #[arg(short, long)]
    recursive: bool,

    /// UTC offset of the camera clock in hours, e.g. 8 or -3.5
    #[arg(long, allow_negative_numbers = true)]
    tz_offset: Option<f64>,

    /// Seconds added to every photo time to correct camera clock drift
    #[arg(long, allow_negative_numbers = true)]
    camera_offset: Option<f64>,

    /// Largest accepted time gap between photo and track, in seconds
    #[arg(long)]
    max_error: Option<f64>,

    /// Matching method: "interp" or "nearest"
    #[arg(long)]
    method: Option<MatchMethod>,

    /// Fall back to nearest-point when bracketing track points are further apart (meters)
    #[arg(long)]
    max_distance: Option<f64>,

    /// CSV column holding the time
    #[arg(long)]
    csv_time_column: Option<String>,

    /// CSV column holding the latitude
    #[arg(long)]
    csv_lat_column: Option<String>,

    /// CSV column holding the longitude
    #[arg(long)]
    csv_lon_column: Option<String>,

    /// CSV time format: "auto", "timestamp" or "iso"
    #[arg(long)]
    csv_time_format: Option<CsvTimeFormat>,

    /// CSV times without a zone are local time at this UTC offset (hours)
    #[arg(long, allow_negative_numbers = true)]
    csv_tz_offset: Option<f64>,

    /// Start from options saved in a JSON file; flags override them
    #[arg(long)]
    config: Option<PathBuf>,

    /// Save the effective options to a JSON file
    #[arg(long)]
    save_config: Option<PathBuf>,
}

impl Cli {
    fn apply(self, options: &mut ProcessOptions) {
        if let Some(v) = self.photos {
            options.photo_dir = v;
        }
        if let Some(v) = self.track {
            options.track_path = v;
        }
        if self.track_format.is_some() {
            options.track_format = self.track_format;
        }
        if let Some(v) = self.output {
            options.output_dir = v;
        }
        if self.overwrite {
            options.output_mode = OutputMode::Overwrite;
        }
        if self.no_report {
            options.generate_report = false;
        }
        if self.recursive {
            options.recursive = true;
        }
        if let Some(v) = self.tz_offset {
            options.tz_offset_hours = v;
        }
        if let Some(v) = self.camera_offset {
            options.camera_offset_sec = v;
        }
        if let Some(v) = self.max_error {
            options.max_error_sec = v;
        }
        if let Some(v) = self.method {
            options.method = v;
        }
        if self.max_distance.is_some() {
            options.max_distance_m = self.max_distance;
        }
        if let Some(v) = self.csv_time_column {
            options.csv.time_column = v;
        }
        if let Some(v) = self.csv_lat_column {
            options.csv.lat_column = v;
        }
        if let Some(v) = self.csv_lon_column {
            options.csv.lon_column = v;
        }
        if let Some(v) = self.csv_time_format {
            options.csv.time_format = v;
        }
        if let Some(v) = self.csv_tz_offset {
            options.csv.time_is_utc = false;
            options.csv.tz_offset_hours = v;
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut cli = Cli::parse();
    let t_total = std::time::Instant::now();

    let mut options = match cli.config.take() {
        Some(path) => ProcessOptions::load(&path)?,
        None => ProcessOptions::default(),
    };
    let save_config = cli.save_config.take();
    cli.apply(&mut options);
    options.validate()?;

    if let Some(path) = save_config {
        options.save(&path)?;
        eprintln!("Saved options to {}", path.display());
    }

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40}] {pos}/{len} {prefix} {msg}")
            .unwrap(),
    );
    let current_stage = Mutex::new(String::new());

    let result = geotag_core::process(&options, &|stage, current, total, message| {
        let mut last = current_stage.lock().unwrap_or_else(|e| e.into_inner());
        if *last != stage {
            *last = stage.to_string();
            pb.reset();
            pb.set_prefix(stage.to_string());
        }
        pb.set_length(total);
        pb.set_position(current);
        pb.set_message(message.to_string());
    });
    pb.finish_and_clear();
    let result = result?;

    let s = &result.summary;
    eprintln!(
        "Done! {} photos: {} matched, {} unmatched, {} already had GPS, {} without time, {} write failures ({:.2}s)",
        s.total,
        s.matched,
        s.unmatched,
        s.already_gps,
        s.no_time,
        s.write_failed,
        t_total.elapsed().as_secs_f64()
    );
    eprintln!("Track: {} points", result.track_points);
    match &result.output_dir {
        Some(dir) => eprintln!("Wrote {} tagged copies to {}", result.files_written, dir.display()),
        None => eprintln!("Updated {} photos in place", result.files_written),
    }
    if let Some(report) = &result.report_path {
        eprintln!("Report: {}", report.display());
    }

    Ok(())
}
