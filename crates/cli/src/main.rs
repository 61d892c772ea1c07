use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};

use face_monitor_core::monitoring::domain::job_state::JobState;
use face_monitor_core::monitoring::domain::match_result::MatchResult;
use face_monitor_core::monitoring::face_monitor_service::{FaceMonitorService, SubmitRequest};
use face_monitor_core::monitoring::infrastructure::artifact_store::ArtifactStore;
use face_monitor_core::recognition::infrastructure::onnx_face_recognizer::OnnxRecognizerFactory;
use face_monitor_core::shared::constants::{IMAGE_EXTENSIONS, VIDEO_EXTENSIONS};
use face_monitor_core::shared::model_resolver::ProgressFn;
use face_monitor_core::shared::monitor_config::MonitorConfig;
use face_monitor_core::shared::timecode::format_timestamp;
use face_monitor_core::video::infrastructure::image_file_writer::ImageFileWriter;

/// Find a person in video footage from a single reference photo.
#[derive(Parser)]
#[command(name = "face-monitor", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a video for the face in a reference image.
    Scan(ScanArgs),
    /// Delete output files older than the retention period.
    Clean(CleanArgs),
}

#[derive(Args)]
struct ScanArgs {
    /// Reference photo (PNG or JPEG) of the person to look for.
    reference: PathBuf,

    /// Video to scan.
    video: PathBuf,

    /// Maximum face distance counted as a match (0.3-0.7).
    #[arg(long)]
    tolerance: Option<f64>,

    /// Scan every Nth frame.
    #[arg(long)]
    frequency: Option<u32>,

    /// Seconds between two recorded matches (0 records every matching frame).
    #[arg(long)]
    min_interval: Option<f64>,

    /// Directory for screenshots, previews and the event log.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// JSON settings file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Poll interval in milliseconds.
    #[arg(long, default_value = "250")]
    poll_ms: u64,

    /// Cancel the scan after this many seconds.
    #[arg(long)]
    stop_after_secs: Option<f64>,
}

#[derive(Args)]
struct CleanArgs {
    /// Output directory to sweep.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Retention period in days (0 keeps everything).
    #[arg(long)]
    days: Option<u32>,

    /// JSON settings file.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    match run() {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

/// Returns `false` when the command ran but the job failed.
fn run() -> Result<bool, Box<dyn std::error::Error>> {
    match Cli::parse().command {
        Command::Scan(args) => run_scan(args),
        Command::Clean(args) => run_clean(args).map(|()| true),
    }
}

fn run_scan(args: ScanArgs) -> Result<bool, Box<dyn std::error::Error>> {
    validate(&args)?;
    let mut config = MonitorConfig::load(args.config.as_deref())?;
    if let Some(dir) = args.output_dir.clone() {
        config.output_dir = dir;
    }

    log::info!("Resolving face models");
    let recognizers = OnnxRecognizerFactory::resolve(None, config.detector_confidence, |name| {
        let name = name.to_string();
        let progress: ProgressFn = Box::new(move |done, total| download_progress(&name, done, total));
        Some(progress)
    })?;
    eprintln!();

    let service = FaceMonitorService::with_defaults(config, Arc::new(recognizers));
    let id = service.submit(SubmitRequest {
        reference_image: std::fs::read(&args.reference)?,
        video_path: args.video.clone(),
        tolerance: args.tolerance,
        detection_frequency: args.frequency,
        min_match_interval_secs: args.min_interval,
    })?;
    eprintln!("Scanning {} (job {id})", args.video.display());

    let started = Instant::now();
    let stop_after = args.stop_after_secs.map(Duration::from_secs_f64);
    let poll_every = Duration::from_millis(args.poll_ms.max(1));
    let mut delivered = 0;
    let mut cancel_sent = false;

    let last = loop {
        let snapshot = service.poll(id, delivered)?;
        for result in &snapshot.new_results {
            eprint!("\r");
            print_match(result);
        }
        delivered += snapshot.new_results.len();

        if snapshot.completed {
            break snapshot;
        }
        match snapshot.progress {
            Some(p) => eprint!(
                "\rFrame {}/{} ({:.0}%)",
                snapshot.current_frame,
                snapshot.total_frames,
                p * 100.0
            ),
            None => eprint!("\rFrame {}", snapshot.current_frame),
        }

        if !cancel_sent && stop_after.is_some_and(|limit| started.elapsed() >= limit) {
            eprintln!("\nTime limit reached, stopping");
            service.cancel(id);
            cancel_sent = true;
        }
        thread::sleep(poll_every);
    };
    eprintln!();
    service.wait(id)?;

    println!(
        "{}: {} matches in {} sampled frames ({})",
        last.state,
        last.total_matches,
        last.processed_frames,
        format_timestamp(started.elapsed().as_secs_f64())
    );
    if let Some(error) = &last.error {
        println!("Reason: {error}");
    }
    if last.total_matches > 0 {
        println!(
            "Screenshots in {}",
            service.artifacts().screenshots_dir().display()
        );
    }
    Ok(last.state != JobState::Failed)
}

fn run_clean(args: CleanArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = MonitorConfig::load(args.config.as_deref())?;
    let root = args.output_dir.unwrap_or(config.output_dir);
    let days = args.days.unwrap_or(config.file_retention_days);

    let store = ArtifactStore::new(root, Box::new(ImageFileWriter::new()));
    let removed = store.sweep_expired_files(days);
    println!(
        "Removed {removed} files older than {days} days from {}",
        store.root().display()
    );
    Ok(())
}

fn print_match(result: &MatchResult) {
    println!(
        "#{} at {} ({} {}, distance {:.3}) {}",
        result.sequence_index,
        result.formatted_time,
        result.match_count,
        if result.match_count == 1 { "face" } else { "faces" },
        result.best_distance,
        result.screenshot_path.display()
    );
}

fn validate(args: &ScanArgs) -> Result<(), Box<dyn std::error::Error>> {
    if !args.reference.exists() {
        return Err(format!("Reference image not found: {}", args.reference.display()).into());
    }
    if !args.video.exists() {
        return Err(format!("Video not found: {}", args.video.display()).into());
    }
    if !has_extension(&args.reference, IMAGE_EXTENSIONS) {
        return Err(format!(
            "Reference must be one of {}: {}",
            IMAGE_EXTENSIONS.join(", "),
            args.reference.display()
        )
        .into());
    }
    if !has_extension(&args.video, VIDEO_EXTENSIONS) {
        log::warn!(
            "{} is not a {} file, trying anyway",
            args.video.display(),
            VIDEO_EXTENSIONS.join("/")
        );
    }
    if args.frequency == Some(0) {
        return Err("Frequency must be at least 1".into());
    }
    if let Some(t) = args.tolerance {
        if !(0.0..=1.0).contains(&t) {
            return Err(format!("Tolerance must be between 0.0 and 1.0, got {t}").into());
        }
    }
    if let Some(secs) = args.stop_after_secs {
        if !secs.is_finite() || secs < 0.0 {
            return Err(format!("--stop-after-secs must be non-negative, got {secs}").into());
        }
    }
    Ok(())
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn download_progress(name: &str, downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading {name}... {pct}%");
    } else {
        eprint!("\rDownloading {name}... {downloaded} bytes");
    }
}
