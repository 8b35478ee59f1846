use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use facetrack_core::detection::infrastructure::contrast_eye_detector::ContrastEyeDetector;
use facetrack_core::detection::infrastructure::onnx_anchor_detector::{
    OnnxAnchorDetector, DEFAULT_CONFIDENCE,
};
use facetrack_core::detection::infrastructure::skin_tone_candidate_detector::SkinToneCandidateDetector;
use facetrack_core::pipeline::frame_clock::{FrameClock, FrameRateClock, WallClock};
use facetrack_core::pipeline::frame_report::FrameReport;
use facetrack_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use facetrack_core::pipeline::track_faces_use_case::{FrameCallback, TrackFacesUseCase};
use facetrack_core::pipeline::tracking_context::TrackingContext;
use facetrack_core::shared::constants::{DEFAULT_SEQUENCE_FPS, YOLO_MODEL_NAME, YOLO_MODEL_URL};
use facetrack_core::shared::model_resolver::{self, ModelSource};
use facetrack_core::tracking::domain::tracking_config::TrackingConfig;
use facetrack_core::video::infrastructure::image_sequence_reader::ImageSequenceReader;

/// Temporal face and eye tracking over an image or a directory of frames.
#[derive(Parser)]
#[command(name = "facetrack")]
struct Cli {
    /// Input image, or directory of frames read in file-name order.
    input: PathBuf,

    /// JSON tracking configuration; omitted fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Frame rate of the sequence, used to time anchor detections.
    #[arg(long, default_value_t = DEFAULT_SEQUENCE_FPS)]
    fps: f64,

    /// Anchor movement (px) that shortens the detection interval.
    #[arg(long)]
    threshold: Option<f64>,

    /// Frames a candidate must recur in before it is tracked.
    #[arg(long)]
    min_consistency: Option<usize>,

    /// Consecutive empty frames before tracking state is reset.
    #[arg(long)]
    max_reset: Option<usize>,

    /// Anchor detector confidence threshold (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
    anchor_confidence: f64,

    /// Use this ONNX face model instead of the cached download.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Write a heatmap PNG per frame into this directory.
    #[arg(long)]
    heatmap_dir: Option<PathBuf>,

    /// Write JSON-lines frame reports here instead of stdout.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Padding (px) around the tracked face for eye detection.
    #[arg(long)]
    face_padding: Option<i32>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;
    let config = load_config(&cli)?;

    let anchor_detector = build_anchor_detector(&cli)?;
    let context = TrackingContext::new(config)?;

    if let Some(dir) = &cli.heatmap_dir {
        fs::create_dir_all(dir)?;
    }
    let sink: Box<dyn Write + Send> = match &cli.report {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout()),
    };
    let on_frame = report_writer(sink, cli.heatmap_dir.clone());

    let mut use_case = TrackFacesUseCase::new(
        Box::new(ImageSequenceReader::new(cli.fps)),
        anchor_detector,
        Box::new(SkinToneCandidateDetector::default()),
        Box::new(ContrastEyeDetector::new()),
        build_clock(&cli.input, cli.fps),
        context,
        Box::new(StdoutPipelineLogger::default()),
        Some(on_frame),
        None,
    );
    let summary = use_case.execute(&cli.input)?;

    log::info!(
        "{} frames, face tracked in {}, {} reconnections, {} resets, {} heatmap resets",
        summary.frames,
        summary.tracked_frames,
        summary.reconnections,
        summary.resets,
        summary.heatmap_resets
    );
    if let Some(e) = summary.source_error {
        return Err(format!("Frame source failed: {e}").into());
    }
    Ok(())
}

/// Writes each report as one JSON line and, when `heatmap_dir` is set, the
/// heatmap as a PNG. Stops the loop on the first write error.
fn report_writer(mut sink: Box<dyn Write + Send>, heatmap_dir: Option<PathBuf>) -> FrameCallback {
    Box::new(move |report, context| {
        let written = write_report(&mut sink, report).and_then(|_| match &heatmap_dir {
            Some(dir) => write_heatmap(dir, report.frame_index, context),
            None => Ok(()),
        });
        match written {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to write output for frame {}: {e}", report.frame_index);
                false
            }
        }
    })
}

fn write_report(
    sink: &mut Box<dyn Write + Send>,
    report: &FrameReport,
) -> Result<(), Box<dyn std::error::Error>> {
    serde_json::to_writer(&mut *sink, report)?;
    sink.write_all(b"\n")?;
    sink.flush()?;
    Ok(())
}

fn write_heatmap(
    dir: &Path,
    frame_index: usize,
    context: &TrackingContext,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(image) = context.heatmap().to_image() {
        image.save(dir.join(format!("heatmap_{frame_index:06}.png")))?;
    }
    Ok(())
}

/// Directories are timed by frame rate; a single still has none, so it runs on
/// wall time.
fn build_clock(input: &Path, fps: f64) -> Box<dyn FrameClock> {
    if input.is_dir() {
        Box::new(FrameRateClock::new(fps))
    } else {
        Box::new(WallClock::new())
    }
}

fn build_anchor_detector(cli: &Cli) -> Result<Box<OnnxAnchorDetector>, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {YOLO_MODEL_NAME}");
    let source = ModelSource {
        name: YOLO_MODEL_NAME,
        url: YOLO_MODEL_URL,
        override_path: cli.model.as_deref(),
    };
    let model_path = model_resolver::resolve(&source, Some(Box::new(download_progress)))?;
    Ok(Box::new(OnnxAnchorDetector::new(
        &model_path,
        cli.anchor_confidence,
    )?))
}

fn load_config(cli: &Cli) -> Result<TrackingConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => TrackingConfig::from_json_file(path)?,
        None => TrackingConfig::default(),
    };
    apply_overrides(&mut config, cli);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(config: &mut TrackingConfig, cli: &Cli) {
    if let Some(threshold) = cli.threshold {
        config.scheduler.position_change_threshold = threshold;
    }
    if let Some(frames) = cli.min_consistency {
        config.consistency.min_consistency_frames = frames;
    }
    if let Some(frames) = cli.max_reset {
        config.consistency.max_reset_frames = frames;
    }
    if let Some(padding) = cli.face_padding {
        config.eyes.region_padding = padding;
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.input.exists() {
        return Err(format!("Input not found: {}", cli.input.display()).into());
    }
    if !(cli.fps.is_finite() && cli.fps > 0.0) {
        return Err(format!("Frame rate must be positive, got {}", cli.fps).into());
    }
    if !(0.0..=1.0).contains(&cli.anchor_confidence) {
        return Err(format!(
            "Anchor confidence must be between 0.0 and 1.0, got {}",
            cli.anchor_confidence
        )
        .into());
    }
    if let Some(padding) = cli.face_padding {
        if padding < 0 {
            return Err(format!("Face padding must not be negative, got {padding}").into());
        }
    }
    Ok(())
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("facetrack").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["frames"]);
        assert_eq!(cli.fps, DEFAULT_SEQUENCE_FPS);
        assert_eq!(cli.anchor_confidence, DEFAULT_CONFIDENCE);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let cli = parse(&[
            "frames",
            "--threshold",
            "12",
            "--min-consistency",
            "6",
            "--max-reset",
            "25",
            "--face-padding",
            "8",
        ]);
        let mut config = TrackingConfig::default();
        apply_overrides(&mut config, &cli);
        assert_eq!(config.scheduler.position_change_threshold, 12.0);
        assert_eq!(config.consistency.min_consistency_frames, 6);
        assert_eq!(config.consistency.max_reset_frames, 25);
        assert_eq!(config.eyes.region_padding, 8);
        assert_eq!(config.consistency.history_capacity, 150);
    }

    #[test]
    fn test_validate_rejects_missing_input() {
        assert!(validate(&parse(&["/nonexistent/frames"])).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_confidence() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().to_str().unwrap();
        assert!(validate(&parse(&[input, "--anchor-confidence", "1.5"])).is_err());
        assert!(validate(&parse(&[input, "--fps", "0"])).is_err());
        assert!(validate(&parse(&[input])).is_ok());
    }

    #[test]
    fn test_clock_follows_input_kind() {
        let dir = tempfile::tempdir().unwrap();
        let still = dir.path().join("face.png");
        fs::write(&still, b"").unwrap();
        let frame = facetrack_core::shared::frame::Frame::new(vec![0; 3], 1, 1, 30);

        // 30 frames at 30 fps is one second of sequence time
        assert_eq!(build_clock(dir.path(), 30.0).now(&frame), 1.0);
        assert!(build_clock(&still, 30.0).now(&frame) < 1.0);
    }

    #[test]
    fn test_report_line_is_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.jsonl");
        let mut sink: Box<dyn Write + Send> = Box::new(File::create(&path).unwrap());
        let report = FrameReport {
            frame_index: 7,
            timestamp: 0.25,
            status: facetrack_core::pipeline::frame_report::FaceStatus::Absent,
            tracked_face: None,
            last_known_face: None,
            eye_region: None,
            eyes: Vec::new(),
            anchor: None,
            candidates: Vec::new(),
            diagnostics: Default::default(),
        };
        write_report(&mut sink, &report).unwrap();
        drop(sink);
        let text = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(value["frame_index"], 7);
        assert_eq!(value["status"], "absent");
    }
}
