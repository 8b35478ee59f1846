use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::detection::domain::anchor_detector::AnchorDetector;
use crate::detection::domain::candidate_detector::CandidateDetector;
use crate::detection::domain::eye_detector::EyeDetector;
use crate::video::domain::video_reader::VideoReader;

use super::frame_clock::FrameClock;
use super::frame_report::{FaceStatus, FrameReport};
use super::pipeline_logger::PipelineLogger;
use super::tracking_context::{Detectors, TrackingContext};

/// Called after every frame with its report and the context that produced
/// it. Returning `false` stops the loop.
pub type FrameCallback = Box<dyn FnMut(&FrameReport, &TrackingContext) -> bool + Send>;

/// Counts over one run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TrackingSummary {
    pub frames: usize,
    pub tracked_frames: usize,
    pub reconnections: usize,
    pub resets: usize,
    pub heatmap_resets: usize,
    /// Set when the source failed mid-run and ended the loop.
    pub source_error: Option<String>,
}

impl TrackingSummary {
    fn record(&mut self, report: &FrameReport) {
        self.frames += 1;
        if report.status.has_face() {
            self.tracked_frames += 1;
        }
        if report.status == FaceStatus::Reconnected {
            self.reconnections += 1;
        }
        if report.diagnostics.consistency_reset {
            self.resets += 1;
        }
        if report.diagnostics.heatmap_reset_distance.is_some() {
            self.heatmap_resets += 1;
        }
    }
}

/// Runs the tracking engine over a frame source until it ends, fails or is
/// cancelled.
///
/// Single-use: `execute` takes the owned components, so a second call fails.
pub struct TrackFacesUseCase {
    reader: Option<Box<dyn VideoReader>>,
    anchor_detector: Option<Box<dyn AnchorDetector>>,
    candidate_detector: Option<Box<dyn CandidateDetector>>,
    eye_detector: Option<Box<dyn EyeDetector>>,
    clock: Option<Box<dyn FrameClock>>,
    context: Option<TrackingContext>,
    logger: Box<dyn PipelineLogger>,
    on_frame: Option<FrameCallback>,
    cancelled: Arc<AtomicBool>,
}

impl TrackFacesUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reader: Box<dyn VideoReader>,
        anchor_detector: Box<dyn AnchorDetector>,
        candidate_detector: Box<dyn CandidateDetector>,
        eye_detector: Box<dyn EyeDetector>,
        clock: Box<dyn FrameClock>,
        context: TrackingContext,
        logger: Box<dyn PipelineLogger>,
        on_frame: Option<FrameCallback>,
        cancelled: Option<Arc<AtomicBool>>,
    ) -> Self {
        Self {
            reader: Some(reader),
            anchor_detector: Some(anchor_detector),
            candidate_detector: Some(candidate_detector),
            eye_detector: Some(eye_detector),
            clock: Some(clock),
            context: Some(context),
            logger,
            on_frame,
            cancelled: cancelled.unwrap_or_else(|| Arc::new(AtomicBool::new(false))),
        }
    }

    pub fn execute(&mut self, source: &Path) -> Result<TrackingSummary, Box<dyn std::error::Error>> {
        let mut reader = self.reader.take().ok_or("Pipeline already executed")?;
        let mut anchor = self.anchor_detector.take().ok_or("Pipeline already executed")?;
        let mut candidates = self
            .candidate_detector
            .take()
            .ok_or("Pipeline already executed")?;
        let mut eyes = self.eye_detector.take().ok_or("Pipeline already executed")?;
        let mut clock = self.clock.take().ok_or("Pipeline already executed")?;
        let mut context = self.context.take().ok_or("Pipeline already executed")?;

        let metadata = reader.open(source)?;
        log::info!(
            "Tracking {} ({}x{}, {} frames)",
            source.display(),
            metadata.width,
            metadata.height,
            metadata.total_frames
        );

        let mut summary = TrackingSummary::default();
        for item in reader.frames() {
            if self.cancelled.load(Ordering::Relaxed) {
                log::info!("Tracking cancelled after {} frames", summary.frames);
                break;
            }
            let frame = match item {
                Ok(frame) => frame,
                Err(e) => {
                    log::warn!("Frame source failed after {} frames: {e}", summary.frames);
                    summary.source_error = Some(e.to_string());
                    break;
                }
            };

            let now = clock.now(&frame);
            let mut detectors = Detectors {
                anchor: &mut *anchor,
                candidates: &mut *candidates,
                eyes: &mut *eyes,
            };
            let report = context.process_logged(&frame, now, &mut detectors, &mut *self.logger);
            summary.record(&report);
            self.logger.progress(summary.frames, metadata.total_frames);

            if let Some(on_frame) = self.on_frame.as_mut() {
                if !on_frame(&report, &context) {
                    break;
                }
            }
        }
        reader.close();

        self.logger.info(&format!(
            "Tracked a face in {}/{} frames ({} reconnections, {} resets)",
            summary.tracked_frames, summary.frames, summary.reconnections, summary.resets
        ));
        self.logger.summary();
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::eye_detector::{EyeDetection, LightingMode};
    use crate::pipeline::frame_clock::FrameRateClock;
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::shared::frame::Frame;
    use crate::shared::rect::Rect;
    use crate::shared::video_metadata::VideoMetadata;
    use crate::tracking::domain::tracking_config::TrackingConfig;
    use std::sync::Mutex;

    const W: u32 = 320;
    const H: u32 = 240;
    const FACE: Rect = Rect::new(100, 60, 80, 80);

    // --- Stubs ---

    struct StubReader {
        frames: Vec<Result<Frame, String>>,
        closed: Arc<Mutex<bool>>,
    }

    impl StubReader {
        fn new(count: usize) -> Self {
            Self::with_items((0..count).map(|i| Ok(frame(i))).collect())
        }

        fn with_items(frames: Vec<Result<Frame, String>>) -> Self {
            Self {
                frames,
                closed: Arc::new(Mutex::new(false)),
            }
        }
    }

    impl VideoReader for StubReader {
        fn open(&mut self, _path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
            Ok(VideoMetadata {
                width: W,
                height: H,
                fps: 30.0,
                total_frames: self.frames.len(),
                source_path: None,
            })
        }

        fn frames(
            &mut self,
        ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
            Box::new(self.frames.drain(..).map(|f| f.map_err(|e| e.into())))
        }

        fn close(&mut self) {
            *self.closed.lock().unwrap() = true;
        }
    }

    struct FailingOpenReader;

    impl VideoReader for FailingOpenReader {
        fn open(&mut self, _path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
            Err("camera unavailable".into())
        }

        fn frames(
            &mut self,
        ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
            Box::new(std::iter::empty())
        }

        fn close(&mut self) {}
    }

    struct FixedAnchor;

    impl AnchorDetector for FixedAnchor {
        fn detect(&mut self, _frame: &Frame) -> Result<Option<Rect>, Box<dyn std::error::Error>> {
            Ok(Some(FACE))
        }
    }

    struct FixedCandidate;

    impl CandidateDetector for FixedCandidate {
        fn detect(
            &mut self,
            _frame: &Frame,
            window: &Rect,
        ) -> Result<Vec<Rect>, Box<dyn std::error::Error>> {
            Ok(vec![FACE.translate(-window.x, -window.y)])
        }
    }

    struct NoEyes;

    impl EyeDetector for NoEyes {
        fn detect(&mut self, _region: &Frame) -> Result<EyeDetection, Box<dyn std::error::Error>> {
            Ok(EyeDetection {
                eyes: Vec::new(),
                lighting_mode: LightingMode::Normal,
                mean_brightness: 110.0,
            })
        }
    }

    fn frame(index: usize) -> Frame {
        Frame::new(vec![0u8; (W * H * 3) as usize], W, H, index)
    }

    fn use_case(
        reader: Box<dyn VideoReader>,
        on_frame: Option<FrameCallback>,
        cancelled: Option<Arc<AtomicBool>>,
    ) -> TrackFacesUseCase {
        TrackFacesUseCase::new(
            reader,
            Box::new(FixedAnchor),
            Box::new(FixedCandidate),
            Box::new(NoEyes),
            Box::new(FrameRateClock::new(30.0)),
            TrackingContext::new(TrackingConfig::default()).unwrap(),
            Box::new(NullPipelineLogger),
            on_frame,
            cancelled,
        )
    }

    // --- Tests ---

    #[test]
    fn test_summary_counts_tracked_frames() {
        let reader = StubReader::new(15);
        let closed = reader.closed.clone();
        let summary = use_case(Box::new(reader), None, None)
            .execute(Path::new("frames"))
            .unwrap();
        assert_eq!(summary.frames, 15);
        // the vote needs 10 frames; frames 9..15 carry the face
        assert_eq!(summary.tracked_frames, 6);
        assert_eq!(summary.resets, 0);
        assert!(summary.source_error.is_none());
        assert!(*closed.lock().unwrap());
    }

    #[test]
    fn test_callback_sees_every_report_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let on_frame: FrameCallback = Box::new(move |report, ctx| {
            assert!(ctx.heatmap().grid().is_some());
            sink.lock().unwrap().push(report.frame_index);
            true
        });
        use_case(Box::new(StubReader::new(5)), Some(on_frame), None)
            .execute(Path::new("frames"))
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_callback_can_stop_the_loop() {
        let on_frame: FrameCallback = Box::new(|report, _| report.frame_index < 2);
        let summary = use_case(Box::new(StubReader::new(10)), Some(on_frame), None)
            .execute(Path::new("frames"))
            .unwrap();
        assert_eq!(summary.frames, 3);
    }

    #[test]
    fn test_cancelled_before_start_processes_nothing() {
        let cancelled = Arc::new(AtomicBool::new(true));
        let summary = use_case(Box::new(StubReader::new(10)), None, Some(cancelled))
            .execute(Path::new("frames"))
            .unwrap();
        assert_eq!(summary.frames, 0);
    }

    #[test]
    fn test_cancel_from_callback_stops_at_next_frame() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let on_frame: FrameCallback = Box::new(move |report, _| {
            if report.frame_index == 3 {
                flag.store(true, Ordering::Relaxed);
            }
            true
        });
        let summary = use_case(Box::new(StubReader::new(10)), Some(on_frame), Some(cancelled))
            .execute(Path::new("frames"))
            .unwrap();
        assert_eq!(summary.frames, 4);
    }

    #[test]
    fn test_source_error_ends_loop() {
        let items = vec![Ok(frame(0)), Ok(frame(1)), Err("disconnected".to_string()), Ok(frame(3))];
        let summary = use_case(Box::new(StubReader::with_items(items)), None, None)
            .execute(Path::new("camera"))
            .unwrap();
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.source_error.as_deref(), Some("disconnected"));
    }

    #[test]
    fn test_open_failure_is_error() {
        let result = use_case(Box::new(FailingOpenReader), None, None).execute(Path::new("cam"));
        assert!(result.is_err());
    }

    #[test]
    fn test_second_execute_fails() {
        let mut uc = use_case(Box::new(StubReader::new(1)), None, None);
        uc.execute(Path::new("frames")).unwrap();
        let err = uc.execute(Path::new("frames")).unwrap_err();
        assert!(err.to_string().contains("already executed"));
    }
}
