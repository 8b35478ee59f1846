use std::time::Instant;

use crate::detection::domain::anchor_detector::AnchorDetector;
use crate::detection::domain::candidate_detector::CandidateDetector;
use crate::detection::domain::eye_detector::EyeDetector;
use crate::pipeline::frame_report::{Diagnostics, FaceStatus, FrameReport};
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use crate::shared::frame::Frame;
use crate::shared::rect::Rect;
use crate::tracking::domain::anchor_scheduler::AnchorScheduler;
use crate::tracking::domain::anchor_smoother::{AnchorSmoother, SmoothedAnchor};
use crate::tracking::domain::candidate_selector::CandidateSelector;
use crate::tracking::domain::consistency_buffer::{ConsistencyBuffer, RecordOutcome};
use crate::tracking::domain::eye_consistency_tracker::{eye_region, EyeConsistencyTracker};
use crate::tracking::domain::heatmap_accumulator::{HeatmapAccumulator, HeatmapUpdate};
use crate::tracking::domain::position_integrator::PositionIntegrator;
use crate::tracking::domain::tracking_config::{ConfigError, TrackingConfig};

/// The three external detectors, borrowed for one frame.
pub struct Detectors<'a> {
    pub anchor: &'a mut dyn AnchorDetector,
    pub candidates: &'a mut dyn CandidateDetector,
    pub eyes: &'a mut dyn EyeDetector,
}

/// All tracking state, advanced by one full pass per frame.
///
/// Pass order: schedule and run the anchor detector, smooth, select
/// candidates, update the heatmap, record and vote, integrate or reconnect
/// the face, then track eyes inside the padded face. The heatmap and the
/// integrator see the same anchor snapshot.
pub struct TrackingContext {
    config: TrackingConfig,
    scheduler: AnchorScheduler,
    smoother: AnchorSmoother,
    selector: CandidateSelector,
    buffer: ConsistencyBuffer,
    integrator: PositionIntegrator,
    heatmap: HeatmapAccumulator,
    eyes: EyeConsistencyTracker,
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

impl TrackingContext {
    pub fn new(config: TrackingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            scheduler: AnchorScheduler::new(config.scheduler.clone()),
            smoother: AnchorSmoother::new(config.smoother.alpha),
            selector: CandidateSelector::new(config.selector.clone()),
            buffer: ConsistencyBuffer::new(config.consistency.clone()),
            integrator: PositionIntegrator::new(config.integrator.clone()),
            heatmap: HeatmapAccumulator::new(config.heatmap.clone()),
            eyes: EyeConsistencyTracker::new(config.eyes.clone()),
            config,
        })
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    pub fn heatmap(&self) -> &HeatmapAccumulator {
        &self.heatmap
    }

    pub fn smoothed_anchor(&self) -> SmoothedAnchor {
        self.smoother.snapshot()
    }

    /// Current or last known face.
    pub fn last_known_face(&self) -> Option<Rect> {
        self.integrator.tracked().map(|f| f.rect)
    }

    /// Runs one pass at time `now` (seconds).
    pub fn process(&mut self, frame: &Frame, now: f64, detectors: &mut Detectors<'_>) -> FrameReport {
        self.process_logged(frame, now, detectors, &mut NullPipelineLogger)
    }

    /// [`process`](Self::process) with stage timings and metrics sent to
    /// `logger`.
    pub fn process_logged(
        &mut self,
        frame: &Frame,
        now: f64,
        detectors: &mut Detectors<'_>,
        logger: &mut dyn PipelineLogger,
    ) -> FrameReport {
        let (frame_w, frame_h) = (frame.width(), frame.height());
        let mut diagnostics = Diagnostics::default();

        let started = Instant::now();
        let anchor = self.update_anchor(frame, now, detectors.anchor, &mut diagnostics);
        let anchor_rect = anchor.rect();
        logger.timing("anchor", elapsed_ms(started));

        let started = Instant::now();
        let candidates = self
            .selector
            .select(frame, anchor_rect, detectors.candidates)
            .unwrap_or_else(|e| {
                log::warn!("Candidate detection failed on frame {}: {e}", frame.index());
                Vec::new()
            });
        if let HeatmapUpdate::Reset { distance } =
            self.heatmap.update(anchor_rect, &candidates, frame_w, frame_h)
        {
            diagnostics.heatmap_reset_distance = Some(distance);
        }
        diagnostics.max_heat = self.heatmap.max_heat();
        logger.timing("candidates", elapsed_ms(started));

        let started = Instant::now();
        if self.buffer.record(&candidates) == RecordOutcome::Reset {
            log::info!(
                "Consistency reset, no candidates for {} frames",
                self.config.consistency.max_reset_frames
            );
            self.integrator.clear();
            diagnostics.consistency_reset = true;
        }
        diagnostics.reset_counter = self.buffer.reset_counter();
        let status = self.advance_face(&candidates, &anchor, frame_w, frame_h, &mut diagnostics);
        diagnostics.average_face_size = self.integrator.average_face_size();
        logger.timing("track", elapsed_ms(started));

        let started = Instant::now();
        let (eye_region, eyes) = if status.has_face() {
            self.track_eyes(frame, detectors.eyes, &mut diagnostics)
        } else {
            (None, Vec::new())
        };
        logger.timing("eyes", elapsed_ms(started));

        logger.metric("anchor_interval", diagnostics.anchor_interval);
        logger.metric("reset_counter", diagnostics.reset_counter as f64);
        logger.metric("max_heat", diagnostics.max_heat as f64);
        if let Some(ratio) = diagnostics.size_ratio {
            logger.metric("size_ratio", ratio);
        }

        let last_known_face = self.last_known_face();
        FrameReport {
            frame_index: frame.index(),
            timestamp: now,
            status,
            tracked_face: last_known_face.filter(|_| status.has_face()),
            last_known_face,
            eye_region,
            eyes,
            anchor: anchor_rect,
            candidates,
            diagnostics,
        }
    }

    fn update_anchor(
        &mut self,
        frame: &Frame,
        now: f64,
        detector: &mut dyn AnchorDetector,
        diagnostics: &mut Diagnostics,
    ) -> SmoothedAnchor {
        let decision = self.scheduler.poll(now, &self.smoother.snapshot());
        diagnostics.anchor_interval = decision.interval;
        diagnostics.anchor_invoked = decision.invoke;
        if decision.invoke {
            match detector.detect(frame) {
                Ok(Some(raw)) => {
                    let smoothed = self.smoother.observe(raw);
                    diagnostics.raw_anchor = Some(raw);
                    log::debug!(
                        "Anchor at {raw:?}, smoothed {smoothed:?} (interval {:.2}s)",
                        decision.interval
                    );
                }
                Ok(None) => {}
                Err(e) => log::warn!("Anchor detection failed on frame {}: {e}", frame.index()),
            }
        }
        let anchor = self.smoother.snapshot();
        diagnostics.average_anchor_size = anchor.average_size();
        anchor
    }

    fn advance_face(
        &mut self,
        candidates: &[Rect],
        anchor: &SmoothedAnchor,
        frame_w: u32,
        frame_h: u32,
        diagnostics: &mut Diagnostics,
    ) -> FaceStatus {
        if let Some(consistent) = self.buffer.consistent_detection() {
            if self.integrator.tracked().is_none() {
                return if self.integrator.place(consistent, frame_w, frame_h) {
                    FaceStatus::Tracking
                } else {
                    FaceStatus::Absent
                };
            }
            // Without a current candidate the face holds its position.
            if let Some((target, _)) = consistent.nearest(candidates) {
                let step = self.integrator.integrate(target, anchor, frame_w, frame_h);
                diagnostics.size_ratio = step.and_then(|s| s.size_ratio);
                diagnostics.integration = step;
            }
            return FaceStatus::Tracking;
        }

        let Some(last_known) = self.last_known_face() else {
            return FaceStatus::Absent;
        };
        match self.buffer.reacquire(&last_known, candidates) {
            Some((candidate, distance)) if self.integrator.place(candidate, frame_w, frame_h) => {
                log::info!("Reconnecting lost face to nearest candidate at {distance:.0}px");
                diagnostics.reconnect_distance = Some(distance);
                FaceStatus::Reconnected
            }
            _ => FaceStatus::Lost,
        }
    }

    fn track_eyes(
        &mut self,
        frame: &Frame,
        detector: &mut dyn EyeDetector,
        diagnostics: &mut Diagnostics,
    ) -> (Option<Rect>, Vec<Rect>) {
        let region = self.last_known_face().and_then(|face| {
            eye_region(
                &face,
                self.config.eyes.region_padding,
                frame.width(),
                frame.height(),
            )
        });
        let Some((region, roi)) = region.and_then(|r| frame.crop(&r).map(|roi| (r, roi))) else {
            return (None, Vec::new());
        };

        let current = match detector.detect(&roi) {
            Ok(detection) => {
                diagnostics.lighting_mode = Some(detection.lighting_mode);
                diagnostics.mean_brightness = Some(detection.mean_brightness);
                detection.eyes
            }
            Err(e) => {
                log::warn!("Eye detection failed on frame {}: {e}", frame.index());
                Vec::new()
            }
        };
        let eyes = self
            .eyes
            .update(&current)
            .into_iter()
            .map(|eye| eye.translate(region.x, region.y))
            .collect();
        (Some(region), eyes)
    }
}
