use std::time::Instant;

use crate::shared::constants::DEFAULT_SEQUENCE_FPS;
use crate::shared::frame::Frame;

/// Time source for anchor scheduling, in seconds.
pub trait FrameClock: Send {
    fn now(&mut self, frame: &Frame) -> f64;
}

/// Monotonic wall time since construction. For live sources.
pub struct WallClock {
    start: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock for WallClock {
    fn now(&mut self, _frame: &Frame) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// Derives time from the frame index, so recorded sequences schedule the
/// same way on every run.
pub struct FrameRateClock {
    fps: f64,
}

impl FrameRateClock {
    /// Non-positive or non-finite rates fall back to the default sequence rate.
    pub fn new(fps: f64) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 {
            fps
        } else {
            DEFAULT_SEQUENCE_FPS
        };
        Self { fps }
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }
}

impl FrameClock for FrameRateClock {
    fn now(&mut self, frame: &Frame) -> f64 {
        frame.index() as f64 / self.fps
    }
}
