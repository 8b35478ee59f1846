use crate::shared::rect::point_distance;
use crate::tracking::domain::anchor_smoother::SmoothedAnchor;
use crate::tracking::domain::tracking_config::SchedulerConfig;

/// Outcome of one scheduling poll.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScheduleDecision {
    /// Interval (s) in effect for this frame.
    pub interval: f64,
    pub invoke: bool,
}

/// Decides when the slow anchor detector runs.
///
/// The interval shrinks while the anchor moves and grows while it is still,
/// from 0.1 s up to 1 s. It is recomputed on every poll from the anchor state
/// of the previous frame, so a sudden jump shortens the wait before the next
/// detection.
pub struct AnchorScheduler {
    config: SchedulerConfig,
    last_invocation: Option<f64>,
}

impl AnchorScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            last_invocation: None,
        }
    }

    /// Polls at time `now` (seconds, monotonic).
    ///
    /// Marks the detector as invoked when the decision says so, whether or not
    /// the detection that follows succeeds.
    pub fn poll(&mut self, now: f64, anchor: &SmoothedAnchor) -> ScheduleDecision {
        let interval = self.interval_for(anchor);
        let invoke = match self.last_invocation {
            None => true,
            Some(last) => now - last >= interval,
        };
        if invoke {
            self.last_invocation = Some(now);
        }
        ScheduleDecision { interval, invoke }
    }

    /// `position_change` is measured from the last raw detection to the
    /// smoothed anchor, `distance_from_avg` from the last raw detection to the
    /// unrounded average. Before any detection the bootstrap interval applies.
    pub fn interval_for(&self, anchor: &SmoothedAnchor) -> f64 {
        let (Some(last), Some(current), Some(average)) =
            (anchor.last_raw(), anchor.rect(), anchor.average_center())
        else {
            return self.config.bootstrap_interval;
        };
        let position_change = current.center_distance(&last);
        let distance_from_avg = point_distance(last.center(), average);
        adaptive_interval(
            self.config.position_change_threshold,
            position_change,
            distance_from_avg,
        )
    }
}

pub fn adaptive_interval(threshold: f64, position_change: f64, distance_from_avg: f64) -> f64 {
    if position_change > threshold || distance_from_avg > 30.0 {
        0.1
    } else if position_change > threshold * 0.5 || distance_from_avg > 15.0 {
        0.2
    } else if position_change > threshold * 0.2 || distance_from_avg > 8.0 {
        0.4
    } else {
        1.0
    }
}
