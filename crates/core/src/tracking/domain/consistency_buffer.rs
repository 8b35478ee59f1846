use crate::shared::rect::Rect;
use crate::tracking::domain::bounded_history::BoundedHistory;
use crate::tracking::domain::consistency_vote::consistent_rects;
use crate::tracking::domain::tracking_config::ConsistencyConfig;

/// What recording one frame's candidates did to the buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    /// The empty-frame counter reached its limit and the history was cleared
    /// before this frame's candidates were appended. The caller must drop its
    /// last-known face as well.
    Reset,
}

/// Recent candidate sets of the face tracker and the majority vote over them.
pub struct ConsistencyBuffer {
    config: ConsistencyConfig,
    history: BoundedHistory<Vec<Rect>>,
    empty_frames: usize,
}

impl ConsistencyBuffer {
    pub fn new(config: ConsistencyConfig) -> Self {
        let history = BoundedHistory::new(config.history_capacity);
        Self {
            config,
            history,
            empty_frames: 0,
        }
    }

    pub fn record(&mut self, candidates: &[Rect]) -> RecordOutcome {
        let mut outcome = RecordOutcome::Recorded;
        if candidates.is_empty() {
            self.empty_frames += 1;
        } else {
            self.empty_frames = 0;
        }
        if self.empty_frames >= self.config.max_reset_frames {
            self.history.clear();
            self.empty_frames = 0;
            outcome = RecordOutcome::Reset;
        }
        self.history.push(candidates.to_vec());
        outcome
    }

    pub fn consistent_detection(&self) -> Option<Rect> {
        consistent_rects(
            &self.history,
            self.config.bucket_size,
            self.config.min_consistency_frames,
            1,
        )
        .into_iter()
        .next()
    }

    /// Nearest current candidate to `last_known`, if closer than the
    /// reconnect distance. Returns the candidate and its center distance.
    pub fn reacquire(&self, last_known: &Rect, candidates: &[Rect]) -> Option<(Rect, f64)> {
        let (nearest, distance) = last_known.nearest(candidates)?;
        (distance < self.config.reconnect_distance).then_some((*nearest, distance))
    }

    /// Consecutive frames without candidates.
    pub fn reset_counter(&self) -> usize {
        self.empty_frames
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}
