use crate::shared::rect::Rect;
use crate::tracking::domain::bounded_history::BoundedHistory;
use crate::tracking::domain::consistency_vote::consistent_rects;
use crate::tracking::domain::tracking_config::EyeConfig;

/// Eye tracker working in face-region-local coordinates.
///
/// Votes like the face buffer but keeps up to `max_eyes` winners and snaps
/// each of them straight onto its nearest current detection.
pub struct EyeConsistencyTracker {
    config: EyeConfig,
    history: BoundedHistory<Vec<Rect>>,
}

impl EyeConsistencyTracker {
    pub fn new(config: EyeConfig) -> Self {
        let history = BoundedHistory::new(config.history_capacity);
        Self { config, history }
    }

    /// Records this frame's eyes and returns the consistent eyes, snapped to
    /// the current detections.
    pub fn update(&mut self, current: &[Rect]) -> Vec<Rect> {
        self.history.push(current.to_vec());
        let voted = consistent_rects(
            &self.history,
            self.config.bucket_size,
            self.config.min_consistency_frames,
            self.config.max_eyes,
        );
        snap_to_nearest(&voted, current)
    }
}

/// Replaces every eye with its nearest current detection, keeping it as is
/// when there are no current detections.
pub fn snap_to_nearest(eyes: &[Rect], current: &[Rect]) -> Vec<Rect> {
    eyes.iter()
        .map(|eye| eye.nearest(current).map_or(*eye, |(r, _)| *r))
        .collect()
}

/// Face region searched for eyes: the face padded on every side and clipped.
pub fn eye_region(face: &Rect, padding: i32, frame_w: u32, frame_h: u32) -> Option<Rect> {
    face.padded(padding).clip_to(frame_w, frame_h)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEFT: Rect = Rect::new(20, 30, 15, 10);
    const RIGHT: Rect = Rect::new(60, 30, 15, 10);

    fn tracker() -> EyeConsistencyTracker {
        EyeConsistencyTracker::new(EyeConfig::default())
    }

    #[test]
    fn test_needs_three_frames() {
        let mut t = tracker();
        assert!(t.update(&[LEFT, RIGHT]).is_empty());
        assert!(t.update(&[LEFT, RIGHT]).is_empty());
        assert_eq!(t.update(&[LEFT, RIGHT]), vec![LEFT, RIGHT]);
    }

    #[test]
    fn test_at_most_two_eyes() {
        let mut t = tracker();
        let extra = Rect::new(40, 70, 10, 10);
        let mut eyes = Vec::new();
        for _ in 0..5 {
            eyes = t.update(&[LEFT, RIGHT, extra]);
        }
        assert_eq!(eyes.len(), 2);
    }

    #[test]
    fn test_snap_replaces_exactly() {
        let mut t = tracker();
        for _ in 0..3 {
            t.update(&[LEFT]);
        }
        let moved = LEFT.translate(1, 0);
        assert_eq!(t.update(&[moved]), vec![moved]);
    }

    #[test]
    fn test_snap_helper_one_pixel_match() {
        let eye = Rect::new(10, 10, 12, 8);
        let current = Rect::new(11, 10, 12, 8);
        assert_eq!(snap_to_nearest(&[eye], &[current]), vec![current]);
    }

    #[test]
    fn test_no_current_detection_retains_eye() {
        assert_eq!(snap_to_nearest(&[LEFT], &[]), vec![LEFT]);
    }

    #[test]
    fn test_both_eyes_can_snap_to_same_detection() {
        let only = LEFT.translate(2, 0);
        assert_eq!(snap_to_nearest(&[LEFT, RIGHT], &[only]), vec![only, only]);
    }

    #[test]
    fn test_empty_frame_keeps_consistent_eyes() {
        let mut t = tracker();
        for _ in 0..3 {
            t.update(&[LEFT, RIGHT]);
        }
        // History still votes for both; no detections to snap to.
        assert_eq!(t.update(&[]), vec![LEFT, RIGHT]);
    }

    #[test]
    fn test_eye_region_clipped_at_frame_edge() {
        let region = eye_region(&Rect::new(0, 0, 80, 80), 20, 320, 240).unwrap();
        assert_eq!(region, Rect::new(0, 0, 100, 100));
        let region = eye_region(&Rect::new(260, 180, 60, 60), 20, 320, 240).unwrap();
        assert!(region.right() <= 320 && region.bottom() <= 240);
    }

    #[test]
    fn test_eye_region_outside_frame_is_none() {
        assert!(eye_region(&Rect::new(400, 10, 20, 20), 20, 320, 240).is_none());
    }
}
