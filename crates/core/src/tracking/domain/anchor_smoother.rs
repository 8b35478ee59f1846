use crate::shared::rect::Rect;

/// Running average of the anchor box: `[x, y, width, height]`.
type AnchorParams = [f64; 4];

/// Smoothed anchor state shared by every consumer within a frame.
///
/// Besides the average itself this keeps the most recent raw anchor, which the
/// scheduler compares against the average to measure how fast the anchor moves.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SmoothedAnchor {
    average: Option<AnchorParams>,
    last_raw: Option<Rect>,
}

impl SmoothedAnchor {
    /// Average box rounded to integer pixels.
    pub fn rect(&self) -> Option<Rect> {
        self.average.map(|[x, y, w, h]| {
            Rect::new(
                x.round() as i32,
                y.round() as i32,
                w.round() as i32,
                h.round() as i32,
            )
        })
    }

    pub fn center(&self) -> Option<(f64, f64)> {
        self.rect().map(|r| r.center())
    }

    /// Average `(width, height)` without rounding.
    pub fn average_size(&self) -> Option<(f64, f64)> {
        self.average.map(|[_, _, w, h]| (w, h))
    }

    pub fn last_raw(&self) -> Option<Rect> {
        self.last_raw
    }

    /// Center of the unrounded average box.
    pub fn average_center(&self) -> Option<(f64, f64)> {
        self.average.map(|[x, y, w, h]| (x + w / 2.0, y + h / 2.0))
    }
}

/// EMA over raw anchor detections.
///
/// Formula: `avg[t] = alpha * raw + (1 - alpha) * avg[t-1]`, per coordinate.
/// The first detection seeds the average; frames without a detection leave
/// it untouched.
pub struct AnchorSmoother {
    alpha: f64,
    state: SmoothedAnchor,
}

pub const DEFAULT_ALPHA: f64 = 0.3;

impl AnchorSmoother {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            state: SmoothedAnchor::default(),
        }
    }

    pub fn observe(&mut self, raw: Rect) -> Rect {
        let current = [
            raw.x as f64,
            raw.y as f64,
            raw.width as f64,
            raw.height as f64,
        ];
        let average = match self.state.average {
            None => current,
            Some(prev) => {
                let mut result = [0.0; 4];
                for i in 0..4 {
                    result[i] = self.alpha * current[i] + (1.0 - self.alpha) * prev[i];
                }
                result
            }
        };

        self.state.average = Some(average);
        self.state.last_raw = Some(raw);
        self.state.rect().unwrap_or(raw)
    }

    pub fn snapshot(&self) -> SmoothedAnchor {
        self.state
    }
}

impl Default for AnchorSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_ALPHA)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::rect::point_distance;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_state() {
        let smoother = AnchorSmoother::default();
        let snap = smoother.snapshot();
        assert!(snap.rect().is_none());
        assert!(snap.last_raw().is_none());
        assert!(snap.average_size().is_none());
    }

    #[test]
    fn test_first_observation_seeds_average() {
        let mut smoother = AnchorSmoother::default();
        let raw = Rect::new(100, 200, 50, 60);
        assert_eq!(smoother.observe(raw), raw);
        assert_eq!(smoother.snapshot().last_raw(), Some(raw));
    }

    #[test]
    fn test_second_observation_applies_ema() {
        let mut smoother = AnchorSmoother::new(0.3);
        smoother.observe(Rect::new(100, 100, 50, 50));
        smoother.observe(Rect::new(110, 90, 60, 50));

        let (w, h) = smoother.snapshot().average_size().unwrap();
        assert_relative_eq!(w, 53.0, epsilon = 1e-9);
        assert_relative_eq!(h, 50.0, epsilon = 1e-9);
        // x = 103, y = 97
        assert_eq!(smoother.snapshot().rect(), Some(Rect::new(103, 97, 53, 50)));
    }

    #[test]
    fn test_rect_rounds_to_nearest_pixel() {
        let mut smoother = AnchorSmoother::new(0.3);
        smoother.observe(Rect::new(0, 0, 10, 10));
        smoother.observe(Rect::new(8, 2, 10, 10));
        // x = 2.4 -> 2, y = 0.6 -> 1
        let r = smoother.snapshot().rect().unwrap();
        assert_eq!((r.x, r.y), (2, 1));
    }

    #[test]
    fn test_last_raw_and_average_center() {
        let mut smoother = AnchorSmoother::new(0.3);
        smoother.observe(Rect::new(0, 0, 10, 10));
        let b = Rect::new(30, 0, 10, 10);
        smoother.observe(b);
        let snap = smoother.snapshot();
        assert_eq!(snap.last_raw(), Some(b));
        let (cx, cy) = snap.average_center().unwrap();
        assert_relative_eq!(cx, 14.0, epsilon = 1e-9);
        assert_relative_eq!(cy, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_convergence() {
        let mut smoother = AnchorSmoother::default();
        smoother.observe(Rect::new(0, 0, 10, 10));
        let target = Rect::new(400, 300, 120, 140);
        for _ in 0..60 {
            smoother.observe(target);
        }
        assert_eq!(smoother.snapshot().rect(), Some(target));
    }

    #[test]
    fn test_error_shrinks_every_step_and_settles_within_eighteen() {
        let mut smoother = AnchorSmoother::default();
        smoother.observe(Rect::new(0, 0, 10, 10));
        let target = Rect::new(400, 300, 120, 140);
        let error = |s: &AnchorSmoother| {
            point_distance(s.snapshot().average_center().unwrap(), target.center())
        };
        let initial = error(&smoother);

        let mut previous = initial;
        for _ in 0..18 {
            smoother.observe(target);
            let current = error(&smoother);
            assert!(current < previous);
            previous = current;
        }
        // 0.7^18 of the initial error remains
        assert!(previous <= 0.002 * initial);
        let r = smoother.snapshot().rect().unwrap();
        for (got, want) in [
            (r.x, target.x),
            (r.y, target.y),
            (r.width, target.width),
            (r.height, target.height),
        ] {
            assert!((got - want).abs() <= 1, "{got} vs {want}");
        }
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut smoother = AnchorSmoother::default();
        smoother.observe(Rect::new(0, 0, 10, 10));
        let before = smoother.snapshot();
        smoother.observe(Rect::new(100, 0, 10, 10));
        assert_eq!(before.rect(), Some(Rect::new(0, 0, 10, 10)));
    }
}
