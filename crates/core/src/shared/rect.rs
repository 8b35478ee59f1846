use serde::{Deserialize, Serialize};

/// Axis-aligned integer pixel rectangle.
///
/// Detectors and trackers exchange geometry exclusively through this type.
/// Width and height are positive for every rectangle a tracker stores;
/// `clip_to` is the only way to turn an arbitrary rectangle into one that is
/// safe to crop or index with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    pub fn aspect_ratio(&self) -> Option<f64> {
        if self.height == 0 {
            return None;
        }
        Some(self.width as f64 / self.height as f64)
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Euclidean distance between the two rectangle centers.
    pub fn center_distance(&self, other: &Rect) -> f64 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        point_distance((ax, ay), (bx, by))
    }

    /// Whether `point` lies inside the rectangle, edges included.
    pub fn contains_point(&self, (px, py): (f64, f64)) -> bool {
        px >= self.x as f64
            && px <= self.right() as f64
            && py >= self.y as f64
            && py <= self.bottom() as f64
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Grows the rectangle by `padding` pixels on every side. Not clipped.
    pub fn padded(&self, padding: i32) -> Rect {
        Rect::new(
            self.x - padding,
            self.y - padding,
            self.width + 2 * padding,
            self.height + 2 * padding,
        )
    }

    /// Intersects the rectangle with a `frame_w` x `frame_h` frame.
    ///
    /// Returns `None` when nothing with positive area remains.
    pub fn clip_to(&self, frame_w: u32, frame_h: u32) -> Option<Rect> {
        let x1 = self.x.max(0);
        let y1 = self.y.max(0);
        let x2 = self.right().min(frame_w as i32);
        let y2 = self.bottom().min(frame_h as i32);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Rect::new(x1, y1, x2 - x1, y2 - y1))
    }

    pub fn intersection_area(&self, other: &Rect) -> i64 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = self.right().min(other.right());
        let iy2 = self.bottom().min(other.bottom());
        (ix2 - ix1).max(0) as i64 * (iy2 - iy1).max(0) as i64
    }

    /// Returns the rectangle from `rects` whose center is closest to this
    /// one's, with its distance. Earlier entries win ties.
    pub fn nearest<'a>(&self, rects: &'a [Rect]) -> Option<(&'a Rect, f64)> {
        let mut best: Option<(&Rect, f64)> = None;
        for r in rects {
            let d = self.center_distance(r);
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((r, d));
            }
        }
        best
    }
}

pub fn point_distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    // ── Geometry ─────────────────────────────────────────────────────

    #[test]
    fn test_center_uses_half_extent() {
        let r = Rect::new(10, 20, 50, 31);
        let (cx, cy) = r.center();
        assert_relative_eq!(cx, 35.0);
        assert_relative_eq!(cy, 35.5);
    }

    #[test]
    fn test_center_distance_horizontal_shift() {
        let a = Rect::new(100, 100, 50, 50);
        let b = a.translate(140, 0);
        assert_relative_eq!(a.center_distance(&b), 140.0);
    }

    #[test]
    fn test_center_distance_diagonal() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(3, 4, 10, 10);
        assert_relative_eq!(a.center_distance(&b), 5.0);
    }

    #[test]
    fn test_aspect_ratio_zero_height() {
        assert!(Rect::new(0, 0, 10, 0).aspect_ratio().is_none());
    }

    #[test]
    fn test_contains_point_edges_inclusive() {
        let r = Rect::new(0, 0, 10, 10);
        assert!(r.contains_point((0.0, 0.0)));
        assert!(r.contains_point((10.0, 10.0)));
        assert!(!r.contains_point((10.5, 5.0)));
    }

    // ── Clipping ─────────────────────────────────────────────────────

    #[test]
    fn test_clip_inside_frame_unchanged() {
        let r = Rect::new(10, 10, 50, 50);
        assert_eq!(r.clip_to(100, 100), Some(r));
    }

    #[test]
    fn test_clip_padded_rect_at_frame_corner_stays_in_bounds() {
        let r = Rect::new(0, 0, 50, 50).padded(20);
        let clipped = r.clip_to(100, 80).unwrap();
        assert_eq!(clipped, Rect::new(0, 0, 70, 70));
    }

    #[rstest]
    #[case::left_edge(Rect::new(-30, 10, 60, 40))]
    #[case::right_edge(Rect::new(380, 10, 60, 40))]
    #[case::bottom_edge(Rect::new(100, 280, 60, 40))]
    #[case::covers_frame(Rect::new(-50, -50, 600, 500))]
    fn test_clip_never_exceeds_frame(#[case] r: Rect) {
        let c = r.padded(20).clip_to(400, 300).unwrap();
        assert!(c.x >= 0 && c.y >= 0);
        assert!(c.right() <= 400 && c.bottom() <= 300);
        assert!(c.width > 0 && c.height > 0);
    }

    #[rstest]
    #[case::outside_right(Rect::new(500, 10, 20, 20))]
    #[case::outside_top(Rect::new(10, -40, 20, 20))]
    #[case::zero_width(Rect::new(10, 10, 0, 20))]
    fn test_clip_degenerate_returns_none(#[case] r: Rect) {
        assert!(r.clip_to(400, 300).is_none());
    }

    // ── Overlap ──────────────────────────────────────────────────────

    #[test]
    fn test_intersection_partial_overlap() {
        let a = Rect::new(0, 0, 100, 100);
        let b = Rect::new(50, 0, 100, 100);
        assert_eq!(a.intersection_area(&b), 5000);
    }

    #[test]
    fn test_intersection_touching_edges_is_zero() {
        let a = Rect::new(0, 0, 50, 50);
        let b = Rect::new(50, 0, 50, 50);
        assert_eq!(a.intersection_area(&b), 0);
    }

    // ── Nearest ──────────────────────────────────────────────────────

    #[test]
    fn test_nearest_picks_closest_center() {
        let anchor = Rect::new(0, 0, 10, 10);
        let rects = [Rect::new(100, 0, 10, 10), Rect::new(20, 0, 10, 10)];
        let (r, d) = anchor.nearest(&rects).unwrap();
        assert_eq!(*r, rects[1]);
        assert_relative_eq!(d, 20.0);
    }

    #[test]
    fn test_nearest_empty() {
        assert!(Rect::new(0, 0, 1, 1).nearest(&[]).is_none());
    }
}
