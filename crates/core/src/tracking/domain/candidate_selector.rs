use crate::detection::domain::candidate_detector::CandidateDetector;
use crate::shared::frame::Frame;
use crate::shared::rect::Rect;
use crate::tracking::domain::tracking_config::SelectorConfig;

/// Picks the frame's face candidate around the smoothed anchor.
pub struct CandidateSelector {
    config: SelectorConfig,
}

impl CandidateSelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self { config }
    }

    /// Candidate set for one frame.
    ///
    /// With an anchor, the detector searches the padded anchor and at most the
    /// best-scoring plausible hit is kept. Without one, the default window is
    /// the only candidate and the detector is not consulted.
    pub fn select(
        &self,
        frame: &Frame,
        anchor: Option<Rect>,
        detector: &mut dyn CandidateDetector,
    ) -> Result<Vec<Rect>, Box<dyn std::error::Error>> {
        let Some(anchor) = anchor else {
            return Ok(self
                .default_window(frame.width(), frame.height())
                .into_iter()
                .collect());
        };
        let Some(window) = self.search_window(&anchor, frame.width(), frame.height()) else {
            return Ok(Vec::new());
        };
        let found: Vec<Rect> = detector
            .detect(frame, &window)?
            .into_iter()
            .map(|r| r.translate(window.x, window.y))
            .collect();
        Ok(self.best_candidate(&anchor, &found).into_iter().collect())
    }

    /// Anchor grown by the search padding, clipped to the frame.
    pub fn search_window(&self, anchor: &Rect, frame_w: u32, frame_h: u32) -> Option<Rect> {
        anchor
            .padded(self.config.search_padding)
            .clip_to(frame_w, frame_h)
    }

    /// Fixed window around the frame center, shifted to stay in the frame.
    pub fn default_window(&self, frame_w: u32, frame_h: u32) -> Option<Rect> {
        let size = self.config.default_window_size;
        let place = |extent: u32| {
            let extent = extent as i32;
            (extent / 2 - size / 2).min(extent - size).max(0)
        };
        Rect::new(place(frame_w), place(frame_h), size, size).clip_to(frame_w, frame_h)
    }

    /// Whether `candidate` could be the anchored face: area ratio and aspect
    /// ratio both strictly within their bounds.
    pub fn is_plausible(&self, anchor: &Rect, candidate: &Rect) -> bool {
        let anchor_area = anchor.area();
        if anchor_area <= 0 {
            return false;
        }
        let size_ratio = candidate.area() as f64 / anchor_area as f64;
        let Some(aspect) = candidate.aspect_ratio() else {
            return false;
        };
        let c = &self.config;
        size_ratio > c.min_area_ratio
            && size_ratio < c.max_area_ratio
            && aspect > c.min_aspect_ratio
            && aspect < c.max_aspect_ratio
    }

    /// Distance to the anchor center plus a penalty for area mismatch. Lower
    /// is better.
    pub fn score(&self, anchor: &Rect, candidate: &Rect) -> f64 {
        let size_ratio = candidate.area() as f64 / anchor.area() as f64;
        anchor.center_distance(candidate) + self.config.size_weight * (1.0 - size_ratio).abs()
    }

    /// Lowest-scoring plausible candidate. Earlier candidates win ties.
    pub fn best_candidate(&self, anchor: &Rect, candidates: &[Rect]) -> Option<Rect> {
        let mut best: Option<(Rect, f64)> = None;
        for c in candidates.iter().filter(|c| self.is_plausible(anchor, c)) {
            let score = self.score(anchor, c);
            if best.map_or(true, |(_, s)| score < s) {
                best = Some((*c, score));
            }
        }
        best.map(|(r, _)| r)
    }
}
