use crate::shared::frame::Frame;
use crate::shared::rect::Rect;

/// Fast per-frame detector restricted to a search window.
///
/// `window` is already clipped to the frame. Returned rectangles are in
/// window-local coordinates.
pub trait CandidateDetector: Send {
    fn detect(
        &mut self,
        frame: &Frame,
        window: &Rect,
    ) -> Result<Vec<Rect>, Box<dyn std::error::Error>>;
}
