use crate::shared::frame::Frame;
use crate::shared::rect::Rect;

/// Slow, authoritative face detector run on the full frame.
///
/// Returns at most one face. Implementations may retry internally with
/// escalating sensitivity; `Ok(None)` means nothing was found.
pub trait AnchorDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Option<Rect>, Box<dyn std::error::Error>>;
}
