use image::{GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{dilate, erode};

use crate::detection::domain::candidate_detector::CandidateDetector;
use crate::detection::infrastructure::blobs::find_blobs;
use crate::shared::frame::Frame;
use crate::shared::rect::Rect;

/// Inclusive HSV bounds, hue on the 0..=180 half-degree scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub const SKIN: HsvRange = HsvRange {
        lower: [0, 30, 60],
        upper: [20, 255, 255],
    };

    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|i| hsv[i] >= self.lower[i] && hsv[i] <= self.upper[i])
    }
}

/// Candidate detector that segments skin-coloured pixels in the search
/// window and reports one box per connected region.
pub struct SkinToneCandidateDetector {
    range: HsvRange,
}

impl SkinToneCandidateDetector {
    pub fn new(range: HsvRange) -> Self {
        Self { range }
    }

    /// Binary mask of in-range pixels, opened with a 3x3 square.
    pub fn skin_mask(&self, image: &RgbImage) -> GrayImage {
        let mut mask = GrayImage::new(image.width(), image.height());
        for (px, out) in image.pixels().zip(mask.pixels_mut()) {
            if self.range.contains(rgb_to_hsv(px.0)) {
                *out = Luma([255]);
            }
        }
        dilate(&erode(&mask, Norm::LInf, 1), Norm::LInf, 1)
    }
}

impl Default for SkinToneCandidateDetector {
    fn default() -> Self {
        Self::new(HsvRange::SKIN)
    }
}

impl CandidateDetector for SkinToneCandidateDetector {
    fn detect(
        &mut self,
        frame: &Frame,
        window: &Rect,
    ) -> Result<Vec<Rect>, Box<dyn std::error::Error>> {
        let Some(region) = frame.crop(window) else {
            return Ok(Vec::new());
        };
        let mask = self.skin_mask(&region.to_rgb_image());
        Ok(find_blobs(&mask).into_iter().map(|b| b.bounds).collect())
    }
}

/// 8-bit RGB to HSV with hue halved into 0..=180.
pub fn rgb_to_hsv([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let s = if max > 0.0 { delta * 255.0 / max } else { 0.0 };
    let h = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / delta
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    [
        (h / 2.0).round().min(180.0) as u8,
        s.round() as u8,
        max as u8,
    ]
}
