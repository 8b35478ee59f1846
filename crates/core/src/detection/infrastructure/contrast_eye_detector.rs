//! Eye detector that looks for small dark blobs in the upper part of a face.
//!
//! The region is equalized and blurred, then thresholded against its local
//! mean. Block size, threshold offset and blob size limits follow the lighting
//! mode inferred from the region's mean brightness.
use image::{GrayImage, Luma};
use imageproc::contrast::equalize_histogram;
use imageproc::filter::{box_filter, gaussian_blur_f32};

use crate::detection::domain::eye_detector::{EyeDetection, EyeDetector, LightingMode};
use crate::detection::infrastructure::blobs::{find_blobs, Blob};
use crate::shared::frame::Frame;
use crate::shared::rect::Rect;

/// Sigma matching a 5x5 Gaussian kernel.
const BLUR_SIGMA: f32 = 1.1;

/// Eyes must start above this fraction of the region height.
const MAX_TOP_FRACTION: f64 = 0.6;

const MIN_ASPECT: f64 = 0.5;
const MAX_ASPECT: f64 = 2.0;

/// Blobs overlapping a kept blob by more than this fraction of the smaller
/// area are dropped.
const OVERLAP_FRACTION: f64 = 0.5;

/// Threshold and blob limits for one lighting mode. Bounds are exclusive.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightingProfile {
    pub block_size: u32,
    pub offset: u8,
    pub min_size: i32,
    pub max_size: i32,
    pub min_area: u32,
    pub max_area: u32,
}

impl LightingProfile {
    pub fn for_mode(mode: LightingMode) -> Self {
        match mode {
            LightingMode::BrightDaylight => Self {
                block_size: 15,
                offset: 5,
                min_size: 10,
                max_size: 80,
                min_area: 40,
                max_area: 2000,
            },
            LightingMode::Normal => Self {
                block_size: 11,
                offset: 2,
                min_size: 8,
                max_size: 60,
                min_area: 30,
                max_area: 1500,
            },
            LightingMode::LowLight => Self {
                block_size: 7,
                offset: 1,
                min_size: 6,
                max_size: 50,
                min_area: 20,
                max_area: 1200,
            },
        }
    }

    fn accepts(&self, blob: &Blob, region_height: u32) -> bool {
        let r = &blob.bounds;
        let within = |v: i32| v > self.min_size && v < self.max_size;
        if !within(r.width) || !within(r.height) {
            return false;
        }
        let Some(aspect) = r.aspect_ratio() else {
            return false;
        };
        aspect > MIN_ASPECT
            && aspect < MAX_ASPECT
            && (r.y as f64) < region_height as f64 * MAX_TOP_FRACTION
            && blob.pixels > self.min_area
            && blob.pixels < self.max_area
    }
}

#[derive(Default)]
pub struct ContrastEyeDetector;

impl ContrastEyeDetector {
    pub fn new() -> Self {
        Self
    }
}

impl EyeDetector for ContrastEyeDetector {
    fn detect(&mut self, face_region: &Frame) -> Result<EyeDetection, Box<dyn std::error::Error>> {
        let gray = face_region.to_gray_image();
        let mean_brightness = mean_intensity(&gray);
        let lighting_mode = LightingMode::from_brightness(mean_brightness);
        let profile = LightingProfile::for_mode(lighting_mode);

        let enhanced = gaussian_blur_f32(&equalize_histogram(&gray), BLUR_SIGMA);
        let dark = dark_mask(&enhanced, profile.block_size / 2, profile.offset);

        let candidates: Vec<Rect> = find_blobs(&dark)
            .into_iter()
            .filter(|b| profile.accepts(b, gray.height()))
            .map(|b| b.bounds)
            .collect();
        let eyes = suppress_overlaps(&candidates);
        log::trace!(
            "{} eye blob(s) kept of {} ({lighting_mode}, brightness {mean_brightness:.0})",
            eyes.len(),
            candidates.len()
        );

        Ok(EyeDetection {
            eyes,
            lighting_mode,
            mean_brightness,
        })
    }
}

pub fn mean_intensity(image: &GrayImage) -> f64 {
    let count = image.width() as u64 * image.height() as u64;
    if count == 0 {
        return 0.0;
    }
    let sum: u64 = image.pixels().map(|p| p.0[0] as u64).sum();
    sum as f64 / count as f64
}

/// Pixels at least `offset` darker than the mean of their
/// `(2 * radius + 1)`-wide neighbourhood become foreground.
pub fn dark_mask(image: &GrayImage, radius: u32, offset: u8) -> GrayImage {
    let local_mean = box_filter(image, radius, radius);
    let mut mask = GrayImage::new(image.width(), image.height());
    for ((px, mean), out) in image
        .pixels()
        .zip(local_mean.pixels())
        .zip(mask.pixels_mut())
    {
        if px.0[0] as i32 <= mean.0[0] as i32 - offset as i32 {
            *out = Luma([255]);
        }
    }
    mask
}

/// Keeps rectangles in order, dropping any that overlaps an already kept
/// one by more than half the smaller of the two areas.
pub fn suppress_overlaps(rects: &[Rect]) -> Vec<Rect> {
    let mut kept: Vec<Rect> = Vec::new();
    for r in rects {
        let clashes = kept.iter().any(|k| {
            let smaller = r.area().min(k.area()) as f64;
            r.intersection_area(k) as f64 > OVERLAP_FRACTION * smaller
        });
        if !clashes {
            kept.push(*r);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use rstest::rstest;

    fn face_with_dark_patches(background: u8, dark: u8, patches: &[Rect]) -> Frame {
        let img = RgbImage::from_fn(100, 100, |x, y| {
            let (x, y) = (x as i32, y as i32);
            let inside = patches
                .iter()
                .any(|r| x >= r.x && x < r.right() && y >= r.y && y < r.bottom());
            let v = if inside { dark } else { background };
            Rgb([v, v, v])
        });
        Frame::from_rgb_image(img, 0)
    }

    fn blob(x: i32, y: i32, w: i32, h: i32, pixels: u32) -> Blob {
        Blob {
            bounds: Rect::new(x, y, w, h),
            pixels,
        }
    }

    // ── Filters ──────────────────────────────────────────────────────

    #[rstest]
    #[case::typical(blob(20, 20, 16, 12, 150), true)]
    #[case::too_narrow(blob(20, 20, 10, 12, 100), false)]
    #[case::too_wide(blob(20, 20, 80, 50, 1000), false)]
    #[case::elongated(blob(20, 20, 40, 12, 300), false)]
    #[case::low_in_face(blob(20, 60, 16, 12, 150), false)]
    #[case::sparse(blob(20, 20, 16, 12, 40), false)]
    fn test_bright_profile_filters(#[case] b: Blob, #[case] expected: bool) {
        let profile = LightingProfile::for_mode(LightingMode::BrightDaylight);
        assert_eq!(profile.accepts(&b, 100), expected);
    }

    #[test]
    fn test_low_light_accepts_smaller_blobs() {
        let small = blob(20, 20, 9, 8, 50);
        let low = LightingProfile::for_mode(LightingMode::LowLight);
        let bright = LightingProfile::for_mode(LightingMode::BrightDaylight);
        assert!(low.accepts(&small, 100));
        assert!(!bright.accepts(&small, 100));
    }

    #[rstest]
    #[case::disjoint(Rect::new(30, 0, 10, 10), 2)]
    #[case::slight_overlap(Rect::new(6, 0, 10, 10), 2)]
    #[case::heavy_overlap(Rect::new(2, 2, 10, 10), 1)]
    #[case::contained(Rect::new(2, 2, 4, 4), 1)]
    fn test_overlap_suppression(#[case] second: Rect, #[case] kept: usize) {
        let first = Rect::new(0, 0, 10, 10);
        let result = suppress_overlaps(&[first, second]);
        assert_eq!(result.len(), kept);
        assert_eq!(result[0], first);
    }

    // ── Thresholding ─────────────────────────────────────────────────

    #[test]
    fn test_dark_mask_marks_dark_spot_only() {
        let mut img = GrayImage::from_pixel(20, 20, Luma([200]));
        img.put_pixel(10, 10, Luma([20]));
        let mask = dark_mask(&img, 3, 2);
        assert_eq!(mask.get_pixel(10, 10).0[0], 255);
        assert_eq!(mask.get_pixel(0, 0).0[0], 0);
        assert_eq!(mask.get_pixel(12, 10).0[0], 0);
    }

    #[test]
    fn test_uniform_image_has_no_dark_pixels() {
        let img = GrayImage::from_pixel(15, 15, Luma([90]));
        assert!(dark_mask(&img, 5, 1).pixels().all(|p| p.0[0] == 0));
    }

    // ── Detection ────────────────────────────────────────────────────

    #[test]
    fn test_finds_two_eyes_in_bright_face() {
        let left = Rect::new(20, 25, 18, 14);
        let right = Rect::new(60, 25, 18, 14);
        let frame = face_with_dark_patches(200, 30, &[left, right]);

        let detection = ContrastEyeDetector::new().detect(&frame).unwrap();

        assert_eq!(detection.lighting_mode, LightingMode::BrightDaylight);
        assert_eq!(detection.eyes.len(), 2);
        assert!(detection.eyes[0].center_distance(&left) < 3.0);
        assert!(detection.eyes[1].center_distance(&right) < 3.0);
    }

    #[test]
    fn test_dark_patch_low_in_face_is_ignored() {
        let mouth = Rect::new(40, 75, 18, 14);
        let frame = face_with_dark_patches(200, 30, &[mouth]);
        let detection = ContrastEyeDetector::new().detect(&frame).unwrap();
        assert!(detection.eyes.is_empty());
    }

    #[test]
    fn test_lighting_follows_region_brightness() {
        let frame = face_with_dark_patches(70, 10, &[Rect::new(20, 25, 18, 14)]);
        let detection = ContrastEyeDetector::new().detect(&frame).unwrap();
        assert_eq!(detection.lighting_mode, LightingMode::LowLight);
        assert!(detection.mean_brightness < 100.0);
    }

    #[test]
    fn test_mean_intensity() {
        let mut img = GrayImage::from_pixel(2, 1, Luma([100]));
        img.put_pixel(1, 0, Luma([200]));
        assert_eq!(mean_intensity(&img), 150.0);
        assert_eq!(mean_intensity(&GrayImage::new(0, 0)), 0.0);
    }
}
