use image::{GrayImage, RgbImage};
use ndarray::ArrayView3;

use crate::shared::rect::Rect;

/// A single camera/video frame: contiguous RGB bytes in row-major order.
///
/// Decoding happens at I/O boundaries only; trackers see frames as opaque
/// pixel buffers with a size and a sequence index.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    index: usize,
}

const CHANNELS: usize = 3;

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
            index,
        }
    }

    pub fn from_rgb_image(image: RgbImage, index: usize) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(
            (self.height as usize, self.width as usize, CHANNELS),
            &self.data,
        )
        .expect("Frame data length must match dimensions")
    }

    /// Copies the pixels under `rect` (clipped to the frame) into a new frame.
    ///
    /// Returns `None` when the clipped rectangle has no area. The crop keeps
    /// the parent's index.
    pub fn crop(&self, rect: &Rect) -> Option<Frame> {
        let r = rect.clip_to(self.width, self.height)?;
        let row_len = r.width as usize * CHANNELS;
        let mut data = Vec::with_capacity(row_len * r.height as usize);
        for row in r.y as usize..r.bottom() as usize {
            let start = (row * self.width as usize + r.x as usize) * CHANNELS;
            data.extend_from_slice(&self.data[start..start + row_len]);
        }
        Some(Frame::new(
            data,
            r.width as u32,
            r.height as u32,
            self.index,
        ))
    }

    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .expect("Frame data length must match dimensions")
    }

    /// Luma conversion with the ITU-R BT.601 weights.
    pub fn to_gray_image(&self) -> GrayImage {
        let mut gray = GrayImage::new(self.width, self.height);
        for (i, px) in gray.pixels_mut().enumerate() {
            let p = &self.data[i * CHANNELS..i * CHANNELS + CHANNELS];
            let y = 0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32;
            px.0[0] = y.round().clamp(0.0, 255.0) as u8;
        }
        gray
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame(w: u32, h: u32) -> Frame {
        let mut data = Vec::with_capacity((w * h * 3) as usize);
        for y in 0..h {
            for x in 0..w {
                data.extend_from_slice(&[x as u8, y as u8, 0]);
            }
        }
        Frame::new(data, w, h, 7)
    }

    #[test]
    fn test_construction_and_accessors() {
        let frame = Frame::new(vec![0u8; 12], 2, 2, 5);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.index(), 5);
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * 3")]
    fn test_mismatched_data_length_panics_in_debug() {
        Frame::new(vec![0u8; 10], 2, 2, 0);
    }

    #[test]
    fn test_as_ndarray_shape() {
        let frame = Frame::new(vec![0u8; 24], 4, 2, 0);
        assert_eq!(frame.as_ndarray().shape(), &[2, 4, 3]);
    }

    #[test]
    fn test_crop_copies_region() {
        let frame = gradient_frame(10, 8);
        let crop = frame.crop(&Rect::new(2, 3, 4, 2)).unwrap();
        assert_eq!(crop.width(), 4);
        assert_eq!(crop.height(), 2);
        assert_eq!(crop.index(), 7);
        let arr = crop.as_ndarray();
        assert_eq!(arr[[0, 0, 0]], 2); // x
        assert_eq!(arr[[0, 0, 1]], 3); // y
        assert_eq!(arr[[1, 3, 0]], 5);
        assert_eq!(arr[[1, 3, 1]], 4);
    }

    #[test]
    fn test_crop_clips_to_frame() {
        let frame = gradient_frame(10, 8);
        let crop = frame.crop(&Rect::new(-5, 6, 8, 10)).unwrap();
        assert_eq!((crop.width(), crop.height()), (3, 2));
    }

    #[test]
    fn test_crop_outside_frame_is_none() {
        let frame = gradient_frame(10, 8);
        assert!(frame.crop(&Rect::new(20, 20, 5, 5)).is_none());
    }

    #[test]
    fn test_rgb_image_round_trip_dimensions() {
        let frame = gradient_frame(6, 4);
        let img = frame.to_rgb_image();
        assert_eq!(img.dimensions(), (6, 4));
        let back = Frame::from_rgb_image(img, 1);
        assert_eq!(back.data(), frame.data());
    }

    #[test]
    fn test_gray_image_of_white_is_255() {
        let frame = Frame::new(vec![255u8; 4 * 3], 2, 2, 0);
        let gray = frame.to_gray_image();
        assert!(gray.pixels().all(|p| p.0[0] == 255));
    }
}
