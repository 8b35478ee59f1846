use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::shared::rect::Rect;

/// An 8-connected foreground region of a binary mask.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Blob {
    pub bounds: Rect,
    pub pixels: u32,
}

#[derive(Clone, Copy)]
struct Extent {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    pixels: u32,
}

impl Extent {
    fn at(x: u32, y: u32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
            pixels: 1,
        }
    }

    fn grow(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
        self.pixels += 1;
    }
}

/// Bounding boxes of the non-zero regions of `mask`, ordered top to bottom
/// then left to right.
pub fn find_blobs(mask: &GrayImage) -> Vec<Blob> {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));

    let mut extents: Vec<Option<Extent>> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label.0[0] as usize;
        if label == 0 {
            continue;
        }
        if extents.len() < label {
            extents.resize(label, None);
        }
        match &mut extents[label - 1] {
            Some(extent) => extent.grow(x, y),
            slot => *slot = Some(Extent::at(x, y)),
        }
    }

    let mut blobs: Vec<Blob> = extents
        .into_iter()
        .flatten()
        .map(|e| Blob {
            bounds: Rect::new(
                e.min_x as i32,
                e.min_y as i32,
                (e.max_x - e.min_x + 1) as i32,
                (e.max_y - e.min_y + 1) as i32,
            ),
            pixels: e.pixels,
        })
        .collect();
    blobs.sort_by_key(|b| (b.bounds.y, b.bounds.x));
    blobs
}
