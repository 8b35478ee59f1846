use image::{GrayImage, Luma};
use ndarray::{s, Array2};

use crate::shared::rect::{point_distance, Rect};
use crate::tracking::domain::tracking_config::HeatmapConfig;

/// What one heatmap update did.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HeatmapUpdate {
    /// No anchor this frame; the grid was left alone.
    Skipped,
    Updated,
    /// The anchor jumped by `distance` px; the grid was zeroed first.
    Reset { distance: f64 },
}

/// Decaying map of where candidates appeared around the anchor.
///
/// Cells far from the anchor fade within a few frames while cells inside the
/// padded anchor fade slowly, so persistent candidates build up heat. Values
/// are unbounded above.
pub struct HeatmapAccumulator {
    config: HeatmapConfig,
    grid: Option<Array2<f32>>,
    anchor_ref: Option<Rect>,
}

impl HeatmapAccumulator {
    pub fn new(config: HeatmapConfig) -> Self {
        Self {
            config,
            grid: None,
            anchor_ref: None,
        }
    }

    pub fn update(
        &mut self,
        anchor: Option<Rect>,
        candidates: &[Rect],
        frame_w: u32,
        frame_h: u32,
    ) -> HeatmapUpdate {
        let Some(anchor) = anchor else {
            return HeatmapUpdate::Skipped;
        };

        let mut outcome = HeatmapUpdate::Updated;
        if let Some(reference) = self.anchor_ref {
            let distance = reference.center_distance(&anchor);
            if distance > self.config.reset_distance {
                log::info!("Heatmap reset, anchor moved {distance:.0}px");
                self.grid = None;
                outcome = HeatmapUpdate::Reset { distance };
            }
        }
        self.anchor_ref = Some(anchor);

        let shape = (frame_h as usize, frame_w as usize);
        if self.grid.as_ref().map_or(true, |g| g.dim() != shape) {
            self.grid = Some(Array2::zeros(shape));
        }
        let Some(grid) = self.grid.as_mut() else {
            return outcome;
        };

        let (outside, inside) = (self.config.outside_decay, self.config.inside_decay);
        let padding = self.config.padding;
        let Some(mask) = anchor.padded(padding).clip_to(frame_w, frame_h) else {
            grid.mapv_inplace(|v| v * outside);
            return outcome;
        };
        let (rows, cols) = (
            mask.y as usize..mask.bottom() as usize,
            mask.x as usize..mask.right() as usize,
        );
        for ((row, col), v) in grid.indexed_iter_mut() {
            *v *= if rows.contains(&row) && cols.contains(&col) {
                inside
            } else {
                outside
            };
        }

        let anchor_center = anchor.center();
        let max_distance = (anchor.width as f64 / 2.0 + padding as f64)
            .hypot(anchor.height as f64 / 2.0 + padding as f64);
        for candidate in candidates {
            let center = candidate.center();
            if !mask.contains_point(center) {
                continue;
            }
            let Some(area) = candidate.clip_to(frame_w, frame_h) else {
                continue;
            };
            let ratio = if max_distance > 0.0 {
                (point_distance(center, anchor_center) / max_distance).min(1.0)
            } else {
                0.0
            };
            let heat = self.config.base_heat * (1.0 - 0.1 * ratio as f32);
            grid.slice_mut(s![
                area.y as usize..area.bottom() as usize,
                area.x as usize..area.right() as usize
            ])
            .mapv_inplace(|v| v + heat);
        }

        outcome
    }

    pub fn grid(&self) -> Option<&Array2<f32>> {
        self.grid.as_ref()
    }

    pub fn max_heat(&self) -> f32 {
        self.grid
            .as_ref()
            .map_or(0.0, |g| g.iter().copied().fold(0.0, f32::max))
    }

    /// Grayscale rendering: `clamp(value * 255, 0, 255)`.
    pub fn to_image(&self) -> Option<GrayImage> {
        let grid = self.grid.as_ref()?;
        let (rows, cols) = grid.dim();
        Some(GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
            let v = grid[[y as usize, x as usize]] * 255.0;
            Luma([v.clamp(0.0, 255.0) as u8])
        }))
    }
}
