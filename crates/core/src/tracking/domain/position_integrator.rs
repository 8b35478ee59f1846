use serde::Serialize;

use crate::shared::rect::{point_distance, Rect};
use crate::tracking::domain::anchor_smoother::SmoothedAnchor;
use crate::tracking::domain::tracking_config::IntegratorConfig;

/// The stable output rectangle and its center on the previous integration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackedFace {
    pub rect: Rect,
    pub previous_center: Option<(f64, f64)>,
}

/// Diagnostics of one integration step.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct IntegrationStep {
    pub coordinated: bool,
    /// Angle (degrees) between anchor and tracked motion; 0 when unknown.
    pub angle: f64,
    /// Center distance from the tracked rect to the target.
    pub distance: f64,
    pub pos_alpha: f64,
    pub size_alpha: f64,
    pub size_ratio: Option<f64>,
}

/// Moves the tracked face toward each frame's target.
///
/// Position and size use separate weights. The position weight depends on
/// whether the anchor and the tracked face converge on the target together;
/// the size weight resists growth and shrinkage away from a running average
/// area.
pub struct PositionIntegrator {
    config: IntegratorConfig,
    face: Option<TrackedFace>,
    previous_anchor_center: Option<(f64, f64)>,
    average_face_size: Option<f64>,
}

impl PositionIntegrator {
    pub fn new(config: IntegratorConfig) -> Self {
        Self {
            config,
            face: None,
            previous_anchor_center: None,
            average_face_size: None,
        }
    }

    pub fn tracked(&self) -> Option<&TrackedFace> {
        self.face.as_ref()
    }

    pub fn average_face_size(&self) -> Option<f64> {
        self.average_face_size
    }

    /// Drops the tracked face and its motion history.
    pub fn clear(&mut self) {
        self.face = None;
        self.previous_anchor_center = None;
    }

    /// Places the tracked face at `rect` (clipped), discarding any motion
    /// history. Returns `false` when nothing of `rect` lies in the frame.
    pub fn place(&mut self, rect: Rect, frame_w: u32, frame_h: u32) -> bool {
        let Some(rect) = rect.clip_to(frame_w, frame_h) else {
            return false;
        };
        self.face = Some(TrackedFace {
            rect,
            previous_center: None,
        });
        self.previous_anchor_center = None;
        true
    }

    /// One integration step toward `target`. Returns `None` when no face is
    /// tracked.
    pub fn integrate(
        &mut self,
        target: &Rect,
        anchor: &SmoothedAnchor,
        frame_w: u32,
        frame_h: u32,
    ) -> Option<IntegrationStep> {
        let face = self.face.as_mut()?;
        let current = face.rect;
        let tracked_center = current.center();
        let target_center = target.center();
        let distance = point_distance(tracked_center, target_center);

        let anchor_center = anchor.center();
        let coordinated = anchor_center.is_some_and(|ac| {
            (point_distance(ac, target_center) - distance).abs()
                < self.config.coordination_tolerance
        });
        let angle = match (anchor_center, self.previous_anchor_center, face.previous_center) {
            (Some(ac), Some(prev_ac), Some(prev_tc)) => movement_angle(
                (ac.0 - prev_ac.0, ac.1 - prev_ac.1),
                (tracked_center.0 - prev_tc.0, tracked_center.1 - prev_tc.1),
            ),
            _ => 0.0,
        };
        let pos_alpha = if coordinated {
            coordinated_alpha(angle)
        } else {
            distance_alpha(distance)
        };

        let current_area = current.area() as f64;
        let average = match self.average_face_size {
            Some(avg) => {
                let a = self.config.average_size_alpha;
                a * current_area + (1.0 - a) * avg
            }
            None => current_area,
        };
        self.average_face_size = Some(average);
        let (size_alpha, size_ratio) = if average > 0.0 {
            let ratio = current_area / average;
            let target_ratio = target.area() as f64 / average;
            (size_alpha(ratio, target_ratio, distance), Some(ratio))
        } else {
            (1.0, None)
        };

        // alpha * old + (1 - alpha) * new, written so that old == new is exact
        let blend = |old: i32, new: i32, alpha: f64| {
            (new as f64 + alpha * (old - new) as f64) as i32
        };
        let moved = Rect::new(
            blend(current.x, target.x, pos_alpha),
            blend(current.y, target.y, pos_alpha),
            blend(current.width, target.width, size_alpha),
            blend(current.height, target.height, size_alpha),
        );

        face.rect = moved.clip_to(frame_w, frame_h).unwrap_or(current);
        face.previous_center = Some(tracked_center);
        self.previous_anchor_center = anchor_center;

        Some(IntegrationStep {
            coordinated,
            angle,
            distance,
            pos_alpha,
            size_alpha,
            size_ratio,
        })
    }
}

/// Angle in degrees between two displacement vectors, 0 if either is zero.
pub fn movement_angle(a: (f64, f64), b: (f64, f64)) -> f64 {
    let mag_a = a.0.hypot(a.1);
    let mag_b = b.0.hypot(b.1);
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    let cos = ((a.0 * b.0 + a.1 * b.1) / (mag_a * mag_b)).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

/// Weight kept on the old position when anchor and face move together.
pub fn coordinated_alpha(angle: f64) -> f64 {
    if angle < 5.0 {
        0.001
    } else if angle < 10.0 {
        0.005
    } else if angle < 15.0 {
        0.01
    } else if angle < 25.0 {
        0.02
    } else if angle < 40.0 {
        0.05
    } else {
        0.1
    }
}

/// Weight kept on the old position, by distance to the target.
pub fn distance_alpha(distance: f64) -> f64 {
    if distance < 10.0 {
        0.02
    } else if distance < 25.0 {
        0.1
    } else if distance < 50.0 {
        0.25
    } else if distance < 80.0 {
        0.5
    } else if distance < 120.0 {
        0.8
    } else {
        0.95
    }
}

/// Weight kept on the old size.
pub fn size_alpha(size_ratio: f64, target_ratio: f64, distance: f64) -> f64 {
    if size_ratio < 0.8 {
        0.95
    } else if size_ratio < 0.9 {
        0.9
    } else if target_ratio > 1.2 && distance > 50.0 {
        // Sudden growth from a distant candidate is most likely a false hit.
        0.98
    } else if size_ratio > 1.3 {
        0.8
    } else if distance < 20.0 {
        0.7
    } else if distance < 50.0 {
        0.8
    } else if distance < 100.0 {
        0.9
    } else {
        0.95
    }
}
