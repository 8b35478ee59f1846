use serde::Serialize;

use crate::detection::domain::eye_detector::LightingMode;
use crate::shared::rect::Rect;
use crate::tracking::domain::position_integrator::IntegrationStep;

/// Where the tracked face stands after a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceStatus {
    /// Nothing has been tracked since start or the last reset.
    Absent,
    /// Backed by the consistency vote.
    Tracking,
    /// Re-attached to the candidate nearest the last known face.
    Reconnected,
    /// A last known face exists but nothing supports it this frame.
    Lost,
}

impl FaceStatus {
    pub fn has_face(self) -> bool {
        matches!(self, FaceStatus::Tracking | FaceStatus::Reconnected)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub anchor_interval: f64,
    pub anchor_invoked: bool,
    /// Raw anchor detection of this frame, if the detector ran and found one.
    pub raw_anchor: Option<Rect>,
    pub reset_counter: usize,
    pub consistency_reset: bool,
    pub average_anchor_size: Option<(f64, f64)>,
    pub average_face_size: Option<f64>,
    pub size_ratio: Option<f64>,
    pub integration: Option<IntegrationStep>,
    pub reconnect_distance: Option<f64>,
    pub heatmap_reset_distance: Option<f64>,
    pub max_heat: f32,
    pub lighting_mode: Option<LightingMode>,
    pub mean_brightness: Option<f64>,
}

/// Everything the engine produced for one frame. Rectangles are in frame
/// coordinates.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameReport {
    pub frame_index: usize,
    pub timestamp: f64,
    pub status: FaceStatus,
    pub tracked_face: Option<Rect>,
    pub last_known_face: Option<Rect>,
    pub eye_region: Option<Rect>,
    pub eyes: Vec<Rect>,
    pub anchor: Option<Rect>,
    pub candidates: Vec<Rect>,
    pub diagnostics: Diagnostics,
}
