use std::fmt;

use serde::Serialize;

use crate::shared::frame::Frame;
use crate::shared::rect::Rect;

/// Lighting regime inferred from the face region's mean brightness.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LightingMode {
    BrightDaylight,
    Normal,
    LowLight,
}

impl LightingMode {
    pub fn from_brightness(mean_brightness: f64) -> Self {
        if mean_brightness > 150.0 {
            LightingMode::BrightDaylight
        } else if mean_brightness > 100.0 {
            LightingMode::Normal
        } else {
            LightingMode::LowLight
        }
    }
}

impl fmt::Display for LightingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LightingMode::BrightDaylight => write!(f, "bright daylight"),
            LightingMode::Normal => write!(f, "normal lighting"),
            LightingMode::LowLight => write!(f, "low light"),
        }
    }
}

/// Eye rectangles found in a face region, plus the lighting diagnostic.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EyeDetection {
    /// Face-region-local coordinates.
    pub eyes: Vec<Rect>,
    pub lighting_mode: LightingMode,
    pub mean_brightness: f64,
}

/// Detects eye candidates inside a cropped face region.
pub trait EyeDetector: Send {
    fn detect(&mut self, face_region: &Frame) -> Result<EyeDetection, Box<dyn std::error::Error>>;
}
