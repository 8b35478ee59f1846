use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn check_unit(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, format!("must be within [0, 1], got {value}")))
    }
}

fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be positive, got {value}")))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Raw anchor displacement (px) that counts as "high movement".
    pub position_change_threshold: f64,
    /// Interval (s) used before two raw anchors have been observed.
    pub bootstrap_interval: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            position_change_threshold: 20.0,
            bootstrap_interval: 0.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmootherConfig {
    pub alpha: f64,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self { alpha: 0.3 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub search_padding: i32,
    pub default_window_size: i32,
    pub min_area_ratio: f64,
    pub max_area_ratio: f64,
    pub min_aspect_ratio: f64,
    pub max_aspect_ratio: f64,
    /// Score penalty per unit of relative area mismatch.
    pub size_weight: f64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            search_padding: 5,
            default_window_size: 200,
            min_area_ratio: 0.3,
            max_area_ratio: 3.0,
            min_aspect_ratio: 0.5,
            max_aspect_ratio: 2.0,
            size_weight: 50.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsistencyConfig {
    pub history_capacity: usize,
    pub bucket_size: i32,
    pub min_consistency_frames: usize,
    pub max_reset_frames: usize,
    pub reconnect_distance: f64,
}

impl Default for ConsistencyConfig {
    fn default() -> Self {
        Self {
            history_capacity: 150,
            bucket_size: 10,
            min_consistency_frames: 10,
            max_reset_frames: 40,
            reconnect_distance: 150.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorConfig {
    /// Max difference (px) between anchor-to-target and tracked-to-target
    /// distances for the movement to count as coordinated.
    pub coordination_tolerance: f64,
    pub average_size_alpha: f64,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            coordination_tolerance: 30.0,
            average_size_alpha: 0.1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapConfig {
    pub reset_distance: f64,
    pub padding: i32,
    pub outside_decay: f32,
    pub inside_decay: f32,
    pub base_heat: f32,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            reset_distance: 100.0,
            padding: 5,
            outside_decay: 0.1,
            inside_decay: 0.98,
            base_heat: 0.4,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EyeConfig {
    pub history_capacity: usize,
    pub bucket_size: i32,
    pub min_consistency_frames: usize,
    pub max_eyes: usize,
    /// Padding added around the tracked face before eye detection.
    pub region_padding: i32,
}

impl Default for EyeConfig {
    fn default() -> Self {
        Self {
            history_capacity: 50,
            bucket_size: 5,
            min_consistency_frames: 3,
            max_eyes: 2,
            region_padding: crate::shared::constants::EYE_REGION_PADDING,
        }
    }
}

/// All tunables of the tracking engine, one section per component.
///
/// Every section defaults independently, so a JSON file only needs to name
/// the values it overrides.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub scheduler: SchedulerConfig,
    pub smoother: SmootherConfig,
    pub selector: SelectorConfig,
    pub consistency: ConsistencyConfig,
    pub integrator: IntegratorConfig,
    pub heatmap: HeatmapConfig,
    pub eyes: EyeConfig,
}

impl TrackingConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: TrackingConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive(
            "scheduler.position_change_threshold",
            self.scheduler.position_change_threshold,
        )?;
        check_positive("scheduler.bootstrap_interval", self.scheduler.bootstrap_interval)?;
        check_unit("smoother.alpha", self.smoother.alpha)?;

        let s = &self.selector;
        if s.search_padding < 0 {
            return Err(invalid("selector.search_padding", "must not be negative"));
        }
        if s.default_window_size <= 0 {
            return Err(invalid("selector.default_window_size", "must be positive"));
        }
        if s.min_area_ratio >= s.max_area_ratio {
            return Err(invalid(
                "selector.min_area_ratio",
                "must be below selector.max_area_ratio",
            ));
        }
        if s.min_aspect_ratio >= s.max_aspect_ratio {
            return Err(invalid(
                "selector.min_aspect_ratio",
                "must be below selector.max_aspect_ratio",
            ));
        }

        let c = &self.consistency;
        validate_history(
            "consistency",
            c.history_capacity,
            c.bucket_size,
            c.min_consistency_frames,
        )?;
        if c.max_reset_frames == 0 {
            return Err(invalid("consistency.max_reset_frames", "must be at least 1"));
        }
        check_positive("consistency.reconnect_distance", c.reconnect_distance)?;

        check_positive(
            "integrator.coordination_tolerance",
            self.integrator.coordination_tolerance,
        )?;
        check_unit(
            "integrator.average_size_alpha",
            self.integrator.average_size_alpha,
        )?;

        let h = &self.heatmap;
        check_positive("heatmap.reset_distance", h.reset_distance)?;
        check_unit("heatmap.outside_decay", h.outside_decay as f64)?;
        check_unit("heatmap.inside_decay", h.inside_decay as f64)?;
        if h.padding < 0 {
            return Err(invalid("heatmap.padding", "must not be negative"));
        }

        let e = &self.eyes;
        validate_history("eyes", e.history_capacity, e.bucket_size, e.min_consistency_frames)?;
        if e.max_eyes == 0 {
            return Err(invalid("eyes.max_eyes", "must be at least 1"));
        }
        if e.region_padding < 0 {
            return Err(invalid("eyes.region_padding", "must not be negative"));
        }
        Ok(())
    }
}

fn validate_history(
    section: &'static str,
    capacity: usize,
    bucket_size: i32,
    min_frames: usize,
) -> Result<(), ConfigError> {
    if capacity == 0 {
        return Err(invalid(section, "history_capacity must be at least 1"));
    }
    if bucket_size <= 0 {
        return Err(invalid(section, "bucket_size must be positive"));
    }
    if min_frames == 0 || min_frames > capacity {
        return Err(invalid(
            section,
            format!("min_consistency_frames must be within 1..={capacity}, got {min_frames}"),
        ));
    }
    Ok(())
}
