//! Overridable runtime configuration, layered over the hard defaults in
//! [`crate::limits`].

use serde::{Deserialize, Serialize};

use crate::limits;

/// Tunable tracker behavior. `Default` reproduces the constants in
/// [`crate::limits`] exactly; a caller overrides only the fields it cares
/// about and loads the rest from defaults, e.g. via
/// `toml::from_str::<TrackerConfig>(partial_toml)` merged onto
/// `TrackerConfig::default()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub max_dimension: u32,
    pub max_targets: usize,
    pub max_ref_features: usize,
    pub max_frame_features: usize,
    pub max_flow_features: usize,
    pub detection_interval: u32,
    pub good_match_min: usize,
    pub ransac_reproj: f64,
    pub fb_threshold: f32,
    pub fb_threshold_max: f32,
    pub min_inliers: usize,
    pub min_inliers_strict: usize,
    pub max_scale_change: f32,
    pub max_rotation_change_deg: f32,
    pub max_aspect_change: f32,
    pub quality_degrade_frames: u32,
    pub feature_refresh_interval: u32,
    pub spatial_grid: usize,
    pub vocab_branching: usize,
    pub vocab_levels: usize,
    pub vocab_top_t: usize,
    /// Off by default; see `art_vision::kalman` (spec §9 design note).
    pub kalman_smoothing: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_dimension: limits::MAX_DIMENSION,
            max_targets: limits::MAX_TARGETS,
            max_ref_features: limits::MAX_REF_FEATURES,
            max_frame_features: limits::MAX_FRAME_FEATURES,
            max_flow_features: limits::MAX_FLOW_FEATURES,
            detection_interval: limits::DETECTION_INTERVAL,
            good_match_min: limits::GOOD_MATCH_MIN,
            ransac_reproj: limits::RANSAC_REPROJ,
            fb_threshold: limits::FB_THRESHOLD,
            fb_threshold_max: limits::FB_THRESHOLD_MAX,
            min_inliers: limits::MIN_INLIERS,
            min_inliers_strict: limits::MIN_INLIERS_STRICT,
            max_scale_change: limits::MAX_SCALE_CHANGE,
            max_rotation_change_deg: limits::MAX_ROTATION_CHANGE_DEG,
            max_aspect_change: limits::MAX_ASPECT_CHANGE,
            quality_degrade_frames: limits::QUALITY_DEGRADE_FRAMES,
            feature_refresh_interval: limits::FEATURE_REFRESH_INTERVAL,
            spatial_grid: limits::SPATIAL_GRID,
            vocab_branching: limits::VOCAB_BRANCHING,
            vocab_levels: limits::VOCAB_LEVELS,
            vocab_top_t: limits::VOCAB_TOP_T,
            kalman_smoothing: false,
        }
    }
}

impl TrackerConfig {
    /// Parse a TOML document, falling back to defaults for any key it
    /// omits.
    pub fn from_toml_str(text: &str) -> crate::Result<Self> {
        toml::from_str(text).map_err(|e| crate::ArError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> crate::Result<String> {
        toml::to_string_pretty(self).map_err(|e| crate::ArError::Config(e.to_string()))
    }

    /// Reject combinations that would make the pipeline unsafe or
    /// internally inconsistent.
    pub fn validate(&self) -> crate::Result<()> {
        limits::validate_feature_cap(self.max_ref_features)?;
        limits::validate_feature_cap(self.max_frame_features)?;
        limits::validate_feature_cap(self.max_flow_features)?;
        if self.max_targets == 0 {
            return Err(crate::ArError::Config(
                "max_targets must be non-zero".to_string(),
            ));
        }
        if self.fb_threshold_max < self.fb_threshold {
            return Err(crate::ArError::Config(
                "fb_threshold_max must be >= fb_threshold".to_string(),
            ));
        }
        if self.min_inliers_strict < self.min_inliers {
            return Err(crate::ArError::Config(
                "min_inliers_strict must be >= min_inliers".to_string(),
            ));
        }
        if self.vocab_branching < 2 {
            return Err(crate::ArError::Config(
                "vocab_branching must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}
