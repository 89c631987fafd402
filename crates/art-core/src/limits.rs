//! Tunable thresholds for the tracking pipeline.
//!
//! Each constant here is the *default*; callers that need to override one at runtime
//! should go through [`crate::TrackerConfig`] rather than relying on these
//! directly, but the constants remain the canonical defaults that
//! `TrackerConfig::default()` reproduces.

/// Frames are downscaled so that `max(cols, rows) <= MAX_DIMENSION`.
pub const MAX_DIMENSION: u32 = 640;

/// Maximum number of processed targets a catalog can hold.
pub const MAX_TARGETS: usize = 20;

/// Reference targets retain at most this many features by descending response.
pub const MAX_REF_FEATURES: usize = 500;

/// Frame features retained by descending response (down to 100 on mobile).
pub const MAX_FRAME_FEATURES: usize = 500;

/// Cap on optical-flow feature points tracked per frame.
pub const MAX_FLOW_FEATURES: usize = 100;

/// Full re-detection is forced at least this often while tracking.
pub const DETECTION_INTERVAL: u32 = 10;

/// Minimum ratio-test survivors required to accept a detection.
pub const GOOD_MATCH_MIN: usize = 20;

/// Minimum point correspondences before RANSAC homography is attempted.
pub const MIN_CORRESPONDENCES: usize = 8;

/// RANSAC reprojection threshold (pixels) for detection homography.
pub const RANSAC_REPROJ: f64 = 5.0;

/// Forward-backward error threshold (pixels), fixed mode.
pub const FB_THRESHOLD: f32 = 1.0;

/// Forward-backward error threshold (pixels), adaptive ceiling.
pub const FB_THRESHOLD_MAX: f32 = 2.0;

/// Rolling-quality mean above which the adaptive FB ceiling applies.
pub const FB_ADAPTIVE_QUALITY_MEAN: f32 = 0.8;

/// Minimum surviving flow correspondences to accept a track update.
pub const MIN_INLIERS: usize = 16;

/// Raised inlier floor used immediately after a poor frame.
pub const MIN_INLIERS_STRICT: usize = 24;

/// Maximum plausible flow magnitude, as a fraction of the frame diagonal.
pub const MAX_FLOW_MAG_DIAGONAL_FRACTION: f32 = 0.25;

/// Maximum allowed scale change versus the last accepted quadrilateral.
pub const MAX_SCALE_CHANGE: f32 = 1.5;

/// Maximum allowed rotation change (degrees) versus the last accepted quad.
pub const MAX_ROTATION_CHANGE_DEG: f32 = 45.0;

/// Maximum allowed aspect-ratio change versus the last accepted quad.
pub const MAX_ASPECT_CHANGE: f32 = 0.5;

/// Minimum accepted quadrilateral area (px^2).
pub const MIN_AREA: f32 = 100.0;

/// Minimum accepted compactness (`4*pi*A / P^2`).
pub const MIN_COMPACTNESS: f32 = 0.1;

/// Tolerance (degrees) for opposite-edge parallelism.
pub const PARALLEL_TOL_DEG: f32 = 25.0;

/// Maximum ratio between opposite-edge lengths.
pub const MAX_OPPOSITE_EDGE_RATIO: f32 = 3.0;

/// Minimum accepted interior corner angle (degrees).
pub const MIN_CORNER_DEG: f32 = 45.0;

/// Maximum accepted interior corner angle (degrees).
pub const MAX_CORNER_DEG: f32 = 135.0;

/// Maximum accepted rectangle aspect ratio (long side / short side).
pub const MAX_ASPECT_RATIO: f32 = 5.0;

/// Consecutive geometric/quality failures before `should_redetect` latches.
pub const QUALITY_DEGRADE_FRAMES: u32 = 3;

/// Frames since last full detection after which quality must stay high.
pub const FEATURE_REFRESH_INTERVAL: u32 = 30;

/// Quality floor below which `FEATURE_REFRESH_INTERVAL` forces re-detection.
pub const FEATURE_REFRESH_QUALITY_FLOOR: f32 = 0.8;

/// Spatial-distribution grid size (GRID x GRID) for flow feature selection.
pub const SPATIAL_GRID: usize = 4;

/// Vocabulary tree branching factor.
pub const VOCAB_BRANCHING: usize = 10;

/// Vocabulary tree depth.
pub const VOCAB_LEVELS: usize = 2;

/// Vocabulary query result size (top-T candidates).
pub const VOCAB_TOP_T: usize = 5;

/// Below this many processed targets, vocabulary query short-circuits to
/// "try all" rather than ranking — a tree built over a handful of targets
/// doesn't buy anything over a linear scan.
pub const VOCAB_MIN_TARGETS: usize = 5;

/// Length of the rolling quality history kept per target.
pub const QUALITY_HISTORY_LEN: usize = 10;

/// Minimum frame pump interval, in milliseconds (30 Hz nominal, gated at 1ms).
pub const MIN_FRAME_INTERVAL_MS: u64 = 1;

/// Validate that a requested feature cap is sane (non-zero, not absurd).
pub fn validate_feature_cap(cap: usize) -> crate::Result<()> {
    if cap == 0 {
        return Err(crate::ArError::Config(
            "feature cap must be non-zero".to_string(),
        ));
    }
    if cap > 10_000 {
        return Err(crate::ArError::Config(format!(
            "feature cap {cap} is implausibly large"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_feature_cap_accepts_defaults() {
        assert!(validate_feature_cap(MAX_REF_FEATURES).is_ok());
        assert!(validate_feature_cap(MAX_FRAME_FEATURES).is_ok());
        assert!(validate_feature_cap(100).is_ok());
    }

    #[test]
    fn validate_feature_cap_rejects_extremes() {
        assert!(validate_feature_cap(0).is_err());
        assert!(validate_feature_cap(50_000).is_err());
    }
}
