//! The seam between pure-Rust kernel logic and a real computer-vision
//! runtime.
//!
//! Ratio tests, RANSAC-threshold bookkeeping, and geometric validation
//! (see [`crate::detector`], [`crate::flow`], [`crate::geometry`]) are all
//! pure Rust and exercised in tests against a fake implementation of this
//! trait. The shipped implementation, [`crate::opencv_backend::OpenCvBackend`],
//! does the actual extraction, matching, and homography estimation.

use art_core::types::{DescriptorSet, Homography, Keypoint};
use thiserror::Error;

/// A borrowed grayscale image view. Owned pixel storage lives with the
/// caller (typically an [`art_core::FrameBuffer`]); the backend never
/// takes ownership of frame memory.
#[derive(Debug, Clone, Copy)]
pub struct GrayImage<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
}

impl<'a> GrayImage<'a> {
    pub fn new(data: &'a [u8], width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }
}

/// One nearest-neighbor match from a query (target) descriptor to a train
/// (frame) descriptor, with the two best Hamming distances needed for
/// Lowe's ratio test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnnMatch {
    pub query_index: usize,
    pub train_index: usize,
    pub distance_1: f32,
    /// `None` when the train set has only one descriptor, in which case
    /// the ratio test cannot run and the caller falls back to a
    /// thresholded best-match accept.
    pub distance_2: Option<f32>,
}

/// A 2-D point correspondence used to fit a homography.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointPair {
    pub from: (f64, f64),
    pub to: (f64, f64),
}

/// Result of a RANSAC homography fit.
#[derive(Debug, Clone)]
pub struct HomographyFit {
    pub homography: Homography,
    /// Parallel to the input correspondences: `true` where RANSAC kept the
    /// point as an inlier.
    pub inlier_mask: Vec<bool>,
}

/// One point tracked by pyramidal Lucas-Kanade, forward or backward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowPoint {
    pub point: (f32, f32),
    pub found: bool,
    pub error: f32,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend operation failed: {0}")]
    Operation(String),
}

/// Tuning knobs threaded down to the backend; kept separate from
/// `art_core::TrackerConfig` so kernels can construct ad-hoc values in
/// tests without building a full config.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionParams {
    pub max_features: usize,
    pub detector_threshold: u8,
}

/// The computer-vision operations the kernel logic needs, independent of
/// which CV library provides them.
pub trait VisionBackend {
    /// Grayscale conversion + 3x3 Gaussian blur + histogram equalisation,
    /// then binary-descriptor keypoint extraction, sorted by response
    /// descending and truncated to `params.max_features`.
    fn extract_features(
        &self,
        image: GrayImage<'_>,
        params: ExtractionParams,
    ) -> Result<DescriptorSet, BackendError>;

    /// KNN (k=2) Hamming matching of every `query` descriptor against
    /// `train`. Returns one [`KnnMatch`] per query descriptor that has at
    /// least one candidate.
    fn knn_match(
        &self,
        query: &[Vec<u8>],
        train: &[Vec<u8>],
    ) -> Result<Vec<KnnMatch>, BackendError>;

    /// RANSAC homography estimation with the given reprojection threshold
    /// (pixels). Returns `None` when the fit is degenerate or singular.
    fn find_homography(
        &self,
        correspondences: &[PointPair],
        reproj_threshold: f64,
    ) -> Result<Option<HomographyFit>, BackendError>;

    /// `cv::goodFeaturesToTrack` restricted to the pixels where `mask` is
    /// non-zero. `mask` is row-major, same dimensions as `image`.
    fn good_features_to_track(
        &self,
        image: GrayImage<'_>,
        mask: &[u8],
        max_corners: usize,
        quality_level: f64,
        min_distance: f64,
    ) -> Result<Vec<(f32, f32)>, BackendError>;

    /// Pyramidal Lucas-Kanade optical flow from `prev` to `next` for the
    /// given starting points.
    fn calc_optical_flow(
        &self,
        prev: GrayImage<'_>,
        next: GrayImage<'_>,
        points: &[(f32, f32)],
        win_size: u32,
        max_level: u32,
    ) -> Result<Vec<FlowPoint>, BackendError>;

    /// Area-filter resize to `(new_width, new_height)`, used to enforce
    /// `max(cols, rows) <= MAX_DIMENSION` (spec §3) before a frame enters
    /// the pipeline.
    fn resize(
        &self,
        image: GrayImage<'_>,
        new_width: u32,
        new_height: u32,
    ) -> Result<Vec<u8>, BackendError>;
}

/// Apply a homography to a rectangle's four corners in the fixed cyclic
/// order used throughout this workspace (top-left, top-right,
/// bottom-right, bottom-left). Pure function, no backend involved.
pub fn transform_corners(
    homography: &Homography,
    width: f64,
    height: f64,
) -> Option<art_core::types::QuadCorners> {
    let corners = [(0.0, 0.0), (width, 0.0), (width, height), (0.0, height)];
    let mut transformed = Vec::with_capacity(4);
    for (x, y) in corners {
        let (px, py) = homography.apply(x, y)?;
        if !px.is_finite() || !py.is_finite() {
            return None;
        }
        transformed.push((px as f32, py as f32));
    }
    Some(art_core::types::QuadCorners {
        top_left: transformed[0],
        top_right: transformed[1],
        bottom_right: transformed[2],
        bottom_left: transformed[3],
    })
}

/// Keep matches that pass Lowe's ratio test: `d1 < ratio * d2`. Matches
/// with no second-best distance fall back to a thresholded best-match
/// accept at `min(100.0, 3.0 * d1_min)`, per spec §4.4 step 4.
pub fn apply_ratio_test(matches: &[KnnMatch], ratio: f32) -> Vec<KnnMatch> {
    let has_any_second = matches.iter().any(|m| m.distance_2.is_some());
    if has_any_second {
        matches
            .iter()
            .filter(|m| match m.distance_2 {
                Some(d2) => m.distance_1 < ratio * d2,
                None => false,
            })
            .copied()
            .collect()
    } else {
        let d_min = matches
            .iter()
            .map(|m| m.distance_1)
            .fold(f32::INFINITY, f32::min);
        if !d_min.is_finite() {
            return Vec::new();
        }
        let threshold = (3.0 * d_min).min(100.0);
        matches
            .iter()
            .filter(|m| m.distance_1 <= threshold)
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use art_core::types::Keypoint;

    fn kp(x: f32, y: f32) -> Keypoint {
        Keypoint {
            x,
            y,
            response: 1.0,
            size: 1.0,
            angle: 0.0,
        }
    }

    #[test]
    fn ratio_test_keeps_only_distinct_matches() {
        let matches = vec![
            KnnMatch {
                query_index: 0,
                train_index: 0,
                distance_1: 10.0,
                distance_2: Some(50.0),
            },
            KnnMatch {
                query_index: 1,
                train_index: 1,
                distance_1: 40.0,
                distance_2: Some(45.0),
            },
        ];
        let kept = apply_ratio_test(&matches, 0.7);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].query_index, 0);
    }

    #[test]
    fn ratio_test_falls_back_without_second_best() {
        let matches = vec![
            KnnMatch {
                query_index: 0,
                train_index: 0,
                distance_1: 10.0,
                distance_2: None,
            },
            KnnMatch {
                query_index: 1,
                train_index: 1,
                distance_1: 200.0,
                distance_2: None,
            },
        ];
        let kept = apply_ratio_test(&matches, 0.7);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].query_index, 0);
    }

    #[test]
    fn transform_corners_rejects_degenerate_mapping() {
        let degenerate = Homography([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]]);
        assert!(transform_corners(&degenerate, 10.0, 10.0).is_none());
    }

    #[test]
    fn transform_corners_identity_preserves_rectangle() {
        let quad = transform_corners(&Homography::IDENTITY, 100.0, 50.0).unwrap();
        assert_eq!(quad.top_left, (0.0, 0.0));
        assert_eq!(quad.bottom_right, (100.0, 50.0));
    }

    #[test]
    fn keypoint_helper_builds_expected_shape() {
        let k = kp(1.0, 2.0);
        assert_eq!((k.x, k.y), (1.0, 2.0));
    }
}
