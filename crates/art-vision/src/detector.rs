//! Full-frame feature extraction and matching against one reference
//! target (C4, spec §4.4).

use art_core::types::{DescriptorSet, QuadCorners, TargetId};
use art_core::TrackerConfig;

use crate::backend::{
    apply_ratio_test, transform_corners, BackendError, ExtractionParams, GrayImage, PointPair,
    VisionBackend,
};

const MIN_FRAME_FEATURES: usize = 10;
const MIN_TARGET_FEATURES: usize = 10;

/// Outcome of one detection attempt against one candidate target.
#[derive(Debug, Clone)]
pub enum DetectionResult {
    Success {
        corners: QuadCorners,
        good_match_count: usize,
    },
    Failure {
        reason: String,
    },
}

impl DetectionResult {
    pub fn good_match_count(&self) -> usize {
        match self {
            DetectionResult::Success { good_match_count, .. } => *good_match_count,
            DetectionResult::Failure { .. } => 0,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DetectionResult::Success { .. })
    }
}

fn fail(reason: impl Into<String>) -> DetectionResult {
    let reason = reason.into();
    tracing::debug!(%reason, "detection rejected");
    DetectionResult::Failure { reason }
}

/// Caches the current frame's extracted descriptors so that checking
/// multiple candidate targets against the same frame (spec §4.4,
/// "Multi-target per frame") reuses the extraction. A single slot,
/// invalidated whenever a different frame sequence number is requested.
pub struct FrameDescriptorCache {
    sequence: Option<u64>,
    descriptors: Option<DescriptorSet>,
}

impl Default for FrameDescriptorCache {
    fn default() -> Self {
        Self {
            sequence: None,
            descriptors: None,
        }
    }
}

impl FrameDescriptorCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_extract(
        &mut self,
        backend: &dyn VisionBackend,
        frame: GrayImage<'_>,
        sequence: u64,
        params: ExtractionParams,
    ) -> Result<&DescriptorSet, BackendError> {
        if self.sequence != Some(sequence) {
            let extracted = backend.extract_features(frame, params)?;
            self.descriptors = Some(extracted);
            self.sequence = Some(sequence);
        }
        Ok(self.descriptors.as_ref().expect("just populated"))
    }
}

/// Run the §4.4 pipeline: extract frame features (via `cache`), match
/// against `target_descriptors`, ratio-test, correspond, RANSAC
/// homography, transform corners.
#[tracing::instrument(skip_all, fields(target_id = %target_id))]
pub fn detect_and_match(
    backend: &dyn VisionBackend,
    cache: &mut FrameDescriptorCache,
    frame: GrayImage<'_>,
    frame_sequence: u64,
    target_id: TargetId,
    target_descriptors: &DescriptorSet,
    target_dimensions: (u32, u32),
    config: &TrackerConfig,
) -> DetectionResult {
    if target_descriptors.len() < MIN_TARGET_FEATURES {
        return fail(format!(
            "target has {} features, need {}",
            target_descriptors.len(),
            MIN_TARGET_FEATURES
        ));
    }

    let params = ExtractionParams {
        max_features: config.max_frame_features,
        detector_threshold: 55,
    };
    let frame_descriptors = match cache.get_or_extract(backend, frame, frame_sequence, params) {
        Ok(d) => d,
        Err(e) => return fail(format!("frame extraction failed: {e}")),
    };

    if frame_descriptors.len() < MIN_FRAME_FEATURES {
        return fail(format!(
            "frame has {} features, need {}",
            frame_descriptors.len(),
            MIN_FRAME_FEATURES
        ));
    }
    if frame_descriptors.width != target_descriptors.width {
        return fail(format!(
            "descriptor width mismatch: frame {} vs target {}",
            frame_descriptors.width, target_descriptors.width
        ));
    }

    let knn = match backend.knn_match(&target_descriptors.descriptors, &frame_descriptors.descriptors) {
        Ok(m) => m,
        Err(e) => return fail(format!("matching failed: {e}")),
    };
    let good_matches = apply_ratio_test(&knn, 0.7);

    if good_matches.len() < config.good_match_min {
        return fail(format!(
            "{} ratio-test survivors, need {}",
            good_matches.len(),
            config.good_match_min
        ));
    }

    let mut correspondences = Vec::with_capacity(good_matches.len());
    for m in &good_matches {
        let Some(target_kp) = target_descriptors.keypoints.get(m.query_index) else {
            continue;
        };
        let Some(frame_kp) = frame_descriptors.keypoints.get(m.train_index) else {
            continue;
        };
        if !target_kp.x.is_finite()
            || !target_kp.y.is_finite()
            || !frame_kp.x.is_finite()
            || !frame_kp.y.is_finite()
        {
            continue;
        }
        correspondences.push(PointPair {
            from: (target_kp.x as f64, target_kp.y as f64),
            to: (frame_kp.x as f64, frame_kp.y as f64),
        });
    }

    if correspondences.len() < art_core::limits::MIN_CORRESPONDENCES {
        return fail(format!(
            "{} point correspondences, need {}",
            correspondences.len(),
            art_core::limits::MIN_CORRESPONDENCES
        ));
    }

    let fit = match backend.find_homography(&correspondences, config.ransac_reproj) {
        Ok(Some(fit)) => fit,
        Ok(None) => return fail("degenerate or singular homography"),
        Err(e) => return fail(format!("homography estimation failed: {e}")),
    };

    let (cols, rows) = target_dimensions;
    let Some(corners) = transform_corners(&fit.homography, cols as f64, rows as f64) else {
        return fail("transformed corners are not finite");
    };

    tracing::debug!(good_matches = good_matches.len(), "detection accepted");
    DetectionResult::Success {
        corners,
        good_match_count: good_matches.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FlowPoint, HomographyFit, KnnMatch};
    use art_core::types::{Homography, Keypoint};

    struct FakeBackend {
        frame_features: usize,
        knn_matches: Vec<KnnMatch>,
        homography: Option<Homography>,
    }

    impl VisionBackend for FakeBackend {
        fn extract_features(
            &self,
            _image: GrayImage<'_>,
            _params: ExtractionParams,
        ) -> Result<DescriptorSet, BackendError> {
            let kps: Vec<Keypoint> = (0..self.frame_features)
                .map(|i| Keypoint {
                    x: i as f32,
                    y: i as f32,
                    response: 1.0,
                    size: 1.0,
                    angle: 0.0,
                })
                .collect();
            let descs = (0..self.frame_features).map(|_| vec![0u8; 32]).collect();
            Ok(DescriptorSet::new(kps, descs).unwrap())
        }

        fn knn_match(
            &self,
            _query: &[Vec<u8>],
            _train: &[Vec<u8>],
        ) -> Result<Vec<KnnMatch>, BackendError> {
            Ok(self.knn_matches.clone())
        }

        fn find_homography(
            &self,
            correspondences: &[PointPair],
            _reproj_threshold: f64,
        ) -> Result<Option<HomographyFit>, BackendError> {
            Ok(self.homography.map(|h| HomographyFit {
                homography: h,
                inlier_mask: vec![true; correspondences.len()],
            }))
        }

        fn good_features_to_track(
            &self,
            _image: GrayImage<'_>,
            _mask: &[u8],
            _max_corners: usize,
            _quality_level: f64,
            _min_distance: f64,
        ) -> Result<Vec<(f32, f32)>, BackendError> {
            Ok(Vec::new())
        }

        fn calc_optical_flow(
            &self,
            _prev: GrayImage<'_>,
            _next: GrayImage<'_>,
            _points: &[(f32, f32)],
            _win_size: u32,
            _max_level: u32,
        ) -> Result<Vec<FlowPoint>, BackendError> {
            Ok(Vec::new())
        }

        fn resize(
            &self,
            _image: GrayImage<'_>,
            new_width: u32,
            new_height: u32,
        ) -> Result<Vec<u8>, BackendError> {
            Ok(vec![0u8; (new_width * new_height) as usize])
        }
    }

    fn target_set(n: usize) -> DescriptorSet {
        let kps: Vec<Keypoint> = (0..n)
            .map(|i| Keypoint {
                x: i as f32,
                y: i as f32,
                response: 1.0,
                size: 1.0,
                angle: 0.0,
            })
            .collect();
        let descs = (0..n).map(|_| vec![0u8; 32]).collect();
        DescriptorSet::new(kps, descs).unwrap()
    }

    fn good_knn(n: usize) -> Vec<KnnMatch> {
        (0..n)
            .map(|i| KnnMatch {
                query_index: i,
                train_index: i,
                distance_1: 5.0,
                distance_2: Some(50.0),
            })
            .collect()
    }

    #[test]
    fn rejects_target_with_too_few_features() {
        let backend = FakeBackend {
            frame_features: 50,
            knn_matches: good_knn(25),
            homography: Some(Homography::IDENTITY),
        };
        let mut cache = FrameDescriptorCache::new();
        let image = vec![0u8; 64];
        let result = detect_and_match(
            &backend,
            &mut cache,
            GrayImage::new(&image, 8, 8),
            1,
            TargetId::new(1),
            &target_set(3),
            (100, 100),
            &TrackerConfig::default(),
        );
        assert!(!result.is_success());
    }

    #[test]
    fn accepts_a_clean_match() {
        let backend = FakeBackend {
            frame_features: 50,
            knn_matches: good_knn(25),
            homography: Some(Homography::IDENTITY),
        };
        let mut cache = FrameDescriptorCache::new();
        let image = vec![0u8; 64];
        let result = detect_and_match(
            &backend,
            &mut cache,
            GrayImage::new(&image, 8, 8),
            1,
            TargetId::new(1),
            &target_set(30),
            (100, 100),
            &TrackerConfig::default(),
        );
        assert!(result.is_success());
        assert_eq!(result.good_match_count(), 25);
    }

    #[test]
    fn rejects_when_below_good_match_minimum() {
        let backend = FakeBackend {
            frame_features: 50,
            knn_matches: good_knn(5),
            homography: Some(Homography::IDENTITY),
        };
        let mut cache = FrameDescriptorCache::new();
        let image = vec![0u8; 64];
        let result = detect_and_match(
            &backend,
            &mut cache,
            GrayImage::new(&image, 8, 8),
            1,
            TargetId::new(1),
            &target_set(30),
            (100, 100),
            &TrackerConfig::default(),
        );
        assert!(!result.is_success());
    }

    #[test]
    fn rejects_degenerate_homography() {
        let backend = FakeBackend {
            frame_features: 50,
            knn_matches: good_knn(25),
            homography: None,
        };
        let mut cache = FrameDescriptorCache::new();
        let image = vec![0u8; 64];
        let result = detect_and_match(
            &backend,
            &mut cache,
            GrayImage::new(&image, 8, 8),
            1,
            TargetId::new(1),
            &target_set(30),
            (100, 100),
            &TrackerConfig::default(),
        );
        assert!(!result.is_success());
    }

    #[test]
    fn cache_reuses_extraction_across_candidates_on_same_frame() {
        let backend = FakeBackend {
            frame_features: 50,
            knn_matches: good_knn(25),
            homography: Some(Homography::IDENTITY),
        };
        let mut cache = FrameDescriptorCache::new();
        let image = vec![0u8; 64];
        let first = detect_and_match(
            &backend,
            &mut cache,
            GrayImage::new(&image, 8, 8),
            7,
            TargetId::new(1),
            &target_set(30),
            (100, 100),
            &TrackerConfig::default(),
        );
        assert!(first.is_success());
        assert_eq!(cache.sequence, Some(7));
        let second = detect_and_match(
            &backend,
            &mut cache,
            GrayImage::new(&image, 8, 8),
            7,
            TargetId::new(2),
            &target_set(30),
            (100, 100),
            &TrackerConfig::default(),
        );
        assert!(second.is_success());
        assert_eq!(cache.sequence, Some(7));
    }
}
