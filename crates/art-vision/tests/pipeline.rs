//! Detection handing off into optical-flow tracking, exercised across
//! the public `art-vision` API rather than a single module's unit tests.

use art_core::types::{DescriptorSet, Homography, Keypoint, QuadCorners};
use art_core::TrackerConfig;
use art_vision::backend::{
    BackendError, ExtractionParams, FlowPoint, GrayImage, HomographyFit, KnnMatch, PointPair,
};
use art_vision::{detect_and_match, track, FlowResult, FlowState, FrameDescriptorCache, VisionBackend};

struct FakeBackend {
    frame_features: usize,
}

impl VisionBackend for FakeBackend {
    fn extract_features(&self, _image: GrayImage<'_>, _params: ExtractionParams) -> Result<DescriptorSet, BackendError> {
        let kps: Vec<Keypoint> = (0..self.frame_features)
            .map(|i| Keypoint { x: (i % 20) as f32, y: (i / 20) as f32, response: 1.0, size: 1.0, angle: 0.0 })
            .collect();
        let descs = (0..self.frame_features).map(|_| vec![7u8; 32]).collect();
        Ok(DescriptorSet::new(kps, descs).unwrap())
    }

    fn knn_match(&self, query: &[Vec<u8>], _train: &[Vec<u8>]) -> Result<Vec<KnnMatch>, BackendError> {
        Ok((0..query.len())
            .map(|i| KnnMatch { query_index: i, train_index: i, distance_1: 2.0, distance_2: Some(40.0) })
            .collect())
    }

    fn find_homography(&self, correspondences: &[PointPair], _t: f64) -> Result<Option<HomographyFit>, BackendError> {
        Ok(Some(HomographyFit {
            homography: Homography::IDENTITY,
            inlier_mask: vec![true; correspondences.len()],
        }))
    }

    fn good_features_to_track(&self, _image: GrayImage<'_>, _mask: &[u8], max_corners: usize, _q: f64, _d: f64) -> Result<Vec<(f32, f32)>, BackendError> {
        Ok((0..max_corners.min(30)).map(|i| ((i % 10) as f32 * 4.0, (i / 10) as f32 * 4.0)).collect())
    }

    fn calc_optical_flow(&self, _prev: GrayImage<'_>, _next: GrayImage<'_>, points: &[(f32, f32)], _w: u32, _l: u32) -> Result<Vec<FlowPoint>, BackendError> {
        // A stationary target: forward and backward flow both land back on
        // the seed point, so forward-backward error is zero either way.
        Ok(points.iter().map(|&p| FlowPoint { point: p, found: true, error: 0.1 }).collect())
    }

    fn resize(&self, _image: GrayImage<'_>, new_width: u32, new_height: u32) -> Result<Vec<u8>, BackendError> {
        Ok(vec![0u8; (new_width * new_height) as usize])
    }
}

fn target_set(n: usize) -> DescriptorSet {
    let kps: Vec<Keypoint> = (0..n)
        .map(|i| Keypoint { x: (i % 20) as f32, y: (i / 20) as f32, response: 1.0, size: 1.0, angle: 0.0 })
        .collect();
    let descs = (0..n).map(|_| vec![7u8; 32]).collect();
    DescriptorSet::new(kps, descs).unwrap()
}

#[test]
fn detection_handoff_into_flow_tracks_the_same_target() {
    let backend = FakeBackend { frame_features: 40 };
    let config = TrackerConfig::default();
    let mut cache = FrameDescriptorCache::new();

    let image = vec![0u8; 100 * 100];
    let detection = detect_and_match(
        &backend,
        &mut cache,
        GrayImage::new(&image, 100, 100),
        1,
        art_core::types::TargetId::new(0),
        &target_set(30),
        (100, 100),
        &config,
    );
    assert!(detection.is_success());
    let corners = match detection {
        art_vision::DetectionResult::Success { corners, .. } => corners,
        art_vision::DetectionResult::Failure { reason } => panic!("expected success, got {reason}"),
    };

    let mut flow_state = FlowState::default();
    flow_state.reset_after_detection(&corners);

    let prev = vec![0u8; 100 * 100];
    let next = vec![0u8; 100 * 100];
    let result = track(
        &backend,
        &mut flow_state,
        GrayImage::new(&prev, 100, 100),
        GrayImage::new(&next, 100, 100),
        &corners,
        &config,
    );

    match result {
        FlowResult::Success { corners: tracked, .. } => {
            assert!(tracked.area() > 0.0);
        }
        FlowResult::Failure { reason, .. } => panic!("flow should have succeeded, got {reason}"),
    }
}

#[test]
fn flow_state_resets_cleanly_between_independent_targets() {
    let mut state = FlowState::default();
    let quad = QuadCorners {
        top_left: (0.0, 0.0),
        top_right: (10.0, 0.0),
        bottom_right: (10.0, 10.0),
        bottom_left: (0.0, 10.0),
    };
    state.reset_after_detection(&quad);
    assert_eq!(state.frames_since_detection(), 0);
}
