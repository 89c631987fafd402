//! Per-frame detection/tracking scheduler (C6, spec §4.6).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use art_core::types::{
    downscale_dimensions, FrameBuffer, QuadCorners, QualityMetrics, TargetId, TrackingMode,
    TrackingResult,
};
use art_core::{ArError, PooledBuffer, ReferenceTarget, ResourcePool, TargetCatalog, TrackerConfig};
use art_vision::backend::GrayImage;
use art_vision::kalman::CornerKalmanFilter;
use art_vision::{detect_and_match, track, DetectionResult, FlowResult, FlowState, FrameDescriptorCache, VisionBackend, VocabularyIndex};

use crate::collaborators::{CameraSource, Renderer};
use crate::event::{ErrorCode, Event, EventSink};

/// The three scheduling states from spec §4.6. `Detecting` is not a
/// steady state — the orchestrator runs a detection pass and lands back
/// in either `Tracking` or `Searching` within the same call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    Searching,
    Tracking(TargetId),
}

/// A frame buffer checked out of the orchestrator's [`ResourcePool`] and
/// adopted by a [`PerTargetState`] as its `last_frame`. The pool slot is
/// released automatically when this (and therefore the wrapped
/// `PooledBuffer`) drops — on replacement by a later frame, on target
/// removal, or when `retain_only_adopted_frames` evicts the entry.
struct PooledFrame {
    buffer: PooledBuffer,
    width: u32,
    height: u32,
}

impl PooledFrame {
    fn as_slice(&self) -> &[u8] {
        self.buffer.as_slice()
    }
}

/// Per-target bookkeeping kept across frames (spec §3 `PerTargetState`):
/// the last accepted corners, a pool-backed copy of the last frame it was
/// computed against, a frame counter since the last full detection, and
/// the flow tracker's own rolling-quality/poor-frame state.
struct PerTargetState {
    last_frame: PooledFrame,
    last_corners: QuadCorners,
    frame_count: u32,
    flow_state: FlowState,
    kalman: Option<CornerKalmanFilter>,
}

/// Process/measurement noise for the optional corner smoother (spec §9).
const KALMAN_PROCESS_NOISE: f32 = 0.01;
const KALMAN_MEASUREMENT_NOISE: f32 = 1.0;

/// Runs the per-frame scheduler: chooses detection vs. flow, manages
/// per-target tracking state, and emits the outward-facing
/// [`TrackingResult`] plus [`Event`]s.
pub struct TrackingOrchestrator {
    backend: Box<dyn VisionBackend>,
    catalog: TargetCatalog,
    vocabulary: Option<VocabularyIndex>,
    config: TrackerConfig,
    state: PipelineState,
    per_target: HashMap<u64, PerTargetState>,
    frame_cache: FrameDescriptorCache,
    resource_pool: ResourcePool,
    next_sequence: u64,
    busy: AtomicBool,
    stop: AtomicBool,
}

impl TrackingOrchestrator {
    pub fn new(backend: Box<dyn VisionBackend>, config: TrackerConfig) -> Self {
        // One adopted `last_frame` per tracked target plus headroom for the
        // brief overlap while a newly detected target is adopted before
        // `retain_only_adopted_frames` evicts the previous one (spec §4.7).
        let pool_capacity = config.max_targets + 1;
        Self {
            backend,
            catalog: TargetCatalog::new(config.max_targets),
            vocabulary: None,
            config,
            state: PipelineState::Searching,
            per_target: HashMap::new(),
            frame_cache: FrameDescriptorCache::new(),
            resource_pool: ResourcePool::new(pool_capacity),
            next_sequence: 0,
            busy: AtomicBool::new(false),
            stop: AtomicBool::new(false),
        }
    }

    /// Emit the pipeline's startup events. Call once, before the first
    /// [`Self::pump`] (spec §6: `on_initialized` / `on_tracking_started`).
    pub fn start(&mut self, sink: &mut dyn EventSink) {
        sink.on_event(Event::Initialized);
        sink.on_event(Event::TrackingStarted);
    }

    /// Check a frame's bytes out of the resource pool and copy `frame`
    /// into it, for adoption as a `PerTargetState::last_frame`.
    fn adopt_frame(&self, frame: &FrameBuffer) -> art_core::Result<PooledFrame> {
        let mut buffer = self.resource_pool.acquire(frame.data.len())?;
        buffer.as_mut_slice().copy_from_slice(&frame.data);
        Ok(PooledFrame {
            buffer,
            width: frame.width,
            height: frame.height,
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn catalog(&self) -> &TargetCatalog {
        &self.catalog
    }

    /// Insert a processed target and rebuild the vocabulary index, as an
    /// atomic swap (spec §4.3).
    pub fn add_target(&mut self, target: ReferenceTarget, sink: &mut dyn EventSink) -> art_core::Result<TargetId> {
        if !target.is_processed() {
            return Err(ArError::InvalidImage("target must be processed before insertion".into()));
        }
        let feature_count = target.get_data()?.0.len();
        let id = self.catalog.insert(target)?;
        self.rebuild_vocabulary();
        sink.on_event(Event::ReferenceLoaded {
            target_id: id,
            feature_count,
        });
        Ok(id)
    }

    pub fn remove_target(&mut self, id: TargetId) -> bool {
        let removed = self.catalog.remove(id);
        if removed {
            self.per_target.remove(&id.value());
            if self.state == PipelineState::Tracking(id) {
                self.state = PipelineState::Searching;
            }
            self.rebuild_vocabulary();
        }
        removed
    }

    fn rebuild_vocabulary(&mut self) {
        let owned: Vec<(TargetId, Vec<art_core::types::Descriptor>)> = self
            .catalog
            .processed_targets()
            .filter_map(|t| t.get_data().ok().map(|(set, _, id)| (id, set.descriptors.clone())))
            .collect();
        let refs: Vec<(TargetId, &[art_core::types::Descriptor])> =
            owned.iter().map(|(id, d)| (*id, d.as_slice())).collect();
        self.vocabulary = VocabularyIndex::build(&refs, self.config.vocab_branching, self.config.vocab_levels);
    }

    /// Run one scheduling tick: capture a frame, downscale it, choose
    /// detection or flow, update state, and emit the result. Returns
    /// `None` when the orchestrator was busy or no frame was available
    /// (spec §4.6 back-pressure: the new frame is dropped, never queued).
    #[tracing::instrument(skip_all)]
    pub fn pump(
        &mut self,
        camera: &mut dyn CameraSource,
        renderer: &mut dyn Renderer,
        sink: &mut dyn EventSink,
        timestamp_ms: u64,
    ) -> Option<TrackingResult> {
        if self.stop.load(Ordering::Acquire) {
            sink.on_event(Event::TrackingStopped);
            return None;
        }
        if self.busy.swap(true, Ordering::AcqRel) {
            tracing::debug!("frame dropped: orchestrator busy");
            return None;
        }
        let result = self.process_frame(camera, timestamp_ms, sink);
        if let Some(result) = &result {
            renderer.render(result, &camera.viewport_mapping());
        }
        self.busy.store(false, Ordering::Release);
        result
    }

    fn process_frame(
        &mut self,
        camera: &mut dyn CameraSource,
        timestamp_ms: u64,
        sink: &mut dyn EventSink,
    ) -> Option<TrackingResult> {
        let Some(raw_frame) = camera.capture() else {
            return None;
        };

        let frame = match self.downscale(raw_frame) {
            Ok(f) => f,
            Err(e) => {
                sink.on_event(Event::Error {
                    code: ErrorCode::BackendUnavailable,
                    message: e.to_string(),
                });
                return Some(TrackingResult::failure(TrackingMode::None));
            }
        };
        self.next_sequence += 1;
        let sequence = self.next_sequence;

        if self.catalog.processed_targets().next().is_none() {
            sink.on_event(Event::Error {
                code: ErrorCode::CatalogEmpty,
                message: "no processed targets in catalog".to_string(),
            });
            return Some(TrackingResult::failure(TrackingMode::None));
        }

        let result = match self.state {
            PipelineState::Tracking(target_id) if !self.should_force_detection(target_id) => {
                self.run_tracking(target_id, &frame)
            }
            _ => self.run_detecting(&frame, sequence),
        };

        if result.success {
            if let Some(id) = result.target_id {
                sink.on_event(Event::TrackingFound { target_id: id });
                sink.on_event(Event::PoseUpdated {
                    target_id: id,
                    corners: result.corners.expect("success implies corners"),
                    display_corners: self.to_display(&result.corners.unwrap(), &camera.viewport_mapping()),
                    quality: result.quality,
                    timestamp_ms,
                });
            }
        } else if self.state == PipelineState::Searching {
            sink.on_event(Event::TrackingLost);
        }

        self.retain_only_adopted_frames();
        Some(result)
    }

    fn to_display(&self, corners: &QuadCorners, mapping: &art_core::ViewportMapping) -> QuadCorners {
        let transform = |p: (f32, f32)| mapping.video_to_display(p.0, p.1);
        QuadCorners {
            top_left: transform(corners.top_left),
            top_right: transform(corners.top_right),
            bottom_right: transform(corners.bottom_right),
            bottom_left: transform(corners.bottom_left),
        }
    }

    fn should_force_detection(&self, target_id: TargetId) -> bool {
        match self.per_target.get(&target_id.value()) {
            Some(state) => (state.frame_count + 1) % self.config.detection_interval == 0,
            None => true,
        }
    }

    fn run_tracking(&mut self, target_id: TargetId, frame: &FrameBuffer) -> TrackingResult {
        let Some(per_target) = self.per_target.get_mut(&target_id.value()) else {
            self.state = PipelineState::Searching;
            return TrackingResult::failure(TrackingMode::None);
        };

        let prev_image = GrayImage::new(
            per_target.last_frame.as_slice(),
            per_target.last_frame.width,
            per_target.last_frame.height,
        );
        let next_image = GrayImage::new(&frame.data, frame.width, frame.height);

        let flow_result = track(
            self.backend.as_ref(),
            &mut per_target.flow_state,
            prev_image,
            next_image,
            &per_target.last_corners,
            &self.config,
        );

        match flow_result {
            FlowResult::Success {
                corners,
                quality,
                should_redetect,
            } => {
                let corners = match &mut per_target.kalman {
                    Some(filter) => filter.update(&corners),
                    None => corners,
                };
                let pooled = match self.adopt_frame(frame) {
                    Ok(pooled) => pooled,
                    Err(e) => {
                        self.state = PipelineState::Searching;
                        tracing::warn!(error = %e, "resource pool exhausted, dropping tracked target");
                        return TrackingResult::failure(TrackingMode::Flow);
                    }
                };
                let per_target = self.per_target.get_mut(&target_id.value()).expect("checked above");
                per_target.last_frame = pooled;
                per_target.last_corners = corners;
                per_target.frame_count += 1;
                if should_redetect {
                    self.state = PipelineState::Searching;
                } else {
                    self.state = PipelineState::Tracking(target_id);
                }
                TrackingResult {
                    success: true,
                    target_id: Some(target_id),
                    corners: Some(corners),
                    mode: TrackingMode::Flow,
                    quality,
                    should_redetect,
                }
            }
            FlowResult::Failure { should_redetect, .. } => {
                // spec §4.6 step 7 / §9 open question (b): a failed flow
                // forces detection on the very next frame.
                per_target.frame_count = self.config.detection_interval.saturating_sub(1);
                self.state = PipelineState::Searching;
                let mut result = TrackingResult::failure(TrackingMode::Flow);
                result.should_redetect = should_redetect;
                result
            }
        }
    }

    fn run_detecting(&mut self, frame: &FrameBuffer, sequence: u64) -> TrackingResult {
        let candidates = self.candidate_targets(frame);

        let mut best: Option<(TargetId, DetectionResult)> = None;
        for candidate_id in candidates {
            let Some(target) = self.catalog.get(candidate_id) else {
                continue;
            };
            let Ok((descriptors, dims, _)) = target.get_data() else {
                continue;
            };
            let image = GrayImage::new(&frame.data, frame.width, frame.height);
            let detection = detect_and_match(
                self.backend.as_ref(),
                &mut self.frame_cache,
                image,
                sequence,
                candidate_id,
                descriptors,
                dims,
                &self.config,
            );
            let is_better = match &best {
                None => true,
                Some((_, existing)) => detection.good_match_count() > existing.good_match_count(),
            };
            if detection.is_success() && is_better {
                best = Some((candidate_id, detection));
            }
        }

        match best {
            Some((target_id, DetectionResult::Success { corners, good_match_count })) => {
                let mut flow_state = FlowState::default();
                flow_state.reset_after_detection(&corners);
                let mut kalman = self
                    .config
                    .kalman_smoothing
                    .then(|| CornerKalmanFilter::new(KALMAN_PROCESS_NOISE, KALMAN_MEASUREMENT_NOISE));
                // Seed the filter with the first measurement; `update` passes
                // it through unfiltered, so `corners` is unchanged here.
                let corners = match &mut kalman {
                    Some(filter) => filter.update(&corners),
                    None => corners,
                };
                let last_frame = match self.adopt_frame(frame) {
                    Ok(pooled) => pooled,
                    Err(e) => {
                        self.state = PipelineState::Searching;
                        tracing::warn!(error = %e, "resource pool exhausted, discarding detection");
                        return TrackingResult::failure(TrackingMode::Detection);
                    }
                };
                self.per_target.insert(
                    target_id.value(),
                    PerTargetState {
                        last_frame,
                        last_corners: corners,
                        frame_count: 0,
                        flow_state,
                        kalman,
                    },
                );
                self.state = PipelineState::Tracking(target_id);
                TrackingResult {
                    success: true,
                    target_id: Some(target_id),
                    corners: Some(corners),
                    mode: TrackingMode::Detection,
                    quality: QualityMetrics {
                        inlier_ratio: 0.0,
                        mean_fb_error: 0.0,
                        geometric_score: 0.0,
                        composite: (good_match_count as f32 / self.config.good_match_min.max(1) as f32).min(1.0),
                    },
                    should_redetect: false,
                }
            }
            _ => {
                self.state = PipelineState::Searching;
                TrackingResult::failure(TrackingMode::Detection)
            }
        }
    }

    fn candidate_targets(&mut self, frame: &FrameBuffer) -> Vec<TargetId> {
        let all_ids: Vec<TargetId> = self.catalog.processed_targets().map(|t| t.id()).collect();
        let Some(vocabulary) = &self.vocabulary else {
            return all_ids;
        };
        let image = GrayImage::new(&frame.data, frame.width, frame.height);
        let params = art_vision::ExtractionParams {
            max_features: self.config.max_frame_features,
            detector_threshold: 55,
        };
        let Ok(query_set) = self.backend.extract_features(image, params) else {
            return all_ids;
        };
        vocabulary.query(&query_set.descriptors, self.config.vocab_top_t, &all_ids)
    }

    fn downscale(&self, frame: FrameBuffer) -> art_core::Result<FrameBuffer> {
        let (target_w, target_h) = downscale_dimensions(frame.width, frame.height, self.config.max_dimension);
        if (target_w, target_h) == (frame.width, frame.height) {
            return Ok(frame);
        }
        let image = GrayImage::new(&frame.data, frame.width, frame.height);
        let resized = self
            .backend
            .resize(image, target_w, target_h)
            .map_err(|e| ArError::Backend(e.to_string()))?;
        FrameBuffer::new(resized, target_w, target_h, frame.sequence)
    }

    /// Release any per-target `last_frame` whose owner is no longer being
    /// tracked — targets dropped from the active state machine path don't
    /// linger holding a frame buffer (spec §4.6 step 8).
    fn retain_only_adopted_frames(&mut self) {
        if let PipelineState::Tracking(active) = self.state {
            self.per_target.retain(|&id, _| id == active.value());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use art_core::types::{DescriptorSet, Keypoint};
    use art_core::PrepareOptions;
    use art_vision::backend::{BackendError, ExtractionParams, FlowPoint, HomographyFit, KnnMatch, PointPair};
    use art_vision::VisionBackend;

    struct StubCamera {
        frames: std::collections::VecDeque<FrameBuffer>,
    }
    impl CameraSource for StubCamera {
        fn capture(&mut self) -> Option<FrameBuffer> {
            self.frames.pop_front()
        }
        fn viewport_mapping(&self) -> art_core::ViewportMapping {
            art_core::ViewportMapping::new(64.0, 64.0, 64.0, 64.0)
        }
    }

    struct NullRenderer;
    impl Renderer for NullRenderer {
        fn render(&mut self, _result: &TrackingResult, _mapping: &art_core::ViewportMapping) {}
    }

    struct StubBackend;
    impl VisionBackend for StubBackend {
        fn extract_features(&self, _image: GrayImage<'_>, _params: ExtractionParams) -> Result<DescriptorSet, BackendError> {
            let kps: Vec<Keypoint> = (0..30)
                .map(|i| Keypoint { x: i as f32, y: i as f32, response: 1.0, size: 1.0, angle: 0.0 })
                .collect();
            let descs = (0..30).map(|_| vec![1u8; 32]).collect();
            Ok(DescriptorSet::new(kps, descs).unwrap())
        }
        fn knn_match(&self, query: &[Vec<u8>], _train: &[Vec<u8>]) -> Result<Vec<KnnMatch>, BackendError> {
            Ok((0..query.len())
                .map(|i| KnnMatch { query_index: i, train_index: i % 30, distance_1: 1.0, distance_2: Some(50.0) })
                .collect())
        }
        fn find_homography(&self, correspondences: &[PointPair], _t: f64) -> Result<Option<HomographyFit>, BackendError> {
            Ok(Some(HomographyFit {
                homography: art_core::types::Homography::IDENTITY,
                inlier_mask: vec![true; correspondences.len()],
            }))
        }
        fn good_features_to_track(&self, _image: GrayImage<'_>, _mask: &[u8], max_corners: usize, _q: f64, _d: f64) -> Result<Vec<(f32, f32)>, BackendError> {
            Ok((0..max_corners.min(20)).map(|i| (i as f32, i as f32)).collect())
        }
        fn calc_optical_flow(&self, _prev: GrayImage<'_>, _next: GrayImage<'_>, points: &[(f32, f32)], _w: u32, _l: u32) -> Result<Vec<FlowPoint>, BackendError> {
            Ok(points.iter().map(|&p| FlowPoint { point: p, found: true, error: 0.1 }).collect())
        }
        fn resize(&self, _image: GrayImage<'_>, new_width: u32, new_height: u32) -> Result<Vec<u8>, BackendError> {
            Ok(vec![0u8; (new_width * new_height) as usize])
        }
    }

    fn frame(seq: u64) -> FrameBuffer {
        FrameBuffer::new(vec![0u8; 64 * 64], 64, 64, seq).unwrap()
    }

    fn make_target(id: TargetId) -> ReferenceTarget {
        let mut target = ReferenceTarget::new_unprocessed(id, "t".into(), 64, 64);
        let kps: Vec<Keypoint> = (0..30)
            .map(|i| Keypoint { x: i as f32, y: i as f32, response: i as f32, size: 1.0, angle: 0.0 })
            .collect();
        let descs = (0..30).map(|_| vec![1u8; 32]).collect();
        let set = DescriptorSet::new(kps, descs).unwrap();
        target.mark_processed(set, vec![], &PrepareOptions::default()).unwrap();
        target
    }

    #[test]
    fn empty_catalog_never_succeeds() {
        let mut orchestrator = TrackingOrchestrator::new(Box::new(StubBackend), TrackerConfig::default());
        let mut camera = StubCamera { frames: vec![frame(1)].into() };
        let mut renderer = NullRenderer;
        let mut sink = crate::event::RecordingSink::default();
        let result = orchestrator.pump(&mut camera, &mut renderer, &mut sink, 0).unwrap();
        assert!(!result.success);
        assert!(sink.events.iter().any(|e| matches!(
            e,
            Event::Error { code: ErrorCode::CatalogEmpty, .. }
        )));
    }

    #[test]
    fn start_emits_initialized_then_tracking_started() {
        let mut orchestrator = TrackingOrchestrator::new(Box::new(StubBackend), TrackerConfig::default());
        let mut sink = crate::event::RecordingSink::default();
        orchestrator.start(&mut sink);
        assert_eq!(sink.events.len(), 2);
        assert!(matches!(sink.events[0], Event::Initialized));
        assert!(matches!(sink.events[1], Event::TrackingStarted));
    }

    #[test]
    fn adopted_frames_return_to_the_pool_on_replacement() {
        let mut orchestrator = TrackingOrchestrator::new(Box::new(StubBackend), TrackerConfig::default());
        let mut sink = crate::event::RecordingSink::default();
        let id = orchestrator.add_target(make_target(TargetId::new(0)), &mut sink).unwrap();
        let mut camera = StubCamera { frames: vec![frame(1), frame(2), frame(3)].into() };
        let mut renderer = NullRenderer;

        orchestrator.pump(&mut camera, &mut renderer, &mut sink, 0);
        orchestrator.pump(&mut camera, &mut renderer, &mut sink, 1);
        orchestrator.pump(&mut camera, &mut renderer, &mut sink, 2);

        assert!(orchestrator.per_target.contains_key(&id.value()));
        // Exactly one frame is checked out (the current adopted one); the
        // two it replaced were returned to the free list, not leaked.
        assert_eq!(orchestrator.resource_pool.outstanding(), 1);
        assert!(orchestrator.resource_pool.free_count() >= 1);
    }

    #[test]
    fn detects_then_hands_off_to_flow() {
        let mut orchestrator = TrackingOrchestrator::new(Box::new(StubBackend), TrackerConfig::default());
        let mut sink = crate::event::RecordingSink::default();
        let id = orchestrator.add_target(make_target(TargetId::new(0)), &mut sink).unwrap();

        let mut camera = StubCamera { frames: vec![frame(1), frame(2)].into() };
        let mut renderer = NullRenderer;

        let first = orchestrator.pump(&mut camera, &mut renderer, &mut sink, 0).unwrap();
        assert!(first.success);
        assert_eq!(first.mode, TrackingMode::Detection);
        assert_eq!(first.target_id, Some(id));

        let second = orchestrator.pump(&mut camera, &mut renderer, &mut sink, 1).unwrap();
        assert!(second.success);
        assert_eq!(second.mode, TrackingMode::Flow);
    }

    #[test]
    fn busy_flag_drops_reentrant_frame() {
        let mut orchestrator = TrackingOrchestrator::new(Box::new(StubBackend), TrackerConfig::default());
        orchestrator.busy.store(true, Ordering::SeqCst);
        let mut camera = StubCamera { frames: vec![frame(1)].into() };
        let mut renderer = NullRenderer;
        let mut sink = crate::event::RecordingSink::default();
        assert!(orchestrator.pump(&mut camera, &mut renderer, &mut sink, 0).is_none());
    }

    #[test]
    fn kalman_smoothing_flag_allocates_a_filter_per_tracked_target() {
        let config = TrackerConfig {
            kalman_smoothing: true,
            ..TrackerConfig::default()
        };
        let mut orchestrator = TrackingOrchestrator::new(Box::new(StubBackend), config);
        let mut sink = crate::event::RecordingSink::default();
        let id = orchestrator.add_target(make_target(TargetId::new(0)), &mut sink).unwrap();
        let mut camera = StubCamera { frames: vec![frame(1)].into() };
        let mut renderer = NullRenderer;
        orchestrator.pump(&mut camera, &mut renderer, &mut sink, 0);
        assert!(orchestrator.per_target.get(&id.value()).unwrap().kalman.is_some());
    }

    #[test]
    fn kalman_smoothing_off_by_default_leaves_corners_unfiltered() {
        let mut orchestrator = TrackingOrchestrator::new(Box::new(StubBackend), TrackerConfig::default());
        let mut sink = crate::event::RecordingSink::default();
        let id = orchestrator.add_target(make_target(TargetId::new(0)), &mut sink).unwrap();
        let mut camera = StubCamera { frames: vec![frame(1)].into() };
        let mut renderer = NullRenderer;
        orchestrator.pump(&mut camera, &mut renderer, &mut sink, 0);
        assert!(orchestrator.per_target.get(&id.value()).unwrap().kalman.is_none());
    }

    #[test]
    fn removing_active_target_returns_to_searching() {
        let mut orchestrator = TrackingOrchestrator::new(Box::new(StubBackend), TrackerConfig::default());
        let mut sink = crate::event::RecordingSink::default();
        let id = orchestrator.add_target(make_target(TargetId::new(0)), &mut sink).unwrap();
        let mut camera = StubCamera { frames: vec![frame(1)].into() };
        let mut renderer = NullRenderer;
        orchestrator.pump(&mut camera, &mut renderer, &mut sink, 0);
        assert!(orchestrator.remove_target(id));
        assert_eq!(orchestrator.state, PipelineState::Searching);
    }
}
