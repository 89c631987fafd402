//! Pyramidal Lucas-Kanade propagation of a known quadrilateral (C5, spec
//! §4.5).

use std::collections::VecDeque;

use art_core::types::QuadCorners;
use art_core::TrackerConfig;

use crate::backend::{BackendError, GrayImage, PointPair, VisionBackend};
use crate::geometry::{self, GeometryThresholds, QuadSummary};

const WIN_SIZE: u32 = 30;
const MAX_PYRAMID_LEVEL: u32 = 5;
const MIN_SEED_POINTS: usize = 8;

/// Per-target bookkeeping the flow tracker needs across calls: rolling
/// quality history, consecutive-poor-frame counter, the last accepted
/// quadrilateral's scale/rotation/aspect-ratio, and frames since the last
/// full detection. Owned by the orchestrator's per-target state
/// (`art_tracker::orchestrator::PerTargetState`), not by this crate.
#[derive(Debug, Clone)]
pub struct FlowState {
    quality_history: VecDeque<f32>,
    poor_frame_count: u32,
    last_summary: Option<QuadSummary>,
    frames_since_detection: u32,
}

impl Default for FlowState {
    fn default() -> Self {
        Self {
            quality_history: VecDeque::with_capacity(art_core::limits::QUALITY_HISTORY_LEN),
            poor_frame_count: 0,
            last_summary: None,
            frames_since_detection: 0,
        }
    }
}

impl FlowState {
    pub fn reset_after_detection(&mut self, corners: &QuadCorners) {
        self.last_summary = Some(QuadSummary::from_quad(corners));
        self.poor_frame_count = 0;
        self.frames_since_detection = 0;
    }

    pub fn frames_since_detection(&self) -> u32 {
        self.frames_since_detection
    }

    pub fn rolling_quality_mean(&self) -> f32 {
        if self.quality_history.is_empty() {
            return 0.0;
        }
        self.quality_history.iter().sum::<f32>() / self.quality_history.len() as f32
    }

    fn push_quality(&mut self, q: f32) {
        if self.quality_history.len() >= art_core::limits::QUALITY_HISTORY_LEN {
            self.quality_history.pop_front();
        }
        self.quality_history.push_back(q);
    }
}

/// Outcome of one flow-propagation attempt.
#[derive(Debug, Clone)]
pub enum FlowResult {
    Success {
        corners: QuadCorners,
        quality: art_core::types::QualityMetrics,
        should_redetect: bool,
    },
    Failure {
        reason: String,
        should_redetect: bool,
    },
}

impl FlowResult {
    pub fn should_redetect(&self) -> bool {
        match self {
            FlowResult::Success { should_redetect, .. } => *should_redetect,
            FlowResult::Failure { should_redetect, .. } => *should_redetect,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FlowResult::Success { .. })
    }
}

fn fail(state: &mut FlowState, reason: impl Into<String>) -> FlowResult {
    let reason = reason.into();
    state.poor_frame_count += 1;
    let should_redetect = state.poor_frame_count >= art_core::limits::QUALITY_DEGRADE_FRAMES;
    tracing::debug!(%reason, poor_frames = state.poor_frame_count, "flow rejected");
    FlowResult::Failure {
        reason,
        should_redetect,
    }
}

/// Build a row-major mask, the size of `width`x`height`, non-zero inside
/// `quad`'s convex hull (point-in-polygon against the quad edges).
fn polygon_mask(quad: &QuadCorners, width: u32, height: u32) -> Vec<u8> {
    let pts = quad.as_array();
    let mut mask = vec![0u8; (width as usize) * (height as usize)];
    for y in 0..height {
        for x in 0..width {
            if point_in_polygon((x as f32 + 0.5, y as f32 + 0.5), &pts) {
                mask[(y as usize) * (width as usize) + x as usize] = 255;
            }
        }
    }
    mask
}

fn point_in_polygon(p: (f32, f32), pts: &[(f32, f32); 4]) -> bool {
    let mut inside = false;
    let mut j = 3;
    for i in 0..4 {
        let (xi, yi) = pts[i];
        let (xj, yj) = pts[j];
        if ((yi > p.1) != (yj > p.1)) && (p.0 < (xj - xi) * (p.1 - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Spatial-distribution filter (spec §4.5 step 3): partition the quad's
/// bounding box into `grid x grid` cells, keep at most `ceil(cap/grid^2)`
/// per occupied cell, fill remaining budget round-robin, preferring
/// points inside the quadrilateral.
fn spatial_filter(points: &[(f32, f32)], quad: &QuadCorners, grid: usize, cap: usize) -> Vec<(f32, f32)> {
    if points.len() <= cap {
        return points.to_vec();
    }
    let pts = quad.as_array();
    let min_x = pts.iter().map(|p| p.0).fold(f32::INFINITY, f32::min);
    let max_x = pts.iter().map(|p| p.0).fold(f32::NEG_INFINITY, f32::max);
    let min_y = pts.iter().map(|p| p.1).fold(f32::INFINITY, f32::min);
    let max_y = pts.iter().map(|p| p.1).fold(f32::NEG_INFINITY, f32::max);
    let cell_w = ((max_x - min_x) / grid as f32).max(1e-3);
    let cell_h = ((max_y - min_y) / grid as f32).max(1e-3);

    let mut cells: Vec<Vec<(f32, f32)>> = vec![Vec::new(); grid * grid];
    for &p in points {
        let cx = (((p.0 - min_x) / cell_w) as usize).min(grid - 1);
        let cy = (((p.1 - min_y) / cell_h) as usize).min(grid - 1);
        cells[cy * grid + cx].push(p);
    }
    // Prefer points actually inside the quad within each cell.
    for cell in &mut cells {
        cell.sort_by_key(|&p| !point_in_polygon(p, &pts));
    }

    let occupied = cells.iter().filter(|c| !c.is_empty()).count().max(1);
    let per_cell = (cap as f32 / occupied as f32).ceil() as usize;

    let mut selected = Vec::with_capacity(cap);
    for cell in &cells {
        for &p in cell.iter().take(per_cell) {
            if selected.len() >= cap {
                break;
            }
            selected.push(p);
        }
    }
    // Round-robin fill from whatever remains if under budget.
    let mut remainders: Vec<(f32, f32)> = cells
        .iter()
        .flat_map(|c| c.iter().skip(per_cell).copied())
        .collect();
    let mut idx = 0;
    while selected.len() < cap && idx < remainders.len() {
        selected.push(remainders[idx]);
        idx += 1;
    }
    remainders.clear();
    selected
}

/// Run the §4.5 pipeline for one frame-to-frame step.
#[tracing::instrument(skip_all)]
pub fn track(
    backend: &dyn VisionBackend,
    state: &mut FlowState,
    prev_frame: GrayImage<'_>,
    current_frame: GrayImage<'_>,
    prev_corners: &QuadCorners,
    config: &TrackerConfig,
) -> FlowResult {
    state.frames_since_detection += 1;

    let mask = polygon_mask(prev_corners, prev_frame.width, prev_frame.height);
    let raw_seeds = match backend.good_features_to_track(
        prev_frame,
        &mask,
        config.max_flow_features,
        0.01,
        10.0,
    ) {
        Ok(s) => s,
        Err(e) => return fail(state, format!("seed extraction failed: {e}")),
    };
    if raw_seeds.len() < MIN_SEED_POINTS {
        return fail(state, format!("{} seed points, need {MIN_SEED_POINTS}", raw_seeds.len()));
    }

    let seeds = spatial_filter(&raw_seeds, prev_corners, config.spatial_grid, config.max_flow_features);

    let forward = match backend.calc_optical_flow(prev_frame, current_frame, &seeds, WIN_SIZE, MAX_PYRAMID_LEVEL) {
        Ok(f) => f,
        Err(e) => return fail(state, format!("forward flow failed: {e}")),
    };
    let forward_points: Vec<(f32, f32)> = forward.iter().map(|f| f.point).collect();
    let backward = match backend.calc_optical_flow(current_frame, prev_frame, &forward_points, WIN_SIZE, MAX_PYRAMID_LEVEL) {
        Ok(b) => b,
        Err(e) => return fail(state, format!("backward flow failed: {e}")),
    };

    let quality_mean = state.rolling_quality_mean();
    let fb_threshold = if quality_mean > art_core::limits::FB_ADAPTIVE_QUALITY_MEAN {
        config.fb_threshold_max
    } else {
        config.fb_threshold
    };
    let max_flow_mag = current_frame.diagonal_approx() * art_core::limits::MAX_FLOW_MAG_DIAGONAL_FRACTION;

    let mut prev_pts = Vec::new();
    let mut next_pts = Vec::new();
    let mut fb_errors = Vec::new();
    for i in 0..seeds.len() {
        let fwd = &forward[i];
        let bwd = &backward[i];
        if !fwd.found || !bwd.found {
            continue;
        }
        let fb_error = ((seeds[i].0 - bwd.point.0).powi(2) + (seeds[i].1 - bwd.point.1).powi(2)).sqrt();
        let flow_mag = ((fwd.point.0 - seeds[i].0).powi(2) + (fwd.point.1 - seeds[i].1).powi(2)).sqrt();
        if fb_error > fb_threshold || flow_mag > max_flow_mag {
            continue;
        }
        prev_pts.push(seeds[i]);
        next_pts.push(fwd.point);
        fb_errors.push(fb_error);
    }

    let min_inliers = if state.poor_frame_count > 0 {
        config.min_inliers_strict
    } else {
        config.min_inliers
    };
    if prev_pts.len() < min_inliers {
        return fail(state, format!("{} FB-consistent survivors, need {min_inliers}", prev_pts.len()));
    }

    let correspondences: Vec<PointPair> = prev_pts
        .iter()
        .zip(next_pts.iter())
        .map(|(&p, &n)| PointPair {
            from: (p.0 as f64, p.1 as f64),
            to: (n.0 as f64, n.1 as f64),
        })
        .collect();

    let fit = match backend.find_homography(&correspondences, config.ransac_reproj) {
        Ok(Some(fit)) => fit,
        Ok(None) => return fail(state, "degenerate flow homography"),
        Err(e) => return fail(state, format!("flow homography estimation failed: {e}")),
    };
    let inlier_count = fit.inlier_mask.iter().filter(|&&b| b).count();
    if inlier_count < min_inliers {
        return fail(state, format!("{inlier_count} RANSAC inliers, need {min_inliers}"));
    }

    let Some(new_corners) = crate::backend::transform_corners(
        &fit.homography,
        (prev_corners.top_right.0 - prev_corners.top_left.0) as f64,
        (prev_corners.bottom_left.1 - prev_corners.top_left.1) as f64,
    ) else {
        return fail(state, "propagated corners are not finite");
    };

    let validation = geometry::validate(&new_corners, state.last_summary, &GeometryThresholds::default());
    let mean_fb_error = fb_errors.iter().sum::<f32>() / fb_errors.len().max(1) as f32;
    let inlier_ratio = inlier_count as f32 / seeds.len().max(1) as f32;
    let composite = art_core::types::QualityMetrics::composite_score(
        inlier_ratio,
        mean_fb_error,
        fb_threshold,
        validation.score,
    );

    if !validation.accepted {
        tracing::debug!(reasons = ?validation.reasons, "flow rejected: geometric validation");
        return fail(state, format!("geometric validation failed: {:?}", validation.reasons));
    }

    state.push_quality(composite);
    state.poor_frame_count = 0;
    state.last_summary = Some(QuadSummary::from_quad(&new_corners));

    let should_redetect = state.frames_since_detection > art_core::limits::FEATURE_REFRESH_INTERVAL
        && composite < art_core::limits::FEATURE_REFRESH_QUALITY_FLOOR;

    FlowResult::Success {
        corners: new_corners,
        quality: art_core::types::QualityMetrics {
            inlier_ratio,
            mean_fb_error,
            geometric_score: validation.score,
            composite,
        },
        should_redetect,
    }
}

trait DiagonalApprox {
    fn diagonal_approx(&self) -> f32;
}

impl DiagonalApprox for GrayImage<'_> {
    fn diagonal_approx(&self) -> f32 {
        ((self.width as f32).powi(2) + (self.height as f32).powi(2)).sqrt()
    }
}
