//! Geometric validation for planar rectangle candidates (spec §4.5.1).

use art_core::types::QuadCorners;

/// All thresholds a geometric validation pass needs. Defaults mirror
/// [`art_core::limits`]; callers typically build this from a
/// [`art_core::TrackerConfig`].
#[derive(Debug, Clone, Copy)]
pub struct GeometryThresholds {
    pub min_area: f32,
    pub min_compactness: f32,
    pub parallel_tol_deg: f32,
    pub max_opposite_edge_ratio: f32,
    pub min_corner_deg: f32,
    pub max_corner_deg: f32,
    pub max_aspect_ratio: f32,
    pub max_scale_change: f32,
    pub max_rotation_change_deg: f32,
    pub max_aspect_change: f32,
}

impl Default for GeometryThresholds {
    fn default() -> Self {
        use art_core::limits;
        Self {
            min_area: limits::MIN_AREA,
            min_compactness: limits::MIN_COMPACTNESS,
            parallel_tol_deg: limits::PARALLEL_TOL_DEG,
            max_opposite_edge_ratio: limits::MAX_OPPOSITE_EDGE_RATIO,
            min_corner_deg: limits::MIN_CORNER_DEG,
            max_corner_deg: limits::MAX_CORNER_DEG,
            max_aspect_ratio: limits::MAX_ASPECT_RATIO,
            max_scale_change: limits::MAX_SCALE_CHANGE,
            max_rotation_change_deg: limits::MAX_ROTATION_CHANGE_DEG,
            max_aspect_change: limits::MAX_ASPECT_CHANGE,
        }
    }
}

/// The scale/rotation/aspect-ratio summary of a previously accepted
/// quadrilateral, used to bound how much the next one may move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadSummary {
    pub scale: f32,
    pub rotation_deg: f32,
    pub aspect_ratio: f32,
}

impl QuadSummary {
    pub fn from_quad(quad: &QuadCorners) -> Self {
        let pts = quad.as_array();
        let edge = |a: (f32, f32), b: (f32, f32)| ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt();
        let top = edge(pts[0], pts[1]);
        let right = edge(pts[1], pts[2]);
        let scale = (top * right).sqrt();
        let rotation_deg = (pts[1].1 - pts[0].1).atan2(pts[1].0 - pts[0].0).to_degrees();
        let aspect_ratio = if right > 1e-6 { top / right } else { f32::INFINITY };
        Self {
            scale,
            rotation_deg,
            aspect_ratio,
        }
    }
}

/// Why a candidate quadrilateral failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    NotConvex,
    AreaTooSmall,
    TooSpiky,
    EdgesNotParallel,
    OppositeEdgeRatioTooHigh,
    CornerAngleOutOfRange,
    AspectRatioTooHigh,
    ScaleChangedTooMuch,
    RotationChangedTooMuch,
    AspectChangedTooMuch,
}

/// Outcome of validating one candidate against §4.5.1's rules, plus the
/// geometric component of the composite quality score (spec §4.5.1
/// closing paragraph).
#[derive(Debug, Clone)]
pub struct GeometryValidation {
    pub accepted: bool,
    pub reasons: Vec<RejectionReason>,
    pub score: f32,
}

fn cross(o: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}

fn is_convex(pts: &[(f32, f32); 4]) -> bool {
    let mut sign = 0i32;
    for i in 0..4 {
        let o = pts[i];
        let a = pts[(i + 1) % 4];
        let b = pts[(i + 2) % 4];
        let c = cross(o, a, b);
        if c.abs() < 1e-6 {
            continue;
        }
        let s = if c > 0.0 { 1 } else { -1 };
        if sign == 0 {
            sign = s;
        } else if sign != s {
            return false;
        }
    }
    true
}

fn edge_length(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt()
}

fn edge_angle_deg(a: (f32, f32), b: (f32, f32)) -> f32 {
    (b.1 - a.1).atan2(b.0 - a.0).to_degrees()
}

fn angle_diff_deg(a: f32, b: f32) -> f32 {
    let mut d = (a - b).abs() % 360.0;
    if d > 180.0 {
        d = 360.0 - d;
    }
    if d > 90.0 {
        d = 180.0 - d;
    }
    d
}

fn corner_angle_deg(prev: (f32, f32), corner: (f32, f32), next: (f32, f32)) -> f32 {
    let v1 = (prev.0 - corner.0, prev.1 - corner.1);
    let v2 = (next.0 - corner.0, next.1 - corner.1);
    let dot = v1.0 * v2.0 + v1.1 * v2.1;
    let mag1 = (v1.0.powi(2) + v1.1.powi(2)).sqrt();
    let mag2 = (v2.0.powi(2) + v2.1.powi(2)).sqrt();
    if mag1 < 1e-6 || mag2 < 1e-6 {
        return 0.0;
    }
    (dot / (mag1 * mag2)).clamp(-1.0, 1.0).acos().to_degrees()
}

/// Run every check in spec §4.5.1 against `quad`, optionally bounding
/// drift against `previous`.
pub fn validate(
    quad: &QuadCorners,
    previous: Option<QuadSummary>,
    thresholds: &GeometryThresholds,
) -> GeometryValidation {
    let pts = quad.as_array();
    let mut reasons = Vec::new();

    if !is_convex(&pts) {
        reasons.push(RejectionReason::NotConvex);
    }

    let area = quad.area();
    if area < thresholds.min_area {
        reasons.push(RejectionReason::AreaTooSmall);
    }

    let perimeter = quad.perimeter();
    let compactness = if perimeter > 1e-6 {
        4.0 * std::f32::consts::PI * area / (perimeter * perimeter)
    } else {
        0.0
    };
    if compactness < thresholds.min_compactness {
        reasons.push(RejectionReason::TooSpiky);
    }

    let edges: Vec<f32> = (0..4).map(|i| edge_length(pts[i], pts[(i + 1) % 4])).collect();
    let angles: Vec<f32> = (0..4).map(|i| edge_angle_deg(pts[i], pts[(i + 1) % 4])).collect();

    let parallel_02 = angle_diff_deg(angles[0], angles[2]);
    let parallel_13 = angle_diff_deg(angles[1], angles[3]);
    if parallel_02 > thresholds.parallel_tol_deg || parallel_13 > thresholds.parallel_tol_deg {
        reasons.push(RejectionReason::EdgesNotParallel);
    }

    let ratio_02 = edges[0].max(edges[2]) / edges[0].min(edges[2]).max(1e-6);
    let ratio_13 = edges[1].max(edges[3]) / edges[1].min(edges[3]).max(1e-6);
    if ratio_02 > thresholds.max_opposite_edge_ratio || ratio_13 > thresholds.max_opposite_edge_ratio {
        reasons.push(RejectionReason::OppositeEdgeRatioTooHigh);
    }

    let corner_angles: Vec<f32> = (0..4)
        .map(|i| corner_angle_deg(pts[(i + 3) % 4], pts[i], pts[(i + 1) % 4]))
        .collect();
    if corner_angles
        .iter()
        .any(|&a| a < thresholds.min_corner_deg || a > thresholds.max_corner_deg)
    {
        reasons.push(RejectionReason::CornerAngleOutOfRange);
    }

    let long_side = edges.iter().cloned().fold(0.0, f32::max);
    let short_side = edges.iter().cloned().fold(f32::INFINITY, f32::min).max(1e-6);
    let aspect_ratio = long_side / short_side;
    if aspect_ratio > thresholds.max_aspect_ratio {
        reasons.push(RejectionReason::AspectRatioTooHigh);
    }

    if let Some(prev) = previous {
        let current = QuadSummary::from_quad(quad);
        if prev.scale > 1e-6 {
            let scale_ratio = (current.scale / prev.scale).max(prev.scale / current.scale.max(1e-6));
            if scale_ratio > thresholds.max_scale_change {
                reasons.push(RejectionReason::ScaleChangedTooMuch);
            }
        }
        if angle_diff_deg(current.rotation_deg, prev.rotation_deg) > thresholds.max_rotation_change_deg {
            reasons.push(RejectionReason::RotationChangedTooMuch);
        }
        if (current.aspect_ratio - prev.aspect_ratio).abs() > thresholds.max_aspect_change {
            reasons.push(RejectionReason::AspectChangedTooMuch);
        }
    }

    let convex_score = if is_convex(&pts) { 1.0 } else { 0.0 };
    let compactness_score = compactness.clamp(0.0, 1.0);
    let corner_score = {
        let mid = (thresholds.min_corner_deg + thresholds.max_corner_deg) / 2.0;
        let half_range = (thresholds.max_corner_deg - thresholds.min_corner_deg) / 2.0;
        let deviations: f32 = corner_angles
            .iter()
            .map(|&a| ((a - mid).abs() / half_range.max(1.0)).min(1.0))
            .sum();
        1.0 - (deviations / 4.0)
    };
    let score = ((convex_score + compactness_score + corner_score) / 3.0).clamp(0.0, 1.0);

    GeometryValidation {
        accepted: reasons.is_empty(),
        reasons,
        score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> QuadCorners {
        QuadCorners {
            top_left: (0.0, 0.0),
            top_right: (20.0, 0.0),
            bottom_right: (20.0, 20.0),
            bottom_left: (0.0, 20.0),
        }
    }

    fn non_convex_quad() -> QuadCorners {
        QuadCorners {
            top_left: (0.0, 0.0),
            top_right: (20.0, 0.0),
            bottom_right: (5.0, 5.0),
            bottom_left: (0.0, 20.0),
        }
    }

    #[test]
    fn accepts_a_clean_square() {
        let result = validate(&unit_square(), None, &GeometryThresholds::default());
        assert!(result.accepted, "{:?}", result.reasons);
        assert!(result.score > 0.5);
    }

    #[test]
    fn rejects_nonconvex_quadrilateral() {
        let result = validate(&non_convex_quad(), None, &GeometryThresholds::default());
        assert!(!result.accepted);
        assert!(result.reasons.contains(&RejectionReason::NotConvex));
    }

    #[test]
    fn rejects_tiny_area() {
        let tiny = QuadCorners {
            top_left: (0.0, 0.0),
            top_right: (1.0, 0.0),
            bottom_right: (1.0, 1.0),
            bottom_left: (0.0, 1.0),
        };
        let result = validate(&tiny, None, &GeometryThresholds::default());
        assert!(result.reasons.contains(&RejectionReason::AreaTooSmall));
    }

    #[test]
    fn rejects_scale_jump_against_previous() {
        let prev = QuadSummary::from_quad(&unit_square());
        let huge = QuadCorners {
            top_left: (0.0, 0.0),
            top_right: (200.0, 0.0),
            bottom_right: (200.0, 200.0),
            bottom_left: (0.0, 200.0),
        };
        let result = validate(&huge, Some(prev), &GeometryThresholds::default());
        assert!(result.reasons.contains(&RejectionReason::ScaleChangedTooMuch));
    }

    #[test]
    fn rejects_paper_thin_aspect_ratio() {
        let thin = QuadCorners {
            top_left: (0.0, 0.0),
            top_right: (200.0, 0.0),
            bottom_right: (200.0, 5.0),
            bottom_left: (0.0, 5.0),
        };
        let result = validate(&thin, None, &GeometryThresholds::default());
        assert!(result.reasons.contains(&RejectionReason::AspectRatioTooHigh));
    }
}
