//! Shared data types for the tracking pipeline.

use serde::{Deserialize, Serialize};

/// Identifier for a processed target, handed out by [`crate::TargetCatalog`]
/// as a monotonic counter. Never reused within a catalog's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TargetId(pub u64);

impl TargetId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "target#{}", self.0)
    }
}

/// A single detected feature point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub response: f32,
    pub size: f32,
    pub angle: f32,
}

/// A single binary descriptor, stored as raw bytes (e.g. 32 bytes for
/// ORB). Width is fixed per [`DescriptorSet`]; individual descriptors
/// never carry their own width.
pub type Descriptor = Vec<u8>;

/// A parallel collection of keypoints and their descriptors extracted
/// from one image, either a reference target or a live frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DescriptorSet {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Vec<Descriptor>,
    /// Byte width of every descriptor in this set; 0 when empty.
    pub width: usize,
}

impl DescriptorSet {
    pub fn new(keypoints: Vec<Keypoint>, descriptors: Vec<Descriptor>) -> crate::Result<Self> {
        if keypoints.len() != descriptors.len() {
            return Err(crate::ArError::InvalidImage(format!(
                "keypoint/descriptor count mismatch: {} vs {}",
                keypoints.len(),
                descriptors.len()
            )));
        }
        let width = descriptors.first().map(|d| d.len()).unwrap_or(0);
        if descriptors.iter().any(|d| d.len() != width) {
            return Err(crate::ArError::InvalidImage(
                "descriptor widths are not uniform".to_string(),
            ));
        }
        Ok(Self {
            keypoints,
            descriptors,
            width,
        })
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    /// Keep only the `cap` highest-response features, in descending order.
    pub fn truncate_by_response(&mut self, cap: usize) {
        if self.keypoints.len() <= cap {
            return;
        }
        let mut order: Vec<usize> = (0..self.keypoints.len()).collect();
        order.sort_unstable_by(|&a, &b| {
            self.keypoints[b]
                .response
                .partial_cmp(&self.keypoints[a].response)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        order.truncate(cap);
        let kept_keypoints = order.iter().map(|&i| self.keypoints[i]).collect();
        let kept_descriptors = order.iter().map(|&i| self.descriptors[i].clone()).collect();
        self.keypoints = kept_keypoints;
        self.descriptors = kept_descriptors;
    }
}

/// A 3x3 planar homography, row-major.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Homography(pub [[f64; 3]; 3]);

impl Homography {
    pub const IDENTITY: Homography = Homography([
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
    ]);

    /// Apply this homography to a point, returning `None` if the point
    /// maps to infinity (degenerate `w`).
    pub fn apply(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let m = &self.0;
        let w = m[2][0] * x + m[2][1] * y + m[2][2];
        if w.abs() < 1e-12 {
            return None;
        }
        let px = (m[0][0] * x + m[0][1] * y + m[0][2]) / w;
        let py = (m[1][0] * x + m[1][1] * y + m[1][2]) / w;
        Some((px, py))
    }
}

/// The four corners of a tracked planar target, in frame pixel coordinates,
/// ordered top-left, top-right, bottom-right, bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuadCorners {
    pub top_left: (f32, f32),
    pub top_right: (f32, f32),
    pub bottom_right: (f32, f32),
    pub bottom_left: (f32, f32),
}

impl QuadCorners {
    pub fn as_array(&self) -> [(f32, f32); 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    pub fn centroid(&self) -> (f32, f32) {
        let pts = self.as_array();
        let sx: f32 = pts.iter().map(|p| p.0).sum();
        let sy: f32 = pts.iter().map(|p| p.1).sum();
        (sx / 4.0, sy / 4.0)
    }

    /// Shoelace-formula signed area; positive for counter-clockwise winding.
    pub fn signed_area(&self) -> f32 {
        let pts = self.as_array();
        let mut sum = 0.0;
        for i in 0..4 {
            let (x1, y1) = pts[i];
            let (x2, y2) = pts[(i + 1) % 4];
            sum += x1 * y2 - x2 * y1;
        }
        sum / 2.0
    }

    pub fn area(&self) -> f32 {
        self.signed_area().abs()
    }

    pub fn perimeter(&self) -> f32 {
        let pts = self.as_array();
        (0..4)
            .map(|i| {
                let (x1, y1) = pts[i];
                let (x2, y2) = pts[(i + 1) % 4];
                ((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt()
            })
            .sum()
    }
}

/// A decoded, grayscale-ready image buffer owned by the caller's camera
/// source. Dimensions are pre-downscale; the vision backend is responsible
/// for clamping to `limits::MAX_DIMENSION`.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Monotonically increasing sequence number, used to detect
    /// out-of-order delivery and to key detector caches.
    pub sequence: u64,
}

impl FrameBuffer {
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> crate::Result<Self> {
        if width == 0 || height == 0 {
            return Err(crate::ArError::InvalidImage(
                "frame has zero width or height".to_string(),
            ));
        }
        let expected = (width as usize) * (height as usize);
        if data.len() != expected {
            return Err(crate::ArError::InvalidImage(format!(
                "frame buffer length {} does not match {}x{}",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            sequence,
        })
    }

    pub fn diagonal(&self) -> f32 {
        ((self.width as f32).powi(2) + (self.height as f32).powi(2)).sqrt()
    }
}

/// Which pipeline path produced a [`TrackingResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingMode {
    Detection,
    Flow,
    None,
}

/// The composite quality score and its inputs, fed into a target's
/// rolling quality history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub inlier_ratio: f32,
    pub mean_fb_error: f32,
    pub geometric_score: f32,
    /// `0.4*inlier_ratio + 0.3*(1 - normalised fb error) + 0.3*geometric_score`.
    pub composite: f32,
}

impl QualityMetrics {
    pub const ZERO: QualityMetrics = QualityMetrics {
        inlier_ratio: 0.0,
        mean_fb_error: 0.0,
        geometric_score: 0.0,
        composite: 0.0,
    };

    pub fn composite_score(inlier_ratio: f32, mean_fb_error: f32, fb_threshold: f32, geometric_score: f32) -> f32 {
        let normalised_fb = if fb_threshold > 0.0 {
            (mean_fb_error / fb_threshold).min(1.0)
        } else {
            0.0
        };
        0.4 * inlier_ratio + 0.3 * (1.0 - normalised_fb) + 0.3 * geometric_score
    }
}

/// Outward-facing per-frame tracking outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingResult {
    pub success: bool,
    pub target_id: Option<TargetId>,
    pub corners: Option<QuadCorners>,
    pub mode: TrackingMode,
    pub quality: QualityMetrics,
    pub should_redetect: bool,
}

impl TrackingResult {
    pub fn failure(mode: TrackingMode) -> Self {
        Self {
            success: false,
            target_id: None,
            corners: None,
            mode,
            quality: QualityMetrics::ZERO,
            should_redetect: false,
        }
    }

    /// Result-schema invariant: success implies a target id and four
    /// finite corners.
    pub fn is_schema_valid(&self) -> bool {
        if !self.success {
            return true;
        }
        self.target_id.is_some()
            && self
                .corners
                .map(|c| c.as_array().iter().all(|(x, y)| x.is_finite() && y.is_finite()))
                .unwrap_or(false)
    }
}

/// Compute the downscaled dimensions for a frame so that
/// `max(cols, rows) <= max_dimension`, preserving aspect ratio. Returns the
/// input unchanged if it already fits.
pub fn downscale_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_dimension || longest == 0 {
        return (width, height);
    }
    let scale = max_dimension as f64 / longest as f64;
    let new_w = ((width as f64 * scale).round() as u32).max(1);
    let new_h = ((height as f64 * scale).round() as u32).max(1);
    (new_w, new_h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_id_displays_stably() {
        assert_eq!(TargetId::new(7).to_string(), "target#7");
    }

    #[test]
    fn descriptor_set_rejects_mismatched_counts() {
        let kp = vec![Keypoint {
            x: 0.0,
            y: 0.0,
            response: 1.0,
            size: 1.0,
            angle: 0.0,
        }];
        let err = DescriptorSet::new(kp, vec![]).unwrap_err();
        assert!(matches!(err, crate::ArError::InvalidImage(_)));
    }

    #[test]
    fn descriptor_set_rejects_uneven_widths() {
        let kp = vec![
            Keypoint { x: 0.0, y: 0.0, response: 1.0, size: 1.0, angle: 0.0 },
            Keypoint { x: 1.0, y: 1.0, response: 1.0, size: 1.0, angle: 0.0 },
        ];
        let descs = vec![vec![0u8; 32], vec![0u8; 16]];
        let err = DescriptorSet::new(kp, descs).unwrap_err();
        assert!(matches!(err, crate::ArError::InvalidImage(_)));
    }

    #[test]
    fn truncate_by_response_keeps_strongest() {
        let kp = vec![
            Keypoint { x: 0.0, y: 0.0, response: 0.1, size: 1.0, angle: 0.0 },
            Keypoint { x: 1.0, y: 1.0, response: 0.9, size: 1.0, angle: 0.0 },
            Keypoint { x: 2.0, y: 2.0, response: 0.5, size: 1.0, angle: 0.0 },
        ];
        let descs = vec![vec![1u8], vec![2u8], vec![3u8]];
        let mut set = DescriptorSet::new(kp, descs).unwrap();
        set.truncate_by_response(2);
        assert_eq!(set.len(), 2);
        assert_eq!(set.keypoints[0].response, 0.9);
        assert_eq!(set.descriptors[0], vec![2u8]);
    }

    #[test]
    fn homography_identity_is_noop() {
        let h = Homography::IDENTITY;
        assert_eq!(h.apply(3.0, 4.0), Some((3.0, 4.0)));
    }

    #[test]
    fn quad_area_of_unit_square() {
        let q = QuadCorners {
            top_left: (0.0, 0.0),
            top_right: (1.0, 0.0),
            bottom_right: (1.0, 1.0),
            bottom_left: (0.0, 1.0),
        };
        assert!((q.area() - 1.0).abs() < 1e-6);
        assert!((q.perimeter() - 4.0).abs() < 1e-6);
    }

    #[test]
    fn frame_buffer_rejects_length_mismatch() {
        let err = FrameBuffer::new(vec![0u8; 3], 2, 2, 0).unwrap_err();
        assert!(matches!(err, crate::ArError::InvalidImage(_)));
    }

    #[test]
    fn downscale_preserves_aspect_and_caps_longest_side() {
        let (w, h) = downscale_dimensions(1280, 960, 640);
        assert_eq!(w, 640);
        assert_eq!(h, 480);
    }

    #[test]
    fn downscale_is_noop_when_already_within_bounds() {
        assert_eq!(downscale_dimensions(640, 640, 640), (640, 640));
        assert_eq!(downscale_dimensions(320, 200, 640), (320, 200));
    }

    #[test]
    fn tracking_result_schema_validity() {
        let mut result = TrackingResult::failure(TrackingMode::None);
        assert!(result.is_schema_valid());
        result.success = true;
        assert!(!result.is_schema_valid());
        result.target_id = Some(TargetId::new(1));
        result.corners = Some(QuadCorners {
            top_left: (0.0, 0.0),
            top_right: (1.0, 0.0),
            bottom_right: (1.0, 1.0),
            bottom_left: (0.0, 1.0),
        });
        assert!(result.is_schema_valid());
    }
}
