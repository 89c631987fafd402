//! A single prepared reference image (C1).

use serde::{Deserialize, Serialize};

use crate::types::{DescriptorSet, TargetId};
use crate::ArError;

/// Options controlling reference-image feature extraction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PrepareOptions {
    pub max_features: usize,
    /// Binary-descriptor detector threshold; loaders may raise this for
    /// high-texture photographs.
    pub detector_threshold: u8,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            max_features: crate::limits::MAX_REF_FEATURES,
            detector_threshold: 55,
        }
    }
}

/// Minimum surviving keypoints for a reference image to be usable.
pub const MIN_REFERENCE_FEATURES: usize = 10;

/// One prepared reference image: keypoints, descriptors, metadata, thumbnail.
///
/// Once [`ReferenceTarget::mark_processed`] has run, `descriptors` and
/// `cols`/`rows` never change again.
#[derive(Debug, Clone)]
pub struct ReferenceTarget {
    id: TargetId,
    name: String,
    cols: u32,
    rows: u32,
    descriptors: DescriptorSet,
    thumbnail: Vec<u8>,
    processed: bool,
}

impl ReferenceTarget {
    /// Construct an unprocessed target; call [`Self::mark_processed`] once
    /// the caller's vision backend has produced a descriptor set.
    pub fn new_unprocessed(id: TargetId, name: String, cols: u32, rows: u32) -> Self {
        Self {
            id,
            name,
            cols,
            rows,
            descriptors: DescriptorSet::default(),
            thumbnail: Vec::new(),
            processed: false,
        }
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.cols, self.rows)
    }

    pub fn is_processed(&self) -> bool {
        self.processed
    }

    pub fn thumbnail(&self) -> &[u8] {
        &self.thumbnail
    }

    /// Immutable borrow of the descriptor set, image dimensions, and id.
    /// Fails until the target has been processed.
    pub fn get_data(&self) -> crate::Result<(&DescriptorSet, (u32, u32), TargetId)> {
        if !self.processed {
            return Err(ArError::InvalidImage(format!(
                "target {} has not been processed",
                self.id
            )));
        }
        Ok((&self.descriptors, (self.cols, self.rows), self.id))
    }

    /// Accept a backend-produced descriptor set: retains the top
    /// `opts.max_features` by response (re-truncation is a no-op if the
    /// backend already thinned), requires at least
    /// [`MIN_REFERENCE_FEATURES`] survivors, and latches `processed`.
    ///
    /// The caller is responsible for having already recomputed descriptors
    /// on any retained-after-truncation keypoint set; this function does
    /// not re-extract, it only enforces the post-condition.
    #[tracing::instrument(skip(self, descriptors, thumbnail), fields(target_id = %self.id))]
    pub fn mark_processed(
        &mut self,
        mut descriptors: DescriptorSet,
        thumbnail: Vec<u8>,
        opts: &PrepareOptions,
    ) -> crate::Result<()> {
        if self.processed {
            return Err(ArError::InvalidImage(format!(
                "target {} is already processed",
                self.id
            )));
        }
        descriptors.truncate_by_response(opts.max_features);
        if descriptors.len() < MIN_REFERENCE_FEATURES {
            tracing::debug!(
                found = descriptors.len(),
                min = MIN_REFERENCE_FEATURES,
                "reference target rejected: insufficient features"
            );
            return Err(ArError::InsufficientFeatures {
                found: descriptors.len(),
                min: MIN_REFERENCE_FEATURES,
            });
        }
        self.descriptors = descriptors;
        self.thumbnail = thumbnail;
        self.processed = true;
        tracing::debug!(features = self.descriptors.len(), "reference target processed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Keypoint;

    fn descriptor_set(n: usize) -> DescriptorSet {
        let kps: Vec<Keypoint> = (0..n)
            .map(|i| Keypoint {
                x: i as f32,
                y: i as f32,
                response: i as f32,
                size: 1.0,
                angle: 0.0,
            })
            .collect();
        let descs = (0..n).map(|_| vec![0u8; 32]).collect();
        DescriptorSet::new(kps, descs).unwrap()
    }

    #[test]
    fn mark_processed_latches_and_rejects_thin_reference() {
        let mut target = ReferenceTarget::new_unprocessed(TargetId::new(1), "t".into(), 100, 100);
        let opts = PrepareOptions::default();
        let err = target
            .mark_processed(descriptor_set(5), vec![], &opts)
            .unwrap_err();
        assert!(matches!(err, ArError::InsufficientFeatures { found: 5, min: 10 }));
        assert!(!target.is_processed());
    }

    #[test]
    fn mark_processed_accepts_and_latches() {
        let mut target = ReferenceTarget::new_unprocessed(TargetId::new(1), "t".into(), 100, 100);
        let opts = PrepareOptions::default();
        target.mark_processed(descriptor_set(20), vec![9u8], &opts).unwrap();
        assert!(target.is_processed());
        let (set, dims, id) = target.get_data().unwrap();
        assert_eq!(set.len(), 20);
        assert_eq!(dims, (100, 100));
        assert_eq!(id, TargetId::new(1));

        let err = target
            .mark_processed(descriptor_set(20), vec![], &opts)
            .unwrap_err();
        assert!(matches!(err, ArError::InvalidImage(_)));
    }

    #[test]
    fn get_data_fails_before_processing() {
        let target = ReferenceTarget::new_unprocessed(TargetId::new(2), "t".into(), 10, 10);
        assert!(target.get_data().is_err());
    }

    #[test]
    fn truncates_to_max_features() {
        let mut target = ReferenceTarget::new_unprocessed(TargetId::new(3), "t".into(), 10, 10);
        let opts = PrepareOptions {
            max_features: 12,
            detector_threshold: 50,
        };
        target.mark_processed(descriptor_set(50), vec![], &opts).unwrap();
        assert_eq!(target.get_data().unwrap().0.len(), 12);
    }
}
