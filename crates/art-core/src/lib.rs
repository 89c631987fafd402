//! Core types, errors, limits, configuration, and resource discipline for
//! the image-tracking pipeline.
//!
//! This crate has no dependency on any particular computer-vision library;
//! it defines the data model and the catalog/pool/config scaffolding that
//! the vision and orchestration crates build on.

pub mod catalog;
pub mod config;
pub mod coordinate_transform;
pub mod error;
pub mod limits;
pub mod resource_pool;
pub mod target;
pub mod types;

pub use catalog::TargetCatalog;
pub use config::TrackerConfig;
pub use coordinate_transform::ViewportMapping;
pub use error::{ArError, Result};
pub use resource_pool::{PooledBuffer, ResourcePool};
pub use target::{PrepareOptions, ReferenceTarget};
pub use types::{
    downscale_dimensions, Descriptor, DescriptorSet, FrameBuffer, Homography, Keypoint,
    QualityMetrics, QuadCorners, TargetId, TrackingMode, TrackingResult,
};
