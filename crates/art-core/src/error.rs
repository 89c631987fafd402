//! Error types for the AR image tracker core.

use thiserror::Error;

/// Main error type for tracker operations.
///
/// Kernel-local failures (a single detection or flow update rejecting a
/// frame) never surface through this type — they come back as typed
/// result variants (`DetectionResult`, `FlowResult`). `ArError` is
/// reserved for catalog mutations, vocabulary rebuilds, and setup/teardown
/// failures that the caller must observe.
#[derive(Error, Debug)]
pub enum ArError {
    #[error("catalog is full: at most {max} targets are supported")]
    CatalogFull { max: usize },

    #[error("insufficient features: found {found}, need at least {min}")]
    InsufficientFeatures { found: usize, min: usize },

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("descriptor width mismatch: {a} vs {b}")]
    DescriptorMismatch { a: usize, b: usize },

    #[error("degenerate homography")]
    DegenerateHomography,

    #[error("geometric rejection: {0}")]
    GeometricRejection(String),

    #[error("tracking lost for target {0:?}")]
    TrackingLost(crate::TargetId),

    #[error("resource pool exhausted: {0}")]
    ResourceExhausted(String),

    #[error("target not found: {0:?}")]
    TargetNotFound(crate::TargetId),

    #[error("vision backend error: {0}")]
    Backend(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ArError>;
