//! Per-frame scheduling, the event/observer surface, and the external
//! collaborator contracts the core depends on but does not implement.

pub mod collaborators;
pub mod event;
pub mod orchestrator;

pub use collaborators::{CameraSource, CatalogLoader, CatalogStorage, Renderer};
pub use event::{ErrorCode, Event, EventSink, RecordingSink};
pub use orchestrator::TrackingOrchestrator;
