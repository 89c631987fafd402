//! External collaborator contracts (spec §6). The orchestrator depends on
//! these traits but never implements them — a host application supplies
//! concrete adapters (camera acquisition, UI rendering, archive loading,
//! persistent caching all live outside this workspace).

use art_core::types::FrameBuffer;
use art_core::ViewportMapping;

/// Supplies frames to the orchestrator. `capture` returning `None` means
/// no frame is currently available; the orchestrator skips that tick
/// rather than blocking.
pub trait CameraSource {
    fn capture(&mut self) -> Option<FrameBuffer>;

    /// The viewport mapping used to translate tracking results into
    /// display coordinates for the renderer collaborator.
    fn viewport_mapping(&self) -> ViewportMapping;
}

/// Consumes tracking results in video coordinates; responsible for all
/// UI/overlay drawing. The orchestrator calls this once per accepted or
/// rejected frame.
pub trait Renderer {
    fn render(&mut self, result: &art_core::types::TrackingResult, mapping: &ViewportMapping);
}

/// Produces images and display names for the catalog. May be backed by a
/// local file, an upload, or a decrypted archive — not this workspace's
/// concern.
pub trait CatalogLoader {
    fn load_next(&mut self) -> Option<(Vec<u8>, u32, u32, String)>;
}

/// Persists archives, extracted contents, and the serialised vocabulary
/// index. The orchestrator only calls `load_catalog`/`save_catalog` at
/// session boundaries (spec §6); TTL/eviction policy is the
/// implementation's concern.
pub trait CatalogStorage {
    fn load_catalog(&mut self) -> std::io::Result<Option<Vec<u8>>>;
    fn save_catalog(&mut self, data: &[u8]) -> std::io::Result<()>;
}
