//! [`Renderer`] that prints each [`TrackingResult`] as one JSON line —
//! the CLI has no overlay surface of its own.

use art_core::types::TrackingResult;
use art_core::ViewportMapping;
use art_tracker::Renderer;

#[derive(Default)]
pub struct JsonLineRenderer;

impl Renderer for JsonLineRenderer {
    fn render(&mut self, result: &TrackingResult, _mapping: &ViewportMapping) {
        match serde_json::to_string(result) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "failed to serialize tracking result"),
        }
    }
}
