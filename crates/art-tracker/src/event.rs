//! Orchestrator → host application events (observer pattern, spec §6).

use art_core::types::{QuadCorners, QualityMetrics, TargetId};

/// Events published by the orchestrator to whatever host owns it.
#[derive(Debug, Clone)]
pub enum Event {
    Initialized,

    Error {
        code: ErrorCode,
        message: String,
    },

    ReferenceLoaded {
        target_id: TargetId,
        feature_count: usize,
    },

    TrackingStarted,
    TrackingStopped,

    PoseUpdated {
        target_id: TargetId,
        corners: QuadCorners,
        display_corners: QuadCorners,
        quality: QualityMetrics,
        timestamp_ms: u64,
    },

    TrackingFound {
        target_id: TargetId,
    },

    TrackingLost,
}

/// Stable classification for [`Event::Error`], so a host can branch
/// without string-matching a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    CatalogEmpty,
    CatalogFull,
    BackendUnavailable,
    PreparationFailed,
    CameraDenied,
}

/// Receives events emitted by the orchestrator. A host application
/// (WebAssembly bridge, desktop shell — out of this workspace's scope)
/// implements this to update its own UI/render state.
pub trait EventSink {
    fn on_event(&mut self, event: Event);
}

/// An [`EventSink`] that records every event in order, useful for tests
/// and for a CLI front door that just wants to print results.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<Event>,
}

impl EventSink for RecordingSink {
    fn on_event(&mut self, event: Event) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_preserves_order() {
        let mut sink = RecordingSink::default();
        sink.on_event(Event::Initialized);
        sink.on_event(Event::TrackingStarted);
        assert_eq!(sink.events.len(), 2);
        assert!(matches!(sink.events[0], Event::Initialized));
        assert!(matches!(sink.events[1], Event::TrackingStarted));
    }
}
