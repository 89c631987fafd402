//! [`CameraSource`] backed by a directory of still images, read in
//! filename order — stands in for a live camera when demoing the
//! pipeline offline.

use art_core::types::FrameBuffer;
use art_core::ViewportMapping;
use art_tracker::CameraSource;
use std::path::PathBuf;

use crate::image_io::load_grayscale;

pub struct DirectoryCameraSource {
    paths: Vec<PathBuf>,
    cursor: usize,
    next_sequence: u64,
    mapping: ViewportMapping,
}

impl DirectoryCameraSource {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            cursor: 0,
            next_sequence: 0,
            mapping: ViewportMapping::new(1.0, 1.0, 1.0, 1.0),
        }
    }

    pub fn remaining(&self) -> usize {
        self.paths.len().saturating_sub(self.cursor)
    }
}

impl CameraSource for DirectoryCameraSource {
    fn capture(&mut self) -> Option<FrameBuffer> {
        let path = self.paths.get(self.cursor)?;
        self.cursor += 1;
        let (data, width, height) = load_grayscale(path).ok()?;
        self.mapping = ViewportMapping::new(width as f32, height as f32, width as f32, height as f32);
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        FrameBuffer::new(data, width, height, sequence).ok()
    }

    fn viewport_mapping(&self) -> ViewportMapping {
        self.mapping
    }
}
