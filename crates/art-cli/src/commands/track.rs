//! Run the pipeline over a directory of still frames, printing one JSON
//! tracking result per frame.

use anyhow::{bail, Context, Result};
use art_core::TrackerConfig;
use art_tracker::{RecordingSink, TrackingOrchestrator};
use art_vision::OpenCvBackend;
use std::path::PathBuf;

use crate::catalog_file::{self, FileCatalogStorage};
use crate::directory_camera::DirectoryCameraSource;
use crate::image_io::list_images_sorted;
use crate::json_renderer::JsonLineRenderer;

pub fn run(frames_dir: PathBuf) -> Result<()> {
    let config = TrackerConfig::default();

    let mut storage = FileCatalogStorage::new(catalog_file::default_path());
    let stored = catalog_file::load_stored(&mut storage)?;
    if stored.is_empty() {
        bail!("no reference targets in the catalog; run `add-target` first");
    }

    let backend = OpenCvBackend::new().context("failed to initialize the vision backend")?;
    let mut orchestrator = TrackingOrchestrator::new(Box::new(backend), config);
    let mut sink = RecordingSink::default();
    orchestrator.start(&mut sink);
    for entry in &stored {
        let mut target = art_core::ReferenceTarget::new_unprocessed(
            art_core::types::TargetId::new(entry.id),
            entry.name.clone(),
            entry.cols,
            entry.rows,
        );
        target.mark_processed(entry.descriptors.clone(), entry.thumbnail.clone(), &art_core::PrepareOptions::default())?;
        orchestrator.add_target(target, &mut sink)?;
    }

    let paths = list_images_sorted(&frames_dir)?;
    if paths.is_empty() {
        bail!("no image files found in {}", frames_dir.display());
    }
    let frame_count = paths.len();
    let mut camera = DirectoryCameraSource::new(paths);
    let mut renderer = JsonLineRenderer;

    for timestamp_ms in 0..frame_count as u64 {
        orchestrator.pump(&mut camera, &mut renderer, &mut sink, timestamp_ms * 33);
    }

    Ok(())
}
