//! Extract features from a reference image and add it to the on-disk
//! catalog.

use anyhow::{Context, Result};
use art_core::{PrepareOptions, ReferenceTarget, TrackerConfig};
use art_vision::backend::{ExtractionParams, GrayImage};
use art_vision::{OpenCvBackend, VisionBackend};
use std::path::PathBuf;

use crate::catalog_file::{self, FileCatalogStorage};
use crate::image_io::load_grayscale;

pub fn run(image: PathBuf, name: String) -> Result<()> {
    let (data, width, height) = load_grayscale(&image)?;
    let summary = add_one(data, width, height, name)?;
    println!("{summary}");
    Ok(())
}

/// Extract features from one already-decoded grayscale image and append
/// it to the on-disk catalog. Shared by the single-image `add-target`
/// subcommand and `add-targets-dir`, which drives this through a
/// [`crate::directory_catalog_loader::DirectoryCatalogLoader`] instead of
/// a one-off [`load_grayscale`] call.
pub fn add_one(data: Vec<u8>, width: u32, height: u32, name: String) -> Result<serde_json::Value> {
    let backend = OpenCvBackend::new().context("failed to initialize the vision backend")?;
    let config = TrackerConfig::default();
    let opts = PrepareOptions {
        max_features: config.max_ref_features,
        detector_threshold: 55,
    };

    let descriptors = backend
        .extract_features(GrayImage::new(&data, width, height), ExtractionParams {
            max_features: opts.max_features,
            detector_threshold: opts.detector_threshold,
        })
        .map_err(|e| anyhow::anyhow!("feature extraction failed: {e}"))?;

    let mut storage = FileCatalogStorage::new(catalog_file::default_path());
    let mut stored = catalog_file::load_stored(&mut storage)?;
    let id = art_core::types::TargetId::new(catalog_file::next_id(&stored));

    let mut target = ReferenceTarget::new_unprocessed(id, name.clone(), width, height);
    target
        .mark_processed(descriptors, Vec::new(), &opts)
        .context("reference image did not yield enough usable features")?;
    let (validated, _, _) = target.get_data()?;
    let feature_count = validated.len();

    stored.push(catalog_file::to_stored(id, name.clone(), width, height, validated.clone(), Vec::new()));
    catalog_file::save_stored(&mut storage, &stored)?;

    Ok(serde_json::json!({
        "target_id": id.value(),
        "name": name,
        "feature_count": feature_count,
    }))
}
