//! Print a summary of the on-disk reference catalog.

use anyhow::Result;
use art_core::TrackerConfig;

use crate::catalog_file::{self, FileCatalogStorage};

pub fn run() -> Result<()> {
    let config = TrackerConfig::default();
    let mut storage = FileCatalogStorage::new(catalog_file::default_path());
    let stored = catalog_file::load_stored(&mut storage)?;
    let catalog = catalog_file::rebuild_catalog(&stored, config.max_targets)?;

    let targets: Vec<_> = catalog
        .list()
        .iter()
        .map(|t| {
            let (descriptors, (cols, rows), id) = t.get_data().expect("catalog only holds processed targets");
            serde_json::json!({
                "target_id": id.value(),
                "name": t.name(),
                "dimensions": [cols, rows],
                "feature_count": descriptors.len(),
            })
        })
        .collect();

    println!(
        "{}",
        serde_json::json!({
            "capacity": catalog.capacity(),
            "count": catalog.len(),
            "active": catalog.active().map(|id| id.value()),
            "targets": targets,
        })
    );
    Ok(())
}
