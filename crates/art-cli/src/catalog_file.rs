//! On-disk persistence for the reference catalog between CLI
//! invocations. The orchestrator itself is stateless across processes;
//! this module is the concrete [`CatalogStorage`] a real host app would
//! otherwise supply.

use anyhow::{Context, Result};
use art_core::types::{DescriptorSet, TargetId};
use art_core::{PrepareOptions, ReferenceTarget, TargetCatalog};
use art_tracker::CatalogStorage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTarget {
    pub id: u64,
    pub name: String,
    pub cols: u32,
    pub rows: u32,
    pub descriptors: DescriptorSet,
    pub thumbnail: Vec<u8>,
}

pub struct FileCatalogStorage {
    path: PathBuf,
}

impl FileCatalogStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl CatalogStorage for FileCatalogStorage {
    fn load_catalog(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn save_catalog(&mut self, data: &[u8]) -> std::io::Result<()> {
        std::fs::write(&self.path, data)
    }
}

pub fn load_stored(storage: &mut FileCatalogStorage) -> Result<Vec<StoredTarget>> {
    match storage.load_catalog().context("reading catalog file")? {
        Some(bytes) => serde_json::from_slice(&bytes).context("parsing catalog file"),
        None => Ok(Vec::new()),
    }
}

pub fn save_stored(storage: &mut FileCatalogStorage, targets: &[StoredTarget]) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(targets).context("serializing catalog")?;
    storage.save_catalog(&bytes).context("writing catalog file")?;
    Ok(())
}

/// Rebuild an in-memory [`TargetCatalog`] from stored entries, preserving
/// their original ids.
pub fn rebuild_catalog(stored: &[StoredTarget], capacity: usize) -> Result<TargetCatalog> {
    let mut catalog = TargetCatalog::new(capacity);
    for entry in stored {
        let mut target = ReferenceTarget::new_unprocessed(
            TargetId::new(entry.id),
            entry.name.clone(),
            entry.cols,
            entry.rows,
        );
        target
            .mark_processed(entry.descriptors.clone(), entry.thumbnail.clone(), &PrepareOptions::default())
            .context("replaying a stored target failed its feature-count invariant")?;
        catalog
            .insert(target)
            .context("stored catalog exceeds configured capacity")?;
    }
    Ok(catalog)
}

pub fn next_id(stored: &[StoredTarget]) -> u64 {
    stored.iter().map(|t| t.id).max().map(|m| m + 1).unwrap_or(0)
}

pub fn to_stored(id: TargetId, name: String, cols: u32, rows: u32, descriptors: DescriptorSet, thumbnail: Vec<u8>) -> StoredTarget {
    StoredTarget {
        id: id.value(),
        name,
        cols,
        rows,
        descriptors,
        thumbnail,
    }
}

/// Default catalog file location: `./art-catalog.json` in the working
/// directory the CLI was invoked from.
pub fn default_path() -> PathBuf {
    Path::new("art-catalog.json").to_path_buf()
}
