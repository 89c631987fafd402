//! Walk a directory of reference images through a `CatalogLoader`
//! collaborator and add each to the on-disk catalog.

use anyhow::{bail, Result};
use std::path::PathBuf;

use crate::commands::add_target;
use crate::directory_catalog_loader::DirectoryCatalogLoader;
use art_tracker::CatalogLoader;

pub fn run(dir: PathBuf) -> Result<()> {
    let mut loader = DirectoryCatalogLoader::new(&dir)?;
    let mut added = 0usize;
    while let Some((data, width, height, name)) = loader.load_next() {
        match add_target::add_one(data, width, height, name.clone()) {
            Ok(summary) => {
                println!("{summary}");
                added += 1;
            }
            Err(e) => eprintln!("skipping {name}: {e}"),
        }
    }
    if added == 0 {
        bail!("no reference targets were added from {}", dir.display());
    }
    Ok(())
}
