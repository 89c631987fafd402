//! A [`CatalogLoader`] backed by a directory of reference images, named
//! by filename stem. The only concrete implementation of that
//! collaborator trait in this workspace (spec §6: archive loading is a
//! host concern).

use art_tracker::CatalogLoader;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crate::image_io::{list_images_sorted, load_grayscale};

pub struct DirectoryCatalogLoader {
    paths: VecDeque<PathBuf>,
}

impl DirectoryCatalogLoader {
    pub fn new(dir: &Path) -> anyhow::Result<Self> {
        let paths = list_images_sorted(dir)?;
        Ok(Self { paths: paths.into() })
    }
}

impl CatalogLoader for DirectoryCatalogLoader {
    /// Decodes and returns the next image in filename order. A file that
    /// fails to decode is skipped rather than ending the sequence early.
    fn load_next(&mut self) -> Option<(Vec<u8>, u32, u32, String)> {
        loop {
            let path = self.paths.pop_front()?;
            let name = path.file_stem()?.to_string_lossy().into_owned();
            match load_grayscale(&path) {
                Ok((data, width, height)) => return Some((data, width, height, name)),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable reference image");
                    continue;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_directory_yields_no_images() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = DirectoryCatalogLoader::new(dir.path()).unwrap();
        assert!(loader.load_next().is_none());
    }
}
