//! Grayscale image loading shared by every subcommand, via the same
//! `opencv` crate the vision backend already depends on.

use anyhow::{bail, Context, Result};
use opencv::core::MatTraitConst;
use opencv::{imgcodecs, prelude::*};
use std::path::Path;

/// Decode an image file to a tightly packed row-major grayscale buffer.
pub fn load_grayscale(path: &Path) -> Result<(Vec<u8>, u32, u32)> {
    let mat = imgcodecs::imread(
        path.to_str().context("image path is not valid UTF-8")?,
        imgcodecs::IMREAD_GRAYSCALE,
    )
    .with_context(|| format!("failed to decode {}", path.display()))?;

    if mat.empty() {
        bail!("{} could not be decoded (empty image)", path.display());
    }

    let width = mat.cols() as u32;
    let height = mat.rows() as u32;
    let mut data = vec![0u8; (width as usize) * (height as usize)];
    for y in 0..height as i32 {
        for x in 0..width as i32 {
            data[(y as usize) * (width as usize) + x as usize] = *mat
                .at_2d::<u8>(y, x)
                .context("pixel read out of bounds")?;
        }
    }
    Ok((data, width, height))
}

/// List image files in a directory, sorted by filename, for a
/// [`crate::directory_camera::DirectoryCameraSource`].
pub fn list_images_sorted(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    const EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "pgm"];
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();
    Ok(paths)
}
