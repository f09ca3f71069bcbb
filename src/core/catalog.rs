use crate::core::image::ImageDescriptor;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Name fragments that mark a directory entry as an image candidate.
///
/// Matched anywhere in the lower-cased name, not only as the extension, so
/// `photo.png.bak` is a candidate too.
pub const IMAGE_MARKERS: [&str; 3] = ["jpeg", "jpg", "png"];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Cannot open directory {path}: {source}")]
    Missing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("Cannot read directory {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

pub fn is_candidate(name: &str) -> bool {
    let lower = name.to_lowercase();
    IMAGE_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// List candidate images directly inside `directory`, sorted by file name.
///
/// Subdirectories are neither recursed into nor returned. The returned order
/// is the discovery order the duplicate engine uses for tie-breaks.
pub fn scan(directory: &Path) -> Result<Vec<ImageDescriptor>, CatalogError> {
    let metadata = fs::metadata(directory).map_err(|source| CatalogError::Missing {
        path: directory.to_path_buf(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(CatalogError::NotADirectory {
            path: directory.to_path_buf(),
        });
    }

    let mut images = Vec::new();
    for entry in WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| CatalogError::Unreadable {
            path: directory.to_path_buf(),
            source,
        })?;

        let name = entry.file_name().to_string_lossy();
        if !is_candidate(&name) {
            continue;
        }
        // Follows symlinks, so a link to an image counts as a file.
        if !entry.path().is_file() {
            log::debug!("Skipping non-file entry {}", entry.path().display());
            continue;
        }

        images.push(ImageDescriptor::from_path(directory, entry.into_path()));
    }

    log::info!(
        "Catalog of {}: {} candidate image(s) {:?}",
        directory.display(),
        images.len(),
        images.iter().map(|d| d.name.as_str()).collect::<Vec<_>>()
    );
    Ok(images)
}
