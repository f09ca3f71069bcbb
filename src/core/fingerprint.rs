use crate::core::image::{Fingerprint, ImageDescriptor};
use image::{ImageError, ImageReader};
use image_hasher::{HashAlg, Hasher, HasherConfig};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("Cannot open image {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot stat image {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: ImageError,
    },
}

/// What a provider learns about one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprinted {
    pub fingerprint: Fingerprint,
    pub size: u64,
    pub width: u32,
    pub height: u32,
}

/// Computes a comparable fingerprint for the image stored at a path.
pub trait FingerprintProvider {
    fn fingerprint(&self, path: &Path) -> Result<Fingerprinted, FingerprintError>;
}

/// Perceptual hash (DCT-preprocessed mean hash, 8x8 bits) of the decoded raster.
pub struct PerceptualHasher {
    hasher: Hasher,
}

impl PerceptualHasher {
    pub fn new() -> Self {
        let hasher = HasherConfig::new()
            .hash_size(8, 8)
            .hash_alg(HashAlg::Mean)
            .preproc_dct()
            .to_hasher();
        Self { hasher }
    }
}

impl Default for PerceptualHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl FingerprintProvider for PerceptualHasher {
    fn fingerprint(&self, path: &Path) -> Result<Fingerprinted, FingerprintError> {
        let file = File::open(path).map_err(|source| FingerprintError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let size = file
            .metadata()
            .map_err(|source| FingerprintError::Stat {
                path: path.to_path_buf(),
                source,
            })?
            .len();

        // Sniff the format from content; the name filter is too loose to trust.
        // Only the jpeg and png decoders are compiled in.
        let image = ImageReader::new(BufReader::new(file))
            .with_guessed_format()
            .map_err(|e| FingerprintError::Decode {
                path: path.to_path_buf(),
                source: ImageError::IoError(e),
            })?
            .decode()
            .map_err(|source| FingerprintError::Decode {
                path: path.to_path_buf(),
                source,
            })?;

        let hash = self.hasher.hash_image(&image);
        Ok(Fingerprinted {
            fingerprint: Fingerprint(hash.to_base64()),
            size,
            width: image.width(),
            height: image.height(),
        })
    }
}

/// Fingerprint `descriptor` and record its size and dimensions in place.
pub fn apply(
    provider: &dyn FingerprintProvider,
    descriptor: &mut ImageDescriptor,
) -> Result<Fingerprint, FingerprintError> {
    let measured = provider.fingerprint(&descriptor.path)?;
    descriptor.size = Some(measured.size);
    descriptor.width = measured.width;
    descriptor.height = measured.height;

    log::info!(
        "Fingerprint of {} : {} ({} bytes, {}x{})",
        descriptor.path.display(),
        measured.fingerprint,
        measured.size,
        measured.width,
        measured.height
    );
    Ok(measured.fingerprint)
}
