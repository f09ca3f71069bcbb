use crate::core::catalog::CatalogError;
use crate::core::fingerprint::FingerprintError;
use crate::core::journal::JournalError;
use crate::core::relocate::RelocationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),

    #[error(transparent)]
    Relocation(#[from] RelocationError),

    #[error(transparent)]
    Journal(#[from] JournalError),
}

pub type Result<T> = std::result::Result<T, Error>;
