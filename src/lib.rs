//! Perceptual-hash image deduplication.
//!
//! Scans a flat directory of images, fingerprints each one, keeps the largest
//! file of every fingerprint group and moves everything else into a
//! duplicates directory, leaving an audit record and a move journal behind.

pub mod config;
pub mod core;
pub mod error;
pub mod pipeline;

pub use config::Settings;
pub use crate::core::duplicate::{BestMap, DedupEngine, DuplicateRecord, FailurePolicy, Partition};
pub use crate::core::fingerprint::{FingerprintProvider, Fingerprinted, PerceptualHasher};
pub use crate::core::image::{Fingerprint, ImageDescriptor};
pub use crate::core::relocate::{AuditReport, MoveStrategy, Relocator};
pub use error::{Error, Result};
pub use pipeline::Pipeline;
