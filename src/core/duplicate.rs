//! Streaming partition of fingerprinted images into keepers and duplicates.
//!
//! Each fingerprint group keeps exactly one image: the largest file seen so far.
//! A newcomer only replaces the keeper when it is strictly larger, so on equal
//! sizes the earliest-discovered image stays. Demotions are append-only: once
//! an image is recorded as a duplicate it keeps its record even if its keeper
//! is later replaced.

use crate::core::fingerprint::{self, FingerprintError, FingerprintProvider};
use crate::core::image::{Fingerprint, ImageDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// What to do when one image cannot be fingerprinted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Abort the whole pass on the first failure.
    #[default]
    FailFast,
    /// Set the image aside and keep going.
    SkipAndReport,
}

/// Fingerprint -> current keeper, iterated in order of first sighting.
#[derive(Debug, Default)]
pub struct BestMap {
    entries: Vec<(Fingerprint, ImageDescriptor)>,
    index: HashMap<Fingerprint, usize>,
}

impl BestMap {
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&ImageDescriptor> {
        self.index.get(fingerprint).map(|&i| &self.entries[i].1)
    }

    fn get_mut(&mut self, fingerprint: &Fingerprint) -> Option<&mut ImageDescriptor> {
        match self.index.get(fingerprint) {
            Some(&i) => Some(&mut self.entries[i].1),
            None => None,
        }
    }

    fn insert(&mut self, fingerprint: Fingerprint, descriptor: ImageDescriptor) {
        self.index.insert(fingerprint.clone(), self.entries.len());
        self.entries.push((fingerprint, descriptor));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Fingerprint, &ImageDescriptor)> {
        self.entries.iter().map(|(f, d)| (f, d))
    }

    pub fn values(&self) -> impl Iterator<Item = &ImageDescriptor> {
        self.entries.iter().map(|(_, d)| d)
    }
}

/// A demoted image and the fingerprint it was demoted under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateRecord {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub fingerprint: Fingerprint,
}

impl DuplicateRecord {
    fn demote(descriptor: ImageDescriptor, fingerprint: Fingerprint) -> Self {
        Self {
            size: descriptor.measured_size(),
            name: descriptor.name,
            path: descriptor.path,
            fingerprint,
        }
    }
}

/// An image that could not be fingerprinted under [`FailurePolicy::SkipAndReport`].
#[derive(Debug)]
pub struct SkippedImage {
    pub descriptor: ImageDescriptor,
    pub error: FingerprintError,
}

/// Result of one pass: every input image is in exactly one of the three lists.
#[derive(Debug, Default)]
pub struct Partition {
    best: BestMap,
    duplicates: Vec<DuplicateRecord>,
    skipped: Vec<SkippedImage>,
}

impl Partition {
    pub fn best(&self) -> &BestMap {
        &self.best
    }

    pub fn duplicates(&self) -> &[DuplicateRecord] {
        &self.duplicates
    }

    pub fn skipped(&self) -> &[SkippedImage] {
        &self.skipped
    }

    /// Total number of images the pass consumed.
    pub fn total(&self) -> usize {
        self.best.len() + self.duplicates.len() + self.skipped.len()
    }

    /// Keeper for the group a duplicate was demoted from.
    pub fn keeper_of(&self, duplicate: &DuplicateRecord) -> Option<&ImageDescriptor> {
        self.best.get(&duplicate.fingerprint)
    }

    pub fn into_parts(self) -> (BestMap, Vec<DuplicateRecord>, Vec<SkippedImage>) {
        (self.best, self.duplicates, self.skipped)
    }

    /// Place one fingerprinted image, keeping the per-group maximum.
    pub fn admit(&mut self, fingerprint: Fingerprint, candidate: ImageDescriptor) {
        match self.best.get_mut(&fingerprint) {
            None => {
                log::info!(
                    "New fingerprint {} detected, added {}",
                    fingerprint,
                    candidate.name
                );
                self.best.insert(fingerprint, candidate);
            }
            Some(best) => {
                log::debug!(
                    "Fingerprint {} exists, comparing best {} ({} bytes) with {} ({} bytes)",
                    fingerprint,
                    best.name,
                    best.measured_size(),
                    candidate.name,
                    candidate.measured_size()
                );
                if candidate.measured_size() > best.measured_size() {
                    log::info!("Promoted {} over {}", candidate.name, best.name);
                    let demoted = std::mem::replace(best, candidate);
                    self.duplicates
                        .push(DuplicateRecord::demote(demoted, fingerprint));
                } else {
                    log::info!("Demoted {} (duplicate of {})", candidate.name, best.name);
                    self.duplicates
                        .push(DuplicateRecord::demote(candidate, fingerprint));
                }
            }
        }
    }
}

type ProgressFn<'a> = Box<dyn FnMut(usize, usize) + 'a>;

/// Runs the single fingerprint-and-partition pass over a catalog.
pub struct DedupEngine<'a> {
    provider: &'a dyn FingerprintProvider,
    policy: FailurePolicy,
    progress: Option<ProgressFn<'a>>,
}

impl<'a> DedupEngine<'a> {
    pub fn new(provider: &'a dyn FingerprintProvider) -> Self {
        Self {
            provider,
            policy: FailurePolicy::default(),
            progress: None,
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Called with `(index, total)` after every tenth image (never index 0).
    pub fn with_progress(mut self, progress: impl FnMut(usize, usize) + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    pub fn partition(
        mut self,
        descriptors: Vec<ImageDescriptor>,
    ) -> Result<Partition, FingerprintError> {
        let total = descriptors.len();
        let mut partition = Partition::default();

        for (index, mut descriptor) in descriptors.into_iter().enumerate() {
            match fingerprint::apply(self.provider, &mut descriptor) {
                Ok(fingerprint) => partition.admit(fingerprint, descriptor),
                Err(error) => match self.policy {
                    FailurePolicy::FailFast => {
                        log::error!("{}", error);
                        return Err(error);
                    }
                    FailurePolicy::SkipAndReport => {
                        log::warn!("Skipping {}: {}", descriptor.name, error);
                        partition.skipped.push(SkippedImage { descriptor, error });
                    }
                },
            }

            if index % 10 == 0 && index != 0 {
                if let Some(progress) = self.progress.as_mut() {
                    progress(index, total);
                }
            }
        }

        log::info!(
            "Partitioned {} image(s): {} kept, {} duplicate(s), {} skipped",
            total,
            partition.best.len(),
            partition.duplicates.len(),
            partition.skipped.len()
        );
        Ok(partition)
    }
}
