use crate::config::Settings;
use crate::core::catalog;
use crate::core::duplicate::{DedupEngine, Partition};
use crate::core::fingerprint::FingerprintProvider;
use crate::core::image::ImageDescriptor;
use crate::core::journal::Journal;
use crate::core::relocate::{AuditReport, Relocator};
use crate::error::Result;

/// Catalog, partition and relocate, strictly in that order.
pub struct Pipeline<'a> {
    settings: &'a Settings,
    provider: &'a dyn FingerprintProvider,
}

impl<'a> Pipeline<'a> {
    pub fn new(settings: &'a Settings, provider: &'a dyn FingerprintProvider) -> Self {
        Self { settings, provider }
    }

    pub fn catalog(&self) -> Result<Vec<ImageDescriptor>> {
        Ok(catalog::scan(&self.settings.input_dir)?)
    }

    pub fn partition(
        &self,
        images: Vec<ImageDescriptor>,
        progress: impl FnMut(usize, usize) + 'a,
    ) -> Result<Partition> {
        let partition = DedupEngine::new(self.provider)
            .with_policy(self.settings.failure_policy)
            .with_progress(progress)
            .partition(images)?;
        Ok(partition)
    }

    /// Move files and append the audit record. Moves are journaled as they happen.
    pub fn relocate(&self, partition: Partition) -> Result<AuditReport> {
        let journal = Journal::open(&self.settings.journal_file)?;
        let report = Relocator::new(&self.settings.best_dir, &self.settings.duplicate_dir)
            .with_strategy(self.settings.move_strategy)
            .with_journal(journal)
            .relocate(partition)?;
        report.append_to(&self.settings.record_file)?;
        Ok(report)
    }

    pub fn run(&self, progress: impl FnMut(usize, usize) + 'a) -> Result<AuditReport> {
        let images = self.catalog()?;
        let partition = self.partition(images, progress)?;
        self.relocate(partition)
    }
}
