use crate::core::duplicate::Partition;
use crate::core::journal::{Journal, JournalError, MoveRecord, MoveRole};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DIVIDER: &str = "================================================";

#[derive(Debug, Error)]
pub enum RelocationError {
    #[error("Cannot create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Destination already exists: {path}")]
    Collision { path: PathBuf },

    #[error("Cannot move {from} -> {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Copy of {from} -> {to} is incomplete ({copied} of {expected} bytes)")]
    CopyMismatch {
        from: PathBuf,
        to: PathBuf,
        copied: u64,
        expected: u64,
    },

    #[error("No surviving image for duplicate {name}")]
    MissingKeeper { name: String },

    #[error("Cannot write audit record {path}: {source}")]
    Record {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Journal(#[from] JournalError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveStrategy {
    /// Rename only; fails across filesystems.
    #[default]
    Rename,
    /// Rename, falling back to copy, verify, delete on a cross-device error.
    RenameOrCopy,
}

/// Human-readable account of a relocation, in keeper discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub kept: Vec<String>,
    /// `(duplicate name, surviving keeper name)`
    pub duplicates: Vec<(String, String)>,
    /// `(name, reason)` for images that could not be fingerprinted.
    pub skipped: Vec<(String, String)>,
}

impl AuditReport {
    pub fn from_partition(partition: &Partition) -> Result<Self, RelocationError> {
        let kept = partition.best().values().map(|d| d.name.clone()).collect();

        let duplicates = partition
            .duplicates()
            .iter()
            .map(|dup| {
                partition
                    .keeper_of(dup)
                    .map(|keeper| (dup.name.clone(), keeper.name.clone()))
                    .ok_or_else(|| RelocationError::MissingKeeper {
                        name: dup.name.clone(),
                    })
            })
            .collect::<Result<_, _>>()?;

        let skipped = partition
            .skipped()
            .iter()
            .map(|s| (s.descriptor.name.clone(), s.error.to_string()))
            .collect();

        Ok(Self {
            kept,
            duplicates,
            skipped,
        })
    }

    pub fn render(&self) -> String {
        let mut lines = vec!["Best Image:".to_string()];
        lines.extend(self.kept.iter().cloned());
        lines.push(format!("{}\n", DIVIDER));

        lines.push("Duplicate Image:".to_string());
        lines.extend(
            self.duplicates
                .iter()
                .map(|(name, survivor)| format!("{} (Duplicate of {})", name, survivor)),
        );

        if !self.skipped.is_empty() {
            lines.push(format!("{}\n", DIVIDER));
            lines.push("Skipped Image:".to_string());
            lines.extend(
                self.skipped
                    .iter()
                    .map(|(name, reason)| format!("{} ({})", name, reason)),
            );
        }

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }

    /// Append the rendered report to `path`, creating it if needed.
    pub fn append_to(&self, path: &Path) -> Result<(), RelocationError> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| file.write_all(self.render().as_bytes()))
            .map_err(|source| RelocationError::Record {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// Moves keepers and duplicates into their destination directories.
///
/// Not idempotent: a second run over the same partition fails because the
/// source files are already gone. Files moved before a failure stay moved;
/// the journal, when attached, lists each of them.
pub struct Relocator {
    best_dir: PathBuf,
    duplicate_dir: PathBuf,
    strategy: MoveStrategy,
    journal: Option<Journal>,
}

impl Relocator {
    pub fn new(best_dir: impl Into<PathBuf>, duplicate_dir: impl Into<PathBuf>) -> Self {
        Self {
            best_dir: best_dir.into(),
            duplicate_dir: duplicate_dir.into(),
            strategy: MoveStrategy::default(),
            journal: None,
        }
    }

    pub fn with_strategy(mut self, strategy: MoveStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn relocate(&mut self, partition: Partition) -> Result<AuditReport, RelocationError> {
        let report = AuditReport::from_partition(&partition)?;
        let (best, duplicates, _) = partition.into_parts();

        for keeper in best.values() {
            let to = self.move_into(MoveRole::Best, &keeper.path)?;
            log::info!("Kept {} -> {}", keeper.name, to.display());
        }

        for duplicate in &duplicates {
            let to = self.move_into(MoveRole::Duplicate, &duplicate.path)?;
            log::info!("Duplicate {} -> {}", duplicate.name, to.display());
        }

        Ok(report)
    }

    /// Move `from` into the role's directory under its own (byte-exact) file name.
    fn move_into(&mut self, role: MoveRole, from: &Path) -> Result<PathBuf, RelocationError> {
        let dir = match role {
            MoveRole::Best => &self.best_dir,
            MoveRole::Duplicate => &self.duplicate_dir,
        };
        fs::create_dir_all(dir).map_err(|source| RelocationError::CreateDir {
            path: dir.clone(),
            source,
        })?;

        let to = match from.file_name() {
            Some(file_name) => dir.join(file_name),
            None => {
                return Err(RelocationError::Move {
                    from: from.to_path_buf(),
                    to: dir.clone(),
                    source: std::io::Error::new(ErrorKind::InvalidInput, "path has no file name"),
                });
            }
        };
        if let Err(source) = fs::symlink_metadata(from) {
            log::error!("Source {} is gone: {}", from.display(), source);
            return Err(RelocationError::Move {
                from: from.to_path_buf(),
                to,
                source,
            });
        }
        if fs::symlink_metadata(&to).is_ok() {
            log::error!("Destination already exists: {}", to.display());
            return Err(RelocationError::Collision { path: to });
        }

        move_file(from, &to, self.strategy).inspect_err(|e| log::error!("{}", e))?;

        if let Some(journal) = self.journal.as_mut() {
            journal.append(&MoveRecord::now(role, from, &to))?;
        }
        Ok(to)
    }
}

/// Move one file, optionally falling back to a verified copy across devices.
pub fn move_file(from: &Path, to: &Path, strategy: MoveStrategy) -> Result<(), RelocationError> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e)
            if e.kind() == ErrorKind::CrossesDevices && strategy == MoveStrategy::RenameOrCopy =>
        {
            log::warn!(
                "{} and {} are on different devices, copying instead",
                from.display(),
                to.display()
            );
            copy_then_remove(from, to)
        }
        Err(source) => Err(RelocationError::Move {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        }),
    }
}

fn copy_then_remove(from: &Path, to: &Path) -> Result<(), RelocationError> {
    let io_err = |source| RelocationError::Move {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    let expected = fs::metadata(from).map_err(io_err)?.len();
    let copied = fs::copy(from, to).map_err(io_err)?;
    let on_disk = fs::metadata(to).map_err(io_err)?.len();
    if copied != expected || on_disk != expected {
        let _ = fs::remove_file(to);
        return Err(RelocationError::CopyMismatch {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            copied: on_disk,
            expected,
        });
    }
    fs::remove_file(from).map_err(io_err)
}
