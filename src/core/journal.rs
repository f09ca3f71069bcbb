use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("Cannot open journal {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write journal {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed journal entry {line} in {path}: {source}")]
    Malformed {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveRole {
    Best,
    Duplicate,
}

/// One completed move, as written to the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub timestamp: String,
    pub role: MoveRole,
    pub from: PathBuf,
    pub to: PathBuf,
}

impl MoveRecord {
    pub fn now(role: MoveRole, from: &Path, to: &Path) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            role,
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        }
    }
}

/// Append-only JSON-lines log of moves, flushed after every entry.
pub struct Journal {
    path: PathBuf,
    file: File,
}

impl Journal {
    pub fn open(path: &Path) -> Result<Self, JournalError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| JournalError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn append(&mut self, record: &MoveRecord) -> Result<(), JournalError> {
        let line = serde_json::to_string(record).map_err(|e| JournalError::Write {
            path: self.path.clone(),
            source: e.into(),
        })?;
        writeln!(self.file, "{}", line)
            .and_then(|_| self.file.flush())
            .map_err(|source| JournalError::Write {
                path: self.path.clone(),
                source,
            })
    }
}

/// Read every entry of a journal, oldest first. Blank lines are ignored.
pub fn load(path: &Path) -> Result<Vec<MoveRecord>, JournalError> {
    let file = File::open(path).map_err(|source| JournalError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut records = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| JournalError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|source| JournalError::Malformed {
            path: path.to_path_buf(),
            line: i + 1,
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}

#[derive(Debug, Default)]
pub struct RestoreSummary {
    pub restored: Vec<MoveRecord>,
    pub kept: Vec<MoveRecord>,
}

/// Undo journaled moves, newest first.
///
/// An entry is undone when its destination still exists and its original
/// path is free. Undone entries are dropped from the journal; the rest are
/// written back in their original order.
pub fn restore(path: &Path) -> Result<RestoreSummary, JournalError> {
    let records = load(path)?;
    let mut summary = RestoreSummary::default();

    for record in records.into_iter().rev() {
        if !record.to.exists() {
            log::warn!("{} no longer exists; keeping entry", record.to.display());
            summary.kept.push(record);
            continue;
        }
        if record.from.exists() {
            log::warn!("{} is occupied; keeping entry", record.from.display());
            summary.kept.push(record);
            continue;
        }

        let moved = match record.from.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
            _ => Ok(()),
        }
        .and_then(|_| fs::rename(&record.to, &record.from));

        match moved {
            Ok(()) => {
                log::info!(
                    "Restored {} -> {}",
                    record.to.display(),
                    record.from.display()
                );
                summary.restored.push(record);
            }
            Err(e) => {
                log::warn!("Cannot restore {}: {}", record.to.display(), e);
                summary.kept.push(record);
            }
        }
    }

    summary.kept.reverse();
    let mut remaining = String::new();
    for record in &summary.kept {
        let line = serde_json::to_string(record).map_err(|e| JournalError::Write {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        remaining.push_str(&line);
        remaining.push('\n');
    }
    fs::write(path, remaining).map_err(|source| JournalError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(summary)
}
