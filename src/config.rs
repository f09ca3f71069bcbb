use crate::core::duplicate::FailurePolicy;
use crate::core::relocate::MoveStrategy;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where a run reads from and writes to, and how it reacts to failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub input_dir: PathBuf,
    pub best_dir: PathBuf,
    pub duplicate_dir: PathBuf,
    pub record_file: PathBuf,
    pub log_file: PathBuf,
    pub journal_file: PathBuf,
    pub failure_policy: FailurePolicy,
    pub move_strategy: MoveStrategy,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("input"),
            best_dir: PathBuf::from("Best"),
            duplicate_dir: PathBuf::from("Duplicate"),
            record_file: PathBuf::from("record.txt"),
            log_file: PathBuf::from("activity.log"),
            journal_file: PathBuf::from("moves.jsonl"),
            failure_policy: FailurePolicy::FailFast,
            move_strategy: MoveStrategy::Rename,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    pub fn level_filter(&self) -> LevelFilter {
        level_filter(&self.log_level)
    }
}

/// Unknown level names fall back to `info`.
fn level_filter(name: &str) -> LevelFilter {
    match name.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}
