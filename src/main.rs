use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use dupecull::core::journal;
use dupecull::{
    DuplicateRecord, FailurePolicy, ImageDescriptor, MoveStrategy, Partition, PerceptualHasher,
    Pipeline, Settings,
};
use env_logger::{Builder, Target};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(
    name = "dupecull",
    version,
    about = "Keep the largest copy of each image, move its duplicates aside"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Operational log file (appended to)
    #[arg(long, global = true, value_name = "FILE", default_value = "activity.log")]
    log_file: PathBuf,

    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fingerprint, pick keepers, move files into Best/ and Duplicate/ (default)
    Run(RunArgs),

    /// Fingerprint and list duplicate groups without moving anything
    Scan(ScanArgs),

    /// Move journaled files back to where they came from
    Restore {
        /// Journal written by a previous run
        #[arg(long, value_name = "FILE", default_value = "moves.jsonl")]
        journal: PathBuf,
    },
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Directory to scan (default: `input`)
    #[arg(short, long, value_name = "DIR")]
    input: Option<PathBuf>,
    /// Where keepers go (default: `Best`)
    #[arg(long, value_name = "DIR")]
    best_dir: Option<PathBuf>,
    /// Where duplicates go (default: `Duplicate`)
    #[arg(long, value_name = "DIR")]
    duplicate_dir: Option<PathBuf>,
    /// Audit record (default: `record.txt`)
    #[arg(long, value_name = "FILE")]
    record: Option<PathBuf>,
    /// Move journal (default: `moves.jsonl`)
    #[arg(long, value_name = "FILE")]
    journal: Option<PathBuf>,
    /// Skip images that cannot be decoded instead of aborting
    #[arg(long)]
    keep_going: bool,
    /// Copy then delete when a move crosses filesystems
    #[arg(long)]
    copy_fallback: bool,
}

#[derive(Args, Debug, Default)]
struct ScanArgs {
    /// Directory to scan (default: `input`)
    #[arg(short, long, value_name = "DIR")]
    input: Option<PathBuf>,
    /// Skip images that cannot be decoded instead of aborting
    #[arg(long)]
    keep_going: bool,
    /// Print the groups as JSON
    #[arg(long)]
    json: bool,
}

fn failure_policy(keep_going: bool) -> FailurePolicy {
    if keep_going {
        FailurePolicy::SkipAndReport
    } else {
        FailurePolicy::FailFast
    }
}

impl RunArgs {
    fn apply(self, base: Settings) -> Settings {
        Settings {
            input_dir: self.input.unwrap_or(base.input_dir),
            best_dir: self.best_dir.unwrap_or(base.best_dir),
            duplicate_dir: self.duplicate_dir.unwrap_or(base.duplicate_dir),
            record_file: self.record.unwrap_or(base.record_file),
            journal_file: self.journal.unwrap_or(base.journal_file),
            failure_policy: failure_policy(self.keep_going),
            move_strategy: if self.copy_fallback {
                MoveStrategy::RenameOrCopy
            } else {
                MoveStrategy::Rename
            },
            ..base
        }
    }
}

impl ScanArgs {
    fn apply(self, base: Settings) -> Settings {
        Settings {
            input_dir: self.input.unwrap_or(base.input_dir),
            failure_policy: failure_policy(self.keep_going),
            ..base
        }
    }
}

/// What to do, with every path and level it needs folded into one `Settings`.
enum Action {
    Run,
    Scan { json: bool },
    Restore,
}

impl Cli {
    fn resolve(self) -> (Action, Settings) {
        let base = Settings {
            log_file: self.log_file,
            log_level: self.log_level,
            ..Settings::default()
        };

        match self.command.unwrap_or_else(|| Commands::Run(RunArgs::default())) {
            Commands::Run(args) => (Action::Run, args.apply(base)),
            Commands::Scan(args) => {
                let json = args.json;
                (Action::Scan { json }, args.apply(base))
            }
            Commands::Restore { journal } => (
                Action::Restore,
                Settings {
                    journal_file: journal,
                    ..base
                },
            ),
        }
    }
}

#[derive(Serialize)]
struct GroupView<'a> {
    fingerprint: &'a str,
    keep: &'a ImageDescriptor,
    duplicates: Vec<&'a DuplicateRecord>,
}

#[derive(Serialize)]
struct SkippedView<'a> {
    name: &'a str,
    reason: String,
}

#[derive(Serialize)]
struct ScanView<'a> {
    groups: Vec<GroupView<'a>>,
    skipped: Vec<SkippedView<'a>>,
}

fn main() {
    let (action, settings) = Cli::parse().resolve();
    if let Err(e) = init_logging(&settings) {
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }
    log::info!("=====  Log ready. Program start.");

    if let Err(e) = dispatch(action, &settings) {
        log::error!("Fatal: {:#}", e);
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }
    log::info!("===== Finish");
}

fn dispatch(action: Action, settings: &Settings) -> Result<()> {
    log::debug!("Settings: {:?}", settings);
    match action {
        Action::Run => run(settings),
        Action::Scan { json } => scan(settings, json),
        Action::Restore => restore(&settings.journal_file),
    }
}

fn run(settings: &Settings) -> Result<()> {
    let hasher = PerceptualHasher::new();
    let pipeline = Pipeline::new(settings, &hasher);

    let partition = fingerprint_all(&pipeline, settings)?;
    println!(
        "▶ {} duplicate(s) found. Moving files into {} and {}…",
        partition.duplicates().len(),
        settings.best_dir.display(),
        settings.duplicate_dir.display()
    );

    let report = pipeline
        .relocate(partition)
        .context("Relocation stopped; already moved files are listed in the journal")?;

    println!(
        "✅ Kept {}, moved {} duplicate(s). Record appended to {}",
        report.kept.len(),
        report.duplicates.len(),
        settings.record_file.display()
    );
    if !report.skipped.is_empty() {
        println!(
            "⚠️  {} image(s) could not be read and were left in place",
            report.skipped.len()
        );
    }
    Ok(())
}

fn scan(settings: &Settings, json: bool) -> Result<()> {
    let hasher = PerceptualHasher::new();
    let pipeline = Pipeline::new(settings, &hasher);
    let partition = fingerprint_all(&pipeline, settings)?;
    let view = scan_view(&partition);

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    let groups: Vec<&GroupView> = view
        .groups
        .iter()
        .filter(|g| !g.duplicates.is_empty())
        .collect();
    if groups.is_empty() {
        println!("No duplicates found.");
    } else {
        println!("Found {} duplicate group(s):", groups.len());
        for (i, group) in groups.iter().enumerate() {
            println!("\n✨ Group {}:", i + 1);
            println!(
                "   🏆 Keeping → {} ({} bytes)",
                group.keep.name,
                group.keep.measured_size()
            );
            for dup in &group.duplicates {
                println!("   📦 {} ({} bytes)", dup.name, dup.size);
            }
        }
    }
    for skipped in &view.skipped {
        println!("⚠️  Skipped {}: {}", skipped.name, skipped.reason);
    }
    Ok(())
}

fn restore(journal_file: &Path) -> Result<()> {
    let summary = journal::restore(journal_file)
        .with_context(|| format!("Failed to restore from {}", journal_file.display()))?;

    for record in &summary.restored {
        println!("🔄 Restored {} → {}", record.to.display(), record.from.display());
    }
    for record in &summary.kept {
        eprintln!("⚠️  Could not restore {}", record.to.display());
    }
    println!(
        "🧹 Restored {} file(s), {} entry(ies) left in {}",
        summary.restored.len(),
        summary.kept.len(),
        journal_file.display()
    );
    Ok(())
}

fn fingerprint_all(pipeline: &Pipeline, settings: &Settings) -> Result<Partition> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    spinner.set_message("Scanning for images…");
    spinner.enable_steady_tick(Duration::from_millis(100));
    let images = pipeline.catalog();
    spinner.finish_and_clear();
    let images = images
        .with_context(|| format!("Cannot build image list from {}", settings.input_dir.display()))?;

    let total = images.len();
    println!("▶ Analyzing {} image(s) in {}…", total, settings.input_dir.display());

    let partition = benchmark("fingerprinting", || {
        pipeline.partition(images, |done, total| {
            println!("Analyzed image: {} / {}", done, total)
        })
    })
    .context("Fingerprinting aborted")?;

    println!("Analyzed image: {} / {}. Analysis completed.", total, total);
    Ok(partition)
}

fn init_logging(settings: &Settings) -> Result<()> {
    let path = &settings.log_file;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Cannot open log file {}", path.display()))?;

    Builder::new()
        .filter_level(settings.level_filter())
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(Target::Pipe(Box::new(log_file)))
        .try_init()
        .context("Cannot install logger")?;
    Ok(())
}

/// Run `f()`, print how long it took (with `label`), and return its result.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    println!("⏱ {} took {:.2?}", label, start.elapsed());
    result
}

fn scan_view(partition: &Partition) -> ScanView<'_> {
    let groups = partition
        .best()
        .iter()
        .map(|(fingerprint, keep)| GroupView {
            fingerprint: fingerprint.as_str(),
            keep,
            duplicates: partition
                .duplicates()
                .iter()
                .filter(|d| &d.fingerprint == fingerprint)
                .collect(),
        })
        .collect();

    let skipped = partition
        .skipped()
        .iter()
        .map(|s| SkippedView {
            name: &s.descriptor.name,
            reason: s.error.to_string(),
        })
        .collect();

    ScanView { groups, skipped }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(args: &[&str]) -> (Action, Settings) {
        Cli::try_parse_from(args).unwrap().resolve()
    }

    #[test]
    fn test_no_subcommand_runs_with_defaults() {
        let (action, settings) = resolve(&["dupecull"]);

        assert!(matches!(action, Action::Run));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_log_options_reach_settings() {
        let (_, settings) = resolve(&[
            "dupecull",
            "scan",
            "--log-file",
            "other.log",
            "--log-level",
            "debug",
        ]);

        assert_eq!(settings.log_file, PathBuf::from("other.log"));
        assert_eq!(settings.level_filter(), log::LevelFilter::Debug);
    }

    #[test]
    fn test_run_options_reach_settings() {
        let (_, settings) = resolve(&[
            "dupecull",
            "run",
            "--input",
            "photos",
            "--journal",
            "j.jsonl",
            "--keep-going",
            "--copy-fallback",
        ]);

        assert_eq!(settings.input_dir, PathBuf::from("photos"));
        assert_eq!(settings.journal_file, PathBuf::from("j.jsonl"));
        assert_eq!(settings.failure_policy, FailurePolicy::SkipAndReport);
        assert_eq!(settings.move_strategy, MoveStrategy::RenameOrCopy);
    }

    #[test]
    fn test_scan_rejects_relocation_options() {
        for flag in ["--best-dir", "--duplicate-dir", "--record", "--journal"] {
            assert!(Cli::try_parse_from(["dupecull", "scan", flag, "x"]).is_err());
        }
        assert!(Cli::try_parse_from(["dupecull", "scan", "--copy-fallback"]).is_err());

        let (action, settings) = resolve(&["dupecull", "scan", "-i", "photos", "--json"]);
        assert!(matches!(action, Action::Scan { json: true }));
        assert_eq!(settings.input_dir, PathBuf::from("photos"));
    }

    #[test]
    fn test_restore_uses_given_journal() {
        let (action, settings) = resolve(&["dupecull", "restore", "--journal", "old.jsonl"]);

        assert!(matches!(action, Action::Restore));
        assert_eq!(settings.journal_file, PathBuf::from("old.jsonl"));
    }
}
