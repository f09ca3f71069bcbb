use std::fs;
use std::path::Path;

use dupecull::core::fingerprint::FingerprintError;
use dupecull::core::journal;
use dupecull::core::relocate::DIVIDER;
use dupecull::{
    Error, FailurePolicy, Fingerprint, FingerprintProvider, Fingerprinted, PerceptualHasher,
    Pipeline, Settings,
};
use image::{Rgb, RgbImage};
use tempfile::TempDir;

/// Reads `<fingerprint>:<padding>` files; the size is the real file length.
struct PrefixProvider;

impl FingerprintProvider for PrefixProvider {
    fn fingerprint(&self, path: &Path) -> Result<Fingerprinted, FingerprintError> {
        let text = fs::read_to_string(path).map_err(|source| FingerprintError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let prefix = text.split(':').next().unwrap_or_default();
        Ok(Fingerprinted {
            fingerprint: Fingerprint::from(prefix),
            size: text.len() as u64,
            width: 0,
            height: 0,
        })
    }
}

fn settings_in(root: &Path) -> Settings {
    Settings {
        input_dir: root.join("input"),
        best_dir: root.join("Best"),
        duplicate_dir: root.join("Duplicate"),
        record_file: root.join("record.txt"),
        log_file: root.join("activity.log"),
        journal_file: root.join("moves.jsonl"),
        ..Settings::default()
    }
}

fn write_inputs(settings: &Settings, files: &[(&str, &str)]) {
    fs::create_dir_all(&settings.input_dir).unwrap();
    for (name, content) in files {
        fs::write(settings.input_dir.join(name), content).unwrap();
    }
}

#[test]
fn run_keeps_largest_and_records_survivor() {
    let temp = TempDir::new().unwrap();
    let settings = settings_in(temp.path());
    let large = format!("f1:{}", "x".repeat(47));
    let medium = format!("f1:{}", "x".repeat(27));
    write_inputs(
        &settings,
        &[
            ("a.jpg", "f1:1234567"),
            ("b.jpg", large.as_str()),
            ("c.jpg", medium.as_str()),
            ("notes.txt", "f1:ignored"),
        ],
    );

    let report = Pipeline::new(&settings, &PrefixProvider)
        .run(|_, _| {})
        .unwrap();

    assert_eq!(report.kept, vec!["b.jpg"]);
    assert!(settings.best_dir.join("b.jpg").exists());
    assert!(settings.duplicate_dir.join("a.jpg").exists());
    assert!(settings.duplicate_dir.join("c.jpg").exists());
    assert!(settings.input_dir.join("notes.txt").exists());

    let record = fs::read_to_string(&settings.record_file).unwrap();
    let expected = format!(
        "Best Image:\nb.jpg\n{}\n\nDuplicate Image:\n\
         a.jpg (Duplicate of b.jpg)\n\
         c.jpg (Duplicate of b.jpg)\n",
        DIVIDER
    );
    assert_eq!(record, expected);

    assert_eq!(journal::load(&settings.journal_file).unwrap().len(), 3);
}

#[test]
fn record_file_is_appended() {
    let temp = TempDir::new().unwrap();
    let settings = settings_in(temp.path());
    fs::write(&settings.record_file, "previous run\n").unwrap();
    write_inputs(&settings, &[("a.png", "f1:a")]);

    Pipeline::new(&settings, &PrefixProvider)
        .run(|_, _| {})
        .unwrap();

    let record = fs::read_to_string(&settings.record_file).unwrap();
    assert!(record.starts_with("previous run\nBest Image:\na.png\n"));
}

#[test]
fn missing_input_directory_is_fatal() {
    let temp = TempDir::new().unwrap();
    let settings = settings_in(temp.path());

    let result = Pipeline::new(&settings, &PrefixProvider).run(|_, _| {});

    assert!(matches!(result, Err(Error::Catalog(_))));
    assert!(!settings.best_dir.exists());
}

#[test]
fn undecodable_image_aborts_before_any_move() {
    let temp = TempDir::new().unwrap();
    let settings = settings_in(temp.path());
    write_inputs(&settings, &[("a.png", "not really a png"), ("b.png", "nor this")]);

    let result = Pipeline::new(&settings, &PerceptualHasher::new()).run(|_, _| {});

    assert!(matches!(result, Err(Error::Fingerprint(_))));
    assert!(settings.input_dir.join("a.png").exists());
    assert!(!settings.best_dir.exists());
    assert!(!settings.record_file.exists());
}

#[test]
fn keep_going_leaves_unreadable_images_behind() {
    let temp = TempDir::new().unwrap();
    let mut settings = settings_in(temp.path());
    settings.failure_policy = FailurePolicy::SkipAndReport;
    write_inputs(&settings, &[("bad.png", "garbage")]);

    let img = RgbImage::from_fn(32, 32, |x, y| Rgb([(x * 8) as u8, (y * 8) as u8, 0]));
    img.save(settings.input_dir.join("good.png")).unwrap();
    fs::copy(
        settings.input_dir.join("good.png"),
        settings.input_dir.join("good_copy.png"),
    )
    .unwrap();

    let report = Pipeline::new(&settings, &PerceptualHasher::new())
        .run(|_, _| {})
        .unwrap();

    // Same bytes, same size: the first name in listing order is kept.
    assert_eq!(report.kept, vec!["good.png"]);
    assert_eq!(
        report.duplicates,
        vec![("good_copy.png".to_string(), "good.png".to_string())]
    );
    assert_eq!(report.skipped.len(), 1);
    assert!(settings.input_dir.join("bad.png").exists());

    let record = fs::read_to_string(&settings.record_file).unwrap();
    assert!(record.contains("Skipped Image:\nbad.png ("));
}

#[test]
fn relocating_a_stale_partition_fails() {
    let temp = TempDir::new().unwrap();
    let settings = settings_in(temp.path());
    write_inputs(&settings, &[("a.jpg", "f1:a"), ("b.jpg", "f2:b")]);

    let pipeline = Pipeline::new(&settings, &PrefixProvider);
    let first = pipeline.partition(pipeline.catalog().unwrap(), |_, _| {}).unwrap();
    let stale = pipeline.partition(pipeline.catalog().unwrap(), |_, _| {}).unwrap();

    pipeline.relocate(first).unwrap();
    let result = pipeline.relocate(stale);

    assert!(matches!(result, Err(Error::Relocation(_))));
}

#[test]
fn restore_undoes_a_run() {
    let temp = TempDir::new().unwrap();
    let settings = settings_in(temp.path());
    write_inputs(&settings, &[("a.jpg", "f1:aa"), ("b.jpg", "f1:b")]);

    Pipeline::new(&settings, &PrefixProvider)
        .run(|_, _| {})
        .unwrap();
    assert!(!settings.input_dir.join("a.jpg").exists());

    let summary = journal::restore(&settings.journal_file).unwrap();

    assert_eq!(summary.restored.len(), 2);
    assert_eq!(fs::read_to_string(settings.input_dir.join("a.jpg")).unwrap(), "f1:aa");
    assert_eq!(fs::read_to_string(settings.input_dir.join("b.jpg")).unwrap(), "f1:b");
    assert!(journal::load(&settings.journal_file).unwrap().is_empty());
}
