//! The per-run state machine.
//!
//! ```text
//! Idle -> Selecting -> [Loaded -> Rewritten -> (Dry | Written) -> Recorded
//!                       | Failed] -> Summarized
//! ```
//!
//! Files are processed one at a time in selection order. Each file is read,
//! rewritten, and handed to the [`PersistenceGate`] before the next file is
//! read. A failure on one file is recorded and the run moves on; nothing in
//! here aborts the run once selection has started.

use crate::persist::PersistenceGate;
use crate::report::{ChangeTracker, FileChangeRecord, Mode, Reporter, RunReport};
use crate::rewriter::{self, SkipReason};
use crate::rules::RuleSet;
use crate::selector::SelectError;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Knobs for one run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Re-apply the rules to each rewritten file and warn when the second
    /// pass still changes it.
    pub check_idempotence: bool,
}

/// What happened to a single file.
#[derive(Debug)]
enum FileState {
    Skipped(SkipReason),
    Failed(String),
    Rewritten(Option<FileChangeRecord>),
}

/// Processes every selected file and returns the run's records and summary.
///
/// Dry-run is a property of `gate`. The summary is printed through
/// `reporter` before returning.
pub fn run<I, W>(
    files: I,
    rules: &RuleSet,
    gate: &PersistenceGate<'_>,
    reporter: &mut Reporter<W>,
    options: RunOptions,
) -> RunReport
where
    I: IntoIterator<Item = Result<PathBuf, SelectError>>,
    W: Write,
{
    let mut tracker = ChangeTracker::new(Mode::from_dry_run(gate.is_dry_run()));

    for item in files {
        let path = match item {
            Ok(path) => path,
            Err(err) => {
                reporter.warning(&err.to_string());
                tracker.record_warning(err.to_string());
                continue;
            }
        };

        match process_file(&path, rules, gate, reporter, options) {
            FileState::Skipped(reason) => {
                reporter.skipped(&path, reason);
                tracker.record_skipped();
            }
            FileState::Failed(error) => {
                reporter.failed(&path, &error);
                tracker.record_failure(&path, error);
            }
            FileState::Rewritten(record) => tracker.record_processed(record),
        }
        reporter.progress(tracker.summary().files_scanned);
    }

    let report = tracker.finish();
    reporter.summary(&report.summary);
    report
}

fn process_file<W: Write>(
    path: &Path,
    rules: &RuleSet,
    gate: &PersistenceGate<'_>,
    reporter: &mut Reporter<W>,
    options: RunOptions,
) -> FileState {
    let bytes = match gate.store().read(path) {
        Ok(bytes) => bytes,
        Err(err) => return FileState::Failed(format!("read failed: {}", err)),
    };
    let original = match rewriter::decode(&bytes) {
        Ok(text) => text,
        Err(reason) => return FileState::Skipped(reason),
    };

    let rewrite = rewriter::apply(original, rules);

    if options.check_idempotence && rewrite.changed() {
        let offenders = rewriter::check_idempotent(&rewrite.text, rules);
        if !offenders.is_empty() {
            reporter.not_idempotent(path, &offenders);
        }
    }

    let modifications = rewrite.modifications();
    let outcome = gate.write(path, original, &rewrite.text, modifications);
    reporter.file(path, &rewrite.outcomes, &outcome);

    if !rewrite.changed() {
        return FileState::Rewritten(None);
    }
    FileState::Rewritten(Some(FileChangeRecord {
        path: path.to_path_buf(),
        original_text: original.to_string(),
        was_written: outcome.was_written(),
        rules_fired: rewrite.fired().cloned().collect(),
        modification_count: modifications,
        rewritten_text: rewrite.text,
        outcome,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::{Confirm, FileStore, WriteOutcome};
    use crate::report::Verbosity;
    use crate::rules::Rule;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::io;

    /// In-memory store with per-path read failures.
    #[derive(Default)]
    struct MemStore {
        files: RefCell<BTreeMap<PathBuf, Vec<u8>>>,
        unreadable: Vec<PathBuf>,
        writes: RefCell<usize>,
    }

    impl MemStore {
        fn with(files: &[(&str, &str)]) -> Self {
            let store = MemStore::default();
            for (path, text) in files {
                store
                    .files
                    .borrow_mut()
                    .insert(PathBuf::from(path), text.as_bytes().to_vec());
            }
            store
        }

        fn text(&self, path: &str) -> String {
            String::from_utf8(self.files.borrow()[Path::new(path)].clone()).unwrap()
        }
    }

    impl FileStore for MemStore {
        fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
            if self.unreadable.iter().any(|p| p == path) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"));
            }
            self.files
                .borrow()
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "not found"))
        }

        fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
            *self.writes.borrow_mut() += 1;
            self.files
                .borrow_mut()
                .insert(path.to_path_buf(), contents.as_bytes().to_vec());
            Ok(())
        }
    }

    fn rules() -> RuleSet {
        RuleSet::new(vec![Rule::literal("fire", r"\bfire\b", "Fire", "capitalize fire").unwrap()])
            .unwrap()
    }

    fn paths(names: &[&str]) -> Vec<Result<PathBuf, SelectError>> {
        names.iter().map(|n| Ok(PathBuf::from(n))).collect()
    }

    fn quiet() -> Reporter<Vec<u8>> {
        Reporter::new(Vec::new(), Verbosity::Terse)
    }

    #[test]
    fn live_run_writes_changed_files_only() {
        let store = MemStore::with(&[("a.ts", "fire"), ("b.ts", "water")]);
        let gate = PersistenceGate::new(&store, false);
        let report = run(paths(&["a.ts", "b.ts"]), &rules(), &gate, &mut quiet(), RunOptions::default());
        assert_eq!(store.text("a.ts"), "Fire");
        assert_eq!(*store.writes.borrow(), 1);
        assert_eq!(report.summary.files_scanned, 2);
        assert_eq!(report.summary.files_modified, 1);
        assert_eq!(report.summary.files_written, 1);
        assert_eq!(report.summary.total_modifications, 1);
    }

    #[test]
    fn dry_run_reports_without_writing() {
        let store = MemStore::with(&[("a.ts", "fire and fire")]);
        let gate = PersistenceGate::new(&store, true);
        let report = run(paths(&["a.ts"]), &rules(), &gate, &mut quiet(), RunOptions::default());
        assert_eq!(*store.writes.borrow(), 0);
        assert_eq!(store.text("a.ts"), "fire and fire");
        let record = report.record(Path::new("a.ts")).unwrap();
        assert_eq!(record.rewritten_text, "Fire and Fire");
        assert_eq!(record.outcome, WriteOutcome::WouldWrite);
        assert!(!record.was_written);
        assert_eq!(report.summary.mode, Mode::DryRun);
    }

    #[test]
    fn unreadable_file_does_not_stop_the_run() {
        let mut store = MemStore::with(&[("a.ts", "fire"), ("b.ts", "fire"), ("c.ts", "fire")]);
        store.unreadable.push(PathBuf::from("b.ts"));
        let gate = PersistenceGate::new(&store, false);
        let report = run(paths(&["a.ts", "b.ts", "c.ts"]), &rules(), &gate, &mut quiet(), RunOptions::default());
        assert_eq!(store.text("a.ts"), "Fire");
        assert_eq!(store.text("c.ts"), "Fire");
        assert_eq!(report.summary.files_failed, 1);
        assert_eq!(report.summary.failures[0].path, PathBuf::from("b.ts"));
        assert_eq!(report.summary.files_modified, 2);
    }

    struct Refuse;

    impl Confirm for Refuse {
        fn confirm(&self, _path: &Path, _modifications: usize) -> bool {
            false
        }
    }

    #[test]
    fn declined_files_are_not_reported_as_modified() {
        let store = MemStore::with(&[("a.ts", "fire fire")]);
        let gate = PersistenceGate::new(&store, false).with_confirm(&Refuse);
        let report = run(paths(&["a.ts"]), &rules(), &gate, &mut quiet(), RunOptions::default());
        assert_eq!(store.text("a.ts"), "fire fire");
        assert_eq!(*store.writes.borrow(), 0);
        assert_eq!(report.summary.files_modified, 0);
        assert_eq!(report.summary.files_declined, 1);
        assert_eq!(report.summary.total_modifications, 0);
        assert_eq!(report.records[0].outcome, WriteOutcome::Declined);
    }

    #[test]
    fn binary_and_empty_files_are_skipped() {
        let store = MemStore::with(&[("bin.js", "fire\0"), ("empty.ts", "")]);
        let gate = PersistenceGate::new(&store, false);
        let report = run(paths(&["bin.js", "empty.ts"]), &rules(), &gate, &mut quiet(), RunOptions::default());
        assert_eq!(*store.writes.borrow(), 0);
        assert_eq!(report.summary.files_skipped, 2);
        assert_eq!(report.summary.files_modified, 0);
        assert!(report.records.is_empty());
    }

    #[test]
    fn selection_errors_become_warnings() {
        let store = MemStore::with(&[("a.ts", "fire")]);
        let gate = PersistenceGate::new(&store, true);
        let items = vec![
            Err(SelectError::MissingRoot(PathBuf::from("gone"))),
            Ok(PathBuf::from("a.ts")),
        ];
        let report = run(items, &rules(), &gate, &mut quiet(), RunOptions::default());
        assert_eq!(report.summary.files_scanned, 1);
        assert_eq!(report.summary.warnings.len(), 1);
        assert!(report.summary.warnings[0].contains("gone"));
    }

    #[test]
    fn idempotence_check_warns_about_growing_rules() {
        let store = MemStore::with(&[("a.ts", "a")]);
        let gate = PersistenceGate::new(&store, true);
        let growing = RuleSet::new(vec![Rule::literal("grow", "a", "aa", "").unwrap()]).unwrap();
        let mut reporter = quiet();
        colored::control::set_override(false);
        run(
            paths(&["a.ts"]),
            &growing,
            &gate,
            &mut reporter,
            RunOptions { check_idempotence: true },
        );
        let out = String::from_utf8(reporter.into_inner()).unwrap();
        assert!(out.contains("rules still change text on a second pass: grow"));
    }

    #[test]
    fn summary_is_printed_even_when_everything_fails() {
        let store = MemStore::default();
        let gate = PersistenceGate::new(&store, false);
        let mut reporter = quiet();
        colored::control::set_override(false);
        let report = run(paths(&["missing.ts"]), &rules(), &gate, &mut reporter, RunOptions::default());
        assert_eq!(report.summary.files_failed, 1);
        let out = String::from_utf8(reporter.into_inner()).unwrap();
        assert!(out.contains("Summary (live): 1 scanned, 0 modified, 0 skipped, 1 failed"));
    }
}
