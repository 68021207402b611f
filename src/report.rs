//! Change tracking and console reporting for a run.
//!
//! [`ChangeTracker`] accumulates one [`FileChangeRecord`] per modified file
//! and the counters of the [`RunSummary`]. [`Reporter`] renders progress and
//! the final summary into any writer: stdout for the CLI, a buffer in tests.

use crate::persist::WriteOutcome;
use crate::rewriter::{RuleOutcome, SkipReason};
use crate::verify::Verification;
use colored::Colorize;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Whether writes were suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    DryRun,
    Live,
}

impl Mode {
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run { Mode::DryRun } else { Mode::Live }
    }
}

/// A file whose rewritten text differs from its original.
#[derive(Debug, Clone, Serialize)]
pub struct FileChangeRecord {
    pub path: PathBuf,
    #[serde(skip)]
    pub original_text: String,
    #[serde(skip)]
    pub rewritten_text: String,
    pub modification_count: usize,
    pub was_written: bool,
    pub outcome: WriteOutcome,
    pub rules_fired: Vec<RuleOutcome>,
}

/// A file that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Counters for one invocation.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub mode: Mode,
    pub files_scanned: usize,
    /// Files whose content changed (or would change, in dry-run).
    pub files_modified: usize,
    pub files_written: usize,
    /// Files whose write was declined at the interactive prompt.
    pub files_declined: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub total_modifications: usize,
    pub failures: Vec<FileFailure>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<Verification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
}

impl RunSummary {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            files_scanned: 0,
            files_modified: 0,
            files_written: 0,
            files_declined: 0,
            files_skipped: 0,
            files_failed: 0,
            total_modifications: 0,
            failures: Vec::new(),
            warnings: Vec::new(),
            baseline: None,
            verification: None,
        }
    }
}

/// Records and summary produced by a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub summary: RunSummary,
    pub records: Vec<FileChangeRecord>,
}

impl RunReport {
    pub fn record(&self, path: &Path) -> Option<&FileChangeRecord> {
        self.records.iter().find(|r| r.path == path)
    }
}

/// Accumulates per-file results into a [`RunReport`].
#[derive(Debug)]
pub struct ChangeTracker {
    summary: RunSummary,
    records: Vec<FileChangeRecord>,
}

impl ChangeTracker {
    pub fn new(mode: Mode) -> Self {
        Self {
            summary: RunSummary::new(mode),
            records: Vec::new(),
        }
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Counts a file that was loaded and rewritten, changed or not.
    pub fn record_processed(&mut self, record: Option<FileChangeRecord>) {
        self.summary.files_scanned += 1;
        let Some(record) = record else {
            return;
        };
        if let WriteOutcome::Failed(error) = &record.outcome {
            self.summary.files_failed += 1;
            self.summary.failures.push(FileFailure {
                path: record.path.clone(),
                error: error.clone(),
            });
        } else if record.outcome == WriteOutcome::Declined {
            self.summary.files_declined += 1;
        } else {
            self.summary.files_modified += 1;
            self.summary.total_modifications += record.modification_count;
            if record.was_written {
                self.summary.files_written += 1;
            }
        }
        self.records.push(record);
    }

    pub fn record_skipped(&mut self) {
        self.summary.files_scanned += 1;
        self.summary.files_skipped += 1;
    }

    pub fn record_failure(&mut self, path: &Path, error: String) {
        self.summary.files_scanned += 1;
        self.summary.files_failed += 1;
        self.summary.failures.push(FileFailure {
            path: path.to_path_buf(),
            error,
        });
    }

    pub fn record_warning(&mut self, warning: String) {
        self.summary.warnings.push(warning);
    }

    pub fn finish(self) -> RunReport {
        RunReport {
            summary: self.summary,
            records: self.records,
        }
    }
}

/// How much per-file detail to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Per-file totals only.
    Terse,
    /// Every rule firing with its counts.
    Verbose,
}

/// Emit a progress line every this many files in verbose mode.
const PROGRESS_EVERY: usize = 50;

/// Console renderer. Write errors on the sink are ignored.
pub struct Reporter<W: Write> {
    out: W,
    verbosity: Verbosity,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, verbosity: Verbosity) -> Self {
        Self { out, verbosity }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn verbose(&self) -> bool {
        self.verbosity == Verbosity::Verbose
    }

    pub fn progress(&mut self, scanned: usize) {
        if self.verbose() && scanned > 0 && scanned % PROGRESS_EVERY == 0 {
            let _ = writeln!(self.out, "{} {} files scanned", "info:".blue().bold(), scanned);
        }
    }

    /// Reports a rewritten file, changed or not.
    pub fn file(&mut self, path: &Path, outcomes: &[RuleOutcome], outcome: &WriteOutcome) {
        let modifications: usize = outcomes.iter().map(|o| o.modifications).sum();
        let label = match outcome {
            WriteOutcome::Unchanged => {
                if !self.verbose() || !outcomes.iter().any(RuleOutcome::fired) {
                    return;
                }
                "Unchanged:".dimmed()
            }
            WriteOutcome::WouldWrite => "Would update:".yellow().bold(),
            WriteOutcome::Written => "Updated:".green().bold(),
            WriteOutcome::Declined => "Declined:".cyan().bold(),
            WriteOutcome::Failed(_) => "Failed:".red().bold(),
        };
        let _ = writeln!(
            self.out,
            "{} {} ({} modification{})",
            label,
            path.display(),
            modifications,
            if modifications == 1 { "" } else { "s" }
        );
        if let WriteOutcome::Failed(error) = outcome {
            let _ = writeln!(self.out, "  {} {}", "error:".red().bold(), error);
        }
        if self.verbose() {
            for rule in outcomes.iter().filter(|o| o.fired()) {
                let skipped = if rule.skipped > 0 {
                    format!(", {} skipped", rule.skipped)
                } else {
                    String::new()
                };
                let _ = writeln!(
                    self.out,
                    "  {} {} match(es), {} modified{} - {}",
                    rule.rule_id.bold(),
                    rule.matches,
                    rule.modifications,
                    skipped,
                    rule.description.dimmed()
                );
            }
        }
    }

    pub fn skipped(&mut self, path: &Path, reason: SkipReason) {
        if self.verbose() {
            let _ = writeln!(self.out, "{} {} ({})", "Skipped:".dimmed(), path.display(), reason);
        }
    }

    pub fn failed(&mut self, path: &Path, error: &str) {
        let _ = writeln!(self.out, "{} {}: {}", "error:".red().bold(), path.display(), error);
    }

    pub fn info(&mut self, message: &str) {
        let _ = writeln!(self.out, "{} {}", "info:".blue().bold(), message);
    }

    pub fn warning(&mut self, message: &str) {
        let _ = writeln!(self.out, "{} {}", "warn:".yellow().bold(), message);
    }

    pub fn not_idempotent(&mut self, path: &Path, rule_ids: &[String]) {
        self.warning(&format!(
            "{}: rules still change text on a second pass: {}",
            path.display(),
            rule_ids.join(", ")
        ));
    }

    pub fn verification(&mut self, stage: &str, result: &Verification) {
        let _ = writeln!(self.out, "{} {}: {}", "verify:".cyan().bold(), stage, result);
    }

    /// Prints the final summary. Always called, even when files failed.
    pub fn summary(&mut self, summary: &RunSummary) {
        let mode = match summary.mode {
            Mode::DryRun => "dry run",
            Mode::Live => "live",
        };
        let _ = writeln!(
            self.out,
            "\n{} ({}): {} scanned, {} modified, {} skipped, {} failed, {} modification(s)",
            "Summary".bold(),
            mode,
            summary.files_scanned,
            summary.files_modified,
            summary.files_skipped,
            summary.files_failed,
            summary.total_modifications
        );
        if summary.files_declined > 0 {
            let _ = writeln!(
                self.out,
                "  {} {} file(s) left unchanged at the prompt",
                "declined:".cyan().bold(),
                summary.files_declined
            );
        }
        for failure in &summary.failures {
            let _ = writeln!(
                self.out,
                "  {} {}: {}",
                "failed:".red().bold(),
                failure.path.display(),
                failure.error
            );
        }
        if let Some(baseline) = &summary.baseline {
            self.verification("before", baseline);
        }
        if let Some(verification) = &summary.verification {
            self.verification("after", verification);
        }
        if summary.mode == Mode::DryRun && summary.files_modified > 0 {
            let _ = writeln!(
                self.out,
                "{} Run without --dry-run to apply changes",
                "hint:".cyan().bold()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(id: &str, matches: usize, modifications: usize) -> RuleOutcome {
        RuleOutcome {
            rule_id: id.to_string(),
            description: format!("{id} rule"),
            matches,
            modifications,
            skipped: 0,
        }
    }

    fn record(path: &str, count: usize, outcome: WriteOutcome) -> FileChangeRecord {
        FileChangeRecord {
            path: PathBuf::from(path),
            original_text: "a".to_string(),
            rewritten_text: "b".to_string(),
            modification_count: count,
            was_written: outcome.was_written(),
            outcome,
            rules_fired: Vec::new(),
        }
    }

    fn render(verbosity: Verbosity, f: impl FnOnce(&mut Reporter<Vec<u8>>)) -> String {
        colored::control::set_override(false);
        let mut reporter = Reporter::new(Vec::new(), verbosity);
        f(&mut reporter);
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    #[test]
    fn tracker_accumulates_counts() {
        let mut tracker = ChangeTracker::new(Mode::Live);
        tracker.record_processed(Some(record("a.ts", 3, WriteOutcome::Written)));
        tracker.record_processed(None);
        tracker.record_skipped();
        tracker.record_failure(Path::new("c.ts"), "permission denied".to_string());
        tracker.record_processed(Some(record("d.ts", 2, WriteOutcome::Failed("disk full".into()))));
        let report = tracker.finish();
        let s = &report.summary;
        assert_eq!(s.files_scanned, 5);
        assert_eq!(s.files_modified, 1);
        assert_eq!(s.files_written, 1);
        assert_eq!(s.files_skipped, 1);
        assert_eq!(s.files_failed, 2);
        assert_eq!(s.total_modifications, 3);
        assert_eq!(s.failures.len(), 2);
        assert!(report.record(Path::new("a.ts")).is_some());
    }

    #[test]
    fn declined_writes_are_not_counted_as_modified() {
        let mut tracker = ChangeTracker::new(Mode::Live);
        tracker.record_processed(Some(record("a.ts", 3, WriteOutcome::Written)));
        tracker.record_processed(Some(record("b.ts", 5, WriteOutcome::Declined)));
        let report = tracker.finish();
        let s = &report.summary;
        assert_eq!(s.files_scanned, 2);
        assert_eq!(s.files_modified, 1);
        assert_eq!(s.files_declined, 1);
        assert_eq!(s.total_modifications, 3);
        assert_eq!(report.records.len(), 2);

        let out = render(Verbosity::Terse, |r| r.summary(s));
        insta::assert_snapshot!(out.trim_start(), @r"
        Summary (live): 2 scanned, 1 modified, 0 skipped, 0 failed, 3 modification(s)
          declined: 1 file(s) left unchanged at the prompt
        ");
    }

    #[test]
    fn terse_mode_prints_file_totals_only() {
        let outcomes = vec![outcome("element-keys", 2, 1), outcome("planets", 0, 0)];
        let out = render(Verbosity::Terse, |r| {
            r.file(Path::new("src/a.ts"), &outcomes, &WriteOutcome::WouldWrite);
            r.file(Path::new("src/b.ts"), &outcomes, &WriteOutcome::Unchanged);
        });
        insta::assert_snapshot!(out, @"Would update: src/a.ts (1 modification)");
    }

    #[test]
    fn verbose_mode_lists_rule_firings() {
        let outcomes = vec![outcome("element-keys", 2, 1), outcome("planets", 0, 0)];
        let out = render(Verbosity::Verbose, |r| {
            r.file(Path::new("src/a.ts"), &outcomes, &WriteOutcome::Written);
        });
        insta::assert_snapshot!(out, @r"
        Updated: src/a.ts (1 modification)
          element-keys 2 match(es), 1 modified - element-keys rule
        ");
    }

    #[test]
    fn verbose_mode_reports_rules_that_matched_without_changes() {
        let outcomes = vec![outcome("element-keys", 2, 0)];
        let out = render(Verbosity::Verbose, |r| {
            r.file(Path::new("a.ts"), &outcomes, &WriteOutcome::Unchanged);
        });
        assert!(out.starts_with("Unchanged: a.ts (0 modifications)"));
        assert!(out.contains("element-keys 2 match(es), 0 modified"));
    }

    #[test]
    fn summary_lists_failures() {
        let mut summary = RunSummary::new(Mode::DryRun);
        summary.files_scanned = 3;
        summary.files_modified = 1;
        summary.files_failed = 1;
        summary.total_modifications = 4;
        summary.failures.push(FileFailure {
            path: PathBuf::from("b.ts"),
            error: "permission denied".to_string(),
        });
        let out = render(Verbosity::Terse, |r| r.summary(&summary));
        insta::assert_snapshot!(out.trim_start(), @r"
        Summary (dry run): 3 scanned, 1 modified, 0 skipped, 1 failed, 4 modification(s)
          failed: b.ts: permission denied
        hint: Run without --dry-run to apply changes
        ");
    }

    #[test]
    fn summary_includes_verification_results() {
        let mut summary = RunSummary::new(Mode::Live);
        summary.baseline = Some(Verification::Present { occurrences: 12 });
        summary.verification = Some(Verification::Absent);
        let out = render(Verbosity::Terse, |r| r.summary(&summary));
        insta::assert_snapshot!(out.trim_start(), @r"
        Summary (live): 0 scanned, 0 modified, 0 skipped, 0 failed, 0 modification(s)
        verify: before: signature present (12 occurrence(s))
        verify: after: signature not found
        ");
    }

    #[test]
    fn progress_only_in_verbose_mode() {
        let terse = render(Verbosity::Terse, |r| r.progress(50));
        assert!(terse.is_empty());
        let verbose = render(Verbosity::Verbose, |r| {
            r.progress(49);
            r.progress(50);
        });
        assert_eq!(verbose, "info: 50 files scanned\n");
    }

    #[test]
    fn summary_serializes_mode_and_counts() {
        let summary = RunSummary::new(Mode::Live);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["mode"], "live");
        assert_eq!(json["files_scanned"], 0);
        assert!(json.get("verification").is_none());
    }
}
