//! casefix library for batch regex rewriting of TypeScript/JavaScript sources.
//!
//! The workflow runs in four phases:
//!
//! 1. **Selection**: [`selector::FileSelector`] yields priority files, then
//!    every matching file under the roots, each exactly once
//! 2. **Rewriting**: [`rewriter::apply`] runs the ordered [`rules::RuleSet`]
//!    over a file's text, counting matches and modifications per rule
//! 3. **Persistence**: [`persist::PersistenceGate`] writes changed files, or
//!    only reports them in dry-run mode
//! 4. **Reporting**: [`report::ChangeTracker`] and [`report::Reporter`]
//!    collect per-file records and print the run summary
//!
//! An optional [`verify`] step runs a type checker and looks for an error
//! signature in its output.
//!
//! # Example
//!
//! ```no_run
//! use casefix::config::Config;
//! use casefix::persist::{DiskStore, PersistenceGate};
//! use casefix::pipeline::{self, RunOptions};
//! use casefix::report::{Reporter, Verbosity};
//!
//! let config = Config::load(None).unwrap();
//! let rules = config.rule_set().unwrap();
//! let selector = config.selector().unwrap();
//!
//! // Dry run: nothing is written.
//! let gate = PersistenceGate::new(&DiskStore, true);
//! let mut reporter = Reporter::new(std::io::stdout(), Verbosity::Terse);
//! let report = pipeline::run(selector.files(), &rules, &gate, &mut reporter, RunOptions::default());
//!
//! println!("{} files would change", report.summary.files_modified);
//! ```

pub mod config;
pub mod persist;
pub mod pipeline;
pub mod rename;
pub mod report;
pub mod rewriter;
pub mod rules;
pub mod selector;
pub mod verify;

// Re-export commonly used types at crate root
pub use config::{Config, ConfigError};
pub use rename::{RenameContext, RenameMap};
pub use rewriter::{Rewrite, RuleOutcome};
pub use rules::{Rule, RuleError, RuleSet};
pub use selector::FileSelector;
