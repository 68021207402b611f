//! Command-line interface definitions.
//!
//! Defines the argument parser and subcommands using clap's derive API.
//! Each subcommand corresponds to a distinct operation: rewriting files,
//! listing the files a run would touch, inspecting the rule catalog, or
//! running the type-check verification on its own.

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// Batch regex rewriting of TypeScript/JavaScript sources.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command that walks the source tree.
#[derive(Debug, Clone, Default, ClapArgs)]
pub struct SelectArgs {
    /// Rule catalog and selection settings (JSON). Defaults to the built-in catalog.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Root directories to walk. Overrides the configured roots.
    #[arg(short, long)]
    pub paths: Option<Vec<PathBuf>>,

    /// Files to process before the walk, in the given order.
    #[arg(long)]
    pub priority: Vec<PathBuf>,

    /// Glob patterns for directories/files to exclude (e.g., "*.d.ts", "legacy").
    /// By default, hidden entries and node_modules, dist, build and similar are excluded.
    #[arg(short, long)]
    pub exclude: Vec<String>,

    /// Disable the default exclusions.
    #[arg(long)]
    pub no_default_excludes: bool,

    /// File extensions to include. Overrides the configured extensions.
    #[arg(long = "ext")]
    pub extensions: Vec<String>,

    /// Maximum directory depth below each root.
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Follow symbolic links while walking.
    #[arg(long)]
    pub follow_links: bool,
}

/// Flags of the `apply` command.
#[derive(Debug, Clone, ClapArgs)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub select: SelectArgs,

    /// Report what would change without writing anything.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Interactively confirm each file's changes before writing.
    #[arg(short, long, conflicts_with = "dry_run")]
    pub interactive: bool,

    /// Print every rule firing and periodic progress.
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit the run report as JSON on stdout. Progress goes to stderr.
    #[arg(long)]
    pub json: bool,

    /// Warn about files a second pass of the rules would still change.
    #[arg(long)]
    pub check_idempotence: bool,

    /// Run the configured type check after rewriting.
    #[arg(long)]
    pub verify: bool,

    /// Also run the type check before rewriting, for comparison.
    #[arg(long, requires = "verify")]
    pub baseline: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Apply the rule catalog to every selected file.
    Apply(ApplyArgs),

    /// List files that would be processed without reading them.
    Scan {
        #[command(flatten)]
        select: SelectArgs,
    },

    /// Print the rule catalog in application order.
    Rules {
        /// Rule catalog (JSON). Defaults to the built-in catalog.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Check each given file for idempotence instead of listing rules.
        #[arg(long)]
        check: Vec<PathBuf>,
    },

    /// Run the configured type check and report whether the signature remains.
    Verify {
        /// Configuration holding the verify command. Defaults to the built-in one.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Error signature to look for. Overrides the configured signature.
        #[arg(long)]
        signature: Option<String>,
    },
}
