//! Configuration file loading.
//!
//! A configuration is a JSON document holding the selection settings, the
//! rule catalog, and the verification command. Rules run in the order they
//! are listed. The default catalog lists property-key casing first, then
//! string literals, then bare-identifier renames, then literal type-error
//! patches: property scoping is the most specific context, so it must see
//! the text before the broader identifier rules touch it.
//!
//! When no file is given the catalog embedded from `config/default.json` is
//! used.

use crate::rename::{RenameContext, RenameMap};
use crate::rules::{Rule, RuleError, RuleSet};
use crate::selector::{self, Exclusions, FileSelector};
use crate::verify::{self, CommandCheck};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_CONFIG: &str = include_str!("../config/default.json");

/// Errors that prevent a run from starting.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Rule(#[from] RuleError),
    #[error("invalid exclude pattern: {0}")]
    Glob(#[from] glob::PatternError),
    #[error("verify: {0}")]
    Verify(String),
}

/// One entry of the rule catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleSpec {
    /// Normalize any casing of `tokens` to the listed spelling.
    Case {
        id: String,
        context: RenameContext,
        tokens: Vec<String>,
        #[serde(default)]
        description: String,
    },
    /// Replace exact noisy tokens with canonical ones.
    Rename {
        id: String,
        context: RenameContext,
        map: BTreeMap<String, String>,
        #[serde(default)]
        description: String,
    },
    /// Regex with a `$1` / `${name}` replacement template.
    Literal {
        id: String,
        pattern: String,
        template: String,
        #[serde(default)]
        description: String,
    },
}

impl RuleSpec {
    /// Compiles this entry into a rule.
    pub fn build(&self) -> Result<Rule, RuleError> {
        match self {
            RuleSpec::Case {
                id,
                context,
                tokens,
                description,
            } => RenameMap::casing(tokens.iter().cloned()).to_rule(id, *context, description),
            RuleSpec::Rename {
                id,
                context,
                map,
                description,
            } => RenameMap::new(map.clone()).to_rule(id, *context, description),
            RuleSpec::Literal {
                id,
                pattern,
                template,
                description,
            } => Rule::literal(id, pattern, template, description),
        }
    }
}

/// External checker invocation.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifySpec {
    /// Program followed by its arguments.
    pub command: Vec<String>,
    /// Text whose presence in the output means the targeted errors remain.
    pub signature: String,
    #[serde(default = "default_max_output")]
    pub max_output_bytes: usize,
}

fn default_max_output() -> usize {
    verify::DEFAULT_MAX_OUTPUT_BYTES
}

impl VerifySpec {
    pub fn check(&self) -> Result<CommandCheck, ConfigError> {
        CommandCheck::from_argv(&self.command)
            .map(|check| check.max_output_bytes(self.max_output_bytes))
            .map_err(|e| ConfigError::Verify(e.to_string()))
    }
}

fn default_extensions() -> Vec<String> {
    selector::DEFAULT_EXTENSIONS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_true() -> bool {
    true
}

/// Everything a run needs besides the invocation flags.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directories to walk. Empty means the current directory.
    #[serde(default)]
    pub roots: Vec<PathBuf>,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Skip hidden entries and the built-in directory list.
    #[serde(default = "default_true")]
    pub default_excludes: bool,
    /// Extra directory names to skip at any depth.
    #[serde(default)]
    pub exclude_dirs: Vec<String>,
    /// Glob patterns for files or directories to skip.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Files processed before the tree walk.
    #[serde(default)]
    pub priority: Vec<PathBuf>,
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default)]
    pub follow_links: bool,
    pub rules: Vec<RuleSpec>,
    #[serde(default)]
    pub verify: Option<VerifySpec>,
}

impl Config {
    /// Loads `path`, or the embedded default catalog when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_json(&text, &path.display().to_string())
            }
            None => Self::from_json(DEFAULT_CONFIG, "<built-in>"),
        }
    }

    pub fn from_json(text: &str, origin: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            origin: origin.to_string(),
            source,
        })
    }

    /// Compiles the catalog, preserving its order.
    pub fn rule_set(&self) -> Result<RuleSet, ConfigError> {
        let rules = self
            .rules
            .iter()
            .map(RuleSpec::build)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RuleSet::new(rules)?)
    }

    pub fn exclusions(&self) -> Result<Exclusions, ConfigError> {
        let base = if self.default_excludes {
            Exclusions::default()
        } else {
            Exclusions::none()
        };
        Ok(base
            .with_dir_names(self.exclude_dirs.iter().cloned())
            .with_globs(&self.exclude)?)
    }

    /// Builds the file selector described by this configuration.
    pub fn selector(&self) -> Result<FileSelector, ConfigError> {
        let roots = if self.roots.is_empty() {
            vec![PathBuf::from(".")]
        } else {
            self.roots.clone()
        };
        let mut selector = FileSelector::new(roots)
            .with_extensions(&self.extensions)
            .with_exclusions(self.exclusions()?)
            .with_priority(self.priority.iter().cloned())
            .follow_links(self.follow_links);
        if let Some(depth) = self.max_depth {
            selector = selector.with_max_depth(depth);
        }
        Ok(selector)
    }
}
