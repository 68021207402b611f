//! Rewrite rules and ordered rule sets.
//!
//! A [`Rule`] pairs a compiled regex with a [`Replacement`]: either a literal
//! template using `$1` / `${name}` capture references, or a computed function
//! that receives the captures (and the text they were found in) and returns
//! the replacement text. A [`RuleSet`]
//! fixes the order in which rules run; that order is part of the rewrite
//! semantics, since each rule sees the output of the ones before it.

use regex::{Captures, Regex};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Computes the replacement for one match, given the captures and the whole
/// text the rule is running over. `None` leaves the occurrence as is.
pub type ComputeFn = Arc<dyn Fn(&Captures<'_>, &str) -> Option<String> + Send + Sync>;

/// Text every pattern is tried against for zero-width matches: word and
/// non-word characters, line breaks, and the punctuation rules anchor on.
const EMPTY_MATCH_SAMPLE: &str = "a b
x1 _$.(){}[]'\"`:;,=?
";

/// How a matched occurrence is replaced.
#[derive(Clone)]
pub enum Replacement {
    /// Template expanded with the match's capture groups.
    Literal(String),
    /// Function of the match and its capture groups.
    Computed(ComputeFn),
}

impl Replacement {
    /// Produces the replacement text for one match of `haystack`.
    pub fn render(&self, caps: &Captures<'_>, haystack: &str) -> Option<String> {
        match self {
            Replacement::Literal(template) => {
                let mut out = String::new();
                caps.expand(template, &mut out);
                Some(out)
            }
            Replacement::Computed(compute) => compute(caps, haystack),
        }
    }
}

impl fmt::Debug for Replacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Replacement::Literal(template) => f.debug_tuple("Literal").field(template).finish(),
            Replacement::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Errors raised while building rules.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rule '{id}': invalid pattern: {source}")]
    InvalidPattern {
        id: String,
        #[source]
        source: regex::Error,
    },
    #[error("rule '{id}': pattern can match the empty string")]
    EmptyMatch { id: String },
    #[error("rule '{id}': rename table is empty")]
    EmptyRenameMap { id: String },
    #[error("duplicate rule id '{0}'")]
    DuplicateId(String),
}

/// A single pattern/replacement pair.
#[derive(Debug, Clone)]
pub struct Rule {
    id: String,
    pattern: Regex,
    replacement: Replacement,
    description: String,
}

impl Rule {
    /// Builds a rule whose replacement is a capture template.
    pub fn literal(id: &str, pattern: &str, template: &str, description: &str) -> Result<Self, RuleError> {
        Self::new(
            id,
            pattern,
            Replacement::Literal(template.to_string()),
            description,
        )
    }

    /// Builds a rule whose replacement is computed per match.
    pub fn computed<F>(id: &str, pattern: &str, compute: F, description: &str) -> Result<Self, RuleError>
    where
        F: Fn(&Captures<'_>, &str) -> Option<String> + Send + Sync + 'static,
    {
        Self::new(id, pattern, Replacement::Computed(Arc::new(compute)), description)
    }

    fn new(
        id: &str,
        pattern: &str,
        replacement: Replacement,
        description: &str,
    ) -> Result<Self, RuleError> {
        let pattern = Regex::new(pattern).map_err(|source| RuleError::InvalidPattern {
            id: id.to_string(),
            source,
        })?;
        // An empty match would "fire" between every pair of characters.
        if pattern.is_match("")
            || pattern
                .find_iter(EMPTY_MATCH_SAMPLE)
                .any(|m| m.is_empty())
        {
            return Err(RuleError::EmptyMatch { id: id.to_string() });
        }
        Ok(Self {
            id: id.to_string(),
            pattern,
            replacement,
            description: description.to_string(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    pub fn replacement(&self) -> &Replacement {
        &self.replacement
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether this rule's replacement is a literal template.
    pub fn is_literal(&self) -> bool {
        matches!(self.replacement, Replacement::Literal(_))
    }
}

/// An ordered, immutable list of rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Fixes the order of `rules`. Rule ids must be unique.
    pub fn new(rules: Vec<Rule>) -> Result<Self, RuleError> {
        let mut seen = std::collections::HashSet::new();
        for rule in &rules {
            if !seen.insert(rule.id.as_str()) {
                return Err(RuleError::DuplicateId(rule.id.clone()));
            }
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}
