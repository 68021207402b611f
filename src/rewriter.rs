//! Rule application for a single file's text.
//!
//! Rules run as a pipeline: each rule is matched against the output of the
//! previous one, never against the original text. For every rule the matches
//! are counted on the pre-rule text, then all of them are substituted in one
//! left-to-right pass. Occurrences whose replacement equals the matched text
//! are counted as matches but not as modifications, which is what makes a
//! second application of an idempotent rule set report zero changes.

use crate::rules::{Rule, RuleSet};
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;

/// Per-rule counters for one application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleOutcome {
    pub rule_id: String,
    pub description: String,
    /// Non-overlapping occurrences in the text this rule received.
    pub matches: usize,
    /// Occurrences whose replacement differed from the matched text.
    pub modifications: usize,
    /// Occurrences left untouched because no replacement could be computed.
    pub skipped: usize,
}

impl RuleOutcome {
    pub fn fired(&self) -> bool {
        self.matches > 0
    }
}

/// Result of applying a rule set to one text.
#[derive(Debug, Clone)]
pub struct Rewrite {
    pub text: String,
    pub outcomes: Vec<RuleOutcome>,
    changed: bool,
}

impl Rewrite {
    /// Whether the final text differs from the input.
    pub fn changed(&self) -> bool {
        self.changed
    }

    /// Total modifications across all rules.
    pub fn modifications(&self) -> usize {
        self.outcomes.iter().map(|o| o.modifications).sum()
    }

    /// Outcomes of rules that matched at least once.
    pub fn fired(&self) -> impl Iterator<Item = &RuleOutcome> {
        self.outcomes.iter().filter(|o| o.fired())
    }
}

/// Why a file's content was not rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Empty,
    Binary,
    NotUtf8,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::Empty => "empty file",
            SkipReason::Binary => "binary content (NUL byte)",
            SkipReason::NotUtf8 => "not valid UTF-8",
        };
        f.write_str(reason)
    }
}

/// Decodes file content, refusing empty, binary, and non-UTF-8 input.
pub fn decode(bytes: &[u8]) -> Result<&str, SkipReason> {
    if bytes.is_empty() {
        return Err(SkipReason::Empty);
    }
    if bytes.contains(&0) {
        return Err(SkipReason::Binary);
    }
    std::str::from_utf8(bytes).map_err(|_| SkipReason::NotUtf8)
}

/// Applies `rules` in order to `text`.
pub fn apply(text: &str, rules: &RuleSet) -> Rewrite {
    let mut current: Cow<'_, str> = Cow::Borrowed(text);
    let mut outcomes = Vec::with_capacity(rules.len());

    for rule in rules {
        let (next, outcome) = apply_rule(&current, rule);
        if let Cow::Owned(rewritten) = next {
            current = Cow::Owned(rewritten);
        }
        outcomes.push(outcome);
    }

    let changed = current != text;
    Rewrite {
        text: current.into_owned(),
        outcomes,
        changed,
    }
}

/// Applies `rules` to raw file content after the binary/empty guard.
pub fn rewrite_bytes(bytes: &[u8], rules: &RuleSet) -> Result<Rewrite, SkipReason> {
    decode(bytes).map(|text| apply(text, rules))
}

/// Runs one rule over `text`, substituting every occurrence.
///
/// Returns `Cow::Borrowed` when nothing was modified.
fn apply_rule<'t>(text: &'t str, rule: &Rule) -> (Cow<'t, str>, RuleOutcome) {
    let mut outcome = RuleOutcome {
        rule_id: rule.id().to_string(),
        description: rule.description().to_string(),
        matches: 0,
        modifications: 0,
        skipped: 0,
    };
    let mut out = String::new();
    let mut last = 0;

    for caps in rule.pattern().captures_iter(text) {
        let Some(whole) = caps.get(0).filter(|m| !m.is_empty()) else {
            continue;
        };
        outcome.matches += 1;
        match rule.replacement().render(&caps, text) {
            Some(replacement) if replacement != whole.as_str() => {
                out.push_str(&text[last..whole.start()]);
                out.push_str(&replacement);
                last = whole.end();
                outcome.modifications += 1;
            }
            Some(_) => {}
            None => outcome.skipped += 1,
        }
    }

    if outcome.modifications == 0 {
        return (Cow::Borrowed(text), outcome);
    }
    out.push_str(&text[last..]);
    (Cow::Owned(out), outcome)
}

/// Ids of rules that still modify `text` after one full application.
///
/// An empty result means `apply(apply(text)) == apply(text)`.
pub fn check_idempotent(text: &str, rules: &RuleSet) -> Vec<String> {
    let once = apply(text, rules);
    let twice = apply(&once.text, rules);
    twice
        .outcomes
        .into_iter()
        .filter(|o| o.modifications > 0)
        .map(|o| o.rule_id)
        .collect()
}
