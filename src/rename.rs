//! Rename tables and the context-scoped rules built from them.
//!
//! A [`RenameMap`] maps a noisy token to its canonical spelling. The same table
//! can be scoped to different source contexts, each with its own regex, so a
//! key rename in an object literal does not leak into unrelated identifiers:
//!
//! - [`RenameContext::Property`]: `key:` / `key?:` at the start of a line or
//!   right after `{` or `,` (object literals, interface members). The
//!   innermost open bracket must be `{`, so typed parameters such as
//!   `(sun: number, moon: number)` are left alone, and a line-start key
//!   must not continue a `?` from the line before (multi-line ternaries).
//! - [`RenameContext::Identifier`]: bare identifiers, including import lists
//!   and spreads. Word-boundary scoped on both sides and never after a
//!   member-access `.`, so `northnode` does not match inside
//!   `northnodeDegree` or `chart.northnode`, but does match in `...northnode`.
//! - [`RenameContext::StringLiteral`]: a quoted literal whose whole content is
//!   the token, e.g. `'fire'` in a union type or comparison.

use crate::rules::{Rule, RuleError};
use regex::Captures;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// Where a rename table applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenameContext {
    Property,
    Identifier,
    #[serde(rename = "string")]
    StringLiteral,
}

impl fmt::Display for RenameContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RenameContext::Property => "property",
            RenameContext::Identifier => "identifier",
            RenameContext::StringLiteral => "string",
        };
        f.write_str(name)
    }
}

impl RenameContext {
    /// Wraps the token alternation in this context's scoping regex.
    ///
    /// Every pattern exposes the token as the `key` group.
    fn pattern(self, alternation: &str) -> String {
        match self {
            RenameContext::Property => format!(
                r#"(?m)(?:^[ \t]*|(?P<sep>[{{,])[ \t]*)['"]?(?P<key>{alternation})['"]?[ \t]*\??[ \t]*:"#
            ),
            RenameContext::Identifier => {
                format!(r"(?:^|[^\w$.]|\.\.\.)(?P<key>{alternation})\b")
            }
            RenameContext::StringLiteral => {
                format!(r#"(?P<open>['"`])(?P<key>{alternation})(?P<close>['"`])"#)
            }
        }
    }
}

/// Noisy token to canonical token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameMap {
    entries: BTreeMap<String, String>,
    case_insensitive: bool,
}

impl RenameMap {
    /// An exact-match table.
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            case_insensitive: false,
        }
    }

    /// A casing table: any casing of a canonical token maps to the token.
    pub fn casing<I, S>(canonical: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: canonical
                .into_iter()
                .map(|token| {
                    let token = token.into();
                    (token.to_lowercase(), token)
                })
                .collect(),
            case_insensitive: true,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    /// Canonical spelling for `token`, if the table knows it.
    pub fn lookup(&self, token: &str) -> Option<&str> {
        let found = if self.case_insensitive {
            self.entries.get(&token.to_lowercase())
        } else {
            self.entries.get(token)
        };
        found.map(String::as_str)
    }

    /// Regex alternation over all keys, longest first so no key is shadowed
    /// by one of its own prefixes.
    fn alternation(&self) -> String {
        let mut keys: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let joined = keys
            .into_iter()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("|");
        if self.case_insensitive {
            format!("(?i:{joined})")
        } else {
            joined
        }
    }

    /// Builds a computed rule applying this table in `context`.
    ///
    /// Only the `key` span of each match is replaced; the scoping text around
    /// it is kept verbatim. Occurrences the table cannot resolve, and
    /// property matches that turn out not to be member keys, are left
    /// untouched and counted as skipped.
    pub fn to_rule(
        &self,
        id: &str,
        context: RenameContext,
        description: &str,
    ) -> Result<Rule, RuleError> {
        if self.is_empty() {
            return Err(RuleError::EmptyRenameMap { id: id.to_string() });
        }
        let pattern = context.pattern(&self.alternation());
        let table = self.clone();
        Rule::computed(
            id,
            &pattern,
            move |caps, haystack| {
                let whole = caps.get(0)?;
                let key = caps.name("key")?;
                if context == RenameContext::Property && !is_member_key(caps, haystack) {
                    return None;
                }
                if let (Some(open), Some(close)) = (caps.name("open"), caps.name("close")) {
                    if open.as_str() != close.as_str() {
                        return None;
                    }
                }
                let canonical = table.lookup(key.as_str())?;
                let text = whole.as_str();
                let start = key.start() - whole.start();
                let end = key.end() - whole.start();
                Some(format!("{}{}{}", &text[..start], canonical, &text[end..]))
            },
            description,
        )
    }
}

/// Whether a property-context match is an object or type member key.
fn is_member_key(caps: &Captures<'_>, haystack: &str) -> bool {
    let (Some(whole), Some(key)) = (caps.get(0), caps.name("key")) else {
        return false;
    };
    if enclosing_opener(haystack, key.start()) != Some(b'{') {
        return false;
    }
    if caps.name("sep").is_some() {
        return true;
    }
    haystack[..whole.start()].trim_end().chars().last() != Some('?')
}

/// Innermost bracket still open at byte `pos`, skipping string literals and
/// comments. Regex literals are not recognized.
fn enclosing_opener(text: &str, pos: usize) -> Option<u8> {
    let bytes = &text.as_bytes()[..pos];
    let mut stack = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i += 2;
                continue;
            }
            quote @ (b'\'' | b'"' | b'`') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            open @ (b'{' | b'(' | b'[') => stack.push(open),
            b'}' | b')' | b']' => {
                stack.pop();
            }
            _ => {}
        }
        i += 1;
    }
    stack.pop()
}
