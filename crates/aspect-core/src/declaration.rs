//! Contract declaration parsing.
//!
//! A descriptor is a block of text attached to a target. Each contract aspect
//! scans it for the first line starting with its own marker:
//!
//! ```text
//! @Postcondition is_return_le positional(n) keywords('a') (100, 200) return
//! │              │             │            │              │          └─ pass return value
//! │              │             │            │              └─ literal args, appended in order
//! │              │             │            └─ caller keyword keys to forward
//! │              │             └─ number of leading caller positionals to forward
//! │              └─ registered predicate name
//! └─ aspect marker
//! ```

use crate::error::{AspectError, Result};
use crate::literal::{parse_literal, parse_literal_list, split_entries};
use crate::value::Value;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static IDENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));
static PREDICATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("valid predicate regex")
});

const POSITIONAL_LABELS: &[&str] = &["positional", "*args"];
const KEYWORD_LABELS: &[&str] = &["keywords", "**kwargs"];
const RETURN_KEYWORD: &str = "return";

/// Parsed description of how to call an external predicate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    /// Registered predicate name
    pub predicate_name: String,

    /// Number of leading caller positionals forwarded to the predicate
    pub positional_arg_count: usize,

    /// Constant values appended after the forwarded positionals
    pub literal_args: Vec<Value>,

    /// Caller keyword keys forwarded to the predicate, first-seen order
    pub keyword_keys: Vec<String>,

    /// Append the target's return value (postconditions only)
    pub include_return_value: bool,
}

/// Parser bound to one aspect marker
#[derive(Debug, Clone, Copy)]
pub struct DeclarationParser<'a> {
    marker: &'a str,
}

impl<'a> DeclarationParser<'a> {
    #[must_use]
    pub const fn new(marker: &'a str) -> Self {
        Self { marker }
    }

    #[must_use]
    pub const fn marker(&self) -> &str {
        self.marker
    }

    /// Find and parse the declaration for this marker
    pub fn parse(&self, descriptor: &str) -> Result<Declaration> {
        let line = self.find_line(descriptor).ok_or_else(|| {
            AspectError::configuration(format!("no `{}` declaration found", self.marker))
        })?;
        self.parse_line(line)
    }

    /// First trimmed line whose leading token is the marker
    #[must_use]
    pub fn find_line<'d>(&self, descriptor: &'d str) -> Option<&'d str> {
        descriptor
            .lines()
            .map(str::trim)
            .find(|line| self.strip_marker(line).is_some())
    }

    /// Parse one declaration line
    pub fn parse_line(&self, line: &str) -> Result<Declaration> {
        let line = line.trim();
        let rest = self.strip_marker(line).ok_or_else(|| {
            AspectError::configuration(format!("line does not start with `{}`: {line}", self.marker))
        })?;

        self.parse_body(rest)
            .map_err(|e| match e {
                AspectError::Configuration(msg) => AspectError::configuration(format!(
                    "illegal `{}` declaration `{line}`: {msg}",
                    self.marker
                )),
                other => other,
            })
    }

    fn parse_body(&self, rest: &str) -> Result<Declaration> {
        let rest = rest.trim_start();
        let name_end = rest
            .find(|c: char| c.is_whitespace() || c == '(')
            .unwrap_or(rest.len());
        let predicate_name = &rest[..name_end];
        if predicate_name.is_empty() {
            return Err(AspectError::configuration("missing predicate name"));
        }
        if !PREDICATE_RE.is_match(predicate_name) {
            return Err(AspectError::configuration(format!(
                "invalid predicate name `{predicate_name}`"
            )));
        }

        let (positional, rest) = take_group(&rest[name_end..], POSITIONAL_LABELS, "positional")?;
        let (keywords, rest) = take_group(rest, KEYWORD_LABELS, "keywords")?;
        let (literals, rest) = take_group(rest, &[""], "literal")?;

        let include_return_value = match rest.trim() {
            "" => false,
            RETURN_KEYWORD => true,
            other => {
                return Err(AspectError::configuration(format!(
                    "unexpected trailing text `{other}`"
                )))
            }
        };

        Ok(Declaration {
            predicate_name: predicate_name.to_string(),
            positional_arg_count: count_placeholders(positional)?,
            literal_args: parse_literal_list(literals)?,
            keyword_keys: parse_keyword_keys(keywords)?,
            include_return_value,
        })
    }

    fn strip_marker<'l>(&self, line: &'l str) -> Option<&'l str> {
        let rest = line.strip_prefix(self.marker)?;
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            Some(rest)
        } else {
            None
        }
    }
}

/// Take `label(...)` from the front of `text`, returning the group contents and the remainder
fn take_group<'t>(text: &'t str, labels: &[&str], what: &str) -> Result<(&'t str, &'t str)> {
    let text = text.trim_start();
    let after_label = labels
        .iter()
        .find_map(|label| text.strip_prefix(label).filter(|r| r.starts_with('(')))
        .ok_or_else(|| {
            let expected = match labels.first() {
                Some(label) if !label.is_empty() => format!("`{label}(...)`"),
                _ => "`(...)`".to_string(),
            };
            AspectError::configuration(format!("missing {what} group, expected {expected}"))
        })?;

    let body = &after_label[1..];
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (idx, ch) in body.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => quote = Some(ch),
            '(' => {
                return Err(AspectError::configuration(format!(
                    "nested parentheses in {what} group"
                )))
            }
            ')' => return Ok((&body[..idx], &body[idx + 1..])),
            _ => {}
        }
    }

    Err(AspectError::configuration(format!(
        "unbalanced delimiters in {what} group"
    )))
}

fn count_placeholders(group: &str) -> Result<usize> {
    let entries = split_entries(group)?;
    if let Some(bad) = entries.iter().find(|e| !IDENT_RE.is_match(e)) {
        return Err(AspectError::configuration(format!(
            "positional placeholder `{bad}` is not an identifier"
        )));
    }
    Ok(entries.len())
}

fn parse_keyword_keys(group: &str) -> Result<Vec<String>> {
    let mut keys: Vec<String> = Vec::new();
    for entry in split_entries(group)? {
        let key = if IDENT_RE.is_match(entry) {
            entry.to_string()
        } else {
            match parse_literal(entry)? {
                Value::Str(s) if IDENT_RE.is_match(&s) => s,
                other => {
                    return Err(AspectError::configuration(format!(
                        "keyword key must be an identifier or quoted identifier, got {other}"
                    )))
                }
            }
        };
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    Ok(keys)
}
