//! Strict literal parsing for declaration groups.
//!
//! Only numbers, quoted strings and the `True`/`False`/`None` constants are
//! accepted. Descriptor text is never evaluated.

use crate::error::{AspectError, Result};
use crate::value::Value;
use once_cell::sync::Lazy;
use regex::Regex;

static INT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+$").expect("valid int regex"));
static FLOAT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(\d+\.\d*|\.\d+|\d+)([eE][+-]?\d+)?$").expect("valid float regex")
});

/// Parse a single literal such as `100`, `-2.5`, `'abc'` or `None`
pub fn parse_literal(text: &str) -> Result<Value> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AspectError::configuration("empty literal"));
    }

    if text.starts_with('\'') || text.starts_with('"') {
        return parse_quoted(text).map(Value::Str);
    }

    match text {
        "True" => return Ok(Value::Bool(true)),
        "False" => return Ok(Value::Bool(false)),
        "None" => return Ok(Value::None),
        _ => {}
    }

    if INT_RE.is_match(text) {
        return text
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| AspectError::configuration(format!("integer literal {text}: {e}")));
    }

    if FLOAT_RE.is_match(text) {
        return text
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| AspectError::configuration(format!("float literal {text}: {e}")));
    }

    Err(AspectError::configuration(format!(
        "unsupported literal `{text}` (expected number, quoted string, True, False or None)"
    )))
}

/// Parse a comma-separated literal list; a single trailing comma is allowed
pub fn parse_literal_list(text: &str) -> Result<Vec<Value>> {
    split_entries(text)?
        .into_iter()
        .map(parse_literal)
        .collect()
}

/// Split group contents on commas that are outside quotes.
///
/// Entries are trimmed. Blank input yields no entries; a trailing comma is
/// dropped, any other empty entry is an error.
pub(crate) fn split_entries(text: &str) -> Result<Vec<&str>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    let mut start = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
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
            ',' => {
                entries.push(text[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }

    if quote.is_some() {
        return Err(AspectError::configuration(format!(
            "unterminated string in `{text}`"
        )));
    }

    let last = text[start..].trim();
    if !last.is_empty() {
        entries.push(last);
    } else if entries.is_empty() {
        return Err(AspectError::configuration(format!("empty entry in `{text}`")));
    }

    if entries.iter().any(|e| e.is_empty()) {
        return Err(AspectError::configuration(format!("empty entry in `{text}`")));
    }

    Ok(entries)
}

fn parse_quoted(text: &str) -> Result<String> {
    let mut chars = text.chars();
    let Some(quote) = chars.next() else {
        return Err(AspectError::configuration("empty string literal"));
    };

    let mut out = String::new();
    let mut closed = false;
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                let Some(next) = chars.next() else {
                    break;
                };
                out.push(match next {
                    'n' => '\n',
                    't' => '\t',
                    '\\' | '\'' | '"' => next,
                    other => {
                        return Err(AspectError::configuration(format!(
                            "unsupported escape `\\{other}` in {text}"
                        )))
                    }
                });
            }
            c if c == quote => {
                closed = true;
                break;
            }
            c => out.push(c),
        }
    }

    if !closed {
        return Err(AspectError::configuration(format!(
            "unterminated string literal {text}"
        )));
    }
    if chars.next().is_some() {
        return Err(AspectError::configuration(format!(
            "unexpected text after string literal {text}"
        )));
    }
    Ok(out)
}
