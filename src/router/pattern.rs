//! Route pattern compilation.
//!
//! A pattern such as `/cat/:id` is compiled once, at registration time, into an
//! anchored regular expression. Supported segment forms:
//!
//! - literal segments, matched verbatim (case-sensitive)
//! - `:name`, binding exactly one non-empty path segment
//! - `:name?`, an optional segment (the preceding `/` becomes optional too)
//! - `*`, matching the rest of the path, captured under `"0"`, `"1"`, ...
//! - parameters mixed with literal text inside one segment, such as
//!   `/:id.json` or `/:from-:to`
//!
//! Matching is case-sensitive and strict: `/Cat` does not match `/cat`, and a
//! trailing slash is significant, so `/cat/` does not match `/cat`. Express
//! routers built on path-to-regexp default to the opposite for both.

use crate::error::{ServerError, ServerResult};
use regex::Regex;
use std::collections::HashMap;

/// Named path parameters extracted by a successful match.
pub type Params = HashMap<String, String>;

#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    regex: Regex,
    keys: Vec<String>,
}

impl PathPattern {
    pub fn compile(pattern: &str) -> ServerResult<Self> {
        let invalid = |reason: &str| ServerError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        let mut expr = String::from("^");
        let mut keys = Vec::new();
        let mut wildcards = 0usize;

        for (index, segment) in pattern.split('/').enumerate() {
            let separator = if index == 0 { "" } else { "/" };

            if segment == "*" {
                keys.push(wildcards.to_string());
                wildcards += 1;
                expr.push_str(separator);
                expr.push_str("(.*)");
            } else if let Some(name) = optional_param(segment) {
                keys.push(name.to_string());
                expr.push_str(&format!("(?:{}([^/]+?))?", separator));
            } else {
                expr.push_str(separator);
                compile_segment(segment, &mut expr, &mut keys).map_err(invalid)?;
            }
        }
        expr.push('$');

        let regex = Regex::new(&expr).map_err(|e| invalid(&e.to_string()))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
            keys,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Tests `path` against the whole pattern, returning the decoded parameters
    /// on success.
    pub fn matches(&self, path: &str) -> Option<Params> {
        let captures = self.regex.captures(path)?;
        let params = self
            .keys
            .iter()
            .enumerate()
            .filter_map(|(i, key)| {
                captures
                    .get(i + 1)
                    .map(|value| (key.clone(), decode(value.as_str())))
            })
            .collect();
        Some(params)
    }
}

/// Name of a segment of the form `:name?`.
fn optional_param(segment: &str) -> Option<&str> {
    let name = segment.strip_prefix(':')?.strip_suffix('?')?;
    if !name.is_empty() && name.chars().all(is_name_char) {
        Some(name)
    } else {
        None
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Compiles one segment that may mix literal text with `:name` parameters,
/// e.g. `:id.json` or `:from-:to`. A name ends at the first character outside
/// `[A-Za-z0-9_]`.
fn compile_segment(
    segment: &str,
    expr: &mut String,
    keys: &mut Vec<String>,
) -> Result<(), &'static str> {
    let mut rest = segment;
    while let Some(at) = rest.find(':') {
        expr.push_str(&regex::escape(&rest[..at]));
        let after = &rest[at + 1..];
        let end = after
            .find(|c: char| !is_name_char(c))
            .unwrap_or(after.len());
        if end == 0 {
            return Err("missing parameter name");
        }
        keys.push(after[..end].to_string());
        expr.push_str("([^/]+?)");
        rest = &after[end..];
    }
    expr.push_str(&regex::escape(rest));
    Ok(())
}

fn decode(value: &str) -> String {
    urlencoding::decode(value)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| value.to_string())
}
