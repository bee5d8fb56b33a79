// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Parses `metadata_params.properties`, a whitespace-separated list of
//! tokens choosing which columns (and which relations) a query selects. A
//! bare regex (no colon) selects root columns; a `<relation-name>:<regex>`
//! token selects columns on that relation.

use std::collections::BTreeMap;

use regex::Regex;

use crate::error::ApiMakerError;

/// Sentinel token standing for the root entity in a selector expression.
pub const ROOT_TOKEN: &str = ".";

/// Parse a selector expression into relation name → compiled regex. A
/// missing expression defaults the root's regex to `.*` (select every
/// column, no relations).
pub fn parse(expression: Option<&str>) -> Result<BTreeMap<String, Regex>, ApiMakerError> {
    let mut result = BTreeMap::new();

    let Some(expression) = expression.filter(|s| !s.trim().is_empty()) else {
        result.insert(ROOT_TOKEN.to_string(), Regex::new(".*").unwrap());
        return Ok(result);
    };

    for token in expression.split_whitespace() {
        let (name, pattern) = match token.split_once(':') {
            Some((name, pattern)) => (name, pattern),
            None => (ROOT_TOKEN, token),
        };
        let regex = Regex::new(pattern)
            .map_err(|e| ApiMakerError::BadRequest(format!("invalid selector regex: {e}")))?;
        result.insert(name.to_string(), regex);
    }

    result.entry(ROOT_TOKEN.to_string()).or_insert_with(|| Regex::new(".*").unwrap());
    Ok(result)
}

/// Filter `candidates` (property names of one schema object) against the
/// regex registered for `relation_token`, if any was selected at all.
pub fn matching<'a>(
    regexes: &BTreeMap<String, Regex>,
    relation_token: &str,
    candidates: impl IntoIterator<Item = &'a str>,
) -> Vec<&'a str> {
    let Some(regex) = regexes.get(relation_token) else {
        return Vec::new();
    };
    candidates.into_iter().filter(|c| regex.is_match(c)).collect()
}
