// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! The prefix map: assigns a short, unique, non-reserved alias to every
//! entity participating in a multi-table query.

use std::collections::BTreeMap;

/// Alias the root entity always receives, matching the original gateway's
/// sentinel so generated SQL stays recognizable across both systems.
pub const ROOT_ALIAS: &str = "$default$";

/// Reserved words that may not be used as a bare table alias. Not
/// exhaustive of any one engine's full reserved-word list, but covers the
/// common SQL-92/ANSI core shared by Postgres, MySQL and Oracle.
pub const SQL_RESERVED_WORDS: &[&str] = &[
    "all", "and", "any", "as", "asc", "between", "by", "case", "check", "column", "constraint",
    "create", "cross", "current", "default", "delete", "desc", "distinct", "drop", "else", "end",
    "exists", "false", "for", "foreign", "from", "full", "grant", "group", "having", "in",
    "index", "inner", "insert", "intersect", "into", "is", "join", "key", "left", "like",
    "limit", "natural", "no", "not", "null", "of", "offset", "on", "or", "order", "outer",
    "primary", "references", "right", "select", "set", "some", "table", "then", "to", "true",
    "union", "unique", "update", "using", "values", "view", "when", "where", "with",
];

/// Assigns each entity in `entities` (in iteration order) a short alias,
/// reusing no previously assigned alias and never landing on a reserved
/// word. The first entity in the slice is always the root and always
/// receives [`ROOT_ALIAS`].
pub fn build(entities: &[&str]) -> BTreeMap<String, String> {
    let mut assigned = BTreeMap::new();
    let mut used_aliases: Vec<String> = Vec::new();

    for (idx, entity) in entities.iter().enumerate() {
        if idx == 0 {
            assigned.insert((*entity).to_string(), ROOT_ALIAS.to_string());
            continue;
        }
        let lower = entity.to_ascii_lowercase();
        let mut alias = lower.clone();
        for len in 1..=lower.len() {
            let candidate = &lower[..len];
            if !SQL_RESERVED_WORDS.contains(&candidate) && !used_aliases.iter().any(|a| a == candidate) {
                alias = candidate.to_string();
                break;
            }
        }
        used_aliases.push(alias.clone());
        assigned.insert((*entity).to_string(), alias);
    }

    assigned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_entity_gets_sentinel_alias() {
        let map = build(&["invoice"]);
        assert_eq!(map.get("invoice").unwrap(), ROOT_ALIAS);
    }

    #[test]
    fn distinct_entities_get_distinct_short_aliases() {
        let map = build(&["invoice", "customer", "invoice_line"]);
        assert_eq!(map.get("invoice").unwrap(), ROOT_ALIAS);
        let customer_alias = map.get("customer").unwrap();
        let line_alias = map.get("invoice_line").unwrap();
        assert_ne!(customer_alias, line_alias);
        assert!(!SQL_RESERVED_WORDS.contains(&customer_alias.as_str()));
        assert!(!SQL_RESERVED_WORDS.contains(&line_alias.as_str()));
    }

    #[test]
    fn avoids_reserved_words_by_growing_alias() {
        // "order" is reserved; an entity literally named "order" must not
        // receive "o" if "o" happens to collide, nor "order" itself.
        let map = build(&["invoice", "order"]);
        let alias = map.get("order").unwrap();
        assert_ne!(alias, "order");
        assert!(!SQL_RESERVED_WORDS.contains(&alias.as_str()));
    }
}
