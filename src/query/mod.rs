// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Compiles one [`crate::operation::Operation`] against one
//! [`crate::model::SchemaObject`] into SQL text, a parameter map, and a
//! result-column map.
//!
//! ```text
//! Operation + SchemaObject
//!        │
//!        ├── alias::build           (prefix map)
//!        ├── selector::parse        (metadata_params.properties)
//!        ├── condition::build       (query_params → WHERE + placeholders)
//!        └── {select,insert,update,delete,subselect}::compile
//!                       │
//!                       ▼
//!               CompiledQuery { sql, placeholders, columns }
//! ```
//!
//! Every variant shares these building blocks instead of inheriting from a
//! common base class.

pub mod alias;
pub mod condition;
pub mod delete;
pub mod insert;
pub mod operator;
pub mod select;
pub mod selector;
pub mod subselect;
pub mod update;

use std::collections::{BTreeMap, HashMap};

use regex::Regex;
use serde_json::Value;

use crate::{
    error::ApiMakerError,
    model::{Property, SchemaObject},
    operation::Action,
};

/// One column of a compiled query's result set: where to find it in the raw
/// row (`output_name`, matching the `AS` alias used in `SELECT`) and how to
/// convert it back to an API value.
#[derive(Debug, Clone)]
pub struct OutputColumn {
    pub output_name: String,
    pub property: Property,
}

/// SQL text, its parameter map, and its result-column map. `sql` is `None`
/// for a subselect whose child has no selected columns beyond the join key
/// — the DAO skips executing it entirely.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub sql: Option<String>,
    pub placeholders: HashMap<String, Value>,
    pub columns: Vec<OutputColumn>,
}

impl CompiledQuery {
    /// Convert one raw row (keyed by `output_name`) into an API-shaped
    /// JSON object.
    pub fn marshal(&self, row: &HashMap<String, Value>) -> Result<serde_json::Map<String, Value>, ApiMakerError> {
        let mut out = serde_json::Map::new();
        for col in &self.columns {
            if let Some(v) = row.get(&col.output_name) {
                out.insert(col.property.name.clone(), col.property.to_api(v)?);
            }
        }
        Ok(out)
    }
}

/// A handler is single-table when it needs no join: creates never join,
/// and reads/updates/deletes only join when a relation is actually
/// referenced, either through the selector or a dotted query param name.
pub fn is_single_table(action: Action, referenced_relations: &std::collections::BTreeSet<String>) -> bool {
    action == Action::Create || referenced_relations.is_empty()
}

/// Builds the list of entities participating in a multi-table query: the
/// root first, then every relation named in `referenced_relations`, in
/// sorted order for determinism.
pub fn participating_entities<'a>(
    root_entity: &'a str,
    schema: &'a SchemaObject,
    referenced_relations: &std::collections::BTreeSet<String>,
) -> Vec<&'a str> {
    let mut entities = vec![root_entity];
    for name in referenced_relations {
        if let Some(relation) = schema.relation(name) {
            entities.push(relation.child_entity.as_str());
        }
    }
    entities
}

/// Builds the output column list for one schema object's properties that
/// match the regex registered for `relation_token` in `regexes`.
pub fn selection_columns(
    schema: &SchemaObject,
    regexes: &BTreeMap<String, Regex>,
    relation_token: &str,
    alias: Option<&str>,
) -> Vec<OutputColumn> {
    let names = selector::matching(regexes, relation_token, schema.properties.keys().map(String::as_str));
    names
        .into_iter()
        .map(|name| {
            let property = schema.properties[name].clone();
            let output_name = match alias {
                Some(alias) => format!("{alias}_{}", property.column_name),
                None => property.column_name.clone(),
            };
            OutputColumn { output_name, property }
        })
        .collect()
}

/// Renders one output column as a `SELECT` list entry: `alias.col AS
/// alias_col` when joined, bare `col` when single-table.
pub fn select_expr(column: &OutputColumn, alias: Option<&str>) -> String {
    match alias {
        Some(alias) => format!("{alias}.{} AS {}", column.property.column_name, column.output_name),
        None => column.property.column_name.clone(),
    }
}
