// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! The Subselect handler: fetches the child rows of one 1:m relation,
//! filtered to the parent's own result set, inheriting the parent's
//! `WHERE` clause and placeholders verbatim.

use crate::{
    error::ApiMakerError,
    model::{Model, Relation, SchemaObject},
    operation::Operation,
    query::{select::Select, selector, CompiledQuery, OutputColumn},
};

/// Compile the child-side SQL for one 1:m `relation` of `parent`, reusing
/// the already-compiled parent [`Select`] for its `FROM`/`WHERE`.
///
/// Returns a [`CompiledQuery`] with `sql: None` when the child's selection
/// map contains nothing beyond the join key — the caller (the DAO) skips
/// executing it entirely in that case.
pub fn compile(
    model: &Model,
    operation: &Operation,
    parent_schema: &SchemaObject,
    relation: &Relation,
    parent: &Select,
) -> Result<CompiledQuery, ApiMakerError> {
    let child: &SchemaObject = model.schema_object(&relation.child_entity)?;
    let regexes = selector::parse(operation.metadata_params.properties.as_deref())?;

    let join_property = child.property(&relation.child_property).ok_or_else(|| {
        ApiMakerError::Spec(format!(
            "relation {} child_property {} not found on {}",
            relation.name, relation.child_property, relation.child_entity
        ))
    })?;

    let mut columns = vec![OutputColumn {
        output_name: join_property.column_name.clone(),
        property: join_property.clone(),
    }];
    let extra = crate::query::selection_columns(child, &regexes, &relation.name, None);
    let extra_has_more_than_join_key = extra
        .iter()
        .any(|c| c.property.column_name != join_property.column_name);
    for c in extra {
        if !columns.iter().any(|existing| existing.output_name == c.output_name) {
            columns.push(c);
        }
    }

    if !extra_has_more_than_join_key {
        return Ok(CompiledQuery {
            sql: None,
            placeholders: parent.search_placeholders.clone(),
            columns,
        });
    }

    let parent_column = parent_schema
        .property(&relation.parent_property)
        .map(|p| p.column_name.clone())
        .unwrap_or_else(|| relation.parent_property.clone());

    let select_list = columns
        .iter()
        .map(|c| c.property.column_name.clone())
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!(
        "SELECT {select_list} FROM {} WHERE {} IN (SELECT {parent_column} FROM {}{})",
        child.table_name(),
        join_property.column_name,
        parent.table_expression,
        if parent.search_clause.is_empty() {
            String::new()
        } else {
            format!(" {}", parent.search_clause)
        }
    );

    Ok(CompiledQuery {
        sql: Some(sql),
        placeholders: parent.search_placeholders.clone(),
        columns,
    })
}
