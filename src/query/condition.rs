// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Builds the `WHERE` clause (and its parameter map) shared by Select,
//! Subselect, Update and Delete handlers out of `query_params`.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use super::operator::{self, Operator};
use crate::{
    error::ApiMakerError,
    model::{Dialect, Model, Property, SchemaObject},
    operation::Action,
};

/// Everything a handler needs to render `WHERE` and bind its parameters.
#[derive(Default)]
pub struct SearchCondition {
    /// Rendered as `"WHERE a = %(a)s AND ..."`, empty string if there were
    /// no conditions.
    pub clause: String,
    pub placeholders: HashMap<String, Value>,
    /// Relation names touched via a dotted `relation.prop` query param.
    pub referenced_relations: std::collections::BTreeSet<String>,
}

/// `alias_of(entity) -> alias`, including the root under its own entity
/// name. Supplied by the caller, which already ran [`super::alias::build`].
pub type AliasMap = BTreeMap<String, String>;

#[allow(clippy::too_many_arguments)]
pub fn build(
    model: &Model,
    schema: &SchemaObject,
    query_params: &HashMap<String, Value>,
    action: Action,
    single_table: bool,
    aliases: &AliasMap,
    dialect: Dialect,
) -> Result<SearchCondition, ApiMakerError> {
    let mut conditions = Vec::new();
    let mut placeholders = HashMap::new();
    let mut referenced_relations = std::collections::BTreeSet::new();

    let mut names: Vec<&String> = query_params.keys().collect();
    names.sort();

    for name in names {
        let value = &query_params[name];

        let (column_ref, placeholder_prefix, property) = if let Some((relation_name, prop_name)) =
            name.split_once('.')
        {
            if action != Action::Read {
                return Err(ApiMakerError::BadRequest(format!(
                    "dotted query param {name} only valid for read"
                )));
            }
            referenced_relations.insert(relation_name.to_string());
            let relation = schema.relation(relation_name).ok_or_else(|| {
                ApiMakerError::Spec(format!("unknown relation: {relation_name}"))
            })?;
            let child = model.schema_object(&relation.child_entity)?;
            let property = child.property(prop_name).ok_or_else(|| {
                ApiMakerError::Spec(format!("unknown property: {relation_name}.{prop_name}"))
            })?;
            let alias = aliases.get(&relation.child_entity).ok_or_else(|| {
                ApiMakerError::Spec(format!("no alias assigned for {relation_name}"))
            })?;
            (
                format!("{alias}.{}", property.column_name),
                format!("{alias}_{prop_name}"),
                property,
            )
        } else {
            let property = schema
                .property(name)
                .ok_or_else(|| ApiMakerError::Spec(format!("unknown property: {name}")))?;
            let column_ref = if single_table {
                property.column_name.clone()
            } else {
                let alias = aliases.get(&schema.entity).ok_or_else(|| {
                    ApiMakerError::Spec(format!("no alias assigned for {}", schema.entity))
                })?;
                format!("{alias}.{}", property.column_name)
            };
            (column_ref, name.clone(), property)
        };

        let op = operator::parse(value)?;

        if matches!(action, Action::Update | Action::Delete)
            && schema.concurrency_property.is_some()
            && !op.is_equality()
        {
            return Err(ApiMakerError::ConcurrencyViolation(format!(
                "{name} must use equality when the entity has a concurrency property"
            )));
        }

        conditions.push(render(
            dialect,
            &column_ref,
            &placeholder_prefix,
            property,
            &op,
            &mut placeholders,
        )?);
    }

    let clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    Ok(SearchCondition {
        clause,
        placeholders,
        referenced_relations,
    })
}

fn render(
    dialect: Dialect,
    column_ref: &str,
    placeholder_prefix: &str,
    property: &Property,
    op: &Operator,
    placeholders: &mut HashMap<String, Value>,
) -> Result<String, ApiMakerError> {
    let ph = |n: &str| dialect.placeholder(n, &property.column_type);

    Ok(match op {
        Operator::Eq(v) | Operator::Lt(v) | Operator::Le(v) | Operator::Gt(v)
        | Operator::Ge(v) | Operator::Ne(v) => {
            placeholders.insert(placeholder_prefix.to_string(), property.to_db(v)?);
            format!(
                "{column_ref} {} {}",
                op.sql_operand(),
                ph(placeholder_prefix)
            )
        }
        Operator::Between(a, b) | Operator::NotBetween(a, b) => {
            let (p1, p2) = (format!("{placeholder_prefix}_1"), format!("{placeholder_prefix}_2"));
            placeholders.insert(p1.clone(), property.to_db(a)?);
            placeholders.insert(p2.clone(), property.to_db(b)?);
            format!(
                "{column_ref} {} {} AND {}",
                op.sql_operand(),
                ph(&p1),
                ph(&p2)
            )
        }
        Operator::In(values) | Operator::NotIn(values) => {
            let mut rendered = Vec::with_capacity(values.len());
            for (idx, v) in values.iter().enumerate() {
                let name = format!("{placeholder_prefix}_{idx}");
                placeholders.insert(name.clone(), property.to_db(v)?);
                rendered.push(ph(&name));
            }
            format!("{column_ref} {} ({})", op.sql_operand(), rendered.join(","))
        }
    })
}
