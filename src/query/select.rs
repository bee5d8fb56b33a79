// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! The Select handler: parent-row SQL for a `read` operation, including
//! joins for any selected or filtered-on 1:1 relation.

use std::collections::BTreeSet;

use crate::{
    error::ApiMakerError,
    model::{Cardinality, Dialect, Model, SchemaObject},
    operation::{Action, Operation},
    query::{self, alias, condition, selector, CompiledQuery, OutputColumn},
};

/// A compiled Select, plus the pieces a [`super::subselect::Subselect`]
/// needs to inherit: the `FROM` expression and the `WHERE` clause/params of
/// the parent query.
pub struct Select {
    pub compiled: CompiledQuery,
    pub table_expression: String,
    pub search_clause: String,
    pub search_placeholders: std::collections::HashMap<String, serde_json::Value>,
    /// 1:m relations the caller asked for via the selector — these are not
    /// joined here; the DAO drives a [`super::subselect::Subselect`] per
    /// entry.
    pub one_to_many_relations: Vec<String>,
}

pub fn compile(model: &Model, operation: &Operation, schema: &SchemaObject, dialect: Dialect) -> Result<Select, ApiMakerError> {
    let regexes = selector::parse(operation.metadata_params.properties.as_deref())?;

    let dotted_relations: BTreeSet<String> = operation
        .query_params
        .keys()
        .filter_map(|k| k.split_once('.').map(|(r, _)| r.to_string()))
        .collect();
    for name in &dotted_relations {
        if schema.relation(name).is_none() {
            return Err(ApiMakerError::Spec(format!("unknown relation: {name}")));
        }
    }

    let selector_relations: Vec<String> = regexes
        .keys()
        .filter(|k| k.as_str() != selector::ROOT_TOKEN)
        .cloned()
        .collect();
    for name in &selector_relations {
        if schema.relation(name).is_none() {
            return Err(ApiMakerError::Spec(format!("unknown relation: {name}")));
        }
    }

    let one_to_many_relations: Vec<String> = selector_relations
        .iter()
        .filter(|name| schema.relation(name).unwrap().cardinality == Cardinality::OneToMany)
        .cloned()
        .collect();

    let one_to_one_selected: BTreeSet<String> = selector_relations
        .iter()
        .filter(|name| schema.relation(name).unwrap().cardinality == Cardinality::OneToOne)
        .cloned()
        .collect();

    let forced_count_single_table = operation.metadata_params.count;

    let mut join_relations: BTreeSet<String> = dotted_relations.clone();
    join_relations.extend(one_to_one_selected.iter().cloned());

    let single_table = forced_count_single_table || query::is_single_table(Action::Read, &join_relations);

    let entities = if single_table {
        vec![schema.entity.as_str()]
    } else {
        query::participating_entities(&schema.entity, schema, &join_relations)
    };
    let aliases = alias::build(&entities);

    let sc = condition::build(
        model,
        schema,
        &operation.query_params,
        Action::Read,
        single_table,
        &aliases,
        dialect,
    )?;

    let root_alias = if single_table { None } else { Some(aliases[&schema.entity].as_str()) };
    let table_expression = match root_alias {
        Some(a) => format!("{} AS {a}", schema.table_name()),
        None => schema.table_name(),
    };

    if operation.metadata_params.count {
        let sql = format!("SELECT COUNT(*) AS count {} {}", format!("FROM {table_expression}"), sc.clause).trim().to_string();
        let count_property = crate::model::Property::new("count", "integer");
        return Ok(Select {
            compiled: CompiledQuery {
                sql: Some(sql),
                placeholders: sc.placeholders.clone(),
                columns: vec![OutputColumn { output_name: "count".to_string(), property: count_property }],
            },
            table_expression,
            search_clause: sc.clause,
            search_placeholders: sc.placeholders,
            one_to_many_relations: vec![],
        });
    }

    let root_columns = query::selection_columns(schema, &regexes, selector::ROOT_TOKEN, root_alias);
    let mut select_entries: Vec<String> = root_columns.iter().map(|c| query::select_expr(c, root_alias)).collect();
    let mut columns = root_columns;

    let mut join_clauses = Vec::new();
    for name in &one_to_one_selected {
        let relation = schema.relation(name).unwrap();
        let child = model.schema_object(&relation.child_entity)?;
        let child_alias = aliases[&relation.child_entity].as_str();
        let child_columns = query::selection_columns(child, &regexes, name, Some(child_alias));
        select_entries.extend(child_columns.iter().map(|c| query::select_expr(c, Some(child_alias))));
        columns.extend(child_columns);

        let parent_col = schema.property(&relation.parent_property).map(|p| p.column_name.clone()).unwrap_or_else(|| relation.parent_property.clone());
        let child_col = child.property(&relation.child_property).map(|p| p.column_name.clone()).unwrap_or_else(|| relation.child_property.clone());
        let join_kind = if relation.left_join { "LEFT JOIN" } else { "INNER JOIN" };
        join_clauses.push(format!(
            "{join_kind} {} AS {child_alias} ON {}.{parent_col} = {child_alias}.{child_col}",
            child.table_name(),
            root_alias.unwrap()
        ));
    }

    let mut sql = format!("SELECT {} FROM {table_expression}", select_entries.join(", "));
    if !join_clauses.is_empty() {
        sql.push(' ');
        sql.push_str(&join_clauses.join(" "));
    }
    if !sc.clause.is_empty() {
        sql.push(' ');
        sql.push_str(&sc.clause);
    }

    Ok(Select {
        compiled: CompiledQuery {
            sql: Some(sql),
            placeholders: sc.placeholders.clone(),
            columns,
        },
        table_expression,
        search_clause: sc.clause,
        search_placeholders: sc.placeholders,
        one_to_many_relations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelFactory;

    const SPEC: &str = r#"
components:
  schemas:
    Invoice:
      x-am-engine: postgres
      x-am-database: chinook
      properties:
        invoice_id:
          type: integer
          x-am-primary-key: auto
        billing_country:
          type: string
        customer:
          x-am-schema-object: Customer
          x-am-cardinality: "1:1"
        line_items:
          x-am-schema-object: InvoiceLine
          x-am-cardinality: "1:m"
          x-am-parent-property: invoice_id
          x-am-child-property: invoice_id
    Customer:
      x-am-engine: postgres
      x-am-database: chinook
      properties:
        customer_id:
          type: integer
          x-am-primary-key: required
    InvoiceLine:
      x-am-engine: postgres
      x-am-database: chinook
      properties:
        invoice_line_id:
          type: integer
          x-am-primary-key: auto
        invoice_id:
          type: integer
        track_id:
          type: integer
"#;

    #[test]
    fn single_table_when_no_relation_referenced() {
        let model = ModelFactory::load(SPEC.as_bytes()).unwrap();
        let schema = model.schema_object("invoice").unwrap();
        let op = Operation::new("invoice", Action::Read);
        let select = compile(&model, &op, schema, Dialect::Postgres).unwrap();
        let sql = select.compiled.sql.unwrap();
        assert!(!sql.contains("JOIN"));
        assert!(sql.starts_with("SELECT"));
    }

    #[test]
    fn one_to_one_selector_adds_join() {
        let model = ModelFactory::load(SPEC.as_bytes()).unwrap();
        let schema = model.schema_object("invoice").unwrap();
        let mut op = Operation::new("invoice", Action::Read);
        op.metadata_params.properties = Some(".* customer:.*".to_string());
        let select = compile(&model, &op, schema, Dialect::Postgres).unwrap();
        let sql = select.compiled.sql.unwrap();
        assert!(sql.contains("JOIN"));
        assert!(select.one_to_many_relations.is_empty());
    }

    #[test]
    fn one_to_many_selector_is_not_joined_but_recorded() {
        let model = ModelFactory::load(SPEC.as_bytes()).unwrap();
        let schema = model.schema_object("invoice").unwrap();
        let mut op = Operation::new("invoice", Action::Read);
        op.metadata_params.properties = Some(".* line_items:.*".to_string());
        let select = compile(&model, &op, schema, Dialect::Postgres).unwrap();
        let sql = select.compiled.sql.unwrap();
        assert!(!sql.contains("JOIN"));
        assert_eq!(select.one_to_many_relations, vec!["line_items".to_string()]);
    }

    #[test]
    fn dotted_child_filter_forces_join() {
        let model = ModelFactory::load(SPEC.as_bytes()).unwrap();
        let schema = model.schema_object("invoice").unwrap();
        let mut op = Operation::new("invoice", Action::Read);
        op.query_params.insert("line_items.track_id".to_string(), serde_json::Value::from(298));
        let select = compile(&model, &op, schema, Dialect::Postgres).unwrap();
        let sql = select.compiled.sql.unwrap();
        assert!(sql.contains("JOIN"));
    }

    #[test]
    fn count_suppresses_joins() {
        let model = ModelFactory::load(SPEC.as_bytes()).unwrap();
        let schema = model.schema_object("invoice").unwrap();
        let mut op = Operation::new("invoice", Action::Read);
        op.metadata_params.count = true;
        op.metadata_params.properties = Some(".* customer:.*".to_string());
        let select = compile(&model, &op, schema, Dialect::Postgres).unwrap();
        let sql = select.compiled.sql.unwrap();
        assert!(sql.starts_with("SELECT COUNT(*) AS count"));
        assert!(!sql.contains("JOIN"));
    }
}
