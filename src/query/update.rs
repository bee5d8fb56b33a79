// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! The Update handler: compiles `UPDATE ... SET ... WHERE ... RETURNING`,
//! refreshing the concurrency token on every write and requiring the caller
//! to have pinned the old one as an equality filter.

use std::collections::HashMap;

use serde_json::Value;

use crate::{
    error::ApiMakerError,
    model::{Dialect, Model, SchemaObject},
    operation::{Action, Operation},
    query::{alias, condition, selection_columns, selector, select_expr, CompiledQuery},
};

pub fn compile(model: &Model, operation: &Operation, schema: &SchemaObject, dialect: Dialect) -> Result<CompiledQuery, ApiMakerError> {
    if operation.store_params.is_empty() {
        return Err(ApiMakerError::BadRequest(
            "update requires at least one store_params entry".to_string(),
        ));
    }

    for name in operation.store_params.keys() {
        if name.contains('.') {
            return Err(ApiMakerError::BadRequest(format!(
                "dotted name not allowed in store_params: {name}"
            )));
        }
        if !schema.properties.contains_key(name) {
            return Err(ApiMakerError::Spec(format!("unknown property: {name}")));
        }
    }

    if let Some(cc) = &schema.concurrency_property {
        if operation.store_params.contains_key(cc.name()) {
            return Err(ApiMakerError::BadRequest(format!(
                "{} is a concurrency property and must not be supplied",
                cc.name()
            )));
        }
        if !operation.query_params.contains_key(cc.name()) {
            return Err(ApiMakerError::ConcurrencyViolation(format!(
                "{} must be supplied in query_params to update a versioned entity",
                cc.name()
            )));
        }
    }

    let aliases = alias::build(&[schema.entity.as_str()]);
    let sc = condition::build(
        model,
        schema,
        &operation.query_params,
        Action::Update,
        true,
        &aliases,
        dialect,
    )?;

    let mut set_clauses = Vec::new();
    let mut placeholders: HashMap<String, Value> = HashMap::new();

    let mut names: Vec<&String> = operation.store_params.keys().collect();
    names.sort();
    for name in names {
        let property = &schema.properties[name];
        property.validate(&operation.store_params[name])?;
        set_clauses.push(format!(
            "{} = {}",
            property.column_name,
            dialect.placeholder(name, &property.column_type)
        ));
        placeholders.insert(name.clone(), property.to_db(&operation.store_params[name])?);
    }

    if let Some(cc) = &schema.concurrency_property {
        set_clauses.push(format!(
            "{} = {}",
            cc.property.column_name,
            dialect.concurrency_generator(cc.version_type.as_str(), &cc.property.column_name)
        ));
    }

    for (name, value) in &sc.placeholders {
        placeholders.insert(name.clone(), value.clone());
    }

    let regexes = selector::parse(None)?;
    let columns = selection_columns(schema, &regexes, selector::ROOT_TOKEN, None);
    let select_list = columns.iter().map(|c| select_expr(c, None)).collect::<Vec<_>>().join(", ");

    let mut sql = format!("UPDATE {} SET {}", schema.table_name(), set_clauses.join(", "));
    if !sc.clause.is_empty() {
        sql.push(' ');
        sql.push_str(&sc.clause);
    }
    sql.push_str(&format!(" RETURNING {select_list}"));

    Ok(CompiledQuery {
        sql: Some(sql),
        placeholders,
        columns,
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
        last_updated:
          type: string
          x-am-column-type: date-time
          x-am-version: timestamp
        billing_country:
          type: string
"#;

    #[test]
    fn empty_store_params_is_rejected() {
        let model = ModelFactory::load(SPEC.as_bytes()).unwrap();
        let schema = model.schema_object("invoice").unwrap();
        let op = Operation::new("invoice", Action::Update);
        assert!(compile(&model, &op, schema, Dialect::Postgres).is_err());
    }

    #[test]
    fn missing_concurrency_token_in_query_params_is_violation() {
        let model = ModelFactory::load(SPEC.as_bytes()).unwrap();
        let schema = model.schema_object("invoice").unwrap();
        let mut op = Operation::new("invoice", Action::Update);
        op.store_params.insert("billing_country".to_string(), Value::String("Chile".into()));
        op.query_params.insert("invoice_id".to_string(), Value::from(1));
        let err = compile(&model, &op, schema, Dialect::Postgres).unwrap_err();
        assert!(matches!(err, ApiMakerError::ConcurrencyViolation(_)));
    }

    #[test]
    fn valid_update_refreshes_concurrency_token_and_returns_rows() {
        let model = ModelFactory::load(SPEC.as_bytes()).unwrap();
        let schema = model.schema_object("invoice").unwrap();
        let mut op = Operation::new("invoice", Action::Update);
        op.store_params.insert("billing_country".to_string(), Value::String("Chile".into()));
        op.query_params.insert("invoice_id".to_string(), Value::from(1));
        op.query_params.insert("last_updated".to_string(), Value::String("2020-01-01T00:00:00".into()));
        let compiled = compile(&model, &op, schema, Dialect::Postgres).unwrap();
        let sql = compiled.sql.unwrap();
        assert!(sql.starts_with("UPDATE chinook.invoice SET"));
        assert!(sql.contains("CURRENT_TIMESTAMP"));
        assert!(sql.contains("RETURNING"));
        assert!(sql.contains("WHERE"));
    }
}
