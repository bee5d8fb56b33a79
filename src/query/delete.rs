// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! The Delete handler: compiles `DELETE FROM ... WHERE ... RETURNING`,
//! enforcing the same concurrency-token pinning as Update.

use crate::{
    error::ApiMakerError,
    model::{Dialect, Model, SchemaObject},
    operation::{Action, Operation},
    query::{alias, condition, selection_columns, selector, select_expr, CompiledQuery},
};

pub fn compile(model: &Model, operation: &Operation, schema: &SchemaObject, dialect: Dialect) -> Result<CompiledQuery, ApiMakerError> {
    if let Some(cc) = &schema.concurrency_property {
        if !operation.query_params.contains_key(cc.name()) {
            return Err(ApiMakerError::ConcurrencyViolation(format!(
                "{} must be supplied in query_params to delete a versioned entity",
                cc.name()
            )));
        }
    }

    let aliases = alias::build(&[schema.entity.as_str()]);
    let sc = condition::build(
        model,
        schema,
        &operation.query_params,
        Action::Delete,
        true,
        &aliases,
        dialect,
    )?;

    let regexes = selector::parse(None)?;
    let columns = selection_columns(schema, &regexes, selector::ROOT_TOKEN, None);
    let select_list = columns.iter().map(|c| select_expr(c, None)).collect::<Vec<_>>().join(", ");

    let mut sql = format!("DELETE FROM {}", schema.table_name());
    if !sc.clause.is_empty() {
        sql.push(' ');
        sql.push_str(&sc.clause);
    }
    sql.push_str(&format!(" RETURNING {select_list}"));

    Ok(CompiledQuery {
        sql: Some(sql),
        placeholders: sc.placeholders,
        columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelFactory;
    use serde_json::Value;

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
    fn missing_concurrency_token_is_violation() {
        let model = ModelFactory::load(SPEC.as_bytes()).unwrap();
        let schema = model.schema_object("invoice").unwrap();
        let mut op = Operation::new("invoice", Action::Delete);
        op.query_params.insert("invoice_id".to_string(), Value::from(1));
        let err = compile(&model, &op, schema, Dialect::Postgres).unwrap_err();
        assert!(matches!(err, ApiMakerError::ConcurrencyViolation(_)));
    }

    #[test]
    fn valid_delete_compiles_with_returning() {
        let model = ModelFactory::load(SPEC.as_bytes()).unwrap();
        let schema = model.schema_object("invoice").unwrap();
        let mut op = Operation::new("invoice", Action::Delete);
        op.query_params.insert("invoice_id".to_string(), Value::from(1));
        op.query_params.insert("last_updated".to_string(), Value::String("2020-01-01T00:00:00".into()));
        let compiled = compile(&model, &op, schema, Dialect::Postgres).unwrap();
        let sql = compiled.sql.unwrap();
        assert!(sql.starts_with("DELETE FROM chinook.invoice WHERE"));
        assert!(sql.contains("RETURNING"));
    }

    #[test]
    fn delete_without_concurrency_property_does_not_require_query_params() {
        const NO_VERSION_SPEC: &str = r#"
components:
  schemas:
    Customer:
      x-am-engine: postgres
      x-am-database: chinook
      properties:
        customer_id:
          type: integer
          x-am-primary-key: required
"#;
        let model = ModelFactory::load(NO_VERSION_SPEC.as_bytes()).unwrap();
        let schema = model.schema_object("customer").unwrap();
        let op = Operation::new("customer", Action::Delete);
        let compiled = compile(&model, &op, schema, Dialect::Postgres).unwrap();
        assert!(compiled.sql.unwrap().starts_with("DELETE FROM chinook.customer"));
    }
}
