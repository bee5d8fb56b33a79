// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! The Insert handler: validates `store_params` against the primary key and
//! concurrency-property rules, then compiles `INSERT ... RETURNING` (or, on
//! engines without `RETURNING`, an insert followed by a refetch-by-key).

use std::collections::HashMap;

use serde_json::Value;

use crate::{
    error::ApiMakerError,
    model::{Dialect, KeyType, SchemaObject},
    operation::Operation,
    query::{selection_columns, selector, select_expr, CompiledQuery, OutputColumn},
};

/// Refetch step for engines without `RETURNING` (MySQL): run after the
/// insert commits, using either the caller-supplied key value or the
/// engine's last-insert-id function.
#[derive(Debug, Clone)]
pub struct Refetch {
    pub sql: String,
    pub placeholders: HashMap<String, Value>,
}

/// A compiled Insert. Exactly one of `returning_sql` or `refetch` is set,
/// matching whether the dialect supports `RETURNING`.
#[derive(Debug, Clone)]
pub struct Insert {
    pub insert_sql: String,
    pub placeholders: HashMap<String, Value>,
    pub columns: Vec<OutputColumn>,
    pub refetch: Option<Refetch>,
}

pub fn compile(operation: &Operation, schema: &SchemaObject, dialect: Dialect) -> Result<Insert, ApiMakerError> {
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

    if let Some(key) = &schema.primary_key {
        match &key.key_type {
            KeyType::Auto => {
                if operation.store_params.contains_key(key.name()) {
                    return Err(ApiMakerError::BadRequest(format!(
                        "{} is auto-generated and must not be supplied",
                        key.name()
                    )));
                }
            }
            KeyType::Sequence(_) => {
                if operation.store_params.contains_key(key.name()) {
                    return Err(ApiMakerError::BadRequest(format!(
                        "{} is sequence-generated and must not be supplied",
                        key.name()
                    )));
                }
            }
            KeyType::Required => {
                if !operation.store_params.contains_key(key.name()) {
                    return Err(ApiMakerError::BadRequest(format!(
                        "{} is required",
                        key.name()
                    )));
                }
            }
        }
    }

    if let Some(cc) = &schema.concurrency_property {
        if operation.store_params.contains_key(cc.name()) {
            return Err(ApiMakerError::BadRequest(format!(
                "{} is a concurrency property and must not be supplied",
                cc.name()
            )));
        }
    }

    let mut columns_sql = Vec::new();
    let mut value_exprs = Vec::new();
    let mut placeholders = HashMap::new();

    let mut names: Vec<&String> = operation.store_params.keys().collect();
    names.sort();
    for name in names {
        let property = &schema.properties[name];
        property.validate(&operation.store_params[name])?;
        columns_sql.push(property.column_name.clone());
        value_exprs.push(dialect.placeholder(name, &property.column_type));
        placeholders.insert(name.clone(), property.to_db(&operation.store_params[name])?);
    }

    if let Some(key) = &schema.primary_key {
        if let KeyType::Sequence(seq) = &key.key_type {
            columns_sql.push(key.property.column_name.clone());
            value_exprs.push(format!("nextval('{seq}')"));
        }
    }

    if let Some(cc) = &schema.concurrency_property {
        columns_sql.push(cc.property.column_name.clone());
        value_exprs.push(dialect.concurrency_generator(cc.version_type.as_str(), &cc.property.column_name));
    }

    let regexes = selector::parse(None)?;
    let columns = selection_columns(schema, &regexes, selector::ROOT_TOKEN, None);
    let select_list = columns.iter().map(|c| select_expr(c, None)).collect::<Vec<_>>().join(", ");

    let insert_sql_base = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        schema.table_name(),
        columns_sql.join(", "),
        value_exprs.join(", ")
    );

    if dialect.supports_returning() {
        Ok(Insert {
            insert_sql: format!("{insert_sql_base} RETURNING {select_list}"),
            placeholders,
            columns,
            refetch: None,
        })
    } else {
        let key = schema.primary_key.as_ref().ok_or_else(|| {
            ApiMakerError::Spec(format!(
                "{}: insert refetch requires a primary key on engines without RETURNING",
                schema.entity
            ))
        })?;
        let (condition, refetch_placeholders) = match &key.key_type {
            KeyType::Auto => (
                format!("{} = LAST_INSERT_ID()", key.property.column_name),
                HashMap::new(),
            ),
            KeyType::Sequence(_) => (
                format!("{} = LAST_INSERT_ID()", key.property.column_name),
                HashMap::new(),
            ),
            KeyType::Required => {
                let value = operation
                    .store_params
                    .get(key.name())
                    .expect("validated present above");
                let mut ph = HashMap::new();
                ph.insert(key.name().to_string(), key.property.to_db(value)?);
                (
                    format!("{} = {}", key.property.column_name, dialect.placeholder(key.name(), &key.property.column_type)),
                    ph,
                )
            }
        };
        Ok(Insert {
            insert_sql: insert_sql_base,
            placeholders,
            columns,
            refetch: Some(Refetch {
                sql: format!("SELECT {select_list} FROM {} WHERE {condition}", schema.table_name()),
                placeholders: refetch_placeholders,
            }),
        })
    }
}

/// Re-wrap an [`Insert`]'s first statement as a [`CompiledQuery`] for
/// uniform handling by the DAO when the dialect supports `RETURNING`.
impl Insert {
    pub fn as_compiled_query(&self) -> CompiledQuery {
        CompiledQuery {
            sql: Some(self.insert_sql.clone()),
            placeholders: self.placeholders.clone(),
            columns: self.columns.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::ModelFactory, operation::Action};

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
    fn auto_key_in_store_params_is_rejected() {
        let model = ModelFactory::load(SPEC.as_bytes()).unwrap();
        let schema = model.schema_object("invoice").unwrap();
        let mut op = Operation::new("invoice", Action::Create);
        op.store_params.insert("invoice_id".to_string(), Value::from(1));
        assert!(compile(&op, schema, Dialect::Postgres).is_err());
    }

    #[test]
    fn concurrency_property_in_store_params_is_rejected() {
        let model = ModelFactory::load(SPEC.as_bytes()).unwrap();
        let schema = model.schema_object("invoice").unwrap();
        let mut op = Operation::new("invoice", Action::Create);
        op.store_params.insert("last_updated".to_string(), Value::String("2020-01-01".into()));
        assert!(compile(&op, schema, Dialect::Postgres).is_err());
    }

    #[test]
    fn postgres_insert_uses_returning_and_generates_concurrency_token() {
        let model = ModelFactory::load(SPEC.as_bytes()).unwrap();
        let schema = model.schema_object("invoice").unwrap();
        let mut op = Operation::new("invoice", Action::Create);
        op.store_params.insert("billing_country".to_string(), Value::String("Brazil".into()));
        let insert = compile(&op, schema, Dialect::Postgres).unwrap();
        assert!(insert.insert_sql.contains("RETURNING"));
        assert!(insert.insert_sql.contains("CURRENT_TIMESTAMP"));
        assert!(insert.refetch.is_none());
    }

    #[test]
    fn store_param_violating_declared_constraint_is_rejected() {
        let spec = SPEC.replace(
            "billing_country:\n          type: string\n",
            "billing_country:\n          type: string\n          maxLength: 2\n",
        );
        let model = ModelFactory::load(spec.as_bytes()).unwrap();
        let schema = model.schema_object("invoice").unwrap();
        let mut op = Operation::new("invoice", Action::Create);
        op.store_params.insert("billing_country".to_string(), Value::String("Brazil".into()));
        assert!(matches!(
            compile(&op, schema, Dialect::Postgres),
            Err(ApiMakerError::BadRequest(_))
        ));
    }

    #[test]
    fn mysql_insert_has_no_returning_and_produces_refetch() {
        let model = ModelFactory::load(SPEC.as_bytes()).unwrap();
        let schema = model.schema_object("invoice").unwrap();
        let mut op = Operation::new("invoice", Action::Create);
        op.store_params.insert("billing_country".to_string(), Value::String("Brazil".into()));
        let insert = compile(&op, schema, Dialect::MySQL).unwrap();
        assert!(!insert.insert_sql.contains("RETURNING"));
        let refetch = insert.refetch.unwrap();
        assert!(refetch.sql.contains("LAST_INSERT_ID()"));
    }
}
