// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! [`OperationDAO`]: dispatches one [`Operation`] to the matching
//! QueryHandler, drives any 1:m subselects it records, and marshals the raw
//! rows back into API-shaped JSON.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::{
    connection::Connection,
    error::{ApiMakerError, ApiMakerResult},
    model::{Model, SchemaObject},
    operation::{Action, Operation},
    query::{delete, insert, select, subselect, update},
};

/// What one [`OperationDAO::execute`] call produces.
#[derive(Debug, Clone)]
pub enum DaoResult {
    Rows(Vec<Map<String, Value>>),
    Count(i64),
}

/// Stateless dispatcher over a [`Model`]. One instance is shared across every
/// request; all per-request state lives in the [`Operation`] and the
/// borrowed [`Connection`].
pub struct OperationDAO<'m> {
    model: &'m Model,
}

impl<'m> OperationDAO<'m> {
    pub fn new(model: &'m Model) -> Self {
        Self { model }
    }

    pub async fn execute(
        &self,
        operation: &Operation,
        connection: &mut dyn Connection,
    ) -> ApiMakerResult<DaoResult> {
        let schema = self.model.schema_object(&operation.entity)?;
        let dialect = schema.engine;

        match operation.action {
            Action::Read => self.execute_read(operation, schema, connection).await,
            Action::Create => self.execute_create(operation, schema, dialect, connection).await,
            Action::Update => self.execute_update(operation, schema, dialect, connection).await,
            Action::Delete => self.execute_delete(operation, schema, dialect, connection).await,
        }
    }

    async fn execute_read(
        &self,
        operation: &Operation,
        schema: &SchemaObject,
        connection: &mut dyn Connection,
    ) -> ApiMakerResult<DaoResult> {
        let dialect = schema.engine;
        let compiled_select = select::compile(self.model, operation, schema, dialect)?;
        let mut cursor = connection.cursor().await?;
        let sql = compiled_select
            .compiled
            .sql
            .as_deref()
            .expect("a read's parent query always has sql");
        let rows = cursor.fetch_all(sql, &compiled_select.compiled.placeholders).await?;

        if operation.metadata_params.count {
            let count = rows
                .first()
                .and_then(|row| row.get("count"))
                .and_then(Value::as_i64)
                .unwrap_or(0);
            return Ok(DaoResult::Count(count));
        }

        let mut parents = rows
            .iter()
            .map(|row| compiled_select.compiled.marshal(row))
            .collect::<Result<Vec<_>, _>>()?;

        for relation_name in &compiled_select.one_to_many_relations {
            let relation = schema
                .relation(relation_name)
                .expect("recorded by select::compile from this same schema");
            let sub = subselect::compile(self.model, operation, schema, relation, &compiled_select)?;

            let Some(sub_sql) = &sub.sql else { continue };

            for parent in &mut parents {
                parent.insert(relation_name.clone(), Value::Array(Vec::new()));
            }

            let child_rows = cursor.fetch_all(sub_sql, &sub.placeholders).await?;
            let mut grouped: HashMap<String, Vec<Value>> = HashMap::new();
            for child_row in &child_rows {
                let marshaled = sub.marshal(child_row)?;
                let key = join_key(marshaled.get(&relation.child_property));
                grouped.entry(key).or_default().push(Value::Object(marshaled));
            }

            for parent in &mut parents {
                let key = join_key(parent.get(&relation.parent_property));
                if let Some(children) = grouped.remove(&key) {
                    parent.insert(relation_name.clone(), Value::Array(children));
                }
            }
        }

        Ok(DaoResult::Rows(parents))
    }

    async fn execute_create(
        &self,
        operation: &Operation,
        schema: &SchemaObject,
        dialect: crate::model::Dialect,
        connection: &mut dyn Connection,
    ) -> ApiMakerResult<DaoResult> {
        let compiled = insert::compile(operation, schema, dialect)?;
        let mut cursor = connection.cursor().await?;

        let rows = match &compiled.refetch {
            None => cursor.execute(&compiled.insert_sql, &compiled.placeholders).await?,
            Some(refetch) => {
                cursor.execute(&compiled.insert_sql, &compiled.placeholders).await?;
                cursor.fetch_all(&refetch.sql, &refetch.placeholders).await?
            }
        };

        let marshaled = rows
            .iter()
            .map(|row| {
                let mut out = Map::new();
                for col in &compiled.columns {
                    if let Some(v) = row.get(&col.output_name) {
                        out.insert(col.property.name.clone(), col.property.to_api(v)?);
                    }
                }
                Ok(out)
            })
            .collect::<Result<Vec<_>, ApiMakerError>>()?;

        Ok(DaoResult::Rows(marshaled))
    }

    async fn execute_update(
        &self,
        operation: &Operation,
        schema: &SchemaObject,
        dialect: crate::model::Dialect,
        connection: &mut dyn Connection,
    ) -> ApiMakerResult<DaoResult> {
        let compiled = update::compile(self.model, operation, schema, dialect)?;
        let mut cursor = connection.cursor().await?;
        let sql = compiled.sql.as_deref().expect("update always produces sql");
        let rows = cursor.execute(sql, &compiled.placeholders).await?;
        if rows.is_empty() {
            return Err(ApiMakerError::NoRecordsModified);
        }
        let marshaled = rows
            .iter()
            .map(|row| compiled.marshal(row))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DaoResult::Rows(marshaled))
    }

    async fn execute_delete(
        &self,
        operation: &Operation,
        schema: &SchemaObject,
        dialect: crate::model::Dialect,
        connection: &mut dyn Connection,
    ) -> ApiMakerResult<DaoResult> {
        let compiled = delete::compile(self.model, operation, schema, dialect)?;
        let mut cursor = connection.cursor().await?;
        let sql = compiled.sql.as_deref().expect("delete always produces sql");
        let rows = cursor.execute(sql, &compiled.placeholders).await?;
        if rows.is_empty() {
            return Err(ApiMakerError::NoRecordsModified);
        }
        let marshaled = rows
            .iter()
            .map(|row| compiled.marshal(row))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DaoResult::Rows(marshaled))
    }
}

/// A stable string key used to group subselect rows by join-column value,
/// independent of the value's JSON type.
fn join_key(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "$null$".to_string(),
        Some(v) => v.to_string(),
    }
}
