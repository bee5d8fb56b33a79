// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! [`Handler`]: the thin adapter between one external request and one
//! [`TransactionalService::run`] call. It owns only the wire-shape mapping —
//! request parsing and response/error envelopes — and none of the
//! SQL-compilation or transaction logic, which live in [`crate::dao`] and
//! [`crate::transaction`].

use serde_json::{json, Value};

use crate::{
    connection::ConnectionFactory,
    dao::DaoResult,
    error::ApiMakerError,
    model::Model,
    operation::Operation,
    transaction::TransactionalService,
};

/// The `{status, message}` envelope every error response carries.
pub fn error_envelope(error: &ApiMakerError) -> Value {
    json!({
        "status": error.status_code(),
        "message": error.to_string(),
    })
}

/// Shapes a successful [`DaoResult`] into the response body: an array of
/// records for reads/creates/updates/deletes, or `{count: n}` when `count`
/// was requested.
pub fn success_body(result: DaoResult) -> Value {
    match result {
        DaoResult::Rows(rows) => Value::Array(rows.into_iter().map(Value::Object).collect()),
        DaoResult::Count(count) => json!({ "count": count }),
    }
}

/// Maps one wire request onto one [`Operation`], drives it through a
/// [`TransactionalService`], and returns either the success body or the
/// error envelope — never a raw [`ApiMakerError`], so the caller always has
/// something JSON-serializable to hand back to its transport layer.
pub struct Handler<'m> {
    model: &'m Model,
    connections: &'m dyn ConnectionFactory,
}

impl<'m> Handler<'m> {
    pub fn new(model: &'m Model, connections: &'m dyn ConnectionFactory) -> Self {
        Self { model, connections }
    }

    pub async fn handle(&self, request: &Value) -> Result<Value, Value> {
        let operation = Operation::from_wire(request).map_err(|e| error_envelope(&e))?;
        self.run(&operation).await
    }

    async fn run(&self, operation: &Operation) -> Result<Value, Value> {
        let service = TransactionalService::new(self.model, self.connections);
        service.run(operation).await.map(success_body).map_err(|e| error_envelope(&e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connection::fake::FakeConnection, model::ModelFactory};
    use async_trait::async_trait;
    use std::collections::HashMap;

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
"#;

    struct SingleUseFactory {
        connection: std::sync::Mutex<Option<FakeConnection>>,
    }

    #[async_trait]
    impl ConnectionFactory for SingleUseFactory {
        async fn open(&self) -> crate::error::ApiMakerResult<Box<dyn crate::connection::Connection>> {
            let conn = self.connection.lock().unwrap().take().expect("opened only once");
            Ok(Box::new(conn))
        }
    }

    #[tokio::test]
    async fn malformed_request_yields_error_envelope() {
        let model = ModelFactory::load(SPEC.as_bytes()).unwrap();
        let fake = FakeConnection::default();
        let factory = SingleUseFactory { connection: std::sync::Mutex::new(Some(fake)) };
        let handler = Handler::new(&model, &factory);
        let err = handler.handle(&json!({"action": "read"})).await.unwrap_err();
        assert_eq!(err["status"], 400);
    }

    #[tokio::test]
    async fn successful_read_yields_row_array() {
        let model = ModelFactory::load(SPEC.as_bytes()).unwrap();
        let schema = model.schema_object("invoice").unwrap();
        let op = Operation::new("invoice", crate::operation::Action::Read);
        let compiled = crate::query::select::compile(&model, &op, schema, schema.engine).unwrap();

        let fake = FakeConnection::default();
        fake.fetch_responses.lock().unwrap().insert(
            compiled.compiled.sql.clone().unwrap(),
            vec![HashMap::from([
                ("invoice_id".to_string(), Value::from(1)),
                ("billing_country".to_string(), Value::String("Brazil".into())),
            ])],
        );
        let factory = SingleUseFactory { connection: std::sync::Mutex::new(Some(fake)) };
        let handler = Handler::new(&model, &factory);

        let request = json!({"entity": "invoice", "action": "read"});
        let body = handler.handle(&request).await.unwrap();
        assert!(body.as_array().unwrap().len() == 1);
    }
}
