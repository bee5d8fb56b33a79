// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! [`TransactionalService`]: drives one [`Operation`] through the
//! [`crate::dao::OperationDAO`] inside a single open [`Connection`],
//! committing on success and rolling back on any error.
//!
//! Every parent-plus-subselect read, and every mutating write, happens
//! within one transaction span — a 1:m subselect observing a half-committed
//! parent write is not a case this service has to reason about.

use crate::{
    connection::ConnectionFactory,
    dao::{DaoResult, OperationDAO},
    error::ApiMakerResult,
    model::Model,
    operation::Operation,
};

/// Resolves a connection, runs one [`Operation`] through the DAO, and
/// commits or rolls back depending on the outcome.
pub struct TransactionalService<'m> {
    model: &'m Model,
    connections: &'m dyn ConnectionFactory,
}

impl<'m> TransactionalService<'m> {
    pub fn new(model: &'m Model, connections: &'m dyn ConnectionFactory) -> Self {
        Self { model, connections }
    }

    /// Execute `operation` to completion: open a connection, run it through
    /// the DAO, and commit. On any DAO error the connection is rolled back
    /// and the error is propagated unchanged.
    pub async fn run(&self, operation: &Operation) -> ApiMakerResult<DaoResult> {
        let mut connection = self.connections.open().await?;
        let dao = OperationDAO::new(self.model);

        match dao.execute(operation, connection.as_mut()).await {
            Ok(result) => {
                connection.commit().await?;
                Ok(result)
            }
            Err(err) => {
                connection.rollback().await?;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use serde_json::Value;

    use super::*;
    use crate::{
        connection::{fake::FakeConnection, Connection},
        model::ModelFactory,
        operation::Action,
        query::select,
    };

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
        async fn open(&self) -> ApiMakerResult<Box<dyn Connection>> {
            let conn = self.connection.lock().unwrap().take().expect("opened only once");
            Ok(Box::new(conn))
        }
    }

    #[tokio::test]
    async fn successful_read_commits() {
        let model = ModelFactory::load(SPEC.as_bytes()).unwrap();
        let schema = model.schema_object("invoice").unwrap();
        let op = Operation::new("invoice", Action::Read);
        let compiled = select::compile(&model, &op, schema, schema.engine).unwrap();

        let fake = FakeConnection::default();
        fake.fetch_responses.lock().unwrap().insert(
            compiled.compiled.sql.clone().unwrap(),
            vec![HashMap::from([
                ("invoice_id".to_string(), Value::from(1)),
                ("billing_country".to_string(), Value::String("Brazil".into())),
            ])],
        );
        let factory = SingleUseFactory {
            connection: std::sync::Mutex::new(Some(fake)),
        };
        let service = TransactionalService::new(&model, &factory);
        let result = service.run(&op).await.unwrap();
        match result {
            DaoResult::Rows(rows) => assert_eq!(rows.len(), 1),
            DaoResult::Count(_) => panic!("expected rows"),
        }
    }

    #[tokio::test]
    async fn no_records_modified_rolls_back() {
        let model = ModelFactory::load(SPEC.as_bytes()).unwrap();
        let mut op = Operation::new("invoice", Action::Update);
        op.store_params.insert("billing_country".to_string(), Value::String("Chile".into()));
        op.query_params.insert("invoice_id".to_string(), Value::from(999));

        let fake = FakeConnection::default();
        let factory = SingleUseFactory {
            connection: std::sync::Mutex::new(Some(fake)),
        };
        let service = TransactionalService::new(&model, &factory);
        let err = service.run(&op).await.unwrap_err();
        assert!(matches!(err, crate::error::ApiMakerError::NoRecordsModified));
    }
}
