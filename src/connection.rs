// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! The engine-agnostic [`Connection`]/[`Cursor`] pair the
//! [`crate::transaction::TransactionalService`] drives.
//!
//! Unlike a plain `sqlx::Transaction`, [`Connection`] exposes an explicit
//! [`Connection::rollback`] alongside `commit` so a caller can abort a unit
//! of work without relying on drop semantics.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ApiMakerResult;

/// One row as returned by the driver: output column name → JSON value.
pub type Row = HashMap<String, Value>;

/// A statement handle bound to one open [`Connection`].
#[async_trait]
pub trait Cursor: Send {
    /// Run a read query and collect every row.
    async fn fetch_all(&mut self, sql: &str, params: &HashMap<String, Value>) -> ApiMakerResult<Vec<Row>>;

    /// Run a write statement and return the rows its `RETURNING` clause
    /// produced (empty when the statement has none or matched zero rows).
    async fn execute(&mut self, sql: &str, params: &HashMap<String, Value>) -> ApiMakerResult<Vec<Row>>;
}

/// One open, possibly-transactional database connection.
#[async_trait]
pub trait Connection: Send {
    /// Borrow a cursor to issue statements on this connection.
    async fn cursor(&mut self) -> ApiMakerResult<Box<dyn Cursor + '_>>;

    /// Commit all statements issued on this connection since it was opened.
    async fn commit(self: Box<Self>) -> ApiMakerResult<()>;

    /// Abort all statements issued on this connection since it was opened.
    async fn rollback(self: Box<Self>) -> ApiMakerResult<()>;

    /// Release the connection back to its pool without committing or
    /// rolling back — used after a read-only operation.
    async fn close(self: Box<Self>) -> ApiMakerResult<()>;
}

/// Opens connections for one engine. Implemented per dialect against the
/// corresponding `sqlx` pool type.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn open(&self) -> ApiMakerResult<Box<dyn Connection>>;
}

/// Bridges the named-placeholder SQL the query handlers emit (`%(name)s`
/// for Postgres/MySQL, `:name` for Oracle) onto `sqlx`'s `Any` driver, which
/// only understands positional `?` placeholders. Rewrites in textual order
/// and returns the bind values in the same order.
pub mod sqlx_any {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use regex::Regex;
    use serde_json::Value;
    use sqlx::{any::AnyPoolOptions, AnyPool, Column, Row as _};

    use super::*;
    use crate::error::ApiMakerError;

    fn placeholder_pattern() -> Regex {
        Regex::new(r"%\(([A-Za-z0-9_]+)\)s|:([A-Za-z0-9_]+)").expect("static pattern")
    }

    /// Rewrite every named placeholder in `sql` into `?`, returning the
    /// bind values in occurrence order.
    fn rewrite(sql: &str, params: &HashMap<String, Value>) -> ApiMakerResult<(String, Vec<Value>)> {
        let pattern = placeholder_pattern();
        let mut values = Vec::new();
        let mut error = None;

        let rewritten = pattern.replace_all(sql, |caps: &regex::Captures| {
            let name = caps.get(1).or_else(|| caps.get(2)).expect("one group always matches").as_str();
            match params.get(name) {
                Some(v) => values.push(v.clone()),
                None => error = Some(ApiMakerError::Spec(format!("no bound value for placeholder {name}"))),
            }
            "?"
        });

        if let Some(e) = error {
            return Err(e);
        }
        Ok((rewritten.into_owned(), values))
    }

    fn bind_value<'q>(
        query: sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>>,
        value: Value,
    ) -> sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>> {
        match value {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(b),
            Value::Number(n) if n.is_i64() => query.bind(n.as_i64().unwrap()),
            Value::Number(n) => query.bind(n.as_f64().unwrap_or_default()),
            Value::String(s) => query.bind(s),
            other => query.bind(other.to_string()),
        }
    }

    fn row_to_map(row: &sqlx::any::AnyRow) -> Row {
        let mut map = HashMap::new();
        for column in row.columns() {
            let name = column.name().to_string();
            let value = row
                .try_get::<i64, _>(column.ordinal())
                .map(Value::from)
                .or_else(|_| row.try_get::<f64, _>(column.ordinal()).and_then(|v| Ok(serde_json::Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null))))
                .or_else(|_| row.try_get::<bool, _>(column.ordinal()).map(Value::Bool))
                .or_else(|_| row.try_get::<String, _>(column.ordinal()).map(Value::String))
                .unwrap_or(Value::Null);
            map.insert(name, value);
        }
        map
    }

    pub struct AnySqlxCursor<'t> {
        tx: &'t mut sqlx::Transaction<'static, sqlx::Any>,
    }

    #[async_trait]
    impl Cursor for AnySqlxCursor<'_> {
        async fn fetch_all(&mut self, sql: &str, params: &HashMap<String, Value>) -> ApiMakerResult<Vec<Row>> {
            let (rewritten, values) = rewrite(sql, params)?;
            let mut query = sqlx::query(&rewritten);
            for value in values {
                query = bind_value(query, value);
            }
            let rows = query.fetch_all(&mut *self.tx).await?;
            Ok(rows.iter().map(row_to_map).collect())
        }

        async fn execute(&mut self, sql: &str, params: &HashMap<String, Value>) -> ApiMakerResult<Vec<Row>> {
            let (rewritten, values) = rewrite(sql, params)?;
            let mut query = sqlx::query(&rewritten);
            for value in values {
                query = bind_value(query, value);
            }
            let rows = query.fetch_all(&mut *self.tx).await?;
            Ok(rows.iter().map(row_to_map).collect())
        }
    }

    pub struct AnySqlxConnection {
        tx: sqlx::Transaction<'static, sqlx::Any>,
    }

    #[async_trait]
    impl Connection for AnySqlxConnection {
        async fn cursor(&mut self) -> ApiMakerResult<Box<dyn Cursor + '_>> {
            Ok(Box::new(AnySqlxCursor { tx: &mut self.tx }))
        }

        async fn commit(self: Box<Self>) -> ApiMakerResult<()> {
            self.tx.commit().await?;
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> ApiMakerResult<()> {
            self.tx.rollback().await?;
            Ok(())
        }

        async fn close(self: Box<Self>) -> ApiMakerResult<()> {
            self.tx.rollback().await?;
            Ok(())
        }
    }

    /// Opens transactions against one already-established `AnyPool`. One
    /// factory per logical database, built once from a resolved
    /// [`crate::config::ConnectionConfig`].
    pub struct AnySqlxConnectionFactory {
        pool: AnyPool,
    }

    impl AnySqlxConnectionFactory {
        pub async fn connect(url: &str) -> ApiMakerResult<Self> {
            sqlx::any::install_default_drivers();
            let pool = AnyPoolOptions::new().max_connections(5).connect(url).await?;
            Ok(Self { pool })
        }
    }

    #[async_trait]
    impl ConnectionFactory for AnySqlxConnectionFactory {
        async fn open(&self) -> ApiMakerResult<Box<dyn Connection>> {
            let tx = self.pool.begin().await?;
            Ok(Box::new(AnySqlxConnection { tx }))
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod fake {
    //! An in-memory [`Connection`] used by the unit test suites for
    //! [`crate::transaction`]/[`crate::dao`] and, behind the `test-util`
    //! feature, by the integration suite under `tests/` — never wired to a
    //! real driver.

    use std::{collections::HashMap, sync::Mutex};

    use super::*;

    #[derive(Default)]
    pub struct FakeConnection {
        pub fetch_responses: Mutex<HashMap<String, Vec<Row>>>,
        pub execute_responses: Mutex<HashMap<String, Vec<Row>>>,
        pub committed: Mutex<bool>,
        pub rolled_back: Mutex<bool>,
    }

    #[async_trait]
    impl Cursor for &FakeConnection {
        async fn fetch_all(&mut self, sql: &str, _params: &HashMap<String, Value>) -> ApiMakerResult<Vec<Row>> {
            Ok(self.fetch_responses.lock().unwrap().get(sql).cloned().unwrap_or_default())
        }

        async fn execute(&mut self, sql: &str, _params: &HashMap<String, Value>) -> ApiMakerResult<Vec<Row>> {
            Ok(self.execute_responses.lock().unwrap().get(sql).cloned().unwrap_or_default())
        }
    }

    #[async_trait]
    impl Connection for FakeConnection {
        async fn cursor(&mut self) -> ApiMakerResult<Box<dyn Cursor + '_>> {
            Ok(Box::new(&*self))
        }

        async fn commit(self: Box<Self>) -> ApiMakerResult<()> {
            *self.committed.lock().unwrap() = true;
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> ApiMakerResult<()> {
            *self.rolled_back.lock().unwrap() = true;
            Ok(())
        }

        async fn close(self: Box<Self>) -> ApiMakerResult<()> {
            Ok(())
        }
    }
}
