// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! # api-maker
//!
//! Compiles an annotated OpenAPI 3 document into a running CRUD service
//! over Postgres, MySQL or Oracle.
//!
//! ```text
//! ModelFactory::load(spec) -> Model
//!        │
//!        ▼
//! Operation (one request) ──► OperationDAO ──► QueryHandler family
//!                                   │                 │
//!                                   ▼                 ▼
//!                            Connection/Cursor   SQL + params + columns
//! ```
//!
//! [`gateway::GatewaySpec`] runs the same [`model::Model`] the other way:
//! entity metadata back out to a deployable OpenAPI document. The crate
//! draws the line at deployment — it produces the document, not the
//! infrastructure that serves it.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use api_maker::{model::ModelFactory, operation::{Action, Operation}, handler::Handler};
//!
//! let model = ModelFactory::from_env()?;
//! let handler = Handler::new(&model, &connection_factory);
//! let response = handler.handle(&request_json).await;
//! ```

pub mod config;
pub mod connection;
pub mod dao;
pub mod error;
pub mod gateway;
pub mod handler;
pub mod model;
pub mod operation;
pub mod query;
pub mod transaction;

pub use dao::{DaoResult, OperationDAO};
pub use error::{ApiMakerError, ApiMakerResult};
pub use model::{Model, ModelFactory};
pub use operation::{Action, Operation};
pub use transaction::TransactionalService;
