// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! The typed data model parsed from an augmented OpenAPI document.
//!
//! ```text
//! ModelFactory::load(bytes)
//!        │
//!        ▼
//!      Model ── SchemaObject ── Property
//!               │              ├── Key        (primary key specialization)
//!               │              └── VersionProperty (concurrency token)
//!               └── Relation ──► SchemaObject (looked up by name, lazily)
//! ```
//!
//! Relations are resolved by entity name against the owning [`Model`] rather
//! than by direct reference, so a cycle between two schema objects never
//! becomes an ownership cycle in the Rust type graph.

mod dialect;
mod factory;

pub use dialect::Dialect;
pub use factory::{Model, ModelFactory};
use serde_json::Value;

use crate::error::ApiMakerError;

/// A scalar field of an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub column_name: String,
    pub api_type: String,
    pub column_type: String,
    pub max_length: Option<usize>,
    pub min_length: Option<usize>,
    pub pattern: Option<String>,
}

impl Property {
    pub fn new(name: impl Into<String>, api_type: impl Into<String>) -> Self {
        let name = name.into();
        let api_type = api_type.into();
        Self {
            column_name: name.clone(),
            column_type: api_type.clone(),
            name,
            api_type,
            max_length: None,
            min_length: None,
            pattern: None,
        }
    }

    pub fn with_column_name(mut self, column_name: impl Into<String>) -> Self {
        self.column_name = column_name.into();
        self
    }

    pub fn with_column_type(mut self, column_type: impl Into<String>) -> Self {
        self.column_type = column_type.into();
        self
    }

    /// Convert an API-facing value into the value bound to the SQL
    /// parameter. Identity-safe on `null`.
    pub fn to_db(&self, value: &Value) -> Result<Value, ApiMakerError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match self.column_type.as_str() {
            "boolean" => Ok(Value::Bool(coerce_bool(value)?)),
            "integer" => Ok(Value::from(coerce_i64(value)?)),
            "number" => Ok(serde_json::Number::from_f64(coerce_f64(value)?)
                .map(Value::Number)
                .unwrap_or(Value::Null)),
            _ => Ok(Value::String(coerce_string(value))),
        }
    }

    /// Enforce `maxLength`/`minLength`/`pattern` as declared on the source
    /// OpenAPI property. Only applies to string-typed values; `null` and
    /// non-string types are left to [`Property::to_db`]'s own coercion.
    pub fn validate(&self, value: &Value) -> Result<(), ApiMakerError> {
        let Value::String(s) = value else {
            return Ok(());
        };
        if let Some(max) = self.max_length {
            if s.chars().count() > max {
                return Err(ApiMakerError::BadRequest(format!(
                    "{}: exceeds maxLength {max}",
                    self.name
                )));
            }
        }
        if let Some(min) = self.min_length {
            if s.chars().count() < min {
                return Err(ApiMakerError::BadRequest(format!(
                    "{}: shorter than minLength {min}",
                    self.name
                )));
            }
        }
        if let Some(pattern) = &self.pattern {
            let re = regex::Regex::new(pattern)
                .map_err(|e| ApiMakerError::Spec(format!("{}: invalid pattern: {e}", self.name)))?;
            if !re.is_match(s) {
                return Err(ApiMakerError::BadRequest(format!(
                    "{}: does not match pattern {pattern}",
                    self.name
                )));
            }
        }
        Ok(())
    }

    /// Convert a raw DB row value back into its API-facing form.
    /// Identity-safe on `null`.
    pub fn to_api(&self, value: &Value) -> Result<Value, ApiMakerError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match self.api_type.as_str() {
            "boolean" => Ok(Value::Bool(coerce_bool(value)?)),
            "integer" => Ok(Value::from(coerce_i64(value)?)),
            "number" => Ok(serde_json::Number::from_f64(coerce_f64(value)?)
                .map(Value::Number)
                .unwrap_or(Value::Null)),
            _ => Ok(Value::String(coerce_string(value))),
        }
    }
}

fn coerce_bool(value: &Value) -> Result<bool, ApiMakerError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(ApiMakerError::BadRequest(format!(
                "not a boolean: {other}"
            ))),
        },
        Value::Number(n) => Ok(n.as_i64().unwrap_or(0) != 0),
        other => Err(ApiMakerError::BadRequest(format!("not a boolean: {other}"))),
    }
}

fn coerce_i64(value: &Value) -> Result<i64, ApiMakerError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| ApiMakerError::BadRequest(format!("not an integer: {n}"))),
        Value::String(s) => s
            .parse()
            .map_err(|_| ApiMakerError::BadRequest(format!("not an integer: {s}"))),
        other => Err(ApiMakerError::BadRequest(format!("not an integer: {other}"))),
    }
}

fn coerce_f64(value: &Value) -> Result<f64, ApiMakerError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| ApiMakerError::BadRequest(format!("not a number: {n}"))),
        Value::String(s) => s
            .parse()
            .map_err(|_| ApiMakerError::BadRequest(format!("not a number: {s}"))),
        other => Err(ApiMakerError::BadRequest(format!("not a number: {other}"))),
    }
}

fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// How a primary key's value is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyType {
    /// Must be supplied by the caller on create.
    Required,
    /// Generated by the database (e.g. `GENERATED ALWAYS AS IDENTITY`).
    Auto,
    /// Generated from a named sequence: `nextval('<name>')`.
    Sequence(String),
}

/// The primary key of a [`SchemaObject`] — a [`Property`] plus key semantics.
#[derive(Debug, Clone)]
pub struct Key {
    pub property: Property,
    pub key_type: KeyType,
}

impl Key {
    pub fn new(property: Property, key_type: KeyType) -> Self {
        Self { property, key_type }
    }

    pub fn name(&self) -> &str {
        &self.property.name
    }
}

/// Optimistic-concurrency token kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionType {
    Uuid,
    Timestamp,
    Serial,
}

impl VersionType {
    pub fn from_str(value: &str) -> Result<Self, ApiMakerError> {
        match value {
            "uuid" => Ok(Self::Uuid),
            "timestamp" => Ok(Self::Timestamp),
            "serial" => Ok(Self::Serial),
            other => Err(ApiMakerError::Spec(format!(
                "unknown version type: {other}"
            ))),
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Uuid => "uuid",
            Self::Timestamp => "timestamp",
            Self::Serial => "serial",
        }
    }
}

/// The concurrency-token property of a [`SchemaObject`].
#[derive(Debug, Clone)]
pub struct VersionProperty {
    pub property: Property,
    pub version_type: VersionType,
}

impl VersionProperty {
    pub fn name(&self) -> &str {
        &self.property.name
    }
}

/// Cardinality of a [`Relation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    OneToOne,
    OneToMany,
}

impl Cardinality {
    pub fn from_str(value: &str) -> Result<Self, ApiMakerError> {
        match value {
            "1:1" => Ok(Self::OneToOne),
            "1:m" => Ok(Self::OneToMany),
            other => Err(ApiMakerError::Spec(format!(
                "unknown cardinality: {other}"
            ))),
        }
    }
}

/// A named association from one entity to another.
///
/// The target is resolved by name against the owning [`Model`] rather than
/// held as a direct reference, so cyclic relation graphs do not require
/// cyclic ownership.
#[derive(Debug, Clone)]
pub struct Relation {
    pub name: String,
    pub cardinality: Cardinality,
    pub child_entity: String,
    pub parent_property: String,
    pub child_property: String,
    /// Join style for 1:1 relations; defaults to `LEFT` so an optional
    /// child row never drops its parent.
    pub left_join: bool,
}

/// One entity: its columns, its primary key, its concurrency token, and its
/// relations to other entities.
#[derive(Debug, Clone)]
pub struct SchemaObject {
    pub entity: String,
    pub engine: Dialect,
    pub database: String,
    pub table: String,
    pub properties: std::collections::BTreeMap<String, Property>,
    pub relations: std::collections::BTreeMap<String, Relation>,
    pub primary_key: Option<Key>,
    pub concurrency_property: Option<VersionProperty>,
    pub required: Vec<String>,
}

impl SchemaObject {
    /// Fully qualified `database.table` reference used in FROM clauses.
    pub fn table_name(&self) -> String {
        format!("{}.{}", self.database, self.table)
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_name_is_database_qualified() {
        let so = SchemaObject {
            entity: "invoice".into(),
            engine: Dialect::Postgres,
            database: "chinook".into(),
            table: "invoice".into(),
            properties: Default::default(),
            relations: Default::default(),
            primary_key: None,
            concurrency_property: None,
            required: vec![],
        };
        assert_eq!(so.table_name(), "chinook.invoice");
    }

    #[test]
    fn boolean_round_trips_through_string_literal() {
        let p = Property::new("active", "boolean");
        let db = p.to_db(&Value::String("True".into())).unwrap();
        assert_eq!(db, Value::Bool(true));
        let api = p.to_api(&Value::Bool(true)).unwrap();
        assert_eq!(api, Value::Bool(true));
    }

    #[test]
    fn integer_round_trips_from_string() {
        let p = Property::new("qty", "integer");
        let db = p.to_db(&Value::String("42".into())).unwrap();
        assert_eq!(db, Value::from(42));
    }

    #[test]
    fn validate_enforces_declared_length_and_pattern() {
        let mut p = Property::new("code", "string");
        p.max_length = Some(3);
        p.pattern = Some("^[A-Z]+$".to_string());
        assert!(p.validate(&Value::String("AB".into())).is_ok());
        assert!(p.validate(&Value::String("ABCD".into())).is_err());
        assert!(p.validate(&Value::String("ab".into())).is_err());
        assert!(p.validate(&Value::Null).is_ok());
    }

    #[test]
    fn null_is_identity_safe() {
        let p = Property::new("maybe", "integer");
        assert_eq!(p.to_db(&Value::Null).unwrap(), Value::Null);
        assert_eq!(p.to_api(&Value::Null).unwrap(), Value::Null);
    }
}
