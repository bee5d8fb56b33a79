// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! [`Operation`]: the inert request value consumed by exactly one
//! [`crate::dao::OperationDAO`] call.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiMakerError;

/// CRUD action an [`Operation`] requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn from_str(value: &str) -> Result<Self, ApiMakerError> {
        match value {
            "read" => Ok(Self::Read),
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(ApiMakerError::BadRequest(format!(
                "unknown action: {other}"
            ))),
        }
    }
}

/// Recognized `metadata_params` keys.
#[derive(Debug, Clone, Default)]
pub struct MetadataParams {
    /// The selector expression (see [`crate::query::selector`]).
    pub properties: Option<String>,
    /// Whether the request wants a row count instead of the rows themselves.
    pub count: bool,
}

impl MetadataParams {
    fn from_map(map: &HashMap<String, Value>) -> Self {
        Self {
            properties: map
                .get("properties")
                .and_then(Value::as_str)
                .map(str::to_string),
            count: map.get("count").and_then(Value::as_bool).unwrap_or(false),
        }
    }
}

/// A single, short-lived request: which entity, which action, and the
/// parameters driving the compiled SQL.
#[derive(Debug, Clone)]
pub struct Operation {
    pub entity: String,
    pub action: Action,
    pub query_params: HashMap<String, Value>,
    pub store_params: HashMap<String, Value>,
    pub metadata_params: MetadataParams,
}

impl Operation {
    pub fn new(entity: impl Into<String>, action: Action) -> Self {
        Self {
            entity: entity.into(),
            action,
            query_params: HashMap::new(),
            store_params: HashMap::new(),
            metadata_params: MetadataParams::default(),
        }
    }

    /// Build an Operation from the wire shape described in the external
    /// interfaces section: `{entity, action, query_params, store_params,
    /// metadata_params}`.
    pub fn from_wire(wire: &Value) -> Result<Self, ApiMakerError> {
        let entity = wire
            .get("entity")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiMakerError::BadRequest("missing entity".to_string()))?
            .to_string();
        let action = Action::from_str(
            wire.get("action")
                .and_then(Value::as_str)
                .ok_or_else(|| ApiMakerError::BadRequest("missing action".to_string()))?,
        )?;

        let query_params = object_map(wire.get("query_params"));
        let store_params = object_map(wire.get("store_params"));
        let metadata_params = MetadataParams::from_map(&object_map(wire.get("metadata_params")));

        Ok(Self {
            entity,
            action,
            query_params,
            store_params,
            metadata_params,
        })
    }
}

fn object_map(value: Option<&Value>) -> HashMap<String, Value> {
    value
        .and_then(Value::as_object)
        .map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}
