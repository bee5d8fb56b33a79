// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Loads an augmented OpenAPI document into an immutable [`Model`].

use std::collections::BTreeMap;

use convert_case::{Case, Casing};
use serde_json::Value;

use super::{
    Cardinality, Dialect, Key, KeyType, Property, Relation, SchemaObject, VersionProperty,
    VersionType,
};
use crate::error::ApiMakerError;

/// The parsed, immutable model of every entity declared in the loaded
/// OpenAPI document. Built once at startup and shared read-only across
/// requests.
#[derive(Debug, Clone)]
pub struct Model {
    schemas: BTreeMap<String, SchemaObject>,
    /// The raw parsed document, kept for [`crate::gateway::GatewaySpec`],
    /// which needs to re-derive an OpenAPI document from the same source.
    pub(crate) document: Value,
}

impl Model {
    /// Entity names normalized to the model's canonical lowercase-dash form.
    pub fn schema_names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    /// Look up a schema by entity name, normalizing the same way load does.
    pub fn schema_object(&self, entity: &str) -> Result<&SchemaObject, ApiMakerError> {
        self.schemas
            .get(&normalize(entity))
            .ok_or_else(|| ApiMakerError::Spec(format!("unknown entity: {entity}")))
    }
}

/// Entry point: parses an OpenAPI document into a [`Model`].
pub struct ModelFactory;

impl ModelFactory {
    /// Load the document named by the `API_SPEC` environment variable.
    pub fn from_env() -> Result<Model, ApiMakerError> {
        let path = std::env::var("API_SPEC")
            .map_err(|_| ApiMakerError::Spec("API_SPEC is not set".to_string()))?;
        let bytes = std::fs::read(&path)
            .map_err(|e| ApiMakerError::Spec(format!("cannot read {path}: {e}")))?;
        Self::load(&bytes)
    }

    /// Parse a YAML or JSON OpenAPI document (the same deserializer handles
    /// both, since every JSON document is valid YAML).
    pub fn load(bytes: &[u8]) -> Result<Model, ApiMakerError> {
        let document: Value = serde_yaml::from_slice(bytes)
            .map_err(|e| ApiMakerError::Spec(format!("invalid spec document: {e}")))?;

        let schemas_value = document
            .pointer("/components/schemas")
            .ok_or_else(|| ApiMakerError::Spec("missing components.schemas".to_string()))?
            .as_object()
            .ok_or_else(|| ApiMakerError::Spec("components.schemas is not an object".to_string()))?;

        let mut schemas = BTreeMap::new();
        for (raw_name, def) in schemas_value {
            let name = normalize(raw_name);
            let schema_object = parse_schema_object(&name, def)?;
            schemas.insert(name, schema_object);
        }

        resolve_relation_defaults(&mut schemas)?;

        for schema in schemas.values() {
            for relation in schema.relations.values() {
                if !schemas.contains_key(&relation.child_entity) {
                    return Err(ApiMakerError::Spec(format!(
                        "relation {} on {} targets unknown entity {}",
                        relation.name, schema.entity, relation.child_entity
                    )));
                }
            }
        }

        tracing::info!(entities = schemas.len(), "model loaded");
        Ok(Model { schemas, document })
    }
}

/// Lowercase, underscores-to-dashes normalization applied to every entity
/// and relation-target lookup, so `invoice_line` and `InvoiceLine` resolve
/// to the same schema object.
pub(crate) fn normalize(name: &str) -> String {
    name.to_case(Case::Kebab)
}

fn str_attr<'a>(def: &'a Value, key: &str) -> Option<&'a str> {
    def.get(key).and_then(Value::as_str)
}

fn parse_schema_object(name: &str, def: &Value) -> Result<SchemaObject, ApiMakerError> {
    let engine = Dialect::from_str(
        str_attr(def, "x-am-engine")
            .ok_or_else(|| ApiMakerError::Spec(format!("{name}: missing x-am-engine")))?,
    )?;
    let database = str_attr(def, "x-am-database")
        .ok_or_else(|| ApiMakerError::Spec(format!("{name}: missing x-am-database")))?
        .to_string();
    let table = str_attr(def, "x-am-table").unwrap_or(name).to_string();

    let required: Vec<String> = def
        .get("required")
        .and_then(Value::as_array)
        .map(|v| {
            v.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let mut properties = BTreeMap::new();
    let mut relations = BTreeMap::new();
    let mut primary_key = None;
    let mut concurrency_property = None;

    let props = def
        .get("properties")
        .and_then(Value::as_object)
        .ok_or_else(|| ApiMakerError::Spec(format!("{name}: missing properties")))?;

    for (prop_name, prop_def) in props {
        if let Some(target) = str_attr(prop_def, "x-am-schema-object") {
            let cardinality = Cardinality::from_str(
                str_attr(prop_def, "x-am-cardinality").unwrap_or("1:m"),
            )?;
            relations.insert(
                prop_name.clone(),
                Relation {
                    name: prop_name.clone(),
                    cardinality,
                    child_entity: normalize(target),
                    parent_property: str_attr(prop_def, "x-am-parent-property")
                        .unwrap_or_default()
                        .to_string(),
                    child_property: str_attr(prop_def, "x-am-child-property")
                        .unwrap_or_default()
                        .to_string(),
                    left_join: true,
                },
            );
            continue;
        }

        let api_type = str_attr(prop_def, "type")
            .ok_or_else(|| ApiMakerError::Spec(format!("{name}.{prop_name}: missing type")))?
            .to_string();
        let column_type = str_attr(prop_def, "x-am-column-type")
            .unwrap_or(&api_type)
            .to_string();

        let mut property = Property::new(prop_name.clone(), api_type)
            .with_column_type(column_type)
            .with_column_name(str_attr(prop_def, "x-am-column-name").unwrap_or(prop_name));
        property.max_length = prop_def
            .get("maxLength")
            .and_then(Value::as_u64)
            .map(|v| v as usize);
        property.min_length = prop_def
            .get("minLength")
            .and_then(Value::as_u64)
            .map(|v| v as usize);
        property.pattern = str_attr(prop_def, "pattern").map(str::to_string);

        if let Some(key_marker) = str_attr(prop_def, "x-am-primary-key") {
            let key_type = match key_marker {
                "required" => KeyType::Required,
                "auto" => KeyType::Auto,
                "sequence" => {
                    let seq = str_attr(prop_def, "x-am-sequence-name").ok_or_else(|| {
                        ApiMakerError::Spec(format!(
                            "{name}.{prop_name}: sequence key missing x-am-sequence-name"
                        ))
                    })?;
                    KeyType::Sequence(seq.to_string())
                }
                other => {
                    return Err(ApiMakerError::Spec(format!(
                        "{name}.{prop_name}: unknown primary-key marker {other}"
                    )));
                }
            };
            if primary_key.is_some() {
                return Err(ApiMakerError::Spec(format!(
                    "{name}: more than one primary key declared"
                )));
            }
            primary_key = Some(Key::new(property.clone(), key_type));
        }

        if let Some(version_marker) = str_attr(prop_def, "x-am-version") {
            if concurrency_property.is_some() {
                return Err(ApiMakerError::Spec(format!(
                    "{name}: more than one version property declared"
                )));
            }
            concurrency_property = Some(VersionProperty {
                property: property.clone(),
                version_type: VersionType::from_str(version_marker)?,
            });
        }

        properties.insert(prop_name.clone(), property);
    }

    Ok(SchemaObject {
        entity: name.to_string(),
        engine,
        database,
        table,
        properties,
        relations,
        primary_key,
        concurrency_property,
        required,
    })
}

/// Fills in default `parent_property`/`child_property` (the respective
/// primary keys) for relations that did not declare them explicitly.
fn resolve_relation_defaults(
    schemas: &mut BTreeMap<String, SchemaObject>,
) -> Result<(), ApiMakerError> {
    let primary_keys: BTreeMap<String, String> = schemas
        .iter()
        .filter_map(|(name, so)| so.primary_key.as_ref().map(|k| (name.clone(), k.name().to_string())))
        .collect();

    for schema in schemas.values_mut() {
        let own_pk = primary_keys.get(&schema.entity).cloned();
        for relation in schema.relations.values_mut() {
            if relation.parent_property.is_empty() {
                relation.parent_property = own_pk.clone().ok_or_else(|| {
                    ApiMakerError::Spec(format!(
                        "relation {} on {} has no parent_property and {} has no primary key",
                        relation.name, schema.entity, schema.entity
                    ))
                })?;
            }
            if relation.child_property.is_empty() {
                relation.child_property = primary_keys
                    .get(&relation.child_entity)
                    .cloned()
                    .ok_or_else(|| {
                        ApiMakerError::Spec(format!(
                            "relation {} on {} has no child_property and {} has no primary key",
                            relation.name, schema.entity, relation.child_entity
                        ))
                    })?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC: &str = r#"
components:
  schemas:
    Invoice:
      x-am-engine: postgres
      x-am-database: chinook
      required: [invoice_id]
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
        customer:
          x-am-schema-object: Customer
          x-am-cardinality: "1:1"
    Customer:
      x-am-engine: postgres
      x-am-database: chinook
      properties:
        customer_id:
          type: integer
          x-am-primary-key: required
"#;

    #[test]
    fn loads_entities_normalized() {
        let model = ModelFactory::load(SPEC.as_bytes()).unwrap();
        assert!(model.schema_object("Invoice").is_ok());
        assert!(model.schema_object("invoice").is_ok());
        let so = model.schema_object("invoice").unwrap();
        assert_eq!(so.table_name(), "chinook.invoice");
        assert!(so.primary_key.is_some());
        assert!(so.concurrency_property.is_some());
    }

    #[test]
    fn relation_defaults_to_primary_keys() {
        let model = ModelFactory::load(SPEC.as_bytes()).unwrap();
        let invoice = model.schema_object("invoice").unwrap();
        let rel = invoice.relation("customer").unwrap();
        assert_eq!(rel.parent_property, "invoice_id");
        assert_eq!(rel.child_property, "customer_id");
        assert_eq!(rel.child_entity, "customer");
    }

    #[test]
    fn unresolved_relation_target_is_fatal() {
        let bad = SPEC.replace("x-am-schema-object: Customer", "x-am-schema-object: Ghost");
        assert!(ModelFactory::load(bad.as_bytes()).is_err());
    }
}
