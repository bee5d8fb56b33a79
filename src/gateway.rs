// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! [`GatewaySpec`]: expands a loaded [`Model`] back into a complete OpenAPI 3
//! document with CRUD paths per entity, for consumption by external
//! deployment tooling. The core service never performs deployment itself.

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::{json, Map, Value};

use crate::model::{Model, SchemaObject};

/// An invoke target the generated paths delegate to — an API Gateway
/// Lambda-proxy integration, kept generic here since this crate does not
/// perform deployment itself.
pub struct IntegrationTarget {
    pub function_name: String,
    pub invoke_arn: String,
}

/// Builds a complete OpenAPI document: the loaded model's own document with
/// `x-am-*` attributes stripped, CRUD paths appended per entity, and schema
/// names sanitized so external tooling never chokes on the raw entity name.
pub struct GatewaySpec {
    document: Value,
}

impl GatewaySpec {
    pub fn build(model: &Model, target: &IntegrationTarget, enable_cors: bool) -> Self {
        let mut document = strip_vendor_attributes(model.document.clone());
        let sanitized_names = sanitize_schema_names(&mut document, model);

        for entity in model.schema_names().map(str::to_string).collect::<Vec<_>>() {
            let schema = model.schema_object(&entity).expect("listed by schema_names");
            let sanitized = sanitized_names.get(&entity).cloned().unwrap_or_else(|| entity.clone());
            add_crud_operations(&mut document, &entity, &sanitized, schema, target);
        }

        if enable_cors {
            enable_cors_preflight(&mut document);
        }

        Self { document }
    }

    pub fn as_json(&self) -> String {
        serde_json::to_string(&self.document).expect("documents built here always serialize")
    }

    pub fn as_yaml(&self) -> String {
        serde_yaml::to_string(&self.document).expect("documents built here always serialize")
    }
}

/// Strip every `x-am-*` vendor extension key from the document, recursively.
fn strip_vendor_attributes(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(k, _)| !k.starts_with("x-am-"))
                .map(|(k, v)| (k, strip_vendor_attributes(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_vendor_attributes).collect()),
        other => other,
    }
}

fn add_operation(document: &mut Value, path: &str, method: &str, operation: Value, target: &IntegrationTarget) {
    let mut operation = operation;
    if let Value::Object(obj) = &mut operation {
        obj.insert("x-function-name".to_string(), Value::String(target.function_name.clone()));
        obj.insert(
            "x-amazon-apigateway-integration".to_string(),
            json!({
                "type": "aws_proxy",
                "uri": target.invoke_arn,
                "httpMethod": "POST",
                "responses": {"default": {"statusCode": "200"}},
                "passthroughBehavior": "when_no_match",
                "payloadFormatVersion": "1.0",
            }),
        );
    }

    let paths = document
        .as_object_mut()
        .expect("document root is an object")
        .entry("paths")
        .or_insert_with(|| Value::Object(Map::new()));
    let path_item = paths
        .as_object_mut()
        .expect("paths is an object")
        .entry(path)
        .or_insert_with(|| Value::Object(Map::new()));
    path_item
        .as_object_mut()
        .expect("path item is an object")
        .insert(method.to_string(), operation);
}

fn list_of_schema(schema_name: &str) -> Value {
    json!({
        "application/json": {
            "schema": {"type": "array", "items": {"$ref": format!("#/components/schemas/{schema_name}")}},
        }
    })
}

/// Query-parameter list for this entity's filterable properties, each
/// admitting a plain value or any `<op>::<value>` form.
fn query_parameters(schema: &SchemaObject) -> Vec<Value> {
    schema
        .properties
        .values()
        .map(|property| {
            json!({
                "in": "query",
                "name": property.name,
                "required": false,
                "schema": {"type": property.api_type, "pattern": operator_regex(&property.api_type)},
                "description": format!("Filter by {}", property.name),
            })
        })
        .collect()
}

/// The base pattern admitting a bare value plus every `<op>::<value>` form
/// documented for query parameters.
fn operator_regex(api_type: &str) -> String {
    let base = match api_type {
        "integer" => r"\d+",
        "number" => r"\d+(\.\d+)?",
        "date" => r"\d{4}-\d{2}-\d{2}",
        "date-time" => r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}",
        _ => ".*",
    };
    format!(
        "^(({base})|lt::{base}|le::{base}|eq::{base}|ne::{base}|gt::{base}|ge::{base}\
         |between::{base},{base}|not-between::{base},{base}\
         |in::({base},)*{base}|not-in::({base},)*{base})$"
    )
}

fn request_body(schema: &SchemaObject, required_names: &[String]) -> Value {
    let properties: Map<String, Value> = schema
        .properties
        .values()
        .map(|p| (p.name.clone(), json!({"type": p.api_type})))
        .collect();
    json!({
        "required": !required_names.is_empty(),
        "content": {
            "application/json": {
                "schema": {
                    "type": "object",
                    "properties": properties,
                    "required": required_names,
                }
            }
        }
    })
}

fn add_crud_operations(
    document: &mut Value,
    entity: &str,
    sanitized: &str,
    schema: &SchemaObject,
    target: &IntegrationTarget,
) {
    let path = format!("/{sanitized}");

    add_operation(
        document,
        &path,
        "post",
        json!({
            "summary": format!("Create a new {entity}"),
            "requestBody": request_body(schema, &schema.required),
            "responses": {"201": {"description": format!("{entity} created successfully"), "content": list_of_schema(sanitized)}},
        }),
        target,
    );

    add_operation(
        document,
        &path,
        "get",
        json!({
            "summary": format!("Retrieve all {entity}"),
            "parameters": query_parameters(schema),
            "responses": {"200": {"description": format!("A list of {entity}."), "content": list_of_schema(sanitized)}},
        }),
        target,
    );

    let Some(key) = &schema.primary_key else { return };
    let by_id_path = format!("{path}/{{{}}}", key.name());
    let key_param = json!({
        "name": key.name(),
        "in": "path",
        "description": format!("ID of the {entity}"),
        "required": true,
        "schema": {"type": key.property.api_type},
    });

    add_operation(
        document,
        &by_id_path,
        "get",
        json!({
            "summary": format!("Retrieve {entity} by {}", key.name()),
            "parameters": [key_param.clone()],
            "responses": {"200": {"description": format!("A single {entity}."), "content": list_of_schema(sanitized)}},
        }),
        target,
    );

    match &schema.concurrency_property {
        None => {
            add_operation(
                document,
                &by_id_path,
                "put",
                json!({
                    "summary": format!("Update an existing {entity} by {}", key.name()),
                    "parameters": [key_param.clone()],
                    "requestBody": request_body(schema, &[]),
                    "responses": {"200": {"description": format!("{entity} updated successfully"), "content": list_of_schema(sanitized)}},
                }),
                target,
            );
            add_operation(
                document,
                &path,
                "put",
                json!({
                    "summary": format!("Update existing {entity} rows matching the query"),
                    "parameters": query_parameters(schema),
                    "requestBody": request_body(schema, &[]),
                    "responses": {"200": {"description": format!("{entity} updated successfully"), "content": list_of_schema(sanitized)}},
                }),
                target,
            );
            add_operation(
                document,
                &by_id_path,
                "delete",
                json!({
                    "summary": format!("Delete an existing {entity} by {}", key.name()),
                    "parameters": [key_param.clone()],
                    "responses": {"204": {"description": format!("{entity} deleted successfully")}},
                }),
                target,
            );
            add_operation(
                document,
                &path,
                "delete",
                json!({
                    "summary": format!("Delete existing {entity} rows matching the query"),
                    "parameters": query_parameters(schema),
                    "responses": {"204": {"description": format!("{entity} deleted successfully")}},
                }),
                target,
            );
        }
        Some(cc) => {
            let versioned_path = format!("{by_id_path}/{}/{{{}}}", cc.name(), cc.name());
            let cc_param = json!({
                "name": cc.name(),
                "in": "path",
                "description": format!("{} of the {entity} to update", cc.name()),
                "required": true,
                "schema": {"type": cc.property.api_type},
            });
            add_operation(
                document,
                &versioned_path,
                "put",
                json!({
                    "summary": format!("Update an existing {entity} by {} with a concurrency token", key.name()),
                    "parameters": [key_param.clone(), cc_param.clone()],
                    "requestBody": request_body(schema, &[]),
                    "responses": {"200": {"description": format!("{entity} updated successfully"), "content": list_of_schema(sanitized)}},
                }),
                target,
            );
            add_operation(
                document,
                &versioned_path,
                "delete",
                json!({
                    "summary": format!("Delete an existing {entity} by {} with a concurrency token", key.name()),
                    "parameters": [key_param, cc_param],
                    "responses": {"204": {"description": format!("{entity} deleted successfully")}},
                }),
                target,
            );
        }
    }
}

fn enable_cors_preflight(document: &mut Value) {
    document.as_object_mut().expect("document root is an object").insert(
        "x-amazon-apigateway-cors".to_string(),
        json!({
            "allowOrigins": ["*"],
            "allowCredentials": true,
            "allowMethods": ["GET", "POST", "OPTIONS", "PUT", "PATCH", "DELETE"],
            "allowHeaders": ["Origin", "X-Requested-With", "Content-Type", "Accept", "Authorization"],
        }),
    );

    let paths = document
        .as_object_mut()
        .expect("document root is an object")
        .entry("paths")
        .or_insert_with(|| Value::Object(Map::new()));
    paths.as_object_mut().expect("paths is an object").insert(
        "/{proxy+}".to_string(),
        json!({
            "options": {
                "responses": {"200": {"description": "200 response"}},
                "x-amazon-apigateway-integration": {
                    "responses": {
                        "default": {
                            "statusCode": "200",
                            "responseParameters": {
                                "method.response.header.Access-Control-Allow-Methods": "'DELETE,GET,HEAD,OPTIONS,PATCH,POST,PUT'",
                                "method.response.header.Access-Control-Allow-Headers": "'Content-Type,Authorization,X-Amz-Date,X-Api-Key,X-Amz-Security-Token'",
                                "method.response.header.Access-Control-Allow-Origin": "'*'",
                            },
                            "responseTemplates": {"application/json": ""},
                        },
                    },
                    "passthroughBehavior": "never",
                    "type": "mock",
                },
            }
        }),
    );
}

/// Strips non-alphanumeric characters from every `components.schemas` key —
/// derived from the same entity name [`add_crud_operations`] builds paths
/// and refs from, not from the raw document key — and rewrites every
/// `#/components/schemas/<name>` ref to match. Returns the entity → sanitized
/// name mapping so callers can reuse it for paths and refs.
fn sanitize_schema_names(document: &mut Value, model: &Model) -> BTreeMap<String, String> {
    let non_alphanumeric = Regex::new("[^a-zA-Z0-9]").unwrap();
    let mut entity_to_sanitized = BTreeMap::new();

    let Some(schemas) = document.pointer_mut("/components/schemas").and_then(Value::as_object_mut) else {
        return entity_to_sanitized;
    };

    let mut ref_mapping = Vec::new();
    let mut renamed = Map::new();
    for (raw_name, def) in std::mem::take(schemas) {
        let entity = model
            .schema_object(&raw_name)
            .map(|s| s.entity.clone())
            .unwrap_or_else(|_| raw_name.clone());
        let sanitized = non_alphanumeric.replace_all(&entity, "").to_string();
        ref_mapping.push((raw_name, sanitized.clone()));
        entity_to_sanitized.insert(entity, sanitized.clone());
        renamed.insert(sanitized, def);
    }
    *document.pointer_mut("/components/schemas").unwrap() = Value::Object(renamed);

    rewrite_refs(document, &ref_mapping);
    entity_to_sanitized
}

fn rewrite_refs(value: &mut Value, mapping: &[(String, String)]) {
    match value {
        Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if key == "$ref" {
                    if let Value::String(s) = v {
                        if let Some(original) = s.strip_prefix("#/components/schemas/") {
                            if let Some((_, fixed)) = mapping.iter().find(|(orig, _)| orig == original) {
                                *s = format!("#/components/schemas/{fixed}");
                            }
                        }
                    }
                    continue;
                }
                rewrite_refs(v, mapping);
            }
        }
        Value::Array(items) => {
            for item in items {
                rewrite_refs(item, mapping);
            }
        }
        _ => {}
    }
}
