//! Descriptor document loader
//!
//! Parses a compact JSON schema document into a [`SchemaDescriptor`]. The
//! document mirrors the descriptor shape directly (`name`/`kind`/`children`)
//! and additionally supports a local `definitions` table with
//! `{"$ref": "#/definitions/Name"}` nodes. References are substituted inline;
//! a reference chain that loops back on itself is rejected with
//! [`SchemaError::CyclicReference`] rather than unrolled, which is how this
//! core honors the "recursive schemas must be bounded or rejected" rule.
//!
//! Copyright (c) 2026 Canopy Team
//! Licensed under the MIT OR Apache-2.0 license

use crate::descriptor::{
    AttributeDescriptor, NodeDescriptor, NodeKind, ScalarType, SchemaDescriptor,
    DEFAULT_MAX_DEPTH,
};
use crate::error::{SchemaError, SchemaResult};
use serde_json::{Map, Value};

const REF_PREFIX: &str = "#/definitions/";

/// Parse a descriptor document from JSON text
pub fn descriptor_from_json(raw: &str) -> SchemaResult<SchemaDescriptor> {
    let doc: Value = serde_json::from_str(raw)?;
    descriptor_from_value(&doc)
}

/// Parse a descriptor document from an already-parsed JSON value
pub fn descriptor_from_value(doc: &Value) -> SchemaResult<SchemaDescriptor> {
    let obj = doc.as_object().ok_or_else(|| SchemaError::Parse {
        message: format!("descriptor document must be an object, got {}", json_kind(doc)),
    })?;

    let definitions = match obj.get("definitions") {
        Some(Value::Object(map)) => map.clone(),
        Some(other) => {
            return Err(SchemaError::Parse {
                message: format!("'definitions' must be an object, got {}", json_kind(other)),
            })
        }
        None => Map::new(),
    };

    let max_depth = match obj.get("max_depth") {
        Some(v) => v.as_u64().map(|n| n as usize).ok_or_else(|| SchemaError::Parse {
            message: "'max_depth' must be a positive integer".to_string(),
        })?,
        None => DEFAULT_MAX_DEPTH,
    };

    // Either an explicit "root" key, or the document itself is the root node.
    let root_value = obj.get("root").cloned().unwrap_or_else(|| {
        let mut node = obj.clone();
        node.remove("definitions");
        node.remove("max_depth");
        Value::Object(node)
    });

    let mut resolving = Vec::new();
    let root = parse_node(&root_value, "$", &definitions, &mut resolving)?;
    let descriptor = SchemaDescriptor::with_max_depth(root, max_depth);
    descriptor.validate()?;
    Ok(descriptor)
}

fn parse_node(
    value: &Value,
    path: &str,
    definitions: &Map<String, Value>,
    resolving: &mut Vec<String>,
) -> SchemaResult<NodeDescriptor> {
    let obj = value.as_object().ok_or_else(|| SchemaError::Parse {
        message: format!("node at {} must be an object, got {}", path, json_kind(value)),
    })?;

    if let Some(reference) = obj.get("$ref") {
        return resolve_ref(reference, obj, path, definitions, resolving);
    }

    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| SchemaError::MissingField {
            path: path.to_string(),
            field: "name".to_string(),
        })?
        .to_string();

    let kind_str = obj
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| SchemaError::MissingField {
            path: path.to_string(),
            field: "kind".to_string(),
        })?;
    let kind = match kind_str {
        "scalar" => NodeKind::Scalar,
        "object" => NodeKind::Object,
        "array" => NodeKind::Array,
        other => {
            return Err(SchemaError::UnknownKind {
                path: path.to_string(),
                value: other.to_string(),
            })
        }
    };

    let scalar_type = match obj.get("scalar_type").or_else(|| obj.get("type")) {
        Some(v) => Some(parse_scalar_type(v, path)?),
        None => None,
    };

    let required = obj.get("required").and_then(Value::as_bool).unwrap_or(false);

    let mut attributes = Vec::new();
    if let Some(attrs) = obj.get("attributes") {
        let items = attrs.as_array().ok_or_else(|| SchemaError::Parse {
            message: format!("'attributes' at {} must be an array", path),
        })?;
        for item in items {
            let attr = item.as_object().ok_or_else(|| SchemaError::Parse {
                message: format!("attribute entries at {} must be objects", path),
            })?;
            let attr_name = attr
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| SchemaError::MissingField {
                    path: format!("{}@", path),
                    field: "name".to_string(),
                })?
                .to_string();
            let scalar_type = match attr.get("scalar_type").or_else(|| attr.get("type")) {
                Some(v) => parse_scalar_type(v, path)?,
                None => ScalarType::String,
            };
            attributes.push(AttributeDescriptor {
                name: attr_name,
                scalar_type,
            });
        }
    }

    let mut children = Vec::new();
    if let Some(child_values) = obj.get("children") {
        let items = child_values.as_array().ok_or_else(|| SchemaError::Parse {
            message: format!("'children' at {} must be an array", path),
        })?;
        for child in items {
            let child_name = child
                .as_object()
                .and_then(|o| o.get("name"))
                .and_then(Value::as_str)
                .unwrap_or("?");
            let child_path = format!("{}.{}", path, child_name);
            children.push(parse_node(child, &child_path, definitions, resolving)?);
        }
    }

    let element = match obj.get("element") {
        Some(v) => {
            let element_path = format!("{}[]", path);
            Some(Box::new(parse_node(v, &element_path, definitions, resolving)?))
        }
        None => None,
    };

    let pattern = obj
        .get("pattern")
        .and_then(Value::as_str)
        .map(str::to_string);
    let enumeration = match obj.get("enumeration") {
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .map(|v| {
                    v.as_str().map(str::to_string).ok_or_else(|| SchemaError::Parse {
                        message: format!("'enumeration' entries at {} must be strings", path),
                    })
                })
                .collect::<SchemaResult<Vec<_>>>()?,
        ),
        Some(other) => {
            return Err(SchemaError::Parse {
                message: format!("'enumeration' at {} must be an array, got {}", path, json_kind(other)),
            })
        }
        None => None,
    };

    Ok(NodeDescriptor {
        name,
        kind,
        scalar_type,
        required,
        attributes,
        children,
        element,
        pattern,
        enumeration,
    })
}

fn resolve_ref(
    reference: &Value,
    node: &Map<String, Value>,
    path: &str,
    definitions: &Map<String, Value>,
    resolving: &mut Vec<String>,
) -> SchemaResult<NodeDescriptor> {
    let reference = reference.as_str().ok_or_else(|| SchemaError::Parse {
        message: format!("'$ref' at {} must be a string", path),
    })?;
    let def_name = reference
        .strip_prefix(REF_PREFIX)
        .ok_or_else(|| SchemaError::UnresolvedReference {
            reference: reference.to_string(),
            path: path.to_string(),
        })?;

    if resolving.iter().any(|r| r == def_name) {
        let mut chain: Vec<&str> = resolving.iter().map(String::as_str).collect();
        chain.push(def_name);
        return Err(SchemaError::CyclicReference {
            chain: chain.join(" -> "),
        });
    }

    let definition = definitions
        .get(def_name)
        .ok_or_else(|| SchemaError::UnresolvedReference {
            reference: reference.to_string(),
            path: path.to_string(),
        })?;

    resolving.push(def_name.to_string());
    let mut resolved = parse_node(definition, path, definitions, resolving)?;
    resolving.pop();

    // Local overrides on the referencing node win over the definition.
    if let Some(name) = node.get("name").and_then(Value::as_str) {
        resolved.name = name.to_string();
    }
    if let Some(required) = node.get("required").and_then(Value::as_bool) {
        resolved.required = required;
    }
    Ok(resolved)
}

fn parse_scalar_type(value: &Value, path: &str) -> SchemaResult<ScalarType> {
    let text = value.as_str().ok_or_else(|| SchemaError::Parse {
        message: format!("'scalar_type' at {} must be a string", path),
    })?;
    match text {
        "string" => Ok(ScalarType::String),
        "number" => Ok(ScalarType::Number),
        "boolean" => Ok(ScalarType::Boolean),
        "null" => Ok(ScalarType::Null),
        "any" => Ok(ScalarType::Any),
        other => Err(SchemaError::UnknownScalarType {
            path: path.to_string(),
            value: other.to_string(),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
