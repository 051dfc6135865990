//! JSON codec
//!
//! Decoding goes through `serde_json`; parse failures carry the position the
//! parser reports. Attributes have no native JSON spelling, so the renderer
//! writes them as `@`-prefixed keys and the decoder folds such keys back into
//! attributes.
//!
//! Copyright (c) 2026 Canopy Team
//! Licensed under the MIT OR Apache-2.0 license

use super::{CodecError, Decoder, Renderer};
use canopy_schemas::{Node, ScalarValue};
use serde_json::{Map, Number, Value};

/// serde_json-backed decoder
#[derive(Debug, Default)]
pub struct JsonDecoder;

impl Decoder for JsonDecoder {
    fn decode(&self, raw: &str) -> Result<Node, CodecError> {
        let value: Value = serde_json::from_str(raw).map_err(|e| {
            CodecError::parse_at("json", e.to_string(), e.line() as u32, e.column() as u32)
        })?;
        Ok(value_to_node(&value))
    }
}

fn value_to_node(value: &Value) -> Node {
    match value {
        Value::Null => Node::Scalar(ScalarValue::Null),
        Value::Bool(b) => Node::boolean(*b),
        Value::Number(n) => Node::number(n.as_f64().unwrap_or(0.0)),
        Value::String(s) => Node::string(s.clone()),
        Value::Array(items) => Node::Array(items.iter().map(value_to_node).collect()),
        Value::Object(map) => {
            let mut children = Vec::new();
            let mut attributes = Vec::new();
            for (key, item) in map {
                match key.strip_prefix('@') {
                    Some(attr) => attributes.push((attr.to_string(), value_to_text(item))),
                    None => children.push((key.clone(), value_to_node(item))),
                }
            }
            Node::Object {
                children,
                attributes,
            }
        }
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// serde_json-backed renderer
#[derive(Debug, Default)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render(&self, tree: &Node) -> Result<String, CodecError> {
        let value = node_to_value(tree);
        serde_json::to_string(&value).map_err(|e| CodecError::Render {
            format: "json",
            message: e.to_string(),
        })
    }
}

fn node_to_value(node: &Node) -> Value {
    match node {
        Node::Scalar(ScalarValue::Null) => Value::Null,
        Node::Scalar(ScalarValue::Boolean(b)) => Value::Bool(*b),
        // Integral values render without a trailing ".0", matching the
        // textual formats (and the shape they decoded from).
        Node::Scalar(ScalarValue::Number(n)) if n.fract() == 0.0 && n.abs() < 1e15 => {
            Value::Number(Number::from(*n as i64))
        }
        Node::Scalar(ScalarValue::Number(n)) => Number::from_f64(*n)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Node::Scalar(ScalarValue::String(s)) => Value::String(s.clone()),
        Node::Array(items) => Value::Array(items.iter().map(node_to_value).collect()),
        Node::Object {
            children,
            attributes,
        } => {
            let mut map = Map::new();
            for (name, value) in attributes {
                map.insert(format!("@{}", name), Value::String(value.clone()));
            }
            for (name, child) in children {
                // Duplicate names (repeated XML elements) collapse into an
                // array under the shared key.
                match map.get_mut(name) {
                    Some(Value::Array(existing)) => existing.push(node_to_value(child)),
                    Some(existing) => {
                        let first = existing.take();
                        *existing = Value::Array(vec![first, node_to_value(child)]);
                    }
                    None => {
                        map.insert(name.clone(), node_to_value(child));
                    }
                }
            }
            Value::Object(map)
        }
    }
}
