//! Structural value trees
//!
//! [`Node`] is the single tree currency of the whole system: decoders produce
//! it, the canonical template is one, pooled instances are deep copies of it,
//! the filler mutates it, and serializers consume it. Children and attributes
//! are ordered (`Vec` of pairs, not a hash map) so that template construction
//! stays deterministic and serialized output is stable.
//!
//! Copyright (c) 2026 Canopy Team
//! Licensed under the MIT OR Apache-2.0 license

use crate::descriptor::ScalarType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single typed leaf value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
}

impl ScalarValue {
    /// The type-appropriate zero value for a declared scalar type
    pub fn zero(scalar_type: ScalarType) -> Self {
        match scalar_type {
            ScalarType::String => ScalarValue::String(String::new()),
            ScalarType::Number => ScalarValue::Number(0.0),
            ScalarType::Boolean => ScalarValue::Boolean(false),
            ScalarType::Null | ScalarType::Any => ScalarValue::Null,
        }
    }

    /// The declared type this value inhabits, `Any` for null
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            ScalarValue::Null => ScalarType::Null,
            ScalarValue::Boolean(_) => ScalarType::Boolean,
            ScalarValue::Number(_) => ScalarType::Number,
            ScalarValue::String(_) => ScalarType::String,
        }
    }

    /// Coerce this value into the declared type, if the conversion is
    /// faithful. `None` means the value cannot represent the type and the
    /// caller should skip-and-report.
    pub fn coerce(&self, target: ScalarType) -> Option<ScalarValue> {
        match (self, target) {
            (v, ScalarType::Any) => Some(v.clone()),
            (ScalarValue::String(s), ScalarType::String) => Some(ScalarValue::String(s.clone())),
            (ScalarValue::Number(n), ScalarType::Number) => Some(ScalarValue::Number(*n)),
            (ScalarValue::Boolean(b), ScalarType::Boolean) => Some(ScalarValue::Boolean(*b)),
            (ScalarValue::Null, ScalarType::Null) => Some(ScalarValue::Null),
            // Text formats (XML, CSV) deliver everything as strings; parse
            // into the declared type.
            (ScalarValue::String(s), ScalarType::Number) => {
                s.trim().parse::<f64>().ok().map(ScalarValue::Number)
            }
            (ScalarValue::String(s), ScalarType::Boolean) => match s.trim() {
                "true" | "1" => Some(ScalarValue::Boolean(true)),
                "false" | "0" => Some(ScalarValue::Boolean(false)),
                _ => None,
            },
            // Widening into string is always faithful.
            (ScalarValue::Number(n), ScalarType::String) => {
                Some(ScalarValue::String(format_number(*n)))
            }
            (ScalarValue::Boolean(b), ScalarType::String) => {
                Some(ScalarValue::String(b.to_string()))
            }
            _ => None,
        }
    }

    /// Strict type-conformance test for validation. A value conforms when it
    /// already inhabits the declared type, or is a string whose text parses
    /// as it (text formats deliver everything as strings). Unlike
    /// [`ScalarValue::coerce`], widening a non-string value into a declared
    /// string does not conform: a boolean where the schema says string is a
    /// violation, even though fill could stringify it.
    pub fn conforms_to(&self, declared: ScalarType) -> bool {
        match (self, declared) {
            (_, ScalarType::Any) => true,
            (ScalarValue::String(_), ScalarType::String) => true,
            (ScalarValue::Number(_), ScalarType::Number) => true,
            (ScalarValue::Boolean(_), ScalarType::Boolean) => true,
            (ScalarValue::Null, ScalarType::Null) => true,
            (ScalarValue::String(s), ScalarType::Number) => s.trim().parse::<f64>().is_ok(),
            (ScalarValue::String(s), ScalarType::Boolean) => {
                matches!(s.trim(), "true" | "false" | "1" | "0")
            }
            (ScalarValue::String(s), ScalarType::Null) => s.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => write!(f, ""),
            ScalarValue::Boolean(b) => write!(f, "{}", b),
            ScalarValue::Number(n) => write!(f, "{}", format_number(*n)),
            ScalarValue::String(s) => write!(f, "{}", s),
        }
    }
}

/// Render a number without a trailing `.0` for integral values
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// One node of a structural value tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Scalar(ScalarValue),
    Object {
        /// Named children in document/declaration order; duplicate names are
        /// permitted (repeated XML elements decode this way)
        children: Vec<(String, Node)>,
        /// String attributes in declaration order
        attributes: Vec<(String, String)>,
    },
    Array(Vec<Node>),
}

impl Node {
    /// An empty object node
    pub fn object() -> Self {
        Node::Object {
            children: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// A string scalar node
    pub fn string<S: Into<String>>(value: S) -> Self {
        Node::Scalar(ScalarValue::String(value.into()))
    }

    /// A number scalar node
    pub fn number(value: f64) -> Self {
        Node::Scalar(ScalarValue::Number(value))
    }

    /// A boolean scalar node
    pub fn boolean(value: bool) -> Self {
        Node::Scalar(ScalarValue::Boolean(value))
    }

    /// Category name for diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Scalar(_) => "scalar",
            Node::Object { .. } => "object",
            Node::Array(_) => "array",
        }
    }

    /// First child with the given name, if this is an object
    pub fn child(&self, name: &str) -> Option<&Node> {
        match self {
            Node::Object { children, .. } => children
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, node)| node),
            _ => None,
        }
    }

    /// Mutable access to the first child with the given name
    pub fn child_mut(&mut self, name: &str) -> Option<&mut Node> {
        match self {
            Node::Object { children, .. } => children
                .iter_mut()
                .find(|(n, _)| n == name)
                .map(|(_, node)| node),
            _ => None,
        }
    }

    /// All children with the given name, in order (repeated XML elements)
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> {
        let children: &[(String, Node)] = match self {
            Node::Object { children, .. } => children,
            _ => &[],
        };
        children
            .iter()
            .filter(move |(n, _)| n == name)
            .map(|(_, node)| node)
    }

    /// Append a named child to an object node; no-op on other kinds
    pub fn push_child<S: Into<String>>(&mut self, name: S, node: Node) {
        if let Node::Object { children, .. } = self {
            children.push((name.into(), node));
        }
    }

    /// Attribute value by name, if this is an object
    pub fn attribute(&self, name: &str) -> Option<&str> {
        match self {
            Node::Object { attributes, .. } => attributes
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    /// Set an attribute, replacing any existing value under that name
    pub fn set_attribute<S: Into<String>, V: Into<String>>(&mut self, name: S, value: V) {
        if let Node::Object { attributes, .. } = self {
            let name = name.into();
            match attributes.iter_mut().find(|(n, _)| *n == name) {
                Some((_, slot)) => *slot = value.into(),
                None => attributes.push((name, value.into())),
            }
        }
    }

    /// Resolve a dotted/indexed path like `Customer.Email` or `Items[1].Sku`,
    /// relative to this node
    pub fn at_path(&self, path: &str) -> Option<&Node> {
        let mut current = self;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            let (name, index) = match segment.find('[') {
                Some(open) => {
                    let close = segment.rfind(']')?;
                    let index: usize = segment[open + 1..close].parse().ok()?;
                    (&segment[..open], Some(index))
                }
                None => (segment, None),
            };
            if !name.is_empty() {
                current = current.child(name)?;
            }
            if let Some(index) = index {
                match current {
                    Node::Array(items) => current = items.get(index)?,
                    _ => return None,
                }
            }
        }
        Some(current)
    }

    /// True when both trees have the same shape: kinds match, object child
    /// names and attribute names match in order. Leaf values and array
    /// contents are ignored.
    pub fn is_congruent_with(&self, other: &Node) -> bool {
        match (self, other) {
            (Node::Scalar(_), Node::Scalar(_)) => true,
            (Node::Array(_), Node::Array(_)) => true,
            (
                Node::Object {
                    children: a,
                    attributes: aa,
                },
                Node::Object {
                    children: b,
                    attributes: ba,
                },
            ) => {
                a.len() == b.len()
                    && aa.len() == ba.len()
                    && a.iter()
                        .zip(b)
                        .all(|((an, av), (bn, bv))| an == bn && av.is_congruent_with(bv))
                    && aa.iter().zip(ba).all(|((an, _), (bn, _))| an == bn)
            }
            _ => false,
        }
    }
}
