//! Format-neutral schema descriptors
//!
//! A [`SchemaDescriptor`] is the structural shape of a schema with its
//! original syntax (XSD-like, JSON-Schema-like, tabular) stripped away. It
//! drives both canonical template construction and conformance checking, so
//! both sides of the system agree on one node ordering and one set of types.
//!
//! Copyright (c) 2026 Canopy Team
//! Licensed under the MIT OR Apache-2.0 license

use crate::error::{SchemaError, SchemaResult};
use serde::{Deserialize, Serialize};

/// Default cap on descriptor depth; deeper schemas are rejected at init
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Structural category of a schema node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A leaf holding a single typed value
    Scalar,
    /// Named children plus string attributes
    Object,
    /// Homogeneous sequence of elements
    Array,
}

/// Declared type of a scalar leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    String,
    Number,
    Boolean,
    Null,
    /// Accepts any scalar value without coercion
    Any,
}

/// An attribute slot on an object node (name plus scalar type)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    pub name: String,
    #[serde(default = "default_attr_type")]
    pub scalar_type: ScalarType,
}

fn default_attr_type() -> ScalarType {
    ScalarType::String
}

/// One node in the descriptor tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub name: String,
    pub kind: NodeKind,

    /// Required when `kind` is `Scalar`; ignored otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scalar_type: Option<ScalarType>,

    /// Whether the node must be present in a conforming message
    #[serde(default)]
    pub required: bool,

    /// Declared attributes (object nodes only), in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeDescriptor>,

    /// Child descriptors (object nodes only), in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeDescriptor>,

    /// Element shape (array nodes only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<Box<NodeDescriptor>>,

    /// Regular-expression facet for string scalars
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Closed value set for string scalars
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enumeration: Option<Vec<String>>,
}

impl NodeDescriptor {
    /// Create a scalar leaf descriptor
    pub fn scalar<N: Into<String>>(name: N, scalar_type: ScalarType) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Scalar,
            scalar_type: Some(scalar_type),
            required: false,
            attributes: Vec::new(),
            children: Vec::new(),
            element: None,
            pattern: None,
            enumeration: None,
        }
    }

    /// Create an object descriptor with the given children
    pub fn object<N: Into<String>>(name: N, children: Vec<NodeDescriptor>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Object,
            scalar_type: None,
            required: false,
            attributes: Vec::new(),
            children,
            element: None,
            pattern: None,
            enumeration: None,
        }
    }

    /// Create an array descriptor with the given element shape
    pub fn array<N: Into<String>>(name: N, element: NodeDescriptor) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Array,
            scalar_type: None,
            required: false,
            attributes: Vec::new(),
            children: Vec::new(),
            element: Some(Box::new(element)),
            pattern: None,
            enumeration: None,
        }
    }

    /// Mark this node as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Attach an attribute descriptor
    pub fn with_attribute<N: Into<String>>(mut self, name: N, scalar_type: ScalarType) -> Self {
        self.attributes.push(AttributeDescriptor {
            name: name.into(),
            scalar_type,
        });
        self
    }

    /// Attach a `pattern` facet
    pub fn with_pattern<P: Into<String>>(mut self, pattern: P) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Attach an `enumeration` facet
    pub fn with_enumeration(mut self, values: Vec<String>) -> Self {
        self.enumeration = Some(values);
        self
    }

    /// Find a direct child by name
    pub fn child(&self, name: &str) -> Option<&NodeDescriptor> {
        self.children.iter().find(|c| c.name == name)
    }

    fn validate_at(&self, path: &str, depth: usize, max_depth: usize) -> SchemaResult<()> {
        if depth > max_depth {
            return Err(SchemaError::DepthExceeded {
                path: path.to_string(),
                max_depth,
            });
        }
        if self.name.is_empty() {
            return Err(SchemaError::MissingField {
                path: path.to_string(),
                field: "name".to_string(),
            });
        }

        match self.kind {
            NodeKind::Scalar => {
                if self.scalar_type.is_none() {
                    return Err(SchemaError::MissingField {
                        path: path.to_string(),
                        field: "scalar_type".to_string(),
                    });
                }
                if !self.children.is_empty() || self.element.is_some() {
                    return Err(SchemaError::Malformed {
                        path: path.to_string(),
                        message: "scalar nodes cannot carry children or an element shape"
                            .to_string(),
                    });
                }
                let is_string = matches!(self.scalar_type, Some(ScalarType::String));
                if (self.pattern.is_some() || self.enumeration.is_some()) && !is_string {
                    return Err(SchemaError::Malformed {
                        path: path.to_string(),
                        message: "pattern and enumeration facets apply to string scalars only"
                            .to_string(),
                    });
                }
                if let Some(pattern) = &self.pattern {
                    regex::Regex::new(pattern).map_err(|e| SchemaError::InvalidPattern {
                        path: path.to_string(),
                        pattern: pattern.clone(),
                        message: e.to_string(),
                    })?;
                }
            }
            NodeKind::Object => {
                if self.element.is_some() {
                    return Err(SchemaError::Malformed {
                        path: path.to_string(),
                        message: "object nodes cannot carry an element shape".to_string(),
                    });
                }
                for (i, child) in self.children.iter().enumerate() {
                    if self.children[..i].iter().any(|c| c.name == child.name) {
                        return Err(SchemaError::DuplicateChild {
                            path: path.to_string(),
                            name: child.name.clone(),
                        });
                    }
                }
                for (i, attr) in self.attributes.iter().enumerate() {
                    if self.attributes[..i].iter().any(|a| a.name == attr.name) {
                        return Err(SchemaError::DuplicateChild {
                            path: format!("{}@", path),
                            name: attr.name.clone(),
                        });
                    }
                }
                for child in &self.children {
                    let child_path = format!("{}.{}", path, child.name);
                    child.validate_at(&child_path, depth + 1, max_depth)?;
                }
            }
            NodeKind::Array => {
                if !self.children.is_empty() {
                    return Err(SchemaError::Malformed {
                        path: path.to_string(),
                        message: "array nodes carry an element shape, not children".to_string(),
                    });
                }
                let element = self.element.as_deref().ok_or_else(|| {
                    SchemaError::MissingField {
                        path: path.to_string(),
                        field: "element".to_string(),
                    }
                })?;
                let element_path = format!("{}[]", path);
                element.validate_at(&element_path, depth + 1, max_depth)?;
            }
        }
        Ok(())
    }
}

/// A complete, validated schema shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    root: NodeDescriptor,
    #[serde(default = "default_max_depth")]
    max_depth: usize,
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl SchemaDescriptor {
    /// Wrap a root descriptor with the default depth cap
    pub fn new(root: NodeDescriptor) -> Self {
        Self {
            root,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Wrap a root descriptor with an explicit depth cap
    pub fn with_max_depth(root: NodeDescriptor, max_depth: usize) -> Self {
        Self { root, max_depth }
    }

    /// The root node descriptor
    pub fn root(&self) -> &NodeDescriptor {
        &self.root
    }

    /// The configured depth cap
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Check structural invariants: finite depth, unique sibling names,
    /// kind/field coherence, compilable facets.
    ///
    /// Malformed descriptors are an init-time configuration fault; this must
    /// never be reachable from per-message processing.
    pub fn validate(&self) -> SchemaResult<()> {
        let path = format!("$.{}", self.root.name);
        self.root.validate_at(&path, 1, self.max_depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_descriptor() -> SchemaDescriptor {
        SchemaDescriptor::new(NodeDescriptor::object(
            "Order",
            vec![
                NodeDescriptor::scalar("OrderId", ScalarType::String).required(),
                NodeDescriptor::object(
                    "Customer",
                    vec![
                        NodeDescriptor::scalar("Name", ScalarType::String),
                        NodeDescriptor::scalar("Email", ScalarType::String).required(),
                    ],
                ),
            ],
        ))
    }

    #[test]
    fn valid_descriptor_passes() {
        assert!(order_descriptor().validate().is_ok());
    }

    #[test]
    fn duplicate_siblings_rejected() {
        let descriptor = SchemaDescriptor::new(NodeDescriptor::object(
            "Order",
            vec![
                NodeDescriptor::scalar("Id", ScalarType::String),
                NodeDescriptor::scalar("Id", ScalarType::Number),
            ],
        ));
        assert!(matches!(
            descriptor.validate(),
            Err(SchemaError::DuplicateChild { .. })
        ));
    }

    #[test]
    fn scalar_without_type_rejected() {
        let mut node = NodeDescriptor::scalar("Id", ScalarType::String);
        node.scalar_type = None;
        let descriptor = SchemaDescriptor::new(NodeDescriptor::object("Order", vec![node]));
        assert!(matches!(
            descriptor.validate(),
            Err(SchemaError::MissingField { ref field, .. }) if field == "scalar_type"
        ));
    }

    #[test]
    fn array_without_element_rejected() {
        let mut node = NodeDescriptor::array(
            "Items",
            NodeDescriptor::scalar("Item", ScalarType::String),
        );
        node.element = None;
        let descriptor = SchemaDescriptor::new(NodeDescriptor::object("Order", vec![node]));
        assert!(matches!(
            descriptor.validate(),
            Err(SchemaError::MissingField { ref field, .. }) if field == "element"
        ));
    }

    #[test]
    fn depth_cap_enforced() {
        let mut node = NodeDescriptor::scalar("leaf", ScalarType::String);
        for i in 0..10 {
            node = NodeDescriptor::object(format!("level{}", i), vec![node]);
        }
        let descriptor = SchemaDescriptor::with_max_depth(node, 4);
        assert!(matches!(
            descriptor.validate(),
            Err(SchemaError::DepthExceeded { max_depth: 4, .. })
        ));
    }

    #[test]
    fn bad_pattern_rejected() {
        let node = NodeDescriptor::scalar("Email", ScalarType::String).with_pattern("[unclosed");
        let descriptor = SchemaDescriptor::new(NodeDescriptor::object("Order", vec![node]));
        assert!(matches!(
            descriptor.validate(),
            Err(SchemaError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn pattern_on_number_scalar_rejected() {
        let mut node = NodeDescriptor::scalar("Total", ScalarType::Number);
        node.pattern = Some("\\d+".to_string());
        let descriptor = SchemaDescriptor::new(NodeDescriptor::object("Order", vec![node]));
        assert!(matches!(
            descriptor.validate(),
            Err(SchemaError::Malformed { .. })
        ));
    }

    #[test]
    fn descriptor_round_trips_through_serde() {
        let descriptor = order_descriptor();
        let json = serde_json::to_string(&descriptor).unwrap();
        let back: SchemaDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(descriptor, back);
    }
}
