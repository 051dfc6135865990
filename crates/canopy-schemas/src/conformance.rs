//! Structural conformance checking
//!
//! The [`ConformanceChecker`] walks a decoded message tree in lock-step with
//! a [`SchemaDescriptor`] and collects every violation it finds in a single
//! pass. It never stops at the first problem and never fails: a message with
//! five violations yields five diagnostics, and a message of the wrong shape
//! entirely yields diagnostics, not errors.
//!
//! Copyright (c) 2026 Canopy Team
//! Licensed under the MIT OR Apache-2.0 license

use crate::descriptor::{NodeDescriptor, NodeKind, ScalarType, SchemaDescriptor};
use crate::value::{Node, ScalarValue};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Severity of one conformance diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational, no action required
    Info,
    /// Suspicious but tolerable
    Warning,
    /// Violates the schema
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// One reported conformance issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Dotted/indexed path into the message, e.g. `Order.Items[2].Sku`
    pub path: String,
    /// Source line, when the format can report position
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Source column, when the format can report position
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    /// An error-severity diagnostic without position information
    pub fn error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self {
            path: path.into(),
            line: None,
            column: None,
            severity: Severity::Error,
            message: message.into(),
        }
    }

    /// A warning-severity diagnostic without position information
    pub fn warning<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self {
            path: path.into(),
            line: None,
            column: None,
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    /// Attach a source position
    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(
                f,
                "{} at {} ({}:{}): {}",
                self.severity, self.path, line, column, self.message
            ),
            _ => write!(f, "{} at {}: {}", self.severity, self.path, self.message),
        }
    }
}

/// Single-pass structural checker with an internal pattern cache
///
/// The checker keeps mutable scratch state (compiled regexes), so it is not
/// reentrant by itself; callers that share one checker across workers must
/// serialize access. The validator layer owns that choice.
#[derive(Debug, Default)]
pub struct ConformanceChecker {
    pattern_cache: HashMap<String, Regex>,
}

impl ConformanceChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check `tree` against `descriptor`, returning every violation found.
    /// An empty result means the message conforms.
    pub fn check(&mut self, descriptor: &SchemaDescriptor, tree: &Node) -> Vec<Diagnostic> {
        let mut out = Vec::new();
        let root = descriptor.root();
        let root_path = root.name.clone();
        self.check_node(root, tree, &root_path, &mut out);
        out
    }

    fn check_node(
        &mut self,
        desc: &NodeDescriptor,
        node: &Node,
        path: &str,
        out: &mut Vec<Diagnostic>,
    ) {
        match desc.kind {
            NodeKind::Scalar => self.check_scalar(desc, node, path, out),
            NodeKind::Object => self.check_object(desc, node, path, out),
            NodeKind::Array => self.check_array(desc, node, path, out),
        }
    }

    fn check_scalar(
        &mut self,
        desc: &NodeDescriptor,
        node: &Node,
        path: &str,
        out: &mut Vec<Diagnostic>,
    ) {
        let value = match node {
            Node::Scalar(value) => value,
            other => {
                out.push(Diagnostic::error(
                    path,
                    format!("expected a scalar value, found {}", other.kind_name()),
                ));
                return;
            }
        };

        // Scalar kind is validated at descriptor build time.
        let declared = desc.scalar_type.unwrap_or(ScalarType::Any);
        if !value.conforms_to(declared) {
            out.push(Diagnostic::error(
                path,
                format!(
                    "expected {:?} value, found {:?}",
                    declared,
                    value.scalar_type()
                ),
            ));
            return;
        }

        if let ScalarValue::String(text) = value {
            if let Some(pattern) = &desc.pattern {
                if let Some(regex) = self.compiled(pattern) {
                    if !regex.is_match(text) {
                        out.push(Diagnostic::error(
                            path,
                            format!("value '{}' does not match pattern '{}'", text, pattern),
                        ));
                    }
                }
            }
            if let Some(enumeration) = &desc.enumeration {
                if !enumeration.iter().any(|v| v == text) {
                    out.push(Diagnostic::error(
                        path,
                        format!(
                            "value '{}' is not one of the {} permitted values",
                            text,
                            enumeration.len()
                        ),
                    ));
                }
            }
        }
    }

    fn check_object(
        &mut self,
        desc: &NodeDescriptor,
        node: &Node,
        path: &str,
        out: &mut Vec<Diagnostic>,
    ) {
        let (children, attributes) = match node {
            Node::Object {
                children,
                attributes,
            } => (children, attributes),
            other => {
                out.push(Diagnostic::error(
                    path,
                    format!("expected an object, found {}", other.kind_name()),
                ));
                return;
            }
        };

        for child_desc in &desc.children {
            let child_path = format!("{}.{}", path, child_desc.name);
            let mut matches = children.iter().filter(|(name, _)| *name == child_desc.name);
            match matches.next() {
                None => {
                    if child_desc.required {
                        out.push(Diagnostic::error(
                            child_path.as_str(),
                            format!("required element '{}' is missing", child_desc.name),
                        ));
                    }
                }
                Some((_, child_node)) => {
                    if child_desc.kind != NodeKind::Array && matches.next().is_some() {
                        out.push(Diagnostic::warning(
                            child_path.as_str(),
                            format!(
                                "element '{}' appears more than once; only the first occurrence is used",
                                child_desc.name
                            ),
                        ));
                    }
                    self.check_node(child_desc, child_node, &child_path, out);
                }
            }
        }

        for (name, _) in children {
            if desc.child(name).is_none() {
                out.push(Diagnostic::warning(
                    format!("{}.{}", path, name),
                    format!("element '{}' is not declared in the schema", name),
                ));
            }
        }

        for attr_desc in &desc.attributes {
            if let Some((_, raw)) = attributes.iter().find(|(name, _)| *name == attr_desc.name) {
                let as_scalar = ScalarValue::String(raw.clone());
                if !as_scalar.conforms_to(attr_desc.scalar_type) {
                    out.push(Diagnostic::error(
                        format!("{}@{}", path, attr_desc.name),
                        format!(
                            "attribute value '{}' is not a valid {:?}",
                            raw, attr_desc.scalar_type
                        ),
                    ));
                }
            }
        }
        for (name, _) in attributes {
            if !desc.attributes.iter().any(|a| a.name == *name) {
                out.push(Diagnostic::warning(
                    format!("{}@{}", path, name),
                    format!("attribute '{}' is not declared in the schema", name),
                ));
            }
        }
    }

    fn check_array(
        &mut self,
        desc: &NodeDescriptor,
        node: &Node,
        path: &str,
        out: &mut Vec<Diagnostic>,
    ) {
        // Array kind guarantees an element descriptor after validation.
        let Some(element_desc) = desc.element.as_deref() else {
            return;
        };

        match node {
            Node::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    let item_path = format!("{}[{}]", path, i);
                    self.check_node(element_desc, item, &item_path, out);
                }
            }
            // XML convention: a container element whose repeated children are
            // the array items.
            Node::Object { children, .. } => {
                let mut index = 0usize;
                for (name, child) in children {
                    if *name == element_desc.name {
                        let item_path = format!("{}[{}]", path, index);
                        self.check_node(element_desc, child, &item_path, out);
                        index += 1;
                    } else {
                        out.push(Diagnostic::warning(
                            format!("{}.{}", path, name),
                            format!(
                                "element '{}' is not the declared item '{}' of this collection",
                                name, element_desc.name
                            ),
                        ));
                    }
                }
            }
            other => {
                out.push(Diagnostic::error(
                    path,
                    format!("expected a collection, found {}", other.kind_name()),
                ));
            }
        }
    }

    fn compiled(&mut self, pattern: &str) -> Option<&Regex> {
        if !self.pattern_cache.contains_key(pattern) {
            // Uncompilable patterns are rejected at descriptor validation;
            // skip silently if one slips through.
            let regex = Regex::new(pattern).ok()?;
            self.pattern_cache.insert(pattern.to_string(), regex);
        }
        self.pattern_cache.get(pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::NodeDescriptor as D;

    fn order_schema() -> SchemaDescriptor {
        SchemaDescriptor::new(D::object(
            "Order",
            vec![
                D::scalar("OrderId", ScalarType::String).required(),
                D::object(
                    "Customer",
                    vec![
                        D::scalar("Name", ScalarType::String),
                        D::scalar("Email", ScalarType::String)
                            .required()
                            .with_pattern("^[^@]+@[^@]+$"),
                    ],
                )
                .required(),
                D::array("Items", D::scalar("Item", ScalarType::Number)),
            ],
        ))
    }

    fn conforming_order() -> Node {
        let mut customer = Node::object();
        customer.push_child("Name", Node::string("Ada"));
        customer.push_child("Email", Node::string("ada@example.com"));
        let mut order = Node::object();
        order.push_child("OrderId", Node::string("A-1"));
        order.push_child("Customer", customer);
        order.push_child("Items", Node::Array(vec![Node::number(1.0), Node::number(2.0)]));
        order
    }

    #[test]
    fn conforming_message_yields_no_diagnostics() {
        let mut checker = ConformanceChecker::new();
        assert!(checker.check(&order_schema(), &conforming_order()).is_empty());
    }

    #[test]
    fn all_violations_collected_in_one_pass() {
        // Missing required Email, wrong OrderId type, bad item type: three
        // error diagnostics from a single check call.
        let mut customer = Node::object();
        customer.push_child("Name", Node::string("Ada"));
        let mut order = Node::object();
        order.push_child("OrderId", Node::boolean(true));
        order.push_child("Customer", customer);
        order.push_child("Items", Node::Array(vec![Node::string("not-a-number")]));

        let mut checker = ConformanceChecker::new();
        let diags = checker.check(&order_schema(), &order);
        let errors: Vec<_> = diags
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .collect();
        assert_eq!(errors.len(), 3, "diagnostics were: {:?}", diags);
        assert!(errors.iter().any(|d| d.path == "Order.Customer.Email"));
        assert!(errors.iter().any(|d| d.path == "Order.OrderId"));
        assert!(errors.iter().any(|d| d.path == "Order.Items[0]"));
    }

    #[test]
    fn cross_type_value_is_an_error_even_when_stringifiable() {
        // A boolean where the schema declares string would stringify at fill
        // time, but it still violates the declared type.
        let mut order = conforming_order();
        *order.child_mut("OrderId").unwrap() = Node::boolean(true);
        let mut checker = ConformanceChecker::new();
        let diags = checker.check(&order_schema(), &order);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Severity::Error);
        assert_eq!(diags[0].path, "Order.OrderId");
    }

    #[test]
    fn numeric_strings_conform_to_number_scalars() {
        // Text formats deliver numbers as strings; parseable text conforms.
        let mut order = conforming_order();
        if let Some(Node::Array(items)) = order.child_mut("Items") {
            items.push(Node::string("41.5"));
        }
        let mut checker = ConformanceChecker::new();
        assert!(checker.check(&order_schema(), &order).is_empty());
    }

    #[test]
    fn undeclared_elements_are_warnings_not_errors() {
        let mut order = conforming_order();
        order.push_child("Internal", Node::string("x"));
        let mut checker = ConformanceChecker::new();
        let diags = checker.check(&order_schema(), &order);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Severity::Warning);
        assert_eq!(diags[0].path, "Order.Internal");
    }

    #[test]
    fn pattern_facet_reported_with_path() {
        let mut order = conforming_order();
        if let Some(customer) = order.child_mut("Customer") {
            if let Some(email) = customer.child_mut("Email") {
                *email = Node::string("not-an-email");
            }
        }
        let mut checker = ConformanceChecker::new();
        let diags = checker.check(&order_schema(), &order);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("pattern"));
        assert_eq!(diags[0].path, "Order.Customer.Email");
    }

    #[test]
    fn xml_style_repeated_children_accepted_as_array() {
        let mut items = Node::object();
        items.push_child("Item", Node::string("3"));
        items.push_child("Item", Node::string("5"));
        let mut order = conforming_order();
        if let Some(slot) = order.child_mut("Items") {
            *slot = items;
        }
        let mut checker = ConformanceChecker::new();
        assert!(checker.check(&order_schema(), &order).is_empty());
    }

    #[test]
    fn shape_catastrophe_is_diagnosed_not_panicked() {
        let mut checker = ConformanceChecker::new();
        let diags = checker.check(&order_schema(), &Node::number(7.0));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Severity::Error);
        assert!(diags[0].message.contains("expected an object"));
    }

    #[test]
    fn attribute_type_checked() {
        let schema = SchemaDescriptor::new(
            D::object("Order", vec![]).with_attribute("priority", ScalarType::Number),
        );
        let mut order = Node::object();
        order.set_attribute("priority", "high");
        order.set_attribute("internal", "x");
        let mut checker = ConformanceChecker::new();
        let diags = checker.check(&schema, &order);
        assert_eq!(diags.len(), 2);
        assert!(diags.iter().any(|d| d.path == "Order@priority" && d.severity == Severity::Error));
        assert!(diags.iter().any(|d| d.path == "Order@internal" && d.severity == Severity::Warning));
    }
}
