//! Filler
//!
//! Walks a decoded message tree in lock-step with an acquired template copy
//! and writes matching values into it. The schema is authoritative: raw nodes
//! the template does not know are skipped and reported, template nodes the
//! message does not provide stay at their reset defaults and are reported.
//! A shape catastrophe (say, an array where the schema expects a scalar) is
//! handled per node: that subtree is skipped and reported, the rest of the
//! message still fills.
//!
//! Copyright (c) 2026 Canopy Team
//! Licensed under the MIT OR Apache-2.0 license

use crate::template::{default_node, CanonicalTemplate};
use canopy_schemas::{Node, NodeDescriptor, NodeKind, ScalarType, ScalarValue};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Outcome of one fill pass. `Partial` is a report, not an error: callers
/// under lenient policies proceed with best-effort data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillResult {
    /// Every declared node received a value and nothing was left over
    Complete,
    Partial {
        /// Declared paths absent from the message (left at defaults)
        missing: Vec<String>,
        /// Message paths the schema does not know, or whose shape/type made
        /// them unusable
        extra: Vec<String>,
    },
}

impl FillResult {
    pub fn is_complete(&self) -> bool {
        matches!(self, FillResult::Complete)
    }

    /// Declared-but-absent paths, empty when complete
    pub fn missing(&self) -> &[String] {
        match self {
            FillResult::Complete => &[],
            FillResult::Partial { missing, .. } => missing,
        }
    }

    /// Unknown or unusable message paths, empty when complete
    pub fn extra(&self) -> &[String] {
        match self {
            FillResult::Complete => &[],
            FillResult::Partial { extra, .. } => extra,
        }
    }
}

#[derive(Default)]
struct FillReport {
    missing: Vec<String>,
    extra: Vec<String>,
}

impl FillReport {
    fn into_result(self) -> FillResult {
        if self.missing.is_empty() && self.extra.is_empty() {
            FillResult::Complete
        } else {
            FillResult::Partial {
                missing: self.missing,
                extra: self.extra,
            }
        }
    }
}

/// Copies message values into template-shaped instances
#[derive(Debug, Clone)]
pub struct Filler {
    template: Arc<CanonicalTemplate>,
}

impl Filler {
    pub fn new(template: Arc<CanonicalTemplate>) -> Self {
        Self { template }
    }

    /// Fill `target` (a reset copy of the canonical template) from `raw`
    /// (a decoded message tree).
    pub fn fill(&self, target: &mut Node, raw: &Node) -> FillResult {
        let mut report = FillReport::default();
        let root = self.template.descriptor().root();
        fill_node(root, target, raw, &root.name, &mut report);
        report.into_result()
    }

    /// Report for a message that supplied no usable data: the target stays at
    /// its reset defaults and every declared child of the root is missing.
    pub fn unfilled(&self) -> FillResult {
        let root = self.template.descriptor().root();
        let missing = if root.children.is_empty() {
            vec![root.name.clone()]
        } else {
            root.children
                .iter()
                .map(|child| format!("{}.{}", root.name, child.name))
                .collect()
        };
        FillResult::Partial {
            missing,
            extra: Vec::new(),
        }
    }
}

fn fill_node(
    desc: &NodeDescriptor,
    target: &mut Node,
    raw: &Node,
    path: &str,
    report: &mut FillReport,
) {
    match desc.kind {
        NodeKind::Scalar => fill_scalar(desc, target, raw, path, report),
        NodeKind::Object => fill_object(desc, target, raw, path, report),
        NodeKind::Array => fill_array(desc, target, raw, path, report),
    }
}

fn fill_scalar(
    desc: &NodeDescriptor,
    target: &mut Node,
    raw: &Node,
    path: &str,
    report: &mut FillReport,
) {
    let declared = desc.scalar_type.unwrap_or(ScalarType::Any);
    let value = match raw {
        Node::Scalar(value) => Some(value),
        // XML elements with attributes park their text under #text.
        Node::Object { .. } => match raw.child("#text") {
            Some(Node::Scalar(value)) => Some(value),
            _ => None,
        },
        Node::Array(_) => None,
    };
    match value.and_then(|v| v.coerce(declared)) {
        Some(coerced) => *target = Node::Scalar(coerced),
        None => report.extra.push(path.to_string()),
    }
}

fn fill_object(
    desc: &NodeDescriptor,
    target: &mut Node,
    raw: &Node,
    path: &str,
    report: &mut FillReport,
) {
    let Node::Object {
        children: raw_children,
        attributes: raw_attributes,
    } = raw
    else {
        report.extra.push(path.to_string());
        return;
    };

    for child_desc in &desc.children {
        let child_path = format!("{}.{}", path, child_desc.name);
        let raw_child = raw_children
            .iter()
            .find(|(name, _)| *name == child_desc.name)
            .map(|(_, node)| node);
        match raw_child {
            Some(raw_child) => {
                // Template instances are congruent with the descriptor, so
                // the slot is always present.
                if let Some(slot) = target.child_mut(&child_desc.name) {
                    fill_node(child_desc, slot, raw_child, &child_path, report);
                }
            }
            None => report.missing.push(child_path),
        }
    }

    for (name, _) in raw_children {
        if name != "#text" && desc.child(name).is_none() {
            report.extra.push(format!("{}.{}", path, name));
        }
    }

    for attr_desc in &desc.attributes {
        if let Some((_, value)) = raw_attributes.iter().find(|(name, _)| *name == attr_desc.name)
        {
            target.set_attribute(attr_desc.name.clone(), value.clone());
        }
    }
    for (name, _) in raw_attributes {
        if !desc.attributes.iter().any(|a| a.name == *name) {
            report.extra.push(format!("{}@{}", path, name));
        }
    }
}

fn fill_array(
    desc: &NodeDescriptor,
    target: &mut Node,
    raw: &Node,
    path: &str,
    report: &mut FillReport,
) {
    // Array kind guarantees an element descriptor after template build.
    let Some(element_desc) = desc.element.as_deref() else {
        return;
    };
    let Node::Array(target_items) = target else {
        return;
    };

    let items: Vec<&Node> = match raw {
        Node::Array(items) => items.iter().collect(),
        // XML convention: container element with repeated item children.
        Node::Object { children, .. } => {
            for (name, _) in children {
                if *name != element_desc.name {
                    report.extra.push(format!("{}.{}", path, name));
                }
            }
            children
                .iter()
                .filter(|(name, _)| *name == element_desc.name)
                .map(|(_, node)| node)
                .collect()
        }
        Node::Scalar(_) => {
            report.extra.push(path.to_string());
            return;
        }
    };

    for (index, raw_item) in items.into_iter().enumerate() {
        let item_path = format!("{}[{}]", path, index);
        let mut item = default_node(element_desc);
        fill_node(element_desc, &mut item, raw_item, &item_path, report);
        target_items.push(item);
    }
}
