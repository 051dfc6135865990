//! Canonical Model Builder
//!
//! Builds one immutable [`CanonicalTemplate`] per (schema, format) pair at
//! initialization time: a complete tree with every declared node present and
//! holding its type-appropriate zero value. The template is the read-only
//! prototype for every pooled instance; no mutation API exists on it, only
//! [`CanonicalTemplate::instantiate`] (deep copy) and
//! [`CanonicalTemplate::reset`] (restore a copy to prototype state).
//!
//! Copyright (c) 2026 Canopy Team
//! Licensed under the MIT OR Apache-2.0 license

use canopy_schemas::{
    Node, NodeDescriptor, NodeKind, ScalarType, ScalarValue, SchemaDescriptor, SchemaError,
};
use std::sync::Arc;

/// The immutable per-schema prototype tree
#[derive(Debug)]
pub struct CanonicalTemplate {
    descriptor: Arc<SchemaDescriptor>,
    root: Node,
}

impl CanonicalTemplate {
    /// Build a template from a descriptor.
    ///
    /// Deterministic: identical descriptors always yield structurally
    /// identical templates (same node order, same defaults). Fails only for
    /// malformed descriptors, which is an init-time configuration fault.
    pub fn build(descriptor: SchemaDescriptor) -> Result<Self, SchemaError> {
        descriptor.validate()?;
        let root = default_node(descriptor.root());
        Ok(Self {
            descriptor: Arc::new(descriptor),
            root,
        })
    }

    /// The descriptor this template was built from
    pub fn descriptor(&self) -> &Arc<SchemaDescriptor> {
        &self.descriptor
    }

    /// The prototype tree, read-only
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Produce an independently-owned deep copy of the prototype
    pub fn instantiate(&self) -> Node {
        self.root.clone()
    }

    /// Restore an instance to prototype state in place: every leaf back to
    /// its zero value, every array emptied, every attribute override cleared.
    ///
    /// Deep reset is what makes pooled reuse safe; nothing may bleed from one
    /// message into the next.
    pub fn reset(&self, instance: &mut Node) {
        if !reset_node(&self.root, instance) {
            // An instance whose shape diverged from the prototype cannot be
            // repaired field-by-field; replace it wholesale.
            *instance = self.root.clone();
        }
    }
}

/// Zero-valued node for a descriptor subtree
pub(crate) fn default_node(desc: &NodeDescriptor) -> Node {
    match desc.kind {
        NodeKind::Scalar => {
            let scalar_type = desc.scalar_type.unwrap_or(ScalarType::Any);
            Node::Scalar(ScalarValue::zero(scalar_type))
        }
        NodeKind::Object => {
            let children = desc
                .children
                .iter()
                .map(|child| (child.name.clone(), default_node(child)))
                .collect();
            let attributes = desc
                .attributes
                .iter()
                .map(|attr| (attr.name.clone(), String::new()))
                .collect();
            Node::Object {
                children,
                attributes,
            }
        }
        // Element shape is known from the descriptor but arrays start empty.
        NodeKind::Array => Node::Array(Vec::new()),
    }
}

/// Walk `instance` congruently with `template`, restoring defaults.
/// Returns false if the shapes diverge.
fn reset_node(template: &Node, instance: &mut Node) -> bool {
    match (template, instance) {
        (Node::Scalar(default), Node::Scalar(slot)) => {
            *slot = default.clone();
            true
        }
        (Node::Array(_), Node::Array(items)) => {
            items.clear();
            true
        }
        (
            Node::Object {
                children: t_children,
                attributes: t_attrs,
            },
            Node::Object {
                children: i_children,
                attributes: i_attrs,
            },
        ) => {
            if t_children.len() != i_children.len() || t_attrs.len() != i_attrs.len() {
                return false;
            }
            for ((t_name, t_node), (i_name, i_node)) in t_children.iter().zip(i_children.iter_mut())
            {
                if t_name != i_name || !reset_node(t_node, i_node) {
                    return false;
                }
            }
            for ((t_name, t_value), (i_name, i_value)) in t_attrs.iter().zip(i_attrs.iter_mut()) {
                if t_name != i_name {
                    return false;
                }
                i_value.clone_from(t_value);
            }
            true
        }
        _ => false,
    }
}
