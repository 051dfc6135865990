//! Canopy Schemas - format-neutral schema descriptors and conformance checking
//!
//! This crate owns the structural side of the Canopy message processing core:
//!
//! - **Descriptors**: a format-neutral schema shape ([`SchemaDescriptor`])
//!   produced by external schema parsers or by the bundled JSON document
//!   loader
//! - **Value trees**: the [`Node`] tree that decoders produce, templates are
//!   built from, and the filler mutates
//! - **Conformance**: a single-pass checker that collects every violation of
//!   a message against its descriptor as [`Diagnostic`] values
//!
//! All errors here ([`SchemaError`]) are fatal and init-time only; per-message
//! conformance issues are ordinary data, never errors.
//!
//! # Example
//!
//! ```
//! use canopy_schemas::{ConformanceChecker, Node, NodeDescriptor, ScalarType, SchemaDescriptor};
//!
//! let schema = SchemaDescriptor::new(NodeDescriptor::object(
//!     "Order",
//!     vec![NodeDescriptor::scalar("OrderId", ScalarType::String).required()],
//! ));
//! schema.validate().unwrap();
//!
//! let mut message = Node::object();
//! message.push_child("OrderId", Node::string("A-1"));
//! let diagnostics = ConformanceChecker::new().check(&schema, &message);
//! assert!(diagnostics.is_empty());
//! ```

pub mod conformance;
pub mod descriptor;
pub mod error;
pub mod loader;
pub mod value;

pub use conformance::{ConformanceChecker, Diagnostic, Severity};
pub use descriptor::{
    AttributeDescriptor, NodeDescriptor, NodeKind, ScalarType, SchemaDescriptor,
    DEFAULT_MAX_DEPTH,
};
pub use error::{SchemaError, SchemaResult};
pub use loader::{descriptor_from_json, descriptor_from_value};
pub use value::{Node, ScalarValue};
