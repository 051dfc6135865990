//! canopy-core: schema-driven message processing
//!
//! The processing model is copy-based: a schema compiles once into an
//! immutable canonical template, a pool hands out deep copies of it, and each
//! incoming message is validated, copied into an acquired instance,
//! transformed, and serialized back out. Instances always return to the pool,
//! whatever happens to the message.
//!
//! ```
//! use canopy_core::{Format, Pipeline, ValidationPolicy};
//! use canopy_schemas::{NodeDescriptor, ScalarType, SchemaDescriptor};
//!
//! let descriptor = SchemaDescriptor::new(NodeDescriptor::object(
//!     "Order",
//!     vec![NodeDescriptor::scalar("OrderId", ScalarType::String).required()],
//! ));
//! let pipeline = Pipeline::builder(Format::Json)
//!     .descriptor(descriptor)
//!     .policy(ValidationPolicy::WarnAndContinue)
//!     .build()
//!     .unwrap();
//!
//! let report = pipeline.process(r#"{"OrderId": "A-1"}"#).unwrap();
//! assert!(report.fill.is_complete());
//! ```
//!
//! Copyright (c) 2026 Canopy Team
//! Licensed under the MIT OR Apache-2.0 license

pub mod codec;
pub mod error;
pub mod filler;
pub mod pipeline;
pub mod pool;
pub mod template;
pub mod validator;

pub use codec::{CodecError, Decoder, Format, Renderer};
pub use error::{Error, Result};
pub use filler::{FillResult, Filler};
pub use pipeline::{
    Pipeline, PipelineBuilder, PolicyDecision, ProcessMetadata, ProcessReport, Stage, Transform,
    ValidationPolicy,
};
pub use pool::{InstancePool, PoolConfig, PoolStats, PooledInstance};
pub use template::CanonicalTemplate;
pub use validator::{CheckerInstancing, ValidationOutcome, Validator};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
