//! Schema-level error types
//!
//! Every error in this module is fatal and init-time only: a `SchemaError`
//! means the pipeline is misconfigured and must not start. Per-message
//! conformance issues are never `SchemaError`s; they travel as
//! [`Diagnostic`](crate::conformance::Diagnostic) values instead.
//!
//! Copyright (c) 2026 Canopy Team
//! Licensed under the MIT OR Apache-2.0 license

use thiserror::Error;

/// Fatal schema construction or validation error
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A `$ref` chain in a descriptor document loops back on itself
    #[error("cyclic schema reference: {chain}")]
    CyclicReference {
        /// The reference chain that closed the cycle, e.g. `a -> b -> a`
        chain: String,
    },

    /// A `$ref` points at a definition that does not exist
    #[error("unresolved schema reference '{reference}' at {path}")]
    UnresolvedReference { reference: String, path: String },

    /// Descriptor tree is deeper than the configured cap
    #[error("schema depth exceeds maximum of {max_depth} at {path}")]
    DepthExceeded { path: String, max_depth: usize },

    /// Two sibling nodes share a name
    #[error("duplicate child '{name}' under {path}")]
    DuplicateChild { path: String, name: String },

    /// A descriptor document names a kind this core does not know
    #[error("unknown node kind '{value}' at {path}")]
    UnknownKind { path: String, value: String },

    /// A descriptor document names a scalar type this core does not know
    #[error("unknown scalar type '{value}' at {path}")]
    UnknownScalarType { path: String, value: String },

    /// A required descriptor field is absent
    #[error("missing field '{field}' at {path}")]
    MissingField { path: String, field: String },

    /// Kind and accompanying fields disagree (e.g. a scalar with children)
    #[error("malformed descriptor at {path}: {message}")]
    Malformed { path: String, message: String },

    /// A `pattern` facet does not compile as a regular expression
    #[error("invalid pattern '{pattern}' at {path}: {message}")]
    InvalidPattern {
        path: String,
        pattern: String,
        message: String,
    },

    /// The descriptor document itself could not be parsed
    #[error("schema document parse error: {message}")]
    Parse { message: String },
}

impl From<serde_json::Error> for SchemaError {
    fn from(err: serde_json::Error) -> Self {
        SchemaError::Parse {
            message: err.to_string(),
        }
    }
}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;
