//! Error types for the Canopy core library
//!
//! The taxonomy separates init-time faults (schema construction, always
//! fatal) from per-message faults (transform, serialization, deadline), which
//! kill only the current message and always carry the message's validation
//! diagnostics for context. Fill mismatches are deliberately absent here:
//! they are data ([`FillResult::Partial`](crate::filler::FillResult)), never
//! errors.

use crate::codec::CodecError;
use crate::pipeline::Stage;
use canopy_schemas::{Diagnostic, SchemaError};
use thiserror::Error;

/// Main error type for Canopy core operations
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or cyclic schema; init-time only
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Raw payload could not be decoded into a tree at fill time
    #[error("decode failed: {0}")]
    Decode(#[from] CodecError),

    /// The validation policy aborted the pipeline for an invalid message
    #[error("validation aborted: {reason} ({count} diagnostic(s))", count = .diagnostics.len())]
    ValidationAborted {
        reason: String,
        diagnostics: Vec<Diagnostic>,
    },

    /// The external transform stage faulted for this message
    #[error("transform fault: {message}")]
    TransformFault {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
        /// Validation diagnostics of the message being processed
        diagnostics: Vec<Diagnostic>,
    },

    /// The serializer faulted for this message
    #[error("serialization fault: {message}")]
    SerializationFault {
        message: String,
        diagnostics: Vec<Diagnostic>,
    },

    /// The per-message deadline expired; the pooled instance was released
    /// before this error surfaced
    #[error("deadline exceeded while {stage}")]
    DeadlineExceeded { stage: Stage },

    /// Generic internal error with context
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl Error {
    /// Validation diagnostics attached to this error, if any
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Error::ValidationAborted { diagnostics, .. }
            | Error::TransformFault { diagnostics, .. }
            | Error::SerializationFault { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }
}

/// Convenience type alias for Results using the core Error type
pub type Result<T> = std::result::Result<T, Error>;
