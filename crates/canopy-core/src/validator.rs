//! Validator
//!
//! Wraps the structural conformance checker behind the pipeline's validation
//! contract: total (never faults for ordinary bad input), single-pass
//! (collects every diagnostic), and safe to call from any number of workers.
//! An unparsable payload is not an exceptional condition here; it folds into
//! a single `Invalid` diagnostic carrying the parser's position.
//!
//! Copyright (c) 2026 Canopy Team
//! Licensed under the MIT OR Apache-2.0 license

use crate::codec::{CodecError, Decoder};
use canopy_schemas::{ConformanceChecker, Diagnostic, Node, SchemaDescriptor, Severity};
use parking_lot::Mutex;
use std::sync::Arc;

/// Outcome of validating one message
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Valid,
    /// Ordered diagnostics, most severe issues included alongside warnings
    Invalid(Vec<Diagnostic>),
    /// Validation did not run; the reason is informational, not an error
    Skipped(String),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }

    /// Diagnostics attached to this outcome, empty unless `Invalid`
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            ValidationOutcome::Invalid(diagnostics) => diagnostics,
            _ => &[],
        }
    }
}

/// How checker instances are shared across workers
///
/// The checker keeps internal scratch state, so it is not reentrant. Either
/// every call builds a fresh checker, or one shared checker is serialized
/// behind a mutex. Both satisfy the same `&self` contract; the choice is a
/// throughput trade made at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckerInstancing {
    /// Fresh checker per call; no contention, no pattern-cache reuse
    #[default]
    PerCall,
    /// One shared checker behind a mutex; warm pattern cache, serialized
    Serialized,
}

/// Schema validation front-end for the pipeline
pub struct Validator {
    descriptor: Option<Arc<SchemaDescriptor>>,
    decoder: Arc<dyn Decoder>,
    shared_checker: Option<Mutex<ConformanceChecker>>,
}

impl Validator {
    pub fn new(
        descriptor: Option<Arc<SchemaDescriptor>>,
        decoder: Arc<dyn Decoder>,
        instancing: CheckerInstancing,
    ) -> Self {
        let shared_checker = match instancing {
            CheckerInstancing::PerCall => None,
            CheckerInstancing::Serialized => Some(Mutex::new(ConformanceChecker::new())),
        };
        Self {
            descriptor,
            decoder,
            shared_checker,
        }
    }

    /// Validate a raw payload. Total: every input yields exactly one outcome,
    /// never a panic or an error.
    pub fn validate(&self, raw: &str) -> ValidationOutcome {
        match self.decoder.decode(raw) {
            Ok(tree) => self.validate_tree(&tree),
            Err(error) => self.decode_failure(&error),
        }
    }

    /// Validate an already-decoded tree. Callers that decode for other
    /// reasons use this to avoid parsing the payload twice.
    pub fn validate_tree(&self, tree: &Node) -> ValidationOutcome {
        let Some(descriptor) = &self.descriptor else {
            return ValidationOutcome::Skipped("no schema available".to_string());
        };

        let diagnostics = self.check(descriptor, tree);
        if diagnostics.iter().any(|d| d.severity == Severity::Error) {
            ValidationOutcome::Invalid(diagnostics)
        } else {
            for diagnostic in &diagnostics {
                log::debug!("conformance note: {}", diagnostic);
            }
            ValidationOutcome::Valid
        }
    }

    /// Outcome for a payload that did not decode: one positioned diagnostic,
    /// or `Skipped` when there is no schema to validate against.
    pub fn decode_failure(&self, error: &CodecError) -> ValidationOutcome {
        if self.descriptor.is_none() {
            return ValidationOutcome::Skipped("no schema available".to_string());
        }
        ValidationOutcome::Invalid(vec![decode_diagnostic(error)])
    }

    fn check(&self, descriptor: &SchemaDescriptor, tree: &Node) -> Vec<Diagnostic> {
        match &self.shared_checker {
            Some(shared) => shared.lock().check(descriptor, tree),
            None => ConformanceChecker::new().check(descriptor, tree),
        }
    }
}

fn decode_diagnostic(error: &CodecError) -> Diagnostic {
    let mut diagnostic = Diagnostic::error("", error.to_string());
    if let CodecError::Parse { line, column, .. } = error {
        diagnostic.line = *line;
        diagnostic.column = *column;
    }
    diagnostic
}
