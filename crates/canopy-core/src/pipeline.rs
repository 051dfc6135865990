//! Pipeline Orchestrator
//!
//! One [`Pipeline`] is compiled per (schema, format) pair at initialization;
//! each call to [`Pipeline::process`] runs one message through
//! validate → acquire → fill → transform → serialize → release. The
//! [`ValidationPolicy`] decides what an `Invalid` result does to the run;
//! everything after acquisition happens under a pooled-instance guard, so
//! release is unconditional on every exit path: success, policy abort,
//! transform fault, serialization fault, or deadline expiry.
//!
//! Copyright (c) 2026 Canopy Team
//! Licensed under the MIT OR Apache-2.0 license

use crate::codec::{Decoder, Format, Renderer};
use crate::error::{Error, Result};
use crate::filler::{FillResult, Filler};
use crate::pool::{InstancePool, PoolConfig};
use crate::template::CanonicalTemplate;
use crate::validator::{CheckerInstancing, ValidationOutcome, Validator};
use canopy_schemas::{Diagnostic, Node, SchemaDescriptor};
use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What a policy decided about an invalid message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    Continue,
    Abort(String),
}

/// How a pipeline reacts to an `Invalid` validation result
#[derive(Clone)]
pub enum ValidationPolicy {
    /// Abort before the filler ever runs
    Strict,
    /// Surface diagnostics, proceed with best-effort data
    WarnAndContinue,
    /// Proceed; diagnostics are computed but stripped from the report
    Silent,
    /// A supplied handler decides per message
    Custom(Arc<dyn Fn(&[Diagnostic]) -> PolicyDecision + Send + Sync>),
}

impl ValidationPolicy {
    fn evaluate(&self, diagnostics: &[Diagnostic]) -> PolicyDecision {
        match self {
            ValidationPolicy::Strict => {
                PolicyDecision::Abort("strict policy rejects invalid input".to_string())
            }
            ValidationPolicy::WarnAndContinue | ValidationPolicy::Silent => {
                PolicyDecision::Continue
            }
            ValidationPolicy::Custom(handler) => handler(diagnostics),
        }
    }

    /// Whether diagnostics appear in the surfaced report
    fn surfaces_diagnostics(&self) -> bool {
        !matches!(self, ValidationPolicy::Silent)
    }
}

impl fmt::Debug for ValidationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationPolicy::Strict => write!(f, "Strict"),
            ValidationPolicy::WarnAndContinue => write!(f, "WarnAndContinue"),
            ValidationPolicy::Silent => write!(f, "Silent"),
            ValidationPolicy::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Pipeline stage, used for deadline reporting and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Validating,
    Acquiring,
    Filling,
    Transforming,
    Serializing,
    Releasing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::Acquiring => "acquiring",
            Stage::Filling => "filling",
            Stage::Transforming => "transforming",
            Stage::Serializing => "serializing",
            Stage::Releasing => "releasing",
        };
        write!(f, "{}", name)
    }
}

/// The external transform stage: an opaque tree-to-tree function that may
/// fault. Faults kill the current message only and are never retried here.
pub trait Transform: Send + Sync {
    fn apply(&self, tree: &Node) -> anyhow::Result<Node>;
}

impl<F> Transform for F
where
    F: Fn(&Node) -> anyhow::Result<Node> + Send + Sync,
{
    fn apply(&self, tree: &Node) -> anyhow::Result<Node> {
        self(tree)
    }
}

/// Pass-through transform, the builder default
#[derive(Debug, Default)]
pub struct Identity;

impl Transform for Identity {
    fn apply(&self, tree: &Node) -> anyhow::Result<Node> {
        Ok(tree.clone())
    }
}

/// Metadata about one processed message
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProcessMetadata {
    pub format: String,
    /// Policy the pipeline ran under
    pub policy: String,
    /// RFC 3339 start time
    pub timestamp: String,
    pub duration_ms: u64,
}

/// Result of one successful pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct ProcessReport {
    /// Serialized output in the pipeline's format
    pub output: String,
    /// Validation diagnostics, empty under the `Silent` policy
    pub diagnostics: Vec<Diagnostic>,
    /// Fill completeness; `Partial` is metadata, not failure
    pub fill: FillResult,
    pub metadata: ProcessMetadata,
}

/// Builder for a compiled pipeline
pub struct PipelineBuilder {
    format: Format,
    descriptor: Option<SchemaDescriptor>,
    policy: ValidationPolicy,
    pool_config: PoolConfig,
    deadline: Option<Duration>,
    instancing: CheckerInstancing,
    transform: Arc<dyn Transform>,
    decoder: Option<Arc<dyn Decoder>>,
    renderer: Option<Arc<dyn Renderer>>,
}

impl PipelineBuilder {
    fn new(format: Format) -> Self {
        Self {
            format,
            descriptor: None,
            policy: ValidationPolicy::WarnAndContinue,
            pool_config: PoolConfig::default(),
            deadline: None,
            instancing: CheckerInstancing::default(),
            transform: Arc::new(Identity),
            decoder: None,
            renderer: None,
        }
    }

    /// Bind a schema. Without one the pipeline runs in generic mode:
    /// validation is skipped and structure comes straight from the message.
    pub fn descriptor(mut self, descriptor: SchemaDescriptor) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    pub fn policy(mut self, policy: ValidationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn pool(mut self, config: PoolConfig) -> Self {
        self.pool_config = config;
        self
    }

    /// Per-message processing deadline
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn checker_instancing(mut self, instancing: CheckerInstancing) -> Self {
        self.instancing = instancing;
        self
    }

    pub fn transform(mut self, transform: Arc<dyn Transform>) -> Self {
        self.transform = transform;
        self
    }

    /// Override the format's built-in decoder
    pub fn decoder(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Override the format's built-in renderer
    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Compile the pipeline. Schema problems surface here, at init, never
    /// during message processing.
    pub fn build(self) -> Result<Pipeline> {
        let decoder = self
            .decoder
            .unwrap_or_else(|| self.format.decoder());

        let (pool, filler) = match self.descriptor {
            Some(descriptor) => {
                let template = Arc::new(CanonicalTemplate::build(descriptor)?);
                let pool = InstancePool::new(Arc::clone(&template), self.pool_config);
                let filler = Filler::new(template);
                (Some(pool), Some(filler))
            }
            None => (None, None),
        };

        let descriptor = pool.as_ref().map(|p| Arc::clone(p.template().descriptor()));
        let renderer = match self.renderer {
            Some(renderer) => renderer,
            None => self.format.renderer(descriptor.as_ref()),
        };
        let validator = Validator::new(descriptor, Arc::clone(&decoder), self.instancing);

        Ok(Pipeline {
            format: self.format,
            pool,
            filler,
            validator,
            decoder,
            renderer,
            transform: self.transform,
            policy: self.policy,
            deadline: self.deadline,
        })
    }
}

/// A compiled, shareable message pipeline
///
/// All state is either immutable or internally synchronized; one `Pipeline`
/// serves any number of concurrent workers.
pub struct Pipeline {
    format: Format,
    pool: Option<Arc<InstancePool>>,
    filler: Option<Filler>,
    validator: Validator,
    decoder: Arc<dyn Decoder>,
    renderer: Arc<dyn Renderer>,
    transform: Arc<dyn Transform>,
    policy: ValidationPolicy,
    deadline: Option<Duration>,
}

impl Pipeline {
    pub fn builder(format: Format) -> PipelineBuilder {
        PipelineBuilder::new(format)
    }

    /// The instance pool, absent in generic mode. Exposed for observability.
    pub fn pool(&self) -> Option<&Arc<InstancePool>> {
        self.pool.as_ref()
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Process one message end to end.
    ///
    /// Errors carry the message's validation diagnostics where they exist;
    /// in every error case the acquired instance (if any) has already been
    /// released back to the pool.
    pub fn process(&self, raw: &str) -> Result<ProcessReport> {
        let started = Instant::now();
        let timestamp = Utc::now().to_rfc3339();

        // Decode once; the same tree feeds validation and fill.
        let decoded = self.decoder.decode(raw);
        let outcome = match &decoded {
            Ok(tree) => self.validator.validate_tree(tree),
            Err(error) => self.validator.decode_failure(error),
        };
        let diagnostics = outcome.diagnostics().to_vec();
        match &outcome {
            ValidationOutcome::Invalid(found) => match self.policy.evaluate(found) {
                PolicyDecision::Abort(reason) => {
                    return Err(Error::ValidationAborted {
                        reason,
                        diagnostics,
                    });
                }
                PolicyDecision::Continue => {
                    if self.policy.surfaces_diagnostics() {
                        for diagnostic in found {
                            log::warn!("{}", diagnostic);
                        }
                    } else {
                        log::debug!("{} diagnostic(s) suppressed by policy", found.len());
                    }
                }
            },
            ValidationOutcome::Skipped(reason) => {
                log::debug!("validation skipped: {}", reason);
            }
            ValidationOutcome::Valid => {}
        }
        self.check_deadline(started, Stage::Validating)?;

        let raw_tree = match decoded {
            Ok(tree) => Some(tree),
            Err(error) => {
                // Generic mode cannot produce output without a decoded tree.
                // With a schema, a lenient decision proceeds on defaults; the
                // decode diagnostic already travels with the message.
                if self.pool.is_none() {
                    return Err(Error::Decode(error));
                }
                log::debug!("payload undecodable, filling with defaults: {}", error);
                None
            }
        };
        let (output, fill) = self.run_guarded(raw_tree.as_ref(), &diagnostics, started)?;

        let surfaced = if self.policy.surfaces_diagnostics() {
            diagnostics
        } else {
            Vec::new()
        };
        Ok(ProcessReport {
            output,
            diagnostics: surfaced,
            fill,
            metadata: ProcessMetadata {
                format: self.format.to_string(),
                policy: format!("{:?}", self.policy),
                timestamp,
                duration_ms: started.elapsed().as_millis() as u64,
            },
        })
    }

    /// Acquire-through-serialize, under the instance guard. Every `?` in
    /// here drops the guard first, which is the release guarantee.
    fn run_guarded(
        &self,
        raw_tree: Option<&Node>,
        diagnostics: &[Diagnostic],
        started: Instant,
    ) -> Result<(String, FillResult)> {
        match (&self.pool, &self.filler) {
            (Some(pool), Some(filler)) => {
                self.check_deadline(started, Stage::Acquiring)?;
                let mut instance = pool.acquire();

                self.check_deadline(started, Stage::Filling)?;
                let fill = match raw_tree {
                    Some(raw) => filler.fill(&mut instance, raw),
                    // Undecodable payload under a lenient policy: the
                    // instance keeps its defaults.
                    None => filler.unfilled(),
                };
                if let FillResult::Partial { missing, extra } = &fill {
                    log::debug!(
                        "partial fill: {} missing, {} extra path(s)",
                        missing.len(),
                        extra.len()
                    );
                }

                self.check_deadline(started, Stage::Transforming)?;
                let transformed = self
                    .transform
                    .apply(&instance)
                    .map_err(|e| self.transform_fault(e, diagnostics))?;

                self.check_deadline(started, Stage::Serializing)?;
                let output = self
                    .renderer
                    .render(&transformed)
                    .map_err(|e| self.serialization_fault(e, diagnostics))?;
                Ok((output, fill))
            }
            // Generic mode: no template, structure comes straight from the
            // decoded message. Decode failures already surfaced in process().
            _ => {
                let Some(raw_tree) = raw_tree else {
                    return Err(Error::Internal(anyhow::anyhow!(
                        "generic pipeline reached the transform stage without a decoded tree"
                    )));
                };
                self.check_deadline(started, Stage::Transforming)?;
                let transformed = self
                    .transform
                    .apply(raw_tree)
                    .map_err(|e| self.transform_fault(e, diagnostics))?;

                self.check_deadline(started, Stage::Serializing)?;
                let output = self
                    .renderer
                    .render(&transformed)
                    .map_err(|e| self.serialization_fault(e, diagnostics))?;
                Ok((output, FillResult::Complete))
            }
        }
    }

    fn transform_fault(&self, source: anyhow::Error, diagnostics: &[Diagnostic]) -> Error {
        Error::TransformFault {
            message: source.to_string(),
            source: Some(source),
            diagnostics: diagnostics.to_vec(),
        }
    }

    fn serialization_fault(
        &self,
        source: crate::codec::CodecError,
        diagnostics: &[Diagnostic],
    ) -> Error {
        Error::SerializationFault {
            message: source.to_string(),
            diagnostics: diagnostics.to_vec(),
        }
    }

    fn check_deadline(&self, started: Instant, stage: Stage) -> Result<()> {
        if let Some(deadline) = self.deadline {
            if started.elapsed() >= deadline {
                log::warn!("message deadline expired while {}", stage);
                return Err(Error::DeadlineExceeded { stage });
            }
        }
        Ok(())
    }

    /// Drain the pool on shutdown; the pipeline stays usable afterward.
    pub fn shutdown(&self) {
        if let Some(pool) = &self.pool {
            pool.drain();
        }
    }
}
