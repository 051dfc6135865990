//! Format codecs
//!
//! The pipeline treats format handling as two injected capabilities: a
//! [`Decoder`] that parses a raw payload into a [`Node`] tree, and a
//! [`Renderer`] that serializes a tree back to text. Built-in codecs cover
//! the three declared format families (JSON, XML, CSV); anything else can be
//! plugged in through the same traits.
//!
//! Copyright (c) 2026 Canopy Team
//! Licensed under the MIT OR Apache-2.0 license

pub mod csv;
pub mod json;
pub mod xml;

use canopy_schemas::{Node, SchemaDescriptor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub use self::csv::{CsvDecoder, CsvRenderer};
pub use self::json::{JsonDecoder, JsonRenderer};
pub use self::xml::{XmlDecoder, XmlRenderer};

/// Codec-level failure: unparsable input or unrenderable tree
#[derive(Debug, Error)]
pub enum CodecError {
    /// The raw payload is not well-formed in the declared format
    #[error("{format} parse error: {message}")]
    Parse {
        format: &'static str,
        message: String,
        /// Source position, when the parser can report one
        line: Option<u32>,
        column: Option<u32>,
    },

    /// The tree cannot be expressed in the target format
    #[error("{format} render error: {message}")]
    Render {
        format: &'static str,
        message: String,
    },
}

impl CodecError {
    pub(crate) fn parse_at(
        format: &'static str,
        message: impl Into<String>,
        line: u32,
        column: u32,
    ) -> Self {
        CodecError::Parse {
            format,
            message: message.into(),
            line: Some(line),
            column: Some(column),
        }
    }
}

/// Parses a raw textual payload into a structural tree
pub trait Decoder: Send + Sync {
    fn decode(&self, raw: &str) -> Result<Node, CodecError>;
}

/// Renders a structural tree to a target format's textual representation
pub trait Renderer: Send + Sync {
    fn render(&self, tree: &Node) -> Result<String, CodecError>;
}

/// Built-in format families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
    Xml,
    Csv,
}

impl Format {
    pub fn as_str(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Xml => "xml",
            Format::Csv => "csv",
        }
    }

    /// The built-in decoder for this format
    pub fn decoder(self) -> Arc<dyn Decoder> {
        match self {
            Format::Json => Arc::new(JsonDecoder),
            Format::Xml => Arc::new(XmlDecoder),
            Format::Csv => Arc::new(CsvDecoder),
        }
    }

    /// The built-in renderer for this format. XML rendering needs element
    /// names that the bare tree does not carry, so the descriptor (when one
    /// exists) is threaded through here.
    pub fn renderer(self, descriptor: Option<&Arc<SchemaDescriptor>>) -> Arc<dyn Renderer> {
        match self {
            Format::Json => Arc::new(JsonRenderer),
            Format::Xml => Arc::new(match descriptor {
                Some(descriptor) => XmlRenderer::for_schema(Arc::clone(descriptor)),
                None => XmlRenderer::new("message"),
            }),
            Format::Csv => Arc::new(CsvRenderer),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
