//! XML codec
//!
//! A small internal reader/writer covering the element/attribute/text subset
//! this core needs: no namespaces, no DTD processing, no mixed-content
//! fidelity. The decoder unwraps the document element, so a `<Order>...`
//! payload decodes to the same tree shape a JSON `{...}` payload does.
//!
//! Decoding rules:
//! - an element with child elements becomes an object (inter-element
//!   whitespace is dropped)
//! - an element with neither children nor attributes becomes a string scalar
//! - an element with attributes but no children becomes an object whose text,
//!   if any, lands under a `#text` child
//!
//! Copyright (c) 2026 Canopy Team
//! Licensed under the MIT OR Apache-2.0 license

use super::{CodecError, Decoder, Renderer};
use canopy_schemas::{Node, NodeDescriptor, ScalarValue, SchemaDescriptor};
use std::fmt::Write as _;
use std::sync::Arc;

/// Internal XML reader
#[derive(Debug, Default)]
pub struct XmlDecoder;

impl Decoder for XmlDecoder {
    fn decode(&self, raw: &str) -> Result<Node, CodecError> {
        let mut parser = Parser::new(raw);
        parser.skip_misc();
        let (_, node) = parser.parse_element()?;
        parser.skip_misc();
        if !parser.at_end() {
            return Err(parser.error("content after document element"));
        }
        Ok(node)
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> CodecError {
        CodecError::parse_at("xml", message, self.line, self.column)
    }

    fn expect(&mut self, expected: char) -> Result<(), CodecError> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.error(format!("expected '{}', found '{}'", expected, c))),
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    fn eat(&mut self, literal: &str) -> bool {
        if self.rest().starts_with(literal) {
            for _ in literal.chars() {
                self.bump();
            }
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    /// Skip prolog, processing instructions, comments, and doctype
    fn skip_misc(&mut self) {
        loop {
            self.skip_whitespace();
            if self.eat("<!--") {
                while !self.at_end() && !self.eat("-->") {
                    self.bump();
                }
            } else if self.rest().starts_with("<?") || self.rest().starts_with("<!DOCTYPE") {
                while let Some(c) = self.bump() {
                    if c == '>' {
                        break;
                    }
                }
            } else {
                return;
            }
        }
    }

    fn parse_name(&mut self) -> Result<String, CodecError> {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':') {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if name.is_empty() {
            return Err(self.error("expected an element or attribute name"));
        }
        Ok(name)
    }

    fn parse_element(&mut self) -> Result<(String, Node), CodecError> {
        self.expect('<')?;
        let name = self.parse_name()?;

        let mut attributes = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some('/') => {
                    self.bump();
                    self.expect('>')?;
                    return Ok((name, assemble(Vec::new(), attributes, String::new())));
                }
                Some('>') => {
                    self.bump();
                    break;
                }
                Some(_) => {
                    let attr_name = self.parse_name()?;
                    self.skip_whitespace();
                    self.expect('=')?;
                    self.skip_whitespace();
                    let quote = match self.bump() {
                        Some(q @ ('"' | '\'')) => q,
                        _ => return Err(self.error("attribute value must be quoted")),
                    };
                    let mut value = String::new();
                    loop {
                        match self.bump() {
                            Some(c) if c == quote => break,
                            Some(c) => value.push(c),
                            None => return Err(self.error("unterminated attribute value")),
                        }
                    }
                    attributes.push((attr_name, unescape(&value)));
                }
                None => return Err(self.error("unterminated start tag")),
            }
        }

        let mut children = Vec::new();
        let mut text = String::new();
        loop {
            if self.eat("<!--") {
                while !self.at_end() && !self.eat("-->") {
                    self.bump();
                }
            } else if self.eat("<![CDATA[") {
                let start = self.pos;
                while !self.rest().starts_with("]]>") {
                    if self.bump().is_none() {
                        return Err(self.error("unterminated CDATA section"));
                    }
                }
                text.push_str(&self.input[start..self.pos]);
                self.eat("]]>");
            } else if self.rest().starts_with("</") {
                self.bump();
                self.bump();
                let closing = self.parse_name()?;
                if closing != name {
                    return Err(self.error(format!(
                        "mismatched closing tag: expected </{}>, found </{}>",
                        name, closing
                    )));
                }
                self.skip_whitespace();
                self.expect('>')?;
                return Ok((name, assemble(children, attributes, text)));
            } else if self.peek() == Some('<') {
                let (child_name, child) = self.parse_element()?;
                children.push((child_name, child));
            } else {
                match self.bump() {
                    Some(c) => text.push(c),
                    None => return Err(self.error(format!("unterminated element <{}>", name))),
                }
            }
        }
    }
}

fn assemble(children: Vec<(String, Node)>, attributes: Vec<(String, String)>, text: String) -> Node {
    let text = unescape(text.trim());
    if children.is_empty() && attributes.is_empty() {
        Node::string(text)
    } else {
        let mut children = children;
        if children.is_empty() && !text.is_empty() {
            children.push(("#text".to_string(), Node::string(text)));
        }
        Node::Object {
            children,
            attributes,
        }
    }
}

fn unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find('&') {
        out.push_str(&rest[..idx]);
        rest = &rest[idx..];
        let end = match rest.find(';') {
            Some(end) => end,
            None => {
                out.push_str(rest);
                return out;
            }
        };
        let entity = &rest[1..end];
        match entity {
            "amp" => out.push('&'),
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            _ => {
                let parsed = entity
                    .strip_prefix("#x")
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32);
                match parsed {
                    Some(c) => out.push(c),
                    // Unknown entity: keep it verbatim.
                    None => out.push_str(&rest[..=end]),
                }
            }
        }
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    out
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(text: &str) -> String {
    escape_text(text).replace('"', "&quot;")
}

/// Internal XML writer
///
/// Element names for array items come from the schema descriptor when one is
/// available; without a schema, items render as `<item>`.
#[derive(Debug)]
pub struct XmlRenderer {
    root_name: String,
    descriptor: Option<Arc<SchemaDescriptor>>,
}

impl XmlRenderer {
    /// Renderer with a fixed root element name and no schema guidance
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            root_name: root_name.into(),
            descriptor: None,
        }
    }

    /// Renderer that takes root and array-item element names from a schema
    pub fn for_schema(descriptor: Arc<SchemaDescriptor>) -> Self {
        Self {
            root_name: descriptor.root().name.clone(),
            descriptor: Some(descriptor),
        }
    }
}

impl Renderer for XmlRenderer {
    fn render(&self, tree: &Node) -> Result<String, CodecError> {
        let mut out = String::new();
        let desc = self.descriptor.as_ref().map(|d| d.root());
        write_node(&mut out, &self.root_name, tree, desc);
        Ok(out)
    }
}

fn write_node(out: &mut String, name: &str, node: &Node, desc: Option<&NodeDescriptor>) {
    match node {
        Node::Scalar(ScalarValue::String(s)) if s.is_empty() => {
            let _ = write!(out, "<{}/>", name);
        }
        Node::Scalar(value) => {
            let _ = write!(out, "<{}>{}</{}>", name, escape_text(&value.to_string()), name);
        }
        Node::Array(items) => {
            let item_desc = desc.and_then(|d| d.element.as_deref());
            let item_name = item_desc.map(|d| d.name.as_str()).unwrap_or("item");
            if items.is_empty() {
                let _ = write!(out, "<{}/>", name);
                return;
            }
            let _ = write!(out, "<{}>", name);
            for item in items {
                write_node(out, item_name, item, item_desc);
            }
            let _ = write!(out, "</{}>", name);
        }
        Node::Object {
            children,
            attributes,
        } => {
            let _ = write!(out, "<{}", name);
            for (attr_name, attr_value) in attributes {
                let _ = write!(out, " {}=\"{}\"", attr_name, escape_attr(attr_value));
            }
            if children.is_empty() {
                out.push_str("/>");
                return;
            }
            out.push('>');
            for (child_name, child) in children {
                if child_name == "#text" {
                    if let Node::Scalar(value) = child {
                        out.push_str(&escape_text(&value.to_string()));
                    }
                    continue;
                }
                let child_desc = desc.and_then(|d| d.child(child_name));
                write_node(out, child_name, child, child_desc);
            }
            let _ = write!(out, "</{}>", name);
        }
    }
}
