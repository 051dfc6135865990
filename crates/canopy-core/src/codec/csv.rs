//! CSV codec
//!
//! Header-row tabular format: the first record names the columns, every
//! following record becomes a flat object, and the document decodes to an
//! array of those objects. Fields stay strings at decode time; coercion into
//! declared column types happens at fill time against the schema.
//!
//! Quoting follows RFC 4180: fields may be wrapped in double quotes, with
//! embedded quotes doubled.
//!
//! Copyright (c) 2026 Canopy Team
//! Licensed under the MIT OR Apache-2.0 license

use super::{CodecError, Decoder, Renderer};
use canopy_schemas::{Node, ScalarValue};

/// Header-row CSV decoder
#[derive(Debug, Default)]
pub struct CsvDecoder;

impl Decoder for CsvDecoder {
    fn decode(&self, raw: &str) -> Result<Node, CodecError> {
        let records = parse_records(raw)?;
        let mut rows = records.into_iter();
        let headers = match rows.next() {
            Some(headers) => headers,
            None => return Ok(Node::Array(Vec::new())),
        };

        let mut out = Vec::new();
        for (index, record) in rows.enumerate() {
            if record.len() != headers.len() {
                return Err(CodecError::parse_at(
                    "csv",
                    format!(
                        "record has {} field(s), header declares {}",
                        record.len(),
                        headers.len()
                    ),
                    // Records are physical lines only when no field embeds a
                    // newline; still the most useful position we can give.
                    index as u32 + 2,
                    1,
                ));
            }
            let mut row = Node::object();
            for (header, field) in headers.iter().zip(record) {
                row.push_child(header.clone(), Node::string(field));
            }
            out.push(row);
        }
        Ok(Node::Array(out))
    }
}

fn parse_records(raw: &str) -> Result<Vec<Vec<String>>, CodecError> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line: u32 = 1;
    let mut column: u32 = 1;
    let mut chars = raw.chars().peekable();
    let mut saw_any = false;

    while let Some(c) = chars.next() {
        saw_any = true;
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                    column += 2;
                } else {
                    in_quotes = false;
                    column += 1;
                }
            }
            '"' if field.is_empty() => {
                in_quotes = true;
                column += 1;
            }
            '"' => {
                return Err(CodecError::parse_at(
                    "csv",
                    "unexpected quote inside unquoted field",
                    line,
                    column,
                ));
            }
            ',' if !in_quotes => {
                record.push(std::mem::take(&mut field));
                column += 1;
            }
            '\r' if !in_quotes => {
                column += 1;
            }
            '\n' if !in_quotes => {
                record.push(std::mem::take(&mut field));
                if record.len() > 1 || !record[0].is_empty() {
                    records.push(std::mem::take(&mut record));
                } else {
                    record.clear();
                }
                line += 1;
                column = 1;
            }
            '\n' => {
                field.push('\n');
                line += 1;
                column = 1;
            }
            other => {
                field.push(other);
                column += 1;
            }
        }
    }

    if in_quotes {
        return Err(CodecError::parse_at(
            "csv",
            "unterminated quoted field",
            line,
            column,
        ));
    }
    if saw_any && (!field.is_empty() || !record.is_empty()) {
        record.push(field);
        if record.len() > 1 || !record[0].is_empty() {
            records.push(record);
        }
    }
    Ok(records)
}

/// Header-row CSV renderer
///
/// Accepts an array of flat objects, or an object whose single array child
/// holds the rows (the shape a schema-driven tabular template produces).
#[derive(Debug, Default)]
pub struct CsvRenderer;

impl Renderer for CsvRenderer {
    fn render(&self, tree: &Node) -> Result<String, CodecError> {
        let rows = match tree {
            Node::Array(rows) => rows,
            Node::Object { children, .. } => match children.as_slice() {
                [(_, Node::Array(rows))] => rows,
                _ => {
                    return Err(CodecError::Render {
                        format: "csv",
                        message: "expected an array of rows or an object with one array child"
                            .to_string(),
                    })
                }
            },
            other => {
                return Err(CodecError::Render {
                    format: "csv",
                    message: format!("cannot render a bare {} as CSV", other.kind_name()),
                })
            }
        };

        let Some(first) = rows.first() else {
            return Ok(String::new());
        };
        let headers: Vec<&str> = match first {
            Node::Object { children, .. } => {
                children.iter().map(|(name, _)| name.as_str()).collect()
            }
            other => {
                return Err(CodecError::Render {
                    format: "csv",
                    message: format!("rows must be objects, found {}", other.kind_name()),
                })
            }
        };

        let mut out = String::new();
        out.push_str(&join_fields(headers.iter().copied()));
        out.push('\n');
        for row in rows {
            let fields: Vec<String> = headers
                .iter()
                .map(|header| match row.child(header) {
                    Some(Node::Scalar(value)) => scalar_field(value),
                    _ => String::new(),
                })
                .collect();
            out.push_str(&join_fields(fields.iter().map(String::as_str)));
            out.push('\n');
        }
        Ok(out)
    }
}

fn scalar_field(value: &ScalarValue) -> String {
    value.to_string()
}

fn join_fields<'a>(fields: impl Iterator<Item = &'a str>) -> String {
    fields
        .map(quote_field)
        .collect::<Vec<_>>()
        .join(",")
}

fn quote_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
