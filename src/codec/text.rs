//! The text dialect: a human-readable rendering in the protocol buffers text style.
//!
//! ```text
//! name: "widget"
//! sizes: 1
//! sizes: 2
//! owner {
//!   id: "u1"
//! }
//! ```
//!
//! This dialect is write-only; it is meant for people, not for round trips.

use std::fmt::{self, Write as _};
use std::io::{Read, Write};

use crate::codec::dialect::{Dialect, DialectInfo, RecordDialect};
use crate::error::{Error, Result};
use crate::record::{FieldValue, Record, RecordBuilder};
use crate::schema::FieldDescriptor;

/// Render a record as text.
pub fn render(record: &Record) -> String {
    let mut out = String::new();
    // Writing into a String can't fail.
    let _ = render_record(&mut out, record, 0);
    out
}

fn render_record(out: &mut String, record: &Record, indent: usize) -> fmt::Result {
    for (field, value) in record.fields() {
        match value {
            FieldValue::List(items) => {
                for item in items {
                    render_field(out, record, field, item, indent)?;
                }
            }
            value => render_field(out, record, field, value, indent)?,
        }
    }
    Ok(())
}

fn render_field(
    out: &mut String,
    parent: &Record,
    field: &FieldDescriptor,
    value: &FieldValue,
    indent: usize,
) -> fmt::Result {
    let pad = "  ".repeat(indent);
    if let FieldValue::Message(inner) = value {
        writeln!(out, "{}{} {{", pad, field.name())?;
        render_record(out, inner, indent + 1)?;
        return writeln!(out, "{}}}", pad);
    }
    write!(out, "{}{}: ", pad, field.name())?;
    match value {
        FieldValue::Bool(v) => write!(out, "{}", v)?,
        FieldValue::I32(v) => write!(out, "{}", v)?,
        FieldValue::I64(v) => write!(out, "{}", v)?,
        FieldValue::U32(v) => write!(out, "{}", v)?,
        FieldValue::U64(v) => write!(out, "{}", v)?,
        FieldValue::F32(v) if v.is_finite() => write!(out, "{}", v)?,
        FieldValue::F64(v) if v.is_finite() => write!(out, "{}", v)?,
        FieldValue::F32(v) => out.push_str(non_finite(*v as f64)),
        FieldValue::F64(v) => out.push_str(non_finite(*v)),
        FieldValue::Str(v) => escape(out, v.as_bytes())?,
        FieldValue::Bytes(v) => escape(out, v)?,
        FieldValue::Enum(v) => {
            let enum_type = parent.descriptor().enum_type(field);
            match enum_type.as_ref().and_then(|e| e.value_by_number(*v)) {
                Some(name) => out.push_str(name),
                None => write!(out, "{}", v)?,
            }
        }
        FieldValue::Message(_) | FieldValue::List(_) => (),
    }
    out.push('\n');
    Ok(())
}

fn non_finite(v: f64) -> &'static str {
    if v.is_nan() {
        "nan"
    } else if v > 0.0 {
        "inf"
    } else {
        "-inf"
    }
}

/// Quote and C-escape a byte string. Printable ASCII passes through; everything else is written
/// as a three-digit octal escape.
fn escape(out: &mut String, raw: &[u8]) -> fmt::Result {
    out.push('"');
    for &b in raw {
        match b {
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            b'"' => out.push_str("\\\""),
            b'\'' => out.push_str("\\'"),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7E => out.push(b as char),
            _ => write!(out, "\\{:03o}", b)?,
        }
    }
    out.push('"');
    Ok(())
}

/// The built-in text dialect.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextDialect;

impl RecordDialect for TextDialect {
    fn info(&self) -> DialectInfo {
        Dialect::Text.info()
    }

    fn decode(&self, _reader: &mut dyn Read, _builder: RecordBuilder) -> Result<RecordBuilder> {
        Err(Error::UnsupportedDialect(
            "The TEXT dialect is write-only and can't decode records".to_string(),
        ))
    }

    fn encode(&self, record: &Record, writer: &mut dyn Write) -> Result<()> {
        writer.write_all(render(record).as_bytes())?;
        Ok(())
    }
}
