//! The binary dialect: the protocol buffers wire format.
//!
//! Fields are written in field-number order, so equal records always produce identical bytes.
//! Repeated numeric fields are packed. When reading, packed and unpacked repeated fields are both
//! accepted, and fields the record type doesn't know are skipped.

use std::io::{Read, Write};

use tracing::trace;

use crate::codec::dialect::{Dialect, DialectInfo, RecordDialect};
use crate::depth_tracking::DepthTracker;
use crate::error::{Error, Result};
use crate::record::{FieldValue, Record, RecordBuilder};
use crate::schema::{FieldDescriptor, FieldType, MessageDescriptor};
use crate::varint;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WireType {
    Varint,
    Fixed64,
    LengthDelimited,
    StartGroup,
    EndGroup,
    Fixed32,
}

impl WireType {
    fn from_u64(v: u64) -> Result<WireType> {
        Ok(match v {
            0 => WireType::Varint,
            1 => WireType::Fixed64,
            2 => WireType::LengthDelimited,
            3 => WireType::StartGroup,
            4 => WireType::EndGroup,
            5 => WireType::Fixed32,
            _ => return Err(Error::BadEncode(format!("Invalid wire type {}", v))),
        })
    }

    fn to_u64(self) -> u64 {
        match self {
            WireType::Varint => 0,
            WireType::Fixed64 => 1,
            WireType::LengthDelimited => 2,
            WireType::StartGroup => 3,
            WireType::EndGroup => 4,
            WireType::Fixed32 => 5,
        }
    }

    /// Wire type of a single, unpacked value of the given field type.
    fn for_type(field_type: &FieldType) -> WireType {
        use crate::schema::FieldType::*;
        match field_type {
            Bool | Int32 | Int64 | SInt32 | SInt64 | UInt32 | UInt64 | Enum(_) => WireType::Varint,
            Fixed64 | SFixed64 | Double => WireType::Fixed64,
            Fixed32 | SFixed32 | Float => WireType::Fixed32,
            String | Bytes | Message(_) => WireType::LengthDelimited,
            Group(_) => WireType::StartGroup,
        }
    }
}

fn write_tag(buf: &mut Vec<u8>, number: u32, wire: WireType) {
    varint::write(buf, ((number as u64) << 3) | wire.to_u64());
}

fn read_tag(buf: &mut &[u8]) -> Result<(u32, WireType)> {
    let key = varint::read(buf)?;
    let number = key >> 3;
    if number == 0 || number > u32::MAX as u64 {
        return Err(Error::BadEncode(format!("Invalid field number {}", number)));
    }
    Ok((number as u32, WireType::from_u64(key & 0x7)?))
}

/// Encode a record to its binary form.
pub fn encode_record(record: &Record) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_record(&mut buf, record)?;
    Ok(buf)
}

/// Decode the binary form of a record into `builder`. The whole of `bytes` must be one record.
pub fn decode_record(mut bytes: &[u8], builder: RecordBuilder) -> Result<RecordBuilder> {
    let mut depth = DepthTracker::new();
    read_record(&mut bytes, builder, None, &mut depth)
}

fn write_record(buf: &mut Vec<u8>, record: &Record) -> Result<()> {
    for (field, value) in record.fields() {
        match value {
            FieldValue::List(items) if field.field_type().is_numeric() => {
                let mut packed = Vec::new();
                for item in items {
                    write_value(&mut packed, field, item)?;
                }
                write_tag(buf, field.number(), WireType::LengthDelimited);
                varint::write(buf, packed.len() as u64);
                buf.extend_from_slice(&packed);
            }
            FieldValue::List(items) => {
                for item in items {
                    write_field(buf, field, item)?;
                }
            }
            value => write_field(buf, field, value)?,
        }
    }
    Ok(())
}

fn write_field(buf: &mut Vec<u8>, field: &FieldDescriptor, value: &FieldValue) -> Result<()> {
    let wire = WireType::for_type(field.field_type());
    write_tag(buf, field.number(), wire);
    match (wire, value) {
        (WireType::StartGroup, FieldValue::Message(r)) => {
            write_record(buf, r)?;
            write_tag(buf, field.number(), WireType::EndGroup);
        }
        (WireType::LengthDelimited, FieldValue::Message(r)) => {
            let inner = encode_record(r)?;
            buf.reserve(varint::len(inner.len() as u64) + inner.len());
            varint::write(buf, inner.len() as u64);
            buf.extend_from_slice(&inner);
        }
        _ => write_value(buf, field, value)?,
    }
    Ok(())
}

/// Write one untagged scalar value.
fn write_value(buf: &mut Vec<u8>, field: &FieldDescriptor, value: &FieldValue) -> Result<()> {
    use crate::schema::FieldType as T;
    match (field.field_type(), value) {
        (T::Bool, FieldValue::Bool(v)) => varint::write(buf, *v as u64),
        (T::Int32, FieldValue::I32(v)) => varint::write(buf, *v as i64 as u64),
        (T::SInt32, FieldValue::I32(v)) => varint::write(buf, varint::zigzag32(*v) as u64),
        (T::SFixed32, FieldValue::I32(v)) => varint::write_fixed32(buf, *v as u32),
        (T::Int64, FieldValue::I64(v)) => varint::write(buf, *v as u64),
        (T::SInt64, FieldValue::I64(v)) => varint::write(buf, varint::zigzag64(*v)),
        (T::SFixed64, FieldValue::I64(v)) => varint::write_fixed64(buf, *v as u64),
        (T::UInt32, FieldValue::U32(v)) => varint::write(buf, *v as u64),
        (T::Fixed32, FieldValue::U32(v)) => varint::write_fixed32(buf, *v),
        (T::UInt64, FieldValue::U64(v)) => varint::write(buf, *v),
        (T::Fixed64, FieldValue::U64(v)) => varint::write_fixed64(buf, *v),
        (T::Float, FieldValue::F32(v)) => varint::write_fixed32(buf, v.to_bits()),
        (T::Double, FieldValue::F64(v)) => varint::write_fixed64(buf, v.to_bits()),
        (T::Enum(_), FieldValue::Enum(v)) => varint::write(buf, *v as i64 as u64),
        (T::String, FieldValue::Str(v)) => {
            varint::write(buf, v.len() as u64);
            buf.extend_from_slice(v.as_bytes());
        }
        (T::Bytes, FieldValue::Bytes(v)) => {
            varint::write(buf, v.len() as u64);
            buf.extend_from_slice(v);
        }
        (ty, v) => {
            return Err(Error::BadEncode(format!(
                "Can't write {} value to {} field '{}'",
                v.name(),
                ty.name(),
                field.name()
            )))
        }
    }
    Ok(())
}

fn read_record(
    buf: &mut &[u8],
    mut builder: RecordBuilder,
    group: Option<u32>,
    depth: &mut DepthTracker,
) -> Result<RecordBuilder> {
    let descriptor = builder.descriptor().clone();
    depth.descend(descriptor.name())?;
    let mut repeated: Vec<(FieldDescriptor, Vec<FieldValue>)> = Vec::new();

    let mut terminated = false;
    while !buf.is_empty() {
        let (number, wire) = read_tag(buf)?;
        if wire == WireType::EndGroup {
            if group == Some(number) {
                terminated = true;
                break;
            }
            return Err(Error::BadEncode(format!("Unexpected end of group {}", number)));
        }
        let field = match descriptor.field_by_number(number) {
            Some(field) => field.clone(),
            None => {
                trace!(number, entity = descriptor.name(), "skipping unknown field");
                skip_field(buf, number, wire, depth)?;
                continue;
            }
        };

        let expected = WireType::for_type(field.field_type());
        let mut values = Vec::new();
        if field.is_repeated() && field.field_type().is_numeric() && wire == WireType::LengthDelimited {
            let len = varint::read(buf)?;
            let mut packed = varint::read_bytes(buf, len)?;
            while !packed.is_empty() {
                values.push(read_value(&mut packed, &descriptor, &field, expected)?);
            }
        } else if wire != expected {
            return Err(Error::BadEncode(format!(
                "Wire type mismatch on field '{}' of entity '{}'",
                field.name(),
                descriptor.name()
            )));
        } else if field.field_type().is_message() {
            // A singular record seen again on the wire merges into the earlier copy.
            let sub = match builder.get(field.name()) {
                Some(FieldValue::Message(earlier)) if !field.is_repeated() => earlier.to_builder(),
                _ => builder.new_builder_for_field(&field)?,
            };
            let sub = if wire == WireType::StartGroup {
                read_record(buf, sub, Some(number), depth)?
            } else {
                let len = varint::read(buf)?;
                let mut inner = varint::read_bytes(buf, len)?;
                read_record(&mut inner, sub, None, depth)?
            };
            values.push(FieldValue::Message(sub.build()));
        } else {
            values.push(read_value(buf, &descriptor, &field, wire)?);
        }

        if field.is_repeated() {
            match repeated.iter_mut().find(|(f, _)| f.number() == number) {
                Some((_, list)) => list.extend(values),
                None => repeated.push((field, values)),
            }
        } else if let Some(value) = values.pop() {
            builder.set_field(&field, value)?;
        }
    }

    if group.is_some() && !terminated {
        return Err(Error::BadEncode(format!("Unterminated group in entity '{}'", descriptor.name())));
    }
    for (field, list) in repeated {
        builder.set_field(&field, FieldValue::List(list))?;
    }
    depth.ascend();
    Ok(builder)
}

/// Read one untagged scalar value.
fn read_value(
    buf: &mut &[u8],
    descriptor: &MessageDescriptor,
    field: &FieldDescriptor,
    wire: WireType,
) -> Result<FieldValue> {
    use crate::schema::FieldType as T;
    let ty = field.field_type();
    Ok(match wire {
        WireType::Varint => {
            let v = varint::read(buf)?;
            match ty {
                T::Bool => FieldValue::Bool(v != 0),
                T::Int32 => FieldValue::I32(v as i32),
                T::Int64 => FieldValue::I64(v as i64),
                T::UInt32 => FieldValue::U32(v as u32),
                T::UInt64 => FieldValue::U64(v),
                T::SInt32 => FieldValue::I32(varint::unzigzag32(v as u32)),
                T::SInt64 => FieldValue::I64(varint::unzigzag64(v)),
                T::Enum(_) => {
                    let number = v as i32;
                    let known = descriptor
                        .enum_type(field)
                        .map_or(false, |e| e.value_by_number(number).is_some());
                    if !known {
                        trace!(
                            field = field.name(),
                            entity = descriptor.name(),
                            number,
                            "keeping unrecognized enum number"
                        );
                    }
                    FieldValue::Enum(number)
                }
                _ => return Err(mismatch(field)),
            }
        }
        WireType::Fixed32 => {
            let v = varint::read_fixed32(buf)?;
            match ty {
                T::Fixed32 => FieldValue::U32(v),
                T::SFixed32 => FieldValue::I32(v as i32),
                T::Float => FieldValue::F32(f32::from_bits(v)),
                _ => return Err(mismatch(field)),
            }
        }
        WireType::Fixed64 => {
            let v = varint::read_fixed64(buf)?;
            match ty {
                T::Fixed64 => FieldValue::U64(v),
                T::SFixed64 => FieldValue::I64(v as i64),
                T::Double => FieldValue::F64(f64::from_bits(v)),
                _ => return Err(mismatch(field)),
            }
        }
        WireType::LengthDelimited => {
            let len = varint::read(buf)?;
            let raw = varint::read_bytes(buf, len)?;
            match ty {
                T::String => FieldValue::Str(
                    String::from_utf8(raw.to_vec())
                        .map_err(|_| Error::BadEncode(format!("Invalid UTF-8 in field '{}'", field.name())))?,
                ),
                T::Bytes => FieldValue::Bytes(raw.to_vec()),
                _ => return Err(mismatch(field)),
            }
        }
        WireType::StartGroup | WireType::EndGroup => return Err(mismatch(field)),
    })
}

fn mismatch(field: &FieldDescriptor) -> Error {
    Error::BadEncode(format!(
        "Wire type doesn't match {} field '{}'",
        field.field_type().name(),
        field.name()
    ))
}

fn skip_field(buf: &mut &[u8], number: u32, wire: WireType, depth: &mut DepthTracker) -> Result<()> {
    match wire {
        WireType::Varint => {
            varint::read(buf)?;
        }
        WireType::Fixed64 => {
            varint::read_bytes(buf, 8)?;
        }
        WireType::Fixed32 => {
            varint::read_bytes(buf, 4)?;
        }
        WireType::LengthDelimited => {
            let len = varint::read(buf)?;
            varint::read_bytes(buf, len)?;
        }
        WireType::StartGroup => {
            depth.descend("unknown group")?;
            loop {
                if buf.is_empty() {
                    return Err(Error::BadEncode(format!("Unterminated group {}", number)));
                }
                let (inner, inner_wire) = read_tag(buf)?;
                if inner_wire == WireType::EndGroup {
                    if inner != number {
                        return Err(Error::BadEncode(format!("Unexpected end of group {}", inner)));
                    }
                    break;
                }
                skip_field(buf, inner, inner_wire, depth)?;
            }
            depth.ascend();
        }
        WireType::EndGroup => {
            return Err(Error::BadEncode(format!("Unexpected end of group {}", number)));
        }
    }
    Ok(())
}

/// The built-in binary dialect.
#[derive(Clone, Copy, Debug, Default)]
pub struct BinaryDialect;

impl RecordDialect for BinaryDialect {
    fn info(&self) -> DialectInfo {
        Dialect::Binary.info()
    }

    fn decode(&self, reader: &mut dyn Read, builder: RecordBuilder) -> Result<RecordBuilder> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        decode_record(&bytes, builder)
    }

    fn encode(&self, record: &Record, writer: &mut dyn Write) -> Result<()> {
        writer.write_all(&encode_record(record)?)?;
        Ok(())
    }
}
