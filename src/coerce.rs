//! Coercion of a single dynamic value into a single scalar field.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::warn;

use crate::enums;
use crate::error::{Error, Result};
use crate::record::FieldValue;
use crate::schema::{FieldDescriptor, MessageDescriptor};
use crate::value::Value;

/// Coerce `value` into the declared type of the singular scalar field `field` of `descriptor`.
///
/// Strings accept document references, rendered as `reference_prefix` followed by the path.
/// Floating-point fields accept any number or a numeric string, narrowed to single precision.
/// Unsigned fields accept longs and floating-point values, narrowed to the field's width. Byte
/// fields accept raw bytes or base64 strings. Enums are resolved by name or number.
pub fn coerce(
    descriptor: &MessageDescriptor,
    field: &FieldDescriptor,
    value: &Value,
    reference_prefix: &str,
) -> Result<FieldValue> {
    if field.is_repeated() {
        return Err(Error::Decoding(format!(
            "Cannot set repeated field '{}' on entity '{}' as a simple value",
            field.name(),
            descriptor.name()
        )));
    }
    coerce_element(descriptor, field, value, reference_prefix)
}

/// Coerce one value into the element type of `field`, whether or not the field is repeated.
pub(crate) fn coerce_element(
    descriptor: &MessageDescriptor,
    field: &FieldDescriptor,
    value: &Value,
    reference_prefix: &str,
) -> Result<FieldValue> {
    let entity = descriptor.name();
    let invalid = || Error::invalid_input(field.name(), entity, value.name());

    use crate::schema::FieldType::*;
    Ok(match field.field_type() {
        Bool => match *value {
            Value::Bool(v) => FieldValue::Bool(v),
            _ => return Err(invalid()),
        },
        Int32 | SInt32 | SFixed32 => match *value {
            Value::Int(v) => FieldValue::I32(v),
            Value::Long(v) => FieldValue::I32(i32::try_from(v).map_err(|_| invalid())?),
            _ => return Err(invalid()),
        },
        Int64 | SInt64 | SFixed64 => match *value {
            Value::Int(v) => FieldValue::I64(v as i64),
            Value::Long(v) => FieldValue::I64(v),
            _ => return Err(invalid()),
        },
        UInt32 | Fixed32 => match *value {
            Value::Int(v) => FieldValue::U32(v as u32),
            Value::Long(v) => FieldValue::U32(v as u32),
            Value::Double(v) => FieldValue::U32(v as u32),
            Value::Float(v) => FieldValue::U32(v as u32),
            _ => return Err(invalid()),
        },
        UInt64 | Fixed64 => match *value {
            Value::Int(v) => FieldValue::U64(v as u64),
            Value::Long(v) => FieldValue::U64(v as u64),
            Value::Double(v) => FieldValue::U64(v as u64),
            Value::Float(v) => FieldValue::U64(v as u64),
            _ => return Err(invalid()),
        },
        Float | Double => {
            let narrowed = match *value {
                Value::Int(v) => v as f32,
                Value::Long(v) => v as f32,
                Value::Double(v) => v as f32,
                Value::Float(v) => v,
                Value::Str(ref s) => s.trim().parse::<f32>().map_err(|_| invalid())?,
                _ => {
                    warn!(
                        field = field.name(),
                        entity,
                        kind = value.name(),
                        "Unable to serialize precise numeric field"
                    );
                    return Err(invalid());
                }
            };
            if let Float = field.field_type() {
                FieldValue::F32(narrowed)
            } else {
                FieldValue::F64(narrowed as f64)
            }
        }
        String => match *value {
            Value::Str(ref s) => FieldValue::Str(s.clone()),
            Value::Reference(ref r) => FieldValue::Str(format!("{}{}", reference_prefix, r.path())),
            _ => return Err(invalid()),
        },
        Bytes => match *value {
            Value::Str(ref s) => FieldValue::Bytes(STANDARD.decode(s.trim()).map_err(|e| {
                Error::Decoding(format!(
                    "Invalid base64 for bytes field '{}' on entity '{}': {}",
                    field.name(),
                    entity,
                    e
                ))
            })?),
            Value::Bin(ref v) => FieldValue::Bytes(v.clone()),
            _ => return Err(invalid()),
        },
        Enum(_) => {
            let enum_type = enums::enum_type_for(descriptor, field)?;
            FieldValue::Enum(enums::resolve(&enum_type, field, entity, value)?)
        }
        Message(_) | Group(_) => {
            return Err(Error::Decoding(format!(
                "Cannot set sub-message field '{}' on entity '{}' as a simple value",
                field.name(),
                entity
            )))
        }
    })
}
