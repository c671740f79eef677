//! The JSON dialect, following the proto3 JSON mapping.
//!
//! Objects are keyed by each field's JSON name and printed with sorted keys and no extra
//! whitespace. 64-bit integers are written as strings, bytes as base64, enum members by name, and
//! well-known timestamps as RFC 3339 strings. The parser is looser: it also accepts declared field
//! names, numbers in string form, and enum members by number.
//!
//! Type-erased records are expanded in place, with an `@type` property naming the payload type.
//! Payload types must be present in the [`TypeRegistry`] in use.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE},
    Engine as _,
};
use educe::Educe;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value as Json};

use crate::codec::binary;
use crate::codec::dialect::{Dialect, DialectInfo, RecordDialect};
use crate::codec::types::TypeRegistry;
use crate::depth_tracking::DepthTracker;
use crate::error::{Error, Result};
use crate::record::{FieldValue, Record, RecordBuilder};
use crate::schema::{FieldDescriptor, MessageDescriptor};
use crate::timestamp::Timestamp;

/// Name of the property holding a type-erased record's type URL.
const TYPE_PROPERTY: &str = "@type";

/// Settings for the JSON dialect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Educe)]
#[educe(Default)]
#[serde(default)]
pub struct JsonOptions {
    /// Print fields that hold their default value. Unset nested records are always left out.
    #[educe(Default = true)]
    pub include_defaults: bool,
    /// Skip object keys that don't name a field, instead of failing.
    #[educe(Default = true)]
    pub ignore_unknown: bool,
}

#[derive(Clone, Copy)]
struct Context<'a> {
    options: &'a JsonOptions,
    types: &'a TypeRegistry,
}

fn unresolved_type(url: &str) -> Error {
    Error::Decoding(format!(
        "Unable to resolve type URL '{}' of a type-erased record; the type isn't registered",
        url
    ))
}

/// Convert a record to a JSON value. Type-erased records can't be expanded, so any with a payload
/// fail; see [`to_json_with`].
pub fn to_json(record: &Record, options: &JsonOptions) -> Result<Json> {
    to_json_with(record, options, &TypeRegistry::new())
}

/// Convert a record to a JSON value, resolving type-erased payloads through `types`.
pub fn to_json_with(record: &Record, options: &JsonOptions, types: &TypeRegistry) -> Result<Json> {
    print_record(record, Context { options, types })
}

fn print_record(record: &Record, cx: Context) -> Result<Json> {
    let descriptor = record.descriptor();
    if descriptor.is_well_known_timestamp() {
        let ts = Timestamp::try_from(record)?;
        return ts.to_rfc3339().map(Json::String).ok_or_else(|| {
            Error::BadEncode(format!("Timestamp {} can't be written as RFC 3339", ts))
        });
    }
    if descriptor.is_well_known_any() {
        return print_any(record, cx);
    }

    // Sorted regardless of how serde_json's map is configured.
    let mut obj = BTreeMap::new();
    for field in descriptor.fields() {
        let value = match record.get_by_number(field.number()) {
            Some(value) => value.clone(),
            None if !cx.options.include_defaults => continue,
            None if field.is_repeated() => FieldValue::List(Vec::new()),
            None => match FieldValue::default_for(field.field_type()) {
                Some(value) => value,
                None => continue,
            },
        };
        obj.insert(field.json_name().to_string(), value_to_json(descriptor, field, &value, cx)?);
    }
    Ok(Json::Object(obj.into_iter().collect::<Map<String, Json>>()))
}

fn print_any(record: &Record, cx: Context) -> Result<Json> {
    let url = record.get("type_url").and_then(|v| v.as_str()).unwrap_or_default();
    if url.is_empty() {
        return Ok(Json::Object(Map::new()));
    }
    let payload_type = cx.types.find(url).ok_or_else(|| unresolved_type(url))?;
    let raw = record.get("value").and_then(|v| v.as_bytes()).unwrap_or_default();
    let payload = binary::decode_record(raw, RecordBuilder::new(&payload_type))?.build();

    let mut obj = BTreeMap::new();
    obj.insert(TYPE_PROPERTY.to_string(), Json::String(url.to_string()));
    match print_record(&payload, cx)? {
        // Well-known payloads that don't print as objects go under "value".
        Json::Object(fields) if !payload_type.is_well_known_any() => obj.extend(fields),
        other => {
            obj.insert("value".to_string(), other);
        }
    }
    Ok(Json::Object(obj.into_iter().collect::<Map<String, Json>>()))
}

fn value_to_json(
    descriptor: &MessageDescriptor,
    field: &FieldDescriptor,
    value: &FieldValue,
    cx: Context,
) -> Result<Json> {
    Ok(match value {
        FieldValue::Bool(v) => Json::Bool(*v),
        FieldValue::I32(v) => Json::from(*v),
        FieldValue::U32(v) => Json::from(*v),
        FieldValue::I64(v) => Json::String(v.to_string()),
        FieldValue::U64(v) => Json::String(v.to_string()),
        FieldValue::F32(v) => float_to_json(*v as f64),
        FieldValue::F64(v) => float_to_json(*v),
        FieldValue::Str(v) => Json::String(v.clone()),
        FieldValue::Bytes(v) => Json::String(STANDARD.encode(v)),
        FieldValue::Enum(v) => {
            let enum_type = descriptor.enum_type(field);
            match enum_type.as_ref().and_then(|e| e.value_by_number(*v)) {
                Some(name) => Json::String(name.to_string()),
                None => Json::from(*v),
            }
        }
        FieldValue::Message(r) => print_record(r, cx)?,
        FieldValue::List(items) => Json::Array(
            items
                .iter()
                .map(|item| value_to_json(descriptor, field, item, cx))
                .collect::<Result<Vec<_>>>()?,
        ),
    })
}

fn float_to_json(v: f64) -> Json {
    match Number::from_f64(v) {
        Some(n) => Json::Number(n),
        None if v.is_nan() => Json::String("NaN".to_string()),
        None if v > 0.0 => Json::String("Infinity".to_string()),
        None => Json::String("-Infinity".to_string()),
    }
}

/// Merge a JSON value into `builder`. Type-erased records with a payload fail; see
/// [`from_json_with`].
pub fn from_json(json: &Json, builder: RecordBuilder, options: &JsonOptions) -> Result<RecordBuilder> {
    from_json_with(json, builder, options, &TypeRegistry::new())
}

/// Merge a JSON value into `builder`, resolving type-erased payloads through `types`.
pub fn from_json_with(
    json: &Json,
    builder: RecordBuilder,
    options: &JsonOptions,
    types: &TypeRegistry,
) -> Result<RecordBuilder> {
    let mut depth = DepthTracker::new();
    merge(json, builder, Context { options, types }, &mut depth)
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

/// Merge any JSON shape a record may take: an object, or a string for timestamps.
fn merge(
    json: &Json,
    builder: RecordBuilder,
    cx: Context,
    depth: &mut DepthTracker,
) -> Result<RecordBuilder> {
    let descriptor = builder.descriptor().clone();
    match json {
        Json::String(s) if descriptor.is_well_known_timestamp() => merge_timestamp(s, builder),
        _ if descriptor.is_well_known_any() => merge_any(json, builder, cx, depth),
        _ => merge_object(json, builder, cx, depth),
    }
}

fn merge_timestamp(s: &str, mut builder: RecordBuilder) -> Result<RecordBuilder> {
    let ts = Timestamp::parse_rfc3339(s)
        .ok_or_else(|| Error::Decoding(format!("Invalid RFC 3339 timestamp '{}'", s)))?;
    builder.set("seconds", FieldValue::I64(ts.timestamp_utc()))?;
    builder.set("nanos", FieldValue::I32(ts.timestamp_subsec_nanos() as i32))?;
    Ok(builder)
}

fn merge_any(
    json: &Json,
    mut builder: RecordBuilder,
    cx: Context,
    depth: &mut DepthTracker,
) -> Result<RecordBuilder> {
    let obj = json.as_object().ok_or_else(|| {
        Error::Decoding(format!(
            "Expected a JSON object for a type-erased record, found {}",
            json_kind(json)
        ))
    })?;
    if obj.is_empty() {
        return Ok(builder);
    }
    let url = obj.get(TYPE_PROPERTY).and_then(Json::as_str).ok_or_else(|| {
        Error::Decoding(format!("Type-erased record is missing its '{}' property", TYPE_PROPERTY))
    })?;
    let payload_type = cx.types.find(url).ok_or_else(|| unresolved_type(url))?;

    let payload = RecordBuilder::new(&payload_type);
    let payload = if payload_type.is_well_known_timestamp() || payload_type.is_well_known_any() {
        let value = obj.get("value").ok_or_else(|| {
            Error::Decoding(format!("Type-erased '{}' record is missing its 'value' property", url))
        })?;
        merge(value, payload, cx, depth)?
    } else {
        let mut fields = obj.clone();
        fields.remove(TYPE_PROPERTY);
        merge_object(&Json::Object(fields), payload, cx, depth)?
    };

    builder.set("type_url", FieldValue::Str(url.to_string()))?;
    builder.set("value", FieldValue::Bytes(binary::encode_record(&payload.build())?))?;
    Ok(builder)
}

fn merge_object(
    json: &Json,
    mut builder: RecordBuilder,
    cx: Context,
    depth: &mut DepthTracker,
) -> Result<RecordBuilder> {
    let descriptor = builder.descriptor().clone();
    let obj = json.as_object().ok_or_else(|| {
        Error::Decoding(format!(
            "Expected a JSON object for entity '{}', found {}",
            descriptor.name(),
            json_kind(json)
        ))
    })?;
    depth.descend(descriptor.name())?;

    for (key, value) in obj {
        let field = match descriptor.field_by_json_name(key) {
            Some(field) => field.clone(),
            None if cx.options.ignore_unknown => continue,
            None => {
                return Err(Error::Decoding(format!(
                    "Unknown field '{}' on entity '{}'",
                    key,
                    descriptor.name()
                )))
            }
        };
        if value.is_null() {
            continue;
        }

        let decoded = if field.is_repeated() {
            let items = value
                .as_array()
                .ok_or_else(|| Error::invalid_input(field.name(), descriptor.name(), json_kind(value)))?;
            let list = items
                .iter()
                .map(|item| element_from_json(&builder, &field, item, cx, depth))
                .collect::<Result<Vec<_>>>()?;
            FieldValue::List(list)
        } else {
            element_from_json(&builder, &field, value, cx, depth)?
        };
        builder.set_field(&field, decoded)?;
    }

    depth.ascend();
    Ok(builder)
}

fn element_from_json(
    builder: &RecordBuilder,
    field: &FieldDescriptor,
    json: &Json,
    cx: Context,
    depth: &mut DepthTracker,
) -> Result<FieldValue> {
    let descriptor = builder.descriptor();
    let invalid = || Error::invalid_input(field.name(), descriptor.name(), json_kind(json));

    use crate::schema::FieldType as T;
    Ok(match field.field_type() {
        T::Message(_) | T::Group(_) => {
            let sub = builder.new_builder_for_field(field)?;
            FieldValue::Message(merge(json, sub, cx, depth)?.build())
        }
        T::Bool => FieldValue::Bool(json.as_bool().ok_or_else(invalid)?),
        T::Int32 | T::SInt32 | T::SFixed32 => {
            let v = integer_from_json(json).ok_or_else(invalid)?;
            FieldValue::I32(i32::try_from(v).map_err(|_| invalid())?)
        }
        T::Int64 | T::SInt64 | T::SFixed64 => {
            let v = integer_from_json(json).ok_or_else(invalid)?;
            FieldValue::I64(i64::try_from(v).map_err(|_| invalid())?)
        }
        T::UInt32 | T::Fixed32 => {
            let v = integer_from_json(json).ok_or_else(invalid)?;
            FieldValue::U32(u32::try_from(v).map_err(|_| invalid())?)
        }
        T::UInt64 | T::Fixed64 => {
            let v = integer_from_json(json).ok_or_else(invalid)?;
            FieldValue::U64(u64::try_from(v).map_err(|_| invalid())?)
        }
        T::Float => FieldValue::F32(float_from_json(json).ok_or_else(invalid)? as f32),
        T::Double => FieldValue::F64(float_from_json(json).ok_or_else(invalid)?),
        T::String => FieldValue::Str(json.as_str().ok_or_else(invalid)?.to_string()),
        T::Bytes => {
            let s = json.as_str().ok_or_else(invalid)?;
            let raw = STANDARD
                .decode(s)
                .or_else(|_| URL_SAFE.decode(s))
                .map_err(|e| {
                    Error::Decoding(format!(
                        "Invalid base64 for field '{}' on entity '{}': {}",
                        field.name(),
                        descriptor.name(),
                        e
                    ))
                })?;
            FieldValue::Bytes(raw)
        }
        T::Enum(_) => {
            let enum_type = crate::enums::enum_type_for(descriptor, field)?;
            let number = match json {
                Json::String(s) => enum_type.value_by_name(s),
                Json::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
                _ => return Err(invalid()),
            };
            FieldValue::Enum(number.ok_or_else(|| {
                Error::Decoding(format!(
                    "Unable to resolve enum value {} for field '{}' on entity '{}'",
                    json,
                    field.name(),
                    descriptor.name()
                ))
            })?)
        }
    })
}

/// Integers may come as JSON numbers (including integral floats like `1.0`) or decimal strings.
fn integer_from_json(json: &Json) -> Option<i128> {
    match json {
        Json::Number(n) => {
            if let Some(v) = n.as_i64() {
                Some(v as i128)
            } else if let Some(v) = n.as_u64() {
                Some(v as i128)
            } else {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < 1.9e19)
                    .map(|f| f as i128)
            }
        }
        Json::String(s) => s.trim().parse::<i128>().ok(),
        _ => None,
    }
}

fn float_from_json(json: &Json) -> Option<f64> {
    match json {
        Json::Number(n) => n.as_f64(),
        Json::String(s) => match s.as_str() {
            "NaN" => Some(f64::NAN),
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            s => s.trim().parse::<f64>().ok(),
        },
        _ => None,
    }
}

/// The built-in JSON dialect.
#[derive(Clone, Debug, Default)]
pub struct JsonDialect {
    options: JsonOptions,
    types: TypeRegistry,
}

impl JsonDialect {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: JsonOptions) -> Self {
        Self {
            options,
            types: TypeRegistry::new(),
        }
    }

    /// Resolve type-erased payloads through `types`.
    pub fn with_types(mut self, types: TypeRegistry) -> Self {
        self.types = types;
        self
    }

    pub fn options(&self) -> &JsonOptions {
        &self.options
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }
}

impl RecordDialect for JsonDialect {
    fn info(&self) -> DialectInfo {
        Dialect::Json.info()
    }

    fn decode(&self, reader: &mut dyn Read, builder: RecordBuilder) -> Result<RecordBuilder> {
        let json: Json = serde_json::from_reader(reader)?;
        from_json_with(&json, builder, &self.options, &self.types)
    }

    fn encode(&self, record: &Record, writer: &mut dyn Write) -> Result<()> {
        let json = to_json_with(record, &self.options, &self.types)?;
        serde_json::to_writer(writer, &json)?;
        Ok(())
    }
}
