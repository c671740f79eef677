//! Inflation of loosely-typed maps into typed records.
//!
//! The [`Inflater`] walks the fields of a record type, pulling each one out of an input map keyed
//! by field name. Scalars are coerced through [`coerce`](crate::coerce::coerce), enums through
//! [`enums`](crate::enums), and nested records are inflated recursively, each into its own fresh
//! builder. A few shapes get special handling:
//!
//! - Fields of the well-known timestamp type accept a [`Timestamp`](crate::Timestamp) handle, an
//!   already-built timestamp record, or a number of seconds since the Unix epoch.
//! - Fields with the `Reference` or `Parent` role accept a [`DocumentRef`], which is turned back
//!   into a key record (see [`key`](crate::key)).
//! - `concrete` fields hold one variant of a flattened union: when the discriminator property in
//!   the input names the field, the *same* input map is inflated into that field.
//! - `ephemeral` fields are never read, and missing `required` fields fail the whole call.
//!
//! Null values are treated as absent.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::coerce;
use crate::depth_tracking::DepthTracker;
use crate::enums;
use crate::error::{Error, Result};
use crate::key;
use crate::record::{FieldValue, Record, RecordBuilder};
use crate::schema::{FieldDescriptor, FieldRole, MessageDescriptor};
use crate::timestamp::Timestamp;
use crate::value::Value;
use crate::MAX_DEPTH;

/// Default name of the property naming which `concrete` variant a map holds.
pub const DEFAULT_DISCRIMINATOR: &str = "_type";

/// Builds typed records out of maps of [`Value`]s.
///
/// ```
/// # use record_codec::*;
/// # use std::collections::BTreeMap;
/// let pool = SchemaPoolBuilder::new()
///     .message(
///         MessageSchema::new("shop.Item")
///             .field(FieldDescriptor::new("name", 1, FieldType::String))
///             .field(FieldDescriptor::new("price", 2, FieldType::Double)),
///     )
///     .build()?;
/// let item = pool.get_message("shop.Item").unwrap();
///
/// let mut data = BTreeMap::new();
/// data.insert("name".to_string(), Value::from("widget"));
/// data.insert("price".to_string(), Value::from(2.5));
///
/// let record = Inflater::new().inflate(&item, &data)?;
/// assert_eq!(record.get("name").and_then(|v| v.as_str()), Some("widget"));
/// # Ok::<(), record_codec::Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct Inflater {
    reference_prefix: String,
    discriminator: String,
    max_depth: usize,
}

impl Default for Inflater {
    fn default() -> Self {
        Self::new()
    }
}

impl Inflater {
    pub fn new() -> Self {
        Self {
            reference_prefix: String::new(),
            discriminator: DEFAULT_DISCRIMINATOR.to_string(),
            max_depth: MAX_DEPTH,
        }
    }

    /// Prefix prepended to a reference's path when it is stored in a string field.
    pub fn reference_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.reference_prefix = prefix.into();
        self
    }

    /// Name of the input property that selects a `concrete` variant.
    pub fn discriminator(mut self, name: impl Into<String>) -> Self {
        self.discriminator = name.into();
        self
    }

    /// Maximum nesting depth of records. Deeper input fails with [`Error::ParseLimit`].
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Inflate `data` into a new record of type `descriptor`.
    pub fn inflate(&self, descriptor: &MessageDescriptor, data: &BTreeMap<String, Value>) -> Result<Record> {
        Ok(self.build(RecordBuilder::new(descriptor), data)?.build())
    }

    /// Populate `builder` from `data`, returning it for the caller to finish.
    ///
    /// An empty map leaves the builder untouched.
    pub fn build(&self, builder: RecordBuilder, data: &BTreeMap<String, Value>) -> Result<RecordBuilder> {
        let mut depth = DepthTracker::with_limit(self.max_depth);
        self.build_inner(builder, data, &mut depth)
    }

    fn build_inner(
        &self,
        mut builder: RecordBuilder,
        data: &BTreeMap<String, Value>,
        depth: &mut DepthTracker,
    ) -> Result<RecordBuilder> {
        if data.is_empty() {
            return Ok(builder);
        }
        let descriptor = builder.descriptor().clone();
        depth.descend(descriptor.name())?;

        for field in descriptor.fields() {
            if field.is_ephemeral() {
                continue;
            }
            if field.is_repeated() {
                self.repeated_field(&mut builder, field, data, depth)?;
                continue;
            }

            match data.get(field.name()) {
                Some(Value::Null) => continue,
                Some(value) => {
                    trace!(field = field.name(), entity = descriptor.name(), kind = value.name(), "inflating field");
                    let decoded = if field.field_type().is_message() {
                        self.message_value(&builder, field, value, depth)?
                    } else {
                        coerce::coerce(&descriptor, field, value, &self.reference_prefix)?
                    };
                    builder.set_field(field, decoded)?;
                }
                None if field.is_concrete() && field.field_type().is_message() => {
                    if self.selects_variant(field, data) {
                        trace!(field = field.name(), entity = descriptor.name(), "inflating concrete variant");
                        let sub = builder.new_builder_for_field(field)?;
                        let sub = self.build_inner(sub, data, depth)?;
                        builder.set_field(field, FieldValue::Message(sub.build()))?;
                    }
                }
                None if field.is_required() => {
                    return Err(Error::Decoding(format!(
                        "Unable to resolve required field '{}' on message '{}'",
                        field.name(),
                        descriptor.full_name()
                    )));
                }
                None => (),
            }
        }

        depth.ascend();
        Ok(builder)
    }

    /// True if the discriminator property of `data` names `field`.
    fn selects_variant(&self, field: &FieldDescriptor, data: &BTreeMap<String, Value>) -> bool {
        data.get(&self.discriminator)
            .and_then(|v| v.as_str())
            .map_or(false, |name| {
                name.trim().to_lowercase() == field.json_name().trim().to_lowercase()
            })
    }

    /// Decode a non-null value destined for a singular nested-record field.
    fn message_value(
        &self,
        builder: &RecordBuilder,
        field: &FieldDescriptor,
        value: &Value,
        depth: &mut DepthTracker,
    ) -> Result<FieldValue> {
        let descriptor = builder.descriptor();
        if let Value::Map(map) = value {
            let sub = builder.new_builder_for_field(field)?;
            let sub = self.build_inner(sub, map, depth)?;
            return Ok(FieldValue::Message(sub.build()));
        }

        let nested = descriptor.message_type(field).ok_or_else(|| {
            Error::Decoding(format!(
                "Unable to resolve message type for property '{}' on entity '{}'",
                field.name(),
                descriptor.name()
            ))
        })?;

        if nested.is_well_known_timestamp() {
            let record = match *value {
                Value::Timestamp(ref ts) => ts.to_record(descriptor.pool())?,
                Value::Record(ref r) if r.descriptor().is_well_known_timestamp() => r.clone(),
                Value::Int(v) => Timestamp::from_sec(v as i64).to_record(descriptor.pool())?,
                Value::Long(v) => Timestamp::from_sec(v).to_record(descriptor.pool())?,
                Value::Double(v) => Timestamp::from_sec(v as i64).to_record(descriptor.pool())?,
                _ => {
                    return Err(Error::Decoding(format!(
                        "Failed to decode timestamp type. Could not determine native type at field '{}' on entity '{}'",
                        field.name(),
                        descriptor.name()
                    )))
                }
            };
            return Ok(FieldValue::Message(record));
        }

        match field.field_role() {
            FieldRole::Reference | FieldRole::Parent => {
                let reference = value.as_reference().ok_or_else(|| {
                    Error::Decoding(format!(
                        "Found non-reference value for reference property '{}' on entity '{}'",
                        field.name(),
                        descriptor.name()
                    ))
                })?;
                let key = if reference.parent_document().is_none() {
                    key::single_level_key(reference, &nested)?
                } else {
                    key::reconstruct_key(reference, &nested)?
                };
                Ok(FieldValue::Message(key))
            }
            _ => Err(Error::Decoding(format!(
                "Found non-map value where sub-message value was expected, in field '{}' on entity '{}'",
                field.name(),
                descriptor.name()
            ))),
        }
    }

    /// Decode a repeated field, if present.
    fn repeated_field(
        &self,
        builder: &mut RecordBuilder,
        field: &FieldDescriptor,
        data: &BTreeMap<String, Value>,
        depth: &mut DepthTracker,
    ) -> Result<()> {
        let descriptor = builder.descriptor().clone();
        let value = match data.get(field.name()) {
            None | Some(Value::Null) => return Ok(()),
            Some(value) => value,
        };
        trace!(field = field.name(), entity = descriptor.name(), kind = value.name(), "inflating repeated field");

        if field.field_type().is_enum() {
            let enum_type = enums::enum_type_for(&descriptor, field)?;
            let members = enums::resolve_repeated(&enum_type, field, descriptor.name(), value)?;
            let list = members.into_iter().map(FieldValue::Enum).collect();
            builder.set_field(field, FieldValue::List(list))?;
            return Ok(());
        }

        let items = match value.as_array() {
            Some(items) if !items.is_empty() => items,
            Some(_) => return Ok(()),
            None => {
                debug!(
                    field = field.name(),
                    entity = descriptor.name(),
                    kind = value.name(),
                    "skipping non-list value for repeated field"
                );
                return Ok(());
            }
        };

        let mut list = Vec::with_capacity(items.len());
        if field.field_type().is_message() {
            for (i, item) in items.iter().enumerate() {
                let map = item.as_map().ok_or_else(|| {
                    Error::Decoding(format!(
                        "Cannot identify type for message in repeated field '{}' at position '{}' on entity '{}'",
                        field.name(),
                        i + 1,
                        descriptor.name()
                    ))
                })?;
                let sub = builder.new_builder_for_field(field)?;
                list.push(FieldValue::Message(self.build_inner(sub, map, depth)?.build()));
            }
        } else {
            for item in items.iter().filter(|v| !v.is_null()) {
                list.push(coerce::coerce_element(
                    &descriptor,
                    field,
                    item,
                    &self.reference_prefix,
                )?);
            }
        }
        builder.set_field(field, FieldValue::List(list))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::DocumentRef;
    use crate::schema::*;

    fn pool() -> SchemaPool {
        SchemaPoolBuilder::new()
            .message(
                MessageSchema::new("t.UserKey")
                    .field(FieldDescriptor::new("id", 1, FieldType::String).role(FieldRole::Id)),
            )
            .message(
                MessageSchema::new("t.ThingKey")
                    .field(
                        FieldDescriptor::new("parent", 1, FieldType::Message("t.UserKey".into()))
                            .role(FieldRole::Parent),
                    )
                    .field(FieldDescriptor::new("id", 2, FieldType::String).role(FieldRole::Id)),
            )
            .message(
                MessageSchema::new("t.Circle").field(FieldDescriptor::new("radius", 1, FieldType::Double)),
            )
            .message(
                MessageSchema::new("t.Square").field(FieldDescriptor::new("side", 1, FieldType::Double)),
            )
            .message(
                MessageSchema::new("t.Thing")
                    .field(
                        FieldDescriptor::new("key", 1, FieldType::Message("t.ThingKey".into()))
                            .role(FieldRole::Reference),
                    )
                    .field(FieldDescriptor::new("name", 2, FieldType::String).required())
                    .field(FieldDescriptor::new("tags", 3, FieldType::String).repeated())
                    .field(FieldDescriptor::new("letters", 4, FieldType::Enum("t.Letter".into())).repeated())
                    .field(FieldDescriptor::new("created", 5, FieldType::Message(TIMESTAMP_TYPE.into())))
                    .field(
                        FieldDescriptor::new("owner", 6, FieldType::Message("t.UserKey".into()))
                            .role(FieldRole::Reference),
                    )
                    .field(
                        FieldDescriptor::new("circle", 7, FieldType::Message("t.Circle".into())).concrete(),
                    )
                    .field(
                        FieldDescriptor::new("square", 8, FieldType::Message("t.Square".into())).concrete(),
                    )
                    .field(FieldDescriptor::new("scratch", 9, FieldType::String).ephemeral())
                    .field(FieldDescriptor::new("children", 10, FieldType::Message("t.Thing".into())).repeated())
                    .field(FieldDescriptor::new("best", 11, FieldType::Message("t.Thing".into()))),
            )
            .enumeration(EnumSchema::new("t.Letter").value("A", 0).value("B", 1).value("C", 2))
            .build()
            .unwrap()
    }

    fn map(entries: Vec<(&str, Value)>) -> BTreeMap<String, Value> {
        entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn empty_map_is_default() {
        let pool = pool();
        let thing = pool.get_message("t.Thing").unwrap();
        let record = Inflater::new().inflate(&thing, &BTreeMap::new()).unwrap();
        assert_eq!(record, Record::default_instance(&thing));
    }

    #[test]
    fn scalars_lists_and_enums() {
        let pool = pool();
        let thing = pool.get_message("t.Thing").unwrap();
        let data = map(vec![
            ("name", "box".into()),
            ("tags", Value::Array(vec!["a".into(), Value::Null, "b".into()])),
            ("letters", Value::Array(vec!["A".into(), "b".into(), 2.into()])),
            ("scratch", "ignored".into()),
        ]);
        let record = Inflater::new().inflate(&thing, &data).unwrap();
        assert_eq!(record.get("name").and_then(|v| v.as_str()), Some("box"));
        assert_eq!(
            record.get("tags"),
            Some(&FieldValue::List(vec!["a".into(), "b".into()]))
        );
        assert_eq!(
            record.get("letters"),
            Some(&FieldValue::List(vec![
                FieldValue::Enum(0),
                FieldValue::Enum(1),
                FieldValue::Enum(2)
            ]))
        );
        assert!(!record.has("scratch"));
    }

    #[test]
    fn required_field() {
        let pool = pool();
        let thing = pool.get_message("t.Thing").unwrap();
        let data = map(vec![("tags", Value::Array(vec!["a".into()]))]);
        match Inflater::new().inflate(&thing, &data) {
            Err(Error::Decoding(msg)) => assert!(msg.contains("required field 'name'"), "{}", msg),
            other => panic!("unexpected result: {:?}", other),
        }
        let data = map(vec![("tags", Value::Array(vec![])), ("scratch", "x".into())]);
        assert!(matches!(Inflater::new().inflate(&thing, &data), Err(Error::Decoding(_))));
    }

    #[test]
    fn null_required_field_is_left_unset() {
        let pool = pool();
        let thing = pool.get_message("t.Thing").unwrap();
        let data = map(vec![("name", Value::Null), ("tags", Value::Array(vec!["a".into()]))]);
        let record = Inflater::new().inflate(&thing, &data).unwrap();
        assert!(!record.has("name"));
        assert_eq!(record.get("tags"), Some(&FieldValue::List(vec!["a".into()])));
    }

    #[test]
    fn repeated_non_list_is_skipped() {
        let pool = pool();
        let thing = pool.get_message("t.Thing").unwrap();
        let data = map(vec![
            ("name", "x".into()),
            ("tags", "not a list".into()),
            ("children", Value::Map(map(vec![("name", "y".into())]))),
        ]);
        let record = Inflater::new().inflate(&thing, &data).unwrap();
        assert!(!record.has("tags"));
        assert!(!record.has("children"));
        assert_eq!(record.get("name").and_then(|v| v.as_str()), Some("x"));

        // Enums still reject shapes they can't resolve.
        let data = map(vec![("name", "x".into()), ("letters", 7.into())]);
        assert!(matches!(Inflater::new().inflate(&thing, &data), Err(Error::Decoding(_))));
    }

    #[test]
    fn timestamps() {
        let pool = pool();
        let thing = pool.get_message("t.Thing").unwrap();
        let ts = Timestamp::from_utc(1_600_000_000, 500).unwrap();
        for input in [
            Value::Timestamp(ts),
            Value::Record(ts.to_record(&pool).unwrap()),
        ] {
            let data = map(vec![("name", "x".into()), ("created", input)]);
            let record = Inflater::new().inflate(&thing, &data).unwrap();
            let created = record.get("created").and_then(|v| v.as_message()).unwrap();
            assert_eq!(Timestamp::try_from(created).unwrap(), ts);
        }

        let data = map(vec![("name", "x".into()), ("created", 1_600_000_000i64.into())]);
        let record = Inflater::new().inflate(&thing, &data).unwrap();
        let created = record.get("created").and_then(|v| v.as_message()).unwrap();
        assert_eq!(Timestamp::try_from(created).unwrap(), Timestamp::from_sec(1_600_000_000));

        let data = map(vec![("name", "x".into()), ("created", "yesterday".into())]);
        assert!(matches!(Inflater::new().inflate(&thing, &data), Err(Error::Decoding(_))));
    }

    #[test]
    fn references() {
        let pool = pool();
        let thing = pool.get_message("t.Thing").unwrap();
        let data = map(vec![
            ("name", "x".into()),
            ("owner", DocumentRef::new("projects/p/databases/(default)/documents/users/u1").into()),
            ("key", DocumentRef::new("projects/p/databases/(default)/documents/users/u1/things/t1").into()),
        ]);
        let record = Inflater::new().inflate(&thing, &data).unwrap();
        let owner = record.get("owner").and_then(|v| v.as_message()).unwrap();
        assert_eq!(owner.get("id").and_then(|v| v.as_str()), Some("u1"));
        let key = record.get("key").and_then(|v| v.as_message()).unwrap();
        assert_eq!(key.get("id").and_then(|v| v.as_str()), Some("t1"));
        let parent = key.get("parent").and_then(|v| v.as_message()).unwrap();
        assert_eq!(parent.get("id").and_then(|v| v.as_str()), Some("u1"));

        let data = map(vec![("name", "x".into()), ("owner", "users/u1".into())]);
        assert!(matches!(Inflater::new().inflate(&thing, &data), Err(Error::Decoding(_))));
    }

    #[test]
    fn concrete_variant() {
        let pool = pool();
        let thing = pool.get_message("t.Thing").unwrap();
        let data = map(vec![
            ("name", "x".into()),
            ("_type", " Square ".into()),
            ("side", 3.into()),
        ]);
        let record = Inflater::new().inflate(&thing, &data).unwrap();
        assert!(!record.has("circle"));
        let square = record.get("square").and_then(|v| v.as_message()).unwrap();
        assert_eq!(square.get("side"), Some(&FieldValue::F64(3.0)));

        let data = map(vec![("name", "x".into()), ("kind", "circle".into()), ("radius", 1.into())]);
        let record = Inflater::new().discriminator("kind").inflate(&thing, &data).unwrap();
        assert!(record.has("circle"));
    }

    #[test]
    fn nested_records() {
        let pool = pool();
        let thing = pool.get_message("t.Thing").unwrap();
        let child = Value::Map(map(vec![("name", "child".into())]));
        let data = map(vec![
            ("name", "x".into()),
            ("best", child.clone()),
            ("children", Value::Array(vec![child.clone(), child])),
        ]);
        let record = Inflater::new().inflate(&thing, &data).unwrap();
        assert_eq!(record.get("children").and_then(|v| v.as_list()).map(|l| l.len()), Some(2));
        assert!(record.has("best"));

        let data = map(vec![
            ("name", "x".into()),
            ("children", Value::Array(vec![Value::Map(map(vec![("name", "c".into())])), 5.into()])),
        ]);
        match Inflater::new().inflate(&thing, &data) {
            Err(Error::Decoding(msg)) => assert!(msg.contains("position '2'"), "{}", msg),
            other => panic!("unexpected result: {:?}", other),
        }

        let data = map(vec![("name", "x".into()), ("best", "nope".into())]);
        assert!(matches!(Inflater::new().inflate(&thing, &data), Err(Error::Decoding(_))));
    }

    #[test]
    fn depth_limit() {
        let pool = pool();
        let thing = pool.get_message("t.Thing").unwrap();
        let mut value = Value::Map(map(vec![("name", "leaf".into())]));
        for _ in 0..5 {
            value = Value::Map(map(vec![("name", "x".into()), ("best", value)]));
        }
        let data = value.as_map().unwrap().clone();
        assert!(Inflater::new().inflate(&thing, &data).is_ok());
        assert!(matches!(
            Inflater::new().max_depth(3).inflate(&thing, &data),
            Err(Error::ParseLimit(_))
        ));
    }
}
