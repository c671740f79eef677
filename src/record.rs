//! Typed records and their builders.
//!
//! A [`Record`] is an immutable, fully typed value of some record type. Records are only produced
//! by finishing a [`RecordBuilder`], which type-checks every value as it is assigned. Fields use
//! implicit presence for singular scalars: assigning a type's default value (zero, empty string,
//! false, first enum member) leaves the field unset, so two records holding the same information
//! always compare equal and always encode identically.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::schema::{FieldDescriptor, FieldType, MessageDescriptor};

/// A typed field value held by a [`Record`].
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// Enum member, by number.
    Enum(i32),
    /// A nested record.
    Message(Record),
    /// The values of a repeated field.
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Name of the value's kind, for error reporting.
    pub fn name(&self) -> &'static str {
        use self::FieldValue::*;
        match self {
            Bool(_) => "Bool",
            I32(_) => "I32",
            I64(_) => "I64",
            U32(_) => "U32",
            U64(_) => "U64",
            F32(_) => "F32",
            F64(_) => "F64",
            Str(_) => "Str",
            Bytes(_) => "Bytes",
            Enum(_) => "Enum",
            Message(_) => "Message",
            List(_) => "List",
        }
    }

    /// The default for a singular field of the given type. Nested records have no default value.
    pub fn default_for(field_type: &FieldType) -> Option<FieldValue> {
        use crate::schema::FieldType::*;
        Some(match field_type {
            Bool => FieldValue::Bool(false),
            Int32 | SInt32 | SFixed32 => FieldValue::I32(0),
            Int64 | SInt64 | SFixed64 => FieldValue::I64(0),
            UInt32 | Fixed32 => FieldValue::U32(0),
            UInt64 | Fixed64 => FieldValue::U64(0),
            Float => FieldValue::F32(0.0),
            Double => FieldValue::F64(0.0),
            String => FieldValue::Str(std::string::String::new()),
            Bytes => FieldValue::Bytes(Vec::new()),
            Enum(_) => FieldValue::Enum(0),
            Message(_) | Group(_) => return None,
        })
    }

    fn is_default(&self) -> bool {
        match *self {
            FieldValue::Bool(v) => !v,
            FieldValue::I32(v) => v == 0,
            FieldValue::I64(v) => v == 0,
            FieldValue::U32(v) => v == 0,
            FieldValue::U64(v) => v == 0,
            FieldValue::F32(v) => v == 0.0,
            FieldValue::F64(v) => v == 0.0,
            FieldValue::Str(ref v) => v.is_empty(),
            FieldValue::Bytes(ref v) => v.is_empty(),
            FieldValue::Enum(v) => v == 0,
            FieldValue::Message(_) => false,
            FieldValue::List(ref v) => v.is_empty(),
        }
    }

    /// Check that this value can be stored as a single element of the given type.
    fn fits(&self, field_type: &FieldType) -> bool {
        use crate::schema::FieldType::*;
        match (self, field_type) {
            (FieldValue::Bool(_), Bool) => true,
            (FieldValue::I32(_), Int32 | SInt32 | SFixed32) => true,
            (FieldValue::I64(_), Int64 | SInt64 | SFixed64) => true,
            (FieldValue::U32(_), UInt32 | Fixed32) => true,
            (FieldValue::U64(_), UInt64 | Fixed64) => true,
            (FieldValue::F32(_), Float) => true,
            (FieldValue::F64(_), Double) => true,
            (FieldValue::Str(_), String) => true,
            (FieldValue::Bytes(_), Bytes) => true,
            (FieldValue::Enum(_), Enum(_)) => true,
            (FieldValue::Message(r), Message(n) | Group(n)) => r.descriptor().full_name() == n,
            _ => false,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        if let FieldValue::Bool(v) = *self {
            Some(v)
        } else {
            None
        }
    }

    /// Any integer value, widened to `i64` when it fits.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            FieldValue::I32(v) => Some(v as i64),
            FieldValue::I64(v) => Some(v),
            FieldValue::U32(v) => Some(v as i64),
            FieldValue::U64(v) => i64::try_from(v).ok(),
            FieldValue::Enum(v) => Some(v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            FieldValue::F32(v) => Some(v as f64),
            FieldValue::F64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        if let FieldValue::Str(ref v) = *self {
            Some(v)
        } else {
            None
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        if let FieldValue::Bytes(ref v) = *self {
            Some(v)
        } else {
            None
        }
    }

    pub fn as_enum(&self) -> Option<i32> {
        if let FieldValue::Enum(v) = *self {
            Some(v)
        } else {
            None
        }
    }

    pub fn as_message(&self) -> Option<&Record> {
        if let FieldValue::Message(ref v) = *self {
            Some(v)
        } else {
            None
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        if let FieldValue::List(ref v) = *self {
            Some(v)
        } else {
            None
        }
    }
}

impl From<Record> for FieldValue {
    fn from(v: Record) -> Self {
        FieldValue::Message(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Str(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

/// An immutable, typed record.
#[derive(Clone, PartialEq)]
pub struct Record {
    descriptor: MessageDescriptor,
    fields: BTreeMap<u32, FieldValue>,
}

impl Record {
    /// The record with no fields set.
    pub fn default_instance(descriptor: &MessageDescriptor) -> Record {
        Record {
            descriptor: descriptor.clone(),
            fields: BTreeMap::new(),
        }
    }

    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.descriptor
    }

    /// Get a set field's value by field name.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.descriptor
            .field_by_name(name)
            .and_then(|f| self.fields.get(&f.number()))
    }

    /// Get a set field's value by field number.
    pub fn get_by_number(&self, number: u32) -> Option<&FieldValue> {
        self.fields.get(&number)
    }

    /// Get a field's value, falling back to the type's default if the field is unset. Returns
    /// `None` for unknown fields and unset nested records.
    pub fn get_or_default(&self, name: &str) -> Option<FieldValue> {
        let field = self.descriptor.field_by_name(name)?;
        if let Some(v) = self.fields.get(&field.number()) {
            return Some(v.clone());
        }
        if field.is_repeated() {
            return Some(FieldValue::List(Vec::new()));
        }
        FieldValue::default_for(field.field_type())
    }

    /// True if the named field is set.
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// True if no field is set.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over the set fields, in field-number order.
    pub fn fields(&self) -> impl Iterator<Item = (&FieldDescriptor, &FieldValue)> + '_ {
        self.fields.iter().filter_map(move |(number, value)| {
            self.descriptor.field_by_number(*number).map(|f| (f, value))
        })
    }

    /// Start a new builder holding a copy of this record's fields.
    pub fn to_builder(&self) -> RecordBuilder {
        RecordBuilder {
            descriptor: self.descriptor.clone(),
            fields: self.fields.clone(),
        }
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.descriptor.name())?;
        f.write_str(" ")?;
        f.debug_map()
            .entries(self.fields().map(|(field, value)| (field.name(), value)))
            .finish()
    }
}

/// Mutable staging area for a [`Record`].
///
/// Builders are exclusively owned by whoever is filling them in, and are consumed by
/// [`build`](Self::build).
#[derive(Clone, Debug)]
pub struct RecordBuilder {
    descriptor: MessageDescriptor,
    fields: BTreeMap<u32, FieldValue>,
}

impl RecordBuilder {
    /// Start a blank builder for the given record type.
    pub fn new(descriptor: &MessageDescriptor) -> Self {
        Self {
            descriptor: descriptor.clone(),
            fields: BTreeMap::new(),
        }
    }

    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.descriptor
    }

    /// Spawn a blank builder for the nested record type of `field`.
    pub fn new_builder_for_field(&self, field: &FieldDescriptor) -> Result<RecordBuilder> {
        self.descriptor
            .message_type(field)
            .map(|d| RecordBuilder::new(&d))
            .ok_or_else(|| {
                Error::Decoding(format!(
                    "Unable to resolve message type for property '{}' on entity '{}'",
                    field.name(),
                    self.descriptor.name()
                ))
            })
    }

    /// Assign a field by name. See [`set_field`](Self::set_field).
    pub fn set(&mut self, name: &str, value: FieldValue) -> Result<&mut Self> {
        let field = self.descriptor.field_by_name(name).cloned().ok_or_else(|| {
            Error::Decoding(format!(
                "No field '{}' on entity '{}'",
                name,
                self.descriptor.name()
            ))
        })?;
        self.set_field(&field, value)
    }

    /// Assign a field.
    ///
    /// Repeated fields take a [`FieldValue::List`] whose elements all match the declared type;
    /// singular fields take a single matching value. Fails with [`Error::InvalidInput`] on a type
    /// mismatch. Default scalar values and empty lists clear the field instead.
    pub fn set_field(&mut self, field: &FieldDescriptor, value: FieldValue) -> Result<&mut Self> {
        let owned = self
            .descriptor
            .field_by_number(field.number())
            .map_or(false, |f| f.name() == field.name());
        if !owned {
            return Err(Error::Decoding(format!(
                "Field '{}' doesn't belong to entity '{}'",
                field.name(),
                self.descriptor.name()
            )));
        }

        let fits = match (&value, field.is_repeated()) {
            (FieldValue::List(items), true) => items.iter().all(|v| v.fits(field.field_type())),
            (_, true) => false,
            (v, false) => v.fits(field.field_type()),
        };
        if !fits {
            return Err(Error::invalid_input(
                field.name(),
                self.descriptor.name(),
                value.name(),
            ));
        }

        if value.is_default() {
            self.fields.remove(&field.number());
        } else {
            self.fields.insert(field.number(), value);
        }
        Ok(self)
    }

    /// Unset a field by name.
    pub fn clear(&mut self, name: &str) -> &mut Self {
        if let Some(number) = self.descriptor.field_by_name(name).map(|f| f.number()) {
            self.fields.remove(&number);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.descriptor
            .field_by_name(name)
            .and_then(|f| self.fields.get(&f.number()))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Finish the record.
    pub fn build(self) -> Record {
        Record {
            descriptor: self.descriptor,
            fields: self.fields,
        }
    }
}
