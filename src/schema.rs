//! Record schemas.
//!
//! A [`SchemaPool`] holds every record type and enum type a caller intends to work with. Types are
//! defined with [`MessageSchema`] and [`EnumSchema`], collected in a [`SchemaPoolBuilder`], and
//! validated once when the pool is built. Nested record and enum types are referred to by name,
//! and those names are resolved against the pool, so record types may refer to each other (or to
//! themselves) freely.
//!
//! Once built, a pool is immutable and cheap to clone. [`MessageDescriptor`] and
//! [`EnumDescriptor`] are lightweight handles into it.
//!
//! ```
//! # use record_codec::schema::*;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = SchemaPoolBuilder::new()
//!     .message(MessageSchema::new("app.UserKey")
//!         .field(FieldDescriptor::new("id", 1, FieldType::String).role(FieldRole::Id)))
//!     .message(MessageSchema::new("app.User")
//!         .field(FieldDescriptor::new("key", 1, FieldType::Message("app.UserKey".into())))
//!         .field(FieldDescriptor::new("name", 2, FieldType::String).required()))
//!     .build()?;
//! let user = pool.get_message("app.User").unwrap();
//! assert!(user.field_by_name("name").unwrap().is_required());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Full name of the well-known timestamp record type. It is always present in a [`SchemaPool`].
pub const TIMESTAMP_TYPE: &str = "google.protobuf.Timestamp";

/// Full name of the well-known type-erased record type. It is always present in a [`SchemaPool`].
pub const ANY_TYPE: &str = "google.protobuf.Any";

/// The declared type of a field.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
    Bool,
    Int32,
    Int64,
    SInt32,
    SInt64,
    SFixed32,
    SFixed64,
    UInt32,
    UInt64,
    Fixed32,
    Fixed64,
    Float,
    Double,
    String,
    Bytes,
    /// An enum, named by the enum type's full name.
    Enum(String),
    /// A nested record, named by the record type's full name.
    Message(String),
    /// A nested record using group framing on the binary wire.
    Group(String),
}

impl FieldType {
    /// The type's name as written in a schema file.
    pub fn name(&self) -> &'static str {
        use self::FieldType::*;
        match self {
            Bool => "bool",
            Int32 => "int32",
            Int64 => "int64",
            SInt32 => "sint32",
            SInt64 => "sint64",
            SFixed32 => "sfixed32",
            SFixed64 => "sfixed64",
            UInt32 => "uint32",
            UInt64 => "uint64",
            Fixed32 => "fixed32",
            Fixed64 => "fixed64",
            Float => "float",
            Double => "double",
            String => "string",
            Bytes => "bytes",
            Enum(_) => "enum",
            Message(_) => "message",
            Group(_) => "group",
        }
    }

    /// True for nested-record types (messages and groups).
    pub fn is_message(&self) -> bool {
        matches!(self, FieldType::Message(_) | FieldType::Group(_))
    }

    pub fn is_enum(&self) -> bool {
        matches!(self, FieldType::Enum(_))
    }

    /// True for types that may be packed on the binary wire.
    pub fn is_numeric(&self) -> bool {
        !matches!(
            self,
            FieldType::String | FieldType::Bytes | FieldType::Message(_) | FieldType::Group(_)
        )
    }

    /// The name of the linked record or enum type, if there is one.
    pub fn type_name(&self) -> Option<&str> {
        match self {
            FieldType::Enum(n) | FieldType::Message(n) | FieldType::Group(n) => Some(n),
            _ => None,
        }
    }
}

/// The persistence role of a field. A field holds at most one role.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FieldRole {
    /// No special role.
    #[default]
    Standard,
    /// The identifier of the record. At most one per record type.
    Id,
    /// The key of the record's parent. At most one per record type.
    Parent,
    /// A key referring to some other record.
    Reference,
}

/// A single field of a record type.
///
/// Built with a chain of setters:
///
/// ```
/// # use record_codec::schema::*;
/// let field = FieldDescriptor::new("tags", 4, FieldType::String).repeated();
/// assert!(field.is_repeated());
/// assert_eq!(field.json_name(), "tags");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    name: String,
    number: u32,
    json_name: String,
    field_type: FieldType,
    repeated: bool,
    role: FieldRole,
    ephemeral: bool,
    concrete: bool,
    required: bool,
}

impl FieldDescriptor {
    /// Make a new singular field with no annotations.
    pub fn new(name: impl Into<String>, number: u32, field_type: FieldType) -> Self {
        let name = name.into();
        let json_name = to_json_name(&name);
        Self {
            name,
            number,
            json_name,
            field_type,
            repeated: false,
            role: FieldRole::Standard,
            ephemeral: false,
            concrete: false,
            required: false,
        }
    }

    /// Mark the field as repeated.
    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }

    /// Set the persistence role.
    pub fn role(mut self, role: FieldRole) -> Self {
        self.role = role;
        self
    }

    /// Mark the field as ephemeral: it is never read from input maps.
    pub fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }

    /// Mark the field as a concrete variant, flattened into its parent's map.
    pub fn concrete(mut self) -> Self {
        self.concrete = true;
        self
    }

    /// Mark the field as required when inflating from a map.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Override the derived JSON name.
    pub fn with_json_name(mut self, json_name: impl Into<String>) -> Self {
        self.json_name = json_name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn json_name(&self) -> &str {
        &self.json_name
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn is_repeated(&self) -> bool {
        self.repeated
    }

    pub fn field_role(&self) -> FieldRole {
        self.role
    }

    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    pub fn is_concrete(&self) -> bool {
        self.concrete
    }

    pub fn is_required(&self) -> bool {
        self.required
    }
}

/// lowerCamelCase conversion: underscores are dropped and the following letter is capitalized.
fn to_json_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Definition of a record type, before it is added to a pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageSchema {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl MessageSchema {
    /// Start a new record type with the given full name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a field.
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }
}

/// Definition of an enum type, before it is added to a pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumSchema {
    name: String,
    values: Vec<(String, i32)>,
}

impl EnumSchema {
    /// Start a new enum type with the given full name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }

    /// Add a member. The first member added is the enum's default.
    pub fn value(mut self, name: impl Into<String>, number: i32) -> Self {
        self.values.push((name.into(), number));
        self
    }
}

/// Collects type definitions and validates them into a [`SchemaPool`].
#[derive(Clone, Debug, Default)]
pub struct SchemaPoolBuilder {
    messages: Vec<MessageSchema>,
    enums: Vec<EnumSchema>,
}

impl SchemaPoolBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record type.
    pub fn message(mut self, message: MessageSchema) -> Self {
        self.messages.push(message);
        self
    }

    /// Add an enum type.
    pub fn enumeration(mut self, enumeration: EnumSchema) -> Self {
        self.enums.push(enumeration);
        self
    }

    /// Validate every definition and build the pool.
    ///
    /// Fails if type names collide, a field name or number is reused within a record type, a
    /// nested type name doesn't resolve, a record type carries more than one ID or PARENT field,
    /// a PARENT field isn't a singular nested record, or an enum has no members.
    pub fn build(self) -> Result<SchemaPool> {
        let mut messages = self.messages;
        if !messages.iter().any(|m| m.name == TIMESTAMP_TYPE) {
            messages.push(
                MessageSchema::new(TIMESTAMP_TYPE)
                    .field(FieldDescriptor::new("seconds", 1, FieldType::Int64))
                    .field(FieldDescriptor::new("nanos", 2, FieldType::Int32)),
            );
        }
        if !messages.iter().any(|m| m.name == ANY_TYPE) {
            messages.push(
                MessageSchema::new(ANY_TYPE)
                    .field(FieldDescriptor::new("type_url", 1, FieldType::String))
                    .field(FieldDescriptor::new("value", 2, FieldType::Bytes)),
            );
        }

        let mut message_index = HashMap::with_capacity(messages.len());
        for (i, m) in messages.iter().enumerate() {
            if message_index.insert(m.name.clone(), i).is_some() {
                return Err(Error::Schema(format!("record type '{}' defined twice", m.name)));
            }
        }
        let mut enum_index = HashMap::with_capacity(self.enums.len());
        for (i, e) in self.enums.iter().enumerate() {
            if message_index.contains_key(&e.name) || enum_index.insert(e.name.clone(), i).is_some()
            {
                return Err(Error::Schema(format!("type '{}' defined twice", e.name)));
            }
        }

        let enums = self
            .enums
            .into_iter()
            .map(EnumEntry::new)
            .collect::<Result<Vec<_>>>()?;
        let messages = messages
            .into_iter()
            .map(|m| MessageEntry::new(m, &message_index, &enum_index))
            .collect::<Result<Vec<_>>>()?;

        Ok(SchemaPool {
            inner: Arc::new(PoolInner {
                messages,
                enums,
                message_index,
                enum_index,
            }),
        })
    }
}

#[derive(Debug)]
struct MessageEntry {
    schema: MessageSchema,
    by_name: HashMap<String, usize>,
    by_number: HashMap<u32, usize>,
    id_field: Option<usize>,
    parent_field: Option<usize>,
}

impl MessageEntry {
    fn new(
        schema: MessageSchema,
        messages: &HashMap<String, usize>,
        enums: &HashMap<String, usize>,
    ) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(schema.fields.len());
        let mut by_number = HashMap::with_capacity(schema.fields.len());
        let mut id_field = None;
        let mut parent_field = None;
        for (i, field) in schema.fields.iter().enumerate() {
            let fail = |msg: &str| {
                Err(Error::Schema(format!(
                    "field '{}' on record type '{}' {}",
                    field.name, schema.name, msg
                )))
            };
            if field.number == 0 || field.number >= (1 << 29) {
                return fail("has an out-of-range number");
            }
            if by_name.insert(field.name.clone(), i).is_some() {
                return fail("is defined twice");
            }
            if by_number.insert(field.number, i).is_some() {
                return fail("reuses a field number");
            }
            match &field.field_type {
                FieldType::Enum(n) if !enums.contains_key(n) => {
                    return fail(&format!("refers to unknown enum type '{}'", n));
                }
                FieldType::Message(n) | FieldType::Group(n) if !messages.contains_key(n) => {
                    return fail(&format!("refers to unknown record type '{}'", n));
                }
                _ => (),
            }
            if field.concrete && !field.field_type.is_message() {
                return fail("is concrete but isn't a nested record");
            }
            match field.role {
                FieldRole::Id => {
                    if id_field.replace(i).is_some() {
                        return fail("is a second ID field");
                    }
                }
                FieldRole::Parent => {
                    if !field.field_type.is_message() || field.repeated {
                        return fail("is a PARENT field but isn't a singular nested record");
                    }
                    if parent_field.replace(i).is_some() {
                        return fail("is a second PARENT field");
                    }
                }
                _ => (),
            }
        }
        Ok(Self {
            schema,
            by_name,
            by_number,
            id_field,
            parent_field,
        })
    }
}

#[derive(Debug)]
struct EnumEntry {
    schema: EnumSchema,
    by_name: HashMap<String, usize>,
    by_number: HashMap<i32, usize>,
}

impl EnumEntry {
    fn new(schema: EnumSchema) -> Result<Self> {
        if schema.values.is_empty() {
            return Err(Error::Schema(format!("enum '{}' has no members", schema.name)));
        }
        let mut by_name = HashMap::with_capacity(schema.values.len());
        let mut by_number = HashMap::with_capacity(schema.values.len());
        for (i, (name, number)) in schema.values.iter().enumerate() {
            if by_name.insert(name.clone(), i).is_some() {
                return Err(Error::Schema(format!(
                    "enum '{}' defines '{}' twice",
                    schema.name, name
                )));
            }
            // Aliases keep the first member with a given number.
            by_number.entry(*number).or_insert(i);
        }
        Ok(Self {
            schema,
            by_name,
            by_number,
        })
    }
}

#[derive(Debug)]
struct PoolInner {
    messages: Vec<MessageEntry>,
    enums: Vec<EnumEntry>,
    message_index: HashMap<String, usize>,
    enum_index: HashMap<String, usize>,
}

/// An immutable, validated set of record and enum types.
#[derive(Clone)]
pub struct SchemaPool {
    inner: Arc<PoolInner>,
}

impl SchemaPool {
    /// Look up a record type by full name.
    pub fn get_message(&self, name: &str) -> Option<MessageDescriptor> {
        self.inner
            .message_index
            .get(name)
            .map(|&index| MessageDescriptor {
                pool: self.clone(),
                index,
            })
    }

    /// Look up an enum type by full name.
    pub fn get_enum(&self, name: &str) -> Option<EnumDescriptor> {
        self.inner.enum_index.get(name).map(|&index| EnumDescriptor {
            pool: self.clone(),
            index,
        })
    }

    /// The well-known timestamp record type.
    pub fn timestamp(&self) -> MessageDescriptor {
        // Always inserted by `SchemaPoolBuilder::build`.
        self.get_message(TIMESTAMP_TYPE)
            .unwrap_or_else(|| unreachable!("pool is missing the timestamp type"))
    }

    /// The well-known type-erased record type.
    pub fn any(&self) -> MessageDescriptor {
        // Always inserted by `SchemaPoolBuilder::build`.
        self.get_message(ANY_TYPE)
            .unwrap_or_else(|| unreachable!("pool is missing the any type"))
    }

    /// Iterate over all record types.
    pub fn messages(&self) -> impl Iterator<Item = MessageDescriptor> + '_ {
        (0..self.inner.messages.len()).map(move |index| MessageDescriptor {
            pool: self.clone(),
            index,
        })
    }

    fn same_pool(&self, other: &SchemaPool) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for SchemaPool {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SchemaPool")
            .field("messages", &self.inner.message_index.keys().collect::<Vec<_>>())
            .field("enums", &self.inner.enum_index.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Handle to a record type within a [`SchemaPool`].
#[derive(Clone)]
pub struct MessageDescriptor {
    pool: SchemaPool,
    index: usize,
}

impl MessageDescriptor {
    fn entry(&self) -> &MessageEntry {
        &self.pool.inner.messages[self.index]
    }

    pub fn pool(&self) -> &SchemaPool {
        &self.pool
    }

    /// The fully qualified name, e.g. `shop.Item`.
    pub fn full_name(&self) -> &str {
        &self.entry().schema.name
    }

    /// The unqualified name: everything after the last `.` of the full name.
    pub fn name(&self) -> &str {
        let full = self.full_name();
        full.rsplit('.').next().unwrap_or(full)
    }

    /// All fields, in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.entry().schema.fields
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        let entry = self.entry();
        entry.by_name.get(name).map(|&i| &entry.schema.fields[i])
    }

    pub fn field_by_number(&self, number: u32) -> Option<&FieldDescriptor> {
        let entry = self.entry();
        entry.by_number.get(&number).map(|&i| &entry.schema.fields[i])
    }

    /// Look up a field by its JSON name, falling back to its declared name.
    pub fn field_by_json_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields()
            .iter()
            .find(|f| f.json_name == name)
            .or_else(|| self.field_by_name(name))
    }

    /// The ID-annotated field, if any.
    pub fn id_field(&self) -> Option<&FieldDescriptor> {
        let entry = self.entry();
        entry.id_field.map(|i| &entry.schema.fields[i])
    }

    /// The PARENT-annotated field, if any.
    pub fn parent_field(&self) -> Option<&FieldDescriptor> {
        let entry = self.entry();
        entry.parent_field.map(|i| &entry.schema.fields[i])
    }

    pub fn is_well_known_timestamp(&self) -> bool {
        self.full_name() == TIMESTAMP_TYPE
    }

    /// True for the type-erased record type, which wraps a type URL and an encoded record.
    pub fn is_well_known_any(&self) -> bool {
        self.full_name() == ANY_TYPE
    }

    /// The nested record type of a message or group field.
    pub fn message_type(&self, field: &FieldDescriptor) -> Option<MessageDescriptor> {
        match field.field_type() {
            FieldType::Message(n) | FieldType::Group(n) => self.pool.get_message(n),
            _ => None,
        }
    }

    /// The enum type of an enum field.
    pub fn enum_type(&self, field: &FieldDescriptor) -> Option<EnumDescriptor> {
        match field.field_type() {
            FieldType::Enum(n) => self.pool.get_enum(n),
            _ => None,
        }
    }
}

impl PartialEq for MessageDescriptor {
    fn eq(&self, rhs: &Self) -> bool {
        (self.pool.same_pool(&rhs.pool) && self.index == rhs.index)
            || self.full_name() == rhs.full_name()
    }
}

impl fmt::Debug for MessageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "MessageDescriptor({})", self.full_name())
    }
}

/// Handle to an enum type within a [`SchemaPool`].
#[derive(Clone)]
pub struct EnumDescriptor {
    pool: SchemaPool,
    index: usize,
}

impl EnumDescriptor {
    fn entry(&self) -> &EnumEntry {
        &self.pool.inner.enums[self.index]
    }

    pub fn full_name(&self) -> &str {
        &self.entry().schema.name
    }

    /// All members, in declaration order.
    pub fn values(&self) -> &[(String, i32)] {
        &self.entry().schema.values
    }

    /// Find a member number by its exact name.
    pub fn value_by_name(&self, name: &str) -> Option<i32> {
        let entry = self.entry();
        entry.by_name.get(name).map(|&i| entry.schema.values[i].1)
    }

    /// Find a member name by its number.
    pub fn value_by_number(&self, number: i32) -> Option<&str> {
        let entry = self.entry();
        entry
            .by_number
            .get(&number)
            .map(|&i| entry.schema.values[i].0.as_str())
    }

    /// The number of the first declared member.
    pub fn default_value(&self) -> i32 {
        self.entry().schema.values[0].1
    }
}

impl PartialEq for EnumDescriptor {
    fn eq(&self, rhs: &Self) -> bool {
        (self.pool.same_pool(&rhs.pool) && self.index == rhs.index)
            || self.full_name() == rhs.full_name()
    }
}

impl fmt::Debug for EnumDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "EnumDescriptor({})", self.full_name())
    }
}
