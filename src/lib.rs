//! record-codec moves loosely-typed document data into strongly-typed records, and moves those
//! records on and off byte streams.
//!
//! It is built from a few pieces:
//!
//! - A runtime schema: a [`SchemaPool`] of message and enum types, assembled with a
//!   [`SchemaPoolBuilder`]. Each message type is described by a [`MessageDescriptor`], and its
//!   fields may carry a [`FieldRole`] (ID, PARENT, REFERENCE) and flags that steer inflation.
//! - [`Record`]s, immutable values of a message type, made with a [`RecordBuilder`].
//! - The [`Inflater`], which turns a map of [`Value`]s (as handed out by a document store) into a
//!   record. Scalars are coerced to their declared types, enums are resolved by name or number,
//!   nested maps become nested records, and [`DocumentRef`]s are turned back into key records.
//! - The [`Codec`], which encodes and decodes whole records in one of several dialects: a compact
//!   binary form wire-compatible with protocol buffers, a write-only text form, and the proto3 JSON
//!   mapping. Callers may register dialects of their own, and the record types carried in
//!   type-erased fields (see [`TypeRegistry`]).
//!
//! ```
//! # use record_codec::*;
//! # use std::collections::BTreeMap;
//! let pool = SchemaPoolBuilder::new()
//!     .message(
//!         MessageSchema::new("shop.Item")
//!             .field(FieldDescriptor::new("name", 1, FieldType::String))
//!             .field(FieldDescriptor::new("count", 2, FieldType::UInt32)),
//!     )
//!     .build()?;
//! let item = pool.get_message("shop.Item").unwrap();
//!
//! let mut data = BTreeMap::new();
//! data.insert("name".to_string(), Value::from("widget"));
//! data.insert("count".to_string(), Value::Long(3));
//! let record = Inflater::new().inflate(&item, &data)?;
//!
//! let codec = Codec::new(&item);
//! let bytes = codec.encode_to_vec(&record)?;
//! assert_eq!(codec.decode(&bytes[..])?, record);
//!
//! let json = codec.encode_to_vec_dialect(&record, Dialect::Json)?;
//! assert_eq!(json, br#"{"count":3,"name":"widget"}"#);
//! # Ok::<(), record_codec::Error>(())
//! ```

mod depth_tracking;
mod varint;

pub mod codec;
pub mod coerce;
pub mod enums;
pub mod error;
pub mod inflate;
pub mod key;
pub mod record;
pub mod reference;
pub mod schema;
pub mod timestamp;
pub mod value;

pub use codec::{Codec, Dialect, DialectInfo, JsonDialect, JsonOptions, RecordDialect, TypeRegistry};
pub use error::{Error, Result};
pub use inflate::Inflater;
pub use key::KeyPath;
pub use record::{FieldValue, Record, RecordBuilder};
pub use reference::DocumentRef;
pub use schema::{
    EnumDescriptor, EnumSchema, FieldDescriptor, FieldRole, FieldType, MessageDescriptor,
    MessageSchema, SchemaPool, SchemaPoolBuilder,
};
pub use timestamp::Timestamp;
pub use value::Value;

/// The maximum nesting depth allowed when inflating or decoding a record.
pub const MAX_DEPTH: usize = 100;
