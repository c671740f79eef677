//! Moving whole records on and off byte streams.
//!
//! A [`Codec`] is bound to one record type and one default [`Dialect`]. Besides the built-in
//! dialects, callers may register their own [`RecordDialect`] implementations under a custom
//! [`DialectInfo`]. Once [`closed`](Codec::close), a codec refuses all further work.
//!
//! Records of other types carried inside type-erased fields are resolved through the codec's
//! [`TypeRegistry`] when writing or reading JSON.
//!
//! For single operations, the free functions [`deserialize`], [`serialize`], [`read_file`] and
//! [`write_file`] (and their `_with` variants taking an explicit dialect) set up a codec, perform
//! the operation, and clean up after themselves.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{Error, Result};
use crate::record::{Record, RecordBuilder};
use crate::schema::MessageDescriptor;

mod binary;
mod dialect;
mod json;
mod text;
mod types;

pub use self::binary::{decode_record, encode_record, BinaryDialect};
pub use self::dialect::{Dialect, DialectInfo, RecordDialect};
pub use self::json::{from_json, from_json_with, to_json, to_json_with, JsonDialect, JsonOptions};
pub use self::text::{render, TextDialect};
pub use self::types::{type_url, TypeRegistry, TYPE_URL_PREFIX};

/// Encoder and decoder for one record type.
///
/// A codec can be shared between threads. Dialect registration and [`close`](Self::close) may
/// race with encode and decode calls; such a call either completes normally or fails with
/// [`Error::Closed`].
pub struct Codec {
    descriptor: MessageDescriptor,
    default_dialect: Dialect,
    binary: BinaryDialect,
    text: TextDialect,
    json: JsonDialect,
    types: TypeRegistry,
    dialects: RwLock<HashMap<DialectInfo, Arc<dyn RecordDialect>>>,
    closed: AtomicBool,
}

impl Codec {
    /// Create a codec for `descriptor` that uses the binary dialect by default.
    pub fn new(descriptor: &MessageDescriptor) -> Self {
        Self::with_default(descriptor, Dialect::default())
    }

    /// Create a codec for `descriptor` with the given default dialect.
    pub fn with_default(descriptor: &MessageDescriptor, dialect: Dialect) -> Self {
        let types = TypeRegistry::new();
        Self {
            descriptor: descriptor.clone(),
            default_dialect: dialect,
            binary: BinaryDialect,
            text: TextDialect,
            json: JsonDialect::new().with_types(types.clone()),
            types,
            dialects: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Configure the built-in JSON dialect.
    pub fn json_options(mut self, options: JsonOptions) -> Self {
        self.json = JsonDialect::with_options(options).with_types(self.types.clone());
        self
    }

    /// The record type this codec reads and writes.
    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.descriptor
    }

    pub fn default_dialect(&self) -> Dialect {
        self.default_dialect
    }

    /// Record types known for type-erased fields.
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Make a record type available to type-erased fields. Registering a type again is allowed
    /// and keeps the first registration.
    pub fn register_type(&self, descriptor: &MessageDescriptor) -> Result<()> {
        // Held so registration can't slip in behind close.
        let _dialects = self.dialects.write();
        if self.is_closed() {
            return Err(Error::Closed);
        }
        if self.types.register(descriptor) {
            debug!(
                type_url = %type_url(descriptor),
                entity = self.descriptor.name(),
                "registered codec type"
            );
        }
        Ok(())
    }

    /// Register several record types, returning the codec for chaining.
    pub fn with_types(self, descriptors: &[MessageDescriptor]) -> Result<Self> {
        for descriptor in descriptors {
            self.register_type(descriptor)?;
        }
        Ok(self)
    }

    /// Register a custom dialect. Only one implementation may be registered per identity; a
    /// second registration fails and leaves the first in place.
    pub fn register_dialect(&self, info: DialectInfo, dialect: impl RecordDialect + 'static) -> Result<()> {
        let mut dialects = self.dialects.write();
        if self.is_closed() {
            return Err(Error::Closed);
        }
        if dialects.contains_key(&info) {
            return Err(Error::DuplicateDialect(info.name().to_string()));
        }
        debug!(dialect = info.name(), entity = self.descriptor.name(), "registered codec dialect");
        dialects.insert(info, Arc::new(dialect));
        Ok(())
    }

    /// Register a custom dialect, returning the codec for chaining.
    pub fn with_dialect(self, info: DialectInfo, dialect: impl RecordDialect + 'static) -> Result<Self> {
        self.register_dialect(info, dialect)?;
        Ok(self)
    }

    /// Find the dialect to use: a custom one if named, otherwise a built-in one, falling back to
    /// the default.
    fn resolve<R>(
        &self,
        known: Option<Dialect>,
        custom: Option<&DialectInfo>,
        op: impl FnOnce(&dyn RecordDialect) -> Result<R>,
    ) -> Result<R> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        if let Some(info) = custom {
            let found = self.dialects.read().get(info).cloned();
            return match found {
                Some(dialect) => op(dialect.as_ref()),
                None if self.is_closed() => Err(Error::Closed),
                None => Err(Error::DialectNotFound(info.name().to_string())),
            };
        }
        match known.unwrap_or(self.default_dialect) {
            Dialect::Binary => op(&self.binary),
            Dialect::Text => op(&self.text),
            Dialect::Json => op(&self.json),
        }
    }

    fn decode_with(&self, reader: &mut dyn Read, dialect: &dyn RecordDialect) -> Result<Record> {
        let builder = dialect.decode(reader, RecordBuilder::new(&self.descriptor))?;
        dialect.finalize(builder)
    }

    fn encode_with(&self, record: &Record, writer: &mut dyn Write, dialect: &dyn RecordDialect) -> Result<()> {
        if record.descriptor() != &self.descriptor {
            return Err(Error::Decoding(format!(
                "Can't encode a '{}' record with a codec for '{}'",
                record.descriptor().full_name(),
                self.descriptor.full_name()
            )));
        }
        let prepared = dialect.prepare(record)?;
        dialect.encode(&prepared, writer)
    }

    /// Decode exactly one record from `reader`, using the default dialect.
    pub fn decode(&self, mut reader: impl Read) -> Result<Record> {
        self.resolve(None, None, |d| self.decode_with(&mut reader, d))
    }

    /// Decode exactly one record from `reader`, using a built-in dialect.
    pub fn decode_dialect(&self, mut reader: impl Read, dialect: Dialect) -> Result<Record> {
        self.resolve(Some(dialect), None, |d| self.decode_with(&mut reader, d))
    }

    /// Decode exactly one record from `reader`, using a registered custom dialect.
    pub fn decode_custom(&self, mut reader: impl Read, info: &DialectInfo) -> Result<Record> {
        self.resolve(None, Some(info), |d| self.decode_with(&mut reader, d))
    }

    /// Encode `record` to `writer`, using the default dialect.
    pub fn encode(&self, record: &Record, mut writer: impl Write) -> Result<()> {
        self.resolve(None, None, |d| self.encode_with(record, &mut writer, d))
    }

    /// Encode `record` to `writer`, using a built-in dialect.
    pub fn encode_dialect(&self, record: &Record, mut writer: impl Write, dialect: Dialect) -> Result<()> {
        self.resolve(Some(dialect), None, |d| self.encode_with(record, &mut writer, d))
    }

    /// Encode `record` to `writer`, using a registered custom dialect.
    pub fn encode_custom(&self, record: &Record, mut writer: impl Write, info: &DialectInfo) -> Result<()> {
        self.resolve(None, Some(info), |d| self.encode_with(record, &mut writer, d))
    }

    /// Encode `record` to a new byte vector, using the default dialect.
    pub fn encode_to_vec(&self, record: &Record) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.encode(record, &mut buf)?;
        Ok(buf)
    }

    /// Encode `record` to a new byte vector, using a built-in dialect.
    pub fn encode_to_vec_dialect(&self, record: &Record, dialect: Dialect) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.encode_dialect(record, &mut buf, dialect)?;
        Ok(buf)
    }

    /// Encode `record` to a new byte vector, using a registered custom dialect.
    pub fn encode_to_vec_custom(&self, record: &Record, info: &DialectInfo) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.encode_custom(record, &mut buf, info)?;
        Ok(buf)
    }

    /// Close the codec, dropping all custom dialects and registered types. Closing again does
    /// nothing.
    pub fn close(&self) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let mut dialects = self.dialects.write();
            dialects.clear();
            self.types.clear();
            debug!(entity = self.descriptor.name(), "closed codec");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Codec")
            .field("descriptor", &self.descriptor)
            .field("default_dialect", &self.default_dialect)
            .field("custom_dialects", &self.dialects.read().len())
            .field("types", &self.types)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Decode one binary-encoded record of type `descriptor`.
pub fn deserialize(descriptor: &MessageDescriptor, bytes: &[u8]) -> Result<Record> {
    deserialize_with(descriptor, bytes, Dialect::Binary)
}

/// Decode one record of type `descriptor`, in the given dialect.
pub fn deserialize_with(descriptor: &MessageDescriptor, bytes: &[u8], dialect: Dialect) -> Result<Record> {
    Codec::with_default(descriptor, dialect).decode(bytes)
}

/// Read one binary-encoded record of type `descriptor` from the file at `path`.
pub fn read_file(descriptor: &MessageDescriptor, path: impl AsRef<Path>) -> Result<Record> {
    read_file_with(descriptor, path, Dialect::Binary)
}

/// Read one record of type `descriptor` from the file at `path`, in the given dialect.
pub fn read_file_with(descriptor: &MessageDescriptor, path: impl AsRef<Path>, dialect: Dialect) -> Result<Record> {
    let file = BufReader::new(File::open(path)?);
    Codec::with_default(descriptor, dialect).decode(file)
}

/// Encode a record in the binary dialect.
pub fn serialize(record: &Record) -> Result<Vec<u8>> {
    serialize_with(record, Dialect::Binary)
}

/// Encode a record in the given dialect.
pub fn serialize_with(record: &Record, dialect: Dialect) -> Result<Vec<u8>> {
    Codec::with_default(record.descriptor(), dialect).encode_to_vec(record)
}

/// Write a record to the file at `path` in the binary dialect, replacing any existing contents.
pub fn write_file(record: &Record, path: impl AsRef<Path>) -> Result<()> {
    write_file_with(record, path, Dialect::Binary)
}

/// Write a record to the file at `path` in the given dialect, replacing any existing contents.
pub fn write_file_with(record: &Record, path: impl AsRef<Path>, dialect: Dialect) -> Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    Codec::with_default(record.descriptor(), dialect).encode(record, &mut file)?;
    file.flush()?;
    Ok(())
}
