//! Record types that may be carried inside type-erased (`google.protobuf.Any`) fields.
//!
//! A type-erased field holds a type URL and the binary encoding of some other record. The binary
//! and text dialects pass it through untouched, but the JSON dialect has to expand the payload,
//! and for that it must know the payload's record type. Those types are looked up in a
//! [`TypeRegistry`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::schema::MessageDescriptor;

/// Prefix used when building type URLs.
pub const TYPE_URL_PREFIX: &str = "type.googleapis.com/";

/// The type URL naming `descriptor`.
pub fn type_url(descriptor: &MessageDescriptor) -> String {
    format!("{}{}", TYPE_URL_PREFIX, descriptor.full_name())
}

/// A set of record types, looked up by type URL.
///
/// Clones share the same set, so a registry handed to a [`JsonDialect`](super::JsonDialect) sees
/// types registered later through any other clone.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    types: Arc<RwLock<HashMap<String, MessageDescriptor>>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record type. Returns false if a type with the same full name was already present, in
    /// which case the earlier one is kept.
    pub fn register(&self, descriptor: &MessageDescriptor) -> bool {
        let mut types = self.types.write();
        if types.contains_key(descriptor.full_name()) {
            return false;
        }
        types.insert(descriptor.full_name().to_string(), descriptor.clone());
        true
    }

    /// Add a record type, returning the registry for chaining.
    pub fn with_type(self, descriptor: &MessageDescriptor) -> Self {
        self.register(descriptor);
        self
    }

    /// Find the record type named by a type URL. Everything up to the last `/` is ignored, so a
    /// bare full name works too.
    pub fn find(&self, type_url: &str) -> Option<MessageDescriptor> {
        let name = type_url.rsplit('/').next().unwrap_or(type_url);
        self.types.read().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }

    pub(crate) fn clear(&self) {
        self.types.write().clear();
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let types = self.types.read();
        let mut names: Vec<&String> = types.keys().collect();
        names.sort();
        f.debug_struct("TypeRegistry").field("types", &names).finish()
    }
}
