//! Reconstruction of hierarchical key records from document paths.
//!
//! A key record type carries an ID field holding its own identifier and, when it lives in a
//! sub-collection, a PARENT field holding the key of the owning document. A path like
//! `users/u1/things/t1` therefore maps onto a `ThingKey { id: "t1", parent: UserKey { id: "u1" } }`.

use crate::coerce;
use crate::error::{Error, Result};
use crate::record::{FieldValue, Record, RecordBuilder};
use crate::reference::DocumentRef;
use crate::schema::MessageDescriptor;
use crate::value::Value;

/// A document path, split into its `(collection, id)` pairs, root first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyPath {
    pairs: Vec<(String, String)>,
}

impl KeyPath {
    /// Parse a document path.
    ///
    /// Either the fully-qualified form `projects/<p>/databases/<d>/documents/...` or the bare
    /// relative form is accepted. What remains after the prefix must be a non-empty, even number
    /// of non-empty segments.
    pub fn parse(path: &str) -> Result<KeyPath> {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        let rest = if segments[0] == "projects" {
            if segments.len() < 5 || segments[2] != "databases" || segments[4] != "documents" {
                return Err(Error::Decoding(format!(
                    "Unqualified reference path '{}': expected 'projects/<id>/databases/<id>/documents/...'",
                    path
                )));
            }
            &segments[5..]
        } else {
            &segments[..]
        };

        if rest.is_empty() || rest.len() % 2 != 0 {
            return Err(Error::Decoding(format!(
                "Invalid segment count ({}) in reference path '{}': expected collection/id pairs",
                rest.len(),
                path
            )));
        }
        if let Some(pos) = rest.iter().position(|s| s.is_empty()) {
            return Err(Error::Decoding(format!(
                "Empty segment at position '{}' in reference path '{}'",
                pos + 1,
                path
            )));
        }

        let pairs = rest
            .chunks(2)
            .map(|pair| (pair[0].to_string(), pair[1].to_string()))
            .collect();
        Ok(KeyPath { pairs })
    }

    /// The `(collection, id)` pairs, root first.
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// The `(collection, id)` pair naming the document itself.
    pub fn leaf(&self) -> Option<&(String, String)> {
        self.pairs.last()
    }
}

fn set_id(builder: &mut RecordBuilder, id: &str, path: &str, collection: &str) -> Result<()> {
    let descriptor = builder.descriptor().clone();
    let id_field = descriptor.id_field().ok_or_else(|| {
        Error::Decoding(format!(
            "No ID field on key entity '{}' for segment '{}/{}' of path '{}'",
            descriptor.name(),
            collection,
            id,
            path
        ))
    })?;
    let value = coerce::coerce(&descriptor, id_field, &Value::Str(id.to_string()), "")?;
    builder.set_field(id_field, value)?;
    Ok(())
}

fn set_parent(builder: &mut RecordBuilder, parent: Record, path: &str, collection: &str, id: &str) -> Result<()> {
    let descriptor = builder.descriptor().clone();
    let parent_field = descriptor.parent_field().ok_or_else(|| {
        Error::Decoding(format!(
            "No PARENT field on key entity '{}' for segment '{}/{}' of path '{}'",
            descriptor.name(),
            collection,
            id,
            path
        ))
    })?;
    builder.set_field(parent_field, FieldValue::Message(parent))?;
    Ok(())
}

/// Build a key of type `leaf` holding only the trailing identifier of `reference`.
pub fn single_level_key(reference: &DocumentRef, leaf: &MessageDescriptor) -> Result<Record> {
    let mut builder = RecordBuilder::new(leaf);
    set_id(&mut builder, reference.id(), reference.path(), "")?;
    Ok(builder.build())
}

/// Rebuild the full key of type `leaf` for the document at `reference`.
///
/// Each `(collection, id)` pair of the path becomes one key record. The leaf key type's PARENT
/// field is followed upward once per ancestor pair to find the type of each ancestor key; the
/// chain is then assembled root first, with every key holding its identifier in its ID field and
/// its ancestor's key in its PARENT field.
pub fn reconstruct_key(reference: &DocumentRef, leaf: &MessageDescriptor) -> Result<Record> {
    let path = reference.path();
    let key_path = KeyPath::parse(path)?;
    let pairs = key_path.pairs();

    // Ancestor key types, nearest first.
    let mut ancestors: Vec<MessageDescriptor> = Vec::with_capacity(pairs.len() - 1);
    let mut current = leaf.clone();
    for level in (0..pairs.len() - 1).rev() {
        let (collection, id) = &pairs[level + 1];
        let parent_field = current.parent_field().ok_or_else(|| {
            Error::Decoding(format!(
                "No PARENT field on key entity '{}' for segment '{}/{}' of path '{}'",
                current.name(),
                collection,
                id,
                path
            ))
        })?;
        let parent_type = current.message_type(parent_field).ok_or_else(|| {
            Error::Decoding(format!(
                "Unable to resolve parent key type on entity '{}' for path '{}'",
                current.name(),
                path
            ))
        })?;
        ancestors.push(parent_type.clone());
        current = parent_type;
    }
    ancestors.reverse();

    let mut chain: Option<Record> = None;
    for (descriptor, (collection, id)) in ancestors.iter().zip(pairs.iter()) {
        let mut builder = RecordBuilder::new(descriptor);
        set_id(&mut builder, id, path, collection)?;
        if let Some(parent) = chain.take() {
            set_parent(&mut builder, parent, path, collection, id)?;
        }
        chain = Some(builder.build());
    }

    let (collection, id) = &pairs[pairs.len() - 1];
    let mut builder = RecordBuilder::new(leaf);
    set_id(&mut builder, id, path, collection)?;
    if let Some(parent) = chain {
        set_parent(&mut builder, parent, path, collection, id)?;
    }
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
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
                MessageSchema::new("t.PartKey")
                    .field(
                        FieldDescriptor::new("parent", 1, FieldType::Message("t.ThingKey".into()))
                            .role(FieldRole::Parent),
                    )
                    .field(FieldDescriptor::new("id", 2, FieldType::String).role(FieldRole::Id)),
            )
            .message(MessageSchema::new("t.Bare").field(FieldDescriptor::new("x", 1, FieldType::Bool)))
            .build()
            .unwrap()
    }

    #[test]
    fn parse_forms() {
        let p = KeyPath::parse("projects/p/databases/(default)/documents/users/u1/things/t1").unwrap();
        assert_eq!(
            p.pairs(),
            &[
                ("users".to_string(), "u1".to_string()),
                ("things".to_string(), "t1".to_string())
            ]
        );
        assert_eq!(p, KeyPath::parse("users/u1/things/t1").unwrap());
        assert_eq!(p.leaf().unwrap().1, "t1");
    }

    #[test]
    fn parse_failures() {
        assert!(matches!(KeyPath::parse("users/u1/things"), Err(Error::Decoding(_))));
        assert!(matches!(
            KeyPath::parse("projects/p/databases/(default)/documents"),
            Err(Error::Decoding(_))
        ));
        assert!(matches!(KeyPath::parse("projects/p/stuff/x/documents/a/b"), Err(Error::Decoding(_))));
        assert!(matches!(KeyPath::parse("users//things/t1"), Err(Error::Decoding(_))));
    }

    #[test]
    fn root_key() {
        let pool = pool();
        let leaf = pool.get_message("t.UserKey").unwrap();
        let r = DocumentRef::new("projects/p/databases/(default)/documents/users/u1");
        let key = reconstruct_key(&r, &leaf).unwrap();
        assert_eq!(key.get("id").and_then(|v| v.as_str()), Some("u1"));
        assert_eq!(single_level_key(&r, &leaf).unwrap(), key);
    }

    #[test]
    fn nested_keys() {
        let pool = pool();
        let leaf = pool.get_message("t.PartKey").unwrap();
        let r = DocumentRef::new("users/u1/things/t1/parts/x9");
        let key = reconstruct_key(&r, &leaf).unwrap();
        assert_eq!(key.get("id").and_then(|v| v.as_str()), Some("x9"));
        let thing = key.get("parent").and_then(|v| v.as_message()).unwrap();
        assert_eq!(thing.descriptor().full_name(), "t.ThingKey");
        assert_eq!(thing.get("id").and_then(|v| v.as_str()), Some("t1"));
        let user = thing.get("parent").and_then(|v| v.as_message()).unwrap();
        assert_eq!(user.get("id").and_then(|v| v.as_str()), Some("u1"));
        assert!(!user.has("parent"));
    }

    #[test]
    fn missing_annotations() {
        let pool = pool();
        let user = pool.get_message("t.UserKey").unwrap();
        match reconstruct_key(&DocumentRef::new("users/u1/things/t1"), &user) {
            Err(Error::Decoding(msg)) => {
                assert!(msg.contains("things/t1"), "{}", msg);
                assert!(msg.contains("PARENT"), "{}", msg);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        let bare = pool.get_message("t.Bare").unwrap();
        assert!(matches!(
            reconstruct_key(&DocumentRef::new("users/u1"), &bare),
            Err(Error::Decoding(_))
        ));
    }
}
