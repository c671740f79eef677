#![allow(dead_code)]

use std::collections::BTreeMap;

use record_codec::*;

pub fn pool() -> SchemaPool {
    SchemaPoolBuilder::new()
        .enumeration(EnumSchema::new("shop.Letter").value("A", 0).value("B", 1).value("C", 2))
        .message(
            MessageSchema::new("shop.UserKey")
                .field(FieldDescriptor::new("id", 1, FieldType::String).role(FieldRole::Id)),
        )
        .message(
            MessageSchema::new("shop.ThingKey")
                .field(
                    FieldDescriptor::new("parent", 1, FieldType::Message("shop.UserKey".into()))
                        .role(FieldRole::Parent),
                )
                .field(FieldDescriptor::new("id", 2, FieldType::String).role(FieldRole::Id)),
        )
        .message(
            MessageSchema::new("shop.Address")
                .field(FieldDescriptor::new("city", 1, FieldType::String))
                .field(FieldDescriptor::new("zip_code", 2, FieldType::String)),
        )
        .message(
            MessageSchema::new("shop.Thing")
                .field(
                    FieldDescriptor::new("key", 1, FieldType::Message("shop.ThingKey".into()))
                        .role(FieldRole::Reference),
                )
                .field(
                    FieldDescriptor::new("owner", 2, FieldType::Message("shop.UserKey".into()))
                        .role(FieldRole::Reference),
                )
                .field(FieldDescriptor::new("title", 3, FieldType::String).required())
                .field(FieldDescriptor::new("letters", 4, FieldType::Enum("shop.Letter".into())).repeated())
                .field(FieldDescriptor::new("count", 5, FieldType::Int64))
                .field(FieldDescriptor::new("ratio", 6, FieldType::Double))
                .field(FieldDescriptor::new("tags", 7, FieldType::String).repeated())
                .field(FieldDescriptor::new("address", 8, FieldType::Message("shop.Address".into())))
                .field(FieldDescriptor::new(
                    "created",
                    9,
                    FieldType::Message("google.protobuf.Timestamp".into()),
                ))
                .field(FieldDescriptor::new("raw", 10, FieldType::Bytes))
                .field(FieldDescriptor::new("sizes", 11, FieldType::SInt32).repeated())
                .field(FieldDescriptor::new("scratch", 12, FieldType::String).ephemeral()),
        )
        .build()
        .unwrap()
}

pub fn thing() -> MessageDescriptor {
    pool().get_message("shop.Thing").unwrap()
}

pub fn map(entries: Vec<(&str, Value)>) -> BTreeMap<String, Value> {
    entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// Input for a fully-populated thing.
pub fn thing_data() -> BTreeMap<String, Value> {
    map(vec![
        (
            "key",
            Value::Reference(DocumentRef::new(
                "projects/p/databases/(default)/documents/users/u1/things/t1",
            )),
        ),
        ("owner", Value::Reference(DocumentRef::new("users/u1"))),
        ("title", Value::from("Widget")),
        ("letters", Value::Array(vec![Value::from("A"), Value::from("b"), Value::Int(2)])),
        ("count", Value::Long(-40)),
        ("ratio", Value::Double(0.5)),
        ("tags", Value::Array(vec![Value::from("red"), Value::Null, Value::from("blue")])),
        (
            "address",
            Value::Map(map(vec![("city", Value::from("Oslo")), ("zip_code", Value::from("0150"))])),
        ),
        ("created", Value::Timestamp(Timestamp::from_sec(1_600_000_000))),
        ("raw", Value::Bin(vec![0, 1, 2, 255])),
        ("sizes", Value::Array(vec![Value::Int(-1), Value::Int(300)])),
        ("scratch", Value::from("never read")),
    ])
}
