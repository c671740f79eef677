#![no_main]
use libfuzzer_sys::fuzz_target;
use record_codec::{
    codec, Dialect, FieldDescriptor, FieldType, MessageSchema, SchemaPoolBuilder,
};

fuzz_target!(|data: &[u8]| {
    let pool = SchemaPoolBuilder::new()
        .message(MessageSchema::new("fuzz.Inner").field(FieldDescriptor::new("id", 1, FieldType::String)))
        .message(
            MessageSchema::new("fuzz.Outer")
                .field(FieldDescriptor::new("name", 1, FieldType::String))
                .field(FieldDescriptor::new("values", 2, FieldType::SInt64).repeated())
                .field(FieldDescriptor::new("inner", 3, FieldType::Message("fuzz.Inner".into())))
                .field(FieldDescriptor::new("raw", 4, FieldType::Bytes))
                .field(FieldDescriptor::new("ratio", 5, FieldType::Double)),
        )
        .build()
        .unwrap();
    let outer = pool.get_message("fuzz.Outer").unwrap();
    let _ = codec::deserialize(&outer, data);
    let _ = codec::deserialize_with(&outer, data, Dialect::Json);
});
