use proptest::prelude::*;
use record_codec::*;

fn flat() -> MessageDescriptor {
    SchemaPoolBuilder::new()
        .enumeration(EnumSchema::new("p.Kind").value("NONE", 0).value("ONE", 1).value("TWO", 2))
        .message(
            MessageSchema::new("p.Inner")
                .field(FieldDescriptor::new("label", 1, FieldType::String))
                .field(FieldDescriptor::new("weight", 2, FieldType::Fixed64)),
        )
        .message(
            MessageSchema::new("p.Flat")
                .field(FieldDescriptor::new("flag", 1, FieldType::Bool))
                .field(FieldDescriptor::new("small", 2, FieldType::Int32))
                .field(FieldDescriptor::new("zig", 3, FieldType::SInt64))
                .field(FieldDescriptor::new("count", 4, FieldType::UInt32))
                .field(FieldDescriptor::new("fixed", 5, FieldType::SFixed32))
                .field(FieldDescriptor::new("score", 6, FieldType::Double))
                .field(FieldDescriptor::new("name", 7, FieldType::String))
                .field(FieldDescriptor::new("blob", 8, FieldType::Bytes))
                .field(FieldDescriptor::new("kind", 9, FieldType::Enum("p.Kind".into())))
                .field(FieldDescriptor::new("values", 10, FieldType::Int64).repeated())
                .field(FieldDescriptor::new("names", 11, FieldType::String).repeated())
                .field(FieldDescriptor::new("inner", 12, FieldType::Message("p.Inner".into())))
                .field(FieldDescriptor::new("group", 13, FieldType::Group("p.Inner".into())))
                .field(FieldDescriptor::new("inners", 14, FieldType::Message("p.Inner".into())).repeated()),
        )
        .build()
        .unwrap()
        .get_message("p.Flat")
        .unwrap()
}

fn inner(d: &MessageDescriptor, label: &str, weight: u64) -> FieldValue {
    let mut b = RecordBuilder::new(&d.pool().get_message("p.Inner").unwrap());
    b.set("label", label.into()).unwrap();
    b.set("weight", FieldValue::U64(weight)).unwrap();
    FieldValue::Message(b.build())
}

proptest! {
    #[test]
    fn binary_round_trip(
        flag: bool,
        small: i32,
        zig: i64,
        count: u32,
        fixed: i32,
        score in -1.0e12f64..1.0e12,
        name in ".{0,16}",
        blob in proptest::collection::vec(any::<u8>(), 0..32),
        kind in 0i32..3,
        values in proptest::collection::vec(any::<i64>(), 0..8),
        names in proptest::collection::vec("[a-z]{0,6}", 0..4),
        label in "[a-z]{0,8}",
        weight: u64,
        with_inner: bool,
    ) {
        let d = flat();
        let mut b = RecordBuilder::new(&d);
        b.set("flag", FieldValue::Bool(flag)).unwrap();
        b.set("small", FieldValue::I32(small)).unwrap();
        b.set("zig", FieldValue::I64(zig)).unwrap();
        b.set("count", FieldValue::U32(count)).unwrap();
        b.set("fixed", FieldValue::I32(fixed)).unwrap();
        b.set("score", FieldValue::F64(score)).unwrap();
        b.set("name", name.into()).unwrap();
        b.set("blob", FieldValue::Bytes(blob)).unwrap();
        b.set("kind", FieldValue::Enum(kind)).unwrap();
        b.set("values", FieldValue::List(values.into_iter().map(FieldValue::I64).collect())).unwrap();
        b.set("names", FieldValue::List(names.into_iter().map(FieldValue::Str).collect())).unwrap();
        if with_inner {
            b.set("inner", inner(&d, &label, weight)).unwrap();
            b.set("group", inner(&d, &label, weight)).unwrap();
            b.set("inners", FieldValue::List(vec![inner(&d, &label, weight), inner(&d, "", 0)])).unwrap();
        }
        let record = b.build();

        let bytes = codec::serialize(&record).unwrap();
        let decoded = codec::deserialize(&d, &bytes).unwrap();
        prop_assert_eq!(&decoded, &record);
        prop_assert_eq!(codec::serialize(&decoded).unwrap(), bytes);
    }

    #[test]
    fn binary_decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
        let _ = codec::deserialize(&flat(), &bytes);
    }
}
