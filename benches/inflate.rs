//! Inflation and codec throughput.
//!
//! Run with: cargo bench --bench inflate

use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use record_codec::*;

fn descriptor() -> MessageDescriptor {
    SchemaPoolBuilder::new()
        .enumeration(EnumSchema::new("bench.Level").value("LOW", 0).value("MID", 1).value("HIGH", 2))
        .message(
            MessageSchema::new("bench.UserKey")
                .field(FieldDescriptor::new("id", 1, FieldType::String).role(FieldRole::Id)),
        )
        .message(
            MessageSchema::new("bench.Point")
                .field(FieldDescriptor::new("x", 1, FieldType::Double))
                .field(FieldDescriptor::new("y", 2, FieldType::Double)),
        )
        .message(
            MessageSchema::new("bench.Event")
                .field(
                    FieldDescriptor::new("owner", 1, FieldType::Message("bench.UserKey".into()))
                        .role(FieldRole::Reference),
                )
                .field(FieldDescriptor::new("name", 2, FieldType::String).required())
                .field(FieldDescriptor::new("level", 3, FieldType::Enum("bench.Level".into())))
                .field(FieldDescriptor::new("samples", 4, FieldType::SInt64).repeated())
                .field(FieldDescriptor::new("path", 5, FieldType::Message("bench.Point".into())).repeated())
                .field(FieldDescriptor::new(
                    "at",
                    6,
                    FieldType::Message("google.protobuf.Timestamp".into()),
                )),
        )
        .build()
        .unwrap()
        .get_message("bench.Event")
        .unwrap()
}

fn input() -> BTreeMap<String, Value> {
    let point = |x: f64, y: f64| {
        let mut m = BTreeMap::new();
        m.insert("x".to_string(), Value::Double(x));
        m.insert("y".to_string(), Value::Double(y));
        Value::Map(m)
    };
    let mut data = BTreeMap::new();
    data.insert("owner".to_string(), Value::Reference(DocumentRef::new("users/alice")));
    data.insert("name".to_string(), Value::from("sensor tick"));
    data.insert("level".to_string(), Value::from("MID"));
    data.insert(
        "samples".to_string(),
        (0..64i64).map(|i| i * 1_000 - 32_000).collect(),
    );
    data.insert(
        "path".to_string(),
        Value::Array((0..16).map(|i| point(i as f64, -(i as f64))).collect()),
    );
    data.insert("at".to_string(), Value::Long(1_700_000_000));
    data
}

fn bench_inflate(c: &mut Criterion) {
    let d = descriptor();
    let data = input();
    let inflater = Inflater::new();
    c.bench_function("inflate/event", |b| {
        b.iter(|| inflater.inflate(black_box(&d), black_box(&data)).unwrap())
    });
}

fn bench_codec(c: &mut Criterion) {
    let d = descriptor();
    let record = Inflater::new().inflate(&d, &input()).unwrap();
    let codec = Codec::new(&d);

    let mut group = c.benchmark_group("codec");
    for dialect in [Dialect::Binary, Dialect::Json] {
        let bytes = codec.encode_to_vec_dialect(&record, dialect).unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_function(format!("encode/{}", dialect), |b| {
            b.iter(|| codec.encode_to_vec_dialect(black_box(&record), dialect).unwrap())
        });
        group.bench_function(format!("decode/{}", dialect), |b| {
            b.iter(|| codec.decode_dialect(black_box(&bytes[..]), dialect).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_inflate, bench_codec);
criterion_main!(benches);
