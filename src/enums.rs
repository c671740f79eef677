//! Resolution of dynamic values into enum members.

use crate::error::{Error, Result};
use crate::schema::{EnumDescriptor, FieldDescriptor};
use crate::value::Value;

/// Find the enum type attached to `field`, or fail.
pub(crate) fn enum_type_for(
    descriptor: &crate::schema::MessageDescriptor,
    field: &FieldDescriptor,
) -> Result<EnumDescriptor> {
    descriptor.enum_type(field).ok_or_else(|| {
        Error::Decoding(format!(
            "Unable to resolve enum without attached type, for field '{}' on entity '{}'",
            field.name(),
            descriptor.name()
        ))
    })
}

/// Numeric enum input: integers, or doubles holding an integral value.
fn as_enum_number(value: &Value) -> Option<i32> {
    match *value {
        Value::Int(v) => Some(v),
        Value::Long(v) => i32::try_from(v).ok(),
        Value::Double(v) if v.fract() == 0.0 && v >= i32::MIN as f64 && v <= i32::MAX as f64 => {
            Some(v as i32)
        }
        _ => None,
    }
}

/// Resolve a singular enum value: strings by exact member name, numbers by member number.
pub fn resolve(
    enum_type: &EnumDescriptor,
    field: &FieldDescriptor,
    entity: &str,
    value: &Value,
) -> Result<i32> {
    let resolved = match value {
        Value::Str(name) => enum_type.value_by_name(name),
        Value::Int(_) | Value::Long(_) | Value::Double(_) => as_enum_number(value)
            .filter(|n| enum_type.value_by_number(*n).is_some()),
        _ => {
            return Err(Error::Decoding(format!(
                "Unable to resolve enum type from raw value for field '{}' on entity '{}'",
                field.name(),
                entity
            )))
        }
    };
    resolved.ok_or_else(|| {
        Error::Decoding(format!(
            "Unable to resolve enum value for field '{}' on entity '{}'",
            field.name(),
            entity
        ))
    })
}

/// Resolve a repeated enum value.
///
/// Two encodings are accepted. A list holds member names (matched after upper-casing) or member
/// numbers. A map is keyed by member name (also upper-cased); its values are ignored, and each
/// key contributes one member, in key order.
pub fn resolve_repeated(
    enum_type: &EnumDescriptor,
    field: &FieldDescriptor,
    entity: &str,
    value: &Value,
) -> Result<Vec<i32>> {
    match value {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let pos = i + 1;
                let resolved = match item {
                    Value::Str(name) => enum_type.value_by_name(&name.to_uppercase()),
                    Value::Int(_) | Value::Long(_) | Value::Double(_) => as_enum_number(item)
                        .filter(|n| enum_type.value_by_number(*n).is_some()),
                    _ => {
                        return Err(Error::Decoding(format!(
                            "Unable to decode repeated enum value in position '{}' on field '{}' on entity '{}'",
                            pos,
                            field.name(),
                            entity
                        )))
                    }
                };
                resolved.ok_or_else(|| {
                    Error::Decoding(format!(
                        "Unable to resolve repeated enum value in position '{}' on field '{}' on entity '{}'",
                        pos,
                        field.name(),
                        entity
                    ))
                })
            })
            .collect(),
        Value::Map(keys) => keys
            .keys()
            .map(|key| {
                enum_type.value_by_name(&key.to_uppercase()).ok_or_else(|| {
                    Error::Decoding(format!(
                        "Unable to resolve repeated enum key '{}' on field '{}' on entity '{}'",
                        key,
                        field.name(),
                        entity
                    ))
                })
            })
            .collect(),
        _ => Err(Error::Decoding(format!(
            "Failed to identify type of repeated enum data at field '{}' on entity '{}'",
            field.name(),
            entity
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::*;
    use std::collections::BTreeMap;

    fn setup() -> (EnumDescriptor, FieldDescriptor) {
        let pool = SchemaPoolBuilder::new()
            .enumeration(EnumSchema::new("t.Letter").value("A", 0).value("B", 1).value("C", 2))
            .build()
            .unwrap();
        (
            pool.get_enum("t.Letter").unwrap(),
            FieldDescriptor::new("letters", 1, FieldType::Enum("t.Letter".into())).repeated(),
        )
    }

    #[test]
    fn singular() {
        let (e, f) = setup();
        assert_eq!(resolve(&e, &f, "T", &Value::from("B")).unwrap(), 1);
        assert_eq!(resolve(&e, &f, "T", &Value::from(2)).unwrap(), 2);
        assert_eq!(resolve(&e, &f, "T", &Value::from(2i64)).unwrap(), 2);
        assert_eq!(resolve(&e, &f, "T", &Value::from(1.0)).unwrap(), 1);
        // Singular names are case-sensitive
        assert!(matches!(resolve(&e, &f, "T", &Value::from("b")), Err(Error::Decoding(_))));
        assert!(matches!(resolve(&e, &f, "T", &Value::from(9)), Err(Error::Decoding(_))));
        assert!(matches!(resolve(&e, &f, "T", &Value::Bool(true)), Err(Error::Decoding(_))));
    }

    #[test]
    fn mixed_list() {
        let (e, f) = setup();
        let input = Value::Array(vec!["A".into(), "b".into(), 2.into()]);
        assert_eq!(resolve_repeated(&e, &f, "T", &input).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn bad_list_element_cites_position() {
        let (e, f) = setup();
        let input = Value::Array(vec!["A".into(), Value::Bool(true)]);
        match resolve_repeated(&e, &f, "T", &input) {
            Err(Error::Decoding(msg)) => assert!(msg.contains("position '2'"), "{}", msg),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn keyed_map() {
        let (e, f) = setup();
        let mut map = BTreeMap::new();
        map.insert("c".to_string(), Value::Bool(true));
        map.insert("a".to_string(), Value::Bool(false));
        let out = resolve_repeated(&e, &f, "T", &Value::Map(map)).unwrap();
        assert_eq!(out, vec![0, 2]);
    }

    #[test]
    fn other_shapes_fail() {
        let (e, f) = setup();
        assert!(matches!(
            resolve_repeated(&e, &f, "T", &Value::from("A")),
            Err(Error::Decoding(_))
        ));
    }
}
