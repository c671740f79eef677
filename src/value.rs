use std::collections::BTreeMap;
use std::ops::Index;

use crate::record::Record;
use crate::reference::DocumentRef;
use crate::timestamp::Timestamp;

/// A loosely-typed value, as found in the maps handed to the
/// [`Inflater`][crate::inflate::Inflater].
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// An explicitly missing value. Treated the same as an absent key.
    Null,
    Bool(bool),
    /// 32-bit integer.
    Int(i32),
    /// 64-bit integer.
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    /// Raw bytes.
    Bin(Vec<u8>),
    /// A list, as held by repeated fields.
    Array(Vec<Value>),
    /// A nested map, inflated into a nested record.
    Map(BTreeMap<String, Value>),
    /// A handle to a stored document.
    Reference(DocumentRef),
    /// An external timestamp handle.
    Timestamp(Timestamp),
    /// An already-typed record, passed through as-is.
    Record(Record),
}

static NULL: Value = Value::Null;

impl Value {
    /// Name of the value's kind, for error reporting.
    pub fn name(&self) -> &'static str {
        use self::Value::*;
        match self {
            Null => "Null",
            Bool(_) => "Bool",
            Int(_) => "Int",
            Long(_) => "Long",
            Float(_) => "Float",
            Double(_) => "Double",
            Str(_) => "Str",
            Bin(_) => "Bin",
            Array(_) => "Array",
            Map(_) => "Map",
            Reference(_) => "Reference",
            Timestamp(_) => "Timestamp",
            Record(_) => "Record",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// True for any of the numeric kinds.
    pub fn is_number(&self) -> bool {
        matches!(
            self,
            Value::Int(_) | Value::Long(_) | Value::Float(_) | Value::Double(_)
        )
    }

    pub fn as_bool(&self) -> Option<bool> {
        if let Value::Bool(val) = *self {
            Some(val)
        } else {
            None
        }
    }

    /// Integer kinds, widened to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(v) => Some(v as i64),
            Value::Long(v) => Some(v),
            _ => None,
        }
    }

    /// Any numeric kind, as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Int(v) => Some(v as f64),
            Value::Long(v) => Some(v as f64),
            Value::Float(v) => Some(v as f64),
            Value::Double(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        if let Value::Str(ref s) = *self {
            Some(s)
        } else {
            None
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        if let Value::Array(ref array) = *self {
            Some(array)
        } else {
            None
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        if let Value::Map(ref map) = *self {
            Some(map)
        } else {
            None
        }
    }

    pub fn as_reference(&self) -> Option<&DocumentRef> {
        if let Value::Reference(ref r) = *self {
            Some(r)
        } else {
            None
        }
    }
}

impl Index<&str> for Value {
    type Output = Value;

    /// Looks up a map key, returning `Null` for missing keys and non-map values.
    fn index(&self, index: &str) -> &Value {
        self.as_map().and_then(|m| m.get(index)).unwrap_or(&NULL)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}

macro_rules! impl_from_value {
    ($t: ty, $p: ident) => {
        impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::$p(v)
            }
        }
    };
}

impl_from_value!(bool, Bool);
impl_from_value!(i32, Int);
impl_from_value!(i64, Long);
impl_from_value!(f32, Float);
impl_from_value!(f64, Double);
impl_from_value!(String, Str);
impl_from_value!(Vec<u8>, Bin);
impl_from_value!(Vec<Value>, Array);
impl_from_value!(BTreeMap<String, Value>, Map);
impl_from_value!(DocumentRef, Reference);
impl_from_value!(Timestamp, Timestamp);
impl_from_value!(Record, Record);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl<V: Into<Value>> std::iter::FromIterator<V> for Value {
    fn from_iter<T: IntoIterator<Item = V>>(iter: T) -> Self {
        let v: Vec<Value> = iter.into_iter().map(Into::into).collect();
        Value::Array(v)
    }
}

impl<'de> serde::Deserialize<'de> for Value {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::*;
        use std::fmt;

        struct ValueVisitor;
        impl<'de> Visitor<'de> for ValueVisitor {
            type Value = Value;

            fn expecting(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
                fmt.write_str("any valid dynamic value")
            }

            fn visit_bool<E: Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(Value::Bool(v))
            }

            fn visit_i64<E: Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(match i32::try_from(v) {
                    Ok(v) => Value::Int(v),
                    Err(_) => Value::Long(v),
                })
            }

            fn visit_u64<E: Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(if let Ok(v) = i32::try_from(v) {
                    Value::Int(v)
                } else if let Ok(v) = i64::try_from(v) {
                    Value::Long(v)
                } else {
                    Value::Double(v as f64)
                })
            }

            fn visit_f32<E: Error>(self, v: f32) -> Result<Self::Value, E> {
                Ok(Value::Float(v))
            }

            fn visit_f64<E: Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(Value::Double(v))
            }

            fn visit_str<E: Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(Value::Str(v.into()))
            }

            fn visit_string<E: Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(Value::Str(v))
            }

            fn visit_bytes<E: Error>(self, v: &[u8]) -> Result<Self::Value, E> {
                Ok(Value::Bin(v.into()))
            }

            fn visit_byte_buf<E: Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
                Ok(Value::Bin(v))
            }

            fn visit_unit<E: Error>(self) -> Result<Self::Value, E> {
                Ok(Value::Null)
            }

            fn visit_none<E: Error>(self) -> Result<Self::Value, E> {
                Ok(Value::Null)
            }

            fn visit_some<D: serde::Deserializer<'de>>(
                self,
                deserializer: D,
            ) -> Result<Self::Value, D::Error> {
                serde::Deserialize::deserialize(deserializer)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                // Allocate with the size hint, but be conservative. 4096 is what serde uses
                // internally for collections, so we'll do likewise.
                let mut seq = match access.size_hint() {
                    Some(size) => Vec::with_capacity(size.min(4096)),
                    None => Vec::new(),
                };
                while let Some(elem) = access.next_element()? {
                    seq.push(elem);
                }
                Ok(Value::Array(seq))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = BTreeMap::new();
                while let Some((key, val)) = access.next_entry()? {
                    map.insert(key, val);
                }
                Ok(Value::Map(map))
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_json() {
        let v: Value = serde_json::from_str(
            r#"{"a": 1, "b": 5000000000, "c": 1.5, "d": "x", "e": [true, null], "f": {}}"#,
        )
        .unwrap();
        assert_eq!(v["a"], Value::Int(1));
        assert_eq!(v["b"], Value::Long(5_000_000_000));
        assert_eq!(v["c"], Value::Double(1.5));
        assert_eq!(v["d"].as_str(), Some("x"));
        assert_eq!(v["e"], Value::Array(vec![Value::Bool(true), Value::Null]));
        assert!(v["f"].is_map());
        assert!(v["missing"].is_null());
    }

    #[test]
    fn conversions() {
        assert_eq!(Value::from(3).as_i64(), Some(3));
        assert_eq!(Value::from(3i64).name(), "Long");
        assert_eq!(Value::from(2.5f32).as_f64(), Some(2.5));
        let arr: Value = vec!["a", "b"].into_iter().collect();
        assert_eq!(arr.as_array().map(|a| a.len()), Some(2));
    }
}
