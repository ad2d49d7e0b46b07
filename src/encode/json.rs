//! Tree-walk conversion of values to JSON through `serde`.
//!
//! JSON has fewer types than EDN, so the mapping loses information:
//! keywords and symbols become their `ns/name` text, sets become arrays,
//! numbers JSON cannot hold exactly (big integers, big decimals, ratios,
//! non-finite floats) become their EDN text, and a tagged value becomes a
//! single-entry object keyed by `#tag`. Map keys that are not strings,
//! keywords or symbols are written as EDN text.

use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::Serialize;
use serde_json::Value;

use crate::encode::writer::to_edn_string;
use crate::value::{ValueRef, ValueType};

impl Serialize for ValueRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.value_type() {
            ValueType::Nil => serializer.serialize_unit(),
            ValueType::Bool => serializer.serialize_bool(self.as_bool() == Some(true)),
            ValueType::Int => serializer.serialize_i64(self.as_i64().unwrap_or_default()),
            ValueType::Float => match self.as_f64() {
                Some(value) if value.is_finite() => serializer.serialize_f64(value),
                _ => serializer.collect_str(self),
            },
            ValueType::BigInt | ValueType::BigDecimal => serializer.collect_str(self),
            #[cfg(feature = "ratio")]
            ValueType::Ratio => serializer.collect_str(self),
            ValueType::Char => serializer.serialize_char(self.as_char().unwrap_or_default()),
            ValueType::String => serializer.serialize_str(self.as_str().unwrap_or_default()),
            ValueType::Symbol | ValueType::Keyword => {
                match self.as_keyword().or_else(|| self.as_symbol()) {
                    Some(name) => serializer.collect_str(&name),
                    None => serializer.serialize_unit(),
                }
            }
            ValueType::List | ValueType::Vector | ValueType::Set => {
                let mut seq = serializer.serialize_seq(Some(self.len()))?;
                for item in self.iter() {
                    seq.serialize_element(&item)?;
                }
                seq.end()
            }
            ValueType::Map => {
                let mut map = serializer.serialize_map(Some(self.len()))?;
                for (key, value) in self.entries() {
                    map.serialize_entry(&MapKey(key), &value)?;
                }
                map.end()
            }
            ValueType::Tagged => {
                let mut map = serializer.serialize_map(Some(1))?;
                let tag = self
                    .tag()
                    .map(|tag| format!("#{tag}"))
                    .unwrap_or_default();
                match self.tagged_value() {
                    Some(inner) => map.serialize_entry(&tag, &inner)?,
                    None => map.serialize_entry(&tag, &())?,
                }
                map.end()
            }
        }
    }
}

struct MapKey<'d>(ValueRef<'d>);

impl Serialize for MapKey<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let key = self.0;
        if let Some(text) = key.as_str() {
            return serializer.serialize_str(text);
        }
        if let Some(name) = key.as_keyword().or_else(|| key.as_symbol()) {
            return serializer.collect_str(&name);
        }
        serializer.serialize_str(&to_edn_string(key))
    }
}

/// Converts `value` into a `serde_json::Value`.
pub fn to_json(value: ValueRef<'_>) -> serde_json::Result<Value> {
    serde_json::to_value(value)
}

pub fn to_json_string(value: ValueRef<'_>) -> serde_json::Result<String> {
    serde_json::to_string(&value)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::arena::{Arena, ValueId};

    #[rstest::rstest]
    fn test_map_keys_become_strings() {
        let mut arena = Arena::new("");
        let kw = arena.alloc_keyword(Some("user"), "id").unwrap();
        let int_key = arena.alloc_int(7).unwrap();
        let seven = arena.alloc_string("seven").unwrap();
        let one = arena.alloc_int(1).unwrap();
        let map = arena
            .alloc_map(&[(kw, one), (int_key, seven)])
            .unwrap();
        assert_eq!(
            to_json(arena.get(map)).unwrap(),
            json!({"user/id": 1, "7": "seven"})
        );
    }

    #[rstest::rstest]
    fn test_non_finite_floats_and_tags() {
        let mut arena = Arena::new("");
        let nan = arena.alloc_float(f64::NAN).unwrap();
        let tagged = arena.alloc_tagged("inst", nan).unwrap();
        let list = arena.alloc_vector(&[tagged, ValueId::NIL]).unwrap();
        assert_eq!(
            to_json_string(arena.get(list)).unwrap(),
            r###"[{"#inst":"##NaN"},null]"###
        );
    }
}
