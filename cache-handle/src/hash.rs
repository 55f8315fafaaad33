//! # Hash Field Codec
//!
//! Purpose: Flatten a structured value into `HSET` field/value pairs and
//! rebuild it from an `HGETALL` reply.
//!
//! ## Design Principles
//! 1. **Flat Text Fields**: Strings are stored verbatim, numbers as decimal
//!    text, bools as `1`/`0`; nested values are stored as JSON text.
//! 2. **Parse on Demand**: Field text is converted only when the target type
//!    asks for a number, bool or nested value.
//! 3. **Fail Loudly**: Shape or parse mismatches are decode errors.

use serde::de::value::{Error as ValueError, MapDeserializer, StringDeserializer};
use serde::de::{self, DeserializeOwned, IntoDeserializer, Visitor};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{CacheError, CacheResult};

/// Flattens `value` into field/value pairs. `value` must serialize to a map;
/// null fields are skipped.
pub fn flatten<T: Serialize + ?Sized>(value: &T) -> CacheResult<Vec<(String, String)>> {
    let object = match serde_json::to_value(value) {
        Ok(Value::Object(object)) => object,
        Ok(other) => {
            return Err(CacheError::InvalidValue(format!(
                "hash value must be a map or struct, got {}",
                json_kind(&other)
            )))
        }
        Err(err) => return Err(CacheError::Serialize(err.to_string())),
    };

    let mut fields = Vec::with_capacity(object.len());
    for (name, field) in object {
        let text = match field {
            Value::Null => continue,
            Value::String(text) => text,
            Value::Bool(flag) => (if flag { "1" } else { "0" }).to_string(),
            Value::Number(number) => number.to_string(),
            nested @ (Value::Array(_) | Value::Object(_)) => nested.to_string(),
        };
        fields.push((name, text));
    }
    Ok(fields)
}

/// Rebuilds a value from field/value pairs.
pub fn unflatten<T: DeserializeOwned>(fields: Vec<(String, String)>) -> CacheResult<T> {
    let entries = fields.into_iter().map(|(name, text)| (name, FieldValue(text)));
    let deserializer: MapDeserializer<'_, _, ValueError> = MapDeserializer::new(entries);
    T::deserialize(deserializer).map_err(|err| {
        warn!(error = %err, "hash fields do not match the requested type");
        CacheError::Decode(err.to_string())
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a map",
    }
}

/// Text of a single hash field.
struct FieldValue(String);

impl FieldValue {
    fn parse<N: std::str::FromStr>(&self, kind: &str) -> Result<N, ValueError> {
        self.0
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid {kind}: {:?}", self.0)))
    }

    fn nested<'de, V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ValueError> {
        let mut json = serde_json::Deserializer::from_reader(self.0.as_bytes());
        let value =
            de::Deserializer::deserialize_any(&mut json, visitor).map_err(de::Error::custom)?;
        json.end().map_err(de::Error::custom)?;
        Ok(value)
    }
}

impl<'de> IntoDeserializer<'de, ValueError> for FieldValue {
    type Deserializer = Self;

    fn into_deserializer(self) -> Self {
        self
    }
}

macro_rules! parse_number {
    ($($method:ident => $visit:ident: $ty:ty),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ValueError> {
                visitor.$visit(self.parse::<$ty>(stringify!($ty))?)
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for FieldValue {
    type Error = ValueError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ValueError> {
        visitor.visit_string(self.0)
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ValueError> {
        match self.0.trim() {
            "1" | "true" => visitor.visit_bool(true),
            "0" | "false" | "" => visitor.visit_bool(false),
            other => Err(de::Error::custom(format!("invalid bool: {other:?}"))),
        }
    }

    parse_number! {
        deserialize_i8 => visit_i8: i8,
        deserialize_i16 => visit_i16: i16,
        deserialize_i32 => visit_i32: i32,
        deserialize_i64 => visit_i64: i64,
        deserialize_i128 => visit_i128: i128,
        deserialize_u8 => visit_u8: u8,
        deserialize_u16 => visit_u16: u16,
        deserialize_u32 => visit_u32: u32,
        deserialize_u64 => visit_u64: u64,
        deserialize_u128 => visit_u128: u128,
        deserialize_f32 => visit_f32: f32,
        deserialize_f64 => visit_f64: f64,
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ValueError> {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, ValueError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, ValueError> {
        let text: StringDeserializer<ValueError> = self.0.into_deserializer();
        visitor.visit_enum(text)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ValueError> {
        self.nested(visitor)
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, ValueError> {
        self.nested(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, ValueError> {
        self.nested(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ValueError> {
        self.nested(visitor)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, ValueError> {
        self.nested(visitor)
    }

    serde::forward_to_deserialize_any! {
        char str string bytes byte_buf unit unit_struct identifier ignored_any
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Point {
        x: String,
        y: String,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    enum Role {
        Admin,
        Guest,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Account {
        id: u64,
        score: f64,
        active: bool,
        role: Role,
        nickname: Option<String>,
        tags: Vec<String>,
    }

    fn field<'a>(fields: &'a [(String, String)], name: &str) -> Option<&'a str> {
        fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    #[test]
    fn flattens_string_fields_verbatim() {
        let point = Point {
            x: "1".to_string(),
            y: "2".to_string(),
        };
        let fields = flatten(&point).unwrap();
        assert_eq!(field(&fields, "x"), Some("1"));
        assert_eq!(field(&fields, "y"), Some("2"));
        assert_eq!(unflatten::<Point>(fields).unwrap(), point);
    }

    #[test]
    fn flattens_scalars_as_text_and_skips_nulls() {
        let account = Account {
            id: 7,
            score: 1.5,
            active: true,
            role: Role::Admin,
            nickname: None,
            tags: vec!["a".to_string(), "b".to_string()],
        };
        let fields = flatten(&account).unwrap();
        assert_eq!(field(&fields, "id"), Some("7"));
        assert_eq!(field(&fields, "score"), Some("1.5"));
        assert_eq!(field(&fields, "active"), Some("1"));
        assert_eq!(field(&fields, "role"), Some("admin"));
        assert_eq!(field(&fields, "nickname"), None);
        assert_eq!(field(&fields, "tags"), Some(r#"["a","b"]"#));
    }

    #[test]
    fn parses_typed_fields_from_text() {
        let fields = vec![
            ("id".to_string(), "42".to_string()),
            ("score".to_string(), "-3.25".to_string()),
            ("active".to_string(), "0".to_string()),
            ("role".to_string(), "guest".to_string()),
            ("nickname".to_string(), "neo".to_string()),
            ("tags".to_string(), r#"["x"]"#.to_string()),
        ];
        let account: Account = unflatten(fields).unwrap();
        assert_eq!(
            account,
            Account {
                id: 42,
                score: -3.25,
                active: false,
                role: Role::Guest,
                nickname: Some("neo".to_string()),
                tags: vec!["x".to_string()],
            }
        );
    }

    #[test]
    fn decodes_into_plain_maps() {
        let fields = vec![("k".to_string(), "v".to_string())];
        let map: HashMap<String, String> = unflatten(fields).unwrap();
        assert_eq!(map.get("k").map(String::as_str), Some("v"));
    }

    #[test]
    fn rejects_non_map_values() {
        let err = flatten(&vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, CacheError::InvalidValue(_)));
    }

    #[test]
    fn mismatched_fields_are_decode_errors() {
        let fields = vec![("x".to_string(), "1".to_string())];
        let err = unflatten::<Point>(fields).unwrap_err();
        assert!(matches!(err, CacheError::Decode(_)));

        let fields = vec![
            ("id".to_string(), "not-a-number".to_string()),
            ("score".to_string(), "1".to_string()),
            ("active".to_string(), "1".to_string()),
            ("role".to_string(), "admin".to_string()),
            ("tags".to_string(), "[]".to_string()),
        ];
        let err = unflatten::<Account>(fields).unwrap_err();
        assert!(matches!(err, CacheError::Decode(_)));
    }

    #[test]
    fn trailing_text_after_nested_field_is_a_decode_error() {
        let fields = vec![
            ("id".to_string(), "1".to_string()),
            ("score".to_string(), "1".to_string()),
            ("active".to_string(), "1".to_string()),
            ("role".to_string(), "admin".to_string()),
            ("tags".to_string(), r#"["a"] trailing-garbage"#.to_string()),
        ];
        let err = unflatten::<Account>(fields).unwrap_err();
        assert!(matches!(err, CacheError::Decode(_)));

        let fields = vec![("tags".to_string(), r#" ["a"] "#.to_string())];
        let tagged: HashMap<String, Vec<String>> = unflatten(fields).unwrap();
        assert_eq!(tagged["tags"], vec!["a".to_string()]);
    }

    #[test]
    fn wide_integers_survive_flatten_and_unflatten() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Totals {
            signed: i128,
            unsigned: u128,
        }

        let totals = Totals {
            signed: -5,
            unsigned: 5,
        };
        let fields = flatten(&totals).unwrap();
        assert_eq!(field(&fields, "signed"), Some("-5"));
        assert_eq!(field(&fields, "unsigned"), Some("5"));
        assert_eq!(unflatten::<Totals>(fields).unwrap(), totals);
    }
}
