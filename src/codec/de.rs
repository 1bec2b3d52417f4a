//! Document → record deserializer

use serde::de::value::{I64Deserializer, MapDeserializer, StringDeserializer};
use serde::de::{self, DeserializeOwned, IntoDeserializer, Visitor};
use serde::forward_to_deserialize_any;

use crate::error::{AtlasError, Result};

use super::value::TIMESTAMP_TOKEN;
use super::{Document, Value};

/// Rebuild a typed record from its document form
pub fn from_document<T: DeserializeOwned>(document: Document) -> Result<T> {
    T::deserialize(DocumentDeserializer { document })
}

struct DocumentDeserializer {
    document: Document,
}

impl<'de> de::Deserializer<'de> for DocumentDeserializer {
    type Error = AtlasError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let entries = self.document.into_fields().into_iter();
        let mut map: MapDeserializer<'de, _, AtlasError> = MapDeserializer::new(entries);
        let value = visitor.visit_map(&mut map)?;
        map.end()?;
        Ok(value)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct seq tuple
        tuple_struct map struct enum identifier ignored_any
    }
}

impl<'de> IntoDeserializer<'de, AtlasError> for Value {
    type Deserializer = ValueDeserializer;

    fn into_deserializer(self) -> ValueDeserializer {
        ValueDeserializer { value: self }
    }
}

/// Deserializer over a single field value
pub struct ValueDeserializer {
    value: Value,
}

impl<'de> de::Deserializer<'de> for ValueDeserializer {
    type Error = AtlasError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.value {
            Value::Null => visitor.visit_unit(),
            Value::Bool(b) => visitor.visit_bool(b),
            Value::Int(i) => visitor.visit_i64(i),
            Value::UInt(u) => visitor.visit_u64(u),
            Value::Float(f) => visitor.visit_f64(f),
            Value::Str(s) => visitor.visit_string(s),
            Value::Bytes(b) => visitor.visit_byte_buf(b),
            Value::Time(t) => visitor.visit_i64(t.unix_nanos()),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.value {
            Value::Null => visitor.visit_none(),
            other => visitor.visit_some(ValueDeserializer { value: other }),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        match self.value {
            Value::Time(t) => {
                let nanos: I64Deserializer<AtlasError> = t.unix_nanos().into_deserializer();
                visitor.visit_newtype_struct(nanos)
            }
            other if name == TIMESTAMP_TOKEN => Err(AtlasError::Decoding(format!(
                "Expected a timestamp, found {}",
                other
            ))),
            other => visitor.visit_newtype_struct(ValueDeserializer { value: other }),
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        match self.value {
            Value::Str(variant) => {
                let variant: StringDeserializer<AtlasError> = variant.into_deserializer();
                visitor.visit_enum(variant)
            }
            other => Err(AtlasError::Decoding(format!(
                "Expected an enum variant name, found {}",
                other
            ))),
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.value {
            Value::Null => visitor.visit_unit(),
            other => Err(AtlasError::Decoding(format!("Expected unit, found {}", other))),
        }
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit_struct seq tuple
        tuple_struct map struct identifier ignored_any
    }
}
