//! Record → Document serializer
//!
//! A record must serialize as a struct (or a string-keyed map) whose fields
//! are flat: primitives, strings, bytes, options, unit enum variants,
//! newtype wrappers and timestamps. Anything nested is rejected with
//! [`AtlasError::Encoding`].

use serde::ser::{self, Impossible, Serialize};

use crate::error::{AtlasError, Result};

use super::value::TIMESTAMP_TOKEN;
use super::{Document, Timestamp, Value};

/// Serialize a record into its document form
pub fn to_document<T: Serialize + ?Sized>(record: &T) -> Result<Document> {
    record.serialize(DocumentSerializer)
}

/// Serialize a single value (matcher operands, index probes)
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    value.serialize(FieldSerializer)
}

fn unsupported(what: &str) -> AtlasError {
    AtlasError::Encoding(format!("Unsupported field type: {}", what))
}

fn not_a_record(what: &str) -> AtlasError {
    AtlasError::Encoding(format!(
        "Records must serialize as a struct or string-keyed map, got {}",
        what
    ))
}

// =============================================================================
// Top level: struct or map
// =============================================================================

struct DocumentSerializer;

macro_rules! reject_top_level {
    ($($method:ident($($arg:ty),*) => $what:expr;)*) => {$(
        fn $method(self, $(_: $arg),*) -> Result<Document> {
            Err(not_a_record($what))
        }
    )*};
}

impl ser::Serializer for DocumentSerializer {
    type Ok = Document;
    type Error = AtlasError;

    type SerializeSeq = Impossible<Document, AtlasError>;
    type SerializeTuple = Impossible<Document, AtlasError>;
    type SerializeTupleStruct = Impossible<Document, AtlasError>;
    type SerializeTupleVariant = Impossible<Document, AtlasError>;
    type SerializeMap = MapSerializer;
    type SerializeStruct = StructSerializer;
    type SerializeStructVariant = Impossible<Document, AtlasError>;

    reject_top_level! {
        serialize_bool(bool) => "bool";
        serialize_i8(i8) => "integer";
        serialize_i16(i16) => "integer";
        serialize_i32(i32) => "integer";
        serialize_i64(i64) => "integer";
        serialize_u8(u8) => "integer";
        serialize_u16(u16) => "integer";
        serialize_u32(u32) => "integer";
        serialize_u64(u64) => "integer";
        serialize_f32(f32) => "float";
        serialize_f64(f64) => "float";
        serialize_char(char) => "char";
        serialize_str(&str) => "string";
        serialize_bytes(&[u8]) => "bytes";
        serialize_none() => "none";
        serialize_unit() => "unit";
        serialize_unit_struct(&'static str) => "unit struct";
        serialize_unit_variant(&'static str, u32, &'static str) => "enum";
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<Document> {
        value.serialize(self)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Document> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<Document> {
        Err(not_a_record("enum"))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        Err(not_a_record("sequence"))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        Err(not_a_record("tuple"))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Err(not_a_record("tuple struct"))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(not_a_record("enum"))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Ok(MapSerializer {
            document: Document::new(),
            pending_key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        Ok(StructSerializer {
            document: Document::new(),
        })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(not_a_record("enum"))
    }
}

pub(crate) struct StructSerializer {
    document: Document,
}

impl ser::SerializeStruct for StructSerializer {
    type Ok = Document;
    type Error = AtlasError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, key: &'static str, value: &T) -> Result<()> {
        let value = value
            .serialize(FieldSerializer)
            .map_err(|e| field_error(key, e))?;
        self.document.insert(key, value);
        Ok(())
    }

    fn end(self) -> Result<Document> {
        Ok(self.document)
    }
}

pub(crate) struct MapSerializer {
    document: Document,
    pending_key: Option<String>,
}

impl ser::SerializeMap for MapSerializer {
    type Ok = Document;
    type Error = AtlasError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<()> {
        match key.serialize(FieldSerializer)? {
            Value::Str(name) => {
                self.pending_key = Some(name);
                Ok(())
            }
            other => Err(AtlasError::Encoding(format!(
                "Record map keys must be strings, got {}",
                other
            ))),
        }
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| AtlasError::Encoding("Map value without a key".to_string()))?;
        let value = value
            .serialize(FieldSerializer)
            .map_err(|e| field_error(&key, e))?;
        self.document.insert(key, value);
        Ok(())
    }

    fn end(self) -> Result<Document> {
        Ok(self.document)
    }
}

fn field_error(field: &str, err: AtlasError) -> AtlasError {
    match err {
        AtlasError::Encoding(msg) => AtlasError::Encoding(format!("field '{}': {}", field, msg)),
        other => other,
    }
}

// =============================================================================
// Field level: flat values only
// =============================================================================

struct FieldSerializer;

impl ser::Serializer for FieldSerializer {
    type Ok = Value;
    type Error = AtlasError;

    type SerializeSeq = Impossible<Value, AtlasError>;
    type SerializeTuple = Impossible<Value, AtlasError>;
    type SerializeTupleStruct = Impossible<Value, AtlasError>;
    type SerializeTupleVariant = Impossible<Value, AtlasError>;
    type SerializeMap = Impossible<Value, AtlasError>;
    type SerializeStruct = Impossible<Value, AtlasError>;
    type SerializeStructVariant = Impossible<Value, AtlasError>;

    fn serialize_bool(self, v: bool) -> Result<Value> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value> {
        Ok(Value::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<Value> {
        Ok(Value::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<Value> {
        Ok(Value::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<Value> {
        Ok(Value::from(v))
    }

    fn serialize_i128(self, v: i128) -> Result<Value> {
        if let Ok(i) = i64::try_from(v) {
            Ok(Value::Int(i))
        } else if let Ok(u) = u64::try_from(v) {
            Ok(Value::UInt(u))
        } else {
            Err(unsupported("i128 outside the 64-bit range"))
        }
    }

    fn serialize_u8(self, v: u8) -> Result<Value> {
        Ok(Value::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<Value> {
        Ok(Value::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<Value> {
        Ok(Value::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<Value> {
        Ok(Value::from(v))
    }

    fn serialize_u128(self, v: u128) -> Result<Value> {
        u64::try_from(v)
            .map(Value::from)
            .map_err(|_| unsupported("u128 outside the 64-bit range"))
    }

    fn serialize_f32(self, v: f32) -> Result<Value> {
        Ok(Value::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<Value> {
        Ok(Value::Float(v))
    }

    fn serialize_char(self, v: char) -> Result<Value> {
        Ok(Value::Str(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value> {
        Ok(Value::Str(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value> {
        Ok(Value::Bytes(v.to_vec()))
    }

    fn serialize_none(self) -> Result<Value> {
        Ok(Value::Null)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<Value> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<Value> {
        Ok(Value::Str(variant.to_string()))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<Value> {
        let inner = value.serialize(self)?;
        if name != TIMESTAMP_TOKEN {
            return Ok(inner);
        }
        match inner {
            Value::Int(nanos) => Ok(Value::Time(Timestamp::from_unix_nanos(nanos))),
            other => Err(AtlasError::Encoding(format!(
                "Malformed timestamp payload: {}",
                other
            ))),
        }
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<Value> {
        Err(unsupported("enum variant with data"))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        Err(unsupported("sequence"))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        Err(unsupported("tuple"))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Err(unsupported("tuple struct"))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(unsupported("enum variant with data"))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Err(unsupported("map"))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        Err(unsupported("nested struct"))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(unsupported("enum variant with data"))
    }
}
