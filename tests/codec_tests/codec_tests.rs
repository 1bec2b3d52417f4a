//! Tests for the record codec
//!
//! These tests verify:
//! - Records lower to flat documents and rebuild losslessly
//! - Nested data is rejected at encode time
//! - Stored bytes carry a bucket tag that is checked on decode
//! - The total order of values (class first, exact numeric comparison)
//! - Timestamp arithmetic and RFC 3339 formatting

use std::cmp::Ordering;
use std::time::Duration;

use atlasdb::codec::{self, decode_document, encode_document, from_document, to_document, to_value};
use atlasdb::{AtlasError, Document, ErrorKind, Timestamp, Value};
use serde::{Deserialize, Serialize};

// =============================================================================
// Fixtures
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Meal {
    Breakfast,
    Lunch,
    Dinner,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Entry {
    id: u64,
    date: Timestamp,
    calories: i32,
    food: String,
    meal: Meal,
    note: Option<String>,
    verified: bool,
}

fn sample_entry() -> Entry {
    Entry {
        id: 7,
        date: Timestamp::from_unix_seconds(1_700_000_000),
        calories: 300,
        food: "bread".to_string(),
        meal: Meal::Lunch,
        note: None,
        verified: true,
    }
}

// =============================================================================
// Document Tests
// =============================================================================

#[test]
fn test_to_document_flattens_fields() {
    let document = to_document(&sample_entry()).unwrap();

    assert_eq!(document.len(), 7);
    assert_eq!(document.get("id"), Some(&Value::Int(7)));
    assert_eq!(document.get("calories"), Some(&Value::Int(300)));
    assert_eq!(document.get("food"), Some(&Value::from("bread")));
    assert_eq!(document.get("meal"), Some(&Value::from("Lunch")));
    assert_eq!(document.get("note"), Some(&Value::Null));
    assert_eq!(document.get("verified"), Some(&Value::Bool(true)));
    assert_eq!(
        document.get("date"),
        Some(&Value::Time(Timestamp::from_unix_seconds(1_700_000_000)))
    );
}

#[test]
fn test_document_round_trip() {
    let entry = Entry {
        note: Some("toasted".to_string()),
        meal: Meal::Dinner,
        ..sample_entry()
    };

    let document = to_document(&entry).unwrap();
    let decoded: Entry = from_document(document).unwrap();

    assert_eq!(decoded, entry);
}

#[test]
fn test_absent_value_reads_as_null() {
    let document = to_document(&sample_entry()).unwrap();

    assert_eq!(document.get("missing"), None);
    assert!(document.value("missing").is_null());
}

#[test]
fn test_missing_optional_field_decodes_as_none() {
    let full = to_document(&sample_entry()).unwrap();
    let document: Document = full
        .iter()
        .filter(|(name, _)| *name != "note")
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect();

    let decoded: Entry = from_document(document).unwrap();
    assert_eq!(decoded.note, None);
}

#[test]
fn test_large_unsigned_values_survive() {
    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Counter {
        id: u64,
        total: u64,
    }

    let counter = Counter {
        id: 1,
        total: u64::MAX,
    };
    let document = to_document(&counter).unwrap();
    assert_eq!(document.get("total"), Some(&Value::UInt(u64::MAX)));

    let decoded: Counter = from_document(document).unwrap();
    assert_eq!(decoded, counter);
}

#[test]
fn test_nested_fields_are_rejected() {
    #[derive(Serialize)]
    struct Nested {
        id: u64,
        tags: Vec<String>,
    }

    let err = to_document(&Nested {
        id: 1,
        tags: vec!["a".to_string()],
    })
    .unwrap_err();

    assert!(matches!(err, AtlasError::Encoding(_)));
    assert_eq!(err.kind(), ErrorKind::Encoding);
}

#[test]
fn test_non_record_top_level_is_rejected() {
    let err = to_document(&42u32).unwrap_err();
    assert!(matches!(err, AtlasError::Encoding(_)));
}

#[test]
fn test_to_value_scalars() {
    assert_eq!(to_value(&5u8).unwrap(), Value::Int(5));
    assert_eq!(to_value(&-3i64).unwrap(), Value::Int(-3));
    assert_eq!(to_value("x").unwrap(), Value::from("x"));
    assert_eq!(to_value(&None::<i32>).unwrap(), Value::Null);
}

// =============================================================================
// Envelope Tests
// =============================================================================

#[test]
fn test_encode_decode_with_bucket_tag() {
    let entry = sample_entry();
    let bytes = codec::encode("Entry", &entry).unwrap();

    let decoded: Entry = codec::decode("Entry", &bytes).unwrap();
    assert_eq!(decoded, entry);
}

#[test]
fn test_decode_rejects_other_bucket() {
    let document = to_document(&sample_entry()).unwrap();
    let bytes = encode_document("Entry", &document).unwrap();

    let err = decode_document("Weight", &bytes).unwrap_err();
    assert!(matches!(err, AtlasError::Decoding(_)));
    assert_eq!(err.kind(), ErrorKind::Decoding);
}

#[test]
fn test_decode_rejects_garbage() {
    let err = decode_document("Entry", &[0xff, 0x01]).unwrap_err();
    assert!(matches!(err, AtlasError::Decoding(_)));
}

#[test]
fn test_decode_into_wrong_shape_fails() {
    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Strict {
        id: u64,
        food: u32,
    }

    let document = to_document(&sample_entry()).unwrap();
    let result: Result<Strict, _> = from_document(document);
    assert!(matches!(result, Err(AtlasError::Decoding(_))));
}

// =============================================================================
// Value Ordering Tests
// =============================================================================

#[test]
fn test_value_classes_order_first() {
    let ordered = vec![
        Value::Null,
        Value::Bool(true),
        Value::Int(i64::MAX),
        Value::from("a"),
        Value::Bytes(vec![0]),
        Value::Time(Timestamp::from_unix_nanos(i64::MIN)),
    ];

    for pair in ordered.windows(2) {
        assert_eq!(pair[0].cmp(&pair[1]), Ordering::Less, "{} < {}", pair[0], pair[1]);
    }
}

#[test]
fn test_numbers_compare_exactly_across_representations() {
    assert_eq!(Value::Int(3), Value::Float(3.0));
    assert!(Value::Int(3) < Value::Float(3.5));
    assert!(Value::Float(-0.5) < Value::Int(0));
    assert!(Value::Int(i64::MAX) < Value::UInt(u64::MAX));
    assert!(Value::UInt(u64::MAX) < Value::Float(1.0e30));
    assert!(Value::Int(-1) > Value::Float(f64::NEG_INFINITY));
}

#[test]
fn test_nan_sorts_above_every_number() {
    let nan = Value::Float(f64::NAN);

    assert!(nan > Value::Float(f64::INFINITY));
    assert!(nan > Value::UInt(u64::MAX));
    assert_eq!(nan, Value::Float(f64::NAN));
    assert!(nan < Value::from("a"));
}

#[test]
fn test_as_key() {
    assert_eq!(Value::Null.as_key(), Some(None));
    assert_eq!(Value::Int(0).as_key(), Some(None));
    assert_eq!(Value::Int(12).as_key(), Some(Some(12)));
    assert_eq!(Value::UInt(u64::MAX).as_key(), Some(Some(u64::MAX)));
    assert_eq!(Value::Int(-4).as_key(), None);
    assert_eq!(Value::from("1").as_key(), None);
}

// =============================================================================
// Timestamp Tests
// =============================================================================

#[test]
fn test_timestamp_arithmetic() {
    let base = Timestamp::from_unix_seconds(86_400 * 10);

    assert_eq!(base.add_days(-2).unix_seconds(), 86_400 * 8);
    assert_eq!(base.add_seconds(30).unix_seconds(), 86_400 * 10 + 30);
    assert_eq!(base.after(Duration::from_millis(1500)).unix_nanos(), base.unix_nanos() + 1_500_000_000);
    assert_eq!(base.before(Duration::from_secs(1)).unix_seconds(), 86_400 * 10 - 1);
    assert!(base.add_days(-1) < base);
}

#[test]
fn test_timestamp_rfc3339() {
    let epoch = Timestamp::from_unix_seconds(0);
    assert_eq!(epoch.to_string(), "1970-01-01T00:00:00Z");

    let parsed = Timestamp::parse_rfc3339("2024-05-01T12:00:00Z").unwrap();
    assert_eq!(parsed.unix_seconds(), 1_714_564_800);

    assert!(Timestamp::parse_rfc3339("yesterday").is_none());
}

#[test]
fn test_timestamp_survives_bincode_inside_value() {
    let value = Value::Time(Timestamp::from_unix_nanos(1_234_567_891));
    let bytes = bincode::serialize(&value).unwrap();
    let decoded: Value = bincode::deserialize(&bytes).unwrap();
    assert_eq!(decoded, value);
}
