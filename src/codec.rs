//! Conversion between host [`Value`]s and tagged wire [`Field`]s.

use crate::{
    wire::{ArrayValue, Field, TypeHint},
    DataApiError, Result, Value,
};

pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
pub(crate) const TIME_FORMAT: &str = "%H:%M:%S%.6f";
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

/// Encodes one host value.
///
/// Typed variants become a `stringValue` plus the matching [`TypeHint`].
/// An empty array encodes as `isNull`, the same as [`Value::Null`].
pub fn encode_value(value: Value) -> Result<(Field, Option<TypeHint>)> {
    let encoded = match value {
        Value::Bool(value) => (Field::BooleanValue(value), None),
        Value::String(value) => (Field::StringValue(value), None),
        Value::Long(value) => (Field::LongValue(value), None),
        Value::Double(value) => (Field::DoubleValue(finite(value)?), None),
        Value::Bytes(value) => (Field::BlobValue(value), None),
        Value::Null => (Field::IsNull(true), None),
        Value::Decimal(value) => (
            Field::StringValue(value.to_string()),
            Some(TypeHint::Decimal),
        ),
        Value::Timestamp(value) => (
            Field::StringValue(value.format(TIMESTAMP_FORMAT).to_string()),
            Some(TypeHint::Timestamp),
        ),
        Value::Time(value) => (
            Field::StringValue(value.format(TIME_FORMAT).to_string()),
            Some(TypeHint::Time),
        ),
        Value::Date(value) => (
            Field::StringValue(value.format(DATE_FORMAT).to_string()),
            Some(TypeHint::Date),
        ),
        Value::Array(items) if items.is_empty() => (Field::IsNull(true), None),
        Value::Array(items) => (Field::ArrayValue(encode_array(items)?), None),
        Value::Other(text) => (Field::StringValue(text), None),
    };
    Ok(encoded)
}

/// Encodes a non-empty array, choosing the values key from the first element.
///
/// Nested arrays recurse; every element must share the first element's kind.
pub fn encode_array(items: Vec<Value>) -> Result<ArrayValue> {
    let Some(first) = items.first() else {
        return Err(DataApiError::UnsupportedType(
            "empty nested array".to_owned(),
        ));
    };

    match first {
        Value::Array(_) => items
            .into_iter()
            .map(|item| match item {
                Value::Array(inner) => encode_array(inner).map(Field::ArrayValue),
                other => Err(mixed_array("array", &other)),
            })
            .collect::<Result<Vec<_>>>()
            .map(ArrayValue::ArrayValues),
        Value::Bool(_) => homogeneous(items, "bool", |item| match item {
            Value::Bool(value) => Ok(value),
            other => Err(other),
        })
        .map(ArrayValue::BooleanValues),
        Value::String(_) => homogeneous(items, "string", |item| match item {
            Value::String(value) => Ok(value),
            other => Err(other),
        })
        .map(ArrayValue::StringValues),
        Value::Long(_) => homogeneous(items, "long", |item| match item {
            Value::Long(value) => Ok(value),
            other => Err(other),
        })
        .map(ArrayValue::LongValues),
        Value::Double(_) => homogeneous(items, "double", |item| match item {
            Value::Double(value) => Ok(value),
            other => Err(other),
        })?
        .into_iter()
        .map(finite)
        .collect::<Result<Vec<_>>>()
        .map(ArrayValue::DoubleValues),
        Value::Bytes(_) => homogeneous(items, "bytes", |item| match item {
            Value::Bytes(value) => Ok(value),
            other => Err(other),
        })
        .map(ArrayValue::BlobValues),
        other => Err(DataApiError::UnsupportedType(format!(
            "no array encoding for {} elements",
            other.kind()
        ))),
    }
}

/// Decodes one wire cell. Type hints are not consulted.
pub fn decode_value(field: Field) -> Value {
    match field {
        Field::IsNull(_) => Value::Null,
        Field::BooleanValue(value) => Value::Bool(value),
        Field::LongValue(value) => Value::Long(value),
        Field::DoubleValue(value) => Value::Double(value),
        Field::StringValue(value) => Value::String(value),
        Field::BlobValue(value) => Value::Bytes(value),
        Field::ArrayValue(array) => decode_array(array),
    }
}

fn decode_array(array: ArrayValue) -> Value {
    let items = match array {
        ArrayValue::BooleanValues(values) => values.into_iter().map(Value::Bool).collect(),
        ArrayValue::LongValues(values) => values.into_iter().map(Value::Long).collect(),
        ArrayValue::DoubleValues(values) => values.into_iter().map(Value::Double).collect(),
        ArrayValue::StringValues(values) => values.into_iter().map(Value::String).collect(),
        ArrayValue::BlobValues(values) => values.into_iter().map(Value::Bytes).collect(),
        ArrayValue::ArrayValues(nested) => nested.into_iter().map(decode_value).collect(),
    };
    Value::Array(items)
}

fn homogeneous<T, F>(items: Vec<Value>, kind: &'static str, extract: F) -> Result<Vec<T>>
where
    F: Fn(Value) -> std::result::Result<T, Value>,
{
    items
        .into_iter()
        .map(|item| extract(item).map_err(|other| mixed_array(kind, &other)))
        .collect()
}

fn mixed_array(expected: &str, found: &Value) -> DataApiError {
    DataApiError::UnsupportedType(format!(
        "array of {expected} values contains a {} element",
        found.kind()
    ))
}

fn finite(value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DataApiError::UnsupportedType(format!(
            "non-finite double value '{value}'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};
    use rust_decimal::Decimal;
    use serde_json::json;

    use crate::{
        codec::{decode_value, encode_array, encode_value},
        wire::{ArrayValue, Field, TypeHint},
        DataApiError, Value,
    };

    fn encoded_json(value: Value) -> serde_json::Value {
        let (field, _) = encode_value(value).expect("must encode");
        serde_json::to_value(field).expect("must serialize")
    }

    #[test]
    fn scalars_round_trip() {
        for value in [
            Value::Bool(true),
            Value::Bool(false),
            Value::string("str"),
            Value::Long(i64::MIN),
            Value::Double(1.23),
            Value::bytes(b"bytes".to_vec()),
            Value::Null,
        ] {
            let (field, hint) = encode_value(value.clone()).expect("must encode");
            assert!(hint.is_none());
            assert_eq!(decode_value(field), value);
        }
    }

    #[test]
    fn empty_array_encodes_as_null() {
        assert_eq!(encoded_json(Value::Array(vec![])), json!({"isNull": true}));
        assert_eq!(encoded_json(Value::Null), json!({"isNull": true}));
    }

    #[test]
    fn flat_arrays_pick_values_key_from_first_element() {
        assert_eq!(
            encoded_json(Value::array([1_i64, 2, 3])),
            json!({"arrayValue": {"longValues": [1, 2, 3]}})
        );
        assert_eq!(
            encoded_json(Value::array([1.23, 4.56])),
            json!({"arrayValue": {"doubleValues": [1.23, 4.56]}})
        );
        assert_eq!(
            encoded_json(Value::array([true, false])),
            json!({"arrayValue": {"booleanValues": [true, false]}})
        );
        assert_eq!(
            encoded_json(Value::array(["str", "string"])),
            json!({"arrayValue": {"stringValues": ["str", "string"]}})
        );
    }

    #[test]
    fn blob_arrays_travel_as_base64() {
        let value = Value::array([b"bytes".to_vec(), b"blob".to_vec()]);
        assert_eq!(
            encoded_json(value.clone()),
            json!({"arrayValue": {"blobValues": ["Ynl0ZXM=", "YmxvYg=="]}})
        );

        let (field, hint) = encode_value(value.clone()).expect("must encode");
        assert!(hint.is_none());
        assert_eq!(
            field,
            Field::ArrayValue(ArrayValue::BlobValues(vec![
                b"bytes".to_vec(),
                b"blob".to_vec()
            ]))
        );
        assert_eq!(decode_value(field), value);
    }

    #[test]
    fn nested_arrays_recurse() {
        let value = Value::array([Value::array([1_i64, 2]), Value::array([3_i64])]);
        assert_eq!(
            encoded_json(value.clone()),
            json!({"arrayValue": {"arrayValues": [
                {"arrayValue": {"longValues": [1, 2]}},
                {"arrayValue": {"longValues": [3]}}
            ]}})
        );

        let (field, _) = encode_value(value.clone()).expect("must encode");
        assert_eq!(decode_value(field), value);
    }

    #[test]
    fn typed_values_carry_type_hints() {
        let decimal = Decimal::from(123_456_789_i64);
        let (field, hint) = encode_value(Value::Decimal(decimal)).expect("must encode");
        assert_eq!(field, Field::StringValue("123456789".to_owned()));
        assert_eq!(hint, Some(TypeHint::Decimal));

        let timestamp = NaiveDate::from_ymd_opt(2020, 1, 2)
            .and_then(|date| date.and_hms_micro_opt(3, 4, 5, 678_912))
            .expect("valid timestamp");
        let (field, hint) = encode_value(Value::Timestamp(timestamp)).expect("must encode");
        assert_eq!(
            field,
            Field::StringValue("2020-01-02 03:04:05.678912".to_owned())
        );
        assert_eq!(hint, Some(TypeHint::Timestamp));

        let time = NaiveTime::from_hms_micro_opt(3, 4, 5, 678_912).expect("valid time");
        let (field, hint) = encode_value(Value::Time(time)).expect("must encode");
        assert_eq!(field, Field::StringValue("03:04:05.678912".to_owned()));
        assert_eq!(hint, Some(TypeHint::Time));

        let date = NaiveDate::from_ymd_opt(2020, 1, 2).expect("valid date");
        let (field, hint) = encode_value(Value::Date(date)).expect("must encode");
        assert_eq!(field, Field::StringValue("2020-01-02".to_owned()));
        assert_eq!(hint, Some(TypeHint::Date));
    }

    #[test]
    fn whole_second_timestamp_keeps_six_fraction_digits() {
        let timestamp = NaiveDate::from_ymd_opt(2021, 12, 31)
            .and_then(|date| date.and_hms_opt(23, 59, 0))
            .expect("valid timestamp");
        let (field, _) = encode_value(Value::Timestamp(timestamp)).expect("must encode");
        assert_eq!(
            field,
            Field::StringValue("2021-12-31 23:59:00.000000".to_owned())
        );
    }

    #[test]
    fn other_values_fall_back_to_string() {
        let (field, hint) = encode_value(Value::other("Dummy")).expect("must encode");
        assert_eq!(field, Field::StringValue("Dummy".to_owned()));
        assert!(hint.is_none());
    }

    #[test]
    fn array_of_unsupported_elements_fails() {
        let err = encode_array(vec![Value::other("Dummy")]).expect_err("must fail");
        assert!(matches!(err, DataApiError::UnsupportedType(_)));

        let err = encode_array(vec![Value::Null]).expect_err("must fail");
        assert!(matches!(err, DataApiError::UnsupportedType(_)));
    }

    #[test]
    fn mixed_flat_array_fails() {
        let err = encode_array(vec![Value::Long(1), Value::string("two")]).expect_err("must fail");
        assert!(matches!(err, DataApiError::UnsupportedType(_)));
    }

    #[test]
    fn non_finite_double_fails() {
        let err = encode_value(Value::Double(f64::NAN)).expect_err("must fail");
        assert!(matches!(err, DataApiError::UnsupportedType(_)));
    }

    #[test]
    fn decode_flat_array_is_untyped() {
        let field = Field::ArrayValue(ArrayValue::StringValues(vec![
            "str".to_owned(),
            "string".to_owned(),
        ]));
        assert_eq!(decode_value(field), Value::array(["str", "string"]));
    }
}
