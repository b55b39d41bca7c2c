use std::sync::Arc;

use crate::{
    codec::decode_value,
    wire::{ColumnMetadata, Field},
    DataApiError, Result, Value,
};

/// Per-column hook applied to each decoded cell.
///
/// Lets a caller that knows a column's declared type turn the primitive
/// decoded value into a richer one.
pub type ColumnProcessor = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Decodes a row matrix cell by cell.
pub fn decode_records(rows: &[Vec<Field>]) -> Vec<Vec<Value>> {
    rows.iter()
        .map(|row| row.iter().cloned().map(decode_value).collect())
        .collect()
}

/// Decodes a row matrix, applying `processors` column by column when given.
pub fn decode_rows(
    rows: &[Vec<Field>],
    processors: Option<&[ColumnProcessor]>,
) -> Result<Vec<Vec<Value>>> {
    let Some(processors) = processors else {
        return Ok(decode_records(rows));
    };
    rows.iter()
        .enumerate()
        .map(|(row_index, row)| {
            if processors.len() != row.len() {
                return Err(DataApiError::Decode(format!(
                    "row {row_index} has {} columns but {} processors were supplied",
                    row.len(),
                    processors.len()
                )));
            }
            Ok(row
                .iter()
                .cloned()
                .zip(processors)
                .map(|(field, process)| process(decode_value(field)))
                .collect())
        })
        .collect()
}

/// Column labels in metadata order.
pub fn extract_headers(metadata: &[ColumnMetadata]) -> Vec<String> {
    metadata.iter().map(|column| column.label.clone()).collect()
}

pub fn extract_generated_fields(fields: &[Field]) -> Vec<Value> {
    fields.iter().cloned().map(decode_value).collect()
}

/// Stock [`ColumnProcessor`]s.
///
/// Each re-parses a [`Value::String`] in the wire's literal format and
/// leaves any other or unparseable value untouched.
pub mod processors {
    use std::sync::Arc;

    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
    use rust_decimal::Decimal;

    use super::ColumnProcessor;
    use crate::{
        codec::{DATE_FORMAT, TIMESTAMP_FORMAT, TIME_FORMAT},
        Value,
    };

    pub fn identity() -> ColumnProcessor {
        Arc::new(|value: Value| value)
    }

    /// `YYYY-MM-DD HH:MM:SS[.ffffff]` into [`Value::Timestamp`].
    pub fn timestamp() -> ColumnProcessor {
        from_string(|text| {
            NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
                .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
                .ok()
                .map(Value::Timestamp)
        })
    }

    pub fn date() -> ColumnProcessor {
        from_string(|text| {
            NaiveDate::parse_from_str(text, DATE_FORMAT)
                .ok()
                .map(Value::Date)
        })
    }

    pub fn time() -> ColumnProcessor {
        from_string(|text| {
            NaiveTime::parse_from_str(text, TIME_FORMAT)
                .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M:%S%.f"))
                .ok()
                .map(Value::Time)
        })
    }

    pub fn decimal() -> ColumnProcessor {
        from_string(|text| text.parse::<Decimal>().ok().map(Value::Decimal))
    }

    fn from_string(parse: fn(&str) -> Option<Value>) -> ColumnProcessor {
        Arc::new(move |value: Value| match value {
            Value::String(text) => parse(&text).unwrap_or(Value::String(text)),
            other => other,
        })
    }
}
