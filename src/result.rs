use std::{
    fmt,
    ops::{Bound, Index, Range, RangeBounds},
    sync::{Arc, OnceLock},
};

use serde::de::DeserializeOwned;

use crate::{
    decode::{
        decode_records, decode_rows, extract_generated_fields, extract_headers, ColumnProcessor,
    },
    wire::{ColumnMetadata, ExecuteStatementResponse, Field, UpdateResult},
    DataApiError, Result, Value,
};

/// One decoded row together with its result set's column labels.
///
/// Iterating a `Record` through [`Iterator`] consumes an internal cursor;
/// use [`Record::iter`] for repeatable iteration.
#[derive(Clone, Debug)]
pub struct Record {
    values: Vec<Value>,
    headers: Arc<[String]>,
    position: usize,
}

impl Record {
    pub fn new(values: Vec<Value>, headers: impl Into<Arc<[String]>>) -> Self {
        Self {
            values,
            headers: headers.into(),
            position: 0,
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Returns a value by case-insensitive column label.
    pub fn get_named(&self, name: &str) -> Option<&Value> {
        let index = self
            .headers
            .iter()
            .position(|header| header.eq_ignore_ascii_case(name))?;
        self.values.get(index)
    }

    /// Positional slice, clamped to the row length.
    pub fn slice(&self, range: impl RangeBounds<usize>) -> &[Value] {
        &self.values[clamp(range, self.values.len())]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.values.iter()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Pairs headers with values in column order. Extra values beyond the
    /// header list are dropped.
    pub fn to_dict(&self) -> Vec<(String, Value)> {
        self.headers
            .iter()
            .cloned()
            .zip(self.values.iter().cloned())
            .collect()
    }

    /// Deserializes the record into `T`, matching fields to column labels.
    pub fn to_model<T: DeserializeOwned>(&self) -> Result<T> {
        let object = self
            .to_dict()
            .into_iter()
            .map(|(header, value)| serde_json::to_value(value).map(|value| (header, value)))
            .collect::<serde_json::Result<serde_json::Map<_, _>>>()
            .map_err(|err| DataApiError::ModelMapping(err.to_string()))?;
        serde_json::from_value(serde_json::Value::Object(object))
            .map_err(|err| DataApiError::ModelMapping(err.to_string()))
    }
}

impl Iterator for Record {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        let value = self.values.get(self.position)?.clone();
        self.position += 1;
        Some(value)
    }
}

impl Index<usize> for Record {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.values[index]
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl PartialEq<[Value]> for Record {
    fn eq(&self, other: &[Value]) -> bool {
        self.values == other
    }
}

impl PartialEq<Vec<Value>> for Record {
    fn eq(&self, other: &Vec<Value>) -> bool {
        &self.values == other
    }
}

impl<const N: usize> PartialEq<[Value; N]> for Record {
    fn eq(&self, other: &[Value; N]) -> bool {
        self.values == other
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Record(")?;
        for (index, (header, value)) in self.headers.iter().zip(&self.values).enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{header}={value}")?;
        }
        f.write_str(")")
    }
}

/// Server-generated values (e.g. auto-increment keys) for one statement.
#[derive(Clone, Debug, Default)]
pub struct GeneratedFields {
    raw: Vec<Field>,
    decoded: OnceLock<Vec<Value>>,
}

impl GeneratedFields {
    pub fn new(raw: Vec<Field>) -> Self {
        Self {
            raw,
            decoded: OnceLock::new(),
        }
    }

    pub fn raw(&self) -> &[Field] {
        &self.raw
    }

    pub fn values(&self) -> &[Value] {
        self.decoded.get_or_init(|| extract_generated_fields(&self.raw))
    }

    pub fn first(&self) -> Option<&Value> {
        self.values().first()
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

impl PartialEq for GeneratedFields {
    fn eq(&self, other: &Self) -> bool {
        self.values() == other.values()
    }
}

impl PartialEq<[Value]> for GeneratedFields {
    fn eq(&self, other: &[Value]) -> bool {
        self.values() == other
    }
}

impl PartialEq<Vec<Value>> for GeneratedFields {
    fn eq(&self, other: &Vec<Value>) -> bool {
        self.values() == other.as_slice()
    }
}

impl fmt::Display for GeneratedFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("GeneratedFields(")?;
        for (index, value) in self.values().iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str(")")
    }
}

/// Decoded view over one execute-statement response.
///
/// Rows and headers are decoded on first access and cached.
#[derive(Clone)]
pub struct QueryResult {
    response: ExecuteStatementResponse,
    rows: OnceLock<Vec<Vec<Value>>>,
    headers: OnceLock<Arc<[String]>>,
    generated: GeneratedFields,
    cursor: usize,
}

impl fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryResult")
            .field("response", &self.response)
            .field("cursor", &self.cursor)
            .finish()
    }
}

impl QueryResult {
    pub fn new(response: ExecuteStatementResponse) -> Self {
        let generated = GeneratedFields::new(response.generated_fields.clone());
        Self {
            response,
            rows: OnceLock::new(),
            headers: OnceLock::new(),
            generated,
            cursor: 0,
        }
    }

    /// Decodes the rows through per-column processors, once. Fails when their
    /// count differs from the column count reported in the metadata.
    pub fn with_processors(mut self, processors: &[ColumnProcessor]) -> Result<Self> {
        let columns = self.response.column_metadata.len();
        if columns > 0 && columns != processors.len() {
            return Err(DataApiError::Decode(format!(
                "expected {columns} column processors, got {}",
                processors.len()
            )));
        }
        let rows = decode_rows(self.raw_records(), Some(processors))?;
        self.rows = OnceLock::from(rows);
        Ok(self)
    }

    pub fn raw(&self) -> &ExecuteStatementResponse {
        &self.response
    }

    pub fn column_metadata(&self) -> &[ColumnMetadata] {
        &self.response.column_metadata
    }

    pub fn headers(&self) -> &[String] {
        self.shared_headers()
    }

    /// Decoded rows.
    pub fn rows(&self) -> &[Vec<Value>] {
        self.rows.get_or_init(|| decode_records(self.raw_records()))
    }

    pub fn len(&self) -> usize {
        self.raw_records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Record> {
        self.rows()
            .get(index)
            .map(|row| Record::new(row.clone(), self.shared_headers().clone()))
    }

    /// Records in `range`, clamped to the row count.
    pub fn slice(&self, range: impl RangeBounds<usize>) -> Vec<Record> {
        let rows = self.rows();
        rows[clamp(range, rows.len())]
            .iter()
            .map(|row| Record::new(row.clone(), self.shared_headers().clone()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = Record> + '_ {
        let headers = self.shared_headers().clone();
        self.rows()
            .iter()
            .map(move |row| Record::new(row.clone(), headers.clone()))
    }

    pub fn all(&self) -> Vec<Record> {
        self.iter().collect()
    }

    pub fn first(&self) -> Option<Record> {
        self.get(0)
    }

    /// The only record; fails on zero or several rows.
    pub fn one(&self) -> Result<Record> {
        self.one_or_none()?.ok_or(DataApiError::NoResultFound)
    }

    /// The only record or `None`; fails on several rows.
    pub fn one_or_none(&self) -> Result<Option<Record>> {
        match self.len() {
            0 => Ok(None),
            1 => Ok(self.first()),
            _ => Err(DataApiError::MultipleResultsFound),
        }
    }

    /// First column of [`QueryResult::one`].
    pub fn scalar(&self) -> Result<Value> {
        let record = self.one()?;
        Ok(record.into_values().into_iter().next().unwrap_or(Value::Null))
    }

    /// Affected row count; `0` when the service omitted it.
    pub fn number_of_records_updated(&self) -> i64 {
        self.response.number_of_records_updated.unwrap_or(0)
    }

    pub fn generated_fields(&self) -> &[Value] {
        self.generated.values()
    }

    pub fn generated_fields_first(&self) -> Option<&Value> {
        self.generated.first()
    }

    fn raw_records(&self) -> &[Vec<Field>] {
        self.response.records.as_deref().unwrap_or_default()
    }

    fn shared_headers(&self) -> &Arc<[String]> {
        self.headers
            .get_or_init(|| extract_headers(&self.response.column_metadata).into())
    }
}

impl Iterator for QueryResult {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        let record = self.get(self.cursor)?;
        self.cursor += 1;
        Some(record)
    }
}

/// Per-statement generated fields of a batch, in submission order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateResults {
    results: Vec<GeneratedFields>,
}

impl UpdateResults {
    pub fn new(raw: Vec<UpdateResult>) -> Self {
        Self {
            results: raw
                .into_iter()
                .map(|result| GeneratedFields::new(result.generated_fields))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&GeneratedFields> {
        self.results.get(index)
    }

    pub fn slice(&self, range: impl RangeBounds<usize>) -> &[GeneratedFields] {
        &self.results[clamp(range, self.results.len())]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GeneratedFields> {
        self.results.iter()
    }

    pub(crate) fn extend(&mut self, raw: Vec<UpdateResult>) {
        self.results.extend(
            raw.into_iter()
                .map(|result| GeneratedFields::new(result.generated_fields)),
        );
    }
}

impl Index<usize> for UpdateResults {
    type Output = GeneratedFields;

    fn index(&self, index: usize) -> &GeneratedFields {
        &self.results[index]
    }
}

impl IntoIterator for UpdateResults {
    type Item = GeneratedFields;
    type IntoIter = std::vec::IntoIter<GeneratedFields>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

impl<'a> IntoIterator for &'a UpdateResults {
    type Item = &'a GeneratedFields;
    type IntoIter = std::slice::Iter<'a, GeneratedFields>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

fn clamp(range: impl RangeBounds<usize>, len: usize) -> Range<usize> {
    let start = match range.start_bound() {
        Bound::Included(start) => *start,
        Bound::Excluded(start) => start.saturating_add(1),
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(end) => end.saturating_add(1),
        Bound::Excluded(end) => *end,
        Bound::Unbounded => len,
    };
    let end = end.min(len);
    start.min(end)..end
}
