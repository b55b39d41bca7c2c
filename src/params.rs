use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};

use crate::{codec::encode_value, wire::SqlParameter, Result, Value};

/// Named SQL parameters, kept in insertion order.
///
/// Names are sent as given; duplicates are not detected.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params(Vec<(String, Value)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a parameter and returns `self` for chaining.
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.push((name.into(), value.into()));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl From<()> for Params {
    fn from(_: ()) -> Self {
        Self::default()
    }
}

impl<K: Into<String>, V: Into<Value>> From<Vec<(K, V)>> for Params {
    fn from(pairs: Vec<(K, V)>) -> Self {
        pairs.into_iter().collect()
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for Params {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl<K: Into<String>, V: Into<Value>> From<BTreeMap<K, V>> for Params {
    fn from(pairs: BTreeMap<K, V>) -> Self {
        pairs.into_iter().collect()
    }
}

impl<K: Into<String>, V: Into<Value>, S> From<HashMap<K, V, S>> for Params {
    fn from(pairs: HashMap<K, V, S>) -> Self {
        pairs.into_iter().collect()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

/// Converts named parameters into wire parameters, in order.
pub fn build_parameters(params: Params) -> Result<Vec<SqlParameter>> {
    params
        .0
        .into_iter()
        .map(|(name, value)| {
            let (value, type_hint) = encode_value(value)?;
            Ok(SqlParameter {
                name,
                value,
                type_hint,
            })
        })
        .collect()
}

/// Produces SQL text from a structured query representation.
///
/// Implemented by query builders; the client only needs the final string.
pub trait CompileSql: Send + Sync {
    fn compile_sql(&self) -> String;
}

/// Statement accepted by [`DataApi`](crate::DataApi).
pub enum Query {
    /// Plain SQL text.
    Raw(String),
    /// A query builder object compiled to SQL on submission.
    Structured(Box<dyn CompileSql>),
}

impl Query {
    pub fn structured(query: impl CompileSql + 'static) -> Self {
        Self::Structured(Box::new(query))
    }

    pub fn into_sql(self) -> String {
        match self {
            Self::Raw(sql) => sql,
            Self::Structured(query) => query.compile_sql(),
        }
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw(sql) => f.debug_tuple("Raw").field(sql).finish(),
            Self::Structured(query) => f
                .debug_tuple("Structured")
                .field(&query.compile_sql())
                .finish(),
        }
    }
}

impl From<String> for Query {
    fn from(sql: String) -> Self {
        Self::Raw(sql)
    }
}

impl From<&str> for Query {
    fn from(sql: &str) -> Self {
        Self::Raw(sql.to_owned())
    }
}

impl From<&String> for Query {
    fn from(sql: &String) -> Self {
        Self::Raw(sql.clone())
    }
}
