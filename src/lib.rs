//! `rds-data-api` is an async client for the Aurora Data API.
//!
//! The crate maps host values onto the service's tagged wire format and
//! sequences transactions on top of it:
//! - [`DataApi::execute`]: one statement, decoded into a [`QueryResult`]
//! - [`DataApi::batch_execute`]: chunked batches, wrapped in a transaction
//!   when none is open
//! - [`DataApi::begin`] / [`DataApi::commit`] / [`DataApi::rollback`]
//! - [`DataApi::transaction`]: scoped commit-or-rollback
//!
//! The RPC layer is the [`Transport`] trait; [`HttpTransport`] speaks the
//! service's JSON REST shape.

mod client;
pub mod codec;
mod config;
mod data_api;
pub mod decode;
mod error;
mod options;
mod params;
mod result;
mod scope;
mod transport;
mod value;
pub mod wire;

pub use client::{region_endpoint, HttpTransport};
pub use config::{DataApiConfig, MAX_BATCH_RECORDS};
pub use data_api::{BatchOptions, BeginOptions, DataApi, EndOptions, ExecuteOptions};
pub use decode::ColumnProcessor;
pub use error::DataApiError;
pub use options::ClientOptions;
pub use params::{build_parameters, CompileSql, Params, Query};
pub use result::{GeneratedFields, QueryResult, Record, UpdateResults};
pub use scope::{BoxFuture, RollbackPolicy, UnmatchedError};
pub use transport::{ResourceResolver, Transport};
pub use value::Value;

pub type Result<T> = std::result::Result<T, DataApiError>;
