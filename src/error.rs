/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum DataApiError {
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// Non-success HTTP status code with raw response body.
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    /// Response decoding or protocol-shape validation error.
    #[error("decode error: {0}")]
    Decode(String),
    /// A host value has no wire encoding.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),
    /// Contradictory or incomplete connection identity.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// `one()` or `scalar()` found no row.
    #[error("No row was found for one()")]
    NoResultFound,
    /// `one()`, `one_or_none()` or `scalar()` found more than one row.
    #[error("Multiple rows were found for one()")]
    MultipleResultsFound,
    /// A record could not be projected into the requested type.
    #[error("model mapping error: {0}")]
    ModelMapping(String),
    /// `begin` was called while a transaction handle is held.
    #[error("transaction {0} is still active")]
    TransactionActive(String),
}
