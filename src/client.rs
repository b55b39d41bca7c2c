use std::fmt;

use reqwest::{header, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tokio::time::sleep;

use crate::{
    wire::{
        BatchExecuteStatementRequest, BatchExecuteStatementResponse, BeginTransactionRequest,
        BeginTransactionResponse, EndTransactionRequest, EndTransactionResponse,
        ExecuteStatementRequest, ExecuteStatementResponse,
    },
    ClientOptions, DataApiError, Result, Transport,
};

/// Formats an AWS region into the regional Data API endpoint.
///
/// Example: `"us-east-1"` → `"https://rds-data.us-east-1.amazonaws.com"`
pub fn region_endpoint(region: &str) -> String {
    format!("https://rds-data.{}.amazonaws.com", region.trim())
}

#[derive(Clone)]
/// JSON-over-HTTP [`Transport`] for the Data API REST endpoints.
///
/// Requests are sent unsigned with an optional `Authorization` header, which
/// suits Data API emulators and signing proxies.
pub struct HttpTransport {
    http: reqwest::Client,
    endpoint: String,
    authorization: Option<String>,
    options: ClientOptions,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.endpoint)
            .field(
                "authorization",
                &self.authorization.as_ref().map(|_| "<redacted>"),
            )
            .field("options", &self.options)
            .finish()
    }
}

impl HttpTransport {
    /// Creates a transport without an authorization header.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_owned(),
            authorization: None,
            options: ClientOptions::default(),
        }
    }

    /// Creates a transport sending `authorization` verbatim.
    pub fn new_raw_auth(endpoint: impl Into<String>, authorization: impl Into<String>) -> Self {
        let mut transport = Self::new(endpoint);
        transport.authorization = Some(authorization.into());
        transport
    }

    /// Creates a transport from a bearer token.
    ///
    /// If the token is missing the `Bearer ` prefix, it is added automatically.
    pub fn new_bearer(endpoint: impl Into<String>, token: impl AsRef<str>) -> Self {
        let authorization = normalize_bearer_authorization(token.as_ref());
        Self::new_raw_auth(endpoint, authorization)
    }

    /// Creates a transport for the regional AWS endpoint.
    pub fn for_region(region: impl AsRef<str>) -> Self {
        Self::new(region_endpoint(region.as_ref()))
    }

    /// Creates a transport from environment variables.
    ///
    /// Reads:
    /// - `DATA_API_ENDPOINT`: base URL, e.g. `http://127.0.0.1:8080`
    /// - `DATA_API_TOKEN`: optional bearer token
    pub fn from_env() -> Result<Self> {
        let endpoint = std::env::var("DATA_API_ENDPOINT").map_err(|_| {
            DataApiError::Configuration("missing DATA_API_ENDPOINT environment variable".to_owned())
        })?;
        if endpoint.trim().is_empty() {
            return Err(DataApiError::Configuration(
                "DATA_API_ENDPOINT is set but empty".to_owned(),
            ));
        }
        match std::env::var("DATA_API_TOKEN") {
            Ok(token) if !token.trim().is_empty() => Ok(Self::new_bearer(endpoint, token)),
            _ => Ok(Self::new(endpoint)),
        }
    }

    /// Applies timeout and retry options.
    pub fn with_options(mut self, opts: ClientOptions) -> Self {
        self.options = opts;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<Req, Resp>(&self, operation: &str, payload: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/{operation}", self.endpoint);
        let mut attempt = 0usize;
        loop {
            let mut request = self
                .http
                .post(&url)
                .header(header::CONTENT_TYPE, "application/json")
                .timeout(self.options.request_timeout())
                .json(payload);
            if let Some(authorization) = &self.authorization {
                request = request.header(header::AUTHORIZATION, authorization);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.map_err(DataApiError::Transport)?;

                    if !status.is_success() {
                        if should_retry_status(status) && attempt < self.options.max_retries {
                            self.wait_before_retry(operation, attempt).await;
                            attempt += 1;
                            continue;
                        }

                        return Err(DataApiError::Http {
                            status: status.as_u16(),
                            body,
                        });
                    }

                    return serde_json::from_str::<Resp>(&body).map_err(|err| {
                        DataApiError::Decode(format!(
                            "invalid {operation} response JSON: {err}; body: {body}"
                        ))
                    });
                }
                Err(err) => {
                    if should_retry_transport(&err) && attempt < self.options.max_retries {
                        self.wait_before_retry(operation, attempt).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(DataApiError::Transport(err));
                }
            }
        }
    }

    async fn wait_before_retry(&self, operation: &str, attempt: usize) {
        let delay = self.options.backoff_delay(attempt);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            operation,
            attempt,
            "retrying data api call after {} ms",
            delay.as_millis()
        );
        #[cfg(not(feature = "tracing"))]
        let _ = operation;

        sleep(delay).await;
    }
}

impl Transport for HttpTransport {
    async fn begin_transaction(
        &self,
        request: &BeginTransactionRequest,
    ) -> Result<BeginTransactionResponse> {
        self.call("BeginTransaction", request).await
    }

    async fn commit_transaction(
        &self,
        request: &EndTransactionRequest,
    ) -> Result<EndTransactionResponse> {
        self.call("CommitTransaction", request).await
    }

    async fn rollback_transaction(
        &self,
        request: &EndTransactionRequest,
    ) -> Result<EndTransactionResponse> {
        self.call("RollbackTransaction", request).await
    }

    async fn execute_statement(
        &self,
        request: &ExecuteStatementRequest,
    ) -> Result<ExecuteStatementResponse> {
        self.call("Execute", request).await
    }

    async fn batch_execute_statement(
        &self,
        request: &BatchExecuteStatementRequest,
    ) -> Result<BatchExecuteStatementResponse> {
        self.call("BatchExecute", request).await
    }
}

// Only rejections that happen before the statement runs are retried; a
// timeout or 5xx may come after the service already applied it.
fn should_retry_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
    )
}

fn should_retry_transport(err: &reqwest::Error) -> bool {
    err.is_connect()
}

fn normalize_bearer_authorization(token: &str) -> String {
    let trimmed = token.trim();
    let prefix = trimmed.get(..7);
    if prefix.is_some_and(|value| value.eq_ignore_ascii_case("bearer ")) {
        trimmed.to_owned()
    } else {
        format!("Bearer {trimmed}")
    }
}
