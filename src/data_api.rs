use std::fmt;

use crate::{
    config::not_found_resource_arn,
    params::build_parameters,
    wire::{
        BatchExecuteStatementRequest, BeginTransactionRequest, EndTransactionRequest,
        ExecuteStatementRequest, SqlParameter,
    },
    DataApiConfig, DataApiError, Params, Query, QueryResult, ResourceResolver, Result,
    RollbackPolicy, Transport, UpdateResults,
};

/// Options for [`DataApi::begin_with`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BeginOptions {
    /// Overrides the default database.
    pub database: Option<String>,
    pub schema: Option<String>,
    pub resource_arn: Option<String>,
    pub secret_arn: Option<String>,
    /// Replaces a held transaction handle instead of failing.
    pub force: bool,
}

impl BeginOptions {
    pub fn resource_arn(mut self, resource_arn: impl Into<String>) -> Self {
        self.resource_arn = Some(resource_arn.into());
        self
    }

    pub fn secret_arn(mut self, secret_arn: impl Into<String>) -> Self {
        self.secret_arn = Some(secret_arn.into());
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// Options for [`DataApi::commit_with`] and [`DataApi::rollback_with`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EndOptions {
    /// Ends this transaction instead of the current one.
    pub transaction_id: Option<String>,
    pub resource_arn: Option<String>,
    pub secret_arn: Option<String>,
}

impl EndOptions {
    pub fn transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    pub fn resource_arn(mut self, resource_arn: impl Into<String>) -> Self {
        self.resource_arn = Some(resource_arn.into());
        self
    }

    pub fn secret_arn(mut self, secret_arn: impl Into<String>) -> Self {
        self.secret_arn = Some(secret_arn.into());
        self
    }
}

/// Options for [`DataApi::execute_with`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Runs in this transaction instead of the current one.
    pub transaction_id: Option<String>,
    /// Overrides the default database.
    pub database: Option<String>,
    pub resource_arn: Option<String>,
    pub secret_arn: Option<String>,
    /// Passed to the service unchanged.
    pub continue_after_timeout: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            transaction_id: None,
            database: None,
            resource_arn: None,
            secret_arn: None,
            continue_after_timeout: true,
        }
    }
}

impl ExecuteOptions {
    pub fn resource_arn(mut self, resource_arn: impl Into<String>) -> Self {
        self.resource_arn = Some(resource_arn.into());
        self
    }

    pub fn secret_arn(mut self, secret_arn: impl Into<String>) -> Self {
        self.secret_arn = Some(secret_arn.into());
        self
    }

    pub fn transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn continue_after_timeout(mut self, continue_after_timeout: bool) -> Self {
        self.continue_after_timeout = continue_after_timeout;
        self
    }
}

/// Options for [`DataApi::batch_execute_with`].
///
/// Identity overrides also apply to the transaction a batch starts itself.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchOptions {
    pub transaction_id: Option<String>,
    pub database: Option<String>,
    pub resource_arn: Option<String>,
    pub secret_arn: Option<String>,
}

impl BatchOptions {
    pub fn resource_arn(mut self, resource_arn: impl Into<String>) -> Self {
        self.resource_arn = Some(resource_arn.into());
        self
    }

    pub fn secret_arn(mut self, secret_arn: impl Into<String>) -> Self {
        self.secret_arn = Some(secret_arn.into());
        self
    }

    pub fn transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }
}

/// Transaction-aware Data API client.
///
/// Holds the cluster and secret identity, a default database, and at most
/// one open transaction handle. Operations that change the handle take
/// `&mut self`; use one instance per concurrent unit of work.
pub struct DataApi<T> {
    transport: T,
    resource_arn: String,
    secret_arn: String,
    database: Option<String>,
    transaction_id: Option<String>,
    transaction_status: Option<String>,
    rollback_policy: RollbackPolicy,
    batch_chunk_size: usize,
}

impl<T> fmt::Debug for DataApi<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataApi")
            .field("resource_arn", &self.resource_arn)
            .field("secret_arn", &"<redacted>")
            .field("database", &self.database)
            .field("transaction_id", &self.transaction_id)
            .field("transaction_status", &self.transaction_status)
            .field("rollback_policy", &self.rollback_policy)
            .field("batch_chunk_size", &self.batch_chunk_size)
            .finish()
    }
}

impl<T: Transport> DataApi<T> {
    /// Creates a client from a config carrying a resource ARN.
    ///
    /// A config that only names the resource needs [`DataApi::connect`].
    pub fn new(transport: T, config: DataApiConfig) -> Result<Self> {
        let resource_arn = config
            .validate()?
            .map(str::to_owned)
            .ok_or_else(not_found_resource_arn)?;
        Ok(Self::from_parts(transport, resource_arn, config))
    }

    /// Creates a client, resolving `resource_name` through `resolver` when
    /// no ARN is configured.
    pub async fn connect<R: ResourceResolver>(
        transport: T,
        config: DataApiConfig,
        resolver: &R,
    ) -> Result<Self> {
        let resource_arn = match config.validate()? {
            Some(arn) => arn.to_owned(),
            None => {
                let name = config
                    .resource_name
                    .as_deref()
                    .ok_or_else(not_found_resource_arn)?;
                resolver
                    .describe_resources(name)
                    .await?
                    .ok_or_else(not_found_resource_arn)?
            }
        };
        Ok(Self::from_parts(transport, resource_arn, config))
    }

    fn from_parts(transport: T, resource_arn: String, config: DataApiConfig) -> Self {
        Self {
            transport,
            resource_arn,
            secret_arn: config.secret_arn,
            database: config.database,
            transaction_id: config.transaction_id,
            transaction_status: None,
            rollback_policy: config.rollback_policy,
            batch_chunk_size: config.batch_chunk_size,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn resource_arn(&self) -> &str {
        &self.resource_arn
    }

    pub fn secret_arn(&self) -> &str {
        &self.secret_arn
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    /// Handle of the open transaction, if any.
    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }

    /// Status string returned by the last commit or rollback.
    pub fn transaction_status(&self) -> Option<&str> {
        self.transaction_status.as_deref()
    }

    pub fn rollback_policy(&self) -> RollbackPolicy {
        self.rollback_policy
    }

    /// Begins a transaction on the default database.
    pub async fn begin(&mut self) -> Result<String> {
        self.begin_with(BeginOptions::default()).await
    }

    /// Begins a transaction and keeps its handle for later calls.
    ///
    /// Fails with [`DataApiError::TransactionActive`] while a handle is held,
    /// unless `options.force` is set.
    pub async fn begin_with(&mut self, options: BeginOptions) -> Result<String> {
        if let Some(active) = &self.transaction_id {
            if !options.force {
                return Err(DataApiError::TransactionActive(active.clone()));
            }
        }

        let (resource_arn, secret_arn) = self.identity(options.resource_arn, options.secret_arn);
        let request = BeginTransactionRequest {
            resource_arn,
            secret_arn,
            database: options.database.or_else(|| self.database.clone()),
            schema: options.schema,
        };
        let response = self.transport.begin_transaction(&request).await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(transaction_id = %response.transaction_id, "transaction started");

        self.transaction_id = Some(response.transaction_id.clone());
        Ok(response.transaction_id)
    }

    /// Commits the current transaction.
    pub async fn commit(&mut self) -> Result<String> {
        self.end(End::Commit, EndOptions::default()).await
    }

    /// Commits the given transaction.
    pub async fn commit_transaction(&mut self, transaction_id: &str) -> Result<String> {
        self.commit_with(EndOptions::default().transaction_id(transaction_id))
            .await
    }

    pub async fn commit_with(&mut self, options: EndOptions) -> Result<String> {
        self.end(End::Commit, options).await
    }

    /// Rolls back the current transaction.
    pub async fn rollback(&mut self) -> Result<String> {
        self.end(End::Rollback, EndOptions::default()).await
    }

    /// Rolls back the given transaction.
    pub async fn rollback_transaction(&mut self, transaction_id: &str) -> Result<String> {
        self.rollback_with(EndOptions::default().transaction_id(transaction_id))
            .await
    }

    pub async fn rollback_with(&mut self, options: EndOptions) -> Result<String> {
        self.end(End::Rollback, options).await
    }

    async fn end(&mut self, end: End, options: EndOptions) -> Result<String> {
        let transaction_id = options
            .transaction_id
            .or_else(|| self.transaction_id.clone());
        let (resource_arn, secret_arn) = self.identity(options.resource_arn, options.secret_arn);
        let request = EndTransactionRequest {
            resource_arn,
            secret_arn,
            transaction_id: transaction_id.clone(),
        };
        let response = match end {
            End::Commit => self.transport.commit_transaction(&request).await?,
            End::Rollback => self.transport.rollback_transaction(&request).await?,
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            transaction_id = ?transaction_id,
            status = %response.transaction_status,
            "transaction {}",
            end.as_str()
        );

        if transaction_id.is_some() && transaction_id == self.transaction_id {
            self.transaction_id = None;
        }
        self.transaction_status = Some(response.transaction_status.clone());
        Ok(response.transaction_status)
    }

    /// Executes one statement, in the current transaction if one is open.
    pub async fn execute<Q, P>(&self, query: Q, params: P) -> Result<QueryResult>
    where
        Q: Into<Query>,
        P: Into<Params>,
    {
        self.execute_with(query, params, ExecuteOptions::default())
            .await
    }

    /// Executes one statement with per-call overrides.
    ///
    /// Result metadata is always requested, so records carry headers.
    pub async fn execute_with<Q, P>(
        &self,
        query: Q,
        params: P,
        options: ExecuteOptions,
    ) -> Result<QueryResult>
    where
        Q: Into<Query>,
        P: Into<Params>,
    {
        let params = params.into();
        let parameters = if params.is_empty() {
            None
        } else {
            Some(build_parameters(params)?)
        };
        let (resource_arn, secret_arn) = self.identity(options.resource_arn, options.secret_arn);
        let request = ExecuteStatementRequest {
            resource_arn,
            secret_arn,
            sql: query.into().into_sql(),
            database: options.database.or_else(|| self.database.clone()),
            transaction_id: options
                .transaction_id
                .or_else(|| self.transaction_id.clone()),
            parameters,
            continue_after_timeout: options.continue_after_timeout,
            include_result_metadata: true,
        };
        let response = self.transport.execute_statement(&request).await?;
        Ok(QueryResult::new(response))
    }

    /// Executes one statement once per parameter set.
    ///
    /// Without an open transaction, the whole batch runs in one that is
    /// started here, committed on success and rolled back on failure.
    /// Parameter sets are submitted in chunks of the configured size.
    pub async fn batch_execute<Q, I, P>(
        &mut self,
        query: Q,
        parameter_sets: I,
    ) -> Result<UpdateResults>
    where
        Q: Into<Query>,
        I: IntoIterator<Item = P>,
        P: Into<Params>,
    {
        self.batch_execute_with(query, parameter_sets, BatchOptions::default())
            .await
    }

    pub async fn batch_execute_with<Q, I, P>(
        &mut self,
        query: Q,
        parameter_sets: I,
        options: BatchOptions,
    ) -> Result<UpdateResults>
    where
        Q: Into<Query>,
        I: IntoIterator<Item = P>,
        P: Into<Params>,
    {
        let sql = query.into().into_sql();
        let parameter_sets = parameter_sets
            .into_iter()
            .map(|params| build_parameters(params.into()))
            .collect::<Result<Vec<_>>>()?;
        let database = options.database.or_else(|| self.database.clone());
        let target = BatchTarget {
            sql,
            database,
            resource_arn: options.resource_arn,
            secret_arn: options.secret_arn,
        };

        if let Some(transaction_id) = options
            .transaction_id
            .or_else(|| self.transaction_id.clone())
        {
            return self
                .submit_chunks(&target, transaction_id, parameter_sets)
                .await;
        }

        let transaction_id = self
            .begin_with(BeginOptions {
                database: target.database.clone(),
                resource_arn: target.resource_arn.clone(),
                secret_arn: target.secret_arn.clone(),
                ..BeginOptions::default()
            })
            .await?;
        let outcome = self
            .submit_chunks(&target, transaction_id.clone(), parameter_sets)
            .await;

        let end_options = EndOptions {
            transaction_id: Some(transaction_id.clone()),
            resource_arn: target.resource_arn,
            secret_arn: target.secret_arn,
        };
        let ended = match &outcome {
            Ok(_) => self.commit_with(end_options).await,
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(%transaction_id, error = %_err, "rolling back batch transaction");
                self.rollback_with(end_options).await
            }
        };
        if self.transaction_id.as_deref() == Some(transaction_id.as_str()) {
            self.transaction_id = None;
        }
        ended?;
        outcome
    }

    async fn submit_chunks(
        &self,
        target: &BatchTarget,
        transaction_id: String,
        mut parameter_sets: Vec<Vec<SqlParameter>>,
    ) -> Result<UpdateResults> {
        let (resource_arn, secret_arn) =
            self.identity(target.resource_arn.clone(), target.secret_arn.clone());
        let mut request = BatchExecuteStatementRequest {
            resource_arn,
            secret_arn,
            sql: target.sql.clone(),
            database: target.database.clone(),
            transaction_id: Some(transaction_id),
            parameter_sets: Vec::new(),
        };
        let mut results = UpdateResults::default();

        if parameter_sets.is_empty() {
            let response = self.transport.batch_execute_statement(&request).await?;
            results.extend(response.update_results);
            return Ok(results);
        }

        while !parameter_sets.is_empty() {
            let rest = parameter_sets.split_off(self.batch_chunk_size.min(parameter_sets.len()));
            request.parameter_sets = std::mem::replace(&mut parameter_sets, rest);

            #[cfg(feature = "tracing")]
            tracing::debug!(
                chunk_len = request.parameter_sets.len(),
                remaining = parameter_sets.len(),
                "submitting batch chunk"
            );

            let response = self.transport.batch_execute_statement(&request).await?;
            results.extend(response.update_results);
        }
        Ok(results)
    }

    /// Per-call identity, falling back to the configured one.
    fn identity(
        &self,
        resource_arn: Option<String>,
        secret_arn: Option<String>,
    ) -> (String, String) {
        (
            resource_arn.unwrap_or_else(|| self.resource_arn.clone()),
            secret_arn.unwrap_or_else(|| self.secret_arn.clone()),
        )
    }
}

struct BatchTarget {
    sql: String,
    database: Option<String>,
    resource_arn: Option<String>,
    secret_arn: Option<String>,
}

#[derive(Clone, Copy, Debug)]
enum End {
    Commit,
    Rollback,
}

#[cfg(feature = "tracing")]
impl End {
    fn as_str(self) -> &'static str {
        match self {
            Self::Commit => "committed",
            Self::Rollback => "rolled back",
        }
    }
}
