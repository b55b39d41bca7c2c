use std::future::Future;

use crate::{
    wire::{
        BatchExecuteStatementRequest, BatchExecuteStatementResponse, BeginTransactionRequest,
        BeginTransactionResponse, EndTransactionRequest, EndTransactionResponse,
        ExecuteStatementRequest, ExecuteStatementResponse,
    },
    Result,
};

/// The five Data API operations the client relies on.
///
/// [`HttpTransport`](crate::HttpTransport) is the bundled implementation;
/// tests and alternative SDK bindings can provide their own. Errors are
/// passed through to the caller untouched.
pub trait Transport: Send + Sync {
    fn begin_transaction(
        &self,
        request: &BeginTransactionRequest,
    ) -> impl Future<Output = Result<BeginTransactionResponse>> + Send;

    fn commit_transaction(
        &self,
        request: &EndTransactionRequest,
    ) -> impl Future<Output = Result<EndTransactionResponse>> + Send;

    fn rollback_transaction(
        &self,
        request: &EndTransactionRequest,
    ) -> impl Future<Output = Result<EndTransactionResponse>> + Send;

    fn execute_statement(
        &self,
        request: &ExecuteStatementRequest,
    ) -> impl Future<Output = Result<ExecuteStatementResponse>> + Send;

    fn batch_execute_statement(
        &self,
        request: &BatchExecuteStatementRequest,
    ) -> impl Future<Output = Result<BatchExecuteStatementResponse>> + Send;
}

/// Resolves a cluster name to its resource ARN.
pub trait ResourceResolver: Send + Sync {
    /// Returns `None` when no resource carries `name`.
    fn describe_resources(&self, name: &str) -> impl Future<Output = Result<Option<String>>> + Send;
}
