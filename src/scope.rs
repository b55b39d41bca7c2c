//! Scoped transactions: begin, run caller code, then commit or roll back.

use std::{any::TypeId, error::Error, fmt, future::Future, pin::Pin};

use crate::{DataApi, DataApiError, Transport};

/// Boxed future returned by the closure given to [`DataApi::transaction`].
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a scoped transaction does with an error that does not match the
/// configured trigger kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnmatchedError {
    /// Persist the work done before the error.
    #[default]
    Commit,
    Rollback,
}

#[derive(Clone, Copy)]
struct ErrorKind {
    type_id: TypeId,
    type_name: &'static str,
    matches: fn(&(dyn Error + 'static)) -> bool,
}

impl ErrorKind {
    fn of<K: Error + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<K>(),
            type_name: std::any::type_name::<K>(),
            matches: is_kind::<K>,
        }
    }
}

impl PartialEq for ErrorKind {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ErrorKind {}

impl fmt::Debug for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

fn is_kind<K: Error + 'static>(err: &(dyn Error + 'static)) -> bool {
    err.is::<K>()
}

/// Decides whether a failed scope rolls back.
///
/// The default rolls back on any error. [`RollbackPolicy::only`] restricts
/// rollback to one error type, found anywhere in the error's `source()`
/// chain; other errors commit unless [`RollbackPolicy::rollback_unmatched`]
/// is set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RollbackPolicy {
    trigger: Option<ErrorKind>,
    unmatched: UnmatchedError,
}

impl RollbackPolicy {
    pub fn always() -> Self {
        Self::default()
    }

    pub fn only<K: Error + 'static>() -> Self {
        Self {
            trigger: Some(ErrorKind::of::<K>()),
            unmatched: UnmatchedError::Commit,
        }
    }

    pub fn rollback_unmatched(mut self) -> Self {
        self.unmatched = UnmatchedError::Rollback;
        self
    }

    pub fn unmatched(&self) -> UnmatchedError {
        self.unmatched
    }

    pub fn should_roll_back(&self, err: &(dyn Error + 'static)) -> bool {
        let Some(kind) = self.trigger else {
            return true;
        };
        let mut current = Some(err);
        while let Some(err) = current {
            if (kind.matches)(err) {
                return true;
            }
            current = err.source();
        }
        self.unmatched == UnmatchedError::Rollback
    }
}

impl<T: Transport> DataApi<T> {
    /// Runs `f` inside a new transaction.
    ///
    /// Commits when `f` succeeds. When it fails, rolls back or commits
    /// according to the configured [`RollbackPolicy`] and returns the
    /// original error. A failing commit or rollback replaces it.
    ///
    /// ```no_run
    /// # use rds_data_api::{DataApi, DataApiConfig, DataApiError, HttpTransport};
    /// # async fn run() -> Result<(), DataApiError> {
    /// let config = DataApiConfig::new("arn:secret").resource_arn("arn:cluster");
    /// let mut api = DataApi::new(HttpTransport::new("http://127.0.0.1:8080"), config)?;
    /// api.transaction(|api| {
    ///     Box::pin(async move {
    ///         api.execute("INSERT INTO pets (name) VALUES ('dog')", ()).await?;
    ///         Ok::<_, DataApiError>(())
    ///     })
    /// })
    /// .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn transaction<R, E, F>(&mut self, f: F) -> Result<R, E>
    where
        F: for<'a> FnOnce(&'a mut Self) -> BoxFuture<'a, Result<R, E>>,
        E: Error + From<DataApiError> + 'static,
    {
        self.begin().await?;
        let outcome = f(self).await;
        self.finish_transaction(outcome).await
    }

    /// Ends the current transaction according to `outcome`.
    pub async fn finish_transaction<R, E>(&mut self, outcome: Result<R, E>) -> Result<R, E>
    where
        E: Error + From<DataApiError> + 'static,
    {
        match outcome {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if self.rollback_policy().should_roll_back(&err) {
                    self.rollback().await?;
                } else {
                    self.commit().await?;
                }
                Err(err)
            }
        }
    }
}
