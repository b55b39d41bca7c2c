use crate::{DataApiError, Result, RollbackPolicy};

/// Maximum parameter sets submitted in one batch-execute call.
pub const MAX_BATCH_RECORDS: usize = 1000;

/// Connection identity and defaults for [`DataApi`](crate::DataApi).
///
/// Exactly one of `resource_arn` and `resource_name` must be set; a name is
/// resolved through a [`ResourceResolver`](crate::ResourceResolver).
#[derive(Clone, Debug, PartialEq)]
pub struct DataApiConfig {
    pub resource_arn: Option<String>,
    pub resource_name: Option<String>,
    pub secret_arn: String,
    /// Default database for every call; overridable per call.
    pub database: Option<String>,
    /// Adopts an already open transaction.
    pub transaction_id: Option<String>,
    pub rollback_policy: RollbackPolicy,
    pub batch_chunk_size: usize,
}

impl Default for DataApiConfig {
    fn default() -> Self {
        Self {
            resource_arn: None,
            resource_name: None,
            secret_arn: String::new(),
            database: None,
            transaction_id: None,
            rollback_policy: RollbackPolicy::default(),
            batch_chunk_size: MAX_BATCH_RECORDS,
        }
    }
}

impl DataApiConfig {
    pub fn new(secret_arn: impl Into<String>) -> Self {
        Self {
            secret_arn: secret_arn.into(),
            ..Self::default()
        }
    }

    pub fn resource_arn(mut self, resource_arn: impl Into<String>) -> Self {
        self.resource_arn = Some(resource_arn.into());
        self
    }

    pub fn resource_name(mut self, resource_name: impl Into<String>) -> Self {
        self.resource_name = Some(resource_name.into());
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    pub fn rollback_policy(mut self, policy: RollbackPolicy) -> Self {
        self.rollback_policy = policy;
        self
    }

    pub fn batch_chunk_size(mut self, size: usize) -> Self {
        self.batch_chunk_size = size;
        self
    }

    /// Reads the configuration from environment variables.
    ///
    /// - `DATA_API_SECRET_ARN`: required
    /// - `DATA_API_RESOURCE_ARN` / `DATA_API_RESOURCE_NAME`: one of them
    /// - `DATA_API_DATABASE`: optional default database
    pub fn from_env() -> Result<Self> {
        let secret_arn = env_var("DATA_API_SECRET_ARN")?.ok_or_else(|| {
            DataApiError::Configuration(
                "missing DATA_API_SECRET_ARN environment variable".to_owned(),
            )
        })?;
        Ok(Self {
            resource_arn: env_var("DATA_API_RESOURCE_ARN")?,
            resource_name: env_var("DATA_API_RESOURCE_NAME")?,
            database: env_var("DATA_API_DATABASE")?,
            ..Self::new(secret_arn)
        })
    }

    /// Checks identity and batching settings, returning the direct ARN when
    /// one was given.
    pub(crate) fn validate(&self) -> Result<Option<&str>> {
        if self.batch_chunk_size == 0 {
            return Err(DataApiError::Configuration(
                "batch_chunk_size must be at least 1".to_owned(),
            ));
        }
        match (&self.resource_arn, &self.resource_name) {
            (Some(arn), Some(name)) => Err(DataApiError::Configuration(format!(
                "resource_name should be set without resource_arn. resource_arn: {arn}, resource_name: {name}"
            ))),
            (None, None) => Err(not_found_resource_arn()),
            (arn, _) => Ok(arn.as_deref()),
        }
    }
}

pub(crate) fn not_found_resource_arn() -> DataApiError {
    DataApiError::Configuration("Not Found resource_arn.".to_owned())
}

fn env_var(name: &str) -> Result<Option<String>> {
    match std::env::var(name) {
        Ok(value) if value.trim().is_empty() => Err(DataApiError::Configuration(format!(
            "{name} is set but empty"
        ))),
        Ok(value) => Ok(Some(value)),
        Err(_) => Ok(None),
    }
}
