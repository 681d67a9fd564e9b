//! Error types for providers and the reconciliation engine

use ensureflow_core::{CompileError, ResourceKind};
use thiserror::Error;

/// Errors returned by a provider call
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Resource already exists: {0}")]
    ResourceAlreadyExists(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: String, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error codes that indicate a temporary condition worth retrying
const TRANSIENT_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "ThrottledException",
    "TooManyRequestsException",
    "RequestLimitExceeded",
    "ProvisionedThroughputExceededException",
    "LimitExceededException",
    "ResourceInUseException",
    "SlowDown",
    "OperationAborted",
    "ServiceUnavailable",
    "InternalError",
    "InternalServerError",
    "RequestTimeout",
    "PriorRequestNotComplete",
];

impl CloudError {
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        CloudError::ApiError {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Whether a retry with backoff may succeed
    ///
    /// A not-found right after a create is treated as eventual consistency.
    pub fn is_transient(&self) -> bool {
        match self {
            CloudError::ApiError { code, .. } => TRANSIENT_CODES.contains(&code.as_str()),
            CloudError::Timeout(_) => true,
            CloudError::ResourceNotFound(_) => true,
            _ => false,
        }
    }
}

pub type CloudResult<T> = std::result::Result<T, CloudError>;

/// Errors returned by `ensure`
#[derive(Error, Debug)]
pub enum EnsureError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("{kind} '{name}': {property}: {reason}; nothing was applied")]
    Invariant {
        kind: ResourceKind,
        name: String,
        property: String,
        reason: String,
    },

    #[error("{kind} '{name}': {action} failed ({applied} earlier action(s) already applied): {source}")]
    Remote {
        kind: ResourceKind,
        name: String,
        action: String,
        applied: usize,
        #[source]
        source: CloudError,
    },

    #[error("{kind} '{name}' is listed more than once")]
    DuplicateResource { kind: ResourceKind, name: String },

    #[error("{failed}/{total} resources failed")]
    Batch { failed: usize, total: usize },

    #[error("desired state is a {actual}, but the provider manages {expected} resources")]
    KindMismatch {
        expected: ResourceKind,
        actual: ResourceKind,
    },
}

impl EnsureError {
    /// Stage name shown in the diagnostic line
    pub fn stage(&self) -> &'static str {
        match self {
            EnsureError::Compile(err) => err.stage(),
            EnsureError::Invariant { .. } => "invariant",
            EnsureError::Remote { .. } => "remote",
            EnsureError::Batch { .. } => "apply",
            EnsureError::DuplicateResource { .. } | EnsureError::KindMismatch { .. } => "config",
        }
    }
}

pub type Result<T> = std::result::Result<T, EnsureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(CloudError::api("ThrottlingException", "slow down").is_transient());
        assert!(CloudError::api("ResourceInUseException", "updating").is_transient());
        assert!(CloudError::api("PriorRequestNotComplete", "route53 busy").is_transient());
        assert!(CloudError::ResourceNotFound("orders".into()).is_transient());
        assert!(!CloudError::api("ValidationException", "bad").is_transient());
        assert!(!CloudError::ResourceAlreadyExists("orders".into()).is_transient());
    }

    #[test]
    fn test_stage_names() {
        let err = EnsureError::Invariant {
            kind: ResourceKind::Bucket,
            name: "assets".into(),
            property: "Acl".into(),
            reason: "acl can only be set at bucket creation".into(),
        };
        assert_eq!(err.stage(), "invariant");
        assert!(err.to_string().contains("nothing was applied"));

        let err = EnsureError::Remote {
            kind: ResourceKind::Queue,
            name: "jobs".into(),
            action: "set DelaySeconds".into(),
            applied: 2,
            source: CloudError::api("AccessDenied", "no"),
        };
        assert_eq!(err.stage(), "remote");
        assert!(err.to_string().contains("2 earlier action(s)"));
    }
}
