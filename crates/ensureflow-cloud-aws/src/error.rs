//! AWS error mapping

use std::error::Error as StdError;
use std::fmt;
use std::future::Future;

use aws_sdk_dynamodb::error::{BuildError, DisplayErrorContext, ProvideErrorMetadata, SdkError};
use ensureflow_cloud::{CloudError, CloudResult, RetryConfig, with_retry};
use thiserror::Error;

/// Errors raised while translating between AWS shapes and ensureflow types
#[derive(Error, Debug)]
pub enum AwsError {
    #[error("Unexpected {field} from AWS: {value}")]
    UnexpectedValue { field: &'static str, value: String },

    #[error("Failed to build request: {0}")]
    Build(#[from] BuildError),
}

impl AwsError {
    pub(crate) fn unexpected(field: &'static str, value: impl fmt::Debug) -> Self {
        AwsError::UnexpectedValue {
            field,
            value: format!("{:?}", value),
        }
    }
}

impl From<AwsError> for CloudError {
    fn from(err: AwsError) -> Self {
        CloudError::InvalidConfig(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AwsError>;

/// Maps an SDK error onto the provider error taxonomy
///
/// Works for every AWS SDK crate since they share the smithy error types.
pub(crate) fn sdk_error<E, R>(operation: &str, err: SdkError<E, R>) -> CloudError
where
    E: ProvideErrorMetadata + StdError + 'static,
    R: fmt::Debug,
{
    if matches!(err, SdkError::TimeoutError(_) | SdkError::DispatchFailure(_)) {
        return CloudError::Timeout(format!("{}: {}", operation, DisplayErrorContext(&err)));
    }

    let code = err.code().unwrap_or("Unknown").to_string();
    let message = match err.message() {
        Some(message) => format!("{}: {}", operation, message),
        None => format!("{}: {}", operation, DisplayErrorContext(&err)),
    };
    classify(code, message)
}

/// Sends one SDK request with bounded retry of transient failures
pub(crate) async fn send<T, E, R, F, Fut>(
    retry: &RetryConfig,
    operation: &'static str,
    call: F,
) -> CloudResult<T>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<T, SdkError<E, R>>> + Send,
    E: ProvideErrorMetadata + StdError + 'static,
    R: fmt::Debug,
{
    with_retry(retry, operation, || {
        let request = call();
        async move { request.await.map_err(|err| sdk_error(operation, err)) }
    })
    .await
}

/// Turns the "no such configuration" error codes into `None`
pub(crate) fn absent_on<T>(result: CloudResult<T>, codes: &[&str]) -> CloudResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(CloudError::ApiError { code, .. }) if codes.contains(&code.as_str()) => Ok(None),
        Err(err) => Err(err),
    }
}

fn classify(code: String, message: String) -> CloudError {
    match code.as_str() {
        "ResourceNotFoundException"
        | "NoSuchBucket"
        | "NotFound"
        | "QueueDoesNotExist"
        | "AWS.SimpleQueueService.NonExistentQueue"
        | "InvalidGroup.NotFound" => CloudError::ResourceNotFound(message),
        "BucketAlreadyOwnedByYou"
        | "QueueNameExists"
        | "QueueAlreadyExists"
        | "InvalidGroup.Duplicate" => CloudError::ResourceAlreadyExists(message),
        "UnrecognizedClientException"
        | "InvalidClientTokenId"
        | "InvalidAccessKeyId"
        | "SignatureDoesNotMatch"
        | "ExpiredToken"
        | "ExpiredTokenException" => CloudError::AuthenticationFailed(message),
        _ => CloudError::api(code, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert!(matches!(
            classify("NoSuchBucket".into(), "gone".into()),
            CloudError::ResourceNotFound(_)
        ));
        assert!(matches!(
            classify("BucketAlreadyOwnedByYou".into(), "mine".into()),
            CloudError::ResourceAlreadyExists(_)
        ));
        // a queue created concurrently by someone else
        for code in ["QueueNameExists", "QueueAlreadyExists"] {
            let err = classify(code.into(), "jobs".into());
            assert!(matches!(err, CloudError::ResourceAlreadyExists(_)), "{code}");
            assert!(!err.is_transient());
        }
        assert!(matches!(
            classify("InvalidGroup.Duplicate".into(), "web".into()),
            CloudError::ResourceAlreadyExists(_)
        ));
        assert!(matches!(
            classify("ExpiredToken".into(), "expired".into()),
            CloudError::AuthenticationFailed(_)
        ));

        let err = classify("ThrottlingException".into(), "slow down".into());
        assert!(err.is_transient());
        assert_eq!(err.to_string(), "API error (ThrottlingException): slow down");
    }

    #[test]
    fn test_absent_on() {
        let missing: CloudResult<u8> = Err(CloudError::api("NoSuchTagSet", "none"));
        assert_eq!(absent_on(missing, &["NoSuchTagSet"]).unwrap(), None);

        let other: CloudResult<u8> = Err(CloudError::api("AccessDenied", "no"));
        assert!(absent_on(other, &["NoSuchTagSet"]).is_err());
        assert_eq!(absent_on(Ok(1), &["NoSuchTagSet"]).unwrap(), Some(1));
    }

    #[test]
    fn test_unexpected_value() {
        let err = AwsError::unexpected("KeyType", "SIDEWAYS");
        assert_eq!(err.to_string(), "Unexpected KeyType from AWS: \"SIDEWAYS\"");
        assert!(matches!(CloudError::from(err), CloudError::InvalidConfig(_)));
    }
}
