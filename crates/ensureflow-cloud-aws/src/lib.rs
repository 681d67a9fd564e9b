//! AWS providers for ensureflow
//!
//! Implements [`ensureflow_cloud::EnsureProvider`] for every supported
//! resource kind on top of the official AWS SDK:
//!
//! - [`DynamoDbProvider`]: DynamoDB tables
//! - [`S3Provider`]: S3 buckets
//! - [`SqsProvider`]: SQS queues
//! - [`Ec2Provider`]: EC2 security groups
//! - [`Route53Provider`]: Route53 records
//!
//! Credentials and region follow the SDK's usual resolution chain unless
//! overridden through [`load_sdk_config`].

pub mod dynamodb;
pub mod ec2;
pub mod error;
pub mod route53;
pub mod s3;
pub mod sqs;

pub use dynamodb::DynamoDbProvider;
pub use ec2::Ec2Provider;
pub use error::AwsError;
pub use route53::Route53Provider;
pub use s3::S3Provider;
pub use sqs::SqsProvider;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use ensureflow_cloud::{Providers, RetryConfig};
use tracing::debug;

/// Loads the shared SDK configuration
///
/// `region` and `profile` override the environment when given.
pub async fn load_sdk_config(region: Option<&str>, profile: Option<&str>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(Region::new(region.to_string()));
    }
    if let Some(profile) = profile {
        loader = loader.profile_name(profile);
    }

    let config = loader.load().await;
    debug!(region = ?config.region(), "loaded AWS configuration");
    config
}

/// One AWS provider per resource kind, sharing one SDK configuration
pub struct AwsProviders {
    pub table: DynamoDbProvider,
    pub bucket: S3Provider,
    pub queue: SqsProvider,
    pub sg: Ec2Provider,
    pub record: Route53Provider,
}

impl AwsProviders {
    pub fn new(config: &SdkConfig, retry: RetryConfig) -> Self {
        Self {
            table: DynamoDbProvider::new(config, retry.clone()),
            bucket: S3Provider::new(config, retry.clone()),
            queue: SqsProvider::new(config, retry.clone()),
            sg: Ec2Provider::new(config, retry.clone()),
            record: Route53Provider::new(config, retry),
        }
    }

    /// Borrowed view for [`ensureflow_cloud::ensure_many`]
    pub fn as_providers(&self) -> Providers<'_> {
        Providers {
            table: &self.table,
            bucket: &self.bucket,
            queue: &self.queue,
            sg: &self.sg,
            record: &self.record,
        }
    }
}
