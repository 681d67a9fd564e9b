//! S3 bucket provider
//!
//! Every bucket property is its own S3 sub-resource, so each change is one
//! call. Reads treat the "no such configuration" errors as the property being
//! off.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::Client;
use aws_sdk_s3::types as s3;
use ensureflow_cloud::{
    Bucket, BucketChange, BucketLive, CloudError, CloudResult, EnsureProvider, RetryConfig,
    with_retry,
};
use ensureflow_core::kinds::bucket::Acl;
use ensureflow_core::{BucketSpec, Tag};
use tracing::{debug, info};

use crate::error::{AwsError, Result, absent_on, sdk_error, send};

/// Id of the request metrics configuration covering the whole bucket
pub const METRICS_ID: &str = "EntireBucket";

const CORS_ALLOWED_HEADERS: &[&str] = &["Authorization", "Range"];
const CORS_ALLOWED_METHODS: &[&str] = &["GET", "PUT", "POST", "HEAD"];
const CORS_EXPOSE_HEADERS: &[&str] = &["Content-Length", "Content-Type", "ETag"];
const CORS_MAX_AGE_SECONDS: i32 = 3000;

pub struct S3Provider {
    client: Client,
    region: Option<String>,
    retry: RetryConfig,
}

impl S3Provider {
    pub fn new(config: &SdkConfig, retry: RetryConfig) -> Self {
        Self {
            client: Client::new(config),
            region: config.region().map(|region| region.to_string()),
            retry,
        }
    }

    async fn exists(&self, name: &str) -> CloudResult<bool> {
        with_retry(&self.retry, "HeadBucket", || async move {
            match self.client.head_bucket().bucket(name).send().await {
                Ok(_) => Ok(true),
                Err(err) => match sdk_error("HeadBucket", err) {
                    CloudError::ResourceNotFound(_) => Ok(false),
                    other => Err(other),
                },
            }
        })
        .await
    }

    async fn read_acl(&self, name: &str) -> CloudResult<Acl> {
        let output = absent_on(
            send(&self.retry, "GetPublicAccessBlock", || {
                self.client.get_public_access_block().bucket(name).send()
            })
            .await,
            &["NoSuchPublicAccessBlockConfiguration"],
        )?;

        let blocked = output
            .as_ref()
            .and_then(|output| output.public_access_block_configuration())
            .is_some_and(|block| {
                [
                    block.block_public_acls(),
                    block.ignore_public_acls(),
                    block.block_public_policy(),
                    block.restrict_public_buckets(),
                ]
                .into_iter()
                .all(|flag| flag == Some(true))
            });
        Ok(if blocked { Acl::Private } else { Acl::Public })
    }

    async fn read_versioning(&self, name: &str) -> CloudResult<bool> {
        let output = send(&self.retry, "GetBucketVersioning", || {
            self.client.get_bucket_versioning().bucket(name).send()
        })
        .await?;
        Ok(output.status() == Some(&s3::BucketVersioningStatus::Enabled))
    }

    async fn read_encryption(&self, name: &str) -> CloudResult<bool> {
        let output = absent_on(
            send(&self.retry, "GetBucketEncryption", || {
                self.client.get_bucket_encryption().bucket(name).send()
            })
            .await,
            &["ServerSideEncryptionConfigurationNotFoundError"],
        )?;
        Ok(output
            .as_ref()
            .and_then(|output| output.server_side_encryption_configuration())
            .is_some_and(|config| !config.rules().is_empty()))
    }

    async fn read_metrics(&self, name: &str) -> CloudResult<bool> {
        let output = absent_on(
            send(&self.retry, "GetBucketMetricsConfiguration", || {
                self.client
                    .get_bucket_metrics_configuration()
                    .bucket(name)
                    .id(METRICS_ID)
                    .send()
            })
            .await,
            &["NoSuchConfiguration"],
        )?;
        Ok(output.is_some())
    }

    async fn read_cors(&self, name: &str) -> CloudResult<bool> {
        let output = absent_on(
            send(&self.retry, "GetBucketCors", || {
                self.client.get_bucket_cors().bucket(name).send()
            })
            .await,
            &["NoSuchCORSConfiguration"],
        )?;
        Ok(output.is_some_and(|output| !output.cors_rules().is_empty()))
    }

    async fn read_expiration_days(&self, name: &str) -> CloudResult<i64> {
        let output = absent_on(
            send(&self.retry, "GetBucketLifecycleConfiguration", || {
                self.client
                    .get_bucket_lifecycle_configuration()
                    .bucket(name)
                    .send()
            })
            .await,
            &["NoSuchLifecycleConfiguration"],
        )?;
        Ok(output
            .as_ref()
            .and_then(|output| output.rules().first())
            .and_then(|rule| rule.expiration())
            .and_then(|expiration| expiration.days())
            .map_or(0, i64::from))
    }

    async fn read_tags(&self, name: &str) -> CloudResult<Vec<Tag>> {
        let output = absent_on(
            send(&self.retry, "GetBucketTagging", || {
                self.client.get_bucket_tagging().bucket(name).send()
            })
            .await,
            &["NoSuchTagSet"],
        )?;
        Ok(output
            .map(|output| {
                output
                    .tag_set()
                    .iter()
                    .map(|tag| Tag::new(tag.key(), tag.value()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn put_acl(&self, name: &str, acl: Acl) -> CloudResult<()> {
        let blocked = acl == Acl::Private;
        let block = s3::PublicAccessBlockConfiguration::builder()
            .block_public_acls(blocked)
            .ignore_public_acls(blocked)
            .block_public_policy(blocked)
            .restrict_public_buckets(blocked)
            .build();
        send(&self.retry, "PutPublicAccessBlock", || {
            self.client
                .put_public_access_block()
                .bucket(name)
                .public_access_block_configuration(block.clone())
                .send()
        })
        .await?;

        if acl == Acl::Public {
            let policy = public_policy(name).to_string();
            send(&self.retry, "PutBucketPolicy", || {
                self.client
                    .put_bucket_policy()
                    .bucket(name)
                    .policy(&policy)
                    .send()
            })
            .await?;
        }
        Ok(())
    }

    async fn apply(&self, name: &str, change: &BucketChange) -> CloudResult<()> {
        debug!(bucket = name, ?change, "applying bucket change");
        match change {
            BucketChange::Versioning(enabled) => {
                let status = if *enabled {
                    s3::BucketVersioningStatus::Enabled
                } else {
                    s3::BucketVersioningStatus::Suspended
                };
                let config = s3::VersioningConfiguration::builder().status(status).build();
                send(&self.retry, "PutBucketVersioning", || {
                    self.client
                        .put_bucket_versioning()
                        .bucket(name)
                        .versioning_configuration(config.clone())
                        .send()
                })
                .await?;
            }
            BucketChange::Encryption(true) => {
                let config = encryption_configuration()?;
                send(&self.retry, "PutBucketEncryption", || {
                    self.client
                        .put_bucket_encryption()
                        .bucket(name)
                        .server_side_encryption_configuration(config.clone())
                        .send()
                })
                .await?;
            }
            BucketChange::Encryption(false) => {
                send(&self.retry, "DeleteBucketEncryption", || {
                    self.client.delete_bucket_encryption().bucket(name).send()
                })
                .await?;
            }
            BucketChange::Metrics(true) => {
                let config = s3::MetricsConfiguration::builder()
                    .id(METRICS_ID)
                    .build()
                    .map_err(AwsError::from)?;
                send(&self.retry, "PutBucketMetricsConfiguration", || {
                    self.client
                        .put_bucket_metrics_configuration()
                        .bucket(name)
                        .id(METRICS_ID)
                        .metrics_configuration(config.clone())
                        .send()
                })
                .await?;
            }
            BucketChange::Metrics(false) => {
                send(&self.retry, "DeleteBucketMetricsConfiguration", || {
                    self.client
                        .delete_bucket_metrics_configuration()
                        .bucket(name)
                        .id(METRICS_ID)
                        .send()
                })
                .await?;
            }
            BucketChange::Cors(true) => {
                let config = cors_configuration()?;
                send(&self.retry, "PutBucketCors", || {
                    self.client
                        .put_bucket_cors()
                        .bucket(name)
                        .cors_configuration(config.clone())
                        .send()
                })
                .await?;
            }
            BucketChange::Cors(false) => {
                send(&self.retry, "DeleteBucketCors", || {
                    self.client.delete_bucket_cors().bucket(name).send()
                })
                .await?;
            }
            BucketChange::Lifecycle(0) => {
                send(&self.retry, "DeleteBucketLifecycle", || {
                    self.client.delete_bucket_lifecycle().bucket(name).send()
                })
                .await?;
            }
            BucketChange::Lifecycle(days) => {
                let config = lifecycle_configuration(*days)?;
                send(&self.retry, "PutBucketLifecycleConfiguration", || {
                    self.client
                        .put_bucket_lifecycle_configuration()
                        .bucket(name)
                        .lifecycle_configuration(config.clone())
                        .send()
                })
                .await?;
            }
            BucketChange::Tags(tags) if tags.is_empty() => {
                send(&self.retry, "DeleteBucketTagging", || {
                    self.client.delete_bucket_tagging().bucket(name).send()
                })
                .await?;
            }
            BucketChange::Tags(tags) => {
                let tagging = tagging(tags)?;
                send(&self.retry, "PutBucketTagging", || {
                    self.client
                        .put_bucket_tagging()
                        .bucket(name)
                        .tagging(tagging.clone())
                        .send()
                })
                .await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl EnsureProvider<Bucket> for S3Provider {
    fn name(&self) -> &str {
        "aws-s3"
    }

    async fn fetch(&self, spec: &BucketSpec) -> CloudResult<Option<BucketLive>> {
        let name = spec.name.as_str();
        if !self.exists(name).await? {
            return Ok(None);
        }

        Ok(Some(BucketLive {
            acl: self.read_acl(name).await?,
            versioning: self.read_versioning(name).await?,
            encryption: self.read_encryption(name).await?,
            metrics: self.read_metrics(name).await?,
            cors: self.read_cors(name).await?,
            expiration_days: self.read_expiration_days(name).await?,
            tags: self.read_tags(name).await?,
        }))
    }

    async fn create(&self, spec: &BucketSpec) -> CloudResult<()> {
        let name = spec.name.as_str();
        // us-east-1 rejects an explicit location constraint
        let configuration = self
            .region
            .as_deref()
            .filter(|region| *region != "us-east-1")
            .map(|region| {
                s3::CreateBucketConfiguration::builder()
                    .location_constraint(s3::BucketLocationConstraint::from(region))
                    .build()
            });

        info!(bucket = name, region = ?self.region, acl = spec.acl.as_str(), "creating bucket");
        send(&self.retry, "CreateBucket", || {
            self.client
                .create_bucket()
                .bucket(name)
                .set_create_bucket_configuration(configuration.clone())
                .send()
        })
        .await?;

        self.put_acl(name, spec.acl).await?;
        for change in creation_changes(spec) {
            self.apply(name, &change).await?;
        }
        Ok(())
    }

    async fn set_property(&self, name: &str, change: &BucketChange) -> CloudResult<()> {
        self.apply(name, change).await
    }
}

/// Property calls that follow CreateBucket, for every value that differs from
/// what S3 gives a new bucket
fn creation_changes(spec: &BucketSpec) -> Vec<BucketChange> {
    let mut changes = Vec::new();
    if spec.versioning.enabled {
        changes.push(BucketChange::Versioning(true));
    }
    if spec.encryption.enabled {
        changes.push(BucketChange::Encryption(true));
    }
    if spec.metrics.enabled {
        changes.push(BucketChange::Metrics(true));
    }
    if spec.cors.enabled {
        changes.push(BucketChange::Cors(true));
    }
    if spec.lifecycle.expiration_days > 0 {
        changes.push(BucketChange::Lifecycle(spec.lifecycle.expiration_days));
    }
    if !spec.tags.is_empty() {
        changes.push(BucketChange::Tags(spec.tags.clone()));
    }
    changes
}

fn public_policy(bucket: &str) -> serde_json::Value {
    serde_json::json!({
        "Version": "2012-10-17",
        "Id": "PublicRead",
        "Statement": [{
            "Sid": "PublicRead",
            "Effect": "Allow",
            "Principal": "*",
            "Action": "s3:GetObject",
            "Resource": format!("arn:aws:s3:::{}/*", bucket),
        }],
    })
}

fn encryption_configuration() -> Result<s3::ServerSideEncryptionConfiguration> {
    let default = s3::ServerSideEncryptionByDefault::builder()
        .sse_algorithm(s3::ServerSideEncryption::Aes256)
        .build()?;
    let rule = s3::ServerSideEncryptionRule::builder()
        .apply_server_side_encryption_by_default(default)
        .bucket_key_enabled(false)
        .build();
    Ok(s3::ServerSideEncryptionConfiguration::builder()
        .rules(rule)
        .build()?)
}

fn cors_configuration() -> Result<s3::CorsConfiguration> {
    let strings = |values: &[&str]| values.iter().map(|v| v.to_string()).collect::<Vec<_>>();
    let rule = s3::CorsRule::builder()
        .set_allowed_headers(Some(strings(CORS_ALLOWED_HEADERS)))
        .set_allowed_methods(Some(strings(CORS_ALLOWED_METHODS)))
        .allowed_origins("*")
        .set_expose_headers(Some(strings(CORS_EXPOSE_HEADERS)))
        .max_age_seconds(CORS_MAX_AGE_SECONDS)
        .build()?;
    Ok(s3::CorsConfiguration::builder().cors_rules(rule).build()?)
}

fn lifecycle_configuration(days: i64) -> Result<s3::BucketLifecycleConfiguration> {
    let days = i32::try_from(days).map_err(|_| AwsError::unexpected("ExpirationDays", days))?;
    #[allow(deprecated)]
    let rule = s3::LifecycleRule::builder()
        .id(format!("ttlDays={}", days))
        .prefix("")
        .expiration(s3::LifecycleExpiration::builder().days(days).build())
        .status(s3::ExpirationStatus::Enabled)
        .build()?;
    Ok(s3::BucketLifecycleConfiguration::builder()
        .rules(rule)
        .build()?)
}

fn tagging(tags: &[Tag]) -> Result<s3::Tagging> {
    let tag_set = tags
        .iter()
        .map(|tag| s3::Tag::builder().key(&tag.key).value(&tag.value).build())
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(s3::Tagging::builder().set_tag_set(Some(tag_set)).build()?)
}
