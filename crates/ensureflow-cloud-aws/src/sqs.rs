//! SQS queue provider

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sqs::Client;
use aws_sdk_sqs::types::QueueAttributeName;
use ensureflow_cloud::{
    CloudError, CloudResult, EnsureProvider, Queue, QueueChange, QueueLive, RetryConfig,
    with_retry,
};
use ensureflow_core::{QueueSpec, Tag};
use tracing::{debug, info};

use crate::error::{sdk_error, send};

pub struct SqsProvider {
    client: Client,
    retry: RetryConfig,
}

impl SqsProvider {
    pub fn new(config: &SdkConfig, retry: RetryConfig) -> Self {
        Self {
            client: Client::new(config),
            retry,
        }
    }

    async fn queue_url(&self, name: &str) -> CloudResult<Option<String>> {
        with_retry(&self.retry, "GetQueueUrl", || async move {
            match self.client.get_queue_url().queue_name(name).send().await {
                Ok(output) => Ok(output.queue_url),
                Err(err) => match sdk_error("GetQueueUrl", err) {
                    CloudError::ResourceNotFound(_) => Ok(None),
                    other => Err(other),
                },
            }
        })
        .await
    }

    async fn require_url(&self, name: &str) -> CloudResult<String> {
        self.queue_url(name)
            .await?
            .ok_or_else(|| CloudError::ResourceNotFound(format!("queue {}", name)))
    }
}

#[async_trait]
impl EnsureProvider<Queue> for SqsProvider {
    fn name(&self) -> &str {
        "aws-sqs"
    }

    async fn fetch(&self, spec: &QueueSpec) -> CloudResult<Option<QueueLive>> {
        let Some(url) = self.queue_url(&spec.queue_name).await? else {
            return Ok(None);
        };

        let attributes = send(&self.retry, "GetQueueAttributes", || {
            self.client
                .get_queue_attributes()
                .queue_url(&url)
                .attribute_names(QueueAttributeName::All)
                .send()
        })
        .await?;
        let tags = send(&self.retry, "ListQueueTags", || {
            self.client.list_queue_tags().queue_url(&url).send()
        })
        .await?;

        let attributes = attributes
            .attributes()
            .map(|attributes| {
                attributes
                    .iter()
                    .map(|(name, value)| (name.as_str().to_string(), value.clone()))
                    .collect::<BTreeMap<_, _>>()
            })
            .unwrap_or_default();

        Ok(Some(QueueLive {
            url,
            attributes,
            tags: tags.tags().map(tags_from).unwrap_or_default(),
        }))
    }

    async fn create(&self, spec: &QueueSpec) -> CloudResult<()> {
        let attributes: HashMap<QueueAttributeName, String> = spec
            .attributes
            .entries()
            .into_iter()
            .map(|(name, value)| (QueueAttributeName::from(name), value))
            .collect();
        let tags = tags_to(&spec.tags);

        info!(queue = %spec.queue_name, attributes = attributes.len(), "creating queue");
        send(&self.retry, "CreateQueue", || {
            self.client
                .create_queue()
                .queue_name(&spec.queue_name)
                .set_attributes(Some(attributes.clone()))
                .set_tags((!tags.is_empty()).then(|| tags.clone()))
                .send()
        })
        .await?;
        Ok(())
    }

    async fn set_property(&self, name: &str, change: &QueueChange) -> CloudResult<()> {
        debug!(queue = name, ?change, "applying queue change");
        let url = self.require_url(name).await?;

        match change {
            QueueChange::SetAttribute { name, value } => {
                send(&self.retry, "SetQueueAttributes", || {
                    self.client
                        .set_queue_attributes()
                        .queue_url(&url)
                        .attributes(QueueAttributeName::from(*name), value)
                        .send()
                })
                .await?;
            }
            QueueChange::TagQueue(tags) => {
                let tags = tags_to(tags);
                send(&self.retry, "TagQueue", || {
                    self.client
                        .tag_queue()
                        .queue_url(&url)
                        .set_tags(Some(tags.clone()))
                        .send()
                })
                .await?;
            }
            QueueChange::UntagQueue(keys) => {
                send(&self.retry, "UntagQueue", || {
                    self.client
                        .untag_queue()
                        .queue_url(&url)
                        .set_tag_keys(Some(keys.clone()))
                        .send()
                })
                .await?;
            }
        }
        Ok(())
    }
}

/// Sorted by key so plans are stable
fn tags_from(tags: &HashMap<String, String>) -> Vec<Tag> {
    tags.iter()
        .collect::<BTreeMap<_, _>>()
        .into_iter()
        .map(|(key, value)| Tag::new(key, value))
        .collect()
}

fn tags_to(tags: &[Tag]) -> HashMap<String, String> {
    tags.iter()
        .map(|tag| (tag.key.clone(), tag.value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_sorted() {
        let tags = HashMap::from([
            ("team".to_string(), "core".to_string()),
            ("env".to_string(), "prod".to_string()),
        ]);
        assert_eq!(
            tags_from(&tags),
            vec![Tag::new("env", "prod"), Tag::new("team", "core")]
        );
        assert_eq!(tags_to(&tags_from(&tags)), tags);
    }

    #[test]
    fn test_attribute_names_round_trip() {
        for name in ["DelaySeconds", "VisibilityTimeout", "KmsMasterKeyId"] {
            assert_eq!(QueueAttributeName::from(name).as_str(), name);
        }
    }
}
