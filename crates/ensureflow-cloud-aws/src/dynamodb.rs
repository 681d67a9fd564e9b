//! DynamoDB table provider

use std::time::Duration;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::operation::update_table::builders::UpdateTableFluentBuilder;
use aws_sdk_dynamodb::types as ddb;
use ensureflow_cloud::{
    CloudError, CloudResult, EnsureProvider, RetryConfig, Table, TableChange, TableLive,
    with_retry,
};
use ensureflow_core::kinds::table::{
    AttributeDefinition, AttributeType, BillingMode, GlobalSecondaryIndex, KeySchemaElement,
    KeyType, LocalSecondaryIndex, Projection, ProjectionType, ProvisionedThroughput,
    SseSpecification, SseType, StreamSpecification, StreamViewType, TimeToLiveSpecification,
};
use ensureflow_core::{TableSpec, Tag};
use tracing::{debug, info};

use crate::error::{AwsError, Result, sdk_error};

/// How long to wait for a new table to become ACTIVE before enabling TTL
const ACTIVE_POLL_ATTEMPTS: u32 = 60;
const ACTIVE_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct DynamoDbProvider {
    client: Client,
    retry: RetryConfig,
}

impl DynamoDbProvider {
    pub fn new(config: &SdkConfig, retry: RetryConfig) -> Self {
        Self::from_client(Client::new(config), retry)
    }

    pub fn from_client(client: Client, retry: RetryConfig) -> Self {
        Self { client, retry }
    }

    async fn describe(&self, name: &str) -> CloudResult<Option<ddb::TableDescription>> {
        with_retry(&self.retry, "DescribeTable", || async move {
            match self.client.describe_table().table_name(name).send().await {
                Ok(output) => Ok(output.table),
                Err(err) => match sdk_error("DescribeTable", err) {
                    CloudError::ResourceNotFound(_) => Ok(None),
                    other => Err(other),
                },
            }
        })
        .await
    }

    async fn table_arn(&self, name: &str) -> CloudResult<String> {
        self.describe(name)
            .await?
            .and_then(|table| table.table_arn)
            .ok_or_else(|| CloudError::ResourceNotFound(format!("table {}", name)))
    }

    async fn list_tags(&self, arn: &str) -> CloudResult<Vec<Tag>> {
        let mut tags = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let token = next_token.as_deref();
            let output = with_retry(&self.retry, "ListTagsOfResource", || async move {
                self.client
                    .list_tags_of_resource()
                    .resource_arn(arn)
                    .set_next_token(token.map(str::to_string))
                    .send()
                    .await
                    .map_err(|e| sdk_error("ListTagsOfResource", e))
            })
            .await?;

            tags.extend(output.tags().iter().map(|tag| Tag::new(tag.key(), tag.value())));
            match output.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }
        Ok(tags)
    }

    async fn describe_time_to_live(&self, name: &str) -> CloudResult<TimeToLiveSpecification> {
        let output = with_retry(&self.retry, "DescribeTimeToLive", || async move {
            self.client
                .describe_time_to_live()
                .table_name(name)
                .send()
                .await
                .map_err(|e| sdk_error("DescribeTimeToLive", e))
        })
        .await?;

        Ok(output
            .time_to_live_description()
            .map(|description| TimeToLiveSpecification {
                attribute_name: description.attribute_name().map(str::to_string),
                enabled: Some(matches!(
                    description.time_to_live_status(),
                    Some(ddb::TimeToLiveStatus::Enabled | ddb::TimeToLiveStatus::Enabling)
                )),
            })
            .unwrap_or_default())
    }

    async fn wait_until_active(&self, name: &str) -> CloudResult<()> {
        for _ in 0..ACTIVE_POLL_ATTEMPTS {
            let status = self
                .describe(name)
                .await?
                .and_then(|table| table.table_status);
            if status == Some(ddb::TableStatus::Active) {
                return Ok(());
            }
            debug!(table = name, ?status, "waiting for table to become active");
            tokio::time::sleep(ACTIVE_POLL_INTERVAL).await;
        }
        Err(CloudError::Timeout(format!("table {} did not become ACTIVE", name)))
    }

    async fn update_table<F>(&self, name: &str, customize: F) -> CloudResult<()>
    where
        F: Fn(UpdateTableFluentBuilder) -> UpdateTableFluentBuilder + Send + Sync,
    {
        with_retry(&self.retry, "UpdateTable", || {
            let request = customize(self.client.update_table().table_name(name));
            async move {
                request
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|e| sdk_error("UpdateTable", e))
            }
        })
        .await
    }

    async fn update_time_to_live(
        &self,
        name: &str,
        attribute_name: &str,
        enabled: bool,
    ) -> CloudResult<()> {
        let specification = ddb::TimeToLiveSpecification::builder()
            .attribute_name(attribute_name)
            .enabled(enabled)
            .build()
            .map_err(AwsError::from)?;

        with_retry(&self.retry, "UpdateTimeToLive", || {
            let request = self
                .client
                .update_time_to_live()
                .table_name(name)
                .time_to_live_specification(specification.clone());
            async move {
                request
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|e| sdk_error("UpdateTimeToLive", e))
            }
        })
        .await
    }
}

#[async_trait]
impl EnsureProvider<Table> for DynamoDbProvider {
    fn name(&self) -> &str {
        "aws-dynamodb"
    }

    async fn fetch(&self, spec: &TableSpec) -> CloudResult<Option<TableLive>> {
        let name = spec.table_name.as_str();
        let Some(table) = self.describe(name).await? else {
            return Ok(None);
        };

        let tags = match table.table_arn() {
            Some(arn) => self.list_tags(arn).await?,
            None => Vec::new(),
        };
        let time_to_live = self.describe_time_to_live(name).await?;

        Ok(Some(table_live(&table, tags, time_to_live)?))
    }

    async fn create(&self, spec: &TableSpec) -> CloudResult<()> {
        let provisioned = spec.billing_mode == BillingMode::Provisioned;

        let attribute_definitions = spec
            .attribute_definitions
            .iter()
            .map(attribute_definition)
            .collect::<Result<Vec<_>>>()?;
        let keys = key_schema(&spec.key_schema)?;
        let throughput = if provisioned {
            Some(provisioned_throughput(&spec.provisioned_throughput)?)
        } else {
            None
        };
        let stream = if spec.stream_specification.stream_enabled {
            Some(stream_specification(&spec.stream_specification)?)
        } else {
            None
        };
        let sse = (!spec.sse_specification.is_empty())
            .then(|| sse_specification(&spec.sse_specification));
        let local_indexes = spec
            .local_secondary_indexes
            .iter()
            .map(local_index)
            .collect::<Result<Vec<_>>>()?;
        let global_indexes = spec
            .global_secondary_indexes
            .iter()
            .map(|index| global_index(index, provisioned))
            .collect::<Result<Vec<_>>>()?;
        let tags = spec.tags.iter().map(tag).collect::<Result<Vec<_>>>()?;

        info!(table = %spec.table_name, billing_mode = spec.billing_mode.as_str(), "creating table");
        with_retry(&self.retry, "CreateTable", || {
            let request = self
                .client
                .create_table()
                .table_name(&spec.table_name)
                .set_attribute_definitions(Some(attribute_definitions.clone()))
                .set_key_schema(Some(keys.clone()))
                .billing_mode(ddb::BillingMode::from(spec.billing_mode.as_str()))
                .set_provisioned_throughput(throughput.clone())
                .set_stream_specification(stream.clone())
                .set_sse_specification(sse.clone())
                .set_local_secondary_indexes(non_empty(&local_indexes))
                .set_global_secondary_indexes(non_empty(&global_indexes))
                .set_tags(non_empty(&tags));
            async move {
                match request.send().await {
                    Ok(_) => Ok(()),
                    Err(err) => match sdk_error("CreateTable", err) {
                        // CreateTable reports an existing table as "in use"
                        CloudError::ApiError { code, message } if code == "ResourceInUseException" => {
                            Err(CloudError::ResourceAlreadyExists(message))
                        }
                        other => Err(other),
                    },
                }
            }
        })
        .await?;

        let ttl = &spec.time_to_live_specification;
        if let (Some(true), Some(attribute_name)) = (ttl.enabled, ttl.attribute_name.as_deref()) {
            self.wait_until_active(&spec.table_name).await?;
            self.update_time_to_live(&spec.table_name, attribute_name, true)
                .await?;
        }
        Ok(())
    }

    async fn set_property(&self, name: &str, change: &TableChange) -> CloudResult<()> {
        debug!(table = name, ?change, "applying table change");
        match change {
            TableChange::Throughput {
                billing_mode,
                throughput,
            } => {
                let units = match billing_mode {
                    BillingMode::Provisioned => Some(provisioned_throughput(throughput)?),
                    BillingMode::PayPerRequest => None,
                };
                let mode = ddb::BillingMode::from(billing_mode.as_str());
                self.update_table(name, |request| {
                    request
                        .billing_mode(mode.clone())
                        .set_provisioned_throughput(units.clone())
                })
                .await
            }
            TableChange::Stream(stream) => {
                let stream = stream_specification(stream)?;
                self.update_table(name, |request| request.stream_specification(stream.clone()))
                    .await
            }
            TableChange::CreateGlobalIndex {
                index,
                attribute_definitions,
            } => {
                let action = ddb::CreateGlobalSecondaryIndexAction::builder()
                    .index_name(&index.index_name)
                    .set_key_schema(Some(key_schema(&index.key_schema)?))
                    .projection(projection(&index.projection))
                    .set_provisioned_throughput(optional_throughput(&index.provisioned_throughput)?)
                    .build()
                    .map_err(AwsError::from)?;
                let update = ddb::GlobalSecondaryIndexUpdate::builder()
                    .create(action)
                    .build();
                let definitions = attribute_definitions
                    .iter()
                    .map(attribute_definition)
                    .collect::<Result<Vec<_>>>()?;
                self.update_table(name, |request| {
                    request
                        .set_attribute_definitions(Some(definitions.clone()))
                        .global_secondary_index_updates(update.clone())
                })
                .await
            }
            TableChange::UpdateGlobalIndex {
                index_name,
                throughput,
            } => {
                let action = ddb::UpdateGlobalSecondaryIndexAction::builder()
                    .index_name(index_name)
                    .provisioned_throughput(provisioned_throughput(throughput)?)
                    .build()
                    .map_err(AwsError::from)?;
                let update = ddb::GlobalSecondaryIndexUpdate::builder()
                    .update(action)
                    .build();
                self.update_table(name, |request| {
                    request.global_secondary_index_updates(update.clone())
                })
                .await
            }
            TableChange::DeleteGlobalIndex { index_name } => {
                let action = ddb::DeleteGlobalSecondaryIndexAction::builder()
                    .index_name(index_name)
                    .build()
                    .map_err(AwsError::from)?;
                let update = ddb::GlobalSecondaryIndexUpdate::builder()
                    .delete(action)
                    .build();
                self.update_table(name, |request| {
                    request.global_secondary_index_updates(update.clone())
                })
                .await
            }
            TableChange::TagResource(tags) => {
                let arn = self.table_arn(name).await?;
                let tags = tags.iter().map(tag).collect::<Result<Vec<_>>>()?;
                with_retry(&self.retry, "TagResource", || {
                    let request = self
                        .client
                        .tag_resource()
                        .resource_arn(&arn)
                        .set_tags(Some(tags.clone()));
                    async move {
                        request
                            .send()
                            .await
                            .map(|_| ())
                            .map_err(|e| sdk_error("TagResource", e))
                    }
                })
                .await
            }
            TableChange::UntagResource(keys) => {
                let arn = self.table_arn(name).await?;
                with_retry(&self.retry, "UntagResource", || {
                    let request = self
                        .client
                        .untag_resource()
                        .resource_arn(&arn)
                        .set_tag_keys(Some(keys.clone()));
                    async move {
                        request
                            .send()
                            .await
                            .map(|_| ())
                            .map_err(|e| sdk_error("UntagResource", e))
                    }
                })
                .await
            }
            TableChange::TimeToLive {
                attribute_name,
                enabled,
            } => {
                self.update_time_to_live(name, attribute_name, *enabled)
                    .await
            }
        }
    }
}

fn non_empty<T: Clone>(items: &[T]) -> Option<Vec<T>> {
    (!items.is_empty()).then(|| items.to_vec())
}

// ensureflow -> DynamoDB

fn attribute_definition(definition: &AttributeDefinition) -> Result<ddb::AttributeDefinition> {
    Ok(ddb::AttributeDefinition::builder()
        .attribute_name(&definition.attribute_name)
        .attribute_type(ddb::ScalarAttributeType::from(
            definition.attribute_type.as_str(),
        ))
        .build()?)
}

fn key_schema(keys: &[KeySchemaElement]) -> Result<Vec<ddb::KeySchemaElement>> {
    keys.iter()
        .map(|key| {
            Ok(ddb::KeySchemaElement::builder()
                .attribute_name(&key.attribute_name)
                .key_type(ddb::KeyType::from(key.key_type.as_str()))
                .build()?)
        })
        .collect()
}

fn provisioned_throughput(throughput: &ProvisionedThroughput) -> Result<ddb::ProvisionedThroughput> {
    match (throughput.read_capacity_units, throughput.write_capacity_units) {
        (Some(read), Some(write)) => Ok(ddb::ProvisionedThroughput::builder()
            .read_capacity_units(read)
            .write_capacity_units(write)
            .build()?),
        _ => Err(AwsError::UnexpectedValue {
            field: "ProvisionedThroughput",
            value: "both ReadCapacityUnits and WriteCapacityUnits are required".to_string(),
        }),
    }
}

fn optional_throughput(
    throughput: &ProvisionedThroughput,
) -> Result<Option<ddb::ProvisionedThroughput>> {
    if throughput.is_empty() {
        return Ok(None);
    }
    provisioned_throughput(throughput).map(Some)
}

fn stream_specification(stream: &StreamSpecification) -> Result<ddb::StreamSpecification> {
    Ok(ddb::StreamSpecification::builder()
        .stream_enabled(stream.stream_enabled)
        .set_stream_view_type(
            stream
                .stream_view_type
                .map(|view| ddb::StreamViewType::from(view.as_str())),
        )
        .build()?)
}

fn sse_specification(sse: &SseSpecification) -> ddb::SseSpecification {
    ddb::SseSpecification::builder()
        .set_enabled(sse.enabled)
        .set_sse_type(sse.sse_type.map(|sse_type| ddb::SseType::from(sse_type.as_str())))
        .set_kms_master_key_id(sse.kms_master_key_id.clone())
        .build()
}

fn projection(projection: &Projection) -> ddb::Projection {
    let projection_type = projection.projection_type.unwrap_or(ProjectionType::All);
    ddb::Projection::builder()
        .projection_type(ddb::ProjectionType::from(projection_type.as_str()))
        .set_non_key_attributes(non_empty(&projection.non_key_attributes))
        .build()
}

fn local_index(index: &LocalSecondaryIndex) -> Result<ddb::LocalSecondaryIndex> {
    Ok(ddb::LocalSecondaryIndex::builder()
        .index_name(&index.index_name)
        .set_key_schema(Some(key_schema(&index.key_schema)?))
        .projection(projection(&index.projection))
        .build()?)
}

fn global_index(index: &GlobalSecondaryIndex, provisioned: bool) -> Result<ddb::GlobalSecondaryIndex> {
    let throughput = if provisioned {
        optional_throughput(&index.provisioned_throughput)?
    } else {
        None
    };
    Ok(ddb::GlobalSecondaryIndex::builder()
        .index_name(&index.index_name)
        .set_key_schema(Some(key_schema(&index.key_schema)?))
        .projection(projection(&index.projection))
        .set_provisioned_throughput(throughput)
        .build()?)
}

fn tag(tag: &Tag) -> Result<ddb::Tag> {
    Ok(ddb::Tag::builder().key(&tag.key).value(&tag.value).build()?)
}

// DynamoDB -> ensureflow

fn table_live(
    table: &ddb::TableDescription,
    tags: Vec<Tag>,
    time_to_live: TimeToLiveSpecification,
) -> Result<TableLive> {
    let attribute_definitions = table
        .attribute_definitions()
        .iter()
        .map(|definition| {
            Ok(AttributeDefinition {
                attribute_name: definition.attribute_name().to_string(),
                attribute_type: attribute_type(definition.attribute_type())?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let local_secondary_indexes = table
        .local_secondary_indexes()
        .iter()
        .map(|index| {
            Ok(LocalSecondaryIndex {
                index_name: index.index_name().unwrap_or_default().to_string(),
                key_schema: keys_from(index.key_schema())?,
                projection: projection_from(index.projection())?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let global_secondary_indexes = table
        .global_secondary_indexes()
        .iter()
        .map(|index| {
            Ok(GlobalSecondaryIndex {
                index_name: index.index_name().unwrap_or_default().to_string(),
                key_schema: keys_from(index.key_schema())?,
                projection: projection_from(index.projection())?,
                provisioned_throughput: index
                    .provisioned_throughput()
                    .map(throughput_from)
                    .unwrap_or_default(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(TableLive {
        arn: table.table_arn().unwrap_or_default().to_string(),
        attribute_definitions,
        key_schema: keys_from(table.key_schema())?,
        billing_mode: table
            .billing_mode_summary()
            .and_then(|summary| summary.billing_mode())
            .map(billing_mode)
            .transpose()?,
        provisioned_throughput: table
            .provisioned_throughput()
            .map(throughput_from)
            .unwrap_or_default(),
        stream_specification: table
            .stream_specification()
            .map(stream_from)
            .transpose()?
            .unwrap_or_default(),
        sse_specification: sse_from(table.sse_description())?,
        local_secondary_indexes,
        global_secondary_indexes,
        tags,
        time_to_live,
    })
}

fn keys_from(keys: &[ddb::KeySchemaElement]) -> Result<Vec<KeySchemaElement>> {
    keys.iter()
        .map(|key| {
            let key_type = match key.key_type() {
                ddb::KeyType::Hash => KeyType::Hash,
                ddb::KeyType::Range => KeyType::Range,
                other => return Err(AwsError::unexpected("KeyType", other)),
            };
            Ok(KeySchemaElement {
                attribute_name: key.attribute_name().to_string(),
                key_type,
            })
        })
        .collect()
}

fn attribute_type(value: &ddb::ScalarAttributeType) -> Result<AttributeType> {
    match value {
        ddb::ScalarAttributeType::S => Ok(AttributeType::S),
        ddb::ScalarAttributeType::N => Ok(AttributeType::N),
        ddb::ScalarAttributeType::B => Ok(AttributeType::B),
        other => Err(AwsError::unexpected("AttributeType", other)),
    }
}

fn billing_mode(value: &ddb::BillingMode) -> Result<BillingMode> {
    match value {
        ddb::BillingMode::Provisioned => Ok(BillingMode::Provisioned),
        ddb::BillingMode::PayPerRequest => Ok(BillingMode::PayPerRequest),
        other => Err(AwsError::unexpected("BillingMode", other)),
    }
}

/// On-demand tables report zero units
fn throughput_from(description: &ddb::ProvisionedThroughputDescription) -> ProvisionedThroughput {
    ProvisionedThroughput {
        read_capacity_units: description.read_capacity_units().filter(|units| *units > 0),
        write_capacity_units: description.write_capacity_units().filter(|units| *units > 0),
    }
}

fn stream_from(stream: &ddb::StreamSpecification) -> Result<StreamSpecification> {
    let stream_view_type = stream
        .stream_view_type()
        .map(|view| match view {
            ddb::StreamViewType::NewImage => Ok(StreamViewType::NewImage),
            ddb::StreamViewType::OldImage => Ok(StreamViewType::OldImage),
            ddb::StreamViewType::NewAndOldImages => Ok(StreamViewType::NewAndOldImages),
            ddb::StreamViewType::KeysOnly => Ok(StreamViewType::KeysOnly),
            other => Err(AwsError::unexpected("StreamViewType", other)),
        })
        .transpose()?;
    Ok(StreamSpecification {
        stream_enabled: stream.stream_enabled(),
        stream_view_type,
    })
}

/// A table without an SSE description uses the AWS owned key
fn sse_from(description: Option<&ddb::SseDescription>) -> Result<SseSpecification> {
    let Some(sse) = description else {
        return Ok(SseSpecification::default());
    };

    let sse_type = sse
        .sse_type()
        .map(|sse_type| match sse_type {
            ddb::SseType::Aes256 => Ok(SseType::Aes256),
            ddb::SseType::Kms => Ok(SseType::Kms),
            other => Err(AwsError::unexpected("SSEType", other)),
        })
        .transpose()?;
    Ok(SseSpecification {
        enabled: Some(matches!(
            sse.status(),
            Some(ddb::SseStatus::Enabled | ddb::SseStatus::Enabling | ddb::SseStatus::Updating)
        )),
        sse_type,
        kms_master_key_id: sse.kms_master_key_arn().map(str::to_string),
    })
}

fn projection_from(projection: Option<&ddb::Projection>) -> Result<Projection> {
    let Some(projection) = projection else {
        return Ok(Projection::default());
    };

    let projection_type = projection
        .projection_type()
        .map(|projection_type| match projection_type {
            ddb::ProjectionType::All => Ok(ProjectionType::All),
            ddb::ProjectionType::KeysOnly => Ok(ProjectionType::KeysOnly),
            ddb::ProjectionType::Include => Ok(ProjectionType::Include),
            other => Err(AwsError::unexpected("ProjectionType", other)),
        })
        .transpose()?;
    Ok(Projection {
        projection_type,
        non_key_attributes: projection.non_key_attributes().to_vec(),
    })
}
