//! Route53 record provider

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_route53::Client;
use aws_sdk_route53::types as r53;
use ensureflow_cloud::{CloudError, CloudResult, EnsureProvider, Record, RecordChange, RecordLive, RetryConfig};
use ensureflow_core::RecordSpec;
use ensureflow_core::kinds::record::{AliasTarget, trim_dot};
use tracing::{debug, info};

use crate::error::{Result, send};

/// A hosted zone as listed by ListHostedZones
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneRef {
    /// Id without the `/hostedzone/` prefix
    pub id: String,
    /// Zone name without the trailing dot
    pub name: String,
}

pub struct Route53Provider {
    client: Client,
    retry: RetryConfig,
}

impl Route53Provider {
    pub fn new(config: &SdkConfig, retry: RetryConfig) -> Self {
        Self {
            client: Client::new(config),
            retry,
        }
    }

    async fn list_zones(&self) -> CloudResult<Vec<ZoneRef>> {
        let mut zones = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let output = send(&self.retry, "ListHostedZones", || {
                self.client
                    .list_hosted_zones()
                    .set_marker(marker.clone())
                    .send()
            })
            .await?;

            zones.extend(output.hosted_zones().iter().map(|zone| ZoneRef {
                id: zone.id().trim_start_matches("/hostedzone/").to_string(),
                name: trim_dot(zone.name()).to_ascii_lowercase(),
            }));
            match output.next_marker() {
                Some(next) if output.is_truncated() => marker = Some(next.to_string()),
                _ => break,
            }
        }
        Ok(zones)
    }

    async fn zone(&self, spec: &RecordSpec) -> CloudResult<ZoneRef> {
        let zones = self.list_zones().await?;
        zone_for(spec.fqdn(), spec.zone.as_deref(), &zones)
            .cloned()
            .ok_or_else(|| {
                CloudError::InvalidConfig(format!("no hosted zone found for record '{}'", spec.fqdn()))
            })
    }

    async fn upsert(&self, zone_id: &str, record: &RecordSpec) -> CloudResult<()> {
        let batch = change_batch(record)?;
        send(&self.retry, "ChangeResourceRecordSets", || {
            self.client
                .change_resource_record_sets()
                .hosted_zone_id(zone_id)
                .change_batch(batch.clone())
                .send()
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl EnsureProvider<Record> for Route53Provider {
    fn name(&self) -> &str {
        "aws-route53"
    }

    async fn fetch(&self, spec: &RecordSpec) -> CloudResult<Option<RecordLive>> {
        let zone = self.zone(spec).await?;
        let record_type = r53::RrType::from(spec.record_type.as_str());

        let output = send(&self.retry, "ListResourceRecordSets", || {
            self.client
                .list_resource_record_sets()
                .hosted_zone_id(&zone.id)
                .start_record_name(spec.fqdn())
                .start_record_type(record_type.clone())
                .max_items(1)
                .send()
        })
        .await?;

        // the listing only starts at the name, the next record may be another one
        let found = output.resource_record_sets().iter().find(|set| {
            trim_dot(set.name()).eq_ignore_ascii_case(spec.fqdn()) && *set.r#type() == record_type
        });
        Ok(found.map(|set| record_live(&zone.id, set)))
    }

    async fn create(&self, spec: &RecordSpec) -> CloudResult<()> {
        let zone = self.zone(spec).await?;
        info!(record = spec.fqdn(), zone = %zone.name, record_type = %spec.record_type, "creating record");
        self.upsert(&zone.id, spec).await
    }

    async fn set_property(&self, name: &str, change: &RecordChange) -> CloudResult<()> {
        debug!(record = name, ?change, "applying record change");
        match change {
            RecordChange::Upsert { zone_id, record } => self.upsert(zone_id, record).await,
        }
    }
}

/// The zone a record belongs to: the named zone if given, otherwise the
/// longest zone the record name falls under
pub fn zone_for<'a>(record: &str, zone: Option<&str>, zones: &'a [ZoneRef]) -> Option<&'a ZoneRef> {
    let record = trim_dot(record).to_ascii_lowercase();
    match zone {
        Some(zone) => {
            let zone = trim_dot(zone).to_ascii_lowercase();
            zones.iter().find(|candidate| candidate.name == zone)
        }
        None => zones
            .iter()
            .filter(|candidate| {
                record == candidate.name || record.ends_with(&format!(".{}", candidate.name))
            })
            .max_by_key(|candidate| candidate.name.len()),
    }
}

fn record_live(zone_id: &str, set: &r53::ResourceRecordSet) -> RecordLive {
    RecordLive {
        zone_id: zone_id.to_string(),
        record_type: set.r#type().as_str().to_string(),
        ttl: set.ttl(),
        values: set
            .resource_records()
            .iter()
            .map(|record| record.value().to_string())
            .collect(),
        alias_target: set.alias_target().map(|alias| AliasTarget {
            dns_name: trim_dot(alias.dns_name()).to_string(),
            hosted_zone_id: alias.hosted_zone_id().to_string(),
            evaluate_target_health: alias.evaluate_target_health(),
        }),
    }
}

fn change_batch(record: &RecordSpec) -> Result<r53::ChangeBatch> {
    let change = r53::Change::builder()
        .action(r53::ChangeAction::Upsert)
        .resource_record_set(record_set(record)?)
        .build()?;
    Ok(r53::ChangeBatch::builder().changes(change).build()?)
}

fn record_set(record: &RecordSpec) -> Result<r53::ResourceRecordSet> {
    let mut set = r53::ResourceRecordSet::builder()
        .name(record.fqdn())
        .r#type(r53::RrType::from(record.record_type.as_str()));

    match &record.alias_target {
        Some(alias) => {
            set = set.alias_target(
                r53::AliasTarget::builder()
                    .dns_name(&alias.dns_name)
                    .hosted_zone_id(&alias.hosted_zone_id)
                    .evaluate_target_health(alias.evaluate_target_health)
                    .build()?,
            );
        }
        None => {
            set = set.set_ttl(record.effective_ttl());
            for value in &record.values {
                set = set.resource_records(r53::ResourceRecord::builder().value(value).build()?);
            }
        }
    }

    Ok(set.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zones() -> Vec<ZoneRef> {
        ["example.com", "dev.example.com", "example.org"]
            .iter()
            .enumerate()
            .map(|(i, name)| ZoneRef {
                id: format!("Z{}", i),
                name: name.to_string(),
            })
            .collect()
    }

    fn record(tokens: &[&str]) -> RecordSpec {
        ensureflow_core::compile(ensureflow_core::ResourceKind::Record, "api.dev.example.com", tokens)
            .unwrap()
            .decode()
            .unwrap()
    }

    #[test]
    fn test_zone_for_prefers_longest_suffix() {
        let zones = zones();
        assert_eq!(zone_for("api.dev.example.com.", None, &zones).unwrap().id, "Z1");
        assert_eq!(zone_for("www.example.com", None, &zones).unwrap().id, "Z0");
        assert_eq!(zone_for("example.org", None, &zones).unwrap().id, "Z2");
        assert!(zone_for("notexample.com", None, &zones).is_none());
    }

    #[test]
    fn test_zone_for_named_zone() {
        let zones = zones();
        assert_eq!(zone_for("api.dev.example.com", Some("Example.com."), &zones).unwrap().id, "Z0");
        assert!(zone_for("api.dev.example.com", Some("example.net"), &zones).is_none());
    }

    #[test]
    fn test_record_set_for_values() {
        let spec = record(&["10.0.0.1", "10.0.0.2"]);
        assert_eq!(change_batch(&spec).unwrap().changes().len(), 1);

        let set = record_set(&spec).unwrap();
        assert_eq!(set.name(), "api.dev.example.com");
        assert_eq!(*set.r#type(), r53::RrType::A);
        assert_eq!(set.ttl(), Some(300));
        assert_eq!(set.resource_records().len(), 2);
        assert!(set.alias_target().is_none());
    }

    #[test]
    fn test_record_set_for_alias() {
        let set = record_set(&record(&["alias=d111.cloudfront.net", "aliaszone=Z2FDTNDATAQYW2"])).unwrap();

        assert_eq!(set.ttl(), None);
        assert!(set.resource_records().is_empty());
        assert_eq!(set.alias_target().unwrap().hosted_zone_id(), "Z2FDTNDATAQYW2");
    }
}
