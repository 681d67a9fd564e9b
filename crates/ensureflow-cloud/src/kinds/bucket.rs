//! S3 bucket planning

use ensureflow_core::kinds::bucket::Acl;
use ensureflow_core::{BucketSpec, DesiredState, ResourceKind, Tag};

use super::{diff_tags, format_tags};
use crate::action::{PropertyChange, Violation};
use crate::provider::ResourceModel;

/// Marker for the bucket resource kind
#[derive(Debug, Clone, Copy, Default)]
pub struct Bucket;

/// Observed state of an existing bucket
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BucketLive {
    pub acl: Acl,
    pub versioning: bool,
    pub encryption: bool,
    pub metrics: bool,
    pub cors: bool,
    /// 0 when no expiration rule is configured
    pub expiration_days: i64,
    pub tags: Vec<Tag>,
}

/// One S3 call that converges a bucket property
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketChange {
    Versioning(bool),
    Encryption(bool),
    Metrics(bool),
    Cors(bool),
    Lifecycle(i64),
    /// PutBucketTagging replaces the whole tag set
    Tags(Vec<Tag>),
}

impl ResourceModel for Bucket {
    type Spec = BucketSpec;
    type Live = BucketLive;
    type Change = BucketChange;

    const KIND: ResourceKind = ResourceKind::Bucket;

    fn diff(
        desired: &DesiredState,
        spec: &BucketSpec,
        live: &BucketLive,
    ) -> Result<Vec<PropertyChange<BucketChange>>, Violation> {
        if desired.is_supplied("Acl") && spec.acl != live.acl {
            return Err(Violation::new(
                "Acl",
                format!(
                    "acl public/private can only be set at bucket creation ({} -> {})",
                    live.acl.as_str(),
                    spec.acl.as_str()
                ),
            ));
        }

        let toggles: [(&str, bool, bool, fn(bool) -> BucketChange); 4] = [
            ("Versioning", spec.versioning.enabled, live.versioning, BucketChange::Versioning),
            ("Encryption", spec.encryption.enabled, live.encryption, BucketChange::Encryption),
            ("Metrics", spec.metrics.enabled, live.metrics, BucketChange::Metrics),
            ("Cors", spec.cors.enabled, live.cors, BucketChange::Cors),
        ];

        let mut changes = Vec::new();
        for (property, wanted, current, change) in toggles {
            if desired.is_supplied(property) && wanted != current {
                changes.push(PropertyChange::update(property, current, wanted, change(wanted)));
            }
        }

        let days = spec.lifecycle.expiration_days;
        if desired.is_supplied("Lifecycle") && days != live.expiration_days {
            changes.push(PropertyChange::update(
                "Lifecycle.ExpirationDays",
                live.expiration_days,
                days,
                BucketChange::Lifecycle(days),
            ));
        }

        if desired.is_supplied("Tags") {
            let (upserts, removals) = diff_tags(&spec.tags, &live.tags);
            if !upserts.is_empty() || !removals.is_empty() {
                changes.push(PropertyChange::update(
                    "Tags",
                    format_tags(&live.tags),
                    format_tags(&spec.tags),
                    BucketChange::Tags(spec.tags.clone()),
                ));
            }
        }

        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ensureflow_core::compile;

    fn plan(tokens: &[&str], live: &BucketLive) -> Result<Vec<PropertyChange<BucketChange>>, Violation> {
        let desired = compile(ResourceKind::Bucket, "assets", tokens).unwrap();
        let spec: BucketSpec = desired.decode().unwrap();
        Bucket::diff(&desired, &spec, live)
    }

    #[test]
    fn test_acl_transition_is_violation() {
        let public = BucketLive {
            acl: Acl::Public,
            ..BucketLive::default()
        };
        let err = plan(&["acl=private"], &public).unwrap_err();
        assert_eq!(err.property, "Acl");

        let err = plan(&["acl=public"], &BucketLive::default()).unwrap_err();
        assert_eq!(err.property, "Acl");
    }

    #[test]
    fn test_defaulted_acl_does_not_trip_guard() {
        let public = BucketLive {
            acl: Acl::Public,
            encryption: true,
            metrics: true,
            ..BucketLive::default()
        };
        assert!(plan(&[], &public).unwrap().is_empty());
    }

    #[test]
    fn test_supplied_toggles_only() {
        let live = BucketLive::default();
        let changes = plan(&["versioning=true", "ttldays=30"], &live).unwrap();

        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].change, BucketChange::Versioning(true));
        assert_eq!(changes[0].from, "false");
        assert_eq!(changes[0].to, "true");
        assert_eq!(changes[1].change, BucketChange::Lifecycle(30));
    }

    #[test]
    fn test_tags_replace_whole_set() {
        let live = BucketLive {
            tags: vec![Tag::new("env", "dev")],
            ..BucketLive::default()
        };
        let changes = plan(&["Tags.env=prod", "Tags.team=web"], &live).unwrap();
        assert_eq!(
            changes[0].change,
            BucketChange::Tags(vec![Tag::new("env", "prod"), Tag::new("team", "web")])
        );

        let live = BucketLive {
            tags: vec![Tag::new("team", "web"), Tag::new("env", "prod")],
            ..BucketLive::default()
        };
        assert!(plan(&["Tags.env=prod", "Tags.team=web"], &live).unwrap().is_empty());
    }
}
