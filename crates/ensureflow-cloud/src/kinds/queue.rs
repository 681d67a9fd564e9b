//! SQS queue planning

use std::collections::BTreeMap;

use ensureflow_core::{DesiredState, QueueSpec, ResourceKind, Tag};

use super::{diff_tags, format_tags};
use crate::action::{ActionType, PropertyChange, Violation};
use crate::provider::ResourceModel;

/// Marker for the queue resource kind
#[derive(Debug, Clone, Copy, Default)]
pub struct Queue;

/// Observed state of an existing queue
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueueLive {
    pub url: String,
    /// Attribute values as returned by GetQueueAttributes
    pub attributes: BTreeMap<String, String>,
    pub tags: Vec<Tag>,
}

/// One SQS call that converges a queue property
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueChange {
    /// SetQueueAttributes for a single attribute
    SetAttribute { name: &'static str, value: String },
    TagQueue(Vec<Tag>),
    UntagQueue(Vec<String>),
}

impl ResourceModel for Queue {
    type Spec = QueueSpec;
    type Live = QueueLive;
    type Change = QueueChange;

    const KIND: ResourceKind = ResourceKind::Queue;

    fn diff(
        desired: &DesiredState,
        spec: &QueueSpec,
        live: &QueueLive,
    ) -> Result<Vec<PropertyChange<QueueChange>>, Violation> {
        let mut changes = Vec::new();

        for (name, value) in spec.attributes.entries() {
            if !desired.is_supplied(&format!("Attributes.{}", name)) {
                continue;
            }
            let current = live.attributes.get(name);
            if current != Some(&value) {
                changes.push(PropertyChange::update(
                    name,
                    current.map_or("-", String::as_str),
                    &value,
                    QueueChange::SetAttribute { name, value: value.clone() },
                ));
            }
        }

        if desired.is_supplied("Tags") {
            let (upserts, removals) = diff_tags(&spec.tags, &live.tags);
            if !upserts.is_empty() {
                changes.push(PropertyChange::update(
                    "Tags",
                    format_tags(&live.tags),
                    format_tags(&upserts),
                    QueueChange::TagQueue(upserts),
                ));
            }
            if !removals.is_empty() {
                changes.push(
                    PropertyChange::update("Tags", removals.join(","), "-", QueueChange::UntagQueue(removals))
                        .with_type(ActionType::Delete),
                );
            }
        }

        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ensureflow_core::compile;

    fn plan(tokens: &[&str], live: &QueueLive) -> Vec<PropertyChange<QueueChange>> {
        let desired = compile(ResourceKind::Queue, "jobs", tokens).unwrap();
        let spec: QueueSpec = desired.decode().unwrap();
        Queue::diff(&desired, &spec, live).unwrap()
    }

    fn live_queue() -> QueueLive {
        QueueLive {
            url: "https://sqs.us-east-1.amazonaws.com/123456789012/jobs".to_string(),
            attributes: BTreeMap::from([
                ("DelaySeconds".to_string(), "0".to_string()),
                ("VisibilityTimeout".to_string(), "30".to_string()),
                ("KmsMasterKeyId".to_string(), "alias/custom".to_string()),
            ]),
            tags: vec![],
        }
    }

    #[test]
    fn test_one_change_per_supplied_attribute() {
        let changes = plan(&["delay=10", "timeout=30", "retention=3600"], &live_queue());

        assert_eq!(changes.len(), 2);
        assert_eq!(
            changes[0].change,
            QueueChange::SetAttribute {
                name: "DelaySeconds",
                value: "10".to_string()
            }
        );
        assert_eq!(changes[0].from, "0");
        assert_eq!(changes[1].property, "MessageRetentionPeriod");
        assert_eq!(changes[1].from, "-");
    }

    #[test]
    fn test_default_kms_key_is_not_reapplied() {
        assert!(plan(&[], &live_queue()).is_empty());

        let changes = plan(&["kms=alias/aws/sqs"], &live_queue());
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].from, "alias/custom");
    }

    #[test]
    fn test_tags() {
        let mut live = live_queue();
        live.tags = vec![Tag::new("stale", "yes")];
        let changes = plan(&["Tags.team=core"], &live);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].change, QueueChange::TagQueue(vec![Tag::new("team", "core")]));
        assert_eq!(changes[1].action_type, ActionType::Delete);
    }
}
