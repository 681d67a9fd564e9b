//! EC2 security group planning
//!
//! Supplied rules are authoritative: rules missing from the live group are
//! authorized and rules not in the spec are revoked.

use std::collections::BTreeSet;

use ensureflow_core::kinds::security_group::IngressRule;
use ensureflow_core::{DesiredState, ResourceKind, SecurityGroupSpec, Tag};

use super::{diff_tags, format_tags};
use crate::action::{ActionType, PropertyChange, Violation};
use crate::provider::ResourceModel;

/// Marker for the security group resource kind
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityGroup;

/// Observed state of an existing security group
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SecurityGroupLive {
    pub group_id: String,
    pub vpc_id: String,
    pub description: String,
    /// Ingress permissions, one entry per (protocol, port, source)
    pub rules: Vec<IngressRule>,
    pub tags: Vec<Tag>,
}

/// One EC2 call that converges a security group property
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityGroupChange {
    AuthorizeIngress { group_id: String, rule: IngressRule },
    RevokeIngress { group_id: String, rule: IngressRule },
    CreateTags { group_id: String, tags: Vec<Tag> },
    DeleteTags { group_id: String, keys: Vec<String> },
}

impl ResourceModel for SecurityGroup {
    type Spec = SecurityGroupSpec;
    type Live = SecurityGroupLive;
    type Change = SecurityGroupChange;

    const KIND: ResourceKind = ResourceKind::SecurityGroup;

    fn diff(
        desired: &DesiredState,
        spec: &SecurityGroupSpec,
        live: &SecurityGroupLive,
    ) -> Result<Vec<PropertyChange<SecurityGroupChange>>, Violation> {
        check_rules(&spec.rules)?;

        if desired.is_supplied("Description") && spec.description() != live.description {
            return Err(Violation::new(
                "Description",
                format!(
                    "description can only be set at group creation (live: '{}')",
                    live.description
                ),
            ));
        }

        let mut changes = Vec::new();
        let group_id = &live.group_id;

        if desired.is_supplied("Rules") {
            let wanted: BTreeSet<&IngressRule> = spec.rules.iter().collect();
            let current: BTreeSet<&IngressRule> = live.rules.iter().collect();

            for rule in wanted.difference(&current) {
                changes.push(
                    PropertyChange::update(
                        "Rules",
                        "-",
                        rule,
                        SecurityGroupChange::AuthorizeIngress {
                            group_id: group_id.clone(),
                            rule: (*rule).clone(),
                        },
                    )
                    .with_type(ActionType::Create),
                );
            }
            for rule in current.difference(&wanted) {
                changes.push(
                    PropertyChange::update(
                        "Rules",
                        rule,
                        "-",
                        SecurityGroupChange::RevokeIngress {
                            group_id: group_id.clone(),
                            rule: (*rule).clone(),
                        },
                    )
                    .with_type(ActionType::Delete),
                );
            }
        }

        if desired.is_supplied("Tags") {
            let (upserts, removals) = diff_tags(&spec.tags, &live.tags);
            if !upserts.is_empty() {
                changes.push(PropertyChange::update(
                    "Tags",
                    format_tags(&live.tags),
                    format_tags(&upserts),
                    SecurityGroupChange::CreateTags {
                        group_id: group_id.clone(),
                        tags: upserts,
                    },
                ));
            }
            if !removals.is_empty() {
                changes.push(
                    PropertyChange::update(
                        "Tags",
                        removals.join(","),
                        "-",
                        SecurityGroupChange::DeleteTags {
                            group_id: group_id.clone(),
                            keys: removals,
                        },
                    )
                    .with_type(ActionType::Delete),
                );
            }
        }

        Ok(changes)
    }

    fn check_create(spec: &SecurityGroupSpec) -> Result<(), Violation> {
        check_rules(&spec.rules)
    }
}

fn check_rules(rules: &[IngressRule]) -> Result<(), Violation> {
    rules
        .iter()
        .try_for_each(|rule| rule.check().map_err(|reason| Violation::new("Rules", reason)))
}
