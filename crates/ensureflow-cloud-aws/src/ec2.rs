//! EC2 security group provider

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::types as ec2;
use ensureflow_cloud::{
    CloudError, CloudResult, EnsureProvider, RetryConfig, SecurityGroup, SecurityGroupChange,
    SecurityGroupLive,
};
use ensureflow_core::kinds::security_group::{IngressRule, Protocol};
use ensureflow_core::{SecurityGroupSpec, Tag};
use tracing::{debug, info};

use crate::error::{AwsError, Result, send};

/// Error codes meaning the rule is already in the requested state
const RULE_ALREADY_APPLIED: &[&str] = &["InvalidPermission.Duplicate", "InvalidPermission.NotFound"];

pub struct Ec2Provider {
    client: Client,
    retry: RetryConfig,
}

impl Ec2Provider {
    pub fn new(config: &SdkConfig, retry: RetryConfig) -> Self {
        Self {
            client: Client::new(config),
            retry,
        }
    }

    /// Resolves a VPC by its `Name` tag, or the default VPC
    async fn vpc_id(&self, vpc_name: Option<&str>) -> CloudResult<String> {
        let filter = match vpc_name {
            Some(name) => filter("tag:Name", name),
            None => filter("is-default", "true"),
        };
        let output = send(&self.retry, "DescribeVpcs", || {
            self.client.describe_vpcs().filters(filter.clone()).send()
        })
        .await?;

        let ids: Vec<&str> = output.vpcs().iter().filter_map(|vpc| vpc.vpc_id()).collect();
        let label = vpc_name.unwrap_or("default");
        match ids.as_slice() {
            [id] => Ok(id.to_string()),
            [] => Err(CloudError::InvalidConfig(format!("VPC '{}' not found", label))),
            _ => Err(CloudError::InvalidConfig(format!(
                "VPC name '{}' matches {} VPCs",
                label,
                ids.len()
            ))),
        }
    }

    async fn describe(&self, name: &str, vpc_id: &str) -> CloudResult<Option<ec2::SecurityGroup>> {
        let output = send(&self.retry, "DescribeSecurityGroups", || {
            self.client
                .describe_security_groups()
                .filters(filter("group-name", name))
                .filters(filter("vpc-id", vpc_id))
                .send()
        })
        .await?;
        Ok(output.security_groups().first().cloned())
    }

    async fn authorize(&self, group_id: &str, rules: &[IngressRule]) -> CloudResult<()> {
        if rules.is_empty() {
            return Ok(());
        }
        let permissions = rules.iter().map(permission).collect::<Vec<_>>();
        let result = send(&self.retry, "AuthorizeSecurityGroupIngress", || {
            self.client
                .authorize_security_group_ingress()
                .group_id(group_id)
                .set_ip_permissions(Some(permissions.clone()))
                .send()
        })
        .await;
        tolerate_applied(result)
    }

    async fn revoke(&self, group_id: &str, rule: &IngressRule) -> CloudResult<()> {
        let result = send(&self.retry, "RevokeSecurityGroupIngress", || {
            self.client
                .revoke_security_group_ingress()
                .group_id(group_id)
                .ip_permissions(permission(rule))
                .send()
        })
        .await;
        tolerate_applied(result)
    }
}

#[async_trait]
impl EnsureProvider<SecurityGroup> for Ec2Provider {
    fn name(&self) -> &str {
        "aws-ec2"
    }

    async fn fetch(&self, spec: &SecurityGroupSpec) -> CloudResult<Option<SecurityGroupLive>> {
        let vpc_id = self.vpc_id(spec.vpc_name.as_deref()).await?;
        let Some(group) = self.describe(&spec.group_name, &vpc_id).await? else {
            return Ok(None);
        };
        Ok(Some(group_live(&group)?))
    }

    async fn create(&self, spec: &SecurityGroupSpec) -> CloudResult<()> {
        let vpc_id = self.vpc_id(spec.vpc_name.as_deref()).await?;

        let mut tags = vec![ec2_tag("Name", &spec.group_name)];
        tags.extend(
            spec.tags
                .iter()
                .filter(|tag| tag.key != "Name")
                .map(|tag| ec2_tag(&tag.key, &tag.value)),
        );
        let tag_spec = ec2::TagSpecification::builder()
            .resource_type(ec2::ResourceType::SecurityGroup)
            .set_tags(Some(tags))
            .build();

        info!(group = %spec.group_name, vpc = %vpc_id, rules = spec.rules.len(), "creating security group");
        let output = send(&self.retry, "CreateSecurityGroup", || {
            self.client
                .create_security_group()
                .group_name(&spec.group_name)
                .description(spec.description())
                .vpc_id(&vpc_id)
                .tag_specifications(tag_spec.clone())
                .send()
        })
        .await?;

        let group_id = output
            .group_id()
            .ok_or_else(|| AwsError::unexpected("GroupId", "missing"))?;
        self.authorize(group_id, &spec.rules).await
    }

    async fn set_property(&self, name: &str, change: &SecurityGroupChange) -> CloudResult<()> {
        debug!(group = name, ?change, "applying security group change");
        match change {
            SecurityGroupChange::AuthorizeIngress { group_id, rule } => {
                self.authorize(group_id, std::slice::from_ref(rule)).await
            }
            SecurityGroupChange::RevokeIngress { group_id, rule } => {
                self.revoke(group_id, rule).await
            }
            SecurityGroupChange::CreateTags { group_id, tags } => {
                let tags: Vec<ec2::Tag> = tags.iter().map(|tag| ec2_tag(&tag.key, &tag.value)).collect();
                send(&self.retry, "CreateTags", || {
                    self.client
                        .create_tags()
                        .resources(group_id)
                        .set_tags(Some(tags.clone()))
                        .send()
                })
                .await?;
                Ok(())
            }
            SecurityGroupChange::DeleteTags { group_id, keys } => {
                let tags: Vec<ec2::Tag> = keys
                    .iter()
                    .map(|key| ec2::Tag::builder().key(key).build())
                    .collect();
                send(&self.retry, "DeleteTags", || {
                    self.client
                        .delete_tags()
                        .resources(group_id)
                        .set_tags(Some(tags.clone()))
                        .send()
                })
                .await?;
                Ok(())
            }
        }
    }
}

fn filter(name: &str, value: &str) -> ec2::Filter {
    ec2::Filter::builder().name(name).values(value).build()
}

fn ec2_tag(key: &str, value: &str) -> ec2::Tag {
    ec2::Tag::builder().key(key).value(value).build()
}

/// An authorize of an existing rule, or a revoke of a missing one, is done
fn tolerate_applied(result: CloudResult<impl Sized>) -> CloudResult<()> {
    match result {
        Ok(_) => Ok(()),
        Err(CloudError::ApiError { code, message }) if RULE_ALREADY_APPLIED.contains(&code.as_str()) => {
            debug!(%code, %message, "rule already in place");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

fn group_live(group: &ec2::SecurityGroup) -> Result<SecurityGroupLive> {
    let mut rules = Vec::new();
    for permission in group.ip_permissions() {
        rules.extend(rules_from(permission)?);
    }
    rules.sort();

    let mut tags: Vec<Tag> = group
        .tags()
        .iter()
        .filter_map(|tag| Some(Tag::new(tag.key()?, tag.value().unwrap_or_default())))
        .collect();
    tags.sort_by(|a, b| a.key.cmp(&b.key));

    Ok(SecurityGroupLive {
        group_id: group.group_id().unwrap_or_default().to_string(),
        vpc_id: group.vpc_id().unwrap_or_default().to_string(),
        description: group.description().unwrap_or_default().to_string(),
        rules,
        tags,
    })
}

/// One EC2 permission per rule
fn permission(rule: &IngressRule) -> ec2::IpPermission {
    let builder = match (rule.protocol, rule.port) {
        (Some(Protocol::Icmp), Some(icmp_type)) => ec2::IpPermission::builder()
            .ip_protocol("icmp")
            .from_port(icmp_type as i32)
            .to_port(-1),
        (Some(protocol), Some(port)) => ec2::IpPermission::builder()
            .ip_protocol(protocol.as_str())
            .from_port(port as i32)
            .to_port(port as i32),
        _ => ec2::IpPermission::builder().ip_protocol("-1"),
    };

    let source = rule.source.as_str();
    let builder = if source.starts_with("sg-") {
        builder.user_id_group_pairs(ec2::UserIdGroupPair::builder().group_id(source).build())
    } else if source.starts_with("pl-") {
        builder.prefix_list_ids(ec2::PrefixListId::builder().prefix_list_id(source).build())
    } else if source.contains(':') {
        builder.ipv6_ranges(ec2::Ipv6Range::builder().cidr_ipv6(source).build())
    } else {
        builder.ip_ranges(ec2::IpRange::builder().cidr_ip(source).build())
    };
    builder.build()
}

/// Splits one EC2 permission back into one rule per source
fn rules_from(permission: &ec2::IpPermission) -> Result<Vec<IngressRule>> {
    let protocol = match permission.ip_protocol().unwrap_or("-1") {
        "-1" => None,
        "tcp" => Some(Protocol::Tcp),
        "udp" => Some(Protocol::Udp),
        "icmp" => Some(Protocol::Icmp),
        other => return Err(AwsError::unexpected("IpProtocol", other)),
    };
    let port = match (protocol, permission.from_port(), permission.to_port()) {
        (None, ..) => None,
        (Some(Protocol::Icmp), icmp_type, _) => icmp_type.map(i64::from),
        (Some(_), Some(from), Some(to)) if from == to => Some(i64::from(from)),
        (_, from, to) => return Err(AwsError::unexpected("port range", (from, to))),
    };

    let sources = permission
        .ip_ranges()
        .iter()
        .filter_map(|range| range.cidr_ip())
        .chain(permission.ipv6_ranges().iter().filter_map(|range| range.cidr_ipv6()))
        .chain(permission.user_id_group_pairs().iter().filter_map(|pair| pair.group_id()))
        .chain(permission.prefix_list_ids().iter().filter_map(|list| list.prefix_list_id()));

    Ok(sources
        .map(|source| IngressRule::new(protocol, port, source))
        .collect())
}
