//! Route53 record planning
//!
//! Route53 replaces a record set as a whole, so every changed property of a
//! record is folded into a single UPSERT carrying the merged record.

use ensureflow_core::kinds::record::{AliasTarget, trim_dot};
use ensureflow_core::{DesiredState, RecordSpec, ResourceKind};

use super::format_option;
use crate::action::{PropertyChange, Violation};
use crate::provider::ResourceModel;

/// Marker for the DNS record resource kind
#[derive(Debug, Clone, Copy, Default)]
pub struct Record;

/// Observed state of an existing record set
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordLive {
    pub zone_id: String,
    pub record_type: String,
    /// `None` for alias records
    pub ttl: Option<i64>,
    pub values: Vec<String>,
    pub alias_target: Option<AliasTarget>,
}

/// One ChangeResourceRecordSets call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordChange {
    Upsert { zone_id: String, record: RecordSpec },
}

impl ResourceModel for Record {
    type Spec = RecordSpec;
    type Live = RecordLive;
    type Change = RecordChange;

    const KIND: ResourceKind = ResourceKind::Record;

    fn diff(
        desired: &DesiredState,
        spec: &RecordSpec,
        live: &RecordLive,
    ) -> Result<Vec<PropertyChange<RecordChange>>, Violation> {
        check_record(spec)?;

        let mut merged = RecordSpec {
            record_type: live.record_type.clone(),
            ttl: live.ttl,
            values: sorted(&live.values),
            alias_target: live.alias_target.clone(),
            ..spec.clone()
        };
        let mut changed = Vec::new();

        if desired.is_supplied("AliasTarget") {
            if merged.alias_target != spec.alias_target {
                changed.push("AliasTarget");
            }
            merged.alias_target = spec.alias_target.clone();
            merged.values.clear();
            merged.ttl = None;
        }
        if desired.is_supplied("Values") {
            let values = sorted(&spec.values);
            if merged.values != values {
                changed.push("Values");
            }
            merged.values = values;
            merged.alias_target = None;
        }
        if desired.is_supplied("TTL") && merged.ttl != spec.ttl {
            changed.push("TTL");
            merged.ttl = spec.ttl;
        }
        // a record switched from alias to values has no TTL yet
        if merged.alias_target.is_none() && merged.ttl.is_none() {
            merged.ttl = merged.effective_ttl();
        }

        if changed.is_empty() {
            return Ok(Vec::new());
        }

        let from = describe(live.ttl, &live.values, live.alias_target.as_ref());
        let to = describe(merged.ttl, &merged.values, merged.alias_target.as_ref());
        Ok(vec![PropertyChange::update(
            changed.join(","),
            from,
            to,
            RecordChange::Upsert {
                zone_id: live.zone_id.clone(),
                record: merged,
            },
        )])
    }

    fn check_create(spec: &RecordSpec) -> Result<(), Violation> {
        check_record(spec)?;
        if spec.values.is_empty() && spec.alias_target.is_none() {
            return Err(Violation::new(
                "Values",
                "a new record needs at least one value or an alias target",
            ));
        }
        Ok(())
    }
}

fn check_record(spec: &RecordSpec) -> Result<(), Violation> {
    if spec.alias_target.is_some() {
        if !spec.values.is_empty() {
            return Err(Violation::new(
                "AliasTarget",
                "an alias record cannot also carry values",
            ));
        }
        if spec.ttl.is_some() {
            return Err(Violation::new("TTL", "alias records take the TTL of their target"));
        }
    }
    if spec.record_type == "CNAME" && spec.values.len() > 1 {
        return Err(Violation::new(
            "Values",
            format!("a CNAME record holds exactly one value, got {}", spec.values.len()),
        ));
    }
    if let Some(zone) = &spec.zone {
        if !in_zone(spec.fqdn(), zone) {
            return Err(Violation::new(
                "Zone",
                format!("record '{}' is not inside zone '{}'", spec.fqdn(), trim_dot(zone)),
            ));
        }
    }
    Ok(())
}

/// Whether `name` equals `zone` or is a subdomain of it
pub fn in_zone(name: &str, zone: &str) -> bool {
    let name = trim_dot(name).to_ascii_lowercase();
    let zone = trim_dot(zone).to_ascii_lowercase();
    name == zone || name.ends_with(&format!(".{}", zone))
}

fn sorted(values: &[String]) -> Vec<String> {
    let mut values = values.to_vec();
    values.sort();
    values
}

fn describe(ttl: Option<i64>, values: &[String], alias: Option<&AliasTarget>) -> String {
    match alias {
        Some(alias) => format!("alias {}", alias.dns_name),
        None if values.is_empty() => "-".to_string(),
        None => format!("ttl={} {}", format_option(ttl), values.join(",")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ensureflow_core::compile;

    fn decode(tokens: &[&str]) -> (DesiredState, RecordSpec) {
        let desired = compile(ResourceKind::Record, "api.example.com", tokens).unwrap();
        let spec: RecordSpec = desired.decode().unwrap();
        (desired, spec)
    }

    fn plan(tokens: &[&str], live: &RecordLive) -> Result<Vec<PropertyChange<RecordChange>>, Violation> {
        let (desired, spec) = decode(tokens);
        Record::diff(&desired, &spec, live)
    }

    fn live_a() -> RecordLive {
        RecordLive {
            zone_id: "Z1".to_string(),
            record_type: "A".to_string(),
            ttl: Some(300),
            values: vec!["10.0.0.2".to_string(), "10.0.0.1".to_string()],
            alias_target: None,
        }
    }

    #[test]
    fn test_value_order_is_ignored() {
        assert!(plan(&["10.0.0.1", "10.0.0.2"], &live_a()).unwrap().is_empty());
        assert!(plan(&["ttl=300"], &live_a()).unwrap().is_empty());
    }

    #[test]
    fn test_changes_fold_into_one_upsert() {
        let changes = plan(&["ttl=60", "10.0.0.3"], &live_a()).unwrap();

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].property, "Values,TTL");
        assert_eq!(changes[0].from, "ttl=300 10.0.0.2,10.0.0.1");
        assert_eq!(changes[0].to, "ttl=60 10.0.0.3");

        let RecordChange::Upsert { zone_id, record } = &changes[0].change;
        assert_eq!(zone_id, "Z1");
        assert_eq!(record.ttl, Some(60));
        assert_eq!(record.values, vec!["10.0.0.3"]);
    }

    #[test]
    fn test_switch_to_alias_drops_values_and_ttl() {
        let changes = plan(&["alias=d111.cloudfront.net", "aliaszone=Z2FDTNDATAQYW2"], &live_a()).unwrap();

        assert_eq!(changes[0].property, "AliasTarget");
        assert_eq!(changes[0].to, "alias d111.cloudfront.net");
        let RecordChange::Upsert { record, .. } = &changes[0].change;
        assert!(record.values.is_empty());
        assert_eq!(record.ttl, None);
    }

    #[test]
    fn test_switch_from_alias_gets_default_ttl() {
        let live = RecordLive {
            ttl: None,
            values: vec![],
            alias_target: Some(AliasTarget {
                dns_name: "d111.cloudfront.net".to_string(),
                hosted_zone_id: "Z2FDTNDATAQYW2".to_string(),
                evaluate_target_health: false,
            }),
            ..live_a()
        };
        let changes = plan(&["10.0.0.9"], &live).unwrap();

        let RecordChange::Upsert { record, .. } = &changes[0].change;
        assert_eq!(record.alias_target, None);
        assert_eq!(record.ttl, Some(300));
    }

    #[test]
    fn test_record_violations() {
        let violation = plan(&["alias=d111.cloudfront.net", "aliaszone=Z2", "10.0.0.1"], &live_a()).unwrap_err();
        assert_eq!(violation.property, "AliasTarget");

        let violation = plan(&["alias=d111.cloudfront.net", "aliaszone=Z2", "ttl=60"], &live_a()).unwrap_err();
        assert_eq!(violation.property, "TTL");

        let violation = plan(&["zone=example.org", "10.0.0.1"], &live_a()).unwrap_err();
        assert_eq!(violation.property, "Zone");

        let violation = plan(&["type=CNAME", "a.example.com", "b.example.com"], &live_a()).unwrap_err();
        assert_eq!(violation.property, "Values");
    }

    #[test]
    fn test_check_create_needs_a_value() {
        let (_, spec) = decode(&[]);
        assert_eq!(Record::check_create(&spec).unwrap_err().property, "Values");

        let (_, spec) = decode(&["zone=example.com.", "10.0.0.1"]);
        assert!(Record::check_create(&spec).is_ok());
    }

    #[test]
    fn test_in_zone() {
        assert!(in_zone("api.example.com.", "example.com"));
        assert!(in_zone("Example.com", "example.com."));
        assert!(!in_zone("badexample.com", "example.com"));
    }
}
