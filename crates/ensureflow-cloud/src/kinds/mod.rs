//! Per-kind planning: live state models, property changes and invariant guards

pub mod bucket;
pub mod queue;
pub mod record;
pub mod security_group;
pub mod table;

pub use bucket::{Bucket, BucketChange, BucketLive};
pub use queue::{Queue, QueueChange, QueueLive};
pub use record::{Record, RecordChange, RecordLive};
pub use security_group::{SecurityGroup, SecurityGroupChange, SecurityGroupLive};
pub use table::{Table, TableChange, TableLive};

use ensureflow_core::Tag;

/// Tags to add or overwrite, and tag keys to remove, to turn `live` into `desired`
pub(crate) fn diff_tags(desired: &[Tag], live: &[Tag]) -> (Vec<Tag>, Vec<String>) {
    let upserts = desired
        .iter()
        .filter(|tag| !live.contains(tag))
        .cloned()
        .collect();
    let removals = live
        .iter()
        .filter(|tag| !desired.iter().any(|d| d.key == tag.key))
        .map(|tag| tag.key.clone())
        .collect();
    (upserts, removals)
}

/// `k=v,k=v` for display
pub(crate) fn format_tags(tags: &[Tag]) -> String {
    if tags.is_empty() {
        return "-".to_string();
    }
    tags.iter()
        .map(|tag| format!("{}={}", tag.key, tag.value))
        .collect::<Vec<_>>()
        .join(",")
}

pub(crate) fn format_option<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
