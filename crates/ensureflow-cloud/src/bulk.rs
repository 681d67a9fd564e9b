//! Ensure many resources at once
//!
//! Every request is compiled before any provider is contacted, so a typo in
//! the last entry of a manifest aborts the whole run. Distinct resources are
//! then reconciled concurrently.

use std::collections::HashSet;

use ensureflow_core::{DesiredState, ResourceKind, Tag, compile_with_tags};
use futures_util::future::join_all;
use tracing::debug;

use crate::engine::{EnsureEngine, Outcome};
use crate::error::{EnsureError, Result};
use crate::kinds::{Bucket, Queue, Record, SecurityGroup, Table};
use crate::provider::EnsureProvider;

/// One provider per resource kind
#[derive(Clone, Copy)]
pub struct Providers<'a> {
    pub table: &'a dyn EnsureProvider<Table>,
    pub bucket: &'a dyn EnsureProvider<Bucket>,
    pub queue: &'a dyn EnsureProvider<Queue>,
    pub sg: &'a dyn EnsureProvider<SecurityGroup>,
    pub record: &'a dyn EnsureProvider<Record>,
}

/// A named resource and its attribute tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    pub kind: ResourceKind,
    pub name: String,
    pub tokens: Vec<String>,
    /// Tags added to kinds that carry tags, unless a token sets the same key
    pub default_tags: Vec<Tag>,
}

impl ResourceRequest {
    pub fn new(kind: ResourceKind, name: impl Into<String>, tokens: Vec<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            tokens,
            default_tags: Vec::new(),
        }
    }

    pub fn with_default_tags(mut self, tags: Vec<Tag>) -> Self {
        self.default_tags = tags;
        self
    }
}

/// Result for one resource of a bulk run
#[derive(Debug)]
pub struct ResourceResult {
    pub kind: ResourceKind,
    pub name: String,
    pub outcome: Result<Outcome>,
}

/// Compiles every request, then ensures all of them concurrently.
///
/// Fails up front on a duplicate (kind, name) pair or on any compile error;
/// in that case no provider is called. Otherwise returns one result per
/// request, in request order.
pub async fn ensure_many(
    engine: &EnsureEngine,
    providers: Providers<'_>,
    requests: &[ResourceRequest],
    preview: bool,
) -> Result<Vec<ResourceResult>> {
    let desired = compile_all(requests)?;
    Ok(ensure_compiled(engine, providers, &desired, preview).await)
}

/// Checks for duplicates and compiles every request without contacting a provider
pub fn compile_all(requests: &[ResourceRequest]) -> Result<Vec<DesiredState>> {
    let mut seen = HashSet::new();
    for request in requests {
        if !seen.insert((request.kind, request.name.as_str())) {
            return Err(EnsureError::DuplicateResource {
                kind: request.kind,
                name: request.name.clone(),
            });
        }
    }

    let desired = requests
        .iter()
        .map(|request| {
            compile_with_tags(
                request.kind,
                &request.name,
                &request.tokens,
                &request.default_tags,
            )
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    debug!(resources = desired.len(), "all resources compiled");
    Ok(desired)
}

/// Ensures already compiled resources concurrently, one result each
pub async fn ensure_compiled(
    engine: &EnsureEngine,
    providers: Providers<'_>,
    desired: &[DesiredState],
    preview: bool,
) -> Vec<ResourceResult> {
    let runs = desired
        .iter()
        .map(|desired| ensure_one(engine, providers, desired, preview));
    let outcomes = join_all(runs).await;

    desired
        .iter()
        .zip(outcomes)
        .map(|(desired, outcome)| ResourceResult {
            kind: desired.kind(),
            name: desired.name().to_string(),
            outcome,
        })
        .collect()
}

/// Collapses per-resource results into one error when any of them failed
pub fn check_results(results: &[ResourceResult]) -> Result<()> {
    let failed = results.iter().filter(|result| result.outcome.is_err()).count();
    if failed > 0 {
        return Err(EnsureError::Batch {
            failed,
            total: results.len(),
        });
    }
    Ok(())
}

async fn ensure_one(
    engine: &EnsureEngine,
    providers: Providers<'_>,
    desired: &DesiredState,
    preview: bool,
) -> Result<Outcome> {
    match desired.kind() {
        ResourceKind::Table => engine.ensure::<Table, _>(providers.table, desired, preview).await,
        ResourceKind::Bucket => {
            engine
                .ensure::<Bucket, _>(providers.bucket, desired, preview)
                .await
        }
        ResourceKind::Queue => engine.ensure::<Queue, _>(providers.queue, desired, preview).await,
        ResourceKind::SecurityGroup => {
            engine
                .ensure::<SecurityGroup, _>(providers.sg, desired, preview)
                .await
        }
        ResourceKind::Record => {
            engine
                .ensure::<Record, _>(providers.record, desired, preview)
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CloudError, CloudResult};
    use crate::kinds::{
        BucketChange, BucketLive, QueueChange, QueueLive, RecordChange, RecordLive,
        SecurityGroupChange, SecurityGroupLive, TableChange, TableLive,
    };
    use crate::report::RecordingSink;
    use async_trait::async_trait;
    use ensureflow_core::{BucketSpec, INFRASET_TAG, QueueSpec, RecordSpec, SecurityGroupSpec, TableSpec};
    use std::sync::{Arc, Mutex};

    /// Records every call; all resources are absent and buckets fail to create
    #[derive(Default)]
    struct Fake {
        calls: Mutex<Vec<String>>,
    }

    impl Fake {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            let mut calls = self.calls.lock().unwrap().clone();
            calls.sort();
            calls
        }
    }

    #[async_trait]
    impl EnsureProvider<Table> for Fake {
        fn name(&self) -> &str {
            "fake"
        }
        async fn fetch(&self, _spec: &TableSpec) -> CloudResult<Option<TableLive>> {
            Ok(None)
        }
        async fn create(&self, spec: &TableSpec) -> CloudResult<()> {
            self.record(format!("table {}", spec.table_name));
            Ok(())
        }
        async fn set_property(&self, _name: &str, _change: &TableChange) -> CloudResult<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl EnsureProvider<Bucket> for Fake {
        fn name(&self) -> &str {
            "fake"
        }
        async fn fetch(&self, _spec: &BucketSpec) -> CloudResult<Option<BucketLive>> {
            Ok(None)
        }
        async fn create(&self, spec: &BucketSpec) -> CloudResult<()> {
            self.record(format!("bucket {}", spec.name));
            Err(CloudError::api("BucketAlreadyExists", "taken by another account"))
        }
        async fn set_property(&self, _name: &str, _change: &BucketChange) -> CloudResult<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl EnsureProvider<Queue> for Fake {
        fn name(&self) -> &str {
            "fake"
        }
        async fn fetch(&self, _spec: &QueueSpec) -> CloudResult<Option<QueueLive>> {
            Ok(None)
        }
        async fn create(&self, spec: &QueueSpec) -> CloudResult<()> {
            self.record(format!("queue {}", spec.queue_name));
            Ok(())
        }
        async fn set_property(&self, _name: &str, _change: &QueueChange) -> CloudResult<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl EnsureProvider<SecurityGroup> for Fake {
        fn name(&self) -> &str {
            "fake"
        }
        async fn fetch(&self, _spec: &SecurityGroupSpec) -> CloudResult<Option<SecurityGroupLive>> {
            Ok(None)
        }
        async fn create(&self, spec: &SecurityGroupSpec) -> CloudResult<()> {
            let tags: Vec<String> = spec.tags.iter().map(|tag| format!("{}={}", tag.key, tag.value)).collect();
            self.record(format!("sg {} [{}]", spec.group_name, tags.join(",")));
            Ok(())
        }
        async fn set_property(&self, _name: &str, _change: &SecurityGroupChange) -> CloudResult<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl EnsureProvider<Record> for Fake {
        fn name(&self) -> &str {
            "fake"
        }
        async fn fetch(&self, _spec: &RecordSpec) -> CloudResult<Option<RecordLive>> {
            Ok(None)
        }
        async fn create(&self, spec: &RecordSpec) -> CloudResult<()> {
            self.record(format!("record {} {}", spec.name, spec.values.join(",")));
            Ok(())
        }
        async fn set_property(&self, _name: &str, _change: &RecordChange) -> CloudResult<()> {
            Ok(())
        }
    }

    fn providers(fake: &Fake) -> Providers<'_> {
        Providers {
            table: fake,
            bucket: fake,
            queue: fake,
            sg: fake,
            record: fake,
        }
    }

    fn request(kind: ResourceKind, name: &str, tokens: &[&str]) -> ResourceRequest {
        ResourceRequest::new(kind, name, tokens.iter().map(|t| t.to_string()).collect())
    }

    #[tokio::test]
    async fn test_results_in_request_order() {
        let fake = Fake::default();
        let engine = EnsureEngine::new(Arc::new(RecordingSink::new()));
        let requests = vec![
            request(ResourceKind::Table, "events", &["id:s:hash"]),
            request(ResourceKind::Bucket, "assets", &[]),
            request(ResourceKind::Queue, "jobs", &["timeout=60"]),
        ];

        let results = ensure_many(&engine, providers(&fake), &requests, false)
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].name, "events");
        assert!(results[0].outcome.is_ok());
        assert_eq!(results[1].kind, ResourceKind::Bucket);
        assert_eq!(results[1].outcome.as_ref().unwrap_err().stage(), "remote");
        assert!(results[2].outcome.is_ok());
        assert_eq!(fake.calls(), vec!["bucket assets", "queue jobs", "table events"]);

        let err = check_results(&results).unwrap_err();
        assert_eq!(err.stage(), "apply");
        assert_eq!(err.to_string(), "1/3 resources failed");
        assert!(check_results(&results[2..]).is_ok());
    }

    #[tokio::test]
    async fn test_default_tags_reach_tagged_kinds() {
        let fake = Fake::default();
        let engine = EnsureEngine::new(Arc::new(RecordingSink::new()));
        let infraset = vec![Tag::new(INFRASET_TAG, "web")];
        let requests = vec![
            request(ResourceKind::SecurityGroup, "web", &["tcp:443:0.0.0.0/0"])
                .with_default_tags(infraset.clone()),
            request(ResourceKind::Record, "www.example.com", &["10.0.0.1"])
                .with_default_tags(infraset),
        ];

        let results = ensure_many(&engine, providers(&fake), &requests, false)
            .await
            .unwrap();

        assert!(check_results(&results).is_ok());
        assert_eq!(
            fake.calls(),
            vec![
                "record www.example.com 10.0.0.1",
                "sg web [ensureflow.infraset=web]",
            ]
        );
    }

    #[tokio::test]
    async fn test_compile_error_aborts_before_any_call() {
        let fake = Fake::default();
        let engine = EnsureEngine::new(Arc::new(RecordingSink::new()));
        let requests = vec![
            request(ResourceKind::Queue, "jobs", &["timeout=60"]),
            request(ResourceKind::Table, "events", &["KeySchema.1.AttributeName=id"]),
        ];

        let err = ensure_many(&engine, providers(&fake), &requests, false)
            .await
            .unwrap_err();

        assert_eq!(err.stage(), "array-ordering");
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_resource_rejected() {
        let fake = Fake::default();
        let engine = EnsureEngine::new(Arc::new(RecordingSink::new()));
        let requests = vec![
            request(ResourceKind::Queue, "jobs", &[]),
            request(ResourceKind::Bucket, "jobs", &[]),
            request(ResourceKind::Queue, "jobs", &["delay=5"]),
        ];

        let err = ensure_many(&engine, providers(&fake), &requests, true)
            .await
            .unwrap_err();

        assert!(matches!(err, EnsureError::DuplicateResource { kind: ResourceKind::Queue, .. }));
        assert!(fake.calls().is_empty());
    }
}
