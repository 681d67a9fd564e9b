//! Reconciliation engine
//!
//! One `ensure` call runs a single pass for one named resource:
//!
//! ```text
//! fetch ─┬─ absent ──▶ create ─────────────────────────────▶ done
//!        └─ present ─▶ diff ─┬─ no changes ────────────────▶ done
//!                            ├─ invariant violation ───────▶ error (nothing applied)
//!                            └─ set-property × n (in order) ▶ done
//! ```
//!
//! There is no retry loop here; transient failures are retried inside the
//! provider call. Apply is not transactional: when action k fails, actions
//! 1..k-1 stay applied.

use std::sync::Arc;
use std::time::Instant;

use ensureflow_core::{DesiredState, ResourceKind};
use tracing::{debug, info, warn};

use crate::action::{Action, ApplyResult, Plan, PlanSummary, PropertyChange, Violation};
use crate::error::{CloudError, EnsureError, Result};
use crate::provider::{EnsureProvider, ResourceModel};
use crate::report::{Report, ReportSink, TracingSink};

/// What one `ensure` call planned and applied
#[derive(Debug, Clone)]
pub struct Outcome {
    pub plan: Plan,
    /// Empty in preview mode
    pub result: ApplyResult,
    pub preview: bool,
}

impl Outcome {
    pub fn has_changes(&self) -> bool {
        self.plan.has_changes()
    }

    pub fn summary(&self) -> PlanSummary {
        self.plan.summary()
    }
}

/// Drives `fetch → diff → apply` against an injected provider
#[derive(Clone)]
pub struct EnsureEngine {
    sink: Arc<dyn ReportSink>,
}

impl Default for EnsureEngine {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl EnsureEngine {
    pub fn new(sink: Arc<dyn ReportSink>) -> Self {
        Self { sink }
    }

    /// Creates the resource if absent, otherwise updates only the supplied
    /// properties that differ from live state.
    ///
    /// In preview mode the full pipeline runs, including invariant guards,
    /// but no mutating call is made.
    pub async fn ensure<M, P>(
        &self,
        provider: &P,
        desired: &DesiredState,
        preview: bool,
    ) -> Result<Outcome>
    where
        M: ResourceModel,
        P: EnsureProvider<M> + ?Sized,
    {
        if desired.kind() != M::KIND {
            return Err(EnsureError::KindMismatch {
                expected: M::KIND,
                actual: desired.kind(),
            });
        }

        let spec: M::Spec = desired.decode()?;
        let name = desired.name();

        debug!(provider = provider.name(), kind = %M::KIND, resource = name, "fetching live state");
        let live = provider
            .fetch(&spec)
            .await
            .map_err(|source| remote(M::KIND, name, "fetch", 0, source))?;

        match live {
            None => {
                M::check_create(&spec).map_err(|violation| invariant(M::KIND, name, violation))?;
                self.create::<M, P>(provider, desired, &spec, preview)
                    .await
            }
            Some(live) => {
                let changes = M::diff(desired, &spec, &live)
                    .map_err(|violation| invariant(M::KIND, name, violation))?;
                debug!(kind = %M::KIND, resource = name, changes = changes.len(), "diff computed");
                self.update::<M, P>(provider, name, changes, preview).await
            }
        }
    }

    async fn create<M, P>(
        &self,
        provider: &P,
        desired: &DesiredState,
        spec: &M::Spec,
        preview: bool,
    ) -> Result<Outcome>
    where
        M: ResourceModel,
        P: EnsureProvider<M> + ?Sized,
    {
        let name = desired.name();
        let action = Action::create(M::KIND, name, desired.to_json());
        let mut result = ApplyResult::new();

        if preview {
            self.sink.report(Report::Planned(&action), true);
        } else {
            let start = Instant::now();
            match provider.create(spec).await {
                Ok(()) => {}
                Err(CloudError::ResourceAlreadyExists(_)) => {
                    warn!(kind = %M::KIND, resource = name, "resource appeared after fetch, treating create as done");
                }
                Err(source) => return Err(remote(M::KIND, name, &action.description, 0, source)),
            }
            info!(kind = %M::KIND, resource = name, "created");
            result.add_success(action.id.clone(), action.description.clone());
            result.duration_ms = start.elapsed().as_millis() as u64;
            self.sink.report(Report::Applied(&action), false);
        }

        Ok(Outcome {
            plan: Plan::new(M::KIND, name, vec![action]),
            result,
            preview,
        })
    }

    async fn update<M, P>(
        &self,
        provider: &P,
        name: &str,
        changes: Vec<PropertyChange<M::Change>>,
        preview: bool,
    ) -> Result<Outcome>
    where
        M: ResourceModel,
        P: EnsureProvider<M> + ?Sized,
    {
        let actions: Vec<Action> = changes
            .iter()
            .map(|change| Action::property(M::KIND, name, change))
            .collect();
        let mut result = ApplyResult::new();

        if actions.is_empty() {
            self.sink.report(Report::Unchanged { kind: M::KIND, name }, preview);
        } else if preview {
            for action in &actions {
                self.sink.report(Report::Planned(action), true);
            }
        } else {
            let start = Instant::now();
            for (applied, (action, change)) in actions.iter().zip(&changes).enumerate() {
                if let Err(source) = provider.set_property(name, &change.change).await {
                    return Err(remote(M::KIND, name, &action.description, applied, source));
                }
                info!(kind = %M::KIND, resource = name, property = %action.property, "applied");
                result.add_success(action.id.clone(), action.description.clone());
                self.sink.report(Report::Applied(action), false);
            }
            result.duration_ms = start.elapsed().as_millis() as u64;
        }

        Ok(Outcome {
            plan: Plan::new(M::KIND, name, actions),
            result,
            preview,
        })
    }
}

fn invariant(kind: ResourceKind, name: &str, violation: Violation) -> EnsureError {
    EnsureError::Invariant {
        kind,
        name: name.to_string(),
        property: violation.property,
        reason: violation.reason,
    }
}

fn remote(
    kind: ResourceKind,
    name: &str,
    action: &str,
    applied: usize,
    source: CloudError,
) -> EnsureError {
    EnsureError::Remote {
        kind,
        name: name.to_string(),
        action: action.to_string(),
        applied,
        source,
    }
}
