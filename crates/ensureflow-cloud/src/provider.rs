//! Provider traits
//!
//! A resource kind is split in two halves:
//!
//! - [`ResourceModel`]: pure, synchronous planning (typed spec, live state, diff and
//!   invariant guards). Implemented once per kind in [`crate::kinds`].
//! - [`EnsureProvider`]: the remote side (fetch, create, one call per mutable property).
//!   Implemented by cloud backends and by in-memory fakes in tests.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use ensureflow_core::{DesiredState, ResourceKind};
use serde::de::DeserializeOwned;

use crate::action::{PropertyChange, Violation};
use crate::error::CloudResult;

/// Planning logic for one resource kind
pub trait ResourceModel: Send + Sync + 'static {
    /// Typed creation request decoded from the desired state
    type Spec: DeserializeOwned + fmt::Debug + Send + Sync;
    /// Observed state of an existing resource
    type Live: fmt::Debug + Send + Sync;
    /// A single provider call that converges one property
    type Change: fmt::Debug + Send + Sync;

    const KIND: ResourceKind;

    /// Diffs an existing resource against the desired state.
    ///
    /// Only properties supplied by the caller take part. Returns the first
    /// disallowed transition found, before any change is planned.
    fn diff(
        desired: &DesiredState,
        spec: &Self::Spec,
        live: &Self::Live,
    ) -> Result<Vec<PropertyChange<Self::Change>>, Violation>;

    /// Rejects a creation request the provider would refuse, before any call
    fn check_create(_spec: &Self::Spec) -> Result<(), Violation> {
        Ok(())
    }
}

/// Remote operations for one resource kind
#[async_trait]
pub trait EnsureProvider<M: ResourceModel>: Send + Sync {
    /// Returns the provider name (e.g., "aws-dynamodb")
    fn name(&self) -> &str;

    /// Fetch the live state, `None` when the resource does not exist.
    ///
    /// Receives the whole spec: some kinds are located by more than their name
    /// (the VPC of a security group, the hosted zone of a record).
    async fn fetch(&self, spec: &M::Spec) -> CloudResult<Option<M::Live>>;

    /// Create the resource with every value of the spec.
    ///
    /// May return [`crate::CloudError::ResourceAlreadyExists`] when the resource
    /// appeared after `fetch`; the engine treats that as success.
    async fn create(&self, spec: &M::Spec) -> CloudResult<()>;

    /// Apply one property change with the provider's dedicated call
    async fn set_property(&self, name: &str, change: &M::Change) -> CloudResult<()>;
}

/// Retry configuration for provider operations
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,

    /// Initial delay between retries
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Delay before retry number `retry` (0-based)
    ///
    /// Never exceeds `max_delay`, even when the multiplier overflows `f64`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let factor = self.backoff_multiplier.max(1.0).powi(exponent);
        let secs = self.initial_delay.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        self.initial_delay.mul_f64(factor)
    }

    /// A configuration that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}
