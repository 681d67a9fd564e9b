//! ensureflow reconciliation engine
//!
//! Turns a compiled [`ensureflow_core::DesiredState`] into the smallest set of
//! provider calls that converges a live resource, or reports that set in
//! preview mode.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  ensure CLI                      │
//! │     (ensure table/bucket/queue/sg/record/apply)  │
//! └─────────────────┬───────────────────────────────┘
//!                   │ DesiredState
//! ┌─────────────────▼───────────────────────────────┐
//! │               ensureflow-cloud                   │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  EnsureEngine  (fetch → diff → apply)    │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │ResourceModel │  │  ReportSink  │            │
//! │  │ diff/guards  │  │ preview log  │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────────────────────────────┘
//!         │ trait EnsureProvider<M>
//! ┌───────▼───────────────────────────────────────┐
//! │  ensureflow-cloud-aws: DynamoDB/S3/SQS/EC2/R53  │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod action;
pub mod bulk;
pub mod engine;
pub mod error;
pub mod kinds;
pub mod provider;
pub mod report;
pub mod retry;

// Re-exports
pub use action::{Action, ActionType, ApplyResult, Plan, PlanSummary, PropertyChange, Violation};
pub use bulk::{
    Providers, ResourceRequest, ResourceResult, check_results, compile_all, ensure_compiled,
    ensure_many,
};
pub use engine::{EnsureEngine, Outcome};
pub use error::{CloudError, CloudResult, EnsureError, Result};
pub use kinds::{
    Bucket, BucketChange, BucketLive, Queue, QueueChange, QueueLive, Record, RecordChange,
    RecordLive, SecurityGroup, SecurityGroupChange, SecurityGroupLive, Table, TableChange,
    TableLive,
};
pub use provider::{EnsureProvider, ResourceModel, RetryConfig};
pub use report::{PREVIEW_PREFIX, RecordingSink, Report, ReportSink, TracingSink};
pub use retry::with_retry;
