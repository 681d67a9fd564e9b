//! Operator-visible report lines
//!
//! The engine never prints directly. Every preview line, applied action and
//! "no changes" notice goes through a [`ReportSink`].

use std::sync::Mutex;

use ensureflow_core::ResourceKind;
use tracing::info;

use crate::action::Action;

/// Prefix of every line written in preview mode
pub const PREVIEW_PREFIX: &str = "[preview]";

/// Something the engine wants the operator to see
#[derive(Debug, Clone, Copy)]
pub enum Report<'a> {
    /// An action that would be applied (preview mode only)
    Planned(&'a Action),
    /// An action that was applied
    Applied(&'a Action),
    /// Live state already matches
    Unchanged { kind: ResourceKind, name: &'a str },
}

impl Report<'_> {
    /// Renders the report as a single line
    pub fn line(&self, preview: bool) -> String {
        let body = match self {
            Report::Planned(action) => match &action.request {
                Some(request) => format!("would create: {} '{}' {}", action.resource_type, action.resource_id, request),
                None => format!("would {}", action.description),
            },
            Report::Applied(action) => match action.request {
                Some(_) => format!("created {} '{}'", action.resource_type, action.resource_id),
                None => action.description.clone(),
            },
            Report::Unchanged { kind, name } => format!("no changes: {} '{}'", kind, name),
        };

        if preview {
            format!("{} {}", PREVIEW_PREFIX, body)
        } else {
            body
        }
    }
}

pub trait ReportSink: Send + Sync {
    fn report(&self, report: Report<'_>, preview: bool);
}

/// Default sink: forwards every line to `tracing` at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn report(&self, report: Report<'_>, preview: bool) {
        info!(target: "ensureflow::report", "{}", report.line(preview));
    }
}

/// Keeps every rendered line in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    lines: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }
}

impl ReportSink for RecordingSink {
    fn report(&self, report: Report<'_>, preview: bool) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(report.line(preview));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::PropertyChange;

    #[test]
    fn test_preview_lines_are_prefixed() {
        let change = PropertyChange::update("Cors", false, true, ());
        let action = Action::property(ResourceKind::Bucket, "assets", &change);

        assert_eq!(
            Report::Planned(&action).line(true),
            "[preview] would update bucket 'assets' Cors: false -> true"
        );
        assert_eq!(
            Report::Applied(&action).line(false),
            "update bucket 'assets' Cors: false -> true"
        );
        assert_eq!(
            Report::Unchanged {
                kind: ResourceKind::Queue,
                name: "jobs"
            }
            .line(true),
            "[preview] no changes: queue 'jobs'"
        );
    }

    #[test]
    fn test_create_preview_includes_request() {
        let action = Action::create(
            ResourceKind::Queue,
            "jobs",
            serde_json::json!({"QueueName": "jobs"}),
        );
        assert_eq!(
            Report::Planned(&action).line(true),
            r#"[preview] would create: queue 'jobs' {"QueueName":"jobs"}"#
        );
        assert_eq!(Report::Applied(&action).line(false), "created queue 'jobs'");
    }

    #[test]
    fn test_recording_sink() {
        let sink = RecordingSink::new();
        sink.report(
            Report::Unchanged {
                kind: ResourceKind::Table,
                name: "orders",
            },
            false,
        );
        assert_eq!(sink.lines(), vec!["no changes: table 'orders'".to_string()]);
    }
}
