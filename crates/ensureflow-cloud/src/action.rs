//! Action types for reconciliation plans

use ensureflow_core::ResourceKind;
use serde::{Deserialize, Serialize};

/// A planned step against one resource, as reported to the operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Unique identifier for the action (`kind:name:property`)
    pub id: String,

    /// Type of action to perform
    pub action_type: ActionType,

    pub resource_type: ResourceKind,

    /// Resource name
    pub resource_id: String,

    /// Property touched by the action (`resource` for a create)
    pub property: String,

    /// Human readable description, e.g. `BillingMode: PAY_PER_REQUEST -> PROVISIONED`
    pub description: String,

    /// Full creation request for create actions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<serde_json::Value>,
}

impl Action {
    pub fn create(
        resource_type: ResourceKind,
        resource_id: &str,
        request: serde_json::Value,
    ) -> Self {
        Self {
            id: format!("{}:{}:resource", resource_type, resource_id),
            action_type: ActionType::Create,
            resource_type,
            resource_id: resource_id.to_string(),
            property: "resource".to_string(),
            description: format!("create {} '{}'", resource_type, resource_id),
            request: Some(request),
        }
    }

    pub fn property<C>(
        resource_type: ResourceKind,
        resource_id: &str,
        change: &PropertyChange<C>,
    ) -> Self {
        Self {
            id: format!("{}:{}:{}", resource_type, resource_id, change.property),
            action_type: change.action_type,
            resource_type,
            resource_id: resource_id.to_string(),
            property: change.property.clone(),
            description: format!(
                "{} {} '{}' {}: {} -> {}",
                change.action_type,
                resource_type,
                resource_id,
                change.property,
                change.from,
                change.to
            ),
            request: None,
        }
    }
}

/// Type of action to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a new resource or sub-resource
    Create,
    /// Update a property of an existing resource
    Update,
    /// Delete a sub-resource or property value
    Delete,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::Delete => write!(f, "delete"),
        }
    }
}

/// One mutable property that differs between live and desired state,
/// with the provider call that converges it
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyChange<C> {
    pub property: String,
    pub action_type: ActionType,
    /// Live value, for display
    pub from: String,
    /// Desired value, for display
    pub to: String,
    pub change: C,
}

impl<C> PropertyChange<C> {
    pub fn update(
        property: impl Into<String>,
        from: impl ToString,
        to: impl ToString,
        change: C,
    ) -> Self {
        Self {
            property: property.into(),
            action_type: ActionType::Update,
            from: from.to_string(),
            to: to.to_string(),
            change,
        }
    }

    pub fn with_type(mut self, action_type: ActionType) -> Self {
        self.action_type = action_type;
        self
    }
}

/// A disallowed transition detected while diffing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub property: String,
    pub reason: String,
}

impl Violation {
    pub fn new(property: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            reason: reason.into(),
        }
    }
}

/// Actions applied by one live run
///
/// Apply stops at the first failure, which is returned as an error instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyResult {
    pub succeeded: Vec<ActionResult>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ApplyResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn applied(&self) -> usize {
        self.succeeded.len()
    }

    pub fn add_success(&mut self, action_id: String, message: String) {
        self.succeeded.push(ActionResult { action_id, message });
    }
}

/// One applied action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub action_id: String,
    pub message: String,
}

/// Plan containing all actions for one resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub resource_type: ResourceKind,
    pub resource_id: String,

    /// List of actions to perform, in apply order
    pub actions: Vec<Action>,
}

impl Plan {
    pub fn new(resource_type: ResourceKind, resource_id: &str, actions: Vec<Action>) -> Self {
        Self {
            resource_type,
            resource_id: resource_id.to_string(),
            actions,
        }
    }

    /// Whether the plan has any changes
    pub fn has_changes(&self) -> bool {
        !self.actions.is_empty()
    }

    /// Get actions by type
    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.actions_by_type(ActionType::Create).len(),
            update: self.actions_by_type(ActionType::Update).len(),
            delete: self.actions_by_type(ActionType::Delete).len(),
        }
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
}

impl PlanSummary {
    pub fn total(&self) -> usize {
        self.create + self.update + self.delete
    }
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to delete",
            self.create, self.update, self.delete
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_action_description() {
        let change = PropertyChange::update("Versioning", false, true, ());
        let action = Action::property(ResourceKind::Bucket, "assets", &change);
        assert_eq!(action.id, "bucket:assets:Versioning");
        assert_eq!(
            action.description,
            "update bucket 'assets' Versioning: false -> true"
        );
    }

    #[test]
    fn test_plan_summary() {
        let delete = PropertyChange::update("GlobalSecondaryIndexes.old", "old", "-", ())
            .with_type(ActionType::Delete);
        let plan = Plan::new(
            ResourceKind::Table,
            "orders",
            vec![
                Action::property(ResourceKind::Table, "orders", &delete),
                Action::property(
                    ResourceKind::Table,
                    "orders",
                    &PropertyChange::update("BillingMode", "A", "B", ()),
                ),
            ],
        );
        let summary = plan.summary();
        assert_eq!(summary.delete, 1);
        assert_eq!(summary.update, 1);
        assert_eq!(summary.total(), 2);
        assert_eq!(summary.to_string(), "0 to create, 1 to update, 1 to delete");
        assert!(plan.has_changes());
    }
}
