use super::diff::{ChangeField, DiffItem};
use super::operation::{OperationContext, OperationType};
use super::taxonomy::NodeLevel;
use super::verdict::AnalysisStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of the node an edit targets
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NodeRef {
    pub id: String,
    pub name: String,
    pub level: NodeLevel,
}

impl NodeRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>, level: NodeLevel) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            level,
        }
    }
}

/// Terminal outcome of a draft change that will not be applied as proposed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Resolution {
    Dismissed,
    /// User chose to contact the taxonomy owners instead
    Contacted,
    WorkaroundAccepted,
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolution::Dismissed => write!(f, "dismissed"),
            Resolution::Contacted => write!(f, "contacted"),
            Resolution::WorkaroundAccepted => write!(f, "workaround-accepted"),
        }
    }
}

/// One atomic edit queued for application
///
/// Drafts that share a `group_id` came from the same proposal and receive
/// their analysis together.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DraftChange {
    pub id: String,
    pub group_id: String,
    pub target: NodeRef,
    pub operation: OperationType,
    /// Level of the mutated node (split children, promoted themes)
    pub level: NodeLevel,
    pub field: ChangeField,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub analysis: Option<AnalysisStatus>,
    pub resolution: Option<Resolution>,
}

impl DraftChange {
    /// Draft for one diff item of a proposal
    pub fn from_item(
        group_id: &str,
        target: &NodeRef,
        operation: &OperationType,
        description: &str,
        item: &DiffItem,
        analysis: Option<AnalysisStatus>,
    ) -> Self {
        let (field, old_value, new_value) = item.as_change();
        Self {
            id: Uuid::new_v4().to_string(),
            group_id: group_id.to_string(),
            target: target.clone(),
            operation: operation.clone(),
            level: item.level(),
            field,
            old_value,
            new_value,
            description: description.to_string(),
            created_at: Utc::now(),
            analysis,
            resolution: None,
        }
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = Some(resolution);
        self
    }

    /// Terminal drafts are kept for the record but never applied
    pub fn is_inert(&self) -> bool {
        self.resolution.is_some()
    }
}

/// Proposal parked until the user acts on its analysis
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HighRiskReview {
    pub id: String,
    pub target: NodeRef,
    pub operation: OperationType,
    pub context: OperationContext,
    pub diff_items: Vec<DiffItem>,
    pub analysis: AnalysisStatus,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl HighRiskReview {
    pub fn new(
        target: NodeRef,
        operation: OperationType,
        context: OperationContext,
        diff_items: Vec<DiffItem>,
        description: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            target,
            operation,
            context,
            diff_items,
            analysis: AnalysisStatus::Analyzing,
            description,
            created_at: Utc::now(),
        }
    }
}

/// Set by apply-all; gates new edit sessions until cleared
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingState {
    pub started_at: DateTime<Utc>,
    pub estimated_completion: DateTime<Utc>,
    pub change_count: usize,
}

impl ProcessingState {
    pub fn remaining(&self, now: DateTime<Utc>) -> chrono::Duration {
        (self.estimated_completion - now).max(chrono::Duration::zero())
    }
}
