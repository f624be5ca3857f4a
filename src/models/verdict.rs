use super::operation::OperationContext;
use serde::{Deserialize, Serialize};

/// Decision for a proposed edit
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// Edit may proceed as proposed
    Approve,
    /// Edit may proceed, with caveats the operator should read
    ApproveWithConditions,
    /// Edit must not proceed
    Reject,
    /// Edit should be replaced by a safer multi-step alternative
    Workaround,
    /// Only part of the edit is safe
    Partial,
}

impl Verdict {
    pub const ALL: [Verdict; 5] = [
        Verdict::Approve,
        Verdict::ApproveWithConditions,
        Verdict::Reject,
        Verdict::Workaround,
        Verdict::Partial,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Approve => "APPROVE",
            Verdict::ApproveWithConditions => "APPROVE_WITH_CONDITIONS",
            Verdict::Reject => "REJECT",
            Verdict::Workaround => "WORKAROUND",
            Verdict::Partial => "PARTIAL",
        }
    }

    /// Parse the wire keyword (case-insensitive, spaces and dashes tolerated)
    pub fn from_str(s: &str) -> Option<Self> {
        let normalized = s.trim().to_uppercase().replace([' ', '-'], "_");
        Self::ALL.into_iter().find(|v| v.as_str() == normalized)
    }

    /// Whether the edit can go straight to drafts
    pub fn is_approval(&self) -> bool {
        matches!(self, Verdict::Approve | Verdict::ApproveWithConditions)
    }

    /// Coarse risk shown next to the verdict
    pub fn operation_risk(&self) -> OperationRisk {
        match self {
            Verdict::Approve => OperationRisk::Low,
            Verdict::ApproveWithConditions | Verdict::Partial | Verdict::Workaround => {
                OperationRisk::Medium
            }
            Verdict::Reject => OperationRisk::High,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Verdict::Approve => "✅",
            Verdict::ApproveWithConditions => "⚠️",
            Verdict::Reject => "⛔",
            Verdict::Workaround => "🔀",
            Verdict::Partial => "✂️",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How sure the evaluator is about its verdict
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Confidence {
    Low,
    #[serde(rename = "Med", alias = "Medium")]
    Med,
    High,
}

impl Confidence {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Confidence::Low),
            "med" | "medium" => Some(Confidence::Med),
            "high" => Some(Confidence::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confidence::Low => write!(f, "Low"),
            Confidence::Med => write!(f, "Med"),
            Confidence::High => write!(f, "High"),
        }
    }
}

/// Coarse risk level reported at the service boundary
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OperationRisk {
    Low,
    Medium,
    High,
}

/// Shape of the safer alternative attached to a WORKAROUND
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum WorkaroundKind {
    /// Move the sub-theme to the duplicate's theme, then merge into the duplicate
    TransferThenMerge,
    /// Merge into the overlapping sibling instead of renaming
    MergeSiblings,
    /// Fold the keyword into a neighbouring keyword instead of deleting it
    MergeKeyword,
    /// Move the source sub-theme under the destination's parent theme
    MoveToParent,
    /// Merge the two parent themes instead of their children
    MergeParents,
    /// Align the source theme's category with the destination first
    ChangeCategory,
    /// Create a dedicated theme and move the entity into it
    CreateTheme,
}

impl WorkaroundKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkaroundKind::TransferThenMerge => "transfer-then-merge",
            WorkaroundKind::MergeSiblings => "merge-siblings",
            WorkaroundKind::MergeKeyword => "merge-keyword",
            WorkaroundKind::MoveToParent => "move-to-parent",
            WorkaroundKind::MergeParents => "merge-parents",
            WorkaroundKind::ChangeCategory => "change-category",
            WorkaroundKind::CreateTheme => "create-theme",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        [
            WorkaroundKind::TransferThenMerge,
            WorkaroundKind::MergeSiblings,
            WorkaroundKind::MergeKeyword,
            WorkaroundKind::MoveToParent,
            WorkaroundKind::MergeParents,
            WorkaroundKind::ChangeCategory,
            WorkaroundKind::CreateTheme,
        ]
        .into_iter()
        .find(|k| k.as_str() == normalized)
    }
}

impl std::fmt::Display for WorkaroundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One slice of a PARTIAL verdict
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartialItem {
    pub name: String,
    pub included: bool,
    pub reason: String,
}

impl PartialItem {
    pub fn new(name: impl Into<String>, included: bool, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            included,
            reason: reason.into(),
        }
    }
}

/// Where an evaluation came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationSource {
    #[default]
    Local,
    Remote,
    /// Remote was configured but failed; the local procedure answered
    Fallback,
}

/// Full analysis of one proposed edit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub verdict: Verdict,
    pub confidence: Confidence,
    #[serde(default)]
    pub risks: Vec<String>,
    /// One-sentence remediation (REJECT / WORKAROUND)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workaround: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workaround_type: Option<WorkaroundKind>,
    /// Fields the workaround template needs (destination names, categories)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workaround_context: Option<OperationContext>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partial_items: Vec<PartialItem>,
    #[serde(default)]
    pub source: EvaluationSource,
}

impl Evaluation {
    pub fn new(verdict: Verdict, confidence: Confidence) -> Self {
        Self {
            verdict,
            confidence,
            risks: Vec::new(),
            workaround: None,
            workaround_type: None,
            workaround_context: None,
            partial_items: Vec::new(),
            source: EvaluationSource::Local,
        }
    }

    pub fn risk(mut self, risk: impl Into<String>) -> Self {
        self.risks.push(risk.into());
        self
    }

    pub fn remediation(mut self, text: impl Into<String>) -> Self {
        self.workaround = Some(text.into());
        self
    }

    pub fn with_workaround(mut self, kind: WorkaroundKind, context: OperationContext) -> Self {
        self.workaround_type = Some(kind);
        self.workaround_context = Some(context);
        self
    }

    pub fn with_partial_items(mut self, items: Vec<PartialItem>) -> Self {
        self.partial_items = items;
        self
    }

    pub fn with_source(mut self, source: EvaluationSource) -> Self {
        self.source = source;
        self
    }

    pub fn operation_risk(&self) -> OperationRisk {
        self.verdict.operation_risk()
    }

    /// Whether the user can take the structured alternative
    ///
    /// Any verdict carrying a kind qualifies: a REJECT may still name the
    /// safer edit (merge the parents instead of their children).
    pub fn offers_workaround(&self) -> bool {
        self.workaround_type.is_some()
    }

    /// Plain-text rendering of the structured fields
    pub fn summary(&self) -> String {
        let mut out = format!("Verdict: {} (confidence: {})\n", self.verdict, self.confidence);

        if !self.risks.is_empty() {
            out.push_str("Risks:\n");
            for risk in &self.risks {
                out.push_str(&format!("  - {}\n", risk));
            }
        }

        if let Some(text) = &self.workaround {
            match self.workaround_type {
                Some(kind) => out.push_str(&format!("Workaround ({}): {}\n", kind, text)),
                None => out.push_str(&format!("Remediation: {}\n", text)),
            }
        }

        if !self.partial_items.is_empty() {
            out.push_str("Partial plan:\n");
            for item in &self.partial_items {
                let mark = if item.included { "+" } else { "-" };
                out.push_str(&format!("  {} {}: {}\n", mark, item.name, item.reason));
            }
        }

        out
    }
}

/// Live analysis attached to a tracked entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AnalysisStatus {
    /// Evaluation requested, no answer yet
    Analyzing,
    Resolved { evaluation: Evaluation },
    /// Evaluation failed; the user must decide manually
    Error { message: String },
}

impl AnalysisStatus {
    pub fn is_analyzing(&self) -> bool {
        matches!(self, AnalysisStatus::Analyzing)
    }

    pub fn evaluation(&self) -> Option<&Evaluation> {
        match self {
            AnalysisStatus::Resolved { evaluation } => Some(evaluation),
            _ => None,
        }
    }

    pub fn verdict(&self) -> Option<Verdict> {
        self.evaluation().map(|e| e.verdict)
    }
}
