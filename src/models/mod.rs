pub mod change;
pub mod config;
pub mod diff;
pub mod operation;
pub mod taxonomy;
pub mod verdict;

pub use change::{DraftChange, HighRiskReview, NodeRef, ProcessingState, Resolution};
pub use config::{ConfigError, DecisionMode, GovernorConfig};
pub use diff::{ChangeField, DiffItem, DiffSegment, SegmentKind};
pub use operation::{CrossThemeSibling, OperationContext, OperationType, ThemeSummary};
pub use taxonomy::{NodeLevel, SubTheme, Taxonomy, TaxonomyError, TaxonomyNode, Theme, ThemeCategory};
pub use verdict::{
    AnalysisStatus, Confidence, Evaluation, EvaluationSource, OperationRisk, PartialItem, Verdict,
    WorkaroundKind,
};
