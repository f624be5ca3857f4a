// Taxogate - Governance core for feedback-taxonomy edits
// Policy verdicts, change lifecycle and structural diffs for proposed taxonomy changes

pub mod cli;
pub mod diff;
pub mod models;
pub mod policy;
pub mod server;
pub mod state;

pub use anyhow::{Context, Result};
pub use colored::Colorize;

// Re-export commonly used types
pub use models::{
    AnalysisStatus, Evaluation, GovernorConfig, OperationContext, OperationType, Taxonomy, Verdict,
};
pub use policy::{build_service, DecisionService, PolicyEvaluator};
pub use state::{ChangeLifecycleManager, LifecycleError};
