//! Batch review: run a plan of proposed edits through the lifecycle manager

use super::evaluate::print_evaluation;
use crate::models::{
    AnalysisStatus, GovernorConfig, NodeLevel, NodeRef, OperationContext, OperationType, Taxonomy,
    TaxonomyError,
};
use crate::policy::{build_service, DecisionService};
use crate::state::{ApplyBatch, ChangeLifecycleManager, Initiated};
use crate::Result;
use anyhow::Context;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// One proposed edit in a plan file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposedEdit {
    /// Node in the taxonomy snapshot the edit targets
    #[serde(default)]
    pub node_id: Option<String>,
    pub operation: OperationType,
    /// Explicit facts; override anything derived from the snapshot
    #[serde(default)]
    pub context: OperationContext,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    pub proposals: Vec<ProposedEdit>,
}

impl Plan {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read plan {}", path.display()))?;
        serde_json::from_str(&content).context("Failed to parse plan JSON")
    }
}

/// One tracked proposal after its evaluation settled
#[derive(Debug, Clone)]
pub struct ReviewEntry {
    pub description: String,
    pub entry_id: String,
    pub is_review: bool,
    pub analysis: AnalysisStatus,
}

#[derive(Debug)]
pub struct ReviewOutcome {
    pub entries: Vec<ReviewEntry>,
    pub batch: Option<ApplyBatch>,
}

/// Context for an edit: snapshot-derived facts overlaid with the plan's own
fn resolve_context(edit: &ProposedEdit, taxonomy: Option<&Taxonomy>) -> OperationContext {
    let (Some(taxonomy), Some(node_id)) = (taxonomy, edit.node_id.as_deref()) else {
        return edit.context.clone();
    };

    let derived: std::result::Result<OperationContext, TaxonomyError> =
        match edit.operation.target_level() {
            Some(NodeLevel::SubTheme) => taxonomy.subtheme_context(node_id),
            Some(_) => taxonomy.theme_context(node_id),
            None => taxonomy.keyword_context(node_id),
        };

    match derived {
        Ok(base) => base.overlay(&edit.context),
        Err(e) => {
            warn!(node_id, error = %e, "Could not derive context from taxonomy");
            edit.context.clone()
        }
    }
}

fn target_for(index: usize, edit: &ProposedEdit, ctx: &OperationContext) -> NodeRef {
    let name = ctx
        .current_name
        .clone()
        .or_else(|| ctx.new_name.clone())
        .unwrap_or_default();
    let level = edit
        .operation
        .target_level()
        .or(ctx.keyword_level)
        .unwrap_or(NodeLevel::L3);
    let id = edit
        .node_id
        .clone()
        .unwrap_or_else(|| format!("proposal-{}", index + 1));
    NodeRef::new(id, name, level)
}

/// Run every proposal, wait for all evaluations, optionally apply approvals
pub async fn review_plan(
    plan: &Plan,
    taxonomy: Option<&Taxonomy>,
    service: Arc<dyn DecisionService>,
    config: &GovernorConfig,
    apply: bool,
) -> Result<ReviewOutcome> {
    let mut manager = ChangeLifecycleManager::with_processing(service, config.processing.clone());

    let mut started: Vec<(String, Initiated)> = Vec::new();
    for (index, edit) in plan.proposals.iter().enumerate() {
        let ctx = resolve_context(edit, taxonomy);
        let target = target_for(index, edit, &ctx);
        let description = crate::diff::describe(&edit.operation, &ctx);
        let initiated = manager.initiate(target, edit.operation.clone(), ctx)?;
        started.push((description, initiated));
    }

    manager.settle_all().await;

    let mut entries = Vec::new();
    for (description, initiated) in started {
        let entry_id = initiated.entry_id().to_string();
        let (is_review, analysis) = match &initiated {
            Initiated::Review { id } => (
                true,
                manager
                    .review(id)
                    .map(|r| r.analysis.clone())
                    .unwrap_or(AnalysisStatus::Analyzing),
            ),
            Initiated::Drafts { group_id, .. } => (
                false,
                manager
                    .draft_group(group_id)
                    .first()
                    .and_then(|d| d.analysis.clone())
                    .unwrap_or(AnalysisStatus::Analyzing),
            ),
        };
        entries.push(ReviewEntry {
            description,
            entry_id,
            is_review,
            analysis,
        });
    }

    let mut batch = None;
    if apply {
        for entry in &entries {
            let approved = entry.analysis.verdict().is_some_and(|v| v.is_approval());
            if entry.is_review && approved {
                manager.accept(&entry.entry_id)?;
            } else if !entry.is_review && !approved {
                manager.dismiss(&entry.entry_id, crate::models::Resolution::Dismissed)?;
            }
        }
        batch = match manager.apply_all() {
            Ok(b) => Some(b),
            Err(crate::state::LifecycleError::NothingToApply) => None,
            Err(e) => return Err(e.into()),
        };
    }

    Ok(ReviewOutcome { entries, batch })
}

pub async fn run(
    config: &GovernorConfig,
    plan_path: &Path,
    taxonomy_path: Option<&Path>,
    apply: bool,
) -> Result<()> {
    let plan = Plan::load(plan_path)?;
    let taxonomy = match taxonomy_path {
        Some(p) => Some(
            Taxonomy::load(p).with_context(|| format!("Failed to load taxonomy {}", p.display()))?,
        ),
        None => None,
    };

    println!(
        "{}",
        format!("🔍 Reviewing {} proposed edit(s)", plan.proposals.len())
            .cyan()
            .bold()
    );
    println!();

    let service = build_service(&config.decision);
    let outcome = review_plan(&plan, taxonomy.as_ref(), service, config, apply).await?;

    for entry in &outcome.entries {
        let route = if entry.is_review { "review" } else { "draft" };
        println!("{} {}", format!("[{}]", route).bright_black(), entry.description.bold());
        match &entry.analysis {
            AnalysisStatus::Resolved { evaluation } => print_evaluation(evaluation),
            AnalysisStatus::Error { message } => {
                println!("   {} {}", "inconclusive:".yellow(), message)
            }
            AnalysisStatus::Analyzing => println!("   {}", "still analyzing".bright_black()),
        }
        println!();
    }

    if apply {
        match &outcome.batch {
            Some(batch) => println!(
                "{}",
                format!(
                    "✓ Applied {} change(s); processing until {}",
                    batch.applied.len(),
                    batch.processing.estimated_completion.format("%Y-%m-%d %H:%M:%S UTC")
                )
                .green()
            ),
            None => println!("{}", "No approved changes to apply".yellow()),
        }
    }

    Ok(())
}
