//! Edit governance policy
//!
//! - [`lexicon`]: lexical predicates (generic names, duplicates, overlap)
//! - [`evaluator`]: the deterministic per-operation decision procedures
//! - [`remote`]: optional remote decision backend with local fallback

pub mod evaluator;
pub mod lexicon;
#[cfg(feature = "api-direct")]
pub mod remote;

pub use evaluator::{PolicyEvaluator, HIGH_VOLUME_THRESHOLD, MAX_SPLIT_NAMES};
#[cfg(feature = "api-direct")]
pub use remote::RemoteEvaluator;

use crate::models::config::DecisionConfig;
use crate::models::{Evaluation, OperationContext, OperationType};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("Evaluation failed: {0}")]
    Logic(String),

    #[error("Evaluation task did not complete: {0}")]
    TaskFailed(String),

    #[error("Decision backend misconfigured: {0}")]
    Configuration(String),
}

/// Anything that can turn an operation + context into an evaluation
///
/// The local [`PolicyEvaluator`] and the remote backend both implement this,
/// so the lifecycle manager and the HTTP boundary never care which one runs.
#[async_trait]
pub trait DecisionService: Send + Sync {
    async fn evaluate(
        &self,
        op: &OperationType,
        ctx: &OperationContext,
    ) -> Result<Evaluation, EvaluationError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Pick the decision service for a configuration
///
/// Remote mode needs both the `api-direct` feature and an API key; anything
/// less runs local-only with a warning.
pub fn build_service(config: &DecisionConfig) -> Arc<dyn DecisionService> {
    if config.use_remote() {
        #[cfg(feature = "api-direct")]
        {
            match RemoteEvaluator::new(config) {
                Ok(remote) => {
                    tracing::info!(endpoint = %config.endpoint, "Using remote decision backend");
                    return Arc::new(remote);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Remote decision backend unavailable, using local policy");
                }
            }
        }
        #[cfg(not(feature = "api-direct"))]
        tracing::warn!("Remote mode requested but built without `api-direct`, using local policy");
    } else if config.wants_remote() {
        tracing::warn!("Remote mode requested without an API key, using local policy");
    }

    Arc::new(PolicyEvaluator::new())
}

fn push_line(out: &mut String, label: &str, value: Option<&str>) {
    if let Some(v) = value.filter(|v| !v.is_empty()) {
        out.push_str(&format!("- {}: {}\n", label, v));
    }
}

fn push_list(out: &mut String, label: &str, values: &[String]) {
    if !values.is_empty() {
        out.push_str(&format!("- {}: {}\n", label, values.join(", ")));
    }
}

/// Render the operation and the context it was judged on
///
/// Returned verbatim as `prompt` at the HTTP boundary and sent to the remote
/// backend alongside the structured request.
pub fn render_prompt(op: &OperationType, ctx: &OperationContext) -> String {
    let mut out = format!(
        "## Operation\n{} ({})\n\n## Context\n",
        crate::diff::describe(op, ctx),
        op
    );

    push_line(&mut out, "Current name", ctx.current_name.as_deref());
    push_line(&mut out, "New name", ctx.new_name.as_deref());
    push_line(&mut out, "Source", ctx.source_name.as_deref());
    push_line(&mut out, "Destination", ctx.destination_name.as_deref());
    push_line(&mut out, "Parent theme", ctx.parent_theme.as_deref());
    push_line(&mut out, "Source parent", ctx.source_parent_theme.as_deref());
    push_line(
        &mut out,
        "Destination parent",
        ctx.destination_parent_theme.as_deref(),
    );
    push_list(&mut out, "Siblings", &ctx.sibling_names);

    let cross: Vec<String> = ctx
        .cross_theme_siblings
        .iter()
        .map(|s| format!("{} ({})", s.name, s.theme))
        .collect();
    push_list(&mut out, "Cross-theme siblings", &cross);

    let category = |c: Option<crate::models::ThemeCategory>| c.map(|c| c.to_string());
    push_line(&mut out, "Current category", category(ctx.current_category).as_deref());
    push_line(&mut out, "New category", category(ctx.new_category).as_deref());
    push_line(&mut out, "Source category", category(ctx.source_category).as_deref());
    push_line(
        &mut out,
        "Destination category",
        category(ctx.destination_category).as_deref(),
    );

    if let Some(volume) = ctx.volume {
        out.push_str(&format!("- Records: {}\n", volume));
    }
    push_list(&mut out, "Sub-themes", &ctx.sub_theme_names);

    let path: Vec<String> = [&ctx.l1_keyword, &ctx.l2_keyword, &ctx.l3_keyword]
        .into_iter()
        .flatten()
        .cloned()
        .collect();
    if !path.is_empty() {
        out.push_str(&format!("- Keyword path: {}\n", path.join(" > ")));
    }
    push_list(&mut out, "Proposed names", &ctx.proposed_names);

    out
}
