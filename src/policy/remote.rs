//! Remote decision backend
//!
//! Posts the operation and context to a live decision service. Transport
//! failures and non-2xx replies fall back to the local policy; a successful
//! reply is always trusted, even when it has to be read from free text.

use super::{render_prompt, DecisionService, EvaluationError, PolicyEvaluator};
use crate::models::config::DecisionConfig;
use crate::models::{
    Confidence, Evaluation, EvaluationSource, OperationContext, OperationType, PartialItem,
    Verdict, WorkaroundKind,
};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
enum RemoteFailure {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Structured reply; every field optional so partial replies still parse
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RemoteReply {
    verdict: Option<String>,
    confidence: Option<String>,
    risks: Option<Vec<String>>,
    workaround: Option<String>,
    workaround_type: Option<String>,
    workaround_context: Option<OperationContext>,
    partial_items: Option<Vec<PartialItem>>,
    /// Free-text answer, scanned when `verdict` is absent
    response: Option<String>,
}

/// HTTP client for the remote decision backend
#[derive(Clone)]
pub struct RemoteEvaluator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    fallback: PolicyEvaluator,
}

impl RemoteEvaluator {
    pub fn new(config: &DecisionConfig) -> Result<Self, EvaluationError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| EvaluationError::Configuration("missing API key".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| EvaluationError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            fallback: PolicyEvaluator::new(),
        })
    }

    async fn call(
        &self,
        op: &OperationType,
        ctx: &OperationContext,
    ) -> Result<Evaluation, RemoteFailure> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "operationType": op,
                "context": ctx,
                "prompt": render_prompt(op, ctx),
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteFailure::Status { status, body });
        }

        let body = response.text().await?;
        Ok(parse_reply(&body))
    }
}

#[async_trait]
impl DecisionService for RemoteEvaluator {
    async fn evaluate(
        &self,
        op: &OperationType,
        ctx: &OperationContext,
    ) -> Result<Evaluation, EvaluationError> {
        match self.call(op, ctx).await {
            Ok(evaluation) => {
                debug!(operation = %op, verdict = %evaluation.verdict, "Remote evaluation complete");
                Ok(evaluation)
            }
            Err(e) => {
                warn!(
                    operation = %op,
                    endpoint = %self.endpoint,
                    error = %e,
                    "Remote evaluation failed, falling back to local policy"
                );
                Ok(self
                    .fallback
                    .evaluate(op, ctx)
                    .with_source(EvaluationSource::Fallback))
            }
        }
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

// Patterns are literals; `None` only if the regex crate rejects them
static VERDICT_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(approve[_ ]with[_ ]conditions|reject|workaround|partial|approve)\b").ok()
});
static CONFIDENCE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)confidence\W{0,3}(high|medium|med|low)\b").ok());

/// Find the verdict keyword in free text; the earliest mention wins
fn extract_verdict(text: &str) -> Option<Verdict> {
    VERDICT_RE
        .as_ref()?
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| Verdict::from_str(m.as_str()))
}

fn extract_confidence(text: &str) -> Option<Confidence> {
    CONFIDENCE_RE
        .as_ref()?
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| Confidence::from_str(m.as_str()))
}

/// Turn a 2xx body into an evaluation
///
/// Structured fields win. Without a verdict field the free text is scanned;
/// a reply that names no verdict at all becomes an inconclusive WORKAROUND.
fn parse_reply(body: &str) -> Evaluation {
    let reply: RemoteReply = serde_json::from_str(body).unwrap_or_else(|_| RemoteReply {
        response: Some(body.to_string()),
        ..Default::default()
    });
    let text = reply.response.as_deref().unwrap_or(body);

    let verdict = reply
        .verdict
        .as_deref()
        .and_then(Verdict::from_str)
        .or_else(|| extract_verdict(text));

    let Some(verdict) = verdict else {
        return Evaluation::new(Verdict::Workaround, Confidence::Low)
            .risk("Decision service reply did not state a verdict")
            .remediation("Review this change manually.")
            .with_source(EvaluationSource::Remote);
    };

    let confidence = reply
        .confidence
        .as_deref()
        .and_then(Confidence::from_str)
        .or_else(|| extract_confidence(text))
        .unwrap_or(Confidence::Med);

    let mut evaluation = Evaluation::new(verdict, confidence).with_source(EvaluationSource::Remote);
    evaluation.risks = reply.risks.unwrap_or_default();
    evaluation.workaround = reply.workaround;
    evaluation.workaround_type = reply.workaround_type.as_deref().and_then(WorkaroundKind::from_str);
    evaluation.workaround_context = reply.workaround_context;
    evaluation.partial_items = reply.partial_items.unwrap_or_default();
    evaluation
}
