//! ChangeLifecycleManager - tracks proposed edits from submission to resolution

use super::workaround;
use crate::diff;
use crate::models::config::ProcessingConfig;
use crate::models::{
    AnalysisStatus, DraftChange, Evaluation, HighRiskReview, NodeRef, OperationContext,
    OperationType, ProcessingState, Resolution,
};
use crate::policy::{DecisionService, EvaluationError};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Error, Debug, PartialEq)]
pub enum LifecycleError {
    #[error("No review or draft group with id {0}")]
    NotFound(String),

    #[error("Analysis for {0} is still running")]
    StillAnalyzing(String),

    #[error("Entry {0} has no workaround to accept")]
    NoWorkaround(String),

    #[error("Changes are being processed (estimated completion {until})")]
    Processing { until: DateTime<Utc> },

    #[error("No draft changes to apply")]
    NothingToApply,

    #[error("{0} is not a dismissal outcome")]
    InvalidResolution(Resolution),
}

/// What `initiate` created
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Initiated {
    /// Parked until the user acts
    Review { id: String },
    /// Added straight to drafts; analysis lands on the whole group
    Drafts { group_id: String, ids: Vec<String> },
}

impl Initiated {
    /// Review id or draft group id; the key evaluations settle against
    pub fn entry_id(&self) -> &str {
        match self {
            Initiated::Review { id } => id,
            Initiated::Drafts { group_id, .. } => group_id,
        }
    }
}

/// Completed evaluation on its way back to the manager
#[derive(Debug, Clone)]
pub struct Settled {
    pub entry_id: String,
    pub status: AnalysisStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// Stored on a live review or draft group
    Resolved,
    /// Target already terminal or discarded; kept for the record only
    AttachedLate,
    /// Never issued by this manager
    Orphaned,
}

/// Result of `apply_all`
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyBatch {
    pub applied: Vec<DraftChange>,
    /// Inert drafts (dismissed, contacted, workaround-accepted) dropped with the batch
    pub skipped: usize,
    pub processing: ProcessingState,
}

/// State machine over high-risk reviews and draft changes
///
/// Evaluations run on spawned tasks and report back over a channel; nothing
/// changes until the owner pumps settlements with [`next_settled`] or
/// [`drain_settled`].
///
/// [`next_settled`]: ChangeLifecycleManager::next_settled
/// [`drain_settled`]: ChangeLifecycleManager::drain_settled
pub struct ChangeLifecycleManager {
    service: Arc<dyn DecisionService>,
    processing_config: ProcessingConfig,
    reviews: Vec<HighRiskReview>,
    drafts: Vec<DraftChange>,
    /// Context of draft groups, kept for workaround templates while any
    /// draft of the group remains
    group_contexts: HashMap<String, OperationContext>,
    /// Every review id and group id ever issued
    issued: HashSet<String>,
    late_results: HashMap<String, AnalysisStatus>,
    in_flight: HashSet<String>,
    processing: Option<ProcessingState>,
    settle_tx: mpsc::UnboundedSender<Settled>,
    settle_rx: mpsc::UnboundedReceiver<Settled>,
}

impl ChangeLifecycleManager {
    pub fn new(service: Arc<dyn DecisionService>) -> Self {
        Self::with_processing(service, ProcessingConfig::default())
    }

    pub fn with_processing(
        service: Arc<dyn DecisionService>,
        processing_config: ProcessingConfig,
    ) -> Self {
        let (settle_tx, settle_rx) = mpsc::unbounded_channel();
        Self {
            service,
            processing_config,
            reviews: Vec::new(),
            drafts: Vec::new(),
            group_contexts: HashMap::new(),
            issued: HashSet::new(),
            late_results: HashMap::new(),
            in_flight: HashSet::new(),
            processing: None,
            settle_tx,
            settle_rx,
        }
    }

    // =========================================================================
    // Read access
    // =========================================================================

    pub fn reviews(&self) -> &[HighRiskReview] {
        &self.reviews
    }

    pub fn review(&self, id: &str) -> Option<&HighRiskReview> {
        self.reviews.iter().find(|r| r.id == id)
    }

    pub fn drafts(&self) -> &[DraftChange] {
        &self.drafts
    }

    pub fn draft_group(&self, group_id: &str) -> Vec<&DraftChange> {
        self.drafts
            .iter()
            .filter(|d| d.group_id == group_id)
            .collect()
    }

    /// Result that arrived after its entry was already terminal
    pub fn late_result(&self, entry_id: &str) -> Option<&AnalysisStatus> {
        self.late_results.get(entry_id)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn processing(&self) -> Option<&ProcessingState> {
        self.processing.as_ref()
    }

    pub fn is_processing(&self) -> bool {
        self.processing.is_some()
    }

    // =========================================================================
    // Initiation and settlement
    // =========================================================================

    /// Start tracking a proposed edit
    ///
    /// Builds the diff and description synchronously, spawns the evaluation and
    /// returns without waiting for it. Must be called inside a tokio runtime.
    pub fn initiate(
        &mut self,
        target: NodeRef,
        op: OperationType,
        ctx: OperationContext,
    ) -> Result<Initiated, LifecycleError> {
        if let Some(state) = &self.processing {
            return Err(LifecycleError::Processing {
                until: state.estimated_completion,
            });
        }

        let items = diff::build(&op, &ctx);
        let description = diff::describe(&op, &ctx);

        let initiated = if op.requires_review() {
            let review = HighRiskReview::new(target, op.clone(), ctx.clone(), items, description);
            let id = review.id.clone();
            info!(entry_id = %id, operation = %op, "High-risk review opened");
            self.reviews.push(review);
            Initiated::Review { id }
        } else {
            let group_id = Uuid::new_v4().to_string();
            let ids = self.push_drafts(
                &group_id,
                &target,
                &op,
                &description,
                &items,
                Some(AnalysisStatus::Analyzing),
                None,
            );
            self.group_contexts.insert(group_id.clone(), ctx.clone());
            info!(entry_id = %group_id, operation = %op, drafts = ids.len(), "Draft group added");
            Initiated::Drafts { group_id, ids }
        };

        self.issued.insert(initiated.entry_id().to_string());
        self.spawn_evaluation(initiated.entry_id().to_string(), op, ctx);
        Ok(initiated)
    }

    fn spawn_evaluation(&mut self, entry_id: String, op: OperationType, ctx: OperationContext) {
        let service = Arc::clone(&self.service);
        let tx = self.settle_tx.clone();
        self.in_flight.insert(entry_id.clone());

        tokio::spawn(async move {
            // Inner task so a panicking evaluation surfaces as a JoinError
            let task = tokio::spawn(async move { service.evaluate(&op, &ctx).await });
            let status = match task.await {
                Ok(Ok(evaluation)) => AnalysisStatus::Resolved { evaluation },
                Ok(Err(e)) => {
                    error!(entry_id = %entry_id, error = %e, "Evaluation failed");
                    AnalysisStatus::Error {
                        message: e.to_string(),
                    }
                }
                Err(join) => {
                    let e = EvaluationError::TaskFailed(join.to_string());
                    error!(entry_id = %entry_id, error = %e, "Evaluation task aborted");
                    AnalysisStatus::Error {
                        message: e.to_string(),
                    }
                }
            };
            // Receiver lives as long as the manager; a dropped manager has nobody to tell
            let _ = tx.send(Settled { entry_id, status });
        });
    }

    /// Wait for the next evaluation to settle and apply it
    ///
    /// Returns `None` when nothing is in flight.
    pub async fn next_settled(&mut self) -> Option<(String, SettleOutcome)> {
        if self.in_flight.is_empty() {
            return None;
        }
        let event = self.settle_rx.recv().await?;
        let entry_id = event.entry_id.clone();
        Some((entry_id, self.apply_settled(event)))
    }

    /// Apply every settlement already received, without waiting
    pub fn drain_settled(&mut self) -> Vec<(String, SettleOutcome)> {
        let mut outcomes = Vec::new();
        while let Ok(event) = self.settle_rx.try_recv() {
            let entry_id = event.entry_id.clone();
            outcomes.push((entry_id, self.apply_settled(event)));
        }
        outcomes
    }

    /// Wait until every in-flight evaluation has settled
    pub async fn settle_all(&mut self) -> Vec<(String, SettleOutcome)> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = self.next_settled().await {
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Store a finished evaluation on its entry
    ///
    /// Terminal and discarded entries keep their state; the result is recorded
    /// but never reopens them.
    pub fn apply_settled(&mut self, event: Settled) -> SettleOutcome {
        let Settled { entry_id, status } = event;
        self.in_flight.remove(&entry_id);

        if let Some(review) = self.reviews.iter_mut().find(|r| r.id == entry_id) {
            debug!(entry_id = %entry_id, verdict = ?status.verdict(), "Review analysis resolved");
            review.analysis = status;
            return SettleOutcome::Resolved;
        }

        let mut found = false;
        let mut live = false;
        for draft in self.drafts.iter_mut().filter(|d| d.group_id == entry_id) {
            found = true;
            if draft.analysis.as_ref().map_or(true, |a| a.is_analyzing()) {
                draft.analysis = Some(status.clone());
            }
            live |= !draft.is_inert();
        }

        if live {
            debug!(entry_id = %entry_id, verdict = ?status.verdict(), "Draft group analysis resolved");
            return SettleOutcome::Resolved;
        }

        if found || self.issued.contains(&entry_id) {
            debug!(entry_id = %entry_id, "Late analysis attached to terminal entry");
            self.late_results.insert(entry_id, status);
            return SettleOutcome::AttachedLate;
        }

        warn!(entry_id = %entry_id, "Analysis for unknown entry ignored");
        SettleOutcome::Orphaned
    }

    // =========================================================================
    // User transitions
    // =========================================================================

    #[allow(clippy::too_many_arguments)]
    fn push_drafts(
        &mut self,
        group_id: &str,
        target: &NodeRef,
        op: &OperationType,
        description: &str,
        items: &[crate::models::DiffItem],
        analysis: Option<AnalysisStatus>,
        resolution: Option<Resolution>,
    ) -> Vec<String> {
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            let mut draft =
                DraftChange::from_item(group_id, target, op, description, item, analysis.clone());
            draft.resolution = resolution;
            ids.push(draft.id.clone());
            self.drafts.push(draft);
        }
        ids
    }

    fn take_review(&mut self, id: &str) -> Result<HighRiskReview, LifecycleError> {
        let index = self
            .reviews
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| LifecycleError::NotFound(id.to_string()))?;
        Ok(self.reviews.remove(index))
    }

    /// Accept a review: one draft per diff item, all carrying its analysis
    ///
    /// Valid once the analysis has resolved or errored.
    pub fn accept(&mut self, id: &str) -> Result<Vec<String>, LifecycleError> {
        let review = self
            .review(id)
            .ok_or_else(|| LifecycleError::NotFound(id.to_string()))?;
        if review.analysis.is_analyzing() {
            return Err(LifecycleError::StillAnalyzing(id.to_string()));
        }

        let review = self.take_review(id)?;
        let ids = self.push_drafts(
            &review.id,
            &review.target,
            &review.operation,
            &review.description,
            &review.diff_items,
            Some(review.analysis.clone()),
            None,
        );
        info!(entry_id = %id, drafts = ids.len(), "Review accepted");
        Ok(ids)
    }

    /// Discard a review in any state
    pub fn reject(&mut self, id: &str) -> Result<(), LifecycleError> {
        self.take_review(id)?;
        info!(entry_id = %id, "Review rejected");
        Ok(())
    }

    /// Close a review or draft group without applying it
    ///
    /// Reviews become inert drafts tagged with the resolution. Works while the
    /// analysis is still running.
    pub fn dismiss(&mut self, id: &str, resolution: Resolution) -> Result<(), LifecycleError> {
        if resolution == Resolution::WorkaroundAccepted {
            return Err(LifecycleError::InvalidResolution(resolution));
        }

        if self.review(id).is_some() {
            let review = self.take_review(id)?;
            self.push_drafts(
                &review.id,
                &review.target,
                &review.operation,
                &review.description,
                &review.diff_items,
                Some(review.analysis.clone()),
                Some(resolution),
            );
            info!(entry_id = %id, resolution = %resolution, "Review closed");
            return Ok(());
        }

        let mut touched = 0;
        for draft in self
            .drafts
            .iter_mut()
            .filter(|d| d.group_id == id && !d.is_inert())
        {
            draft.resolution = Some(resolution);
            touched += 1;
        }
        if touched == 0 {
            return Err(LifecycleError::NotFound(id.to_string()));
        }
        info!(entry_id = %id, resolution = %resolution, drafts = touched, "Draft group closed");
        Ok(())
    }

    /// Replace an entry with its workaround's drafts
    ///
    /// Valid once the entry resolved with a workaround kind, whatever the verdict.
    /// The original is kept as inert drafts tagged `workaround-accepted`.
    pub fn accept_workaround(
        &mut self,
        id: &str,
        destination_override: Option<&str>,
    ) -> Result<Vec<String>, LifecycleError> {
        let (target, op, ctx, description, evaluation) = if let Some(review) = self.review(id) {
            let evaluation = workaround_evaluation(id, &review.analysis)?;
            let review = self.take_review(id)?;
            self.push_drafts(
                &review.id,
                &review.target,
                &review.operation,
                &review.description,
                &review.diff_items,
                Some(review.analysis.clone()),
                Some(Resolution::WorkaroundAccepted),
            );
            (
                review.target,
                review.operation,
                review.context,
                review.description,
                evaluation,
            )
        } else {
            let first = self
                .drafts
                .iter()
                .find(|d| d.group_id == id && !d.is_inert())
                .ok_or_else(|| LifecycleError::NotFound(id.to_string()))?;
            let status = first.analysis.clone().unwrap_or(AnalysisStatus::Analyzing);
            let evaluation = workaround_evaluation(id, &status)?;
            let header = (
                first.target.clone(),
                first.operation.clone(),
                first.description.clone(),
            );

            for draft in self
                .drafts
                .iter_mut()
                .filter(|d| d.group_id == id && !d.is_inert())
            {
                draft.resolution = Some(Resolution::WorkaroundAccepted);
            }
            let ctx = self.group_contexts.get(id).cloned().unwrap_or_default();
            (header.0, header.1, ctx, header.2, evaluation)
        };

        // workaround_evaluation guarantees a kind
        let kind = evaluation
            .workaround_type
            .ok_or_else(|| LifecycleError::NoWorkaround(id.to_string()))?;
        let steps = workaround::synthesize(
            kind,
            &op,
            &ctx,
            evaluation.workaround_context.as_ref(),
            destination_override,
        );

        let group_id = Uuid::new_v4().to_string();
        let step_description = format!("{} (workaround: {})", description, kind);
        let ids = self.push_drafts(
            &group_id,
            &target,
            &op,
            &step_description,
            &steps,
            Some(AnalysisStatus::Resolved { evaluation }),
            None,
        );
        self.issued.insert(group_id.clone());
        info!(entry_id = %id, workaround = %kind, drafts = ids.len(), "Workaround accepted");
        Ok(ids)
    }

    /// Remove one draft; no other entry is affected
    pub fn undo(&mut self, change_id: &str) -> Result<DraftChange, LifecycleError> {
        let index = self
            .drafts
            .iter()
            .position(|d| d.id == change_id)
            .ok_or_else(|| LifecycleError::NotFound(change_id.to_string()))?;
        let removed = self.drafts.remove(index);
        if !self.drafts.iter().any(|d| d.group_id == removed.group_id) {
            self.group_contexts.remove(&removed.group_id);
        }
        Ok(removed)
    }

    // =========================================================================
    // Bulk transitions and processing
    // =========================================================================

    /// Hand every live draft to processing and start the processing window
    pub fn apply_all(&mut self) -> Result<ApplyBatch, LifecycleError> {
        self.apply_all_at(Utc::now())
    }

    pub fn apply_all_at(&mut self, now: DateTime<Utc>) -> Result<ApplyBatch, LifecycleError> {
        if let Some(state) = &self.processing {
            return Err(LifecycleError::Processing {
                until: state.estimated_completion,
            });
        }
        if !self.drafts.iter().any(|d| !d.is_inert()) {
            return Err(LifecycleError::NothingToApply);
        }

        let (applied, inert): (Vec<DraftChange>, Vec<DraftChange>) =
            std::mem::take(&mut self.drafts)
                .into_iter()
                .partition(|d| !d.is_inert());
        // Every draft left with the batch
        self.group_contexts.clear();

        let state = ProcessingState {
            started_at: now,
            estimated_completion: now + self.processing_config.estimate(applied.len()),
            change_count: applied.len(),
        };
        info!(
            changes = applied.len(),
            until = %state.estimated_completion,
            "Processing started"
        );
        self.processing = Some(state.clone());

        Ok(ApplyBatch {
            applied,
            skipped: inert.len(),
            processing: state,
        })
    }

    /// Drop every draft; returns how many were removed
    pub fn discard_all(&mut self) -> usize {
        let count = self.drafts.len();
        self.drafts.clear();
        self.group_contexts.clear();
        info!(drafts = count, "Drafts discarded");
        count
    }

    /// External completion signal for the processing window
    pub fn complete_processing(&mut self) -> Option<ProcessingState> {
        let state = self.processing.take();
        if state.is_some() {
            info!("Processing cleared");
        }
        state
    }
}

fn workaround_evaluation(id: &str, status: &AnalysisStatus) -> Result<Evaluation, LifecycleError> {
    match status {
        AnalysisStatus::Analyzing => Err(LifecycleError::StillAnalyzing(id.to_string())),
        AnalysisStatus::Resolved { evaluation } if evaluation.offers_workaround() => {
            Ok(evaluation.clone())
        }
        _ => Err(LifecycleError::NoWorkaround(id.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Confidence, NodeLevel, Verdict, WorkaroundKind};
    use crate::policy::PolicyEvaluator;
    use async_trait::async_trait;
    use tokio::sync::Notify;

    fn manager() -> ChangeLifecycleManager {
        ChangeLifecycleManager::new(Arc::new(PolicyEvaluator::new()))
    }

    fn subtheme(name: &str) -> NodeRef {
        NodeRef::new(format!("s-{}", name.len()), name, NodeLevel::SubTheme)
    }

    fn delete_ctx(name: &str) -> OperationContext {
        OperationContext {
            current_name: Some(name.to_string()),
            sibling_names: vec!["Login".to_string()],
            volume: Some(10),
            ..Default::default()
        }
    }

    /// Holds every evaluation until released
    struct Gate {
        open: Notify,
    }

    #[async_trait]
    impl DecisionService for Gate {
        async fn evaluate(
            &self,
            _op: &OperationType,
            _ctx: &OperationContext,
        ) -> Result<Evaluation, EvaluationError> {
            self.open.notified().await;
            Ok(Evaluation::new(Verdict::Approve, Confidence::High))
        }

        fn name(&self) -> &'static str {
            "gate"
        }
    }

    struct Failing;

    #[async_trait]
    impl DecisionService for Failing {
        async fn evaluate(
            &self,
            _op: &OperationType,
            _ctx: &OperationContext,
        ) -> Result<Evaluation, EvaluationError> {
            Err(EvaluationError::Logic("boom".to_string()))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    struct Panicking;

    #[async_trait]
    impl DecisionService for Panicking {
        async fn evaluate(
            &self,
            _op: &OperationType,
            _ctx: &OperationContext,
        ) -> Result<Evaluation, EvaluationError> {
            panic!("evaluator crashed")
        }

        fn name(&self) -> &'static str {
            "panicking"
        }
    }

    #[tokio::test]
    async fn test_review_lifecycle_accept() {
        let mut mgr = manager();
        let started = mgr
            .initiate(
                subtheme("Refunds"),
                OperationType::DeleteSubTheme,
                delete_ctx("Refunds"),
            )
            .unwrap();
        let Initiated::Review { id } = started else {
            panic!("delete should open a review");
        };

        assert!(mgr.review(&id).unwrap().analysis.is_analyzing());
        assert_eq!(
            mgr.accept(&id),
            Err(LifecycleError::StillAnalyzing(id.clone()))
        );

        let (settled_id, outcome) = mgr.next_settled().await.unwrap();
        assert_eq!(settled_id, id);
        assert_eq!(outcome, SettleOutcome::Resolved);
        assert_eq!(mgr.review(&id).unwrap().analysis.verdict(), Some(Verdict::Approve));

        let ids = mgr.accept(&id).unwrap();
        assert_eq!(ids.len(), 1);
        assert!(mgr.reviews().is_empty());
        let draft = &mgr.drafts()[0];
        assert_eq!(draft.group_id, id);
        assert_eq!(
            draft.analysis.as_ref().and_then(|a| a.verdict()),
            Some(Verdict::Approve)
        );
        assert!(mgr.next_settled().await.is_none());
    }

    #[tokio::test]
    async fn test_rename_goes_straight_to_drafts() {
        let mut mgr = manager();
        let started = mgr
            .initiate(
                subtheme("Unknown Error"),
                OperationType::RenameSubTheme,
                OperationContext {
                    current_name: Some("Unknown Error".to_string()),
                    new_name: Some("Scheduling Error Messages".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let Initiated::Drafts { group_id, ids } = started else {
            panic!("rename should add drafts");
        };
        assert_eq!(ids.len(), 1);
        assert!(mgr.reviews().is_empty());
        assert!(mgr.drafts()[0].analysis.as_ref().unwrap().is_analyzing());

        mgr.settle_all().await;
        for draft in mgr.draft_group(&group_id) {
            assert_eq!(
                draft.analysis.as_ref().and_then(|a| a.verdict()),
                Some(Verdict::Approve)
            );
        }
    }

    #[tokio::test]
    async fn test_split_group_updated_together() {
        let mut mgr = manager();
        // Splits route to review; accepting fans out into one draft per item
        let started = mgr
            .initiate(
                subtheme("Sync Problems"),
                OperationType::SplitSubTheme,
                OperationContext {
                    current_name: Some("Sync Problems".to_string()),
                    proposed_names: vec!["Google Sync".to_string(), "Outlook Sync".to_string()],
                    ..Default::default()
                },
            )
            .unwrap();
        mgr.settle_all().await;

        let ids = mgr.accept(started.entry_id()).unwrap();
        assert_eq!(ids.len(), 3);
        let group = mgr.draft_group(started.entry_id());
        assert!(group
            .iter()
            .all(|d| d.analysis.as_ref().and_then(|a| a.verdict())
                == Some(Verdict::ApproveWithConditions)));
    }

    #[tokio::test]
    async fn test_reject_while_analyzing_then_late_result() {
        let gate = Arc::new(Gate {
            open: Notify::new(),
        });
        let mut mgr = ChangeLifecycleManager::new(gate.clone());

        let started = mgr
            .initiate(
                subtheme("Refunds"),
                OperationType::DeleteSubTheme,
                delete_ctx("Refunds"),
            )
            .unwrap();
        let id = started.entry_id().to_string();

        mgr.reject(&id).unwrap();
        assert!(mgr.reviews().is_empty());

        gate.open.notify_one();
        let (_, outcome) = mgr.next_settled().await.unwrap();
        assert_eq!(outcome, SettleOutcome::AttachedLate);
        assert!(mgr.reviews().is_empty());
        assert!(mgr.drafts().is_empty());
        assert!(mgr.late_result(&id).is_some());
    }

    #[tokio::test]
    async fn test_dismiss_while_analyzing_stays_terminal() {
        let gate = Arc::new(Gate {
            open: Notify::new(),
        });
        let mut mgr = ChangeLifecycleManager::new(gate.clone());

        let started = mgr
            .initiate(
                subtheme("Refunds"),
                OperationType::DeleteSubTheme,
                delete_ctx("Refunds"),
            )
            .unwrap();
        let id = started.entry_id().to_string();

        mgr.dismiss(&id, Resolution::Contacted).unwrap();
        assert_eq!(mgr.drafts().len(), 1);
        assert_eq!(mgr.drafts()[0].resolution, Some(Resolution::Contacted));

        gate.open.notify_one();
        let (_, outcome) = mgr.next_settled().await.unwrap();
        assert_eq!(outcome, SettleOutcome::AttachedLate);

        let draft = &mgr.drafts()[0];
        assert_eq!(draft.resolution, Some(Resolution::Contacted));
        assert_eq!(
            draft.analysis.as_ref().and_then(|a| a.verdict()),
            Some(Verdict::Approve)
        );
        assert_eq!(mgr.apply_all(), Err(LifecycleError::NothingToApply));
    }

    #[tokio::test]
    async fn test_dismiss_rejects_workaround_resolution() {
        let mut mgr = manager();
        assert_eq!(
            mgr.dismiss("x", Resolution::WorkaroundAccepted),
            Err(LifecycleError::InvalidResolution(Resolution::WorkaroundAccepted))
        );
        assert_eq!(
            mgr.dismiss("x", Resolution::Dismissed),
            Err(LifecycleError::NotFound("x".to_string()))
        );
    }

    #[tokio::test]
    async fn test_transfer_then_merge_workaround_two_steps() {
        let mut mgr = manager();
        let started = mgr
            .initiate(
                subtheme("Sync Issues"),
                OperationType::RenameSubTheme,
                OperationContext {
                    current_name: Some("Sync Issues".to_string()),
                    new_name: Some("Calendar Sync Errors".to_string()),
                    parent_theme: Some("Integrations".to_string()),
                    cross_theme_siblings: vec![crate::models::CrossThemeSibling {
                        name: "Calendar Sync Errors".to_string(),
                        theme: "Calendar".to_string(),
                    }],
                    ..Default::default()
                },
            )
            .unwrap();
        let group_id = started.entry_id().to_string();

        assert_eq!(
            mgr.accept_workaround(&group_id, None),
            Err(LifecycleError::StillAnalyzing(group_id.clone()))
        );
        mgr.settle_all().await;

        let ids = mgr.accept_workaround(&group_id, None).unwrap();
        assert_eq!(ids.len(), 2);

        let steps: Vec<&DraftChange> = ids
            .iter()
            .map(|id| mgr.drafts().iter().find(|d| &d.id == id).unwrap())
            .collect();
        assert_eq!(steps[0].field, crate::models::ChangeField::Parent);
        assert_eq!(steps[0].new_value.as_deref(), Some("Calendar"));
        assert_eq!(steps[1].field, crate::models::ChangeField::Merge);
        assert_eq!(steps[1].new_value.as_deref(), Some("Calendar Sync Errors"));

        let original = mgr.draft_group(&group_id);
        assert!(original
            .iter()
            .all(|d| d.resolution == Some(Resolution::WorkaroundAccepted)));
    }

    #[tokio::test]
    async fn test_rejected_merge_accepts_merge_parents() {
        let mut mgr = manager();
        let started = mgr
            .initiate(
                subtheme("Refund Delays"),
                OperationType::MergeSubTheme,
                OperationContext {
                    source_name: Some("Refund Delays".to_string()),
                    destination_name: Some("Buffering".to_string()),
                    source_parent_theme: Some("Billing".to_string()),
                    destination_parent_theme: Some("Video Quality".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        mgr.settle_all().await;

        let verdict = mgr
            .review(started.entry_id())
            .and_then(|r| r.analysis.verdict());
        assert_eq!(verdict, Some(Verdict::Reject));

        let ids = mgr.accept_workaround(started.entry_id(), None).unwrap();
        assert_eq!(ids.len(), 1);
        assert!(mgr.reviews().is_empty());

        let step = mgr.drafts().iter().find(|d| d.id == ids[0]).unwrap();
        assert_eq!(step.level, NodeLevel::Theme);
        assert_eq!(step.field, crate::models::ChangeField::Merge);
        assert_eq!(step.old_value.as_deref(), Some("Billing"));
        assert_eq!(step.new_value.as_deref(), Some("Video Quality"));
    }

    #[tokio::test]
    async fn test_workaround_requires_workaround_kind() {
        let mut mgr = manager();
        let started = mgr
            .initiate(
                subtheme("Refunds"),
                OperationType::DeleteSubTheme,
                delete_ctx("Refunds"),
            )
            .unwrap();
        mgr.settle_all().await;
        assert_eq!(
            mgr.accept_workaround(started.entry_id(), None),
            Err(LifecycleError::NoWorkaround(started.entry_id().to_string()))
        );
    }

    #[tokio::test]
    async fn test_review_workaround_with_override() {
        let mut mgr = manager();
        let started = mgr
            .initiate(
                subtheme("Dark Mode"),
                OperationType::PromoteSubTheme,
                OperationContext {
                    current_name: Some("Dark Mode".to_string()),
                    parent_theme: Some("Appearance".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        mgr.settle_all().await;
        assert_eq!(
            mgr.review(started.entry_id())
                .and_then(|r| r.analysis.evaluation())
                .and_then(|e| e.workaround_type),
            Some(WorkaroundKind::CreateTheme)
        );

        let ids = mgr
            .accept_workaround(started.entry_id(), Some("Themes & Display"))
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert!(mgr.reviews().is_empty());
        assert!(mgr
            .drafts()
            .iter()
            .any(|d| d.new_value.as_deref() == Some("Themes & Display")));
    }

    #[tokio::test]
    async fn test_evaluation_error_is_actionable() {
        let mut mgr = ChangeLifecycleManager::new(Arc::new(Failing));
        let started = mgr
            .initiate(
                subtheme("Refunds"),
                OperationType::DeleteSubTheme,
                delete_ctx("Refunds"),
            )
            .unwrap();
        mgr.settle_all().await;

        let review = mgr.review(started.entry_id()).unwrap();
        assert!(matches!(review.analysis, AnalysisStatus::Error { .. }));
        assert_eq!(mgr.accept(started.entry_id()).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_panicking_evaluation_becomes_error() {
        let mut mgr = ChangeLifecycleManager::new(Arc::new(Panicking));
        let started = mgr
            .initiate(
                subtheme("Refunds"),
                OperationType::DeleteSubTheme,
                delete_ctx("Refunds"),
            )
            .unwrap();
        mgr.settle_all().await;
        assert!(matches!(
            mgr.review(started.entry_id()).unwrap().analysis,
            AnalysisStatus::Error { .. }
        ));
    }

    #[tokio::test]
    async fn test_undo_removes_one_draft_only() {
        let mut mgr = manager();
        let started = mgr
            .initiate(
                subtheme("Sync Problems"),
                OperationType::SplitSubTheme,
                OperationContext {
                    current_name: Some("Sync Problems".to_string()),
                    proposed_names: vec!["Google Sync".to_string()],
                    ..Default::default()
                },
            )
            .unwrap();
        mgr.settle_all().await;
        let ids = mgr.accept(started.entry_id()).unwrap();

        let removed = mgr.undo(&ids[0]).unwrap();
        assert_eq!(removed.id, ids[0]);
        assert_eq!(mgr.drafts().len(), 1);
        assert_eq!(
            mgr.undo(&ids[0]),
            Err(LifecycleError::NotFound(ids[0].clone()))
        );
    }

    fn create_ctx(name: &str) -> OperationContext {
        OperationContext {
            new_name: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_group_context_dropped_with_last_draft() {
        let mut mgr = manager();
        let Initiated::Drafts { group_id: first, ids } = mgr
            .initiate(subtheme("Billing"), OperationType::CreateSubTheme, create_ctx("Invoices"))
            .unwrap()
        else {
            panic!("creates go straight to drafts");
        };
        let second = mgr
            .initiate(subtheme("Billing"), OperationType::CreateSubTheme, create_ctx("Receipts"))
            .unwrap()
            .entry_id()
            .to_string();
        mgr.settle_all().await;
        assert_eq!(mgr.group_contexts.len(), 2);

        mgr.undo(&ids[0]).unwrap();
        assert!(!mgr.group_contexts.contains_key(&first));
        assert!(mgr.group_contexts.contains_key(&second));

        mgr.apply_all().unwrap();
        assert!(mgr.group_contexts.is_empty());
    }

    #[tokio::test]
    async fn test_apply_all_gates_new_sessions() {
        let mut mgr = manager();
        mgr.initiate(
            subtheme("Billing"),
            OperationType::CreateSubTheme,
            OperationContext {
                new_name: Some("Invoices".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        mgr.settle_all().await;

        let now = Utc::now();
        let batch = mgr.apply_all_at(now).unwrap();
        assert_eq!(batch.applied.len(), 1);
        assert_eq!(batch.skipped, 0);
        assert_eq!(
            batch.processing.estimated_completion,
            now + chrono::Duration::seconds(135)
        );
        assert!(mgr.drafts().is_empty());
        assert!(mgr.is_processing());

        let blocked = mgr.initiate(
            subtheme("Billing"),
            OperationType::CreateSubTheme,
            OperationContext::default(),
        );
        assert!(matches!(blocked, Err(LifecycleError::Processing { .. })));

        assert!(mgr.complete_processing().is_some());
        assert!(!mgr.is_processing());
        assert!(mgr
            .initiate(
                subtheme("Billing"),
                OperationType::CreateSubTheme,
                OperationContext::default(),
            )
            .is_ok());
    }

    #[tokio::test]
    async fn test_discard_all() {
        let mut mgr = manager();
        mgr.initiate(
            subtheme("Billing"),
            OperationType::CreateSubTheme,
            OperationContext {
                new_name: Some("Invoices".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(mgr.discard_all(), 1);
        assert!(mgr.drafts().is_empty());
        assert!(mgr.group_contexts.is_empty());

        // The pending evaluation still arrives and is recorded only
        let (_, outcome) = mgr.next_settled().await.unwrap();
        assert_eq!(outcome, SettleOutcome::AttachedLate);
    }

    #[tokio::test]
    async fn test_orphaned_settlement() {
        let mut mgr = manager();
        let outcome = mgr.apply_settled(Settled {
            entry_id: "never-issued".to_string(),
            status: AnalysisStatus::Analyzing,
        });
        assert_eq!(outcome, SettleOutcome::Orphaned);
    }
}
