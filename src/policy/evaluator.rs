//! Deterministic per-operation decision procedures
//!
//! Each procedure walks an ordered list of checks and returns on the first one
//! that fires. The order is the tie-break policy: do not reorder branches.

use super::lexicon::{
    are_parents_related, find_exact_duplicate, find_word_overlap, incompatible_pair,
    is_generic_name, is_moderate_similarity, shared_tokens,
};
use super::{DecisionService, EvaluationError};
use crate::models::{
    Confidence, Evaluation, NodeLevel, OperationContext, OperationType, PartialItem,
    ThemeCategory, Verdict, WorkaroundKind,
};
use async_trait::async_trait;
use tracing::debug;

/// Record volume above which destructive edits carry conditions
pub const HIGH_VOLUME_THRESHOLD: u64 = 200;

/// Split fan-out above which the result is considered over-fragmented
pub const MAX_SPLIT_NAMES: usize = 5;

/// Minimum shared significant tokens for two names to overlap
const MIN_SHARED_WORDS: usize = 2;

/// Local heuristic evaluator
#[derive(Debug, Clone, Default)]
pub struct PolicyEvaluator;

impl PolicyEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate one proposed edit. Total: absent context fields take defaults.
    pub fn evaluate(&self, op: &OperationType, ctx: &OperationContext) -> Evaluation {
        let missing = ctx.missing_fields(op);
        if !missing.is_empty() {
            debug!(operation = %op, missing = ?missing, "Context incomplete, using defaults");
        }

        if let Some(rejection) = multi_parent_violation(op, ctx) {
            return rejection;
        }

        let evaluation = match op {
            OperationType::RenameSubTheme => rename_subtheme(ctx),
            OperationType::RenameTheme => rename_theme(ctx),
            OperationType::DeleteSubTheme => delete_subtheme(ctx),
            OperationType::DeleteKeyword => delete_keyword(ctx),
            OperationType::MergeSubTheme => merge_subtheme(ctx),
            OperationType::MergeTheme => merge_theme(ctx),
            OperationType::SplitSubTheme => split_subtheme(ctx),
            OperationType::CreateSubTheme => create(NodeLevel::SubTheme, ctx),
            OperationType::CreateTheme => create(NodeLevel::Theme, ctx),
            OperationType::ChangeThemeCategory => change_theme_category(ctx),
            OperationType::PromoteSubTheme => promote_subtheme(ctx),
            OperationType::Unknown(raw) => unknown(raw),
        };

        debug!(
            operation = %op,
            verdict = %evaluation.verdict,
            confidence = %evaluation.confidence,
            "Local evaluation complete"
        );
        evaluation
    }
}

#[async_trait]
impl DecisionService for PolicyEvaluator {
    async fn evaluate(
        &self,
        op: &OperationType,
        ctx: &OperationContext,
    ) -> Result<Evaluation, EvaluationError> {
        Ok(PolicyEvaluator::evaluate(self, op, ctx))
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

// ============================================================================
// Invariant pre-check
// ============================================================================

/// A sub-theme reporting more than one parent theme breaks the tree invariant
fn multi_parent_violation(op: &OperationType, ctx: &OperationContext) -> Option<Evaluation> {
    if op.target_level() != Some(NodeLevel::SubTheme) {
        return None;
    }

    let mut parents: Vec<&str> = Vec::new();
    for parent in &ctx.reported_parents {
        let parent = parent.trim();
        if !parent.is_empty() && !parents.iter().any(|p| p.eq_ignore_ascii_case(parent)) {
            parents.push(parent);
        }
    }
    if parents.len() < 2 {
        return None;
    }

    Some(
        Evaluation::new(Verdict::Reject, Confidence::High)
            .risk(format!(
                "Sub-theme \"{}\" reports multiple parent themes: {}",
                ctx.current_name(),
                parents.join(", ")
            ))
            .risk("Editing a node with an inconsistent parent link can orphan its records")
            .remediation(
                "Resolve the duplicate parent links so the sub-theme belongs to exactly one theme before editing it.",
            ),
    )
}

// ============================================================================
// Renames
// ============================================================================

fn siblings_excluding(siblings: &[String], current: &str) -> Vec<String> {
    let current = current.trim();
    siblings
        .iter()
        .filter(|s| current.is_empty() || !s.trim().eq_ignore_ascii_case(current))
        .cloned()
        .collect()
}

fn rename_subtheme(ctx: &OperationContext) -> Evaluation {
    let current = ctx.current_name();
    let new = ctx.new_name();

    // (1) Exact duplicate under another theme
    let cross_names: Vec<String> = ctx
        .cross_theme_siblings
        .iter()
        .map(|s| s.name.clone())
        .collect();
    if let Some(dup) = find_exact_duplicate(new, &cross_names) {
        let theme = ctx
            .cross_theme_siblings
            .iter()
            .find(|s| s.name == dup)
            .map(|s| s.theme.clone())
            .unwrap_or_default();

        let plan = OperationContext {
            source_name: Some(current.to_string()),
            destination_name: Some(dup.to_string()),
            source_parent_theme: ctx.parent_theme.clone(),
            destination_parent_theme: Some(theme.clone()),
            ..Default::default()
        };
        return Evaluation::new(Verdict::Workaround, Confidence::Med)
            .risk(format!("\"{}\" already exists under theme \"{}\"", dup, theme))
            .risk("Renaming would leave two sub-themes with the same name in different themes")
            .remediation(format!(
                "Move \"{}\" under \"{}\" and merge it into the existing \"{}\".",
                current, theme, dup
            ))
            .with_workaround(WorkaroundKind::TransferThenMerge, plan);
    }

    // (2) Overlap with a same-parent sibling
    let siblings = siblings_excluding(&ctx.sibling_names, current);
    if let Some(sibling) = find_word_overlap(new, &siblings, MIN_SHARED_WORDS) {
        return merge_siblings_instead(current, new, sibling);
    }

    // (3) Catch-all name
    if is_generic_name(new) {
        return Evaluation::new(Verdict::ApproveWithConditions, Confidence::Med)
            .risk(format!(
                "\"{}\" is a catch-all name; records filed under it are hard to act on",
                new
            ));
    }

    approve_rename(current, new, ctx)
}

fn rename_theme(ctx: &OperationContext) -> Evaluation {
    let current = ctx.current_name();
    let new = ctx.new_name();

    let siblings = siblings_excluding(&ctx.sibling_names, current);
    if let Some(sibling) = find_word_overlap(new, &siblings, MIN_SHARED_WORDS) {
        return merge_siblings_instead(current, new, sibling);
    }

    if is_generic_name(new) {
        return Evaluation::new(Verdict::ApproveWithConditions, Confidence::Med)
            .risk(format!(
                "\"{}\" is a catch-all theme name; its sub-themes lose context",
                new
            ));
    }

    approve_rename(current, new, ctx)
}

fn merge_siblings_instead(current: &str, new: &str, sibling: &str) -> Evaluation {
    let shared = shared_tokens(new, sibling).join(", ");
    let plan = OperationContext {
        source_name: Some(current.to_string()),
        destination_name: Some(sibling.to_string()),
        ..Default::default()
    };

    Evaluation::new(Verdict::Workaround, Confidence::Med)
        .risk(format!(
            "\"{}\" overlaps with sibling \"{}\" (shared: {})",
            new, sibling, shared
        ))
        .risk("Two near-identical siblings split the same feedback between them")
        .remediation(format!(
            "Merge \"{}\" into \"{}\" instead of renaming it.",
            current, sibling
        ))
        .with_workaround(WorkaroundKind::MergeSiblings, plan)
}

fn approve_rename(current: &str, new: &str, ctx: &OperationContext) -> Evaluation {
    Evaluation::new(Verdict::Approve, Confidence::High).risk(format!(
        "Name change only: {} records move from \"{}\" to \"{}\" unchanged",
        ctx.volume(),
        current,
        new
    ))
}

// ============================================================================
// Deletes
// ============================================================================

fn delete_subtheme(ctx: &OperationContext) -> Evaluation {
    let name = ctx.current_name();
    let volume = ctx.volume();

    if is_generic_name(name) {
        return Evaluation::new(Verdict::Reject, Confidence::High)
            .risk(format!(
                "\"{}\" is a catch-all sub-theme; deleting it leaves {} records with no fallback",
                name, volume
            ))
            .remediation("Keep the catch-all and re-home specific records out of it instead.");
    }

    if ctx.sibling_names.is_empty() {
        let parent = ctx.parent_theme.as_deref().unwrap_or("its theme");
        return Evaluation::new(Verdict::Reject, Confidence::Med)
            .risk(format!("\"{}\" is the only sub-theme under \"{}\"", name, parent))
            .risk(format!("{} records would have no sibling to fall back to", volume))
            .remediation("Delete or merge the parent theme instead of its only sub-theme.");
    }

    if volume > HIGH_VOLUME_THRESHOLD {
        return Evaluation::new(Verdict::ApproveWithConditions, Confidence::Med)
            .risk(format!(
                "{} records will need re-classification into {} remaining siblings",
                volume,
                ctx.sibling_names.len()
            ))
            .risk("Re-classification runs as a backfill and may take a while to settle");
    }

    Evaluation::new(Verdict::Approve, Confidence::High).risk(format!(
        "{} records will be re-classified into sibling sub-themes",
        volume
    ))
}

fn delete_keyword(ctx: &OperationContext) -> Evaluation {
    let name = ctx.current_name();
    let level = ctx.keyword_level.unwrap_or(NodeLevel::L3);

    if ctx.sub_theme_names.is_empty() {
        return Evaluation::new(Verdict::Approve, Confidence::High)
            .risk(format!("No sub-themes hang off {} \"{}\"", level, name));
    }

    let lower = name.to_lowercase();
    let shared_signal = lower.contains("general") || lower.contains("common");
    if shared_signal && ctx.l1_keyword.is_some() && ctx.l2_keyword.is_some() {
        return Evaluation::new(Verdict::Reject, Confidence::Med)
            .risk(format!(
                "\"{}\" looks like a shared keyword reused across several paths",
                name
            ))
            .risk(format!(
                "{} sub-themes may also be reachable through other parents",
                ctx.sub_theme_names.len()
            ))
            .remediation("Detach the shared sub-themes before deleting the keyword.");
    }

    let plan = OperationContext {
        source_name: Some(name.to_string()),
        destination_name: ctx.sibling_names.first().cloned(),
        keyword_level: Some(level),
        ..Default::default()
    };
    Evaluation::new(Verdict::Workaround, Confidence::Med)
        .risk(format!(
            "{} sub-themes would lose their keyword path: {}",
            ctx.sub_theme_names.len(),
            ctx.sub_theme_names.join(", ")
        ))
        .remediation(format!(
            "Merge \"{}\" into a sibling keyword so its sub-themes keep a path.",
            name
        ))
        .with_workaround(WorkaroundKind::MergeKeyword, plan)
}

// ============================================================================
// Merges
// ============================================================================

fn same_name(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

fn merge_subtheme(ctx: &OperationContext) -> Evaluation {
    let source = ctx.source_name();
    let dest = ctx.destination_name();
    let volume = ctx.volume();

    let source_parent = ctx
        .source_parent_theme
        .as_deref()
        .or(ctx.parent_theme.as_deref());
    let dest_parent = ctx
        .destination_parent_theme
        .as_deref()
        .or(ctx.parent_theme.as_deref());

    // (1) Different parents
    if let (Some(sp), Some(dp)) = (source_parent, dest_parent) {
        if !same_name(sp, dp) {
            let placement = format!(
                "\"{}\" and \"{}\" live under different themes (\"{}\" vs \"{}\")",
                source, dest, sp, dp
            );

            if are_parents_related(sp, dp) {
                let plan = OperationContext {
                    source_name: Some(source.to_string()),
                    source_parent_theme: Some(sp.to_string()),
                    destination_parent_theme: Some(dp.to_string()),
                    destination_name: Some(dest.to_string()),
                    ..Default::default()
                };
                return Evaluation::new(Verdict::Workaround, Confidence::Med)
                    .risk(placement)
                    .risk("Merging across themes silently changes the source's theme")
                    .remediation(format!(
                        "Move \"{}\" under \"{}\" first; the merge can then be re-proposed between siblings.",
                        source, dp
                    ))
                    .with_workaround(WorkaroundKind::MoveToParent, plan);
            }

            let plan = OperationContext {
                source_name: Some(sp.to_string()),
                destination_name: Some(dp.to_string()),
                ..Default::default()
            };
            return Evaluation::new(Verdict::Reject, Confidence::High)
                .risk(placement)
                .risk(format!("\"{}\" and \"{}\" are unrelated themes", sp, dp))
                .remediation(format!(
                    "Keep the sub-themes apart; merge \"{}\" into \"{}\" only if the themes truly describe the same feedback.",
                    sp, dp
                ))
                .with_workaround(WorkaroundKind::MergeParents, plan);
        }
    }

    // (2) Incompatible concerns
    if let Some((a, b)) = incompatible_pair(source, dest) {
        return Evaluation::new(Verdict::Reject, Confidence::High)
            .risk(format!(
                "\"{}\" and \"{}\" describe incompatible concerns ({} vs {})",
                source, dest, a, b
            ))
            .remediation("Keep both sub-themes; they capture different kinds of feedback.");
    }

    // (3) Partial overlap
    if is_moderate_similarity(source, dest) {
        let shared = shared_tokens(source, dest).join(", ");
        return Evaluation::new(Verdict::Partial, Confidence::Med)
            .risk(format!(
                "\"{}\" and \"{}\" only share \"{}\"",
                source, dest, shared
            ))
            .risk("Merging everything would blur the destination's meaning")
            .with_partial_items(vec![
                PartialItem::new(dest, true, "Merge destination, keeps its records"),
                PartialItem::new(
                    format!("{} ({})", source, shared),
                    true,
                    format!("Records of \"{}\" that mention \"{}\" fit the destination", source, shared),
                ),
                PartialItem::new(
                    format!("{} (remaining)", source),
                    false,
                    format!("Records without \"{}\" stay in \"{}\"", shared, source),
                ),
            ]);
    }

    Evaluation::new(Verdict::Approve, Confidence::High).risk(format!(
        "{} records from \"{}\" will be re-classified into \"{}\"",
        volume, source, dest
    ))
}

fn merge_theme(ctx: &OperationContext) -> Evaluation {
    let source = ctx.source_name();
    let dest = ctx.destination_name();

    if let (Some(sc), Some(dc)) = (ctx.source_category, ctx.destination_category) {
        if sc != dc {
            let plan = OperationContext {
                current_name: Some(source.to_string()),
                source_name: Some(source.to_string()),
                destination_name: Some(dest.to_string()),
                current_category: Some(sc),
                new_category: Some(dc),
                ..Default::default()
            };
            return Evaluation::new(Verdict::Workaround, Confidence::Med)
                .risk(format!(
                    "\"{}\" is categorised as {} but \"{}\" is {}",
                    source, sc, dest, dc
                ))
                .risk("A theme has exactly one category; merging would silently recategorise records")
                .remediation(format!(
                    "Change \"{}\" to {} first, then merge it into \"{}\".",
                    source, dc, dest
                ))
                .with_workaround(WorkaroundKind::ChangeCategory, plan);
        }
    }

    Evaluation::new(Verdict::ApproveWithConditions, Confidence::Med)
        .risk(format!(
            "Every keyword path that reaches \"{}\" will point at \"{}\"",
            source, dest
        ))
        .risk(format!(
            "{} records will be re-classified into \"{}\"",
            ctx.volume(),
            dest
        ))
}

// ============================================================================
// Split, create, category, promote
// ============================================================================

fn split_subtheme(ctx: &OperationContext) -> Evaluation {
    let current = ctx.current_name();
    let proposed = &ctx.proposed_names;

    let collisions: Vec<(&String, Option<&str>)> = proposed
        .iter()
        .map(|name| (name, find_exact_duplicate(name, &ctx.sibling_names)))
        .collect();
    let collision_count = collisions.iter().filter(|(_, dup)| dup.is_some()).count();

    if collision_count > 0 {
        let items = collisions
            .into_iter()
            .map(|(name, dup)| match dup {
                Some(sibling) => PartialItem::new(
                    name.clone(),
                    false,
                    format!("Already exists as sibling \"{}\"", sibling),
                ),
                None => PartialItem::new(name.clone(), true, "New sub-theme"),
            })
            .collect();
        return Evaluation::new(Verdict::Partial, Confidence::Med)
            .risk(format!(
                "{} of {} proposed names collide with existing siblings",
                collision_count,
                proposed.len()
            ))
            .with_partial_items(items);
    }

    if proposed.len() > MAX_SPLIT_NAMES {
        return Evaluation::new(Verdict::ApproveWithConditions, Confidence::Low)
            .risk(format!(
                "Splitting \"{}\" into {} sub-themes over-fragments it",
                current,
                proposed.len()
            ))
            .risk("Small sub-themes rarely collect enough records to act on");
    }

    Evaluation::new(Verdict::ApproveWithConditions, Confidence::Med)
        .risk(format!(
            "Records of \"{}\" that match none of the new names need a home",
            current
        ))
        .risk(format!(
            "{} records will be re-classified across {} sub-themes",
            ctx.volume(),
            proposed.len()
        ))
}

fn create(level: NodeLevel, ctx: &OperationContext) -> Evaluation {
    let new = ctx.new_name();

    if let Some(dup) = find_exact_duplicate(new, &ctx.sibling_names) {
        return Evaluation::new(Verdict::Reject, Confidence::High)
            .risk(format!("A {} named \"{}\" already exists", level.label(), dup))
            .remediation(format!(
                "Use the existing \"{}\" instead of creating a duplicate.",
                dup
            ));
    }

    if level == NodeLevel::SubTheme && is_generic_name(new) {
        return Evaluation::new(Verdict::ApproveWithConditions, Confidence::Med).risk(format!(
            "\"{}\" is a catch-all name; it tends to absorb records that belong elsewhere",
            new
        ));
    }

    Evaluation::new(Verdict::Approve, Confidence::High).risk(format!(
        "New {} \"{}\" starts empty until records are re-classified",
        level.label(),
        new
    ))
}

fn change_theme_category(ctx: &OperationContext) -> Evaluation {
    let current = ctx.current_name();
    let target = ctx.new_category;
    let target_label = target
        .map(|c| c.to_string())
        .unwrap_or_else(|| "the new category".to_string());

    let has_peer = target.is_some_and(|t| {
        ctx.sibling_themes
            .iter()
            .any(|s| s.category == Some(t) && !same_name(&s.name, current))
    });

    if !has_peer {
        let plan = OperationContext {
            current_name: Some(current.to_string()),
            new_name: Some(format!("{} ({})", current, target_label)),
            parent_theme: Some(current.to_string()),
            new_category: target,
            l3_keyword: ctx.l3_keyword.clone(),
            ..Default::default()
        };
        return Evaluation::new(Verdict::Workaround, Confidence::Med)
            .risk(format!(
                "No sibling theme is categorised as {} yet",
                target_label
            ))
            .risk(format!(
                "Flipping \"{}\" alone would strand it as the only theme of its kind",
                current
            ))
            .remediation(format!(
                "Create a new {} theme and move \"{}\" into it.",
                target_label, current
            ))
            .with_workaround(WorkaroundKind::CreateTheme, plan);
    }

    if ctx.volume() > HIGH_VOLUME_THRESHOLD {
        return Evaluation::new(Verdict::ApproveWithConditions, Confidence::Med).risk(format!(
            "{} records change category to {}",
            ctx.volume(),
            target_label
        ));
    }

    Evaluation::new(Verdict::Approve, Confidence::High).risk(format!(
        "\"{}\" joins the existing {} themes",
        current, target_label
    ))
}

fn promote_subtheme(ctx: &OperationContext) -> Evaluation {
    let current = ctx.current_name();
    let category: Option<ThemeCategory> = ctx.current_category;

    let plan = OperationContext {
        current_name: Some(current.to_string()),
        new_name: Some(current.to_string()),
        parent_theme: ctx.parent_theme.clone(),
        new_category: category,
        l3_keyword: ctx.l3_keyword.clone(),
        ..Default::default()
    };
    Evaluation::new(Verdict::Workaround, Confidence::Med)
        .risk("Promotion is not a native operation")
        .risk(format!(
            "{} records of \"{}\" must move with it",
            ctx.volume(),
            current
        ))
        .remediation(format!(
            "Create a theme named \"{}\" and move the sub-theme's records into it.",
            current
        ))
        .with_workaround(WorkaroundKind::CreateTheme, plan)
}

fn unknown(raw: &str) -> Evaluation {
    Evaluation::new(Verdict::Workaround, Confidence::Low)
        .risk(format!("Operation \"{}\" is not recognised", raw))
        .remediation("Review this change manually; it cannot be evaluated automatically.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CrossThemeSibling, ThemeSummary};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn eval(op: OperationType, ctx: OperationContext) -> Evaluation {
        PolicyEvaluator::new().evaluate(&op, &ctx)
    }

    #[test]
    fn test_rename_clean_is_approved() {
        let e = eval(
            OperationType::RenameSubTheme,
            OperationContext {
                current_name: Some("Unknown Error".to_string()),
                new_name: Some("Scheduling Error Messages".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(e.verdict, Verdict::Approve);
        assert_eq!(e.confidence, Confidence::High);
        assert!(!e.risks.is_empty());
    }

    #[test]
    fn test_rename_cross_duplicate_beats_sibling_overlap() {
        let e = eval(
            OperationType::RenameSubTheme,
            OperationContext {
                current_name: Some("Sync Issues".to_string()),
                new_name: Some("Calendar Sync Errors".to_string()),
                parent_theme: Some("Integrations".to_string()),
                sibling_names: names(&["Calendar Sync Delays"]),
                cross_theme_siblings: vec![CrossThemeSibling {
                    name: "calendar sync errors".to_string(),
                    theme: "Calendar".to_string(),
                }],
                ..Default::default()
            },
        );
        assert_eq!(e.verdict, Verdict::Workaround);
        assert_eq!(e.workaround_type, Some(WorkaroundKind::TransferThenMerge));
        let plan = e.workaround_context.as_ref().unwrap();
        assert_eq!(plan.destination_parent_theme.as_deref(), Some("Calendar"));
        assert_eq!(plan.source_parent_theme.as_deref(), Some("Integrations"));
        assert!(e.offers_workaround());
    }

    #[test]
    fn test_rename_sibling_overlap_merges_siblings() {
        let e = eval(
            OperationType::RenameSubTheme,
            OperationContext {
                current_name: Some("Sync".to_string()),
                new_name: Some("Calendar Sync Errors".to_string()),
                sibling_names: names(&["Sync", "Calendar Connection Errors"]),
                ..Default::default()
            },
        );
        assert_eq!(e.workaround_type, Some(WorkaroundKind::MergeSiblings));
        assert_eq!(e.confidence, Confidence::Med);
    }

    #[test]
    fn test_rename_ignores_self_in_siblings() {
        let e = eval(
            OperationType::RenameSubTheme,
            OperationContext {
                current_name: Some("Calendar Sync Errors".to_string()),
                new_name: Some("Calendar Sync Failures".to_string()),
                sibling_names: names(&["Calendar Sync Errors", "Login"]),
                ..Default::default()
            },
        );
        assert_eq!(e.verdict, Verdict::Approve);
    }

    #[test]
    fn test_rename_to_generic_has_conditions() {
        let e = eval(
            OperationType::RenameTheme,
            OperationContext {
                current_name: Some("Odds and Ends".to_string()),
                new_name: Some("Other".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(e.verdict, Verdict::ApproveWithConditions);
        assert_eq!(e.confidence, Confidence::Med);
    }

    #[test]
    fn test_delete_generic_rejected_regardless_of_volume() {
        for volume in [0, 10, 5_000] {
            let e = eval(
                OperationType::DeleteSubTheme,
                OperationContext {
                    current_name: Some("Miscellaneous".to_string()),
                    sibling_names: names(&["Login"]),
                    volume: Some(volume),
                    ..Default::default()
                },
            );
            assert_eq!(e.verdict, Verdict::Reject);
            assert_eq!(e.confidence, Confidence::High);
            assert!(e.workaround.is_some());
        }
    }

    #[test]
    fn test_delete_only_child_rejected() {
        let e = eval(
            OperationType::DeleteSubTheme,
            OperationContext {
                current_name: Some("Refund Delays".to_string()),
                parent_theme: Some("Billing".to_string()),
                volume: Some(3),
                ..Default::default()
            },
        );
        assert_eq!(e.verdict, Verdict::Reject);
        assert_eq!(e.confidence, Confidence::Med);
    }

    #[test]
    fn test_delete_volume_threshold() {
        let ctx = |volume| OperationContext {
            current_name: Some("Refund Delays".to_string()),
            sibling_names: names(&["Invoices"]),
            volume: Some(volume),
            ..Default::default()
        };
        assert_eq!(
            eval(OperationType::DeleteSubTheme, ctx(200)).verdict,
            Verdict::Approve
        );
        assert_eq!(
            eval(OperationType::DeleteSubTheme, ctx(201)).verdict,
            Verdict::ApproveWithConditions
        );
    }

    #[test]
    fn test_delete_keyword_branches() {
        let empty = eval(
            OperationType::DeleteKeyword,
            OperationContext {
                current_name: Some("Legacy".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(empty.verdict, Verdict::Approve);

        let shared = eval(
            OperationType::DeleteKeyword,
            OperationContext {
                current_name: Some("General Feedback".to_string()),
                sub_theme_names: names(&["Praise"]),
                l1_keyword: Some("Product".to_string()),
                l2_keyword: Some("Web".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(shared.verdict, Verdict::Reject);

        let other = eval(
            OperationType::DeleteKeyword,
            OperationContext {
                current_name: Some("General Feedback".to_string()),
                sub_theme_names: names(&["Praise"]),
                l1_keyword: Some("Product".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(other.workaround_type, Some(WorkaroundKind::MergeKeyword));
    }

    #[test]
    fn test_merge_unrelated_parents_rejected_with_merge_parents() {
        let e = eval(
            OperationType::MergeSubTheme,
            OperationContext {
                source_name: Some("Refund Delays".to_string()),
                destination_name: Some("Buffering".to_string()),
                source_parent_theme: Some("Billing".to_string()),
                destination_parent_theme: Some("Video Quality".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(e.verdict, Verdict::Reject);
        assert_eq!(e.workaround_type, Some(WorkaroundKind::MergeParents));
        assert!(e.offers_workaround());
    }

    #[test]
    fn test_merge_related_parents_moves_first() {
        let e = eval(
            OperationType::MergeSubTheme,
            OperationContext {
                source_name: Some("Token Expired".to_string()),
                destination_name: Some("Session Timeout".to_string()),
                source_parent_theme: Some("Login Problems".to_string()),
                destination_parent_theme: Some("Authentication".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(e.verdict, Verdict::Workaround);
        assert_eq!(e.workaround_type, Some(WorkaroundKind::MoveToParent));
    }

    #[test]
    fn test_merge_low_similarity_rejected() {
        let e = eval(
            OperationType::MergeSubTheme,
            OperationContext {
                source_name: Some("Calendar Connection Errors".to_string()),
                destination_name: Some("Permission Denied Messages".to_string()),
                parent_theme: Some("Integrations".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(e.verdict, Verdict::Reject);
        assert_eq!(e.workaround_type, None);
    }

    #[test]
    fn test_merge_moderate_similarity_is_partial() {
        let e = eval(
            OperationType::MergeSubTheme,
            OperationContext {
                source_name: Some("Calendar Invite Emails".to_string()),
                destination_name: Some("Calendar Sync Delays".to_string()),
                parent_theme: Some("Integrations".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(e.verdict, Verdict::Partial);
        assert_eq!(e.partial_items.len(), 3);
        assert_eq!(e.partial_items.iter().filter(|i| !i.included).count(), 1);
    }

    #[test]
    fn test_merge_theme_category_mismatch() {
        let e = eval(
            OperationType::MergeTheme,
            OperationContext {
                source_name: Some("Feature Ideas".to_string()),
                destination_name: Some("Bugs".to_string()),
                source_category: Some(ThemeCategory::Request),
                destination_category: Some(ThemeCategory::Issue),
                ..Default::default()
            },
        );
        assert_eq!(e.workaround_type, Some(WorkaroundKind::ChangeCategory));

        let unknown_category = eval(
            OperationType::MergeTheme,
            OperationContext {
                source_name: Some("Feature Ideas".to_string()),
                destination_name: Some("Wishlist".to_string()),
                source_category: Some(ThemeCategory::Request),
                ..Default::default()
            },
        );
        assert_eq!(unknown_category.verdict, Verdict::ApproveWithConditions);
    }

    #[test]
    fn test_split_with_one_collision_is_partial() {
        let e = eval(
            OperationType::SplitSubTheme,
            OperationContext {
                current_name: Some("Sync Problems".to_string()),
                sibling_names: names(&["Outlook Sync", "Login"]),
                proposed_names: names(&["Google Sync", "outlook sync", "iCloud Sync"]),
                ..Default::default()
            },
        );
        assert_eq!(e.verdict, Verdict::Partial);
        assert_eq!(e.partial_items.len(), 3);
        let excluded: Vec<_> = e.partial_items.iter().filter(|i| !i.included).collect();
        assert_eq!(excluded.len(), 1);
        assert_eq!(excluded[0].name, "outlook sync");
    }

    #[test]
    fn test_split_fan_out() {
        let ctx = |proposed: Vec<String>| OperationContext {
            current_name: Some("Sync Problems".to_string()),
            proposed_names: proposed,
            ..Default::default()
        };

        let many = eval(
            OperationType::SplitSubTheme,
            ctx(names(&["A1", "A2", "A3", "A4", "A5", "A6"])),
        );
        assert_eq!(many.verdict, Verdict::ApproveWithConditions);
        assert_eq!(many.confidence, Confidence::Low);

        let few = eval(OperationType::SplitSubTheme, ctx(names(&["A1", "A2"])));
        assert_eq!(few.verdict, Verdict::ApproveWithConditions);
        assert_eq!(few.confidence, Confidence::Med);
    }

    #[test]
    fn test_create_duplicate_and_generic() {
        let dup = eval(
            OperationType::CreateTheme,
            OperationContext {
                new_name: Some("Billing".to_string()),
                sibling_names: names(&["billing"]),
                ..Default::default()
            },
        );
        assert_eq!(dup.verdict, Verdict::Reject);

        // Generic check only applies to sub-themes
        let theme = eval(
            OperationType::CreateTheme,
            OperationContext {
                new_name: Some("Other".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(theme.verdict, Verdict::Approve);

        let sub = eval(
            OperationType::CreateSubTheme,
            OperationContext {
                new_name: Some("Other".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(sub.verdict, Verdict::ApproveWithConditions);
    }

    #[test]
    fn test_change_category() {
        let lonely = eval(
            OperationType::ChangeThemeCategory,
            OperationContext {
                current_name: Some("Dark Mode".to_string()),
                current_category: Some(ThemeCategory::Issue),
                new_category: Some(ThemeCategory::Request),
                sibling_themes: vec![ThemeSummary {
                    name: "Crashes".to_string(),
                    category: Some(ThemeCategory::Issue),
                }],
                ..Default::default()
            },
        );
        assert_eq!(lonely.workaround_type, Some(WorkaroundKind::CreateTheme));

        let with_peer = |volume| OperationContext {
            current_name: Some("Dark Mode".to_string()),
            new_category: Some(ThemeCategory::Request),
            sibling_themes: vec![ThemeSummary {
                name: "Feature Ideas".to_string(),
                category: Some(ThemeCategory::Request),
            }],
            volume: Some(volume),
            ..Default::default()
        };
        assert_eq!(
            eval(OperationType::ChangeThemeCategory, with_peer(50)).verdict,
            Verdict::Approve
        );
        assert_eq!(
            eval(OperationType::ChangeThemeCategory, with_peer(500)).verdict,
            Verdict::ApproveWithConditions
        );
    }

    #[test]
    fn test_promote_always_workaround() {
        let e = eval(
            OperationType::PromoteSubTheme,
            OperationContext {
                current_name: Some("Dark Mode".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(e.verdict, Verdict::Workaround);
        assert_eq!(e.workaround_type, Some(WorkaroundKind::CreateTheme));
    }

    #[test]
    fn test_unknown_fails_closed() {
        let e = eval(
            OperationType::Unknown("teleport".to_string()),
            OperationContext::default(),
        );
        assert_eq!(e.verdict, Verdict::Workaround);
        assert_eq!(e.confidence, Confidence::Low);
        assert!(!e.offers_workaround());
    }

    #[test]
    fn test_multi_parent_rejected_before_branches() {
        let e = eval(
            OperationType::RenameSubTheme,
            OperationContext {
                current_name: Some("Slow Sync".to_string()),
                new_name: Some("Sync Latency".to_string()),
                reported_parents: names(&["Calendar", "Performance", "calendar"]),
                ..Default::default()
            },
        );
        assert_eq!(e.verdict, Verdict::Reject);
        assert_eq!(e.confidence, Confidence::High);

        // Theme operations ignore reported parents
        let theme = eval(
            OperationType::RenameTheme,
            OperationContext {
                current_name: Some("Calendar".to_string()),
                new_name: Some("Scheduling".to_string()),
                reported_parents: names(&["A", "B"]),
                ..Default::default()
            },
        );
        assert_eq!(theme.verdict, Verdict::Approve);
    }

    #[test]
    fn test_evaluation_is_total_on_empty_context() {
        for op in OperationType::ALL {
            let e = eval(op.clone(), OperationContext::default());
            assert!(!e.risks.is_empty(), "{} produced no risks", op);
        }
    }

    #[tokio::test]
    async fn test_decision_service_wraps_local() {
        let service: &dyn DecisionService = &PolicyEvaluator::new();
        let e = service
            .evaluate(&OperationType::PromoteSubTheme, &OperationContext::default())
            .await
            .unwrap();
        assert_eq!(e.verdict, Verdict::Workaround);
        assert_eq!(service.name(), "local");
    }
}
