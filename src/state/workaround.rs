//! Fixed per-kind templates turning an accepted workaround into diff steps

use crate::models::{
    ChangeField, DiffItem, NodeLevel, OperationContext, OperationType, WorkaroundKind,
};

/// Ordered steps for a workaround
///
/// `plan` is the evaluation's workaround context, overlaid on the original
/// proposal's context. A non-blank `destination` replaces the template's
/// destination (merge target, move target, or new theme name).
pub fn synthesize(
    kind: WorkaroundKind,
    op: &OperationType,
    original: &OperationContext,
    plan: Option<&OperationContext>,
    destination: Option<&str>,
) -> Vec<DiffItem> {
    let ctx = match plan {
        Some(p) => original.overlay(p),
        None => original.clone(),
    };
    let chosen = |fallback: &str| -> String {
        destination
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(fallback)
            .to_string()
    };
    let text = |value: &Option<String>| value.clone().unwrap_or_default();

    match kind {
        WorkaroundKind::TransferThenMerge => {
            let source = ctx.source_name().to_string();
            let target_theme = text(&ctx.destination_parent_theme);
            vec![
                DiffItem::Moved {
                    level: NodeLevel::SubTheme,
                    name: source.clone(),
                    from: ctx
                        .source_parent_theme
                        .clone()
                        .or_else(|| ctx.parent_theme.clone())
                        .unwrap_or_default(),
                    to: target_theme,
                },
                DiffItem::Modified {
                    level: NodeLevel::SubTheme,
                    field: ChangeField::Merge,
                    old: source,
                    new: chosen(ctx.destination_name()),
                },
            ]
        }
        WorkaroundKind::MergeSiblings => vec![DiffItem::Modified {
            level: op.target_level().unwrap_or(NodeLevel::SubTheme),
            field: ChangeField::Merge,
            old: ctx.source_name().to_string(),
            new: chosen(ctx.destination_name()),
        }],
        WorkaroundKind::MergeKeyword => vec![DiffItem::Modified {
            level: ctx.keyword_level.unwrap_or(NodeLevel::L3),
            field: ChangeField::Merge,
            old: ctx.source_name().to_string(),
            new: chosen(ctx.destination_name.as_deref().unwrap_or_default()),
        }],
        WorkaroundKind::MoveToParent => vec![DiffItem::Moved {
            level: NodeLevel::SubTheme,
            name: ctx.source_name().to_string(),
            from: text(&ctx.source_parent_theme),
            to: chosen(ctx.destination_parent_theme.as_deref().unwrap_or_default()),
        }],
        WorkaroundKind::MergeParents => vec![DiffItem::Modified {
            level: NodeLevel::Theme,
            field: ChangeField::Merge,
            old: ctx.source_name().to_string(),
            new: chosen(ctx.destination_name()),
        }],
        WorkaroundKind::ChangeCategory => vec![
            DiffItem::Modified {
                level: NodeLevel::Theme,
                field: ChangeField::Category,
                old: ctx
                    .current_category
                    .or(ctx.source_category)
                    .map(|c| c.to_string())
                    .unwrap_or_default(),
                new: ctx
                    .new_category
                    .or(ctx.destination_category)
                    .map(|c| c.to_string())
                    .unwrap_or_default(),
            },
            DiffItem::Modified {
                level: NodeLevel::Theme,
                field: ChangeField::Merge,
                old: ctx.source_name().to_string(),
                new: chosen(ctx.destination_name()),
            },
        ],
        WorkaroundKind::CreateTheme => {
            let theme = chosen(ctx.new_name());
            vec![
                DiffItem::Added {
                    level: NodeLevel::Theme,
                    name: theme.clone(),
                    parent: ctx.l3_keyword.clone(),
                },
                DiffItem::Moved {
                    level: op.target_level().unwrap_or(NodeLevel::SubTheme),
                    name: ctx.current_name().to_string(),
                    from: text(&ctx.parent_theme),
                    to: theme,
                },
            ]
        }
    }
}
