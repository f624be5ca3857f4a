//! Operation → ordered list of atomic tree mutations
//!
//! Encodes shape only. Volumes and risk never influence the output.

use crate::models::{ChangeField, DiffItem, NodeLevel, OperationContext, OperationType};

/// Build the diff items for an operation
pub fn build(op: &OperationType, ctx: &OperationContext) -> Vec<DiffItem> {
    match op {
        OperationType::RenameSubTheme => vec![rename(NodeLevel::SubTheme, ctx)],
        OperationType::RenameTheme => vec![rename(NodeLevel::Theme, ctx)],
        OperationType::DeleteSubTheme => vec![DiffItem::Deleted {
            level: NodeLevel::SubTheme,
            name: ctx.current_name().to_string(),
        }],
        OperationType::DeleteKeyword => vec![DiffItem::Deleted {
            level: ctx.keyword_level.unwrap_or(NodeLevel::L3),
            name: ctx.current_name().to_string(),
        }],
        OperationType::CreateSubTheme => vec![DiffItem::Added {
            level: NodeLevel::SubTheme,
            name: ctx.new_name().to_string(),
            parent: ctx.parent_theme.clone(),
        }],
        OperationType::CreateTheme => vec![DiffItem::Added {
            level: NodeLevel::Theme,
            name: ctx.new_name().to_string(),
            parent: ctx.l3_keyword.clone(),
        }],
        OperationType::MergeSubTheme => vec![merge(NodeLevel::SubTheme, ctx)],
        OperationType::MergeTheme => vec![merge(NodeLevel::Theme, ctx)],
        OperationType::SplitSubTheme => {
            let mut items = vec![DiffItem::Deleted {
                level: NodeLevel::SubTheme,
                name: ctx.current_name().to_string(),
            }];
            items.extend(ctx.proposed_names.iter().map(|name| DiffItem::Added {
                level: NodeLevel::SubTheme,
                name: name.clone(),
                parent: ctx.parent_theme.clone(),
            }));
            items
        }
        OperationType::ChangeThemeCategory => vec![DiffItem::Modified {
            level: NodeLevel::Theme,
            field: ChangeField::Category,
            old: ctx
                .current_category
                .map(|c| c.to_string())
                .unwrap_or_default(),
            new: ctx.new_category.map(|c| c.to_string()).unwrap_or_default(),
        }],
        OperationType::PromoteSubTheme => vec![DiffItem::Added {
            level: NodeLevel::Theme,
            name: ctx.current_name().to_string(),
            parent: ctx.l3_keyword.clone(),
        }],
        OperationType::Unknown(_) => Vec::new(),
    }
}

fn rename(level: NodeLevel, ctx: &OperationContext) -> DiffItem {
    DiffItem::Modified {
        level,
        field: ChangeField::Name,
        old: ctx.current_name().to_string(),
        new: ctx.new_name().to_string(),
    }
}

fn merge(level: NodeLevel, ctx: &OperationContext) -> DiffItem {
    DiffItem::Modified {
        level,
        field: ChangeField::Merge,
        old: ctx.source_name().to_string(),
        new: ctx.destination_name().to_string(),
    }
}

/// One-line human description of the operation
pub fn describe(op: &OperationType, ctx: &OperationContext) -> String {
    match op {
        OperationType::RenameSubTheme => format!(
            "Rename sub-theme \"{}\" to \"{}\"",
            ctx.current_name(),
            ctx.new_name()
        ),
        OperationType::RenameTheme => format!(
            "Rename theme \"{}\" to \"{}\"",
            ctx.current_name(),
            ctx.new_name()
        ),
        OperationType::DeleteSubTheme => format!("Delete sub-theme \"{}\"", ctx.current_name()),
        OperationType::DeleteKeyword => format!(
            "Delete {} \"{}\"",
            ctx.keyword_level.unwrap_or(NodeLevel::L3),
            ctx.current_name()
        ),
        OperationType::CreateSubTheme => match &ctx.parent_theme {
            Some(parent) => format!(
                "Create sub-theme \"{}\" under \"{}\"",
                ctx.new_name(),
                parent
            ),
            None => format!("Create sub-theme \"{}\"", ctx.new_name()),
        },
        OperationType::CreateTheme => format!("Create theme \"{}\"", ctx.new_name()),
        OperationType::MergeSubTheme => format!(
            "Merge sub-theme \"{}\" into \"{}\"",
            ctx.source_name(),
            ctx.destination_name()
        ),
        OperationType::MergeTheme => format!(
            "Merge theme \"{}\" into \"{}\"",
            ctx.source_name(),
            ctx.destination_name()
        ),
        OperationType::SplitSubTheme => {
            let names: Vec<String> = ctx
                .proposed_names
                .iter()
                .map(|n| format!("\"{}\"", n))
                .collect();
            format!(
                "Split sub-theme \"{}\" into {}",
                ctx.current_name(),
                names.join(", ")
            )
        }
        OperationType::ChangeThemeCategory => format!(
            "Change category of theme \"{}\" from {} to {}",
            ctx.current_name(),
            ctx.current_category
                .map(|c| c.to_string())
                .unwrap_or_else(|| "unset".to_string()),
            ctx.new_category
                .map(|c| c.to_string())
                .unwrap_or_else(|| "unset".to_string())
        ),
        OperationType::PromoteSubTheme => {
            format!("Promote sub-theme \"{}\" to a theme", ctx.current_name())
        }
        OperationType::Unknown(raw) => {
            format!("Unsupported operation \"{}\" on \"{}\"", raw, ctx.current_name())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ThemeCategory;

    fn ctx() -> OperationContext {
        OperationContext {
            current_name: Some("Sync Errors".to_string()),
            new_name: Some("Calendar Sync Errors".to_string()),
            parent_theme: Some("Calendar".to_string()),
            volume: Some(9_999),
            ..Default::default()
        }
    }

    #[test]
    fn test_every_known_operation_has_items() {
        for op in OperationType::ALL {
            assert!(!build(&op, &ctx()).is_empty(), "{} produced no items", op);
        }
        assert!(build(&OperationType::Unknown("x".to_string()), &ctx()).is_empty());
    }

    #[test]
    fn test_rename_is_single_modified() {
        let items = build(&OperationType::RenameSubTheme, &ctx());
        assert_eq!(
            items,
            vec![DiffItem::Modified {
                level: NodeLevel::SubTheme,
                field: ChangeField::Name,
                old: "Sync Errors".to_string(),
                new: "Calendar Sync Errors".to_string(),
            }]
        );
    }

    #[test]
    fn test_split_deletes_then_adds_each_name() {
        let mut c = ctx();
        c.proposed_names = vec!["Google Sync".to_string(), "Outlook Sync".to_string()];

        let items = build(&OperationType::SplitSubTheme, &c);
        assert_eq!(items.len(), 3);
        assert!(matches!(items[0], DiffItem::Deleted { .. }));
        assert!(matches!(&items[2], DiffItem::Added { name, .. } if name == "Outlook Sync"));
    }

    #[test]
    fn test_merge_uses_source_and_destination() {
        let c = OperationContext {
            source_name: Some("Slow Load".to_string()),
            destination_name: Some("Performance".to_string()),
            ..Default::default()
        };
        let items = build(&OperationType::MergeTheme, &c);
        assert!(matches!(
            &items[0],
            DiffItem::Modified { field: ChangeField::Merge, old, new, .. }
                if old == "Slow Load" && new == "Performance"
        ));
    }

    #[test]
    fn test_category_change_and_promote_levels() {
        let mut c = ctx();
        c.current_category = Some(ThemeCategory::Issue);
        c.new_category = Some(ThemeCategory::Request);

        let items = build(&OperationType::ChangeThemeCategory, &c);
        assert!(matches!(
            &items[0],
            DiffItem::Modified { field: ChangeField::Category, old, new, .. }
                if old == "Issue" && new == "Request"
        ));

        let promoted = build(&OperationType::PromoteSubTheme, &c);
        assert_eq!(promoted[0].level(), NodeLevel::Theme);
    }

    #[test]
    fn test_shape_ignores_volume() {
        let mut small = ctx();
        small.volume = Some(1);
        assert_eq!(
            build(&OperationType::DeleteSubTheme, &small),
            build(&OperationType::DeleteSubTheme, &ctx())
        );
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            describe(&OperationType::RenameSubTheme, &ctx()),
            "Rename sub-theme \"Sync Errors\" to \"Calendar Sync Errors\""
        );
        assert_eq!(
            describe(&OperationType::CreateSubTheme, &ctx()),
            "Create sub-theme \"Calendar Sync Errors\" under \"Calendar\""
        );
    }
}
