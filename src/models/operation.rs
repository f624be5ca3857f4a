//! Operation kinds and the context bag they are evaluated against

use super::taxonomy::{NodeLevel, ThemeCategory};
use serde::{Deserialize, Serialize};

/// Structural edit an operator can propose
///
/// Wire names are kebab-case (`rename-subtheme`). Anything unrecognised is kept
/// as [`OperationType::Unknown`] so evaluation can fail closed instead of the
/// request being rejected outright.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationType {
    RenameSubTheme,
    RenameTheme,
    DeleteSubTheme,
    DeleteKeyword,
    MergeSubTheme,
    MergeTheme,
    SplitSubTheme,
    CreateSubTheme,
    CreateTheme,
    ChangeThemeCategory,
    PromoteSubTheme,
    Unknown(String),
}

impl OperationType {
    /// The eleven supported operations
    pub const ALL: [OperationType; 11] = [
        OperationType::RenameSubTheme,
        OperationType::RenameTheme,
        OperationType::DeleteSubTheme,
        OperationType::DeleteKeyword,
        OperationType::MergeSubTheme,
        OperationType::MergeTheme,
        OperationType::SplitSubTheme,
        OperationType::CreateSubTheme,
        OperationType::CreateTheme,
        OperationType::ChangeThemeCategory,
        OperationType::PromoteSubTheme,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            OperationType::RenameSubTheme => "rename-subtheme",
            OperationType::RenameTheme => "rename-theme",
            OperationType::DeleteSubTheme => "delete-subtheme",
            OperationType::DeleteKeyword => "delete-keyword",
            OperationType::MergeSubTheme => "merge-subtheme",
            OperationType::MergeTheme => "merge-theme",
            OperationType::SplitSubTheme => "split-subtheme",
            OperationType::CreateSubTheme => "create-subtheme",
            OperationType::CreateTheme => "create-theme",
            OperationType::ChangeThemeCategory => "change-theme-category",
            OperationType::PromoteSubTheme => "promote-subtheme",
            OperationType::Unknown(raw) => raw,
        }
    }

    /// Parse a wire name; `_` and `-` are interchangeable, case is ignored
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .iter()
            .find(|op| op.as_str() == normalized)
            .cloned()
            .unwrap_or_else(|| OperationType::Unknown(raw.to_string()))
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, OperationType::Unknown(_))
    }

    /// Level of the node the operation targets. Keyword deletes read the level
    /// from context, so they return `None` here.
    pub fn target_level(&self) -> Option<NodeLevel> {
        match self {
            OperationType::RenameSubTheme
            | OperationType::DeleteSubTheme
            | OperationType::MergeSubTheme
            | OperationType::SplitSubTheme
            | OperationType::CreateSubTheme
            | OperationType::PromoteSubTheme => Some(NodeLevel::SubTheme),
            OperationType::RenameTheme
            | OperationType::MergeTheme
            | OperationType::CreateTheme
            | OperationType::ChangeThemeCategory => Some(NodeLevel::Theme),
            OperationType::DeleteKeyword | OperationType::Unknown(_) => None,
        }
    }

    /// Whether the edit must wait in a high-risk review before it becomes a draft.
    /// Renames and creates become drafts immediately and are annotated later.
    pub fn requires_review(&self) -> bool {
        !matches!(
            self,
            OperationType::RenameSubTheme
                | OperationType::RenameTheme
                | OperationType::CreateSubTheme
                | OperationType::CreateTheme
        )
    }
}

impl From<String> for OperationType {
    fn from(raw: String) -> Self {
        OperationType::parse(&raw)
    }
}

impl From<OperationType> for String {
    fn from(op: OperationType) -> Self {
        op.as_str().to_string()
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A sub-theme living under a different theme than the one being edited
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossThemeSibling {
    pub name: String,
    pub theme: String,
}

/// A sibling theme and its category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeSummary {
    pub name: String,
    #[serde(default)]
    pub category: Option<ThemeCategory>,
}

/// Loosely-typed bag of facts about the edit
///
/// Each operation reads only the fields it needs. Absent fields fall back to
/// empty names, empty lists and zero volume, so evaluation is total.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OperationContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_parent_theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_parent_theme: Option<String>,
    /// Every parent a sub-theme reports; more than one violates the tree invariant
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reported_parents: Vec<String>,

    /// Same-parent siblings at the edited node's level
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sibling_names: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cross_theme_siblings: Vec<CrossThemeSibling>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sibling_themes: Vec<ThemeSummary>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_category: Option<ThemeCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_category: Option<ThemeCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_category: Option<ThemeCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_category: Option<ThemeCategory>,

    /// Records classified under the edited node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u64>,
    /// Sub-themes reachable from the edited node (keyword deletes)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_theme_names: Vec<String>,

    #[serde(rename = "l1Keyword", skip_serializing_if = "Option::is_none")]
    pub l1_keyword: Option<String>,
    #[serde(rename = "l2Keyword", skip_serializing_if = "Option::is_none")]
    pub l2_keyword: Option<String>,
    #[serde(rename = "l3Keyword", skip_serializing_if = "Option::is_none")]
    pub l3_keyword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_level: Option<NodeLevel>,

    /// Names proposed for a split
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub proposed_names: Vec<String>,
}

impl OperationContext {
    pub fn current_name(&self) -> &str {
        self.current_name.as_deref().unwrap_or_default()
    }

    pub fn new_name(&self) -> &str {
        self.new_name.as_deref().unwrap_or_default()
    }

    /// Source of a merge, falling back to the current name
    pub fn source_name(&self) -> &str {
        self.source_name
            .as_deref()
            .or(self.current_name.as_deref())
            .unwrap_or_default()
    }

    /// Destination of a merge, falling back to the new name
    pub fn destination_name(&self) -> &str {
        self.destination_name
            .as_deref()
            .or(self.new_name.as_deref())
            .unwrap_or_default()
    }

    pub fn volume(&self) -> u64 {
        self.volume.unwrap_or(0)
    }

    /// Fields the operation's decision procedure reads that are absent
    pub fn missing_fields(&self, op: &OperationType) -> Vec<&'static str> {
        let mut missing = Vec::new();
        let mut need = |present: bool, name: &'static str| {
            if !present {
                missing.push(name);
            }
        };

        match op {
            OperationType::RenameSubTheme | OperationType::RenameTheme => {
                need(self.current_name.is_some(), "currentName");
                need(self.new_name.is_some(), "newName");
                need(!self.sibling_names.is_empty(), "siblingNames");
            }
            OperationType::DeleteSubTheme => {
                need(self.current_name.is_some(), "currentName");
                need(self.volume.is_some(), "volume");
            }
            OperationType::DeleteKeyword => {
                need(self.current_name.is_some(), "currentName");
                need(self.l1_keyword.is_some(), "l1Keyword");
                need(self.l2_keyword.is_some(), "l2Keyword");
            }
            OperationType::MergeSubTheme => {
                need(self.source_name.is_some(), "sourceName");
                need(self.destination_name.is_some(), "destinationName");
                need(self.source_parent_theme.is_some(), "sourceParentTheme");
                need(
                    self.destination_parent_theme.is_some(),
                    "destinationParentTheme",
                );
            }
            OperationType::MergeTheme => {
                need(self.source_name.is_some(), "sourceName");
                need(self.destination_name.is_some(), "destinationName");
                need(self.source_category.is_some(), "sourceCategory");
                need(self.destination_category.is_some(), "destinationCategory");
            }
            OperationType::SplitSubTheme => {
                need(self.current_name.is_some(), "currentName");
                need(!self.proposed_names.is_empty(), "proposedNames");
            }
            OperationType::CreateSubTheme | OperationType::CreateTheme => {
                need(self.new_name.is_some(), "newName");
            }
            OperationType::ChangeThemeCategory => {
                need(self.current_name.is_some(), "currentName");
                need(self.new_category.is_some(), "newCategory");
                need(self.volume.is_some(), "volume");
            }
            OperationType::PromoteSubTheme => {
                need(self.current_name.is_some(), "currentName");
            }
            OperationType::Unknown(_) => {}
        }

        missing
    }

    /// Overlay another (partial) context on top of this one; set fields win
    pub fn overlay(&self, partial: &OperationContext) -> OperationContext {
        fn pick<T: Clone>(over: &Option<T>, base: &Option<T>) -> Option<T> {
            over.clone().or_else(|| base.clone())
        }
        fn pick_vec<T: Clone>(over: &[T], base: &[T]) -> Vec<T> {
            if over.is_empty() {
                base.to_vec()
            } else {
                over.to_vec()
            }
        }

        OperationContext {
            current_name: pick(&partial.current_name, &self.current_name),
            new_name: pick(&partial.new_name, &self.new_name),
            source_name: pick(&partial.source_name, &self.source_name),
            destination_name: pick(&partial.destination_name, &self.destination_name),
            parent_theme: pick(&partial.parent_theme, &self.parent_theme),
            source_parent_theme: pick(&partial.source_parent_theme, &self.source_parent_theme),
            destination_parent_theme: pick(
                &partial.destination_parent_theme,
                &self.destination_parent_theme,
            ),
            reported_parents: pick_vec(&partial.reported_parents, &self.reported_parents),
            sibling_names: pick_vec(&partial.sibling_names, &self.sibling_names),
            cross_theme_siblings: pick_vec(
                &partial.cross_theme_siblings,
                &self.cross_theme_siblings,
            ),
            sibling_themes: pick_vec(&partial.sibling_themes, &self.sibling_themes),
            current_category: pick(&partial.current_category, &self.current_category),
            new_category: pick(&partial.new_category, &self.new_category),
            source_category: pick(&partial.source_category, &self.source_category),
            destination_category: pick(
                &partial.destination_category,
                &self.destination_category,
            ),
            volume: pick(&partial.volume, &self.volume),
            sub_theme_names: pick_vec(&partial.sub_theme_names, &self.sub_theme_names),
            l1_keyword: pick(&partial.l1_keyword, &self.l1_keyword),
            l2_keyword: pick(&partial.l2_keyword, &self.l2_keyword),
            l3_keyword: pick(&partial.l3_keyword, &self.l3_keyword),
            keyword_level: pick(&partial.keyword_level, &self.keyword_level),
            proposed_names: pick_vec(&partial.proposed_names, &self.proposed_names),
        }
    }
}
