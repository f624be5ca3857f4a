//! Taxonomy snapshot: Keyword (L1) → Keyword (L2) → Keyword (L3) → Theme → SubTheme
//!
//! The governance core never mutates the tree. It reads a snapshot to derive
//! the [`OperationContext`] an evaluation needs (names, siblings, parents,
//! volumes) and to check the single-parent invariant for sub-themes.

use super::operation::{CrossThemeSibling, OperationContext, ThemeSummary};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Level of a node in the taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeLevel {
    #[serde(rename = "L1")]
    L1,
    #[serde(rename = "L2")]
    L2,
    #[serde(rename = "L3")]
    L3,
    #[serde(rename = "theme")]
    Theme,
    #[serde(rename = "subtheme")]
    SubTheme,
}

impl NodeLevel {
    /// Human-readable label used in descriptions
    pub fn label(&self) -> &'static str {
        match self {
            NodeLevel::L1 => "L1 keyword",
            NodeLevel::L2 => "L2 keyword",
            NodeLevel::L3 => "L3 keyword",
            NodeLevel::Theme => "theme",
            NodeLevel::SubTheme => "sub-theme",
        }
    }
}

impl std::fmt::Display for NodeLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Category of a theme. Every theme has exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeCategory {
    /// Something is broken or painful
    Issue,
    /// Ask for a new capability or an improvement
    Request,
    /// Positive feedback
    Praise,
    /// How-do-I and clarification feedback
    Question,
}

impl ThemeCategory {
    pub fn name(&self) -> &'static str {
        match self {
            ThemeCategory::Issue => "Issue",
            ThemeCategory::Request => "Request",
            ThemeCategory::Praise => "Praise",
            ThemeCategory::Question => "Question",
        }
    }

    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "issue" => Some(ThemeCategory::Issue),
            "request" => Some(ThemeCategory::Request),
            "praise" => Some(ThemeCategory::Praise),
            "question" => Some(ThemeCategory::Question),
            _ => None,
        }
    }
}

impl std::fmt::Display for ThemeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Leaf of the taxonomy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubTheme {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub records: u64,
}

/// A theme under the deepest keyword level
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub id: String,
    pub name: String,
    pub category: ThemeCategory,
    #[serde(default)]
    pub records: u64,
    #[serde(default)]
    pub sub_themes: Vec<SubTheme>,
}

/// A keyword node at L1, L2 or L3
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaxonomyNode {
    pub id: String,
    pub name: String,
    pub level: NodeLevel,
    #[serde(default)]
    pub records: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TaxonomyNode>,
    /// Only populated at L3
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub themes: Vec<Theme>,
}

/// Errors raised while reading a taxonomy snapshot
#[derive(Debug, thiserror::Error)]
pub enum TaxonomyError {
    #[error("Failed to read taxonomy file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse taxonomy JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Sub-theme '{id}' has multiple parent themes: {}", parents.join(", "))]
    MultiParentSubTheme { id: String, parents: Vec<String> },
}

/// A theme together with the keyword path it was found under
#[derive(Debug, Clone)]
pub struct ThemeLocation<'a> {
    pub theme: &'a Theme,
    /// L1, L2, L3 keywords, outermost first
    pub path: Vec<&'a TaxonomyNode>,
}

impl ThemeLocation<'_> {
    fn keyword(&self, index: usize) -> Option<String> {
        self.path.get(index).map(|n| n.name.clone())
    }

    fn l3_id(&self) -> Option<&str> {
        self.path.last().map(|n| n.id.as_str())
    }
}

/// Read-only taxonomy snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Taxonomy {
    pub keywords: Vec<TaxonomyNode>,
}

impl Taxonomy {
    pub fn new(keywords: Vec<TaxonomyNode>) -> Self {
        Self { keywords }
    }

    /// Load a snapshot from a JSON file
    pub fn load(path: &Path) -> Result<Self, TaxonomyError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Every theme occurrence with its keyword path (multi-path themes appear once per path)
    pub fn theme_locations(&self) -> Vec<ThemeLocation<'_>> {
        let mut out = Vec::new();
        for root in &self.keywords {
            collect_themes(root, &mut Vec::new(), &mut out);
        }
        out
    }

    /// Sub-theme ids that appear under more than one distinct theme
    pub fn check_invariants(&self) -> Vec<TaxonomyError> {
        let mut parents: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for loc in self.theme_locations() {
            for sub in &loc.theme.sub_themes {
                parents
                    .entry(sub.id.as_str())
                    .or_default()
                    .insert(loc.theme.id.as_str());
            }
        }

        let theme_names: BTreeMap<&str, &str> = self
            .theme_locations()
            .iter()
            .map(|l| (l.theme.id.as_str(), l.theme.name.as_str()))
            .collect();

        parents
            .into_iter()
            .filter(|(_, themes)| themes.len() > 1)
            .map(|(id, themes)| TaxonomyError::MultiParentSubTheme {
                id: id.to_string(),
                parents: themes
                    .iter()
                    .map(|t| theme_names.get(t).copied().unwrap_or(*t).to_string())
                    .collect(),
            })
            .collect()
    }

    /// Derive the evaluation context for a sub-theme
    pub fn subtheme_context(&self, id: &str) -> Result<OperationContext, TaxonomyError> {
        let locations = self.theme_locations();
        let owners: Vec<&ThemeLocation<'_>> = locations
            .iter()
            .filter(|l| l.theme.sub_themes.iter().any(|s| s.id == id))
            .collect();

        let Some(primary) = owners.first() else {
            return Err(TaxonomyError::NodeNotFound(id.to_string()));
        };
        let Some(sub) = primary.theme.sub_themes.iter().find(|s| s.id == id) else {
            return Err(TaxonomyError::NodeNotFound(id.to_string()));
        };

        // One entry per distinct theme id; same-named themes get their id appended
        let mut parent_ids: Vec<&str> = Vec::new();
        let mut reported_parents: Vec<String> = Vec::new();
        for owner in &owners {
            let theme = owner.theme;
            if parent_ids.contains(&theme.id.as_str()) {
                continue;
            }
            parent_ids.push(theme.id.as_str());
            let taken = reported_parents
                .iter()
                .any(|p| p.trim().eq_ignore_ascii_case(theme.name.trim()));
            reported_parents.push(if taken {
                format!("{} ({})", theme.name, theme.id)
            } else {
                theme.name.clone()
            });
        }

        let cross_theme_siblings = locations
            .iter()
            .filter(|l| l.theme.id != primary.theme.id && l.l3_id() == primary.l3_id())
            .flat_map(|l| {
                l.theme.sub_themes.iter().map(|s| CrossThemeSibling {
                    name: s.name.clone(),
                    theme: l.theme.name.clone(),
                })
            })
            .collect();

        Ok(OperationContext {
            current_name: Some(sub.name.clone()),
            parent_theme: Some(primary.theme.name.clone()),
            reported_parents,
            sibling_names: primary
                .theme
                .sub_themes
                .iter()
                .filter(|s| s.id != id)
                .map(|s| s.name.clone())
                .collect(),
            cross_theme_siblings,
            current_category: Some(primary.theme.category),
            volume: Some(sub.records),
            l1_keyword: primary.keyword(0),
            l2_keyword: primary.keyword(1),
            l3_keyword: primary.keyword(2),
            ..OperationContext::default()
        })
    }

    /// Derive the evaluation context for a theme
    pub fn theme_context(&self, id: &str) -> Result<OperationContext, TaxonomyError> {
        let locations = self.theme_locations();
        let Some(primary) = locations.iter().find(|l| l.theme.id == id) else {
            return Err(TaxonomyError::NodeNotFound(id.to_string()));
        };

        let mut sibling_themes: Vec<ThemeSummary> = Vec::new();
        for loc in locations
            .iter()
            .filter(|l| l.theme.id != id && l.l3_id() == primary.l3_id())
        {
            if !sibling_themes.iter().any(|s| s.name == loc.theme.name) {
                sibling_themes.push(ThemeSummary {
                    name: loc.theme.name.clone(),
                    category: Some(loc.theme.category),
                });
            }
        }

        Ok(OperationContext {
            current_name: Some(primary.theme.name.clone()),
            sibling_names: sibling_themes.iter().map(|s| s.name.clone()).collect(),
            sibling_themes,
            current_category: Some(primary.theme.category),
            volume: Some(primary.theme.records),
            sub_theme_names: primary
                .theme
                .sub_themes
                .iter()
                .map(|s| s.name.clone())
                .collect(),
            l1_keyword: primary.keyword(0),
            l2_keyword: primary.keyword(1),
            l3_keyword: primary.keyword(2),
            ..OperationContext::default()
        })
    }

    /// Derive the evaluation context for a keyword at any level
    pub fn keyword_context(&self, id: &str) -> Result<OperationContext, TaxonomyError> {
        let mut path = Vec::new();
        let mut found = None;
        for root in &self.keywords {
            if find_path(root, id, &mut path) {
                found = path.last().copied();
                break;
            }
        }
        let Some(node) = found else {
            return Err(TaxonomyError::NodeNotFound(id.to_string()));
        };

        let siblings: Vec<String> = match path.len() {
            0 | 1 => self
                .keywords
                .iter()
                .filter(|k| k.id != id)
                .map(|k| k.name.clone())
                .collect(),
            n => path[n - 2]
                .children
                .iter()
                .filter(|k| k.id != id)
                .map(|k| k.name.clone())
                .collect(),
        };

        let mut sub_theme_names = Vec::new();
        collect_subtheme_names(node, &mut sub_theme_names);

        // Ancestors only: the node itself is current_name
        let ancestor = |level: NodeLevel| {
            path.iter()
                .take(path.len().saturating_sub(1))
                .find(|n| n.level == level)
                .map(|n| n.name.clone())
        };

        Ok(OperationContext {
            current_name: Some(node.name.clone()),
            keyword_level: Some(node.level),
            sibling_names: siblings,
            volume: Some(node.records),
            sub_theme_names,
            l1_keyword: ancestor(NodeLevel::L1),
            l2_keyword: ancestor(NodeLevel::L2),
            ..OperationContext::default()
        })
    }
}

fn collect_themes<'a>(
    node: &'a TaxonomyNode,
    path: &mut Vec<&'a TaxonomyNode>,
    out: &mut Vec<ThemeLocation<'a>>,
) {
    path.push(node);
    for theme in &node.themes {
        out.push(ThemeLocation {
            theme,
            path: path.clone(),
        });
    }
    for child in &node.children {
        collect_themes(child, path, out);
    }
    path.pop();
}

fn find_path<'a>(node: &'a TaxonomyNode, id: &str, path: &mut Vec<&'a TaxonomyNode>) -> bool {
    path.push(node);
    if node.id == id || node.children.iter().any(|c| find_path(c, id, path)) {
        return true;
    }
    path.pop();
    false
}

fn collect_subtheme_names(node: &TaxonomyNode, out: &mut Vec<String>) {
    for theme in &node.themes {
        for sub in &theme.sub_themes {
            if !out.contains(&sub.name) {
                out.push(sub.name.clone());
            }
        }
    }
    for child in &node.children {
        collect_subtheme_names(child, out);
    }
}
