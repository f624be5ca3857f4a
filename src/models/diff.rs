use super::taxonomy::NodeLevel;
use serde::{Deserialize, Serialize};

/// Attribute of a node touched by a modification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChangeField {
    Name,
    Merge,
    Category,
    /// Parent link (moves)
    Parent,
    /// Whole node (creates and deletes)
    Node,
}

impl std::fmt::Display for ChangeField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeField::Name => write!(f, "name"),
            ChangeField::Merge => write!(f, "merge"),
            ChangeField::Category => write!(f, "category"),
            ChangeField::Parent => write!(f, "parent"),
            ChangeField::Node => write!(f, "node"),
        }
    }
}

/// One atomic tree mutation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DiffItem {
    Added {
        level: NodeLevel,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent: Option<String>,
    },
    Modified {
        level: NodeLevel,
        field: ChangeField,
        old: String,
        new: String,
    },
    Deleted {
        level: NodeLevel,
        name: String,
    },
    Moved {
        level: NodeLevel,
        name: String,
        from: String,
        to: String,
    },
}

impl DiffItem {
    pub fn level(&self) -> NodeLevel {
        match self {
            DiffItem::Added { level, .. }
            | DiffItem::Modified { level, .. }
            | DiffItem::Deleted { level, .. }
            | DiffItem::Moved { level, .. } => *level,
        }
    }

    /// Field, old value and new value as a draft change records them
    pub fn as_change(&self) -> (ChangeField, Option<String>, Option<String>) {
        match self {
            DiffItem::Added { name, .. } => (ChangeField::Node, None, Some(name.clone())),
            DiffItem::Modified {
                field, old, new, ..
            } => (*field, Some(old.clone()), Some(new.clone())),
            DiffItem::Deleted { name, .. } => (ChangeField::Node, Some(name.clone()), None),
            DiffItem::Moved { from, to, .. } => {
                (ChangeField::Parent, Some(from.clone()), Some(to.clone()))
            }
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            DiffItem::Added { .. } => "+",
            DiffItem::Modified { .. } => "~",
            DiffItem::Deleted { .. } => "-",
            DiffItem::Moved { .. } => ">",
        }
    }
}

impl std::fmt::Display for DiffItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiffItem::Added { level, name, parent } => match parent {
                Some(p) => write!(f, "+ {} \"{}\" under \"{}\"", level, name, p),
                None => write!(f, "+ {} \"{}\"", level, name),
            },
            DiffItem::Modified {
                level,
                field,
                old,
                new,
            } => write!(f, "~ {} {}: \"{}\" → \"{}\"", level, field, old, new),
            DiffItem::Deleted { level, name } => write!(f, "- {} \"{}\"", level, name),
            DiffItem::Moved {
                level,
                name,
                from,
                to,
            } => write!(f, "> {} \"{}\": \"{}\" → \"{}\"", level, name, from, to),
        }
    }
}

/// Kind of a word-diff segment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Common,
    Removed,
    Added,
}

/// Run of words sharing one diff kind
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiffSegment {
    pub kind: SegmentKind,
    pub text: String,
}

impl DiffSegment {
    pub fn new(kind: SegmentKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn common(text: impl Into<String>) -> Self {
        Self::new(SegmentKind::Common, text)
    }

    pub fn removed(text: impl Into<String>) -> Self {
        Self::new(SegmentKind::Removed, text)
    }

    pub fn added(text: impl Into<String>) -> Self {
        Self::new(SegmentKind::Added, text)
    }
}
