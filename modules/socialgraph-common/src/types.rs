use std::fmt;

use serde::{Deserialize, Serialize};

/// Name given to groups whose details came back without one.
pub const UNNAMED_GROUP: &str = "Unnamed Group";

// --- Entities ---

/// A crawled account. `id` is the only required field; everything else is
/// best-effort data from the identity source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub display_name: String,
    pub follower_count: Option<u64>,
    pub subscription_count: Option<u64>,
}

impl Entity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// An entity without an id can't be persisted or used as a traversal key.
    pub fn is_valid(&self) -> bool {
        !self.id.trim().is_empty()
    }
}

/// Join first/last name parts the way they are shown on a profile.
/// Missing parts are skipped; both missing yields an empty string.
pub fn display_name(first: Option<&str>, last: Option<&str>) -> String {
    let parts: Vec<&str> = [first, last]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    parts.join(" ")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: Option<String>,
}

impl Group {
    pub fn new(id: impl Into<String>, name: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.map(str::to_string),
        }
    }

    /// Name to persist: the fetched one, or the placeholder when absent or blank.
    pub fn name_or_default(&self) -> &str {
        match self.name.as_deref() {
            Some(n) if !n.trim().is_empty() => n,
            _ => UNNAMED_GROUP,
        }
    }
}

// --- Graph addressing ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeLabel {
    User,
    Group,
}

impl NodeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::User => "User",
            NodeLabel::Group => "Group",
        }
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key of a persisted node. Edges address their endpoints through handles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeHandle {
    pub label: NodeLabel,
    pub id: String,
}

impl NodeHandle {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            label: NodeLabel::User,
            id: id.into(),
        }
    }

    pub fn group(id: impl Into<String>) -> Self {
        Self {
            label: NodeLabel::Group,
            id: id.into(),
        }
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.label, self.id)
    }
}

/// Directed relationship types. Confirmed friends and pending requests both
/// become `Follow`; the distinction is not kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipKind {
    Follow,
    Subscribe,
}

impl RelationshipKind {
    /// Relationship type as stored in the graph.
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::Follow => "Follow",
            RelationshipKind::Subscribe => "Subscribe",
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
