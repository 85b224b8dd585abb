//! Data structures for the dependency graph.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

crate::string_id! {
    /// Identifier of a course.
    CourseId
}

crate::string_id! {
    /// Identifier of a node (a gated unit of learning content).
    NodeId
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// Kind of content a node carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentKind {
    Video,
    Package,
    Assessment,
}

impl ContentKind {
    /// Return a stable string representation.
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Package => "package",
            Self::Assessment => "assessment",
        }
    }
}

impl std::str::FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "video" => Ok(Self::Video),
            "package" | "scorm" => Ok(Self::Package),
            "assessment" | "quiz" | "exam" => Ok(Self::Assessment),
            other => Err(format!("unknown content kind '{other}'")),
        }
    }
}

/// A unit of learning content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub course: CourseId,
    pub kind: ContentKind,
    pub title: String,
    /// Category used by score criteria filters.
    #[serde(default)]
    pub category: Option<String>,
    pub display_order: u32,
    /// Percentage (Video/Package) or minimum score (Assessment).
    /// `None` falls back to the configured default for the kind.
    #[serde(default)]
    pub completion_threshold: Option<f64>,
    #[serde(default)]
    pub final_exam: bool,
}

impl Node {
    /// Create a node with no explicit threshold and no category.
    pub fn new(
        id: impl Into<String>,
        course: impl Into<String>,
        kind: ContentKind,
        title: impl Into<String>,
        display_order: u32,
    ) -> Self {
        Self {
            id: NodeId::new(id),
            course: CourseId::new(course),
            kind,
            title: title.into(),
            category: None,
            display_order,
            completion_threshold: None,
            final_exam: false,
        }
    }

    /// Set an explicit completion threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.completion_threshold = Some(threshold);
        self
    }

    /// Set the category used by score criteria.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Mark this node as the course's final exam.
    pub fn final_exam(mut self) -> Self {
        self.final_exam = true;
        self
    }
}

// ---------------------------------------------------------------------------
// Dependency edge
// ---------------------------------------------------------------------------

/// How predecessors in a group combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Combinator {
    /// Every predecessor in the group must be complete.
    All,
    /// At least one predecessor in the group suffices.
    Any,
}

impl Combinator {
    /// Return a stable string representation.
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Any => "any",
        }
    }
}

impl std::str::FromStr for Combinator {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "any" => Ok(Self::Any),
            other => Err(format!("unknown combinator '{other}'")),
        }
    }
}

/// Directed precondition `from -> to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub combinator: Combinator,
}

impl DependencyEdge {
    /// Create an edge.
    pub fn new(from: impl Into<String>, to: impl Into<String>, combinator: Combinator) -> Self {
        Self {
            from: NodeId::new(from),
            to: NodeId::new(to),
            combinator,
        }
    }
}
