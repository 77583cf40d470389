use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

/// A status name, carried as an opaque string at every boundary the
/// workflow configuration can influence (§9: "status strings
/// everywhere"). Construction normalises `snake_case`/`camelCase` input
/// into the canonical lowercase-with-hyphens form (§6).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Status(String);

impl Status {
    pub fn new(raw: impl AsRef<str>) -> Self {
        let normalised = raw
            .as_ref()
            .trim()
            .chars()
            .map(|c| if c == '_' { '-' } else { c.to_ascii_lowercase() })
            .collect::<String>();
        // camelCase -> hyphenated: insert a hyphen before any uppercase
        // letter that follows a lowercase one, then lowercase everything.
        let mut out = String::with_capacity(normalised.len() + 4);
        let mut prev_lower = false;
        for c in raw.as_ref().trim().chars() {
            if c.is_uppercase() && prev_lower {
                out.push('-');
            }
            out.push(if c == '_' { '-' } else { c.to_ascii_lowercase() });
            prev_lower = c.is_lowercase();
        }
        Self(out)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Status {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Status {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// A coarse classification of statuses used for dependency-satisfaction
/// checks and role-transition logging. Canonical ordering per the
/// spec's Open Questions: `Queue < Work < Review < Terminal`; `Blocked`
/// is deliberately incomparable to every other role (treated as
/// unresolved rather than "less than terminal").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Queue,
    Work,
    Review,
    Terminal,
    Blocked,
}

impl Role {
    fn rank(self) -> Option<u8> {
        match self {
            Role::Queue => Some(0),
            Role::Work => Some(1),
            Role::Review => Some(2),
            Role::Terminal => Some(3),
            Role::Blocked => None,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "queue" => Some(Role::Queue),
            "work" => Some(Role::Work),
            "review" => Some(Role::Review),
            "terminal" => Some(Role::Terminal),
            "blocked" => Some(Role::Blocked),
            _ => None,
        }
    }
}

impl PartialOrd for Role {
    /// Returns `None` whenever either side is `Blocked`, per the
    /// canonical ordering's "incomparable" rule — callers must never
    /// fall back to string comparison.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.rank()?.partial_cmp(&other.rank()?)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Queue => "queue",
            Role::Work => "work",
            Role::Review => "review",
            Role::Terminal => "terminal",
            Role::Blocked => "blocked",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Project,
    Feature,
    Task,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityType::Project => "project",
            EntityType::Feature => "feature",
            EntityType::Task => "task",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Ascending sort weight, HIGH < MEDIUM < LOW, per §6's
    /// `get_next_task` ordering.
    pub fn sort_weight(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    Markdown,
    Json,
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependencyType {
    #[serde(rename = "BLOCKS")]
    Blocks,
    #[serde(rename = "IS_BLOCKED_BY")]
    IsBlockedBy,
    #[serde(rename = "RELATES_TO")]
    RelatesTo,
}

impl DependencyType {
    /// Whether this edge type participates in blocking analysis (§3
    /// invariant 4: `RELATES_TO` never blocks).
    pub fn is_blocking(self) -> bool {
        matches!(self, DependencyType::Blocks | DependencyType::IsBlockedBy)
    }
}

/// Ordinal reserved for the conventional "files changed" section
/// (§3 invariant 5).
pub const FILES_CHANGED_ORDINAL: i32 = 999;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub summary: String,
    pub description: Option<String>,
    pub status: Status,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub id: Uuid,
    pub name: String,
    pub summary: String,
    pub description: Option<String>,
    pub status: Status,
    pub priority: Priority,
    pub project_id: Option<Uuid>,
    pub requires_verification: bool,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub summary: String,
    pub description: Option<String>,
    pub status: Status,
    pub priority: Priority,
    /// 1..=10
    pub complexity: u8,
    pub project_id: Option<Uuid>,
    pub feature_id: Option<Uuid>,
    pub requires_verification: bool,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: Uuid,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub title: String,
    pub ordinal: i32,
    pub content_format: ContentFormat,
    pub content: String,
    pub usage_description: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub id: Uuid,
    pub from_task_id: Uuid,
    pub to_task_id: Uuid,
    pub dependency_type: DependencyType,
    /// Minimum role the source task must reach before this edge is
    /// considered satisfied (§4.3); defaults to `Terminal`.
    pub unblock_at: Option<Role>,
}

impl Dependency {
    pub fn unblock_at_role(&self) -> Role {
        self.unblock_at.unwrap_or(Role::Terminal)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoleTransition {
    pub id: Uuid,
    pub entity_id: Uuid,
    pub entity_type: EntityType,
    pub from_role: Option<Role>,
    pub to_role: Option<Role>,
    pub from_status: Status,
    pub to_status: Status,
    pub transitioned_at: DateTime<Utc>,
    pub trigger: String,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSection {
    pub title: String,
    pub ordinal: i32,
    pub content_format: ContentFormat,
    pub content: String,
    pub usage_description: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: Uuid,
    pub name: String,
    pub entity_type: EntityType,
    pub sections: Vec<TemplateSection>,
}

/// Aggregate task counts by status bucket, as returned by
/// `get_task_counts_by_feature_id` (§4.1). Bucket membership is derived
/// from the configured task flow's terminal set at call time, not
/// hardcoded here; the field names mirror the spec's literal shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskCounts {
    pub total: u64,
    pub pending: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub testing: u64,
    pub blocked: u64,
}

fn default_delete_sections() -> bool {
    true
}

/// Parameters accepted by the `create` operation of `manage_container`
/// for a Task; Project/Feature share the same field set minus
/// task-only fields (`complexity`, `feature_id`).
#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub summary: String,
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<Status>,
    pub priority: Priority,
    pub complexity: u8,
    pub project_id: Option<Uuid>,
    pub feature_id: Option<Uuid>,
    #[serde(default)]
    pub requires_verification: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub complexity: Option<u8>,
    pub project_id: Option<Uuid>,
    pub feature_id: Option<Uuid>,
    pub requires_verification: Option<bool>,
    pub tags: Option<Vec<String>>,
    #[serde(default = "default_delete_sections")]
    pub delete_sections: bool,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntityFilter {
    pub project_id: Option<Uuid>,
    pub feature_id: Option<Uuid>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub tags: Option<Vec<String>>,
    pub text_query: Option<String>,
    pub limit: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_normalises_snake_and_camel_case() {
        assert_eq!(Status::new("in_progress").as_str(), "in-progress");
        assert_eq!(Status::new("inProgress").as_str(), "in-progress");
        assert_eq!(Status::new("In-Progress").as_str(), "in-progress");
    }

    #[test]
    fn role_ordering_excludes_blocked() {
        assert!(Role::Queue < Role::Work);
        assert!(Role::Work < Role::Review);
        assert!(Role::Review < Role::Terminal);
        assert_eq!(Role::Blocked.partial_cmp(&Role::Terminal), None);
        assert_eq!(Role::Terminal.partial_cmp(&Role::Blocked), None);
    }

    #[test]
    fn dependency_type_blocking() {
        assert!(DependencyType::Blocks.is_blocking());
        assert!(DependencyType::IsBlockedBy.is_blocking());
        assert!(!DependencyType::RelatesTo.is_blocking());
    }

    #[test]
    fn priority_sort_weight_orders_high_first() {
        assert!(Priority::High.sort_weight() < Priority::Medium.sort_weight());
        assert!(Priority::Medium.sort_weight() < Priority::Low.sort_weight());
    }
}
