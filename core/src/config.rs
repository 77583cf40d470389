use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::models::EntityType;

const CONFIG_RELATIVE_PATH: &str = ".taskorchestrator/config.yaml";
const CACHE_TTL: Duration = Duration::from_secs(5);

pub const ENVIRONMENT_TAGS: &[&str] =
    &["staging", "production", "canary", "dev", "development", "prod"];

fn default_true() -> bool {
    true
}

fn default_max_depth() -> u32 {
    3
}

/// One flow family (projects, features, or tasks) — §4.2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressionSpec {
    pub default_flow: Vec<String>,
    #[serde(flatten)]
    pub named_flows: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub flow_mappings: Vec<FlowMapping>,
    #[serde(default)]
    pub terminal_statuses: Vec<String>,
    #[serde(default)]
    pub emergency_transitions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowMapping {
    pub tags: Vec<String>,
    pub flow: String,
}

impl ProgressionSpec {
    /// `active_flow(tags)`: first `flow_mappings` entry whose tag set
    /// intersects (case-insensitively), else `default_flow`.
    pub fn active_flow(&self, tags: &[String]) -> (&str, &[String]) {
        let lower_tags: Vec<String> = tags.iter().map(|t| t.to_ascii_lowercase()).collect();
        for mapping in &self.flow_mappings {
            let hits = mapping
                .tags
                .iter()
                .any(|t| lower_tags.contains(&t.to_ascii_lowercase()));
            if hits {
                if let Some(flow) = self.named_flows.get(&mapping.flow) {
                    return (mapping.flow.as_str(), flow.as_slice());
                }
            }
        }
        ("default", self.default_flow.as_slice())
    }

    /// Every status reachable for this entity type: the union of all
    /// flows, emergency transitions, and terminal statuses (§4.2).
    pub fn allowed_statuses(&self) -> std::collections::HashSet<String> {
        let mut set = std::collections::HashSet::new();
        set.extend(self.default_flow.iter().cloned());
        for flow in self.named_flows.values() {
            set.extend(flow.iter().cloned());
        }
        set.extend(self.terminal_statuses.iter().cloned());
        set.extend(self.emergency_transitions.iter().cloned());
        set
    }

    pub fn is_terminal(&self, status: &str) -> bool {
        self.terminal_statuses.iter().any(|s| s == status)
    }

    pub fn is_emergency(&self, status: &str) -> bool {
        self.emergency_transitions.iter().any(|s| s == status)
    }
}

fn default_progression() -> ProgressionSpec {
    ProgressionSpec {
        default_flow: vec![
            "pending".into(),
            "in-progress".into(),
            "testing".into(),
            "completed".into(),
        ],
        named_flows: HashMap::new(),
        flow_mappings: Vec::new(),
        terminal_statuses: vec!["completed".into(), "cancelled".into(), "deferred".into()],
        emergency_transitions: vec!["blocked".into(), "on-hold".into(), "cancelled".into()],
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusProgression {
    #[serde(default = "default_progression")]
    pub projects: ProgressionSpec,
    #[serde(default = "default_progression")]
    pub features: ProgressionSpec,
    #[serde(default = "default_progression")]
    pub tasks: ProgressionSpec,
}

impl Default for StatusProgression {
    fn default() -> Self {
        Self {
            projects: default_progression(),
            features: default_progression(),
            tasks: default_progression(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusValidation {
    #[serde(default = "default_true")]
    pub enforce_sequential: bool,
    #[serde(default = "default_true")]
    pub allow_backward: bool,
    #[serde(default = "default_true")]
    pub allow_emergency: bool,
    #[serde(default = "default_true")]
    pub validate_prerequisites: bool,
}

impl Default for StatusValidation {
    fn default() -> Self {
        Self {
            enforce_sequential: true,
            allow_backward: true,
            allow_emergency: true,
            validate_prerequisites: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoCascade {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
}

impl Default for AutoCascade {
    fn default() -> Self {
        Self {
            enabled: false,
            max_depth: default_max_depth(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub status_progression: StatusProgression,
    #[serde(default)]
    pub status_validation: StatusValidation,
    #[serde(default)]
    pub auto_cascade: AutoCascade,
    /// `status_roles.<entity-type>.<status> = <role name>`.
    #[serde(default = "default_status_roles")]
    pub status_roles: HashMap<String, HashMap<String, String>>,
}

fn default_status_roles() -> HashMap<String, HashMap<String, String>> {
    let mapping: HashMap<String, String> = [
        ("pending", "queue"),
        ("in-progress", "work"),
        ("testing", "review"),
        ("completed", "terminal"),
        ("cancelled", "terminal"),
        ("deferred", "terminal"),
        ("blocked", "blocked"),
        ("on-hold", "blocked"),
        ("planning", "queue"),
        ("in-development", "work"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    ["project", "feature", "task"]
        .into_iter()
        .map(|entity| (entity.to_string(), mapping.clone()))
        .collect()
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            status_progression: StatusProgression::default(),
            status_validation: StatusValidation::default(),
            auto_cascade: AutoCascade::default(),
            status_roles: default_status_roles(),
        }
    }
}

impl WorkflowConfig {
    pub fn progression_for(&self, entity_type: EntityType) -> &ProgressionSpec {
        match entity_type {
            EntityType::Project => &self.status_progression.projects,
            EntityType::Feature => &self.status_progression.features,
            EntityType::Task => &self.status_progression.tasks,
        }
    }

    /// Resolve the configured role for `status` under `entity_type`,
    /// falling through `status_roles` only — never by string-matching
    /// on the status name itself (§9 Open Question 3).
    pub fn role_for(&self, entity_type: EntityType, status: &str) -> Option<crate::models::Role> {
        self.status_roles
            .get(&entity_type.to_string())
            .and_then(|map| map.get(status))
            .and_then(|name| crate::models::Role::parse(name))
    }
}

struct CachedConfig {
    config: WorkflowConfig,
    working_dir: PathBuf,
    read_at: Instant,
}

/// Process-global cache: invalidated by a TTL or a working-directory
/// change, per §4.2/§5. Parse failures fall back to defaults and are
/// logged, never propagated.
pub struct ConfigLoader {
    cache: Mutex<Option<CachedConfig>>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            cache: Mutex::new(None),
        }
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self, working_dir: &Path) -> WorkflowConfig {
        let mut guard = self.cache.lock();
        if let Some(cached) = guard.as_ref() {
            if cached.working_dir == working_dir && cached.read_at.elapsed() < CACHE_TTL {
                return cached.config.clone();
            }
        }

        let config = Self::read_from_disk(working_dir);
        *guard = Some(CachedConfig {
            config: config.clone(),
            working_dir: working_dir.to_path_buf(),
            read_at: Instant::now(),
        });
        config
    }

    fn read_from_disk(working_dir: &Path) -> WorkflowConfig {
        let path = working_dir.join(CONFIG_RELATIVE_PATH);
        match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse workflow configuration, using defaults"
                    );
                    WorkflowConfig::default()
                }
            },
            Err(_) => WorkflowConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_standard_task_flow() {
        let config = WorkflowConfig::default();
        let allowed = config.status_progression.tasks.allowed_statuses();
        assert!(allowed.contains("pending"));
        assert!(allowed.contains("in-progress"));
        assert!(allowed.contains("completed"));
        assert!(allowed.contains("cancelled"));
    }

    #[test]
    fn active_flow_honours_tag_mapping() {
        let mut progression = default_progression();
        progression.named_flows.insert(
            "hotfix_flow".into(),
            vec!["pending".into(), "completed".into()],
        );
        progression.flow_mappings.push(FlowMapping {
            tags: vec!["hotfix".into()],
            flow: "hotfix_flow".into(),
        });

        let (name, flow) = progression.active_flow(&["HotFix".into()]);
        assert_eq!(name, "hotfix_flow");
        assert_eq!(flow, &["pending", "completed"]);

        let (name, _) = progression.active_flow(&["unrelated".into()]);
        assert_eq!(name, "default");
    }

    #[test]
    fn loader_falls_back_to_defaults_when_file_absent() {
        let loader = ConfigLoader::new();
        let dir = tempfile_dir();
        let config = loader.load(&dir);
        assert!(config
            .status_progression
            .tasks
            .allowed_statuses()
            .contains("pending"));
    }

    fn tempfile_dir() -> PathBuf {
        std::env::temp_dir().join(format!("orchestrator-config-test-{}", std::process::id()))
    }
}
