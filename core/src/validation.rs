use std::collections::HashSet;

use crate::config::{WorkflowConfig, ENVIRONMENT_TAGS};
use crate::models::{EntityType, Role};

/// Outcome of a status or transition check (§4.3). `ValidWithAdvisory`
/// is still a pass — callers must not treat it as failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    ValidWithAdvisory(String),
    Invalid {
        reason: String,
        suggestions: Vec<String>,
    },
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        !matches!(self, ValidationOutcome::Invalid { .. })
    }

    fn invalid(reason: impl Into<String>) -> Self {
        ValidationOutcome::Invalid {
            reason: reason.into(),
            suggestions: Vec::new(),
        }
    }

    fn invalid_with(reason: impl Into<String>, suggestions: Vec<String>) -> Self {
        ValidationOutcome::Invalid {
            reason: reason.into(),
            suggestions,
        }
    }
}

/// A task that blocks some other task, as seen from the blocked side —
/// the data the `in-progress` prerequisite needs, pre-fetched by the
/// caller (the transition executor) so this module stays repository-free.
#[derive(Debug, Clone)]
pub struct BlockingSource {
    pub title: String,
    pub role: Option<Role>,
    /// The role this edge requires the source to have reached; defaults
    /// to `Terminal` at the model layer.
    pub unblock_at: Role,
}

/// Pre-fetched data needed by [`validate_prerequisites`]. The transition
/// executor assembles this from the repositories before calling in;
/// fields not relevant to the target entity/status pair are left empty.
#[derive(Debug, Clone, Default)]
pub struct PrerequisiteContext {
    pub child_task_statuses: Vec<String>,
    pub child_feature_statuses: Vec<String>,
    pub blocking_sources: Vec<BlockingSource>,
    pub task_summary: Option<String>,
}

pub fn get_allowed_statuses(config: &WorkflowConfig, entity_type: EntityType) -> HashSet<String> {
    config.progression_for(entity_type).allowed_statuses()
}

/// Step 1 of `validate_transition`: is `status` reachable at all for
/// this entity type, given its tags (only consulted for the `deployed`
/// advisory).
pub fn validate_status(
    config: &WorkflowConfig,
    entity_type: EntityType,
    status: &str,
    tags: &[String],
) -> ValidationOutcome {
    let allowed = get_allowed_statuses(config, entity_type);
    if !allowed.contains(status) {
        return ValidationOutcome::invalid(format!("status '{status}' is not a recognised status"));
    }

    if status == "deployed" {
        let has_env_tag = tags
            .iter()
            .any(|t| ENVIRONMENT_TAGS.contains(&t.to_ascii_lowercase().as_str()));
        if !has_env_tag {
            return ValidationOutcome::ValidWithAdvisory(
                "Consider adding an environment tag (staging, production, canary, dev, development, prod)".into(),
            );
        }
    }

    ValidationOutcome::Valid
}

/// Full `validate_transition` algorithm (§4.3 steps 1-4; prerequisites
/// are step 5, run separately via [`validate_prerequisites`] since they
/// require repository-fetched context the caller may not always have).
pub fn validate_transition(
    config: &WorkflowConfig,
    current: &str,
    target: &str,
    entity_type: EntityType,
    tags: &[String],
) -> ValidationOutcome {
    let status_outcome = validate_status(config, entity_type, target, tags);
    if let ValidationOutcome::Invalid { .. } = status_outcome {
        return status_outcome;
    }
    let advisory = match &status_outcome {
        ValidationOutcome::ValidWithAdvisory(msg) => Some(msg.clone()),
        _ => None,
    };

    let progression = config.progression_for(entity_type);

    if progression.is_terminal(current) {
        return ValidationOutcome::invalid(format!(
            "Cannot transition from terminal status '{current}'"
        ));
    }

    let validation = &config.status_validation;

    if progression.is_emergency(target) && validation.allow_emergency {
        return advisory
            .map(ValidationOutcome::ValidWithAdvisory)
            .unwrap_or(ValidationOutcome::Valid);
    }

    let (_, flow) = progression.active_flow(tags);
    let i = flow.iter().position(|s| s == current);
    let j = flow.iter().position(|s| s == target);

    let (i, j) = match (i, j) {
        (Some(i), Some(j)) => (i, j),
        _ => {
            return advisory
                .map(ValidationOutcome::ValidWithAdvisory)
                .unwrap_or(ValidationOutcome::Valid);
        }
    };

    if j < i {
        return if validation.allow_backward {
            advisory
                .map(ValidationOutcome::ValidWithAdvisory)
                .unwrap_or(ValidationOutcome::Valid)
        } else {
            ValidationOutcome::invalid(format!(
                "Backward transition from '{current}' to '{target}' is not allowed"
            ))
        };
    }

    if j > i + 1 && validation.enforce_sequential {
        return ValidationOutcome::invalid_with(
            format!("Cannot skip statuses transitioning from '{current}' to '{target}'"),
            vec![flow[i + 1].clone()],
        );
    }

    advisory
        .map(ValidationOutcome::ValidWithAdvisory)
        .unwrap_or(ValidationOutcome::Valid)
}

/// Step 5 of `validate_transition`: the §4.3 prerequisites table.
pub fn validate_prerequisites(
    entity_type: EntityType,
    target: &str,
    ctx: &PrerequisiteContext,
) -> ValidationOutcome {
    match (entity_type, target) {
        (EntityType::Feature, "in-development") => {
            if ctx.child_task_statuses.is_empty() {
                ValidationOutcome::invalid(
                    "Feature requires at least one child task before entering development",
                )
            } else {
                ValidationOutcome::Valid
            }
        }
        (EntityType::Feature, "testing") | (EntityType::Feature, "completed") => {
            let all_completed = ctx.child_task_statuses.iter().all(|s| s == "completed");
            if ctx.child_task_statuses.is_empty() || all_completed {
                ValidationOutcome::Valid
            } else {
                let incomplete = ctx
                    .child_task_statuses
                    .iter()
                    .filter(|s| *s != "completed")
                    .count();
                ValidationOutcome::invalid(format!(
                    "All child tasks must be completed ({incomplete} still incomplete)"
                ))
            }
        }
        (EntityType::Task, "in-progress") => {
            let blockers: Vec<&BlockingSource> = ctx
                .blocking_sources
                .iter()
                .filter(|b| match b.role {
                    Some(role) => !(role >= b.unblock_at),
                    None => true,
                })
                .collect();
            if blockers.is_empty() {
                ValidationOutcome::Valid
            } else {
                let names: Vec<String> = blockers.iter().take(3).map(|b| b.title.clone()).collect();
                let suffix = if blockers.len() > 3 {
                    format!(" and {} more", blockers.len() - 3)
                } else {
                    String::new()
                };
                ValidationOutcome::invalid_with(
                    format!(
                        "Blocked by incomplete dependencies: {}{suffix}",
                        names.join(", ")
                    ),
                    names,
                )
            }
        }
        (EntityType::Task, "completed") => {
            let len = ctx
                .task_summary
                .as_deref()
                .map(|s| s.trim().len())
                .unwrap_or(0);
            if (300..=500).contains(&len) {
                ValidationOutcome::Valid
            } else {
                ValidationOutcome::invalid(format!(
                    "Completion summary must be 300-500 characters (current: {len})"
                ))
            }
        }
        (EntityType::Project, "completed") => {
            let all_completed = ctx.child_feature_statuses.iter().all(|s| s == "completed");
            if ctx.child_feature_statuses.is_empty() || all_completed {
                ValidationOutcome::Valid
            } else {
                ValidationOutcome::invalid("All child features must be completed")
            }
        }
        _ => ValidationOutcome::Valid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkflowConfig;

    #[test]
    fn forward_progression_is_valid() {
        let config = WorkflowConfig::default();
        let outcome = validate_transition(&config, "pending", "in-progress", EntityType::Task, &[]);
        assert_eq!(outcome, ValidationOutcome::Valid);
    }

    #[test]
    fn skip_ahead_is_rejected_with_next_status_suggestion() {
        let config = WorkflowConfig::default();
        let outcome = validate_transition(&config, "pending", "completed", EntityType::Task, &[]);
        match outcome {
            ValidationOutcome::Invalid { suggestions, .. } => {
                assert_eq!(suggestions, vec!["in-progress".to_string()]);
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn terminal_status_rejects_any_further_transition() {
        let config = WorkflowConfig::default();
        let outcome = validate_transition(&config, "completed", "pending", EntityType::Task, &[]);
        assert!(!outcome.is_valid());
    }

    #[test]
    fn emergency_transition_bypasses_sequencing() {
        let config = WorkflowConfig::default();
        let outcome = validate_transition(&config, "pending", "cancelled", EntityType::Task, &[]);
        assert_eq!(outcome, ValidationOutcome::Valid);
    }

    #[test]
    fn backward_transition_allowed_by_default() {
        let config = WorkflowConfig::default();
        let outcome = validate_transition(&config, "testing", "in-progress", EntityType::Task, &[]);
        assert_eq!(outcome, ValidationOutcome::Valid);
    }

    #[test]
    fn deployed_without_environment_tag_is_advisory() {
        let mut config = WorkflowConfig::default();
        config
            .status_progression
            .tasks
            .default_flow
            .push("deployed".into());
        let outcome = validate_status(&config, EntityType::Task, "deployed", &[]);
        assert!(matches!(outcome, ValidationOutcome::ValidWithAdvisory(_)));
    }

    #[test]
    fn completed_summary_length_prerequisite() {
        let short = PrerequisiteContext {
            task_summary: Some("too short".into()),
            ..Default::default()
        };
        let outcome = validate_prerequisites(EntityType::Task, "completed", &short);
        assert!(!outcome.is_valid());

        let long = PrerequisiteContext {
            task_summary: Some("x".repeat(350)),
            ..Default::default()
        };
        let outcome = validate_prerequisites(EntityType::Task, "completed", &long);
        assert_eq!(outcome, ValidationOutcome::Valid);
    }

    #[test]
    fn in_progress_blocked_by_non_terminal_source() {
        let ctx = PrerequisiteContext {
            blocking_sources: vec![BlockingSource {
                title: "Upstream task".into(),
                role: Some(Role::Work),
                unblock_at: Role::Terminal,
            }],
            ..Default::default()
        };
        let outcome = validate_prerequisites(EntityType::Task, "in-progress", &ctx);
        assert!(!outcome.is_valid());
    }
}
