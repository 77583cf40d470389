use uuid::Uuid;

use crate::{
    cascade::{self, AppliedCascade, CascadeEvent},
    completion::CleanupSummary,
    config::WorkflowConfig,
    dependency::{self, UnblockedTask},
    error::{OrchestratorError, Result},
    models::{EntityType, Role},
    repository::Repositories,
    validation::{
        validate_prerequisites, validate_transition, BlockingSource, PrerequisiteContext,
        ValidationOutcome,
    },
};

/// Triggers that bypass flow sequencing entirely and resolve directly
/// to an emergency status (§4.6).
const EMERGENCY_TRIGGERS: &[(&str, &str)] = &[
    ("cancel", "cancelled"),
    ("block", "blocked"),
    ("hold", "on-hold"),
    ("archive", "archived"),
];

#[derive(Debug, Clone)]
pub struct TransitionError {
    pub code: &'static str,
    pub details: String,
    pub suggestions: Vec<String>,
    pub gate: Option<&'static str>,
    pub failing_criteria: Vec<String>,
}

impl TransitionError {
    fn validation(details: impl Into<String>) -> Self {
        Self {
            code: "VALIDATION_ERROR",
            details: details.into(),
            suggestions: Vec::new(),
            gate: None,
            failing_criteria: Vec::new(),
        }
    }

    fn validation_with(details: impl Into<String>, suggestions: Vec<String>) -> Self {
        Self {
            code: "VALIDATION_ERROR",
            details: details.into(),
            suggestions,
            gate: None,
            failing_criteria: Vec::new(),
        }
    }

    fn not_found(details: impl Into<String>) -> Self {
        Self {
            code: "RESOURCE_NOT_FOUND",
            details: details.into(),
            suggestions: Vec::new(),
            gate: None,
            failing_criteria: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CascadeOutcome {
    pub event: &'static str,
    pub target_type: EntityType,
    pub target_id: Uuid,
    pub previous_status: String,
    pub suggested_status: String,
    pub applied: bool,
    pub automatic: bool,
    pub reason: String,
    pub error: Option<String>,
    pub cleanup: Option<CleanupSummary>,
    pub child_cascades: Vec<CascadeOutcome>,
}

impl From<AppliedCascade> for CascadeOutcome {
    fn from(value: AppliedCascade) -> Self {
        Self {
            event: value.event,
            target_type: value.target_type,
            target_id: value.target_id,
            previous_status: value.previous_status,
            suggested_status: value.new_status,
            applied: value.applied,
            automatic: true,
            reason: value.reason,
            error: value.error,
            cleanup: value.cleanup,
            child_cascades: value.child_cascades.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<CascadeEvent> for CascadeOutcome {
    fn from(value: CascadeEvent) -> Self {
        Self {
            event: value.event,
            target_type: value.target_type,
            target_id: value.target_id,
            previous_status: value.target_current_status,
            suggested_status: value.suggested_status,
            applied: false,
            automatic: false,
            reason: value.reason,
            error: None,
            cleanup: None,
            child_cascades: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransitionResult {
    pub applied: bool,
    pub message: String,
    pub previous_status: Option<String>,
    pub new_status: Option<String>,
    pub previous_role: Option<Role>,
    pub new_role: Option<Role>,
    pub cascade_events: Vec<CascadeOutcome>,
    pub unblocked_tasks: Vec<UnblockedTask>,
    pub error: Option<TransitionError>,
}

impl TransitionResult {
    fn error(message: impl Into<String>, error: TransitionError) -> Self {
        Self {
            applied: false,
            message: message.into(),
            previous_status: None,
            new_status: None,
            previous_role: None,
            new_role: None,
            cascade_events: Vec::new(),
            unblocked_tasks: Vec::new(),
            error: Some(error),
        }
    }

    fn no_op() -> Self {
        Self {
            applied: false,
            message: "No transition needed".to_string(),
            previous_status: None,
            new_status: None,
            previous_role: None,
            new_role: None,
            cascade_events: Vec::new(),
            unblocked_tasks: Vec::new(),
            error: None,
        }
    }
}

struct EntitySnapshot {
    status: String,
    tags: Vec<String>,
    requires_verification: bool,
    name: String,
}

async fn fetch_snapshot<R: Repositories>(
    repos: &R,
    container_type: EntityType,
    container_id: Uuid,
) -> Result<Option<EntitySnapshot>> {
    Ok(match container_type {
        EntityType::Project => repos.projects().get_by_id(container_id).await?.map(|p| EntitySnapshot {
            status: p.status.to_string(),
            tags: p.tags,
            requires_verification: false,
            name: p.name,
        }),
        EntityType::Feature => repos.features().get_by_id(container_id).await?.map(|f| EntitySnapshot {
            status: f.status.to_string(),
            tags: f.tags,
            requires_verification: f.requires_verification,
            name: f.name,
        }),
        EntityType::Task => repos.tasks().get_by_id(container_id).await?.map(|t| EntitySnapshot {
            status: t.status.to_string(),
            tags: t.tags,
            requires_verification: t.requires_verification,
            name: t.title,
        }),
    })
}

async fn build_prerequisite_context<R: Repositories>(
    repos: &R,
    config: &WorkflowConfig,
    container_type: EntityType,
    container_id: Uuid,
    summary: Option<&str>,
) -> Result<PrerequisiteContext> {
    let mut ctx = PrerequisiteContext {
        task_summary: summary.map(|s| s.to_string()),
        ..Default::default()
    };

    match container_type {
        EntityType::Feature => {
            let tasks = repos.tasks().find_by_feature(container_id).await?;
            ctx.child_task_statuses = tasks.into_iter().map(|t| t.status.to_string()).collect();
        }
        EntityType::Project => {
            let features = repos.features().find_by_project(container_id).await?;
            ctx.child_feature_statuses = features.into_iter().map(|f| f.status.to_string()).collect();
        }
        EntityType::Task => {
            let inbound = repos.dependencies().find_by_to_task_id(container_id).await?;
            let mut sources = Vec::new();
            for edge in inbound.iter().filter(|d| d.dependency_type.is_blocking()) {
                let source = repos.tasks().get_by_id(edge.from_task_id).await?;
                let (title, role) = match source {
                    Some(task) => (
                        task.title,
                        config.role_for(EntityType::Task, task.status.as_str()),
                    ),
                    None => ("<unknown task>".to_string(), None),
                };
                sources.push(BlockingSource {
                    title,
                    role,
                    unblock_at: edge.unblock_at_role(),
                });
            }
            ctx.blocking_sources = sources;
        }
    }
    Ok(ctx)
}

/// §4.7 — one of Ready / Blocked / Terminal.
#[derive(Debug, Clone)]
pub enum NextStatusRecommendation {
    Ready {
        recommended_status: String,
        active_flow: String,
        flow_sequence: Vec<String>,
        current_position: usize,
        reason: String,
        current_role: Option<Role>,
        next_role: Option<Role>,
    },
    Blocked {
        current_status: String,
        blockers: Vec<String>,
        active_flow: String,
        flow_sequence: Vec<String>,
        current_position: usize,
    },
    Terminal {
        terminal_status: String,
        active_flow: String,
        reason: String,
    },
}

pub async fn get_next_status<R: Repositories>(
    repos: &R,
    config: &WorkflowConfig,
    container_id: Uuid,
    container_type: EntityType,
    current_status_override: Option<&str>,
    tags_override: Option<&[String]>,
) -> Result<NextStatusRecommendation> {
    let snapshot = fetch_snapshot(repos, container_type, container_id)
        .await?
        .ok_or_else(|| OrchestratorError::not_found_kind(&container_type.to_string(), container_id))?;

    let current = current_status_override
        .map(|s| s.to_string())
        .unwrap_or(snapshot.status.clone());
    let tags = tags_override.map(|t| t.to_vec()).unwrap_or(snapshot.tags.clone());

    let progression = config.progression_for(container_type);

    if progression.is_terminal(&current) {
        let (flow_name, _) = progression.active_flow(&tags);
        return Ok(NextStatusRecommendation::Terminal {
            terminal_status: current,
            active_flow: flow_name.to_string(),
            reason: "Entity has reached a terminal status".to_string(),
        });
    }

    let (flow_name, flow) = progression.active_flow(&tags);
    let position = flow.iter().position(|s| s == &current);

    let Some(position) = position else {
        let (flow_name, _) = progression.active_flow(&tags);
        return Ok(NextStatusRecommendation::Terminal {
            terminal_status: current,
            active_flow: flow_name.to_string(),
            reason: "Current status does not belong to the active flow".to_string(),
        });
    };

    let next_status = flow
        .get(position + 1)
        .cloned()
        .or_else(|| progression.terminal_statuses.first().cloned());

    let Some(next_status) = next_status else {
        return Ok(NextStatusRecommendation::Terminal {
            terminal_status: current,
            active_flow: flow_name.to_string(),
            reason: "No further status configured in this flow".to_string(),
        });
    };

    if !config.status_validation.validate_prerequisites {
        let current_role = config.role_for(container_type, &current);
        let next_role = config.role_for(container_type, &next_status);
        return Ok(NextStatusRecommendation::Ready {
            recommended_status: next_status,
            active_flow: flow_name.to_string(),
            flow_sequence: flow.to_vec(),
            current_position: position,
            reason: "Next status in the active flow".to_string(),
            current_role,
            next_role,
        });
    }

    let ctx = build_prerequisite_context(repos, config, container_type, container_id, None).await?;
    let outcome = validate_prerequisites(container_type, &next_status, &ctx);

    match outcome {
        ValidationOutcome::Invalid { reason: _, suggestions } if container_type == EntityType::Task => {
            let blockers = suggestions
                .iter()
                .map(|title| {
                    let role = ctx
                        .blocking_sources
                        .iter()
                        .find(|b| &b.title == title)
                        .and_then(|b| b.role);
                    let role_label = role.map(|r| r.to_string()).unwrap_or_else(|| "unknown".to_string());
                    format!("{title} needs terminal role (currently {role_label})")
                })
                .collect();
            Ok(NextStatusRecommendation::Blocked {
                current_status: current,
                blockers,
                active_flow: flow_name.to_string(),
                flow_sequence: flow.to_vec(),
                current_position: position,
            })
        }
        ValidationOutcome::Invalid { reason, .. } => Ok(NextStatusRecommendation::Blocked {
            current_status: current,
            blockers: vec![reason],
            active_flow: flow_name.to_string(),
            flow_sequence: flow.to_vec(),
            current_position: position,
        }),
        _ => {
            let current_role = config.role_for(container_type, &current);
            let next_role = config.role_for(container_type, &next_status);
            Ok(NextStatusRecommendation::Ready {
                recommended_status: next_status,
                active_flow: flow_name.to_string(),
                flow_sequence: flow.to_vec(),
                current_position: position,
                reason: "Next status in the active flow".to_string(),
                current_role,
                next_role,
            })
        }
    }
}

/// `Ok(Some(status))` when `trigger` is an emergency verb and its
/// status is configured; `Ok(None)` when `trigger` is not an emergency
/// verb at all (caller falls through to `get_next_status`); `Err` when
/// it is an emergency verb but the corresponding status is not
/// configured for this entity type.
fn resolve_emergency_target(
    progression: &crate::config::ProgressionSpec,
    trigger: &str,
) -> std::result::Result<Option<String>, String> {
    match EMERGENCY_TRIGGERS.iter().find(|(t, _)| *t == trigger) {
        None => Ok(None),
        Some((_, status)) => {
            if progression.is_emergency(status) {
                Ok(Some(status.to_string()))
            } else {
                Err(format!("emergency status '{status}' is not configured for this entity type"))
            }
        }
    }
}

/// A caller may name the desired status directly instead of using a
/// symbolic verb (e.g. `trigger = "testing"` or `"completed"`). When
/// `trigger` matches one of this entity type's known statuses exactly,
/// that status is the target and `validate_transition` below is what
/// catches an illegal skip; symbolic verbs like `start` never match a
/// status name and fall through to `get_next_status`.
fn resolve_literal_target(progression: &crate::config::ProgressionSpec, trigger: &str) -> Option<String> {
    progression
        .allowed_statuses()
        .iter()
        .find(|status| status.as_str() == trigger)
        .cloned()
}

/// Parses the conventional `[{"criteria": "...", "pass": bool}, ...]`
/// verification-section shape (§4.6 step 5). Returns the criteria whose
/// `pass` is not `true`.
fn failing_verification_criteria(section_content: &str) -> Option<Vec<String>> {
    let parsed: serde_json::Value = serde_json::from_str(section_content).ok()?;
    let entries = parsed.as_array()?;
    let mut failing = Vec::new();
    for entry in entries {
        let criteria = entry.get("criteria")?.as_str()?.to_string();
        let pass = entry.get("pass").and_then(|v| v.as_bool()).unwrap_or(false);
        if !pass {
            failing.push(criteria);
        }
    }
    Some(failing)
}

async fn run_verification_gate<R: Repositories>(
    repos: &R,
    container_type: EntityType,
    container_id: Uuid,
) -> Result<Option<Vec<String>>> {
    let sections = repos.sections().find_by_entity(container_type, container_id).await?;
    let verification = sections.into_iter().find(|s| s.title.eq_ignore_ascii_case("verification"));
    let Some(section) = verification else {
        return Ok(None);
    };
    Ok(failing_verification_criteria(&section.content))
}

async fn persist_status<R: Repositories>(
    repos: &R,
    container_type: EntityType,
    container_id: Uuid,
    status: crate::models::Status,
) -> Result<()> {
    match container_type {
        EntityType::Project => {
            repos.projects().set_status(container_id, status).await?;
        }
        EntityType::Feature => {
            repos.features().set_status(container_id, status).await?;
        }
        EntityType::Task => {
            repos.tasks().set_status(container_id, status).await?;
        }
    }
    Ok(())
}

async fn record_role_transition<R: Repositories>(
    repos: &R,
    config: &WorkflowConfig,
    container_type: EntityType,
    container_id: Uuid,
    from_status: &str,
    to_status: &str,
    trigger: &str,
    summary: Option<String>,
) -> (Option<Role>, Option<Role>) {
    let from_role = config.role_for(container_type, from_status);
    let to_role = config.role_for(container_type, to_status);

    if let (Some(from), Some(to)) = (from_role, to_role) {
        if from != to {
            let row = crate::models::RoleTransition {
                id: Uuid::new_v4(),
                entity_id: container_id,
                entity_type: container_type,
                from_role: Some(from),
                to_role: Some(to),
                from_status: crate::models::Status::new(from_status),
                to_status: crate::models::Status::new(to_status),
                transitioned_at: chrono::Utc::now(),
                trigger: trigger.to_string(),
                summary,
            };
            if let Err(err) = repos.role_transitions().create(row).await {
                tracing::warn!(entity_id = %container_id, error = %err, "failed to record role transition");
            }
        }
    }

    (from_role, to_role)
}

/// §4.6 single-item execution.
pub async fn request_transition<R: Repositories>(
    repos: &R,
    config: &WorkflowConfig,
    container_id: Uuid,
    container_type: EntityType,
    trigger: &str,
    summary: Option<String>,
) -> Result<TransitionResult> {
    let Some(snapshot) = fetch_snapshot(repos, container_type, container_id).await? else {
        return Ok(TransitionResult::error(
            format!("{container_type} '{container_id}' was not found"),
            TransitionError::not_found(format!("{container_type} '{container_id}' does not exist")),
        ));
    };

    let progression = config.progression_for(container_type);

    let target = match resolve_emergency_target(progression, trigger) {
        Err(message) => {
            return Ok(TransitionResult::error("Transition rejected", TransitionError::validation(message)));
        }
        Ok(Some(target)) => target,
        Ok(None) if resolve_literal_target(progression, trigger).is_some() => {
            resolve_literal_target(progression, trigger).expect("checked Some above")
        }
        Ok(None) => match get_next_status(repos, config, container_id, container_type, None, None).await? {
            NextStatusRecommendation::Ready { recommended_status, .. } => recommended_status,
            NextStatusRecommendation::Blocked { blockers, .. } => {
                return Ok(TransitionResult::error(
                    "Transition is blocked",
                    TransitionError::validation(blockers.join("; ")),
                ));
            }
            NextStatusRecommendation::Terminal { reason, .. } => {
                return Ok(TransitionResult::error(
                    "No further transition available",
                    TransitionError::validation(reason),
                ));
            }
        },
    };

    if snapshot.status == target {
        return Ok(TransitionResult::no_op());
    }

    let transition_outcome = validate_transition(config, &snapshot.status, &target, container_type, &snapshot.tags);
    if let ValidationOutcome::Invalid { reason, suggestions } = transition_outcome {
        return Ok(TransitionResult::error(
            "Transition rejected",
            TransitionError::validation_with(reason, suggestions),
        ));
    }

    if config.status_validation.validate_prerequisites {
        let ctx = build_prerequisite_context(
            repos,
            config,
            container_type,
            container_id,
            summary.as_deref(),
        )
        .await?;
        if let ValidationOutcome::Invalid { reason, suggestions } = validate_prerequisites(container_type, &target, &ctx) {
            return Ok(TransitionResult::error(
                "Prerequisites not satisfied",
                TransitionError::validation_with(reason, suggestions),
            ));
        }
    }

    if progression.is_terminal(&target) && snapshot.requires_verification {
        if let Some(failing) = run_verification_gate(repos, container_type, container_id).await? {
            if !failing.is_empty() {
                let mut error = TransitionError::validation("Verification gate failed");
                error.gate = Some("verification");
                error.failing_criteria = failing;
                return Ok(TransitionResult::error("Verification gate failed", error));
            }
        }
    }

    persist_status(repos, container_type, container_id, crate::models::Status::new(&target)).await?;

    let (previous_role, new_role) = record_role_transition(
        repos,
        config,
        container_type,
        container_id,
        &snapshot.status,
        &target,
        trigger,
        summary.clone(),
    )
    .await;

    let cascade_events = if config.auto_cascade.enabled {
        cascade::apply_cascades(
            repos,
            config,
            container_type,
            container_id,
            &snapshot.status,
            0,
            config.auto_cascade.max_depth,
        )
        .await?
        .into_iter()
        .map(CascadeOutcome::from)
        .collect()
    } else {
        cascade::detect_cascade_events(repos, config, container_type, container_id, &snapshot.status)
            .await?
            .into_iter()
            .map(CascadeOutcome::from)
            .collect()
    };

    let unblocked_tasks = if container_type == EntityType::Task && progression.is_terminal(&target) {
        dependency::newly_unblocked(repos, config, container_id).await?
    } else {
        Vec::new()
    };

    Ok(TransitionResult {
        applied: true,
        message: format!("Transitioned {} from '{}' to '{}'", snapshot.name, snapshot.status, target),
        previous_status: Some(snapshot.status),
        new_status: Some(target),
        previous_role,
        new_role,
        cascade_events,
        unblocked_tasks,
        error: None,
    })
}

#[derive(Debug, Clone)]
pub struct BatchTransitionItem {
    pub container_id: Uuid,
    pub container_type: EntityType,
    pub trigger: String,
    pub summary: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cascades_applied: usize,
}

/// §4.6 batch execution: each item is processed independently and
/// never aborts the batch.
pub async fn request_transitions_batch<R: Repositories>(
    repos: &R,
    config: &WorkflowConfig,
    items: Vec<BatchTransitionItem>,
) -> Result<(Vec<TransitionResult>, BatchSummary)> {
    let mut results = Vec::with_capacity(items.len());
    let mut succeeded = 0usize;
    let mut cascades_applied = 0usize;

    for item in items {
        let result = request_transition(
            repos,
            config,
            item.container_id,
            item.container_type,
            &item.trigger,
            item.summary,
        )
        .await?;

        if result.applied {
            succeeded += 1;
        }
        cascades_applied += result.cascade_events.iter().filter(|c| c.applied).count();
        results.push(result);
    }

    let total = results.len();
    let failed = total - succeeded;

    Ok((
        results,
        BatchSummary {
            total,
            succeeded,
            failed,
            cascades_applied,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewTask, Priority, Status};
    use crate::test_support::InMemoryTestRepositories;

    #[tokio::test]
    async fn forward_progression_scenario() {
        let repos = InMemoryTestRepositories::new();
        let config = WorkflowConfig::default();

        let task = repos
            .tasks()
            .create(NewTask {
                title: "T1".into(),
                summary: "s".into(),
                description: None,
                status: Some(Status::new("pending")),
                priority: Priority::Medium,
                complexity: 2,
                project_id: None,
                feature_id: None,
                requires_verification: false,
                tags: Vec::new(),
            })
            .await
            .unwrap();

        let result = request_transition(&repos, &config, task.id, EntityType::Task, "start", None)
            .await
            .unwrap();

        assert!(result.applied);
        assert_eq!(result.previous_status.as_deref(), Some("pending"));
        assert_eq!(result.new_status.as_deref(), Some("in-progress"));
        assert_eq!(result.previous_role, Some(Role::Queue));
        assert_eq!(result.new_role, Some(Role::Work));
    }

    #[tokio::test]
    async fn skip_ahead_is_rejected() {
        let repos = InMemoryTestRepositories::new();
        let mut config = WorkflowConfig::default();
        // No status_roles configured in the default; add them so the
        // role comparisons in this scenario are exercised too.
        config.status_roles.insert(
            "task".into(),
            [
                ("pending".to_string(), "queue".to_string()),
                ("in-progress".to_string(), "work".to_string()),
                ("completed".to_string(), "terminal".to_string()),
            ]
            .into_iter()
            .collect(),
        );

        let task = repos
            .tasks()
            .create(NewTask {
                title: "T1".into(),
                summary: "s".into(),
                description: None,
                status: Some(Status::new("pending")),
                priority: Priority::Medium,
                complexity: 2,
                project_id: None,
                feature_id: None,
                requires_verification: false,
                tags: Vec::new(),
            })
            .await
            .unwrap();

        // "completed" is a literal status name, so it is targeted
        // directly instead of falling through to get_next_status — and
        // validate_transition then rejects the skip.
        let result = request_transition(&repos, &config, task.id, EntityType::Task, "completed", None)
            .await
            .unwrap();

        assert!(!result.applied);
        let error = result.error.expect("expected a validation error");
        assert_eq!(error.code, "VALIDATION_ERROR");
        assert_eq!(error.suggestions, vec!["in-progress".to_string()]);
    }
}
