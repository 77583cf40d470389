use uuid::Uuid;

use crate::{
    completion,
    config::WorkflowConfig,
    error::{OrchestratorError, Result},
    models::EntityType,
    repository::Repositories,
    validation::{validate_prerequisites, validate_transition, PrerequisiteContext, ValidationOutcome},
};

#[derive(Debug, Clone)]
pub struct CascadeEvent {
    pub event: &'static str,
    pub target_type: EntityType,
    pub target_id: Uuid,
    pub target_current_status: String,
    pub suggested_status: String,
    pub active_flow: String,
    pub reason: String,
}

/// Result of one `apply_cascades` step (§4.4.2); `child_cascades` holds
/// whatever the recursive call one level down produced.
#[derive(Debug, Clone)]
pub struct AppliedCascade {
    pub event: &'static str,
    pub target_type: EntityType,
    pub target_id: Uuid,
    pub target_name: String,
    pub previous_status: String,
    pub new_status: String,
    pub applied: bool,
    pub reason: String,
    pub error: Option<String>,
    pub cleanup: Option<completion::CleanupSummary>,
    pub child_cascades: Vec<AppliedCascade>,
}

fn pick_terminal_status(progression: &crate::config::ProgressionSpec) -> Option<String> {
    progression
        .terminal_statuses
        .iter()
        .find(|s| s.as_str() == "completed")
        .or_else(|| progression.terminal_statuses.first())
        .cloned()
}

/// Raw event detection, no mutation. `previous_status` is the status
/// `entity_id` held immediately before the transition that triggered
/// this scan — needed for `first_task_started`'s "every sibling was
/// previously pending" predicate (§9 Open Question 2), which this
/// module checks against that snapshot rather than re-deriving it from
/// current repository state.
pub async fn detect_cascade_events<R: Repositories>(
    repos: &R,
    config: &WorkflowConfig,
    entity_type: EntityType,
    entity_id: Uuid,
    previous_status: &str,
) -> Result<Vec<CascadeEvent>> {
    match entity_type {
        EntityType::Task => detect_task_cascades(repos, config, entity_id, previous_status).await,
        EntityType::Feature => detect_feature_cascades(repos, config, entity_id).await,
        EntityType::Project => Ok(Vec::new()),
    }
}

async fn detect_task_cascades<R: Repositories>(
    repos: &R,
    config: &WorkflowConfig,
    task_id: Uuid,
    previous_status: &str,
) -> Result<Vec<CascadeEvent>> {
    let task = repos
        .tasks()
        .get_by_id(task_id)
        .await?
        .ok_or_else(|| OrchestratorError::not_found_kind("task", task_id))?;

    let Some(feature_id) = task.feature_id else {
        return Ok(Vec::new());
    };

    let feature = match repos.features().get_by_id(feature_id).await? {
        Some(f) => f,
        None => return Ok(Vec::new()),
    };

    let siblings = repos.tasks().find_by_feature(feature_id).await?;
    let task_progression = config.progression_for(EntityType::Task);
    let feature_progression = config.progression_for(EntityType::Feature);

    let mut events = Vec::new();

    let other_siblings_all_pending = siblings
        .iter()
        .filter(|s| s.id != task_id)
        .all(|s| s.status.as_str() == "pending");
    let this_started = previous_status == "pending"
        && task.status.as_str() != "pending"
        && !task_progression.is_terminal(task.status.as_str());

    if this_started && other_siblings_all_pending && feature.status.as_str() == "planning" {
        let (flow_name, _) = feature_progression.active_flow(&feature.tags);
        events.push(CascadeEvent {
            event: "first_task_started",
            target_type: EntityType::Feature,
            target_id: feature_id,
            target_current_status: feature.status.to_string(),
            suggested_status: "in-development".to_string(),
            active_flow: flow_name.to_string(),
            reason: "First child task started work".to_string(),
        });
    }

    let all_tasks_complete = !siblings.is_empty()
        && siblings
            .iter()
            .all(|s| task_progression.is_terminal(s.status.as_str()));

    if all_tasks_complete && !feature_progression.is_terminal(feature.status.as_str()) {
        if let Some(terminal) = pick_terminal_status(feature_progression) {
            let (flow_name, _) = feature_progression.active_flow(&feature.tags);
            events.push(CascadeEvent {
                event: "all_tasks_complete",
                target_type: EntityType::Feature,
                target_id: feature_id,
                target_current_status: feature.status.to_string(),
                suggested_status: terminal,
                active_flow: flow_name.to_string(),
                reason: "All child tasks reached a terminal status".to_string(),
            });
        }
    }

    Ok(events)
}

async fn detect_feature_cascades<R: Repositories>(
    repos: &R,
    config: &WorkflowConfig,
    feature_id: Uuid,
) -> Result<Vec<CascadeEvent>> {
    let feature = repos
        .features()
        .get_by_id(feature_id)
        .await?
        .ok_or_else(|| OrchestratorError::not_found_kind("feature", feature_id))?;

    let Some(project_id) = feature.project_id else {
        return Ok(Vec::new());
    };
    let project = match repos.projects().get_by_id(project_id).await? {
        Some(p) => p,
        None => return Ok(Vec::new()),
    };

    let siblings = repos.features().find_by_project(project_id).await?;
    let feature_progression = config.progression_for(EntityType::Feature);
    let project_progression = config.progression_for(EntityType::Project);

    let all_complete = !siblings.is_empty()
        && siblings
            .iter()
            .all(|f| feature_progression.is_terminal(f.status.as_str()));

    if all_complete && !project_progression.is_terminal(project.status.as_str()) {
        if let Some(terminal) = pick_terminal_status(project_progression) {
            let (flow_name, _) = project_progression.active_flow(&project.tags);
            return Ok(vec![CascadeEvent {
                event: "all_features_complete",
                target_type: EntityType::Project,
                target_id: project_id,
                target_current_status: project.status.to_string(),
                suggested_status: terminal,
                active_flow: flow_name.to_string(),
                reason: "All child features reached a terminal status".to_string(),
            }]);
        }
    }

    Ok(Vec::new())
}

async fn prerequisite_context_for<R: Repositories>(
    repos: &R,
    target_type: EntityType,
    target_id: Uuid,
) -> Result<PrerequisiteContext> {
    match target_type {
        EntityType::Feature => {
            let tasks = repos.tasks().find_by_feature(target_id).await?;
            Ok(PrerequisiteContext {
                child_task_statuses: tasks.into_iter().map(|t| t.status.to_string()).collect(),
                ..Default::default()
            })
        }
        EntityType::Project => {
            let features = repos.features().find_by_project(target_id).await?;
            Ok(PrerequisiteContext {
                child_feature_statuses: features
                    .into_iter()
                    .map(|f| f.status.to_string())
                    .collect(),
                ..Default::default()
            })
        }
        EntityType::Task => Ok(PrerequisiteContext::default()),
    }
}

type CascadeFuture<'a> = std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<AppliedCascade>>> + Send + 'a>>;

/// Applies detected events recursively, bounded by `max_depth` (§4.4.2-4).
/// Implemented as a bounded recursive function rather than an explicit
/// heap-allocated work list, since the chain length is small
/// (task→feature→project) and the bound is checked before each
/// recursive call (§4.4.4). Manually boxed because async fns cannot
/// recurse directly (the compiler cannot size a self-referential
/// future).
pub fn apply_cascades<'a, R: Repositories>(
    repos: &'a R,
    config: &'a WorkflowConfig,
    entity_type: EntityType,
    entity_id: Uuid,
    previous_status: &'a str,
    depth: u32,
    max_depth: u32,
) -> CascadeFuture<'a> {
    Box::pin(apply_cascades_inner(
        repos,
        config,
        entity_type,
        entity_id,
        previous_status,
        depth,
        max_depth,
    ))
}

async fn apply_cascades_inner<R: Repositories>(
    repos: &R,
    config: &WorkflowConfig,
    entity_type: EntityType,
    entity_id: Uuid,
    previous_status: &str,
    depth: u32,
    max_depth: u32,
) -> Result<Vec<AppliedCascade>> {
    let events = detect_cascade_events(repos, config, entity_type, entity_id, previous_status).await?;
    let mut applied = Vec::with_capacity(events.len());

    for event in events {
        if event.target_current_status == event.suggested_status {
            continue;
        }

        let (name, tags) = match event.target_type {
            EntityType::Feature => {
                let f = repos.features().get_by_id(event.target_id).await?;
                (f.as_ref().map(|f| f.name.clone()), f.map(|f| f.tags).unwrap_or_default())
            }
            EntityType::Project => {
                let p = repos.projects().get_by_id(event.target_id).await?;
                (p.as_ref().map(|p| p.name.clone()), p.map(|p| p.tags).unwrap_or_default())
            }
            EntityType::Task => (None, Vec::new()),
        };
        let target_name = name.unwrap_or_default();

        let ctx = prerequisite_context_for(repos, event.target_type, event.target_id).await?;
        let transition_outcome = validate_transition(
            config,
            &event.target_current_status,
            &event.suggested_status,
            event.target_type,
            &tags,
        );
        let outcome = match transition_outcome {
            ValidationOutcome::Invalid { .. } => transition_outcome,
            _ => {
                if config.status_validation.validate_prerequisites {
                    validate_prerequisites(event.target_type, &event.suggested_status, &ctx)
                } else {
                    transition_outcome
                }
            }
        };

        if let ValidationOutcome::Invalid { reason, .. } = outcome {
            applied.push(AppliedCascade {
                event: event.event,
                target_type: event.target_type,
                target_id: event.target_id,
                target_name,
                previous_status: event.target_current_status.clone(),
                new_status: event.suggested_status.clone(),
                applied: false,
                reason: event.reason.clone(),
                error: Some(reason),
                cleanup: None,
                child_cascades: Vec::new(),
            });
            continue;
        }

        let status = crate::models::Status::new(&event.suggested_status);
        match event.target_type {
            EntityType::Feature => {
                repos.features().set_status(event.target_id, status).await?;
            }
            EntityType::Project => {
                repos.projects().set_status(event.target_id, status).await?;
            }
            EntityType::Task => {}
        }

        let mut cleanup = None;
        let target_progression = config.progression_for(event.target_type);
        if target_progression.is_terminal(&event.suggested_status) && event.target_type == EntityType::Feature {
            cleanup = Some(completion::run_cleanup(repos, event.target_id).await);
        }

        let mut record = AppliedCascade {
            event: event.event,
            target_type: event.target_type,
            target_id: event.target_id,
            target_name,
            previous_status: event.target_current_status.clone(),
            new_status: event.suggested_status.clone(),
            applied: true,
            reason: event.reason.clone(),
            error: None,
            cleanup,
            child_cascades: Vec::new(),
        };

        if depth + 1 < max_depth {
            record.child_cascades = apply_cascades(
                repos,
                config,
                event.target_type,
                event.target_id,
                &event.target_current_status,
                depth + 1,
                max_depth,
            )
            .await?;
        }

        applied.push(record);
    }

    Ok(applied)
}
