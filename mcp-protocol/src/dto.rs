//! JSON wire shapes for the core types that deliberately do not derive
//! `Serialize` themselves (§9: the engine stays transport-agnostic).
//! This module owns the mapping from domain result to response payload.

use serde_json::{json, Value};

use orchestrator_core::cascade::AppliedCascade;
use orchestrator_core::completion::CleanupSummary;
use orchestrator_core::dependency::UnblockedTask;
use orchestrator_core::transition::{
    BatchSummary, CascadeOutcome, NextStatusRecommendation, TransitionResult,
};

pub fn cleanup_summary_json(summary: &CleanupSummary) -> Value {
    json!({
        "performed": summary.performed,
        "tasksDeleted": summary.tasks_deleted,
        "tasksRetained": summary.tasks_retained,
        "retainedTaskIds": summary.retained_task_ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "sectionsDeleted": summary.sections_deleted,
        "dependenciesDeleted": summary.dependencies_deleted,
        "reason": summary.reason,
    })
}

pub fn applied_cascade_json(cascade: &AppliedCascade) -> Value {
    json!({
        "event": cascade.event,
        "targetType": cascade.target_type.to_string(),
        "targetId": cascade.target_id.to_string(),
        "targetName": cascade.target_name,
        "previousStatus": cascade.previous_status,
        "newStatus": cascade.new_status,
        "applied": cascade.applied,
        "reason": cascade.reason,
        "error": cascade.error,
        "cleanup": cascade.cleanup.as_ref().map(cleanup_summary_json),
        "childCascades": cascade.child_cascades.iter().map(applied_cascade_json).collect::<Vec<_>>(),
    })
}

pub fn cascade_outcome_json(outcome: &CascadeOutcome) -> Value {
    json!({
        "event": outcome.event,
        "targetType": outcome.target_type.to_string(),
        "targetId": outcome.target_id.to_string(),
        "previousStatus": outcome.previous_status,
        "suggestedStatus": outcome.suggested_status,
        "applied": outcome.applied,
        "automatic": outcome.automatic,
        "reason": outcome.reason,
        "error": outcome.error,
        "cleanup": outcome.cleanup.as_ref().map(cleanup_summary_json),
        "childCascades": outcome.child_cascades.iter().map(cascade_outcome_json).collect::<Vec<_>>(),
    })
}

pub fn unblocked_task_json(task: &UnblockedTask) -> Value {
    json!({ "taskId": task.task_id.to_string(), "title": task.title })
}

pub fn transition_result_json(result: &TransitionResult) -> Value {
    json!({
        "applied": result.applied,
        "message": result.message,
        "previousStatus": result.previous_status,
        "newStatus": result.new_status,
        "previousRole": result.previous_role.map(|r| r.to_string()),
        "newRole": result.new_role.map(|r| r.to_string()),
        "cascadeEvents": result.cascade_events.iter().map(cascade_outcome_json).collect::<Vec<_>>(),
        "unblockedTasks": result.unblocked_tasks.iter().map(unblocked_task_json).collect::<Vec<_>>(),
    })
}

pub fn batch_summary_json(summary: &BatchSummary) -> Value {
    json!({
        "total": summary.total,
        "succeeded": summary.succeeded,
        "failed": summary.failed,
        "cascadesApplied": summary.cascades_applied,
    })
}

pub fn next_status_json(recommendation: &NextStatusRecommendation) -> Value {
    match recommendation {
        NextStatusRecommendation::Ready {
            recommended_status,
            active_flow,
            flow_sequence,
            current_position,
            reason,
            current_role,
            next_role,
        } => json!({
            "kind": "ready",
            "recommendedStatus": recommended_status,
            "activeFlow": active_flow,
            "flowSequence": flow_sequence,
            "currentPosition": current_position,
            "reason": reason,
            "currentRole": current_role.map(|r| r.to_string()),
            "nextRole": next_role.map(|r| r.to_string()),
        }),
        NextStatusRecommendation::Blocked {
            current_status,
            blockers,
            active_flow,
            flow_sequence,
            current_position,
        } => json!({
            "kind": "blocked",
            "currentStatus": current_status,
            "blockers": blockers,
            "activeFlow": active_flow,
            "flowSequence": flow_sequence,
            "currentPosition": current_position,
        }),
        NextStatusRecommendation::Terminal {
            terminal_status,
            active_flow,
            reason,
        } => json!({
            "kind": "terminal",
            "terminalStatus": terminal_status,
            "activeFlow": active_flow,
            "reason": reason,
        }),
    }
}
