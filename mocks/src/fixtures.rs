//! Pre-built test data for scenarios exercised across the protocol and
//! server crates' integration tests.

use uuid::Uuid;

use orchestrator_core::models::{Dependency, DependencyType, Feature, NewTask, Priority, Project, Status};

use crate::builders::{FeatureBuilder, ProjectBuilder, TaskBuilder};

/// A project with a default name and `pending` status.
pub fn test_project() -> Project {
    ProjectBuilder::new().build()
}

/// A feature belonging to `project_id`.
pub fn test_feature(project_id: Uuid) -> Feature {
    FeatureBuilder::new().with_project(project_id).build()
}

/// A task belonging to `feature_id`.
pub fn test_task(feature_id: Uuid) -> NewTask {
    TaskBuilder::new().with_feature(feature_id).build()
}

/// A task in each of the conventional default-flow statuses, useful for
/// exercising `get_task_counts_by_feature_id` and `get_next_task`.
pub fn tasks_in_all_statuses(feature_id: Uuid) -> Vec<NewTask> {
    ["pending", "in-progress", "testing", "completed", "cancelled"]
        .into_iter()
        .enumerate()
        .map(|(i, status)| {
            TaskBuilder::new()
                .with_title(format!("task-{i}-{status}"))
                .with_feature(feature_id)
                .with_status(Status::new(status))
                .build()
        })
        .collect()
}

/// A blocking edge: `blocker` must reach `unblock_at`'s role before
/// `blocked` is considered unblocked.
pub fn blocking_dependency(blocker: Uuid, blocked: Uuid) -> Dependency {
    Dependency {
        id: Uuid::new_v4(),
        from_task_id: blocker,
        to_task_id: blocked,
        dependency_type: DependencyType::Blocks,
        unblock_at: None,
    }
}

/// A collection of tasks at mixed priorities, useful for exercising
/// `get_next_task`'s priority-then-complexity ordering.
pub fn tasks_with_mixed_priority(feature_id: Uuid) -> Vec<NewTask> {
    vec![
        TaskBuilder::new()
            .with_title("low priority, simple")
            .with_feature(feature_id)
            .with_priority(Priority::Low)
            .with_complexity(1)
            .build(),
        TaskBuilder::new()
            .with_title("high priority, complex")
            .with_feature(feature_id)
            .with_priority(Priority::High)
            .with_complexity(8)
            .build(),
        TaskBuilder::new()
            .with_title("medium priority")
            .with_feature(feature_id)
            .with_priority(Priority::Medium)
            .with_complexity(4)
            .build(),
    ]
}
