use uuid::Uuid;

use crate::{models::EntityType, repository::Repositories};

/// Result of a feature-terminal cleanup pass (§4.8), attached to the
/// `AppliedCascade` record that triggered it. Failure is logged and
/// reported, never unwinds the cascade — so this returns a value, not
/// a `Result`.
#[derive(Debug, Clone)]
pub struct CleanupSummary {
    pub performed: bool,
    pub tasks_deleted: u64,
    pub tasks_retained: u64,
    pub retained_task_ids: Vec<Uuid>,
    pub sections_deleted: u64,
    pub dependencies_deleted: u64,
    pub reason: String,
}

impl CleanupSummary {
    fn failed(reason: impl Into<String>) -> Self {
        Self {
            performed: false,
            tasks_deleted: 0,
            tasks_retained: 0,
            retained_task_ids: Vec::new(),
            sections_deleted: 0,
            dependencies_deleted: 0,
            reason: reason.into(),
        }
    }
}

/// Default policy: retain completed tasks, delete cancelled tasks and
/// their sections/dependencies.
pub async fn run_cleanup<R: Repositories>(repos: &R, feature_id: Uuid) -> CleanupSummary {
    let tasks = match repos.tasks().find_by_feature(feature_id).await {
        Ok(tasks) => tasks,
        Err(err) => {
            tracing::warn!(feature_id = %feature_id, error = %err, "completion cleanup: failed to list child tasks");
            return CleanupSummary::failed(format!("failed to list child tasks: {err}"));
        }
    };

    let mut retained_task_ids = Vec::new();
    let mut tasks_deleted = 0u64;
    let mut sections_deleted = 0u64;
    let mut dependencies_deleted = 0u64;

    for task in &tasks {
        if task.status.as_str() == "cancelled" {
            if let Err(err) = repos
                .sections()
                .delete_by_entity(EntityType::Task, task.id)
                .await
            {
                tracing::warn!(task_id = %task.id, error = %err, "completion cleanup: failed to delete sections");
            } else {
                sections_deleted += 1;
            }

            if let Err(err) = repos.dependencies().delete_by_task_id(task.id).await {
                tracing::warn!(task_id = %task.id, error = %err, "completion cleanup: failed to delete dependencies");
            } else {
                dependencies_deleted += 1;
            }

            match repos.tasks().delete(task.id).await {
                Ok(()) => tasks_deleted += 1,
                Err(err) => {
                    tracing::warn!(task_id = %task.id, error = %err, "completion cleanup: failed to delete task");
                }
            }
        } else {
            retained_task_ids.push(task.id);
        }
    }

    CleanupSummary {
        performed: true,
        tasks_deleted,
        tasks_retained: retained_task_ids.len() as u64,
        retained_task_ids,
        sections_deleted,
        dependencies_deleted,
        reason: "retained completed tasks, deleted cancelled tasks".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewTask, Priority, Status};
    use crate::test_support::InMemoryTestRepositories;

    #[tokio::test]
    async fn retains_completed_and_deletes_cancelled() {
        let repos = InMemoryTestRepositories::new();
        let feature_id = Uuid::new_v4();

        let completed = repos
            .tasks()
            .create(NewTask {
                title: "done".into(),
                summary: "s".into(),
                description: None,
                status: Some(Status::new("completed")),
                priority: Priority::Medium,
                complexity: 2,
                project_id: None,
                feature_id: Some(feature_id),
                requires_verification: false,
                tags: Vec::new(),
            })
            .await
            .unwrap();

        let cancelled = repos
            .tasks()
            .create(NewTask {
                title: "cancelled".into(),
                summary: "s".into(),
                description: None,
                status: Some(Status::new("cancelled")),
                priority: Priority::Medium,
                complexity: 2,
                project_id: None,
                feature_id: Some(feature_id),
                requires_verification: false,
                tags: Vec::new(),
            })
            .await
            .unwrap();

        let summary = run_cleanup(&repos, feature_id).await;
        assert!(summary.performed);
        assert_eq!(summary.tasks_deleted, 1);
        assert_eq!(summary.tasks_retained, 1);
        assert_eq!(summary.retained_task_ids, vec![completed.id]);
        assert!(repos.tasks().get_by_id(cancelled.id).await.unwrap().is_none());
    }
}
