//! Read-only helper operations: `get_next_task` and `get_blocked_tasks`
//! (§6). Both reason about literal `completed`/`cancelled` statuses
//! rather than the configured terminal set, since they describe a
//! concrete queueing policy independent of any one workflow's flows.

use uuid::Uuid;

use crate::{error::Result, models::Task, repository::Repositories};

fn is_resolved(status: &str) -> bool {
    matches!(status, "completed" | "cancelled")
}

async fn has_incomplete_inbound_blocker<R: Repositories>(repos: &R, task_id: Uuid) -> Result<bool> {
    let inbound = repos.dependencies().find_by_to_task_id(task_id).await?;
    for edge in inbound.iter().filter(|d| d.dependency_type.is_blocking()) {
        match repos.tasks().get_by_id(edge.from_task_id).await? {
            Some(source) if !is_resolved(source.status.as_str()) => return Ok(true),
            Some(_) => {}
            None => {
                tracing::warn!(task_id = %edge.from_task_id, "blocking source not found, treating as unresolved");
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Candidate tasks for `get_next_task`, ordered by priority then
/// ascending complexity, with any task carrying an incomplete inbound
/// blocker filtered out.
pub async fn get_next_task<R: Repositories>(
    repos: &R,
    project_id: Option<Uuid>,
    feature_id: Option<Uuid>,
    limit: u32,
) -> Result<Vec<Task>> {
    let candidates = match (project_id, feature_id) {
        (_, Some(feature_id)) => repos.tasks().find_by_feature(feature_id).await?,
        (Some(project_id), None) => repos.tasks().find_by_project(project_id).await?,
        (None, None) => {
            repos
                .tasks()
                .find_by_filters(crate::models::EntityFilter::default())
                .await?
        }
    };

    let mut eligible = Vec::new();
    for task in candidates {
        if is_resolved(task.status.as_str()) {
            continue;
        }
        if has_incomplete_inbound_blocker(repos, task.id).await? {
            continue;
        }
        eligible.push(task);
    }

    eligible.sort_by(|a, b| {
        a.priority
            .sort_weight()
            .cmp(&b.priority.sort_weight())
            .then(a.complexity.cmp(&b.complexity))
    });
    eligible.truncate(limit as usize);
    Ok(eligible)
}

/// Tasks with at least one incomplete inbound blocking edge.
pub async fn get_blocked_tasks<R: Repositories>(
    repos: &R,
    project_id: Option<Uuid>,
    feature_id: Option<Uuid>,
) -> Result<Vec<Task>> {
    let candidates = match (project_id, feature_id) {
        (_, Some(feature_id)) => repos.tasks().find_by_feature(feature_id).await?,
        (Some(project_id), None) => repos.tasks().find_by_project(project_id).await?,
        (None, None) => {
            repos
                .tasks()
                .find_by_filters(crate::models::EntityFilter::default())
                .await?
        }
    };

    let mut blocked = Vec::new();
    for task in candidates {
        if has_incomplete_inbound_blocker(repos, task.id).await? {
            blocked.push(task);
        }
    }
    Ok(blocked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dependency, DependencyType, NewTask, Priority, Status};
    use crate::test_support::InMemoryTestRepositories;

    async fn make_task<R: Repositories>(repos: &R, title: &str, priority: Priority, complexity: u8) -> Uuid {
        let task = repos
            .tasks()
            .create(NewTask {
                title: title.to_string(),
                summary: "summary".into(),
                description: None,
                status: None,
                priority,
                complexity,
                project_id: None,
                feature_id: None,
                requires_verification: false,
                tags: Vec::new(),
            })
            .await
            .unwrap();
        task.id
    }

    #[tokio::test]
    async fn orders_by_priority_then_complexity() {
        let repos = InMemoryTestRepositories::new();
        make_task(&repos, "low complex", Priority::Low, 2).await;
        let high = make_task(&repos, "high simple", Priority::High, 1).await;
        make_task(&repos, "medium", Priority::Medium, 5).await;

        let next = get_next_task(&repos, None, None, 1).await.unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].id, high);
    }

    #[tokio::test]
    async fn excludes_task_with_incomplete_blocker() {
        let repos = InMemoryTestRepositories::new();
        let blocker = make_task(&repos, "blocker", Priority::High, 1).await;
        let blocked = make_task(&repos, "blocked", Priority::High, 1).await;

        repos
            .dependencies()
            .create(Dependency {
                id: Uuid::new_v4(),
                from_task_id: blocker,
                to_task_id: blocked,
                dependency_type: DependencyType::Blocks,
                unblock_at: None,
            })
            .await
            .unwrap();

        let next = get_next_task(&repos, None, None, 10).await.unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].id, blocker);

        let blocked_tasks = get_blocked_tasks(&repos, None, None).await.unwrap();
        assert_eq!(blocked_tasks.len(), 1);
        assert_eq!(blocked_tasks[0].id, blocked);
    }

    #[tokio::test]
    async fn resolved_blocker_stops_blocking() {
        let repos = InMemoryTestRepositories::new();
        let blocker = make_task(&repos, "blocker", Priority::High, 1).await;
        let blocked = make_task(&repos, "blocked", Priority::High, 1).await;

        repos
            .dependencies()
            .create(Dependency {
                id: Uuid::new_v4(),
                from_task_id: blocker,
                to_task_id: blocked,
                dependency_type: DependencyType::Blocks,
                unblock_at: None,
            })
            .await
            .unwrap();

        repos.tasks().set_status(blocker, Status::new("completed")).await.unwrap();

        let blocked_tasks = get_blocked_tasks(&repos, None, None).await.unwrap();
        assert!(blocked_tasks.is_empty());
    }
}
