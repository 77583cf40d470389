use uuid::Uuid;

use crate::{config::WorkflowConfig, error::Result, models::EntityType, repository::Repositories};

/// A downstream task newly unblocked by a completion (§4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnblockedTask {
    pub task_id: Uuid,
    pub title: String,
}

/// `U(A)`: given a task that just reached a terminal status, the set of
/// tasks it blocks directly whose every inbound blocking edge now
/// points at a terminal task. Edges from an unresolvable source are
/// treated conservatively as "still blocking"; an unresolvable target
/// task is treated as "resolved" (and logged).
pub async fn newly_unblocked<R: Repositories>(
    repos: &R,
    config: &WorkflowConfig,
    task_id: Uuid,
) -> Result<Vec<UnblockedTask>> {
    let progression = config.progression_for(EntityType::Task);
    let outgoing = repos.dependencies().find_by_from_task_id(task_id).await?;

    let mut unblocked = Vec::new();

    for edge in outgoing.iter().filter(|d| d.dependency_type.is_blocking()) {
        let candidate_id = edge.to_task_id;
        let candidate = match repos.tasks().get_by_id(candidate_id).await? {
            Some(task) => task,
            None => {
                tracing::warn!(task_id = %candidate_id, "dependency target not found, treating as resolved");
                continue;
            }
        };

        if progression.is_terminal(candidate.status.as_str()) {
            continue;
        }

        let inbound = repos.dependencies().find_by_to_task_id(candidate_id).await?;
        let mut all_sources_terminal = true;
        for inbound_edge in inbound.iter().filter(|d| d.dependency_type.is_blocking()) {
            match repos.tasks().get_by_id(inbound_edge.from_task_id).await? {
                Some(source) => {
                    if !progression.is_terminal(source.status.as_str()) {
                        all_sources_terminal = false;
                        break;
                    }
                }
                None => {
                    // Source is unknown; conservatively treat the edge as
                    // still blocking.
                    all_sources_terminal = false;
                    break;
                }
            }
        }

        if all_sources_terminal {
            unblocked.push(UnblockedTask {
                task_id: candidate.id,
                title: candidate.title,
            });
        }
    }

    Ok(unblocked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dependency, DependencyType, NewTask, Priority};

    async fn make_task<R: Repositories>(repos: &R, title: &str) -> Uuid {
        let task = repos
            .tasks()
            .create(NewTask {
                title: title.to_string(),
                summary: "summary".into(),
                description: None,
                status: None,
                priority: Priority::Medium,
                complexity: 3,
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
    async fn unblocks_task_once_all_blockers_terminal() {
        use crate::test_support::InMemoryTestRepositories;

        let repos = InMemoryTestRepositories::new();
        let a = make_task(&repos, "A").await;
        let b = make_task(&repos, "B").await;

        repos
            .dependencies()
            .create(Dependency {
                id: Uuid::new_v4(),
                from_task_id: a,
                to_task_id: b,
                dependency_type: DependencyType::Blocks,
                unblock_at: None,
            })
            .await
            .unwrap();

        repos
            .tasks()
            .set_status(a, crate::models::Status::new("completed"))
            .await
            .unwrap();

        let config = WorkflowConfig::default();
        let result = newly_unblocked(&repos, &config, a).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].task_id, b);
    }
}
