use async_trait::async_trait;
use orchestrator_core::error::{OrchestratorError, Result};
use orchestrator_core::models::{
    Dependency, EntityFilter, EntityType, Feature, NewTask, Project, RoleTransition, Section,
    Status, Task, TaskCounts, Template, UpdateTask,
};
use orchestrator_core::repository::{
    DependencyRepository, FeatureRepository, ProjectRepository, Repositories,
    RoleTransitionRepository, SectionRepository, TaskRepository, TemplateRepository,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::common::now;

/// A production in-process store, for embedding the orchestrator in a
/// single process without a SQLite file (small fleets, tests driven
/// through the real MCP layer). No call-history or error-injection —
/// see the `orchestrator-mocks` crate for that.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProjects(Arc<Mutex<HashMap<Uuid, Project>>>);

#[derive(Debug, Clone, Default)]
pub struct InMemoryFeatures(Arc<Mutex<HashMap<Uuid, Feature>>>);

#[derive(Debug, Clone, Default)]
pub struct InMemoryTasks(Arc<Mutex<HashMap<Uuid, Task>>>);

#[derive(Debug, Clone, Default)]
pub struct InMemorySections(Arc<Mutex<HashMap<Uuid, Section>>>);

#[derive(Debug, Clone, Default)]
pub struct InMemoryDependencies(Arc<Mutex<HashMap<Uuid, Dependency>>>);

#[derive(Debug, Clone, Default)]
pub struct InMemoryRoleTransitions(Arc<Mutex<Vec<RoleTransition>>>);

#[derive(Debug, Clone, Default)]
pub struct InMemoryTemplates(Arc<Mutex<HashMap<Uuid, Template>>>);

#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    projects: InMemoryProjects,
    features: InMemoryFeatures,
    tasks: InMemoryTasks,
    sections: InMemorySections,
    dependencies: InMemoryDependencies,
    role_transitions: InMemoryRoleTransitions,
    templates: InMemoryTemplates,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Repositories for InMemoryRepository {
    type Projects = InMemoryProjects;
    type Features = InMemoryFeatures;
    type Tasks = InMemoryTasks;
    type Sections = InMemorySections;
    type Dependencies = InMemoryDependencies;
    type RoleTransitions = InMemoryRoleTransitions;
    type Templates = InMemoryTemplates;

    fn projects(&self) -> &Self::Projects {
        &self.projects
    }
    fn features(&self) -> &Self::Features {
        &self.features
    }
    fn tasks(&self) -> &Self::Tasks {
        &self.tasks
    }
    fn sections(&self) -> &Self::Sections {
        &self.sections
    }
    fn dependencies(&self) -> &Self::Dependencies {
        &self.dependencies
    }
    fn role_transitions(&self) -> &Self::RoleTransitions {
        &self.role_transitions
    }
    fn templates(&self) -> &Self::Templates {
        &self.templates
    }
}

fn matches_status(status: &Status, filter: &Option<Status>) -> bool {
    filter.as_ref().map(|f| f.as_str() == status.as_str()).unwrap_or(true)
}

#[async_trait]
impl ProjectRepository for InMemoryProjects {
    async fn create(&self, project: Project) -> Result<Project> {
        if project.name.trim().is_empty() {
            return Err(OrchestratorError::empty_field("name"));
        }
        let mut store = self.0.lock();
        if store.contains_key(&project.id) {
            return Err(OrchestratorError::Conflict(format!(
                "project '{}' already exists",
                project.id
            )));
        }
        store.insert(project.id, project.clone());
        Ok(project)
    }

    async fn update(&self, id: Uuid, updates: UpdateTask) -> Result<Project> {
        let mut store = self.0.lock();
        let project = store
            .get_mut(&id)
            .ok_or_else(|| OrchestratorError::not_found_kind("project", id))?;
        if let Some(title) = updates.title {
            project.name = title;
        }
        if let Some(summary) = updates.summary {
            project.summary = summary;
        }
        if updates.description.is_some() {
            project.description = updates.description;
        }
        if let Some(tags) = updates.tags {
            project.tags = tags;
        }
        project.modified_at = now();
        Ok(project.clone())
    }

    async fn set_status(&self, id: Uuid, status: Status) -> Result<Project> {
        let mut store = self.0.lock();
        let project = store
            .get_mut(&id)
            .ok_or_else(|| OrchestratorError::not_found_kind("project", id))?;
        project.status = status;
        project.modified_at = now();
        Ok(project.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.0.lock().remove(&id);
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Project>> {
        Ok(self.0.lock().get(&id).cloned())
    }

    async fn find_by_filters(&self, filter: EntityFilter) -> Result<Vec<Project>> {
        let store = self.0.lock();
        let mut results: Vec<Project> = store
            .values()
            .filter(|p| matches_status(&p.status, &filter.status))
            .cloned()
            .collect();
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            results.truncate(limit as usize);
        }
        Ok(results)
    }
}

#[async_trait]
impl FeatureRepository for InMemoryFeatures {
    async fn create(&self, feature: Feature) -> Result<Feature> {
        if feature.name.trim().is_empty() {
            return Err(OrchestratorError::empty_field("name"));
        }
        let mut store = self.0.lock();
        if store.contains_key(&feature.id) {
            return Err(OrchestratorError::Conflict(format!(
                "feature '{}' already exists",
                feature.id
            )));
        }
        store.insert(feature.id, feature.clone());
        Ok(feature)
    }

    async fn update(&self, id: Uuid, updates: UpdateTask) -> Result<Feature> {
        let mut store = self.0.lock();
        let feature = store
            .get_mut(&id)
            .ok_or_else(|| OrchestratorError::not_found_kind("feature", id))?;
        if let Some(title) = updates.title {
            feature.name = title;
        }
        if let Some(summary) = updates.summary {
            feature.summary = summary;
        }
        if updates.description.is_some() {
            feature.description = updates.description;
        }
        if let Some(priority) = updates.priority {
            feature.priority = priority;
        }
        if let Some(project_id) = updates.project_id {
            feature.project_id = Some(project_id);
        }
        if let Some(requires_verification) = updates.requires_verification {
            feature.requires_verification = requires_verification;
        }
        if let Some(tags) = updates.tags {
            feature.tags = tags;
        }
        feature.modified_at = now();
        Ok(feature.clone())
    }

    async fn set_status(&self, id: Uuid, status: Status) -> Result<Feature> {
        let mut store = self.0.lock();
        let feature = store
            .get_mut(&id)
            .ok_or_else(|| OrchestratorError::not_found_kind("feature", id))?;
        feature.status = status;
        feature.modified_at = now();
        Ok(feature.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.0.lock().remove(&id);
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Feature>> {
        Ok(self.0.lock().get(&id).cloned())
    }

    async fn find_by_filters(&self, filter: EntityFilter) -> Result<Vec<Feature>> {
        let store = self.0.lock();
        let mut results: Vec<Feature> = store
            .values()
            .filter(|f| matches_status(&f.status, &filter.status))
            .filter(|f| filter.project_id.map(|p| f.project_id == Some(p)).unwrap_or(true))
            .filter(|f| filter.priority.map(|p| f.priority == p).unwrap_or(true))
            .cloned()
            .collect();
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            results.truncate(limit as usize);
        }
        Ok(results)
    }

    async fn find_by_project(&self, project_id: Uuid) -> Result<Vec<Feature>> {
        Ok(self
            .0
            .lock()
            .values()
            .filter(|f| f.project_id == Some(project_id))
            .cloned()
            .collect())
    }

    async fn get_feature_counts_by_project_id(
        &self,
        project_id: Uuid,
    ) -> Result<HashMap<Uuid, TaskCounts>> {
        // The in-memory store has no cross-repository access by design;
        // callers needing real counts should go through `TaskRepository`
        // directly. Returns an empty map rather than faking zeros.
        let _ = project_id;
        Ok(HashMap::new())
    }
}

#[async_trait]
impl TaskRepository for InMemoryTasks {
    async fn create(&self, task: NewTask) -> Result<Task> {
        if task.title.trim().is_empty() {
            return Err(OrchestratorError::empty_field("title"));
        }
        if !(1..=10).contains(&task.complexity) {
            return Err(OrchestratorError::Validation(
                "'complexity' must be between 1 and 10".to_string(),
            ));
        }
        let timestamp = now();
        let created = Task {
            id: Uuid::new_v4(),
            title: task.title,
            summary: task.summary,
            description: task.description,
            status: task.status.unwrap_or_else(|| Status::new("pending")),
            priority: task.priority,
            complexity: task.complexity,
            project_id: task.project_id,
            feature_id: task.feature_id,
            requires_verification: task.requires_verification,
            tags: task.tags,
            created_at: timestamp,
            modified_at: timestamp,
        };
        self.0.lock().insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: Uuid, updates: UpdateTask) -> Result<Task> {
        if let Some(complexity) = updates.complexity {
            if !(1..=10).contains(&complexity) {
                return Err(OrchestratorError::Validation(
                    "'complexity' must be between 1 and 10".to_string(),
                ));
            }
        }
        let mut store = self.0.lock();
        let task = store
            .get_mut(&id)
            .ok_or_else(|| OrchestratorError::not_found_kind("task", id))?;
        if let Some(title) = updates.title {
            task.title = title;
        }
        if let Some(summary) = updates.summary {
            task.summary = summary;
        }
        if updates.description.is_some() {
            task.description = updates.description;
        }
        if let Some(priority) = updates.priority {
            task.priority = priority;
        }
        if let Some(complexity) = updates.complexity {
            task.complexity = complexity;
        }
        if let Some(feature_id) = updates.feature_id {
            task.feature_id = Some(feature_id);
        }
        if let Some(project_id) = updates.project_id {
            task.project_id = Some(project_id);
        }
        if let Some(requires_verification) = updates.requires_verification {
            task.requires_verification = requires_verification;
        }
        if let Some(tags) = updates.tags {
            task.tags = tags;
        }
        task.modified_at = now();
        Ok(task.clone())
    }

    async fn set_status(&self, id: Uuid, status: Status) -> Result<Task> {
        let mut store = self.0.lock();
        let task = store
            .get_mut(&id)
            .ok_or_else(|| OrchestratorError::not_found_kind("task", id))?;
        task.status = status;
        task.modified_at = now();
        Ok(task.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.0.lock().remove(&id);
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Task>> {
        Ok(self.0.lock().get(&id).cloned())
    }

    async fn find_by_filters(&self, filter: EntityFilter) -> Result<Vec<Task>> {
        let store = self.0.lock();
        let mut results: Vec<Task> = store
            .values()
            .filter(|t| matches_status(&t.status, &filter.status))
            .filter(|t| filter.project_id.map(|p| t.project_id == Some(p)).unwrap_or(true))
            .filter(|t| filter.feature_id.map(|f| t.feature_id == Some(f)).unwrap_or(true))
            .filter(|t| filter.priority.map(|p| t.priority == p).unwrap_or(true))
            .filter(|t| {
                filter
                    .text_query
                    .as_ref()
                    .map(|q| {
                        t.title.to_lowercase().contains(&q.to_lowercase())
                            || t.summary.to_lowercase().contains(&q.to_lowercase())
                    })
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            results.truncate(limit as usize);
        }
        Ok(results)
    }

    async fn find_by_feature(&self, feature_id: Uuid) -> Result<Vec<Task>> {
        Ok(self
            .0
            .lock()
            .values()
            .filter(|t| t.feature_id == Some(feature_id))
            .cloned()
            .collect())
    }

    async fn find_by_project(&self, project_id: Uuid) -> Result<Vec<Task>> {
        Ok(self
            .0
            .lock()
            .values()
            .filter(|t| t.project_id == Some(project_id))
            .cloned()
            .collect())
    }

    async fn get_task_counts_by_feature_id(&self, feature_id: Uuid) -> Result<TaskCounts> {
        let store = self.0.lock();
        let mut counts = TaskCounts::default();
        for task in store.values().filter(|t| t.feature_id == Some(feature_id)) {
            counts.total += 1;
            match task.status.as_str() {
                "pending" => counts.pending += 1,
                "in-progress" => counts.in_progress += 1,
                "completed" => counts.completed += 1,
                "cancelled" => counts.cancelled += 1,
                "testing" => counts.testing += 1,
                "blocked" => counts.blocked += 1,
                _ => {}
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl SectionRepository for InMemorySections {
    async fn create(&self, section: Section) -> Result<Section> {
        self.0.lock().insert(section.id, section.clone());
        Ok(section)
    }

    async fn update(&self, id: Uuid, section: Section) -> Result<Section> {
        let mut store = self.0.lock();
        if !store.contains_key(&id) {
            return Err(OrchestratorError::not_found_kind("section", id));
        }
        store.insert(id, section.clone());
        Ok(section)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.0.lock().remove(&id);
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Section>> {
        Ok(self.0.lock().get(&id).cloned())
    }

    async fn find_by_entity(&self, entity_type: EntityType, entity_id: Uuid) -> Result<Vec<Section>> {
        let mut results: Vec<Section> = self
            .0
            .lock()
            .values()
            .filter(|s| s.entity_type == entity_type && s.entity_id == entity_id)
            .cloned()
            .collect();
        results.sort_by_key(|s| s.ordinal);
        Ok(results)
    }

    async fn delete_by_entity(&self, entity_type: EntityType, entity_id: Uuid) -> Result<()> {
        self.0
            .lock()
            .retain(|_, s| !(s.entity_type == entity_type && s.entity_id == entity_id));
        Ok(())
    }
}

#[async_trait]
impl DependencyRepository for InMemoryDependencies {
    async fn create(&self, dependency: Dependency) -> Result<Dependency> {
        self.0.lock().insert(dependency.id, dependency.clone());
        Ok(dependency)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.0.lock().remove(&id);
        Ok(())
    }

    async fn find_by_task_id(&self, task_id: Uuid) -> Result<Vec<Dependency>> {
        Ok(self
            .0
            .lock()
            .values()
            .filter(|d| d.from_task_id == task_id || d.to_task_id == task_id)
            .cloned()
            .collect())
    }

    async fn find_by_to_task_id(&self, task_id: Uuid) -> Result<Vec<Dependency>> {
        Ok(self
            .0
            .lock()
            .values()
            .filter(|d| d.to_task_id == task_id)
            .cloned()
            .collect())
    }

    async fn find_by_from_task_id(&self, task_id: Uuid) -> Result<Vec<Dependency>> {
        Ok(self
            .0
            .lock()
            .values()
            .filter(|d| d.from_task_id == task_id)
            .cloned()
            .collect())
    }

    async fn delete_by_task_id(&self, task_id: Uuid) -> Result<()> {
        self.0
            .lock()
            .retain(|_, d| d.from_task_id != task_id && d.to_task_id != task_id);
        Ok(())
    }
}

#[async_trait]
impl RoleTransitionRepository for InMemoryRoleTransitions {
    async fn create(&self, transition: RoleTransition) -> Result<RoleTransition> {
        self.0.lock().push(transition.clone());
        Ok(transition)
    }

    async fn find_by_entity(&self, entity_id: Uuid) -> Result<Vec<RoleTransition>> {
        Ok(self
            .0
            .lock()
            .iter()
            .filter(|t| t.entity_id == entity_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TemplateRepository for InMemoryTemplates {
    async fn create(&self, template: Template) -> Result<Template> {
        self.0.lock().insert(template.id, template.clone());
        Ok(template)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Template>> {
        Ok(self.0.lock().get(&id).cloned())
    }

    async fn find_by_entity_type(&self, entity_type: EntityType) -> Result<Vec<Template>> {
        Ok(self
            .0
            .lock()
            .values()
            .filter(|t| t.entity_type == entity_type)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use orchestrator_core::models::Priority;

    fn sample_project() -> Project {
        let now = Utc::now();
        Project {
            id: Uuid::new_v4(),
            name: "Roadmap".to_string(),
            summary: "Quarterly roadmap".to_string(),
            description: None,
            status: Status::new("pending"),
            tags: vec![],
            created_at: now,
            modified_at: now,
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let repo = InMemoryProjects::default();
        let project = sample_project();
        let created = repo.create(project.clone()).await.unwrap();
        assert_eq!(created.id, project.id);
        let fetched = repo.get_by_id(project.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Roadmap");
    }

    #[tokio::test]
    async fn create_rejects_duplicate_id() {
        let repo = InMemoryProjects::default();
        let project = sample_project();
        repo.create(project.clone()).await.unwrap();
        let err = repo.create(project).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Conflict(_)));
    }

    #[tokio::test]
    async fn task_complexity_validated_on_create() {
        let repo = InMemoryTasks::default();
        let task = NewTask {
            title: "Do the thing".to_string(),
            summary: "summary".to_string(),
            description: None,
            status: None,
            priority: Priority::Medium,
            complexity: 11,
            project_id: None,
            feature_id: None,
            requires_verification: false,
            tags: vec![],
        };
        let err = repo.create(task).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Validation(_)));
    }
}
