//! A single-struct mock of [`Repositories`] with call-history tracking
//! and one-shot error injection, for asserting on dispatch-layer
//! behaviour rather than just on in-memory storage outcomes.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use orchestrator_core::{
    error::{OrchestratorError, Result},
    models::{
        Dependency, EntityFilter, EntityType, Feature, NewTask, Project, RoleTransition, Section,
        Status, Task, TaskCounts, Template, UpdateTask,
    },
    repository::{
        DependencyRepository, FeatureRepository, ProjectRepository, Repositories,
        RoleTransitionRepository, SectionRepository, TaskRepository, TemplateRepository,
    },
};

/// Mock implementation of every repository trait, backed by plain
/// HashMaps behind a single mutex per entity kind.
///
/// Every method records its call (`"create(title=...)"` style, mirroring
/// the teacher's mock) before consulting error injection, so a test can
/// inject a failure and still assert the call was attempted.
#[derive(Default)]
pub struct MockRepositories {
    projects: Mutex<HashMap<Uuid, Project>>,
    features: Mutex<HashMap<Uuid, Feature>>,
    tasks: Mutex<HashMap<Uuid, Task>>,
    sections: Mutex<HashMap<Uuid, Section>>,
    dependencies: Mutex<HashMap<Uuid, Dependency>>,
    role_transitions: Mutex<HashMap<Uuid, RoleTransition>>,
    templates: Mutex<HashMap<Uuid, Template>>,
    error_injection: Mutex<Option<OrchestratorError>>,
    call_history: Mutex<Vec<String>>,
}

impl MockRepositories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject an error to be returned (and consumed) by the next
    /// repository call of any kind.
    pub fn inject_error(&self, error: OrchestratorError) {
        *self.error_injection.lock() = Some(error);
    }

    pub fn clear_error(&self) {
        *self.error_injection.lock() = None;
    }

    pub fn call_history(&self) -> Vec<String> {
        self.call_history.lock().clone()
    }

    pub fn clear_history(&self) {
        self.call_history.lock().clear();
    }

    /// Assert a method whose name contains `method` was called.
    pub fn assert_called(&self, method: &str) {
        let history = self.call_history.lock();
        assert!(
            history.iter().any(|call| call.contains(method)),
            "method '{method}' was not called. Call history: {:?}",
            *history
        );
    }

    fn record(&self, call: impl Into<String>) {
        self.call_history.lock().push(call.into());
    }

    fn check_error_injection(&self) -> Result<()> {
        match self.error_injection.lock().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn matches_status(status: &Status, filter: &Option<Status>) -> bool {
    filter.as_ref().map(|f| f.as_str() == status.as_str()).unwrap_or(true)
}

#[async_trait]
impl ProjectRepository for MockRepositories {
    async fn create(&self, project: Project) -> Result<Project> {
        self.record(format!("projects.create(name={})", project.name));
        self.check_error_injection()?;
        if project.name.trim().is_empty() {
            return Err(OrchestratorError::empty_field("name"));
        }
        let mut store = self.projects.lock();
        if store.contains_key(&project.id) {
            return Err(OrchestratorError::Conflict(format!("project '{}' already exists", project.id)));
        }
        store.insert(project.id, project.clone());
        Ok(project)
    }

    async fn update(&self, id: Uuid, updates: UpdateTask) -> Result<Project> {
        self.record(format!("projects.update(id={id})"));
        self.check_error_injection()?;
        let mut store = self.projects.lock();
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
        project.modified_at = Utc::now();
        Ok(project.clone())
    }

    async fn set_status(&self, id: Uuid, status: Status) -> Result<Project> {
        self.record(format!("projects.set_status(id={id}, status={status})"));
        self.check_error_injection()?;
        let mut store = self.projects.lock();
        let project = store
            .get_mut(&id)
            .ok_or_else(|| OrchestratorError::not_found_kind("project", id))?;
        project.status = status;
        project.modified_at = Utc::now();
        Ok(project.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.record(format!("projects.delete(id={id})"));
        self.check_error_injection()?;
        self.projects.lock().remove(&id);
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Project>> {
        self.record(format!("projects.get_by_id(id={id})"));
        self.check_error_injection()?;
        Ok(self.projects.lock().get(&id).cloned())
    }

    async fn find_by_filters(&self, filter: EntityFilter) -> Result<Vec<Project>> {
        self.record("projects.find_by_filters");
        self.check_error_injection()?;
        let store = self.projects.lock();
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
impl FeatureRepository for MockRepositories {
    async fn create(&self, feature: Feature) -> Result<Feature> {
        self.record(format!("features.create(name={})", feature.name));
        self.check_error_injection()?;
        if feature.name.trim().is_empty() {
            return Err(OrchestratorError::empty_field("name"));
        }
        let mut store = self.features.lock();
        if store.contains_key(&feature.id) {
            return Err(OrchestratorError::Conflict(format!("feature '{}' already exists", feature.id)));
        }
        store.insert(feature.id, feature.clone());
        Ok(feature)
    }

    async fn update(&self, id: Uuid, updates: UpdateTask) -> Result<Feature> {
        self.record(format!("features.update(id={id})"));
        self.check_error_injection()?;
        let mut store = self.features.lock();
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
        feature.modified_at = Utc::now();
        Ok(feature.clone())
    }

    async fn set_status(&self, id: Uuid, status: Status) -> Result<Feature> {
        self.record(format!("features.set_status(id={id}, status={status})"));
        self.check_error_injection()?;
        let mut store = self.features.lock();
        let feature = store
            .get_mut(&id)
            .ok_or_else(|| OrchestratorError::not_found_kind("feature", id))?;
        feature.status = status;
        feature.modified_at = Utc::now();
        Ok(feature.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.record(format!("features.delete(id={id})"));
        self.check_error_injection()?;
        self.features.lock().remove(&id);
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Feature>> {
        self.record(format!("features.get_by_id(id={id})"));
        self.check_error_injection()?;
        Ok(self.features.lock().get(&id).cloned())
    }

    async fn find_by_filters(&self, filter: EntityFilter) -> Result<Vec<Feature>> {
        self.record("features.find_by_filters");
        self.check_error_injection()?;
        let store = self.features.lock();
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
        self.record(format!("features.find_by_project(project_id={project_id})"));
        self.check_error_injection()?;
        Ok(self
            .features
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
        self.record(format!("features.get_feature_counts_by_project_id(project_id={project_id})"));
        self.check_error_injection()?;
        let feature_ids: Vec<Uuid> = self
            .features
            .lock()
            .values()
            .filter(|f| f.project_id == Some(project_id))
            .map(|f| f.id)
            .collect();
        let tasks = self.tasks.lock();
        let mut counts = HashMap::new();
        for feature_id in feature_ids {
            let mut bucket = TaskCounts::default();
            for task in tasks.values().filter(|t| t.feature_id == Some(feature_id)) {
                bucket.total += 1;
                match task.status.as_str() {
                    "pending" => bucket.pending += 1,
                    "in-progress" => bucket.in_progress += 1,
                    "completed" => bucket.completed += 1,
                    "cancelled" => bucket.cancelled += 1,
                    "testing" => bucket.testing += 1,
                    "blocked" => bucket.blocked += 1,
                    _ => {}
                }
            }
            counts.insert(feature_id, bucket);
        }
        Ok(counts)
    }
}

#[async_trait]
impl TaskRepository for MockRepositories {
    async fn create(&self, task: NewTask) -> Result<Task> {
        self.record(format!("tasks.create(title={})", task.title));
        self.check_error_injection()?;
        if task.title.trim().is_empty() {
            return Err(OrchestratorError::empty_field("title"));
        }
        if !(1..=10).contains(&task.complexity) {
            return Err(OrchestratorError::Validation("'complexity' must be between 1 and 10".to_string()));
        }
        let timestamp = Utc::now();
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
        self.tasks.lock().insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: Uuid, updates: UpdateTask) -> Result<Task> {
        self.record(format!("tasks.update(id={id})"));
        self.check_error_injection()?;
        if let Some(complexity) = updates.complexity {
            if !(1..=10).contains(&complexity) {
                return Err(OrchestratorError::Validation("'complexity' must be between 1 and 10".to_string()));
            }
        }
        let mut store = self.tasks.lock();
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
        task.modified_at = Utc::now();
        Ok(task.clone())
    }

    async fn set_status(&self, id: Uuid, status: Status) -> Result<Task> {
        self.record(format!("tasks.set_status(id={id}, status={status})"));
        self.check_error_injection()?;
        let mut store = self.tasks.lock();
        let task = store
            .get_mut(&id)
            .ok_or_else(|| OrchestratorError::not_found_kind("task", id))?;
        task.status = status;
        task.modified_at = Utc::now();
        Ok(task.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.record(format!("tasks.delete(id={id})"));
        self.check_error_injection()?;
        self.tasks.lock().remove(&id);
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Task>> {
        self.record(format!("tasks.get_by_id(id={id})"));
        self.check_error_injection()?;
        Ok(self.tasks.lock().get(&id).cloned())
    }

    async fn find_by_filters(&self, filter: EntityFilter) -> Result<Vec<Task>> {
        self.record("tasks.find_by_filters");
        self.check_error_injection()?;
        let store = self.tasks.lock();
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
        self.record(format!("tasks.find_by_feature(feature_id={feature_id})"));
        self.check_error_injection()?;
        Ok(self
            .tasks
            .lock()
            .values()
            .filter(|t| t.feature_id == Some(feature_id))
            .cloned()
            .collect())
    }

    async fn find_by_project(&self, project_id: Uuid) -> Result<Vec<Task>> {
        self.record(format!("tasks.find_by_project(project_id={project_id})"));
        self.check_error_injection()?;
        Ok(self
            .tasks
            .lock()
            .values()
            .filter(|t| t.project_id == Some(project_id))
            .cloned()
            .collect())
    }

    async fn get_task_counts_by_feature_id(&self, feature_id: Uuid) -> Result<TaskCounts> {
        self.record(format!("tasks.get_task_counts_by_feature_id(feature_id={feature_id})"));
        self.check_error_injection()?;
        let store = self.tasks.lock();
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
impl SectionRepository for MockRepositories {
    async fn create(&self, section: Section) -> Result<Section> {
        self.record(format!("sections.create(title={})", section.title));
        self.check_error_injection()?;
        self.sections.lock().insert(section.id, section.clone());
        Ok(section)
    }

    async fn update(&self, id: Uuid, section: Section) -> Result<Section> {
        self.record(format!("sections.update(id={id})"));
        self.check_error_injection()?;
        let mut store = self.sections.lock();
        if !store.contains_key(&id) {
            return Err(OrchestratorError::not_found_kind("section", id));
        }
        store.insert(id, section.clone());
        Ok(section)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.record(format!("sections.delete(id={id})"));
        self.check_error_injection()?;
        self.sections.lock().remove(&id);
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Section>> {
        self.record(format!("sections.get_by_id(id={id})"));
        self.check_error_injection()?;
        Ok(self.sections.lock().get(&id).cloned())
    }

    async fn find_by_entity(&self, entity_type: EntityType, entity_id: Uuid) -> Result<Vec<Section>> {
        self.record(format!("sections.find_by_entity(entity_id={entity_id})"));
        self.check_error_injection()?;
        let mut results: Vec<Section> = self
            .sections
            .lock()
            .values()
            .filter(|s| s.entity_type == entity_type && s.entity_id == entity_id)
            .cloned()
            .collect();
        results.sort_by_key(|s| s.ordinal);
        Ok(results)
    }

    async fn delete_by_entity(&self, entity_type: EntityType, entity_id: Uuid) -> Result<()> {
        self.record(format!("sections.delete_by_entity(entity_id={entity_id})"));
        self.check_error_injection()?;
        self.sections
            .lock()
            .retain(|_, s| !(s.entity_type == entity_type && s.entity_id == entity_id));
        Ok(())
    }
}

#[async_trait]
impl DependencyRepository for MockRepositories {
    async fn create(&self, dependency: Dependency) -> Result<Dependency> {
        self.record(format!("dependencies.create(from={}, to={})", dependency.from_task_id, dependency.to_task_id));
        self.check_error_injection()?;
        self.dependencies.lock().insert(dependency.id, dependency.clone());
        Ok(dependency)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.record(format!("dependencies.delete(id={id})"));
        self.check_error_injection()?;
        self.dependencies.lock().remove(&id);
        Ok(())
    }

    async fn find_by_task_id(&self, task_id: Uuid) -> Result<Vec<Dependency>> {
        self.record(format!("dependencies.find_by_task_id(task_id={task_id})"));
        self.check_error_injection()?;
        Ok(self
            .dependencies
            .lock()
            .values()
            .filter(|d| d.from_task_id == task_id || d.to_task_id == task_id)
            .cloned()
            .collect())
    }

    async fn find_by_to_task_id(&self, task_id: Uuid) -> Result<Vec<Dependency>> {
        self.record(format!("dependencies.find_by_to_task_id(task_id={task_id})"));
        self.check_error_injection()?;
        Ok(self
            .dependencies
            .lock()
            .values()
            .filter(|d| d.to_task_id == task_id)
            .cloned()
            .collect())
    }

    async fn find_by_from_task_id(&self, task_id: Uuid) -> Result<Vec<Dependency>> {
        self.record(format!("dependencies.find_by_from_task_id(task_id={task_id})"));
        self.check_error_injection()?;
        Ok(self
            .dependencies
            .lock()
            .values()
            .filter(|d| d.from_task_id == task_id)
            .cloned()
            .collect())
    }

    async fn delete_by_task_id(&self, task_id: Uuid) -> Result<()> {
        self.record(format!("dependencies.delete_by_task_id(task_id={task_id})"));
        self.check_error_injection()?;
        self.dependencies
            .lock()
            .retain(|_, d| d.from_task_id != task_id && d.to_task_id != task_id);
        Ok(())
    }
}

#[async_trait]
impl RoleTransitionRepository for MockRepositories {
    async fn create(&self, transition: RoleTransition) -> Result<RoleTransition> {
        self.record(format!("role_transitions.create(entity_id={})", transition.entity_id));
        self.check_error_injection()?;
        self.role_transitions.lock().insert(transition.id, transition.clone());
        Ok(transition)
    }

    async fn find_by_entity(&self, entity_id: Uuid) -> Result<Vec<RoleTransition>> {
        self.record(format!("role_transitions.find_by_entity(entity_id={entity_id})"));
        self.check_error_injection()?;
        Ok(self
            .role_transitions
            .lock()
            .values()
            .filter(|t| t.entity_id == entity_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TemplateRepository for MockRepositories {
    async fn create(&self, template: Template) -> Result<Template> {
        self.record(format!("templates.create(name={})", template.name));
        self.check_error_injection()?;
        self.templates.lock().insert(template.id, template.clone());
        Ok(template)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Template>> {
        self.record(format!("templates.get_by_id(id={id})"));
        self.check_error_injection()?;
        Ok(self.templates.lock().get(&id).cloned())
    }

    async fn find_by_entity_type(&self, entity_type: EntityType) -> Result<Vec<Template>> {
        self.record("templates.find_by_entity_type");
        self.check_error_injection()?;
        Ok(self
            .templates
            .lock()
            .values()
            .filter(|t| t.entity_type == entity_type)
            .cloned()
            .collect())
    }
}

impl Repositories for MockRepositories {
    type Projects = Self;
    type Features = Self;
    type Tasks = Self;
    type Sections = Self;
    type Dependencies = Self;
    type RoleTransitions = Self;
    type Templates = Self;

    fn projects(&self) -> &Self::Projects {
        self
    }
    fn features(&self) -> &Self::Features {
        self
    }
    fn tasks(&self) -> &Self::Tasks {
        self
    }
    fn sections(&self) -> &Self::Sections {
        self
    }
    fn dependencies(&self) -> &Self::Dependencies {
        self
    }
    fn role_transitions(&self) -> &Self::RoleTransitions {
        self
    }
    fn templates(&self) -> &Self::Templates {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_core::models::Priority;

    fn sample_task() -> NewTask {
        NewTask {
            title: "Write docs".into(),
            summary: "summary".into(),
            description: None,
            status: None,
            priority: Priority::Medium,
            complexity: 3,
            project_id: None,
            feature_id: None,
            requires_verification: false,
            tags: Vec::new(),
        }
    }

    #[tokio::test]
    async fn records_call_history() {
        let repos = MockRepositories::new();
        let task = repos.create(sample_task()).await.unwrap();
        repos.get_by_id(task.id).await.unwrap();
        repos.assert_called("tasks.create");
        repos.assert_called("tasks.get_by_id");
    }

    #[tokio::test]
    async fn injected_error_is_consumed_once() {
        let repos = MockRepositories::new();
        repos.inject_error(OrchestratorError::Database("boom".into()));
        let first = repos.create(sample_task()).await;
        assert!(matches!(first, Err(OrchestratorError::Database(_))));
        let second = repos.create(sample_task()).await;
        assert!(second.is_ok());
    }
}
