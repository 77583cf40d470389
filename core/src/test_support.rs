//! Minimal in-memory repository set used only by this crate's own
//! `#[cfg(test)]` modules (validator, cascade, dependency analysis).
//! The production in-memory and SQLite implementations live in the
//! storage crate; this one exists so core's pure-logic tests don't
//! need a cross-crate dev-dependency back onto something that depends
//! on core.
#![cfg(test)]

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::{
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

#[derive(Default)]
pub struct InMemoryTestRepositories {
    projects: Mutex<HashMap<Uuid, Project>>,
    features: Mutex<HashMap<Uuid, Feature>>,
    tasks: Mutex<HashMap<Uuid, Task>>,
    sections: Mutex<HashMap<Uuid, Section>>,
    dependencies: Mutex<HashMap<Uuid, Dependency>>,
    role_transitions: Mutex<HashMap<Uuid, RoleTransition>>,
    templates: Mutex<HashMap<Uuid, Template>>,
}

impl InMemoryTestRepositories {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectRepository for InMemoryTestRepositories {
    async fn create(&self, project: Project) -> Result<Project> {
        self.projects.lock().insert(project.id, project.clone());
        Ok(project)
    }

    async fn update(&self, id: Uuid, updates: UpdateTask) -> Result<Project> {
        let mut guard = self.projects.lock();
        let project = guard
            .get_mut(&id)
            .ok_or_else(|| OrchestratorError::not_found_kind("project", id))?;
        if let Some(name) = updates.title {
            project.name = name;
        }
        if let Some(summary) = updates.summary {
            project.summary = summary;
        }
        if let Some(tags) = updates.tags {
            project.tags = tags;
        }
        project.modified_at = Utc::now();
        Ok(project.clone())
    }

    async fn set_status(&self, id: Uuid, status: Status) -> Result<Project> {
        let mut guard = self.projects.lock();
        let project = guard
            .get_mut(&id)
            .ok_or_else(|| OrchestratorError::not_found_kind("project", id))?;
        project.status = status;
        project.modified_at = Utc::now();
        Ok(project.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.projects.lock().remove(&id);
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Project>> {
        Ok(self.projects.lock().get(&id).cloned())
    }

    async fn find_by_filters(&self, _filter: EntityFilter) -> Result<Vec<Project>> {
        Ok(self.projects.lock().values().cloned().collect())
    }
}

#[async_trait]
impl FeatureRepository for InMemoryTestRepositories {
    async fn create(&self, feature: Feature) -> Result<Feature> {
        self.features.lock().insert(feature.id, feature.clone());
        Ok(feature)
    }

    async fn update(&self, id: Uuid, updates: UpdateTask) -> Result<Feature> {
        let mut guard = self.features.lock();
        let feature = guard
            .get_mut(&id)
            .ok_or_else(|| OrchestratorError::not_found_kind("feature", id))?;
        if let Some(name) = updates.title {
            feature.name = name;
        }
        if let Some(tags) = updates.tags {
            feature.tags = tags;
        }
        feature.modified_at = Utc::now();
        Ok(feature.clone())
    }

    async fn set_status(&self, id: Uuid, status: Status) -> Result<Feature> {
        let mut guard = self.features.lock();
        let feature = guard
            .get_mut(&id)
            .ok_or_else(|| OrchestratorError::not_found_kind("feature", id))?;
        feature.status = status;
        feature.modified_at = Utc::now();
        Ok(feature.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.features.lock().remove(&id);
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Feature>> {
        Ok(self.features.lock().get(&id).cloned())
    }

    async fn find_by_filters(&self, _filter: EntityFilter) -> Result<Vec<Feature>> {
        Ok(self.features.lock().values().cloned().collect())
    }

    async fn find_by_project(&self, project_id: Uuid) -> Result<Vec<Feature>> {
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
        _project_id: Uuid,
    ) -> Result<HashMap<Uuid, TaskCounts>> {
        Ok(HashMap::new())
    }
}

#[async_trait]
impl TaskRepository for InMemoryTestRepositories {
    async fn create(&self, new_task: NewTask) -> Result<Task> {
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            title: new_task.title,
            summary: new_task.summary,
            description: new_task.description,
            status: new_task.status.unwrap_or_else(|| Status::new("pending")),
            priority: new_task.priority,
            complexity: new_task.complexity,
            project_id: new_task.project_id,
            feature_id: new_task.feature_id,
            requires_verification: new_task.requires_verification,
            tags: new_task.tags,
            created_at: now,
            modified_at: now,
        };
        self.tasks.lock().insert(task.id, task.clone());
        Ok(task)
    }

    async fn update(&self, id: Uuid, updates: UpdateTask) -> Result<Task> {
        let mut guard = self.tasks.lock();
        let task = guard
            .get_mut(&id)
            .ok_or_else(|| OrchestratorError::not_found_kind("task", id))?;
        if let Some(title) = updates.title {
            task.title = title;
        }
        if let Some(summary) = updates.summary {
            task.summary = summary;
        }
        if let Some(tags) = updates.tags {
            task.tags = tags;
        }
        task.modified_at = Utc::now();
        Ok(task.clone())
    }

    async fn set_status(&self, id: Uuid, status: Status) -> Result<Task> {
        let mut guard = self.tasks.lock();
        let task = guard
            .get_mut(&id)
            .ok_or_else(|| OrchestratorError::not_found_kind("task", id))?;
        task.status = status;
        task.modified_at = Utc::now();
        Ok(task.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.tasks.lock().remove(&id);
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Task>> {
        Ok(self.tasks.lock().get(&id).cloned())
    }

    async fn find_by_filters(&self, _filter: EntityFilter) -> Result<Vec<Task>> {
        Ok(self.tasks.lock().values().cloned().collect())
    }

    async fn find_by_feature(&self, feature_id: Uuid) -> Result<Vec<Task>> {
        Ok(self
            .tasks
            .lock()
            .values()
            .filter(|t| t.feature_id == Some(feature_id))
            .cloned()
            .collect())
    }

    async fn find_by_project(&self, project_id: Uuid) -> Result<Vec<Task>> {
        Ok(self
            .tasks
            .lock()
            .values()
            .filter(|t| t.project_id == Some(project_id))
            .cloned()
            .collect())
    }

    async fn get_task_counts_by_feature_id(&self, _feature_id: Uuid) -> Result<TaskCounts> {
        Ok(TaskCounts::default())
    }
}

#[async_trait]
impl SectionRepository for InMemoryTestRepositories {
    async fn create(&self, section: Section) -> Result<Section> {
        self.sections.lock().insert(section.id, section.clone());
        Ok(section)
    }

    async fn update(&self, id: Uuid, section: Section) -> Result<Section> {
        self.sections.lock().insert(id, section.clone());
        Ok(section)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.sections.lock().remove(&id);
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Section>> {
        Ok(self.sections.lock().get(&id).cloned())
    }

    async fn find_by_entity(&self, entity_type: EntityType, entity_id: Uuid) -> Result<Vec<Section>> {
        Ok(self
            .sections
            .lock()
            .values()
            .filter(|s| s.entity_type == entity_type && s.entity_id == entity_id)
            .cloned()
            .collect())
    }

    async fn delete_by_entity(&self, entity_type: EntityType, entity_id: Uuid) -> Result<()> {
        self.sections
            .lock()
            .retain(|_, s| !(s.entity_type == entity_type && s.entity_id == entity_id));
        Ok(())
    }
}

#[async_trait]
impl DependencyRepository for InMemoryTestRepositories {
    async fn create(&self, dependency: Dependency) -> Result<Dependency> {
        self.dependencies
            .lock()
            .insert(dependency.id, dependency.clone());
        Ok(dependency)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.dependencies.lock().remove(&id);
        Ok(())
    }

    async fn find_by_task_id(&self, task_id: Uuid) -> Result<Vec<Dependency>> {
        Ok(self
            .dependencies
            .lock()
            .values()
            .filter(|d| d.from_task_id == task_id || d.to_task_id == task_id)
            .cloned()
            .collect())
    }

    async fn find_by_to_task_id(&self, task_id: Uuid) -> Result<Vec<Dependency>> {
        Ok(self
            .dependencies
            .lock()
            .values()
            .filter(|d| d.to_task_id == task_id)
            .cloned()
            .collect())
    }

    async fn find_by_from_task_id(&self, task_id: Uuid) -> Result<Vec<Dependency>> {
        Ok(self
            .dependencies
            .lock()
            .values()
            .filter(|d| d.from_task_id == task_id)
            .cloned()
            .collect())
    }

    async fn delete_by_task_id(&self, task_id: Uuid) -> Result<()> {
        self.dependencies
            .lock()
            .retain(|_, d| d.from_task_id != task_id && d.to_task_id != task_id);
        Ok(())
    }
}

#[async_trait]
impl RoleTransitionRepository for InMemoryTestRepositories {
    async fn create(&self, transition: RoleTransition) -> Result<RoleTransition> {
        self.role_transitions
            .lock()
            .insert(transition.id, transition.clone());
        Ok(transition)
    }

    async fn find_by_entity(&self, entity_id: Uuid) -> Result<Vec<RoleTransition>> {
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
impl TemplateRepository for InMemoryTestRepositories {
    async fn create(&self, template: Template) -> Result<Template> {
        self.templates.lock().insert(template.id, template.clone());
        Ok(template)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Template>> {
        Ok(self.templates.lock().get(&id).cloned())
    }

    async fn find_by_entity_type(&self, entity_type: EntityType) -> Result<Vec<Template>> {
        Ok(self
            .templates
            .lock()
            .values()
            .filter(|t| t.entity_type == entity_type)
            .cloned()
            .collect())
    }
}

impl Repositories for InMemoryTestRepositories {
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
