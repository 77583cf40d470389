use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::Result,
    models::{
        Dependency, EntityFilter, Feature, NewTask, Project, RoleTransition, Section, Task,
        TaskCounts, Template, UpdateTask,
    },
};

/// Persistence for projects.
///
/// Implementations must be `Send + Sync` so a single instance can be
/// shared across concurrent tool invocations behind an `Arc`.
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn create(&self, project: Project) -> Result<Project>;
    async fn update(&self, id: Uuid, updates: UpdateTask) -> Result<Project>;
    async fn set_status(&self, id: Uuid, status: crate::models::Status) -> Result<Project>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Project>>;
    async fn find_by_filters(&self, filter: EntityFilter) -> Result<Vec<Project>>;
}

/// Persistence for features, scoped to (optionally) a parent project.
#[async_trait]
pub trait FeatureRepository: Send + Sync {
    async fn create(&self, feature: Feature) -> Result<Feature>;
    async fn update(&self, id: Uuid, updates: UpdateTask) -> Result<Feature>;
    async fn set_status(&self, id: Uuid, status: crate::models::Status) -> Result<Feature>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Feature>>;
    async fn find_by_filters(&self, filter: EntityFilter) -> Result<Vec<Feature>>;
    async fn find_by_project(&self, project_id: Uuid) -> Result<Vec<Feature>>;

    /// Per-status task counts for every feature belonging to `project_id`,
    /// keyed by feature id (§4.1's project roll-up support).
    async fn get_feature_counts_by_project_id(
        &self,
        project_id: Uuid,
    ) -> Result<std::collections::HashMap<Uuid, TaskCounts>>;
}

/// Persistence for tasks.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, task: NewTask) -> Result<Task>;
    async fn update(&self, id: Uuid, updates: UpdateTask) -> Result<Task>;
    async fn set_status(&self, id: Uuid, status: crate::models::Status) -> Result<Task>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Task>>;
    async fn find_by_filters(&self, filter: EntityFilter) -> Result<Vec<Task>>;
    async fn find_by_feature(&self, feature_id: Uuid) -> Result<Vec<Task>>;
    async fn find_by_project(&self, project_id: Uuid) -> Result<Vec<Task>>;
    async fn get_task_counts_by_feature_id(&self, feature_id: Uuid) -> Result<TaskCounts>;
}

/// Persistence for content sections attached to any entity.
#[async_trait]
pub trait SectionRepository: Send + Sync {
    async fn create(&self, section: Section) -> Result<Section>;
    async fn update(&self, id: Uuid, section: Section) -> Result<Section>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Section>>;
    async fn find_by_entity(
        &self,
        entity_type: crate::models::EntityType,
        entity_id: Uuid,
    ) -> Result<Vec<Section>>;
    async fn delete_by_entity(
        &self,
        entity_type: crate::models::EntityType,
        entity_id: Uuid,
    ) -> Result<()>;
}

/// Persistence for task-to-task dependency edges.
#[async_trait]
pub trait DependencyRepository: Send + Sync {
    async fn create(&self, dependency: Dependency) -> Result<Dependency>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    async fn find_by_task_id(&self, task_id: Uuid) -> Result<Vec<Dependency>>;
    /// Edges where `task_id` is the blocked side (`to_task_id`).
    async fn find_by_to_task_id(&self, task_id: Uuid) -> Result<Vec<Dependency>>;
    /// Edges where `task_id` is the blocking side (`from_task_id`).
    async fn find_by_from_task_id(&self, task_id: Uuid) -> Result<Vec<Dependency>>;
    async fn delete_by_task_id(&self, task_id: Uuid) -> Result<()>;
}

/// Append-only log of role/status transitions, consulted by the
/// cascade engine's `first_task_started` detection (§4.4).
#[async_trait]
pub trait RoleTransitionRepository: Send + Sync {
    async fn create(&self, transition: RoleTransition) -> Result<RoleTransition>;
    async fn find_by_entity(&self, entity_id: Uuid) -> Result<Vec<RoleTransition>>;
}

/// Persistence for reusable section templates.
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    async fn create(&self, template: Template) -> Result<Template>;
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Template>>;
    async fn find_by_entity_type(
        &self,
        entity_type: crate::models::EntityType,
    ) -> Result<Vec<Template>>;
}

/// The full set of repositories a dispatch handler needs, bundled so
/// call sites can take one generic bound instead of seven (mirrors the
/// teacher's single `TaskRepository` bound, generalised across the
/// project/feature/task hierarchy plus sections, dependencies, role
/// transitions, and templates).
pub trait Repositories: Send + Sync {
    type Projects: ProjectRepository;
    type Features: FeatureRepository;
    type Tasks: TaskRepository;
    type Sections: SectionRepository;
    type Dependencies: DependencyRepository;
    type RoleTransitions: RoleTransitionRepository;
    type Templates: TemplateRepository;

    fn projects(&self) -> &Self::Projects;
    fn features(&self) -> &Self::Features;
    fn tasks(&self) -> &Self::Tasks;
    fn sections(&self) -> &Self::Sections;
    fn dependencies(&self) -> &Self::Dependencies;
    fn role_transitions(&self) -> &Self::RoleTransitions;
    fn templates(&self) -> &Self::Templates;
}
