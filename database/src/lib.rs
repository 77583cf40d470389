//! Storage backends for the orchestration engine.
//!
//! Two implementations of `orchestrator_core::repository::Repositories`
//! are provided:
//!
//! - [`SqliteRepository`] — durable storage backed by a SQLite file (or
//!   `:memory:`), with WAL mode and schema migrations.
//! - [`InMemoryRepository`] — a process-local store for embedding the
//!   orchestrator without a database file.
//!
//! # Usage
//!
//! ```rust,no_run
//! use orchestrator_storage::SqliteRepository;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let repo = SqliteRepository::new(":memory:").await?;
//!     repo.migrate().await?;
//!     repo.health_check().await?;
//!     Ok(())
//! }
//! ```

mod common;
mod in_memory;
mod sqlite;

pub use in_memory::{
    InMemoryDependencies, InMemoryFeatures, InMemoryProjects, InMemoryRepository,
    InMemoryRoleTransitions, InMemorySections, InMemoryTasks, InMemoryTemplates,
};
pub use sqlite::{
    SqliteDependencies, SqliteFeatures, SqliteProjects, SqliteRepository, SqliteRoleTransitions,
    SqliteSections, SqliteTasks, SqliteTemplates,
};

pub use orchestrator_core::{
    error::{OrchestratorError, Result},
    models::{Dependency, EntityFilter, Feature, NewTask, Project, Task, UpdateTask},
    repository::{
        DependencyRepository, FeatureRepository, ProjectRepository, Repositories,
        RoleTransitionRepository, SectionRepository, TaskRepository, TemplateRepository,
    },
};
