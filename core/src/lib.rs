//! Orchestrator Core Library
//!
//! Foundational domain models, workflow engine, and trait interfaces for
//! the task-orchestration server. All other crates in this workspace
//! depend on the types defined here.
//!
//! # Architecture
//!
//! - [`models`] - Project/Feature/Task/Section/Dependency/RoleTransition
//!   domain model plus the `Status`/`Role`/`EntityType` supporting types.
//! - [`error`] - `OrchestratorError` and the crate-wide `Result` alias.
//! - [`repository`] - Narrow per-entity persistence traits.
//! - [`config`] - Workflow configuration loading and caching.
//! - [`validation`] - The status validator (flows, prerequisites).
//! - [`cascade`] - Cross-entity cascade detection and application.
//! - [`dependency`] - Dependency-graph "newly unblocked" analysis.
//! - [`completion`] - Feature-terminal cleanup policy.
//! - [`transition`] - The transition executor (`request_transition`,
//!   `get_next_status`).
//! - [`queries`] - The `get_next_task`/`get_blocked_tasks` read-only
//!   helpers.
//! - [`dispatch`] - The response envelope shared by every tool.

pub mod cascade;
pub mod completion;
pub mod config;
pub mod dependency;
pub mod dispatch;
pub mod error;
pub mod models;
pub mod queries;
pub mod repository;
pub mod transition;
pub mod validation;

#[cfg(test)]
mod test_support;

pub use config::WorkflowConfig;
pub use error::{OrchestratorError, Result};
pub use models::{Dependency, EntityType, Feature, Project, Role, RoleTransition, Section, Status, Task};
pub use queries::{get_blocked_tasks, get_next_task};
pub use repository::Repositories;
pub use transition::{request_transition, request_transitions_batch, TransitionResult};
pub use validation::{validate_prerequisites, validate_status, validate_transition, ValidationOutcome};

/// Current version of the core crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Current crate name.
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_constants_are_set() {
        assert!(!VERSION.is_empty());
        assert_eq!(CRATE_NAME, "orchestrator-core");
    }
}
