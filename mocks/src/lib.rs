//! Mock repositories and test-data builders for the orchestration
//! engine, shared by the protocol and server crates' test suites.
//!
//! [`MockRepositories`] implements `orchestrator_core::repository::Repositories`
//! like the production in-memory store, but additionally tracks a call
//! history and supports one-shot error injection, so dispatch-layer
//! tests can assert on *how* a tool called its repositories, not just
//! on the end result.

pub mod builders;
pub mod fixtures;
pub mod repository;

pub use builders::{FeatureBuilder, ProjectBuilder, TaskBuilder};
pub use repository::MockRepositories;
