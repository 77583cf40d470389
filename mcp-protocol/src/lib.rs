//! MCP Protocol Implementation
//!
//! This crate bridges the orchestration engine in `orchestrator-core`
//! to MCP clients over the `rmcp` stdio transport. It provides:
//!
//! - The six tool implementations (§4.9/§6) as `#[tool]` methods on
//!   [`OrchestratorHandler`]
//! - The per-entity coarse lock table (§5.1) write tools acquire before
//!   mutating
//! - Envelope construction from `OrchestratorError`/`TransitionError`
//!   (§7): a failed tool call is still a successful MCP call whose
//!   payload reports failure
//!
//! # Usage
//!
//! ```no_run
//! use orchestrator_mcp::OrchestratorHandler;
//! use orchestrator_core::config::ConfigLoader;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! async fn start_server<R>(
//!     repos: Arc<R>,
//!     config_loader: Arc<ConfigLoader>,
//!     working_dir: PathBuf,
//! ) -> anyhow::Result<()>
//! where
//!     R: orchestrator_core::repository::Repositories + 'static,
//! {
//!     use rmcp::ServiceExt;
//!     let handler = OrchestratorHandler::new(repos, config_loader, working_dir);
//!     let service = handler.serve(rmcp::transport::io::stdio()).await?;
//!     service.waiting().await?;
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod envelope;
pub mod handler;
pub mod locks;

pub use handler::OrchestratorHandler;
pub use locks::LockTable;
