//! Orchestrator server library
//!
//! Provides the deployment configuration and telemetry setup used by
//! the `orchestrator-server` stdio binary. Repository construction and
//! MCP wiring live in `orchestrator-storage` and `orchestrator-mcp`
//! respectively; this crate only owns the ambient concerns around
//! running the binary.

pub mod config;
pub mod telemetry;

pub use config::ServerConfig;
pub use telemetry::init_telemetry;
