//! End-to-end scenario tests for the orchestrator MCP server.
//!
//! Spawns the real `orchestrator-server` binary over stdio and drives it
//! through the six dispatch tools via the official `rmcp` client SDK,
//! exactly as a real MCP client would.

mod rmcp_tests;

use anyhow::Result;
use clap::Parser;
use rmcp_tests::{run_rmcp_tests, RmcpTestArgs};

#[tokio::main]
async fn main() -> Result<()> {
    let args = RmcpTestArgs::parse();
    run_rmcp_tests(args).await
}
