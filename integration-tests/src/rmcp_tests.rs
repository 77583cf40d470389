//! Drives a real `orchestrator-server` child process over stdio via the
//! `rmcp` client SDK and exercises the six dispatch tools end to end.
//!
//! Each scenario mirrors one of the documented end-to-end walkthroughs:
//! forward progression, a rejected status skip, a terminal closure that
//! cascades up through feature and project, a completion rejected for a
//! too-short summary, and a completion rejected by a failing
//! verification gate. "Newly unblocked downstream" is not reachable
//! through the six dispatch tools (there is no tool to create a
//! `BLOCKS` dependency edge at runtime) and is instead covered by
//! `orchestrator_core::dependency`'s own unit test.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use rmcp::{
    model::*,
    service::ServiceExt,
    transport::{ConfigureCommandExt, TokioChildProcess},
};
use serde_json::{json, Value};
use tokio::{process::Command, time::timeout};
use tracing::info;
use uuid::Uuid;

use orchestrator_core::models::{ContentFormat, EntityType, Template, TemplateSection};
use orchestrator_core::repository::Repositories;
use orchestrator_storage::SqliteRepository;

const CALL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "orchestrator-integration-tests")]
#[command(about = "End-to-end scenario tests for the orchestrator MCP server")]
pub struct RmcpTestArgs {
    /// Path to the `orchestrator-server` binary under test.
    #[arg(short = 'b', long)]
    pub server_binary: PathBuf,

    /// Directory to hold the SQLite database file.
    #[arg(short, long)]
    pub database_dir: PathBuf,

    /// Project root the server should treat as its working directory
    /// (holds `.taskorchestrator/config.yaml`).
    #[arg(short, long)]
    pub project_root: PathBuf,
}

pub struct RmcpTestHarness {
    service: rmcp::service::RunningService<rmcp::service::RoleClient, ()>,
    verification_template_id: Uuid,
}

impl RmcpTestHarness {
    pub async fn new(args: RmcpTestArgs) -> Result<Self> {
        tokio::fs::create_dir_all(&args.database_dir)
            .await
            .context("failed to create database directory")?;
        tokio::fs::create_dir_all(args.project_root.join(".taskorchestrator"))
            .await
            .context("failed to create project root")?;

        // Enable auto-cascading so scenario 3's cascade chain actually
        // applies rather than merely being suggested (§4.2 default has
        // auto_cascade.enabled = false).
        tokio::fs::write(
            args.project_root.join(".taskorchestrator/config.yaml"),
            "auto_cascade:\n  enabled: true\n  max_depth: 3\n",
        )
        .await
        .context("failed to write workflow config")?;

        let db_path = args.database_dir.join("orchestrator-integration.sqlite");
        let database_url = format!("sqlite://{}", db_path.display());

        // Seed a "Verification" section template ahead of time: the six
        // dispatch tools only ever attach sections through template
        // expansion at creation time, so scenario 6 needs this template
        // to already exist before the server (and the client talking to
        // it) starts.
        let verification_template_id = {
            let repos = SqliteRepository::new(&database_url)
                .await
                .context("failed to open seeding connection")?;
            repos.migrate().await.context("failed to run migrations")?;

            let template = repos
                .templates()
                .create(Template {
                    id: Uuid::new_v4(),
                    name: "verification-gate".into(),
                    entity_type: EntityType::Task,
                    sections: vec![TemplateSection {
                        title: "Verification".into(),
                        ordinal: 0,
                        content_format: ContentFormat::Json,
                        content: r#"[{"criteria":"x","pass":false}]"#.into(),
                        usage_description: None,
                        tags: Vec::new(),
                    }],
                })
                .await
                .context("failed to seed verification template")?;
            template.id
        };

        info!(binary = ?args.server_binary, database = %database_url, "starting orchestrator-server");

        let mut command = Command::new(&args.server_binary);
        command
            .env("PROJECT_ROOT", &args.project_root)
            .env("DATABASE_URL", &database_url)
            .env("LOG_LEVEL", "info")
            .current_dir(&args.project_root);

        let transport = TokioChildProcess::new(command.configure(|_| {}))?;
        let service = ()
            .serve(transport)
            .await
            .context("failed to start rmcp client service")?;

        info!("server info: {:?}", service.peer_info());

        Ok(Self {
            service,
            verification_template_id,
        })
    }

    async fn call(&self, name: &'static str, arguments: Value) -> Result<Value> {
        let result = timeout(
            CALL_TIMEOUT,
            self.service.peer().call_tool(CallToolRequestParam {
                name: name.into(),
                arguments: Some(arguments.as_object().context("tool arguments must be a JSON object")?.clone()),
            }),
        )
        .await
        .with_context(|| format!("timed out waiting for {name} response"))??;

        let content = result.content.first().ok_or_else(|| anyhow!("{name} returned no content"))?;
        let text = match &content.raw {
            RawContent::Text(text_content) => &text_content.text,
            other => return Err(anyhow!("{name} returned non-text content: {other:?}")),
        };
        serde_json::from_str(text).with_context(|| format!("failed to parse {name} response as JSON: {text}"))
    }

    async fn create(&self, container_type: &str, body: Value) -> Result<Value> {
        let mut args = body;
        args["operation"] = json!("create");
        args["containerType"] = json!(container_type);
        let envelope = self.call("manage_container", args).await?;
        if envelope["success"] != json!(true) {
            return Err(anyhow!("create {container_type} failed: {envelope}"));
        }
        Ok(envelope["data"].clone())
    }

    async fn request_transition(&self, container_id: &str, container_type: &str, trigger: &str, summary: Option<&str>) -> Result<Value> {
        self.call(
            "request_transition",
            json!({
                "containerId": container_id,
                "containerType": container_type,
                "trigger": trigger,
                "summary": summary,
            }),
        )
        .await
    }

    pub async fn run_all_scenarios(&mut self) -> Result<()> {
        self.scenario_1_forward_progression().await?;
        self.scenario_2_skip_rejected().await?;
        self.scenario_3_terminal_closure_with_cascade().await?;
        self.scenario_4_completion_blocked_by_summary_length().await?;
        self.scenario_6_verification_gate().await?;
        self.scenario_7_next_task_and_blocked_tasks_smoke_test().await?;
        info!("all scenarios passed");
        Ok(())
    }

    /// §8 scenario 1: a fresh task advances from `pending` to
    /// `in-progress` on `trigger: "start"`, with the matching role
    /// change and no cascade or unblock activity.
    async fn scenario_1_forward_progression(&self) -> Result<()> {
        info!("scenario 1: forward progression");

        let task = self
            .create("task", json!({ "name": "T1", "summary": "forward progression task" }))
            .await?;
        let task_id = task["id"].as_str().context("created task has no id")?;

        let envelope = self.request_transition(task_id, "task", "start", None).await?;
        if envelope["success"] != json!(true) {
            return Err(anyhow!("expected scenario 1 transition to succeed: {envelope}"));
        }
        let data = &envelope["data"];
        if data["applied"] != json!(true) {
            return Err(anyhow!("expected applied=true: {data}"));
        }
        if data["previousStatus"] != json!("pending") || data["newStatus"] != json!("in-progress") {
            return Err(anyhow!("unexpected status transition: {data}"));
        }
        if data["previousRole"] != json!("queue") || data["newRole"] != json!("work") {
            return Err(anyhow!("unexpected role transition: {data}"));
        }
        if !data["cascadeEvents"].as_array().is_some_and(|v| v.is_empty()) {
            return Err(anyhow!("expected no cascade events: {data}"));
        }
        if !data["unblockedTasks"].as_array().is_some_and(|v| v.is_empty()) {
            return Err(anyhow!("expected no unblocked tasks: {data}"));
        }

        info!("scenario 1 passed");
        Ok(())
    }

    /// §8 scenario 2: a trigger naming a status directly ("completed")
    /// is rejected when it would skip over `in-progress`/`testing`.
    async fn scenario_2_skip_rejected(&self) -> Result<()> {
        info!("scenario 2: skip rejected");

        let task = self
            .create("task", json!({ "name": "T1-skip", "summary": "skip rejection task" }))
            .await?;
        let task_id = task["id"].as_str().context("created task has no id")?;

        let envelope = self.request_transition(task_id, "task", "completed", None).await?;
        if envelope["success"] != json!(false) {
            return Err(anyhow!("expected the skip to be rejected: {envelope}"));
        }
        let error = &envelope["error"];
        if error["code"] != json!("VALIDATION_ERROR") {
            return Err(anyhow!("expected VALIDATION_ERROR: {error}"));
        }
        let suggestions = error["additionalData"]["suggestions"]
            .as_array()
            .context("expected additionalData.suggestions array")?;
        if suggestions != &vec![json!("in-progress")] {
            return Err(anyhow!("expected suggestions=[\"in-progress\"]: {suggestions:?}"));
        }

        info!("scenario 2 passed");
        Ok(())
    }

    /// §8 scenario 3: completing the last active task in a feature
    /// cascades the feature to `completed`, which in turn cascades its
    /// parent project to `completed` as `childCascades`.
    async fn scenario_3_terminal_closure_with_cascade(&self) -> Result<()> {
        info!("scenario 3: terminal closure with cascade");

        // Seeded one step before their own terminal status so the
        // cascade's own transition is a single, valid sequential step
        // rather than a rejected skip.
        let project = self.create("project", json!({ "name": "P", "summary": "project", "status": "testing" })).await?;
        let project_id = project["id"].as_str().unwrap().to_string();

        let feature = self
            .create(
                "feature",
                json!({ "name": "F", "summary": "feature", "status": "testing", "projectId": project_id }),
            )
            .await?;
        let feature_id = feature["id"].as_str().unwrap().to_string();

        let t1 = self
            .create(
                "task",
                json!({ "name": "T1", "summary": "already done", "status": "completed", "projectId": project_id, "featureId": feature_id }),
            )
            .await?;
        let _ = t1["id"].as_str().unwrap();

        let t2 = self
            .create(
                "task",
                json!({ "name": "T2", "summary": "in flight", "status": "in-progress", "projectId": project_id, "featureId": feature_id }),
            )
            .await?;
        let t2_id = t2["id"].as_str().unwrap().to_string();

        // Advance T2 one sequential step at a time: in-progress -> testing -> completed.
        let advance = self.request_transition(&t2_id, "task", "testing", None).await?;
        if advance["success"] != json!(true) {
            return Err(anyhow!("expected T2 to reach testing: {advance}"));
        }

        let summary = "x".repeat(350);
        let completion = self.request_transition(&t2_id, "task", "completed", Some(&summary)).await?;
        if completion["success"] != json!(true) {
            return Err(anyhow!("expected T2 completion to succeed: {completion}"));
        }
        let data = &completion["data"];

        let cascades = data["cascadeEvents"].as_array().context("expected cascadeEvents array")?;
        let feature_cascade = cascades
            .iter()
            .find(|c| c["event"] == json!("all_tasks_complete"))
            .context("expected an all_tasks_complete cascade event")?;
        if feature_cascade["targetType"] != json!("feature")
            || feature_cascade["applied"] != json!(true)
            || feature_cascade["suggestedStatus"] != json!("completed")
        {
            return Err(anyhow!("unexpected feature cascade shape: {feature_cascade}"));
        }

        let child_cascades = feature_cascade["childCascades"].as_array().context("expected childCascades array")?;
        let project_cascade = child_cascades
            .iter()
            .find(|c| c["event"] == json!("all_features_complete"))
            .context("expected an all_features_complete child cascade")?;
        if project_cascade["targetType"] != json!("project") || project_cascade["applied"] != json!(true) {
            return Err(anyhow!("unexpected project cascade shape: {project_cascade}"));
        }

        info!("scenario 3 passed");
        Ok(())
    }

    /// §8 scenario 4: a completion summary outside 300-500 characters is
    /// rejected with the character count in the error message.
    async fn scenario_4_completion_blocked_by_summary_length(&self) -> Result<()> {
        info!("scenario 4: completion blocked by summary length");

        let task = self.create("task", json!({ "name": "T-short-summary", "summary": "short summary task" })).await?;
        let task_id = task["id"].as_str().unwrap().to_string();

        self.request_transition(&task_id, "task", "in-progress", None).await?;
        self.request_transition(&task_id, "task", "testing", None).await?;

        let short_summary = "x".repeat(45);
        let envelope = self.request_transition(&task_id, "task", "completed", Some(&short_summary)).await?;
        if envelope["success"] != json!(false) {
            return Err(anyhow!("expected the short-summary completion to be rejected: {envelope}"));
        }
        let details = envelope["error"]["details"].as_str().unwrap_or_default();
        if !details.contains("300-500 characters (current: 45)") {
            return Err(anyhow!("expected the 300-500 character message, got: {details}"));
        }

        info!("scenario 4 passed");
        Ok(())
    }

    /// §8 scenario 6: a task with `requiresVerification=true` cannot
    /// reach a terminal status while its Verification section still has
    /// a failing criterion.
    async fn scenario_6_verification_gate(&self) -> Result<()> {
        info!("scenario 6: verification gate");

        let task = self
            .create(
                "task",
                json!({
                    "name": "T-verify",
                    "summary": "verification gate task",
                    "requiresVerification": true,
                    "templateIds": [self.verification_template_id.to_string()],
                }),
            )
            .await?;
        let task_id = task["id"].as_str().unwrap().to_string();

        self.request_transition(&task_id, "task", "in-progress", None).await?;
        self.request_transition(&task_id, "task", "testing", None).await?;

        let summary = "x".repeat(350);
        let envelope = self.request_transition(&task_id, "task", "completed", Some(&summary)).await?;
        if envelope["success"] != json!(false) {
            return Err(anyhow!("expected the verification gate to reject completion: {envelope}"));
        }
        let error = &envelope["error"];
        if error["code"] != json!("VALIDATION_ERROR") {
            return Err(anyhow!("expected VALIDATION_ERROR: {error}"));
        }
        if error["additionalData"]["gate"] != json!("verification") {
            return Err(anyhow!("expected additionalData.gate=\"verification\": {error}"));
        }
        let failing = error["additionalData"]["failingCriteria"]
            .as_array()
            .context("expected additionalData.failingCriteria array")?;
        if failing != &vec![json!("x")] {
            return Err(anyhow!("expected failingCriteria=[\"x\"]: {failing:?}"));
        }

        info!("scenario 6 passed");
        Ok(())
    }

    /// Smoke-tests `get_next_task` and `get_blocked_tasks` — not part of
    /// a named §8 scenario, but part of the six-tool surface and
    /// otherwise unexercised above.
    async fn scenario_7_next_task_and_blocked_tasks_smoke_test(&self) -> Result<()> {
        info!("scenario 7: get_next_task / get_blocked_tasks smoke test");

        let next_task = self.call("get_next_task", json!({ "limit": 5 })).await?;
        if next_task["success"] != json!(true) {
            return Err(anyhow!("expected get_next_task to succeed: {next_task}"));
        }
        next_task["data"]["tasks"].as_array().context("expected data.tasks array")?;

        let blocked = self.call("get_blocked_tasks", json!({})).await?;
        if blocked["success"] != json!(true) {
            return Err(anyhow!("expected get_blocked_tasks to succeed: {blocked}"));
        }
        blocked["data"]["tasks"].as_array().context("expected data.tasks array")?;

        info!("scenario 7 passed");
        Ok(())
    }
}

pub async fn run_rmcp_tests(args: RmcpTestArgs) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut harness = RmcpTestHarness::new(args).await?;
    harness.run_all_scenarios().await
}
