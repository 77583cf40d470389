//! The six MCP tools (§4.9/§6), bound via `rmcp`'s `#[tool_router]` on a
//! single handler generic over the repository bundle — the teacher
//! workspace's `RmcpTaskHandler<R, M, W>` shape, generalised to one
//! repository bound instead of three.

use std::path::PathBuf;
use std::sync::Arc;

use rmcp::model::{CallToolResult, ServerCapabilities, ServerInfo};
use rmcp::schemars::JsonSchema;
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use orchestrator_core::config::{ConfigLoader, WorkflowConfig};
use orchestrator_core::error::{OrchestratorError, Result as CoreResult};
use orchestrator_core::models::{
    EntityFilter, EntityType, Feature, NewTask, Priority, Project, Section, Status, Task,
    TemplateSection, UpdateTask,
};
use orchestrator_core::queries::{get_blocked_tasks, get_next_task};
use orchestrator_core::repository::Repositories;
use orchestrator_core::transition::{request_transition, request_transitions_batch, BatchTransitionItem};

use crate::dto;
use crate::envelope::to_call_tool_result;
use crate::locks::LockTable;

fn parse_entity_type(raw: &str) -> std::result::Result<EntityType, String> {
    match raw.to_ascii_lowercase().as_str() {
        "project" => Ok(EntityType::Project),
        "feature" => Ok(EntityType::Feature),
        "task" => Ok(EntityType::Task),
        other => Err(format!("unknown containerType '{other}'")),
    }
}

fn parse_priority(raw: &str) -> std::result::Result<Priority, String> {
    match raw.to_ascii_lowercase().as_str() {
        "high" => Ok(Priority::High),
        "medium" => Ok(Priority::Medium),
        "low" => Ok(Priority::Low),
        other => Err(format!("unknown priority '{other}'")),
    }
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',').map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect()
}

fn project_json(p: &Project) -> Value {
    serde_json::to_value(p).unwrap_or(Value::Null)
}

fn feature_json(f: &Feature) -> Value {
    serde_json::to_value(f).unwrap_or(Value::Null)
}

fn task_json(t: &Task) -> Value {
    serde_json::to_value(t).unwrap_or(Value::Null)
}

fn section_json(s: &Section) -> Value {
    serde_json::to_value(s).unwrap_or(Value::Null)
}

/// Parameters accepted by `manage_container` (§6): the union of every
/// create/update/delete/setStatus/bulkUpdate field across the three
/// container types.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ManageContainerRequest {
    #[schemars(description = "create | update | delete | setStatus | bulkUpdate")]
    pub operation: String,
    #[serde(rename = "containerType")]
    #[schemars(description = "project | feature | task")]
    pub container_type: String,
    #[schemars(description = "Target id for update/delete/setStatus")]
    pub id: Option<Uuid>,
    #[schemars(description = "Target ids for bulkUpdate (max 100)")]
    pub ids: Option<Vec<Uuid>>,
    #[serde(alias = "title")]
    pub name: Option<String>,
    #[schemars(description = "Short summary, at most 500 characters")]
    pub summary: Option<String>,
    pub description: Option<String>,
    #[schemars(description = "Desired status; for setStatus this is the transition trigger")]
    pub status: Option<String>,
    pub priority: Option<String>,
    #[schemars(description = "Task complexity, 1-10")]
    pub complexity: Option<u8>,
    #[serde(rename = "projectId")]
    pub project_id: Option<Uuid>,
    #[serde(rename = "featureId")]
    pub feature_id: Option<Uuid>,
    #[schemars(description = "Comma-separated tags")]
    pub tags: Option<String>,
    #[serde(rename = "templateIds")]
    pub template_ids: Option<Vec<Uuid>>,
    #[serde(rename = "requiresVerification")]
    pub requires_verification: Option<bool>,
    #[serde(rename = "deleteSections")]
    pub delete_sections: Option<bool>,
    #[serde(default)]
    pub force: bool,
    #[schemars(description = "Explicit transition trigger for setStatus, overriding `status`")]
    pub trigger: Option<String>,
    #[schemars(description = "Free-text note recorded against a setStatus transition")]
    pub transition_note: Option<String>,
}

/// Parameters accepted by `query_container` (§6).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueryContainerRequest {
    #[schemars(description = "get | search | export | overview")]
    pub operation: String,
    #[serde(rename = "containerType")]
    pub container_type: String,
    pub id: Option<Uuid>,
    #[schemars(description = "Free-text filter applied to title/summary")]
    pub query: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub tags: Option<String>,
    #[serde(rename = "projectId")]
    pub project_id: Option<Uuid>,
    #[serde(rename = "featureId")]
    pub feature_id: Option<Uuid>,
    pub limit: Option<u32>,
    #[serde(rename = "includeSections")]
    pub include_sections: Option<bool>,
    #[serde(rename = "summaryLength")]
    pub summary_length: Option<u32>,
}

/// One item of a `request_transition` batch.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TransitionItemRequest {
    #[serde(rename = "containerId")]
    pub container_id: Uuid,
    #[serde(rename = "containerType")]
    pub container_type: String,
    pub trigger: String,
    pub summary: Option<String>,
}

/// `request_transition` accepts either a single item or a batch (§6);
/// mutually exclusive.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RequestTransitionRequest {
    #[serde(rename = "containerId")]
    pub container_id: Option<Uuid>,
    #[serde(rename = "containerType")]
    pub container_type: Option<String>,
    pub trigger: Option<String>,
    pub summary: Option<String>,
    pub transitions: Option<Vec<TransitionItemRequest>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetNextStatusRequest {
    #[serde(rename = "containerId")]
    pub container_id: Uuid,
    #[serde(rename = "containerType")]
    pub container_type: String,
    #[serde(rename = "currentStatus")]
    pub current_status: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetNextTaskRequest {
    #[serde(rename = "projectId")]
    pub project_id: Option<Uuid>,
    #[serde(rename = "featureId")]
    pub feature_id: Option<Uuid>,
    #[schemars(description = "1-20, default 1")]
    pub limit: Option<u32>,
    #[serde(rename = "includeDetails")]
    pub include_details: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetBlockedTasksRequest {
    #[serde(rename = "projectId")]
    pub project_id: Option<Uuid>,
    #[serde(rename = "featureId")]
    pub feature_id: Option<Uuid>,
}

/// Bound to a single repository implementation for the life of the
/// process (mirrors the teacher's `RmcpTaskHandler<R, M, W>`).
#[derive(Clone)]
pub struct OrchestratorHandler<R> {
    repos: Arc<R>,
    config_loader: Arc<ConfigLoader>,
    working_dir: PathBuf,
    locks: Arc<LockTable>,
    tool_router: rmcp::handler::server::router::tool::ToolRouter<Self>,
}

impl<R: Repositories + 'static> OrchestratorHandler<R> {
    pub fn new(repos: Arc<R>, config_loader: Arc<ConfigLoader>, working_dir: PathBuf) -> Self {
        Self {
            repos,
            config_loader,
            working_dir,
            locks: Arc::new(LockTable::new()),
            tool_router: Self::tool_router(),
        }
    }

    fn config(&self) -> WorkflowConfig {
        self.config_loader.load(&self.working_dir)
    }

    async fn expand_templates(&self, entity_type: EntityType, entity_id: Uuid, template_ids: &[Uuid]) -> CoreResult<u64> {
        let mut created = 0u64;
        for template_id in template_ids {
            let Some(template) = self.repos.templates().get_by_id(*template_id).await? else {
                continue;
            };
            for TemplateSection { title, ordinal, content_format, content, usage_description, tags } in template.sections {
                self.repos
                    .sections()
                    .create(Section {
                        id: Uuid::new_v4(),
                        entity_type,
                        entity_id,
                        title,
                        ordinal,
                        content_format,
                        content,
                        usage_description,
                        tags,
                    })
                    .await?;
                created += 1;
            }
        }
        Ok(created)
    }

    async fn do_create(&self, req: &ManageContainerRequest, entity_type: EntityType) -> CoreResult<Value> {
        let tags = req.tags.as_deref().map(split_tags).unwrap_or_default();
        let priority = req.priority.as_deref().map(parse_priority).transpose().map_err(OrchestratorError::Validation)?
            .unwrap_or(Priority::Medium);
        let name = req.name.clone().ok_or_else(|| OrchestratorError::empty_field("name"))?;
        let now = chrono::Utc::now();

        let (json, new_id) = match entity_type {
            EntityType::Project => {
                let project = Project {
                    id: Uuid::new_v4(),
                    name,
                    summary: req.summary.clone().unwrap_or_default(),
                    description: req.description.clone(),
                    status: Status::new(req.status.as_deref().unwrap_or("pending")),
                    tags,
                    created_at: now,
                    modified_at: now,
                };
                let created = self.repos.projects().create(project).await?;
                (project_json(&created), created.id)
            }
            EntityType::Feature => {
                let feature = Feature {
                    id: Uuid::new_v4(),
                    name,
                    summary: req.summary.clone().unwrap_or_default(),
                    description: req.description.clone(),
                    status: Status::new(req.status.as_deref().unwrap_or("pending")),
                    priority,
                    project_id: req.project_id,
                    requires_verification: req.requires_verification.unwrap_or(false),
                    tags,
                    created_at: now,
                    modified_at: now,
                };
                let created = self.repos.features().create(feature).await?;
                (feature_json(&created), created.id)
            }
            EntityType::Task => {
                let new_task = NewTask {
                    title: name,
                    summary: req.summary.clone().unwrap_or_default(),
                    description: req.description.clone(),
                    status: req.status.as_deref().map(Status::new),
                    priority,
                    complexity: req.complexity.unwrap_or(5),
                    project_id: req.project_id,
                    feature_id: req.feature_id,
                    requires_verification: req.requires_verification.unwrap_or(false),
                    tags,
                };
                let created = self.repos.tasks().create(new_task).await?;
                (task_json(&created), created.id)
            }
        };

        if let Some(template_ids) = &req.template_ids {
            self.expand_templates(entity_type, new_id, template_ids).await?;
        }
        Ok(json)
    }

    fn build_update(req: &ManageContainerRequest) -> UpdateTask {
        UpdateTask {
            title: req.name.clone(),
            summary: req.summary.clone(),
            description: req.description.clone(),
            priority: req.priority.as_deref().and_then(|p| parse_priority(p).ok()),
            complexity: req.complexity,
            project_id: req.project_id,
            feature_id: req.feature_id,
            requires_verification: req.requires_verification,
            tags: req.tags.as_deref().map(split_tags),
            delete_sections: req.delete_sections.unwrap_or(true),
            force: req.force,
        }
    }

    async fn do_update(&self, id: Uuid, req: &ManageContainerRequest, entity_type: EntityType) -> CoreResult<Value> {
        let _guard = self.locks.acquire(entity_type, id).await;
        let updates = Self::build_update(req);
        Ok(match entity_type {
            EntityType::Project => project_json(&self.repos.projects().update(id, updates).await?),
            EntityType::Feature => feature_json(&self.repos.features().update(id, updates).await?),
            EntityType::Task => task_json(&self.repos.tasks().update(id, updates).await?),
        })
    }

    async fn do_delete(&self, id: Uuid, entity_type: EntityType) -> CoreResult<Value> {
        let _guard = self.locks.acquire(entity_type, id).await;
        match entity_type {
            EntityType::Project => self.repos.projects().delete(id).await?,
            EntityType::Feature => self.repos.features().delete(id).await?,
            EntityType::Task => self.repos.tasks().delete(id).await?,
        }
        Ok(json!({ "id": id.to_string(), "deleted": true }))
    }

    async fn do_bulk_update(&self, ids: &[Uuid], req: &ManageContainerRequest, entity_type: EntityType) -> Value {
        let updates = Self::build_update(req);
        let mut results = Vec::with_capacity(ids.len());
        let mut succeeded = 0u64;
        for id in ids {
            let _guard = self.locks.acquire(entity_type, *id).await;
            let outcome = match entity_type {
                EntityType::Project => self.repos.projects().update(*id, updates.clone()).await.map(|p| project_json(&p)),
                EntityType::Feature => self.repos.features().update(*id, updates.clone()).await.map(|f| feature_json(&f)),
                EntityType::Task => self.repos.tasks().update(*id, updates.clone()).await.map(|t| task_json(&t)),
            };
            match outcome {
                Ok(value) => {
                    succeeded += 1;
                    results.push(json!({ "id": id.to_string(), "success": true, "data": value }));
                }
                Err(err) => {
                    results.push(json!({ "id": id.to_string(), "success": false, "error": err.details() }));
                }
            }
        }
        json!({ "total": ids.len(), "succeeded": succeeded, "failed": ids.len() as u64 - succeeded, "results": results })
    }

    async fn do_set_status(&self, id: Uuid, req: &ManageContainerRequest, entity_type: EntityType) -> std::result::Result<Value, orchestrator_core::transition::TransitionError> {
        let trigger = req
            .trigger
            .clone()
            .or_else(|| req.status.clone())
            .unwrap_or_default();
        let _guard = self.locks.acquire(entity_type, id).await;
        let config = self.config();
        match request_transition(&*self.repos, &config, id, entity_type, &trigger, req.transition_note.clone()).await {
            Ok(result) => {
                if let Some(error) = &result.error {
                    Err(error.clone())
                } else {
                    Ok(dto::transition_result_json(&result))
                }
            }
            Err(err) => Err(orchestrator_core::transition::TransitionError {
                code: err.code(),
                details: err.details(),
                suggestions: Vec::new(),
                gate: None,
                failing_criteria: Vec::new(),
            }),
        }
    }

    async fn do_get(&self, id: Uuid, entity_type: EntityType, include_sections: bool) -> CoreResult<Value> {
        let mut payload = match entity_type {
            EntityType::Project => match self.repos.projects().get_by_id(id).await? {
                Some(p) => project_json(&p),
                None => return Err(OrchestratorError::not_found_kind("project", id)),
            },
            EntityType::Feature => match self.repos.features().get_by_id(id).await? {
                Some(f) => feature_json(&f),
                None => return Err(OrchestratorError::not_found_kind("feature", id)),
            },
            EntityType::Task => match self.repos.tasks().get_by_id(id).await? {
                Some(t) => task_json(&t),
                None => return Err(OrchestratorError::not_found_kind("task", id)),
            },
        };
        if include_sections {
            let sections = self.repos.sections().find_by_entity(entity_type, id).await?;
            payload["sections"] = Value::Array(sections.iter().map(section_json).collect());
        }
        Ok(payload)
    }

    fn build_filter(req: &QueryContainerRequest) -> std::result::Result<EntityFilter, String> {
        Ok(EntityFilter {
            project_id: req.project_id,
            feature_id: req.feature_id,
            status: req.status.as_deref().map(Status::new),
            priority: req.priority.as_deref().map(parse_priority).transpose()?,
            tags: req.tags.as_deref().map(split_tags),
            text_query: req.query.clone(),
            limit: Some(req.limit.unwrap_or(20)),
        })
    }

    async fn do_search(&self, filter: EntityFilter, entity_type: EntityType) -> CoreResult<Value> {
        Ok(match entity_type {
            EntityType::Project => Value::Array(self.repos.projects().find_by_filters(filter).await?.iter().map(project_json).collect()),
            EntityType::Feature => Value::Array(self.repos.features().find_by_filters(filter).await?.iter().map(feature_json).collect()),
            EntityType::Task => Value::Array(self.repos.tasks().find_by_filters(filter).await?.iter().map(task_json).collect()),
        })
    }

    async fn do_export(&self, filter: EntityFilter, entity_type: EntityType) -> CoreResult<Value> {
        let mut rows = Vec::new();
        match entity_type {
            EntityType::Project => {
                for p in self.repos.projects().find_by_filters(filter).await? {
                    let sections = self.repos.sections().find_by_entity(entity_type, p.id).await?;
                    let mut row = project_json(&p);
                    row["sections"] = Value::Array(sections.iter().map(section_json).collect());
                    rows.push(row);
                }
            }
            EntityType::Feature => {
                for f in self.repos.features().find_by_filters(filter).await? {
                    let sections = self.repos.sections().find_by_entity(entity_type, f.id).await?;
                    let mut row = feature_json(&f);
                    row["sections"] = Value::Array(sections.iter().map(section_json).collect());
                    rows.push(row);
                }
            }
            EntityType::Task => {
                for t in self.repos.tasks().find_by_filters(filter).await? {
                    let sections = self.repos.sections().find_by_entity(entity_type, t.id).await?;
                    let mut row = task_json(&t);
                    row["sections"] = Value::Array(sections.iter().map(section_json).collect());
                    rows.push(row);
                }
            }
        }
        Ok(Value::Array(rows))
    }

    async fn do_overview(&self, id: Uuid, entity_type: EntityType, summary_length: usize) -> CoreResult<Value> {
        let truncate = |s: &str| -> String {
            if summary_length == 0 || s.chars().count() <= summary_length {
                s.to_string()
            } else {
                s.chars().take(summary_length).collect::<String>() + "…"
            }
        };
        match entity_type {
            EntityType::Project => {
                let project = self.repos.projects().get_by_id(id).await?.ok_or_else(|| OrchestratorError::not_found_kind("project", id))?;
                let counts = self.repos.features().get_feature_counts_by_project_id(id).await?;
                let total: u64 = counts.values().map(|c| c.total).sum();
                Ok(json!({
                    "id": project.id.to_string(),
                    "name": project.name,
                    "summary": truncate(&project.summary),
                    "status": project.status.as_str(),
                    "featureCount": counts.len(),
                    "totalTasks": total,
                    "taskCountsByFeature": counts.into_iter().map(|(id, c)| (id.to_string(), c)).collect::<std::collections::HashMap<_, _>>(),
                }))
            }
            EntityType::Feature => {
                let feature = self.repos.features().get_by_id(id).await?.ok_or_else(|| OrchestratorError::not_found_kind("feature", id))?;
                let counts = self.repos.tasks().get_task_counts_by_feature_id(id).await?;
                Ok(json!({
                    "id": feature.id.to_string(),
                    "name": feature.name,
                    "summary": truncate(&feature.summary),
                    "status": feature.status.as_str(),
                    "taskCounts": counts,
                }))
            }
            EntityType::Task => {
                let task = self.repos.tasks().get_by_id(id).await?.ok_or_else(|| OrchestratorError::not_found_kind("task", id))?;
                Ok(json!({
                    "id": task.id.to_string(),
                    "title": task.title,
                    "summary": truncate(&task.summary),
                    "status": task.status.as_str(),
                    "priority": task.priority,
                    "complexity": task.complexity,
                }))
            }
        }
    }
}

#[tool_router]
impl<R: Repositories + 'static> OrchestratorHandler<R> {
    #[tool(description = "Create, update, delete, set the status of, or bulk-update a project/feature/task container")]
    async fn manage_container(&self, request: ManageContainerRequest) -> std::result::Result<CallToolResult, McpError> {
        let entity_type = match parse_entity_type(&request.container_type) {
            Ok(t) => t,
            Err(message) => {
                let envelope: orchestrator_core::dispatch::Envelope<Value> =
                    orchestrator_core::dispatch::Envelope::failure("Invalid container type", "VALIDATION_ERROR", message);
                return Ok(to_call_tool_result(&envelope));
            }
        };

        let result: std::result::Result<Value, OrchestratorError> = match request.operation.as_str() {
            "create" => self.do_create(&request, entity_type).await,
            "update" => match request.id {
                Some(id) => self.do_update(id, &request, entity_type).await,
                None => Err(OrchestratorError::Validation("'id' is required for update".into())),
            },
            "delete" => match request.id {
                Some(id) => self.do_delete(id, entity_type).await,
                None => Err(OrchestratorError::Validation("'id' is required for delete".into())),
            },
            "setStatus" => match request.id {
                Some(id) => match self.do_set_status(id, &request, entity_type).await {
                    Ok(value) => Ok(value),
                    Err(transition_error) => {
                        let envelope: orchestrator_core::dispatch::Envelope<Value> = orchestrator_core::dispatch::Envelope {
                            success: false,
                            message: "Transition rejected".to_string(),
                            data: None,
                            error: Some((&transition_error).into()),
                        };
                        return Ok(to_call_tool_result(&envelope));
                    }
                },
                None => Err(OrchestratorError::Validation("'id' is required for setStatus".into())),
            },
            "bulkUpdate" => match &request.ids {
                Some(ids) if ids.len() <= 100 => Ok(self.do_bulk_update(ids, &request, entity_type).await),
                Some(_) => Err(OrchestratorError::Validation("bulkUpdate accepts at most 100 ids".into())),
                None => Err(OrchestratorError::Validation("'ids' is required for bulkUpdate".into())),
            },
            other => Err(OrchestratorError::Validation(format!("unknown operation '{other}'"))),
        };

        let envelope: orchestrator_core::dispatch::Envelope<Value> = match result {
            Ok(data) => orchestrator_core::dispatch::Envelope::ok("ok", data),
            Err(err) => orchestrator_core::dispatch::Envelope {
                success: false,
                message: "Operation failed".to_string(),
                data: None,
                error: Some((&err).into()),
            },
        };
        Ok(to_call_tool_result(&envelope))
    }

    #[tool(description = "Retrieve, search, export, or summarise project/feature/task containers (read-only)")]
    async fn query_container(&self, request: QueryContainerRequest) -> std::result::Result<CallToolResult, McpError> {
        let entity_type = match parse_entity_type(&request.container_type) {
            Ok(t) => t,
            Err(message) => {
                let envelope: orchestrator_core::dispatch::Envelope<Value> =
                    orchestrator_core::dispatch::Envelope::failure("Invalid container type", "VALIDATION_ERROR", message);
                return Ok(to_call_tool_result(&envelope));
            }
        };

        let result: std::result::Result<Value, OrchestratorError> = match request.operation.as_str() {
            "get" => match request.id {
                Some(id) => self.do_get(id, entity_type, request.include_sections.unwrap_or(false)).await,
                None => Err(OrchestratorError::Validation("'id' is required for get".into())),
            },
            "search" => match Self::build_filter(&request) {
                Ok(filter) => self.do_search(filter, entity_type).await,
                Err(message) => Err(OrchestratorError::Validation(message)),
            },
            "export" => match Self::build_filter(&request) {
                Ok(filter) => self.do_export(filter, entity_type).await,
                Err(message) => Err(OrchestratorError::Validation(message)),
            },
            "overview" => match request.id {
                Some(id) => {
                    let len = request.summary_length.unwrap_or(200).min(200) as usize;
                    self.do_overview(id, entity_type, len).await
                }
                None => Err(OrchestratorError::Validation("'id' is required for overview".into())),
            },
            other => Err(OrchestratorError::Validation(format!("unknown operation '{other}'"))),
        };

        let envelope: orchestrator_core::dispatch::Envelope<Value> = match result {
            Ok(data) => orchestrator_core::dispatch::Envelope::ok("ok", data),
            Err(err) => orchestrator_core::dispatch::Envelope {
                success: false,
                message: "Query failed".to_string(),
                data: None,
                error: Some((&err).into()),
            },
        };
        Ok(to_call_tool_result(&envelope))
    }

    #[tool(description = "Apply a single status transition, or a batch of transitions, to one or more containers")]
    async fn request_transition(&self, request: RequestTransitionRequest) -> std::result::Result<CallToolResult, McpError> {
        let config = self.config();

        if let Some(items) = request.transitions {
            let mut parsed = Vec::with_capacity(items.len());
            for item in items {
                let entity_type = match parse_entity_type(&item.container_type) {
                    Ok(t) => t,
                    Err(message) => {
                        let envelope: orchestrator_core::dispatch::Envelope<Value> =
                            orchestrator_core::dispatch::Envelope::failure("Invalid container type in batch", "VALIDATION_ERROR", message);
                        return Ok(to_call_tool_result(&envelope));
                    }
                };
                parsed.push((item.container_id, entity_type, item.trigger, item.summary));
            }

            let mut guards = Vec::with_capacity(parsed.len());
            let mut batch_items = Vec::with_capacity(parsed.len());
            for (container_id, container_type, trigger, summary) in parsed {
                guards.push(self.locks.acquire(container_type, container_id).await);
                batch_items.push(BatchTransitionItem { container_id, container_type, trigger, summary });
            }

            return match request_transitions_batch(&*self.repos, &config, batch_items).await {
                Ok((results, summary)) => {
                    let payload = json!({
                        "results": results.iter().map(dto::transition_result_json).collect::<Vec<_>>(),
                        "summary": dto::batch_summary_json(&summary),
                    });
                    let envelope: orchestrator_core::dispatch::Envelope<Value> = orchestrator_core::dispatch::Envelope::ok("batch processed", payload);
                    Ok(to_call_tool_result(&envelope))
                }
                Err(err) => {
                    let envelope: orchestrator_core::dispatch::Envelope<Value> = orchestrator_core::dispatch::Envelope {
                        success: false,
                        message: "Batch transition failed".to_string(),
                        data: None,
                        error: Some((&err).into()),
                    };
                    Ok(to_call_tool_result(&envelope))
                }
            };
        }

        let (Some(container_id), Some(container_type_raw), Some(trigger)) =
            (request.container_id, request.container_type.clone(), request.trigger.clone())
        else {
            let envelope: orchestrator_core::dispatch::Envelope<Value> = orchestrator_core::dispatch::Envelope::failure(
                "Invalid request",
                "VALIDATION_ERROR",
                "expected either {containerId, containerType, trigger} or {transitions: [...]}",
            );
            return Ok(to_call_tool_result(&envelope));
        };

        let entity_type = match parse_entity_type(&container_type_raw) {
            Ok(t) => t,
            Err(message) => {
                let envelope: orchestrator_core::dispatch::Envelope<Value> =
                    orchestrator_core::dispatch::Envelope::failure("Invalid container type", "VALIDATION_ERROR", message);
                return Ok(to_call_tool_result(&envelope));
            }
        };

        let _guard = self.locks.acquire(entity_type, container_id).await;
        let envelope: orchestrator_core::dispatch::Envelope<Value> =
            match request_transition(&*self.repos, &config, container_id, entity_type, &trigger, request.summary).await {
                Ok(result) if result.error.is_none() => {
                    orchestrator_core::dispatch::Envelope::ok(result.message.clone(), dto::transition_result_json(&result))
                }
                Ok(result) => orchestrator_core::dispatch::Envelope {
                    success: false,
                    message: result.message.clone(),
                    data: None,
                    error: result.error.as_ref().map(Into::into),
                },
                Err(err) => orchestrator_core::dispatch::Envelope {
                    success: false,
                    message: "Transition failed".to_string(),
                    data: None,
                    error: Some((&err).into()),
                },
            };
        Ok(to_call_tool_result(&envelope))
    }

    #[tool(description = "Recommend the next status for a container given its current flow position")]
    async fn get_next_status(&self, request: GetNextStatusRequest) -> std::result::Result<CallToolResult, McpError> {
        let entity_type = match parse_entity_type(&request.container_type) {
            Ok(t) => t,
            Err(message) => {
                let envelope: orchestrator_core::dispatch::Envelope<Value> =
                    orchestrator_core::dispatch::Envelope::failure("Invalid container type", "VALIDATION_ERROR", message);
                return Ok(to_call_tool_result(&envelope));
            }
        };
        let config = self.config();
        let envelope: orchestrator_core::dispatch::Envelope<Value> = match orchestrator_core::transition::get_next_status(
            &*self.repos,
            &config,
            request.container_id,
            entity_type,
            request.current_status.as_deref(),
            request.tags.as_deref(),
        )
        .await
        {
            Ok(recommendation) => orchestrator_core::dispatch::Envelope::ok("ok", dto::next_status_json(&recommendation)),
            Err(err) => orchestrator_core::dispatch::Envelope {
                success: false,
                message: "Could not determine next status".to_string(),
                data: None,
                error: Some((&err).into()),
            },
        };
        Ok(to_call_tool_result(&envelope))
    }

    #[tool(description = "Return the highest-priority, unblocked task(s) available to work on next")]
    async fn get_next_task(&self, request: GetNextTaskRequest) -> std::result::Result<CallToolResult, McpError> {
        let limit = request.limit.unwrap_or(1).clamp(1, 20);
        let include_details = request.include_details.unwrap_or(false);
        let envelope: orchestrator_core::dispatch::Envelope<Value> =
            match get_next_task(&*self.repos, request.project_id, request.feature_id, limit).await {
                Ok(tasks) => {
                    let rendered: Vec<Value> = if include_details {
                        tasks.iter().map(task_json).collect()
                    } else {
                        tasks
                            .iter()
                            .map(|t| json!({ "id": t.id.to_string(), "title": t.title, "priority": t.priority, "complexity": t.complexity }))
                            .collect()
                    };
                    orchestrator_core::dispatch::Envelope::ok("ok", json!({ "tasks": rendered }))
                }
                Err(err) => orchestrator_core::dispatch::Envelope {
                    success: false,
                    message: "Could not determine next task".to_string(),
                    data: None,
                    error: Some((&err).into()),
                },
            };
        Ok(to_call_tool_result(&envelope))
    }

    #[tool(description = "List tasks that have at least one incomplete inbound blocking dependency")]
    async fn get_blocked_tasks(&self, request: GetBlockedTasksRequest) -> std::result::Result<CallToolResult, McpError> {
        let envelope: orchestrator_core::dispatch::Envelope<Value> =
            match get_blocked_tasks(&*self.repos, request.project_id, request.feature_id).await {
                Ok(tasks) => orchestrator_core::dispatch::Envelope::ok(
                    "ok",
                    json!({ "tasks": tasks.iter().map(task_json).collect::<Vec<_>>() }),
                ),
                Err(err) => orchestrator_core::dispatch::Envelope {
                    success: false,
                    message: "Could not list blocked tasks".to_string(),
                    data: None,
                    error: Some((&err).into()),
                },
            };
        Ok(to_call_tool_result(&envelope))
    }
}

#[tool_handler]
impl<R: Repositories + 'static> ServerHandler for OrchestratorHandler<R> {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "A task-orchestration MCP server exposing project/feature/task containers, \
                 status-flow transitions with cascade propagation, and dependency-aware task \
                 queueing."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
        }
    }
}
