use chrono::{DateTime, Utc};
use orchestrator_core::error::OrchestratorError;
use orchestrator_core::models::{
    ContentFormat, Dependency, DependencyType, EntityType, Feature, Priority, Project, Role,
    RoleTransition, Section, Status, Task,
};
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

pub fn entity_type_to_string(entity_type: EntityType) -> &'static str {
    match entity_type {
        EntityType::Project => "project",
        EntityType::Feature => "feature",
        EntityType::Task => "task",
    }
}

pub fn string_to_entity_type(s: &str) -> orchestrator_core::error::Result<EntityType> {
    match s {
        "project" => Ok(EntityType::Project),
        "feature" => Ok(EntityType::Feature),
        "task" => Ok(EntityType::Task),
        other => Err(OrchestratorError::Database(format!(
            "invalid entity_type in database row: {other}"
        ))),
    }
}

pub fn priority_to_string(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "high",
        Priority::Medium => "medium",
        Priority::Low => "low",
    }
}

pub fn string_to_priority(s: &str) -> orchestrator_core::error::Result<Priority> {
    match s {
        "high" => Ok(Priority::High),
        "medium" => Ok(Priority::Medium),
        "low" => Ok(Priority::Low),
        other => Err(OrchestratorError::Database(format!(
            "invalid priority in database row: {other}"
        ))),
    }
}

pub fn content_format_to_string(format: ContentFormat) -> &'static str {
    match format {
        ContentFormat::Markdown => "markdown",
        ContentFormat::Json => "json",
        ContentFormat::Plain => "plain",
    }
}

pub fn string_to_content_format(s: &str) -> orchestrator_core::error::Result<ContentFormat> {
    match s {
        "markdown" => Ok(ContentFormat::Markdown),
        "json" => Ok(ContentFormat::Json),
        "plain" => Ok(ContentFormat::Plain),
        other => Err(OrchestratorError::Database(format!(
            "invalid content_format in database row: {other}"
        ))),
    }
}

pub fn dependency_type_to_string(kind: DependencyType) -> &'static str {
    match kind {
        DependencyType::Blocks => "BLOCKS",
        DependencyType::IsBlockedBy => "IS_BLOCKED_BY",
        DependencyType::RelatesTo => "RELATES_TO",
    }
}

pub fn string_to_dependency_type(s: &str) -> orchestrator_core::error::Result<DependencyType> {
    match s {
        "BLOCKS" => Ok(DependencyType::Blocks),
        "IS_BLOCKED_BY" => Ok(DependencyType::IsBlockedBy),
        "RELATES_TO" => Ok(DependencyType::RelatesTo),
        other => Err(OrchestratorError::Database(format!(
            "invalid dependency_type in database row: {other}"
        ))),
    }
}

pub fn role_to_string(role: Role) -> &'static str {
    match role {
        Role::Queue => "queue",
        Role::Work => "work",
        Role::Review => "review",
        Role::Terminal => "terminal",
        Role::Blocked => "blocked",
    }
}

pub fn tags_to_json(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}

pub fn tags_from_json(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

pub fn row_to_project(row: &SqliteRow) -> orchestrator_core::error::Result<Project> {
    let id: String = row.get("id");
    let tags: String = row.get("tags");
    Ok(Project {
        id: parse_uuid(&id)?,
        name: row.get("name"),
        summary: row.get("summary"),
        description: row.get("description"),
        status: Status::new(row.get::<String, _>("status")),
        tags: tags_from_json(&tags),
        created_at: row.get("created_at"),
        modified_at: row.get("modified_at"),
    })
}

pub fn row_to_feature(row: &SqliteRow) -> orchestrator_core::error::Result<Feature> {
    let id: String = row.get("id");
    let tags: String = row.get("tags");
    let project_id: Option<String> = row.get("project_id");
    Ok(Feature {
        id: parse_uuid(&id)?,
        name: row.get("name"),
        summary: row.get("summary"),
        description: row.get("description"),
        status: Status::new(row.get::<String, _>("status")),
        priority: string_to_priority(&row.get::<String, _>("priority"))?,
        project_id: project_id.map(|p| parse_uuid(&p)).transpose()?,
        requires_verification: row.get::<i64, _>("requires_verification") != 0,
        tags: tags_from_json(&tags),
        created_at: row.get("created_at"),
        modified_at: row.get("modified_at"),
    })
}

pub fn row_to_task(row: &SqliteRow) -> orchestrator_core::error::Result<Task> {
    let id: String = row.get("id");
    let tags: String = row.get("tags");
    let project_id: Option<String> = row.get("project_id");
    let feature_id: Option<String> = row.get("feature_id");
    Ok(Task {
        id: parse_uuid(&id)?,
        title: row.get("title"),
        summary: row.get("summary"),
        description: row.get("description"),
        status: Status::new(row.get::<String, _>("status")),
        priority: string_to_priority(&row.get::<String, _>("priority"))?,
        complexity: row.get::<i64, _>("complexity") as u8,
        project_id: project_id.map(|p| parse_uuid(&p)).transpose()?,
        feature_id: feature_id.map(|f| parse_uuid(&f)).transpose()?,
        requires_verification: row.get::<i64, _>("requires_verification") != 0,
        tags: tags_from_json(&tags),
        created_at: row.get("created_at"),
        modified_at: row.get("modified_at"),
    })
}

pub fn row_to_section(row: &SqliteRow) -> orchestrator_core::error::Result<Section> {
    let id: String = row.get("id");
    let entity_id: String = row.get("entity_id");
    let tags: String = row.get("tags");
    Ok(Section {
        id: parse_uuid(&id)?,
        entity_type: string_to_entity_type(&row.get::<String, _>("entity_type"))?,
        entity_id: parse_uuid(&entity_id)?,
        title: row.get("title"),
        ordinal: row.get::<i64, _>("ordinal") as i32,
        content_format: string_to_content_format(&row.get::<String, _>("content_format"))?,
        content: row.get("content"),
        usage_description: row.get("usage_description"),
        tags: tags_from_json(&tags),
    })
}

pub fn row_to_dependency(row: &SqliteRow) -> orchestrator_core::error::Result<Dependency> {
    let id: String = row.get("id");
    let from_task_id: String = row.get("from_task_id");
    let to_task_id: String = row.get("to_task_id");
    let unblock_at: Option<String> = row.get("unblock_at");
    Ok(Dependency {
        id: parse_uuid(&id)?,
        from_task_id: parse_uuid(&from_task_id)?,
        to_task_id: parse_uuid(&to_task_id)?,
        dependency_type: string_to_dependency_type(&row.get::<String, _>("dependency_type"))?,
        unblock_at: unblock_at.and_then(|r| Role::parse(&r)),
    })
}

pub fn row_to_role_transition(row: &SqliteRow) -> orchestrator_core::error::Result<RoleTransition> {
    let id: String = row.get("id");
    let entity_id: String = row.get("entity_id");
    let from_role: Option<String> = row.get("from_role");
    let to_role: Option<String> = row.get("to_role");
    Ok(RoleTransition {
        id: parse_uuid(&id)?,
        entity_id: parse_uuid(&entity_id)?,
        entity_type: string_to_entity_type(&row.get::<String, _>("entity_type"))?,
        from_role: from_role.and_then(|r| Role::parse(&r)),
        to_role: to_role.and_then(|r| Role::parse(&r)),
        from_status: Status::new(row.get::<String, _>("from_status")),
        to_status: Status::new(row.get::<String, _>("to_status")),
        transitioned_at: row.get("transitioned_at"),
        trigger: row.get("trigger"),
        summary: row.get("summary"),
    })
}

fn parse_uuid(raw: &str) -> orchestrator_core::error::Result<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|err| OrchestratorError::Database(format!("invalid uuid '{raw}' in database row: {err}")))
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Map a `sqlx::Error` into the crate-wide domain error taxonomy,
/// distinguishing unique-constraint violations as conflicts.
pub fn sqlx_error_to_domain_error(err: sqlx::Error) -> OrchestratorError {
    match &err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message();
            if db_err.is_unique_violation() {
                OrchestratorError::Conflict(format!("unique constraint violated: {message}"))
            } else {
                OrchestratorError::Database(format!("database constraint error: {message}"))
            }
        }
        sqlx::Error::RowNotFound => OrchestratorError::NotFound("row not found".to_string()),
        sqlx::Error::PoolTimedOut => OrchestratorError::Database("connection pool timeout".to_string()),
        sqlx::Error::Io(io_err) => OrchestratorError::Database(format!("database I/O error: {io_err}")),
        _ => OrchestratorError::Database(format!("database operation failed: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip_through_json() {
        let tags = vec!["alpha".to_string(), "beta".to_string()];
        let json = tags_to_json(&tags);
        assert_eq!(tags_from_json(&json), tags);
    }

    #[test]
    fn priority_round_trips() {
        for p in [Priority::High, Priority::Medium, Priority::Low] {
            assert_eq!(string_to_priority(priority_to_string(p)).unwrap(), p);
        }
    }

    #[test]
    fn entity_type_round_trips() {
        for e in [EntityType::Project, EntityType::Feature, EntityType::Task] {
            assert_eq!(string_to_entity_type(entity_type_to_string(e)).unwrap(), e);
        }
    }
}
