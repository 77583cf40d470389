use crate::common::{
    content_format_to_string, dependency_type_to_string, entity_type_to_string, now,
    priority_to_string, role_to_string, row_to_dependency, row_to_feature, row_to_project,
    row_to_role_transition, row_to_section, row_to_task, sqlx_error_to_domain_error, tags_to_json,
};
use async_trait::async_trait;
use orchestrator_core::error::{OrchestratorError, Result};
use orchestrator_core::models::{
    Dependency, EntityFilter, EntityType, Feature, NewTask, Project, RoleTransition, Section,
    Status, Task, TaskCounts, Template, UpdateTask,
};
use orchestrator_core::repository::{
    DependencyRepository, FeatureRepository, ProjectRepository, Repositories,
    RoleTransitionRepository, SectionRepository, TaskRepository, TemplateRepository,
};
use sqlx::{migrate::MigrateDatabase, Row, Sqlite, SqlitePool};
use std::collections::HashMap;
use uuid::Uuid;

/// Opens (and, for file-backed databases, creates) a SQLite connection
/// pool with WAL mode and foreign keys enabled, per the teacher's
/// connection-setup convention.
async fn connect(database_url: &str) -> Result<SqlitePool> {
    let db_url = if database_url.starts_with(":memory:") || database_url.starts_with("sqlite://") {
        database_url.to_string()
    } else {
        format!("sqlite://{database_url}")
    };

    if !db_url.contains(":memory:") && !Sqlite::database_exists(&db_url).await.unwrap_or(false) {
        Sqlite::create_database(&db_url)
            .await
            .map_err(|err| OrchestratorError::Database(format!("failed to create database: {err}")))?;
    }

    let connect_options = if db_url.contains(":memory:") {
        sqlx::sqlite::SqliteConnectOptions::new()
            .filename(&db_url)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Memory)
            .busy_timeout(std::time::Duration::from_secs(5))
            .foreign_keys(true)
    } else {
        sqlx::sqlite::SqliteConnectOptions::new()
            .filename(db_url.replace("sqlite://", ""))
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .foreign_keys(true)
    };

    SqlitePool::connect_with(connect_options)
        .await
        .map_err(sqlx_error_to_domain_error)
}

#[derive(Debug, Clone)]
pub struct SqliteProjects(SqlitePool);

#[derive(Debug, Clone)]
pub struct SqliteFeatures(SqlitePool);

#[derive(Debug, Clone)]
pub struct SqliteTasks(SqlitePool);

#[derive(Debug, Clone)]
pub struct SqliteSections(SqlitePool);

#[derive(Debug, Clone)]
pub struct SqliteDependencies(SqlitePool);

#[derive(Debug, Clone)]
pub struct SqliteRoleTransitions(SqlitePool);

#[derive(Debug, Clone)]
pub struct SqliteTemplates(SqlitePool);

/// SQLite-backed implementation of every repository trait, sharing one
/// connection pool across the per-entity sub-repositories.
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
    projects: SqliteProjects,
    features: SqliteFeatures,
    tasks: SqliteTasks,
    sections: SqliteSections,
    dependencies: SqliteDependencies,
    role_transitions: SqliteRoleTransitions,
    templates: SqliteTemplates,
}

impl SqliteRepository {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = connect(database_url).await?;
        Ok(Self {
            projects: SqliteProjects(pool.clone()),
            features: SqliteFeatures(pool.clone()),
            tasks: SqliteTasks(pool.clone()),
            sections: SqliteSections(pool.clone()),
            dependencies: SqliteDependencies(pool.clone()),
            role_transitions: SqliteRoleTransitions(pool.clone()),
            templates: SqliteTemplates(pool.clone()),
            pool,
        })
    }

    /// Applies the bundled SQLite schema migration. Must be called once
    /// after construction, before any other method.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations/sqlite")
            .run(&self.pool)
            .await
            .map_err(|err| OrchestratorError::Database(format!("migration failed: {err}")))?;
        tracing::info!("storage migrations applied");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_domain_error)?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl Repositories for SqliteRepository {
    type Projects = SqliteProjects;
    type Features = SqliteFeatures;
    type Tasks = SqliteTasks;
    type Sections = SqliteSections;
    type Dependencies = SqliteDependencies;
    type RoleTransitions = SqliteRoleTransitions;
    type Templates = SqliteTemplates;

    fn projects(&self) -> &Self::Projects {
        &self.projects
    }
    fn features(&self) -> &Self::Features {
        &self.features
    }
    fn tasks(&self) -> &Self::Tasks {
        &self.tasks
    }
    fn sections(&self) -> &Self::Sections {
        &self.sections
    }
    fn dependencies(&self) -> &Self::Dependencies {
        &self.dependencies
    }
    fn role_transitions(&self) -> &Self::RoleTransitions {
        &self.role_transitions
    }
    fn templates(&self) -> &Self::Templates {
        &self.templates
    }
}

#[async_trait]
impl ProjectRepository for SqliteProjects {
    async fn create(&self, project: Project) -> Result<Project> {
        if project.name.trim().is_empty() {
            return Err(OrchestratorError::empty_field("name"));
        }

        let row = sqlx::query(
            r#"
            INSERT INTO projects (id, name, summary, description, status, tags, created_at, modified_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, name, summary, description, status, tags, created_at, modified_at
            "#,
        )
        .bind(project.id.to_string())
        .bind(&project.name)
        .bind(&project.summary)
        .bind(&project.description)
        .bind(project.status.as_str())
        .bind(tags_to_json(&project.tags))
        .bind(project.created_at)
        .bind(project.modified_at)
        .fetch_one(&self.0)
        .await
        .map_err(sqlx_error_to_domain_error)?;

        row_to_project(&row)
    }

    async fn update(&self, id: Uuid, updates: UpdateTask) -> Result<Project> {
        let mut builder: sqlx::QueryBuilder<Sqlite> = sqlx::QueryBuilder::new("UPDATE projects SET ");
        let mut has_updates = false;

        if let Some(title) = &updates.title {
            builder.push("name = ").push_bind(title.clone());
            has_updates = true;
        }
        if let Some(summary) = &updates.summary {
            push_comma(&mut builder, has_updates);
            builder.push("summary = ").push_bind(summary.clone());
            has_updates = true;
        }
        if let Some(description) = &updates.description {
            push_comma(&mut builder, has_updates);
            builder.push("description = ").push_bind(description.clone());
            has_updates = true;
        }
        if let Some(tags) = &updates.tags {
            push_comma(&mut builder, has_updates);
            builder.push("tags = ").push_bind(tags_to_json(tags));
            has_updates = true;
        }

        if !has_updates {
            return self
                .get_by_id(id)
                .await?
                .ok_or_else(|| OrchestratorError::not_found_kind("project", id));
        }

        builder.push(", modified_at = ").push_bind(now());
        builder.push(" WHERE id = ").push_bind(id.to_string());
        builder.push(" RETURNING id, name, summary, description, status, tags, created_at, modified_at");

        let row = builder
            .build()
            .fetch_optional(&self.0)
            .await
            .map_err(sqlx_error_to_domain_error)?
            .ok_or_else(|| OrchestratorError::not_found_kind("project", id))?;

        row_to_project(&row)
    }

    async fn set_status(&self, id: Uuid, status: Status) -> Result<Project> {
        let row = sqlx::query(
            "UPDATE projects SET status = ?, modified_at = ? WHERE id = ? \
             RETURNING id, name, summary, description, status, tags, created_at, modified_at",
        )
        .bind(status.as_str())
        .bind(now())
        .bind(id.to_string())
        .fetch_optional(&self.0)
        .await
        .map_err(sqlx_error_to_domain_error)?
        .ok_or_else(|| OrchestratorError::not_found_kind("project", id))?;

        row_to_project(&row)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.0)
            .await
            .map_err(sqlx_error_to_domain_error)?;
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Project>> {
        let row = sqlx::query(
            "SELECT id, name, summary, description, status, tags, created_at, modified_at FROM projects WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.0)
        .await
        .map_err(sqlx_error_to_domain_error)?;

        row.as_ref().map(row_to_project).transpose()
    }

    async fn find_by_filters(&self, filter: EntityFilter) -> Result<Vec<Project>> {
        let mut builder: sqlx::QueryBuilder<Sqlite> = sqlx::QueryBuilder::new(
            "SELECT id, name, summary, description, status, tags, created_at, modified_at FROM projects",
        );
        let mut has_conditions = false;

        if let Some(status) = &filter.status {
            push_where_or_and(&mut builder, &mut has_conditions);
            builder.push("status = ").push_bind(status.as_str().to_string());
        }
        builder.push(" ORDER BY created_at DESC");
        if let Some(limit) = filter.limit {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = builder
            .build()
            .fetch_all(&self.0)
            .await
            .map_err(sqlx_error_to_domain_error)?;

        rows.iter().map(row_to_project).collect()
    }
}

#[async_trait]
impl FeatureRepository for SqliteFeatures {
    async fn create(&self, feature: Feature) -> Result<Feature> {
        if feature.name.trim().is_empty() {
            return Err(OrchestratorError::empty_field("name"));
        }

        let row = sqlx::query(
            r#"
            INSERT INTO features (id, name, summary, description, status, priority, project_id,
                                   requires_verification, tags, created_at, modified_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, name, summary, description, status, priority, project_id,
                      requires_verification, tags, created_at, modified_at
            "#,
        )
        .bind(feature.id.to_string())
        .bind(&feature.name)
        .bind(&feature.summary)
        .bind(&feature.description)
        .bind(feature.status.as_str())
        .bind(priority_to_string(feature.priority))
        .bind(feature.project_id.map(|p| p.to_string()))
        .bind(feature.requires_verification)
        .bind(tags_to_json(&feature.tags))
        .bind(feature.created_at)
        .bind(feature.modified_at)
        .fetch_one(&self.0)
        .await
        .map_err(sqlx_error_to_domain_error)?;

        row_to_feature(&row)
    }

    async fn update(&self, id: Uuid, updates: UpdateTask) -> Result<Feature> {
        let mut builder: sqlx::QueryBuilder<Sqlite> = sqlx::QueryBuilder::new("UPDATE features SET ");
        let mut has_updates = false;

        if let Some(title) = &updates.title {
            builder.push("name = ").push_bind(title.clone());
            has_updates = true;
        }
        if let Some(summary) = &updates.summary {
            push_comma(&mut builder, has_updates);
            builder.push("summary = ").push_bind(summary.clone());
            has_updates = true;
        }
        if let Some(description) = &updates.description {
            push_comma(&mut builder, has_updates);
            builder.push("description = ").push_bind(description.clone());
            has_updates = true;
        }
        if let Some(priority) = updates.priority {
            push_comma(&mut builder, has_updates);
            builder.push("priority = ").push_bind(priority_to_string(priority));
            has_updates = true;
        }
        if let Some(project_id) = updates.project_id {
            push_comma(&mut builder, has_updates);
            builder.push("project_id = ").push_bind(project_id.to_string());
            has_updates = true;
        }
        if let Some(requires_verification) = updates.requires_verification {
            push_comma(&mut builder, has_updates);
            builder
                .push("requires_verification = ")
                .push_bind(requires_verification);
            has_updates = true;
        }
        if let Some(tags) = &updates.tags {
            push_comma(&mut builder, has_updates);
            builder.push("tags = ").push_bind(tags_to_json(tags));
            has_updates = true;
        }

        if !has_updates {
            return self
                .get_by_id(id)
                .await?
                .ok_or_else(|| OrchestratorError::not_found_kind("feature", id));
        }

        builder.push(", modified_at = ").push_bind(now());
        builder.push(" WHERE id = ").push_bind(id.to_string());
        builder.push(
            " RETURNING id, name, summary, description, status, priority, project_id, \
               requires_verification, tags, created_at, modified_at",
        );

        let row = builder
            .build()
            .fetch_optional(&self.0)
            .await
            .map_err(sqlx_error_to_domain_error)?
            .ok_or_else(|| OrchestratorError::not_found_kind("feature", id))?;

        row_to_feature(&row)
    }

    async fn set_status(&self, id: Uuid, status: Status) -> Result<Feature> {
        let row = sqlx::query(
            "UPDATE features SET status = ?, modified_at = ? WHERE id = ? \
             RETURNING id, name, summary, description, status, priority, project_id, \
                       requires_verification, tags, created_at, modified_at",
        )
        .bind(status.as_str())
        .bind(now())
        .bind(id.to_string())
        .fetch_optional(&self.0)
        .await
        .map_err(sqlx_error_to_domain_error)?
        .ok_or_else(|| OrchestratorError::not_found_kind("feature", id))?;

        row_to_feature(&row)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM features WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.0)
            .await
            .map_err(sqlx_error_to_domain_error)?;
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Feature>> {
        let row = sqlx::query(
            "SELECT id, name, summary, description, status, priority, project_id, \
                    requires_verification, tags, created_at, modified_at FROM features WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.0)
        .await
        .map_err(sqlx_error_to_domain_error)?;

        row.as_ref().map(row_to_feature).transpose()
    }

    async fn find_by_filters(&self, filter: EntityFilter) -> Result<Vec<Feature>> {
        let mut builder: sqlx::QueryBuilder<Sqlite> = sqlx::QueryBuilder::new(
            "SELECT id, name, summary, description, status, priority, project_id, \
                    requires_verification, tags, created_at, modified_at FROM features",
        );
        let mut has_conditions = false;

        if let Some(project_id) = filter.project_id {
            push_where_or_and(&mut builder, &mut has_conditions);
            builder.push("project_id = ").push_bind(project_id.to_string());
        }
        if let Some(status) = &filter.status {
            push_where_or_and(&mut builder, &mut has_conditions);
            builder.push("status = ").push_bind(status.as_str().to_string());
        }
        if let Some(priority) = filter.priority {
            push_where_or_and(&mut builder, &mut has_conditions);
            builder.push("priority = ").push_bind(priority_to_string(priority));
        }
        builder.push(" ORDER BY created_at DESC");
        if let Some(limit) = filter.limit {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = builder
            .build()
            .fetch_all(&self.0)
            .await
            .map_err(sqlx_error_to_domain_error)?;

        rows.iter().map(row_to_feature).collect()
    }

    async fn find_by_project(&self, project_id: Uuid) -> Result<Vec<Feature>> {
        let rows = sqlx::query(
            "SELECT id, name, summary, description, status, priority, project_id, \
                    requires_verification, tags, created_at, modified_at \
             FROM features WHERE project_id = ? ORDER BY created_at ASC",
        )
        .bind(project_id.to_string())
        .fetch_all(&self.0)
        .await
        .map_err(sqlx_error_to_domain_error)?;

        rows.iter().map(row_to_feature).collect()
    }

    async fn get_feature_counts_by_project_id(
        &self,
        project_id: Uuid,
    ) -> Result<HashMap<Uuid, TaskCounts>> {
        let features = self.find_by_project(project_id).await?;
        let mut result = HashMap::new();
        for feature in features {
            let rows = sqlx::query("SELECT status FROM tasks WHERE feature_id = ?")
                .bind(feature.id.to_string())
                .fetch_all(&self.0)
                .await
                .map_err(sqlx_error_to_domain_error)?;
            let statuses: Vec<String> = rows.iter().map(|r| r.get::<String, _>("status")).collect();
            result.insert(feature.id, counts_from_statuses(&statuses));
        }
        Ok(result)
    }
}

#[async_trait]
impl TaskRepository for SqliteTasks {
    async fn create(&self, task: NewTask) -> Result<Task> {
        if task.title.trim().is_empty() {
            return Err(OrchestratorError::empty_field("title"));
        }
        if !(1..=10).contains(&task.complexity) {
            return Err(OrchestratorError::Validation(
                "'complexity' must be between 1 and 10".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        let timestamp = now();
        let status = task.status.unwrap_or_else(|| Status::new("pending"));

        let row = sqlx::query(
            r#"
            INSERT INTO tasks (id, title, summary, description, status, priority, complexity,
                                project_id, feature_id, requires_verification, tags, created_at, modified_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, title, summary, description, status, priority, complexity, project_id,
                      feature_id, requires_verification, tags, created_at, modified_at
            "#,
        )
        .bind(id.to_string())
        .bind(&task.title)
        .bind(&task.summary)
        .bind(&task.description)
        .bind(status.as_str())
        .bind(priority_to_string(task.priority))
        .bind(task.complexity as i64)
        .bind(task.project_id.map(|p| p.to_string()))
        .bind(task.feature_id.map(|f| f.to_string()))
        .bind(task.requires_verification)
        .bind(tags_to_json(&task.tags))
        .bind(timestamp)
        .bind(timestamp)
        .fetch_one(&self.0)
        .await
        .map_err(sqlx_error_to_domain_error)?;

        row_to_task(&row)
    }

    async fn update(&self, id: Uuid, updates: UpdateTask) -> Result<Task> {
        let mut builder: sqlx::QueryBuilder<Sqlite> = sqlx::QueryBuilder::new("UPDATE tasks SET ");
        let mut has_updates = false;

        if let Some(title) = &updates.title {
            builder.push("title = ").push_bind(title.clone());
            has_updates = true;
        }
        if let Some(summary) = &updates.summary {
            push_comma(&mut builder, has_updates);
            builder.push("summary = ").push_bind(summary.clone());
            has_updates = true;
        }
        if let Some(description) = &updates.description {
            push_comma(&mut builder, has_updates);
            builder.push("description = ").push_bind(description.clone());
            has_updates = true;
        }
        if let Some(priority) = updates.priority {
            push_comma(&mut builder, has_updates);
            builder.push("priority = ").push_bind(priority_to_string(priority));
            has_updates = true;
        }
        if let Some(complexity) = updates.complexity {
            if !(1..=10).contains(&complexity) {
                return Err(OrchestratorError::Validation(
                    "'complexity' must be between 1 and 10".to_string(),
                ));
            }
            push_comma(&mut builder, has_updates);
            builder.push("complexity = ").push_bind(complexity as i64);
            has_updates = true;
        }
        if let Some(feature_id) = updates.feature_id {
            push_comma(&mut builder, has_updates);
            builder.push("feature_id = ").push_bind(feature_id.to_string());
            has_updates = true;
        }
        if let Some(project_id) = updates.project_id {
            push_comma(&mut builder, has_updates);
            builder.push("project_id = ").push_bind(project_id.to_string());
            has_updates = true;
        }
        if let Some(requires_verification) = updates.requires_verification {
            push_comma(&mut builder, has_updates);
            builder
                .push("requires_verification = ")
                .push_bind(requires_verification);
            has_updates = true;
        }
        if let Some(tags) = &updates.tags {
            push_comma(&mut builder, has_updates);
            builder.push("tags = ").push_bind(tags_to_json(tags));
            has_updates = true;
        }

        if !has_updates {
            return self
                .get_by_id(id)
                .await?
                .ok_or_else(|| OrchestratorError::not_found_kind("task", id));
        }

        builder.push(", modified_at = ").push_bind(now());
        builder.push(" WHERE id = ").push_bind(id.to_string());
        builder.push(
            " RETURNING id, title, summary, description, status, priority, complexity, project_id, \
               feature_id, requires_verification, tags, created_at, modified_at",
        );

        let row = builder
            .build()
            .fetch_optional(&self.0)
            .await
            .map_err(sqlx_error_to_domain_error)?
            .ok_or_else(|| OrchestratorError::not_found_kind("task", id))?;

        row_to_task(&row)
    }

    async fn set_status(&self, id: Uuid, status: Status) -> Result<Task> {
        let row = sqlx::query(
            "UPDATE tasks SET status = ?, modified_at = ? WHERE id = ? \
             RETURNING id, title, summary, description, status, priority, complexity, project_id, \
                       feature_id, requires_verification, tags, created_at, modified_at",
        )
        .bind(status.as_str())
        .bind(now())
        .bind(id.to_string())
        .fetch_optional(&self.0)
        .await
        .map_err(sqlx_error_to_domain_error)?
        .ok_or_else(|| OrchestratorError::not_found_kind("task", id))?;

        row_to_task(&row)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.0)
            .await
            .map_err(sqlx_error_to_domain_error)?;
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Task>> {
        let row = sqlx::query(
            "SELECT id, title, summary, description, status, priority, complexity, project_id, \
                    feature_id, requires_verification, tags, created_at, modified_at FROM tasks WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.0)
        .await
        .map_err(sqlx_error_to_domain_error)?;

        row.as_ref().map(row_to_task).transpose()
    }

    async fn find_by_filters(&self, filter: EntityFilter) -> Result<Vec<Task>> {
        let mut builder: sqlx::QueryBuilder<Sqlite> = sqlx::QueryBuilder::new(
            "SELECT id, title, summary, description, status, priority, complexity, project_id, \
                    feature_id, requires_verification, tags, created_at, modified_at FROM tasks",
        );
        let mut has_conditions = false;

        if let Some(project_id) = filter.project_id {
            push_where_or_and(&mut builder, &mut has_conditions);
            builder.push("project_id = ").push_bind(project_id.to_string());
        }
        if let Some(feature_id) = filter.feature_id {
            push_where_or_and(&mut builder, &mut has_conditions);
            builder.push("feature_id = ").push_bind(feature_id.to_string());
        }
        if let Some(status) = &filter.status {
            push_where_or_and(&mut builder, &mut has_conditions);
            builder.push("status = ").push_bind(status.as_str().to_string());
        }
        if let Some(priority) = filter.priority {
            push_where_or_and(&mut builder, &mut has_conditions);
            builder.push("priority = ").push_bind(priority_to_string(priority));
        }
        if let Some(query) = &filter.text_query {
            push_where_or_and(&mut builder, &mut has_conditions);
            builder.push("(title LIKE ").push_bind(format!("%{query}%"));
            builder.push(" OR summary LIKE ").push_bind(format!("%{query}%"));
            builder.push(")");
        }
        builder.push(" ORDER BY created_at DESC");
        if let Some(limit) = filter.limit {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = builder
            .build()
            .fetch_all(&self.0)
            .await
            .map_err(sqlx_error_to_domain_error)?;

        rows.iter().map(row_to_task).collect()
    }

    async fn find_by_feature(&self, feature_id: Uuid) -> Result<Vec<Task>> {
        let rows = sqlx::query(
            "SELECT id, title, summary, description, status, priority, complexity, project_id, \
                    feature_id, requires_verification, tags, created_at, modified_at \
             FROM tasks WHERE feature_id = ? ORDER BY created_at ASC",
        )
        .bind(feature_id.to_string())
        .fetch_all(&self.0)
        .await
        .map_err(sqlx_error_to_domain_error)?;

        rows.iter().map(row_to_task).collect()
    }

    async fn find_by_project(&self, project_id: Uuid) -> Result<Vec<Task>> {
        let rows = sqlx::query(
            "SELECT id, title, summary, description, status, priority, complexity, project_id, \
                    feature_id, requires_verification, tags, created_at, modified_at \
             FROM tasks WHERE project_id = ? ORDER BY created_at ASC",
        )
        .bind(project_id.to_string())
        .fetch_all(&self.0)
        .await
        .map_err(sqlx_error_to_domain_error)?;

        rows.iter().map(row_to_task).collect()
    }

    async fn get_task_counts_by_feature_id(&self, feature_id: Uuid) -> Result<TaskCounts> {
        let rows = sqlx::query("SELECT status FROM tasks WHERE feature_id = ?")
            .bind(feature_id.to_string())
            .fetch_all(&self.0)
            .await
            .map_err(sqlx_error_to_domain_error)?;

        let statuses: Vec<String> = rows.iter().map(|r| r.get::<String, _>("status")).collect();
        Ok(counts_from_statuses(&statuses))
    }
}

fn counts_from_statuses(statuses: &[String]) -> TaskCounts {
    let mut counts = TaskCounts {
        total: statuses.len() as u64,
        ..Default::default()
    };
    for status in statuses {
        match status.as_str() {
            "pending" => counts.pending += 1,
            "in-progress" => counts.in_progress += 1,
            "completed" => counts.completed += 1,
            "cancelled" => counts.cancelled += 1,
            "testing" => counts.testing += 1,
            "blocked" => counts.blocked += 1,
            _ => {}
        }
    }
    counts
}

#[async_trait]
impl SectionRepository for SqliteSections {
    async fn create(&self, section: Section) -> Result<Section> {
        let row = sqlx::query(
            r#"
            INSERT INTO sections (id, entity_type, entity_id, title, ordinal, content_format, content, usage_description, tags)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, entity_type, entity_id, title, ordinal, content_format, content, usage_description, tags
            "#,
        )
        .bind(section.id.to_string())
        .bind(entity_type_to_string(section.entity_type))
        .bind(section.entity_id.to_string())
        .bind(&section.title)
        .bind(section.ordinal as i64)
        .bind(content_format_to_string(section.content_format))
        .bind(&section.content)
        .bind(&section.usage_description)
        .bind(tags_to_json(&section.tags))
        .fetch_one(&self.0)
        .await
        .map_err(sqlx_error_to_domain_error)?;

        row_to_section(&row)
    }

    async fn update(&self, id: Uuid, section: Section) -> Result<Section> {
        let row = sqlx::query(
            r#"
            UPDATE sections SET title = ?, ordinal = ?, content_format = ?, content = ?,
                                 usage_description = ?, tags = ?
            WHERE id = ?
            RETURNING id, entity_type, entity_id, title, ordinal, content_format, content, usage_description, tags
            "#,
        )
        .bind(&section.title)
        .bind(section.ordinal as i64)
        .bind(content_format_to_string(section.content_format))
        .bind(&section.content)
        .bind(&section.usage_description)
        .bind(tags_to_json(&section.tags))
        .bind(id.to_string())
        .fetch_optional(&self.0)
        .await
        .map_err(sqlx_error_to_domain_error)?
        .ok_or_else(|| OrchestratorError::not_found_kind("section", id))?;

        row_to_section(&row)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM sections WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.0)
            .await
            .map_err(sqlx_error_to_domain_error)?;
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Section>> {
        let row = sqlx::query(
            "SELECT id, entity_type, entity_id, title, ordinal, content_format, content, usage_description, tags \
             FROM sections WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.0)
        .await
        .map_err(sqlx_error_to_domain_error)?;

        row.as_ref().map(row_to_section).transpose()
    }

    async fn find_by_entity(&self, entity_type: EntityType, entity_id: Uuid) -> Result<Vec<Section>> {
        let rows = sqlx::query(
            "SELECT id, entity_type, entity_id, title, ordinal, content_format, content, usage_description, tags \
             FROM sections WHERE entity_type = ? AND entity_id = ? ORDER BY ordinal ASC",
        )
        .bind(entity_type_to_string(entity_type))
        .bind(entity_id.to_string())
        .fetch_all(&self.0)
        .await
        .map_err(sqlx_error_to_domain_error)?;

        rows.iter().map(row_to_section).collect()
    }

    async fn delete_by_entity(&self, entity_type: EntityType, entity_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM sections WHERE entity_type = ? AND entity_id = ?")
            .bind(entity_type_to_string(entity_type))
            .bind(entity_id.to_string())
            .execute(&self.0)
            .await
            .map_err(sqlx_error_to_domain_error)?;
        Ok(())
    }
}

#[async_trait]
impl DependencyRepository for SqliteDependencies {
    async fn create(&self, dependency: Dependency) -> Result<Dependency> {
        let row = sqlx::query(
            r#"
            INSERT INTO dependencies (id, from_task_id, to_task_id, dependency_type, unblock_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, from_task_id, to_task_id, dependency_type, unblock_at
            "#,
        )
        .bind(dependency.id.to_string())
        .bind(dependency.from_task_id.to_string())
        .bind(dependency.to_task_id.to_string())
        .bind(dependency_type_to_string(dependency.dependency_type))
        .bind(dependency.unblock_at.map(role_to_string))
        .fetch_one(&self.0)
        .await
        .map_err(sqlx_error_to_domain_error)?;

        row_to_dependency(&row)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM dependencies WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.0)
            .await
            .map_err(sqlx_error_to_domain_error)?;
        Ok(())
    }

    async fn find_by_task_id(&self, task_id: Uuid) -> Result<Vec<Dependency>> {
        let rows = sqlx::query(
            "SELECT id, from_task_id, to_task_id, dependency_type, unblock_at \
             FROM dependencies WHERE from_task_id = ? OR to_task_id = ?",
        )
        .bind(task_id.to_string())
        .bind(task_id.to_string())
        .fetch_all(&self.0)
        .await
        .map_err(sqlx_error_to_domain_error)?;

        rows.iter().map(row_to_dependency).collect()
    }

    async fn find_by_to_task_id(&self, task_id: Uuid) -> Result<Vec<Dependency>> {
        let rows = sqlx::query(
            "SELECT id, from_task_id, to_task_id, dependency_type, unblock_at FROM dependencies WHERE to_task_id = ?",
        )
        .bind(task_id.to_string())
        .fetch_all(&self.0)
        .await
        .map_err(sqlx_error_to_domain_error)?;

        rows.iter().map(row_to_dependency).collect()
    }

    async fn find_by_from_task_id(&self, task_id: Uuid) -> Result<Vec<Dependency>> {
        let rows = sqlx::query(
            "SELECT id, from_task_id, to_task_id, dependency_type, unblock_at FROM dependencies WHERE from_task_id = ?",
        )
        .bind(task_id.to_string())
        .fetch_all(&self.0)
        .await
        .map_err(sqlx_error_to_domain_error)?;

        rows.iter().map(row_to_dependency).collect()
    }

    async fn delete_by_task_id(&self, task_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM dependencies WHERE from_task_id = ? OR to_task_id = ?")
            .bind(task_id.to_string())
            .bind(task_id.to_string())
            .execute(&self.0)
            .await
            .map_err(sqlx_error_to_domain_error)?;
        Ok(())
    }
}

#[async_trait]
impl RoleTransitionRepository for SqliteRoleTransitions {
    async fn create(&self, transition: RoleTransition) -> Result<RoleTransition> {
        let row = sqlx::query(
            r#"
            INSERT INTO role_transitions (id, entity_id, entity_type, from_role, to_role,
                                           from_status, to_status, transitioned_at, trigger, summary)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, entity_id, entity_type, from_role, to_role, from_status, to_status,
                      transitioned_at, trigger, summary
            "#,
        )
        .bind(transition.id.to_string())
        .bind(transition.entity_id.to_string())
        .bind(entity_type_to_string(transition.entity_type))
        .bind(transition.from_role.map(role_to_string))
        .bind(transition.to_role.map(role_to_string))
        .bind(transition.from_status.as_str())
        .bind(transition.to_status.as_str())
        .bind(transition.transitioned_at)
        .bind(&transition.trigger)
        .bind(&transition.summary)
        .fetch_one(&self.0)
        .await
        .map_err(sqlx_error_to_domain_error)?;

        row_to_role_transition(&row)
    }

    async fn find_by_entity(&self, entity_id: Uuid) -> Result<Vec<RoleTransition>> {
        let rows = sqlx::query(
            "SELECT id, entity_id, entity_type, from_role, to_role, from_status, to_status, \
                    transitioned_at, trigger, summary \
             FROM role_transitions WHERE entity_id = ? ORDER BY transitioned_at ASC",
        )
        .bind(entity_id.to_string())
        .fetch_all(&self.0)
        .await
        .map_err(sqlx_error_to_domain_error)?;

        rows.iter().map(row_to_role_transition).collect()
    }
}

#[async_trait]
impl TemplateRepository for SqliteTemplates {
    async fn create(&self, template: Template) -> Result<Template> {
        let mut tx = self.0.begin().await.map_err(sqlx_error_to_domain_error)?;

        sqlx::query("INSERT INTO templates (id, name, entity_type) VALUES (?, ?, ?)")
            .bind(template.id.to_string())
            .bind(&template.name)
            .bind(entity_type_to_string(template.entity_type))
            .execute(&mut *tx)
            .await
            .map_err(sqlx_error_to_domain_error)?;

        for section in &template.sections {
            sqlx::query(
                r#"
                INSERT INTO template_sections (template_id, ordinal, title, content_format, content, usage_description, tags)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(template.id.to_string())
            .bind(section.ordinal as i64)
            .bind(&section.title)
            .bind(content_format_to_string(section.content_format))
            .bind(&section.content)
            .bind(&section.usage_description)
            .bind(tags_to_json(&section.tags))
            .execute(&mut *tx)
            .await
            .map_err(sqlx_error_to_domain_error)?;
        }

        tx.commit().await.map_err(sqlx_error_to_domain_error)?;
        Ok(template)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Template>> {
        let Some(header) = sqlx::query("SELECT id, name, entity_type FROM templates WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.0)
            .await
            .map_err(sqlx_error_to_domain_error)?
        else {
            return Ok(None);
        };

        let entity_type =
            crate::common::string_to_entity_type(&header.get::<String, _>("entity_type"))?;
        let sections = self.fetch_sections(id).await?;
        Ok(Some(Template {
            id,
            name: header.get("name"),
            entity_type,
            sections,
        }))
    }

    async fn find_by_entity_type(&self, entity_type: EntityType) -> Result<Vec<Template>> {
        let rows = sqlx::query("SELECT id, name, entity_type FROM templates WHERE entity_type = ?")
            .bind(entity_type_to_string(entity_type))
            .fetch_all(&self.0)
            .await
            .map_err(sqlx_error_to_domain_error)?;

        let mut templates = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.get("id");
            let id = Uuid::parse_str(&id)
                .map_err(|err| OrchestratorError::Database(format!("invalid uuid in database row: {err}")))?;
            let sections = self.fetch_sections(id).await?;
            templates.push(Template {
                id,
                name: row.get("name"),
                entity_type,
                sections,
            });
        }
        Ok(templates)
    }
}

impl SqliteTemplates {
    async fn fetch_sections(
        &self,
        template_id: Uuid,
    ) -> Result<Vec<orchestrator_core::models::TemplateSection>> {
        let rows = sqlx::query(
            "SELECT ordinal, title, content_format, content, usage_description, tags \
             FROM template_sections WHERE template_id = ? ORDER BY ordinal ASC",
        )
        .bind(template_id.to_string())
        .fetch_all(&self.0)
        .await
        .map_err(sqlx_error_to_domain_error)?;

        rows.iter()
            .map(|row| {
                let tags: String = row.get("tags");
                Ok(orchestrator_core::models::TemplateSection {
                    title: row.get("title"),
                    ordinal: row.get::<i64, _>("ordinal") as i32,
                    content_format: crate::common::string_to_content_format(
                        &row.get::<String, _>("content_format"),
                    )?,
                    content: row.get("content"),
                    usage_description: row.get("usage_description"),
                    tags: crate::common::tags_from_json(&tags),
                })
            })
            .collect()
    }
}

fn push_comma(builder: &mut sqlx::QueryBuilder<Sqlite>, has_updates: bool) {
    if has_updates {
        builder.push(", ");
    }
}

fn push_where_or_and(builder: &mut sqlx::QueryBuilder<Sqlite>, has_conditions: &mut bool) {
    if *has_conditions {
        builder.push(" AND ");
    } else {
        builder.push(" WHERE ");
        *has_conditions = true;
    }
}
