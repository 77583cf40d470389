//! Fluent builders for constructing domain entities in tests.

use chrono::Utc;
use uuid::Uuid;

use orchestrator_core::models::{Feature, NewTask, Priority, Project, Status};

/// Builder for a `Project`, defaulted to a fresh id and `pending` status.
pub struct ProjectBuilder {
    project: Project,
}

impl Default for ProjectBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            project: Project {
                id: Uuid::new_v4(),
                name: "Test Project".to_string(),
                summary: "A test project".to_string(),
                description: None,
                status: Status::new("pending"),
                tags: Vec::new(),
                created_at: now,
                modified_at: now,
            },
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.project.id = id;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.project.name = name.into();
        self
    }

    pub fn with_status(mut self, status: impl Into<Status>) -> Self {
        self.project.status = status.into();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.project.tags = tags;
        self
    }

    pub fn build(self) -> Project {
        self.project
    }
}

/// Builder for a `Feature`, defaulted to a fresh id, medium priority,
/// and `pending` status.
pub struct FeatureBuilder {
    feature: Feature,
}

impl Default for FeatureBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            feature: Feature {
                id: Uuid::new_v4(),
                name: "Test Feature".to_string(),
                summary: "A test feature".to_string(),
                description: None,
                status: Status::new("pending"),
                priority: Priority::Medium,
                project_id: None,
                requires_verification: false,
                tags: Vec::new(),
                created_at: now,
                modified_at: now,
            },
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.feature.id = id;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.feature.name = name.into();
        self
    }

    pub fn with_project(mut self, project_id: Uuid) -> Self {
        self.feature.project_id = Some(project_id);
        self
    }

    pub fn with_status(mut self, status: impl Into<Status>) -> Self {
        self.feature.status = status.into();
        self
    }

    pub fn requires_verification(mut self, value: bool) -> Self {
        self.feature.requires_verification = value;
        self
    }

    pub fn build(self) -> Feature {
        self.feature
    }
}

/// Builder for a `NewTask`, suitable for passing straight into
/// `TaskRepository::create`.
pub struct TaskBuilder {
    task: NewTask,
}

impl Default for TaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskBuilder {
    pub fn new() -> Self {
        Self {
            task: NewTask {
                title: "Test Task".to_string(),
                summary: "A test task".to_string(),
                description: None,
                status: None,
                priority: Priority::Medium,
                complexity: 3,
                project_id: None,
                feature_id: None,
                requires_verification: false,
                tags: Vec::new(),
            },
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.task.title = title.into();
        self
    }

    pub fn with_status(mut self, status: impl Into<Status>) -> Self {
        self.task.status = Some(status.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.task.priority = priority;
        self
    }

    pub fn with_complexity(mut self, complexity: u8) -> Self {
        self.task.complexity = complexity;
        self
    }

    pub fn with_feature(mut self, feature_id: Uuid) -> Self {
        self.task.feature_id = Some(feature_id);
        self
    }

    pub fn with_project(mut self, project_id: Uuid) -> Self {
        self.task.project_id = Some(project_id);
        self
    }

    pub fn requires_verification(mut self, value: bool) -> Self {
        self.task.requires_verification = value;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.task.tags = tags;
        self
    }

    pub fn build(self) -> NewTask {
        self.task
    }
}
