use thiserror::Error;

/// Result type alias for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Errors produced anywhere in the orchestration engine.
///
/// Every variant maps to one of the `error.code` strings of the tool
/// response envelope via [`OrchestratorError::code`]. Recoverable
/// conditions (missing entities, failed validation, storage conflicts)
/// are represented here rather than as panics; only truly unexpected
/// failures should be funnelled into `Internal` at the dispatch
/// boundary.
///
/// # Examples
///
/// ```rust
/// use orchestrator_core::error::OrchestratorError;
///
/// let not_found = OrchestratorError::not_found_id("f00d");
/// assert!(not_found.is_not_found());
/// assert_eq!(not_found.code(), "RESOURCE_NOT_FOUND");
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrchestratorError {
    /// Unknown id, or a parent reference that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed input, forbidden transition, prerequisite failure, or
    /// verification gate failure.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unique/constraint violation from storage.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Any other repository failure.
    #[error("database error: {0}")]
    Database(String),

    /// A batch operation in which every item failed.
    #[error("operation failed: {0}")]
    OperationFailed(String),

    /// An unexpected, non-recoverable condition caught at a boundary.
    #[error("internal error: {0}")]
    Internal(String),
}

impl OrchestratorError {
    pub fn not_found_id(id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("id '{id}' does not exist"))
    }

    pub fn not_found_kind(kind: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{kind} '{id}' does not exist"))
    }

    pub fn empty_field(field: &str) -> Self {
        Self::Validation(format!("'{field}' cannot be empty"))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_database(&self) -> bool {
        matches!(self, Self::Database(_))
    }

    /// The `error.code` string carried in the response envelope (§7).
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "RESOURCE_NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::OperationFailed(_) => "OPERATION_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// The diagnostic text carried in `error.details`.
    pub fn details(&self) -> String {
        match self {
            Self::NotFound(m)
            | Self::Validation(m)
            | Self::Conflict(m)
            | Self::Database(m)
            | Self::OperationFailed(m)
            | Self::Internal(m) => m.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_creation() {
        let error = OrchestratorError::not_found_id(42);
        assert!(error.is_not_found());
        assert_eq!(error.code(), "RESOURCE_NOT_FOUND");
    }

    #[test]
    fn error_predicates() {
        assert!(OrchestratorError::NotFound("x".into()).is_not_found());
        assert!(!OrchestratorError::Validation("x".into()).is_not_found());
        assert!(OrchestratorError::Validation("x".into()).is_validation());
        assert!(OrchestratorError::Database("x".into()).is_database());
    }

    #[test]
    fn codes_match_taxonomy() {
        assert_eq!(OrchestratorError::Conflict("x".into()).code(), "CONFLICT_ERROR");
        assert_eq!(OrchestratorError::Database("x".into()).code(), "DATABASE_ERROR");
        assert_eq!(
            OrchestratorError::OperationFailed("x".into()).code(),
            "OPERATION_FAILED"
        );
        assert_eq!(OrchestratorError::Internal("x".into()).code(), "INTERNAL_ERROR");
    }
}
