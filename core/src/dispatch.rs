use serde::Serialize;
use serde_json::Value;

/// The uniform response shape every tool returns (§4.9/§6/§7). Built by
/// the protocol crate from whatever domain result a core operation
/// produced; kept here because the shape itself is part of the core
/// contract, not an artifact of the MCP transport.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub code: &'static str,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_data: Option<Value>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>, code: &'static str, details: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            error: Some(ErrorPayload {
                code,
                details: details.into(),
                additional_data: None,
            }),
        }
    }

    pub fn failure_with(
        message: impl Into<String>,
        code: &'static str,
        details: impl Into<String>,
        additional_data: Value,
    ) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            error: Some(ErrorPayload {
                code,
                details: details.into(),
                additional_data: Some(additional_data),
            }),
        }
    }
}

impl From<&crate::error::OrchestratorError> for ErrorPayload {
    fn from(err: &crate::error::OrchestratorError) -> Self {
        Self {
            code: err.code(),
            details: err.details(),
            additional_data: None,
        }
    }
}

impl From<&crate::transition::TransitionError> for ErrorPayload {
    fn from(err: &crate::transition::TransitionError) -> Self {
        let mut additional = serde_json::Map::new();
        if !err.suggestions.is_empty() {
            additional.insert("suggestions".to_string(), Value::from(err.suggestions.clone()));
        }
        if let Some(gate) = err.gate {
            additional.insert("gate".to_string(), Value::from(gate));
        }
        if !err.failing_criteria.is_empty() {
            additional.insert(
                "failingCriteria".to_string(),
                Value::from(err.failing_criteria.clone()),
            );
        }
        Self {
            code: err.code,
            details: err.details.clone(),
            additional_data: if additional.is_empty() {
                None
            } else {
                Some(Value::Object(additional))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_serialises_without_error_field() {
        let envelope = Envelope::ok("done", serde_json::json!({ "id": "x" }));
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"success\":true"));
        assert!(!json.contains("\"error\""));
    }

    #[test]
    fn failure_envelope_serialises_without_data_field() {
        let envelope: Envelope<Value> = Envelope::failure("nope", "VALIDATION_ERROR", "bad input");
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"success\":false"));
        assert!(!json.contains("\"data\""));
    }
}
