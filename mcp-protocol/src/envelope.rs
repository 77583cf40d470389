//! Turns a core [`Envelope`](orchestrator_core::dispatch::Envelope) into
//! the `CallToolResult` every tool method returns (§4.9.1). The
//! envelope's `error` field is the contract for recoverable failures —
//! it is never surfaced as an `rmcp` protocol-level error, only genuine
//! transport/serialisation failures are.

use rmcp::model::{CallToolResult, Content};
use serde::Serialize;

use orchestrator_core::dispatch::{Envelope, ErrorPayload};
use orchestrator_core::error::OrchestratorError;
use orchestrator_core::transition::TransitionError;

/// Serialises `envelope` to pretty JSON and wraps it as a successful
/// `CallToolResult` — success here means "the tool call completed", not
/// "the operation succeeded"; that distinction lives in `envelope.success`.
pub fn to_call_tool_result<T: Serialize>(envelope: &Envelope<T>) -> CallToolResult {
    let text = serde_json::to_string_pretty(envelope)
        .unwrap_or_else(|e| format!(r#"{{"success":false,"message":"failed to serialise response: {e}"}}"#));
    CallToolResult::success(vec![Content::text(text)])
}

/// Builds a failure envelope from an [`OrchestratorError`] and renders it.
pub fn from_orchestrator_error<T: Serialize>(message: impl Into<String>, err: &OrchestratorError) -> CallToolResult {
    let payload: ErrorPayload = err.into();
    let envelope: Envelope<T> = Envelope {
        success: false,
        message: message.into(),
        data: None,
        error: Some(payload),
    };
    to_call_tool_result(&envelope)
}

/// Builds a failure envelope from a [`TransitionError`], preserving
/// `suggestions`/`gate`/`failingCriteria` in `additionalData`.
pub fn from_transition_error<T: Serialize>(message: impl Into<String>, err: &TransitionError) -> CallToolResult {
    let payload: ErrorPayload = err.into();
    let envelope: Envelope<T> = Envelope {
        success: false,
        message: message.into(),
        data: None,
        error: Some(payload),
    };
    to_call_tool_result(&envelope)
}
