use std::borrow::Cow;
use std::fmt::Display;

use rmcp::ErrorData;
use rmcp::model::{CallToolResult, Content, ErrorCode};
use serde::Serialize;

fn mcp_err(code: ErrorCode, message: impl Into<Cow<'static, str>>) -> ErrorData {
    ErrorData {
        code,
        message: message.into(),
        data: None,
    }
}

pub fn invalid_params(message: impl Into<Cow<'static, str>>) -> ErrorData {
    mcp_err(ErrorCode::INVALID_PARAMS, message)
}

pub fn invalid_request(message: impl Into<Cow<'static, str>>) -> ErrorData {
    mcp_err(ErrorCode::INVALID_REQUEST, message)
}

/// Pretty-printed JSON payload.
pub fn json_text<T: Serialize + ?Sized>(value: &T) -> Result<String, ErrorData> {
    serde_json::to_string_pretty(value)
        .map_err(|err| mcp_err(ErrorCode::INTERNAL_ERROR, format!("failed to encode result: {err}")))
}

pub fn json_success<T: Serialize + ?Sized>(value: &T) -> Result<CallToolResult, ErrorData> {
    Ok(CallToolResult::success(vec![Content::text(json_text(value)?)]))
}

/// Tool-level failure reported to the client with `isError` set.
pub fn tool_failure(context: &str, err: &impl Display) -> CallToolResult {
    CallToolResult::error(vec![Content::text(format!("{context}: {err}"))])
}
