use serde::Serialize;
use serde_json::Value;

use crate::unity_bridge_client::BridgeError;

/// Error code reported when a file is missing
pub const CODE_NOT_FOUND: &str = "not_found";

/// Error code reported when a file already exists and overwrite was not requested
pub const CODE_FILE_EXISTS: &str = "file_exists";

/// Errors produced by tool handlers
///
/// Handlers propagate these with `?` and the MCP server converts them to a
/// [`ToolResponse`] at the tool boundary.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    AlreadyExists(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unity bridge error: {0}")]
    Transport(#[from] BridgeError),
    #[error("{0}")]
    Internal(String),
}

/// Broad classification of a [`ToolError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Internal,
}

impl ToolError {
    pub fn validation(message: impl Into<String>) -> Self {
        ToolError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ToolError::NotFound(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::Validation(_) | ToolError::AlreadyExists(_) => ErrorKind::Validation,
            ToolError::NotFound(_) => ErrorKind::NotFound,
            ToolError::Io(_) | ToolError::Transport(_) | ToolError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Machine readable code for the distinguished failure cases
    pub fn code(&self) -> Option<&'static str> {
        match self {
            ToolError::NotFound(_) => Some(CODE_NOT_FOUND),
            ToolError::AlreadyExists(_) => Some(CODE_FILE_EXISTS),
            _ => None,
        }
    }

    /// Convert into the wire envelope for the given tool
    ///
    /// Validation and not-found messages are surfaced verbatim, anything
    /// unexpected is prefixed with the operation name.
    pub fn into_response(self, operation: &str) -> ToolResponse {
        let message = match self.kind() {
            ErrorKind::Internal => format!("{} error: {}", operation, self),
            _ => self.to_string(),
        };
        ToolResponse {
            success: false,
            message: Some(message),
            code: self.code().map(str::to_string),
            data: None,
        }
    }
}

/// The `{success, message, code, data}` envelope returned by every tool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ToolResponse {
    pub fn ok(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            code: None,
            data: Some(data),
        }
    }

    /// Successful response that carries data but no message
    pub fn data_only(data: Value) -> Self {
        Self {
            success: true,
            message: None,
            code: None,
            data: Some(data),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            code: None,
            data: None,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Null)
    }
}
