use std::str::FromStr;

use serde::Serialize;
use serde_json::{Value, json};

use crate::tool_response::ToolError;
use crate::unity_bridge_client::CommandTransport;

/// Name of the editor command that handles prefab stages
pub const PREFAB_COMMAND: &str = "manage_prefabs";

/// The only prefab stage mode Unity currently accepts through this tool
pub const IN_ISOLATION_MODE: &str = "InIsolation";

/// Prefab stage actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefabAction {
    OpenStage,
    CloseStage,
    SaveOpenStage,
    CreateFromGameobject,
}

impl PrefabAction {
    pub const ALL: [PrefabAction; 4] = [
        PrefabAction::OpenStage,
        PrefabAction::CloseStage,
        PrefabAction::SaveOpenStage,
        PrefabAction::CreateFromGameobject,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PrefabAction::OpenStage => "open_stage",
            PrefabAction::CloseStage => "close_stage",
            PrefabAction::SaveOpenStage => "save_open_stage",
            PrefabAction::CreateFromGameobject => "create_from_gameobject",
        }
    }

    fn requires_prefab_path(&self) -> bool {
        matches!(self, PrefabAction::OpenStage | PrefabAction::CreateFromGameobject)
    }
}

impl FromStr for PrefabAction {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == lower)
            .ok_or_else(|| ToolError::validation(format!("Unsupported manage_prefabs action: {}", s)))
    }
}

/// Arguments of a `manage_prefabs` call, as received from the client
#[derive(Debug, Clone, Default)]
pub struct PrefabRequest {
    pub action: String,
    pub prefab_path: Option<String>,
    pub mode: Option<String>,
    pub save_before_close: Option<bool>,
    pub target: Option<String>,
    pub allow_overwrite: Option<bool>,
    pub search_inactive: Option<bool>,
}

/// Validated parameters forwarded to the editor
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefabCommand {
    pub action: PrefabAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefab_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_before_close: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_overwrite: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_inactive: Option<bool>,
}

impl PrefabCommand {
    /// Validates a request and builds the command to forward
    pub fn from_request(request: &PrefabRequest) -> Result<Self, ToolError> {
        let action: PrefabAction = request.action.parse()?;

        let prefab_path = match request.prefab_path.as_deref() {
            Some(path) if !path.is_empty() => Some(normalize_prefab_path(path)?),
            _ if action.requires_prefab_path() => {
                return Err(ToolError::validation("prefab_path is required for this action"));
            }
            _ => None,
        };

        let mut command = PrefabCommand {
            action,
            prefab_path,
            mode: validate_mode(request.mode.as_deref())?,
            save_before_close: None,
            target: None,
            allow_overwrite: None,
            search_inactive: None,
        };

        match action {
            PrefabAction::CloseStage => command.save_before_close = request.save_before_close,
            PrefabAction::CreateFromGameobject => {
                let target = request
                    .target
                    .as_deref()
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| {
                        ToolError::validation("'target' is required when action=create_from_gameobject")
                    })?;
                command.target = Some(target.to_string());
                command.allow_overwrite = request.allow_overwrite;
                command.search_inactive = request.search_inactive;
            }
            PrefabAction::OpenStage | PrefabAction::SaveOpenStage => {}
        }
        Ok(command)
    }
}

/// Normalizes a prefab asset path; it must live under `Assets/`
pub fn normalize_prefab_path(path: &str) -> Result<String, ToolError> {
    if path.is_empty() {
        return Err(ToolError::validation("prefab_path is required for this action"));
    }
    let normalized = path.replace('\\', "/");
    let normalized = normalized.trim();
    let normalized = normalized.strip_prefix("./").unwrap_or(normalized);
    if !normalized.to_ascii_lowercase().starts_with("assets/") {
        return Err(ToolError::validation("prefab_path must be under Assets/"));
    }
    Ok(normalized.to_string())
}

/// Accepts only the in-isolation stage mode, returning its canonical spelling
pub fn validate_mode(mode: Option<&str>) -> Result<Option<&'static str>, ToolError> {
    match mode {
        None | Some("") => Ok(None),
        Some(mode) if mode.eq_ignore_ascii_case(IN_ISOLATION_MODE) => Ok(Some(IN_ISOLATION_MODE)),
        Some(_) => Err(ToolError::validation(
            "Only 'InIsolation' prefab stage mode is supported",
        )),
    }
}

/// Validates a prefab request and forwards it to the editor
///
/// A successful reply is reshaped into the standard envelope; any other object
/// reply is returned verbatim and non-object replies are wrapped as failures.
///
/// `unity_instance`, when set, travels with the command to select the target editor.
pub async fn manage_prefabs<T: CommandTransport + ?Sized>(
    transport: &T,
    request: &PrefabRequest,
    unity_instance: Option<&str>,
) -> Result<Value, ToolError> {
    let command = PrefabCommand::from_request(request)?;
    let params = serde_json::to_value(&command).map_err(|e| ToolError::Internal(e.to_string()))?;
    let response = transport
        .send_command(PREFAB_COMMAND, params, unity_instance)
        .await?;

    let Value::Object(reply) = response else {
        let message = match response {
            Value::String(text) => text,
            other => other.to_string(),
        };
        return Ok(json!({ "success": false, "message": message }));
    };

    if reply.get("success").and_then(Value::as_bool) == Some(true) {
        let message = reply
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Prefab operation successful.");
        return Ok(json!({
            "success": true,
            "message": message,
            "data": reply.get("data").cloned().unwrap_or(Value::Null),
        }));
    }
    Ok(Value::Object(reply))
}
