use crate::prefab_manager::{self, PrefabRequest};
use crate::server_config::ServerConfig;
use crate::tool_response::{ToolError, ToolResponse};
use crate::ts_compiler::{self, ValidateOptions};
use crate::ts_script_manager::{self, ManageScriptRequest};
use crate::unity_bridge_client::{CommandTransport, UnityBridgeClient};
use crate::unity_project_manager::{UnityProjectManager, file_uri_to_path};
use log::{info, warn};
use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::*,
    schemars, tool, tool_handler, tool_router,
    service::RequestContext,
};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

fn default_true() -> bool {
    true
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct CreateTsScriptRequest {
    #[schemars(description = "Path under Assets/ to create the TypeScript file at, e.g., 'Assets/TypeScripts/ui.ts'")]
    pub path: String,
    #[schemars(description = "TypeScript source code to write")]
    #[serde(default)]
    pub contents: String,
    #[schemars(description = "Allow replacing an existing file")]
    #[serde(default)]
    pub overwrite: bool,
    #[schemars(description = "Optional project root override")]
    pub project_root: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct DeleteTsScriptRequest {
    #[schemars(description = "URI or Assets-relative path pointing to the TypeScript file")]
    pub uri: String,
    #[schemars(description = "Optional project root override")]
    pub project_root: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct ValidateTsScriptRequest {
    #[schemars(description = "Optional URI or Assets path to focus validation on")]
    pub uri: Option<String>,
    #[schemars(description = "Optional tsconfig path (relative to project or absolute)")]
    pub tsconfig: Option<String>,
    #[schemars(description = "Append --strict to tsc")]
    #[serde(default)]
    pub strict: bool,
    #[schemars(description = "Append --incremental to tsc")]
    #[serde(default)]
    pub incremental: bool,
    #[schemars(description = "Include parsed diagnostics and raw output")]
    #[serde(default = "default_true")]
    pub include_diagnostics: bool,
    #[schemars(description = "Optional project root override")]
    pub project_root: Option<String>,
    #[schemars(description = "Custom path to the tsc executable")]
    pub tsc_path: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct ManageTsScriptRequest {
    #[schemars(description = "Operation to perform: create, read, delete, write, append or rename")]
    pub action: String,
    #[schemars(description = "Primary TypeScript URI or Assets path")]
    pub path: String,
    #[schemars(description = "Content for create/write/append")]
    pub contents: Option<String>,
    #[schemars(description = "Destination path for rename")]
    pub target_path: Option<String>,
    #[schemars(description = "Allow overwrite for create/write/rename")]
    #[serde(default)]
    pub overwrite: bool,
    #[schemars(description = "Allow write to create new files")]
    #[serde(default)]
    pub create_if_missing: bool,
    #[schemars(description = "Optional project root override")]
    pub project_root: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct CapabilitiesRequest {
    #[schemars(description = "Optional project root override")]
    pub project_root: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct ManagePrefabsRequest {
    #[schemars(description = "Prefab Stage action to perform: open_stage, close_stage, save_open_stage or create_from_gameobject")]
    pub action: String,
    #[schemars(description = "Prefab asset path under Assets/, e.g., Assets/Prefabs/My.prefab")]
    pub prefab_path: Option<String>,
    #[schemars(description = "PrefabStage mode (currently only 'InIsolation' is supported)")]
    pub mode: Option<String>,
    #[schemars(description = "Whether close_stage should save pending changes before exit")]
    pub save_before_close: Option<bool>,
    #[schemars(description = "Scene or Prefab Stage GameObject name for create_from_gameobject")]
    pub target: Option<String>,
    #[schemars(description = "Allow replacing an existing prefab when creating from GameObject")]
    pub allow_overwrite: Option<bool>,
    #[schemars(description = "Include inactive transforms while resolving target")]
    pub search_inactive: Option<bool>,
}

/// MCP server exposing TypeScript script and prefab stage tools for a Unity project
#[derive(Clone)]
pub struct UnityTsMcpServer {
    config: Arc<ServerConfig>,
    /// Project found among the client's roots, used when nothing else is configured
    detected_project_path: Arc<Mutex<Option<PathBuf>>>,
    transport: Arc<dyn CommandTransport>,
    tool_router: ToolRouter<UnityTsMcpServer>,
}

#[tool_router]
impl UnityTsMcpServer {
    /// Create a server that forwards editor commands over the configured bridge
    pub fn new(config: ServerConfig) -> Self {
        let transport = Arc::new(UnityBridgeClient::new(config.bridge.clone()));
        Self::with_transport(config, transport)
    }

    /// Create a server with a custom editor command transport
    pub fn with_transport(config: ServerConfig, transport: Arc<dyn CommandTransport>) -> Self {
        Self {
            config: Arc::new(config),
            detected_project_path: Arc::new(Mutex::new(None)),
            transport,
            tool_router: Self::tool_router(),
        }
    }

    /// Check if a Unity project path is available without a per-call override
    pub fn has_project_path(&self) -> bool {
        self.config.fallback_project_path.is_some() || self.detected_project_path().is_some()
    }

    fn detected_project_path(&self) -> Option<PathBuf> {
        self.detected_project_path
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Set the project path detected from client roots
    pub fn set_detected_project_path(&self, path: PathBuf) {
        if UnityProjectManager::is_unity_project_path(&path) {
            let mut guard = self
                .detected_project_path
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *guard = Some(path);
        } else {
            warn!("Attempted to set invalid Unity project path: {}", path.display());
        }
    }

    /// Resolve the project a call operates on
    fn project(&self, project_root: Option<&str>) -> Result<UnityProjectManager, ToolError> {
        let detected = self.detected_project_path();
        UnityProjectManager::resolve_project_root(
            project_root,
            self.config.fallback_project_path.as_deref(),
            detected.as_deref(),
        )
    }

    /// Try to detect the Unity project from client roots
    async fn try_detect_from_roots_if_needed(&self, context: &RequestContext<RoleServer>) {
        if self.has_project_path() {
            return;
        }

        match context.peer.list_roots().await {
            Ok(roots_result) => {
                info!("Received {} roots from client", roots_result.roots.len());

                let found = roots_result
                    .roots
                    .iter()
                    .filter_map(|root| file_uri_to_path(&root.uri))
                    .find(|path| UnityProjectManager::is_unity_project_path(path));
                match found {
                    Some(path) => {
                        info!("Found Unity project at: {}", path.display());
                        self.set_detected_project_path(path);
                    }
                    None => warn!("No Unity project found in the provided roots"),
                }
            }
            Err(e) => {
                info!("Client does not support roots capability or error occurred: {}", e);
            }
        }
    }

    fn log_call(&self, tool: &str, subject: &str) {
        info!(
            "Processing {}: {} (unity_instance={})",
            tool,
            subject,
            self.config.instance_label()
        );
    }

    pub async fn do_create_ts_script(&self, req: CreateTsScriptRequest) -> Value {
        self.log_call("create_ts_script", &req.path);
        let result = match self.project(req.project_root.as_deref()) {
            Ok(project) => {
                ts_script_manager::create_script(&project, &req.path, Some(&req.contents), req.overwrite).await
            }
            Err(e) => Err(e),
        };
        envelope("create_ts_script", result)
    }

    pub async fn do_delete_ts_script(&self, req: DeleteTsScriptRequest) -> Value {
        self.log_call("delete_ts_script", &req.uri);
        let result = match self.project(req.project_root.as_deref()) {
            Ok(project) => ts_script_manager::delete_script(&project, &req.uri).await,
            Err(e) => Err(e),
        };
        envelope("delete_ts_script", result)
    }

    pub async fn do_validate_ts_script(&self, req: ValidateTsScriptRequest) -> Value {
        self.log_call("validate_ts_script", req.uri.as_deref().unwrap_or("<project>"));
        let options = ValidateOptions {
            uri: req.uri,
            tsconfig: req.tsconfig,
            strict: req.strict,
            incremental: req.incremental,
            include_diagnostics: req.include_diagnostics,
            tsc_path: req.tsc_path.or_else(|| self.config.tsc_path.clone()),
        };
        let result = match self.project(req.project_root.as_deref()) {
            Ok(project) => ts_compiler::validate(&project, &options).await,
            Err(e) => Err(e),
        };
        envelope("validate_ts_script", result)
    }

    pub async fn do_manage_ts_script(&self, req: ManageTsScriptRequest) -> Value {
        self.log_call("manage_ts_script", &req.action);
        let request = ManageScriptRequest {
            action: req.action,
            path: req.path,
            contents: req.contents,
            target_path: req.target_path,
            overwrite: req.overwrite,
            create_if_missing: req.create_if_missing,
        };
        let result = match self.project(req.project_root.as_deref()) {
            Ok(project) => ts_script_manager::manage_script(&project, &request).await,
            Err(e) => Err(e),
        };
        envelope("manage_ts_script", result)
    }

    pub async fn do_manage_ts_script_capabilities(&self, req: CapabilitiesRequest) -> Value {
        self.log_call("manage_ts_script_capabilities", req.project_root.as_deref().unwrap_or("<default>"));
        let result = self
            .project(req.project_root.as_deref())
            .map(|project| ts_script_manager::capabilities(&project));
        envelope("capabilities", result)
    }

    pub async fn do_manage_prefabs(&self, req: ManagePrefabsRequest) -> Value {
        self.log_call("manage_prefabs", &req.action);
        let request = PrefabRequest {
            action: req.action,
            prefab_path: req.prefab_path,
            mode: req.mode,
            save_before_close: req.save_before_close,
            target: req.target,
            allow_overwrite: req.allow_overwrite,
            search_inactive: req.search_inactive,
        };
        match prefab_manager::manage_prefabs(
            self.transport.as_ref(),
            &request,
            self.config.unity_instance.as_deref(),
        )
        .await {
            Ok(value) => value,
            Err(e) => {
                warn!("manage_prefabs failed: {}", e);
                e.into_response("manage_prefabs").to_value()
            }
        }
    }

    #[tool(description = "Create a new TypeScript file at the given Assets-relative path.")]
    pub async fn create_ts_script(
        &self,
        Parameters(req): Parameters<CreateTsScriptRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(to_call_result(self.do_create_ts_script(req).await))
    }

    #[tool(description = "Delete a TypeScript file identified by URI or Assets-relative path.")]
    pub async fn delete_ts_script(
        &self,
        Parameters(req): Parameters<DeleteTsScriptRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(to_call_result(self.do_delete_ts_script(req).await))
    }

    #[tool(description = "Validate a TypeScript file or project using tsc and return diagnostics.")]
    pub async fn validate_ts_script(
        &self,
        Parameters(req): Parameters<ValidateTsScriptRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(to_call_result(self.do_validate_ts_script(req).await))
    }

    #[tool(description = "Generic TypeScript file management (create/read/delete/write/append/rename).")]
    pub async fn manage_ts_script(
        &self,
        Parameters(req): Parameters<ManageTsScriptRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(to_call_result(self.do_manage_ts_script(req).await))
    }

    #[tool(description = "Report capabilities for TypeScript script management and validation.")]
    pub async fn manage_ts_script_capabilities(
        &self,
        Parameters(req): Parameters<CapabilitiesRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(to_call_result(self.do_manage_ts_script_capabilities(req).await))
    }

    #[tool(description = "Manage Unity Prefab stages (open, save, close, create from scene objects).")]
    pub async fn manage_prefabs(
        &self,
        Parameters(req): Parameters<ManagePrefabsRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(to_call_result(self.do_manage_prefabs(req).await))
    }
}

/// Convert a handler result into the wire envelope, logging failures
fn envelope(operation: &str, result: Result<ToolResponse, ToolError>) -> Value {
    match result {
        Ok(response) => response.to_value(),
        Err(e) => {
            warn!("{} failed: {}", operation, e);
            e.into_response(operation).to_value()
        }
    }
}

fn to_call_result(value: Value) -> CallToolResult {
    let success = value.get("success").and_then(Value::as_bool).unwrap_or(false);
    let content = vec![Content::text(value.to_string())];
    if success {
        CallToolResult::success(content)
    } else {
        CallToolResult::error(content)
    }
}

#[cfg(test)]
impl UnityTsMcpServer {
    pub(crate) fn lock_detected_project(&self) -> std::sync::MutexGuard<'_, Option<PathBuf>> {
        self.detected_project_path
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[tool_handler]
impl ServerHandler for UnityTsMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            server_info: Implementation::from_build_env(),
            instructions: Some("Unity TypeScript MCP Server: manage Puerts TypeScript sources and prefab stages of a Unity project".into()),
        }
    }

    async fn initialize(
        &self,
        _request: InitializeRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<InitializeResult, McpError> {
        info!("Client connected, server initialized successfully");

        // Detect the project from roots in the background so initialization is not blocked
        let server_clone = self.clone();
        tokio::spawn(async move {
            server_clone.try_detect_from_roots_if_needed(&context).await;
        });

        Ok(self.get_info())
    }
}
