use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;
use serde_json::json;
use tokio::io::AsyncWriteExt;

use crate::debug_log;
use crate::tool_response::{ToolError, ToolResponse};
use crate::ts_compiler::{TSC_VALIDATION_COMMAND, detect_tsconfig};
use crate::ts_path_resolver::{FileMetadata, ResolvedFile, TS_EXTENSIONS, path_metadata, resolve_ts_path};
use crate::unity_project_manager::UnityProjectManager;

/// Directories reported as likely homes for TypeScript sources, when they exist
pub const TS_DIR_HINTS: [&str; 5] = [
    "Assets/TypeScripts",
    "Assets/Puerts",
    "Assets/Puerts/TypeScripts",
    "Assets/Scripts",
    "Assets",
];

/// Actions supported by `manage_ts_script`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptAction {
    Create,
    Read,
    Delete,
    Write,
    Append,
    Rename,
}

impl ScriptAction {
    pub const ALL: [ScriptAction; 6] = [
        ScriptAction::Create,
        ScriptAction::Read,
        ScriptAction::Delete,
        ScriptAction::Write,
        ScriptAction::Append,
        ScriptAction::Rename,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptAction::Create => "create",
            ScriptAction::Read => "read",
            ScriptAction::Delete => "delete",
            ScriptAction::Write => "write",
            ScriptAction::Append => "append",
            ScriptAction::Rename => "rename",
        }
    }
}

impl fmt::Display for ScriptAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScriptAction {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| ToolError::validation(format!("Unsupported manage_ts_script action: {}", s)))
    }
}

/// Arguments of a `manage_ts_script` call
#[derive(Debug, Clone, Default)]
pub struct ManageScriptRequest {
    pub action: String,
    pub path: String,
    pub contents: Option<String>,
    pub target_path: Option<String>,
    pub overwrite: bool,
    pub create_if_missing: bool,
}

#[derive(Serialize)]
struct ReadData {
    #[serde(flatten)]
    metadata: FileMetadata,
    contents: String,
}

/// Creates a TypeScript file, refusing to replace an existing one unless `overwrite` is set
pub async fn create_script(
    project: &UnityProjectManager,
    path: &str,
    contents: Option<&str>,
    overwrite: bool,
) -> Result<ToolResponse, ToolError> {
    let target = resolve_ts_path(project, path, true)?;
    if target.exists() && !overwrite {
        return Err(ToolError::AlreadyExists(format!(
            "{} already exists",
            target.absolute.display()
        )));
    }
    write_contents(&target, contents.unwrap_or_default()).await?;
    debug_log!("Created TypeScript file {}", target.assets_path);
    Ok(ToolResponse::ok("TypeScript file created", metadata_value(&target).await?))
}

/// Deletes a TypeScript file, returning its metadata from before the deletion
pub async fn delete_script(project: &UnityProjectManager, uri: &str) -> Result<ToolResponse, ToolError> {
    let missing = || ToolError::not_found("TypeScript file not found");
    let target = resolve_ts_path(project, uri, false).map_err(|e| match e {
        ToolError::NotFound(_) => missing(),
        other => other,
    })?;
    let metadata = metadata_value(&target).await?;
    tokio::fs::remove_file(&target.absolute).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => missing(),
        _ => ToolError::Io(e),
    })?;
    debug_log!("Deleted TypeScript file {}", target.assets_path);
    Ok(ToolResponse::ok("TypeScript file deleted", metadata))
}

/// Reads a TypeScript file; the data holds its metadata and full text
pub async fn read_script(project: &UnityProjectManager, path: &str) -> Result<ToolResponse, ToolError> {
    let target = resolve_ts_path(project, path, false)?;
    let contents = tokio::fs::read_to_string(&target.absolute).await?;
    let data = ReadData {
        metadata: path_metadata(&target).await?,
        contents,
    };
    Ok(ToolResponse::data_only(json!(data)))
}

/// Replaces a file's contents
///
/// A missing file is only created with `create_if_missing`; an existing file is only
/// replaced with `overwrite` or `create_if_missing`.
pub async fn write_script(
    project: &UnityProjectManager,
    path: &str,
    contents: Option<&str>,
    overwrite: bool,
    create_if_missing: bool,
) -> Result<ToolResponse, ToolError> {
    let target = resolve_ts_path(project, path, true)?;
    let exists = target.exists();
    if !exists && !create_if_missing {
        return Err(ToolError::not_found(
            "TypeScript file does not exist; enable create_if_missing to create new files",
        ));
    }
    if exists && !overwrite && !create_if_missing {
        return Err(ToolError::validation("Set overwrite=true to replace existing files"));
    }
    write_contents(&target, contents.unwrap_or_default()).await?;
    debug_log!("Wrote TypeScript file {}", target.assets_path);
    Ok(ToolResponse::ok("TypeScript file written", metadata_value(&target).await?))
}

/// Appends text to the end of an existing file
pub async fn append_script(
    project: &UnityProjectManager,
    path: &str,
    contents: Option<&str>,
) -> Result<ToolResponse, ToolError> {
    let target = resolve_ts_path(project, path, true)?;
    if !target.exists() {
        return Err(ToolError::not_found("TypeScript file does not exist for append"));
    }
    let mut file = tokio::fs::OpenOptions::new()
        .append(true)
        .open(&target.absolute)
        .await?;
    file.write_all(contents.unwrap_or_default().as_bytes()).await?;
    file.flush().await?;
    Ok(ToolResponse::ok("Content appended", metadata_value(&target).await?))
}

/// Moves a file to `target_path`, creating the destination's parent directories
pub async fn rename_script(
    project: &UnityProjectManager,
    path: &str,
    target_path: Option<&str>,
    overwrite: bool,
) -> Result<ToolResponse, ToolError> {
    let source = resolve_ts_path(project, path, false)?;
    let target_path = target_path
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ToolError::validation("target_path is required for rename"))?;
    let destination = resolve_ts_path(project, target_path, true)?;
    if destination.exists() && !overwrite {
        return Err(ToolError::validation(
            "Destination already exists; set overwrite=true to replace",
        ));
    }
    ensure_parent_dir(&destination.absolute).await?;
    tokio::fs::rename(&source.absolute, &destination.absolute).await?;
    debug_log!("Renamed {} to {}", source.assets_path, destination.assets_path);

    let data = json!({
        "from": source.assets_path,
        "to": destination.assets_path,
        "uri": destination.uri(),
    });
    Ok(ToolResponse::ok("TypeScript file renamed", data))
}

/// Routes a `manage_ts_script` call to the handler for its action
pub async fn manage_script(
    project: &UnityProjectManager,
    request: &ManageScriptRequest,
) -> Result<ToolResponse, ToolError> {
    let action: ScriptAction = request.action.parse()?;
    let path = request.path.as_str();
    let contents = request.contents.as_deref();
    match action {
        ScriptAction::Create => create_script(project, path, contents, request.overwrite).await,
        ScriptAction::Read => read_script(project, path).await,
        ScriptAction::Delete => delete_script(project, path).await,
        ScriptAction::Write => {
            write_script(project, path, contents, request.overwrite, request.create_if_missing).await
        }
        ScriptAction::Append => append_script(project, path, contents).await,
        ScriptAction::Rename => {
            rename_script(project, path, request.target_path.as_deref(), request.overwrite).await
        }
    }
}

/// Reports supported extensions, actions, validation setup and existing source directories
pub fn capabilities(project: &UnityProjectManager) -> ToolResponse {
    let root = project.project_path();
    let tsconfig = detect_tsconfig(root);
    let default_dirs: Vec<&str> = TS_DIR_HINTS
        .iter()
        .copied()
        .filter(|dir| root.join(dir).exists())
        .collect();
    let mut extensions = TS_EXTENSIONS.to_vec();
    extensions.sort_unstable();

    ToolResponse::data_only(json!({
        "extensions": extensions,
        "actions": ScriptAction::ALL.iter().map(ScriptAction::as_str).collect::<Vec<_>>(),
        "validation": {
            "tsconfig": tsconfig.map(|p| p.display().to_string()),
            "requiresNode": true,
            "command": TSC_VALIDATION_COMMAND,
        },
        "defaultDirectories": default_dirs,
    }))
}

async fn write_contents(target: &ResolvedFile, contents: &str) -> Result<(), ToolError> {
    ensure_parent_dir(&target.absolute).await?;
    tokio::fs::write(&target.absolute, contents).await?;
    Ok(())
}

async fn ensure_parent_dir(path: &Path) -> Result<(), ToolError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

async fn metadata_value(target: &ResolvedFile) -> Result<serde_json::Value, ToolError> {
    Ok(json!(path_metadata(target).await?))
}
