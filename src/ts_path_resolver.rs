//! Resolution of user supplied TypeScript paths into locations inside the
//! project's `Assets` tree.
//!
//! Accepted inputs are `unity://path/<Assets-relative>` URIs, `file://` URIs and
//! plain Assets-relative paths. Whatever the input form, the resolved location is
//! checked to lie under `<project>/Assets` and traversal segments are rejected
//! outright, even when they would land back inside the tree.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::tool_response::ToolError;
use crate::unity_project_manager::{UnityProjectManager, file_uri_to_path};

/// File extensions accepted for TypeScript sources
pub const TS_EXTENSIONS: [&str; 2] = [".ts", ".tsx"];

const UNITY_PATH_SCHEME: &str = "unity://path/";
const FILE_SCHEME: &str = "file://";

/// A TypeScript file location that passed the sandbox checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    /// Absolute location on disk
    pub absolute: PathBuf,
    /// Project-relative form using forward slashes, e.g. `Assets/TypeScripts/ui.ts`
    pub assets_path: String,
}

impl ResolvedFile {
    /// `unity://path/` URI of the file
    pub fn uri(&self) -> String {
        format!("{}{}", UNITY_PATH_SCHEME, self.assets_path)
    }

    pub fn exists(&self) -> bool {
        self.absolute.exists()
    }
}

/// Metadata describing a file's current bytes; recomputed on every call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub assets_path: String,
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length_bytes: Option<u64>,
}

/// Normalizes an Assets-relative path into canonical `Assets/...` form
///
/// Backslashes become forward slashes, a leading `./` and leading `/` are dropped,
/// empty and `.` segments are removed. Any `..` segment is rejected, and the first
/// segment must be `Assets` (any case).
pub fn normalize_assets_relative(path: &str) -> Result<String, ToolError> {
    if path.trim().is_empty() {
        return Err(ToolError::validation("path is required and must start with Assets/"));
    }
    let normalized = path.replace('\\', "/");
    let normalized = normalized.trim();
    let normalized = normalized.strip_prefix("./").unwrap_or(normalized);
    let normalized = normalized.trim_start_matches('/');

    let mut parts: Vec<&str> = normalized
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect();

    if parts.iter().any(|part| *part == "..") {
        return Err(ToolError::validation("path must not contain traversal segments"));
    }
    match parts.first() {
        Some(first) if first.eq_ignore_ascii_case("assets") => parts[0] = "Assets",
        _ => return Err(ToolError::validation("path must live under Assets/")),
    }
    Ok(parts.join("/"))
}

/// Resolves a TypeScript URI or Assets-relative path inside the project
///
/// Unless `allow_create` is set the file must already exist; a missing file is
/// reported as [`ToolError::NotFound`], distinct from validation failures.
pub fn resolve_ts_path(
    project: &UnityProjectManager,
    target: &str,
    allow_create: bool,
) -> Result<ResolvedFile, ToolError> {
    if target.trim().is_empty() {
        return Err(ToolError::validation(
            "A TypeScript URI or Assets-relative path is required",
        ));
    }

    let absolute = if let Some(rel) = target.strip_prefix(UNITY_PATH_SCHEME) {
        join_relative(project.project_path(), &normalize_assets_relative(rel)?)
    } else if target.starts_with(FILE_SCHEME) {
        resolve_file_uri(target)?
    } else {
        join_relative(project.project_path(), &normalize_assets_relative(target)?)
    };

    // Hard boundary check, applied whichever branch produced the path
    let assets = project.assets_path();
    if !absolute.starts_with(&assets) || !resolves_inside(&absolute, &assets)? {
        return Err(ToolError::validation("TypeScript files must reside under Assets/"));
    }
    let assets_path = relative_to_project(project.project_path(), &absolute)
        .ok_or_else(|| ToolError::validation("TypeScript files must reside under Assets/"))?;

    ensure_ts_extension(&absolute)?;

    let resolved = ResolvedFile { absolute, assets_path };
    if !allow_create && !resolved.exists() {
        return Err(ToolError::not_found(format!(
            "TypeScript file not found: {}",
            resolved.absolute.display()
        )));
    }
    Ok(resolved)
}

/// Requires a `.ts` or `.tsx` extension (case-insensitive)
pub fn ensure_ts_extension(path: &Path) -> Result<(), ToolError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()));
    match extension {
        Some(ext) if TS_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(ToolError::validation(
            "TypeScript files must use .ts or .tsx extensions",
        )),
    }
}

/// Project-relative form of `path` with forward slashes, if it lies under `project_root`
pub fn relative_to_project(project_root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(project_root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Computes the metadata of a resolved file from its current bytes
///
/// Hash and length are only present when the file exists.
pub async fn path_metadata(file: &ResolvedFile) -> Result<FileMetadata, ToolError> {
    let mut metadata = FileMetadata {
        assets_path: file.assets_path.clone(),
        uri: file.uri(),
        sha256: None,
        length_bytes: None,
    };
    if file.exists() {
        let bytes = tokio::fs::read(&file.absolute).await?;
        metadata.sha256 = Some(sha256_hex(&bytes));
        metadata.length_bytes = Some(bytes.len() as u64);
    }
    Ok(metadata)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn join_relative(root: &Path, rel: &str) -> PathBuf {
    rel.split('/').fold(root.to_path_buf(), |path, segment| path.join(segment))
}

/// Whether `path` still lies under `assets` once symlinks are followed
///
/// The nearest existing ancestor is canonicalized and the missing tail appended,
/// so paths that do not exist yet can be checked too. A dangling symlink on the
/// way is treated as escaping.
fn resolves_inside(path: &Path, assets: &Path) -> Result<bool, ToolError> {
    let assets = std::fs::canonicalize(assets)?;
    for ancestor in path.ancestors() {
        match std::fs::canonicalize(ancestor) {
            Ok(real) => {
                let inside = path
                    .strip_prefix(ancestor)
                    .is_ok_and(|tail| real.join(tail).starts_with(&assets));
                return Ok(inside);
            }
            Err(_) if std::fs::symlink_metadata(ancestor).is_ok() => return Ok(false),
            Err(_) => continue,
        }
    }
    Ok(false)
}

/// Rejects `..` segments in the raw URI, before URL parsing folds them away
fn has_traversal_segment(uri: &str) -> bool {
    uri.split(['/', '\\']).any(|segment| {
        let segment = segment.to_ascii_lowercase();
        matches!(segment.as_str(), ".." | "%2e%2e" | ".%2e" | "%2e.")
    })
}

fn resolve_file_uri(uri: &str) -> Result<PathBuf, ToolError> {
    if has_traversal_segment(uri) {
        return Err(ToolError::validation("path must not contain traversal segments"));
    }
    let path = file_uri_to_path(uri)
        .filter(|path| path.is_absolute())
        .ok_or_else(|| ToolError::validation("Unable to resolve target path inside the project"))?;
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(ToolError::validation("path must not contain traversal segments"));
    }
    // Drop `.` segments so the boundary check and relative form are exact
    Ok(path.components().filter(|c| !matches!(c, Component::CurDir)).collect())
}
