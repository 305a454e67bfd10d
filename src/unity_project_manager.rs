use std::path::{Path, PathBuf};

use url::Url;

use crate::tool_response::ToolError;

/// Locates and validates the Unity project a tool call operates on
#[derive(Debug, Clone)]
pub struct UnityProjectManager {
    project_path: PathBuf,
}

impl UnityProjectManager {
    /// Creates a new UnityProjectManager with the given project path
    pub fn new<P: AsRef<Path>>(project_path: P) -> Self {
        Self {
            project_path: project_path.as_ref().to_path_buf(),
        }
    }

    /// Checks if the given path looks like a Unity project
    pub fn is_unity_project_path<P: AsRef<Path>>(path: P) -> bool {
        Self::new(path).is_unity_project()
    }

    /// Checks if the managed path looks like a Unity project
    ///
    /// A Unity project has both an `Assets` and a `ProjectSettings` directory.
    pub fn is_unity_project(&self) -> bool {
        self.project_path.join("Assets").is_dir() && self.project_path.join("ProjectSettings").is_dir()
    }

    /// Resolves the project root for a tool call
    ///
    /// An explicit override wins, then the configured fallback, then a root detected
    /// from the MCP client. The result is canonicalized.
    pub fn resolve_project_root(
        explicit: Option<&str>,
        fallback: Option<&Path>,
        detected: Option<&Path>,
    ) -> Result<Self, ToolError> {
        let candidate = match explicit.map(str::trim).filter(|p| !p.is_empty()) {
            Some(path) => {
                let path = PathBuf::from(path);
                if !path.is_dir() {
                    return Err(ToolError::validation(format!(
                        "project_root does not exist or is not a directory: {}",
                        path.display()
                    )));
                }
                path
            }
            None => fallback
                .or(detected)
                .map(Path::to_path_buf)
                .ok_or_else(|| {
                    ToolError::validation(
                        "No Unity project root available. Pass project_root, set UNITY_PROJECT_PATH, or open the project as a client root.",
                    )
                })?,
        };

        let canonical = std::fs::canonicalize(&candidate)?;
        Ok(Self::new(strip_verbatim_prefix(canonical)))
    }

    /// Gets the project path
    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    /// Gets the `Assets` directory of the project
    pub fn assets_path(&self) -> PathBuf {
        self.project_path.join("Assets")
    }
}

/// Converts a `file://` URI into a local path
///
/// Handles percent-encoding, a `localhost` authority and Windows drive letters.
pub fn file_uri_to_path(uri: &str) -> Option<PathBuf> {
    let url = Url::parse(uri).ok()?;
    if url.scheme() != "file" {
        return None;
    }
    url.to_file_path().ok()
}

/// Removes the `\\?\` prefix `canonicalize` adds on Windows
fn strip_verbatim_prefix(path: PathBuf) -> PathBuf {
    match path.to_str().and_then(|s| s.strip_prefix(r"\\?\")) {
        Some(stripped) => PathBuf::from(stripped),
        None => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_temp_unity_project;

    #[test]
    fn test_is_unity_project_with_temp_project() {
        let project = create_temp_unity_project();
        assert!(UnityProjectManager::is_unity_project_path(project.path()));
    }

    #[test]
    fn test_is_not_unity_project() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!UnityProjectManager::is_unity_project_path(dir.path()));
    }

    #[test]
    fn test_explicit_root_wins() {
        let explicit = create_temp_unity_project();
        let fallback = create_temp_unity_project();
        let manager = UnityProjectManager::resolve_project_root(
            Some(&explicit.path().to_string_lossy()),
            Some(fallback.path()),
            None,
        )
        .unwrap();
        assert_eq!(manager.project_path(), std::fs::canonicalize(explicit.path()).unwrap());
    }

    #[test]
    fn test_fallback_then_detected() {
        let detected = create_temp_unity_project();
        let manager = UnityProjectManager::resolve_project_root(None, None, Some(detected.path())).unwrap();
        assert_eq!(manager.project_path(), std::fs::canonicalize(detected.path()).unwrap());
    }

    #[test]
    fn test_missing_root_is_validation_error() {
        let err = UnityProjectManager::resolve_project_root(None, None, None).unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));

        let err = UnityProjectManager::resolve_project_root(Some("/no/such/project/root"), None, None).unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_uri_to_path() {
        assert_eq!(
            file_uri_to_path("file:///home/me/My%20Game/Assets/a.ts"),
            Some(PathBuf::from("/home/me/My Game/Assets/a.ts"))
        );
        assert_eq!(file_uri_to_path("file://localhost/tmp/x"), Some(PathBuf::from("/tmp/x")));
        assert_eq!(file_uri_to_path("file://server/share"), None);
        // Malformed escapes stay literal instead of decoding to a control byte
        assert_eq!(file_uri_to_path("file:///tmp/a%+1b.ts"), Some(PathBuf::from("/tmp/a%+1b.ts")));
        assert_eq!(file_uri_to_path("unity://path/Assets"), None);
    }
}
