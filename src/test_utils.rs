use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::unity_project_manager::UnityProjectManager;

/// Creates an empty Unity project (`Assets` and `ProjectSettings`) in a temp directory
pub fn create_temp_unity_project() -> TempDir {
    crate::logging::init_logging();
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    std::fs::create_dir_all(dir.path().join("Assets")).expect("Failed to create Assets");
    std::fs::create_dir_all(dir.path().join("ProjectSettings")).expect("Failed to create ProjectSettings");
    dir
}

/// Resolves a project manager for a temp project the way tools do
pub fn project_manager(dir: &TempDir) -> UnityProjectManager {
    UnityProjectManager::resolve_project_root(Some(&dir.path().to_string_lossy()), None, None)
        .expect("Failed to resolve temp project")
}

/// Writes a file relative to the project root, creating parent directories
pub fn write_project_file(project: &Path, rel: &str, contents: &str) -> PathBuf {
    let path = project.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent directory");
    }
    std::fs::write(&path, contents).expect("Failed to write project file");
    path
}

/// Writes an executable shell script standing in for `tsc`
///
/// The script records its arguments to `tsc_args.txt` next to itself, prints
/// `stdout`, and exits with `exit_code`.
#[cfg(unix)]
pub fn create_fake_tsc(dir: &Path, stdout: &str, exit_code: i32) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script_path = dir.join("fake-tsc");
    let args_path = dir.join("tsc_args.txt");
    let output_path = dir.join("tsc_output.txt");
    std::fs::write(&output_path, stdout).expect("Failed to write fake tsc output");
    let script = format!(
        "#!/bin/sh\necho \"$@\" > '{}'\ncat '{}'\nexit {}\n",
        args_path.display(),
        output_path.display(),
        exit_code
    );
    std::fs::write(&script_path, script).expect("Failed to write fake tsc");
    let mut permissions = std::fs::metadata(&script_path).unwrap().permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&script_path, permissions).expect("Failed to make fake tsc executable");
    script_path
}

/// Arguments recorded by the last run of a fake `tsc`
#[cfg(unix)]
pub fn read_fake_tsc_args(dir: &Path) -> String {
    std::fs::read_to_string(dir.join("tsc_args.txt"))
        .unwrap_or_default()
        .trim()
        .to_string()
}
