use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use serde_json::json;

use crate::tool_response::{ToolError, ToolResponse};
use crate::ts_path_resolver::{ResolvedFile, relative_to_project, resolve_ts_path};
use crate::unity_project_manager::UnityProjectManager;
use crate::{debug_log, info_log};

/// Conventional tsconfig locations, relative to the project root, in lookup order
pub const TS_CONFIG_CANDIDATES: [&str; 6] = [
    "tsconfig.puerts.json",
    "tsconfig.unity.json",
    "tsconfig.json",
    "Assets/Puerts/tsconfig.json",
    "Assets/Puerts/TypeScripts/tsconfig.json",
    "Assets/TypeScripts/tsconfig.json",
];

/// Flags always passed to the compiler: plain output, type-check only
pub const TSC_BASE_FLAGS: [&str; 3] = ["--pretty", "false", "--noEmit"];

/// Human readable form of the base validation command
pub const TSC_VALIDATION_COMMAND: &str = "tsc --pretty false --noEmit";

static DIAGNOSTIC_RE: OnceLock<Regex> = OnceLock::new();
static ANSI_RE: OnceLock<Regex> = OnceLock::new();

/// Severity of a compiler diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

/// One compiler-reported issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub severity: DiagnosticSeverity,
    pub code: String,
    pub message: String,
}

/// Options of a `validate_ts_script` call
#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    pub uri: Option<String>,
    pub tsconfig: Option<String>,
    pub strict: bool,
    pub incremental: bool,
    pub include_diagnostics: bool,
    pub tsc_path: Option<String>,
}

/// Finds the first existing conventional tsconfig in the project
pub fn detect_tsconfig(project_root: &Path) -> Option<PathBuf> {
    TS_CONFIG_CANDIDATES
        .iter()
        .map(|candidate| project_root.join(candidate))
        .find(|path| path.exists())
}

/// Resolves the tsconfig to use: an explicit override (which must exist) or a detected one
pub fn resolve_tsconfig(project_root: &Path, tsconfig: Option<&str>) -> Result<Option<PathBuf>, ToolError> {
    match tsconfig.map(str::trim).filter(|t| !t.is_empty()) {
        Some(raw) => {
            let candidate = PathBuf::from(raw);
            let candidate = if candidate.is_absolute() {
                candidate
            } else {
                lexical_normalize(&project_root.join(candidate))
            };
            if !candidate.exists() {
                return Err(ToolError::validation(format!(
                    "tsconfig not found: {}",
                    candidate.display()
                )));
            }
            Ok(Some(candidate))
        }
        None => Ok(detect_tsconfig(project_root)),
    }
}

/// Finds the compiler executable and returns the command prefix to run it
///
/// Lookup order: explicit override, `tsc` on `PATH`, then `npx --yes tsc`.
pub fn tsc_command(tsc_path: Option<&str>) -> Result<Vec<String>, ToolError> {
    tsc_command_with(tsc_path, |name| which::which(name).ok())
}

/// Same as [`tsc_command`] with an injectable executable lookup
pub fn tsc_command_with<F>(tsc_path: Option<&str>, find: F) -> Result<Vec<String>, ToolError>
where
    F: Fn(&str) -> Option<PathBuf>,
{
    if let Some(path) = tsc_path.map(str::trim).filter(|p| !p.is_empty()) {
        return Ok(vec![path.to_string()]);
    }
    if let Some(tsc) = find("tsc") {
        return Ok(vec![tsc.to_string_lossy().into_owned()]);
    }
    if let Some(npx) = find("npx") {
        return Ok(vec![npx.to_string_lossy().into_owned(), "--yes".into(), "tsc".into()]);
    }
    Err(ToolError::not_found(
        "tsc or npx not found on PATH; install TypeScript before validating",
    ))
}

/// Appends the validation flags to a compiler command prefix
///
/// The target file is only passed when no tsconfig drives the compilation.
pub fn build_tsc_args(
    mut command: Vec<String>,
    strict: bool,
    incremental: bool,
    tsconfig: Option<&Path>,
    target: Option<&Path>,
) -> Vec<String> {
    command.extend(TSC_BASE_FLAGS.iter().map(|flag| flag.to_string()));
    if strict {
        command.push("--strict".into());
    }
    if incremental {
        command.push("--incremental".into());
    }
    match (tsconfig, target) {
        (Some(config), _) => {
            command.push("--project".into());
            command.push(config.to_string_lossy().into_owned());
        }
        (None, Some(target)) => command.push(target.to_string_lossy().into_owned()),
        (None, None) => {}
    }
    command
}

/// Removes ANSI color escape sequences
pub fn strip_ansi(text: &str) -> String {
    let re = ANSI_RE.get_or_init(|| Regex::new(r"\x1B\[[0-?]*[ -/]*[@-~]").expect("ansi regex"));
    re.replace_all(text, "").into_owned()
}

/// Parses compiler output into diagnostics
///
/// Lines that do not look like `<file>(<line>,<col>): <severity> TS<code>: <message>`
/// are banner or summary noise and are skipped. Files under the project root are
/// reported relative to it.
pub fn parse_tsc_output(output: &str, project_root: &Path) -> Vec<Diagnostic> {
    let re = DIAGNOSTIC_RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(?P<file>.+?)\((?P<line>\d+),(?P<col>\d+)\):\s+(?P<severity>error|warning)\s+(?P<code>TS\d+):\s+(?P<message>.+)$",
        )
        .expect("diagnostic regex")
    });

    strip_ansi(output)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let caps = re.captures(line)?;
            let severity = if caps["severity"].eq_ignore_ascii_case("error") {
                DiagnosticSeverity::Error
            } else {
                DiagnosticSeverity::Warning
            };
            Some(Diagnostic {
                file: display_diagnostic_file(&caps["file"], project_root),
                line: caps["line"].parse().ok()?,
                column: caps["col"].parse().ok()?,
                severity,
                code: caps["code"].to_string(),
                message: caps["message"].trim().to_string(),
            })
        })
        .collect()
}

/// Runs the compiler against a tsconfig or a single file and reports diagnostics
///
/// A non-zero exit code is a normal outcome: the response carries `success=false`
/// along with the same structured data.
pub async fn validate(project: &UnityProjectManager, options: &ValidateOptions) -> Result<ToolResponse, ToolError> {
    let root = project.project_path();
    let tsconfig = resolve_tsconfig(root, options.tsconfig.as_deref())?;
    let target: Option<ResolvedFile> = match options.uri.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(uri) => Some(resolve_ts_path(project, uri, false)?),
        None => None,
    };
    if tsconfig.is_none() && target.is_none() {
        return Err(ToolError::validation(
            "Provide a tsconfig or a specific TypeScript file to validate",
        ));
    }

    let command = build_tsc_args(
        tsc_command(options.tsc_path.as_deref())?,
        options.strict,
        options.incremental,
        tsconfig.as_deref(),
        target.as_ref().map(|t| t.absolute.as_path()),
    );
    let command_line = command.join(" ");
    info_log!("Running TypeScript compiler: {}", command_line);

    let (exit_code, output) = run_command(&command, root).await?;
    debug_log!("tsc exited with {} ({} bytes of output)", exit_code, output.len());

    let diagnostics = if options.include_diagnostics {
        parse_tsc_output(&output, root)
    } else {
        Vec::new()
    };
    let count = |severity: DiagnosticSeverity| diagnostics.iter().filter(|d| d.severity == severity).count();

    let mut data = json!({
        "exitCode": exit_code,
        "summary": {
            "warnings": count(DiagnosticSeverity::Warning),
            "errors": count(DiagnosticSeverity::Error),
        },
        "command": command_line,
        "tsconfig": tsconfig.as_ref().map(|p| p.display().to_string()),
        "target": target.as_ref().map(|t| t.assets_path.clone()),
    });
    if options.include_diagnostics {
        data["diagnostics"] = json!(diagnostics);
        data["rawOutput"] = json!(output);
    }

    let mut response = ToolResponse::ok("TypeScript validation succeeded", data);
    if exit_code != 0 {
        response.success = false;
        response.message = Some("TypeScript validation reported issues".to_string());
    }
    Ok(response)
}

/// Runs a command to completion in `cwd`, returning its exit code and stdout followed by stderr
async fn run_command(command: &[String], cwd: &Path) -> Result<(i32, String), ToolError> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| ToolError::Internal("empty compiler command".to_string()))?;

    let output = tokio::process::Command::new(program)
        .args(args)
        .current_dir(cwd)
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                ToolError::not_found(format!("tsc executable not found: {}", program))
            }
            _ => ToolError::Io(e),
        })?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    // Killed by a signal
    Ok((output.status.code().unwrap_or(-1), text))
}

fn display_diagnostic_file(file: &str, project_root: &Path) -> String {
    let path = Path::new(file);
    let absolute = if path.is_absolute() {
        lexical_normalize(path)
    } else {
        lexical_normalize(&project_root.join(path))
    };
    relative_to_project(project_root, &absolute)
        .unwrap_or_else(|| absolute.to_string_lossy().replace('\\', "/"))
}

/// Resolves `.` and `..` components without touching the filesystem
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
