use std::path::{Path, PathBuf};

use crate::test_utils::*;
use crate::tool_response::ToolError;
use crate::ts_compiler::*;

#[test]
fn test_parse_single_error_line() {
    let output = "src/app.ts(10,5): error TS2322: Type 'string' is not assignable to type 'number'.";
    let diagnostics = parse_tsc_output(output, Path::new("/project"));
    assert_eq!(diagnostics.len(), 1);
    let d = &diagnostics[0];
    assert_eq!(d.file, "src/app.ts");
    assert_eq!(d.line, 10);
    assert_eq!(d.column, 5);
    assert_eq!(d.severity, DiagnosticSeverity::Error);
    assert_eq!(d.code, "TS2322");
    assert_eq!(d.message, "Type 'string' is not assignable to type 'number'.");
}

#[test]
fn test_parse_skips_noise_and_strips_ansi() {
    let output = "\u{1b}[96mAssets/a.ts\u{1b}[0m(1,2): WARNING TS6133: 'x' is declared but never used.\n\
                  \n\
                  Found 2 errors in 1 file.\n\
                  Version 5.4.5\n\
                  Assets/b.ts(3,4): error TS1005: ';' expected.\n";
    let diagnostics = parse_tsc_output(output, Path::new("/project"));
    assert_eq!(diagnostics.len(), 2);
    assert_eq!(diagnostics[0].file, "Assets/a.ts");
    assert_eq!(diagnostics[0].severity, DiagnosticSeverity::Warning);
    assert_eq!(diagnostics[1].code, "TS1005");
}

#[cfg(unix)]
#[test]
fn test_parse_relativizes_absolute_paths() {
    let output = "/project/Assets/x.ts(2,1): error TS2304: Cannot find name 'y'.\n\
                  /usr/lib/node_modules/typescript/lib/lib.d.ts(1,1): error TS2300: Duplicate identifier 'z'.\n\
                  ../shared/util.ts(5,5): error TS2339: Property 'q' does not exist.";
    let diagnostics = parse_tsc_output(output, Path::new("/project"));
    assert_eq!(diagnostics[0].file, "Assets/x.ts");
    assert_eq!(diagnostics[1].file, "/usr/lib/node_modules/typescript/lib/lib.d.ts");
    assert_eq!(diagnostics[2].file, "/shared/util.ts");
}

#[test]
fn test_tsc_lookup_order() {
    let none = |_: &str| None;
    assert_eq!(tsc_command_with(Some("/opt/tsc"), none).unwrap(), vec!["/opt/tsc"]);

    let only_npx = |name: &str| (name == "npx").then(|| PathBuf::from("/usr/bin/npx"));
    assert_eq!(
        tsc_command_with(None, only_npx).unwrap(),
        vec!["/usr/bin/npx", "--yes", "tsc"]
    );

    let both = |name: &str| Some(PathBuf::from(format!("/usr/bin/{}", name)));
    assert_eq!(tsc_command_with(None, both).unwrap(), vec!["/usr/bin/tsc"]);

    let err = tsc_command_with(None, none).unwrap_err();
    assert!(matches!(err, ToolError::NotFound(_)));
}

#[test]
fn test_build_args_prefers_project_over_target() {
    let args = build_tsc_args(
        vec!["tsc".into()],
        true,
        true,
        Some(Path::new("tsconfig.json")),
        Some(Path::new("Assets/a.ts")),
    );
    assert_eq!(
        args,
        vec!["tsc", "--pretty", "false", "--noEmit", "--strict", "--incremental", "--project", "tsconfig.json"]
    );

    let args = build_tsc_args(vec!["tsc".into()], false, false, None, Some(Path::new("Assets/a.ts")));
    assert_eq!(args, vec!["tsc", "--pretty", "false", "--noEmit", "Assets/a.ts"]);
}

#[test]
fn test_tsconfig_detection_order() {
    let dir = create_temp_unity_project();
    assert_eq!(detect_tsconfig(dir.path()), None);

    write_project_file(dir.path(), "Assets/TypeScripts/tsconfig.json", "{}");
    write_project_file(dir.path(), "tsconfig.json", "{}");
    assert_eq!(detect_tsconfig(dir.path()), Some(dir.path().join("tsconfig.json")));

    write_project_file(dir.path(), "tsconfig.puerts.json", "{}");
    assert_eq!(detect_tsconfig(dir.path()), Some(dir.path().join("tsconfig.puerts.json")));
}

#[test]
fn test_explicit_tsconfig_must_exist() {
    let dir = create_temp_unity_project();
    let err = resolve_tsconfig(dir.path(), Some("custom.json")).unwrap_err();
    assert!(matches!(err, ToolError::Validation(_)));

    write_project_file(dir.path(), "custom.json", "{}");
    assert_eq!(
        resolve_tsconfig(dir.path(), Some("custom.json")).unwrap(),
        Some(dir.path().join("custom.json"))
    );
}

#[tokio::test]
async fn test_validate_requires_config_or_target() {
    let dir = create_temp_unity_project();
    let project = project_manager(&dir);
    let options = ValidateOptions {
        tsc_path: Some("tsc".into()),
        include_diagnostics: true,
        ..Default::default()
    };
    let err = validate(&project, &options).await.unwrap_err();
    assert_eq!(err.to_string(), "Provide a tsconfig or a specific TypeScript file to validate");
}

#[cfg(unix)]
#[tokio::test]
async fn test_validate_with_fake_compiler_reports_issues() {
    let dir = create_temp_unity_project();
    let tools = tempfile::tempdir().unwrap();
    write_project_file(dir.path(), "Assets/TypeScripts/ui.ts", "let a: number = 'x';");
    let tsc = create_fake_tsc(
        tools.path(),
        "Assets/TypeScripts/ui.ts(1,5): error TS2322: Type 'string' is not assignable to type 'number'.\nFound 1 error.\n",
        2,
    );
    let project = project_manager(&dir);

    let options = ValidateOptions {
        uri: Some("unity://path/Assets/TypeScripts/ui.ts".into()),
        strict: true,
        include_diagnostics: true,
        tsc_path: Some(tsc.to_string_lossy().into_owned()),
        ..Default::default()
    };
    let response = validate(&project, &options).await.unwrap();
    assert!(!response.success);
    assert_eq!(response.message.as_deref(), Some("TypeScript validation reported issues"));

    let data = response.data.unwrap();
    assert_eq!(data["exitCode"], 2);
    assert_eq!(data["summary"]["errors"], 1);
    assert_eq!(data["summary"]["warnings"], 0);
    assert_eq!(data["target"], "Assets/TypeScripts/ui.ts");
    assert!(data["tsconfig"].is_null());
    assert_eq!(data["diagnostics"][0]["code"], "TS2322");
    assert_eq!(data["diagnostics"][0]["severity"], "error");
    assert!(data["rawOutput"].as_str().unwrap().contains("Found 1 error."));

    let args = read_fake_tsc_args(tools.path());
    assert!(args.starts_with("--pretty false --noEmit --strict"));
    assert!(args.ends_with("Assets/TypeScripts/ui.ts"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_validate_with_tsconfig_succeeds_without_diagnostics() {
    let dir = create_temp_unity_project();
    let tools = tempfile::tempdir().unwrap();
    write_project_file(dir.path(), "tsconfig.json", "{}");
    let tsc = create_fake_tsc(tools.path(), "", 0);
    let project = project_manager(&dir);

    let options = ValidateOptions {
        include_diagnostics: false,
        tsc_path: Some(tsc.to_string_lossy().into_owned()),
        ..Default::default()
    };
    let response = validate(&project, &options).await.unwrap();
    assert!(response.success);
    assert_eq!(response.message.as_deref(), Some("TypeScript validation succeeded"));

    let data = response.data.unwrap();
    assert_eq!(data["exitCode"], 0);
    assert!(data.get("diagnostics").is_none());
    assert!(data.get("rawOutput").is_none());
    assert!(data["command"].as_str().unwrap().contains("--project"));
    assert!(read_fake_tsc_args(tools.path()).contains("tsconfig.json"));
}

#[tokio::test]
async fn test_validate_missing_executable_is_not_found() {
    let dir = create_temp_unity_project();
    write_project_file(dir.path(), "tsconfig.json", "{}");
    let project = project_manager(&dir);
    let options = ValidateOptions {
        tsc_path: Some(dir.path().join("no-such-tsc").to_string_lossy().into_owned()),
        ..Default::default()
    };
    let err = validate(&project, &options).await.unwrap_err();
    assert!(matches!(err, ToolError::NotFound(_)));
}
