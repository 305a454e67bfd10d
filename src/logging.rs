use env_logger::{Builder, Target};
use log::LevelFilter;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Name of the application log file
const LOG_FILE_NAME: &str = "unity_ts_mcp.log";

/// Environment variable overriding the log directory
const LOG_DIR_ENV: &str = "UNITY_TS_MCP_LOG_DIR";

/// Initialize logging: stdout under `cargo test`, a log file otherwise
///
/// Stdout carries the MCP protocol in the server, so application logs never go there.
/// Calling this more than once is harmless.
pub fn init_logging() {
    if cfg!(test) {
        init_test_logging();
    } else {
        init_file_logging();
    }
}

fn init_test_logging() {
    let _ = Builder::from_default_env()
        .target(Target::Stdout)
        .filter_level(LevelFilter::Debug)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] [{}:{}] {}",
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .is_test(true)
        .try_init();
}

fn init_file_logging() {
    let log_dir = log_directory(std::env::var(LOG_DIR_ENV).ok());
    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("Failed to create log directory {}: {}", log_dir.display(), e);
        return;
    }

    let log_file = log_dir.join(LOG_FILE_NAME);
    let file = match fs::OpenOptions::new().create(true).append(true).open(&log_file) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file {}: {}", log_file.display(), e);
            return;
        }
    };

    // RUST_LOG still applies on top of the Info default
    let mut builder = Builder::new();
    builder.filter_level(LevelFilter::Info);
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }
    let installed = builder
        .target(Target::Pipe(Box::new(file)))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] [{}] [{}:{}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .try_init();

    if installed.is_ok() {
        log::info!("Logging initialized to file: {}", log_file.display());
    }
}

/// Directory for the application log
///
/// An explicit override wins, then the platform's local data directory.
fn log_directory(override_dir: Option<String>) -> PathBuf {
    if let Some(dir) = override_dir.filter(|d| !d.trim().is_empty()) {
        return PathBuf::from(dir);
    }
    match dirs::data_local_dir() {
        Some(data_dir) => data_dir.join("UnityTsMcp"),
        None => PathBuf::from("./logs"),
    }
}

/// Macro for debug logging
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        log::debug!($($arg)*)
    };
}

/// Macro for info logging
#[macro_export]
macro_rules! info_log {
    ($($arg:tt)*) => {
        log::info!($($arg)*)
    };
}

/// Macro for warning logging
#[macro_export]
macro_rules! warn_log {
    ($($arg:tt)*) => {
        log::warn!($($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_directory_default() {
        let log_dir = log_directory(None);
        assert!(log_dir.ends_with("UnityTsMcp") || log_dir.ends_with("logs"));
    }

    #[test]
    fn test_log_directory_override() {
        assert_eq!(log_directory(Some("/var/log/unity".into())), PathBuf::from("/var/log/unity"));
        assert_eq!(log_directory(Some("  ".into())), log_directory(None));
    }

    #[test]
    fn test_logging_macros() {
        init_logging();
        init_logging();

        debug_log!("This is a debug message");
        info_log!("This is an info message");
        warn_log!("This is a warning message");
    }
}
