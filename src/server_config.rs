use std::path::PathBuf;
use std::time::Duration;

use crate::unity_project_manager::UnityProjectManager;
use crate::warn_log;

/// Default TCP port of the Unity Editor command bridge
pub const DEFAULT_BRIDGE_PORT: u16 = 6400;

/// Default number of retries for bridge commands
pub const DEFAULT_BRIDGE_RETRIES: u32 = 3;

/// Default delay between bridge retries in milliseconds
pub const DEFAULT_BRIDGE_RETRY_DELAY_MS: u64 = 500;

/// Default timeout in seconds for a single bridge round trip
pub const DEFAULT_BRIDGE_TIMEOUT_SECS: u64 = 30;

/// Settings of the Unity Editor command bridge connection
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    pub host: String,
    pub port: u16,
    pub retries: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_BRIDGE_PORT,
            retries: DEFAULT_BRIDGE_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_BRIDGE_RETRY_DELAY_MS),
            timeout: Duration::from_secs(DEFAULT_BRIDGE_TIMEOUT_SECS),
        }
    }
}

/// Server configuration, read once at startup and passed to the server explicitly
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerConfig {
    /// Project used when a tool call does not name one
    pub fallback_project_path: Option<PathBuf>,
    /// Label of the Unity instance commands are meant for (logging and selection only)
    pub unity_instance: Option<String>,
    /// Default `tsc` executable
    pub tsc_path: Option<String>,
    pub bridge: BridgeConfig,
}

impl ServerConfig {
    /// Build the configuration from the process environment and command line
    pub fn from_env() -> Self {
        let cli_path = std::env::args().nth(1);
        Self::from_lookup(cli_path, |key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    ///
    /// `cli_project_path` takes precedence over `UNITY_PROJECT_PATH`.
    pub fn from_lookup<F>(cli_project_path: Option<String>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let fallback_project_path = cli_project_path
            .filter(|path| !path.trim().is_empty())
            .or_else(|| non_empty("UNITY_PROJECT_PATH"))
            .and_then(|path| {
                if UnityProjectManager::is_unity_project_path(&path) {
                    Some(PathBuf::from(path))
                } else {
                    warn_log!("Provided fallback project path is not a valid Unity project: {}", path);
                    None
                }
            });

        let defaults = BridgeConfig::default();
        let bridge = BridgeConfig {
            host: non_empty("UNITY_BRIDGE_HOST").unwrap_or(defaults.host),
            port: parse_or(non_empty("UNITY_BRIDGE_PORT"), "UNITY_BRIDGE_PORT", defaults.port),
            retries: parse_or(non_empty("UNITY_BRIDGE_RETRIES"), "UNITY_BRIDGE_RETRIES", defaults.retries),
            retry_delay: Duration::from_millis(parse_or(
                non_empty("UNITY_BRIDGE_RETRY_DELAY_MS"),
                "UNITY_BRIDGE_RETRY_DELAY_MS",
                DEFAULT_BRIDGE_RETRY_DELAY_MS,
            )),
            timeout: Duration::from_secs(parse_or(
                non_empty("UNITY_BRIDGE_TIMEOUT_SECS"),
                "UNITY_BRIDGE_TIMEOUT_SECS",
                DEFAULT_BRIDGE_TIMEOUT_SECS,
            )),
        };

        Self {
            fallback_project_path,
            unity_instance: non_empty("UNITY_INSTANCE"),
            tsc_path: non_empty("TSC_PATH"),
            bridge,
        }
    }

    /// Label used in log lines for the targeted Unity instance
    pub fn instance_label(&self) -> &str {
        self.unity_instance.as_deref().unwrap_or("default")
    }
}

fn parse_or<T: std::str::FromStr + Copy + std::fmt::Display>(
    value: Option<String>,
    key: &str,
    default: T,
) -> T {
    match value {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn_log!("Invalid value '{}' for {}, using default {}", raw, key, default);
            default
        }),
    }
}
