//! Unity TypeScript MCP Server
//!
//! A Model Context Protocol (MCP) server that lets an agent manage the Puerts
//! TypeScript sources of a Unity project and drive prefab stages in a running
//! Unity Editor. File operations are sandboxed to the project's `Assets` tree,
//! validation runs the TypeScript compiler, and prefab commands are forwarded
//! to the editor over its command bridge.

pub mod logging;
pub mod mcp_server;
pub mod prefab_manager;
pub mod server_config;
pub mod tool_response;
pub mod ts_compiler;
pub mod ts_path_resolver;
pub mod ts_script_manager;
pub mod unity_bridge_client;
pub mod unity_project_manager;

#[cfg(test)]
mod test_utils;
#[cfg(test)]
mod ts_compiler_tests;
#[cfg(test)]
mod unity_bridge_client_tests;

pub use mcp_server::UnityTsMcpServer;
pub use server_config::ServerConfig;
pub use tool_response::{ToolError, ToolResponse};
pub use unity_bridge_client::{BridgeError, CommandTransport, UnityBridgeClient};
pub use unity_project_manager::UnityProjectManager;
