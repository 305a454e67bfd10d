use rmcp::{ServiceExt, transport::stdio};
use unity_ts_mcp::logging::init_logging;
use unity_ts_mcp::{ServerConfig, UnityTsMcpServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = ServerConfig::from_env();
    match &config.fallback_project_path {
        Some(path) => log::info!("Using Unity project: {}", path.display()),
        None => log::info!("No Unity project configured, waiting for client roots or per-call project_root"),
    }
    log::info!(
        "Unity bridge at {}:{} (instance={})",
        config.bridge.host,
        config.bridge.port,
        config.instance_label()
    );

    let service = UnityTsMcpServer::new(config)
        .serve(stdio())
        .await
        .inspect_err(|e| log::error!("Failed to start MCP server: {}", e))?;

    service.waiting().await?;
    log::info!("MCP server stopped");
    Ok(())
}
