#![deny(warnings)]
#![deny(clippy::unwrap_used)]

use std::sync::Arc;

use dotenv::dotenv;
use poem::{EndpointExt, Route, Server, listener::TcpListener, middleware::Tracing};
use poem_mcpserver::{McpServer, streamable_http};
use ssh_door::door::{DoorConfig, DoorService};
use ssh_door::mcp::McpDoorCommands;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().expect("valid directive")),
        )
        .init();

    let config = DoorConfig::from_env();
    info!(
        "Door host {}:{}, credentials in {}",
        config.host,
        config.port,
        config.credentials_file.display()
    );

    let service = Arc::new(DoorService::from_config(&config));

    // Connect in the background so the first door action skips the handshake.
    let warm = service.clone();
    tokio::spawn(async move {
        if let Err(kind) = warm.warm_up().await {
            warn!("Warm-up connect failed: {}", kind);
        }
    });

    let mcp_port: u16 = std::env::var("MCP_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);
    let mcp_addr = format!("0.0.0.0:{}", mcp_port);
    info!("Starting MCP server on {}", mcp_addr);

    let app = Route::new()
        .at(
            "/",
            streamable_http::endpoint(move |_| {
                McpServer::new().tools(McpDoorCommands::new(service.clone()))
            }),
        )
        .with(Tracing);

    info!("Door MCP server is ready");

    Server::new(TcpListener::bind(mcp_addr))
        .name("SSH Door MCP Server")
        .run(app)
        .await?;

    Ok(())
}
