#![deny(warnings)]
#![deny(clippy::unwrap_used)]

use std::sync::Arc;

use poem_mcpserver::McpServer;
use ssh_door::door::{DoorConfig, DoorService};
use ssh_door::mcp::McpDoorCommands;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().expect("valid directive")),
        )
        .init();

    let service = Arc::new(DoorService::from_config(&DoorConfig::from_env()));
    poem_mcpserver::stdio::stdio(McpServer::new().tools(McpDoorCommands::new(service))).await?;
    Ok(())
}
