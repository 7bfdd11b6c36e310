//! lgrep MCP server entry point.
//!
//! Stdout is reserved for the stdio transport's line-framed JSON; every log
//! line goes to stderr.

use anyhow::Result;
use lgrep_kernel::{Kernel, ServerConfig};
use lgrep_mcp_server::Transport;
use std::str::FromStr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let transport = std::env::var("LGREP_TRANSPORT")
        .ok()
        .map(|s| Transport::from_str(&s))
        .transpose()?
        .unwrap_or(Transport::Stdio);
    let host = std::env::var("LGREP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("LGREP_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(6285);

    let config = ServerConfig::from_env();
    let kernel = Arc::new(Kernel::new(config));

    log::info!("starting lgrep MCP server");
    lgrep_mcp_server::serve(kernel, transport, &host, port).await?;
    log::info!("lgrep MCP server stopped");
    Ok(())
}
