//! The MCP transport layer (§4.9): a `LgrepService` built around an
//! `Arc<Kernel>`, served over stdio or streamable HTTP depending on how the
//! binary was invoked.

mod tools;

pub use tools::LgrepService;

use anyhow::{Context, Result};
use lgrep_kernel::Kernel;
use rmcp::transport::stdio;
use rmcp::ServiceExt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stdio,
    StreamableHttp,
}

impl std::str::FromStr for Transport {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stdio" => Ok(Transport::Stdio),
            "streamable-http" => Ok(Transport::StreamableHttp),
            other => anyhow::bail!("unknown transport: {other} (expected stdio or streamable-http)"),
        }
    }
}

/// Runs until the transport shuts down. `host`/`port` are only meaningful
/// for `Transport::StreamableHttp`.
pub async fn serve(kernel: Arc<Kernel>, transport: Transport, host: &str, port: u16) -> Result<()> {
    kernel.warm().await;

    match transport {
        Transport::Stdio => serve_stdio(kernel).await,
        Transport::StreamableHttp => serve_streamable_http(kernel, host, port).await,
    }
}

async fn serve_stdio(kernel: Arc<Kernel>) -> Result<()> {
    log::info!("lgrep MCP server listening on stdio");
    let service = LgrepService::new(kernel.clone());
    let server = service.serve(stdio()).await.context("failed to start stdio transport")?;
    server.waiting().await.context("stdio transport exited with an error")?;
    kernel.shutdown().await;
    Ok(())
}

async fn serve_streamable_http(kernel: Arc<Kernel>, host: &str, port: u16) -> Result<()> {
    use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
    use rmcp::transport::streamable_http_server::StreamableHttpService;

    let addr = format!("{host}:{port}");
    log::info!("lgrep MCP server listening on http://{addr}");

    let kernel_for_service = kernel.clone();
    let service = StreamableHttpService::new(
        move || Ok(LgrepService::new(kernel_for_service.clone())),
        LocalSessionManager::default().into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, router)
        .await
        .context("streamable-http transport exited with an error")?;
    kernel.shutdown().await;
    Ok(())
}
