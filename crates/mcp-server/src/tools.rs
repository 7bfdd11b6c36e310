//! The five tools a caller can invoke against the kernel (§4.9).
//!
//! Every handler validates its input, forwards to `Kernel`, and renders the
//! result as a JSON string — success or `{"error": "..."}`  — so no
//! `McpError` ever carries a stack trace back to the caller.

use lgrep_kernel::Kernel;
use lgrep_protocol::ErrorEnvelope;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::{schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone)]
pub struct LgrepService {
    kernel: Arc<Kernel>,
    tool_router: ToolRouter<Self>,
}

impl LgrepService {
    pub fn new(kernel: Arc<Kernel>) -> Self {
        Self { kernel, tool_router: Self::tool_router() }
    }
}

#[tool_handler]
impl ServerHandler for LgrepService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "lgrep provides semantic code search over one or more projects. \
                 Call 'search' directly — a cold project auto-indexes on first use. \
                 Use 'index' to force a full re-index, 'status' to inspect what's \
                 indexed, and 'watch_start'/'watch_stop' to keep a project's index \
                 current as files change."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchRequest {
    #[schemars(description = "Natural language search query")]
    pub query: String,
    #[schemars(description = "Project directory path (defaults to current directory)")]
    pub path: Option<String>,
    #[schemars(description = "Maximum number of results (default 10)")]
    pub limit: Option<usize>,
    #[schemars(description = "Disable full-text fusion and use vector-only search")]
    pub no_hybrid: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct IndexRequest {
    #[schemars(description = "Project directory path (defaults to current directory)")]
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct StatusRequest {
    #[schemars(description = "Project directory path; omit to list every live project")]
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct WatchStartRequest {
    #[schemars(description = "Project directory path (defaults to current directory)")]
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct WatchStopRequest {
    #[schemars(description = "Project directory path; omit to stop every active watcher")]
    pub path: Option<String>,
}

#[tool_router]
impl LgrepService {
    #[tool(
        description = "Search a project's indexed code with a natural language query. A cold project auto-indexes on first call, which may take tens of seconds."
    )]
    pub async fn search(
        &self,
        Parameters(request): Parameters<SearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        if request.query.trim().is_empty() {
            return Ok(error_result("query must not be empty"));
        }
        let path = resolve(request.path);
        let limit = request.limit.unwrap_or(10).clamp(1, 200);
        let hybrid = !request.no_hybrid.unwrap_or(false);

        match self.kernel.search(&request.query, &path, limit, hybrid).await {
            Ok(response) => Ok(success_result(&response)),
            Err(err) => Ok(kernel_error_result(&err)),
        }
    }

    #[tool(description = "Force a full (re)index of a project directory.")]
    pub async fn index(
        &self,
        Parameters(request): Parameters<IndexRequest>,
    ) -> Result<CallToolResult, McpError> {
        let path = resolve(request.path);
        match self.kernel.index(&path).await {
            Ok(response) => Ok(success_result(&response)),
            Err(err) => Ok(kernel_error_result(&err)),
        }
    }

    #[tool(
        description = "Show indexing statistics for one project, or every live project if no path is given."
    )]
    pub async fn status(
        &self,
        Parameters(request): Parameters<StatusRequest>,
    ) -> Result<CallToolResult, McpError> {
        let path = request.path.map(PathBuf::from);
        match self.kernel.status(path.as_deref()).await {
            Ok(response) => Ok(success_result(&response)),
            Err(err) => Ok(kernel_error_result(&err)),
        }
    }

    #[tool(
        description = "Start watching a project directory, incrementally re-indexing files as they change."
    )]
    pub async fn watch_start(
        &self,
        Parameters(request): Parameters<WatchStartRequest>,
    ) -> Result<CallToolResult, McpError> {
        let path = resolve(request.path);
        match self.kernel.watch_start(&path).await {
            Ok(response) => Ok(success_result(&response)),
            Err(err) => Ok(kernel_error_result(&err)),
        }
    }

    #[tool(
        description = "Stop watching one project, or every actively watched project if no path is given."
    )]
    pub async fn watch_stop(
        &self,
        Parameters(request): Parameters<WatchStopRequest>,
    ) -> Result<CallToolResult, McpError> {
        let path = request.path.map(PathBuf::from);
        match self.kernel.watch_stop(path.as_deref()).await {
            Ok(response) => Ok(success_result(&response)),
            Err(err) => Ok(kernel_error_result(&err)),
        }
    }
}

fn resolve(path: Option<String>) -> PathBuf {
    path.map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."))
}

fn success_result(value: &impl Serialize) -> CallToolResult {
    CallToolResult::success(vec![Content::text(
        serde_json::to_string(value).unwrap_or_default(),
    )])
}

fn error_result(message: impl Into<String>) -> CallToolResult {
    CallToolResult::error(vec![Content::text(ErrorEnvelope::new(message).to_json())])
}

fn kernel_error_result(err: &lgrep_kernel::KernelError) -> CallToolResult {
    let envelope = ErrorEnvelope::from_category(err.category(), err.to_string());
    CallToolResult::error(vec![Content::text(envelope.to_json())])
}
