use anyhow::{Context, Result};
use rmcp::{model::CallToolRequestParam, service::ServiceExt, transport::TokioChildProcess};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::tempdir;
use tokio::process::Command;

fn locate_bin() -> Result<PathBuf> {
    if let Some(path) = option_env!("CARGO_BIN_EXE_lgrep-mcp-server") {
        return Ok(PathBuf::from(path));
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(target_profile_dir) = exe.parent().and_then(|p| p.parent()) {
            let candidate = target_profile_dir.join("lgrep-mcp-server");
            if candidate.exists() {
                return Ok(candidate);
            }
        }
    }
    anyhow::bail!("failed to locate lgrep-mcp-server binary")
}

#[tokio::test]
async fn exposes_exactly_the_five_spec_tools() -> Result<()> {
    let bin = locate_bin()?;
    let cache_dir = tempdir()?;

    let mut cmd = Command::new(bin);
    cmd.env("VOYAGE_API_KEY", "test-key-unused-without-indexing");
    cmd.env("LGREP_CACHE_DIR", cache_dir.path());
    cmd.env("LGREP_LOG_LEVEL", "warn");

    let transport = TokioChildProcess::new(cmd).context("spawn lgrep-mcp-server")?;
    let service = tokio::time::timeout(Duration::from_secs(10), ().serve(transport))
        .await
        .context("timeout starting MCP server")??;

    let tools = tokio::time::timeout(
        Duration::from_secs(10),
        service.list_tools(Default::default()),
    )
    .await
    .context("timeout listing tools")??;

    let tool_names: HashSet<&str> = tools.tools.iter().map(|t| t.name.as_ref()).collect();
    for expected in ["search", "index", "status", "watch_start", "watch_stop"] {
        assert!(tool_names.contains(expected), "missing tool: {expected}");
    }
    assert_eq!(tool_names.len(), 5, "unexpected extra tools: {tool_names:?}");

    service.cancel().await?;
    Ok(())
}

#[tokio::test]
async fn status_with_no_live_projects_returns_an_empty_list() -> Result<()> {
    let bin = locate_bin()?;
    let cache_dir = tempdir()?;

    let mut cmd = Command::new(bin);
    cmd.env("VOYAGE_API_KEY", "test-key-unused-without-indexing");
    cmd.env("LGREP_CACHE_DIR", cache_dir.path());
    cmd.env("LGREP_LOG_LEVEL", "warn");

    let transport = TokioChildProcess::new(cmd).context("spawn lgrep-mcp-server")?;
    let service = tokio::time::timeout(Duration::from_secs(10), ().serve(transport))
        .await
        .context("timeout starting MCP server")??;

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        service.call_tool(CallToolRequestParam {
            name: "status".into(),
            arguments: Some(serde_json::json!({}).as_object().unwrap().clone()),
        }),
    )
    .await
    .context("timeout calling status")??;

    assert_ne!(result.is_error, Some(true), "status must succeed with no projects live");

    service.cancel().await?;
    Ok(())
}
