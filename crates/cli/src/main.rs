//! lgrep command-line entry point.
//!
//! `--version`/`--help` are handled by clap's own short-circuit inside
//! `Cli::parse()`, before a `ServerConfig` or `Kernel` is ever constructed —
//! so a missing `VOYAGE_API_KEY` never blocks `lgrep --version`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lgrep_kernel::{Kernel, ServerConfig};
use lgrep_mcp_server::Transport;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "lgrep")]
#[command(about = "Semantic code search over one or more projects", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP server (default if no subcommand is given)
    Serve(ServeArgs),

    /// Search a project's indexed code
    Search(SearchArgs),

    /// (Re)index a project directory
    Index(IndexArgs),

    /// Evict a project from the in-memory registry (on-disk cache survives)
    Remove(RemoveArgs),
}

#[derive(clap::Args)]
struct ServeArgs {
    /// Transport to serve the MCP protocol over
    #[arg(long, default_value = "stdio")]
    transport: String,

    /// Bind host, used only for --transport streamable-http
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Bind port, used only for --transport streamable-http
    #[arg(long, default_value_t = 6285)]
    port: u16,
}

#[derive(clap::Args)]
struct SearchArgs {
    /// Natural language search query
    query: String,

    /// Project directory (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Maximum number of results
    #[arg(short = 'm', long = "limit", default_value_t = 10)]
    limit: usize,

    /// Disable full-text fusion and use vector-only search
    #[arg(long)]
    no_hybrid: bool,
}

#[derive(clap::Args)]
struct IndexArgs {
    /// Project directory (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Target chunk size in tokens (reserved; current build uses a fixed budget)
    #[arg(long)]
    chunk_size: Option<usize>,
}

#[derive(clap::Args)]
struct RemoveArgs {
    /// Project directory to evict
    path: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(
            std::env::var("LGREP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        ),
    )
    .init();

    let result = match cli.command.unwrap_or(Commands::Serve(ServeArgs {
        transport: "stdio".to_string(),
        host: "127.0.0.1".to_string(),
        port: 6285,
    })) {
        Commands::Serve(args) => run_serve(args).await,
        Commands::Search(args) => run_search(args).await,
        Commands::Index(args) => run_index(args).await,
        Commands::Remove(args) => run_remove(args).await,
    };

    if let Err(err) = result {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
    Ok(())
}

fn kernel_from_env() -> Arc<Kernel> {
    Arc::new(Kernel::new(ServerConfig::from_env()))
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let transport = Transport::from_str(&args.transport)?;
    let kernel = kernel_from_env();
    lgrep_mcp_server::serve(kernel, transport, &args.host, args.port).await
}

async fn run_search(args: SearchArgs) -> Result<()> {
    let kernel = kernel_from_env();
    let response = kernel
        .search(&args.query, &args.path, args.limit, !args.no_hybrid)
        .await
        .context("search failed")?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn run_index(args: IndexArgs) -> Result<()> {
    if args.chunk_size.is_some() {
        log::warn!("--chunk-size is not yet wired to the chunker; the default budget is used");
    }
    let kernel = kernel_from_env();
    let response = kernel.index(&args.path).await.context("index failed")?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn run_remove(args: RemoveArgs) -> Result<()> {
    let kernel = kernel_from_env();
    kernel.remove(&args.path).await.context("remove failed")?;
    println!("{}", serde_json::to_string_pretty(&serde_json::json!({
        "removed": args.path.display().to_string(),
    }))?);
    Ok(())
}
