use std::path::PathBuf;

const ENV_API_KEY: &str = "VOYAGE_API_KEY";
const ENV_CACHE_DIR: &str = "LGREP_CACHE_DIR";
const ENV_LOG_LEVEL: &str = "LGREP_LOG_LEVEL";
const ENV_WARM_PATHS: &str = "LGREP_WARM_PATHS";

/// Process-wide configuration, read once at startup (§6).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub api_key: Option<String>,
    pub cache_dir: PathBuf,
    pub log_level: String,
    pub warm_paths: Vec<PathBuf>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var(ENV_API_KEY).ok().filter(|s| !s.is_empty()),
            cache_dir: std::env::var(ENV_CACHE_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_cache_dir()),
            log_level: std::env::var(ENV_LOG_LEVEL).unwrap_or_else(|_| "info".to_string()),
            warm_paths: std::env::var(ENV_WARM_PATHS)
                .map(|raw| parse_warm_paths(&raw))
                .unwrap_or_default(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    dirs_cache_root().join("lgrep")
}

fn dirs_cache_root() -> PathBuf {
    std::env::var("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            std::env::var("HOME")
                .map(|home| PathBuf::from(home).join(".cache"))
                .unwrap_or_else(|_| PathBuf::from(".cache"))
        })
}

/// Splits on the platform path separator, expands `~`, resolves, and
/// de-duplicates while preserving first-seen order.
fn parse_warm_paths(raw: &str) -> Vec<PathBuf> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for entry in raw.split(if cfg!(windows) { ';' } else { ':' }) {
        let trimmed = entry.trim();
        if trimmed.is_empty() {
            continue;
        }
        let expanded = expand_tilde(trimmed);
        let resolved = std::fs::canonicalize(&expanded).unwrap_or(expanded);
        if seen.insert(resolved.clone()) {
            out.push(resolved);
        }
    }
    out
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}
