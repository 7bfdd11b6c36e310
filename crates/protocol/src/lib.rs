//! Wire-level shapes shared by every lgrep tool.
//!
//! This crate owns exactly what crosses the MCP boundary: the five tool
//! response envelopes and the single error shape every handler converts
//! into before it reaches a caller. It does not know about projects,
//! indexing, or storage — those crates depend on this one, never the
//! other way around.

use serde::{Deserialize, Serialize};

/// The six failure categories a tool handler can surface, per the error
/// handling taxonomy. Carried alongside the message only for structured
/// logging; callers only ever see the rendered `ErrorEnvelope`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InputValidation,
    Configuration,
    DependencyFailure,
    StoreCorruption,
    PartialIndexing,
    Internal,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::InputValidation => "input_validation",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::DependencyFailure => "dependency_failure",
            ErrorCategory::StoreCorruption => "store_corruption",
            ErrorCategory::PartialIndexing => "partial_indexing",
            ErrorCategory::Internal => "internal",
        }
    }
}

/// The only shape an error ever takes once it crosses the tool boundary:
/// a single user-facing sentence, no stack trace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub error: String,
}

impl ErrorEnvelope {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }

    /// Construct an envelope while logging the category and message at the
    /// level the taxonomy assigns it (corruption and internal errors are
    /// WARNING-and-above; everything else is informational).
    pub fn from_category(category: ErrorCategory, message: impl Into<String>) -> Self {
        let message = message.into();
        match category {
            ErrorCategory::StoreCorruption => {
                log::warn!("store corruption recovered: {message}")
            }
            ErrorCategory::Internal => log::error!("internal invariant violation: {message}"),
            ErrorCategory::DependencyFailure => log::warn!("dependency failure: {message}"),
            ErrorCategory::PartialIndexing => log::warn!("partial indexing failure: {message}"),
            ErrorCategory::InputValidation | ErrorCategory::Configuration => {
                log::debug!("{}: {message}", category.as_str())
            }
        }
        Self { error: message }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("ErrorEnvelope is always serializable")
    }
}

/// `{match_type: "vector"}` vs `{match_type: "hybrid"}` per §4.5.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Vector,
    Hybrid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub content: String,
    pub score: f64,
    pub match_type: MatchType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResultItem>,
    pub query_time_ms: f64,
    pub total_chunks: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexResponse {
    pub file_count: u64,
    pub chunk_count: u64,
    pub duration_ms: f64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectStatus {
    pub path: String,
    pub chunk_count: u64,
    pub file_count: u64,
    pub watching: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disk_cache: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusResponse {
    Single(ProjectStatus),
    All { projects: Vec<ProjectStatus> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchStartResponse {
    pub path: String,
    pub watching: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WatchStopResponse {
    Single { stopped: bool, project: String },
    All { stopped: bool, projects_stopped: Vec<String> },
}

/// Durations in the wire envelopes are milliseconds rounded to two decimals.
pub fn round_ms(duration: std::time::Duration) -> f64 {
    (duration.as_secs_f64() * 1000.0 * 100.0).round() / 100.0
}
