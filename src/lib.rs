//! Ripple-Crawl: a bounded-concurrency crawl scheduler
//!
//! This crate queues fetch requests by depth, dispatches them under a global
//! concurrency limit, parses responses into navigable documents, and retries
//! failed attempts up to a per-job budget.

pub mod config;
pub mod crawler;
pub mod document;
pub mod state;

use thiserror::Error;

/// Main error type for Ripple-Crawl operations
#[derive(Debug, Error)]
pub enum CrawlError {
    /// A single attempt failed and the job went back into the queue
    #[error("[{method}] {url} tries: {attempt}/{tries} - {source}")]
    Attempt {
        method: String,
        url: String,
        attempt: u32,
        tries: u32,
        source: FetchError,
    },

    /// The final attempt failed; the job has been dropped
    #[error("[{method}] {url} exhausted after {attempts} tries - {source}")]
    ExhaustedRetries {
        method: String,
        url: String,
        attempts: u32,
        source: FetchError,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CrawlError {
    /// Returns the cause of a failed attempt, if this error describes one
    pub fn fetch_error(&self) -> Option<&FetchError> {
        match self {
            Self::Attempt { source, .. } | Self::ExhaustedRetries { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Returns true if the job behind this error will not be retried again
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::ExhaustedRetries { .. })
    }
}

/// Why one fetch attempt failed
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{0}")]
    Transport(#[from] TransportError),

    #[error("Document is empty")]
    EmptyDocument,
}

/// Errors raised by a [`crawler::Transport`]
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request timeout")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("{0}")]
    Other(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Selector translation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("Empty selector")]
    Empty,

    #[error("Unsupported selector syntax at '{0}'")]
    Unsupported(String),

    #[error("Malformed path expression: {0}")]
    MalformedPath(String),

    #[error("Path evaluation failed: {0}")]
    Evaluation(String),
}

/// Result type alias for Ripple-Crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{
    Callback, ContentKind, DocumentParser, Fetched, JobOptions, MarkupParser, Params,
    ReqwestTransport, ResourceMonitor, Scheduler, SchedulerStats, Submitter, Transport,
};
pub use document::{translate_selector, Document, Element, Node};
pub use state::JobState;
