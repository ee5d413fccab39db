use serde::Deserialize;
use std::time::Duration;

/// User agent sent when neither the config nor the job names one
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT x.y; rv:10.0) Gecko/20100101 Firefox/10.0";

/// Main configuration structure for Ripple-Crawl
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

/// Where a failed job goes back into the queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryPlacement {
    /// The lowest-priority bucket currently present (bucket 0)
    #[default]
    Lowest,
    /// The highest bucket currently present
    Highest,
    /// The depth the job was originally submitted at
    Original,
}

/// Scheduler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum number of fetches in flight at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Attempts per job when the job does not set its own
    #[serde(default = "default_tries")]
    pub tries: u32,

    /// Bucket that receives retried jobs
    #[serde(rename = "retry-placement", default)]
    pub retry_placement: RetryPlacement,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            tries: default_tries(),
            retry_placement: RetryPlacement::default(),
        }
    }
}

/// HTTP transport configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// Decode the body to UTF-8 using the response charset
    #[serde(default = "default_true")]
    pub decode: bool,

    /// Maximum number of redirects to follow (0 disables redirects)
    #[serde(default = "default_follow")]
    pub follow: usize,

    /// Accept gzip/brotli compressed responses
    #[serde(default = "default_true")]
    pub compressed: bool,

    /// Per-request timeout (milliseconds)
    #[serde(rename = "timeout-ms", default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// User-Agent header value
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

impl TransportConfig {
    /// Returns the configured timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            decode: true,
            follow: default_follow(),
            compressed: true,
            timeout_ms: default_timeout_ms(),
            user_agent: default_user_agent(),
        }
    }
}

/// Resource monitor configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Emit resource diagnostics at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Queue depth at or below which diagnostics stay quiet (unless the queue is empty)
    #[serde(rename = "quiet-stack", default = "default_quiet_stack")]
    pub quiet_stack: usize,

    /// Minimum pressure change between two emitted diagnostics
    #[serde(rename = "pressure-delta", default = "default_pressure_delta")]
    pub pressure_delta: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            quiet_stack: default_quiet_stack(),
            pressure_delta: default_pressure_delta(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    5
}

fn default_tries() -> u32 {
    3
}

fn default_follow() -> usize {
    3
}

fn default_timeout_ms() -> u64 {
    30 * 1000
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_quiet_stack() -> usize {
    3
}

fn default_pressure_delta() -> u64 {
    15
}
