// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the contact intake service.
//!
//! File keys may be written `rate-limit.max-overall-requests` or
//! `rate_limit.max_overall_requests`; both load the same field. Environment
//! overrides use the `CONTACT_INTAKE` prefix with `__` between levels, e.g.
//! `CONTACT_INTAKE__RATE_LIMIT__COOLDOWN_MINUTES=10`, and take precedence
//! over the file.

use ::config::{ConfigError, Environment, File, Map, Source, Value, ValueKind};
use serde::{Deserialize, Serialize};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "CONTACT_INTAKE_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "contact-intake";
const ENV_PREFIX: &str = "CONTACT_INTAKE";

/// Configuration for the contact intake service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Upper bound on handling one request, body included (default: 10000)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Admission policy
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Housekeeping sweep
    #[serde(default)]
    pub data_cleanup: CleanupConfig,

    /// Downstream notification
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Per-IP admission policy.
///
/// Values are signed and unvalidated: zero or negative settings are
/// accepted and give degenerate results (`max_overall_requests = 0` denies
/// every request).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Submissions allowed per IP inside the window (default: 3)
    #[serde(default = "default_max_overall_requests")]
    pub max_overall_requests: i64,

    /// Length of the counting window in minutes (default: 1440)
    #[serde(default = "default_overall_window_minutes")]
    pub overall_window_minutes: i64,

    /// Minimum spacing between accepted submissions in minutes (default: 5)
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: i64,
}

/// Retention sweep configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// IP log entries older than this many days are deleted (default: 20)
    #[serde(default = "default_days_old")]
    pub days_old: i64,

    /// Seconds between sweeps (default: 86400)
    #[serde(default = "default_cleanup_interval_secs")]
    pub interval_secs: u64,
}

/// Which notifier implementation to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    /// Emit the payload as a structured log event
    Log,
    /// POST the payload to a push endpoint
    Http,
}

/// Notification publisher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(default = "default_notifier_kind")]
    pub kind: NotifierKind,

    /// Push endpoint, required when `kind = "http"`
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Topic name sent alongside every message (default: contact-me)
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Request timeout for the push endpoint (default: 5000)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_max_overall_requests() -> i64 {
    3
}

fn default_overall_window_minutes() -> i64 {
    1440 // 24 hours
}

fn default_cooldown_minutes() -> i64 {
    5
}

fn default_days_old() -> i64 {
    20
}

fn default_cleanup_interval_secs() -> u64 {
    86_400
}

fn default_notifier_kind() -> NotifierKind {
    NotifierKind::Log
}

fn default_topic() -> String {
    "contact-me".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            request_timeout_ms: default_request_timeout_ms(),
            rate_limit: RateLimitConfig::default(),
            data_cleanup: CleanupConfig::default(),
            notifier: NotifierConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_overall_requests: default_max_overall_requests(),
            overall_window_minutes: default_overall_window_minutes(),
            cooldown_minutes: default_cooldown_minutes(),
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            days_old: default_days_old(),
            interval_secs: default_cleanup_interval_secs(),
        }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            kind: default_notifier_kind(),
            endpoint: None,
            topic: default_topic(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl Config {
    /// Load configuration from an optional file and the environment.
    ///
    /// A `.env` file, if present, is applied to the process environment
    /// first. The file is `contact-intake.{toml,yaml,json}` in the working
    /// directory unless `CONTACT_INTAKE_CONFIG` names another path.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let file = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(&file, environment())
    }

    /// Layer defaults, the optional file at `path`, then `env`.
    pub fn load_from(path: &str, env: Environment) -> Result<Self, ConfigError> {
        ::config::Config::builder()
            .add_source(SnakeCaseKeys(File::with_name(path).required(false)))
            .add_source(env)
            .build()?
            .try_deserialize()
    }

    /// Per-request time limit
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.request_timeout_ms)
    }
}

/// The `CONTACT_INTAKE__SECTION__KEY` environment source.
pub fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Rewrites `-` to `_` in every key of the wrapped source, so kebab-case
/// file keys line up with the snake_case keys the environment produces.
#[derive(Debug, Clone)]
struct SnakeCaseKeys<S>(S);

impl<S> Source for SnakeCaseKeys<S>
where
    S: Source + Clone + Send + Sync + 'static,
{
    fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
        Box::new(self.clone())
    }

    fn collect(&self) -> Result<Map<String, Value>, ConfigError> {
        Ok(snake_case_table(self.0.collect()?))
    }
}

fn snake_case_table(table: Map<String, Value>) -> Map<String, Value> {
    table
        .into_iter()
        .map(|(key, value)| (key.replace('-', "_"), snake_case_value(value)))
        .collect()
}

fn snake_case_value(mut value: Value) -> Value {
    value.kind = match value.kind {
        ValueKind::Table(table) => ValueKind::Table(snake_case_table(table)),
        ValueKind::Array(items) => ValueKind::Array(items.into_iter().map(snake_case_value).collect()),
        other => other,
    };
    value
}

impl RateLimitConfig {
    /// Get the counting window
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::try_minutes(self.overall_window_minutes).unwrap_or(chrono::Duration::MAX)
    }

    /// Get the cooldown between submissions
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::try_minutes(self.cooldown_minutes).unwrap_or(chrono::Duration::MAX)
    }
}

impl CleanupConfig {
    /// Get the retention horizon
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::try_days(self.days_old).unwrap_or(chrono::Duration::MAX)
    }

    /// Get the sweep interval
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs)
    }
}
