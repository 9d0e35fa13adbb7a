use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_API_BASE: &str = "http://localhost:8001/api";
pub const DEFAULT_USER_ID: &str = "anonymous";
pub const DEFAULT_REPORT_PREFIX: &str = "MediSafe-Report";
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Settings for the analysis client and the submit cycle
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Base URL of the analysis service, including the `/api` prefix
    pub api_base: String,
    pub user_id: String,
    pub request_timeout: Duration,
    /// Time between two cosmetic progress stages
    pub progress_interval: Duration,
    /// How long the final progress state stays visible before resetting
    pub settle_delay: Duration,
    pub history_limit: usize,
    pub report_prefix: String,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            user_id: DEFAULT_USER_ID.to_string(),
            request_timeout: Duration::from_secs(120),
            progress_interval: Duration::from_millis(5000),
            settle_delay: Duration::from_millis(1000),
            history_limit: DEFAULT_HISTORY_LIMIT,
            report_prefix: DEFAULT_REPORT_PREFIX.to_string(),
        }
    }
}

impl WorkflowConfig {
    /// Build a config from `MEDISAFE_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            api_base: lookup("MEDISAFE_API_BASE").unwrap_or(defaults.api_base),
            user_id: lookup("MEDISAFE_USER_ID").unwrap_or(defaults.user_id),
            request_timeout: parse_or(&lookup, "MEDISAFE_TIMEOUT_SECS", 120)
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            progress_interval: parse_or(&lookup, "MEDISAFE_PROGRESS_INTERVAL_MS", 5000)
                .map(Duration::from_millis)
                .unwrap_or(defaults.progress_interval),
            settle_delay: parse_or(&lookup, "MEDISAFE_SETTLE_DELAY_MS", 1000)
                .map(Duration::from_millis)
                .unwrap_or(defaults.settle_delay),
            history_limit: parse_or(&lookup, "MEDISAFE_HISTORY_LIMIT", DEFAULT_HISTORY_LIMIT)
                .unwrap_or(defaults.history_limit),
            report_prefix: lookup("MEDISAFE_REPORT_PREFIX").unwrap_or(defaults.report_prefix),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn with_timings(mut self, progress_interval: Duration, settle_delay: Duration) -> Self {
        self.progress_interval = progress_interval;
        self.settle_delay = settle_delay;
        self
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    fallback: T,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring invalid configuration value");
            Some(fallback)
        }
    }
}
