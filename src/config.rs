use serde::{Deserialize, Serialize};

use crate::utils::get_env_with_prefix;

/// Log output settings for [`init_tracing_with_config`]
///
/// [`init_tracing_with_config`]: crate::init_tracing_with_config
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `tidegate=debug,session.audit=info`
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_json")]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json() -> bool {
    false
}

impl LoggingConfig {
    /// Load from `TIDEGATE_LOG_LEVEL` and `TIDEGATE_LOG_JSON`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            config.level = level;
        }
        if let Some(json) = get_env_with_prefix("LOG_JSON") {
            config.json = json.parse().unwrap_or(false);
        }

        config
    }
}
