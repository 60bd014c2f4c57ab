//! Environment-driven settings for the AI pipeline.

use std::time::Duration;

pub const DEFAULT_CLASSIFY_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_GENERATE_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_INTERPRET_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Parse `key` from the environment, falling back to `default` when unset or
/// unparseable.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Per-call-class budgets for model requests.
///
/// Generation, manipulation and parsing all produce a full diagram and share
/// `generate_timeout`; classification and interpretation are short answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSettings {
    pub classify_timeout: Duration,
    pub generate_timeout: Duration,
    pub interpret_timeout: Duration,
    pub max_tokens: u32,
}

impl ModelSettings {
    /// - `AI_CLASSIFY_TIMEOUT_SECS`: default 20
    /// - `AI_GENERATE_TIMEOUT_SECS`: default 60
    /// - `AI_INTERPRET_TIMEOUT_SECS`: default 30
    /// - `AI_MAX_TOKENS`: default 8192
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            classify_timeout: Duration::from_secs(env_parse("AI_CLASSIFY_TIMEOUT_SECS", DEFAULT_CLASSIFY_TIMEOUT_SECS)),
            generate_timeout: Duration::from_secs(env_parse("AI_GENERATE_TIMEOUT_SECS", DEFAULT_GENERATE_TIMEOUT_SECS)),
            interpret_timeout: Duration::from_secs(env_parse(
                "AI_INTERPRET_TIMEOUT_SECS",
                DEFAULT_INTERPRET_TIMEOUT_SECS,
            )),
            max_tokens: env_parse("AI_MAX_TOKENS", DEFAULT_MAX_TOKENS),
        }
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            classify_timeout: Duration::from_secs(DEFAULT_CLASSIFY_TIMEOUT_SECS),
            generate_timeout: Duration::from_secs(DEFAULT_GENERATE_TIMEOUT_SECS),
            interpret_timeout: Duration::from_secs(DEFAULT_INTERPRET_TIMEOUT_SECS),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
