//! Free-trial limiting for unauthenticated preview generation.
//!
//! DESIGN
//! ======
//! Sliding-window counters backed by `HashMap<String, VecDeque<Instant>>`,
//! keyed by a caller-supplied identity token (session id, API key hash,
//! client address; the caller decides). Two limits are enforced:
//! - Per-identity: `TRIAL_LIMIT` previews per `TRIAL_WINDOW_SECS` (3/day)
//! - Global: `TRIAL_GLOBAL_LIMIT` previews per `TRIAL_GLOBAL_WINDOW_SECS`
//!
//! TRADE-OFFS
//! ==========
//! [`InMemoryTrialLimiter`] is process-local: counts reset on restart and are
//! not shared between replicas. Deployments that need either plug in another
//! [`TrialLimiter`].

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::env_parse;
use crate::error::ErrorCode;

const DEFAULT_TRIAL_LIMIT: usize = 3;
const DEFAULT_TRIAL_WINDOW_SECS: u64 = 86_400;

const DEFAULT_GLOBAL_LIMIT: usize = 60;
const DEFAULT_GLOBAL_WINDOW_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub per_identity_limit: usize,
    pub per_identity_window: Duration,
    pub global_limit: usize,
    pub global_window: Duration,
}

impl RateLimitConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            per_identity_limit: env_parse("TRIAL_LIMIT", DEFAULT_TRIAL_LIMIT),
            per_identity_window: Duration::from_secs(env_parse("TRIAL_WINDOW_SECS", DEFAULT_TRIAL_WINDOW_SECS)),
            global_limit: env_parse("TRIAL_GLOBAL_LIMIT", DEFAULT_GLOBAL_LIMIT),
            global_window: Duration::from_secs(env_parse("TRIAL_GLOBAL_WINDOW_SECS", DEFAULT_GLOBAL_WINDOW_SECS)),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_identity_limit: DEFAULT_TRIAL_LIMIT,
            per_identity_window: Duration::from_secs(DEFAULT_TRIAL_WINDOW_SECS),
            global_limit: DEFAULT_GLOBAL_LIMIT,
            global_window: Duration::from_secs(DEFAULT_GLOBAL_WINDOW_SECS),
        }
    }
}

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum RateLimitError {
    #[error("trial limit reached (max {limit} previews/{window_secs}s)")]
    TrialExhausted { limit: usize, window_secs: u64 },
    #[error("global preview rate limit exceeded (max {limit} requests/{window_secs}s)")]
    GlobalExceeded { limit: usize, window_secs: u64 },
    #[error("identity token must not be empty")]
    MissingIdentity,
}

impl ErrorCode for RateLimitError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::TrialExhausted { .. } => "E_TRIAL_EXHAUSTED",
            Self::GlobalExceeded { .. } => "E_RATE_LIMITED",
            Self::MissingIdentity => "E_MISSING_IDENTITY",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::GlobalExceeded { .. })
    }
}

// =============================================================================
// TRAIT
// =============================================================================

pub trait TrialLimiter: Send + Sync {
    /// Check both limits for `identity` and, if allowed, consume one trial.
    ///
    /// # Errors
    ///
    /// The first limit that would be exceeded; nothing is recorded then.
    fn check_and_record(&self, identity: &str) -> Result<(), RateLimitError>;

    /// Trials left for `identity` in the current window.
    fn remaining(&self, identity: &str) -> usize;

    /// Forget all recorded trials for `identity`.
    fn reset(&self, identity: &str);
}

// =============================================================================
// IN-MEMORY LIMITER
// =============================================================================

pub struct InMemoryTrialLimiter {
    inner: Mutex<LimiterInner>,
    config: RateLimitConfig,
}

#[derive(Default)]
struct LimiterInner {
    /// Per-identity trial timestamps.
    identity_requests: HashMap<String, VecDeque<Instant>>,
    /// Global trial timestamps.
    global_requests: VecDeque<Instant>,
}

impl InMemoryTrialLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RateLimitConfig::from_env())
    }

    #[must_use]
    pub fn with_config(config: RateLimitConfig) -> Self {
        Self { inner: Mutex::new(LimiterInner::default()), config }
    }

    fn check_and_record_at(&self, identity: &str, now: Instant) -> Result<(), RateLimitError> {
        let identity = identity.trim();
        if identity.is_empty() {
            return Err(RateLimitError::MissingIdentity);
        }
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let cfg = self.config;

        // Per-identity first so an exhausted caller sees its own limit.
        let used = live_trials(&mut inner.identity_requests, identity, now, cfg.per_identity_window);
        if used >= cfg.per_identity_limit {
            return Err(RateLimitError::TrialExhausted {
                limit: cfg.per_identity_limit,
                window_secs: cfg.per_identity_window.as_secs(),
            });
        }

        prune_window(&mut inner.global_requests, now, cfg.global_window);
        if inner.global_requests.len() >= cfg.global_limit {
            return Err(RateLimitError::GlobalExceeded {
                limit: cfg.global_limit,
                window_secs: cfg.global_window.as_secs(),
            });
        }

        inner.identity_requests.entry(identity.to_owned()).or_default().push_back(now);
        inner.global_requests.push_back(now);
        Ok(())
    }

    fn remaining_at(&self, identity: &str, now: Instant) -> usize {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let used = live_trials(&mut inner.identity_requests, identity.trim(), now, self.config.per_identity_window);
        self.config.per_identity_limit.saturating_sub(used)
    }
}

impl Default for InMemoryTrialLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl TrialLimiter for InMemoryTrialLimiter {
    fn check_and_record(&self, identity: &str) -> Result<(), RateLimitError> {
        self.check_and_record_at(identity, Instant::now())
    }

    fn remaining(&self, identity: &str) -> usize {
        self.remaining_at(identity, Instant::now())
    }

    fn reset(&self, identity: &str) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.identity_requests.remove(identity.trim());
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Trials of `identity` still inside `window`. An identity whose window has
/// emptied is dropped from the map.
fn live_trials(
    requests: &mut HashMap<String, VecDeque<Instant>>,
    identity: &str,
    now: Instant,
    window: Duration,
) -> usize {
    let Some(deque) = requests.get_mut(identity) else {
        return 0;
    };
    prune_window(deque, now, window);
    let live = deque.len();
    if live == 0 {
        requests.remove(identity);
    }
    live
}

fn prune_window(deque: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = deque.front() {
        if now.duration_since(front) > window {
            deque.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
