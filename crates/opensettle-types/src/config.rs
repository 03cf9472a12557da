//! Configuration types for the OpenSettle engine.

use serde::{Deserialize, Serialize};

use crate::{AccountRef, constants};

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Confirmation window granted to each new allocation, in seconds.
    pub allocation_window_secs: i64,
    /// Window before a deposit deadline in which the candidate is
    /// flagged as expiring, in seconds.
    pub expiring_soon_window_secs: i64,
    /// Interval between expiry-monitor sweeps, in seconds.
    pub sweep_interval_secs: u64,
    /// Platform clearing account used to tag journal entries.
    pub clearing_account: AccountRef,
    /// Listing pagination limits.
    pub page: PageConfig,
    /// Retry schedule for external accounting-system fetches.
    pub retry: RetryConfig,
}

impl EngineConfig {
    /// The allocation window as a `chrono::Duration`.
    #[must_use]
    pub fn allocation_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.allocation_window_secs)
    }

    /// The expiring-soon window as a `chrono::Duration`.
    #[must_use]
    pub fn expiring_soon_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.expiring_soon_window_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            allocation_window_secs: constants::DEFAULT_ALLOCATION_WINDOW_SECS,
            expiring_soon_window_secs: constants::DEFAULT_EXPIRING_SOON_WINDOW_SECS,
            sweep_interval_secs: constants::DEFAULT_SWEEP_INTERVAL_SECS,
            clearing_account: AccountRef::new(constants::DEFAULT_CLEARING_ACCOUNT),
            page: PageConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

/// Pagination limits for listing endpoints.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageConfig {
    /// Page size applied when the caller does not specify one.
    pub default_size: usize,
    /// Hard cap; larger requests are clamped, not rejected.
    pub max_size: usize,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            default_size: constants::DEFAULT_PAGE_SIZE,
            max_size: constants::MAX_PAGE_SIZE,
        }
    }
}

/// Bounded exponential-backoff schedule for external fetches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// Fraction of the delay applied as ± jitter.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: constants::DEFAULT_RETRY_MAX_ATTEMPTS,
            initial_delay_ms: constants::DEFAULT_RETRY_INITIAL_DELAY_MS,
            max_delay_ms: constants::DEFAULT_RETRY_MAX_DELAY_MS,
            backoff_multiplier: constants::DEFAULT_RETRY_BACKOFF_MULTIPLIER,
            jitter_factor: constants::DEFAULT_RETRY_JITTER_FACTOR,
        }
    }
}
