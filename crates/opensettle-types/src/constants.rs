//! System-wide constants for the OpenSettle settlement broker.

/// Default allocation confirmation window in seconds (6 hours).
///
/// An allocation still in ASSIGNED or PROOF_SUBMITTED after this window
/// is expired by the expiry monitor.
pub const DEFAULT_ALLOCATION_WINDOW_SECS: i64 = 21_600;

/// Window before a deposit candidate's own deadline in which it is
/// flagged as expiring (1 hour).
pub const DEFAULT_EXPIRING_SOON_WINDOW_SECS: i64 = 3_600;

/// Default interval between expiry-monitor sweeps in seconds.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Default page size for listing endpoints.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Maximum page size a caller may request; larger requests are clamped.
pub const MAX_PAGE_SIZE: usize = 500;

/// Maximum retry attempts for external accounting-system fetches.
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;

/// Initial retry delay for external fetches in milliseconds.
pub const DEFAULT_RETRY_INITIAL_DELAY_MS: u64 = 500;

/// Retry delay cap for external fetches in milliseconds.
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 15_000;

/// Exponential backoff multiplier between retry attempts.
pub const DEFAULT_RETRY_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Jitter factor applied to retry delays (fraction of the delay).
pub const DEFAULT_RETRY_JITTER_FACTOR: f64 = 0.1;

/// Length of the generated payment code in hex characters.
pub const PAYMENT_CODE_LEN: usize = 10;

/// Default platform clearing account used for journal tagging.
pub const DEFAULT_CLEARING_ACCOUNT: &str = "OPS-CLEARING";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "OpenSettle";
