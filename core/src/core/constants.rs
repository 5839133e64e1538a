//! Shared constants

/// Environment variable prefix for config overrides
pub const ENV_PREFIX: &str = "TRACEDECK_";

// ============================================================================
// BUFFER ADMISSION
// ============================================================================

/// Maximum items held by the span buffer
pub const BUFFER_MAX_ITEMS: usize = 100_000;

/// Maximum payload bytes held by the span buffer (256 MiB)
pub const BUFFER_MAX_BYTES: usize = 256 * 1024 * 1024;

// ============================================================================
// FLUSH BATCHING
// ============================================================================

/// Maximum spans per flush batch
pub const FLUSH_BATCH_MAX_ITEMS: usize = 1_000;

/// Maximum payload bytes per flush batch (5 MiB)
pub const FLUSH_BATCH_MAX_BYTES: usize = 5 * 1024 * 1024;

/// Longest one dequeue call waits for work
pub const FLUSH_BATCH_MAX_AGE_MS: u64 = 250;

/// Batch coalescing window measured from dequeue start
pub const FLUSH_BATCH_MIN_AGE_MS: u64 = 100;

// ============================================================================
// QUERY
// ============================================================================

/// Upper bound on query page size
pub const QUERY_MAX_PAGE_SIZE: usize = 1_000;
