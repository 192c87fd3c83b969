//! Telemetry metric name constants.
//!
//! Centralised metric names for scaffdiff operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `scaffdiff_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `tier`: cache tier consulted: "memory", "disk" or "remote"
//! - `status`: outcome: "ok" or "error"
//! - `program`: external program name (e.g. "git", "npx")

/// Total cache hits.
///
/// Labels: `tier`.
pub const CACHE_HITS_TOTAL: &str = "scaffdiff_cache_hits_total";

/// Total cache misses.
///
/// Labels: `tier`.
pub const CACHE_MISSES_TOTAL: &str = "scaffdiff_cache_misses_total";

/// Total full generations (scaffold both versions + diff).
///
/// Labels: `status` ("ok" | "error").
pub const GENERATIONS_TOTAL: &str = "scaffdiff_generations_total";

/// Duration of a full generation in seconds.
pub const GENERATION_DURATION_SECONDS: &str = "scaffdiff_generation_duration_seconds";

/// External command duration in seconds.
///
/// Labels: `program`, `status`.
pub const COMMAND_DURATION_SECONDS: &str = "scaffdiff_command_duration_seconds";

/// Callers that joined a generation already in flight for the same key.
pub const INFLIGHT_JOINS_TOTAL: &str = "scaffdiff_inflight_joins_total";

/// Batch groups processed.
pub const BATCH_GROUPS_TOTAL: &str = "scaffdiff_batch_groups_total";

/// Remote publish attempts.
///
/// Labels: `status`.
pub const REMOTE_PUBLISH_TOTAL: &str = "scaffdiff_remote_publish_total";
