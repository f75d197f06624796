//! 📦 **Common Backend Configs** — the shared DNA of source and sink configuration.
//!
//! 🧠 Knowledge graph:
//! - `CommonSourceConfig`: embedded in every source config (`MongoSourceConfig`,
//!   `InMemorySourceConfig`). Carries the incremental-sync cutoff — the one
//!   knob every source honors the same way.
//! - `CommonSinkConfig`: embedded in every sink config (`CrmSinkConfig`,
//!   `InMemorySinkConfig`). Carries the batch pacing knobs the workers read.
//! - Both are re-exported from `backends.rs` so callers can
//!   `use crate::backends::CommonSinkConfig`.
//!
//! ⚠️ These live in `backends` (not `app_config`) to avoid a circular import:
//!   `app_config` → `backends/crm` → `app_config`. The module system has
//!   opinions. Strong ones. 🦆

use chrono::{DateTime, Utc};
use serde::Deserialize;

// ============================================================
// 📦 CommonSourceConfig — shared source-side knobs
// ============================================================

/// 📦 Shared configuration embedded by every source backend config.
///
/// `since` flips a full sync into an incremental one: only documents created
/// at or after the cutoff are fetched. Absent means "everything, again" —
/// which is safe, because the sink upserts by email.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CommonSourceConfig {
    /// ⏰ Incremental cutoff — fetch only documents created at/after this
    /// instant. RFC 3339 in the TOML. `None` = full sync.
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
}

// ============================================================
// 🚰 CommonSinkConfig — shared sink-side knobs
// ============================================================

/// 🚰 Shared configuration embedded by every sink backend config.
///
/// Batch pacing lives here because it's a property of how hard we're willing
/// to lean on the *target*, not of any one backend. The SinkWorker reads
/// these: records per batch, and the courtesy nap between batches.
///
/// ⚠️ The delay is a rate-limit courtesy, not a correctness requirement.
/// Tune it, zero it, whatever — the upsert semantics don't change.
#[derive(Debug, Deserialize, Clone)]
pub struct CommonSinkConfig {
    /// 📦 Records per batch — the doc-count speed limiter.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// 😴 Milliseconds of nap between batches. The target has feelings too.
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
}

// 📦 50 per batch — small enough to be polite, big enough to finish today.
fn default_batch_size() -> usize {
    50
}

// 😴 half a second — chosen by watching the target's rate limiter until it
// stopped sending us 429s. Empirical science at its most empirical.
fn default_batch_delay_ms() -> u64 {
    500
}

impl Default for CommonSinkConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
        }
    }
}
