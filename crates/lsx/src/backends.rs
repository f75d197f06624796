//! 🔌 Backends — where the real I/O happens.
//!
//! 🚰 Source backends pour the user documents, Sink backends push leads at
//! the CRM. And in between, we panic! (kidding, we use anyhow. and one very
//! deliberate thiserror enum.)
//!
//! 🎭 This module is the casting agency. Need to read from MongoDB? Replay a
//! canned set of documents in a test? Upsert into the CRM's HTTP API? We've
//! got a backend for that.
//!
//! 🦆 The duck is here because every file must have one. This is law.

use anyhow::Result;
use async_trait::async_trait;

use crate::app_config::{SinkConfig, SourceConfig};
use crate::common::{ActivityRecord, Lead, SourceUser};
use crate::error::SinkError;

pub(crate) mod common_config;
pub(crate) mod crm;
pub(crate) mod in_mem;
pub(crate) mod mongo;

// 🎯 Re-export the config types so callers can do `backends::CrmSinkConfig`
// instead of spelunking into `backends::crm::crm_sink::CrmSinkConfig`.
pub use common_config::{CommonSinkConfig, CommonSourceConfig};
pub use crm::CrmSinkConfig;
pub use in_mem::{InMemorySinkConfig, InMemorySourceConfig};
pub use mongo::MongoSourceConfig;

// ===== Source Trait and Backend Enum =====

/// 🚰 A source that produces user documents.
///
/// Implement this trait and you too can be the origin of someone else's data
/// problems. Guaranteed to dispense only the finest organic, free-range,
/// inconsistently-named JSON.
///
/// # Contract 📜
/// - `fetch_users` returns the FULL matching set in one go — finite,
///   non-lazy, in memory. The volumes here fit; no paging is attempted.
/// - An empty query is an empty vec, not an error.
/// - A connection failure is an `Err`, and the caller treats it as fatal to
///   the whole run. Sources do not retry.
/// - `close` releases the underlying connection, exactly once, on every exit
///   path. Skipping it is a bug. It is also considered rude.
#[async_trait]
pub(crate) trait Source: std::fmt::Debug {
    /// 📦 Fetch every matching user document from wherever the data lives.
    async fn fetch_users(&mut self) -> Result<Vec<SourceUser>>;
    /// 🗑️ Release the connection. Always. No exceptions. Not even on Fridays.
    async fn close(&mut self) -> Result<()>;
}

/// 🎭 The many faces of a Source — a polymorphic casting call for data origins.
///
/// The enum dispatches via `impl Source for SourceBackend`, so callers never
/// need to know (or care) whether they're reading from a live MongoDB or a
/// Vec some test stuffed. Ancient proverb: "He who hardcodes the backend,
/// syncs only once."
#[derive(Debug)]
pub(crate) enum SourceBackend {
    Mongo(mongo::MongoSource),
    InMemory(in_mem::InMemorySource),
}

impl SourceBackend {
    /// 🏗️ Builds the concrete source the config asked for.
    pub(crate) async fn from_config(config: &SourceConfig) -> Result<Self> {
        Ok(match config {
            SourceConfig::Mongo(mongo_config) => {
                SourceBackend::Mongo(mongo::MongoSource::connect(mongo_config.clone()).await?)
            }
            SourceConfig::InMemory(mem_config) => {
                SourceBackend::InMemory(in_mem::InMemorySource::new(mem_config.clone()))
            }
        })
    }
}

#[async_trait]
impl Source for SourceBackend {
    async fn fetch_users(&mut self) -> Result<Vec<SourceUser>> {
        match self {
            SourceBackend::Mongo(m) => m.fetch_users().await,
            SourceBackend::InMemory(i) => i.fetch_users().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            SourceBackend::Mongo(m) => m.close().await,
            SourceBackend::InMemory(i) => i.close().await,
        }
    }
}

// ===== Sink Trait and Backend Enum =====

/// 🕳️ A sink that accepts normalized records.
///
/// The yin to the source's yang. One lead per call, one activity row per
/// call — the *target* decides insert-vs-update by matching the natural key,
/// which is what makes re-running the whole pipeline safe.
///
/// # Contract 📜
/// - `upsert_lead` returns the target-side record id on success. Errors are
///   the typed [`SinkError`] taxonomy: the caller counts `Rejected`/
///   `Transport` as per-record failures and keeps going.
/// - `record_activity` may return [`SinkError::Conflict`], which the caller
///   MUST treat as "already synced", not as a failure.
/// - `close` flushes and releases. Call it. Always.
#[async_trait]
pub(crate) trait Sink: std::fmt::Debug {
    /// 📤 Push one normalized lead; the target upserts by email.
    async fn upsert_lead(&mut self, lead: &Lead) -> Result<String, SinkError>;
    /// 📄 Push one activity row for an already-upserted lead.
    async fn record_activity(&mut self, record: &ActivityRecord) -> Result<(), SinkError>;
    /// 🗑️ Flush, finalize, and release.
    async fn close(&mut self) -> Result<()>;
}

/// 🎭 The many faces of a Sink. Mirrors `SourceBackend` on the other end of
/// the pipeline. Whoever designed this was clearly a fan of symmetry.
#[derive(Debug)]
pub(crate) enum SinkBackend {
    Crm(crm::CrmSink),
    InMemory(in_mem::InMemorySink),
}

impl SinkBackend {
    /// 🏗️ Builds the concrete sink the config asked for. The CRM variant
    /// pings the target here, so an unreachable API fails the run up front.
    pub(crate) async fn from_config(config: &SinkConfig) -> Result<Self> {
        Ok(match config {
            SinkConfig::Crm(crm_config) => {
                SinkBackend::Crm(crm::CrmSink::new(crm_config.clone()).await?)
            }
            SinkConfig::InMemory(mem_config) => {
                SinkBackend::InMemory(in_mem::InMemorySink::new(mem_config.clone()))
            }
        })
    }
}

#[async_trait]
impl Sink for SinkBackend {
    async fn upsert_lead(&mut self, lead: &Lead) -> Result<String, SinkError> {
        match self {
            SinkBackend::Crm(c) => c.upsert_lead(lead).await,
            SinkBackend::InMemory(i) => i.upsert_lead(lead).await,
        }
    }

    async fn record_activity(&mut self, record: &ActivityRecord) -> Result<(), SinkError> {
        match self {
            SinkBackend::Crm(c) => c.record_activity(record).await,
            SinkBackend::InMemory(i) => i.record_activity(record).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            SinkBackend::Crm(c) => c.close().await,
            SinkBackend::InMemory(i) => i.close().await,
        }
    }
}
