//! 🎬 *[camera pans across a dimly lit server room]*
//! 🎬 "In a world where workers toil endlessly..."
//! 🎬 "One supervisor dared to manage them all."
//! 🎬 *[record scratch]* 🦆
//!
//! 📦 The Supervisor module — part middle manager, part helicopter parent.
//! It builds the backends the config asked for, wires one source worker to
//! one sink worker through one bounded channel, and waits for both to come
//! home with their numbers.
//!
//! The batch pipeline is strictly sequential where it counts: the sink
//! worker issues one upsert at a time, in order. The channel exists so the
//! source fetch and the first upserts can overlap, not to parallelize
//! requests — there is exactly one of each worker, on purpose.

mod follower;
mod workers;

pub(crate) use follower::follow;

use anyhow::{Context, Result};
use tracing::info;

use crate::app_config::AppConfig;
use crate::backends::{SinkBackend, SourceBackend};
use crate::common::{SourceUser, SyncReport};
use crate::supervisors::workers::{SinkWorker, SourceWorker, Worker};

/// 📦 The Supervisor: because even async tasks need someone hovering over
/// them asking "is it done yet?" every 5 milliseconds.
pub(crate) struct Supervisor {
    app_config: AppConfig,
}

impl Supervisor {
    pub(crate) fn new(app_config: AppConfig) -> Self {
        Self { app_config }
    }

    /// 🚀 Runs one batch sync to completion and returns the summary.
    ///
    /// Backend construction happens first, so an unreachable source or
    /// target fails the run before a single record moves — fatal connection
    /// problems are not per-record problems.
    pub(crate) async fn run(self) -> Result<SyncReport> {
        let source = SourceBackend::from_config(&self.app_config.source_config)
            .await
            .context("Failed to stand up the source backend")?;
        let sink = SinkBackend::from_config(&self.app_config.sink_config)
            .await
            .context("Failed to stand up the sink backend")?;

        let pacing = self.app_config.sink_config.common().clone();
        let (tx, rx) = async_channel::bounded::<Vec<SourceUser>>(
            self.app_config.runtime.queue_capacity,
        );

        // 🧵 Assemble the team. One of each — the pipeline is sequential by design.
        let source_handle = SourceWorker::new(source, tx, pacing.batch_size).start();
        let sink_handle = SinkWorker::new(
            rx,
            sink,
            pacing,
            self.app_config.runtime.registration_source.clone(),
        )
        .start();

        let fetched = source_handle
            .await
            .context("SourceWorker task died before reporting back")?
            .context("SourceWorker failed")?;
        let report = sink_handle
            .await
            .context("SinkWorker task died before reporting back")?
            .context("SinkWorker failed")?;

        info!(
            fetched,
            synced = report.synced,
            skipped = report.skipped,
            failed = report.failed,
            "🏁 batch sync finished"
        );
        Ok(report)
    }
}
