//! 🎬 *[a channel fills with batches. somewhere, a sink waits.]*
//! *[the clock on the wall reads 2:47am.]*
//! *[nobody asked for this data migration. and yet, here we are.]*
//!
//! 🗑️ The SinkWorker module — patient, tireless, and deeply unbothered by
//! the chaos happening upstream. It receives batches. It maps them. It
//! upserts them, one record at a time, napping politely between batches.
//! It is, in many ways, the most emotionally stable part of this codebase.

use std::time::Duration;

use anyhow::{Context, Result};
use async_channel::Receiver;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::backends::{Sink, SinkBackend};
use crate::backends::common_config::CommonSinkConfig;
use crate::common::{ActivityRecord, SourceUser, SyncReport};
use crate::progress::SyncProgress;
use crate::supervisors::workers::Worker;
use crate::transforms::{MapOutcome, map_user};

/// 🗑️ The SinkWorker: takes batches from a channel, pushes records into a
/// backend. The garbage disposal of the pipeline — except it keeps books.
///
/// Per-record outcomes land in the [`SyncReport`]: skips, syncs, failures,
/// and the activity sub-totals. One bad record never aborts a batch or the
/// run; the worker's only fatal error is failing to close the sink.
#[derive(Debug)]
pub(crate) struct SinkWorker {
    rx: Receiver<Vec<SourceUser>>,
    sink: SinkBackend,
    pacing: CommonSinkConfig,
    registration_source: String,
}

impl SinkWorker {
    pub(crate) fn new(
        rx: Receiver<Vec<SourceUser>>,
        sink: SinkBackend,
        pacing: CommonSinkConfig,
        registration_source: String,
    ) -> Self {
        Self {
            rx,
            sink,
            pacing,
            registration_source,
        }
    }
}

impl Worker for SinkWorker {
    type Output = SyncReport;

    fn start(mut self) -> JoinHandle<Result<SyncReport>> {
        tokio::spawn(async move {
            debug!("📥 SinkWorker started draining channel...");
            let progress = SyncProgress::new();
            let mut report = SyncReport::default();
            let mut first_batch = true;
            loop {
                match self.rx.recv().await {
                    Ok(batch) => {
                        // 😴 The courtesy nap. Not between records — between
                        // batches. The target's rate limiter appreciates us.
                        if !first_batch && self.pacing.batch_delay_ms > 0 {
                            tokio::time::sleep(Duration::from_millis(self.pacing.batch_delay_ms))
                                .await;
                        }
                        first_batch = false;

                        debug!(size = batch.len(), "🪣 SinkWorker received batch");
                        for user in &batch {
                            sync_user(
                                &mut self.sink,
                                user,
                                Utc::now(),
                                &self.registration_source,
                                &mut report,
                            )
                            .await;
                            progress.update(&report);
                        }
                    }
                    Err(_) => {
                        // Channel is empty and closed
                        debug!("🏁 SinkWorker: channel closed. Shutting down.");
                        self.sink
                            .close()
                            .await
                            .context("SinkWorker failed to close sink")?;
                        progress.finish();
                        return Ok(report);
                    }
                }
            }
        })
    }
}

/// 🔄 The whole per-record story: map → upsert → activity sub-sync → count.
///
/// Shared between the batch SinkWorker and the change-stream follower, so
/// both modes treat a record identically. Nothing in here returns an error:
/// every outcome — skip, success, failure, benign conflict — is a counter
/// bump and maybe a log line. Failures stop at the record boundary, period.
pub(crate) async fn sync_user(
    sink: &mut SinkBackend,
    user: &SourceUser,
    now: DateTime<Utc>,
    registration_source: &str,
    report: &mut SyncReport,
) {
    report.total += 1;

    let mapped = match map_user(user, now, registration_source) {
        MapOutcome::Mapped(mapped) => mapped,
        MapOutcome::Skipped(reason) => {
            // 💤 Unmappable is not broken. Counted apart from failures.
            debug!(source_id = %user.id, ?reason, "💤 document skipped");
            report.skipped += 1;
            return;
        }
    };

    let lead_id = match sink.upsert_lead(&mapped.lead).await {
        Ok(lead_id) => {
            trace!(email = %mapped.lead.email, %lead_id, "✅ lead upserted");
            report.synced += 1;
            lead_id
        }
        Err(err) => {
            warn!(email = %mapped.lead.email, "💀 lead upsert failed: {err}");
            report.failed += 1;
            report.errors.push(format!("{}: {err}", mapped.lead.email));
            return;
        }
    };

    // 📄 Activity sub-sync — only for leads the target just accepted.
    for draft in mapped.activity {
        let record = ActivityRecord::new(&lead_id, draft);
        match sink.record_activity(&record).await {
            Ok(()) => report.activities_synced += 1,
            Err(err) if err.is_benign_conflict() => {
                // 🔁 The target already has this row. That's the uniqueness
                // constraint doing de-duplication for us — not a failure.
                debug!(
                    email = %mapped.lead.email,
                    page = %record.visit.page_name,
                    "🔁 activity already on the target"
                );
                report.activities_already_there += 1;
            }
            Err(err) => {
                warn!(
                    email = %mapped.lead.email,
                    page = %record.visit.page_name,
                    "💀 activity upsert failed: {err}"
                );
                report.activities_failed += 1;
                report.errors.push(format!(
                    "{} [{}]: {err}",
                    mapped.lead.email, record.visit.page_name
                ));
            }
        }
    }
}
