//! 👀 The follower — the pipeline's night shift.
//!
//! Batch mode runs once and goes home. Follow mode stays: it subscribes to
//! the collection's change notifications and, for each one, re-fetches the
//! FULL current document and pushes it through the exact same per-record
//! path as batch mode ([`sync_user`]). One notification at a time, in
//! arrival order — document update volume is low and ordering is simpler
//! than locks.
//!
//! The one cancellation contract in the whole system lives here: on
//! SIGINT/SIGTERM, close the change stream first, then the client
//! connection, then exit. In that order. Each exactly once.

use anyhow::{Context, Result};
use chrono::Utc;
use futures::StreamExt;
use mongodb::bson::Document;
use mongodb::change_stream::ChangeStream;
use mongodb::change_stream::event::ChangeStreamEvent;
use tokio::signal;
use tracing::{debug, info, warn};

use crate::app_config::{AppConfig, SourceConfig};
use crate::backends::mongo::MongoSource;
use crate::backends::mongo::change_stream::changed_document_id;
use crate::backends::{Sink, SinkBackend, Source};
use crate::common::SyncReport;
use crate::supervisors::workers::sync_user;

/// 🚀 Runs the change-stream follower until a termination signal arrives
/// (or the stream dies), then tears down in order and returns the running
/// totals.
pub(crate) async fn follow(app_config: &AppConfig) -> Result<SyncReport> {
    // Follow mode is MongoDB-only: a Vec has no change stream to watch.
    let SourceConfig::Mongo(mongo_config) = &app_config.source_config else {
        anyhow::bail!(
            "💀 Follow mode needs a MongoDB source. The in-memory source has no change notifications to subscribe to — there is nothing to follow."
        );
    };

    let mut source = MongoSource::connect(mongo_config.clone()).await?;
    let mut sink = SinkBackend::from_config(&app_config.sink_config)
        .await
        .context("Failed to stand up the sink backend")?;
    let mut stream = source.watch().await?;
    info!("👀 following changes — send SIGINT/SIGTERM to stop");

    let mut report = SyncReport::default();
    let outcome = follow_loop(
        &source,
        &mut sink,
        &mut stream,
        &app_config.runtime.registration_source,
        &mut report,
    )
    .await;

    // 🗑️ Ordered teardown, on success and failure alike:
    // subscription first, then the store connection, then the sink.
    drop(stream);
    if let Err(close_err) = source.close().await {
        warn!("⚠️ source close failed during shutdown: {close_err:#}");
    }
    if let Err(close_err) = sink.close().await {
        warn!("⚠️ sink close failed during shutdown: {close_err:#}");
    }

    outcome?;
    info!(
        synced = report.synced,
        skipped = report.skipped,
        failed = report.failed,
        "🏁 follower stopped"
    );
    Ok(report)
}

/// 🔄 The event loop proper. Broken out so the teardown above runs no
/// matter how this returns — the `?`s in here never skip the cleanup.
async fn follow_loop(
    source: &MongoSource,
    sink: &mut SinkBackend,
    stream: &mut ChangeStream<ChangeStreamEvent<Document>>,
    registration_source: &str,
    report: &mut SyncReport,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = shutdown_signal() => {
                info!("🛑 termination signal received, closing up");
                return Ok(());
            }
            next = stream.next() => match next {
                Some(Ok(event)) => {
                    let Some(id) = changed_document_id(event.document_key.as_ref()) else {
                        debug!("change event without a document key, ignoring");
                        continue;
                    };
                    // 🔁 Re-fetch the whole document and reprocess it from
                    // scratch. No diffing — upserts are idempotent, so the
                    // simple thing is also the correct thing.
                    match source.fetch_by_id(id).await? {
                        Some(user) => {
                            debug!(source_id = %user.id, "👀 change notification, re-syncing document");
                            sync_user(sink, &user, Utc::now(), registration_source, report).await;
                        }
                        None => debug!("document vanished between notification and re-fetch"),
                    }
                }
                Some(Err(stream_err)) => {
                    // A broken stream is a connection-class failure: fatal,
                    // not retried. The caller still gets the teardown.
                    return Err(stream_err)
                        .context("💀 The change stream broke mid-watch. This run is over; restart the follower once the cluster is feeling better.");
                }
                None => {
                    debug!("change stream ended on its own");
                    return Ok(());
                }
            }
        }
    }
}

/// 🛑 Resolves when the process is told to die: Ctrl+C everywhere, plus
/// SIGTERM on unix (what a service manager actually sends).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
