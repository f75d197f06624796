use anyhow::{Context, Result};
use async_channel::Sender;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::backends::{Source, SourceBackend};
use crate::common::SourceUser;
use crate::supervisors::workers::Worker;

/// 🚰 The SourceWorker: fetches the full document set, slices it into
/// batches, and feeds them down the channel. Then it closes the tap.
///
/// The fetch is deliberately all-at-once (the source contract is finite and
/// non-lazy), so this worker's real job is partitioning and delivery — and,
/// crucially, making sure the source connection is released on every exit
/// path, good run or bad.
#[derive(Debug)]
pub(crate) struct SourceWorker {
    source: SourceBackend,
    tx: Sender<Vec<SourceUser>>,
    batch_size: usize,
}

impl SourceWorker {
    pub(crate) fn new(source: SourceBackend, tx: Sender<Vec<SourceUser>>, batch_size: usize) -> Self {
        Self {
            source,
            tx,
            batch_size,
        }
    }

    /// 📦 Fetch + partition + send. Returns how many documents went down the
    /// channel.
    async fn pump(
        source: &mut SourceBackend,
        tx: &Sender<Vec<SourceUser>>,
        batch_size: usize,
    ) -> Result<u64> {
        let users = source.fetch_users().await?;
        let fetched = users.len() as u64;
        debug!(count = fetched, batch_size, "🚰 SourceWorker partitioning documents");

        // A batch size of 0 would spin forever; a misconfigured 0 means 1.
        let batch_size = batch_size.max(1);
        let mut users = users;
        while !users.is_empty() {
            let rest = users.split_off(batch_size.min(users.len()));
            tx.send(users)
                .await
                .context("💀 The sink worker hung up mid-send. The channel is closed and the batches have nowhere to go.")?;
            users = rest;
        }
        Ok(fetched)
    }
}

impl Worker for SourceWorker {
    type Output = u64;

    fn start(mut self) -> JoinHandle<Result<u64>> {
        tokio::spawn(async move {
            let pumped = Self::pump(&mut self.source, &self.tx, self.batch_size).await;

            // 🏁 The single release path, covering success and failure alike:
            // drop the sender so the sink worker can finish and report, then
            // let go of the source connection exactly once.
            drop(self.tx);
            if let Err(close_err) = self.source.close().await {
                warn!("⚠️ source close failed: {close_err:#}");
            }

            pumped
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::in_mem::InMemorySource;
    use serde_json::json;

    #[tokio::test]
    async fn the_one_where_seven_documents_make_three_batches() {
        let docs = (0..7)
            .map(|i| json!({"email": format!("u{i}@x.com")}))
            .collect::<Vec<_>>();
        let (tx, rx) = async_channel::bounded(16);
        let worker = SourceWorker::new(
            SourceBackend::InMemory(InMemorySource::from_docs(docs)),
            tx,
            3,
        );

        let fetched = worker
            .start()
            .await
            .expect("worker task must not panic")
            .expect("in-memory pump cannot fail");
        assert_eq!(fetched, 7);

        let mut sizes = Vec::new();
        while let Ok(batch) = rx.recv().await {
            sizes.push(batch.len());
        }
        assert_eq!(sizes, vec![3, 3, 1], "7 documents at batch size 3 is 3+3+1");
    }

    #[tokio::test]
    async fn the_one_where_the_channel_closes_behind_the_last_batch() {
        let (tx, rx) = async_channel::bounded(4);
        let worker = SourceWorker::new(
            SourceBackend::InMemory(InMemorySource::from_docs(vec![])),
            tx,
            50,
        );
        worker.start().await.unwrap().unwrap();
        assert!(
            rx.recv().await.is_err(),
            "after the worker exits, the channel must read as closed"
        );
    }
}
