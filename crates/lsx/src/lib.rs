pub mod app_config;
pub mod backends;
pub mod common;
pub mod error;
pub mod progress;
mod supervisors;
pub mod transforms;

use anyhow::{Context, Result};

use crate::app_config::{AppConfig, SyncMode};
use crate::common::SyncReport;
use crate::supervisors::Supervisor;

/// 🚀 Runs the configured sync and hands back the summary.
///
/// Batch mode runs one pass and returns. Follow mode subscribes to change
/// notifications and only returns once the process is told to stop — the
/// report it returns is the running total of everything it re-synced.
pub async fn run(app_config: AppConfig) -> Result<SyncReport> {
    match app_config.runtime.mode {
        SyncMode::Batch => Supervisor::new(app_config)
            .run()
            .await
            .context("Failed to run the batch sync"),
        SyncMode::Follow => supervisors::follow(&app_config)
            .await
            .context("Failed to run the change-stream follower"),
    }
}
