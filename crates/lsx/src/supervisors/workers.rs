//! 🧵 Workers: the backbone of leadsync, the unsung heroes, the ones who
//! actually do the work while the Supervisor takes all the credit in the
//! sprint retro.
//!
//! 🚀 This module is like a factory floor, except instead of hard hats
//! we wear `#[derive(Debug)]` and instead of OSHA violations
//! we have borrow checker violations. 🦆

use anyhow::Result;
use tokio::task::JoinHandle;

mod sink_worker;
mod source_worker;

pub(crate) use sink_worker::{SinkWorker, sync_user};
pub(crate) use source_worker::SourceWorker;

/// 🏗️ A background worker, that does work. duh.
///
/// 🎯 The trait every worker implements, like a social contract but enforced
/// by the compiler instead of polite society. `Output` is whatever the
/// worker has to show for itself when the shift ends — a document count, a
/// full sync report — because a worker that returns `()` is a worker whose
/// manager has to go ask around.
pub(crate) trait Worker {
    type Output;

    /// 🚀 Start the worker. Returns a JoinHandle because we trust
    /// but verify. Mostly verify. Okay, we don't trust at all.
    fn start(self) -> JoinHandle<Result<Self::Output>>;
}
