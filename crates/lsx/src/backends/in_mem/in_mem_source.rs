use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::backends::Source;
use crate::backends::common_config::CommonSourceConfig;
use crate::common::SourceUser;

// ⏰ The same aliases the mapper uses for the registration timestamp — the
// in-memory source honors `since` with the same field resolution the real
// pipeline applies, so incremental-sync tests mean something.
const CREATED_AT: &[&str] = &["createdAt", "created_at"];

/// 🧠 Config for the in-memory source: raw documents, inline.
///
/// Mostly constructed programmatically in tests, but deserializable so a
/// TOML config can stand up a fully offline pipeline — handy for demos and
/// for the config tests.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct InMemorySourceConfig {
    /// 📄 The documents this source will serve, verbatim.
    #[serde(default)]
    pub docs: Vec<serde_json::Value>,
    #[serde(default)]
    pub common_config: CommonSourceConfig,
}

/// 🧠 A source that reads from a Vec. The golden retriever of backends:
/// always happy, always available, fetches exactly what you threw.
#[derive(Debug)]
pub(crate) struct InMemorySource {
    config: InMemorySourceConfig,
}

impl InMemorySource {
    pub(crate) fn new(config: InMemorySourceConfig) -> Self {
        Self { config }
    }

    /// 🧪 Test convenience: a source from bare documents, no config ceremony.
    #[cfg(test)]
    pub(crate) fn from_docs(docs: Vec<serde_json::Value>) -> Self {
        Self::new(InMemorySourceConfig {
            docs,
            common_config: CommonSourceConfig::default(),
        })
    }
}

#[async_trait]
impl Source for InMemorySource {
    async fn fetch_users(&mut self) -> Result<Vec<SourceUser>> {
        let since = self.config.common_config.since;
        let users: Vec<SourceUser> = self
            .config
            .docs
            .iter()
            .cloned()
            .map(SourceUser::new)
            .filter(|user| match since {
                // Incremental mode: same cutoff rule as the real source.
                Some(cutoff) => user
                    .first_date(CREATED_AT)
                    .is_some_and(|created| created >= cutoff),
                None => true,
            })
            .collect();
        debug!(count = users.len(), "🧠 in-memory source served its documents");
        Ok(users)
    }

    async fn close(&mut self) -> Result<()> {
        // We live in RAM. When this drops, the OS reclaims everything faster
        // than HR reclaims your badge on your last day.
        Ok(())
    }
}
