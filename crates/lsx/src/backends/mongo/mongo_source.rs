use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document, doc};
use mongodb::change_stream::ChangeStream;
use mongodb::change_stream::event::ChangeStreamEvent;
use mongodb::{Client, Collection};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::backends::Source;
use crate::backends::common_config::CommonSourceConfig;
use crate::backends::mongo::change_stream::watch_pipeline;
use crate::common::SourceUser;

// Config lives here, next to the source that uses it. Avoids the "where the
// heck is that config defined" scavenger hunt at 2am during an incident.
//
// 🔒 The URI carries the credentials, as document-store URIs do. If this is
// in plaintext in your config file, I've already filed a complaint with the
// Department of Security Choices.
#[derive(Debug, Deserialize, Clone)]
pub struct MongoSourceConfig {
    /// 🍃 Connection string, credentials and all. `mongodb://...` or
    /// `mongodb+srv://...`. Yes, the whole thing.
    pub uri: String,
    /// 📚 Database holding the user collection.
    pub database: String,
    /// 📚 The collection of user documents.
    pub collection: String,
    /// 👀 Follow mode only: the nested field whose updates are worth waking
    /// up for. Inserts and replaces always qualify.
    #[serde(default = "default_watch_field")]
    pub watch_field: String,
    /// 📦 Common source settings — the incremental-sync cutoff lives in here.
    #[serde(default)]
    pub common_config: CommonSourceConfig,
}

// 👀 The activity log is what the follow-mode deployments care about.
fn default_watch_field() -> String {
    "activity".to_string()
}

/// 🍃 The source side of the MongoDB backend.
///
/// Connects once, pings once (loudly, at construction — if the cluster is
/// unreachable we want to fail HERE, not 10,000 documents into a run), and
/// then serves three verbs: fetch everything, re-fetch one by id, and open a
/// change stream for follow mode.
///
/// The client is held in an `Option` so [`Source::close`] can hand it to
/// `Client::shutdown` exactly once — shutdown consumes the client, and the
/// single release path is the whole point.
pub(crate) struct MongoSource {
    client: Option<Client>,
    collection: Collection<Document>,
    config: MongoSourceConfig,
}

impl std::fmt::Debug for MongoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 🔒 Deliberately NOT printing the URI — it has credentials in it,
        // and Debug output has a way of ending up in tickets.
        f.debug_struct("MongoSource")
            .field("database", &self.config.database)
            .field("collection", &self.config.collection)
            .field("since", &self.config.common_config.since)
            .finish()
    }
}

impl MongoSource {
    /// 🚀 Connects and pings. A cluster that doesn't answer the ping fails
    /// the whole run right here — sources do not retry, by design.
    pub(crate) async fn connect(config: MongoSourceConfig) -> Result<Self> {
        let client = Client::with_uri_str(&config.uri)
            .await
            .context("💀 The MongoDB connection string refused to parse or resolve. Check the URI — scheme, host, credentials, all of it. The cluster never even heard from us.")?;

        // 📡 Connectivity ping — "Hello? Is this thing on?" If this fails,
        // we fail loudly here, rather than quietly mid-sync.
        client
            .database(&config.database)
            .run_command(doc! { "ping": 1 })
            .await
            .context("💀 Reached out to MongoDB and got ghosted. The URI parsed, but the cluster is not answering. Is it running? Is the firewall on a power trip again?")?;

        let collection = client
            .database(&config.database)
            .collection::<Document>(&config.collection);

        info!(
            database = %config.database,
            collection = %config.collection,
            "🍃 connected to MongoDB"
        );

        Ok(Self {
            client: Some(client),
            collection,
            config,
        })
    }

    /// 🔁 Re-fetches the full, current document by id. Follow mode uses this
    /// after every change notification — we never diff, we re-read.
    pub(crate) async fn fetch_by_id(&self, id: &Bson) -> Result<Option<SourceUser>> {
        let found = self
            .collection
            .find_one(doc! { "_id": id.clone() })
            .await
            .context("💀 The by-id re-fetch failed. The change stream told us this document exists, and MongoDB now disagrees about being reachable.")?;
        Ok(found.map(document_to_user))
    }

    /// 👀 Opens the change stream for follow mode: inserts, replaces, and
    /// updates that touch the configured field.
    pub(crate) async fn watch(&self) -> Result<ChangeStream<ChangeStreamEvent<Document>>> {
        let pipeline = watch_pipeline(&self.config.watch_field);
        debug!(watch_field = %self.config.watch_field, "👀 opening change stream");
        self.collection
            .watch()
            .pipeline([pipeline])
            .await
            .context("💀 Could not open the change stream. Change streams need a replica set — a standalone mongod will refuse, and so will we.")
    }
}

#[async_trait]
impl Source for MongoSource {
    async fn fetch_users(&mut self) -> Result<Vec<SourceUser>> {
        let filter = since_filter(self.config.common_config.since);
        let mut cursor = self
            .collection
            .find(filter)
            .await
            .context("💀 The find query never got off the ground. Connectivity was fine at startup, so something changed — and not for the better.")?;

        // 📦 Finite, non-lazy, in memory. The collection fits; paging would
        // be engineering for a problem this data does not have.
        let mut users = Vec::new();
        while let Some(document) = cursor
            .try_next()
            .await
            .context("💀 The cursor died mid-fetch. Partial data is no data — this run is over.")?
        {
            users.push(document_to_user(document));
        }

        info!(count = users.len(), "🍃 fetched user documents from MongoDB");
        Ok(users)
    }

    async fn close(&mut self) -> Result<()> {
        // 🗑️ take() makes this idempotent: the first close shuts the client
        // down, any accidental second close is a quiet no-op.
        if let Some(client) = self.client.take() {
            debug!("🗑️ shutting down MongoDB client");
            client.shutdown().await;
        }
        Ok(())
    }
}

/// 🔍 Builds the find filter: empty for a full sync, `createdAt >= since`
/// for an incremental one.
fn since_filter(since: Option<DateTime<Utc>>) -> Document {
    match since {
        Some(cutoff) => doc! {
            "createdAt": { "$gte": mongodb::bson::DateTime::from_millis(cutoff.timestamp_millis()) }
        },
        None => Document::new(),
    }
}

/// 🔄 One raw BSON document → one [`SourceUser`].
pub(crate) fn document_to_user(document: Document) -> SourceUser {
    SourceUser::new(bson_to_json(Bson::Document(document)))
}

/// 🔄 Exhaustive BSON → JSON conversion.
///
/// Deliberately hand-rolled instead of extended-JSON serialization: the
/// mapper wants dates as plain RFC 3339 strings and object ids as plain hex
/// strings, not `{"$date": ...}` wrappers it would then have to unwrap. One
/// conversion, one place, no surprises downstream.
fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::Double(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Bson::String(s) => Value::String(s),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        Bson::Document(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, field)| (key, bson_to_json(field)))
                .collect(),
        ),
        Bson::Boolean(b) => Value::Bool(b),
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Int32(i) => Value::Number(i.into()),
        Bson::Int64(i) => Value::Number(i.into()),
        Bson::DateTime(dt) => dt
            .try_to_rfc3339_string()
            .map(Value::String)
            .unwrap_or(Value::Null),
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::Decimal128(d) => Value::String(d.to_string()),
        // Timestamps, regexes, binary blobs, min/max keys — nothing the
        // mapper reads, but we stringify rather than drop, for the audit trail.
        other => Value::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;

    #[test]
    fn the_one_where_bson_dates_become_plain_iso_strings() {
        let oid = ObjectId::new();
        let document = doc! {
            "_id": oid,
            "email": "a@x.com",
            "createdAt": mongodb::bson::DateTime::from_millis(1704067200000), // 2024-01-01T00:00:00Z
            "amountPaid": 49.99_f64,
            "loginCount": 7_i32,
        };
        let user = document_to_user(document);

        assert_eq!(user.id, oid.to_hex(), "object ids must arrive as hex strings");
        assert_eq!(
            user.first_date(&["createdAt"])
                .map(|d| d.to_rfc3339()),
            Some("2024-01-01T00:00:00+00:00".to_string()),
            "BSON dates must reach the mapper as RFC 3339 strings, not $date wrappers"
        );
        assert_eq!(user.first_number(&["amountPaid"]), Some(49.99));
        assert_eq!(user.first_number(&["loginCount"]), Some(7.0));
    }

    #[test]
    fn the_one_where_nested_documents_survive_the_crossing() {
        let document = doc! {
            "email": "a@x.com",
            "activity": [{
                "date": "2024-01-05",
                "pages": [{"page": "mock-exam", "timeSpent": 125_i64}],
            }],
        };
        let user = document_to_user(document);
        let days = user.first_array(&["activity"]).expect("activity array must survive");
        assert_eq!(days.len(), 1);
        assert_eq!(days[0]["pages"][0]["timeSpent"], 125);
    }

    #[test]
    fn the_one_where_the_since_filter_knows_both_moods() {
        assert!(
            since_filter(None).is_empty(),
            "a full sync must query with an empty filter"
        );

        let cutoff: DateTime<Utc> = "2024-01-01T00:00:00Z".parse().unwrap();
        let filter = since_filter(Some(cutoff));
        let gte = filter
            .get_document("createdAt")
            .expect("incremental filter must constrain createdAt");
        assert!(gte.contains_key("$gte"));
    }
}
