//! 👀 Change-stream plumbing for follow mode.
//!
//! Two small, pure pieces live here so they can be tested without a replica
//! set in the room: the aggregation filter that decides which events wake us
//! up, and the extraction of the changed document's id from an event.
//!
//! ## The deal with the filter 🧠
//!
//! We care about three kinds of events:
//! - `insert` — a brand new user. Always interesting.
//! - `replace` — the whole document was swapped. Always interesting.
//! - `update` — only interesting when it touched the watched field (the
//!   activity log, by default). A password-hash rotation does not deserve a
//!   full re-sync.
//!
//! Whatever the event, the follower re-fetches the FULL current document and
//! re-maps it from scratch. No incremental diffing of nested arrays, ever —
//! upserts are idempotent, so reprocessing the whole document is both the
//! simple thing and the correct thing.

use mongodb::bson::{Bson, Document, doc};

/// 🔍 Builds the `$match` stage for the change stream: inserts and replaces
/// unconditionally, updates only when they touched `watch_field`.
pub(crate) fn watch_pipeline(watch_field: &str) -> Document {
    // The updated-fields path has the field name embedded in the KEY, so the
    // update clause is assembled imperatively — the doc! macro wants literal
    // keys and this one is config.
    let mut update_clause = doc! { "operationType": "update" };
    update_clause.insert(
        format!("updateDescription.updatedFields.{watch_field}"),
        doc! { "$exists": true },
    );

    doc! {
        "$match": {
            "$or": [
                { "operationType": { "$in": ["insert", "replace"] } },
                update_clause,
            ]
        }
    }
}

/// 🪪 Pulls the changed document's `_id` out of an event's document key.
/// `None` means the event wasn't about a document we can re-fetch — the
/// follower logs it and moves on.
pub(crate) fn changed_document_id(document_key: Option<&Document>) -> Option<&Bson> {
    document_key?.get("_id")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_the_filter_covers_all_three_interesting_ops() {
        let stage = watch_pipeline("activity");
        let branches = stage
            .get_document("$match")
            .expect("stage must be a $match")
            .get_array("$or")
            .expect("$match must be an $or of clauses");
        assert_eq!(branches.len(), 2, "one clause for insert/replace, one for update");

        let update_clause = branches[1]
            .as_document()
            .expect("update clause must be a document");
        assert!(
            update_clause.contains_key("updateDescription.updatedFields.activity"),
            "the watched field must appear in the updated-fields path"
        );
    }

    #[test]
    fn the_one_where_the_watched_field_is_not_hardcoded() {
        let stage = watch_pipeline("dailyActivity");
        let rendered = stage.to_string();
        assert!(
            rendered.contains("updateDescription.updatedFields.dailyActivity"),
            "the configured field name must flow into the pipeline"
        );
    }

    #[test]
    fn the_one_where_the_document_key_gives_up_its_id() {
        let key = doc! { "_id": "abc123" };
        assert_eq!(
            changed_document_id(Some(&key)),
            Some(&Bson::String("abc123".to_string()))
        );
        assert_eq!(changed_document_id(None), None);
        assert_eq!(
            changed_document_id(Some(&doc! { "not_id": 1 })),
            None,
            "a key without _id is not something we can re-fetch"
        );
    }
}
