//! 🍃 The MongoDB backend — where the user documents actually live.
//!
//! Split in two, like all good stories:
//! - [`mongo_source`] — connect, ping, fetch (full or incremental), re-fetch
//!   by id, and the BSON→JSON conversion that keeps the mapper blissfully
//!   ignorant of BSON's existence.
//! - [`change_stream`] — the subscription plumbing for follow mode: the
//!   aggregation filter and the document-key extraction.

pub(crate) mod change_stream;
pub(crate) mod mongo_source;

pub use mongo_source::MongoSourceConfig;
pub(crate) use mongo_source::MongoSource;
