//! 🚨 Sink error taxonomy — because not every failure deserves the same funeral.
//!
//! The target API can let us down in exactly three ways, and the pipeline
//! treats each one differently:
//!
//! - [`SinkError::Transport`] — the request never got a real answer. Network
//!   gremlins, DNS despair, timeouts. Counted as a per-record failure.
//! - [`SinkError::Rejected`] — the target answered and the answer was "no".
//!   Also a per-record failure, but at least it's a *polite* no with a status.
//! - [`SinkError::Conflict`] — the target says the row already exists.
//!   For activity upserts this is not a failure at all. It's the uniqueness
//!   constraint doing our de-duplication for us. We say thank you and move on.
//!
//! ⚠️ The Conflict variant exists so the "benign duplicate" decision is a
//! typed, testable branch — not a string-match on a backend error code buried
//! in some call site. The string matching happens in exactly one place
//! (the CRM sink's response parser) and nowhere else.

use thiserror::Error;

/// 🚨 Everything the target side of the pipeline can throw at one record.
#[derive(Debug, Error)]
pub enum SinkError {
    /// 📡 The request died in transit — no usable response came back.
    #[error("could not reach the target API: {0}")]
    Transport(#[from] reqwest::Error),

    /// 📦 The record would not serialize. Should be unreachable for our own
    /// structs, but "should" is not a type system.
    #[error("could not encode the record: {0}")]
    Encode(#[from] serde_json::Error),

    /// 🙅 The target answered with a non-success status or a `success: false` body.
    #[error("target rejected the record (status {status}): {message}")]
    Rejected { status: u16, message: String },

    /// 🔁 The record is already there. Uniqueness constraint says hi.
    /// Benign for activity upserts — the caller must NOT count this as a failure.
    #[error("record already exists on the target")]
    Conflict,
}

impl SinkError {
    /// 🔁 True when this error means "already synced, nothing to do".
    pub fn is_benign_conflict(&self) -> bool {
        matches!(self, SinkError::Conflict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_rejections_carry_their_receipts() {
        let err = SinkError::Rejected {
            status: 422,
            message: "email is cursed".to_string(),
        };
        assert!(err.to_string().contains("422"), "status must survive Display");
        assert!(
            err.to_string().contains("email is cursed"),
            "message must survive Display"
        );
        assert!(!err.is_benign_conflict(), "a rejection is a real failure");
    }

    #[test]
    fn the_one_where_conflicts_are_officially_not_a_problem() {
        let err = SinkError::Conflict;
        assert!(err.is_benign_conflict(), "Conflict is the one benign variant");
        assert!(err.to_string().contains("already exists"));
    }
}
