//! 📦 Common data structures — the building blocks of leadsync
//!
//! ---
//!
//! 🎬 COLD OPEN — INT. DATA CENTER — 3:47 AM
//!
//! Somewhere, a registration system has been writing user documents for four
//! years. It has changed its mind about field names three times. `firstName`.
//! `first_name`. Both, in the same document, disagreeing with each other.
//! Nobody migrated anything. The documents simply... accumulated opinions.
//!
//! ✅ And then — a [`SourceUser`] arrives. Quietly. Carrying its raw document
//! like a responsible adult carrying groceries in one trip. It does not judge
//! the field names. It resolves them, in priority order, and moves on.
//!
//! 🦆
//!
//! This module defines the humble yet load-bearing structs that ferry user
//! records from the document store to the CRM. They don't ask questions.
//! They carry the data. They are the postal workers of this codebase.
//! Please tip your postal workers.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;

/// 🎯 One raw user document, exactly as the source collection coughed it up.
///
/// The document is kept as an opaque [`Value`] on purpose: the producers of
/// these records were never consistent about field names (camelCase,
/// snake_case, and a few historical one-offs coexist in the wild), so typed
/// deserialization would either reject half the collection or silently drop
/// the legacy spellings. Instead, every read goes through a fallback-chain
/// resolver: an ordered candidate list, first non-empty value wins.
///
/// # Contract 📜
/// - `first_*` methods take candidates in priority order — canonical name
///   first, legacy aliases after. They stop at the first *present* field.
/// - Empty strings and `null` count as absent. Whitespace is trimmed.
/// - A present-but-unparseable value resolves to `None`, never to a guess.
/// - The resolvers are read-only. Nothing here writes back to the source.
#[derive(Debug, Clone)]
pub struct SourceUser {
    /// 🪪 The source document's own id, for audit notes and re-fetches.
    pub id: String,
    doc: Value,
}

impl SourceUser {
    /// 🏗️ Wraps a raw JSON document. The `_id` is pulled out up front because
    /// every audit note and change-stream re-fetch wants it.
    pub fn new(doc: Value) -> Self {
        let id = match doc.get("_id") {
            Some(Value::String(s)) => s.clone(),
            // Extended-JSON shaped id, in case a caller fed us one unconverted.
            Some(Value::Object(o)) => o
                .get("$oid")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            Some(other) => other.to_string(),
            None => "unknown".to_string(),
        };
        Self { id, doc }
    }

    fn first_present(&self, candidates: &[&str]) -> Option<&Value> {
        // 🔍 The fallback chain, in the flesh: walk the candidates in priority
        // order and stop at the first one that actually holds something.
        candidates.iter().find_map(|key| match self.doc.get(*key) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(v) => Some(v),
        })
    }

    /// 🔤 First non-empty string among the candidates, trimmed.
    /// Numbers are stringified — phone numbers have been seen wearing both outfits.
    pub fn first_str(&self, candidates: &[&str]) -> Option<String> {
        match self.first_present(candidates)? {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// 🔢 First non-empty candidate, parsed as a number.
    /// Accepts real JSON numbers and numeric strings ("49.99" happens).
    /// A present-but-unparseable value is `None`, never a guess.
    pub fn first_number(&self, candidates: &[&str]) -> Option<f64> {
        match self.first_present(candidates)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// ✅ First non-empty candidate, as a boolean. Accepts `true`/`false`
    /// strings too, because of course some producer wrote those.
    pub fn first_bool(&self, candidates: &[&str]) -> Option<bool> {
        match self.first_present(candidates)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// ⏰ First non-empty candidate, parsed as a UTC timestamp.
    pub fn first_date(&self, candidates: &[&str]) -> Option<DateTime<Utc>> {
        match self.first_present(candidates)? {
            Value::String(s) => parse_datetime(s),
            _ => None,
        }
    }

    /// 📚 First candidate that holds an array. Used for the nested activity log.
    pub fn first_array(&self, candidates: &[&str]) -> Option<&[Value]> {
        match self.first_present(candidates)? {
            Value::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }
}

/// ⏰ Parses the timestamp spellings observed in the source collection:
/// RFC 3339 (what the registration system writes), and bare `YYYY-MM-DD`
/// (what one of its older versions wrote). Anything else is a `None`.
pub(crate) fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    None
}

/// 💳 The closed set of subscription plans the target schema accepts.
///
/// The CRM side has a storage constraint on this column, so whatever the
/// source documents claim, only these four values ever go over the wire.
/// Unknown, absent, or creatively spelled plans all collapse to [`Trial`] —
/// the raw value is never passed through.
///
/// [`Trial`]: SubscriptionPlan::Trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SubscriptionPlan {
    #[default]
    Trial,
    Monthly,
    Quarterly,
    Yearly,
}

impl SubscriptionPlan {
    /// 🛡️ The enum guard. Case-insensitive match against the allowed set;
    /// everything else (including `None` and `""`) lands on `Trial`.
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("monthly") => SubscriptionPlan::Monthly,
            Some("quarterly") => SubscriptionPlan::Quarterly,
            Some("yearly") => SubscriptionPlan::Yearly,
            // "trial", typos, marketing inventions, None — all of it lands here.
            _ => SubscriptionPlan::Trial,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionPlan::Trial => "Trial",
            SubscriptionPlan::Monthly => "Monthly",
            SubscriptionPlan::Quarterly => "Quarterly",
            SubscriptionPlan::Yearly => "Yearly",
        }
    }
}

/// 📦 One normalized lead, shaped exactly like the CRM's upsert endpoint
/// wants its JSON body. Field names here ARE the wire format — serde
/// serializes this struct verbatim, so renaming a field is an API change.
///
/// The target upserts by `email`, which makes re-running the whole pipeline
/// idempotent at the lead level: same email, same row, updated in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lead {
    /// 📧 The natural key. Lowercased by the mapper so matching is
    /// case-insensitive no matter what the source document shouted.
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// 🪪 Display name — explicit `name` field, else first + last glued together.
    pub name: String,
    pub phone: Option<String>,
    pub state: Option<String>,
    pub gender: Option<String>,
    pub exam_category: Option<String>,
    pub how_did_you_hear: Option<String>,
    pub plan: Option<String>,
    /// 💳 Enum-guarded — see [`SubscriptionPlan::from_raw`].
    pub subscription_plan: SubscriptionPlan,
    pub amount_paid: f64,
    /// ⏰ Always recomputed as `trial_end_date > now`. The source's own flag
    /// is ignored on purpose: the computed window is authoritative.
    pub is_trial_active: bool,
    pub is_subscription_active: bool,
    pub trial_start_date: DateTime<Utc>,
    pub trial_end_date: DateTime<Utc>,
    /// 🏷️ Provenance tag naming the pipeline that wrote this record.
    pub registration_source: String,
    pub software_version: Option<String>,
    /// 📝 Free-text audit trail: origin document id + sync timestamp.
    pub notes: String,
}

/// 📄 One page-visit row as the mapper produces it — everything except the
/// owning lead's target-side id, which only exists after the lead upsert
/// comes back. Time is in minutes here; seconds never leave the mapper.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityDraft {
    pub page_name: String,
    /// ⏱️ Minutes, rounded from the source's seconds. Never raw seconds.
    pub time_spent: i64,
    pub view_count: i64,
    pub visit_date: NaiveDate,
    /// 📊 Total active minutes across all pages on `visit_date`.
    pub total_active_time: i64,
    /// 📊 How many distinct pages were viewed on `visit_date`.
    pub total_pages_viewed: i64,
}

/// 📄 A draft that found its owner: the lead upsert answered with an id,
/// and now the row is ready for the activity endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityRecord {
    /// 🪪 The target-side lead id returned by the upsert.
    pub user_id: String,
    #[serde(flatten)]
    pub visit: ActivityDraft,
}

impl ActivityRecord {
    pub fn new(user_id: &str, visit: ActivityDraft) -> Self {
        Self {
            user_id: user_id.to_string(),
            visit,
        }
    }

    /// 🔑 The tuple the target's uniqueness constraint is built on.
    /// Re-sending a row with this exact key is what produces the benign
    /// conflict the pipeline swallows.
    pub fn natural_key(&self) -> (String, String, NaiveDate, i64) {
        (
            self.user_id.clone(),
            self.visit.page_name.clone(),
            self.visit.visit_date,
            self.visit.time_spent,
        )
    }
}

/// 📊 The run summary. Always produced — even a run where every single
/// record failed still ends with one of these, not an early bail.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// 📄 Documents that came out of the source.
    pub total: u64,
    /// ✅ Leads the target accepted.
    pub synced: u64,
    /// 💤 Documents the mapper declined (no email). Not failures.
    pub skipped: u64,
    /// 💀 Leads the target refused or that died in transit.
    pub failed: u64,
    /// ✅ Activity rows the target accepted.
    pub activities_synced: u64,
    /// 🔁 Activity rows the target already had. Also not failures.
    pub activities_already_there: u64,
    /// 💀 Activity rows that failed for a non-conflict reason.
    pub activities_failed: u64,
    /// 📝 One human-readable line per failure: who, and why.
    pub errors: Vec<String>,
}
