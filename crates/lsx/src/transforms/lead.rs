//! 🪪 The lead mapper — one raw user document in, one wire-ready [`Lead`] out.
//!
//! Every target field below has an ordered candidate list: the canonical
//! camelCase name first, the snake_case legacy spelling second, historical
//! one-offs last. The tables in this file are the single authority on that
//! order — if a new alias shows up in the wild, it gets added here and
//! nowhere else.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use tracing::trace;

use crate::common::{ActivityDraft, Lead, SourceUser, SubscriptionPlan};
use crate::transforms::activity::map_activity;

/// ⏳ The canonical free-trial length. There used to be a 7-day variant
/// floating around; it is superseded. One window, everywhere.
pub(crate) const TRIAL_LENGTH_DAYS: i64 = 15;

// 📇 The alias tables. Priority order is load-bearing: first present wins.
const EMAIL: &[&str] = &["email"];
const NAME: &[&str] = &["name"];
const FIRST_NAME: &[&str] = &["firstName", "first_name"];
const LAST_NAME: &[&str] = &["lastName", "last_name"];
const PHONE: &[&str] = &["phone", "phoneNumber", "phone_number", "mobile"];
const STATE: &[&str] = &["state"];
const GENDER: &[&str] = &["gender"];
const EXAM_CATEGORY: &[&str] = &["examCategory", "exam_category"];
const HOW_DID_YOU_HEAR: &[&str] = &["howDidYouHear", "how_did_you_hear"];
const SOFTWARE_VERSION: &[&str] = &["softwareVersion", "software_version", "appVersion"];
const PLAN: &[&str] = &["plan", "planName", "plan_name"];
const SUBSCRIPTION_PLAN: &[&str] = &["subscriptionPlan", "subscription_plan", "plan"];
const TRIAL_START: &[&str] = &["trialStartDate", "trial_start_date"];
const TRIAL_END: &[&str] = &["trialEndDate", "trial_end_date"];
const CREATED_AT: &[&str] = &["createdAt", "created_at"];
const SUBSCRIPTION_ACTIVE: &[&str] = &[
    "isSubscriptionActive",
    "is_subscription_active",
    "subscriptionActive",
];
const SUBSCRIPTION_END: &[&str] = &["subscriptionEndDate", "subscription_end_date"];
const AMOUNT_PAID: &[&str] = &["amountPaid", "amount_paid", "totalPaid"];

/// 🎁 A successfully mapped user: the lead plus its activity drafts, ready
/// for the upserter.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedUser {
    pub lead: Lead,
    pub activity: Vec<ActivityDraft>,
}

/// 💤 Why the mapper declined a document. There is exactly one reason today,
/// but it gets an enum so "skip" stays a deliberate branch, distinct from
/// every flavor of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// 📧 No email anywhere in the document. Without the natural key there
    /// is nothing to upsert against.
    MissingEmail,
}

/// 🔀 The mapper's verdict on one document.
#[derive(Debug, Clone, PartialEq)]
pub enum MapOutcome {
    Mapped(Box<MappedUser>),
    Skipped(SkipReason),
}

/// 🔄 Maps one raw source document to a normalized lead (plus activity drafts).
///
/// Pure: `now` is injected so the trial window is deterministic, and the
/// provenance tag comes from config rather than a global. No I/O happens in
/// here — a document either maps, or it is skipped, and the caller counts.
///
/// # Contract 📜
/// - A document with no resolvable email is a *skip*, not an error.
/// - `subscription_plan` goes through the enum guard; raw values never pass.
/// - `trial_end_date` is always populated: explicit field, else start + 15 days.
/// - `is_trial_active` is always recomputed from the window. The source's own
///   flag is ignored even when present — the computed window is authoritative.
pub fn map_user(user: &SourceUser, now: DateTime<Utc>, registration_source: &str) -> MapOutcome {
    let Some(email) = user.first_str(EMAIL) else {
        trace!(source_id = %user.id, "💤 document has no email, skipping");
        return MapOutcome::Skipped(SkipReason::MissingEmail);
    };
    let email = email.to_ascii_lowercase();

    let first_name = user.first_str(FIRST_NAME);
    let last_name = user.first_str(LAST_NAME);
    let name = user.first_str(NAME).unwrap_or_else(|| {
        // Glue first + last with a single space; either half may be missing.
        [first_name.as_deref(), last_name.as_deref()]
            .iter()
            .flatten()
            .copied()
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string()
    });

    // ⏳ The trial window. Start: explicit field, else the registration
    // timestamp, else "now". End: explicit field, else start + 15 days.
    let trial_start_date = user
        .first_date(TRIAL_START)
        .or_else(|| user.first_date(CREATED_AT))
        .unwrap_or(now);
    let trial_end_date = user
        .first_date(TRIAL_END)
        .unwrap_or(trial_start_date + Duration::days(TRIAL_LENGTH_DAYS));

    // ⚠️ Recomputed, never read from the source. Two scripts' worth of stale
    // isTrialActive flags taught us this one.
    let is_trial_active = trial_end_date > now;

    // 💳 For subscriptions there is no authoritative window to recompute, so
    // the source flag wins when present; an end date is the fallback oracle.
    let is_subscription_active = user
        .first_bool(SUBSCRIPTION_ACTIVE)
        .or_else(|| user.first_date(SUBSCRIPTION_END).map(|end| end > now))
        .unwrap_or(false);

    let lead = Lead {
        first_name,
        last_name,
        name,
        phone: user.first_str(PHONE),
        state: user.first_str(STATE),
        gender: user.first_str(GENDER),
        exam_category: user.first_str(EXAM_CATEGORY),
        how_did_you_hear: user.first_str(HOW_DID_YOU_HEAR),
        plan: user.first_str(PLAN),
        subscription_plan: SubscriptionPlan::from_raw(user.first_str(SUBSCRIPTION_PLAN).as_deref()),
        amount_paid: user.first_number(AMOUNT_PAID).unwrap_or(0.0),
        is_trial_active,
        is_subscription_active,
        trial_start_date,
        trial_end_date,
        registration_source: registration_source.to_string(),
        software_version: user.first_str(SOFTWARE_VERSION),
        notes: format!(
            "Imported from MongoDB; source _id {}; synced at {}",
            user.id,
            now.to_rfc3339_opts(SecondsFormat::Secs, true)
        ),
        email,
    };

    MapOutcome::Mapped(Box::new(MappedUser {
        activity: map_activity(user),
        lead,
    }))
}
