use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::backends::Sink;
use crate::backends::common_config::CommonSinkConfig;
use crate::common::{ActivityRecord, Lead};
use crate::error::SinkError;

/// 🧠 Config for the in-memory sink. The interesting knob is `fail_emails`:
/// any lead whose email is on the list gets rejected, which is how the
/// partial-failure tests stage their record-three-explodes scenario.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct InMemorySinkConfig {
    /// 💣 Emails whose upserts are rejected on purpose.
    #[serde(default)]
    pub fail_emails: Vec<String>,
    #[serde(flatten, default)]
    pub common_config: CommonSinkConfig,
}

/// 🗄️ Everything the sink has absorbed, for test assertions.
///
/// `leads` is keyed by email — inserting the same email twice replaces the
/// entry, which is exactly the upsert-by-email semantics the real target
/// provides, and exactly what makes the idempotency tests meaningful.
///
/// `activity_keys` mimics the target's uniqueness constraint on
/// (user, page, date, time): a second insert of the same key is refused with
/// [`SinkError::Conflict`], same as the real thing.
#[derive(Debug, Default)]
pub(crate) struct InMemorySinkState {
    pub leads: HashMap<String, Lead>,
    pub activities: Vec<ActivityRecord>,
    activity_keys: HashSet<(String, String, NaiveDate, i64)>,
    fail_emails: HashSet<String>,
    pub closed: bool,
}

/// 📦 A sink that never forgets. Unlike my dad, who forgot my soccer game
/// in 1998.
///
/// Clone-able because tests need to peek inside after handing `self` off to
/// the pipeline. The `Arc` means everyone shares the same state. Communist
/// data, but in a good way. The borrow checker approved. Barely. It had notes.
#[derive(Debug, Default, Clone)]
pub(crate) struct InMemorySink {
    /// 🔒 The vault. The evidence locker. The Mutex is load-bearing —
    /// I know it looks optional. It isn't.
    pub(crate) state: Arc<tokio::sync::Mutex<InMemorySinkState>>,
}

impl InMemorySink {
    pub(crate) fn new(config: InMemorySinkConfig) -> Self {
        Self {
            state: Arc::new(tokio::sync::Mutex::new(InMemorySinkState {
                fail_emails: config.fail_emails.into_iter().collect(),
                ..InMemorySinkState::default()
            })),
        }
    }

    /// 🧪 Test convenience: a sink that rejects the given emails and accepts
    /// everything else.
    #[cfg(test)]
    pub(crate) fn failing_for(emails: &[&str]) -> Self {
        Self::new(InMemorySinkConfig {
            fail_emails: emails.iter().map(|e| e.to_string()).collect(),
            common_config: CommonSinkConfig::default(),
        })
    }
}

#[async_trait]
impl Sink for InMemorySink {
    async fn upsert_lead(&mut self, lead: &Lead) -> Result<String, SinkError> {
        let mut state = self.state.lock().await;
        if state.fail_emails.contains(&lead.email) {
            return Err(SinkError::Rejected {
                status: 500,
                message: "injected failure".to_string(),
            });
        }
        // Upsert-by-email: same key, same row, replaced in place.
        state.leads.insert(lead.email.clone(), lead.clone());
        // The email doubles as the record id — stable across re-runs, which
        // is what the activity constraint needs to bite on the second pass.
        Ok(lead.email.clone())
    }

    async fn record_activity(&mut self, record: &ActivityRecord) -> Result<(), SinkError> {
        let mut state = self.state.lock().await;
        if !state.activity_keys.insert(record.natural_key()) {
            // The uniqueness constraint, in miniature.
            return Err(SinkError::Conflict);
        }
        state.activities.push(record.clone());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        // Nothing to flush, but the flag lets tests assert the single
        // well-defined release path actually ran.
        self.state.lock().await.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{ActivityDraft, SubscriptionPlan};

    fn lead(email: &str) -> Lead {
        Lead {
            email: email.to_string(),
            first_name: None,
            last_name: None,
            name: email.to_string(),
            phone: None,
            state: None,
            gender: None,
            exam_category: None,
            how_did_you_hear: None,
            plan: None,
            subscription_plan: SubscriptionPlan::Trial,
            amount_paid: 0.0,
            is_trial_active: false,
            is_subscription_active: false,
            trial_start_date: "2024-01-01T00:00:00Z".parse().unwrap(),
            trial_end_date: "2024-01-16T00:00:00Z".parse().unwrap(),
            registration_source: "test".to_string(),
            software_version: None,
            notes: String::new(),
        }
    }

    fn activity(user_id: &str, page: &str) -> ActivityRecord {
        ActivityRecord::new(
            user_id,
            ActivityDraft {
                page_name: page.to_string(),
                time_spent: 2,
                view_count: 1,
                visit_date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
                total_active_time: 2,
                total_pages_viewed: 1,
            },
        )
    }

    #[tokio::test]
    async fn the_one_where_upserting_twice_leaves_one_lead() {
        let mut sink = InMemorySink::default();
        sink.upsert_lead(&lead("a@x.com")).await.unwrap();
        sink.upsert_lead(&lead("a@x.com")).await.unwrap();
        assert_eq!(
            sink.state.lock().await.leads.len(),
            1,
            "same email twice must replace, never duplicate"
        );
    }

    #[tokio::test]
    async fn the_one_where_the_constraint_rejects_the_rerun() {
        let mut sink = InMemorySink::default();
        sink.record_activity(&activity("lead-1", "mock-exam"))
            .await
            .expect("first insert sails through");
        let second = sink.record_activity(&activity("lead-1", "mock-exam")).await;
        assert!(
            matches!(second, Err(SinkError::Conflict)),
            "the natural key must trip the constraint on the second insert"
        );
        // A different page on the same day is a different key.
        sink.record_activity(&activity("lead-1", "notes"))
            .await
            .expect("different natural key, no conflict");
    }

    #[tokio::test]
    async fn the_one_where_the_injected_failure_actually_fails() {
        let mut sink = InMemorySink::failing_for(&["doomed@x.com"]);
        assert!(sink.upsert_lead(&lead("doomed@x.com")).await.is_err());
        assert!(sink.upsert_lead(&lead("fine@x.com")).await.is_ok());
        assert_eq!(sink.state.lock().await.leads.len(), 1);
    }
}
