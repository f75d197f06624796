use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::backends::Sink;
use crate::backends::common_config::CommonSinkConfig;
use crate::common::{ActivityRecord, Lead};
use crate::error::SinkError;

// 🐘 The Postgres-flavored "unique constraint violated" code the target's
// error bodies carry. This string is matched in exactly ONE place — here —
// and everywhere else it's the typed SinkError::Conflict.
const UNIQUE_VIOLATION_CODE: &str = "23505";

#[derive(Debug, Deserialize, Clone)]
pub struct CrmSinkConfig {
    /// 📡 Base URL of the CRM API. Include scheme + host. Yes, all of it.
    /// No, `localhost` alone is not enough. Yes, I know it worked in dev.
    pub url: String,
    /// 🔒 Bearer token for the `Authorization` header. Optional in the type,
    /// but the real target will 401 you without it, so. You know. Set it.
    #[serde(default)]
    pub api_token: Option<String>,
    /// 📤 Path of the lead upsert endpoint.
    #[serde(default = "default_lead_path")]
    pub lead_path: String,
    /// 📄 Path of the activity endpoint.
    #[serde(default = "default_activity_path")]
    pub activity_path: String,
    /// 🔧 Common sink config: batch size and the inter-batch nap.
    #[serde(flatten, default)]
    pub common_config: CommonSinkConfig,
}

fn default_lead_path() -> String {
    "/api/leads".to_string()
}

fn default_activity_path() -> String {
    "/api/lead-activities".to_string()
}

/// 📡 The sink side of the CRM backend — pure I/O, one record per request.
///
/// `CrmSink` accepts one normalized record at a time and POSTs it. That's
/// it. No internal buffer. No transform logic. No retries — retries are a
/// re-run of the pipeline, which is safe because the target upserts by email.
///
/// Internally holds:
/// - `client`: the HTTP muscle 💪 — built once, reused across requests
/// - `config`: auth, URL, endpoint paths
///
/// 🚰 Think of this as the drain at the end of the pipeline. Knock knock.
/// Who's there? HTTP POST. HTTP POST who? HTTP POST your lead and hope the
/// CRM's in a good mood.
#[derive(Debug)]
pub(crate) struct CrmSink {
    client: reqwest::Client,
    config: CrmSinkConfig,
}

/// 📨 What the target's endpoints answer with. Every field optional because
/// the two endpoints (and their error paths) each volunteer a different
/// subset. The parser below sorts it out.
#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    success: Option<bool>,
    id: Option<Value>,
    error: Option<String>,
    code: Option<String>,
}

impl ApiResponse {
    fn parse(body: &str) -> Self {
        // A non-JSON body is treated as an empty response; the status code
        // still decides the outcome, the body just loses its say.
        serde_json::from_str(body).unwrap_or_default()
    }

    /// 🪪 The record id, whichever JSON type it showed up as.
    fn id_string(&self) -> Option<String> {
        match &self.id {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[async_trait]
impl Sink for CrmSink {
    /// 📤 POST one lead at the upsert endpoint. The target matches on email
    /// and decides insert-vs-update itself — we just deliver.
    async fn upsert_lead(&mut self, lead: &Lead) -> Result<String, SinkError> {
        let (status, body) = self
            .post_json(&self.config.lead_path, serde_json::to_string(lead)?)
            .await?;
        let response = ApiResponse::parse(&body);

        if !status.is_success() || response.success == Some(false) {
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                message: response
                    .error
                    .unwrap_or_else(|| preview(&body)),
            });
        }

        // ✅ A success without an id is a malformed answer — the activity
        // sub-sync needs that id, so we refuse to pretend this worked.
        response.id_string().ok_or(SinkError::Rejected {
            status: status.as_u16(),
            message: "target reported success but returned no record id".to_string(),
        })
    }

    /// 📄 POST one activity row. A 409, or a body carrying the duplicate-key
    /// code, means the target already has this row — surfaced as the typed
    /// Conflict so the caller can file it under "already synced".
    async fn record_activity(&mut self, record: &ActivityRecord) -> Result<(), SinkError> {
        let (status, body) = self
            .post_json(&self.config.activity_path, serde_json::to_string(record)?)
            .await?;
        let response = ApiResponse::parse(&body);

        let is_duplicate = status.as_u16() == 409
            || response.code.as_deref() == Some(UNIQUE_VIOLATION_CODE);
        if is_duplicate {
            return Err(SinkError::Conflict);
        }

        if !status.is_success() || response.success == Some(false) {
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                message: response.error.unwrap_or_else(|| preview(&body)),
            });
        }

        trace!(page = %record.visit.page_name, "📄 activity row landed");
        Ok(())
    }

    /// 🗑️ Nothing to flush — we don't buffer. The HTTP client drops cleanly.
    /// The connection pool says goodbye. Go home. 🦆
    async fn close(&mut self) -> Result<()> {
        debug!("🗑️ CRM sink closing — no buffer to flush, just vibes to release");
        Ok(())
    }
}

impl CrmSink {
    /// 🚀 Stand up a new `CrmSink`, fully wired and ready to receive records.
    ///
    /// This constructor does two things:
    /// 1. Builds the `reqwest::Client` with sane timeouts (10s connect, 30s
    ///    request). Like a polite person — we will wait, but not forever.
    /// 2. Pings the base URL with a GET to confirm something is alive on the
    ///    other end. A handshake. A hello. A "are you even there?" If the
    ///    network eats this, we fail loudly here, not 10,000 records deep.
    pub(crate) async fn new(config: CrmSinkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .context("💀 The HTTP client refused to be born. Probably a missing TLS cert or a cursed system OpenSSL. Either way: tragic.")?;

        // 📡 Connectivity ping. Only transport failures matter here — a 404
        // from the base URL still proves someone is home.
        client
            .get(&config.url)
            .send()
            .await
            .context("💀 The CRM API never answered the hello. Check the URL, check connectivity, check that the service is actually running.")?;

        debug!(url = %config.url, "📡 CRM API is reachable");
        Ok(Self { client, config })
    }

    /// 📡 One POST, JSON body, bearer auth, body text back. The shared plumbing
    /// under both endpoints.
    async fn post_json(
        &self,
        endpoint_path: &str,
        body: String,
    ) -> Result<(reqwest::StatusCode, String), SinkError> {
        let url = format!("{}{}", self.config.url.trim_end_matches('/'), endpoint_path);
        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json");
        if let Some(token) = &self.config.api_token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request.body(body).send().await?;
        let status = response.status();
        // The body is read even on errors — it usually contains the target's
        // actual complaint, which beats "422 Unprocessable Entity" by a mile.
        let body = response.text().await.unwrap_or_default();
        Ok((status, body))
    }
}

/// ✂️ First chunk of a response body, for error messages that quote the
/// target without pasting a novel into the summary.
fn preview(body: &str) -> String {
    const MAX: usize = 200;
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "(empty response body)".to_string();
    }
    let mut end = MAX.min(trimmed.len());
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{ActivityDraft, SubscriptionPlan};
    use chrono::NaiveDate;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_lead() -> Lead {
        Lead {
            email: "a@x.com".to_string(),
            first_name: Some("A".to_string()),
            last_name: None,
            name: "A".to_string(),
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
            registration_source: "mongodb_sync".to_string(),
            software_version: None,
            notes: "test".to_string(),
        }
    }

    fn test_activity() -> ActivityRecord {
        ActivityRecord::new(
            "lead-1",
            ActivityDraft {
                page_name: "mock-exam".to_string(),
                time_spent: 2,
                view_count: 1,
                visit_date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
                total_active_time: 2,
                total_pages_viewed: 1,
            },
        )
    }

    async fn sink_for(server: &MockServer) -> CrmSink {
        CrmSink::new(CrmSinkConfig {
            url: server.uri(),
            api_token: Some("sekrit".to_string()),
            lead_path: default_lead_path(),
            activity_path: default_activity_path(),
            common_config: CommonSinkConfig::default(),
        })
        .await
        .expect("💀 the mock server is right there, the ping cannot fail")
    }

    #[tokio::test]
    async fn the_one_where_a_lead_lands_and_brings_back_an_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/leads"))
            .and(header("Authorization", "Bearer sekrit"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"success": true, "id": "lead-1"})),
            )
            .mount(&server)
            .await;

        let mut sink = sink_for(&server).await;
        let id = sink
            .upsert_lead(&test_lead())
            .await
            .expect("a 200 with an id is the happy path");
        assert_eq!(id, "lead-1");
    }

    #[tokio::test]
    async fn the_one_where_numeric_ids_are_also_ids() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/leads"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"success": true, "id": 42})),
            )
            .mount(&server)
            .await;

        let mut sink = sink_for(&server).await;
        assert_eq!(sink.upsert_lead(&test_lead()).await.unwrap(), "42");
    }

    #[tokio::test]
    async fn the_one_where_a_rejection_keeps_the_receipts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/leads"))
            .respond_with(
                ResponseTemplate::new(422)
                    .set_body_json(json!({"success": false, "error": "email is cursed"})),
            )
            .mount(&server)
            .await;

        let mut sink = sink_for(&server).await;
        match sink.upsert_lead(&test_lead()).await {
            Err(SinkError::Rejected { status, message }) => {
                assert_eq!(status, 422);
                assert_eq!(message, "email is cursed", "the target's own words must survive");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn the_one_where_success_without_an_id_is_not_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/leads"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .mount(&server)
            .await;

        let mut sink = sink_for(&server).await;
        assert!(
            matches!(
                sink.upsert_lead(&test_lead()).await,
                Err(SinkError::Rejected { .. })
            ),
            "no id means the activity sub-sync is stranded — refuse to pretend"
        );
    }

    #[tokio::test]
    async fn the_one_where_a_409_files_under_already_synced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/lead-activities"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({"error": "duplicate"})))
            .mount(&server)
            .await;

        let mut sink = sink_for(&server).await;
        match sink.record_activity(&test_activity()).await {
            Err(err) => assert!(err.is_benign_conflict(), "409 must classify as Conflict"),
            Ok(()) => panic!("a 409 is not a plain success"),
        }
    }

    #[tokio::test]
    async fn the_one_where_the_postgres_code_also_means_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/lead-activities"))
            .respond_with(ResponseTemplate::new(400).set_body_json(
                json!({"code": "23505", "error": "duplicate key value violates unique constraint"}),
            ))
            .mount(&server)
            .await;

        let mut sink = sink_for(&server).await;
        match sink.record_activity(&test_activity()).await {
            Err(err) => assert!(
                err.is_benign_conflict(),
                "code 23505 in the body must classify as Conflict even on a non-409 status"
            ),
            Ok(()) => panic!("a unique violation is not a plain success"),
        }
    }

    #[tokio::test]
    async fn the_one_where_other_activity_failures_stay_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/lead-activities"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(json!({"error": "database on fire"})),
            )
            .mount(&server)
            .await;

        let mut sink = sink_for(&server).await;
        match sink.record_activity(&test_activity()).await {
            Err(SinkError::Rejected { status, message }) => {
                assert_eq!(status, 500);
                assert!(message.contains("database on fire"));
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }
}
