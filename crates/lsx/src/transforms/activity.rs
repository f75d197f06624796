//! 📄 The activity mapper — nested page-visit logs in, flat activity rows out.
//!
//! The source keeps activity as a list of day entries, each holding a list of
//! page visits with time measured in SECONDS. The target table wants one row
//! per (page, day) with time in MINUTES plus per-day running totals. The unit
//! conversion happens here and only here — a raw seconds value reaching the
//! wire is a bug, full stop.

use chrono::NaiveDate;
use serde_json::Value;
use tracing::trace;

use crate::common::{ActivityDraft, SourceUser, parse_datetime};

// 📇 Alias tables for the nested shapes. Same rules as the lead tables:
// canonical spelling first, first present wins.
const ACTIVITY_LOG: &[&str] = &["activity", "dailyActivity", "activities"];
const ENTRY_DATE: &[&str] = &["date", "visitDate", "visit_date"];
const ENTRY_PAGES: &[&str] = &["pages", "pageVisits", "page_visits", "visits"];
const PAGE_NAME: &[&str] = &["page", "pageName", "page_name"];
const TIME_SPENT_SECONDS: &[&str] = &["timeSpent", "time_spent", "seconds"];
const VIEW_COUNT: &[&str] = &["views", "viewCount", "view_count"];

/// 🔄 Maps the nested activity log of one source document into flat drafts.
///
/// Malformed entries (no date, no page name, not even an object) are dropped
/// with a trace line — a half-written activity entry is not worth failing a
/// user over. A document with no activity log at all maps to an empty vec.
pub(crate) fn map_activity(user: &SourceUser) -> Vec<ActivityDraft> {
    let Some(days) = user.first_array(ACTIVITY_LOG) else {
        return Vec::new();
    };

    let mut drafts = Vec::new();
    for day in days {
        let Some(visit_date) = nested_date(day, ENTRY_DATE) else {
            trace!(source_id = %user.id, "💤 activity day entry has no usable date, dropping");
            continue;
        };
        let Some(pages) = nested_array(day, ENTRY_PAGES) else {
            continue;
        };

        // First pass: one draft per well-formed page visit, totals zeroed.
        let mut day_drafts: Vec<ActivityDraft> = pages
            .iter()
            .filter_map(|visit| {
                let page_name = nested_str(visit, PAGE_NAME)?;
                let seconds = nested_number(visit, TIME_SPENT_SECONDS).unwrap_or(0.0);
                Some(ActivityDraft {
                    page_name,
                    // ⏱️ seconds → minutes, integer rounding. 125 s is 2 min.
                    time_spent: (seconds / 60.0).round() as i64,
                    view_count: nested_number(visit, VIEW_COUNT).unwrap_or(1.0) as i64,
                    visit_date,
                    total_active_time: 0,
                    total_pages_viewed: 0,
                })
            })
            .collect();

        // Second pass: stamp the day's running totals onto every row.
        let total_active_time: i64 = day_drafts.iter().map(|d| d.time_spent).sum();
        let total_pages_viewed = day_drafts.len() as i64;
        for draft in &mut day_drafts {
            draft.total_active_time = total_active_time;
            draft.total_pages_viewed = total_pages_viewed;
        }
        drafts.extend(day_drafts);
    }
    drafts
}

// 🔍 Nested-object cousins of the SourceUser resolvers. Same fallback-chain
// rules, but over an arbitrary Value instead of the top-level document.

fn nested_present<'a>(value: &'a Value, candidates: &[&str]) -> Option<&'a Value> {
    candidates.iter().find_map(|key| match value.get(*key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(v) => Some(v),
    })
}

fn nested_str(value: &Value, candidates: &[&str]) -> Option<String> {
    match nested_present(value, candidates)? {
        Value::String(s) => Some(s.trim().to_string()),
        _ => None,
    }
}

fn nested_number(value: &Value, candidates: &[&str]) -> Option<f64> {
    match nested_present(value, candidates)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn nested_array<'a>(value: &'a Value, candidates: &[&str]) -> Option<&'a [Value]> {
    match nested_present(value, candidates)? {
        Value::Array(items) => Some(items.as_slice()),
        _ => None,
    }
}

fn nested_date(value: &Value, candidates: &[&str]) -> Option<NaiveDate> {
    match nested_present(value, candidates)? {
        Value::String(s) => parse_datetime(s).map(|dt| dt.date_naive()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(doc: Value) -> SourceUser {
        SourceUser::new(doc)
    }

    #[test]
    fn the_one_where_seconds_become_minutes_and_never_look_back() {
        let drafts = map_activity(&user(json!({
            "email": "a@x.com",
            "activity": [{
                "date": "2024-01-05",
                "pages": [{"page": "mock-exam", "timeSpent": 125, "views": 3}],
            }],
        })));
        assert_eq!(drafts.len(), 1);
        assert_eq!(
            drafts[0].time_spent, 2,
            "125 seconds is round(125/60) = 2 minutes — seconds must not pass through"
        );
        assert_eq!(drafts[0].view_count, 3);
        assert_eq!(
            drafts[0].visit_date,
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
        );
    }

    #[test]
    fn the_one_where_the_daily_totals_actually_total() {
        let drafts = map_activity(&user(json!({
            "activity": [{
                "date": "2024-01-05",
                "pages": [
                    {"page": "dashboard", "timeSpent": 300},
                    {"page": "mock-exam", "timeSpent": 600},
                ],
            }],
        })));
        assert_eq!(drafts.len(), 2);
        for draft in &drafts {
            assert_eq!(
                draft.total_active_time, 15,
                "5 + 10 minutes of page time must appear on every row of the day"
            );
            assert_eq!(draft.total_pages_viewed, 2);
        }
    }

    #[test]
    fn the_one_where_each_day_keeps_its_own_books() {
        let drafts = map_activity(&user(json!({
            "dailyActivity": [
                {"date": "2024-01-05", "pages": [{"page": "a", "timeSpent": 60}]},
                {"date": "2024-01-06", "pages": [
                    {"page": "a", "timeSpent": 60},
                    {"page": "b", "timeSpent": 120},
                ]},
            ],
        })));
        assert_eq!(drafts.len(), 3);
        assert_eq!(drafts[0].total_pages_viewed, 1, "day one saw one page");
        assert_eq!(drafts[1].total_pages_viewed, 2, "day two saw two pages");
        assert_eq!(drafts[2].total_active_time, 3);
    }

    #[test]
    fn the_one_where_legacy_visit_spellings_still_count() {
        let drafts = map_activity(&user(json!({
            "activities": [{
                "visit_date": "2024-02-01T10:00:00Z",
                "page_visits": [{"page_name": "notes", "time_spent": 90, "view_count": 2}],
            }],
        })));
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].page_name, "notes");
        assert_eq!(drafts[0].time_spent, 2, "90 s rounds to 2 min");
        assert_eq!(drafts[0].view_count, 2);
    }

    #[test]
    fn the_one_where_broken_entries_are_quietly_composted() {
        let drafts = map_activity(&user(json!({
            "activity": [
                "not even an object",
                {"pages": [{"page": "orphan", "timeSpent": 60}]},
                {"date": "2024-01-05", "pages": [
                    {"timeSpent": 60},
                    {"page": "survivor", "timeSpent": 60},
                ]},
            ],
        })));
        assert_eq!(
            drafts.len(),
            1,
            "dateless days and nameless pages are dropped, the rest survive"
        );
        assert_eq!(drafts[0].page_name, "survivor");
    }

    #[test]
    fn the_one_where_no_activity_log_means_no_rows_and_no_fuss() {
        assert!(map_activity(&user(json!({"email": "a@x.com"}))).is_empty());
    }
}
