//! 📊 progress.rs — "Are we there yet?" — every pipeline, every time, forever.
//!
//! 🚀 This module answers the age-old question: "how is the sync going?"
//! With a live spinner while records flow, and a summary table so comfy it
//! has lumbar support once they've stopped.
//!
//! ⚠️  Warning: Watching this progress bar will not make it go faster.
//! Neither will refreshing it. We've tried. Science says no.

use std::time::Duration;

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use indicatif::{ProgressBar, ProgressStyle};

use crate::common::SyncReport;

/// 🔢 Formats a number with commas for the 3 people in the audience who like
/// readability. "1000000 docs" → "1,000,000 docs" — you're welcome, eyes.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ Formats a Duration into MM:SS or HH:MM:SS.
/// If it shows HH:MM:SS, you should probably call your mom. It's been a while.
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// 📊 The live ticker the SinkWorker drives: one spinner, running counters.
///
/// There's no percentage and no ETA — the total isn't known on this side of
/// the channel, and a wrong ETA is worse than none. Just honest counters,
/// updated per record.
pub(crate) struct SyncProgress {
    bar: ProgressBar,
}

impl std::fmt::Debug for SyncProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 🎭 custom Debug because indicatif::ProgressBar doesn't derive it.
        f.debug_struct("SyncProgress").finish()
    }
}

impl SyncProgress {
    pub(crate) fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} 📄 {pos} processed — {msg}")
                .expect("progress template is a compile-time constant"),
        );
        Self { bar }
    }

    /// 🔄 One tick per record processed, whatever its fate.
    pub(crate) fn update(&self, report: &SyncReport) {
        self.bar.set_position(report.total);
        self.bar.set_message(format!(
            "✅ {} synced, 💤 {} skipped, 💀 {} failed",
            format_number(report.synced),
            format_number(report.skipped),
            format_number(report.failed)
        ));
    }

    /// 🏁 Clears the spinner. The summary table takes the stage from here.
    pub(crate) fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// 🍽️ Renders the run summary as a table. The CLI prints this after every
/// run — even a fully failed one, because the summary is the contract.
pub fn summary_table(report: &SyncReport, elapsed: Duration) -> Table {
    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let mut row = |label: &str, value: String| {
        table.add_row(vec![
            Cell::new(label),
            Cell::new(value).set_alignment(CellAlignment::Right),
        ]);
    };

    row("📄 Documents read", format_number(report.total));
    row("✅ Leads synced", format_number(report.synced));
    row("💤 Skipped (no email)", format_number(report.skipped));
    row("💀 Failed", format_number(report.failed));
    row("📊 Activity rows synced", format_number(report.activities_synced));
    row(
        "🔁 Activity already present",
        format_number(report.activities_already_there),
    );
    row("⚠️ Activity failures", format_number(report.activities_failed));
    row("⏱️ Elapsed", format_duration(elapsed));

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_big_numbers_get_their_commas() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn the_one_where_durations_dress_for_the_occasion() {
        assert_eq!(format_duration(Duration::from_secs(59)), "00:59");
        assert_eq!(format_duration(Duration::from_secs(61)), "01:01");
        assert_eq!(
            format_duration(Duration::from_secs(3661)),
            "01:01:01",
            "past an hour, the hours column shows up"
        );
    }

    #[test]
    fn the_one_where_the_summary_mentions_every_counter() {
        let report = SyncReport {
            total: 5,
            synced: 3,
            skipped: 1,
            failed: 1,
            activities_synced: 2,
            activities_already_there: 4,
            activities_failed: 0,
            errors: vec!["x@x.com: boom".to_string()],
        };
        let rendered = summary_table(&report, Duration::from_secs(65)).to_string();
        assert!(rendered.contains("Leads synced"));
        assert!(rendered.contains("01:05"));
        assert!(
            rendered.contains("Skipped"),
            "skips get their own line — they are not failures"
        );
    }
}
