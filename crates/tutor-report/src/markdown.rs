//! Markdown report generation for lessons.
//!
//! [`MarkdownGenerator`] renders a [`Report`] as a document an instructor can
//! read: a summary table, mindset signal counts, the lesson timeline, and
//! coaching recommendations.
//!
//! # Example
//!
//! ```rust
//! use tutor_report::{MarkdownGenerator, Report};
//!
//! let report = Report {
//!     unit_title: "Sales Negotiation".to_string(),
//!     ..Default::default()
//! };
//!
//! let markdown = MarkdownGenerator::new(&report).generate();
//! assert!(markdown.contains("## Mindset Signals"));
//! ```

use chrono::{DateTime, Utc};
use std::fmt::Write;

use crate::{Report, SignalCount, TimelineEntry};

/// Generates Markdown reports from lesson results.
pub struct MarkdownGenerator<'a> {
    report: &'a Report,
}

impl<'a> MarkdownGenerator<'a> {
    /// Creates a new Markdown generator for the given report.
    #[must_use]
    pub const fn new(report: &'a Report) -> Self {
        Self { report }
    }

    /// Generates the complete Markdown report.
    #[must_use]
    pub fn generate(&self) -> String {
        let mut output = String::new();

        self.write_title(&mut output);
        self.write_summary(&mut output);
        self.write_signals(&mut output);
        self.write_timeline(&mut output);
        self.write_recommendations(&mut output);
        Self::write_footer(&mut output);

        output
    }

    fn write_title(&self, output: &mut String) {
        let _ = writeln!(
            output,
            "# Lesson Report: {}\n",
            escape_markdown(&self.report.unit_title)
        );
    }

    fn write_summary(&self, output: &mut String) {
        let summary = &self.report.summary;

        let _ = writeln!(output, "## Summary\n");
        let _ = writeln!(output, "| Metric | Value |");
        let _ = writeln!(output, "|--------|-------|");
        let _ = writeln!(output, "| Status | {} |", summary.status.description());
        let _ = writeln!(output, "| Unit | {} |", escape_markdown(&self.report.unit_id));
        let _ = writeln!(
            output,
            "| Final Phase | {} |",
            escape_markdown(&summary.final_phase)
        );
        let _ = writeln!(
            output,
            "| Phases Completed | {} |",
            summary.phases_completed
        );
        let _ = writeln!(output, "| Exchanges | {} |", summary.exchanges);
        let _ = writeln!(
            output,
            "| Duration | {} |",
            format_duration(summary.duration_seconds)
        );
        let _ = writeln!(
            output,
            "| Mindset Signals | {} growth, {} fixed |",
            summary.growth_count, summary.fixed_count
        );
        let _ = writeln!(
            output,
            "| Dominant Mindset | {} |",
            summary.dominant_mindset
        );
        let _ = writeln!(output);
    }

    fn write_signals(&self, output: &mut String) {
        let _ = writeln!(output, "## Mindset Signals\n");

        if self.report.signals.is_empty() {
            let _ = writeln!(output, "*No mindset signals detected.*\n");
            return;
        }

        let _ = writeln!(output, "| Signal | Type | Count |");
        let _ = writeln!(output, "|--------|------|-------|");

        for signal in &self.report.signals {
            Self::write_signal_entry(output, signal);
        }

        let _ = writeln!(output);
    }

    fn write_signal_entry(output: &mut String, signal: &SignalCount) {
        let label = escape_markdown(&humanize_label(&signal.label));
        let kind = signal.kind;
        let count = signal.count;
        let _ = writeln!(output, "| {label} | {kind} | {count} |");
    }

    fn write_timeline(&self, output: &mut String) {
        let _ = writeln!(output, "## Timeline\n");

        if self.report.timeline.is_empty() {
            let _ = writeln!(output, "*No timeline events recorded.*\n");
            return;
        }

        let _ = writeln!(output, "| Time | Exchange | Event | Details |");
        let _ = writeln!(output, "|------|----------|-------|---------|");

        for entry in &self.report.timeline {
            Self::write_timeline_entry(output, entry);
        }

        let _ = writeln!(output);
    }

    fn write_timeline_entry(output: &mut String, entry: &TimelineEntry) {
        let time = format_timestamp(&entry.timestamp);
        let exchange = entry.exchange;
        let event = entry.kind;
        let details = escape_markdown(&entry.details);
        let _ = writeln!(output, "| {time} | #{exchange} | {event} | {details} |");
    }

    fn write_recommendations(&self, output: &mut String) {
        let _ = writeln!(output, "## Recommendations\n");

        if self.report.recommendations.is_empty() {
            let _ = writeln!(output, "*No specific recommendations.*\n");
            return;
        }

        let mut sorted_recs: Vec<_> = self.report.recommendations.iter().collect();
        sorted_recs.sort_by_key(|r| r.priority);

        for (index, rec) in sorted_recs.iter().enumerate() {
            let _ = writeln!(
                output,
                "{}. **[{}]** {}",
                index + 1,
                escape_markdown(&rec.category),
                escape_markdown(&rec.description),
            );
        }

        let _ = writeln!(output);
    }

    fn write_footer(output: &mut String) {
        let _ = writeln!(output, "---");
        let timestamp = format_timestamp(&Utc::now());
        let _ = writeln!(output, "*Generated by Tutor Loop at {timestamp}*");
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Formats a duration in seconds as e.g. `1h 1m 1s`.
fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    let mut parts = Vec::new();

    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if secs > 0 || parts.is_empty() {
        parts.push(format!("{secs}s"));
    }

    parts.join(" ")
}

/// Format: "YYYY-MM-DD HH:MM:SS UTC"
fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// `sought_feedback` becomes `Sought feedback`.
fn humanize_label(label: &str) -> String {
    let spaced = label.replace('_', " ");
    let mut chars = spaced.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Escapes special Markdown characters so learner text renders literally.
fn escape_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for ch in text.chars() {
        match ch {
            '*' | '_' | '`' | '#' | '[' | ']' | '(' | ')' | '!' | '\\' | '<' | '>' | '|' => {
                result.push('\\');
                result.push(ch);
            }
            // table cells cannot span lines
            '\n' => result.push_str("<br>"),
            '\r' => {}
            _ => result.push(ch),
        }
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
