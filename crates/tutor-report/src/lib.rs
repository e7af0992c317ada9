//! Tutor Lesson Reports
//!
//! This crate turns the record of a finished (or abandoned) lesson into a
//! report. Reports can be serialized to JSON for programmatic access or
//! rendered to Markdown for instructors.
//!
//! The crate does not depend on the orchestrator. Callers convert their
//! session into a [`ReportInput`] and hand it to [`ReportGenerator`].
//!
//! # Types
//!
//! - [`Report`] - The complete report
//! - [`ReportSummary`] - Status, exchanges, duration, mindset totals
//! - [`SignalCount`] - How often one mindset label was observed
//! - [`TimelineEntry`] - A timestamped lesson event
//! - [`Recommendation`] - A prioritized coaching suggestion
//!
//! # Generators
//!
//! - [`ReportGenerator`] - Builds a [`Report`] from a [`ReportInput`]
//! - [`json::JsonGenerator`] - Compact or pretty JSON
//! - [`MarkdownGenerator`] - Human-readable Markdown
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use tutor_report::{MarkdownGenerator, ReportGenerator, ReportInput};
//!
//! let input = ReportInput {
//!     unit_id: "U-101".to_string(),
//!     unit_title: "Sales Negotiation".to_string(),
//!     final_phase: "COMPLETE".to_string(),
//!     exchange_count: 8,
//!     started_at: Utc::now(),
//!     ended_at: Utc::now(),
//!     turns: vec![],
//!     handovers: vec![],
//! };
//!
//! let report = ReportGenerator::new(input).generate();
//! let markdown = MarkdownGenerator::new(&report).generate();
//! assert!(markdown.contains("# Lesson Report: Sales Negotiation"));
//! ```

mod generator;
pub mod json;
mod markdown;

pub use generator::{
    HandoverInput, IndicatorInput, ReportGenerator, ReportInput, TurnInput, LABEL_ORDER,
    PHASE_ORDER,
};
pub use markdown::MarkdownGenerator;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Failed to serialize the report to JSON.
    #[error("failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failed to read or write report files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid report data.
    #[error("invalid report data: {0}")]
    InvalidData(String),
}

/// Result type for report operations.
pub type Result<T> = std::result::Result<T, ReportError>;

// ============================================================================
// Lesson status and mindset (local copies to avoid cross-crate dependency)
// ============================================================================

/// Whether the lesson reached its final phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonStatus {
    /// Lesson stopped before `COMPLETE`.
    #[default]
    InProgress,
    /// Lesson reached `COMPLETE`.
    Completed,
}

impl LessonStatus {
    /// Returns a human-readable description of the status.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::InProgress => "Lesson in progress",
            Self::Completed => "Lesson completed",
        }
    }
}

impl std::fmt::Display for LessonStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Mindset family of an indicator label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MindsetKind {
    /// Growth-mindset signal.
    Growth,
    /// Fixed-mindset signal.
    Fixed,
}

impl std::fmt::Display for MindsetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Growth => f.write_str("growth"),
            Self::Fixed => f.write_str("fixed"),
        }
    }
}

/// Which mindset family dominated the lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DominantMindset {
    /// More growth than fixed signals.
    Growth,
    /// More fixed than growth signals.
    Fixed,
    /// Equal non-zero counts.
    Balanced,
    /// No signals at all.
    #[default]
    Undetermined,
}

impl DominantMindset {
    /// Derives the dominant mindset from signal totals.
    #[must_use]
    pub const fn from_counts(growth: u32, fixed: u32) -> Self {
        if growth > fixed {
            Self::Growth
        } else if fixed > growth {
            Self::Fixed
        } else if growth > 0 {
            Self::Balanced
        } else {
            Self::Undetermined
        }
    }

    /// Returns a human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Growth => "Growth",
            Self::Fixed => "Fixed",
            Self::Balanced => "Balanced",
            Self::Undetermined => "Undetermined",
        }
    }
}

impl std::fmt::Display for DominantMindset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Report
// ============================================================================

/// Complete lesson report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Report {
    /// Catalog id of the unit taught.
    pub unit_id: String,

    /// Title of the unit taught.
    pub unit_title: String,

    /// High-level summary of the lesson.
    pub summary: ReportSummary,

    /// Observed mindset labels with counts, in catalog order.
    pub signals: Vec<SignalCount>,

    /// Chronological timeline of turns, phase changes, and handovers.
    pub timeline: Vec<TimelineEntry>,

    /// Prioritized coaching recommendations.
    pub recommendations: Vec<Recommendation>,
}

impl Report {
    /// Serializes the report to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::Serialization` if JSON serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(ReportError::from)
    }

    /// Total number of signals observed.
    #[must_use]
    pub fn signal_total(&self) -> u32 {
        self.signals.iter().map(|s| s.count).sum()
    }

    /// Returns `true` if any fixed-mindset signal was observed.
    #[must_use]
    pub fn has_fixed_signals(&self) -> bool {
        self.summary.fixed_count > 0
    }
}

/// High-level summary of the lesson.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Whether the lesson finished.
    pub status: LessonStatus,

    /// Phase the lesson ended in.
    pub final_phase: String,

    /// Phases passed through before the final one.
    pub phases_completed: u32,

    /// Accepted learner turns.
    pub exchanges: u32,

    /// Wall-clock duration in seconds.
    pub duration_seconds: u64,

    /// Growth-mindset signals observed.
    pub growth_count: u32,

    /// Fixed-mindset signals observed.
    pub fixed_count: u32,

    /// Which family dominated.
    pub dominant_mindset: DominantMindset,
}

/// How often one label was observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalCount {
    /// Label wire name, e.g. `sought_feedback`.
    pub label: String,

    /// Mindset family.
    pub kind: MindsetKind,

    /// Observations across the lesson.
    pub count: u32,
}

/// What a timeline entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineKind {
    /// A learner turn.
    Turn,
    /// The lesson moved to another phase.
    PhaseChange,
    /// The speaking persona changed.
    PersonaSwitch,
}

impl std::fmt::Display for TimelineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Turn => f.write_str("Turn"),
            Self::PhaseChange => f.write_str("Phase change"),
            Self::PersonaSwitch => f.write_str("Persona switch"),
        }
    }
}

/// A timestamped lesson event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,

    /// Exchange count at the event.
    pub exchange: u32,

    /// What happened.
    pub kind: TimelineKind,

    /// Short description of the event.
    pub details: String,
}

/// A prioritized coaching suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Priority (1 = most urgent).
    pub priority: u32,

    /// Area the suggestion addresses.
    pub category: String,

    /// The suggestion itself.
    pub description: String,
}

impl Recommendation {
    /// Creates a recommendation.
    #[must_use]
    pub fn new(priority: u32, category: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            priority,
            category: category.into(),
            description: description.into(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
