//! Instructional phases and their telemetry verbs.
//!
//! A lesson walks a strict total order of phases:
//!
//! `TEACH_1 -> TEACH_2 -> TEACH_3 -> TEACH_4 -> CHECK_1 -> CHECK_2 -> ASSESS_1 -> ASSESS_2 -> COMPLETE`
//!
//! `COMPLETE` is terminal. Each phase owns exactly one [`Verb`], used for all
//! telemetry raised while the session is in that phase.

use serde::{Deserialize, Serialize};

// ============================================================================
// Phase
// ============================================================================

/// One step in the fixed instructional sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    /// First teaching exchange.
    #[default]
    #[serde(rename = "TEACH_1")]
    Teach1,
    /// Second teaching exchange.
    #[serde(rename = "TEACH_2")]
    Teach2,
    /// Third teaching exchange.
    #[serde(rename = "TEACH_3")]
    Teach3,
    /// Fourth teaching exchange.
    #[serde(rename = "TEACH_4")]
    Teach4,
    /// First understanding check.
    #[serde(rename = "CHECK_1")]
    Check1,
    /// Second understanding check.
    #[serde(rename = "CHECK_2")]
    Check2,
    /// First assessment item.
    #[serde(rename = "ASSESS_1")]
    Assess1,
    /// Second assessment item.
    #[serde(rename = "ASSESS_2")]
    Assess2,
    /// Lesson finished; terminal.
    #[serde(rename = "COMPLETE")]
    Complete,
}

/// Coarse grouping of phases, used for persona suggestions and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// `TEACH_*` phases.
    Teach,
    /// `CHECK_*` phases.
    Check,
    /// `ASSESS_*` phases.
    Assess,
    /// `COMPLETE`.
    Complete,
}

impl Phase {
    /// All phases in lesson order.
    pub const ALL: [Self; 9] = [
        Self::Teach1,
        Self::Teach2,
        Self::Teach3,
        Self::Teach4,
        Self::Check1,
        Self::Check2,
        Self::Assess1,
        Self::Assess2,
        Self::Complete,
    ];

    /// Number of phases that accept learner turns.
    pub const LIVE_PHASES: u32 = 8;

    /// Returns the successor phase, or `None` at `COMPLETE`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tutor_orchestrator::Phase;
    ///
    /// assert_eq!(Phase::Teach4.next(), Some(Phase::Check1));
    /// assert_eq!(Phase::Complete.next(), None);
    /// ```
    #[must_use]
    pub const fn next(&self) -> Option<Self> {
        match self {
            Self::Teach1 => Some(Self::Teach2),
            Self::Teach2 => Some(Self::Teach3),
            Self::Teach3 => Some(Self::Teach4),
            Self::Teach4 => Some(Self::Check1),
            Self::Check1 => Some(Self::Check2),
            Self::Check2 => Some(Self::Assess1),
            Self::Assess1 => Some(Self::Assess2),
            Self::Assess2 => Some(Self::Complete),
            Self::Complete => None,
        }
    }

    /// Zero-based position in the lesson order.
    #[must_use]
    pub const fn ordinal(&self) -> u32 {
        *self as u32
    }

    /// Returns `true` for `COMPLETE`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Returns the stage this phase belongs to.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Teach1 | Self::Teach2 | Self::Teach3 | Self::Teach4 => Stage::Teach,
            Self::Check1 | Self::Check2 => Stage::Check,
            Self::Assess1 | Self::Assess2 => Stage::Assess,
            Self::Complete => Stage::Complete,
        }
    }

    /// Returns the wire name (`TEACH_1`, ...).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Teach1 => "TEACH_1",
            Self::Teach2 => "TEACH_2",
            Self::Teach3 => "TEACH_3",
            Self::Teach4 => "TEACH_4",
            Self::Check1 => "CHECK_1",
            Self::Check2 => "CHECK_2",
            Self::Assess1 => "ASSESS_1",
            Self::Assess2 => "ASSESS_2",
            Self::Complete => "COMPLETE",
        }
    }

    /// Returns the telemetry verb associated with this phase.
    #[must_use]
    pub const fn verb(&self) -> Verb {
        match self {
            Self::Teach1 => Verb::Experienced,
            Self::Teach2 => Verb::Interacted,
            Self::Teach3 => Verb::Practiced,
            Self::Teach4 => Verb::Progressed,
            Self::Check1 => Verb::Answered,
            Self::Check2 => Verb::Responded,
            Self::Assess1 => Verb::Attempted,
            Self::Assess2 => Verb::Scored,
            Self::Complete => Verb::Completed,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Verb
// ============================================================================

/// Telemetry verb labels (xAPI ADL vocabulary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    /// `TEACH_1`.
    Experienced,
    /// `TEACH_2`.
    Interacted,
    /// `TEACH_3`.
    Practiced,
    /// `TEACH_4`.
    Progressed,
    /// `CHECK_1`.
    Answered,
    /// `CHECK_2`.
    Responded,
    /// `ASSESS_1`.
    Attempted,
    /// `ASSESS_2`.
    Scored,
    /// `COMPLETE`.
    Completed,
}

impl Verb {
    /// Returns the verb label appended to the configured verb base URI.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Experienced => "experienced",
            Self::Interacted => "interacted",
            Self::Practiced => "practiced",
            Self::Progressed => "progressed",
            Self::Answered => "answered",
            Self::Responded => "responded",
            Self::Attempted => "attempted",
            Self::Scored => "scored",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Tests
// ============================================================================
