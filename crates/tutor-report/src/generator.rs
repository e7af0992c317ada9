//! Report generation from a lesson record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    DominantMindset, LessonStatus, MindsetKind, Recommendation, Report, ReportSummary,
    SignalCount, TimelineEntry, TimelineKind,
};

/// Phase wire names in lesson order.
pub const PHASE_ORDER: [&str; 9] = [
    "TEACH_1", "TEACH_2", "TEACH_3", "TEACH_4", "CHECK_1", "CHECK_2", "ASSESS_1", "ASSESS_2",
    "COMPLETE",
];

/// Indicator label wire names in catalog order.
pub const LABEL_ORDER: [&str; 12] = [
    "embraced_challenge",
    "persisted_after_failure",
    "learned_from_mistakes",
    "sought_feedback",
    "valued_diverse_perspectives",
    "embraced_complexity",
    "learned_through_doing",
    "set_challenging_goal",
    "reflected_on_learning",
    "avoided_challenge",
    "gave_up_easily",
    "blamed_external",
];

const TERMINAL_PHASE: &str = "COMPLETE";
const EXCERPT_CHARS: usize = 60;

// ============================================================================
// Input types
// ============================================================================

/// Everything the generator needs to know about a lesson.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportInput {
    /// Catalog id of the unit.
    pub unit_id: String,
    /// Unit title.
    pub unit_title: String,
    /// Phase wire name at the end of the lesson.
    pub final_phase: String,
    /// Accepted learner turns.
    pub exchange_count: u32,
    /// When the lesson started.
    pub started_at: DateTime<Utc>,
    /// When the lesson was last updated.
    pub ended_at: DateTime<Utc>,
    /// Learner turns in order.
    pub turns: Vec<TurnInput>,
    /// Persona handovers in order.
    pub handovers: Vec<HandoverInput>,
}

/// One learner turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnInput {
    /// Exchange number, starting at 1.
    pub exchange: u32,
    /// Phase the turn was spoken in.
    pub phase: String,
    /// What the learner said.
    pub text: String,
    /// Indicators detected on the turn.
    pub indicators: Vec<IndicatorInput>,
    /// When the turn was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// One detected indicator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorInput {
    /// Label wire name.
    pub label: String,
    /// Mindset family.
    pub kind: MindsetKind,
}

/// One persona handover.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoverInput {
    /// Previous persona key.
    pub from: String,
    /// New persona key.
    pub to: String,
    /// Phase at the switch.
    pub phase: String,
    /// Exchange count at the switch.
    pub exchange: u32,
    /// When the switch happened.
    pub at: DateTime<Utc>,
}

// ============================================================================
// Generator
// ============================================================================

/// Builds a [`Report`] from a [`ReportInput`].
#[derive(Debug, Clone)]
pub struct ReportGenerator {
    input: ReportInput,
}

impl ReportGenerator {
    /// Creates a generator for `input`.
    #[must_use]
    pub const fn new(input: ReportInput) -> Self {
        Self { input }
    }

    /// Generates the report.
    #[must_use]
    pub fn generate(&self) -> Report {
        let signals = self.signal_counts();
        let summary = self.summary(&signals);
        let recommendations = self.recommendations(&summary, &signals);

        Report {
            unit_id: self.input.unit_id.clone(),
            unit_title: self.input.unit_title.clone(),
            summary,
            signals,
            timeline: self.timeline(),
            recommendations,
        }
    }

    fn summary(&self, signals: &[SignalCount]) -> ReportSummary {
        let (growth_count, fixed_count) =
            signals
                .iter()
                .fold((0u32, 0u32), |(growth, fixed), signal| match signal.kind {
                    MindsetKind::Growth => (growth.saturating_add(signal.count), fixed),
                    MindsetKind::Fixed => (growth, fixed.saturating_add(signal.count)),
                });

        let status = if self.input.final_phase == TERMINAL_PHASE {
            LessonStatus::Completed
        } else {
            LessonStatus::InProgress
        };

        let duration_seconds = u64::try_from(
            (self.input.ended_at - self.input.started_at)
                .num_seconds()
                .max(0),
        )
        .unwrap_or(0);

        ReportSummary {
            status,
            final_phase: self.input.final_phase.clone(),
            phases_completed: phase_position(&self.input.final_phase).unwrap_or(0),
            exchanges: self.input.exchange_count,
            duration_seconds,
            growth_count,
            fixed_count,
            dominant_mindset: DominantMindset::from_counts(growth_count, fixed_count),
        }
    }

    /// Counts observed labels. Known labels come in catalog order, anything
    /// else follows alphabetically.
    fn signal_counts(&self) -> Vec<SignalCount> {
        let mut counts: BTreeMap<(usize, String), (MindsetKind, u32)> = BTreeMap::new();

        for indicator in self.input.turns.iter().flat_map(|t| &t.indicators) {
            let rank = LABEL_ORDER
                .iter()
                .position(|label| *label == indicator.label)
                .unwrap_or(LABEL_ORDER.len());
            let entry = counts
                .entry((rank, indicator.label.clone()))
                .or_insert((indicator.kind, 0));
            entry.1 = entry.1.saturating_add(1);
        }

        counts
            .into_iter()
            .map(|((_, label), (kind, count))| SignalCount { label, kind, count })
            .collect()
    }

    fn timeline(&self) -> Vec<TimelineEntry> {
        // (exchange, rank) orders turn, then phase change, then handovers
        let mut keyed: Vec<((u32, u8), TimelineEntry)> = Vec::new();

        for (index, turn) in self.input.turns.iter().enumerate() {
            keyed.push((
                (turn.exchange, 0),
                TimelineEntry {
                    timestamp: turn.recorded_at,
                    exchange: turn.exchange,
                    kind: TimelineKind::Turn,
                    details: describe_turn(turn),
                },
            ));

            let next_phase = self
                .input
                .turns
                .get(index + 1)
                .map_or(self.input.final_phase.as_str(), |next| next.phase.as_str());
            if next_phase != turn.phase {
                keyed.push((
                    (turn.exchange, 1),
                    TimelineEntry {
                        timestamp: turn.recorded_at,
                        exchange: turn.exchange,
                        kind: TimelineKind::PhaseChange,
                        details: format!("{} -> {next_phase}", turn.phase),
                    },
                ));
            }
        }

        for handover in &self.input.handovers {
            keyed.push((
                (handover.exchange, 2),
                TimelineEntry {
                    timestamp: handover.at,
                    exchange: handover.exchange,
                    kind: TimelineKind::PersonaSwitch,
                    details: format!(
                        "{} -> {} during {}",
                        handover.from, handover.to, handover.phase
                    ),
                },
            ));
        }

        keyed.sort_by_key(|(key, _)| *key);
        keyed.into_iter().map(|(_, entry)| entry).collect()
    }

    fn recommendations(
        &self,
        summary: &ReportSummary,
        signals: &[SignalCount],
    ) -> Vec<Recommendation> {
        let mut recommendations: Vec<Recommendation> = signals
            .iter()
            .filter(|signal| signal.kind == MindsetKind::Fixed)
            .filter_map(|signal| coaching_for(&signal.label))
            .collect();

        if summary.exchanges > 0 && summary.growth_count == 0 {
            recommendations.push(Recommendation::new(
                2,
                "Engagement",
                "No growth signals were observed. Invite the learner to ask questions \
                 and reflect on what they found difficult.",
            ));
        }

        if summary.status == LessonStatus::InProgress {
            recommendations.push(Recommendation::new(
                3,
                "Completion",
                format!(
                    "The lesson stopped in {} after {} exchanges. Resume it to reach assessment.",
                    summary.final_phase, summary.exchanges
                ),
            ));
        }

        recommendations.sort_by_key(|r| r.priority);
        recommendations
    }
}

/// Zero-based position of a phase in the lesson order.
fn phase_position(phase: &str) -> Option<u32> {
    PHASE_ORDER
        .iter()
        .position(|p| *p == phase)
        .and_then(|pos| u32::try_from(pos).ok())
}

fn coaching_for(label: &str) -> Option<Recommendation> {
    match label {
        "avoided_challenge" => Some(Recommendation::new(
            1,
            "Challenge",
            "The learner steered away from difficulty. Break the next task into \
             smaller steps and frame struggle as part of learning.",
        )),
        "gave_up_easily" => Some(Recommendation::new(
            1,
            "Persistence",
            "The learner talked about giving up. Revisit a failed attempt together \
             and point out the progress made so far.",
        )),
        "blamed_external" => Some(Recommendation::new(
            2,
            "Ownership",
            "The learner attributed outcomes to outside factors. Ask what they \
             could change in their own approach next time.",
        )),
        _ => None,
    }
}

fn describe_turn(turn: &TurnInput) -> String {
    let excerpt = excerpt(&turn.text, EXCERPT_CHARS);
    if turn.indicators.is_empty() {
        format!("[{}] \"{excerpt}\"", turn.phase)
    } else {
        let labels: Vec<&str> = turn.indicators.iter().map(|i| i.label.as_str()).collect();
        format!("[{}] \"{excerpt}\" ({})", turn.phase, labels.join(", "))
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}

// ============================================================================
// Tests
// ============================================================================
