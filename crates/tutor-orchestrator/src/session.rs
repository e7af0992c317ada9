//! Conversation session and phase state machine.
//!
//! A [`Session`] is the mutable aggregate root of one learner's progress
//! through one lesson unit. It is created by [`Session::start`] and mutated
//! only through [`Session::record_turn`] and [`Session::switch_persona`].
//!
//! The phase advances once every `turns_per_phase` accepted turns (one by
//! default), so eight turns walk `TEACH_1` through to `COMPLETE`. Once
//! `COMPLETE` is reached every mutating call returns
//! [`TutorError::SessionAlreadyComplete`] and leaves the session untouched.
//!
//! # Example
//!
//! ```
//! use tutor_orchestrator::{LessonUnit, Phase, Session};
//!
//! let unit = LessonUnit::new("U-1", "Sales Negotiation");
//! let mut session = Session::start(unit, "explainer").unwrap();
//!
//! let outcome = session.record_turn("How can I improve my opening?").unwrap();
//! assert!(outcome.transitioned());
//! assert_eq!(session.current_phase(), Phase::Teach2);
//! assert_eq!(session.exchange_count(), 1);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classifier::{classify, Indicator, MindsetTally};
use crate::error::{Result, TutorError};
use crate::phase::Phase;
use crate::unit::LessonUnit;

// ============================================================================
// Records
// ============================================================================

/// One accepted learner turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtteranceRecord {
    /// Exchange number of this turn (1-indexed).
    pub exchange: u32,
    /// Phase the turn was taken in.
    pub phase: Phase,
    /// Learner text as received.
    pub text: String,
    /// Indicators detected on this turn.
    pub indicators: Vec<Indicator>,
    /// When the turn was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// A change of active persona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaHandover {
    /// Persona that was speaking.
    pub from: String,
    /// Persona now speaking.
    pub to: String,
    /// Phase at the moment of handover.
    pub phase: Phase,
    /// Exchange count at the moment of handover.
    pub exchange: u32,
    /// When the handover happened.
    pub at: DateTime<Utc>,
}

/// A phase advance caused by a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    /// Phase before the turn.
    pub from: Phase,
    /// Phase after the turn.
    pub to: Phase,
}

impl PhaseTransition {
    /// Returns `true` if this transition ended the lesson.
    #[must_use]
    pub const fn completed_lesson(&self) -> bool {
        self.to.is_terminal()
    }
}

/// Result of an accepted learner turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnOutcome {
    /// Exchange number assigned to the turn.
    pub exchange: u32,
    /// Phase after the turn was applied.
    pub phase: Phase,
    /// Indicators detected on the turn.
    pub indicators: Vec<Indicator>,
    /// The phase advance, if the turn crossed the threshold.
    pub transition: Option<PhaseTransition>,
}

impl TurnOutcome {
    /// Returns `true` if the turn advanced the phase.
    #[must_use]
    pub const fn transitioned(&self) -> bool {
        self.transition.is_some()
    }
}

// ============================================================================
// Session
// ============================================================================

/// Mutable record of one learner's progress through one lesson unit.
///
/// Deserializing checks the snapshot against the session invariants, so a
/// restored session can always take its next turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "SessionSnapshot")]
pub struct Session {
    unit: LessonUnit,
    phase: Phase,
    exchange_count: u32,
    active_persona_key: String,
    utterance_log: Vec<UtteranceRecord>,
    persona_history: Vec<PersonaHandover>,
    #[serde(skip_serializing_if = "Option::is_none")]
    learner_id: Option<String>,
    turns_per_phase: u32,
    phase_entered_at: u32,
    started_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Wire form of a [`Session`], checked before it becomes one.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionSnapshot {
    unit: LessonUnit,
    phase: Phase,
    exchange_count: u32,
    active_persona_key: String,
    utterance_log: Vec<UtteranceRecord>,
    persona_history: Vec<PersonaHandover>,
    #[serde(default)]
    learner_id: Option<String>,
    turns_per_phase: u32,
    phase_entered_at: u32,
    started_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SessionSnapshot> for Session {
    type Error = TutorError;

    fn try_from(snapshot: SessionSnapshot) -> Result<Self> {
        snapshot.unit.validate()?;

        if snapshot.turns_per_phase == 0 {
            return Err(TutorError::invalid_snapshot("turnsPerPhase must be at least 1"));
        }
        if snapshot.phase_entered_at > snapshot.exchange_count {
            return Err(TutorError::invalid_snapshot(format!(
                "phaseEnteredAt ({}) is past exchangeCount ({})",
                snapshot.phase_entered_at, snapshot.exchange_count
            )));
        }
        if snapshot.utterance_log.len() != snapshot.exchange_count as usize {
            return Err(TutorError::invalid_snapshot(format!(
                "utteranceLog has {} entries but exchangeCount is {}",
                snapshot.utterance_log.len(),
                snapshot.exchange_count
            )));
        }

        Ok(Self {
            unit: snapshot.unit,
            phase: snapshot.phase,
            exchange_count: snapshot.exchange_count,
            active_persona_key: snapshot.active_persona_key,
            utterance_log: snapshot.utterance_log,
            persona_history: snapshot.persona_history,
            learner_id: snapshot.learner_id,
            turns_per_phase: snapshot.turns_per_phase,
            phase_entered_at: snapshot.phase_entered_at,
            started_at: snapshot.started_at,
            updated_at: snapshot.updated_at,
        })
    }
}

impl Session {
    /// Starts a session at `TEACH_1` with no exchanges.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::InvalidUnit` if the unit lacks an id or title.
    pub fn start(unit: LessonUnit, initial_persona_key: impl Into<String>) -> Result<Self> {
        unit.validate()?;

        let now = Utc::now();
        let session = Self {
            unit,
            phase: Phase::Teach1,
            exchange_count: 0,
            active_persona_key: initial_persona_key.into(),
            utterance_log: Vec::new(),
            persona_history: Vec::new(),
            learner_id: None,
            turns_per_phase: 1,
            phase_entered_at: 0,
            started_at: now,
            updated_at: now,
        };

        info!(
            unit_id = %session.unit.id,
            persona = %session.active_persona_key,
            "Session started"
        );
        Ok(session)
    }

    /// Attaches a learner identifier used as the telemetry actor.
    #[must_use]
    pub fn with_learner(mut self, learner_id: impl Into<String>) -> Self {
        self.learner_id = Some(learner_id.into());
        self
    }

    /// Sets how many accepted turns each phase consumes (minimum 1).
    #[must_use]
    pub fn with_turns_per_phase(mut self, turns: u32) -> Self {
        self.turns_per_phase = turns.max(1);
        self
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    /// Classifies and records one learner turn.
    ///
    /// Appends the utterance to the log, increments the exchange count, and
    /// advances the phase when the per-phase threshold is reached.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::SessionAlreadyComplete` at `COMPLETE`. The
    /// session is not modified and the utterance is not classified.
    pub fn record_turn(&mut self, utterance: &str) -> Result<TurnOutcome> {
        self.ensure_live()?;

        let indicators = classify(utterance);
        self.exchange_count = self.exchange_count.saturating_add(1);

        debug!(
            exchange = self.exchange_count,
            phase = %self.phase,
            indicators = indicators.len(),
            "Turn classified"
        );

        self.utterance_log.push(UtteranceRecord {
            exchange: self.exchange_count,
            phase: self.phase,
            text: utterance.to_string(),
            indicators: indicators.clone(),
            recorded_at: Utc::now(),
        });

        let transition = self.advance_if_due();
        self.touch();

        Ok(TurnOutcome {
            exchange: self.exchange_count,
            phase: self.phase,
            indicators,
            transition,
        })
    }

    /// Changes the active persona without touching phase or exchange count.
    ///
    /// Returns the handover record, or `None` when `key` is already active
    /// (in which case nothing changes, not even `updated_at`).
    ///
    /// # Errors
    ///
    /// Returns `TutorError::SessionAlreadyComplete` at `COMPLETE`.
    pub fn switch_persona(&mut self, key: impl Into<String>) -> Result<Option<PersonaHandover>> {
        self.ensure_live()?;

        let key = key.into();
        if key == self.active_persona_key {
            debug!(persona = %key, "Persona already active");
            return Ok(None);
        }

        let handover = PersonaHandover {
            from: std::mem::replace(&mut self.active_persona_key, key),
            to: self.active_persona_key.clone(),
            phase: self.phase,
            exchange: self.exchange_count,
            at: Utc::now(),
        };
        self.persona_history.push(handover.clone());
        self.touch();

        info!(
            from = %handover.from,
            to = %handover.to,
            phase = %handover.phase,
            exchange = handover.exchange,
            "Persona switched"
        );
        Ok(Some(handover))
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_complete() {
            return Err(TutorError::session_complete(
                &self.unit.id,
                self.exchange_count,
            ));
        }
        Ok(())
    }

    fn advance_if_due(&mut self) -> Option<PhaseTransition> {
        let turns_in_phase = self.exchange_count.saturating_sub(self.phase_entered_at);
        if turns_in_phase < self.turns_per_phase {
            return None;
        }

        let from = self.phase;
        let to = from.next()?;
        self.phase = to;
        self.phase_entered_at = self.exchange_count;

        info!(from = %from, to = %to, exchange = self.exchange_count, "Phase advanced");
        if to.is_terminal() {
            info!(unit_id = %self.unit.id, exchanges = self.exchange_count, "Session complete");
        }
        Some(PhaseTransition { from, to })
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Current phase.
    #[must_use]
    pub const fn current_phase(&self) -> Phase {
        self.phase
    }

    /// Returns `true` once `COMPLETE` is reached.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Number of accepted learner turns.
    #[must_use]
    pub const fn exchange_count(&self) -> u32 {
        self.exchange_count
    }

    /// Key of the persona currently speaking.
    #[must_use]
    pub fn active_persona_key(&self) -> &str {
        &self.active_persona_key
    }

    /// The lesson unit.
    #[must_use]
    pub const fn unit(&self) -> &LessonUnit {
        &self.unit
    }

    /// Accepted turns in order.
    #[must_use]
    pub fn utterance_log(&self) -> &[UtteranceRecord] {
        &self.utterance_log
    }

    /// Persona handovers in order.
    #[must_use]
    pub fn persona_history(&self) -> &[PersonaHandover] {
        &self.persona_history
    }

    /// Learner identifier, if one was attached.
    #[must_use]
    pub fn learner_id(&self) -> Option<&str> {
        self.learner_id.as_deref()
    }

    /// Turns each phase consumes.
    #[must_use]
    pub const fn turns_per_phase(&self) -> u32 {
        self.turns_per_phase
    }

    /// Indicators of the most recent turn, if any.
    #[must_use]
    pub fn last_indicators(&self) -> &[Indicator] {
        self.utterance_log
            .last()
            .map_or(&[], |record| record.indicators.as_slice())
    }

    /// Aggregated indicator counts over the whole log.
    #[must_use]
    pub fn mindset_tally(&self) -> MindsetTally {
        self.utterance_log
            .iter()
            .map(|record| record.indicators.as_slice())
            .collect()
    }

    /// Fraction of live phases completed, from 0.0 to 1.0.
    #[must_use]
    pub fn progress(&self) -> f64 {
        f64::from(self.phase.ordinal()) / f64::from(Phase::LIVE_PHASES)
    }

    /// When the session started.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// When the session last changed.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Time since the session started.
    #[must_use]
    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }
}

// ============================================================================
// Tests
// ============================================================================
