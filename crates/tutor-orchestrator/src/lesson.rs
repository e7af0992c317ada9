//! Lesson driver.
//!
//! [`Lesson`] ties a [`Session`] to a persona catalog and a shared
//! [`TelemetryEmitter`]. Each call runs the whole pipeline for one input
//! (classify, mutate, build events) and hands the events back to the caller,
//! who owns delivery.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::classifier::Indicator;
use crate::error::Result;
use crate::persona::{Persona, PersonaCatalog};
use crate::phase::Phase;
use crate::session::Session;
use crate::telemetry::{TelemetryEmitter, TelemetryEvent};
use crate::unit::LessonUnit;

/// What a renderer needs after a learner turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnReport {
    /// Exchange number of the turn.
    pub exchange: u32,
    /// Phase after the turn.
    pub phase: Phase,
    /// Persona now speaking.
    pub active_persona: String,
    /// Catalog default for the new phase, as a hint for renderers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_persona: Option<String>,
    /// Indicators detected on the turn.
    pub indicators: Vec<Indicator>,
    /// Whether the turn advanced the phase.
    pub transitioned: bool,
    /// Whether the lesson is now complete.
    pub complete: bool,
    /// Telemetry raised by the turn, in build order.
    pub events: Vec<TelemetryEvent>,
}

/// A running lesson.
#[derive(Debug, Clone)]
pub struct Lesson {
    session: Session,
    catalog: Arc<PersonaCatalog>,
    emitter: Arc<TelemetryEmitter>,
}

impl Lesson {
    /// Starts a lesson with a validated unit and persona.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::InvalidUnit` for a unit without id or title, and
    /// `TutorError::UnknownPersona` if `persona_key` is not in the catalog.
    pub fn start(
        unit: LessonUnit,
        persona_key: &str,
        catalog: Arc<PersonaCatalog>,
        emitter: Arc<TelemetryEmitter>,
    ) -> Result<Self> {
        unit.validate()?;
        catalog.require(persona_key)?;
        let session = Session::start(unit, persona_key)?;

        Ok(Self {
            session,
            catalog,
            emitter,
        })
    }

    /// Attaches a learner id to the underlying session.
    #[must_use]
    pub fn with_learner(mut self, learner_id: impl Into<String>) -> Self {
        self.session = self.session.with_learner(learner_id);
        self
    }

    /// Sets the per-phase turn threshold on the underlying session.
    #[must_use]
    pub fn with_turns_per_phase(mut self, turns: u32) -> Self {
        self.session = self.session.with_turns_per_phase(turns);
        self
    }

    /// Processes one learner turn.
    ///
    /// Emits a phase-advance event when the phase moves, followed by a
    /// lesson-complete event when that move reaches `COMPLETE`.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::SessionAlreadyComplete` once the lesson is over.
    pub fn take_turn(&mut self, utterance: &str) -> Result<TurnReport> {
        let outcome = self.session.record_turn(utterance)?;

        let mut events = Vec::new();
        if let Some(transition) = outcome.transition {
            events.push(self.emitter.phase_advance(&self.session));
            if transition.completed_lesson() {
                events.push(self.emitter.lesson_complete(&self.session));
            }
        }

        Ok(TurnReport {
            exchange: outcome.exchange,
            phase: outcome.phase,
            active_persona: self.session.active_persona_key().to_string(),
            suggested_persona: self
                .catalog
                .suggested_for(outcome.phase)
                .map(|persona| persona.key.clone()),
            indicators: outcome.indicators,
            transitioned: outcome.transition.is_some(),
            complete: self.session.is_complete(),
            events,
        })
    }

    /// Switches the active persona.
    ///
    /// Returns one persona-switch event when the persona changed, or `None`
    /// when `key` was already active.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::UnknownPersona` for a key outside the catalog and
    /// `TutorError::SessionAlreadyComplete` once the lesson is over.
    pub fn switch_persona(&mut self, key: &str) -> Result<Option<TelemetryEvent>> {
        self.catalog.require(key)?;
        let handover = self.session.switch_persona(key)?;
        Ok(handover.map(|_| self.emitter.persona_switch(&self.session)))
    }

    /// The underlying session.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Catalog entry of the persona currently speaking.
    #[must_use]
    pub fn active_persona(&self) -> Option<&Persona> {
        self.catalog.get(self.session.active_persona_key())
    }

    /// The persona catalog in use.
    #[must_use]
    pub fn catalog(&self) -> &PersonaCatalog {
        &self.catalog
    }

    /// Returns `true` once the lesson is complete.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.session.is_complete()
    }
}
