//! Telemetry event construction.
//!
//! The [`TelemetryEmitter`] turns a read-only view of a [`Session`] into an
//! immutable [`TelemetryEvent`] ready for an external collector. Building an
//! event never touches the session and performs no I/O. The only state the
//! emitter owns is a sequence counter, which is atomic so one emitter can
//! serve many sessions concurrently.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::TelemetryConfig;
use crate::phase::Phase;
use crate::session::Session;

// ============================================================================
// Event types
// ============================================================================

/// What kind of transition an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    /// The session moved to its next phase.
    PhaseAdvance,
    /// The active persona changed.
    PersonaSwitch,
    /// The session reached `COMPLETE`.
    LessonComplete,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PhaseAdvance => "phase-advance",
            Self::PersonaSwitch => "persona-switch",
            Self::LessonComplete => "lesson-complete",
        };
        f.write_str(s)
    }
}

/// Who the statement is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Stable learner identifier.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerbRef {
    /// Full verb URI.
    pub id: String,
    /// Short verb label.
    pub display: String,
}

/// What it happened to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Deterministic object URI derived from the unit title.
    pub id: String,
    /// Unit title as supplied.
    pub name: String,
}

/// Immutable record of a notable session transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEvent {
    /// Position in the emitter's output, strictly increasing.
    pub sequence: u64,
    /// Transition described.
    pub kind: EventKind,
    /// Learner.
    pub actor: Actor,
    /// Verb of the phase the session was in at build time.
    pub verb: VerbRef,
    /// Lesson unit.
    pub object: ObjectRef,
    /// Capture time.
    pub timestamp: DateTime<Utc>,
    /// Kind-specific context.
    pub context_extensions: Map<String, Value>,
}

impl TelemetryEvent {
    /// Full verb URI.
    #[must_use]
    pub fn verb_id(&self) -> &str {
        &self.verb.id
    }

    /// Full object URI.
    #[must_use]
    pub fn object_id(&self) -> &str {
        &self.object.id
    }

    /// Looks up a context extension by key.
    #[must_use]
    pub fn extension(&self, key: &str) -> Option<&Value> {
        self.context_extensions.get(key)
    }
}

// ============================================================================
// Emitter
// ============================================================================

/// Builds telemetry events from session snapshots.
#[derive(Debug)]
pub struct TelemetryEmitter {
    config: TelemetryConfig,
    sequence: AtomicU64,
}

impl Default for TelemetryEmitter {
    fn default() -> Self {
        Self::new(TelemetryConfig::default())
    }
}

impl TelemetryEmitter {
    /// Creates an emitter with a fresh sequence counter.
    #[must_use]
    pub const fn new(config: TelemetryConfig) -> Self {
        Self {
            config,
            sequence: AtomicU64::new(0),
        }
    }

    /// Identifier configuration in use.
    #[must_use]
    pub const fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// Number of events built so far.
    #[must_use]
    pub fn emitted(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }

    /// Builds an event of `kind` describing the session's latest transition.
    ///
    /// `extra` entries are copied into the context extensions first; the
    /// kind-specific keys are written afterwards and win on collision.
    ///
    /// Phase-advance events describe the most recent turn in the log.
    /// Persona-switch events describe the most recent handover.
    #[must_use]
    pub fn build_transition_event(
        &self,
        session: &Session,
        kind: EventKind,
        extra: Map<String, Value>,
    ) -> TelemetryEvent {
        let mut context_extensions = extra;
        match kind {
            EventKind::PhaseAdvance => {
                self.phase_advance_extensions(session, &mut context_extensions);
            }
            EventKind::PersonaSwitch => {
                Self::persona_switch_extensions(session, &mut context_extensions);
            }
            EventKind::LessonComplete => {
                Self::lesson_complete_extensions(session, &mut context_extensions);
            }
        }

        let phase = session.current_phase();
        let verb = phase.verb();
        let unit = session.unit();
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;

        tracing::debug!(sequence, kind = %kind, verb = %verb, "Telemetry event built");

        TelemetryEvent {
            sequence,
            kind,
            actor: Actor {
                id: session
                    .learner_id()
                    .unwrap_or(&self.config.actor_id)
                    .to_string(),
                name: self.config.actor_name.clone(),
            },
            verb: VerbRef {
                id: join_uri(&self.config.verb_base_uri, verb.label()),
                display: verb.label().to_string(),
            },
            object: ObjectRef {
                id: join_uri(&self.config.object_base_uri, &unit.object_slug()),
                name: unit.title.clone(),
            },
            timestamp: Utc::now(),
            context_extensions,
        }
    }

    /// Phase-advance event with no extra context.
    #[must_use]
    pub fn phase_advance(&self, session: &Session) -> TelemetryEvent {
        self.build_transition_event(session, EventKind::PhaseAdvance, Map::new())
    }

    /// Persona-switch event with no extra context.
    #[must_use]
    pub fn persona_switch(&self, session: &Session) -> TelemetryEvent {
        self.build_transition_event(session, EventKind::PersonaSwitch, Map::new())
    }

    /// Lesson-complete event with no extra context.
    #[must_use]
    pub fn lesson_complete(&self, session: &Session) -> TelemetryEvent {
        self.build_transition_event(session, EventKind::LessonComplete, Map::new())
    }

    fn phase_advance_extensions(&self, session: &Session, ext: &mut Map<String, Value>) {
        let last = session.utterance_log().last();

        ext.insert("indicators".into(), json!(session.last_indicators()));
        ext.insert("newPhase".into(), json!(session.current_phase()));
        ext.insert(
            "previousPhase".into(),
            last.map_or(Value::Null, |record| json!(record.phase)),
        );
        ext.insert("exchangeCount".into(), json!(session.exchange_count()));

        if self.config.include_utterances {
            if let Some(record) = last {
                ext.insert("utterance".into(), Value::String(record.text.clone()));
            }
        }
    }

    fn persona_switch_extensions(session: &Session, ext: &mut Map<String, Value>) {
        let previous = session
            .persona_history()
            .last()
            .map_or(Value::Null, |handover| Value::String(handover.from.clone()));

        ext.insert("previousPersona".into(), previous);
        ext.insert(
            "newPersona".into(),
            Value::String(session.active_persona_key().to_string()),
        );
        ext.insert("phase".into(), json!(session.current_phase()));
        ext.insert("exchangeCount".into(), json!(session.exchange_count()));
    }

    fn lesson_complete_extensions(session: &Session, ext: &mut Map<String, Value>) {
        let tally = session.mindset_tally();
        ext.insert("exchangeCount".into(), json!(session.exchange_count()));
        ext.insert("growthCount".into(), json!(tally.growth));
        ext.insert("fixedCount".into(), json!(tally.fixed));
    }
}

/// Joins a base URI and a path segment with exactly one separator.
fn join_uri(base: &str, segment: &str) -> String {
    if base.ends_with(['/', '#', ':']) {
        format!("{base}{segment}")
    } else {
        format!("{base}/{segment}")
    }
}

/// Returns the verb URI for a phase under the given configuration.
#[must_use]
pub fn verb_uri(config: &TelemetryConfig, phase: Phase) -> String {
    join_uri(&config.verb_base_uri, phase.verb().label())
}

// ============================================================================
// Tests
// ============================================================================
