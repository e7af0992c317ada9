//! Tutor Loop Orchestrator
//!
//! Drives a multi-turn teaching conversation: classifies learner turns for
//! mindset signals, walks the lesson through its fixed phases, tracks the
//! speaking persona, and builds telemetry for an external collector. Also
//! serves lessons over HTTP with a WebSocket event stream.

pub mod api;
pub mod classifier;
pub mod config;
pub mod error;
pub mod lesson;
pub mod persona;
pub mod phase;
pub mod session;
pub mod telemetry;
pub mod unit;
pub mod websocket;

pub use api::{
    create_router, AppState, CreateSessionRequest, CreateSessionResponse, ErrorResponse,
    PersonaRequest, PersonaResponse, TurnRequest, TurnResponse,
};
pub use classifier::{classify, Indicator, IndicatorLabel, MindsetTally, MindsetType};
pub use config::{Config, ServerConfig, TelemetryConfig};
pub use error::{Result, TutorError};
pub use lesson::{Lesson, TurnReport};
pub use persona::{BloomLevel, Persona, PersonaCatalog, COUNCIL_KEY};
pub use phase::{Phase, Stage, Verb};
pub use session::{PersonaHandover, PhaseTransition, Session, TurnOutcome, UtteranceRecord};
pub use telemetry::{EventKind, TelemetryEmitter, TelemetryEvent};
pub use unit::{LessonUnit, MAX_UNIT_SIZE};
pub use websocket::{EventBroadcaster, LessonEvent};
