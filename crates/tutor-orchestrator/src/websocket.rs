//! WebSocket event types and broadcasting for live lesson observation.
//!
//! Renderers and telemetry collectors subscribe to `/ws` and receive every
//! lesson event as a JSON text frame shaped `{"event": ..., "payload": ...}`.
//!
//! # Event Types
//!
//! - `connected` - Sent when a client connects, lists live sessions
//! - `turn_processed` - A learner turn was classified and applied
//! - `persona_switched` - The active persona changed
//! - `telemetry` - A telemetry event was built
//! - `lesson_complete` - A session reached `COMPLETE`
//! - `error` - A request against a session failed
//!
//! # Example
//!
//! ```no_run
//! use tutor_orchestrator::websocket::{EventBroadcaster, LessonEvent};
//!
//! # async fn example() {
//! let broadcaster = EventBroadcaster::new(100);
//! let mut receiver = broadcaster.subscribe();
//!
//! broadcaster.send(LessonEvent::error("lesson-1 not found"));
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("Received: {}", event.event_name());
//! }
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::api::AppState;
use crate::classifier::Indicator;
use crate::lesson::TurnReport;
use crate::phase::Phase;
use crate::session::PersonaHandover;
use crate::telemetry::TelemetryEvent;

// ============================================================================
// Event Payloads
// ============================================================================

/// Payload for the `connected` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedPayload {
    /// Ids of sessions live at connection time.
    pub session_ids: Vec<String>,
    /// Server time at connection.
    pub timestamp: DateTime<Utc>,
}

/// Payload for the `turn_processed` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnProcessedPayload {
    /// Session the turn belongs to.
    pub session_id: String,
    /// Phase after the turn.
    pub phase: Phase,
    /// Persona now speaking.
    pub active_persona: String,
    /// Indicators detected on the turn.
    pub indicators: Vec<Indicator>,
    /// Whether the turn advanced the phase.
    pub transitioned: bool,
    /// Exchange count after the turn.
    pub exchange_count: u32,
}

/// Payload for the `persona_switched` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaSwitchedPayload {
    /// Session that switched.
    pub session_id: String,
    /// Previous persona key.
    pub from: String,
    /// New persona key.
    pub to: String,
    /// Phase at the handover.
    pub phase: Phase,
    /// Exchange count at the handover.
    pub exchange_count: u32,
}

/// Payload for the `telemetry` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryPayload {
    /// Session the event describes.
    pub session_id: String,
    /// The telemetry record.
    pub event: TelemetryEvent,
}

/// Payload for the `lesson_complete` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonCompletePayload {
    /// Session that completed.
    pub session_id: String,
    /// Total accepted turns.
    pub exchange_count: u32,
}

/// Payload for the `error` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    /// Session the failed request targeted, when there was one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Human-readable error message.
    pub message: String,
}

// ============================================================================
// Event Enum
// ============================================================================

/// Lesson events streamed to WebSocket clients.
///
/// All events are serialized as JSON objects with "event" and "payload" fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum LessonEvent {
    /// Sent when a client connects.
    Connected(ConnectedPayload),
    /// Sent after each accepted turn.
    TurnProcessed(TurnProcessedPayload),
    /// Sent after a persona change.
    PersonaSwitched(PersonaSwitchedPayload),
    /// Sent for each telemetry record built.
    Telemetry(TelemetryPayload),
    /// Sent when a session completes.
    LessonComplete(LessonCompletePayload),
    /// Sent when a request fails.
    Error(ErrorPayload),
}

impl LessonEvent {
    /// Creates a `Connected` event.
    #[must_use]
    pub fn connected(session_ids: Vec<String>) -> Self {
        Self::Connected(ConnectedPayload {
            session_ids,
            timestamp: Utc::now(),
        })
    }

    /// Creates a `TurnProcessed` event from a turn report.
    #[must_use]
    pub fn turn_processed(session_id: impl Into<String>, report: &TurnReport) -> Self {
        Self::TurnProcessed(TurnProcessedPayload {
            session_id: session_id.into(),
            phase: report.phase,
            active_persona: report.active_persona.clone(),
            indicators: report.indicators.clone(),
            transitioned: report.transitioned,
            exchange_count: report.exchange,
        })
    }

    /// Creates a `PersonaSwitched` event from a handover record.
    #[must_use]
    pub fn persona_switched(session_id: impl Into<String>, handover: &PersonaHandover) -> Self {
        Self::PersonaSwitched(PersonaSwitchedPayload {
            session_id: session_id.into(),
            from: handover.from.clone(),
            to: handover.to.clone(),
            phase: handover.phase,
            exchange_count: handover.exchange,
        })
    }

    /// Creates a `Telemetry` event.
    #[must_use]
    pub fn telemetry(session_id: impl Into<String>, event: TelemetryEvent) -> Self {
        Self::Telemetry(TelemetryPayload {
            session_id: session_id.into(),
            event,
        })
    }

    /// Creates a `LessonComplete` event.
    #[must_use]
    pub fn lesson_complete(session_id: impl Into<String>, exchange_count: u32) -> Self {
        Self::LessonComplete(LessonCompletePayload {
            session_id: session_id.into(),
            exchange_count,
        })
    }

    /// Creates an `Error` event not tied to a session.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            session_id: None,
            message: message.into(),
        })
    }

    /// Creates an `Error` event for a request against `session_id`.
    #[must_use]
    pub fn session_error(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            session_id: Some(session_id.into()),
            message: message.into(),
        })
    }

    /// Returns the event name as a string.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::TurnProcessed(_) => "turn_processed",
            Self::PersonaSwitched(_) => "persona_switched",
            Self::Telemetry(_) => "telemetry",
            Self::LessonComplete(_) => "lesson_complete",
            Self::Error(_) => "error",
        }
    }
}

// ============================================================================
// Event Broadcaster
// ============================================================================

/// Broadcasts lesson events to all connected WebSocket clients.
///
/// Events are not persisted for disconnected clients.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<LessonEvent>,
}

impl EventBroadcaster {
    /// Creates a broadcaster buffering `capacity` events per subscriber.
    ///
    /// A zero capacity is raised to 1.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Creates a new subscriber.
    ///
    /// A subscriber that falls behind receives `Lagged` and misses events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LessonEvent> {
        self.sender.subscribe()
    }

    /// Broadcasts an event, returning how many subscribers will see it.
    pub fn send(&self, event: LessonEvent) -> usize {
        // Err only means nobody is listening.
        self.sender.send(event).unwrap_or(0)
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

// ============================================================================
// WebSocket Handler
// ============================================================================

/// Heartbeat period.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Maximum number of missed pong responses before disconnecting.
const MAX_MISSED_PONGS: u8 = 3;

/// WebSocket upgrade handler for `GET /ws`.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    info!("New WebSocket connection request");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handles a single WebSocket connection.
///
/// - Sends `connected` with the live session ids immediately
/// - Forwards all broadcast events to the client
/// - Sends heartbeat pings every 30 seconds
/// - Closes connection after 3 missed pongs
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before snapshotting so no event between the two is lost.
    let mut event_receiver = state.broadcaster.subscribe();

    let connected_event = LessonEvent::connected(state.session_ids().await);
    let connected_json = match serde_json::to_string(&connected_event) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "Failed to serialize connected event");
            return;
        }
    };

    if sender.send(Message::Text(connected_json)).await.is_err() {
        debug!("Client disconnected before receiving connected event");
        return;
    }

    info!("WebSocket client connected");

    let mut heartbeat = interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;
    let mut missed_pongs = 0u8;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        missed_pongs = 0;
                        debug!("Received pong from client");
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client requested close");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            debug!("Failed to send pong, client disconnected");
                            break;
                        }
                    }
                    Some(Ok(Message::Text(_) | Message::Binary(_))) => {
                        debug!("Ignoring data frame from client");
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "WebSocket error");
                        break;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }
                }
            }

            event = event_receiver.recv() => {
                match event {
                    Ok(lesson_event) => {
                        let json = match serde_json::to_string(&lesson_event) {
                            Ok(j) => j,
                            Err(e) => {
                                warn!(error = %e, "Failed to serialize event");
                                continue;
                            }
                        };

                        if sender.send(Message::Text(json)).await.is_err() {
                            debug!("Failed to send event, client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(missed = n, "Client lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Broadcaster closed");
                        break;
                    }
                }
            }

            _ = heartbeat.tick() => {
                if sender.send(Message::Ping(vec![])).await.is_err() {
                    debug!("Failed to send ping, client disconnected");
                    break;
                }
                missed_pongs += 1;
                if missed_pongs >= MAX_MISSED_PONGS {
                    info!(missed = MAX_MISSED_PONGS, "Client missed pongs, closing connection");
                    break;
                }
            }
        }
    }

    info!("WebSocket client disconnected");
}

// ============================================================================
// Tests
// ============================================================================
