//! HTTP API endpoints for the tutoring orchestrator.
//!
//! Exposes lesson sessions to a rendering front end. Every accepted request
//! is also broadcast on the WebSocket event stream.
//!
//! # Endpoints
//!
//! - `GET /api/personas` - List the persona catalog
//! - `POST /api/sessions` - Start a lesson session
//! - `GET /api/sessions/:id` - Get a session snapshot
//! - `POST /api/sessions/:id/turns` - Submit a learner turn
//! - `POST /api/sessions/:id/persona` - Switch the active persona
//! - `DELETE /api/sessions/:id` - Abandon a session
//! - `GET /ws` - WebSocket event stream
//!
//! # Example
//!
//! ```no_run
//! use tutor_orchestrator::{create_router, AppState, Config};
//!
//! # async fn example() {
//! let router = create_router(AppState::new(Config::default()));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await.unwrap();
//! axum::serve(listener, router).await.unwrap();
//! # }
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::TutorError;
use crate::lesson::{Lesson, TurnReport};
use crate::persona::PersonaCatalog;
use crate::session::Session;
use crate::telemetry::TelemetryEmitter;
use crate::unit::LessonUnit;
use crate::websocket::{ws_handler, EventBroadcaster, LessonEvent};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for starting a session.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// Unit to teach.
    pub unit: LessonUnit,
    /// Opening persona; the configured default when absent.
    #[serde(default)]
    pub persona_key: Option<String>,
    /// Learner identifier for telemetry.
    #[serde(default)]
    pub learner_id: Option<String>,
}

/// Response body for a started session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    /// Registry id for subsequent requests.
    pub session_id: String,
    /// Initial session snapshot.
    pub session: Session,
}

/// Request body for a learner turn.
#[derive(Debug, Clone, Deserialize)]
pub struct TurnRequest {
    /// Learner text.
    pub utterance: String,
}

/// Response body for a learner turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    /// Session the turn was applied to.
    pub session_id: String,
    /// Turn outcome and telemetry.
    pub turn: TurnReport,
}

/// Request body for a persona switch.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaRequest {
    /// Persona to activate.
    pub persona_key: String,
}

/// Response body for a persona switch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaResponse {
    /// `false` when the persona was already active.
    pub switched: bool,
    /// Session snapshot after the request.
    pub session: Session,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
}

// ============================================================================
// Application State
// ============================================================================

type LessonHandle = Arc<Mutex<Lesson>>;

/// Shared application state for the HTTP server.
///
/// The registry lock is only held to look up, insert, or remove a lesson.
/// Each lesson has its own lock, so turns on different sessions run in
/// parallel while turns on one session stay serialized.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Orchestrator configuration.
    pub config: Config,
    /// Personas sessions may use.
    pub catalog: Arc<PersonaCatalog>,
    /// Telemetry builder shared by all sessions.
    pub emitter: Arc<TelemetryEmitter>,
    /// WebSocket event fan-out.
    pub broadcaster: EventBroadcaster,
    sessions: Arc<Mutex<HashMap<String, LessonHandle>>>,
    next_id: Arc<AtomicU64>,
}

impl AppState {
    /// Creates state with the built-in persona catalog.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_catalog(config, PersonaCatalog::builtin())
    }

    /// Creates state with a custom persona catalog.
    #[must_use]
    pub fn with_catalog(config: Config, catalog: PersonaCatalog) -> Self {
        let emitter = TelemetryEmitter::new(config.telemetry.clone());
        let broadcaster = EventBroadcaster::new(config.server.event_capacity);
        Self {
            config,
            catalog: Arc::new(catalog),
            emitter: Arc::new(emitter),
            broadcaster,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Ids of live sessions, sorted.
    pub async fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    fn next_session_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        format!("lesson-{n}")
    }

    async fn lesson(&self, id: &str) -> Result<LessonHandle, ApiError> {
        self.sessions
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| TutorError::session_not_found(id).into())
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Internal error type for API handlers.
#[derive(Debug)]
enum ApiError {
    /// Input failed validation.
    BadRequest(String),
    /// No such session.
    NotFound(String),
    /// Session cannot accept the request in its current phase.
    Conflict(String),
    /// Anything else.
    Internal(String),
}

impl From<TutorError> for ApiError {
    fn from(err: TutorError) -> Self {
        let message = err.to_string();
        match err {
            TutorError::InvalidUnit { .. } | TutorError::UnknownPersona { .. } => {
                Self::BadRequest(message)
            }
            TutorError::SessionNotFound { .. } => Self::NotFound(message),
            TutorError::SessionAlreadyComplete { .. } => Self::Conflict(message),
            _ => Self::Internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all API endpoints.
///
/// The router has every API route under `/api` plus the `/ws` stream,
/// permissive CORS, and request tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/personas", get(handle_personas))
        .route("/sessions", post(handle_create_session))
        .route(
            "/sessions/:id",
            get(handle_get_session).delete(handle_delete_session),
        )
        .route("/sessions/:id/turns", post(handle_turn))
        .route("/sessions/:id/persona", post(handle_switch_persona));

    Router::new()
        .nest("/api", api_routes)
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for `GET /api/personas`.
async fn handle_personas(State(state): State<Arc<AppState>>) -> Json<PersonaCatalog> {
    Json(state.catalog.as_ref().clone())
}

/// Handler for `POST /api/sessions`.
async fn handle_create_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), ApiError> {
    let persona_key = request
        .persona_key
        .unwrap_or_else(|| state.config.default_persona.clone());

    let mut lesson = Lesson::start(
        request.unit,
        &persona_key,
        Arc::clone(&state.catalog),
        Arc::clone(&state.emitter),
    )
    .map_err(|e| {
        warn!(error = %e, "Rejected session start");
        ApiError::from(e)
    })?
    .with_turns_per_phase(state.config.turns_per_phase);

    if let Some(learner_id) = request.learner_id {
        lesson = lesson.with_learner(learner_id);
    }

    let session_id = state.next_session_id();
    let session = lesson.session().clone();
    state
        .sessions
        .lock()
        .await
        .insert(session_id.clone(), Arc::new(Mutex::new(lesson)));

    info!(
        session_id = %session_id,
        unit_id = %session.unit().id,
        persona = %persona_key,
        "Session created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id,
            session,
        }),
    ))
}

/// Handler for `GET /api/sessions/:id`.
async fn handle_get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    let handle = state.lesson(&id).await?;
    let lesson = handle.lock().await;
    Ok(Json(lesson.session().clone()))
}

/// Handler for `POST /api/sessions/:id/turns`.
async fn handle_turn(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, ApiError> {
    let handle = state.lesson(&id).await?;
    let mut lesson = handle.lock().await;

    let report = match lesson.take_turn(&request.utterance) {
        Ok(report) => report,
        Err(e) => {
            warn!(session_id = %id, error = %e, "Turn rejected");
            state
                .broadcaster
                .send(LessonEvent::session_error(&id, e.to_string()));
            return Err(e.into());
        }
    };

    // Broadcast before releasing the lesson so events leave in turn order.
    state
        .broadcaster
        .send(LessonEvent::turn_processed(&id, &report));
    for event in &report.events {
        state
            .broadcaster
            .send(LessonEvent::telemetry(&id, event.clone()));
    }
    if report.complete && report.transitioned {
        state
            .broadcaster
            .send(LessonEvent::lesson_complete(&id, report.exchange));
    }
    drop(lesson);

    Ok(Json(TurnResponse {
        session_id: id,
        turn: report,
    }))
}

/// Handler for `POST /api/sessions/:id/persona`.
async fn handle_switch_persona(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<PersonaRequest>,
) -> Result<Json<PersonaResponse>, ApiError> {
    let handle = state.lesson(&id).await?;
    let mut lesson = handle.lock().await;

    let telemetry = lesson.switch_persona(&request.persona_key).map_err(|e| {
        warn!(session_id = %id, error = %e, "Persona switch rejected");
        state
            .broadcaster
            .send(LessonEvent::session_error(&id, e.to_string()));
        ApiError::from(e)
    })?;
    let session = lesson.session().clone();

    let switched = telemetry.is_some();
    if let Some(event) = telemetry {
        if let Some(handover) = session.persona_history().last() {
            state
                .broadcaster
                .send(LessonEvent::persona_switched(&id, handover));
        }
        state.broadcaster.send(LessonEvent::telemetry(&id, event));
    }
    drop(lesson);

    Ok(Json(PersonaResponse { switched, session }))
}

/// Handler for `DELETE /api/sessions/:id`.
async fn handle_delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .sessions
        .lock()
        .await
        .remove(&id)
        .ok_or_else(|| ApiError::from(TutorError::session_not_found(&id)))?;

    info!(session_id = %id, "Session abandoned");
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    use super::*;
    use crate::phase::Phase;

    fn test_state() -> AppState {
        AppState::new(Config::default())
    }

    /// Sends one request and returns the status and parsed JSON body.
    async fn send(
        router: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create_session(router: &Router) -> String {
        let (status, body) = send(
            router,
            Method::POST,
            "/api/sessions",
            Some(json!({ "unit": { "id": "U-101", "title": "Sales Negotiation" } })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["sessionId"].as_str().unwrap().to_string()
    }

    // ------------------------------------------------------------------------
    // Persona endpoint tests
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_get_personas_returns_catalog() {
        let router = create_router(test_state());

        let (status, body) = send(&router, Method::GET, "/api/personas", None).await;
        assert_eq!(status, StatusCode::OK);

        let catalog: PersonaCatalog = serde_json::from_value(body).unwrap();
        assert_eq!(catalog.len(), 13);
        assert!(catalog.contains("council"));
    }

    #[tokio::test]
    async fn test_custom_catalog_is_served_and_enforced() {
        let catalog = PersonaCatalog::from_json(
            r#"[{"key":"mentor","displayName":"The Mentor","subtitle":"Walks alongside","bloomLevel":"apply","colourToken":"teal-500"}]"#,
        )
        .unwrap();
        let config = Config {
            default_persona: "mentor".to_string(),
            ..Config::default()
        };
        let router = create_router(AppState::with_catalog(config, catalog));

        let (_, body) = send(&router, Method::GET, "/api/personas", None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["key"], "mentor");

        let (status, body) = send(
            &router,
            Method::POST,
            "/api/sessions",
            Some(json!({ "unit": { "id": "U-1", "title": "T" } })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["session"]["activePersonaKey"], "mentor");

        let (status, _) = send(
            &router,
            Method::POST,
            "/api/sessions",
            Some(json!({ "unit": { "id": "U-1", "title": "T" }, "personaKey": "explainer" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    // ------------------------------------------------------------------------
    // Session lifecycle tests
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_create_session_returns_201() {
        let state = test_state();
        let router = create_router(state.clone());

        let (status, body) = send(
            &router,
            Method::POST,
            "/api/sessions",
            Some(json!({
                "unit": { "id": "U-1", "title": "Handling Objections" },
                "personaKey": "coach",
                "learnerId": "learner-1"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["sessionId"], "lesson-1");
        assert_eq!(body["session"]["phase"], "TEACH_1");
        assert_eq!(body["session"]["activePersonaKey"], "coach");
        assert_eq!(body["session"]["exchangeCount"], 0);
        assert_eq!(state.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_create_session_invalid_unit_returns_400() {
        let router = create_router(test_state());

        let (status, body) = send(
            &router,
            Method::POST,
            "/api/sessions",
            Some(json!({ "unit": { "id": "U-1" } })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("title"));
    }

    #[tokio::test]
    async fn test_create_session_unknown_persona_returns_400() {
        let router = create_router(test_state());

        let (status, body) = send(
            &router,
            Method::POST,
            "/api/sessions",
            Some(json!({ "unit": { "id": "U-1", "title": "T" }, "personaKey": "wizard" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("wizard"));
    }

    #[tokio::test]
    async fn test_get_session_returns_snapshot() {
        let router = create_router(test_state());
        let id = create_session(&router).await;

        let (status, body) = send(&router, Method::GET, &format!("/api/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);

        let session: Session = serde_json::from_value(body).unwrap();
        assert_eq!(session.current_phase(), Phase::Teach1);
        assert_eq!(session.unit().title, "Sales Negotiation");
    }

    #[tokio::test]
    async fn test_get_unknown_session_returns_404() {
        let router = create_router(test_state());
        let (status, body) = send(&router, Method::GET, "/api/sessions/lesson-99", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("lesson-99"));
    }

    #[tokio::test]
    async fn test_delete_session_returns_204() {
        let state = test_state();
        let router = create_router(state.clone());
        let id = create_session(&router).await;

        let uri = format!("/api/sessions/{id}");
        let (status, _) = send(&router, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(state.session_count().await, 0);

        let (status, _) = send(&router, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&router, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    // ------------------------------------------------------------------------
    // Turn endpoint tests
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_turn_advances_phase() {
        let router = create_router(test_state());
        let id = create_session(&router).await;

        let (status, body) = send(
            &router,
            Method::POST,
            &format!("/api/sessions/{id}/turns"),
            Some(json!({ "utterance": "How can I improve my opening offer?" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let response: TurnResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.session_id, id);
        assert_eq!(response.turn.phase, Phase::Teach2);
        assert!(response.turn.transitioned);
        assert_eq!(response.turn.indicators.len(), 1);
        assert_eq!(response.turn.events.len(), 1);
    }

    #[tokio::test]
    async fn test_turn_after_complete_returns_409() {
        let router = create_router(test_state());
        let id = create_session(&router).await;
        let uri = format!("/api/sessions/{id}/turns");

        for _ in 0..8 {
            let (status, _) = send(
                &router,
                Method::POST,
                &uri,
                Some(json!({ "utterance": "answer" })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, body) = send(
            &router,
            Method::POST,
            &uri,
            Some(json!({ "utterance": "more" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("complete"));

        let (_, session) = send(&router, Method::GET, &format!("/api/sessions/{id}"), None).await;
        assert_eq!(session["exchangeCount"], 8);
        assert_eq!(session["phase"], "COMPLETE");
    }

    #[tokio::test]
    async fn test_turn_unknown_session_returns_404() {
        let router = create_router(test_state());
        let (status, _) = send(
            &router,
            Method::POST,
            "/api/sessions/nope/turns",
            Some(json!({ "utterance": "hi" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_turn_invalid_json_returns_400() {
        let router = create_router(test_state());
        let id = create_session(&router).await;

        let response = router
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri(format!("/api/sessions/{id}/turns"))
                    .header("content-type", "application/json")
                    .body(Body::from("{ invalid json }"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_turn_broadcasts_events() {
        let state = test_state();
        let mut receiver = state.broadcaster.subscribe();
        let router = create_router(state);
        let id = create_session(&router).await;

        send(
            &router,
            Method::POST,
            &format!("/api/sessions/{id}/turns"),
            Some(json!({ "utterance": "I give up" })),
        )
        .await;

        let first = receiver.recv().await.unwrap();
        assert_eq!(first.event_name(), "turn_processed");
        let second = receiver.recv().await.unwrap();
        assert_eq!(second.event_name(), "telemetry");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_turns_stay_ordered_per_session() {
        let state = test_state();
        let mut receiver = state.broadcaster.subscribe();
        let router = create_router(state);
        let first = create_session(&router).await;
        let second = create_session(&router).await;

        let mut tasks = Vec::new();
        for i in 0..6 {
            for id in [&first, &second] {
                let router = router.clone();
                let uri = format!("/api/sessions/{id}/turns");
                let body = json!({ "utterance": format!("answer {i}") });
                tasks.push(tokio::spawn(async move {
                    send(&router, Method::POST, &uri, Some(body)).await.0
                }));
            }
        }
        for status in futures::future::join_all(tasks).await {
            assert_eq!(status.unwrap(), StatusCode::OK);
        }

        for id in [&first, &second] {
            let (_, session) = send(
                &router,
                Method::GET,
                &format!("/api/sessions/{id}"),
                None,
            )
            .await;
            assert_eq!(session["exchangeCount"], 6);
            assert_eq!(session["phase"], "ASSESS_1");
        }

        let mut exchanges: HashMap<String, Vec<u32>> = HashMap::new();
        let mut sequences: HashMap<String, Vec<u64>> = HashMap::new();
        while let Ok(event) = receiver.try_recv() {
            match event {
                LessonEvent::TurnProcessed(payload) => exchanges
                    .entry(payload.session_id)
                    .or_default()
                    .push(payload.exchange_count),
                LessonEvent::Telemetry(payload) => sequences
                    .entry(payload.session_id)
                    .or_default()
                    .push(payload.event.sequence),
                _ => {}
            }
        }

        for id in [&first, &second] {
            assert_eq!(exchanges[id], vec![1, 2, 3, 4, 5, 6]);
            assert_eq!(sequences[id].len(), 6);
            assert!(sequences[id].windows(2).all(|pair| pair[0] < pair[1]));
        }
    }

    #[tokio::test]
    async fn test_rejected_turn_broadcasts_session_error() {
        let state = test_state();
        let router = create_router(state.clone());
        let id = create_session(&router).await;
        let uri = format!("/api/sessions/{id}/turns");
        for _ in 0..8 {
            send(&router, Method::POST, &uri, Some(json!({ "utterance": "ok" }))).await;
        }

        let mut receiver = state.broadcaster.subscribe();
        let (status, _) = send(
            &router,
            Method::POST,
            &uri,
            Some(json!({ "utterance": "more" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let event = receiver.recv().await.unwrap();
        assert!(
            matches!(
                &event,
                LessonEvent::Error(payload)
                    if payload.session_id.as_deref() == Some(id.as_str())
                        && payload.message.contains("already complete")
            ),
            "Expected session error, got: {event:?}"
        );
    }

    // ------------------------------------------------------------------------
    // Persona switch endpoint tests
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_switch_persona_success_and_noop() {
        let router = create_router(test_state());
        let id = create_session(&router).await;
        let uri = format!("/api/sessions/{id}/persona");

        let (status, body) = send(
            &router,
            Method::POST,
            &uri,
            Some(json!({ "personaKey": "coach" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["switched"], true);
        assert_eq!(body["session"]["activePersonaKey"], "coach");

        let (status, body) = send(
            &router,
            Method::POST,
            &uri,
            Some(json!({ "personaKey": "coach" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["switched"], false);
        assert_eq!(body["session"]["personaHistory"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_switch_persona_unknown_returns_400() {
        let router = create_router(test_state());
        let id = create_session(&router).await;

        let (status, _) = send(
            &router,
            Method::POST,
            &format!("/api/sessions/{id}/persona"),
            Some(json!({ "personaKey": "ghost" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_switch_persona_after_complete_returns_409() {
        let router = create_router(test_state());
        let id = create_session(&router).await;
        for _ in 0..8 {
            send(
                &router,
                Method::POST,
                &format!("/api/sessions/{id}/turns"),
                Some(json!({ "utterance": "ok" })),
            )
            .await;
        }

        let (status, _) = send(
            &router,
            Method::POST,
            &format!("/api/sessions/{id}/persona"),
            Some(json!({ "personaKey": "coach" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    // ------------------------------------------------------------------------
    // Router configuration tests
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_cors_headers_present() {
        let router = create_router(test_state());

        let response = router
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/personas")
                    .header("origin", "http://localhost:5173")
                    .header("access-control-request-method", "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.status().is_success() || response.status() == StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_unknown_route_returns_404() {
        let router = create_router(test_state());
        let (status, _) = send(&router, Method::GET, "/api/unknown", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    // ------------------------------------------------------------------------
    // State and serialization tests
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_session_ids_are_sequential() {
        let state = test_state();
        let router = create_router(state.clone());
        create_session(&router).await;
        create_session(&router).await;

        assert_eq!(state.session_ids().await, vec!["lesson-1", "lesson-2"]);
    }

    #[test]
    fn test_api_error_mapping() {
        assert!(matches!(
            ApiError::from(TutorError::unknown_persona("x")),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            ApiError::from(TutorError::session_complete("U-1", 8)),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from(TutorError::session_not_found("s")),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from(TutorError::config_validation("m", "s")),
            ApiError::Internal(_)
        ));
    }

    #[test]
    fn test_create_session_request_defaults() {
        let request: CreateSessionRequest =
            serde_json::from_str(r#"{"unit": {"id": "U", "title": "T"}}"#).unwrap();
        assert!(request.persona_key.is_none());
        assert!(request.learner_id.is_none());
    }

    #[test]
    fn test_error_response_serialization() {
        let response = ErrorResponse {
            error: "Something went wrong".to_string(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains(r#""error":"Something went wrong""#));
    }
}
