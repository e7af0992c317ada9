//! Error types for the Tutor Loop orchestrator.
//!
//! This module defines the error hierarchy for orchestrator operations,
//! including configuration loading, lesson unit validation, session
//! lifecycle, and persona selection.
//!
//! Classification has no error variant: the classifier degrades to
//! "no indicators" instead of failing.

use std::path::PathBuf;

/// A specialized `Result` type for Tutor orchestrator operations.
pub type Result<T> = std::result::Result<T, TutorError>;

/// Errors that can occur while running a lesson.
///
/// Error variants are organized by subsystem and include actionable suggestions
/// where possible to help callers resolve issues.
#[derive(Debug, thiserror::Error)]
pub enum TutorError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your tutor.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Lesson Unit Errors
    // ========================================================================
    /// The unit descriptor is missing a required field.
    #[error("Invalid lesson unit: {field} is missing or blank\n\nSuggestion: {suggestion}")]
    InvalidUnit {
        /// The offending field (`id` or `title`).
        field: &'static str,
        /// Actionable suggestion for the caller.
        suggestion: String,
    },

    /// Unit descriptor file was not found.
    #[error("Lesson unit not found: '{path}'\n\nSuggestion: Check the 'unit' field in tutor.json or pass --unit")]
    UnitNotFound {
        /// Path where the unit descriptor was expected.
        path: PathBuf,
    },

    /// Unit descriptor file is not valid JSON or has the wrong shape.
    #[error("Invalid lesson unit file '{path}': {message}\n\nSuggestion: The unit must be a JSON object with at least 'id' and 'title'")]
    UnitParseError {
        /// Path to the unit descriptor.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Unit descriptor exceeds the 64KB size limit.
    #[error("Lesson unit exceeds size limit (64KB): '{path}' is {size_kb}KB\n\nSuggestion: Unit descriptors hold metadata only; move content elsewhere")]
    UnitTooLarge {
        /// Path to the oversized descriptor.
        path: PathBuf,
        /// Actual size in kilobytes.
        size_kb: u64,
    },

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// The session already reached `COMPLETE`; no further turns or switches
    /// are accepted.
    #[error("Session for unit '{unit_id}' is already complete after {exchange_count} exchanges\n\nSuggestion: Stop sending turns or start a new session")]
    SessionAlreadyComplete {
        /// Identifier of the lesson unit.
        unit_id: String,
        /// Exchange count at completion.
        exchange_count: u32,
    },

    /// A restored session snapshot violates the session invariants.
    #[error("Invalid session snapshot: {message}\n\nSuggestion: Restore from a snapshot produced by this version, or start a new session")]
    InvalidSnapshot {
        /// Description of the violated invariant.
        message: String,
    },

    /// Requested persona is not in the catalog.
    #[error("Unknown persona: '{key}'\n\nSuggestion: Use one of the keys listed by GET /api/personas")]
    UnknownPersona {
        /// The requested persona key.
        key: String,
    },

    /// Persona catalog is malformed.
    #[error("Invalid persona catalog: {message}")]
    InvalidCatalog {
        /// Description of the problem.
        message: String,
    },

    /// No live session with the given identifier.
    #[error("Session not found: '{id}'")]
    SessionNotFound {
        /// The requested session identifier.
        id: String,
    },

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TutorError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `InvalidUnit` error for the given field.
    #[must_use]
    pub fn invalid_unit(field: &'static str) -> Self {
        Self::InvalidUnit {
            field,
            suggestion: format!("Supply a non-empty '{field}' in the unit descriptor"),
        }
    }

    /// Creates a new `UnitNotFound` error.
    #[must_use]
    pub fn unit_not_found(path: impl Into<PathBuf>) -> Self {
        Self::UnitNotFound { path: path.into() }
    }

    /// Creates a new `UnitParseError`.
    #[must_use]
    pub fn unit_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::UnitParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `UnitTooLarge` error.
    #[must_use]
    pub fn unit_too_large(path: impl Into<PathBuf>, size_kb: u64) -> Self {
        Self::UnitTooLarge {
            path: path.into(),
            size_kb,
        }
    }

    /// Creates a new `SessionAlreadyComplete` error.
    #[must_use]
    pub fn session_complete(unit_id: impl Into<String>, exchange_count: u32) -> Self {
        Self::SessionAlreadyComplete {
            unit_id: unit_id.into(),
            exchange_count,
        }
    }

    /// Creates a new `UnknownPersona` error.
    #[must_use]
    pub fn unknown_persona(key: impl Into<String>) -> Self {
        Self::UnknownPersona { key: key.into() }
    }

    /// Creates a new `InvalidCatalog` error.
    #[must_use]
    pub fn invalid_catalog(message: impl Into<String>) -> Self {
        Self::InvalidCatalog {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidSnapshot` error.
    #[must_use]
    pub fn invalid_snapshot(message: impl Into<String>) -> Self {
        Self::InvalidSnapshot {
            message: message.into(),
        }
    }

    /// Creates a new `SessionNotFound` error.
    #[must_use]
    pub fn session_not_found(id: impl Into<String>) -> Self {
        Self::SessionNotFound { id: id.into() }
    }

    /// Returns `true` if this is the "session already complete" condition.
    #[must_use]
    pub const fn is_session_complete(&self) -> bool {
        matches!(self, Self::SessionAlreadyComplete { .. })
    }

    /// Returns `true` if the caller can carry on after this error without
    /// fixing its inputs (stop sending turns, pick another persona, ...).
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SessionAlreadyComplete { .. }
                | Self::UnknownPersona { .. }
                | Self::SessionNotFound { .. }
        )
    }

    /// Returns `true` if this error blocks session creation or startup.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigParseError { .. }
                | Self::ConfigValidationError { .. }
                | Self::InvalidUnit { .. }
                | Self::UnitNotFound { .. }
                | Self::UnitParseError { .. }
                | Self::UnitTooLarge { .. }
                | Self::InvalidCatalog { .. }
        )
    }
}
