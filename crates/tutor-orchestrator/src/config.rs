//! Configuration types for the tutoring orchestrator.
//!
//! Configuration is read from `tutor.json`. Every field is optional and
//! falls back to a default, so an absent file yields a working setup.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TutorError};
use crate::persona::PersonaCatalog;

/// The default config file name.
const CONFIG_FILE_NAME: &str = "tutor.json";

/// Default lesson unit descriptor path.
fn default_unit() -> String {
    "unit.json".to_string()
}

/// Default persona a lesson opens with.
fn default_persona() -> String {
    "explainer".to_string()
}

/// Default number of accepted turns per phase.
const fn default_turns_per_phase() -> u32 {
    1
}

/// Default output directory for reports and telemetry.
fn default_output_dir() -> String {
    ".".to_string()
}

fn default_actor_id() -> String {
    "anonymous".to_string()
}

fn default_actor_name() -> String {
    "Learner".to_string()
}

fn default_verb_base_uri() -> String {
    "http://adlnet.gov/expapi/verbs/".to_string()
}

fn default_object_base_uri() -> String {
    "https://tutor.local/units/".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_event_capacity() -> usize {
    100
}

/// Main configuration for the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Path to the lesson unit descriptor.
    #[serde(default = "default_unit")]
    pub unit: String,

    /// Persona key a new lesson starts with.
    #[serde(default = "default_persona")]
    pub default_persona: String,

    /// Path to a JSON persona catalog replacing the built-in one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personas: Option<String>,

    /// Accepted turns each phase consumes before advancing.
    #[serde(default = "default_turns_per_phase")]
    pub turns_per_phase: u32,

    /// Telemetry identifiers.
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Output directory for generated reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            unit: default_unit(),
            default_persona: default_persona(),
            personas: None,
            turns_per_phase: default_turns_per_phase(),
            telemetry: TelemetryConfig::default(),
            server: ServerConfig::default(),
            output_dir: default_output_dir(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if `tutor.json` exists but is invalid, and
    /// `TutorError::Io` if the current directory cannot be determined.
    pub fn load() -> Result<Self> {
        Self::load_from_cwd(std::env::current_dir())
    }

    fn load_from_cwd(current_dir: std::io::Result<PathBuf>) -> Result<Self> {
        Self::load_from_dir(&current_dir?)
    }

    /// Loads `tutor.json` from a specific directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is invalid.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// A missing file yields the default configuration.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::ConfigParseError` if the file cannot be read or
    /// holds invalid JSON, and `TutorError::ConfigValidationError` if a value
    /// fails [`Config::validate`].
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(TutorError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| TutorError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::ConfigValidationError` naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.turns_per_phase == 0 {
            return Err(TutorError::config_validation(
                "turnsPerPhase must be greater than 0",
                "Set turnsPerPhase to at least 1 in your tutor.json",
            ));
        }

        if self.default_persona.trim().is_empty() {
            return Err(TutorError::config_validation(
                "defaultPersona must not be empty",
                "Set defaultPersona to a persona key such as \"explainer\" in your tutor.json",
            ));
        }

        match self.personas.as_deref() {
            // a custom catalog is checked once loaded, see `persona_catalog`
            Some(path) if path.trim().is_empty() => {
                return Err(TutorError::config_validation(
                    "personas must not be empty",
                    "Point personas at a persona catalog JSON file, or remove it to use the built-in catalog",
                ));
            }
            Some(_) => {}
            None => self.validate_default_persona(&PersonaCatalog::builtin())?,
        }

        if self.telemetry.actor_id.trim().is_empty() {
            return Err(TutorError::config_validation(
                "telemetry.actorId must not be empty",
                "Set telemetry.actorId in your tutor.json",
            ));
        }

        if self.telemetry.verb_base_uri.trim().is_empty() {
            return Err(TutorError::config_validation(
                "telemetry.verbBaseUri must not be empty",
                "Set telemetry.verbBaseUri, e.g. \"http://adlnet.gov/expapi/verbs/\"",
            ));
        }

        if self.telemetry.object_base_uri.trim().is_empty() {
            return Err(TutorError::config_validation(
                "telemetry.objectBaseUri must not be empty",
                "Set telemetry.objectBaseUri to the URI prefix for lesson objects",
            ));
        }

        if self.server.event_capacity == 0 {
            return Err(TutorError::config_validation(
                "server.eventCapacity must be greater than 0",
                "Set server.eventCapacity to at least 1 in your tutor.json",
            ));
        }

        if self.output_dir.trim().is_empty() {
            return Err(TutorError::config_validation(
                "outputDir must not be empty",
                "Provide a valid output directory path in your tutor.json (use '.' for current directory)",
            ));
        }

        Ok(())
    }

    /// Returns the persona catalog lessons should use.
    ///
    /// Loads the file named by `personas` when set, otherwise returns the
    /// built-in catalog. Either way `defaultPersona` must be in it.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog file cannot be read or is invalid,
    /// and `TutorError::ConfigValidationError` if `defaultPersona` is not in
    /// the catalog.
    pub fn persona_catalog(&self) -> Result<PersonaCatalog> {
        let catalog = match self.personas.as_deref() {
            Some(path) => PersonaCatalog::load(Path::new(path))?,
            None => PersonaCatalog::builtin(),
        };
        self.validate_default_persona(&catalog)?;
        Ok(catalog)
    }

    fn validate_default_persona(&self, catalog: &PersonaCatalog) -> Result<()> {
        if catalog.contains(&self.default_persona) {
            return Ok(());
        }

        let suggestion = if self.personas.is_some() {
            "Use a persona key defined in your personas file"
        } else {
            "Use one of the built-in persona keys, e.g. \"explainer\" or \"coach\""
        };
        Err(TutorError::config_validation(
            format!("defaultPersona '{}' is not a known persona", self.default_persona),
            suggestion,
        ))
    }
}

/// Identifiers stamped onto every telemetry event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryConfig {
    /// Actor id used when a session has no learner id.
    #[serde(default = "default_actor_id")]
    pub actor_id: String,

    /// Actor display name.
    #[serde(default = "default_actor_name")]
    pub actor_name: String,

    /// Prefix joined with the phase verb label.
    #[serde(default = "default_verb_base_uri")]
    pub verb_base_uri: String,

    /// Prefix joined with the unit title slug.
    #[serde(default = "default_object_base_uri")]
    pub object_base_uri: String,

    /// Copy the triggering utterance into phase-advance events.
    #[serde(default)]
    pub include_utterances: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            actor_id: default_actor_id(),
            actor_name: default_actor_name(),
            verb_base_uri: default_verb_base_uri(),
            object_base_uri: default_object_base_uri(),
            include_utterances: false,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Buffered events per WebSocket subscriber before lagging.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            event_capacity: default_event_capacity(),
        }
    }
}
