//! Instructor persona catalog.
//!
//! Personas are named instructional voices with fixed display attributes.
//! They carry no session state: a session only remembers which key is active.
//! The built-in catalog holds twelve personas spanning Bloom's taxonomy plus
//! one composite governance persona (`council`).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TutorError};
use crate::phase::{Phase, Stage};

/// Key of the composite governance persona in the built-in catalog.
pub const COUNCIL_KEY: &str = "council";

// ============================================================================
// BloomLevel
// ============================================================================

/// Cognitive level a persona primarily works at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BloomLevel {
    /// Recall facts and basic concepts.
    Remember,
    /// Explain ideas or concepts.
    Understand,
    /// Use information in new situations.
    Apply,
    /// Draw connections among ideas.
    Analyse,
    /// Justify a stand or decision.
    Evaluate,
    /// Produce new or original work.
    Create,
    /// Spans every level (composite personas).
    All,
}

impl std::fmt::Display for BloomLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Remember => "remember",
            Self::Understand => "understand",
            Self::Apply => "apply",
            Self::Analyse => "analyse",
            Self::Evaluate => "evaluate",
            Self::Create => "create",
            Self::All => "all",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Persona
// ============================================================================

/// A named instructional voice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    /// Stable lookup key.
    pub key: String,
    /// Name shown to the learner.
    pub display_name: String,
    /// One-line role description.
    pub subtitle: String,
    /// Primary Bloom level.
    pub bloom_level: BloomLevel,
    /// Design-system colour token used by renderers.
    pub colour_token: String,
    /// Whether this persona speaks for several others.
    #[serde(default)]
    pub composite: bool,
}

impl Persona {
    fn builtin(
        key: &str,
        display_name: &str,
        subtitle: &str,
        bloom_level: BloomLevel,
        colour_token: &str,
    ) -> Self {
        Self {
            key: key.to_string(),
            display_name: display_name.to_string(),
            subtitle: subtitle.to_string(),
            bloom_level,
            colour_token: colour_token.to_string(),
            composite: false,
        }
    }
}

// ============================================================================
// PersonaCatalog
// ============================================================================

/// Ordered, validated set of personas.
///
/// Serialized as a plain JSON array. Deserializing runs the same checks
/// as [`PersonaCatalog::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Persona>", into = "Vec<Persona>")]
pub struct PersonaCatalog {
    personas: Vec<Persona>,
}

impl TryFrom<Vec<Persona>> for PersonaCatalog {
    type Error = TutorError;

    fn try_from(personas: Vec<Persona>) -> Result<Self> {
        Self::new(personas)
    }
}

impl From<PersonaCatalog> for Vec<Persona> {
    fn from(catalog: PersonaCatalog) -> Self {
        catalog.personas
    }
}

impl Default for PersonaCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PersonaCatalog {
    /// Returns the built-in catalog.
    #[must_use]
    pub fn builtin() -> Self {
        let mut personas = vec![
            Persona::builtin(
                "explainer",
                "The Explainer",
                "Lays out the core idea plainly",
                BloomLevel::Understand,
                "sky-500",
            ),
            Persona::builtin(
                "storyteller",
                "The Storyteller",
                "Teaches through cases and anecdotes",
                BloomLevel::Understand,
                "amber-500",
            ),
            Persona::builtin(
                "archivist",
                "The Archivist",
                "Anchors key terms and facts",
                BloomLevel::Remember,
                "stone-500",
            ),
            Persona::builtin(
                "demonstrator",
                "The Demonstrator",
                "Shows how it is done step by step",
                BloomLevel::Apply,
                "emerald-500",
            ),
            Persona::builtin(
                "coach",
                "The Coach",
                "Guides deliberate practice",
                BloomLevel::Apply,
                "lime-500",
            ),
            Persona::builtin(
                "questioner",
                "The Questioner",
                "Probes understanding with open questions",
                BloomLevel::Analyse,
                "violet-500",
            ),
            Persona::builtin(
                "analyst",
                "The Analyst",
                "Breaks problems into parts",
                BloomLevel::Analyse,
                "indigo-500",
            ),
            Persona::builtin(
                "challenger",
                "The Challenger",
                "Pushes back and stress-tests reasoning",
                BloomLevel::Evaluate,
                "rose-500",
            ),
            Persona::builtin(
                "examiner",
                "The Examiner",
                "Assesses against the criteria",
                BloomLevel::Evaluate,
                "red-600",
            ),
            Persona::builtin(
                "reflector",
                "The Reflector",
                "Invites looking back on learning",
                BloomLevel::Evaluate,
                "teal-500",
            ),
            Persona::builtin(
                "innovator",
                "The Innovator",
                "Encourages new approaches",
                BloomLevel::Create,
                "fuchsia-500",
            ),
            Persona::builtin(
                "mentor",
                "The Mentor",
                "Connects learning to goals",
                BloomLevel::Create,
                "orange-500",
            ),
        ];
        let mut council = Persona::builtin(
            COUNCIL_KEY,
            "The Council",
            "All voices together, overseeing the lesson",
            BloomLevel::All,
            "slate-700",
        );
        council.composite = true;
        personas.push(council);

        Self { personas }
    }

    /// Builds a catalog from an explicit list, validating keys.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCatalog` if the list is empty or a key is blank or repeated.
    pub fn new(personas: Vec<Persona>) -> Result<Self> {
        if personas.is_empty() {
            return Err(TutorError::invalid_catalog("catalog has no personas"));
        }

        let mut seen = std::collections::HashSet::new();
        for persona in &personas {
            if persona.key.trim().is_empty() {
                return Err(TutorError::invalid_catalog("persona key must not be empty"));
            }
            if !seen.insert(persona.key.as_str()) {
                return Err(TutorError::invalid_catalog(format!(
                    "duplicate persona key '{}'",
                    persona.key
                )));
            }
        }

        Ok(Self { personas })
    }

    /// Parses and validates a catalog from a JSON array.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the catalog is invalid.
    pub fn from_json(json: &str) -> Result<Self> {
        let personas: Vec<Persona> = serde_json::from_str(json)?;
        Self::new(personas)
    }

    /// Loads a catalog from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let catalog = Self::from_json(&contents)?;
        tracing::debug!(
            path = %path.display(),
            personas = catalog.len(),
            "Persona catalog loaded"
        );
        Ok(catalog)
    }

    /// Looks up a persona by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Persona> {
        self.personas.iter().find(|p| p.key == key)
    }

    /// Returns `true` if the key exists.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Looks up a persona, failing with `UnknownPersona`.
    pub fn require(&self, key: &str) -> Result<&Persona> {
        self.get(key).ok_or_else(|| TutorError::unknown_persona(key))
    }

    /// Iterates personas in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Persona> {
        self.personas.iter()
    }

    /// Number of personas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.personas.len()
    }

    /// Returns `true` if the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }

    /// Personas working at the given Bloom level.
    pub fn for_bloom_level(&self, level: BloomLevel) -> impl Iterator<Item = &Persona> {
        self.personas.iter().filter(move |p| p.bloom_level == level)
    }

    /// Suggested persona for a phase, if the catalog has it.
    ///
    /// Renderers may use this as a hint; sessions never switch on their own.
    #[must_use]
    pub fn suggested_for(&self, phase: Phase) -> Option<&Persona> {
        let key = match phase.stage() {
            Stage::Teach => "explainer",
            Stage::Check => "questioner",
            Stage::Assess => "examiner",
            Stage::Complete => COUNCIL_KEY,
        };
        self.get(key)
    }
}

// ============================================================================
// Tests
// ============================================================================
