//! Lesson unit descriptors.
//!
//! A unit is supplied by the catalog collaborator and is read-only for the
//! whole session. Only `id` and `title` are required; everything else is
//! carried through for renderers.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TutorError};

/// Maximum allowed unit descriptor file size in bytes (64KB).
pub const MAX_UNIT_SIZE: u64 = 64 * 1024;

/// Descriptor of the lesson being taught.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonUnit {
    /// Catalog identifier.
    #[serde(default)]
    pub id: String,
    /// Human-readable title; also the source of the telemetry object id.
    #[serde(default)]
    pub title: String,
    /// What the learner should be able to do afterwards.
    #[serde(default)]
    pub learning_objective: String,
    /// Outcomes the unit covers.
    #[serde(default)]
    pub learning_outcomes: Vec<String>,
    /// Criteria used during assessment phases.
    #[serde(default)]
    pub assessment_criteria: Vec<String>,
}

impl LessonUnit {
    /// Creates a unit with just an id and a title.
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    /// Checks the fields a session cannot start without.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::InvalidUnit` if `id` or `title` is blank.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(TutorError::invalid_unit("id"));
        }
        if self.title.trim().is_empty() {
            return Err(TutorError::invalid_unit("title"));
        }
        Ok(())
    }

    /// Deterministic object identifier derived from the title.
    ///
    /// Lower-cases the title and collapses every run of whitespace into a
    /// single `-`, so titles differing only in case or spacing share a slug.
    /// Every other character outside `[a-z0-9]`, a literal `-` included, is
    /// percent-encoded, so the slug is a single URI path segment and distinct
    /// titles never collide.
    ///
    /// # Examples
    ///
    /// ```
    /// use tutor_orchestrator::LessonUnit;
    ///
    /// let a = LessonUnit::new("u1", "Sales Negotiation");
    /// let b = LessonUnit::new("u2", "  sales   negotiation ");
    /// assert_eq!(a.object_slug(), "sales-negotiation");
    /// assert_eq!(a.object_slug(), b.object_slug());
    ///
    /// let c = LessonUnit::new("u3", "A/B Testing?");
    /// assert_eq!(c.object_slug(), "a%2Fb-testing%3F");
    /// ```
    #[must_use]
    pub fn object_slug(&self) -> String {
        use std::fmt::Write as _;

        let mut slug = String::with_capacity(self.title.len());
        for (i, word) in self.title.split_whitespace().enumerate() {
            if i > 0 {
                slug.push('-');
            }
            for ch in word.chars().flat_map(char::to_lowercase) {
                if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
                    slug.push(ch);
                    continue;
                }
                let mut buf = [0u8; 4];
                for byte in ch.encode_utf8(&mut buf).bytes() {
                    let _ = write!(slug, "%{byte:02X}");
                }
            }
        }
        slug
    }

    /// Loads and validates a unit descriptor from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::UnitNotFound` if the file doesn't exist,
    /// `TutorError::UnitTooLarge` above 64KB, `TutorError::UnitParseError`
    /// for malformed JSON, and `TutorError::InvalidUnit` if required fields
    /// are blank.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let metadata = std::fs::metadata(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TutorError::unit_not_found(path)
            } else {
                TutorError::Io(e)
            }
        })?;

        let file_size = metadata.len();
        if file_size > MAX_UNIT_SIZE {
            return Err(TutorError::unit_too_large(path, file_size / 1024));
        }

        let contents = std::fs::read_to_string(path)?;
        let unit: Self = serde_json::from_str(&contents)
            .map_err(|e| TutorError::unit_parse(path, e.to_string()))?;
        unit.validate()?;

        tracing::debug!(unit_id = %unit.id, title = %unit.title, "Lesson unit loaded");
        Ok(unit)
    }
}
