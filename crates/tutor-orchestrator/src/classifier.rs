//! Discourse classifier for learner mindset signals.
//!
//! Maps a learner utterance to zero or more [`Indicator`]s. Each of the
//! twelve labels in [`IndicatorLabel::ALL`] owns one case-insensitive
//! pattern; all patterns run independently against the same text and the
//! result is returned in catalog order (growth labels first, then fixed).
//!
//! Classification is pure: no state, no I/O, and it never fails. A pattern
//! that cannot be compiled is treated as one that never matches.
//!
//! # Example
//!
//! ```
//! use tutor_orchestrator::classifier::{classify, IndicatorLabel};
//!
//! let indicators = classify("Let me try again, how can I improve?");
//! let labels: Vec<_> = indicators.iter().map(|i| i.label).collect();
//! assert_eq!(
//!     labels,
//!     vec![IndicatorLabel::PersistedAfterFailure, IndicatorLabel::SoughtFeedback]
//! );
//! ```

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

// ============================================================================
// MindsetType
// ============================================================================

/// Whether an indicator signals a growth or a fixed mindset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MindsetType {
    /// Growth mindset signal.
    Growth,
    /// Fixed mindset signal.
    Fixed,
}

impl std::fmt::Display for MindsetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Growth => write!(f, "growth"),
            Self::Fixed => write!(f, "fixed"),
        }
    }
}

// ============================================================================
// IndicatorLabel
// ============================================================================

/// Closed catalog of mindset labels.
///
/// Declaration order is the catalog order and is part of the classifier's
/// observable output ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorLabel {
    /// Learner leans into a hard task.
    EmbracedChallenge,
    /// Learner keeps going after something did not work.
    PersistedAfterFailure,
    /// Learner treats an error as a source of learning.
    LearnedFromMistakes,
    /// Learner asks how to improve.
    SoughtFeedback,
    /// Learner considers other viewpoints.
    ValuedDiversePerspectives,
    /// Learner accepts that the answer is nuanced.
    EmbracedComplexity,
    /// Learner wants to practise or try it out.
    LearnedThroughDoing,
    /// Learner states an ambitious goal.
    SetChallengingGoal,
    /// Learner looks back on what they learned.
    ReflectedOnLearning,
    /// Learner backs away from a hard task.
    AvoidedChallenge,
    /// Learner abandons the attempt.
    GaveUpEasily,
    /// Learner attributes difficulty to someone or something else.
    BlamedExternal,
}

impl IndicatorLabel {
    /// All labels in catalog order: nine growth labels, then three fixed.
    pub const ALL: [Self; 12] = [
        Self::EmbracedChallenge,
        Self::PersistedAfterFailure,
        Self::LearnedFromMistakes,
        Self::SoughtFeedback,
        Self::ValuedDiversePerspectives,
        Self::EmbracedComplexity,
        Self::LearnedThroughDoing,
        Self::SetChallengingGoal,
        Self::ReflectedOnLearning,
        Self::AvoidedChallenge,
        Self::GaveUpEasily,
        Self::BlamedExternal,
    ];

    /// Returns the mindset type this label belongs to.
    #[must_use]
    pub const fn kind(&self) -> MindsetType {
        match self {
            Self::AvoidedChallenge | Self::GaveUpEasily | Self::BlamedExternal => {
                MindsetType::Fixed
            }
            _ => MindsetType::Growth,
        }
    }

    /// Returns the snake_case wire name of the label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::EmbracedChallenge => "embraced_challenge",
            Self::PersistedAfterFailure => "persisted_after_failure",
            Self::LearnedFromMistakes => "learned_from_mistakes",
            Self::SoughtFeedback => "sought_feedback",
            Self::ValuedDiversePerspectives => "valued_diverse_perspectives",
            Self::EmbracedComplexity => "embraced_complexity",
            Self::LearnedThroughDoing => "learned_through_doing",
            Self::SetChallengingGoal => "set_challenging_goal",
            Self::ReflectedOnLearning => "reflected_on_learning",
            Self::AvoidedChallenge => "avoided_challenge",
            Self::GaveUpEasily => "gave_up_easily",
            Self::BlamedExternal => "blamed_external",
        }
    }

    /// Returns a short human-readable description.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::EmbracedChallenge => "Embraced a challenge",
            Self::PersistedAfterFailure => "Persisted after a setback",
            Self::LearnedFromMistakes => "Learned from mistakes",
            Self::SoughtFeedback => "Sought feedback",
            Self::ValuedDiversePerspectives => "Valued diverse perspectives",
            Self::EmbracedComplexity => "Embraced complexity",
            Self::LearnedThroughDoing => "Learned through doing",
            Self::SetChallengingGoal => "Set a challenging goal",
            Self::ReflectedOnLearning => "Reflected on learning",
            Self::AvoidedChallenge => "Avoided a challenge",
            Self::GaveUpEasily => "Gave up easily",
            Self::BlamedExternal => "Blamed external factors",
        }
    }

    /// The pattern recognising paraphrases of this label.
    const fn pattern(&self) -> &'static str {
        match self {
            Self::EmbracedChallenge => {
                r"\b(?:bring it on|i like (?:a|the) challenge|(?:love|enjoy) (?:a |the )?challenges?|up for (?:a|the) challenge|challenging,? but (?:fun|interesting|exciting|worth it)|(?:this|that|it) is (?:hard|difficult|tough),? but|(?:i want to|let me) (?:try|tackle|attempt) (?:the |a )?(?:harder|difficult|tough|trickier))"
            }
            Self::PersistedAfterFailure => {
                r"\b(?:(?:let me|i(?:['’]ll| will)) try (?:again|another way|a different (?:approach|way|method))|try (?:it )?again|(?:won['’]t|will not|not going to|never) give up|keep (?:trying|going|at it)|(?:didn['’]t|did not) work,? but|one more (?:try|attempt|go))"
            }
            Self::LearnedFromMistakes => {
                r"\b(?:(?:learn(?:ed|t)?|learning) from (?:my |the |our )?(?:mistakes?|errors?|failures?)|mistakes? (?:help|helps|helped|taught|teach) me|i (?:see|understand|realise|realize) (?:what|where) i (?:did wrong|went wrong)|i got (?:it|that) wrong because)"
            }
            Self::SoughtFeedback => {
                r"\b(?:how (?:can|could|do|should) i (?:improve|do better|get better)|(?:any|some|your) (?:feedback|suggestions|advice|tips)|what (?:could|can|should) i (?:do|have done) (?:better|differently)|(?:can|could) you (?:check|review|critique|look at) (?:my|this)|where did i go wrong|what did i (?:miss|get wrong))"
            }
            Self::ValuedDiversePerspectives => {
                r"\b(?:(?:another|a different|other|different) (?:perspective|viewpoint|point of view|opinions?|views?)|(?:i hadn['’]t|i had not|never) (?:thought|considered) (?:of it |about it )?(?:that way|like that)|(?:others|other people|colleagues|customers) (?:might|may|could) (?:see|think|feel)|from (?:their|his|her|the other person['’]s) (?:side|point of view|perspective)|good point)"
            }
            Self::EmbracedComplexity => {
                r"\b(?:it depends|(?:more|quite|really) (?:complex|nuanced|complicated) than|there(?:['’]s| is| are) (?:no|not (?:a|one)) (?:single|simple|right) answer|(?:several|many|multiple) (?:factors|angles|layers)|trade-?offs?|both sides)"
            }
            Self::LearnedThroughDoing => {
                r"\b(?:(?:let me|i(?:['’]ll| will)|i want to|can i) (?:practi[cs]e|try it out|have a go|give it a go|work through)|(?:by|through) (?:doing|practi[cs]ing|trying it)|hands-on|role-?play|rehearse)"
            }
            Self::SetChallengingGoal => {
                r"\b(?:my goal is|i (?:want|aim|plan|intend) to (?:master|become|achieve|reach)|i(?:['’]m| am) aiming (?:for|to)|(?:stretch|ambitious) (?:goal|target))"
            }
            Self::ReflectedOnLearning => {
                r"\b(?:looking back|on reflection|i(?:['’]ve| have)? (?:realised|realized|noticed|learned|learnt) (?:that|how)|what i(?:['’]ve| have)? learn(?:ed|t)|i now (?:understand|see|know)|(?:this|that) (?:makes|made) me (?:think|realise|realize|reflect)|if i (?:did|do) (?:it|this) again)"
            }
            Self::AvoidedChallenge => {
                r"\b(?:i(?:['’]m| am) (?:not|no) good at|i (?:can['’]t|cannot|can not) do (?:this|it|that)|too (?:hard|difficult)|(?:give|show) me (?:something|an) easier|i(?:['’]d| would) rather (?:not|skip)|(?:can|could) (?:i|we) (?:just )?skip|not for me)"
            }
            Self::GaveUpEasily => {
                r"\b(?:i (?:give up|quit)|i(?:['’]ll| will|['’]m going to| am going to) (?:just )?(?:give up|quit|stop trying)|i(?:['’]m| am) giving up|what(?:['’]s| is) the point|no point (?:in )?trying|why bother|forget (?:it|this))"
            }
            Self::BlamedExternal => {
                r"\b(?:(?:it|that)(?:['’]s| is) (?:not my fault|(?:the|your) fault)|(?:teacher|trainer|tutor|manager|system|instructions?|course|question)(?: was| is|['’]s) (?:bad|unclear|confusing|unfair|wrong)|(?:you|they) (?:didn['’]t|did not|never) (?:explain|tell|teach|show)|(?:blame|because of) (?:the|my) (?:teacher|manager|colleagues?|customers?|system)|bad luck|unfair (?:question|test))"
            }
        }
    }
}

impl std::fmt::Display for IndicatorLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Indicator
// ============================================================================

/// A single detected mindset signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Indicator {
    /// Growth or fixed.
    #[serde(rename = "type")]
    pub kind: MindsetType,
    /// The matched label.
    pub label: IndicatorLabel,
}

impl Indicator {
    /// Creates an indicator for a label, deriving its type.
    #[must_use]
    pub const fn new(label: IndicatorLabel) -> Self {
        Self {
            kind: label.kind(),
            label,
        }
    }
}

impl From<IndicatorLabel> for Indicator {
    fn from(label: IndicatorLabel) -> Self {
        Self::new(label)
    }
}

// ============================================================================
// Pattern table
// ============================================================================

/// Upper bound on compiled pattern size; anything bigger is dropped.
const PATTERN_SIZE_LIMIT: usize = 1 << 20;

static PATTERNS: Lazy<Vec<(IndicatorLabel, Option<Regex>)>> = Lazy::new(|| {
    IndicatorLabel::ALL
        .iter()
        .map(|label| {
            let compiled = RegexBuilder::new(label.pattern())
                .case_insensitive(true)
                .size_limit(PATTERN_SIZE_LIMIT)
                .build();
            if let Err(e) = &compiled {
                tracing::warn!(
                    label = %label,
                    error = %e,
                    "Indicator pattern failed to compile; it will never match"
                );
            }
            (*label, compiled.ok())
        })
        .collect()
});

/// Classifies a learner utterance into mindset indicators.
///
/// Empty or whitespace-only input yields an empty list. Output follows
/// [`IndicatorLabel::ALL`] order and contains each label at most once.
#[must_use]
pub fn classify(utterance: &str) -> Vec<Indicator> {
    if utterance.trim().is_empty() {
        return Vec::new();
    }

    PATTERNS
        .iter()
        .filter_map(|(label, pattern)| {
            pattern
                .as_ref()
                .filter(|re| re.is_match(utterance))
                .map(|_| Indicator::new(*label))
        })
        .collect()
}

// ============================================================================
// MindsetTally
// ============================================================================

/// Running counts of indicators across a set of turns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MindsetTally {
    /// Number of growth indicators.
    pub growth: u32,
    /// Number of fixed indicators.
    pub fixed: u32,
    /// Count per label, keyed in catalog order.
    pub by_label: BTreeMap<IndicatorLabel, u32>,
}

impl MindsetTally {
    /// Adds a batch of indicators to the tally.
    pub fn record(&mut self, indicators: &[Indicator]) {
        for indicator in indicators {
            match indicator.kind {
                MindsetType::Growth => self.growth += 1,
                MindsetType::Fixed => self.fixed += 1,
            }
            *self.by_label.entry(indicator.label).or_insert(0) += 1;
        }
    }

    /// Growth minus fixed.
    #[must_use]
    pub fn net(&self) -> i64 {
        i64::from(self.growth) - i64::from(self.fixed)
    }

    /// Total indicators recorded.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.growth + self.fixed
    }
}

impl<'a> FromIterator<&'a [Indicator]> for MindsetTally {
    fn from_iter<T: IntoIterator<Item = &'a [Indicator]>>(iter: T) -> Self {
        let mut tally = Self::default();
        for batch in iter {
            tally.record(batch);
        }
        tally
    }
}

// ============================================================================
// Tests
// ============================================================================
