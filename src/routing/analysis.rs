//! Query analysis value type and the classification-reply validation boundary.
//!
//! Everything that trusts the remote model's output lives in
//! [`QueryAnalysis::from_reply`]. A reply either becomes a fully validated
//! [`QueryAnalysis`] or an error; there is no partially trusted state.

use serde::{Deserialize, Serialize};

use super::strategy::SearchStrategy;
use crate::RouterError;

/// Defaults substituted for fields the classification reply leaves out.
pub mod defaults {
    /// Complexity when elided.
    pub const COMPLEXITY: f64 = 0.5;
    /// Relationship intensity when elided.
    pub const RELATIONSHIP_INTENSITY: f64 = 0.5;
    /// Reasoning flag when elided.
    pub const REASONING_REQUIRED: bool = false;
    /// Entity count when elided.
    pub const ENTITY_COUNT: u32 = 1;
    /// Confidence when elided.
    pub const CONFIDENCE: f64 = 0.5;
    /// Rationale when elided.
    pub const RATIONALE: &str = "default analysis";
}

/// Rationale attached to every keyword-classifier analysis.
pub const RULE_BASED_RATIONALE: &str = "rule-based fallback used";

/// Structured classification of one query.
///
/// Immutable once produced; construct through [`QueryAnalysis::new`] or
/// [`QueryAnalysis::from_reply`], both of which validate every field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryAnalysis {
    complexity: f64,
    relationship_intensity: f64,
    reasoning_required: bool,
    entity_count: u32,
    recommended_strategy: SearchStrategy,
    confidence: f64,
    rationale: String,
}

impl QueryAnalysis {
    /// Build a validated analysis.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::InvalidAnalysis`] if a score lies outside
    /// `[0, 1]` or is not finite.
    pub fn new(
        complexity: f64,
        relationship_intensity: f64,
        reasoning_required: bool,
        entity_count: u32,
        recommended_strategy: SearchStrategy,
        confidence: f64,
        rationale: impl Into<String>,
    ) -> Result<Self, RouterError> {
        check_unit("complexity", complexity)?;
        check_unit("relationship_intensity", relationship_intensity)?;
        check_unit("confidence", confidence)?;

        Ok(Self {
            complexity,
            relationship_intensity,
            reasoning_required,
            entity_count,
            recommended_strategy,
            confidence,
            rationale: rationale.into(),
        })
    }

    /// Parse a classification service reply.
    ///
    /// Accepts a bare JSON object, or one wrapped in a Markdown code fence or
    /// surrounded by prose. Elided fields take the values in [`defaults`].
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::InvalidAnalysis`] if no JSON object can be
    /// found, a field has the wrong type, the object carries none of the
    /// analysis fields, the strategy is unknown, or a score is out of range.
    pub fn from_reply(reply: &str) -> Result<Self, RouterError> {
        let json = extract_json_object(reply)
            .ok_or_else(|| RouterError::InvalidAnalysis("no JSON object in reply".to_string()))?;

        let raw: RawAnalysis = serde_json::from_str(json)
            .map_err(|e| RouterError::InvalidAnalysis(format!("malformed reply: {e}")))?;

        if raw.is_empty() {
            return Err(RouterError::InvalidAnalysis(
                "reply carries no analysis fields".to_string(),
            ));
        }

        let strategy = match raw.recommended_strategy.as_deref() {
            Some(s) => s.parse()?,
            None => SearchStrategy::Traditional,
        };

        let entity_count = match raw.entity_count {
            Some(n) => u32::try_from(n).map_err(|_| {
                RouterError::InvalidAnalysis(format!("entity_count out of range: {n}"))
            })?,
            None => defaults::ENTITY_COUNT,
        };

        Self::new(
            raw.query_complexity.unwrap_or(defaults::COMPLEXITY),
            raw.relationship_intensity
                .unwrap_or(defaults::RELATIONSHIP_INTENSITY),
            raw.reasoning_required
                .unwrap_or(defaults::REASONING_REQUIRED),
            entity_count,
            strategy,
            raw.confidence.unwrap_or(defaults::CONFIDENCE),
            raw.reasoning
                .unwrap_or_else(|| defaults::RATIONALE.to_string()),
        )
    }

    /// Analysis produced locally by the keyword classifier. Scores are
    /// clamped into `[0, 1]` so construction cannot fail.
    pub(crate) fn rule_based(
        complexity: f64,
        relationship_intensity: f64,
        reasoning_required: bool,
        entity_count: u32,
        recommended_strategy: SearchStrategy,
        confidence: f64,
    ) -> Self {
        let unit = |v: f64| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        Self {
            complexity: unit(complexity),
            relationship_intensity: unit(relationship_intensity),
            reasoning_required,
            entity_count,
            recommended_strategy,
            confidence: unit(confidence),
            rationale: RULE_BASED_RATIONALE.to_string(),
        }
    }

    /// Estimated reasoning depth, `[0, 1]`.
    pub fn complexity(&self) -> f64 {
        self.complexity
    }

    /// Estimated need for multi-entity relational structure, `[0, 1]`.
    pub fn relationship_intensity(&self) -> f64 {
        self.relationship_intensity
    }

    /// Whether multi-hop, causal or comparative reasoning is needed.
    pub fn reasoning_required(&self) -> bool {
        self.reasoning_required
    }

    /// Number of entities detected in the query.
    pub fn entity_count(&self) -> u32 {
        self.entity_count
    }

    /// Strategy the router will dispatch on.
    pub fn recommended_strategy(&self) -> SearchStrategy {
        self.recommended_strategy
    }

    /// Confidence in the recommendation, `[0, 1]`.
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Free-text justification. Display only.
    pub fn rationale(&self) -> &str {
        &self.rationale
    }
}

fn check_unit(field: &str, value: f64) -> Result<(), RouterError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(RouterError::InvalidAnalysis(format!(
            "{field} must be within [0, 1], got {value}"
        )))
    }
}

/// Wire shape of the classification reply. Every field is optional so that
/// elided fields can take defaults; wrong types still fail to deserialize.
#[derive(Debug, Deserialize)]
struct RawAnalysis {
    #[serde(default, alias = "complexity")]
    query_complexity: Option<f64>,
    #[serde(default)]
    relationship_intensity: Option<f64>,
    #[serde(default)]
    reasoning_required: Option<bool>,
    #[serde(default)]
    entity_count: Option<i64>,
    #[serde(default)]
    recommended_strategy: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default, alias = "rationale")]
    reasoning: Option<String>,
}

impl RawAnalysis {
    fn is_empty(&self) -> bool {
        self.query_complexity.is_none()
            && self.relationship_intensity.is_none()
            && self.reasoning_required.is_none()
            && self.entity_count.is_none()
            && self.recommended_strategy.is_none()
            && self.confidence.is_none()
            && self.reasoning.is_none()
    }
}

/// Slice out the outermost `{ ... }` of a reply, tolerating code fences and
/// surrounding prose.
fn extract_json_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}
