//! Clause pattern types - the rules and findings of the deterministic scanner.

use serde::{Deserialize, Serialize};

use super::assessment::{normalize_category, RiskLevel};

/// A named, weighted rule that flags a kind of risky contract language.
///
/// Patterns are plain data: trigger expressions (regex), keywords that
/// boost confidence, and a relative weight. Immutable once registered;
/// replaced wholesale through the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClausePattern {
    /// Unique rule id (registry key)
    pub id: String,

    /// Lowercase kebab-case category this rule reports
    pub category: String,

    /// Level assigned to findings synthesized from this rule
    pub default_level: RiskLevel,

    /// Trigger regular expressions; each non-overlapping hit produces a match
    #[serde(default)]
    pub triggers: Vec<String>,

    /// Keywords that boost confidence when found in or near a hit
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Relative weight (0.0 to 1.0); base confidence = weight x 100
    pub weight: f32,
}

impl ClausePattern {
    /// Create a new pattern.
    pub fn new(
        id: impl Into<String>,
        category: impl Into<String>,
        default_level: RiskLevel,
        weight: f32,
    ) -> Self {
        Self {
            id: id.into(),
            category: normalize_category(&category.into()),
            default_level,
            triggers: Vec::new(),
            keywords: Vec::new(),
            weight: weight.clamp(0.0, 1.0),
        }
    }

    /// Add a trigger expression.
    pub fn with_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.triggers.push(trigger.into());
        self
    }

    /// Add a confidence keyword.
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keywords.push(keyword.into());
        self
    }
}

/// A candidate finding produced by one scan.
///
/// Ephemeral: created fresh per scan and never persisted by this library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternMatch {
    /// Category of the rule that fired
    pub category: String,

    /// Scanner confidence in this finding (0-100)
    pub confidence: u8,

    /// Character offset where the hit starts
    pub start: usize,

    /// Character offset where the hit ends
    pub end: usize,

    /// The matched text
    pub excerpt: String,

    /// Keywords that contributed to the confidence boost
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Per-category aggregate over one scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryStats {
    /// Category name
    pub category: String,

    /// Number of matches in this category
    pub match_count: usize,

    /// Mean confidence across those matches
    pub mean_confidence: f32,
}

/// Aggregate statistics for one scan of a text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanStatistics {
    /// Total matches across all categories
    pub total_matches: usize,

    /// Per-category breakdown, ordered by match count descending
    pub categories: Vec<CategoryStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_builder_normalizes() {
        let pattern = ClausePattern::new("p1", "Account Termination", RiskLevel::High, 1.5)
            .with_trigger(r"(?i)terminate")
            .with_keyword("without notice");

        assert_eq!(pattern.category, "account-termination");
        assert_eq!(pattern.weight, 1.0); // clamped
        assert_eq!(pattern.triggers.len(), 1);
        assert_eq!(pattern.keywords.len(), 1);
    }
}
