//! Deterministic clause pattern scanner.
//!
//! A pure function of the text plus the current registry: the same text
//! scanned twice against an unchanged registry yields identical matches.
//! Absence of matches is a valid, non-error outcome.

use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use regex::Regex;
use tracing::{debug, warn};

use crate::types::pattern::{CategoryStats, ClausePattern, PatternMatch, ScanStatistics};
use crate::types::RiskLevel;

/// Confidence boost for a keyword found inside the matched text.
pub const IN_HIT_KEYWORD_BOOST: i32 = 5;

/// Confidence boost for a keyword found in the surrounding context window.
pub const CONTEXT_KEYWORD_BOOST: i32 = 3;

/// Characters of context inspected on each side of a hit.
pub const CONTEXT_WINDOW_CHARS: usize = 50;

/// Penalty for hits shorter than [`SHORT_HIT_CHARS`] characters.
pub const SHORT_HIT_PENALTY: i32 = 10;

/// Hits below this length are penalized as weak evidence.
pub const SHORT_HIT_CHARS: usize = 20;

/// Registry of clause patterns keyed by rule id.
///
/// Read-mostly: scans take a snapshot of the current rules, so concurrent
/// scans never observe a half-applied mutation. Accessors return clones to
/// prevent external mutation of internal state.
#[derive(Debug, Clone, Default)]
pub struct PatternRegistry {
    patterns: Arc<RwLock<IndexMap<String, ClausePattern>>>,
}

impl PatternRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry seeded with the default clause patterns.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        for pattern in default_patterns() {
            registry.add(pattern);
        }
        registry
    }

    /// Register a pattern, replacing any existing rule with the same id.
    pub fn add(&self, pattern: ClausePattern) {
        self.patterns
            .write()
            .unwrap()
            .insert(pattern.id.clone(), pattern);
    }

    /// Remove every rule reporting the given category.
    ///
    /// Returns the number of rules removed.
    pub fn remove_category(&self, category: &str) -> usize {
        let mut patterns = self.patterns.write().unwrap();
        let before = patterns.len();
        patterns.retain(|_, p| p.category != category);
        before - patterns.len()
    }

    /// All registered categories, deduplicated, in registration order.
    pub fn categories(&self) -> Vec<String> {
        let patterns = self.patterns.read().unwrap();
        let mut seen = Vec::new();
        for pattern in patterns.values() {
            if !seen.contains(&pattern.category) {
                seen.push(pattern.category.clone());
            }
        }
        seen
    }

    /// Snapshot of all registered patterns.
    pub fn patterns(&self) -> Vec<ClausePattern> {
        self.patterns.read().unwrap().values().cloned().collect()
    }

    /// Number of registered patterns.
    pub fn len(&self) -> usize {
        self.patterns.read().unwrap().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.patterns.read().unwrap().is_empty()
    }

    /// Scan a text against every registered pattern.
    ///
    /// Returns matches ordered by confidence descending (ties broken by
    /// start offset). Each non-overlapping trigger hit produces one match.
    pub fn scan(&self, text: &str) -> Vec<PatternMatch> {
        let patterns = self.patterns();
        let mut matches = Vec::new();

        for pattern in &patterns {
            scan_pattern(text, pattern, &mut matches);
        }

        matches.sort_by(|a, b| {
            b.confidence
                .cmp(&a.confidence)
                .then(a.start.cmp(&b.start))
                .then(a.category.cmp(&b.category))
        });

        debug!(
            matches = matches.len(),
            patterns = patterns.len(),
            "pattern scan complete"
        );
        matches
    }

    /// Aggregate match statistics for a text.
    pub fn statistics(&self, text: &str) -> ScanStatistics {
        let matches = self.scan(text);
        let mut per_category: IndexMap<String, (usize, u32)> = IndexMap::new();

        for m in &matches {
            let entry = per_category.entry(m.category.clone()).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += u32::from(m.confidence);
        }

        let mut categories: Vec<CategoryStats> = per_category
            .into_iter()
            .map(|(category, (count, sum))| CategoryStats {
                category,
                match_count: count,
                mean_confidence: sum as f32 / count as f32,
            })
            .collect();
        categories.sort_by(|a, b| b.match_count.cmp(&a.match_count));

        ScanStatistics {
            total_matches: matches.len(),
            categories,
        }
    }

    /// Look up the default level for a category, if a rule reports it.
    pub fn level_for_category(&self, category: &str) -> Option<RiskLevel> {
        self.patterns
            .read()
            .unwrap()
            .values()
            .find(|p| p.category == category)
            .map(|p| p.default_level)
    }
}

/// Collect non-overlapping hits for one pattern.
fn scan_pattern(text: &str, pattern: &ClausePattern, out: &mut Vec<PatternMatch>) {
    let mut spans: Vec<(usize, usize)> = Vec::new();

    for trigger in &pattern.triggers {
        let regex = match Regex::new(trigger) {
            Ok(r) => r,
            Err(e) => {
                warn!(pattern = %pattern.id, trigger = %trigger, error = %e, "invalid trigger expression");
                continue;
            }
        };

        for hit in regex.find_iter(text) {
            let overlaps = spans
                .iter()
                .any(|&(s, e)| hit.start() < e && s < hit.end());
            if overlaps {
                continue;
            }
            spans.push((hit.start(), hit.end()));

            out.push(build_match(text, pattern, hit.start(), hit.end()));
        }
    }
}

/// Score one hit and build its match record.
fn build_match(text: &str, pattern: &ClausePattern, start: usize, end: usize) -> PatternMatch {
    let excerpt = &text[start..end];
    let excerpt_lower = excerpt.to_lowercase();

    let window_start = back_n_chars(text, start, CONTEXT_WINDOW_CHARS);
    let window_end = forward_n_chars(text, end, CONTEXT_WINDOW_CHARS);
    let window_lower = text[window_start..window_end].to_lowercase();

    let mut confidence = (pattern.weight.clamp(0.0, 1.0) * 100.0).round() as i32;
    let mut contributing = Vec::new();

    for keyword in &pattern.keywords {
        let keyword_lower = keyword.to_lowercase();
        if excerpt_lower.contains(&keyword_lower) {
            confidence += IN_HIT_KEYWORD_BOOST;
            contributing.push(keyword.clone());
        } else if window_lower.contains(&keyword_lower) {
            confidence += CONTEXT_KEYWORD_BOOST;
            contributing.push(keyword.clone());
        }
    }

    if excerpt.chars().count() < SHORT_HIT_CHARS {
        confidence -= SHORT_HIT_PENALTY;
    }

    PatternMatch {
        category: pattern.category.clone(),
        confidence: confidence.clamp(0, 100) as u8,
        start: char_offset(text, start),
        end: char_offset(text, end),
        excerpt: excerpt.to_string(),
        keywords: contributing,
    }
}

/// Character offset of a byte index.
fn char_offset(text: &str, byte_idx: usize) -> usize {
    text[..byte_idx].chars().count()
}

/// Byte index `n` characters before `byte_idx`.
fn back_n_chars(text: &str, byte_idx: usize, n: usize) -> usize {
    let mut idx = byte_idx;
    for _ in 0..n {
        match text[..idx].chars().next_back() {
            Some(c) => idx -= c.len_utf8(),
            None => break,
        }
    }
    idx
}

/// Byte index `n` characters after `byte_idx`.
fn forward_n_chars(text: &str, byte_idx: usize, n: usize) -> usize {
    let mut idx = byte_idx;
    for c in text[byte_idx..].chars().take(n) {
        idx += c.len_utf8();
    }
    idx
}

/// The seed pattern catalogue.
///
/// Oriented toward consumer terms-of-service and privacy-policy language,
/// with a mobile-gaming emphasis (virtual goods, auto-renewal).
pub fn default_patterns() -> Vec<ClausePattern> {
    vec![
        ClausePattern::new("account-termination", "account-termination", RiskLevel::High, 0.75)
            .with_trigger(r"(?i)(?:terminate|suspend|deactivate)[^.]{0,60}?\baccounts?\b")
            .with_trigger(r"(?i)\baccounts?\b[^.]{0,40}?(?:termination|suspension)")
            .with_keyword("terminate")
            .with_keyword("suspend")
            .with_keyword("without notice")
            .with_keyword("any time")
            .with_keyword("sole discretion"),
        ClausePattern::new("unilateral-changes", "unilateral-changes", RiskLevel::Medium, 0.6)
            .with_trigger(r"(?i)(?:modify|change|amend|update)[^.]{0,60}?(?:these terms|this agreement|the service)")
            .with_trigger(r"(?i)at\s+(?:our|its)\s+sole\s+discretion")
            .with_keyword("without notice")
            .with_keyword("sole discretion")
            .with_keyword("modify")
            .with_keyword("any time"),
        ClausePattern::new("liability-waiver", "liability-waiver", RiskLevel::High, 0.7)
            .with_trigger(r"(?i)(?:disclaim|waive)[^.]{0,60}?(?:liability|warranties)")
            .with_trigger(r"(?i)not\s+(?:be\s+)?liable\s+for")
            .with_trigger(r#"(?i)provided\s+"?as[- ]is"?"#)
            .with_keyword("indemnify")
            .with_keyword("damages")
            .with_keyword("consequential")
            .with_keyword("waive"),
        ClausePattern::new("dispute-resolution", "dispute-resolution", RiskLevel::High, 0.65)
            .with_trigger(r"(?i)binding\s+arbitration")
            .with_trigger(r"(?i)class[- ]action\s+waiver")
            .with_trigger(r"(?i)waive[^.]{0,40}?jury\s+trial")
            .with_keyword("arbitration")
            .with_keyword("waive")
            .with_keyword("dispute")
            .with_keyword("individual basis"),
        ClausePattern::new("data-sharing", "data-sharing", RiskLevel::High, 0.65)
            .with_trigger(r"(?i)(?:share|sell|disclose)[^.]{0,60}?(?:personal\s+(?:data|information)|your\s+(?:data|information))")
            .with_trigger(r"(?i)third[- ]party\s+(?:partners|advertisers|affiliates)")
            .with_keyword("third party")
            .with_keyword("advertisers")
            .with_keyword("affiliates")
            .with_keyword("consent"),
        ClausePattern::new("auto-renewal", "auto-renewal", RiskLevel::Medium, 0.55)
            .with_trigger(r"(?i)automatic(?:ally)?\s+renew")
            .with_trigger(r"(?i)recurring\s+(?:charge|billing|payment)")
            .with_keyword("cancel")
            .with_keyword("billing")
            .with_keyword("subscription")
            .with_keyword("renewal"),
        ClausePattern::new("virtual-goods-forfeiture", "virtual-goods-forfeiture", RiskLevel::Medium, 0.6)
            .with_trigger(r"(?i)(?:virtual|in[- ]game)\s+(?:currency|items?|goods)[^.]{0,80}?(?:forfeit|no\s+refund|no\s+monetary\s+value|lose|lost)")
            .with_trigger(r"(?i)no\s+refunds?\b")
            .with_keyword("forfeit")
            .with_keyword("no refund")
            .with_keyword("virtual currency")
            .with_keyword("license"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const TERMINATION_SENTENCE: &str =
        "We reserve the right to terminate your account at any time without notice.";

    #[test]
    fn test_termination_scenario() {
        let registry = PatternRegistry::with_defaults();
        let matches = registry.scan(TERMINATION_SENTENCE);

        let termination: Vec<_> = matches
            .iter()
            .filter(|m| m.category == "account-termination")
            .collect();
        assert_eq!(termination.len(), 1);
        assert!(
            termination[0].confidence >= 70,
            "confidence was {}",
            termination[0].confidence
        );
        assert!(termination[0].excerpt.contains("terminate"));
    }

    #[test]
    fn test_scan_is_idempotent() {
        let registry = PatternRegistry::with_defaults();
        let text = "You agree to binding arbitration. We may share your personal data with \
                    third-party advertisers. Subscriptions automatically renew.";

        let first = registry.scan(text);
        let second = registry.scan(text);
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn test_matches_ordered_by_confidence() {
        let registry = PatternRegistry::with_defaults();
        let text = "We may terminate your account without notice. Payments automatically renew.";

        let matches = registry.scan(text);
        for pair in matches.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[test]
    fn test_no_matches_is_not_an_error() {
        let registry = PatternRegistry::with_defaults();
        let matches = registry.scan("The weather is pleasant today.");
        assert!(matches.is_empty());
    }

    #[test]
    fn test_short_hit_penalty() {
        let registry = PatternRegistry::new();
        registry.add(
            ClausePattern::new("short", "short-clause", RiskLevel::Low, 0.5)
                .with_trigger(r"(?i)waiver"),
        );

        let matches = registry.scan("A waiver applies.");
        assert_eq!(matches.len(), 1);
        // base 50, short-hit penalty 10
        assert_eq!(matches[0].confidence, 40);
    }

    #[test]
    fn test_keyword_boosts() {
        let registry = PatternRegistry::new();
        registry.add(
            ClausePattern::new("boost", "boost-test", RiskLevel::Low, 0.5)
                .with_trigger(r"(?i)terminate your account entirely")
                .with_keyword("terminate")
                .with_keyword("without notice"),
        );

        // In-hit keyword "terminate" (+5) and window keyword "without notice" (+3).
        let matches = registry.scan("We terminate your account entirely and without notice.");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].confidence, 58);
        assert_eq!(matches[0].keywords.len(), 2);
    }

    #[test]
    fn test_overlapping_hits_collapse() {
        let registry = PatternRegistry::new();
        registry.add(
            ClausePattern::new("overlap", "overlap-test", RiskLevel::Low, 0.5)
                .with_trigger(r"(?i)terminate your account")
                .with_trigger(r"(?i)terminate"),
        );

        let matches = registry.scan("We may terminate your account.");
        // Second trigger's hit overlaps the first span and is dropped.
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_remove_category() {
        let registry = PatternRegistry::with_defaults();
        let before = registry.len();

        let removed = registry.remove_category("auto-renewal");
        assert_eq!(removed, 1);
        assert_eq!(registry.len(), before - 1);
        assert!(!registry.categories().contains(&"auto-renewal".to_string()));

        let matches = registry.scan("Your plan will automatically renew each month.");
        assert!(matches.iter().all(|m| m.category != "auto-renewal"));
    }

    #[test]
    fn test_statistics() {
        let registry = PatternRegistry::with_defaults();
        let text = "We may terminate your account. We may suspend your account at any time.";

        let stats = registry.statistics(text);
        assert!(stats.total_matches >= 2);
        let termination = stats
            .categories
            .iter()
            .find(|c| c.category == "account-termination")
            .expect("termination stats present");
        assert!(termination.match_count >= 2);
        assert!(termination.mean_confidence > 0.0);
    }

    #[test]
    fn test_invalid_trigger_is_skipped() {
        let registry = PatternRegistry::new();
        registry.add(
            ClausePattern::new("bad", "bad-regex", RiskLevel::Low, 0.5)
                .with_trigger(r"(?i)[unclosed")
                .with_trigger(r"(?i)valid trigger"),
        );

        let matches = registry.scan("This contains a valid trigger phrase.");
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_offsets_are_char_based() {
        let registry = PatternRegistry::new();
        registry.add(
            ClausePattern::new("pos", "position-test", RiskLevel::Low, 0.5)
                .with_trigger(r"terminate your account"),
        );

        // Multibyte character before the hit shifts byte offsets but not
        // character offsets.
        let text = "§§ we terminate your account today";
        let matches = registry.scan(text);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].start, 6);
        assert_eq!(matches[0].end, 6 + "terminate your account".chars().count());
    }
}
