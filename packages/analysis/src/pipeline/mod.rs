//! The Analyzer - main entry point for the risk analysis pipeline.
//!
//! Sequences the deterministic scan, prompt construction, model call, and
//! response parsing into one best-effort report. Every step is timed and
//! individually allowed to fail; only input validation aborts the run, and
//! even then the caller receives a well-formed degraded result rather than
//! an error. Severity is communicated through scores, confidence, and
//! limitations, never through exceptions.

use std::collections::HashSet;
use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::InputError;
use crate::invocation::{InvocationClient, InvocationOutcome};
use crate::parser::{ParsedAnalysis, ParserConfig, ResponseParser, ValidationContext};
use crate::patterns::PatternRegistry;
use crate::prompt::{PromptBuilder, PromptOptions, TemplateRegistry};
use crate::traits::model::ModelProvider;
use crate::types::{
    AnalysisInput, AnalysisPrompt, AnalysisResult, AnalysisSummary, AnalyzerConfig,
    CategoryBreakdown, PatternMatch, PipelineStep, RiskAssessment, RiskLevel, RiskLevelCounts,
    RiskProvenance, StepDiagnostic,
};

/// The main entry point: a configured risk analysis pipeline around a
/// model provider.
///
/// # Example
///
/// ```rust,ignore
/// use analysis::{Analyzer, AnalysisInput};
/// use analysis::testing::MockModel;
///
/// let analyzer = Analyzer::new(MockModel::new());
/// let input = AnalysisInput::from_text("We may terminate your account at any time.");
/// let result = analyzer.analyze(&input).await;
/// println!("overall risk: {}", result.overall_risk_score);
/// ```
pub struct Analyzer<P: ModelProvider> {
    patterns: PatternRegistry,
    prompt_builder: PromptBuilder,
    client: InvocationClient<P>,
    parser: ResponseParser,
    config: AnalyzerConfig,
}

impl<P: ModelProvider> Analyzer<P> {
    /// Create an analyzer with default configuration and seed patterns.
    pub fn new(provider: P) -> Self {
        Self::with_config(provider, AnalyzerConfig::default())
    }

    /// Create an analyzer with custom configuration.
    pub fn with_config(provider: P, config: AnalyzerConfig) -> Self {
        let parser = ResponseParser::with_config(
            ParserConfig::new().with_strict_mode(config.strict_parsing),
        );
        Self {
            patterns: PatternRegistry::with_defaults(),
            prompt_builder: PromptBuilder::new(),
            client: InvocationClient::new(provider),
            parser,
            config,
        }
    }

    /// The clause pattern registry.
    pub fn patterns(&self) -> &PatternRegistry {
        &self.patterns
    }

    /// The prompt template registry.
    pub fn templates(&self) -> &TemplateRegistry {
        self.prompt_builder.templates()
    }

    /// The response parser (rule registry lives here).
    pub fn parser(&self) -> &ResponseParser {
        &self.parser
    }

    /// The underlying model provider.
    pub fn provider(&self) -> &P {
        self.client.provider()
    }

    /// The configuration.
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Run one analysis.
    pub async fn analyze(&self, input: &AnalysisInput) -> AnalysisResult {
        self.analyze_inner(input, &CancellationToken::new()).await
    }

    /// Run one analysis with cancellation support.
    ///
    /// Cancelling aborts any in-flight model call, skips remaining retries,
    /// and resolves to a degraded result.
    pub async fn analyze_with_cancel(
        &self,
        input: &AnalysisInput,
        cancel: CancellationToken,
    ) -> AnalysisResult {
        tokio::select! {
            result = self.analyze_inner(input, &cancel) => result,
            _ = cancel.cancelled() => {
                AnalysisResult::degraded("Analysis was cancelled before completion", vec![])
            }
        }
    }

    async fn analyze_inner(
        &self,
        input: &AnalysisInput,
        cancel: &CancellationToken,
    ) -> AnalysisResult {
        let started = Instant::now();
        let mut steps: Vec<StepDiagnostic> = Vec::new();
        let mut extra_limitations: Vec<String> = Vec::new();

        // Input validation is the only fatal step.
        let step_start = Instant::now();
        if let Err(error) = self.validate_input(input) {
            warn!(error = %error, "input validation failed");
            steps.push(StepDiagnostic::failed(
                PipelineStep::ValidateInput,
                elapsed_ms(step_start),
                error.to_string(),
            ));
            let mut result = AnalysisResult::degraded(error.to_string(), steps);
            result.duration_ms = elapsed_ms(started);
            return result;
        }
        steps.push(StepDiagnostic::ok(
            PipelineStep::ValidateInput,
            elapsed_ms(step_start),
        ));

        // Deterministic pattern scan.
        let mut matches: Vec<PatternMatch> = Vec::new();
        if self.config.enable_pattern_scan {
            let step_start = Instant::now();
            matches = self.patterns.scan(&input.text);
            debug!(matches = matches.len(), "pattern scan finished");
            steps.push(StepDiagnostic::ok(
                PipelineStep::PatternScan,
                elapsed_ms(step_start),
            ));
        }

        // Prompt construction.
        let mut prompt: Option<AnalysisPrompt> = None;
        if self.config.enable_model_analysis {
            let step_start = Instant::now();
            match self.build_prompt(input, &matches) {
                Ok(built) => {
                    prompt = Some(built);
                    steps.push(StepDiagnostic::ok(
                        PipelineStep::BuildPrompt,
                        elapsed_ms(step_start),
                    ));
                }
                Err(error) => {
                    warn!(error = %error, "prompt construction failed");
                    steps.push(StepDiagnostic::failed(
                        PipelineStep::BuildPrompt,
                        elapsed_ms(step_start),
                        error.to_string(),
                    ));
                }
            }
        }

        // Model invocation.
        let mut raw_response = None;
        if self.config.enable_model_analysis {
            let step_start = Instant::now();
            match &prompt {
                Some(prompt) => {
                    let outcome = self
                        .client
                        .invoke(&prompt.render(), &self.config.invoke, cancel)
                        .await;
                    match outcome {
                        InvocationOutcome::Succeeded(response) => {
                            raw_response = Some(response);
                            steps.push(StepDiagnostic::ok(
                                PipelineStep::InvokeModel,
                                elapsed_ms(step_start),
                            ));
                        }
                        InvocationOutcome::Failed(failure) => {
                            steps.push(StepDiagnostic::failed(
                                PipelineStep::InvokeModel,
                                elapsed_ms(step_start),
                                format!(
                                    "{} (after {} attempt(s))",
                                    failure.user_message(),
                                    failure.attempts
                                ),
                            ));
                        }
                    }
                }
                None => {
                    steps.push(StepDiagnostic::failed(
                        PipelineStep::InvokeModel,
                        0,
                        "skipped: no prompt available",
                    ));
                }
            }
        }

        // Parse and validate the reply; degrade gracefully on failure.
        let mut model_analysis: Option<ParsedAnalysis> = None;
        if let Some(response) = &raw_response {
            let step_start = Instant::now();
            let ctx = ValidationContext::new(input.content_length);
            match self.parser.parse(response, &ctx) {
                Ok(parsed) => {
                    if parsed.has_issues() {
                        extra_limitations.push(format!(
                            "The AI response required {} correction(s) during validation; \
                             confidence was reduced accordingly.",
                            parsed.issues.len()
                        ));
                    }
                    model_analysis = Some(parsed);
                    steps.push(StepDiagnostic::ok(
                        PipelineStep::ParseResponse,
                        elapsed_ms(step_start),
                    ));
                }
                Err(error) => {
                    warn!(error = %error, "response parsing failed, using fallback");
                    model_analysis = Some(
                        self.parser
                            .fallback_analysis(&response.text, input.content_length),
                    );
                    steps.push(StepDiagnostic::failed(
                        PipelineStep::ParseResponse,
                        elapsed_ms(step_start),
                        error.to_string(),
                    ));
                }
            }
        }

        // Merge pattern- and model-derived findings.
        let step_start = Instant::now();
        let pattern_assessments: Vec<RiskAssessment> = matches
            .iter()
            .map(|m| self.pattern_assessment(m))
            .collect();
        let model_assessments = model_analysis
            .map(|parsed| parsed.assessments)
            .unwrap_or_default();
        let assessments = merge_assessments(pattern_assessments, model_assessments);
        steps.push(StepDiagnostic::ok(PipelineStep::Merge, elapsed_ms(step_start)));

        // Aggregates.
        let overall_risk_score = aggregate_score(&assessments);
        let overall_risk_level = RiskLevel::from_score(overall_risk_score);
        let overall_confidence = aggregate_confidence(&assessments, &steps);

        let summary = build_summary(&assessments, &steps, extra_limitations);

        let result = AnalysisResult {
            analysis_id: Uuid::new_v4(),
            overall_risk_score,
            overall_risk_level,
            overall_confidence,
            risk_assessments: assessments,
            summary,
            steps,
            duration_ms: elapsed_ms(started),
            analyzed_at: Utc::now(),
        };

        info!(
            analysis_id = %result.analysis_id,
            overall_risk = result.overall_risk_score,
            findings = result.risk_assessments.len(),
            duration_ms = result.duration_ms,
            "analysis complete"
        );
        result
    }

    /// Validate the input contract from the anonymization step.
    fn validate_input(&self, input: &AnalysisInput) -> Result<(), InputError> {
        if input.text.trim().is_empty() {
            return Err(InputError::EmptyContent);
        }

        if input.content_hash.len() != 64
            || !input.content_hash.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(InputError::InvalidHash {
                reason: "expected a 64-character hex digest".to_string(),
            });
        }

        let actual = input.text.chars().count();
        if input.content_length != actual {
            return Err(InputError::LengthMismatch {
                declared: input.content_length,
                actual,
            });
        }

        if input.content_length > self.config.max_content_length {
            return Err(InputError::Oversized {
                actual: input.content_length,
                max: self.config.max_content_length,
            });
        }

        Ok(())
    }

    /// Build the prompt via the configured template or the section builder.
    fn build_prompt(
        &self,
        input: &AnalysisInput,
        matches: &[PatternMatch],
    ) -> Result<AnalysisPrompt, crate::error::PromptError> {
        match &self.config.template_id {
            Some(template_id) => self.prompt_builder.build_from_template(
                template_id,
                &input.text,
                &[
                    ("document_type", self.config.document_type.as_str()),
                    ("industry", self.config.industry.as_str()),
                ],
            ),
            None => {
                let matched_categories: HashSet<&str> =
                    matches.iter().map(|m| m.category.as_str()).collect();
                let hints = self
                    .patterns
                    .patterns()
                    .into_iter()
                    .filter(|p| matched_categories.contains(p.category.as_str()))
                    .collect();

                let options = PromptOptions::new()
                    .with_document_type(self.config.document_type)
                    .with_industry(self.config.industry)
                    .with_depth(self.config.depth)
                    .with_pattern_hints(hints);
                self.prompt_builder.build(&input.text, matches, &options)
            }
        }
    }

    /// Synthesize an assessment from a scanner match.
    ///
    /// Risk score comes from the level's default table; confidence is the
    /// scanner's own confidence in the hit.
    fn pattern_assessment(&self, m: &PatternMatch) -> RiskAssessment {
        let level = self
            .patterns
            .level_for_category(&m.category)
            .unwrap_or(RiskLevel::Medium);

        let rationale = if m.keywords.is_empty() {
            format!("Deterministic scan matched: \"{}\"", m.excerpt.trim())
        } else {
            format!(
                "Deterministic scan matched: \"{}\" (supporting keywords: {})",
                m.excerpt.trim(),
                m.keywords.join(", ")
            )
        };

        RiskAssessment::new(
            m.category.clone(),
            level,
            level.default_score(),
            m.confidence,
            RiskProvenance::PatternMatching,
        )
        .with_summary(format!("Matched clause pattern '{}'", m.category))
        .with_rationale(rationale)
        .with_span(m.start, m.end)
    }
}

/// Milliseconds elapsed since `start`.
fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Merge pattern-derived and model-derived findings.
///
/// Model entries pass through unchanged except for provenance: a category
/// the scanner also flagged is upgraded to `hybrid`, and the scanner's
/// duplicate is dropped. Pattern entries for categories the model missed
/// are kept as-is. Ordered by risk score, then confidence, descending.
pub fn merge_assessments(
    pattern_derived: Vec<RiskAssessment>,
    model_derived: Vec<RiskAssessment>,
) -> Vec<RiskAssessment> {
    let pattern_categories: HashSet<String> = pattern_derived
        .iter()
        .map(|a| a.category.clone())
        .collect();

    let mut merged: Vec<RiskAssessment> = model_derived
        .into_iter()
        .map(|mut assessment| {
            if pattern_categories.contains(&assessment.category) {
                assessment.provenance = RiskProvenance::Hybrid;
            }
            assessment
        })
        .collect();

    let model_categories: HashSet<String> =
        merged.iter().map(|a| a.category.clone()).collect();

    merged.extend(
        pattern_derived
            .into_iter()
            .filter(|a| !model_categories.contains(&a.category)),
    );

    merged.sort_by(|a, b| {
        b.risk_score
            .cmp(&a.risk_score)
            .then(b.confidence_score.cmp(&a.confidence_score))
            .then(a.category.cmp(&b.category))
    });
    merged
}

/// Arithmetic mean of assessment scores, 0 when there are none.
pub fn aggregate_score(assessments: &[RiskAssessment]) -> u8 {
    if assessments.is_empty() {
        return 0;
    }
    let sum: u32 = assessments.iter().map(|a| u32::from(a.risk_score)).sum();
    (f64::from(sum) / assessments.len() as f64).round() as u8
}

/// Mean assessment confidence weighted by the fraction of steps that
/// succeeded.
pub fn aggregate_confidence(assessments: &[RiskAssessment], steps: &[StepDiagnostic]) -> u8 {
    if assessments.is_empty() || steps.is_empty() {
        return 0;
    }
    let sum: u32 = assessments
        .iter()
        .map(|a| u32::from(a.confidence_score))
        .sum();
    let mean = f64::from(sum) / assessments.len() as f64;

    let succeeded = steps.iter().filter(|s| s.success).count();
    let fraction = succeeded as f64 / steps.len() as f64;

    (mean * fraction).round().clamp(0.0, 100.0) as u8
}

/// Build the human-oriented summary block.
fn build_summary(
    assessments: &[RiskAssessment],
    steps: &[StepDiagnostic],
    extra_limitations: Vec<String>,
) -> AnalysisSummary {
    let mut level_counts = RiskLevelCounts::default();
    for assessment in assessments {
        level_counts.increment(assessment.risk_level);
    }

    // Top categories by count, then by average risk.
    let mut per_category: indexmap::IndexMap<&str, (usize, u32)> = indexmap::IndexMap::new();
    for assessment in assessments {
        let entry = per_category
            .entry(assessment.category.as_str())
            .or_insert((0, 0));
        entry.0 += 1;
        entry.1 += u32::from(assessment.risk_score);
    }
    let mut top_categories: Vec<CategoryBreakdown> = per_category
        .into_iter()
        .map(|(category, (count, sum))| CategoryBreakdown {
            category: category.to_string(),
            count,
            average_risk: (f64::from(sum) / count as f64).round() as u8,
        })
        .collect();
    top_categories.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then(b.average_risk.cmp(&a.average_risk))
    });
    top_categories.truncate(5);

    let mut limitations: Vec<String> = steps
        .iter()
        .filter(|s| !s.success)
        .map(|s| limitation_for_step(s))
        .collect();
    limitations.extend(extra_limitations);

    AnalysisSummary {
        level_counts,
        top_categories,
        limitations,
        recommended_actions: recommended_actions(&level_counts, steps),
    }
}

/// Human-readable limitation for a failed step.
fn limitation_for_step(step: &StepDiagnostic) -> String {
    let detail = step.error.as_deref().unwrap_or("unknown error");
    match step.step {
        PipelineStep::BuildPrompt => format!("Prompt construction failed: {}", detail),
        PipelineStep::InvokeModel => format!(
            "AI analysis was unavailable: {}. Findings rely on deterministic pattern \
             matching only.",
            detail
        ),
        PipelineStep::ParseResponse => format!(
            "The AI response could not be fully parsed ({}); a low-confidence fallback \
             estimate was used instead.",
            detail
        ),
        other => format!("{} step failed: {}", other.as_str(), detail),
    }
}

/// Recommended actions keyed off the severity mix.
fn recommended_actions(counts: &RiskLevelCounts, steps: &[StepDiagnostic]) -> Vec<String> {
    let mut actions = Vec::new();

    if counts.critical > 0 {
        actions.push(
            "At least one critical risk was identified; consult legal counsel before \
             accepting these terms."
                .to_string(),
        );
    } else if counts.high > 0 {
        actions.push("Review the identified high-risk clauses carefully before accepting.".to_string());
    } else if counts.medium > 0 {
        actions.push("Review the flagged clauses before accepting.".to_string());
    } else {
        actions.push("No significant risks detected; standard caution applies.".to_string());
    }

    let invoke_failed = steps
        .iter()
        .any(|s| s.step == PipelineStep::InvokeModel && !s.success);
    if invoke_failed {
        actions.push("Retry the analysis later for AI-backed findings.".to_string());
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assessment(
        category: &str,
        level: RiskLevel,
        score: u8,
        confidence: u8,
        provenance: RiskProvenance,
    ) -> RiskAssessment {
        RiskAssessment::new(category, level, score, confidence, provenance)
    }

    #[test]
    fn test_merge_tags_hybrid_and_drops_duplicates() {
        let pattern = vec![
            assessment(
                "account-termination",
                RiskLevel::High,
                70,
                86,
                RiskProvenance::PatternMatching,
            ),
            assessment(
                "auto-renewal",
                RiskLevel::Medium,
                50,
                60,
                RiskProvenance::PatternMatching,
            ),
        ];
        let model = vec![assessment(
            "account-termination",
            RiskLevel::High,
            75,
            85,
            RiskProvenance::AiAnalysis,
        )];

        let merged = merge_assessments(pattern, model);
        assert_eq!(merged.len(), 2);

        let termination = merged
            .iter()
            .find(|a| a.category == "account-termination")
            .unwrap();
        assert_eq!(termination.provenance, RiskProvenance::Hybrid);
        assert_eq!(termination.risk_score, 75); // model entry kept

        let renewal = merged.iter().find(|a| a.category == "auto-renewal").unwrap();
        assert_eq!(renewal.provenance, RiskProvenance::PatternMatching);
    }

    #[test]
    fn test_merge_orders_by_score() {
        let merged = merge_assessments(
            vec![assessment("low", RiskLevel::Low, 20, 50, RiskProvenance::PatternMatching)],
            vec![
                assessment("high", RiskLevel::High, 70, 50, RiskProvenance::AiAnalysis),
                assessment("mid", RiskLevel::Medium, 50, 50, RiskProvenance::AiAnalysis),
            ],
        );

        let scores: Vec<u8> = merged.iter().map(|a| a.risk_score).collect();
        assert_eq!(scores, vec![70, 50, 20]);
    }

    #[test]
    fn test_aggregate_score_empty_and_boundaries() {
        assert_eq!(aggregate_score(&[]), 0);

        for (score, expected) in [
            (39u8, RiskLevel::Low),
            (40, RiskLevel::Medium),
            (59, RiskLevel::Medium),
            (60, RiskLevel::High),
            (79, RiskLevel::High),
            (80, RiskLevel::Critical),
        ] {
            let assessments = vec![assessment(
                "x",
                RiskLevel::from_score(score),
                score,
                50,
                RiskProvenance::AiAnalysis,
            )];
            let aggregate = aggregate_score(&assessments);
            assert_eq!(aggregate, score);
            assert_eq!(RiskLevel::from_score(aggregate), expected);
        }
    }

    #[test]
    fn test_aggregate_confidence_weighted_by_step_success() {
        let assessments = vec![
            assessment("a", RiskLevel::Medium, 50, 80, RiskProvenance::AiAnalysis),
            assessment("b", RiskLevel::Medium, 50, 60, RiskProvenance::AiAnalysis),
        ];

        let all_ok = vec![
            StepDiagnostic::ok(PipelineStep::ValidateInput, 1),
            StepDiagnostic::ok(PipelineStep::PatternScan, 1),
        ];
        assert_eq!(aggregate_confidence(&assessments, &all_ok), 70);

        let half_failed = vec![
            StepDiagnostic::ok(PipelineStep::ValidateInput, 1),
            StepDiagnostic::failed(PipelineStep::InvokeModel, 1, "down"),
        ];
        assert_eq!(aggregate_confidence(&assessments, &half_failed), 35);

        assert_eq!(aggregate_confidence(&[], &all_ok), 0);
    }

    #[test]
    fn test_summary_actions_by_severity() {
        let mut counts = RiskLevelCounts::default();
        counts.increment(RiskLevel::Critical);
        let actions = recommended_actions(&counts, &[]);
        assert!(actions[0].contains("consult legal counsel"));

        let mut counts = RiskLevelCounts::default();
        counts.increment(RiskLevel::High);
        let actions = recommended_actions(&counts, &[]);
        assert!(actions[0].contains("high-risk"));

        let counts = RiskLevelCounts::default();
        let actions = recommended_actions(&counts, &[]);
        assert!(actions[0].contains("No significant risks"));
    }

    #[test]
    fn test_summary_limitations_from_failed_steps() {
        let steps = vec![
            StepDiagnostic::ok(PipelineStep::ValidateInput, 1),
            StepDiagnostic::failed(PipelineStep::InvokeModel, 1, "service unreachable"),
        ];

        let summary = build_summary(&[], &steps, vec![]);
        assert_eq!(summary.limitations.len(), 1);
        assert!(summary.limitations[0].contains("service unreachable"));
        assert!(summary
            .recommended_actions
            .iter()
            .any(|a| a.contains("Retry the analysis")));
    }

    #[test]
    fn test_top_categories_capped_at_five() {
        let assessments: Vec<RiskAssessment> = (0..8)
            .map(|i| {
                assessment(
                    &format!("category-{}", i),
                    RiskLevel::Medium,
                    50,
                    50,
                    RiskProvenance::AiAnalysis,
                )
            })
            .collect();

        let summary = build_summary(&assessments, &[], vec![]);
        assert_eq!(summary.top_categories.len(), 5);
        assert_eq!(summary.level_counts.medium, 8);
    }
}
