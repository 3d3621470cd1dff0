//! Prompt construction for the risk analysis model call.
//!
//! The builder assembles a fixed sequence of sections: role preamble,
//! document-type and industry guidance, preliminary scanner findings,
//! depth instructions, the document itself, a strict output-format
//! specification, and validation reminders. A template-registry variant
//! supports caller-managed prompts with `{{variable}}` substitution.

pub mod templates;

use chrono::Utc;
use tracing::debug;

use crate::error::PromptError;
use crate::types::pattern::{ClausePattern, PatternMatch};
use crate::types::prompt::{AnalysisDepth, AnalysisPrompt, DocumentType, Industry};

pub use templates::{PromptTemplate, TemplateRegistry, DEFAULT_TEMPLATE_ID};

/// Maximum rendered prompt length in characters.
pub const MAX_PROMPT_CHARS: usize = 32_000;

/// How many scanner findings are summarized in the prompt.
pub const MAX_PRELIMINARY_FINDINGS: usize = 5;

/// Role and capability preamble sent as the system instruction.
pub const SYSTEM_PREAMBLE: &str = r#"You are an expert contract analyst specializing in consumer-facing legal documents. You identify clauses that are unusual, one-sided, or risky for the end user.

Constraints:
- Be objective. Describe risk; do not advocate.
- You are not providing legal advice and must not frame findings as such.
- Only report what the document actually says. Do not speculate about intent.
- If the document contains no notable risks, say so."#;

/// Strict output-format specification embedded in every prompt.
pub const OUTPUT_FORMAT_SPEC: &str = r#"Reply with a single JSON object and nothing else, in exactly this shape:

{
  "overallRiskScore": <integer 0-100>,
  "riskLevel": "low" | "medium" | "high" | "critical",
  "confidenceScore": <integer 0-100>,
  "riskAssessments": [
    {
      "category": <lowercase kebab-case string>,
      "riskLevel": "low" | "medium" | "high" | "critical",
      "riskScore": <integer 0-100>,
      "confidenceScore": <integer 0-100>,
      "summary": <string>,
      "rationale": <string>,
      "suggestedAction": <string, optional>,
      "startPosition": <integer character offset>,
      "endPosition": <integer character offset>
    }
  ]
}"#;

/// Numeric-bound and naming reminders appended after the format spec.
pub const VALIDATION_REMINDERS: &str = r#"Validation reminders:
- Every score and confidence value must be an integer between 0 and 100.
- riskLevel must follow the score: >= 80 critical, >= 60 high, >= 40 medium, otherwise low.
- Category names are lowercase kebab-case (e.g., "account-termination").
- startPosition and endPosition are character offsets into the provided document, with startPosition <= endPosition.
- riskAssessments must always be an array, even when empty."#;

/// Statement used when the scanner found nothing.
pub const NO_FINDINGS_STATEMENT: &str =
    "No obvious risk patterns were detected by the preliminary scan.";

const BASIC_DEPTH_INSTRUCTIONS: &str = "Analysis depth: basic. Report only the most significant \
risks; two or three findings at most. Keep rationales to one sentence.";

const DETAILED_DEPTH_INSTRUCTIONS: &str = "Analysis depth: detailed. Review the document clause \
by clause and report every materially risky term. Explain each rationale in two or three \
sentences and suggest a concrete follow-up action where one exists.";

const COMPREHENSIVE_DEPTH_INSTRUCTIONS: &str = "Analysis depth: comprehensive. Review every \
clause, including boilerplate. Consider how clauses interact (e.g., termination combined with \
forfeiture of paid content). Report edge cases and ambiguities as findings with lower \
confidence rather than omitting them.";

/// Document-type guidance, keyed by [`DocumentType`].
pub fn document_type_section(document_type: DocumentType) -> &'static str {
    match document_type {
        DocumentType::TermsOfService => {
            "Document type: terms of service. Pay particular attention to account termination, \
             unilateral modification, content licensing, and dispute resolution clauses."
        }
        DocumentType::PrivacyPolicy => {
            "Document type: privacy policy. Pay particular attention to data collection scope, \
             third-party sharing, retention periods, and consent mechanics."
        }
        DocumentType::CookiePolicy => {
            "Document type: cookie policy. Pay particular attention to tracking technologies, \
             third-party cookies, and opt-out availability."
        }
        DocumentType::UserAgreement => {
            "Document type: user agreement. Pay particular attention to obligations imposed on \
             the user, acceptable-use restrictions, and penalties for breach."
        }
        DocumentType::EndUserLicense => {
            "Document type: end-user license agreement. Pay particular attention to license \
             scope, restrictions on use, and termination of the license."
        }
    }
}

/// Industry guidance, keyed by [`Industry`].
pub fn industry_section(industry: Industry) -> &'static str {
    match industry {
        Industry::MobileGaming => {
            "Industry context: mobile gaming. Watch for virtual currency forfeiture, loot-box \
             mechanics, account bans that void purchases, and auto-renewing subscriptions."
        }
        Industry::SocialMedia => {
            "Industry context: social media. Watch for broad content licenses, data sharing with \
             advertisers, and moderation clauses that remove content without appeal."
        }
        Industry::Ecommerce => {
            "Industry context: e-commerce. Watch for return and refund restrictions, delivery \
             risk transfer, and automatic subscription enrollment."
        }
        Industry::Saas => {
            "Industry context: SaaS. Watch for data portability limits, service-level \
             disclaimers, unilateral price changes, and vendor lock-in terms."
        }
    }
}

/// Depth instruction block, keyed by [`AnalysisDepth`].
pub fn depth_section(depth: AnalysisDepth) -> &'static str {
    match depth {
        AnalysisDepth::Basic => BASIC_DEPTH_INSTRUCTIONS,
        AnalysisDepth::Detailed => DETAILED_DEPTH_INSTRUCTIONS,
        AnalysisDepth::Comprehensive => COMPREHENSIVE_DEPTH_INSTRUCTIONS,
    }
}

/// Options for one prompt build.
#[derive(Debug, Clone, Default)]
pub struct PromptOptions {
    /// Document-type guidance section
    pub document_type: DocumentType,

    /// Industry guidance section
    pub industry: Industry,

    /// Depth instruction block
    pub depth: AnalysisDepth,

    /// Optional caller-supplied context appended to the prompt
    pub context: Option<String>,

    /// Patterns to attach as hints on the built prompt
    pub pattern_hints: Vec<ClausePattern>,
}

impl PromptOptions {
    /// Create options with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the document type.
    pub fn with_document_type(mut self, document_type: DocumentType) -> Self {
        self.document_type = document_type;
        self
    }

    /// Set the industry.
    pub fn with_industry(mut self, industry: Industry) -> Self {
        self.industry = industry;
        self
    }

    /// Set the analysis depth.
    pub fn with_depth(mut self, depth: AnalysisDepth) -> Self {
        self.depth = depth;
        self
    }

    /// Set the context string.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Attach pattern hints.
    pub fn with_pattern_hints(mut self, hints: Vec<ClausePattern>) -> Self {
        self.pattern_hints = hints;
        self
    }
}

/// Builds analysis prompts from document text and scanner findings.
pub struct PromptBuilder {
    templates: TemplateRegistry,
    max_chars: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            templates: TemplateRegistry::with_defaults(),
            max_chars: MAX_PROMPT_CHARS,
        }
    }
}

impl PromptBuilder {
    /// Create a builder with the default template registry and ceiling.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the prompt length ceiling.
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    /// The template registry (add/update/remove templates at runtime).
    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    /// Build the standard section-based prompt.
    pub fn build(
        &self,
        text: &str,
        matches: &[PatternMatch],
        options: &PromptOptions,
    ) -> Result<AnalysisPrompt, PromptError> {
        let findings = findings_section(matches);
        let document = format!("Document:\n{}", text.trim());
        let user_instruction = [
            document_type_section(options.document_type),
            industry_section(options.industry),
            findings.as_str(),
            depth_section(options.depth),
            document.as_str(),
            OUTPUT_FORMAT_SPEC,
            VALIDATION_REMINDERS,
        ]
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

        let prompt = AnalysisPrompt {
            system_instruction: SYSTEM_PREAMBLE.trim().to_string(),
            user_instruction,
            context: options.context.clone(),
            pattern_hints: options.pattern_hints.clone(),
            template_id: DEFAULT_TEMPLATE_ID.to_string(),
            generated_at: Utc::now(),
            fingerprint: AnalysisPrompt::fingerprint_of(
                text,
                options.context.as_deref(),
                DEFAULT_TEMPLATE_ID,
            ),
        };

        self.check_length(prompt)
    }

    /// Build a prompt from a registered template.
    ///
    /// Substitutes `{{variable}}` placeholders in the template's system and
    /// user text from the given context map.
    pub fn build_from_template(
        &self,
        template_id: &str,
        text: &str,
        variables: &[(&str, &str)],
    ) -> Result<AnalysisPrompt, PromptError> {
        let template = self.templates.get(template_id)?;

        let mut system = template.system.clone();
        let mut user = template.user.clone();
        for (key, value) in variables {
            let placeholder = format!("{{{{{}}}}}", key);
            system = system.replace(&placeholder, value);
            user = user.replace(&placeholder, value);
        }
        user = user.replace("{{document}}", text.trim());

        let prompt = AnalysisPrompt {
            system_instruction: system.trim().to_string(),
            user_instruction: user.trim().to_string(),
            context: None,
            pattern_hints: Vec::new(),
            template_id: template.id.clone(),
            generated_at: Utc::now(),
            fingerprint: AnalysisPrompt::fingerprint_of(text, None, &template.id),
        };

        self.check_length(prompt)
    }

    fn check_length(&self, prompt: AnalysisPrompt) -> Result<AnalysisPrompt, PromptError> {
        let actual = prompt.len();
        if actual > self.max_chars {
            return Err(PromptError::TooLong {
                actual,
                max: self.max_chars,
            });
        }
        debug!(
            template = %prompt.template_id,
            chars = actual,
            "prompt assembled"
        );
        Ok(prompt)
    }
}

/// Summarize the highest-confidence scanner findings.
fn findings_section(matches: &[PatternMatch]) -> String {
    if matches.is_empty() {
        return format!("Preliminary findings:\n{}", NO_FINDINGS_STATEMENT);
    }

    let mut sorted: Vec<&PatternMatch> = matches.iter().collect();
    sorted.sort_by(|a, b| b.confidence.cmp(&a.confidence).then(a.start.cmp(&b.start)));

    let lines: Vec<String> = sorted
        .iter()
        .take(MAX_PRELIMINARY_FINDINGS)
        .map(|m| {
            format!(
                "- {}: \"{}\" (confidence {}/100)",
                m.category,
                m.excerpt.trim(),
                m.confidence
            )
        })
        .collect();

    format!(
        "Preliminary findings from a deterministic scan (verify and refine these):\n{}",
        lines.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RiskLevel;

    fn sample_match(category: &str, confidence: u8) -> PatternMatch {
        PatternMatch {
            category: category.to_string(),
            confidence,
            start: 0,
            end: 10,
            excerpt: "sample excerpt text".to_string(),
            keywords: vec![],
        }
    }

    #[test]
    fn test_build_contains_all_sections() {
        let builder = PromptBuilder::new();
        let prompt = builder
            .build(
                "We may terminate your account.",
                &[sample_match("account-termination", 86)],
                &PromptOptions::new(),
            )
            .unwrap();

        let rendered = prompt.render();
        assert!(rendered.contains("expert contract analyst"));
        assert!(rendered.contains("terms of service"));
        assert!(rendered.contains("mobile gaming"));
        assert!(rendered.contains("account-termination"));
        assert!(rendered.contains("overallRiskScore"));
        assert!(rendered.contains("Validation reminders"));
        assert!(rendered.contains("We may terminate your account."));
    }

    #[test]
    fn test_no_findings_statement() {
        let builder = PromptBuilder::new();
        let prompt = builder
            .build("Some text.", &[], &PromptOptions::new())
            .unwrap();

        assert!(prompt.user_instruction.contains(NO_FINDINGS_STATEMENT));
    }

    #[test]
    fn test_findings_capped_at_five() {
        let matches: Vec<PatternMatch> = (0..8)
            .map(|i| sample_match(&format!("category-{}", i), 50 + i as u8))
            .collect();

        let section = findings_section(&matches);
        assert_eq!(section.matches("- category-").count(), 5);
        // Highest confidence first
        assert!(section.contains("category-7"));
        assert!(!section.contains("category-0"));
    }

    #[test]
    fn test_prompt_too_long() {
        let builder = PromptBuilder::new().with_max_chars(100);
        let err = builder
            .build(&"x".repeat(500), &[], &PromptOptions::new())
            .unwrap_err();

        match err {
            PromptError::TooLong { actual, max } => {
                assert!(actual > 100);
                assert_eq!(max, 100);
            }
            other => panic!("expected TooLong, got {other:?}"),
        }
    }

    #[test]
    fn test_build_from_template_substitutes() {
        let builder = PromptBuilder::new();
        builder.templates().add(
            PromptTemplate::new(
                "custom",
                "Custom",
                "You analyze {{kind}} documents.",
                "Focus: {{focus}}\n\n{{document}}",
            ),
        );

        let prompt = builder
            .build_from_template(
                "custom",
                "The document body.",
                &[("kind", "privacy"), ("focus", "data sharing")],
            )
            .unwrap();

        assert_eq!(prompt.system_instruction, "You analyze privacy documents.");
        assert!(prompt.user_instruction.contains("Focus: data sharing"));
        assert!(prompt.user_instruction.contains("The document body."));
        assert_eq!(prompt.template_id, "custom");
    }

    #[test]
    fn test_unknown_template_fails() {
        let builder = PromptBuilder::new();
        let err = builder
            .build_from_template("does-not-exist", "text", &[])
            .unwrap_err();
        assert!(matches!(err, PromptError::TemplateNotFound { .. }));
    }

    #[test]
    fn test_disabled_template_fails() {
        let builder = PromptBuilder::new();
        builder.templates().add(
            PromptTemplate::new("off", "Off", "system", "user {{document}}").disabled(),
        );

        let err = builder.build_from_template("off", "text", &[]).unwrap_err();
        assert!(matches!(err, PromptError::TemplateDisabled { .. }));
    }

    #[test]
    fn test_fingerprint_stable_for_same_input() {
        let builder = PromptBuilder::new();
        let options = PromptOptions::new().with_context("ctx");

        let a = builder.build("text", &[], &options).unwrap();
        let b = builder.build("text", &[], &options).unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn test_pattern_hints_carried() {
        let builder = PromptBuilder::new();
        let hints = vec![ClausePattern::new(
            "h1",
            "account-termination",
            RiskLevel::High,
            0.7,
        )];
        let options = PromptOptions::new().with_pattern_hints(hints);

        let prompt = builder.build("text", &[], &options).unwrap();
        assert_eq!(prompt.pattern_hints.len(), 1);
    }
}
