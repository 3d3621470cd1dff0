//! Configuration types for the analysis pipeline.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::prompt::{AnalysisDepth, DocumentType, Industry};
use crate::invocation::InvokeOptions;

/// Input to one analysis run.
///
/// Produced by the upstream anonymization step: the text has already had
/// personal data removed, and the hash/length describe exactly the text
/// being handed over. This library does not re-sanitize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisInput {
    /// Sanitized document text
    pub text: String,

    /// Hex SHA-256 digest of the text
    pub content_hash: String,

    /// Character count of the text
    pub content_length: usize,
}

impl AnalysisInput {
    /// Create an input from pre-computed metadata.
    pub fn new(
        text: impl Into<String>,
        content_hash: impl Into<String>,
        content_length: usize,
    ) -> Self {
        Self {
            text: text.into(),
            content_hash: content_hash.into(),
            content_length,
        }
    }

    /// Create an input directly from text, computing hash and length.
    ///
    /// Convenience for tests and callers that hold the sanitized text
    /// themselves.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let content_hash = format!("{:x}", hasher.finalize());
        let content_length = text.chars().count();
        Self {
            text,
            content_hash,
            content_length,
        }
    }
}

/// Configuration for the pipeline orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Run the deterministic pattern scan. Default: true.
    pub enable_pattern_scan: bool,

    /// Invoke the external model. Default: true.
    pub enable_model_analysis: bool,

    /// Document type section for the prompt
    pub document_type: DocumentType,

    /// Industry section for the prompt
    pub industry: Industry,

    /// Analysis depth instruction block
    pub depth: AnalysisDepth,

    /// Registered template to build the prompt from. `None` uses the
    /// standard section-based builder.
    pub template_id: Option<String>,

    /// Maximum accepted document length in characters
    pub max_content_length: usize,

    /// Retry/timeout options for the model call
    pub invoke: InvokeOptions,

    /// Reject responses with error-severity validation issues instead of
    /// auto-fixing them
    pub strict_parsing: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            enable_pattern_scan: true,
            enable_model_analysis: true,
            document_type: DocumentType::default(),
            industry: Industry::default(),
            depth: AnalysisDepth::default(),
            template_id: None,
            max_content_length: 500_000,
            invoke: InvokeOptions::default(),
            strict_parsing: false,
        }
    }
}

impl AnalyzerConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle the pattern scan.
    pub fn with_pattern_scan(mut self, enabled: bool) -> Self {
        self.enable_pattern_scan = enabled;
        self
    }

    /// Toggle the model analysis.
    pub fn with_model_analysis(mut self, enabled: bool) -> Self {
        self.enable_model_analysis = enabled;
        self
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

    /// Build prompts from a registered template instead of the standard
    /// section builder.
    pub fn with_template(mut self, template_id: impl Into<String>) -> Self {
        self.template_id = Some(template_id.into());
        self
    }

    /// Set the maximum content length.
    pub fn with_max_content_length(mut self, max: usize) -> Self {
        self.max_content_length = max;
        self
    }

    /// Set the invocation options.
    pub fn with_invoke_options(mut self, invoke: InvokeOptions) -> Self {
        self.invoke = invoke;
        self
    }

    /// Enable strict parsing.
    pub fn with_strict_parsing(mut self, strict: bool) -> Self {
        self.strict_parsing = strict;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_text_computes_metadata() {
        let input = AnalysisInput::from_text("hello world");

        assert_eq!(input.content_length, 11);
        assert_eq!(input.content_hash.len(), 64);
        assert!(input.content_hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_config_builders() {
        let config = AnalyzerConfig::new()
            .with_pattern_scan(false)
            .with_industry(Industry::Saas)
            .with_template("custom")
            .with_strict_parsing(true);

        assert!(!config.enable_pattern_scan);
        assert_eq!(config.industry, Industry::Saas);
        assert_eq!(config.template_id.as_deref(), Some("custom"));
        assert!(config.strict_parsing);
    }
}
