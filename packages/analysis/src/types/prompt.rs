//! Prompt types - the structured instruction sent to the model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::pattern::ClausePattern;

/// Kind of legal document under analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentType {
    /// Terms of service (default)
    #[default]
    TermsOfService,

    /// Privacy policy
    PrivacyPolicy,

    /// Cookie policy
    CookiePolicy,

    /// User agreement
    UserAgreement,

    /// End-user license agreement
    EndUserLicense,
}

impl DocumentType {
    /// Kebab-case name of this document type.
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::TermsOfService => "terms-of-service",
            DocumentType::PrivacyPolicy => "privacy-policy",
            DocumentType::CookiePolicy => "cookie-policy",
            DocumentType::UserAgreement => "user-agreement",
            DocumentType::EndUserLicense => "end-user-license",
        }
    }
}

/// Industry context for the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Industry {
    /// Mobile gaming (default)
    #[default]
    MobileGaming,

    /// Social media platforms
    SocialMedia,

    /// E-commerce
    Ecommerce,

    /// Software-as-a-service
    Saas,
}

impl Industry {
    /// Kebab-case name of this industry.
    pub fn as_str(self) -> &'static str {
        match self {
            Industry::MobileGaming => "mobile-gaming",
            Industry::SocialMedia => "social-media",
            Industry::Ecommerce => "e-commerce",
            Industry::Saas => "saas",
        }
    }
}

/// How thorough the model's analysis should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisDepth {
    /// Headline risks only
    Basic,

    /// Standard clause-by-clause review (default)
    #[default]
    Detailed,

    /// Exhaustive review including interactions between clauses
    Comprehensive,
}

impl AnalysisDepth {
    /// Lowercase name of this depth.
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisDepth::Basic => "basic",
            AnalysisDepth::Detailed => "detailed",
            AnalysisDepth::Comprehensive => "comprehensive",
        }
    }
}

/// A fully assembled instruction for the external model.
///
/// Created fresh for every analysis call and discarded afterwards. The
/// fingerprint lets callers cache idempotently: same content + context =>
/// same fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisPrompt {
    /// Role/capability preamble
    pub system_instruction: String,

    /// Document, findings, and output-format instruction
    pub user_instruction: String,

    /// Optional caller-supplied context appended to the instruction
    pub context: Option<String>,

    /// Patterns offered to the model as hints
    #[serde(default)]
    pub pattern_hints: Vec<ClausePattern>,

    /// Id of the template that produced this prompt
    pub template_id: String,

    /// When this prompt was generated
    pub generated_at: DateTime<Utc>,

    /// Content/context fingerprint for idempotent caching
    pub fingerprint: String,
}

impl AnalysisPrompt {
    /// Hash document text and context into a caching fingerprint.
    pub fn fingerprint_of(text: &str, context: Option<&str>, template_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(template_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        if let Some(context) = context {
            hasher.update([0u8]);
            hasher.update(context.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Render the prompt as the single opaque string sent to the provider.
    pub fn render(&self) -> String {
        let mut sections = vec![
            self.system_instruction.trim(),
            self.user_instruction.trim(),
        ];
        if let Some(context) = self.context.as_deref() {
            let context = context.trim();
            if !context.is_empty() {
                sections.push(context);
            }
        }
        sections.retain(|s| !s.is_empty());
        sections.join("\n\n")
    }

    /// Total character length of the rendered prompt.
    pub fn len(&self) -> usize {
        self.render().chars().count()
    }

    /// Whether the rendered prompt is empty.
    pub fn is_empty(&self) -> bool {
        self.system_instruction.trim().is_empty() && self.user_instruction.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable() {
        let a = AnalysisPrompt::fingerprint_of("text", Some("ctx"), "standard");
        let b = AnalysisPrompt::fingerprint_of("text", Some("ctx"), "standard");
        let c = AnalysisPrompt::fingerprint_of("text", None, "standard");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64); // SHA-256 hex
    }

    #[test]
    fn test_render_joins_sections() {
        let prompt = AnalysisPrompt {
            system_instruction: "system".to_string(),
            user_instruction: "user".to_string(),
            context: Some("context".to_string()),
            pattern_hints: vec![],
            template_id: "t".to_string(),
            generated_at: Utc::now(),
            fingerprint: String::new(),
        };

        assert_eq!(prompt.render(), "system\n\nuser\n\ncontext");
    }

    #[test]
    fn test_default_lookups() {
        assert_eq!(DocumentType::default().as_str(), "terms-of-service");
        assert_eq!(Industry::default().as_str(), "mobile-gaming");
        assert_eq!(AnalysisDepth::default().as_str(), "detailed");
    }
}
