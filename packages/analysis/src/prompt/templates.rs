//! Runtime-managed prompt templates.
//!
//! Templates carry their own system/user text with `{{variable}}`
//! placeholders. Consumers can add, update, and remove templates while the
//! service is running; building against an unknown or disabled template id
//! fails with a typed error.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{OUTPUT_FORMAT_SPEC, SYSTEM_PREAMBLE, VALIDATION_REMINDERS};
use crate::error::PromptError;

/// Id of the seeded standard template.
pub const DEFAULT_TEMPLATE_ID: &str = "standard-analysis";

/// A registered prompt template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// Unique template id (registry key)
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// System text, may contain `{{variable}}` placeholders
    pub system: String,

    /// User text, may contain `{{variable}}` placeholders and `{{document}}`
    pub user: String,

    /// Disabled templates are kept but cannot be built from
    pub enabled: bool,

    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl PromptTemplate {
    /// Create an enabled template.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            system: system.into(),
            user: user.into(),
            enabled: true,
            updated_at: Utc::now(),
        }
    }

    /// Mark this template disabled.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Registry of prompt templates keyed by id.
///
/// Accessors return clones to prevent external mutation of internal state.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: Arc<RwLock<IndexMap<String, PromptTemplate>>>,
}

impl TemplateRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry seeded with the standard template.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.add(default_template());
        registry
    }

    /// Register a template, replacing any existing one with the same id.
    pub fn add(&self, mut template: PromptTemplate) {
        template.updated_at = Utc::now();
        self.templates
            .write()
            .unwrap()
            .insert(template.id.clone(), template);
    }

    /// Remove a template by id. Returns the removed template, if any.
    pub fn remove(&self, id: &str) -> Option<PromptTemplate> {
        self.templates.write().unwrap().shift_remove(id)
    }

    /// Enable or disable a template in place.
    ///
    /// Returns false when no template has the given id.
    pub fn set_enabled(&self, id: &str, enabled: bool) -> bool {
        let mut templates = self.templates.write().unwrap();
        match templates.get_mut(id) {
            Some(template) => {
                template.enabled = enabled;
                template.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Fetch an enabled template by id.
    pub fn get(&self, id: &str) -> Result<PromptTemplate, PromptError> {
        let templates = self.templates.read().unwrap();
        match templates.get(id) {
            Some(template) if template.enabled => Ok(template.clone()),
            Some(_) => Err(PromptError::TemplateDisabled { id: id.to_string() }),
            None => Err(PromptError::TemplateNotFound { id: id.to_string() }),
        }
    }

    /// Ids of all registered templates, in registration order.
    pub fn ids(&self) -> Vec<String> {
        self.templates.read().unwrap().keys().cloned().collect()
    }

    /// Number of registered templates.
    pub fn len(&self) -> usize {
        self.templates.read().unwrap().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.templates.read().unwrap().is_empty()
    }
}

/// The standard mobile-gaming-oriented analysis template.
fn default_template() -> PromptTemplate {
    let user = format!(
        "Analyze the following {{{{document_type}}}} for clauses that are risky or unfair to \
         the end user. Industry context: {{{{industry}}}}.\n\nDocument:\n{{{{document}}}}\n\n{}\n\n{}",
        OUTPUT_FORMAT_SPEC, VALIDATION_REMINDERS
    );

    PromptTemplate::new(
        DEFAULT_TEMPLATE_ID,
        "Standard risk analysis",
        SYSTEM_PREAMBLE,
        user,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_include_standard_template() {
        let registry = TemplateRegistry::with_defaults();
        let template = registry.get(DEFAULT_TEMPLATE_ID).unwrap();

        assert!(template.enabled);
        assert!(template.user.contains("{{document}}"));
        assert!(template.user.contains("overallRiskScore"));
    }

    #[test]
    fn test_add_remove_update() {
        let registry = TemplateRegistry::new();
        registry.add(PromptTemplate::new("t1", "One", "sys", "user"));
        assert_eq!(registry.len(), 1);

        // Overwrite by id
        registry.add(PromptTemplate::new("t1", "One v2", "sys2", "user2"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("t1").unwrap().name, "One v2");

        assert!(registry.remove("t1").is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_get_missing_and_disabled() {
        let registry = TemplateRegistry::new();
        registry.add(PromptTemplate::new("off", "Off", "sys", "user").disabled());

        assert!(matches!(
            registry.get("nope"),
            Err(PromptError::TemplateNotFound { .. })
        ));
        assert!(matches!(
            registry.get("off"),
            Err(PromptError::TemplateDisabled { .. })
        ));

        assert!(registry.set_enabled("off", true));
        assert!(registry.get("off").is_ok());
        assert!(!registry.set_enabled("nope", true));
    }
}
