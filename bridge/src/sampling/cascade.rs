//! Model selection cascade
//!
//! Selectors are tried in a fixed order and the first non-empty lookup wins:
//!
//! 1. the request's `preferredModel`, by exact id
//! 2. otherwise the configured default model id
//! 3. each preferred family (request list, else configured list, else
//!    [`DEFAULT_FAMILIES`]) for the configured vendor
//! 4. the vendor alone
//!
//! Every lookup is recorded so an exhausted cascade can report what it tried.

use std::fmt;

use crate::error::{BridgeError, BridgeResult};
use crate::provider::{ModelInfo, ModelProvider, ModelSelector};

use super::SamplingMetadata;

/// Families tried, in order, when neither the request nor the config name any
pub const DEFAULT_FAMILIES: &[&str] = &["llama", "qwen2", "mistral", "gemma"];

/// Externally configured selection inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSettings {
    /// Vendor used for family and broad lookups
    pub vendor: String,
    pub default_model: Option<String>,
    pub preferred_families: Vec<String>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            vendor: "ollama".to_string(),
            default_model: None,
            preferred_families: Vec::new(),
        }
    }
}

/// One lookup and what came of it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionAttempt {
    pub selector: String,
    pub outcome: String,
}

impl fmt::Display for SelectionAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.selector, self.outcome)
    }
}

/// Ordered record of a cascade run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionLog(Vec<SelectionAttempt>);

impl SelectionLog {
    pub fn attempts(&self) -> &[SelectionAttempt] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// One display line per attempt
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.0.iter().map(ToString::to_string)
    }

    fn record(&mut self, selector: &ModelSelector, outcome: impl Into<String>) {
        self.0.push(SelectionAttempt {
            selector: selector.to_string(),
            outcome: outcome.into(),
        });
    }
}

impl fmt::Display for SelectionLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, attempt) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  {}. {}", i + 1, attempt)?;
        }
        Ok(())
    }
}

/// Selectors in the order they will be tried
pub fn plan(settings: &ModelSettings, meta: &SamplingMetadata) -> Vec<ModelSelector> {
    let mut selectors = Vec::new();

    match (&meta.preferred_model, &settings.default_model) {
        (Some(id), _) => selectors.push(ModelSelector::by_id(id)),
        (None, Some(id)) => selectors.push(ModelSelector::by_id(id)),
        (None, None) => {}
    }

    let families: Vec<&str> = if !meta.preferred_families.is_empty() {
        meta.preferred_families.iter().map(String::as_str).collect()
    } else if !settings.preferred_families.is_empty() {
        settings.preferred_families.iter().map(String::as_str).collect()
    } else {
        DEFAULT_FAMILIES.to_vec()
    };
    selectors.extend(
        families
            .into_iter()
            .map(|family| ModelSelector::by_family(&settings.vendor, family)),
    );

    selectors.push(ModelSelector::by_vendor(&settings.vendor));
    selectors
}

/// Run the cascade against `provider`.
///
/// Lookup errors are recorded and the cascade moves on; only exhaustion fails.
/// On success the log is returned with the winning attempt last.
pub async fn resolve_model(
    provider: &dyn ModelProvider,
    settings: &ModelSettings,
    meta: &SamplingMetadata,
) -> BridgeResult<(ModelInfo, SelectionLog)> {
    let mut log = SelectionLog::default();

    for selector in plan(settings, meta) {
        match provider.select_models(&selector).await {
            Ok(models) => match models.into_iter().next() {
                Some(model) => {
                    log.record(&selector, format!("selected {}", model.id));
                    return Ok((model, log));
                }
                None => log.record(&selector, "no match"),
            },
            Err(e) => {
                tracing::debug!(selector = %selector, error = %e, "Model lookup failed");
                log.record(&selector, format!("error: {}", e));
            }
        }
    }

    Err(BridgeError::NoModelAvailable { attempts: log })
}
