//! Ordered provider chain with graceful degradation.
//!
//! The orchestrator never fails: when every provider is exhausted it hands
//! back the original text marked as degraded, and synthesis simply speaks
//! the source language. Callers that care about the distinction read it off
//! [`TranslationOutcome`] instead of comparing strings.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::TranslateConfig;
use crate::translate::{CommandProvider, LibreProvider, TranslationProvider};

/// How the returned text was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationKind {
    /// A provider produced an accepted translation.
    Translated,
    /// Every provider was exhausted; the original text passed through.
    DegradedToOriginal,
}

#[derive(Debug, Clone)]
pub struct TranslationOutcome {
    pub text: String,
    pub kind: TranslationKind,
    /// Which provider produced the accepted output, when one did.
    pub provider: Option<&'static str>,
}

impl TranslationOutcome {
    pub fn is_degraded(&self) -> bool {
        self.kind == TranslationKind::DegradedToOriginal
    }
}

pub struct TranslatorOrchestrator {
    providers: Vec<Arc<dyn TranslationProvider>>,
}

impl TranslatorOrchestrator {
    pub fn new(providers: Vec<Arc<dyn TranslationProvider>>) -> Self {
        Self { providers }
    }

    /// Build the configured chain: the multi-host network provider first,
    /// then the offline command provider when one is configured.
    pub fn from_config(cfg: &TranslateConfig) -> anyhow::Result<Self> {
        let mut providers: Vec<Arc<dyn TranslationProvider>> =
            vec![Arc::new(LibreProvider::new(cfg)?)];
        if !cfg.offline_command.is_empty() {
            providers.push(Arc::new(CommandProvider::new(cfg.offline_command.clone())));
        }
        Ok(Self { providers })
    }

    /// Chain members in order, for health diagnostics.
    pub fn providers(&self) -> &[Arc<dyn TranslationProvider>] {
        &self.providers
    }

    /// Translate `text`, degrading to the original on total exhaustion.
    ///
    /// A provider's output is accepted when it is non-empty AND either
    /// differs from the input or `source == target` (a no-op is the expected
    /// result then). Identical output across differing languages usually
    /// means the provider echoed the input on quota/error, so the chain
    /// moves on. Known limitation: a genuine identity translation (proper
    /// nouns) trips the same heuristic and burns a fallback attempt.
    pub async fn translate(&self, text: &str, source: &str, target: &str) -> TranslationOutcome {
        if text.is_empty() {
            return TranslationOutcome {
                text: String::new(),
                kind: TranslationKind::DegradedToOriginal,
                provider: None,
            };
        }

        for provider in &self.providers {
            match provider.translate(text, source, target).await {
                Ok(out) => {
                    if !out.is_empty() && (out != text || source == target) {
                        debug!(provider = provider.name(), "Translation accepted");
                        return TranslationOutcome {
                            text: out,
                            kind: TranslationKind::Translated,
                            provider: Some(provider.name()),
                        };
                    }
                    warn!(
                        provider = provider.name(),
                        text_len = text.len(),
                        "Provider returned unchanged/empty text, falling through"
                    );
                }
                Err(err) => {
                    warn!(provider = provider.name(), error = %err, "Provider failed, falling through");
                }
            }
        }

        warn!(
            text_len = text.len(),
            source, target, "All translation providers exhausted, using original text"
        );
        TranslationOutcome {
            text: text.to_string(),
            kind: TranslationKind::DegradedToOriginal,
            provider: None,
        }
    }
}
