//! # Translation Module
//!
//! An ordered chain of interchangeable translation providers behind one
//! orchestrator. The chain degrades instead of failing: when every provider
//! is exhausted the original text passes through so downstream synthesis
//! always has something to speak.
//!
//! ## Key Components:
//! - **Provider trait**: one capability contract per backend
//! - **LibreProvider**: multi-host LibreTranslate client with an internal
//!   free MyMemory fallback
//! - **CommandProvider**: optional offline translator driven over
//!   stdin/stdout
//! - **Orchestrator**: acceptance rules, echo heuristic, degrade-to-original

pub mod command;
pub mod libre;
pub mod orchestrator;

pub use command::CommandProvider;
pub use libre::LibreProvider;
pub use orchestrator::{TranslationKind, TranslationOutcome, TranslatorOrchestrator};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("rate limited")]
    RateLimited,

    #[error("empty translation response")]
    Empty,

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("provider I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One translation backend in the chain.
///
/// Implementations should prefer returning an error over raising further up;
/// the orchestrator treats any error as "try the next provider".
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn translate(&self, text: &str, source: &str, target: &str)
        -> Result<String, TranslateError>;
}
