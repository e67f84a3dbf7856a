//! Shared state handed to every event and command handler.

use std::sync::Arc;

use chrono::{Local, NaiveDate};

use owlly_agent::CompletionBackend;
use owlly_core::{OwllyConfig, Result};
use owlly_sessions::{ModelCatalog, PersonaRegistry, Tokenizer};

/// Immutable after construction. Persona and model files are re-read on each
/// call to [`AppContext::personas`] / [`AppContext::models`], so edits on disk
/// take effect without a restart.
pub struct AppContext {
    pub config: Arc<OwllyConfig>,
    pub completion: Arc<dyn CompletionBackend>,
    pub tokenizer: Arc<dyn Tokenizer>,
}

impl AppContext {
    pub fn new(
        config: Arc<OwllyConfig>,
        completion: Arc<dyn CompletionBackend>,
        tokenizer: Arc<dyn Tokenizer>,
    ) -> Self {
        Self {
            config,
            completion,
            tokenizer,
        }
    }

    pub fn personas(&self) -> Result<PersonaRegistry> {
        PersonaRegistry::load(&self.config.files, &self.config.completion)
    }

    pub fn models(&self) -> Result<ModelCatalog> {
        ModelCatalog::load(&self.config.files.models, &self.config.completion)
    }

    pub fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}
