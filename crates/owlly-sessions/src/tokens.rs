//! Token counting for the input budget.
//!
//! OpenAI models are counted with their own BPE encoding (`tiktoken-rs`).
//! Models tiktoken does not know fall back to a ~4 characters per token
//! estimate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tiktoken_rs::tokenizer::{get_tokenizer, Tokenizer as Encoding};
use tiktoken_rs::{get_bpe_from_tokenizer, CoreBPE};
use tracing::{debug, warn};

pub trait Tokenizer: Send + Sync {
    /// Number of tokens `text` encodes to for `model`.
    fn count(&self, model: &str, text: &str) -> usize;
}

/// Character-based estimate: one token per `chars_per_token` characters, rounded up.
#[derive(Debug, Clone, Copy)]
pub struct CharEstimate {
    pub chars_per_token: usize,
}

impl Default for CharEstimate {
    fn default() -> Self {
        Self { chars_per_token: 4 }
    }
}

impl Tokenizer for CharEstimate {
    fn count(&self, _model: &str, text: &str) -> usize {
        let chars = text.chars().count();
        chars.div_ceil(self.chars_per_token.max(1))
    }
}

/// Exact counts for models with a known tiktoken encoding.
///
/// Encoders are built on first use and shared afterwards.
#[derive(Default)]
pub struct Tiktoken {
    encoders: Mutex<HashMap<Encoding, Arc<CoreBPE>>>,
    fallback: CharEstimate,
}

impl Tiktoken {
    pub fn new() -> Self {
        Self::default()
    }

    fn encoder(&self, model: &str) -> Option<Arc<CoreBPE>> {
        let encoding = get_tokenizer(model)?;
        let mut encoders = self.encoders.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(bpe) = encoders.get(&encoding) {
            return Some(Arc::clone(bpe));
        }
        match get_bpe_from_tokenizer(encoding) {
            Ok(bpe) => {
                debug!(model, ?encoding, "loaded tiktoken encoding");
                let bpe = Arc::new(bpe);
                encoders.insert(encoding, Arc::clone(&bpe));
                Some(bpe)
            }
            Err(e) => {
                warn!(model, ?encoding, error = %e, "tiktoken encoding unavailable");
                None
            }
        }
    }
}

impl Tokenizer for Tiktoken {
    fn count(&self, model: &str, text: &str) -> usize {
        match self.encoder(model) {
            Some(bpe) => bpe.encode_with_special_tokens(text).len(),
            None => self.fallback.count(model, text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_zero() {
        assert_eq!(CharEstimate::default().count("gpt-4", ""), 0);
        assert_eq!(Tiktoken::new().count("gpt-4", ""), 0);
    }

    #[test]
    fn estimate_rounds_up() {
        let t = CharEstimate::default();
        assert_eq!(t.count("m", "test"), 1);
        assert_eq!(t.count("m", "hello"), 2);
        assert_eq!(t.count("m", &"a".repeat(100)), 25);
    }

    #[test]
    fn estimate_counts_characters_not_bytes() {
        let owls = "\u{1f989}\u{1f989}\u{1f989}\u{1f989}";
        assert_eq!(CharEstimate::default().count("m", owls), 1);
    }

    #[test]
    fn cl100k_models_match_known_counts() {
        let t = Tiktoken::new();
        assert_eq!(t.count("gpt-4", "hello world"), 2);
        assert_eq!(t.count("gpt-3.5-turbo", "tiktoken is great!"), 6);
    }

    #[test]
    fn non_latin_text_counts_more_than_the_estimate() {
        let t = Tiktoken::new();
        let owls = "\u{1f989}\u{1f989}\u{1f989}\u{1f989}";
        assert!(t.count("gpt-4", owls) >= 4);
        assert!(t.count("gpt-4", owls) > CharEstimate::default().count("gpt-4", owls));
    }

    #[test]
    fn unknown_models_use_the_estimate() {
        let t = Tiktoken::new();
        assert_eq!(t.count("local-llama", &"a".repeat(100)), 25);
    }

    #[test]
    fn encoders_are_reused() {
        let t = Tiktoken::new();
        t.count("gpt-4", "a");
        t.count("gpt-3.5-turbo", "b");
        assert_eq!(t.encoders.lock().map(|e| e.len()).unwrap_or(0), 1);
    }
}
