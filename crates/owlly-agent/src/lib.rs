//! Completion API client and response classification.

pub mod completion;
pub mod error;
pub mod resume;

pub use completion::{classify, CompletionBackend, CompletionClient, CompletionOutcome};
pub use error::CompletionError;
pub use resume::{resume_message, ResumeOutcome};
