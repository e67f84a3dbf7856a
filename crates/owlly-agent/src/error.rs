/// Transport-level failures of a completion call.
///
/// Never returned to callers of [`crate::CompletionBackend`]; they are folded
/// into [`crate::CompletionOutcome::Error`] with their description.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}
