//! One-to-two word summary of a first message, used as a thread title.

use owlly_core::Message;

use crate::completion::{CompletionBackend, CompletionOutcome};

pub const RESUME_PROMPT: &str = "Resume the message in 1 to 2 words please, with keeping the \
language used by the user. Don't add any point, comma, or quotes. It must be a short sentence \
to create a thread.";

/// What came of asking for a summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeOutcome {
    Title(String),
    /// No usable summary; the text is a notice to show the user.
    Failed(String),
}

/// Ask `model` to summarise `message`.
///
/// Replies longer than `max_chars` or empty are rejected.
pub async fn resume_message(
    backend: &dyn CompletionBackend,
    model: &str,
    message: &str,
    max_chars: usize,
) -> ResumeOutcome {
    let messages = [Message::system(RESUME_PROMPT), Message::user(message)];
    interpret(backend.complete(model, &messages).await, max_chars)
}

fn interpret(outcome: CompletionOutcome, max_chars: usize) -> ResumeOutcome {
    match outcome {
        CompletionOutcome::Ok(reply) if reply.is_empty() => {
            ResumeOutcome::Failed("**Invalid response** - empty response".into())
        }
        CompletionOutcome::Ok(reply) if reply.chars().count() > max_chars => {
            ResumeOutcome::Failed("**Invalid response** - too long".into())
        }
        CompletionOutcome::Ok(reply) => ResumeOutcome::Title(clean_resume(&reply)),
        CompletionOutcome::TooLong => {
            ResumeOutcome::Failed("**Error** - message too long to summarise".into())
        }
        CompletionOutcome::Error(detail) => ResumeOutcome::Failed(format!("**Error** - {detail}")),
    }
}

/// Strip the punctuation a summary model likes to add.
pub fn clean_resume(reply: &str) -> String {
    reply.replace(['.', '"'], "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Canned {
        outcome: CompletionOutcome,
        seen: Mutex<Vec<(String, Vec<Message>)>>,
    }

    impl Canned {
        fn new(outcome: CompletionOutcome) -> Self {
            Self {
                outcome,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionBackend for Canned {
        async fn complete(&self, model: &str, messages: &[Message]) -> CompletionOutcome {
            self.seen
                .lock()
                .unwrap()
                .push((model.to_string(), messages.to_vec()));
            self.outcome.clone()
        }
    }

    #[tokio::test]
    async fn summary_is_cleaned() {
        let backend = Canned::new(CompletionOutcome::Ok("\"Rust lifetimes.\"".into()));
        let out = resume_message(&backend, "gpt-3.5-turbo", "how do lifetimes work", 1900).await;
        assert_eq!(out, ResumeOutcome::Title("Rust lifetimes".into()));

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0].0, "gpt-3.5-turbo");
        assert_eq!(seen[0].1[0], Message::system(RESUME_PROMPT));
        assert_eq!(seen[0].1[1], Message::user("how do lifetimes work"));
    }

    #[tokio::test]
    async fn empty_and_oversized_replies_fail() {
        let empty = Canned::new(CompletionOutcome::Ok(String::new()));
        assert!(matches!(
            resume_message(&empty, "m", "x", 10).await,
            ResumeOutcome::Failed(_)
        ));

        let long = Canned::new(CompletionOutcome::Ok("y".repeat(11)));
        assert_eq!(
            resume_message(&long, "m", "x", 10).await,
            ResumeOutcome::Failed("**Invalid response** - too long".into())
        );
    }

    #[tokio::test]
    async fn api_errors_become_notices() {
        let err = Canned::new(CompletionOutcome::Error("boom".into()));
        assert_eq!(
            resume_message(&err, "m", "x", 10).await,
            ResumeOutcome::Failed("**Error** - boom".into())
        );
    }
}
