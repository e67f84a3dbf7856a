//! Turn a thread's platform history into the completion request.

use owlly_core::{Message, OpenAIModel, Role};

use crate::tokens::Tokenizer;

/// How a platform message relates to the thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryKind {
    Regular,
    /// The synthetic "thread started from this message" entry. Carries the
    /// value of the first field of the referenced message's first embed, if
    /// the referenced message was available.
    ThreadStarter { referenced_field: Option<String> },
}

/// Snapshot of one platform message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryMessage {
    pub author_name: String,
    pub content: String,
    pub kind: HistoryKind,
}

impl HistoryMessage {
    pub fn regular(author_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            author_name: author_name.into(),
            content: content.into(),
            kind: HistoryKind::Regular,
        }
    }
}

/// What to do with a conversation given its token count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Budget {
    Continue,
    /// Over the model's input ceiling; the thread gets closed.
    Close,
}

/// Completion message for one platform message, or `None` when it has no text.
pub fn to_completion_message(message: &HistoryMessage, bot_name: &str) -> Option<Message> {
    if let HistoryKind::ThreadStarter {
        referenced_field: Some(field),
    } = &message.kind
    {
        return Some(Message::user(field.clone()));
    }
    if message.content.is_empty() {
        return None;
    }
    let role = if message.author_name == bot_name {
        Role::Assistant
    } else {
        Role::User
    };
    Some(Message::new(role, message.content.clone()))
}

/// Chronological completion messages, system message first.
///
/// `newest_first` is the platform's history order.
pub fn build_history(
    newest_first: &[HistoryMessage],
    system: &str,
    bot_name: &str,
) -> Vec<Message> {
    let mut messages: Vec<Message> = newest_first
        .iter()
        .filter_map(|m| to_completion_message(m, bot_name))
        .collect();
    messages.push(Message::system(normalize_system_text(system)));
    messages.reverse();
    messages
}

/// Flatten a system prompt onto one line and drop Discord underline markup.
pub fn normalize_system_text(system: &str) -> String {
    system.replace("\n-", " ").replace('\n', " ").replace("__", "")
}

/// Sum of the token counts of every message's text, encoded for `model`.
pub fn count_tokens(messages: &[Message], model: &str, tokenizer: &dyn Tokenizer) -> usize {
    messages
        .iter()
        .filter_map(|m| m.text.as_deref())
        .filter(|t| !t.is_empty())
        .map(|t| tokenizer.count(model, t))
        .sum()
}

pub fn check_budget(tokens: usize, model: &OpenAIModel) -> Budget {
    if tokens > model.max_input_token {
        Budget::Close
    } else {
        Budget::Continue
    }
}

/// Drop assistant messages from the end, for regenerating the last answer.
/// Empty and all-assistant inputs come back empty.
pub fn drop_trailing_assistant_messages(mut messages: Vec<Message>) -> Vec<Message> {
    while messages.last().is_some_and(|m| m.role == Role::Assistant) {
        messages.pop();
    }
    messages
}

/// Latest message of a thread, as seen when deciding to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastMessage {
    pub id: u64,
    pub author_id: u64,
}

/// True when someone other than the bot has posted after `handled_id`.
pub fn is_stale(handled_id: u64, last: Option<LastMessage>, bot_id: u64) -> bool {
    last.is_some_and(|l| l.id != handled_id && l.author_id != bot_id)
}
