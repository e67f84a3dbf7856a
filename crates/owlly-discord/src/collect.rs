//! Gathering a long opening message from several chat messages.

use std::time::Duration;

use serenity::collector::MessageCollector;
use serenity::model::id::{ChannelId, UserId};
use serenity::prelude::Context;
use tracing::{debug, warn};

/// How long to wait for each follow-up message.
pub const PER_MESSAGE_TIMEOUT: Duration = Duration::from_secs(60);

pub const INSTRUCTIONS: &str = "Starting chat, please send your message in the next 60 seconds.\n\
Use `$end`, `$done` or `$stop` to end the message. Use `$cancel` to cancel the command.";

const FINISH_KEYWORDS: [&str; 3] = ["$end", "$done", "$stop"];
const CANCEL_KEYWORD: &str = "$cancel";

/// How a collection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collected {
    Finished(Vec<String>),
    Cancelled,
    /// No message within the timeout; carries what was gathered so far.
    TimedOut(Vec<String>),
}

impl Collected {
    /// Parts to send, or `None` when there is nothing to start a chat with.
    pub fn into_parts(self) -> Option<Vec<String>> {
        match self {
            Collected::Finished(parts) | Collected::TimedOut(parts) if !parts.is_empty() => {
                Some(parts)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Finish,
    Cancel,
}

/// Accumulator for follow-up messages.
#[derive(Debug, Default)]
pub struct LongMessage {
    parts: Vec<String>,
}

impl LongMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one message. Keywords are matched case-insensitively and are not
    /// kept.
    pub fn push(&mut self, content: &str) -> Step {
        let keyword = content.trim().to_lowercase();
        if FINISH_KEYWORDS.contains(&keyword.as_str()) {
            return Step::Finish;
        }
        if keyword == CANCEL_KEYWORD {
            return Step::Cancel;
        }
        self.parts.push(content.to_string());
        Step::Continue
    }

    pub fn finish(self) -> Collected {
        Collected::Finished(self.parts)
    }

    pub fn timed_out(self) -> Collected {
        Collected::TimedOut(self.parts)
    }
}

/// Opening message of a long chat: the slash-command text, then each part.
pub fn join_long_message(first: &str, parts: &[String]) -> String {
    std::iter::once(first)
        .chain(parts.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collect messages from `author` in `channel` until a keyword or a timeout.
pub async fn collect_long_message(ctx: &Context, channel: ChannelId, author: UserId) -> Collected {
    let mut long = LongMessage::new();
    loop {
        let next = MessageCollector::new(ctx.shard.clone())
            .author_id(author)
            .channel_id(channel)
            .timeout(PER_MESSAGE_TIMEOUT)
            .next()
            .await;

        let Some(message) = next else {
            debug!(channel = %channel, "long message collection timed out");
            return long.timed_out();
        };
        match long.push(&message.content) {
            Step::Continue => {
                if let Err(e) = message.react(&ctx.http, '\u{2705}').await {
                    warn!(
                        channel = %channel,
                        error = %e,
                        "failed to acknowledge long message part"
                    );
                }
            }
            Step::Finish => return long.finish(),
            Step::Cancel => return Collected::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_keywords_end_collection() {
        for keyword in ["$end", "$DONE", " $stop "] {
            let mut long = LongMessage::new();
            assert_eq!(long.push("part one"), Step::Continue);
            assert_eq!(long.push(keyword), Step::Finish);
            assert_eq!(long.finish(), Collected::Finished(vec!["part one".into()]));
        }
    }

    #[test]
    fn cancel_discards_everything() {
        let mut long = LongMessage::new();
        long.push("a");
        assert_eq!(long.push("$Cancel"), Step::Cancel);
    }

    #[test]
    fn timeout_keeps_partial_accumulation() {
        let mut long = LongMessage::new();
        long.push("a");
        long.push("b");
        let collected = long.timed_out();
        assert_eq!(collected, Collected::TimedOut(vec!["a".into(), "b".into()]));
        assert_eq!(collected.into_parts(), Some(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn nothing_collected_starts_nothing() {
        assert_eq!(LongMessage::new().finish().into_parts(), None);
        assert_eq!(LongMessage::new().timed_out().into_parts(), None);
        assert_eq!(Collected::Cancelled.into_parts(), None);
    }

    #[test]
    fn long_message_joins_with_newlines() {
        assert_eq!(
            join_long_message("first", &["second".into(), "third".into()]),
            "first\nsecond\nthird"
        );
    }
}
