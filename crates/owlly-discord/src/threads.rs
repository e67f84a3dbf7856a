//! Thread-level glue: which channels the bot answers in, reading a thread's
//! state out of Discord, and closing a thread.

use serenity::builder::{CreateMessage, EditThread, GetMessages};
use serenity::http::{CacheHttp, Http};
use serenity::model::channel::{Channel, ChannelType, GuildChannel, Message, MessageType};
use serenity::model::id::{ChannelId, MessageId};
use tracing::{debug, warn};

use owlly_core::OwllyConfig;
use owlly_sessions::{HistoryKind, HistoryMessage, LastMessage, StarterMessage, ThreadSnapshot};

use crate::embed::{notice, BLUE};

/// A channel as far as conversations are concerned.
#[derive(Debug, Clone)]
pub enum ConversationChannel {
    /// Public, private or announcement thread.
    Thread(GuildChannel),
    /// Regular guild text channel; new chats start here.
    Text(GuildChannel),
    Other,
}

impl ConversationChannel {
    pub fn classify(channel: Channel) -> Self {
        match channel {
            Channel::Guild(gc) => match gc.kind {
                ChannelType::PublicThread
                | ChannelType::PrivateThread
                | ChannelType::NewsThread => {
                    Self::Thread(gc)
                }
                ChannelType::Text => Self::Text(gc),
                _ => Self::Other,
            },
            _ => Self::Other,
        }
    }

    /// Fetch and classify. Fetch failures count as [`ConversationChannel::Other`].
    pub async fn fetch(cache_http: impl CacheHttp, channel_id: ChannelId) -> Self {
        match channel_id.to_channel(cache_http).await {
            Ok(channel) => Self::classify(channel),
            Err(e) => {
                warn!(channel = %channel_id, error = %e, "failed to fetch channel");
                Self::Other
            }
        }
    }

    pub fn thread(self) -> Option<GuildChannel> {
        match self {
            Self::Thread(gc) => Some(gc),
            _ => None,
        }
    }
}

/// Facts about a thread and an event in it that decide whether the bot answers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadFacts {
    /// `None` in DMs.
    pub guild_id: Option<u64>,
    pub author_is_bot: bool,
    pub owner_id: Option<u64>,
    pub archived: bool,
    pub locked: bool,
    pub name: String,
    pub has_last_message: bool,
}

impl ThreadFacts {
    pub fn from_thread(thread: &GuildChannel, author_is_bot: bool) -> Self {
        let metadata = thread.thread_metadata.as_ref();
        Self {
            guild_id: Some(thread.guild_id.get()),
            author_is_bot,
            owner_id: thread.owner_id.map(|id| id.get()),
            archived: metadata.is_some_and(|m| m.archived),
            locked: metadata.is_some_and(|m| m.locked),
            name: thread.name.clone(),
            has_last_message: thread.last_message_id.is_some(),
        }
    }
}

/// Whether the bot should act in this thread.
///
/// The guild must be allowed, the author human, and the thread one the bot
/// created that is still open and carries the active prefix.
pub fn allowed_thread(
    config: &OwllyConfig,
    bot_id: u64,
    facts: &ThreadFacts,
    need_last_message: bool,
) -> bool {
    let Some(guild_id) = facts.guild_id else {
        return false;
    };
    if !config.is_guild_allowed(guild_id) {
        debug!(guild = guild_id, "guild not allowed");
        return false;
    }
    !facts.author_is_bot
        && facts.owner_id == Some(bot_id)
        && !facts.archived
        && !facts.locked
        && facts.name.starts_with(&config.thread.active_prefix)
        && (!need_last_message || facts.has_last_message)
}

/// Rename to the inactive prefix, say so, then archive and lock.
pub async fn close_thread(
    http: &Http,
    channel_id: ChannelId,
    inactive_prefix: &str,
) -> Result<(), serenity::Error> {
    channel_id
        .edit_thread(http, EditThread::new().name(inactive_prefix))
        .await?;
    channel_id
        .send_message(
            http,
            CreateMessage::new().embed(notice("**Thread closed**...", BLUE)),
        )
        .await?;
    channel_id
        .edit_thread(http, EditThread::new().archived(true).locked(true))
        .await?;
    Ok(())
}

/// The message a thread was created from. Its id equals the thread's id and
/// it lives in the parent channel.
pub async fn fetch_starter(http: &Http, thread: &GuildChannel) -> Option<Message> {
    let parent = thread.parent_id?;
    match parent.message(http, MessageId::new(thread.id.get())).await {
        Ok(message) => Some(message),
        Err(e) => {
            debug!(thread = %thread.name, error = %e, "starter message unavailable");
            None
        }
    }
}

pub fn starter_snapshot(message: &Message) -> StarterMessage {
    StarterMessage {
        content: message.content.clone(),
        footer: message
            .embeds
            .first()
            .and_then(|e| e.footer.as_ref())
            .map(|f| f.text.clone()),
    }
}

/// Everything session reconstruction needs from a thread.
pub async fn thread_snapshot(http: &Http, thread: &GuildChannel) -> ThreadSnapshot {
    ThreadSnapshot {
        name: thread.name.clone(),
        starter: fetch_starter(http, thread).await.as_ref().map(starter_snapshot),
    }
}

/// Value of the first field of the message's first embed.
fn first_field_value(message: &Message) -> Option<String> {
    message
        .embeds
        .first()
        .and_then(|e| e.fields.first())
        .map(|f| f.value.clone())
}

pub fn history_message(message: &Message) -> HistoryMessage {
    let kind = if message.kind == MessageType::ThreadStarterMessage {
        HistoryKind::ThreadStarter {
            referenced_field: message.referenced_message.as_deref().and_then(first_field_value),
        }
    } else {
        HistoryKind::Regular
    };
    HistoryMessage {
        author_name: message.author.name.clone(),
        content: message.content.clone(),
        kind,
    }
}

/// Up to `limit` messages of the thread, newest first.
pub async fn fetch_history(
    http: &Http,
    channel_id: ChannelId,
    limit: u8,
) -> Result<Vec<HistoryMessage>, serenity::Error> {
    let messages = channel_id
        .messages(http, GetMessages::new().limit(limit))
        .await?;
    Ok(messages.iter().map(history_message).collect())
}

/// The thread's newest message, fetched fresh rather than from the cache.
pub async fn last_message(http: &Http, channel_id: ChannelId) -> Option<LastMessage> {
    match channel_id.messages(http, GetMessages::new().limit(1)).await {
        Ok(messages) => messages.first().map(|m| LastMessage {
            id: m.id.get(),
            author_id: m.author.id.get(),
        }),
        Err(e) => {
            warn!(channel = %channel_id, error = %e, "failed to fetch last message");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use owlly_core::config::{
        AllowedServer, CompletionConfig, DiscordConfig, FilesConfig, ThreadConfig,
    };

    const BOT: u64 = 7;

    fn config() -> OwllyConfig {
        OwllyConfig {
            discord: DiscordConfig {
                bot_token: "t".into(),
                client_id: 1,
                slash_commands: true,
                history_limit: 100,
                allowed_servers: vec![AllowedServer { id: 1, logs: None }],
            },
            completion: CompletionConfig {
                url: String::new(),
                api_key: String::new(),
                model: "gpt-4".into(),
                summary_model: "gpt-3.5-turbo".into(),
                system_message: String::new(),
                knowledge_cutoff: String::new(),
                delay: 0.0,
                max_input_token: 8192,
            },
            thread: ThreadConfig::default(),
            files: FilesConfig::default(),
        }
    }

    fn open_thread() -> ThreadFacts {
        ThreadFacts {
            guild_id: Some(1),
            author_is_bot: false,
            owner_id: Some(BOT),
            archived: false,
            locked: false,
            name: "OWL-ACTIVE - \u{1f989} chat".into(),
            has_last_message: true,
        }
    }

    #[test]
    fn open_bot_thread_is_allowed() {
        assert!(allowed_thread(&config(), BOT, &open_thread(), true));
    }

    #[test]
    fn dms_and_unknown_guilds_are_blocked() {
        let cfg = config();
        let dm = ThreadFacts {
            guild_id: None,
            ..open_thread()
        };
        let elsewhere = ThreadFacts {
            guild_id: Some(2),
            ..open_thread()
        };
        assert!(!allowed_thread(&cfg, BOT, &dm, false));
        assert!(!allowed_thread(&cfg, BOT, &elsewhere, false));
    }

    #[test]
    fn foreign_closed_or_renamed_threads_are_ignored() {
        let cfg = config();
        for facts in [
            ThreadFacts {
                author_is_bot: true,
                ..open_thread()
            },
            ThreadFacts {
                owner_id: Some(99),
                ..open_thread()
            },
            ThreadFacts {
                archived: true,
                ..open_thread()
            },
            ThreadFacts {
                locked: true,
                ..open_thread()
            },
            ThreadFacts {
                name: "OWL-CLOSED".into(),
                ..open_thread()
            },
        ] {
            assert!(!allowed_thread(&cfg, BOT, &facts, false), "{facts:?}");
        }
    }

    #[test]
    fn last_message_only_required_for_messages() {
        let cfg = config();
        let empty = ThreadFacts {
            has_last_message: false,
            ..open_thread()
        };
        assert!(allowed_thread(&cfg, BOT, &empty, false));
        assert!(!allowed_thread(&cfg, BOT, &empty, true));
    }
}
