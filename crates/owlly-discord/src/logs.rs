//! Mirror of thread activity into a guild's log channel.

use serenity::http::Http;
use serenity::model::id::ChannelId;
use tracing::warn;

use owlly_core::{ChannelLogs, LogEvent, OpenAIModel, OwllyConfig, Persona};

/// One loggable event.
#[derive(Debug, Clone, Copy)]
pub struct LogEntry<'a> {
    pub event: LogEvent,
    pub thread_name: &'a str,
    pub user: &'a str,
    pub persona: Option<&'a Persona>,
    pub model: Option<&'a OpenAIModel>,
    /// Only reported for [`LogEvent::Message`].
    pub tokens: Option<usize>,
}

/// The log block for `entry`, or `None` when the guild does not log it.
///
/// The model shown is the explicit model, else the persona's, else
/// `default_model`.
pub fn format_log_event(
    logs: Option<&ChannelLogs>,
    entry: &LogEntry<'_>,
    default_model: &str,
) -> Option<String> {
    let logs = logs?;
    if !logs.is_enabled(entry.event) {
        return None;
    }

    let model = entry
        .model
        .map(|m| m.name.as_str())
        .or(entry.persona.map(|p| p.model.as_str()))
        .unwrap_or(default_model);

    let mut lines = vec![format!("**{}**", entry.event.headline())];
    if let (LogEvent::Message, Some(tokens)) = (entry.event, entry.tokens) {
        lines.push(format!("- __Token count__: {tokens}"));
    }
    lines.push(format!("- __Thread name__: `{}`", entry.thread_name));
    lines.push(format!("- __User__: `{}`", entry.user));
    lines.push(format!("- __Model__: `{model}`"));
    if let Some(persona) = entry.persona {
        lines.push(format!("- __Persona__: `{}`", persona.title));
    }
    Some(lines.join("\n"))
}

/// Post `entry` to the guild's log channel, if it has one that wants it.
/// Failures are logged and swallowed.
pub async fn send_to_log_channel(
    http: &Http,
    config: &OwllyConfig,
    guild_id: u64,
    entry: LogEntry<'_>,
) {
    let logs = config.guild_logs(guild_id);
    let Some(block) = format_log_event(logs, &entry, &config.completion.model) else {
        return;
    };
    let Some(logs) = logs else {
        return;
    };
    let channel = ChannelId::new(logs.channel_id);
    if let Err(e) = channel.say(http, block).await {
        warn!(guild = guild_id, channel = %channel, error = %e, "failed to write log channel");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use owlly_core::EnabledEvents;

    fn logs(events: EnabledEvents) -> ChannelLogs {
        ChannelLogs {
            channel_id: 5,
            event: events,
        }
    }

    fn persona() -> Persona {
        Persona {
            name: "owl".into(),
            icon: "\u{1f989}".into(),
            system: String::new(),
            color: String::new(),
            title: "Wise Owl".into(),
            model: "gpt-4o".into(),
        }
    }

    fn entry<'a>(
        event: LogEvent,
        persona: Option<&'a Persona>,
        model: Option<&'a OpenAIModel>,
    ) -> LogEntry<'a> {
        LogEntry {
            event,
            thread_name: "OWL-ACTIVE - \u{1f989} chat",
            user: "alice",
            persona,
            model,
            tokens: Some(42),
        }
    }

    #[test]
    fn no_config_or_disabled_event_logs_nothing() {
        let e = entry(LogEvent::Created, None, None);
        assert_eq!(format_log_event(None, &e, "gpt-4"), None);
        let only_messages = logs(EnabledEvents {
            message: true,
            ..Default::default()
        });
        assert_eq!(format_log_event(Some(&only_messages), &e, "gpt-4"), None);
    }

    #[test]
    fn message_block_has_tokens_and_persona() {
        let l = logs(EnabledEvents {
            message: true,
            ..Default::default()
        });
        let p = persona();
        let message = entry(LogEvent::Message, Some(&p), None);
        let block = format_log_event(Some(&l), &message, "gpt-4").unwrap();
        assert_eq!(
            block,
            "**New message received**\n\
             - __Token count__: 42\n\
             - __Thread name__: `OWL-ACTIVE - \u{1f989} chat`\n\
             - __User__: `alice`\n\
             - __Model__: `gpt-4o`\n\
             - __Persona__: `Wise Owl`"
        );
    }

    #[test]
    fn model_precedence() {
        let l = logs(EnabledEvents {
            changed: true,
            ..Default::default()
        });
        let p = persona();
        let m = OpenAIModel {
            name: "gpt-4-turbo".into(),
            knowledge_cutoff: String::new(),
            max_input_token: 1,
        };
        let changed = entry(LogEvent::Changed, Some(&p), Some(&m));
        let explicit = format_log_event(Some(&l), &changed, "gpt-4").unwrap();
        assert!(explicit.contains("`gpt-4-turbo`"));
        let unset = entry(LogEvent::Changed, None, None);
        let global = format_log_event(Some(&l), &unset, "gpt-4").unwrap();
        assert!(global.contains("- __Model__: `gpt-4`"));
        assert!(!global.contains("__Persona__"));
        assert!(!global.contains("Token count"));
    }
}
