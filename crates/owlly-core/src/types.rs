use std::fmt;

use serde::{Deserialize, Serialize};

/// Author role of a message sent to the completion API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        })
    }
}

/// A single role/content pair of the completion request.
///
/// Serialises to the wire shape `{"role": "...", "content": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(rename = "content")]
    pub text: Option<String>,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: Some(text.into()),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }
}

/// A named response style: icon, colour, title, system template and default model.
///
/// Values are never mutated in place. The `with_*` methods return a new
/// persona with one field replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub icon: String,
    pub system: String,
    pub color: String,
    pub title: String,
    pub model: String,
}

impl Persona {
    pub fn with_system(&self, system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            ..self.clone()
        }
    }

    pub fn with_model(&self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self.clone()
        }
    }
}

/// Completion model descriptor from the model catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAIModel {
    pub name: String,
    pub knowledge_cutoff: String,
    pub max_input_token: usize,
}

/// Kinds of events that can be mirrored to a guild's log channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogEvent {
    Message,
    Created,
    Changed,
    Closed,
}

impl LogEvent {
    /// Bold headline used at the top of a log block.
    pub fn headline(self) -> &'static str {
        match self {
            LogEvent::Message => "New message received",
            LogEvent::Created => "Thread created",
            LogEvent::Changed => "Persona changed",
            LogEvent::Closed => "Thread closed",
        }
    }
}

/// Which event kinds a guild mirrors to its log channel. Unset kinds are off.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnabledEvents {
    #[serde(default)]
    pub message: bool,
    #[serde(default)]
    pub created: bool,
    #[serde(default)]
    pub changed: bool,
    #[serde(default)]
    pub closed: bool,
}

/// Per-guild log channel settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelLogs {
    pub channel_id: u64,
    #[serde(default)]
    pub event: EnabledEvents,
}

impl ChannelLogs {
    pub fn is_enabled(&self, event: LogEvent) -> bool {
        match event {
            LogEvent::Message => self.event.message,
            LogEvent::Created => self.event.created,
            LogEvent::Changed => self.event.changed,
            LogEvent::Closed => self.event.closed,
        }
    }
}
