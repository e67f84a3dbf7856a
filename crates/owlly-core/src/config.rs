use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::types::ChannelLogs;

pub const DEFAULT_CONFIG_PATH: &str = "owlly.toml";
pub const DEFAULT_COMPLETION_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4";
pub const DEFAULT_SUMMARY_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_KNOWLEDGE_CUTOFF: &str = "2021-09";
pub const DEFAULT_MAX_INPUT_TOKEN: usize = 8192;
pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful assistant. \
Knowledge cutoff: {knowledge_cutoff}. Current date: {current_date}.";
/// Discord caps messages at 2000 characters; leave room for fence re-opening.
pub const DEFAULT_MAX_CHAR_REPLY: usize = 1900;
pub const DEFAULT_HISTORY_LIMIT: u8 = 100;

/// Permissions requested by the invite link: threads, embeds, files, history.
const INVITE_PERMISSIONS: u64 = 328_565_073_920;

/// Top-level config (owlly.toml + OWLLY_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwllyConfig {
    pub discord: DiscordConfig,
    pub completion: CompletionConfig,
    #[serde(default)]
    pub thread: ThreadConfig,
    #[serde(default)]
    pub files: FilesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub bot_token: String,
    /// Application id, only used to print the invite URL.
    #[serde(default)]
    pub client_id: u64,
    /// Register slash commands on `ready`. Defaults to true.
    #[serde(default = "bool_true")]
    pub slash_commands: bool,
    /// How many messages of a thread are fed back to the model.
    #[serde(default = "default_history_limit")]
    pub history_limit: u8,
    /// Guilds the bot answers in. DMs are never served.
    #[serde(default)]
    pub allowed_servers: Vec<AllowedServer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowedServer {
    pub id: u64,
    pub logs: Option<ChannelLogs>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_url")]
    pub url: String,
    pub api_key: String,
    /// Global default model, used when neither thread nor persona names one.
    #[serde(default = "default_model")]
    pub model: String,
    /// Model used to summarise the first message into a thread title.
    #[serde(default = "default_summary_model")]
    pub summary_model: String,
    /// System template of the fallback persona.
    #[serde(default = "default_system_message")]
    pub system_message: String,
    #[serde(default = "default_knowledge_cutoff")]
    pub knowledge_cutoff: String,
    /// Seconds to wait for follow-up messages before answering.
    #[serde(default)]
    pub delay: f64,
    #[serde(default = "default_max_input_token")]
    pub max_input_token: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadConfig {
    #[serde(default = "default_active_prefix")]
    pub active_prefix: String,
    #[serde(default = "default_inactive_prefix")]
    pub inactive_prefix: String,
    #[serde(default = "default_max_char_reply")]
    pub max_char_reply: usize,
    #[serde(default)]
    pub format: ThreadFormat,
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self {
            active_prefix: default_active_prefix(),
            inactive_prefix: default_inactive_prefix(),
            max_char_reply: DEFAULT_MAX_CHAR_REPLY,
            format: ThreadFormat::default(),
        }
    }
}

/// Thread title template. Placeholders: `{{date}}`, `{{time}}`, `{{author}}`,
/// `{{message}}`, `{{resume}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadFormat {
    #[serde(default = "default_title_format")]
    pub title: String,
    #[serde(default = "default_date_format")]
    pub date: String,
    #[serde(default = "default_time_format")]
    pub time: String,
}

impl Default for ThreadFormat {
    fn default() -> Self {
        Self {
            title: default_title_format(),
            date: default_date_format(),
            time: default_time_format(),
        }
    }
}

/// Locations of the persona definitions and the model catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    #[serde(default = "default_personas_path")]
    pub personas: String,
    /// Optional; entries here replace same-named entries of `personas`.
    #[serde(default = "default_private_personas_path")]
    pub private_personas: String,
    #[serde(default = "default_models_path")]
    pub models: String,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            personas: default_personas_path(),
            private_personas: default_private_personas_path(),
            models: default_models_path(),
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_history_limit() -> u8 {
    DEFAULT_HISTORY_LIMIT
}
fn default_completion_url() -> String {
    DEFAULT_COMPLETION_URL.to_string()
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_summary_model() -> String {
    DEFAULT_SUMMARY_MODEL.to_string()
}
fn default_system_message() -> String {
    DEFAULT_SYSTEM_MESSAGE.to_string()
}
fn default_knowledge_cutoff() -> String {
    DEFAULT_KNOWLEDGE_CUTOFF.to_string()
}
fn default_max_input_token() -> usize {
    DEFAULT_MAX_INPUT_TOKEN
}
fn default_active_prefix() -> String {
    "OWL-ACTIVE".to_string()
}
fn default_inactive_prefix() -> String {
    "OWL-CLOSED".to_string()
}
fn default_max_char_reply() -> usize {
    DEFAULT_MAX_CHAR_REPLY
}
fn default_title_format() -> String {
    "[{{date}}-{{time}}] {{author}}".to_string()
}
fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}
fn default_time_format() -> String {
    "%H:%M:%S".to_string()
}
fn default_personas_path() -> String {
    "persona.yml".to_string()
}
fn default_private_personas_path() -> String {
    "persona.private.yml".to_string()
}
fn default_models_path() -> String {
    "openai_models.json".to_string()
}

impl OwllyConfig {
    /// Load config from a TOML file with OWLLY_* env var overrides.
    ///
    /// Nested keys use a double underscore: `OWLLY_COMPLETION__API_KEY`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path.unwrap_or(DEFAULT_CONFIG_PATH);
        Self::from_figment(Figment::new().merge(Toml::file(path)))
    }

    fn from_figment(figment: Figment) -> crate::error::Result<Self> {
        let config: OwllyConfig = figment
            .merge(Env::prefixed("OWLLY_").split("__"))
            .extract()
            .map_err(|e| crate::error::OwllyError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> crate::error::Result<()> {
        if self.discord.bot_token.trim().is_empty() {
            return Err(crate::error::OwllyError::Config(
                "discord.bot_token is empty".to_string(),
            ));
        }
        if self.thread.max_char_reply == 0 {
            return Err(crate::error::OwllyError::Config(
                "thread.max_char_reply must be positive".to_string(),
            ));
        }
        if self.thread.active_prefix.split_whitespace().count() != 1 {
            return Err(crate::error::OwllyError::Config(format!(
                "thread.active_prefix must be a single word, got {:?}",
                self.thread.active_prefix
            )));
        }
        Ok(())
    }

    pub fn is_guild_allowed(&self, guild_id: u64) -> bool {
        self.discord.allowed_servers.iter().any(|s| s.id == guild_id)
    }

    /// Log channel settings of a guild, if it has any.
    pub fn guild_logs(&self, guild_id: u64) -> Option<&ChannelLogs> {
        self.discord
            .allowed_servers
            .iter()
            .find(|s| s.id == guild_id)
            .and_then(|s| s.logs.as_ref())
    }

    pub fn invite_url(&self) -> String {
        format!(
            "https://discord.com/api/oauth2/authorize?client_id={}&permissions={}&scope=bot",
            self.discord.client_id, INVITE_PERMISSIONS
        )
    }
}
