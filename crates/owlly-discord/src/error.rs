use owlly_core::OwllyError;

/// Errors produced by the Discord adapter.
#[derive(Debug, thiserror::Error)]
pub enum DiscordError {
    #[error("serenity error: {0}")]
    Serenity(#[from] serenity::Error),

    #[error("no bot token configured")]
    NoToken,

    #[error(transparent)]
    Session(#[from] OwllyError),

    #[error("This command can only be used in a thread created by the bot")]
    NotAThread,
}

impl DiscordError {
    /// Short error code string used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            DiscordError::Serenity(_) => "DISCORD_ERROR",
            DiscordError::NoToken => "NO_TOKEN",
            DiscordError::Session(e) => e.code(),
            DiscordError::NotAThread => "NOT_A_THREAD",
        }
    }
}
