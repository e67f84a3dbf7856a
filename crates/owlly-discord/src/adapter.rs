use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serenity::model::gateway::GatewayIntents;
use serenity::Client;
use tracing::{error, info, warn};

use crate::context::AppContext;
use crate::error::DiscordError;
use crate::handler::OwllyHandler;

/// Wait before retrying a client that failed to build.
const BUILD_RETRY: Duration = Duration::from_secs(30);
/// Wait before reconnecting after the gateway stopped.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Owns the bot's connection to Discord.
///
/// The serenity client is rebuilt from scratch whenever the gateway drops, so
/// the bot stays up for the lifetime of the process.
pub struct DiscordAdapter {
    app: Arc<AppContext>,
}

impl DiscordAdapter {
    pub fn new(app: Arc<AppContext>) -> Result<Self, DiscordError> {
        if app.config.discord.bot_token.trim().is_empty() {
            return Err(DiscordError::NoToken);
        }
        Ok(Self { app })
    }

    /// Connect and keep reconnecting. Never returns.
    pub async fn run(self) {
        // Message content is needed to read thread history and `/start_long` parts.
        let intents = GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT;

        loop {
            let mut client = loop {
                match self.client(intents).await {
                    Ok(client) => break client,
                    Err(e) => {
                        error!(
                            error = %e,
                            retry_in = ?BUILD_RETRY,
                            "failed to build Discord client"
                        );
                        tokio::time::sleep(BUILD_RETRY).await;
                    }
                }
            };

            info!("connecting to the Discord gateway");
            match client.start().await {
                Ok(()) => info!(retry_in = ?RECONNECT_DELAY, "Discord gateway closed"),
                Err(e) => warn!(error = %e, retry_in = ?RECONNECT_DELAY, "Discord gateway failed"),
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    async fn client(&self, intents: GatewayIntents) -> Result<Client, serenity::Error> {
        let handler = OwllyHandler {
            app: Arc::clone(&self.app),
            bot: OnceLock::new(),
        };
        Client::builder(&self.app.config.discord.bot_token, intents)
            .event_handler(handler)
            .await
    }
}
