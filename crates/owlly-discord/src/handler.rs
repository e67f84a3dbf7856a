use std::sync::{Arc, OnceLock};

use serenity::async_trait;
use serenity::model::application::Interaction;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::id::UserId;
use serenity::prelude::{Context, EventHandler};
use tracing::{info, warn};

use crate::context::AppContext;

/// Who the bot is logged in as. Its name identifies assistant turns in
/// thread history.
#[derive(Debug, Clone)]
pub struct BotIdentity {
    pub id: UserId,
    pub name: String,
}

/// Serenity event handler wired to the completion backend.
pub struct OwllyHandler {
    pub app: Arc<AppContext>,
    pub bot: OnceLock<BotIdentity>,
}

#[async_trait]
impl EventHandler for OwllyHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        self.bot
            .set(BotIdentity {
                id: ready.user.id,
                name: ready.user.name.clone(),
            })
            .ok();

        info!(name = %ready.user.name, "Discord bot connected");
        info!(url = %self.app.config.invite_url(), "invite the bot with");

        if self.app.config.discord.slash_commands {
            crate::commands::register_commands(&self.app, &ctx).await;
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(guild_id) = msg.guild_id else {
            return;
        };
        if !self.app.config.is_guild_allowed(guild_id.get()) {
            return;
        }
        let Some(bot) = self.bot.get().cloned() else {
            return;
        };

        let app = Arc::clone(&self.app);
        tokio::spawn(async move {
            if let Err(e) = crate::chat::on_message(&app, &ctx, &bot, &msg).await {
                warn!(
                    channel = %msg.channel_id,
                    code = e.code(),
                    error = %e,
                    "failed to answer message"
                );
            }
        });
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Command(command) = interaction else {
            return;
        };
        let Some(bot) = self.bot.get() else {
            return;
        };
        crate::commands::handle_interaction(&self.app, &ctx, bot, &command).await;
    }
}
