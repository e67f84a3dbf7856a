//! Slash commands: `/start`, `/start_long`, `/rerun`, `/edit`, `/close`,
//! `/help`, `/ping`.
//!
//! Registration happens in `ready()` when `discord.slash_commands` is true.
//! Interactions are dispatched from `interaction_create` in the event handler.

use serenity::builder::{
    CreateCommand, CreateCommandOption, CreateInteractionResponse,
    CreateInteractionResponseFollowup, CreateInteractionResponseMessage, EditInteractionResponse,
};
use serenity::model::application::{
    Command, CommandDataOption, CommandDataOptionValue, CommandInteraction, CommandOptionType,
};
use serenity::model::channel::GuildChannel;
use serenity::prelude::Context;
use tracing::{info, warn};

use owlly_sessions::{ModelCatalog, PersonaRegistry};

use crate::chat::{self, display_name, StartRequest};
use crate::collect::{collect_long_message, join_long_message, INSTRUCTIONS};
use crate::context::AppContext;
use crate::embed::help_embed;
use crate::error::DiscordError;
use crate::handler::BotIdentity;
use crate::threads::{allowed_thread, ConversationChannel, ThreadFacts};

/// Discord's limit on choices per option.
const MAX_CHOICES: usize = 25;
/// Discord's limit on a choice label.
const MAX_CHOICE_LABEL: usize = 100;

/// `(label, value)` pairs offered for a choice option.
type Choices = Vec<(String, String)>;

fn capped(choices: impl IntoIterator<Item = (String, String)>) -> Choices {
    choices
        .into_iter()
        .take(MAX_CHOICES)
        .map(|(label, value)| (label.chars().take(MAX_CHOICE_LABEL).collect(), value))
        .collect()
}

pub fn persona_choices(personas: &PersonaRegistry) -> Choices {
    capped(personas.choices())
}

pub fn model_choices(models: &ModelCatalog) -> Choices {
    capped(models.models().iter().map(|m| (m.name.clone(), m.name.clone())))
}

fn string_option(
    name: &str,
    description: &str,
    required: bool,
    choices: &Choices,
) -> CreateCommandOption {
    choices.iter().fold(
        CreateCommandOption::new(CommandOptionType::String, name, description).required(required),
        |option, (label, value)| option.add_string_choice(label, value),
    )
}

fn start_command(
    name: &str,
    description: &str,
    message: &str,
    personas: &Choices,
    models: &Choices,
) -> CreateCommand {
    CreateCommand::new(name)
        .description(description)
        .add_option(string_option(message, "Your message", true, &Vec::new()))
        .add_option(string_option("persona", "Persona to chat with", false, personas))
        .add_option(string_option("model", "Model to use", false, models))
        .add_option(string_option(
            "system_message",
            "Replace the persona's system message",
            false,
            &Vec::new(),
        ))
}

fn build_commands(personas: &Choices, models: &Choices) -> Vec<CreateCommand> {
    let none = Vec::new();
    vec![
        start_command("start", "Start a new chat in a thread", "message", personas, models),
        start_command(
            "start_long",
            "Start a new chat with a message sent in several parts",
            "first_message",
            personas,
            models,
        ),
        CreateCommand::new("rerun").description("Regenerate the last answer of this thread"),
        CreateCommand::new("edit")
            .description("Change the settings of this thread")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::SubCommand,
                    "persona",
                    "Change the persona",
                )
                .add_sub_option(string_option("persona", "New persona", false, personas)),
            )
            .add_option(
                CreateCommandOption::new(CommandOptionType::SubCommand, "model", "Change the model")
                    .add_sub_option(string_option("model", "New model", false, models)),
            )
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::SubCommand,
                    "system",
                    "Change the system message, or restore the persona's when empty",
                )
                .add_sub_option(string_option("system", "New system message", false, &none)),
            ),
        CreateCommand::new("close").description("Close this thread"),
        CreateCommand::new("help")
            .description("Show a persona's settings")
            .add_option(string_option("persona", "Persona to describe", false, personas)),
        CreateCommand::new("ping").description("Check that the bot is alive"),
    ]
}

/// Register global slash commands. Call from `ready()`.
///
/// Persona and model choices are read from disk now; when that fails the
/// commands are still registered, with free-text options.
pub async fn register_commands(app: &AppContext, ctx: &Context) {
    let personas = match app.personas() {
        Ok(p) => persona_choices(&p),
        Err(e) => {
            warn!(code = e.code(), error = %e, "personas unavailable, registering without choices");
            Vec::new()
        }
    };
    let models = match app.models() {
        Ok(m) => model_choices(&m),
        Err(e) => {
            warn!(code = e.code(), error = %e, "models unavailable, registering without choices");
            Vec::new()
        }
    };

    match Command::set_global_commands(&ctx.http, build_commands(&personas, &models)).await {
        Ok(cmds) => info!(count = cmds.len(), "registered global slash commands"),
        Err(e) => warn!(error = %e, "failed to register global slash commands"),
    }
}

/// Dispatch a slash command interaction to the appropriate handler.
pub async fn handle_interaction(
    app: &AppContext,
    ctx: &Context,
    bot: &BotIdentity,
    command: &CommandInteraction,
) {
    let name = command.data.name.as_str();
    let result = match name {
        "start" => handle_start(app, ctx, command, false).await,
        "start_long" => handle_start(app, ctx, command, true).await,
        "rerun" => handle_rerun(app, ctx, bot, command).await,
        "edit" => handle_edit(app, ctx, bot, command).await,
        "close" => handle_close(app, ctx, bot, command).await,
        "help" => handle_help(app, ctx, command).await,
        "ping" => {
            respond_ephemeral(ctx, command, "Pong!").await;
            Ok(())
        }
        _ => {
            respond_ephemeral(ctx, command, "Unknown command.").await;
            Ok(())
        }
    };

    if let Err(e) = result {
        warn!(command = %name, code = e.code(), error = %e, "slash command error");
        let text = match (&e, name) {
            (DiscordError::NotAThread, _) => e.to_string(),
            (_, "start" | "start_long") => format!("Failed to start chat: {e}"),
            _ => format!("Failed to continue chat: {e}"),
        };
        report_failure(ctx, command, &text).await;
    }
}

/// Value of the string option `name`.
fn option_str<'a>(options: &'a [CommandDataOption], name: &str) -> Option<&'a str> {
    options
        .iter()
        .find(|o| o.name == name)
        .and_then(|o| o.value.as_str())
}

/// The invoked subcommand and its options.
fn subcommand(command: &CommandInteraction) -> Option<(&str, &[CommandDataOption])> {
    command.data.options.iter().find_map(|o| match &o.value {
        CommandDataOptionValue::SubCommand(options) => Some((o.name.as_str(), options.as_slice())),
        _ => None,
    })
}

/// The bot thread the command was used in.
async fn conversation_thread(
    app: &AppContext,
    ctx: &Context,
    bot: &BotIdentity,
    command: &CommandInteraction,
) -> Result<GuildChannel, DiscordError> {
    let thread = ConversationChannel::fetch(ctx, command.channel_id)
        .await
        .thread()
        .ok_or(DiscordError::NotAThread)?;
    let facts = ThreadFacts::from_thread(&thread, command.user.bot);
    if !allowed_thread(&app.config, bot.id.get(), &facts, false) {
        return Err(DiscordError::NotAThread);
    }
    Ok(thread)
}

/// `/start` and `/start_long`.
async fn handle_start(
    app: &AppContext,
    ctx: &Context,
    command: &CommandInteraction,
    long: bool,
) -> Result<(), DiscordError> {
    let allowed = command
        .guild_id
        .is_some_and(|g| app.config.is_guild_allowed(g.get()));
    if !allowed {
        respond_ephemeral(ctx, command, "This server is not allowed to use this bot.").await;
        return Ok(());
    }
    if !matches!(
        ConversationChannel::fetch(ctx, command.channel_id).await,
        ConversationChannel::Text(_)
    ) {
        respond_ephemeral(ctx, command, "Chats can only be started in a text channel.").await;
        return Ok(());
    }

    let options = command.data.options.as_slice();
    let first = option_str(options, if long { "first_message" } else { "message" }).unwrap_or("");

    // Shows "thinking..." until the starter message replaces it.
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let message = if long {
        let note = command.channel_id.say(&ctx.http, INSTRUCTIONS).await?;
        let collected = collect_long_message(ctx, command.channel_id, command.user.id).await;
        if let Err(e) = note.delete(&ctx.http).await {
            warn!(error = %e, "failed to delete long message instructions");
        }
        let Some(parts) = collected.into_parts() else {
            info!(user = %display_name(&command.user), "long message cancelled or empty");
            command.delete_response(&ctx.http).await?;
            return Ok(());
        };
        join_long_message(first, &parts)
    } else {
        first.to_string()
    };

    let request = StartRequest {
        message: &message,
        persona: option_str(options, "persona"),
        model: option_str(options, "model"),
        system: option_str(options, "system_message"),
    };
    chat::start_chat(app, ctx, command, request).await
}

/// `/rerun`.
async fn handle_rerun(
    app: &AppContext,
    ctx: &Context,
    bot: &BotIdentity,
    command: &CommandInteraction,
) -> Result<(), DiscordError> {
    let thread = conversation_thread(app, ctx, bot, command).await?;
    respond_ephemeral(ctx, command, "Regenerating the last answer...").await;
    chat::rerun(app, ctx, bot, &thread, display_name(&command.user)).await
}

/// `/edit persona|model|system`.
async fn handle_edit(
    app: &AppContext,
    ctx: &Context,
    bot: &BotIdentity,
    command: &CommandInteraction,
) -> Result<(), DiscordError> {
    let thread = conversation_thread(app, ctx, bot, command).await?;
    let Some((what, options)) = subcommand(command) else {
        respond_ephemeral(ctx, command, "Unknown command.").await;
        return Ok(());
    };

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(
                CreateInteractionResponseMessage::new().ephemeral(true),
            ),
        )
        .await?;

    let user = display_name(&command.user);
    let reply = match what {
        "persona" => {
            let persona = option_str(options, "persona");
            chat::edit_persona(app, &ctx.http, &thread, user, persona).await?
        }
        "model" => {
            let model = option_str(options, "model");
            chat::edit_model(app, &ctx.http, &thread, user, model).await?
        }
        "system" => {
            let system = option_str(options, "system");
            chat::edit_system(app, &ctx.http, &thread, user, system).await?
        }
        _ => "Unknown command.".to_string(),
    };
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(reply))
        .await?;
    Ok(())
}

/// `/close`. Answers before closing, since a locked thread takes no replies.
async fn handle_close(
    app: &AppContext,
    ctx: &Context,
    bot: &BotIdentity,
    command: &CommandInteraction,
) -> Result<(), DiscordError> {
    let thread = conversation_thread(app, ctx, bot, command).await?;
    respond_ephemeral(ctx, command, "Closing the thread.").await;
    chat::close(app, &ctx.http, &thread, display_name(&command.user)).await
}

/// `/help [persona]`. Without a choice, describes the persona of the current
/// thread (or the fallback persona elsewhere).
async fn handle_help(
    app: &AppContext,
    ctx: &Context,
    command: &CommandInteraction,
) -> Result<(), DiscordError> {
    let personas = app.personas()?;
    let persona = match option_str(&command.data.options, "persona") {
        Some(choice) => personas.resolve(Some(choice)),
        None => match ConversationChannel::fetch(ctx, command.channel_id).await.thread() {
            Some(thread) => personas.resolve_by_icon(&thread.name),
            None => personas.fallback(),
        },
    };

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(help_embed(&persona))
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

/// Send an ephemeral response to a slash command (only visible to the invoker).
async fn respond_ephemeral(ctx: &Context, command: &CommandInteraction, content: &str) {
    let response = command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await;
    if let Err(e) = response {
        warn!(command = %command.data.name, error = %e, "failed to answer command");
    }
}

/// Tell the invoker something went wrong, whether or not the interaction was
/// already answered.
async fn report_failure(ctx: &Context, command: &CommandInteraction, content: &str) {
    let first = command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await;
    if first.is_ok() {
        return;
    }
    let followup = CreateInteractionResponseFollowup::new()
        .content(content)
        .ephemeral(true);
    if let Err(e) = command.create_followup(&ctx.http, followup).await {
        warn!(command = %command.data.name, error = %e, "failed to report command failure");
    }
}
