//! Conversation flows: starting a chat, answering in a thread, regenerating
//! the last answer, and rewriting a thread's session.

use std::time::Duration;

use chrono::Local;
use serenity::builder::{CreateThread, EditInteractionResponse, EditMessage, EditThread};
use serenity::http::Http;
use serenity::model::application::CommandInteraction;
use serenity::model::channel::{
    AutoArchiveDuration, ChannelType, Embed, GuildChannel, Message as DiscordMessage,
};
use serenity::model::user::User;
use serenity::prelude::Context;
use tracing::{debug, info, warn};

use owlly_agent::{resume_message, ResumeOutcome};
use owlly_core::{LogEvent, Message, OpenAIModel, Persona};
use owlly_sessions::assemble::{
    build_history, check_budget, count_tokens, drop_trailing_assistant_messages, is_stale,
    normalize_system_text,
};
use owlly_sessions::starter::system_body;
use owlly_sessions::threads::{format_thread_name, render_title, replace_icon, wants_resume};
use owlly_sessions::{Budget, Session, SessionReconstructor};

use crate::context::AppContext;
use crate::embed::{restyle_starter, starter_embed};
use crate::error::DiscordError;
use crate::handler::BotIdentity;
use crate::logs::{send_to_log_channel, LogEntry};
use crate::send::deliver;
use crate::threads::{
    allowed_thread, close_thread, fetch_history, fetch_starter, last_message, thread_snapshot,
    ConversationChannel, ThreadFacts,
};

/// Discord caps audit log reasons at 512 characters.
const AUDIT_REASON_MAX: usize = 500;

/// Name shown in logs for a user.
pub fn display_name(user: &User) -> &str {
    user.global_name.as_deref().unwrap_or(&user.name)
}

/// A thread's derived session plus the request that continues it.
struct Conversation {
    session: Session,
    messages: Vec<Message>,
}

/// Rebuild the conversation of `thread`, log it, and close the thread when it
/// no longer fits the model. `None` means the thread was closed.
async fn prepare(
    app: &AppContext,
    http: &Http,
    bot: &BotIdentity,
    thread: &GuildChannel,
    user: &str,
) -> Result<Option<Conversation>, DiscordError> {
    let personas = app.personas()?;
    let models = app.models()?;
    let snapshot = thread_snapshot(http, thread).await;
    let session =
        SessionReconstructor::new(&personas, &models).reconstruct(&snapshot, app.today())?;

    let history = fetch_history(http, thread.id, app.config.discord.history_limit).await?;
    let messages = build_history(&history, &session.persona.system, &bot.name);
    let tokens = count_tokens(&messages, &session.model.name, app.tokenizer.as_ref());

    send_to_log_channel(
        http,
        &app.config,
        thread.guild_id.get(),
        LogEntry {
            event: LogEvent::Message,
            thread_name: &thread.name,
            user,
            persona: Some(&session.persona),
            model: Some(&session.model),
            tokens: Some(tokens),
        },
    )
    .await;

    if check_budget(tokens, &session.model) == Budget::Close {
        info!(
            thread = %thread.name,
            tokens,
            max = session.model.max_input_token,
            "conversation over the model's input limit, closing thread"
        );
        close_thread(http, thread.id, &app.config.thread.inactive_prefix).await?;
        return Ok(None);
    }
    Ok(Some(Conversation { session, messages }))
}

/// Answer a message posted in a conversation thread.
///
/// Waits the configured delay first, and drops the answer if someone posted
/// again in the meantime (checked after the delay and after the completion).
pub async fn on_message(
    app: &AppContext,
    ctx: &Context,
    bot: &BotIdentity,
    msg: &DiscordMessage,
) -> Result<(), DiscordError> {
    let Some(thread) = ConversationChannel::fetch(ctx, msg.channel_id).await.thread() else {
        return Ok(());
    };
    let facts = ThreadFacts::from_thread(&thread, msg.author.bot);
    if !allowed_thread(&app.config, bot.id.get(), &facts, true) {
        return Ok(());
    }

    let user = display_name(&msg.author);
    let Some(conversation) = prepare(app, &ctx.http, bot, &thread, user).await? else {
        return Ok(());
    };

    let handled = msg.id.get();
    if let Ok(delay) = Duration::try_from_secs_f64(app.config.completion.delay) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
            if is_stale(handled, last_message(&ctx.http, thread.id).await, bot.id.get()) {
                debug!(thread = %thread.name, "newer message arrived during delay, skipping");
                return Ok(());
            }
        }
    }

    let preview: String = msg.content.chars().take(50).collect();
    info!(thread = %thread.name, author = %user, message = %preview, "processing thread message");

    let outcome = {
        let _typing = thread.id.start_typing(&ctx.http);
        app.completion
            .complete(&conversation.session.model.name, &conversation.messages)
            .await
    };

    if is_stale(handled, last_message(&ctx.http, thread.id).await, bot.id.get()) {
        debug!(thread = %thread.name, "newer message arrived during completion, discarding answer");
        return Ok(());
    }
    deliver(&ctx.http, thread.id, outcome, &app.config.thread).await?;
    Ok(())
}

/// Regenerate the last answer of `thread`.
pub async fn rerun(
    app: &AppContext,
    ctx: &Context,
    bot: &BotIdentity,
    thread: &GuildChannel,
    user: &str,
) -> Result<(), DiscordError> {
    let Some(conversation) = prepare(app, &ctx.http, bot, thread, user).await? else {
        return Ok(());
    };
    let messages = drop_trailing_assistant_messages(conversation.messages);

    let outcome = {
        let _typing = thread.id.start_typing(&ctx.http);
        app.completion
            .complete(&conversation.session.model.name, &messages)
            .await
    };
    deliver(&ctx.http, thread.id, outcome, &app.config.thread).await?;
    Ok(())
}

/// What the user asked for in `/start` or `/start_long`.
#[derive(Debug, Clone, Copy)]
pub struct StartRequest<'a> {
    pub message: &'a str,
    pub persona: Option<&'a str>,
    pub model: Option<&'a str>,
    pub system: Option<&'a str>,
}

/// Post the starter message, open a thread on it and answer the opening
/// message there. The interaction must already be deferred.
pub async fn start_chat(
    app: &AppContext,
    ctx: &Context,
    command: &CommandInteraction,
    request: StartRequest<'_>,
) -> Result<(), DiscordError> {
    let personas = app.personas()?;
    let models = app.models()?;
    let session = SessionReconstructor::new(&personas, &models).start(
        request.persona,
        request.model,
        request.system,
        app.today(),
    )?;

    let body = session
        .system_override
        .as_deref()
        .map(system_body)
        .unwrap_or_default();
    let embed = starter_embed(
        &session.persona,
        command.user.id.get(),
        request.message,
        &session.model.name,
    );
    let starter = command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(body).embed(embed))
        .await?;

    let title = thread_title(app, display_name(&command.user), request.message).await;
    let name = format_thread_name(&app.config.thread.active_prefix, &session.persona.icon, &title);
    let reason: String = request.message.chars().take(AUDIT_REASON_MAX).collect();
    let thread = command
        .channel_id
        .create_thread_from_message(
            &ctx.http,
            starter.id,
            CreateThread::new(name)
                .kind(ChannelType::PublicThread)
                .auto_archive_duration(AutoArchiveDuration::OneHour)
                .audit_log_reason(&reason),
        )
        .await?;

    let _typing = thread.id.start_typing(&ctx.http);
    let user = display_name(&command.user);
    info!(thread = %thread.name, user = %user, model = %session.model.name, "thread created");
    send_to_log_channel(
        &ctx.http,
        &app.config,
        thread.guild_id.get(),
        LogEntry {
            event: LogEvent::Created,
            thread_name: &thread.name,
            user,
            persona: Some(&session.persona),
            model: Some(&session.model),
            tokens: None,
        },
    )
    .await;

    let messages = [
        Message::system(normalize_system_text(&session.persona.system)),
        Message::user(request.message),
    ];
    let outcome = app.completion.complete(&session.model.name, &messages).await;
    deliver(&ctx.http, thread.id, outcome, &app.config.thread).await?;
    Ok(())
}

/// Free-text part of a new thread's name, with an LLM summary when the
/// title template asks for one.
async fn thread_title(app: &AppContext, author: &str, message: &str) -> String {
    let format = &app.config.thread.format;
    let resume = if wants_resume(format) {
        match resume_message(
            app.completion.as_ref(),
            &app.config.completion.summary_model,
            message,
            app.config.thread.max_char_reply,
        )
        .await
        {
            ResumeOutcome::Title(title) => title,
            ResumeOutcome::Failed(notice) => {
                warn!(notice = %notice, "thread title summary failed");
                String::new()
            }
        }
    } else {
        String::new()
    };
    render_title(format, Local::now().naive_local(), author, message, Some(resume.as_str()))
}

/// Close `thread` on request and log it.
pub async fn close(
    app: &AppContext,
    http: &Http,
    thread: &GuildChannel,
    user: &str,
) -> Result<(), DiscordError> {
    info!(thread = %thread.name, user = %user, "closing thread");
    close_thread(http, thread.id, &app.config.thread.inactive_prefix).await?;
    send_to_log_channel(
        http,
        &app.config,
        thread.guild_id.get(),
        LogEntry {
            event: LogEvent::Closed,
            thread_name: &thread.name,
            user,
            persona: None,
            model: None,
            tokens: None,
        },
    )
    .await;
    Ok(())
}

/// Changes to a thread's starter message.
#[derive(Debug, Default)]
struct StarterEdit<'a> {
    persona: Option<&'a Persona>,
    model: Option<&'a str>,
    /// New body; an empty string clears an override.
    body: Option<String>,
}

/// The edit to apply to a starter message, or `None` when the change needs
/// the starter's embed and it has none.
fn starter_edit_message(existing: Option<&Embed>, edit: StarterEdit<'_>) -> Option<EditMessage> {
    let mut builder = EditMessage::new();
    if edit.persona.is_some() || edit.model.is_some() {
        builder = builder.embed(restyle_starter(existing?, edit.persona, edit.model));
    }
    if let Some(body) = edit.body {
        builder = builder.content(body);
    }
    Some(builder)
}

/// Rewrite the starter message. `false` when it could not be found or could
/// not record the change.
async fn edit_starter(
    http: &Http,
    thread: &GuildChannel,
    edit: StarterEdit<'_>,
) -> Result<bool, DiscordError> {
    let starter = fetch_starter(http, thread).await;
    let (Some(parent), Some(starter)) = (thread.parent_id, starter) else {
        return Ok(false);
    };
    let Some(builder) = starter_edit_message(starter.embeds.first(), edit) else {
        return Ok(false);
    };
    parent.edit_message(http, starter.id, builder).await?;
    Ok(true)
}

async fn log_change(
    app: &AppContext,
    http: &Http,
    thread: &GuildChannel,
    user: &str,
    persona: Option<&Persona>,
    model: Option<&OpenAIModel>,
) {
    send_to_log_channel(
        http,
        &app.config,
        thread.guild_id.get(),
        LogEntry {
            event: LogEvent::Changed,
            thread_name: &thread.name,
            user,
            persona,
            model,
            tokens: None,
        },
    )
    .await;
}

/// Switch the thread to another persona and that persona's default model.
/// Returns the reply for the user.
pub async fn edit_persona(
    app: &AppContext,
    http: &Http,
    thread: &GuildChannel,
    user: &str,
    choice: Option<&str>,
) -> Result<String, DiscordError> {
    let personas = app.personas()?;
    let models = app.models()?;
    let persona = personas.resolve(choice);
    let model = models.build_from_selection(None, choice, &personas);

    let Some(name) = replace_icon(&thread.name, &persona.icon, &personas.icons()) else {
        return Ok(format!("Failed to change persona to {}", persona.title));
    };
    thread.id.edit_thread(http, EditThread::new().name(&name)).await?;
    let edit = StarterEdit {
        persona: Some(&persona),
        model: Some(&model.name),
        body: None,
    };
    if !edit_starter(http, thread, edit).await? {
        warn!(thread = %thread.name, "starter message missing, model not recorded");
    }
    log_change(app, http, thread, user, Some(&persona), Some(&model)).await;
    Ok(format!("Changed persona to {}", persona.title))
}

/// Record a new model on the thread. Without a choice, the thread's persona
/// default is used.
pub async fn edit_model(
    app: &AppContext,
    http: &Http,
    thread: &GuildChannel,
    user: &str,
    choice: Option<&str>,
) -> Result<String, DiscordError> {
    let personas = app.personas()?;
    let models = app.models()?;
    let persona = personas.resolve_by_icon(&thread.name);
    let model = models.resolve_by_name(Some(choice.unwrap_or(&persona.model)));

    let edit = StarterEdit {
        model: Some(&model.name),
        ..Default::default()
    };
    if !edit_starter(http, thread, edit).await? {
        return Ok(format!("Failed to change model to {}", model.name));
    }
    log_change(app, http, thread, user, None, Some(&model)).await;
    Ok(format!("Changed model to {}", model.name))
}

/// Override the thread's system message, or restore the persona's when
/// `system` is empty.
pub async fn edit_system(
    app: &AppContext,
    http: &Http,
    thread: &GuildChannel,
    user: &str,
    system: Option<&str>,
) -> Result<String, DiscordError> {
    let system = system.map(str::trim).filter(|s| !s.is_empty());
    let edit = StarterEdit {
        body: Some(system.map(system_body).unwrap_or_default()),
        ..Default::default()
    };
    if !edit_starter(http, thread, edit).await? {
        return Ok("Failed to change the system message".to_string());
    }

    let personas = app.personas()?;
    let persona = personas.resolve_by_icon(&thread.name);
    log_change(app, http, thread, user, Some(&persona), None).await;
    Ok(match system {
        Some(_) => "Changed the system message".to_string(),
        None => format!("Restored the system message of {}", persona.title),
    })
}
