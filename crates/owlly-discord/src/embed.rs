//! Embeds the bot posts: the thread starter, notices and `/help`.

use serenity::builder::{CreateEmbed, CreateEmbedFooter};
use serenity::model::channel::Embed;
use serenity::model::Colour;

use owlly_core::Persona;
use owlly_sessions::starter::{
    message_field_value, update_footer, FOOTER_MODEL_PREFIX, MESSAGE_FIELD_NAME,
};

/// Warning notices (errors, invalid replies).
pub const YELLOW: Colour = Colour::new(0xFEE75C);
/// Informational notices (thread closed).
pub const BLUE: Colour = Colour::new(0x3498DB);

/// Parse `#RRGGBB`, `#RGB` or `0xRRGGBB`.
pub fn parse_color(s: &str) -> Option<u32> {
    let s = s.trim();
    let hex = s
        .strip_prefix('#')
        .or_else(|| s.strip_prefix("0x"))
        .unwrap_or(s);
    match hex.len() {
        6 => u32::from_str_radix(hex, 16).ok(),
        3 => {
            let expanded: String = hex.chars().flat_map(|c| [c, c]).collect();
            u32::from_str_radix(&expanded, 16).ok()
        }
        _ => None,
    }
}

/// Persona colour, or the platform default when the persona has a bad one.
pub fn persona_colour(persona: &Persona) -> Colour {
    parse_color(&persona.color).map(Colour::new).unwrap_or_default()
}

pub fn persona_heading(persona: &Persona) -> String {
    format!("{} {}", persona.icon, persona.title)
}

/// The embed of a thread's starter message. Its field and footer are read
/// back on every later message of the thread.
pub fn starter_embed(persona: &Persona, user_id: u64, message: &str, model: &str) -> CreateEmbed {
    CreateEmbed::new()
        .title(persona_heading(persona))
        .description(format!("<@{user_id}> started a new chat"))
        .colour(persona_colour(persona))
        .field(MESSAGE_FIELD_NAME, message_field_value(message), false)
        .footer(CreateEmbedFooter::new(format!("{FOOTER_MODEL_PREFIX}{model}")))
}

/// Copy of an existing starter embed, restyled for `persona` and/or with the
/// footer recording `model`. Fields are kept so the opening message stays
/// part of the conversation.
pub fn restyle_starter(
    existing: &Embed,
    persona: Option<&Persona>,
    model: Option<&str>,
) -> CreateEmbed {
    let mut embed = CreateEmbed::from(existing.clone());
    if let Some(persona) = persona {
        embed = embed
            .title(persona_heading(persona))
            .colour(persona_colour(persona));
    }
    if let Some(model) = model {
        let old = existing.footer.as_ref().map(|f| f.text.as_str());
        embed = embed.footer(CreateEmbedFooter::new(update_footer(old, model)));
    }
    embed
}

pub fn notice(description: impl Into<String>, colour: Colour) -> CreateEmbed {
    CreateEmbed::new().description(description).colour(colour)
}

pub fn help_embed(persona: &Persona) -> CreateEmbed {
    CreateEmbed::new()
        .title(persona_heading(persona))
        .description(persona.system.clone())
        .colour(persona_colour(persona))
        .field("Model", persona.model.clone(), true)
}
