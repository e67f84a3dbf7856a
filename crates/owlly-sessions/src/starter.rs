//! What the bot writes into a thread's starter message, and how it reads it back.
//!
//! The starter message is the only persistence a conversation has:
//! - its embed footer holds `"Model: <name>"`,
//! - its body, when non-empty, holds `"**__System Message__**:\n> <text>"`,
//! - its first embed field holds the user's opening message.

/// Marker the embed footer uses to record the thread's model.
pub const FOOTER_MODEL_PREFIX: &str = "Model: ";

/// Marker that opens an override system message in the starter body.
pub const SYSTEM_MESSAGE_MARKER: &str = "**__System Message__**:\n>";

/// Embed field name carrying the opening message.
pub const MESSAGE_FIELD_NAME: &str = "Message :";

/// Discord caps embed field values at 1024 characters.
const MESSAGE_FIELD_WIDTH: usize = 1020;
const SHORTEN_PLACEHOLDER: &str = " [...]";

/// Model name recorded in a footer such as `"Model: gpt-4"`.
pub fn footer_model_name(footer: &str) -> Option<&str> {
    let start = footer.find(FOOTER_MODEL_PREFIX)? + FOOTER_MODEL_PREFIX.len();
    let name = footer[start..].split_whitespace().next()?;
    Some(name)
}

/// Footer text recording `model`, keeping anything written before the marker.
pub fn update_footer(old_footer: Option<&str>, model: &str) -> String {
    match old_footer.and_then(|f| f.find(FOOTER_MODEL_PREFIX).map(|i| &f[..i])) {
        Some(head) => format!("{head}{FOOTER_MODEL_PREFIX}{model}"),
        None => format!("{FOOTER_MODEL_PREFIX}{model}"),
    }
}

/// Starter body recording an override system message.
pub fn system_body(system: &str) -> String {
    format!("{SYSTEM_MESSAGE_MARKER} {system}")
}

/// Override system message recorded in a starter body, if any.
pub fn parse_system_body(content: &str) -> Option<&str> {
    let start = content.find(SYSTEM_MESSAGE_MARKER)? + SYSTEM_MESSAGE_MARKER.len();
    let rest = &content[start..];
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

/// Value of the opening-message field: a block quote, shortened on word
/// boundaries so it fits an embed field.
pub fn message_field_value(message: &str) -> String {
    format!(">>> {}", shorten(message, MESSAGE_FIELD_WIDTH))
}

/// Collapse whitespace and, if still longer than `width` characters, drop
/// trailing words until the text plus `" [...]"` fits.
pub fn shorten(text: &str, width: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let collapsed = words.join(" ");
    if collapsed.chars().count() <= width {
        return collapsed;
    }

    let budget = width.saturating_sub(SHORTEN_PLACEHOLDER.chars().count());
    let mut out = String::new();
    let mut len = 0;
    for word in words {
        let extra = word.chars().count() + usize::from(!out.is_empty());
        if len + extra > budget {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
        len += extra;
    }

    if out.is_empty() {
        // a single word longer than the budget: hard cut
        out = collapsed.chars().take(budget).collect();
    }
    out.push_str(SHORTEN_PLACEHOLDER);
    out.trim_start().to_string()
}
