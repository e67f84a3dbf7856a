//! Thread naming convention: `"<active-prefix> - <icon> <title>"`.
//!
//! The icon sits at whitespace token 2 and is how a thread remembers its persona.

use std::collections::BTreeSet;
use std::fmt::Write;

use chrono::NaiveDateTime;

use owlly_core::config::ThreadFormat;

/// Discord rejects thread names longer than this.
pub const THREAD_NAME_MAX: usize = 100;

const AUTHOR_MAX: usize = 10;
const MESSAGE_PREVIEW: usize = 5;

/// The icon slot of a thread name, if the name has one.
pub fn icon_token(thread_name: &str) -> Option<&str> {
    thread_name.split_whitespace().nth(2)
}

pub fn format_thread_name(active_prefix: &str, icon: &str, title: &str) -> String {
    let name = format!("{active_prefix} - {icon} {title}");
    name.chars().take(THREAD_NAME_MAX).collect()
}

pub fn is_active(thread_name: &str, active_prefix: &str) -> bool {
    thread_name.starts_with(active_prefix)
}

/// Swap the icon slot for `new_icon`.
///
/// Returns `None` when the name has no icon slot or the slot holds something
/// the bot did not write, so user-renamed threads are left alone.
pub fn replace_icon(
    thread_name: &str,
    new_icon: &str,
    known_icons: &BTreeSet<String>,
) -> Option<String> {
    let mut tokens: Vec<&str> = thread_name.split(' ').collect();
    if tokens.len() < 3 || !known_icons.contains(tokens[2]) {
        return None;
    }
    tokens[2] = new_icon;
    Some(tokens.join(" "))
}

/// True when the title template asks for an LLM summary of the first message.
pub fn wants_resume(format: &ThreadFormat) -> bool {
    format.title.contains("{{resume}}")
}

/// Render the free-text part of a new thread's name.
pub fn render_title(
    format: &ThreadFormat,
    now: NaiveDateTime,
    author: &str,
    message: &str,
    resume: Option<&str>,
) -> String {
    let date = format_or_default(now, &format.date, "%Y-%m-%d");
    let time = format_or_default(now, &format.time, "%H:%M:%S");
    let author: String = author.chars().take(AUTHOR_MAX).collect();
    let preview: String = message.chars().take(MESSAGE_PREVIEW).collect();

    let mut title = format
        .title
        .replace("{{date}}", &date)
        .replace("{{time}}", &time)
        .replace("{{author}}", &author)
        .replace("{{message}}", &preview);
    if let Some(resume) = resume {
        title = title.replace("{{resume}}", resume);
    }
    title
}

/// strftime with a fallback: a bad user format must not abort thread creation.
fn format_or_default(now: NaiveDateTime, fmt: &str, default: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", now.format(fmt)).is_ok() {
        return out;
    }
    now.format(default).to_string()
}
