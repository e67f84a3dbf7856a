use serenity::builder::{CreateAttachment, CreateMessage};
use serenity::http::Http;
use serenity::model::id::ChannelId;
use tracing::{debug, warn};

use owlly_agent::CompletionOutcome;
use owlly_core::config::ThreadConfig;

use crate::embed::{notice, YELLOW};
use crate::threads::close_thread;

/// Markdown code fence.
pub const CODE_FENCE: &str = "```";

/// Name of the attachment used for chunks too long for a message.
const ATTACHMENT_NAME: &str = "message.txt";

/// Plain-text split points, most preferred first.
const BOUNDARIES: [char; 2] = ['\n', ' '];

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split `text` into chunks of at most `limit` characters.
///
/// Fenced code blocks are never cut without closing the fence at the end of
/// the chunk and reopening it (with the block's language tag) at the start of
/// the next. Plain text splits after newlines, then after spaces, then at
/// `limit`. Split points keep their separator, so the chunks concatenate back
/// to the input once the inserted fences are removed. A single code line that
/// does not fit even in its own chunk is emitted oversized. Empty chunks are
/// dropped.
pub fn split_for_delivery(text: &str, limit: usize, fence: &str) -> Vec<String> {
    let limit = limit.max(1);
    let chunks = if fence.is_empty() || !text.contains(fence) {
        split_plain(text, limit, &BOUNDARIES)
    } else {
        text.split(fence)
            .enumerate()
            .flat_map(|(i, part)| {
                if i % 2 == 1 {
                    split_code(part, limit, fence)
                } else {
                    split_plain(part, limit, &BOUNDARIES)
                }
            })
            .collect()
    };
    chunks.into_iter().filter(|c| !c.is_empty()).collect()
}

fn split_plain(text: &str, limit: usize, boundaries: &[char]) -> Vec<String> {
    if char_len(text) <= limit {
        return vec![text.to_string()];
    }
    let Some((&boundary, rest)) = boundaries.split_first() else {
        return hard_cut(text, limit);
    };
    if !text.contains(boundary) {
        return split_plain(text, limit, rest);
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    for unit in text.split_inclusive(boundary) {
        if char_len(unit) > limit {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            chunks.extend(split_plain(unit, limit, rest));
            continue;
        }
        if char_len(&current) + char_len(unit) > limit {
            chunks.push(std::mem::take(&mut current));
        }
        current.push_str(unit);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn hard_cut(text: &str, limit: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(limit).map(|c| c.iter().collect()).collect()
}

/// `code` is the text between two fences.
///
/// Every chunk is framed by a header (the opening fence and its info-string
/// line, or the reopening fence) and a closing fence, and the frame counts
/// against `limit`. Lines that fit `limit` on their own but not inside the
/// frame are cut further; only a line longer than `limit` is emitted whole.
fn split_code(code: &str, limit: usize, fence: &str) -> Vec<String> {
    let whole = format!("{fence}{code}{fence}");
    if char_len(&whole) <= limit {
        return vec![whole];
    }

    let tag = language_tag(code);
    let (head, body) = match code.split_once('\n') {
        Some((first, rest)) if first == tag => (&code[..=first.len()], rest),
        _ => ("", code),
    };
    let header = format!("{fence}{head}");
    let reopen = format!("{fence}{tag}\n");
    let fence_len = char_len(fence);
    let room = limit.saturating_sub(char_len(&header).max(char_len(&reopen)) + fence_len);

    let mut chunks = Vec::new();
    let mut current = header;
    let mut has_lines = false;
    for line in body.split_inclusive('\n') {
        for piece in code_pieces(line, limit, room) {
            if has_lines && char_len(&current) + char_len(&piece) + fence_len > limit {
                current.push_str(fence);
                chunks.push(std::mem::replace(&mut current, reopen.clone()));
            }
            current.push_str(&piece);
            has_lines = true;
        }
    }
    if has_lines || chunks.is_empty() {
        current.push_str(fence);
        chunks.push(current);
    }
    chunks
}

/// One code line, cut to fit `room` unless it is longer than `limit` anyway.
fn code_pieces(line: &str, limit: usize, room: usize) -> Vec<String> {
    let len = char_len(line);
    if len <= room || len > limit || room == 0 {
        return vec![line.to_string()];
    }
    split_plain(line, room, &[' '])
}

/// The info string right after an opening fence (` ```rust `), if any.
fn language_tag(code: &str) -> &str {
    match code.split_once('\n') {
        Some((first, _)) if !first.is_empty() && !first.contains(char::is_whitespace) => first,
        _ => "",
    }
}

/// Post a classified completion to a thread.
///
/// Replies are split for delivery; a chunk still longer than
/// `max_char_reply` goes out as a text attachment. A conversation that no
/// longer fits the model closes the thread.
pub async fn deliver(
    http: &Http,
    channel_id: ChannelId,
    outcome: CompletionOutcome,
    thread: &ThreadConfig,
) -> Result<(), serenity::Error> {
    match outcome {
        CompletionOutcome::Ok(reply) if reply.is_empty() => {
            channel_id
                .send_message(
                    http,
                    CreateMessage::new()
                        .embed(notice("**Invalid response** - empty response", YELLOW)),
                )
                .await?;
        }
        CompletionOutcome::Ok(reply) => {
            let chunks = split_for_delivery(&reply, thread.max_char_reply, CODE_FENCE);
            debug!(channel = %channel_id, chunks = chunks.len(), "delivering reply");
            for chunk in chunks.iter().filter(|c| !c.trim().is_empty()) {
                if char_len(chunk) > thread.max_char_reply {
                    let file = CreateAttachment::bytes(chunk.as_bytes().to_vec(), ATTACHMENT_NAME);
                    channel_id
                        .send_message(http, CreateMessage::new().add_file(file))
                        .await?;
                } else {
                    channel_id.say(http, chunk).await?;
                }
            }
        }
        CompletionOutcome::TooLong => {
            warn!(channel = %channel_id, "conversation too long for the model, closing thread");
            close_thread(http, channel_id, &thread.inactive_prefix).await?;
        }
        CompletionOutcome::Error(detail) => {
            channel_id
                .send_message(
                    http,
                    CreateMessage::new().embed(notice(format!("**Error** - {detail}"), YELLOW)),
                )
                .await?;
        }
    }
    Ok(())
}
