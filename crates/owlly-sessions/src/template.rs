//! Placeholder filling for persona system templates.
//!
//! Templates use single-brace placeholders, `{knowledge_cutoff}` and
//! `{current_date}`, with `{{` and `}}` standing for literal braces. Anything
//! else inside braces, or an unbalanced brace, is a broken template.

use owlly_core::{OwllyError, Result};

pub const KNOWLEDGE_CUTOFF: &str = "knowledge_cutoff";
pub const CURRENT_DATE: &str = "current_date";

/// Fill `template` with the model's knowledge cutoff and today's date.
///
/// `persona` only labels the error.
pub fn fill_system_template(
    persona: &str,
    template: &str,
    knowledge_cutoff: &str,
    current_date: &str,
) -> Result<String> {
    let fail = |reason: String| OwllyError::Template {
        persona: persona.to_string(),
        reason,
    };

    let mut out = String::with_capacity(template.len() + 16);
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut key = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') | None => {
                            return Err(fail(format!("unterminated placeholder {{{key}")));
                        }
                        Some(k) => key.push(k),
                    }
                }
                match key.as_str() {
                    KNOWLEDGE_CUTOFF => out.push_str(knowledge_cutoff),
                    CURRENT_DATE => out.push_str(current_date),
                    other => return Err(fail(format!("unknown placeholder {{{other}}}"))),
                }
            }
            '}' => return Err(fail("single '}' encountered".to_string())),
            c => out.push(c),
        }
    }

    Ok(out)
}
