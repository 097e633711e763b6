//! Translate decision and structural tags.
//!
//! Text travels through the worker as `[speaker|gender] body`. Only the body
//! is ever sent to the translator; the tag is reattached unchanged.

use tracing::debug;

use crate::error::Result;
use crate::models::{Gender, TranslationDecision};
use crate::services::Services;

/// Render the structural tag for a chunk
pub fn structural_tag(speaker: &str, gender: Gender) -> String {
    format!("[{}|{}]", speaker, gender)
}

/// Split `[speaker|gender] body` into tag and body.
///
/// Text without a well-formed leading tag is returned whole as the body.
pub fn split_tag(text: &str) -> (Option<&str>, &str) {
    let trimmed = text.trim_start();
    if let Some(rest) = trimmed.strip_prefix('[') {
        if let Some(close) = rest.find(']') {
            let inner = &rest[..close];
            if inner.contains('|') && !inner.contains('[') {
                let tag_len = close + 2;
                return (Some(&trimmed[..tag_len]), trimmed[tag_len..].trim());
            }
        }
    }
    (None, text.trim())
}

/// Join a tag and a body; an empty body yields just the tag
pub fn attach_tag(tag: Option<&str>, body: &str) -> String {
    match (tag, body.is_empty()) {
        (Some(tag), false) => format!("{} {}", tag, body),
        (Some(tag), true) => tag.to_string(),
        (None, _) => body.to_string(),
    }
}

/// Text with no letters, or fewer letters than `min_chars`
pub fn is_noise(text: &str, min_chars: usize) -> bool {
    let letters = text.chars().filter(|c| c.is_alphabetic()).count();
    letters == 0 || letters < min_chars
}

/// Compare language codes on their primary subtag, ignoring case
/// (`hi-IN` equals `hi`)
pub fn same_language(a: &str, b: &str) -> bool {
    let primary = |code: &str| {
        code.split(['-', '_'])
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase()
    };
    let (a, b) = (primary(a), primary(b));
    !a.is_empty() && a == b
}

pub fn decide(
    body: &str,
    detected: Option<&str>,
    target: &str,
    min_chars: usize,
) -> TranslationDecision {
    if is_noise(body, min_chars) {
        return TranslationDecision::Keep;
    }
    match detected {
        Some(lang) if same_language(lang, target) => TranslationDecision::Keep,
        _ => TranslationDecision::Translate,
    }
}

/// Translate the body of tagged text and reattach the tag verbatim
pub async fn translate_tagged(
    services: &Services,
    tagged: &str,
    source: Option<&str>,
    target: &str,
) -> Result<String> {
    let (tag, body) = split_tag(tagged);
    if body.is_empty() {
        return Ok(tagged.to_string());
    }
    let translated = services.translate(body, source, target).await?;
    debug!("Translated {} chars to {}", body.len(), target);
    Ok(attach_tag(tag, translated.trim()))
}
