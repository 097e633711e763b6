//! Source language identification.
//!
//! The transcriber's language is an audio-side guess and is sometimes
//! missing or wrong. The script of the transcribed text gives a second
//! opinion; [`identify`] reconciles the two.

use crate::models::LanguageSource;
use super::translate::same_language;

/// Texts shorter than this carry no script signal
const MIN_TEXT_CHARS: usize = 3;
/// Below this script share the text is treated as mixed
const MIXED_SHARE: f64 = 0.7;
/// Above this script share the text may overrule the transcriber
const OVERRIDE_SHARE: f64 = 0.85;

/// Writing systems the dubber can tell apart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Latin,
    Devanagari,
    Bengali,
    Gurmukhi,
    Gujarati,
    Odia,
    Tamil,
    Telugu,
    Kannada,
    Malayalam,
    Arabic,
}

impl Script {
    pub fn of(c: char) -> Option<Script> {
        let script = match c {
            'a'..='z' | 'A'..='Z' | '\u{00C0}'..='\u{024F}' => Script::Latin,
            '\u{0900}'..='\u{097F}' => Script::Devanagari,
            '\u{0980}'..='\u{09FF}' => Script::Bengali,
            '\u{0A00}'..='\u{0A7F}' => Script::Gurmukhi,
            '\u{0A80}'..='\u{0AFF}' => Script::Gujarati,
            '\u{0B00}'..='\u{0B7F}' => Script::Odia,
            '\u{0B80}'..='\u{0BFF}' => Script::Tamil,
            '\u{0C00}'..='\u{0C7F}' => Script::Telugu,
            '\u{0C80}'..='\u{0CFF}' => Script::Kannada,
            '\u{0D00}'..='\u{0D7F}' => Script::Malayalam,
            '\u{0600}'..='\u{06FF}' => Script::Arabic,
            _ => return None,
        };
        Some(script)
    }

    /// Language assumed when nothing else is known
    pub fn language(&self) -> &'static str {
        match self {
            Script::Latin => "en",
            Script::Devanagari => "hi",
            Script::Bengali => "bn",
            Script::Gurmukhi => "pa",
            Script::Gujarati => "gu",
            Script::Odia => "od",
            Script::Tamil => "ta",
            Script::Telugu => "te",
            Script::Kannada => "kn",
            Script::Malayalam => "ml",
            Script::Arabic => "ur",
        }
    }

    /// Primary language subtags written in this script
    fn languages(&self) -> &'static [&'static str] {
        match self {
            Script::Latin => &[
                "en", "fr", "de", "es", "pt", "it", "nl", "sv", "da", "no", "fi", "pl", "cs",
                "ro", "tr", "id", "ms", "vi", "sw", "tl",
            ],
            Script::Devanagari => &["hi", "mr", "ne", "sa", "kok", "mai", "doi"],
            Script::Bengali => &["bn", "as"],
            Script::Odia => &["od", "or"],
            Script::Arabic => &["ur", "ar", "fa"],
            Script::Gurmukhi => &["pa"],
            Script::Gujarati => &["gu"],
            Script::Tamil => &["ta"],
            Script::Telugu => &["te"],
            Script::Kannada => &["kn"],
            Script::Malayalam => &["ml"],
        }
    }

    /// Whether `language` is normally written in this script
    pub fn writes(&self, language: &str) -> bool {
        self.languages().iter().any(|l| same_language(l, language))
    }
}

/// Dominant script of the text and its share of the letters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScriptGuess {
    pub script: Script,
    pub share: f64,
}

pub fn guess_script(text: &str) -> Option<ScriptGuess> {
    let mut counts: Vec<(Script, usize)> = Vec::new();
    let mut letters = 0;
    for c in text.chars() {
        match Script::of(c) {
            Some(script) => {
                letters += 1;
                match counts.iter_mut().find(|(s, _)| *s == script) {
                    Some((_, n)) => *n += 1,
                    None => counts.push((script, 1)),
                }
            }
            None if c.is_alphabetic() => letters += 1,
            None => {}
        }
    }
    // first seen wins ties
    let (script, count) = counts
        .into_iter()
        .fold(None, |best: Option<(Script, usize)>, next| match best {
            Some(b) if b.1 >= next.1 => Some(b),
            _ => Some(next),
        })?;
    Some(ScriptGuess {
        script,
        share: count as f64 / letters as f64,
    })
}

/// Settled source language of a chunk
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageId {
    pub language: Option<String>,
    pub confidence: f64,
    pub source: LanguageSource,
}

impl LanguageId {
    fn new(language: Option<&str>, confidence: f64, source: LanguageSource) -> Self {
        Self {
            language: language.map(str::to_string),
            confidence,
            source,
        }
    }
}

/// Combine the text's script with the transcriber's language.
///
/// `hint_confidence` of zero means the transcriber gave no confidence.
pub fn identify(text: &str, hint: Option<&str>, hint_confidence: f64) -> LanguageId {
    let text = text.trim();
    let hint = hint.map(str::trim).filter(|h| !h.is_empty());
    let hint_or = |default: f64| {
        if hint_confidence > 0.0 {
            hint_confidence
        } else {
            default
        }
    };

    if text.is_empty() {
        return LanguageId::new(None, 0.0, LanguageSource::Undetermined);
    }

    let guess = if text.chars().count() < MIN_TEXT_CHARS {
        None
    } else {
        guess_script(text)
    };
    let Some(guess) = guess else {
        return match hint {
            Some(hint) => LanguageId::new(Some(hint), hint_or(0.7), LanguageSource::AudioHint),
            None => LanguageId::new(None, 0.0, LanguageSource::Undetermined),
        };
    };

    let Some(hint) = hint else {
        return LanguageId::new(
            Some(guess.script.language()),
            guess.share,
            LanguageSource::TextScript,
        );
    };

    if guess.script.writes(hint) {
        return LanguageId::new(
            Some(hint),
            guess.share.max(hint_or(0.8)),
            LanguageSource::Confirmed,
        );
    }

    // romanized or code-mixed speech: trust the audio
    let latin_hint = Script::Latin.writes(hint);
    if !latin_hint && (guess.script == Script::Latin || guess.share < MIXED_SHARE) {
        return LanguageId::new(Some(hint), hint_or(0.8), LanguageSource::AudioPriority);
    }

    if guess.share > OVERRIDE_SHARE {
        return LanguageId::new(
            Some(guess.script.language()),
            guess.share,
            LanguageSource::TextOverride,
        );
    }

    LanguageId::new(Some(hint), hint_or(0.5), LanguageSource::AudioHint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_script() {
        let guess = guess_script("आप कैसे हैं").unwrap();
        assert_eq!(guess.script, Script::Devanagari);
        assert_eq!(guess.share, 1.0);

        let mixed = guess_script("मेरा phone").unwrap();
        assert_eq!(mixed.script, Script::Latin);
        assert!(mixed.share < MIXED_SHARE);

        assert_eq!(guess_script("வணக்கம்").unwrap().script, Script::Tamil);
        assert!(guess_script("123 ...").is_none());
    }

    #[test]
    fn test_agreement_keeps_hint() {
        let id = identify("आप कैसे हैं", Some("hi-IN"), 0.6);
        assert_eq!(id.language.as_deref(), Some("hi-IN"));
        assert_eq!(id.source, LanguageSource::Confirmed);
        assert_eq!(id.confidence, 1.0);

        // Marathi is also written in Devanagari
        let id = identify("तुम्ही कसे आहात", Some("mr-IN"), 0.9);
        assert_eq!(id.language.as_deref(), Some("mr-IN"));
        assert_eq!(id.source, LanguageSource::Confirmed);
    }

    #[test]
    fn test_missing_hint_uses_script() {
        let id = identify("आप कैसे हैं", None, 0.0);
        assert_eq!(id.language.as_deref(), Some("hi"));
        assert_eq!(id.source, LanguageSource::TextScript);

        let id = identify("good morning", None, 0.0);
        assert_eq!(id.language.as_deref(), Some("en"));
    }

    #[test]
    fn test_script_overrides_wrong_hint() {
        let id = identify("आप कैसे हैं", Some("en-IN"), 0.9);
        assert_eq!(id.language.as_deref(), Some("hi"));
        assert_eq!(id.source, LanguageSource::TextOverride);
    }

    #[test]
    fn test_romanized_speech_trusts_audio() {
        let id = identify("aap kaise ho", Some("hi-IN"), 0.0);
        assert_eq!(id.language.as_deref(), Some("hi-IN"));
        assert_eq!(id.source, LanguageSource::AudioPriority);
        assert_eq!(id.confidence, 0.8);
    }

    #[test]
    fn test_short_or_empty_text() {
        let id = identify("ok", Some("en-IN"), 0.0);
        assert_eq!(id.source, LanguageSource::AudioHint);
        assert_eq!(id.confidence, 0.7);

        assert_eq!(identify("ok", None, 0.0).language, None);
        assert_eq!(identify("  ", Some("en-IN"), 0.9).source, LanguageSource::Undetermined);
    }
}
