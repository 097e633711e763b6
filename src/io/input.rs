use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::warn;

use crate::error::Result;
use crate::models::SpeakerTurn;

/// A turn as diarization engines report it, in fractional seconds
#[derive(Debug, Clone, Deserialize)]
pub struct RawTurn {
    pub start: f64,
    pub end: f64,
    pub speaker: String,
}

/// Accept both `{"turns": [...]}` and a bare array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TurnsDocument {
    Wrapped { turns: Vec<RawTurn> },
    Bare(Vec<RawTurn>),
}

impl TurnsDocument {
    fn into_turns(self) -> Vec<RawTurn> {
        match self {
            TurnsDocument::Wrapped { turns } => turns,
            TurnsDocument::Bare(turns) => turns,
        }
    }
}

/// Read a diarization JSON file
pub fn load_turns_file(path: &Path) -> anyhow::Result<Vec<SpeakerTurn>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    parse_turns_json(&content).context("Failed to parse diarization JSON")
}

pub fn parse_turns_json(json: &str) -> Result<Vec<SpeakerTurn>> {
    let document: TurnsDocument = serde_json::from_str(json)?;
    Ok(validate_turns(document.into_turns()))
}

pub fn parse_turns_value(value: serde_json::Value) -> Result<Vec<SpeakerTurn>> {
    let document: TurnsDocument = serde_json::from_value(value)?;
    Ok(validate_turns(document.into_turns()))
}

/// Convert raw turns, dropping any with negative, non-finite or inverted
/// timestamps. The survivors are sorted by start time.
pub fn validate_turns(raw: Vec<RawTurn>) -> Vec<SpeakerTurn> {
    let mut turns: Vec<SpeakerTurn> = raw
        .into_iter()
        .filter_map(|t| match SpeakerTurn::from_seconds(t.start, t.end, t.speaker) {
            Ok(turn) => Some(turn),
            Err(e) => {
                warn!("Dropping diarization turn: {}", e);
                None
            }
        })
        .collect();
    turns.sort_by(|a, b| {
        (a.start_ms, a.end_ms, &a.speaker).cmp(&(b.start_ms, b.end_ms, &b.speaker))
    });
    turns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wrapped_turns() {
        let json = r#"{
            "turns": [
                {"start": 3.0, "end": 4.5, "speaker": "SPEAKER_01"},
                {"start": 0.25, "end": 2.0, "speaker": "SPEAKER_00"}
            ]
        }"#;

        let turns = parse_turns_json(json).unwrap();

        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].speaker, "SPEAKER_00");
        assert_eq!(turns[0].start_ms, 250);
        assert_eq!(turns[1].end_ms, 4_500);
    }

    #[test]
    fn test_parse_bare_array() {
        let json = r#"[{"start": 0.0, "end": 1.0, "speaker": "A"}]"#;
        assert_eq!(parse_turns_json(json).unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_turns_are_dropped() {
        let json = r#"[
            {"start": -1.0, "end": 1.0, "speaker": "A"},
            {"start": 2.0, "end": 2.0, "speaker": "A"},
            {"start": 5.0, "end": 3.0, "speaker": "B"},
            {"start": 6.0, "end": 7.0, "speaker": "B"}
        ]"#;

        let turns = parse_turns_json(json).unwrap();

        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].start_ms, 6_000);
    }

    #[test]
    fn test_empty_document() {
        assert!(parse_turns_json(r#"{"turns": []}"#).unwrap().is_empty());
        assert!(parse_turns_json("not json").is_err());
    }
}
