use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Voice gender category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Female,
    Male,
    /// Classifier could not decide; never committed as a canonical value
    Unknown,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Female => "female",
            Gender::Male => "male",
            Gender::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Gender::Unknown)
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "female" | "f" | "woman" => Ok(Gender::Female),
            "male" | "m" | "man" => Ok(Gender::Male),
            "unknown" | "" => Ok(Gender::Unknown),
            other => Err(format!("unrecognized gender: {}", other)),
        }
    }
}

/// One classifier opinion about a speaker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenderVote {
    pub gender: Gender,
    /// Classifier confidence (0-1)
    pub confidence: f64,
    /// Duration of the audio the vote was computed on
    pub audio_ms: u64,
}

/// Committed voice for one speaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerVoice {
    pub canonical_gender: Gender,
    /// Mean confidence of the winning votes; 0.0 for a fallback assignment
    pub confidence: f64,
    /// Number of valid votes that were counted
    pub votes: usize,
}

/// Canonical gender per speaker label.
///
/// Built once per job before fan-out and shared read-only afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeakerProfile {
    pub speakers: BTreeMap<String, SpeakerVoice>,
}

impl SpeakerProfile {
    pub fn get(&self, speaker: &str) -> Option<&SpeakerVoice> {
        self.speakers.get(speaker)
    }

    pub fn canonical_gender(&self, speaker: &str) -> Option<Gender> {
        self.get(speaker).map(|v| v.canonical_gender)
    }

    pub fn len(&self) -> usize {
        self.speakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.speakers.is_empty()
    }
}
