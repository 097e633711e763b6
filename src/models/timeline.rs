use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{DubError, Result};

/// A speaker-attributed interval reported by diarization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakerTurn {
    /// Start timestamp in milliseconds (source time base)
    pub start_ms: u64,
    /// End timestamp in milliseconds, always greater than `start_ms`
    pub end_ms: u64,
    /// Diarization label, e.g. "SPEAKER_00"
    pub speaker: String,
    /// Whether this turn intersects any overlap region
    #[serde(default)]
    pub overlap: bool,
}

impl SpeakerTurn {
    /// Create a turn, rejecting empty or inverted intervals
    pub fn new(start_ms: u64, end_ms: u64, speaker: impl Into<String>) -> Result<Self> {
        let speaker = speaker.into();
        if end_ms <= start_ms {
            return Err(DubError::invalid(format!(
                "turn for {} ends at {}ms, not after its start {}ms",
                speaker, end_ms, start_ms
            )));
        }
        Ok(Self {
            start_ms,
            end_ms,
            speaker,
            overlap: false,
        })
    }

    /// Create a turn from fractional seconds as diarization engines report them
    pub fn from_seconds(start: f64, end: f64, speaker: impl Into<String>) -> Result<Self> {
        if !start.is_finite() || !end.is_finite() || start < 0.0 {
            return Err(DubError::invalid(format!(
                "turn timestamps out of range: {} - {}",
                start, end
            )));
        }
        Self::new(seconds_to_ms(start), seconds_to_ms(end), speaker)
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    /// Intersection with another turn, if it has positive length
    pub fn intersection(&self, other: &SpeakerTurn) -> Option<OverlapRegion> {
        let start_ms = self.start_ms.max(other.start_ms);
        let end_ms = self.end_ms.min(other.end_ms);
        (end_ms > start_ms).then_some(OverlapRegion { start_ms, end_ms })
    }

    pub fn intersects(&self, region: &OverlapRegion) -> bool {
        !(self.end_ms <= region.start_ms || self.start_ms >= region.end_ms)
    }
}

/// Time span where two or more turns are active at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OverlapRegion {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl OverlapRegion {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// Deduplicated pairwise intersections of all turns, sorted by start
pub fn find_overlap_regions(turns: &[SpeakerTurn]) -> Vec<OverlapRegion> {
    let mut regions = Vec::new();
    for (i, a) in turns.iter().enumerate() {
        for b in &turns[i + 1..] {
            if let Some(region) = a.intersection(b) {
                regions.push(region);
            }
        }
    }
    regions.sort();
    regions.dedup();
    regions
}

/// Return the turns with their overlap flags set against `regions`
pub fn mark_overlaps(turns: &[SpeakerTurn], regions: &[OverlapRegion]) -> Vec<SpeakerTurn> {
    turns
        .iter()
        .map(|turn| SpeakerTurn {
            overlap: regions.iter().any(|r| turn.intersects(r)),
            ..turn.clone()
        })
        .collect()
}

/// Padded, per-turn region of the job audio with its own artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// Unique identifier, e.g. "seg_0003"
    pub segment_id: String,
    /// Cut audio artifact for this segment
    pub audio_path: PathBuf,
    pub start_ms: u64,
    pub end_ms: u64,
    pub speaker: String,
    pub overlap: bool,
}

impl Segment {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// Fixed-length slice of a segment; the unit of parallel work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique identifier, e.g. "seg_0003_c001"
    pub chunk_id: String,
    /// Originating segment (non-owning back reference)
    pub segment_id: String,
    /// Position within the segment
    pub index: usize,
    pub start_ms: u64,
    pub end_ms: u64,
    pub speaker: String,
    pub overlap: bool,
    /// Cut audio for this chunk; `None` when the cut failed and the chunk
    /// can only be rendered as silence
    pub audio_path: Option<PathBuf>,
}

impl Chunk {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// Tile `[start_ms, end_ms)` into consecutive spans of `chunk_ms`.
///
/// The last span may be shorter. Spans never overlap and leave no gaps.
pub fn chunk_spans(start_ms: u64, end_ms: u64, chunk_ms: u64) -> Vec<(u64, u64)> {
    let step = chunk_ms.max(1);
    let mut spans = Vec::new();
    let mut cursor = start_ms;
    while cursor < end_ms {
        let next = (cursor + step).min(end_ms);
        spans.push((cursor, next));
        cursor = next;
    }
    spans
}

pub fn seconds_to_ms(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1000.0).round() as u64
}

pub fn ms_to_seconds(ms: u64) -> f64 {
    ms as f64 / 1000.0
}
