use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{Chunk, Gender};

/// Outcome of the translate decision step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationDecision {
    /// Text is noise or already in the target language
    Keep,
    Translate,
}

/// Where a chunk's voice gender came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenderSource {
    /// Canonical value from the speaker profile
    Profile,
    /// Fresh classification of the chunk audio
    Classified,
    /// Configured fallback after the classifier gave no answer
    Fallback,
}

/// How a chunk's source language was settled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageSource {
    /// No text and no usable hint
    #[default]
    Undetermined,
    /// Transcriber's language, text gave no usable signal
    AudioHint,
    /// Script of the text, transcriber reported nothing
    TextScript,
    /// Script and transcriber agree
    Confirmed,
    /// Transcriber wins over Latin-script or mixed text
    AudioPriority,
    /// Text script clearly contradicts the transcriber
    TextOverride,
}

/// Per-chunk output of the worker pipeline.
///
/// Created by the worker, consumed by the reassembler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkResult {
    pub chunk_id: String,
    pub segment_id: String,
    pub speaker: String,
    pub start_ms: u64,
    pub end_ms: u64,
    pub overlap: bool,
    pub gender: Gender,
    pub gender_source: GenderSource,
    pub transcribed_text: String,
    pub detected_language: Option<String>,
    #[serde(default)]
    pub language_source: LanguageSource,
    pub decision: TranslationDecision,
    /// Final text including the structural tag
    pub aligned_text: String,
    /// Synthesized audio; `None` means the span is rendered as silence
    pub audio_path: Option<PathBuf>,
    /// Translation was needed but failed; original text was kept
    pub kept_original: bool,
    /// Aligned text was cut to fit the duration budget
    pub truncated: bool,
    /// No speech to dub (too short, below the silence threshold or noise);
    /// the silence is expected, not a failure
    #[serde(default)]
    pub intentional_silence: bool,
}

impl ChunkResult {
    /// Result for a chunk that will be rendered as silence
    pub fn silent(chunk: &Chunk, gender: Gender, gender_source: GenderSource) -> Self {
        Self {
            chunk_id: chunk.chunk_id.clone(),
            segment_id: chunk.segment_id.clone(),
            speaker: chunk.speaker.clone(),
            start_ms: chunk.start_ms,
            end_ms: chunk.end_ms,
            overlap: chunk.overlap,
            gender,
            gender_source,
            transcribed_text: String::new(),
            detected_language: None,
            language_source: LanguageSource::Undetermined,
            decision: TranslationDecision::Keep,
            aligned_text: String::new(),
            audio_path: None,
            kept_original: false,
            truncated: false,
            intentional_silence: false,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    /// Rendered as silence although there was speech to dub
    pub fn lost_audio(&self) -> bool {
        self.audio_path.is_none() && !self.intentional_silence
    }

    pub fn is_degraded(&self) -> bool {
        self.lost_audio() || self.kept_original || self.truncated
    }
}

/// Degradation counters reported with a completed job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityReport {
    pub total_chunks: usize,
    /// Chunks with at least one degradation flag
    pub degraded_chunks: usize,
    /// Speech that ended up as silence
    pub null_audio: usize,
    /// Chunks with nothing to dub; not a degradation
    pub pauses: usize,
    pub kept_original: usize,
    pub truncated: usize,
    /// Segments whose audio could not be cut
    pub dropped_segments: usize,
    /// Segments rendered as silence during reassembly
    pub silenced_segments: usize,
    /// Overlapping segments mixed over the track instead of cut
    pub overlaid_segments: usize,
    /// Overlapping segment audio that could not be mixed in
    pub lost_overlaps: usize,
}

impl QualityReport {
    pub fn from_results(results: &[ChunkResult]) -> Self {
        Self {
            total_chunks: results.len(),
            degraded_chunks: results.iter().filter(|r| r.is_degraded()).count(),
            null_audio: results.iter().filter(|r| r.lost_audio()).count(),
            pauses: results
                .iter()
                .filter(|r| r.audio_path.is_none() && r.intentional_silence)
                .count(),
            kept_original: results.iter().filter(|r| r.kept_original).count(),
            truncated: results.iter().filter(|r| r.truncated).count(),
            ..Self::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.degraded_chunks == 0
            && self.dropped_segments == 0
            && self.silenced_segments == 0
            && self.lost_overlaps == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk() -> Chunk {
        Chunk {
            chunk_id: "seg_0000_c000".to_string(),
            segment_id: "seg_0000".to_string(),
            index: 0,
            start_ms: 10_000,
            end_ms: 15_000,
            speaker: "SPEAKER_00".to_string(),
            overlap: false,
            audio_path: None,
        }
    }

    #[test]
    fn test_silent_result_keeps_timing() {
        let result = ChunkResult::silent(&chunk(), Gender::Male, GenderSource::Fallback);
        assert_eq!(result.start_ms, 10_000);
        assert_eq!(result.end_ms, 15_000);
        assert_eq!(result.duration_ms(), 5_000);
        assert_eq!(result.speaker, "SPEAKER_00");
        assert!(result.is_degraded());
    }

    #[test]
    fn test_quality_counts_each_chunk_once() {
        let mut a = ChunkResult::silent(&chunk(), Gender::Male, GenderSource::Profile);
        a.truncated = true;
        let mut b = a.clone();
        b.audio_path = Some(PathBuf::from("b.wav"));
        b.truncated = false;

        let quality = QualityReport::from_results(&[a, b]);
        assert_eq!(quality.total_chunks, 2);
        assert_eq!(quality.degraded_chunks, 1);
        assert_eq!(quality.null_audio, 1);
        assert_eq!(quality.truncated, 1);
        assert!(!quality.is_clean());
    }

    #[test]
    fn test_intentional_silence_is_not_degraded() {
        let mut pause = ChunkResult::silent(&chunk(), Gender::Male, GenderSource::Profile);
        pause.intentional_silence = true;
        let lost = ChunkResult::silent(&chunk(), Gender::Male, GenderSource::Profile);

        assert!(!pause.is_degraded());
        let quality = QualityReport::from_results(&[pause.clone()]);
        assert_eq!(quality.pauses, 1);
        assert_eq!(quality.null_audio, 0);
        assert!(quality.is_clean());

        let quality = QualityReport::from_results(&[pause, lost]);
        assert_eq!(quality.null_audio, 1);
        assert_eq!(quality.degraded_chunks, 1);
    }
}
