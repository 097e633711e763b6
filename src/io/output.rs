use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{
    ChunkResult, Gender, GenderSource, JobId, LanguageSource, OverlapRegion, QualityReport,
    SpeakerProfile, Stage, TranslationDecision,
};

/// Machine-readable summary of a finished job, written next to the output
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: JobId,
    pub source: PathBuf,
    pub output: PathBuf,
    pub source_language: Option<String>,
    pub target_language: String,
    /// Duration of the extracted source audio
    pub source_ms: u64,
    pub stages: Vec<StageSummary>,
    pub overlap_regions: Vec<OverlapRegion>,
    pub speakers: SpeakerProfile,
    /// Chunk outcomes ordered by start time
    pub chunks: Vec<ChunkOutcome>,
    pub quality: QualityReport,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageSummary {
    pub stage: Stage,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkOutcome {
    pub chunk_id: String,
    pub segment_id: String,
    pub speaker: String,
    pub start_ms: u64,
    pub end_ms: u64,
    pub gender: Gender,
    pub gender_source: GenderSource,
    pub detected_language: Option<String>,
    pub language_source: LanguageSource,
    pub decision: TranslationDecision,
    pub transcribed_text: String,
    pub aligned_text: String,
    pub audio_path: Option<PathBuf>,
    pub intentional_silence: bool,
    pub kept_original: bool,
    pub truncated: bool,
}

impl From<&ChunkResult> for ChunkOutcome {
    fn from(r: &ChunkResult) -> Self {
        Self {
            chunk_id: r.chunk_id.clone(),
            segment_id: r.segment_id.clone(),
            speaker: r.speaker.clone(),
            start_ms: r.start_ms,
            end_ms: r.end_ms,
            gender: r.gender,
            gender_source: r.gender_source,
            detected_language: r.detected_language.clone(),
            language_source: r.language_source,
            decision: r.decision,
            transcribed_text: r.transcribed_text.clone(),
            aligned_text: r.aligned_text.clone(),
            audio_path: r.audio_path.clone(),
            intentional_silence: r.intentional_silence,
            kept_original: r.kept_original,
            truncated: r.truncated,
        }
    }
}

/// Chunk outcomes sorted by (start, chunk id)
pub fn chunk_outcomes(results: &[ChunkResult]) -> Vec<ChunkOutcome> {
    let mut outcomes: Vec<ChunkOutcome> = results.iter().map(ChunkOutcome::from).collect();
    outcomes.sort_by(|a, b| (a.start_ms, &a.chunk_id).cmp(&(b.start_ms, &b.chunk_id)));
    outcomes
}

impl JobReport {
    /// Write to a JSON file
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;
        serde_json::to_writer_pretty(file, self).context("Failed to write JSON")?;
        Ok(())
    }

    /// Format the dubbed timeline as human-readable text
    pub fn format_timeline(&self) -> String {
        let mut output = String::new();

        for chunk in &self.chunks {
            let mut flags = Vec::new();
            if chunk.audio_path.is_none() {
                flags.push(if chunk.intentional_silence { "pause" } else { "silent" });
            }
            if chunk.kept_original {
                flags.push("untranslated");
            }
            if chunk.truncated {
                flags.push("truncated");
            }
            let flags = if flags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", flags.join(", "))
            };

            output.push_str(&format!(
                "[{} - {}] {} ({}){}:\n",
                format_timestamp(chunk.start_ms),
                format_timestamp(chunk.end_ms),
                chunk.speaker,
                chunk.gender,
                flags
            ));
            output.push_str(&wrap_text(&chunk.aligned_text, 80));
            output.push_str("\n\n");
        }

        output
    }

    /// Write the timeline to a text file
    pub fn write_timeline(&self, path: &Path) -> Result<()> {
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;
        write!(file, "{}", self.format_timeline())?;
        Ok(())
    }
}

/// Format milliseconds as MM:SS.mmm
pub fn format_timestamp(ms: u64) -> String {
    let seconds = ms / 1000;
    let millis = ms % 1000;
    let minutes = seconds / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}.{:03}", minutes, secs, millis)
}

/// Wrap text at approximately the given width
fn wrap_text(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut line_len = 0;

    for word in text.split_whitespace() {
        if line_len + word.len() + 1 > width && line_len > 0 {
            result.push('\n');
            line_len = 0;
        }
        if line_len > 0 {
            result.push(' ');
            line_len += 1;
        }
        result.push_str(word);
        line_len += word.len();
    }

    result
}
