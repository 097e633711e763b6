//! Pipeline configuration.
//!
//! Every tunable has a documented default. Backend selection and secrets come
//! from the environment; the CLI overrides individual fields.

use std::path::PathBuf;
use std::time::Duration;

use crate::models::Gender;

/// Segmentation and chunking
#[derive(Debug, Clone)]
pub struct SegmentConfig {
    /// Padding added on both sides of each diarization turn
    pub padding_ms: u64,
    /// Padded regions shorter than this are skipped
    pub min_segment_ms: u64,
    /// Length of each chunk; the last chunk of a segment may be shorter
    pub chunk_ms: u64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            padding_ms: 100,
            min_segment_ms: 150,
            chunk_ms: 5_000,
        }
    }
}

/// Speaker gender consensus
#[derive(Debug, Clone)]
pub struct ConsensusConfig {
    /// A vote only counts if its audio is at least this long
    pub min_vote_ms: u64,
    /// Committed for speakers without any valid vote
    pub fallback_gender: Gender,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            min_vote_ms: 2_500,
            fallback_gender: Gender::Male,
        }
    }
}

/// Synthesis voices, one per gender category
#[derive(Debug, Clone)]
pub struct VoiceMap {
    pub female: String,
    pub male: String,
}

impl VoiceMap {
    pub fn voice_for(&self, gender: Gender) -> &str {
        match gender {
            Gender::Female => &self.female,
            Gender::Male | Gender::Unknown => &self.male,
        }
    }
}

impl Default for VoiceMap {
    fn default() -> Self {
        Self {
            female: "anushka".to_string(),
            male: "arjun".to_string(),
        }
    }
}

/// Chunk worker steps
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Chunks shorter than this are not sent to transcription
    pub min_transcribe_ms: u64,
    /// Chunks whose mean volume is below this (dBFS) are treated as silence
    pub silence_threshold_db: f64,
    /// Texts with fewer letters than this are noise
    pub min_text_chars: usize,
    /// Assumed speaking rate for the alignment budget
    pub words_per_second: f64,
    /// Substituted when the word budget rounds to zero
    pub placeholder: String,
    /// Relative duration mismatch tolerated before time-stretching
    pub stretch_tolerance: f64,
    /// Smallest tempo factor a single stretch application may use
    pub min_stretch_factor: f64,
    /// Largest tempo factor a single stretch application may use
    pub max_stretch_factor: f64,
    pub voices: VoiceMap,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            min_transcribe_ms: 500,
            silence_threshold_db: -50.0,
            min_text_chars: 2,
            words_per_second: 3.0,
            placeholder: "...".to_string(),
            stretch_tolerance: 0.05,
            min_stretch_factor: 0.5,
            max_stretch_factor: 2.0,
            voices: VoiceMap::default(),
        }
    }
}

/// Bounded retry with exponential backoff for collaborator calls
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Deadline for a single attempt
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            call_timeout: Duration::from_secs(60),
        }
    }
}

/// Top-level configuration for a dubbing run
#[derive(Debug, Clone)]
pub struct DubConfig {
    /// Root for per-job artifact directories
    pub work_dir: PathBuf,
    /// Upper bound on chunk units running at once
    pub max_concurrent_chunks: usize,
    pub segment: SegmentConfig,
    pub consensus: ConsensusConfig,
    pub worker: WorkerConfig,
    pub retry: RetryPolicy,
}

impl Default for DubConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("work"),
            max_concurrent_chunks: 8,
            segment: SegmentConfig::default(),
            consensus: ConsensusConfig::default(),
            worker: WorkerConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl DubConfig {
    /// Defaults overlaid with `AUTODUB_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var("AUTODUB_WORK_DIR") {
            config.work_dir = PathBuf::from(dir);
        }
        if let Some(n) = env_parse::<usize>("AUTODUB_MAX_CONCURRENCY") {
            config.max_concurrent_chunks = n.max(1);
        }
        if let Some(ms) = env_parse::<u64>("AUTODUB_CHUNK_MS") {
            config.segment.chunk_ms = ms.max(1);
        }
        if let Some(attempts) = env_parse::<u32>("AUTODUB_RETRY_ATTEMPTS") {
            config.retry.max_attempts = attempts.max(1);
        }
        if let Some(secs) = env_parse::<u64>("AUTODUB_CALL_TIMEOUT_SECS") {
            config.retry.call_timeout = Duration::from_secs(secs.max(1));
        }
        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DubConfig::default();
        assert_eq!(config.segment.chunk_ms, 5_000);
        assert_eq!(config.segment.padding_ms, 100);
        assert_eq!(config.consensus.min_vote_ms, 2_500);
        assert_eq!(config.worker.words_per_second, 3.0);
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_voice_map_has_distinct_voices() {
        let voices = VoiceMap::default();
        assert_ne!(voices.voice_for(Gender::Female), voices.voice_for(Gender::Male));
        assert_eq!(voices.voice_for(Gender::Unknown), voices.voice_for(Gender::Male));
    }
}
