use std::path::Path;

use tracing::{debug, warn};

use crate::config::WorkerConfig;
use crate::models::Chunk;
use crate::services::{Services, Transcription};

/// Why a chunk produced no transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    TooShort,
    Silent,
    Failed,
}

/// Transcribe a chunk unless it is too short or silent.
///
/// Never fails: skips and errors yield an empty transcription together with
/// the reason.
pub async fn transcribe_chunk(
    services: &Services,
    config: &WorkerConfig,
    chunk: &Chunk,
    audio: &Path,
    language_hint: Option<&str>,
) -> (Transcription, Option<SkipReason>) {
    if chunk.duration_ms() < config.min_transcribe_ms {
        debug!("{}: {}ms too short to transcribe", chunk.chunk_id, chunk.duration_ms());
        return (Transcription::default(), Some(SkipReason::TooShort));
    }

    match services.mean_volume(audio).await {
        Ok(db) if db < config.silence_threshold_db => {
            debug!("{}: silent ({:.1} dB)", chunk.chunk_id, db);
            return (Transcription::default(), Some(SkipReason::Silent));
        }
        Ok(_) => {}
        Err(e) => debug!("{}: volume check failed, transcribing anyway: {}", chunk.chunk_id, e),
    }

    match services.transcribe(audio, language_hint).await {
        Ok(transcription) => (transcription, None),
        Err(e) => {
            warn!("{}: transcription failed: {}", chunk.chunk_id, e);
            (Transcription::default(), Some(SkipReason::Failed))
        }
    }
}
