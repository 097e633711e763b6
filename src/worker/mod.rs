//! Per-chunk pipeline: gender → transcribe → translate → align → synthesize.
//!
//! A chunk unit never fails. Every step degrades to a well-defined value and
//! the unit always yields a [`ChunkResult`].

pub mod align;
pub mod gender;
pub mod language;
pub mod synthesize;
pub mod transcribe;
pub mod translate;

use std::sync::Arc;

use tracing::{Instrument, debug, info_span, warn};

use crate::config::WorkerConfig;
use crate::models::{Chunk, ChunkResult, Gender, JobId, SpeakerProfile, TranslationDecision};
use crate::services::Services;
use crate::workspace::JobWorkspace;

pub use align::{Alignment, align_text, word_budget};
pub use gender::resolve_gender;
pub use language::{LanguageId, Script, guess_script, identify};
pub use synthesize::{needs_stretch, speakable, synthesize_chunk, tempo_chain};
pub use transcribe::{SkipReason, transcribe_chunk};
pub use translate::{attach_tag, decide, is_noise, same_language, split_tag, structural_tag};

/// Read-only state shared by every chunk unit of one job
#[derive(Clone)]
pub struct WorkerContext {
    pub job_id: JobId,
    pub services: Arc<Services>,
    pub workspace: Arc<JobWorkspace>,
    pub config: Arc<WorkerConfig>,
    pub profile: Arc<SpeakerProfile>,
    /// Used when neither the profile nor the classifier decides
    pub fallback_gender: Gender,
    pub source_language: Option<String>,
    pub target_language: String,
}

/// Run the full worker pipeline for one chunk inside its own tracing span
pub async fn process_chunk(ctx: &WorkerContext, chunk: &Chunk) -> ChunkResult {
    let span = info_span!(
        "chunk",
        job = %ctx.job_id,
        chunk = %chunk.chunk_id,
        speaker = %chunk.speaker
    );
    run_chunk(ctx, chunk).instrument(span).await
}

async fn run_chunk(ctx: &WorkerContext, chunk: &Chunk) -> ChunkResult {
    let services = ctx.services.as_ref();
    let config = ctx.config.as_ref();

    let (gender, gender_source) =
        resolve_gender(services, &ctx.profile, chunk, ctx.fallback_gender).await;

    let Some(audio) = chunk.audio_path.as_deref() else {
        warn!("No audio for chunk, rendering silence");
        return ChunkResult::silent(chunk, gender, gender_source);
    };

    let (transcription, skipped) = transcribe_chunk(
        services,
        config,
        chunk,
        audio,
        ctx.source_language.as_deref(),
    )
    .await;
    let body = transcription.text.trim();
    let tag = structural_tag(&chunk.speaker, gender);
    let tagged = attach_tag(Some(&tag), body);

    let language = identify(
        body,
        transcription.language.as_deref(),
        transcription.confidence,
    );
    let decision = decide(
        body,
        language.language.as_deref(),
        &ctx.target_language,
        config.min_text_chars,
    );
    let mut kept_original = false;
    let text = match decision {
        TranslationDecision::Keep => tagged,
        TranslationDecision::Translate => {
            let source = language
                .language
                .as_deref()
                .or(ctx.source_language.as_deref());
            match translate::translate_tagged(services, &tagged, source, &ctx.target_language).await
            {
                Ok(translated) => translated,
                Err(e) => {
                    warn!("Translation failed, keeping original text: {}", e);
                    kept_original = true;
                    tagged
                }
            }
        }
    };

    let (tag, body) = split_tag(&text);
    let alignment = align_text(
        body,
        chunk.duration_ms(),
        config.words_per_second,
        &config.placeholder,
    );
    let aligned_text = attach_tag(tag, &alignment.text);

    let audio_path = synthesize_chunk(
        services,
        &ctx.workspace,
        config,
        chunk,
        &alignment.text,
        gender,
        &ctx.target_language,
    )
    .await;

    let nothing_to_say = match skipped {
        Some(SkipReason::TooShort | SkipReason::Silent) => true,
        Some(SkipReason::Failed) => false,
        None => is_noise(body, config.min_text_chars),
    };

    debug!(
        "language={:?} ({:?}) decision={:?} skipped={:?} words={}/{} audio={}",
        language.language,
        language.source,
        decision,
        skipped,
        alignment.text.split_whitespace().count(),
        alignment.budget,
        audio_path.is_some()
    );

    ChunkResult {
        chunk_id: chunk.chunk_id.clone(),
        segment_id: chunk.segment_id.clone(),
        speaker: chunk.speaker.clone(),
        start_ms: chunk.start_ms,
        end_ms: chunk.end_ms,
        overlap: chunk.overlap,
        gender,
        gender_source,
        transcribed_text: transcription.text,
        detected_language: language.language,
        language_source: language.source,
        decision,
        aligned_text,
        intentional_silence: audio_path.is_none() && nothing_to_say,
        audio_path,
        kept_original,
        truncated: alignment.truncated,
    }
}
