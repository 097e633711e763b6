use tracing::{debug, warn};

use crate::models::{Chunk, Gender, GenderSource, SpeakerProfile};
use crate::services::Services;

/// Voice gender for a chunk.
///
/// The speaker profile wins whenever it has an entry. Otherwise the chunk
/// audio is classified, and an undecided or failed classification falls back
/// to `fallback`.
pub async fn resolve_gender(
    services: &Services,
    profile: &SpeakerProfile,
    chunk: &Chunk,
    fallback: Gender,
) -> (Gender, GenderSource) {
    if let Some(gender) = profile.canonical_gender(&chunk.speaker) {
        return (gender, GenderSource::Profile);
    }

    let Some(audio) = &chunk.audio_path else {
        return (fallback, GenderSource::Fallback);
    };
    match services.classify(audio).await {
        Ok(estimate) if estimate.gender.is_known() => {
            debug!(
                "{}: classified {} ({:.2})",
                chunk.chunk_id, estimate.gender, estimate.confidence
            );
            (estimate.gender, GenderSource::Classified)
        }
        Ok(_) => (fallback, GenderSource::Fallback),
        Err(e) => {
            warn!("{}: gender classification failed: {}", chunk.chunk_id, e);
            (fallback, GenderSource::Fallback)
        }
    }
}
