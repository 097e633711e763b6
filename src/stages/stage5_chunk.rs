use tracing::{info, warn};

use crate::models::{Chunk, Segment, chunk_spans};
use crate::services::Services;
use crate::workspace::JobWorkspace;

/// Tile a segment into chunks of `chunk_ms`, without audio yet
pub fn plan_chunks(segment: &Segment, chunk_ms: u64) -> Vec<Chunk> {
    chunk_spans(segment.start_ms, segment.end_ms, chunk_ms)
        .into_iter()
        .enumerate()
        .map(|(index, (start_ms, end_ms))| Chunk {
            chunk_id: format!("{}_c{:03}", segment.segment_id, index),
            segment_id: segment.segment_id.clone(),
            index,
            start_ms,
            end_ms,
            speaker: segment.speaker.clone(),
            overlap: segment.overlap,
            audio_path: None,
        })
        .collect()
}

/// Execute Stage 5: split segments into fixed-length chunks.
///
/// A chunk whose cut fails keeps `audio_path: None` and is later rendered
/// as silence.
pub async fn execute_chunk(
    services: &Services,
    workspace: &JobWorkspace,
    segments: &[Segment],
    chunk_ms: u64,
) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut failed = 0;

    for segment in segments {
        for mut chunk in plan_chunks(segment, chunk_ms) {
            let offset_start = chunk.start_ms - segment.start_ms;
            let offset_end = chunk.end_ms - segment.start_ms;
            match services
                .cut(
                    &segment.audio_path,
                    offset_start,
                    offset_end,
                    &workspace.chunk_audio(&chunk.chunk_id),
                )
                .await
            {
                Ok(path) => chunk.audio_path = Some(path),
                Err(e) => {
                    warn!("Chunk {} has no audio: {}", chunk.chunk_id, e);
                    failed += 1;
                }
            }
            chunks.push(chunk);
        }
    }

    info!(
        "Stage 5: {} chunks from {} segments ({} without audio)",
        chunks.len(),
        segments.len(),
        failed
    );
    chunks
}
