use std::path::Path;

use tracing::{debug, info, warn};

use super::SeparationOutput;
use crate::config::SegmentConfig;
use crate::models::{Segment, SpeakerTurn};
use crate::services::Services;
use crate::workspace::JobWorkspace;

/// A segment before its audio is cut
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSegment {
    pub segment_id: String,
    pub start_ms: u64,
    pub end_ms: u64,
    pub speaker: String,
    pub overlap: bool,
}

/// Segments with their cut audio
#[derive(Debug, Clone, Default)]
pub struct SegmentOutput {
    pub segments: Vec<Segment>,
    /// Planned segments whose cut failed
    pub dropped: usize,
}

/// Pad every turn, clamp to the source and drop regions that are too short.
///
/// Segment ids follow the turn index, so they are stable for a given
/// diarization.
pub fn plan_segments(turns: &[SpeakerTurn], source_ms: u64, config: &SegmentConfig) -> Vec<PlannedSegment> {
    turns
        .iter()
        .enumerate()
        .filter_map(|(index, turn)| {
            let start_ms = turn.start_ms.saturating_sub(config.padding_ms);
            let mut end_ms = turn.end_ms.saturating_add(config.padding_ms);
            if source_ms > 0 {
                end_ms = end_ms.min(source_ms);
            }
            if end_ms <= start_ms || end_ms - start_ms < config.min_segment_ms {
                debug!(
                    "Skipping turn {} ({}ms - {}ms): below {}ms",
                    index, start_ms, end_ms, config.min_segment_ms
                );
                return None;
            }
            Some(PlannedSegment {
                segment_id: format!("seg_{:04}", index),
                start_ms,
                end_ms,
                speaker: turn.speaker.clone(),
                overlap: turn.overlap,
            })
        })
        .collect()
}

/// Execute Stage 3: cut one audio segment per speaker turn
pub async fn execute_segment(
    services: &Services,
    workspace: &JobWorkspace,
    turns: &[SpeakerTurn],
    separation: &SeparationOutput,
    audio: &Path,
    source_ms: u64,
    config: &SegmentConfig,
) -> SegmentOutput {
    let planned = plan_segments(turns, source_ms, config);
    info!("Stage 3: Cutting {} segments from {} turns", planned.len(), turns.len());

    let mut output = SegmentOutput::default();
    for plan in planned {
        let source = separation.source_for(&plan.speaker, plan.overlap, audio);
        let target = workspace.segment_audio(&plan.segment_id);
        match services
            .cut(source, plan.start_ms, plan.end_ms, &target)
            .await
        {
            Ok(audio_path) => output.segments.push(Segment {
                segment_id: plan.segment_id,
                audio_path,
                start_ms: plan.start_ms,
                end_ms: plan.end_ms,
                speaker: plan.speaker,
                overlap: plan.overlap,
            }),
            Err(e) => {
                warn!("Dropping segment {}: {}", plan.segment_id, e);
                output.dropped += 1;
            }
        }
    }

    info!(
        "Stage 3: {} segments ({} dropped)",
        output.segments.len(),
        output.dropped
    );
    output
}
