//! Timeline reassembly.
//!
//! Level 1 joins a segment's chunk results into one segment track. Level 2
//! places segment tracks on the absolute timeline, filling gaps with silence
//! and trimming overlapping heads; the trimmed or skipped audio is then
//! mixed back over the track at its original position. Both levels are
//! planned by pure functions and then executed against the media tool.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::error::{DubError, Result};
use crate::models::{ChunkResult, Segment};
use crate::services::{Layer, Services};
use crate::workspace::JobWorkspace;

/// One chunk span inside a segment track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanPiece {
    pub chunk_id: String,
    pub start_ms: u64,
    pub end_ms: u64,
    /// `None` renders as silence
    pub audio: Option<PathBuf>,
}

impl SpanPiece {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }
}

/// Order a segment's chunk results and check that they tile its span
pub fn plan_segment(segment: &Segment, results: &[&ChunkResult]) -> Result<Vec<SpanPiece>> {
    let mut ordered: Vec<&ChunkResult> = results.to_vec();
    ordered.sort_by(|a, b| (a.start_ms, &a.chunk_id).cmp(&(b.start_ms, &b.chunk_id)));

    let gap = |covered_ms| DubError::ReassemblyGap {
        segment_id: segment.segment_id.clone(),
        expected_ms: segment.end_ms,
        covered_ms,
    };

    let mut cursor = segment.start_ms;
    let mut pieces = Vec::with_capacity(ordered.len());
    for result in ordered {
        if result.start_ms != cursor || result.end_ms <= result.start_ms {
            return Err(gap(cursor));
        }
        pieces.push(SpanPiece {
            chunk_id: result.chunk_id.clone(),
            start_ms: result.start_ms,
            end_ms: result.end_ms,
            audio: result.audio_path.clone(),
        });
        cursor = result.end_ms;
    }
    if cursor != segment.end_ms {
        return Err(gap(cursor));
    }
    Ok(pieces)
}

/// Assembled audio for one segment, on the absolute time base
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentTrack {
    pub segment_id: String,
    pub start_ms: u64,
    pub end_ms: u64,
    pub audio_path: PathBuf,
}

/// One piece of the final track
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackPiece {
    Audio {
        segment_id: String,
        path: PathBuf,
        /// Leading audio to drop because an earlier segment already covers it
        trim_head_ms: u64,
        start_ms: u64,
        end_ms: u64,
    },
    Silence {
        start_ms: u64,
        end_ms: u64,
    },
}

impl TrackPiece {
    pub fn start_ms(&self) -> u64 {
        match self {
            TrackPiece::Audio { start_ms, .. } | TrackPiece::Silence { start_ms, .. } => *start_ms,
        }
    }

    pub fn end_ms(&self) -> u64 {
        match self {
            TrackPiece::Audio { end_ms, .. } | TrackPiece::Silence { end_ms, .. } => *end_ms,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms() - self.start_ms()
    }
}

/// Lay segment tracks out on the timeline.
///
/// Pieces are contiguous from 0. The track ends at the later of the last
/// segment end and `source_ms`.
pub fn plan_track(tracks: &[SegmentTrack], source_ms: u64) -> Vec<TrackPiece> {
    let mut ordered: Vec<&SegmentTrack> = tracks.iter().filter(|t| t.end_ms > t.start_ms).collect();
    ordered.sort_by(|a, b| (a.start_ms, &a.segment_id).cmp(&(b.start_ms, &b.segment_id)));

    let mut pieces = Vec::new();
    let mut cursor = 0;
    for track in ordered {
        if track.end_ms <= cursor {
            continue;
        }
        if track.start_ms > cursor {
            pieces.push(TrackPiece::Silence {
                start_ms: cursor,
                end_ms: track.start_ms,
            });
            cursor = track.start_ms;
        }
        pieces.push(TrackPiece::Audio {
            segment_id: track.segment_id.clone(),
            path: track.audio_path.clone(),
            trim_head_ms: cursor - track.start_ms,
            start_ms: cursor,
            end_ms: track.end_ms,
        });
        cursor = track.end_ms;
    }
    if source_ms > cursor {
        pieces.push(TrackPiece::Silence {
            start_ms: cursor,
            end_ms: source_ms,
        });
    }
    pieces
}

/// Segment audio that `plan_track` hides behind an earlier segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlay {
    pub segment_id: String,
    pub path: PathBuf,
    pub start_ms: u64,
    /// Length of the hidden head; equals the segment length when the whole
    /// segment is covered
    pub duration_ms: u64,
    pub covers_segment: bool,
}

/// Hidden segment heads, in the same walk order as [`plan_track`]
pub fn plan_overlays(tracks: &[SegmentTrack]) -> Vec<Overlay> {
    let mut ordered: Vec<&SegmentTrack> = tracks.iter().filter(|t| t.end_ms > t.start_ms).collect();
    ordered.sort_by(|a, b| (a.start_ms, &a.segment_id).cmp(&(b.start_ms, &b.segment_id)));

    let mut overlays = Vec::new();
    let mut cursor = 0;
    for track in ordered {
        if track.start_ms < cursor {
            let hidden_end = cursor.min(track.end_ms);
            overlays.push(Overlay {
                segment_id: track.segment_id.clone(),
                path: track.audio_path.clone(),
                start_ms: track.start_ms,
                duration_ms: hidden_end - track.start_ms,
                covers_segment: hidden_end == track.end_ms,
            });
        }
        cursor = cursor.max(track.end_ms);
    }
    overlays
}

/// Level-1 output
#[derive(Debug, Clone, Default)]
pub struct SegmentAssembly {
    pub tracks: Vec<SegmentTrack>,
    /// Segments left to the silence gap rule after a failure
    pub silenced: usize,
}

async fn render_segment(
    services: &Services,
    workspace: &JobWorkspace,
    segment: &Segment,
    pieces: &[SpanPiece],
) -> Result<PathBuf> {
    let mut parts = Vec::with_capacity(pieces.len());
    for piece in pieces {
        let duration = piece.duration_ms();
        let fitted = match &piece.audio {
            Some(audio) => services
                .fit(audio, duration, &workspace.fitted_audio(&piece.chunk_id))
                .await
                .map_err(|e| warn!("{}: could not fit audio, using silence: {}", piece.chunk_id, e))
                .ok(),
            None => None,
        };
        let part = match fitted {
            Some(path) => path,
            None => {
                services
                    .generate_silence(duration, &workspace.silence(&piece.chunk_id))
                    .await?
            }
        };
        parts.push(part);
    }
    services
        .concat(&parts, &workspace.segment_track(&segment.segment_id))
        .await
}

/// Execute Stage 7 level 1: build one track per segment.
///
/// A segment whose results do not tile its span, or whose concatenation
/// fails, is left out; level 2 renders its span as silence.
pub async fn execute_reassemble_segments(
    services: &Services,
    workspace: &JobWorkspace,
    segments: &[Segment],
    results: &[ChunkResult],
) -> SegmentAssembly {
    info!("Stage 7: Assembling {} segments", segments.len());

    let mut by_segment: HashMap<&str, Vec<&ChunkResult>> = HashMap::new();
    for result in results {
        by_segment.entry(result.segment_id.as_str()).or_default().push(result);
    }

    let mut assembly = SegmentAssembly::default();
    for segment in segments {
        let segment_results = by_segment
            .get(segment.segment_id.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let pieces = match plan_segment(segment, segment_results) {
            Ok(pieces) => pieces,
            Err(e) => {
                error!("{}", e);
                assembly.silenced += 1;
                continue;
            }
        };
        match render_segment(services, workspace, segment, &pieces).await {
            Ok(audio_path) => assembly.tracks.push(SegmentTrack {
                segment_id: segment.segment_id.clone(),
                start_ms: segment.start_ms,
                end_ms: segment.end_ms,
                audio_path,
            }),
            Err(e) => {
                warn!("Segment {} rendered as silence: {}", segment.segment_id, e);
                assembly.silenced += 1;
            }
        }
    }

    info!(
        "Stage 7: {} segment tracks ({} silenced)",
        assembly.tracks.len(),
        assembly.silenced
    );
    assembly
}

/// Level-2 output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackAssembly {
    pub path: PathBuf,
    /// Hidden segment heads mixed back in
    pub overlaid: usize,
    /// Hidden segment heads that could not be mixed in
    pub lost_overlaps: usize,
}

/// Mix hidden segment heads over the concatenated timeline.
///
/// A head that cannot be cut is lost on its own; a failed mix loses all of
/// them and keeps `timeline` as the track.
async fn mix_overlays(
    services: &Services,
    workspace: &JobWorkspace,
    timeline: PathBuf,
    overlays: &[Overlay],
) -> TrackAssembly {
    let mut layers = Vec::with_capacity(overlays.len());
    for overlay in overlays {
        let path = if overlay.covers_segment {
            Ok(overlay.path.clone())
        } else {
            services
                .cut(
                    &overlay.path,
                    0,
                    overlay.duration_ms,
                    &workspace.overlay_head(&overlay.segment_id),
                )
                .await
        };
        match path {
            Ok(path) => layers.push(Layer {
                path,
                offset_ms: overlay.start_ms,
            }),
            Err(e) => warn!("{}: hidden overlap audio lost: {}", overlay.segment_id, e),
        }
    }
    let cut_failures = overlays.len() - layers.len();
    if layers.is_empty() {
        return TrackAssembly {
            path: timeline,
            overlaid: 0,
            lost_overlaps: cut_failures,
        };
    }

    match services
        .overlay(&timeline, &layers, &workspace.dubbed_track())
        .await
    {
        Ok(path) => TrackAssembly {
            path,
            overlaid: layers.len(),
            lost_overlaps: cut_failures,
        },
        Err(e) => {
            warn!("Could not mix {} overlapping segments: {}", layers.len(), e);
            TrackAssembly {
                path: timeline,
                overlaid: 0,
                lost_overlaps: overlays.len(),
            }
        }
    }
}

/// Execute Stage 7 level 2: concatenate the full dubbed track and mix hidden
/// overlap audio back in
pub async fn execute_reassemble_track(
    services: &Services,
    workspace: &JobWorkspace,
    tracks: &[SegmentTrack],
    source_ms: u64,
) -> Result<TrackAssembly> {
    let pieces = plan_track(tracks, source_ms);
    if pieces.is_empty() {
        return Err(DubError::invalid("nothing to assemble: no segments and no source duration"));
    }

    let trimmed = pieces
        .iter()
        .filter(|p| matches!(p, TrackPiece::Audio { trim_head_ms, .. } if *trim_head_ms > 0))
        .count();
    info!(
        "Stage 7: Laying out {} pieces ({} trimmed) over {}ms",
        pieces.len(),
        trimmed,
        pieces.last().map(TrackPiece::end_ms).unwrap_or(0)
    );

    let mut parts = Vec::with_capacity(pieces.len());
    for (index, piece) in pieces.iter().enumerate() {
        let part = match piece {
            TrackPiece::Audio {
                path,
                trim_head_ms: 0,
                ..
            } => path.clone(),
            TrackPiece::Audio {
                segment_id,
                path,
                trim_head_ms,
                ..
            } => {
                services
                    .cut(
                        path,
                        *trim_head_ms,
                        trim_head_ms + piece.duration_ms(),
                        &workspace.trimmed_track(segment_id),
                    )
                    .await?
            }
            TrackPiece::Silence { .. } => {
                services
                    .generate_silence(
                        piece.duration_ms(),
                        &workspace.silence(&format!("gap_{:04}", index)),
                    )
                    .await?
            }
        };
        parts.push(part);
    }

    let overlays = plan_overlays(tracks);
    if overlays.is_empty() {
        let path = services.concat(&parts, &workspace.dubbed_track()).await?;
        return Ok(TrackAssembly {
            path,
            overlaid: 0,
            lost_overlaps: 0,
        });
    }

    let timeline = services.concat(&parts, &workspace.timeline_track()).await?;
    let assembly = mix_overlays(services, workspace, timeline, &overlays).await;
    info!(
        "Stage 7: {} overlapping segments mixed in, {} lost",
        assembly.overlaid, assembly.lost_overlaps
    );
    Ok(assembly)
}
