use std::collections::BTreeSet;
use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::models::{OverlapRegion, SpeakerTurn, find_overlap_regions, mark_overlaps};
use crate::services::Services;

/// Speaker turns with overlap analysis
#[derive(Debug, Clone, Default)]
pub struct DiarizeOutput {
    /// Turns sorted by start, each flagged if it touches an overlap region
    pub turns: Vec<SpeakerTurn>,
    pub overlap_regions: Vec<OverlapRegion>,
    /// At least one overlap region exists
    pub overlap: bool,
    /// Distinct speaker labels, sorted
    pub speakers: Vec<String>,
}

impl DiarizeOutput {
    pub fn overlap_ms(&self) -> u64 {
        self.overlap_regions.iter().map(OverlapRegion::duration_ms).sum()
    }
}

/// Sort turns, find overlap regions and flag overlapping turns
pub fn analyze_turns(mut turns: Vec<SpeakerTurn>) -> DiarizeOutput {
    turns.sort_by(|a, b| {
        (a.start_ms, a.end_ms, &a.speaker).cmp(&(b.start_ms, b.end_ms, &b.speaker))
    });
    let overlap_regions = find_overlap_regions(&turns);
    let turns = mark_overlaps(&turns, &overlap_regions);
    let speakers: BTreeSet<String> = turns.iter().map(|t| t.speaker.clone()).collect();

    DiarizeOutput {
        overlap: !overlap_regions.is_empty(),
        overlap_regions,
        turns,
        speakers: speakers.into_iter().collect(),
    }
}

/// Execute Stage 1: who speaks when
pub async fn execute_diarize(services: &Services, audio: &Path) -> Result<DiarizeOutput> {
    info!("Stage 1: Diarizing");
    let turns = services.diarize(audio).await?;
    let output = analyze_turns(turns);

    info!(
        "Stage 1: {} turns, {} speakers, {} overlap regions ({}ms)",
        output.turns.len(),
        output.speakers.len(),
        output.overlap_regions.len(),
        output.overlap_ms()
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fake::FakeBackends;
    use std::sync::atomic::Ordering;

    fn turn(start: u64, end: u64, speaker: &str) -> SpeakerTurn {
        SpeakerTurn::new(start, end, speaker).unwrap()
    }

    #[test]
    fn test_analyze_sorts_and_flags() {
        let output = analyze_turns(vec![
            turn(10_000, 15_000, "SPEAKER_00"),
            turn(0, 5_000, "SPEAKER_00"),
            turn(4_000, 8_000, "SPEAKER_01"),
        ]);

        assert_eq!(output.turns[0].start_ms, 0);
        assert!(output.overlap);
        assert_eq!(output.overlap_regions, vec![OverlapRegion { start_ms: 4_000, end_ms: 5_000 }]);
        assert_eq!(output.overlap_ms(), 1_000);
        assert!(output.turns[0].overlap);
        assert!(output.turns[1].overlap);
        assert!(!output.turns[2].overlap);
        assert_eq!(output.speakers, vec!["SPEAKER_00", "SPEAKER_01"]);
    }

    #[test]
    fn test_no_overlap() {
        let output = analyze_turns(vec![turn(0, 5_000, "A"), turn(5_000, 9_000, "B")]);
        assert!(!output.overlap);
        assert!(output.turns.iter().all(|t| !t.overlap));
    }

    #[test]
    fn test_empty_diarization() {
        let output = analyze_turns(vec![]);
        assert!(output.turns.is_empty());
        assert!(output.speakers.is_empty());
        assert!(!output.overlap);
    }

    #[tokio::test]
    async fn test_diarizer_failure_propagates() {
        let fakes = FakeBackends::new(10_000, vec![]);
        fakes.diarizer.fail.store(true, Ordering::SeqCst);
        assert!(execute_diarize(&fakes.services(), Path::new("a.wav")).await.is_err());
    }
}
