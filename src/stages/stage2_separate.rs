use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::DiarizeOutput;
use crate::services::Services;
use crate::workspace::JobWorkspace;

/// Separated stems, if separation ran
#[derive(Debug, Clone, Default)]
pub struct SeparationOutput {
    /// Whether the separator was invoked and succeeded
    pub ran: bool,
    pub stems: Vec<PathBuf>,
    /// Stem per speaker label; empty when stems could not be attributed
    pub by_speaker: BTreeMap<String, PathBuf>,
}

impl SeparationOutput {
    pub fn passthrough() -> Self {
        Self::default()
    }

    /// Audio to cut a turn's segment from
    pub fn source_for<'a>(&'a self, speaker: &str, overlap: bool, original: &'a Path) -> &'a Path {
        if overlap {
            if let Some(stem) = self.by_speaker.get(speaker) {
                return stem;
            }
        }
        original
    }
}

/// Pair stems with sorted speaker labels; only when the counts agree
pub fn assign_stems(stems: &[PathBuf], speakers: &[String]) -> BTreeMap<String, PathBuf> {
    if stems.is_empty() || stems.len() != speakers.len() {
        return BTreeMap::new();
    }
    let mut labels = speakers.to_vec();
    labels.sort();
    labels.into_iter().zip(stems.iter().cloned()).collect()
}

/// Execute Stage 2: separate overlapping speech when diarization found any.
///
/// Never fails. Without overlap, or when the separator errors, the original
/// audio is used for every segment.
pub async fn execute_separate(
    services: &Services,
    workspace: &JobWorkspace,
    diarized: &DiarizeOutput,
    audio: &Path,
) -> SeparationOutput {
    if !diarized.overlap {
        info!("Stage 2: No overlap, skipping separation");
        return SeparationOutput::passthrough();
    }

    info!(
        "Stage 2: Separating {} overlap regions",
        diarized.overlap_regions.len()
    );
    let stems = match services.separate(audio, &workspace.separation_dir()).await {
        Ok(stems) => stems,
        Err(e) => {
            warn!("Stage 2: Separation failed, using original audio: {}", e);
            return SeparationOutput::passthrough();
        }
    };

    let by_speaker = assign_stems(&stems, &diarized.speakers);
    if by_speaker.is_empty() {
        warn!(
            "Stage 2: {} stems for {} speakers, using original audio",
            stems.len(),
            diarized.speakers.len()
        );
    } else {
        info!("Stage 2: {} stems assigned", by_speaker.len());
    }

    SeparationOutput {
        ran: true,
        stems,
        by_speaker,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobId, SpeakerTurn};
    use crate::services::fake::FakeBackends;
    use crate::stages::analyze_turns;
    use std::sync::atomic::Ordering;

    fn overlapping() -> DiarizeOutput {
        analyze_turns(vec![
            SpeakerTurn::new(0, 5_000, "SPEAKER_00").unwrap(),
            SpeakerTurn::new(4_000, 8_000, "SPEAKER_01").unwrap(),
        ])
    }

    #[test]
    fn test_assign_requires_matching_counts() {
        let stems = vec![PathBuf::from("s0.wav"), PathBuf::from("s1.wav")];
        let speakers = vec!["B".to_string(), "A".to_string()];

        let assigned = assign_stems(&stems, &speakers);
        assert_eq!(assigned["A"], PathBuf::from("s0.wav"));
        assert_eq!(assigned["B"], PathBuf::from("s1.wav"));

        assert!(assign_stems(&stems[..1], &speakers).is_empty());
    }

    #[test]
    fn test_source_for_uses_stem_only_for_overlap_turns() {
        let mut output = SeparationOutput::passthrough();
        output.by_speaker.insert("A".to_string(), PathBuf::from("stem_a.wav"));
        let original = Path::new("source.wav");

        assert_eq!(output.source_for("A", true, original), Path::new("stem_a.wav"));
        assert_eq!(output.source_for("A", false, original), original);
        assert_eq!(output.source_for("B", true, original), original);
    }

    #[tokio::test]
    async fn test_skipped_without_overlap() {
        let fakes = FakeBackends::new(10_000, vec![]);
        let workspace = JobWorkspace::new(Path::new("work"), &JobId::new());
        let diarized = analyze_turns(vec![SpeakerTurn::new(0, 5_000, "A").unwrap()]);

        let output = execute_separate(&fakes.services(), &workspace, &diarized, Path::new("a.wav")).await;

        assert!(!output.ran);
        assert_eq!(fakes.separator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_runs_and_assigns_with_overlap() {
        let fakes = FakeBackends::new(10_000, vec![]);
        let audio = PathBuf::from("/virtual/source.wav");
        fakes.media.register(&audio, 10_000);
        let workspace = JobWorkspace::new(Path::new("work"), &JobId::new());

        let output = execute_separate(&fakes.services(), &workspace, &overlapping(), &audio).await;

        assert!(output.ran);
        assert_eq!(output.by_speaker.len(), 2);
        assert!(output.by_speaker.contains_key("SPEAKER_01"));
    }

    #[tokio::test]
    async fn test_failure_degrades_to_passthrough() {
        let fakes = FakeBackends::new(10_000, vec![]);
        fakes.separator.fail.store(true, Ordering::SeqCst);
        let workspace = JobWorkspace::new(Path::new("work"), &JobId::new());

        let output =
            execute_separate(&fakes.services(), &workspace, &overlapping(), Path::new("a.wav")).await;

        assert!(!output.ran);
        assert!(output.by_speaker.is_empty());
    }
}
