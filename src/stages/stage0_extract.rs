use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{DubError, Result};
use crate::services::Services;
use crate::workspace::JobWorkspace;

/// Result of audio extraction
#[derive(Debug, Clone)]
pub struct ExtractOutput {
    /// Mono PCM rendition of the source audio track
    pub audio_path: PathBuf,
    /// Source duration; the dubbed track is padded to this length
    pub source_ms: u64,
}

/// Execute Stage 0: pull the audio track out of the source video
pub async fn execute_extract(
    services: &Services,
    workspace: &JobWorkspace,
    source: &Path,
) -> Result<ExtractOutput> {
    if !source.is_file() {
        return Err(DubError::invalid(format!(
            "source video not found: {}",
            source.display()
        )));
    }

    info!("Stage 0: Extracting audio from {}", source.display());
    let audio_path = services
        .extract_audio(source, &workspace.source_audio())
        .await?;
    let source_ms = services.probe_duration(&audio_path).await?;
    if source_ms == 0 {
        return Err(DubError::invalid("source has no audio"));
    }

    info!("Stage 0: {}ms of audio", source_ms);
    Ok(ExtractOutput {
        audio_path,
        source_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobId;
    use crate::services::fake::FakeBackends;

    #[tokio::test]
    async fn test_extract_reports_duration() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.mp4");
        std::fs::write(&source, b"video").unwrap();
        let workspace = JobWorkspace::new(dir.path(), &JobId::new());
        let fakes = FakeBackends::new(42_000, vec![]);

        let out = execute_extract(&fakes.services(), &workspace, &source).await.unwrap();

        assert_eq!(out.source_ms, 42_000);
        assert_eq!(out.audio_path, workspace.source_audio());
    }

    #[tokio::test]
    async fn test_missing_source_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = JobWorkspace::new(dir.path(), &JobId::new());
        let fakes = FakeBackends::new(42_000, vec![]);

        let err = execute_extract(&fakes.services(), &workspace, &dir.path().join("missing.mp4"))
            .await
            .unwrap_err();

        assert!(matches!(err, DubError::InputValidation(_)));
        assert_eq!(fakes.media.calls("extract_audio"), 0);
    }
}
