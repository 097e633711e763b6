use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::Result;
use crate::services::Services;

/// Execute Stage 8: put the dubbed track under the original video stream.
///
/// The video stream is copied untouched and the output ends with the shorter
/// of the two streams.
pub async fn execute_mux(services: &Services, video: &Path, track: &Path, output: &Path) -> Result<PathBuf> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    info!("Stage 8: Muxing {} onto {}", track.display(), video.display());
    let muxed = services.mux(video, track, output).await?;
    info!("Stage 8: Wrote {}", muxed.display());
    Ok(muxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DubError;
    use crate::services::fake::FakeBackends;

    #[tokio::test]
    async fn test_mux_trims_to_shorter_stream() {
        let dir = tempfile::tempdir().unwrap();
        let fakes = FakeBackends::new(10_000, vec![]);
        let track = dir.path().join("dubbed_track.wav");
        fakes.media.register(&track, 12_000);
        let output = dir.path().join("out").join("dubbed.mp4");

        let muxed = execute_mux(&fakes.services(), Path::new("in.mp4"), &track, &output)
            .await
            .unwrap();

        assert_eq!(muxed, output);
        assert_eq!(fakes.media.duration_of(&output), Some(10_000));
        assert!(output.parent().unwrap().is_dir());
    }

    #[tokio::test]
    async fn test_mux_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let fakes = FakeBackends::new(10_000, vec![]);
        let track = dir.path().join("dubbed_track.wav");
        fakes.media.register(&track, 10_000);
        fakes.media.fail("mux", "");

        let err = execute_mux(&fakes.services(), Path::new("in.mp4"), &track, &dir.path().join("o.mp4"))
            .await
            .unwrap_err();

        assert!(matches!(err, DubError::MediaTool { operation: "mux", .. }));
    }
}
