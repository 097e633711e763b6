//! Per-job artifact directory.
//!
//! Every artifact a job produces lives under `<work_dir>/<job_id>/`, so
//! concurrent jobs never share paths.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::JobId;

const SUBDIRS: [&str; 6] = ["audio", "separation", "segments", "chunks", "tts", "assembly"];

#[derive(Debug, Clone)]
pub struct JobWorkspace {
    root: PathBuf,
}

impl JobWorkspace {
    pub fn new(work_dir: &Path, job_id: &JobId) -> Self {
        Self {
            root: work_dir.join(job_id.to_string()),
        }
    }

    /// Create the directory tree
    pub async fn create(&self) -> Result<()> {
        for dir in SUBDIRS {
            tokio::fs::create_dir_all(self.root.join(dir)).await?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source_audio(&self) -> PathBuf {
        self.root.join("audio").join("source.wav")
    }

    pub fn separation_dir(&self) -> PathBuf {
        self.root.join("separation")
    }

    pub fn segment_audio(&self, segment_id: &str) -> PathBuf {
        self.root.join("segments").join(format!("{}.wav", segment_id))
    }

    pub fn chunk_audio(&self, chunk_id: &str) -> PathBuf {
        self.root.join("chunks").join(format!("{}.wav", chunk_id))
    }

    pub fn tts_audio(&self, chunk_id: &str) -> PathBuf {
        self.root.join("tts").join(format!("{}.wav", chunk_id))
    }

    pub fn stretched_audio(&self, chunk_id: &str) -> PathBuf {
        self.root.join("tts").join(format!("{}_synced.wav", chunk_id))
    }

    /// Chunk audio padded or trimmed to its span
    pub fn fitted_audio(&self, chunk_id: &str) -> PathBuf {
        self.root.join("assembly").join(format!("{}_fit.wav", chunk_id))
    }

    pub fn silence(&self, name: &str) -> PathBuf {
        self.root.join("assembly").join(format!("{}_silence.wav", name))
    }

    pub fn segment_track(&self, segment_id: &str) -> PathBuf {
        self.root.join("assembly").join(format!("{}_dub.wav", segment_id))
    }

    /// Segment track with its head removed for level-2 overlap resolution
    pub fn trimmed_track(&self, segment_id: &str) -> PathBuf {
        self.root.join("assembly").join(format!("{}_trim.wav", segment_id))
    }

    /// Leading part of a segment track hidden under an earlier segment
    pub fn overlay_head(&self, segment_id: &str) -> PathBuf {
        self.root.join("assembly").join(format!("{}_head.wav", segment_id))
    }

    /// Concatenated timeline before hidden overlap audio is mixed back in
    pub fn timeline_track(&self) -> PathBuf {
        self.root.join("assembly").join("timeline.wav")
    }

    pub fn dubbed_track(&self) -> PathBuf {
        self.root.join("dubbed_track.wav")
    }

    pub fn default_output(&self) -> PathBuf {
        self.root.join("dubbed.mp4")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_layout() {
        let dir = tempfile::tempdir().unwrap();
        let id = JobId::new();
        let workspace = JobWorkspace::new(dir.path(), &id);
        workspace.create().await.unwrap();

        assert!(workspace.root().ends_with(id.to_string()));
        for sub in SUBDIRS {
            assert!(workspace.root().join(sub).is_dir());
        }
        assert!(workspace.chunk_audio("seg_0001_c002").ends_with("chunks/seg_0001_c002.wav"));
    }

    #[test]
    fn test_jobs_do_not_share_paths() {
        let a = JobWorkspace::new(Path::new("work"), &JobId::new());
        let b = JobWorkspace::new(Path::new("work"), &JobId::new());
        assert_ne!(a.tts_audio("seg_0000_c000"), b.tts_audio("seg_0000_c000"));
    }
}
