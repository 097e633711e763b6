//! External collaborators.
//!
//! Each collaborator is a narrow async trait with one implementation per
//! backend. Pipeline code never calls a backend directly: it goes through
//! [`Services`], which applies the shared [`RetryPolicy`] to every call.

pub mod ffmpeg;
pub mod retry;
pub mod sarvam;
pub mod sidecar;

#[cfg(test)]
pub mod fake;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::RetryPolicy;
use crate::error::Result;
use crate::models::{Gender, SpeakerTurn};

pub use ffmpeg::FfmpegTool;
pub use sarvam::{SarvamClient, SarvamConfig};
pub use sidecar::ModelSidecar;

/// Transcoder primitives. Every operation writes to the given output path.
#[async_trait]
pub trait MediaTool: Send + Sync {
    async fn extract_audio(&self, video: &Path, out: &Path) -> Result<PathBuf>;
    /// Cut `[start_ms, end_ms)` relative to the start of `audio`
    async fn cut(&self, audio: &Path, start_ms: u64, end_ms: u64, out: &Path) -> Result<PathBuf>;
    async fn concat(&self, parts: &[PathBuf], out: &Path) -> Result<PathBuf>;
    async fn generate_silence(&self, duration_ms: u64, out: &Path) -> Result<PathBuf>;
    /// Copy the video stream, replace the audio, stop at the shorter stream
    async fn mux(&self, video: &Path, audio: &Path, out: &Path) -> Result<PathBuf>;
    async fn probe_duration(&self, media: &Path) -> Result<u64>;
    /// Mean volume in dBFS
    async fn mean_volume(&self, audio: &Path) -> Result<f64>;
    /// Pitch-preserving tempo change, one application per factor
    async fn time_stretch(&self, audio: &Path, factors: &[f64], out: &Path) -> Result<PathBuf>;
    /// Pad with silence or trim so the artifact lasts exactly `duration_ms`
    async fn fit(&self, audio: &Path, duration_ms: u64, out: &Path) -> Result<PathBuf>;
    /// Mix `layers` over `base`, each delayed by its offset; the output keeps
    /// the duration of `base`
    async fn overlay(&self, base: &Path, layers: &[Layer], out: &Path) -> Result<PathBuf>;
}

/// Audio placed at an offset on top of a base track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    pub path: PathBuf,
    pub offset_ms: u64,
}

#[async_trait]
pub trait Diarizer: Send + Sync {
    async fn diarize(&self, audio: &Path) -> Result<Vec<SpeakerTurn>>;
}

#[async_trait]
pub trait OverlapSeparator: Send + Sync {
    /// Split mixed speech into one stem per voice, written under `out_dir`
    async fn separate(&self, audio: &Path, out_dir: &Path) -> Result<Vec<PathBuf>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenderEstimate {
    pub gender: Gender,
    pub confidence: f64,
}

#[async_trait]
pub trait GenderClassifier: Send + Sync {
    async fn classify(&self, audio: &Path) -> Result<GenderEstimate>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    pub text: String,
    /// Detected language code, if the engine reported one
    pub language: Option<String>,
    pub confidence: f64,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &Path, language_hint: Option<&str>) -> Result<Transcription>;
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, source: Option<&str>, target: &str) -> Result<String>;
}

/// Voice selection passed to synthesis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub name: String,
    pub language: String,
}

#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &Voice, out: &Path) -> Result<PathBuf>;
}

/// One implementation per collaborator
#[derive(Clone)]
pub struct Collaborators {
    pub media: Arc<dyn MediaTool>,
    pub diarizer: Arc<dyn Diarizer>,
    pub separator: Arc<dyn OverlapSeparator>,
    pub classifier: Arc<dyn GenderClassifier>,
    pub transcriber: Arc<dyn Transcriber>,
    pub translator: Arc<dyn Translator>,
    pub synthesizer: Arc<dyn Synthesizer>,
}

/// Collaborators behind the shared retry policy
#[derive(Clone)]
pub struct Services {
    collaborators: Collaborators,
    retry: RetryPolicy,
}

impl Services {
    pub fn new(collaborators: Collaborators, retry: RetryPolicy) -> Self {
        Self {
            collaborators,
            retry,
        }
    }

    pub async fn extract_audio(&self, video: &Path, out: &Path) -> Result<PathBuf> {
        let media = &self.collaborators.media;
        self.retry
            .run("media.extract_audio", || media.extract_audio(video, out))
            .await
    }

    pub async fn cut(&self, audio: &Path, start_ms: u64, end_ms: u64, out: &Path) -> Result<PathBuf> {
        let media = &self.collaborators.media;
        self.retry
            .run("media.cut", || media.cut(audio, start_ms, end_ms, out))
            .await
    }

    pub async fn concat(&self, parts: &[PathBuf], out: &Path) -> Result<PathBuf> {
        let media = &self.collaborators.media;
        self.retry.run("media.concat", || media.concat(parts, out)).await
    }

    pub async fn generate_silence(&self, duration_ms: u64, out: &Path) -> Result<PathBuf> {
        let media = &self.collaborators.media;
        self.retry
            .run("media.generate_silence", || media.generate_silence(duration_ms, out))
            .await
    }

    pub async fn mux(&self, video: &Path, audio: &Path, out: &Path) -> Result<PathBuf> {
        let media = &self.collaborators.media;
        self.retry.run("media.mux", || media.mux(video, audio, out)).await
    }

    pub async fn probe_duration(&self, media_path: &Path) -> Result<u64> {
        let media = &self.collaborators.media;
        self.retry
            .run("media.probe_duration", || media.probe_duration(media_path))
            .await
    }

    pub async fn mean_volume(&self, audio: &Path) -> Result<f64> {
        let media = &self.collaborators.media;
        self.retry
            .run("media.mean_volume", || media.mean_volume(audio))
            .await
    }

    pub async fn time_stretch(&self, audio: &Path, factors: &[f64], out: &Path) -> Result<PathBuf> {
        let media = &self.collaborators.media;
        self.retry
            .run("media.time_stretch", || media.time_stretch(audio, factors, out))
            .await
    }

    pub async fn fit(&self, audio: &Path, duration_ms: u64, out: &Path) -> Result<PathBuf> {
        let media = &self.collaborators.media;
        self.retry
            .run("media.fit", || media.fit(audio, duration_ms, out))
            .await
    }

    pub async fn overlay(&self, base: &Path, layers: &[Layer], out: &Path) -> Result<PathBuf> {
        let media = &self.collaborators.media;
        self.retry
            .run("media.overlay", || media.overlay(base, layers, out))
            .await
    }

    pub async fn diarize(&self, audio: &Path) -> Result<Vec<SpeakerTurn>> {
        let diarizer = &self.collaborators.diarizer;
        self.retry.run("diarizer", || diarizer.diarize(audio)).await
    }

    pub async fn separate(&self, audio: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let separator = &self.collaborators.separator;
        self.retry
            .run("separator", || separator.separate(audio, out_dir))
            .await
    }

    pub async fn classify(&self, audio: &Path) -> Result<GenderEstimate> {
        let classifier = &self.collaborators.classifier;
        self.retry.run("classifier", || classifier.classify(audio)).await
    }

    pub async fn transcribe(&self, audio: &Path, language_hint: Option<&str>) -> Result<Transcription> {
        let transcriber = &self.collaborators.transcriber;
        self.retry
            .run("transcriber", || transcriber.transcribe(audio, language_hint))
            .await
    }

    pub async fn translate(&self, text: &str, source: Option<&str>, target: &str) -> Result<String> {
        let translator = &self.collaborators.translator;
        self.retry
            .run("translator", || translator.translate(text, source, target))
            .await
    }

    pub async fn synthesize(&self, text: &str, voice: &Voice, out: &Path) -> Result<PathBuf> {
        let synthesizer = &self.collaborators.synthesizer;
        self.retry
            .run("synthesizer", || synthesizer.synthesize(text, voice, out))
            .await
    }
}
