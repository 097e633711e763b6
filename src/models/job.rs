use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Gender, QualityReport};

/// Unique job identifier (UUID v4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the caller asks for when submitting a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    /// Source video
    pub source: PathBuf,
    /// Target language code, e.g. "hi-IN"
    pub target_language: String,
    /// Optional source language hint for transcription
    pub source_language: Option<String>,
    /// Voice used for speakers the classifier could not decide on
    pub gender_hint: Option<Gender>,
    /// Where to write the dubbed video; defaults inside the job work dir
    pub output: Option<PathBuf>,
}

impl JobRequest {
    pub fn new(source: impl Into<PathBuf>, target_language: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target_language: target_language.into(),
            source_language: None,
            gender_hint: None,
            output: None,
        }
    }
}

/// Orchestrator stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ExtractAudio,
    Diarize,
    SeparateOverlap,
    Segment,
    AggregateSpeakers,
    SplitChunks,
    DubChunks,
    ReassembleSegments,
    ReassembleTrack,
    Mux,
}

impl Stage {
    pub const ALL: [Stage; 10] = [
        Stage::ExtractAudio,
        Stage::Diarize,
        Stage::SeparateOverlap,
        Stage::Segment,
        Stage::AggregateSpeakers,
        Stage::SplitChunks,
        Stage::DubChunks,
        Stage::ReassembleSegments,
        Stage::ReassembleTrack,
        Stage::Mux,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::ExtractAudio => "extract-audio",
            Stage::Diarize => "diarize",
            Stage::SeparateOverlap => "overlap-separate",
            Stage::Segment => "segment",
            Stage::AggregateSpeakers => "aggregate-speaker-gender",
            Stage::SplitChunks => "split-chunks",
            Stage::DubChunks => "dub-chunks",
            Stage::ReassembleSegments => "reassemble-segments",
            Stage::ReassembleTrack => "reassemble-track",
            Stage::Mux => "mux-with-video",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Externally visible job state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running { stage: Stage },
    Complete { output: PathBuf, quality: QualityReport },
    Failed { stage: Stage, cause: String },
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Complete { .. } | JobStatus::Failed { .. } | JobStatus::Cancelled
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::Running { .. } => "RUNNING",
            JobStatus::Complete { .. } => "COMPLETE",
            JobStatus::Failed { .. } => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }
}

/// A dubbing job as tracked by the controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub request: JobRequest,
    pub status: JobStatus,
    /// Stages that have finished, in order
    pub completed_stages: Vec<Stage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(request: JobRequest) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            request,
            status: JobStatus::Queued,
            completed_stages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn source_language(&self) -> Option<&str> {
        self.request.source_language.as_deref()
    }

    pub fn target_language(&self) -> &str {
        &self.request.target_language
    }
}
