pub mod config;
pub mod controller;
pub mod error;
pub mod io;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod stages;
pub mod worker;
pub mod workspace;

pub use config::{ConsensusConfig, DubConfig, RetryPolicy, SegmentConfig, VoiceMap, WorkerConfig};
pub use controller::JobRegistry;
pub use error::{DubError, Result};
pub use io::{JobReport, format_timestamp, load_turns_file};
pub use models::{
    Chunk, ChunkResult, Gender, Job, JobId, JobRequest, JobStatus, OverlapRegion, QualityReport,
    Segment, SpeakerProfile, SpeakerTurn, Stage,
};
pub use pipeline::{NoopObserver, Pipeline, PipelineOutcome, StageFailure, StageObserver};
pub use services::{
    Collaborators, FfmpegTool, ModelSidecar, SarvamClient, SarvamConfig, Services,
};
pub use stages::{analyze_turns, plan_segments};
pub use workspace::JobWorkspace;
