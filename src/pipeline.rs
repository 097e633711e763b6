//! Stage orchestrator.
//!
//! Drives one job through the stage graph:
//! extract → diarize → [separate] → segment → aggregate → chunk →
//! dub (fan-out/fan-in) → reassemble segments → reassemble track → mux.
//!
//! Each stage takes the complete output of the stages before it and returns
//! a new value; nothing is shared between stages by mutation. Extraction,
//! diarization, track reassembly and muxing are fatal on failure. Every
//! other stage degrades and lets the job finish.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::DubConfig;
use crate::error::DubError;
use crate::io::{JobReport, StageSummary, chunk_outcomes};
use crate::models::{Job, QualityReport, Stage};
use crate::services::Services;
use crate::stages::{
    execute_chunk, execute_consensus, execute_diarize, execute_dub, execute_extract, execute_mux,
    execute_reassemble_segments, execute_reassemble_track, execute_segment, execute_separate,
};
use crate::worker::WorkerContext;
use crate::workspace::JobWorkspace;

/// A job-fatal failure, tagged with the stage it happened in
#[derive(Debug, Error)]
#[error("stage {stage} failed: {source}")]
pub struct StageFailure {
    pub stage: Stage,
    #[source]
    pub source: DubError,
}

impl StageFailure {
    fn at(stage: Stage) -> impl FnOnce(DubError) -> Self {
        move |source| Self { stage, source }
    }
}

/// Receives stage transitions while a job runs
pub trait StageObserver: Send + Sync {
    fn stage_started(&self, _stage: Stage) {}
    fn stage_finished(&self, _stage: Stage, _detail: &str) {}
}

/// Observer that ignores everything
pub struct NoopObserver;

impl StageObserver for NoopObserver {}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Dubbed video
    pub output: PathBuf,
    pub report: JobReport,
    /// Where the JSON report was written, if writing succeeded
    pub report_path: Option<PathBuf>,
}

/// JSON report location for an output video
pub fn report_path(output: &Path) -> PathBuf {
    output.with_extension("report.json")
}

/// Human-readable timeline location for an output video
pub fn timeline_path(output: &Path) -> PathBuf {
    output.with_extension("timeline.txt")
}

/// Stage bookkeeping for one run
struct StageLog<'a> {
    observer: &'a dyn StageObserver,
    summaries: Vec<StageSummary>,
    started: Option<Instant>,
}

impl<'a> StageLog<'a> {
    fn new(observer: &'a dyn StageObserver) -> Self {
        Self {
            observer,
            summaries: Vec::new(),
            started: None,
        }
    }

    fn start(&mut self, stage: Stage) {
        self.started = Some(Instant::now());
        self.observer.stage_started(stage);
    }

    fn finish(&mut self, stage: Stage, detail: String) {
        if let Some(at) = self.started.take() {
            debug!("{} took {:?}", stage, at.elapsed());
        }
        self.observer.stage_finished(stage, &detail);
        self.summaries.push(StageSummary { stage, detail });
    }
}

/// Runs jobs against one set of collaborators
pub struct Pipeline {
    services: Arc<Services>,
    config: Arc<DubConfig>,
}

impl Pipeline {
    pub fn new(services: Arc<Services>, config: DubConfig) -> Self {
        Self {
            services,
            config: Arc::new(config),
        }
    }

    /// Run every stage for `job`.
    ///
    /// Dropping the returned future cancels the job, including any chunk
    /// units still in flight.
    pub async fn run(
        &self,
        job: &Job,
        observer: &dyn StageObserver,
    ) -> Result<PipelineOutcome, StageFailure> {
        let services = self.services.as_ref();
        let config = self.config.as_ref();
        let workspace = Arc::new(JobWorkspace::new(&config.work_dir, &job.id));
        let mut log = StageLog::new(observer);
        info!(
            "Job {}: dubbing {} into {}",
            job.id,
            job.request.source.display(),
            job.target_language()
        );

        log.start(Stage::ExtractAudio);
        workspace
            .create()
            .await
            .map_err(StageFailure::at(Stage::ExtractAudio))?;
        let extracted = execute_extract(services, &workspace, &job.request.source)
            .await
            .map_err(StageFailure::at(Stage::ExtractAudio))?;
        log.finish(
            Stage::ExtractAudio,
            format!("{}ms of audio", extracted.source_ms),
        );

        log.start(Stage::Diarize);
        let diarized = execute_diarize(services, &extracted.audio_path)
            .await
            .map_err(StageFailure::at(Stage::Diarize))?;
        log.finish(
            Stage::Diarize,
            format!(
                "{} turns, {} speakers, {} overlap regions",
                diarized.turns.len(),
                diarized.speakers.len(),
                diarized.overlap_regions.len()
            ),
        );

        log.start(Stage::SeparateOverlap);
        let separation =
            execute_separate(services, &workspace, &diarized, &extracted.audio_path).await;
        log.finish(
            Stage::SeparateOverlap,
            if separation.ran {
                format!(
                    "{} stems, {} attributed",
                    separation.stems.len(),
                    separation.by_speaker.len()
                )
            } else {
                "skipped".to_string()
            },
        );

        log.start(Stage::Segment);
        let segmented = execute_segment(
            services,
            &workspace,
            &diarized.turns,
            &separation,
            &extracted.audio_path,
            extracted.source_ms,
            &config.segment,
        )
        .await;
        log.finish(
            Stage::Segment,
            format!(
                "{} segments, {} dropped",
                segmented.segments.len(),
                segmented.dropped
            ),
        );

        log.start(Stage::AggregateSpeakers);
        let fallback_gender = job
            .request
            .gender_hint
            .filter(|g| g.is_known())
            .unwrap_or(config.consensus.fallback_gender);
        let profile = execute_consensus(
            services,
            &diarized.speakers,
            &segmented.segments,
            &config.consensus,
            fallback_gender,
        )
        .await;
        log.finish(
            Stage::AggregateSpeakers,
            format!("{} speakers profiled", profile.len()),
        );

        log.start(Stage::SplitChunks);
        let chunks = execute_chunk(
            services,
            &workspace,
            &segmented.segments,
            config.segment.chunk_ms,
        )
        .await;
        log.finish(Stage::SplitChunks, format!("{} chunks", chunks.len()));

        log.start(Stage::DubChunks);
        let profile = Arc::new(profile);
        let ctx = WorkerContext {
            job_id: job.id,
            services: self.services.clone(),
            workspace: workspace.clone(),
            config: Arc::new(config.worker.clone()),
            profile: profile.clone(),
            fallback_gender,
            source_language: job.source_language().map(str::to_string),
            target_language: job.target_language().to_string(),
        };
        let results = execute_dub(ctx, chunks, config.max_concurrent_chunks).await;
        let mut quality = QualityReport::from_results(&results);
        log.finish(
            Stage::DubChunks,
            format!(
                "{} chunks, {} degraded",
                quality.total_chunks, quality.degraded_chunks
            ),
        );

        log.start(Stage::ReassembleSegments);
        let assembly =
            execute_reassemble_segments(services, &workspace, &segmented.segments, &results).await;
        log.finish(
            Stage::ReassembleSegments,
            format!(
                "{} segment tracks, {} silenced",
                assembly.tracks.len(),
                assembly.silenced
            ),
        );

        log.start(Stage::ReassembleTrack);
        let track =
            execute_reassemble_track(services, &workspace, &assembly.tracks, extracted.source_ms)
                .await
                .map_err(StageFailure::at(Stage::ReassembleTrack))?;
        log.finish(
            Stage::ReassembleTrack,
            format!(
                "{}, {} overlapping segments mixed in, {} lost",
                track.path.display(),
                track.overlaid,
                track.lost_overlaps
            ),
        );

        log.start(Stage::Mux);
        let output = job
            .request
            .output
            .clone()
            .unwrap_or_else(|| workspace.default_output());
        let output = execute_mux(services, &job.request.source, &track.path, &output)
            .await
            .map_err(StageFailure::at(Stage::Mux))?;
        log.finish(Stage::Mux, output.display().to_string());

        quality.dropped_segments = segmented.dropped;
        quality.silenced_segments = assembly.silenced;
        quality.overlaid_segments = track.overlaid;
        quality.lost_overlaps = track.lost_overlaps;

        let report = JobReport {
            job_id: job.id,
            source: job.request.source.clone(),
            output: output.clone(),
            source_language: job.request.source_language.clone(),
            target_language: job.target_language().to_string(),
            source_ms: extracted.source_ms,
            stages: log.summaries,
            overlap_regions: diarized.overlap_regions,
            speakers: profile.as_ref().clone(),
            chunks: chunk_outcomes(&results),
            quality,
            finished_at: Utc::now(),
        };
        let report_path = write_report(&report, &output);

        info!(
            "Job {}: complete, {}/{} chunks degraded",
            job.id, report.quality.degraded_chunks, report.quality.total_chunks
        );
        Ok(PipelineOutcome {
            output,
            report,
            report_path,
        })
    }
}

/// Write the JSON report and timeline next to the output; failures are
/// logged and do not fail the job.
fn write_report(report: &JobReport, output: &Path) -> Option<PathBuf> {
    let json = report_path(output);
    if let Err(e) = report.write_json(&json) {
        warn!("Could not write report: {:#}", e);
        return None;
    }
    if let Err(e) = report.write_timeline(&timeline_path(output)) {
        warn!("Could not write timeline: {:#}", e);
    }
    Some(json)
}
