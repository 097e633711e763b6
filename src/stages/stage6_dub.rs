//! Chunk fan-out and fan-in.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::models::{Chunk, ChunkResult, GenderSource};
use crate::worker::{WorkerContext, process_chunk};

/// Execute Stage 6: run the worker pipeline on every chunk, at most
/// `max_concurrency` at a time.
///
/// Every chunk yields exactly one result. A unit that panics is replaced by a
/// silent result. Dropping the returned future aborts all outstanding units.
/// Results arrive in completion order.
pub async fn execute_dub(ctx: WorkerContext, chunks: Vec<Chunk>, max_concurrency: usize) -> Vec<ChunkResult> {
    info!(
        "Stage 6: Dubbing {} chunks ({} concurrent)",
        chunks.len(),
        max_concurrency.max(1)
    );

    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut units = JoinSet::new();
    for chunk in chunks.iter().cloned() {
        let ctx = ctx.clone();
        let semaphore = semaphore.clone();
        units.spawn(async move {
            // The semaphore is never closed
            let _permit = semaphore.acquire_owned().await.ok();
            process_chunk(&ctx, &chunk).await
        });
    }

    let mut results = Vec::with_capacity(chunks.len());
    while let Some(joined) = units.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => error!("Chunk unit did not finish: {}", e),
        }
    }

    let finished: HashSet<String> = results.iter().map(|r| r.chunk_id.clone()).collect();
    for chunk in chunks.iter().filter(|c| !finished.contains(&c.chunk_id)) {
        let (gender, source) = match ctx.profile.canonical_gender(&chunk.speaker) {
            Some(gender) => (gender, GenderSource::Profile),
            None => (ctx.fallback_gender, GenderSource::Fallback),
        };
        results.push(ChunkResult::silent(chunk, gender, source));
    }

    let degraded = results.iter().filter(|r| r.is_degraded()).count();
    info!(
        "Stage 6: {} chunk results ({} degraded)",
        results.len(),
        degraded
    );
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerConfig;
    use crate::models::{Gender, JobId, QualityReport, SpeakerProfile, SpeakerVoice};
    use crate::services::fake::FakeBackends;
    use crate::workspace::JobWorkspace;
    use std::path::PathBuf;
    use std::sync::atomic::Ordering;

    fn context(fakes: &FakeBackends, dir: &std::path::Path) -> WorkerContext {
        let job_id = JobId::new();
        WorkerContext {
            job_id,
            services: Arc::new(fakes.services()),
            workspace: Arc::new(JobWorkspace::new(dir, &job_id)),
            config: Arc::new(WorkerConfig::default()),
            profile: Arc::new(SpeakerProfile::default()),
            fallback_gender: Gender::Male,
            source_language: None,
            target_language: "hi-IN".to_string(),
        }
    }

    fn chunks(fakes: &FakeBackends, count: usize) -> Vec<Chunk> {
        (0..count)
            .map(|i| {
                let path = PathBuf::from(format!("/virtual/chunks/seg_0000_c{:03}.wav", i));
                fakes.media.register(&path, 5_000);
                Chunk {
                    chunk_id: format!("seg_0000_c{:03}", i),
                    segment_id: "seg_0000".to_string(),
                    index: i,
                    start_ms: i as u64 * 5_000,
                    end_ms: (i as u64 + 1) * 5_000,
                    speaker: "SPEAKER_00".to_string(),
                    overlap: false,
                    audio_path: Some(path),
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn test_one_result_per_chunk() {
        let fakes = FakeBackends::new(60_000, vec![]);
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&fakes, dir.path());
        ctx.workspace.create().await.unwrap();
        let input = chunks(&fakes, 7);

        let results = execute_dub(ctx, input.clone(), 3).await;

        assert_eq!(results.len(), 7);
        let ids: HashSet<&str> = results.iter().map(|r| r.chunk_id.as_str()).collect();
        for chunk in &input {
            assert!(ids.contains(chunk.chunk_id.as_str()));
        }
    }

    #[tokio::test]
    async fn test_failing_collaborators_still_yield_results() {
        let fakes = FakeBackends::new(60_000, vec![]);
        fakes.transcriber.fail.store(true, Ordering::SeqCst);
        fakes.synthesizer.fail.store(true, Ordering::SeqCst);
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&fakes, dir.path());

        let results = execute_dub(ctx, chunks(&fakes, 4), 2).await;

        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| r.audio_path.is_none()));
    }

    #[tokio::test]
    async fn test_panicking_unit_does_not_take_down_siblings() {
        let fakes = FakeBackends::new(60_000, vec![]);
        fakes.synthesizer.panic_on("seg_0000_c001");
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(&fakes, dir.path());
        let mut profile = SpeakerProfile::default();
        profile.speakers.insert(
            "SPEAKER_00".to_string(),
            SpeakerVoice {
                canonical_gender: Gender::Female,
                confidence: 0.8,
                votes: 3,
            },
        );
        ctx.profile = Arc::new(profile);

        let results = execute_dub(ctx, chunks(&fakes, 3), 3).await;

        assert_eq!(results.len(), 3);
        let crashed = results.iter().find(|r| r.chunk_id == "seg_0000_c001").unwrap();
        assert!(crashed.audio_path.is_none());
        assert!(!crashed.intentional_silence);
        assert_eq!(crashed.gender, Gender::Female);
        assert_eq!(crashed.gender_source, GenderSource::Profile);
        assert_eq!((crashed.start_ms, crashed.end_ms), (5_000, 10_000));
        for sibling in results.iter().filter(|r| r.chunk_id != "seg_0000_c001") {
            assert!(sibling.audio_path.is_some(), "{:?}", sibling);
        }
        assert_eq!(QualityReport::from_results(&results).null_audio, 1);
    }

    #[tokio::test]
    async fn test_no_chunks() {
        let fakes = FakeBackends::new(60_000, vec![]);
        let dir = tempfile::tempdir().unwrap();
        assert!(execute_dub(context(&fakes, dir.path()), vec![], 4).await.is_empty());
    }
}
