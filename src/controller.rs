//! In-process job registry.
//!
//! `submit` returns a job id immediately and runs the pipeline on a spawned
//! task. Status, stage progress and the final artifact can be queried by id
//! while the job runs.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{error, info};

use crate::error::{DubError, Result};
use crate::models::{Job, JobId, JobRequest, JobStatus, Stage};
use crate::pipeline::{Pipeline, StageObserver};

struct Entry {
    job: Job,
    handle: AbortHandle,
    updates: watch::Sender<JobStatus>,
}

struct Inner {
    pipeline: Pipeline,
    jobs: RwLock<HashMap<JobId, Entry>>,
}

impl Inner {
    fn update<F: FnOnce(&mut Job)>(&self, id: JobId, apply: F) {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = jobs.get_mut(&id) {
            apply(&mut entry.job);
            entry.job.updated_at = Utc::now();
            entry.updates.send_replace(entry.job.status.clone());
        }
    }

    /// Move to `status` unless the job already reached a terminal state
    fn transition(&self, id: JobId, status: JobStatus) {
        self.update(id, |job| {
            if !job.status.is_terminal() {
                job.status = status;
            }
        });
    }
}

/// Mirrors stage transitions into the registry
struct RegistryObserver {
    inner: Arc<Inner>,
    id: JobId,
}

impl StageObserver for RegistryObserver {
    fn stage_started(&self, stage: Stage) {
        self.inner.transition(self.id, JobStatus::Running { stage });
    }

    fn stage_finished(&self, stage: Stage, detail: &str) {
        info!("Job {}: {} done ({})", self.id, stage, detail);
        self.inner.update(self.id, |job| job.completed_stages.push(stage));
    }
}

/// Tracks submitted jobs and their state
#[derive(Clone)]
pub struct JobRegistry {
    inner: Arc<Inner>,
}

impl JobRegistry {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            inner: Arc::new(Inner {
                pipeline,
                jobs: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Queue a job and start it in the background
    pub fn submit(&self, request: JobRequest) -> Result<JobId> {
        if request.target_language.trim().is_empty() {
            return Err(DubError::invalid("target language is required"));
        }
        if request.source.as_os_str().is_empty() {
            return Err(DubError::invalid("source video is required"));
        }

        let job = Job::new(request);
        let id = job.id;
        let (updates, _) = watch::channel(JobStatus::Queued);

        // The entry and its abort handle appear together, so a cancel can
        // never see the job without being able to stop it
        let mut jobs = self.inner.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let inner = self.inner.clone();
        let task_job = job.clone();
        let task = tokio::spawn(async move {
            let observer = RegistryObserver {
                inner: inner.clone(),
                id,
            };
            let status = match inner.pipeline.run(&task_job, &observer).await {
                Ok(outcome) => JobStatus::Complete {
                    output: outcome.output,
                    quality: outcome.report.quality,
                },
                Err(failure) => {
                    error!("Job {}: {}", id, failure);
                    JobStatus::Failed {
                        stage: failure.stage,
                        cause: failure.source.to_string(),
                    }
                }
            };
            inner.transition(id, status);
        });
        jobs.insert(
            id,
            Entry {
                job,
                handle: task.abort_handle(),
                updates,
            },
        );
        drop(jobs);
        info!("Job {}: queued", id);
        Ok(id)
    }

    pub fn job(&self, id: JobId) -> Option<Job> {
        let jobs = self.inner.jobs.read().unwrap_or_else(PoisonError::into_inner);
        jobs.get(&id).map(|entry| entry.job.clone())
    }

    pub fn status(&self, id: JobId) -> Option<JobStatus> {
        self.job(id).map(|job| job.status)
    }

    /// Dubbed video, once the job is complete
    pub fn artifact(&self, id: JobId) -> Option<PathBuf> {
        match self.status(id)? {
            JobStatus::Complete { output, .. } => Some(output),
            _ => None,
        }
    }

    /// All jobs, oldest first
    pub fn list(&self) -> Vec<Job> {
        let jobs = self.inner.jobs.read().unwrap_or_else(PoisonError::into_inner);
        let mut list: Vec<Job> = jobs.values().map(|entry| entry.job.clone()).collect();
        list.sort_by_key(|job| job.created_at);
        list
    }

    /// Abort a running job and all of its chunk work.
    ///
    /// Returns false for unknown or already finished jobs.
    pub fn cancel(&self, id: JobId) -> bool {
        {
            let jobs = self.inner.jobs.read().unwrap_or_else(PoisonError::into_inner);
            match jobs.get(&id) {
                Some(entry) if !entry.job.status.is_terminal() => entry.handle.abort(),
                _ => return false,
            }
        }
        self.inner.transition(id, JobStatus::Cancelled);
        info!("Job {}: cancelled", id);
        true
    }

    /// Receiver that yields every status change of a job
    pub fn subscribe(&self, id: JobId) -> Option<watch::Receiver<JobStatus>> {
        let jobs = self.inner.jobs.read().unwrap_or_else(PoisonError::into_inner);
        jobs.get(&id).map(|entry| entry.updates.subscribe())
    }

    /// Wait until the job reaches a terminal state
    pub async fn wait(&self, id: JobId) -> Option<JobStatus> {
        let mut updates = self.subscribe(id)?;
        loop {
            let status = updates.borrow_and_update().clone();
            if status.is_terminal() {
                return Some(status);
            }
            if updates.changed().await.is_err() {
                return self.status(id);
            }
        }
    }
}
