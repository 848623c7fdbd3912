//! In-process job registry and the client polling discipline.
//!
//! Jobs move `queued → started → finished | failed` and never backwards.
//! Every transition method checks the current state and refuses anything
//! else, so a late result for a job the reaper already failed is dropped.

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use domus_core::{now_millis, Error, JobConfig, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Started,
    Finished,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Started => "started",
            Self::Finished => "finished",
            Self::Failed => "failed",
        }
    }
}

/// What a status poll returns. `result` is set only when finished, `error`
/// only when failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobView<T> {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub enqueued_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<i64>,
}

struct JobEntry<T> {
    view: JobView<T>,
    started: Option<Instant>,
    ended: Option<Instant>,
}

pub struct JobRegistry<T> {
    jobs: RwLock<HashMap<String, JobEntry<T>>>,
    config: JobConfig,
}

impl<T: Clone> JobRegistry<T> {
    pub fn new(config: JobConfig) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Register a new queued job and return its id.
    pub fn create(&self) -> String {
        let job_id = uuid::Uuid::new_v4().to_string();
        let entry = JobEntry {
            view: JobView {
                job_id: job_id.clone(),
                status: JobStatus::Queued,
                result: None,
                error: None,
                enqueued_at: now_millis(),
                started_at: None,
                ended_at: None,
            },
            started: None,
            ended: None,
        };
        self.jobs.write().insert(job_id.clone(), entry);
        job_id
    }

    /// Drop a job that never reached a worker.
    pub fn discard(&self, job_id: &str) {
        self.jobs.write().remove(job_id);
    }

    pub fn mark_started(&self, job_id: &str) -> bool {
        let mut jobs = self.jobs.write();
        match jobs.get_mut(job_id) {
            Some(entry) if entry.view.status == JobStatus::Queued => {
                entry.view.status = JobStatus::Started;
                entry.view.started_at = Some(now_millis());
                entry.started = Some(Instant::now());
                true
            }
            Some(entry) => {
                warn!(job_id, status = entry.view.status.as_str(), "refusing start transition");
                false
            }
            None => false,
        }
    }

    pub fn finish(&self, job_id: &str, result: T) -> bool {
        self.complete(job_id, JobStatus::Finished, Some(result), None)
    }

    pub fn fail(&self, job_id: &str, error: impl Into<String>) -> bool {
        self.complete(job_id, JobStatus::Failed, None, Some(error.into()))
    }

    fn complete(
        &self,
        job_id: &str,
        status: JobStatus,
        result: Option<T>,
        error: Option<String>,
    ) -> bool {
        let mut jobs = self.jobs.write();
        match jobs.get_mut(job_id) {
            Some(entry) if entry.view.status == JobStatus::Started => {
                entry.view.status = status;
                entry.view.result = result;
                entry.view.error = error;
                entry.view.ended_at = Some(now_millis());
                entry.ended = Some(Instant::now());
                debug!(job_id, status = status.as_str(), "job completed");
                true
            }
            Some(entry) => {
                warn!(
                    job_id,
                    status = entry.view.status.as_str(),
                    wanted = status.as_str(),
                    "refusing completion of job not in started state"
                );
                false
            }
            None => false,
        }
    }

    /// Current view of a job. An empty id is a validation error; an unknown
    /// id is not found. Repeated polls of a terminal job return the same
    /// payload.
    pub fn get_status(&self, job_id: &str) -> Result<JobView<T>> {
        let job_id = job_id.trim();
        if job_id.is_empty() {
            return Err(Error::Validation("job_id is required".into()));
        }
        self.jobs
            .read()
            .get(job_id)
            .map(|entry| entry.view.clone())
            .ok_or_else(|| Error::NotFound(format!("job {}", job_id)))
    }

    /// Fail `started` jobs that exceeded the processing limit, then drop
    /// terminal jobs past retention and beyond the retained cap.
    /// Returns the number of jobs failed.
    pub fn reap_stale(&self) -> usize {
        let max_processing = self.config.max_processing();
        let mut jobs = self.jobs.write();
        let now_ms = now_millis();

        let mut reaped = 0;
        for entry in jobs.values_mut() {
            let overdue = entry.view.status == JobStatus::Started
                && entry
                    .started
                    .map(|t| t.elapsed() >= max_processing)
                    .unwrap_or(false);
            if overdue {
                entry.view.status = JobStatus::Failed;
                entry.view.error = Some(format!(
                    "timed out after {:?} without completing",
                    max_processing
                ));
                entry.view.ended_at = Some(now_ms);
                entry.ended = Some(Instant::now());
                reaped += 1;
            }
        }
        if reaped > 0 {
            warn!(reaped, "failed stale jobs");
        }

        self.prune(&mut jobs);
        reaped
    }

    fn prune(&self, jobs: &mut HashMap<String, JobEntry<T>>) {
        let retention = self.config.retention();
        let before = jobs.len();
        jobs.retain(|_, entry| match entry.ended {
            Some(ended) => ended.elapsed() < retention,
            None => true,
        });

        let mut terminal: Vec<(String, Instant)> = jobs
            .iter()
            .filter_map(|(id, entry)| entry.ended.map(|t| (id.clone(), t)))
            .collect();
        if terminal.len() > self.config.max_retained {
            terminal.sort_by_key(|(_, t)| *t);
            let excess = terminal.len() - self.config.max_retained;
            for (id, _) in terminal.into_iter().take(excess) {
                jobs.remove(&id);
            }
        }

        let removed = before - jobs.len();
        if removed > 0 {
            info!(removed, "pruned terminal jobs");
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }
}

// ---------------------------------------------------------------
// Client polling
// ---------------------------------------------------------------

/// Bounded polling schedule for a job-status client.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Multiplier applied to the interval after each poll. `1.0` is fixed.
    pub backoff: f64,
    pub max_interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            backoff: 1.5,
            max_interval: Duration::from_secs(5),
            max_attempts: 60,
        }
    }
}

/// Poll `fetch` until it reports a terminal job.
///
/// Any error from `fetch` (including not found) ends polling immediately.
/// Running out of attempts is an [`Error::Timeout`].
pub async fn poll_until_terminal<T, F, Fut>(policy: &PollPolicy, mut fetch: F) -> Result<JobView<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<JobView<T>>>,
{
    let mut delay = policy.interval;
    for attempt in 1..=policy.max_attempts {
        let view = fetch().await?;
        if view.status.is_terminal() {
            return Ok(view);
        }
        if attempt < policy.max_attempts {
            tokio::time::sleep(delay).await;
            delay = next_delay(delay, policy);
        }
    }
    Err(Error::Timeout(format!(
        "job not terminal after {} polls",
        policy.max_attempts
    )))
}

/// Grow `delay` by the backoff, never past `max_interval`. Overflowing or
/// non-finite products land on the cap.
fn next_delay(delay: Duration, policy: &PollPolicy) -> Duration {
    let secs = delay.as_secs_f64() * policy.backoff.max(1.0);
    Duration::try_from_secs_f64(secs)
        .map(|next| next.min(policy.max_interval))
        .unwrap_or(policy.max_interval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn registry(config: JobConfig) -> JobRegistry<String> {
        JobRegistry::new(config)
    }

    #[test]
    fn test_forward_only_transitions() {
        let jobs = registry(JobConfig::default());
        let id = jobs.create();
        assert_eq!(jobs.get_status(&id).unwrap().status, JobStatus::Queued);

        // Cannot skip started.
        assert!(!jobs.finish(&id, "early".into()));
        assert!(!jobs.fail(&id, "early"));

        assert!(jobs.mark_started(&id));
        assert!(!jobs.mark_started(&id));
        assert!(jobs.finish(&id, "done".into()));

        // Terminal is final.
        assert!(!jobs.fail(&id, "late"));
        let view = jobs.get_status(&id).unwrap();
        assert_eq!(view.status, JobStatus::Finished);
        assert_eq!(view.result.as_deref(), Some("done"));
        assert!(view.error.is_none());
    }

    #[test]
    fn test_repeated_polls_are_stable() {
        let jobs = registry(JobConfig::default());
        let id = jobs.create();
        jobs.mark_started(&id);
        jobs.fail(&id, "boom");
        let a = jobs.get_status(&id).unwrap();
        let b = jobs.get_status(&id).unwrap();
        assert_eq!(a.status, JobStatus::Failed);
        assert_eq!(a.error, b.error);
        assert_eq!(a.ended_at, b.ended_at);
        assert!(a.result.is_none());
    }

    #[test]
    fn test_empty_and_unknown_ids() {
        let jobs = registry(JobConfig::default());
        assert!(matches!(jobs.get_status(""), Err(Error::Validation(_))));
        assert!(matches!(jobs.get_status("  "), Err(Error::Validation(_))));
        assert!(matches!(jobs.get_status("nope"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_reaper_fails_stale_started_jobs() {
        let jobs = registry(JobConfig {
            max_processing_secs: 0,
            ..JobConfig::default()
        });
        let queued = jobs.create();
        let started = jobs.create();
        jobs.mark_started(&started);

        assert_eq!(jobs.reap_stale(), 1);
        assert_eq!(jobs.get_status(&queued).unwrap().status, JobStatus::Queued);
        let view = jobs.get_status(&started).unwrap();
        assert_eq!(view.status, JobStatus::Failed);
        assert!(view.error.unwrap().contains("timed out"));

        // A late result is refused.
        assert!(!jobs.finish(&started, "late".into()));
    }

    #[test]
    fn test_prune_respects_cap() {
        let jobs = registry(JobConfig {
            max_retained: 1,
            ..JobConfig::default()
        });
        for _ in 0..3 {
            let id = jobs.create();
            jobs.mark_started(&id);
            jobs.finish(&id, "ok".into());
        }
        let pending = jobs.create();
        jobs.reap_stale();
        assert_eq!(jobs.len(), 2);
        assert!(jobs.get_status(&pending).is_ok());
    }

    #[test]
    fn test_prune_respects_retention() {
        let jobs = registry(JobConfig {
            retention_secs: 0,
            ..JobConfig::default()
        });
        let id = jobs.create();
        jobs.mark_started(&id);
        jobs.finish(&id, "ok".into());
        jobs.reap_stale();
        assert!(jobs.is_empty());
    }

    fn view(status: JobStatus) -> JobView<String> {
        JobView {
            job_id: "j".into(),
            status,
            result: None,
            error: None,
            enqueued_at: 0,
            started_at: None,
            ended_at: None,
        }
    }

    fn fast_policy(max_attempts: u32) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(1),
            backoff: 2.0,
            max_interval: Duration::from_millis(4),
            max_attempts,
        }
    }

    #[tokio::test]
    async fn test_poll_returns_terminal_view() {
        let calls = AtomicU32::new(0);
        let result = poll_until_terminal(&fast_policy(10), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok(view(if n < 2 { JobStatus::Started } else { JobStatus::Finished }))
            }
        })
        .await
        .unwrap();
        assert_eq!(result.status, JobStatus::Finished);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_times_out() {
        let calls = AtomicU32::new(0);
        let err = poll_until_terminal(&fast_policy(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(view(JobStatus::Queued)) }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_backoff_is_capped() {
        let mut policy = fast_policy(3);
        assert_eq!(next_delay(Duration::from_millis(1), &policy), Duration::from_millis(2));
        assert_eq!(next_delay(Duration::from_millis(3), &policy), Duration::from_millis(4));

        policy.backoff = f64::INFINITY;
        assert_eq!(next_delay(Duration::from_millis(1), &policy), policy.max_interval);
        policy.backoff = f64::MAX;
        assert_eq!(next_delay(Duration::from_secs(u64::MAX), &policy), policy.max_interval);
        policy.backoff = f64::NAN;
        assert_eq!(next_delay(Duration::from_millis(1), &policy), Duration::from_millis(1));
    }

    #[tokio::test]
    async fn test_poll_survives_infinite_backoff() {
        let calls = AtomicU32::new(0);
        let policy = PollPolicy {
            backoff: f64::INFINITY,
            ..fast_policy(4)
        };
        let err = poll_until_terminal(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(view(JobStatus::Started)) }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_poll_aborts_on_not_found() {
        let err = poll_until_terminal::<String, _, _>(&fast_policy(5), || async {
            Err(Error::NotFound("job x".into()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
