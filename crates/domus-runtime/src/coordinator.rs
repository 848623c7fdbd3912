//! Job coordinator: runs a risk scan inline or hands it to the background
//! worker, with the same [`ScanReport`] either way.
//!
//! The worker drains an unbounded channel one request at a time. Each scan
//! runs on the blocking pool under a deadline; a panic or timeout fails the
//! job instead of leaving it `started`. A periodic reaper catches anything
//! the deadline misses.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use domus_core::{Error, Result};

use crate::gate::{MatterGate, ScanReport, ScanTarget};
use crate::jobs::{JobRegistry, JobStatus, JobView};
use crate::metrics::{Counter, Metrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Sync,
    Async,
}

impl ScanMode {
    /// `None` or empty means sync.
    pub fn parse(mode: Option<&str>) -> Result<Self> {
        match mode.map(|m| m.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("sync") => Ok(Self::Sync),
            Some("async") => Ok(Self::Async),
            Some(other) => Err(Error::Validation(format!(
                "mode must be 'sync' or 'async', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobHandle {
    pub job_id: String,
    pub status: JobStatus,
}

#[derive(Debug, Clone)]
pub enum ScanDispatch {
    Completed(ScanReport),
    Queued(JobHandle),
}

struct ScanRequest {
    job_id: String,
    matter_id: i64,
    target: ScanTarget,
}

pub struct ScanCoordinator {
    gate: Arc<MatterGate>,
    jobs: Arc<JobRegistry<ScanReport>>,
    metrics: Arc<Metrics>,
    max_processing: Duration,
    tx: mpsc::UnboundedSender<ScanRequest>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<ScanRequest>>>,
    worker_running: AtomicBool,
}

impl ScanCoordinator {
    pub fn new(
        gate: Arc<MatterGate>,
        jobs: Arc<JobRegistry<ScanReport>>,
        metrics: Arc<Metrics>,
        max_processing: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            gate,
            jobs,
            metrics,
            max_processing,
            tx,
            rx: Mutex::new(Some(rx)),
            worker_running: AtomicBool::new(false),
        }
    }

    pub fn jobs(&self) -> &JobRegistry<ScanReport> {
        &self.jobs
    }

    pub fn worker_running(&self) -> bool {
        self.worker_running.load(Ordering::SeqCst)
    }

    /// Start the background scan worker. Must be called from within a Tokio
    /// runtime. A second call is a no-op.
    pub fn start_worker(self: &Arc<Self>) {
        let mut rx = match self.rx.lock().take() {
            Some(rx) => rx,
            None => {
                error!("Scan worker already started");
                return;
            }
        };

        self.worker_running.store(true, Ordering::SeqCst);
        let coordinator = self.clone();
        tokio::spawn(async move {
            info!("Background scan worker started");
            while let Some(request) = rx.recv().await {
                coordinator.process(request).await;
            }
            coordinator.worker_running.store(false, Ordering::SeqCst);
            warn!("Background scan worker stopped");
        });
    }

    /// Periodically fail stale jobs and prune old ones.
    pub fn start_reaper(self: &Arc<Self>, every: Duration) {
        let jobs = self.jobs.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                jobs.reap_stale();
            }
        });
    }

    /// Run or enqueue a scan. Unknown matters fail fast in both modes.
    /// Async requests run inline when the worker is not available.
    pub async fn scan(&self, matter_id: i64, target: ScanTarget, mode: ScanMode) -> Result<ScanDispatch> {
        self.gate.get_matter(matter_id)?;

        if mode == ScanMode::Async {
            if self.worker_running() {
                let job_id = self.jobs.create();
                let request = ScanRequest {
                    job_id: job_id.clone(),
                    matter_id,
                    target,
                };
                match self.tx.send(request) {
                    Ok(()) => {
                        self.metrics.incr(Counter::JobsEnqueued);
                        info!(matter_id, job_id = %job_id, "risk scan queued");
                        return Ok(ScanDispatch::Queued(JobHandle {
                            job_id,
                            status: JobStatus::Queued,
                        }));
                    }
                    Err(_) => {
                        self.jobs.discard(&job_id);
                        warn!(matter_id, "scan queue closed, running inline");
                    }
                }
            } else {
                warn!(matter_id, "scan worker unavailable, running inline");
            }
        }

        self.run_inline(matter_id, target).await.map(ScanDispatch::Completed)
    }

    pub fn job_status(&self, job_id: &str) -> Result<JobView<ScanReport>> {
        self.jobs.get_status(job_id)
    }

    async fn run_inline(&self, matter_id: i64, target: ScanTarget) -> Result<ScanReport> {
        let gate = self.gate.clone();
        tokio::task::spawn_blocking(move || gate.run_risk_scan(matter_id, target))
            .await
            .map_err(|e| Error::Internal(format!("scan task failed: {}", e)))?
    }

    async fn process(&self, request: ScanRequest) {
        let ScanRequest {
            job_id,
            matter_id,
            target,
        } = request;

        if !self.jobs.mark_started(&job_id) {
            warn!(job_id = %job_id, "job vanished before start, skipping");
            return;
        }
        info!(job_id = %job_id, matter_id, "processing scan job");

        let gate = self.gate.clone();
        let cancelled = Arc::new(AtomicBool::new(false));
        let task = {
            let cancelled = cancelled.clone();
            tokio::task::spawn_blocking(move || {
                gate.run_risk_scan_until(matter_id, target, &cancelled)
            })
        };

        let failure = match tokio::time::timeout(self.max_processing, task).await {
            Ok(Ok(Ok(report))) => {
                if self.jobs.finish(&job_id, report) {
                    self.metrics.incr(Counter::JobsFinished);
                }
                None
            }
            Ok(Ok(Err(e))) => Some(e.to_string()),
            Ok(Err(join_err)) => {
                error!(job_id = %job_id, "scan task crashed: {}", join_err);
                Some("worker crashed".to_string())
            }
            Err(_) => {
                // The blocking task cannot be aborted; stop it from recording.
                cancelled.store(true, Ordering::SeqCst);
                Some(format!("timed out after {:?}", self.max_processing))
            }
        };

        if let Some(message) = failure {
            warn!(job_id = %job_id, matter_id, "scan job failed: {}", message);
            if self.jobs.fail(&job_id, message) {
                self.metrics.incr(Counter::JobsFailed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::Upload;
    use crate::jobs::{poll_until_terminal, PollPolicy};
    use domus_core::{JobConfig, ScanConfig};
    use domus_extract::{PdfTextExtractor, TextExtraction, TextExtractor};
    use domus_store::{BlobStore, FsBlobStore, MatterStatus, SqliteStore};
    use tempfile::TempDir;

    const E2E: &[u8] = b"Conservation Area. Listed Building. S106 applies.\nEnforcement notice: yes. Flood Zone 3.\n";

    /// Treats the upload as plain text once it passes the PDF check.
    struct PlainText;

    impl TextExtractor for PlainText {
        fn extract_text(&self, bytes: &[u8]) -> TextExtraction {
            let body = bytes.strip_prefix(b"%PDF-1.4\n".as_slice()).unwrap_or(bytes);
            PdfTextExtractor::default().extract_text(body)
        }
    }

    /// Sleeps before extracting, to push a scan past its deadline.
    struct SlowText(Duration);

    impl TextExtractor for SlowText {
        fn extract_text(&self, bytes: &[u8]) -> TextExtraction {
            std::thread::sleep(self.0);
            PlainText.extract_text(bytes)
        }
    }

    fn coordinator(dir: &TempDir) -> Arc<ScanCoordinator> {
        coordinator_with(dir, Arc::new(PlainText), Duration::from_secs(30))
    }

    fn coordinator_with(
        dir: &TempDir,
        extractor: Arc<dyn TextExtractor>,
        max_processing: Duration,
    ) -> Arc<ScanCoordinator> {
        let store = Arc::new(SqliteStore::open(dir.path().join("db")).unwrap());
        let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(dir.path().join("uploads")).unwrap());
        let metrics = Arc::new(Metrics::new());
        let gate = Arc::new(MatterGate::new(
            store,
            blobs,
            extractor,
            metrics.clone(),
            ScanConfig::default(),
        ));
        let jobs = Arc::new(JobRegistry::new(JobConfig::default()));
        Arc::new(ScanCoordinator::new(gate, jobs, metrics, max_processing))
    }

    fn seeded(coord: &ScanCoordinator) -> i64 {
        let m = coord.gate.ingest(None, None).unwrap();
        let mut pdf = b"%PDF-1.4\n".to_vec();
        pdf.extend_from_slice(E2E);
        coord
            .gate
            .attach_document(
                m.id,
                Upload {
                    filename: "search.pdf",
                    content_type: None,
                    kind: "search",
                    bytes: &pdf,
                },
            )
            .unwrap();
        m.id
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(ScanMode::parse(None).unwrap(), ScanMode::Sync);
        assert_eq!(ScanMode::parse(Some("ASYNC")).unwrap(), ScanMode::Async);
        assert!(ScanMode::parse(Some("later")).is_err());
    }

    #[tokio::test]
    async fn test_sync_scan_returns_report() {
        let dir = TempDir::new().unwrap();
        let coord = coordinator(&dir);
        let mid = seeded(&coord);
        match coord.scan(mid, ScanTarget::Latest, ScanMode::Sync).await.unwrap() {
            ScanDispatch::Completed(report) => assert!(report.overall_score > 0.5),
            ScanDispatch::Queued(_) => panic!("sync scan was queued"),
        }
    }

    #[tokio::test]
    async fn test_async_without_worker_falls_back_inline() {
        let dir = TempDir::new().unwrap();
        let coord = coordinator(&dir);
        let mid = seeded(&coord);
        let dispatch = coord.scan(mid, ScanTarget::Latest, ScanMode::Async).await.unwrap();
        assert!(matches!(dispatch, ScanDispatch::Completed(_)));
        assert!(coord.jobs().is_empty());
    }

    #[tokio::test]
    async fn test_async_job_runs_to_finished() {
        let dir = TempDir::new().unwrap();
        let coord = coordinator(&dir);
        coord.start_worker();
        let mid = seeded(&coord);

        let handle = match coord.scan(mid, ScanTarget::Latest, ScanMode::Async).await.unwrap() {
            ScanDispatch::Queued(handle) => handle,
            ScanDispatch::Completed(_) => panic!("expected a queued job"),
        };
        assert_eq!(handle.status, JobStatus::Queued);

        let policy = PollPolicy {
            interval: Duration::from_millis(10),
            backoff: 1.0,
            max_interval: Duration::from_millis(10),
            max_attempts: 500,
        };
        let view = poll_until_terminal(&policy, || {
            let view = coord.job_status(&handle.job_id);
            async move { view }
        })
        .await
        .unwrap();
        assert_eq!(view.status, JobStatus::Finished);
        let report = view.result.unwrap();
        assert_eq!(report.matter_id, mid);
        assert_eq!(coord.metrics.get(Counter::JobsFinished), 1);
    }

    #[tokio::test]
    async fn test_async_failure_is_data() {
        let dir = TempDir::new().unwrap();
        let coord = coordinator(&dir);
        coord.start_worker();
        let m = coord.gate.ingest(None, None).unwrap();

        // No documents: the scan itself fails, the job records the error.
        let handle = match coord.scan(m.id, ScanTarget::Latest, ScanMode::Async).await.unwrap() {
            ScanDispatch::Queued(handle) => handle,
            ScanDispatch::Completed(_) => panic!("expected a queued job"),
        };
        let policy = PollPolicy {
            interval: Duration::from_millis(10),
            backoff: 1.0,
            max_interval: Duration::from_millis(10),
            max_attempts: 500,
        };
        let view = poll_until_terminal(&policy, || {
            let view = coord.job_status(&handle.job_id);
            async move { view }
        })
        .await
        .unwrap();
        assert_eq!(view.status, JobStatus::Failed);
        assert!(view.error.unwrap().contains("no documents"));
        assert!(view.result.is_none());
    }

    #[tokio::test]
    async fn test_timed_out_job_leaves_matter_untouched() {
        let dir = TempDir::new().unwrap();
        let coord = coordinator_with(
            &dir,
            Arc::new(SlowText(Duration::from_millis(300))),
            Duration::from_millis(50),
        );
        coord.start_worker();
        let mid = seeded(&coord);

        let handle = match coord.scan(mid, ScanTarget::Latest, ScanMode::Async).await.unwrap() {
            ScanDispatch::Queued(handle) => handle,
            ScanDispatch::Completed(_) => panic!("expected a queued job"),
        };
        let policy = PollPolicy {
            interval: Duration::from_millis(10),
            backoff: 1.0,
            max_interval: Duration::from_millis(10),
            max_attempts: 500,
        };
        let view = poll_until_terminal(&policy, || {
            let view = coord.job_status(&handle.job_id);
            async move { view }
        })
        .await
        .unwrap();
        assert_eq!(view.status, JobStatus::Failed);
        assert_eq!(view.error.as_deref(), Some("timed out after 50ms"));

        // Give the abandoned extraction time to finish.
        tokio::time::sleep(Duration::from_millis(800)).await;

        let detail = coord.gate.matter_detail(mid).unwrap();
        assert_eq!(detail.matter.status, MatterStatus::Received);
        assert!(detail.findings.is_empty());
        assert!(coord.gate.store().list_scans(mid).unwrap().is_empty());
        assert_eq!(coord.metrics.get(Counter::JobsFailed), 1);
    }

    #[tokio::test]
    async fn test_unknown_matter_fails_fast() {
        let dir = TempDir::new().unwrap();
        let coord = coordinator(&dir);
        coord.start_worker();
        let err = coord
            .scan(4040, ScanTarget::Latest, ScanMode::Async)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(coord.jobs().is_empty());
    }

    #[tokio::test]
    async fn test_second_worker_start_is_noop() {
        let dir = TempDir::new().unwrap();
        let coord = coordinator(&dir);
        coord.start_worker();
        coord.start_worker();
        assert!(coord.worker_running());
    }
}
