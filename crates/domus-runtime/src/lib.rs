//! Domus Runtime: the risk-scan pipeline and everything that coordinates it.
//!
//! - [`pipeline`]: text → normalize → extract → score, one pure function.
//! - [`gate`]: the only writer of matter risk state.
//! - [`jobs`] / [`coordinator`]: inline or queued execution with polling.
//! - [`export`]: JSON and DOCX reports.
//! - [`metrics`]: process counters in Prometheus text format.

pub mod coordinator;
pub mod export;
pub mod gate;
pub mod jobs;
pub mod metrics;
pub mod pipeline;

pub use coordinator::{JobHandle, ScanCoordinator, ScanDispatch, ScanMode};
pub use export::{ExportData, ExportFinding, ExportOverrides};
pub use gate::{MatterDetail, MatterGate, ScanReport, ScanTarget, Upload};
pub use jobs::{poll_until_terminal, JobRegistry, JobStatus, JobView, PollPolicy};
pub use metrics::{Counter, Metrics};
pub use pipeline::{run_pipeline, DocumentSource, PipelineOutput};
