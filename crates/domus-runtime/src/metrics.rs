//! Process counters rendered as Prometheus text.
//!
//! With a shared metrics directory each process writes its own snapshot
//! file (`domus_<pid>.json`) and the rendered output sums every snapshot
//! found there. Any directory problem degrades to this process's counters.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

const METRIC_PREFIX: &str = "domus";
const SNAPSHOT_PREFIX: &str = "domus_";
const SNAPSHOT_SUFFIX: &str = ".json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    MattersCreated,
    DocumentsUploaded,
    ScansOk,
    ScansFailed,
    JobsEnqueued,
    JobsFinished,
    JobsFailed,
}

impl Counter {
    pub const ALL: [Counter; 7] = [
        Self::MattersCreated,
        Self::DocumentsUploaded,
        Self::ScansOk,
        Self::ScansFailed,
        Self::JobsEnqueued,
        Self::JobsFinished,
        Self::JobsFailed,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::MattersCreated => "matters_created_total",
            Self::DocumentsUploaded => "documents_uploaded_total",
            Self::ScansOk => "scans_ok_total",
            Self::ScansFailed => "scans_failed_total",
            Self::JobsEnqueued => "jobs_enqueued_total",
            Self::JobsFinished => "jobs_finished_total",
            Self::JobsFailed => "jobs_failed_total",
        }
    }

    fn help(&self) -> &'static str {
        match self {
            Self::MattersCreated => "Matters created.",
            Self::DocumentsUploaded => "Documents attached to matters.",
            Self::ScansOk => "Risk scans completed.",
            Self::ScansFailed => "Risk scans that failed.",
            Self::JobsEnqueued => "Scan jobs handed to the background worker.",
            Self::JobsFinished => "Background scan jobs finished.",
            Self::JobsFailed => "Background scan jobs failed.",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

#[derive(Debug, Default)]
pub struct Metrics {
    counters: [AtomicU64; 7],
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&self, counter: Counter) {
        self.counters[counter.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.counters[counter.index()].load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        Counter::ALL
            .iter()
            .map(|c| (c.name().to_string(), self.get(*c)))
            .collect()
    }

    /// Prometheus exposition. `multiprocess_dir` enables cross-process
    /// aggregation; errors there fall back to local values.
    pub fn render(&self, multiprocess_dir: Option<&Path>) -> String {
        let local = self.snapshot();
        let totals = match multiprocess_dir {
            Some(dir) => match self.aggregate(dir) {
                Ok(totals) => totals,
                Err(e) => {
                    warn!(dir = %dir.display(), "multiprocess metrics unavailable, serving local: {}", e);
                    local
                }
            },
            None => local,
        };
        render_text(&totals)
    }

    fn aggregate(&self, dir: &Path) -> std::io::Result<BTreeMap<String, u64>> {
        self.write_snapshot(dir)?;

        let mut totals: BTreeMap<String, u64> = BTreeMap::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with(SNAPSHOT_PREFIX) || !name.ends_with(SNAPSHOT_SUFFIX) {
                continue;
            }
            let parsed = std::fs::read_to_string(entry.path())
                .ok()
                .and_then(|s| serde_json::from_str::<BTreeMap<String, u64>>(&s).ok());
            let Some(values) = parsed else {
                debug!(file = %name, "skipping unreadable metrics snapshot");
                continue;
            };
            for (key, value) in values {
                *totals.entry(key).or_insert(0) += value;
            }
        }
        Ok(totals)
    }

    fn write_snapshot(&self, dir: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(dir)?;
        let pid = std::process::id();
        let json = serde_json::to_string(&self.snapshot())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        let tmp = dir.join(format!(".{SNAPSHOT_PREFIX}{pid}.tmp"));
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, dir.join(format!("{SNAPSHOT_PREFIX}{pid}{SNAPSHOT_SUFFIX}")))
    }
}

fn render_text(values: &BTreeMap<String, u64>) -> String {
    let mut out = String::new();
    for counter in Counter::ALL {
        let value = values.get(counter.name()).copied().unwrap_or(0);
        let name = format!("{}_{}", METRIC_PREFIX, counter.name());
        out.push_str(&format!("# HELP {} {}\n", name, counter.help()));
        out.push_str(&format!("# TYPE {} counter\n", name));
        out.push_str(&format!("{} {}\n", name, value));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_single_process_render() {
        let metrics = Metrics::new();
        metrics.incr(Counter::MattersCreated);
        metrics.incr(Counter::MattersCreated);
        let text = metrics.render(None);
        assert!(text.contains("# TYPE domus_matters_created_total counter"));
        assert!(text.contains("domus_matters_created_total 2\n"));
        assert!(text.contains("domus_scans_failed_total 0\n"));
    }

    #[test]
    fn test_multiprocess_sums_snapshots() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("domus_999999.json"),
            r#"{"scans_ok_total": 5, "matters_created_total": 1}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("domus_garbage.json"), "not json").unwrap();

        let metrics = Metrics::new();
        metrics.incr(Counter::ScansOk);
        let text = metrics.render(Some(dir.path()));
        assert!(text.contains("domus_scans_ok_total 6\n"));
        assert!(text.contains("domus_matters_created_total 1\n"));
    }

    #[test]
    fn test_bad_directory_falls_back_to_local() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, "x").unwrap();

        let metrics = Metrics::new();
        metrics.incr(Counter::JobsEnqueued);
        let text = metrics.render(Some(&file));
        assert!(text.contains("domus_jobs_enqueued_total 1\n"));
    }
}
