//! Shared application state.

use std::sync::Arc;

use domus_core::{DomusConfig, Result};
use domus_extract::{PdfTextExtractor, TextExtractor};
use domus_runtime::{JobRegistry, MatterGate, Metrics, ScanCoordinator};
use domus_store::{FsBlobStore, SqliteStore};

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: DomusConfig,
    pub gate: Arc<MatterGate>,
    pub coordinator: Arc<ScanCoordinator>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(config: DomusConfig, store: SqliteStore) -> Result<Self> {
        let extractor = Arc::new(PdfTextExtractor::new(config.scan.clone()));
        Self::with_extractor(config, store, extractor)
    }

    /// Build state around a specific text extractor.
    pub fn with_extractor(
        config: DomusConfig,
        store: SqliteStore,
        extractor: Arc<dyn TextExtractor>,
    ) -> Result<Self> {
        let blobs = Arc::new(FsBlobStore::new(&config.data_paths.uploads)?);
        let metrics = Arc::new(Metrics::new());

        let gate = Arc::new(MatterGate::new(
            Arc::new(store),
            blobs,
            extractor,
            metrics.clone(),
            config.scan.clone(),
        ));
        let jobs = Arc::new(JobRegistry::new(config.jobs.clone()));
        let coordinator = Arc::new(ScanCoordinator::new(
            gate.clone(),
            jobs,
            metrics.clone(),
            config.jobs.max_processing(),
        ));

        Ok(Self {
            config,
            gate,
            coordinator,
            metrics,
        })
    }
}
