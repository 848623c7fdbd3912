//! Domus: conveyancing search risk extraction server.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use domus_core::{DomusConfig, ScanConfig};
use domus_extract::{DocumentType, PdfTextExtractor};
use domus_runtime::{run_pipeline, DocumentSource};
use domus_server::{build_router, AppState};

const REAPER_INTERVAL: Duration = Duration::from_secs(30);

fn resolve_data_dir() -> PathBuf {
    std::env::var("DOMUS_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

fn print_usage() {
    println!("Domus: conveyancing search risk extraction");
    println!();
    println!("Usage: domus [command]");
    println!();
    println!("Commands:");
    println!("  (none)                          Start the server");
    println!("  scan <file> [--kind <kind>]     Extract and score a document, print JSON");
    println!("                                  kind: llc1 | con29 | search (default)");
    println!("  help                            Show this help message");
}

/// Offline scan of a single file. Nothing is stored.
fn scan_file(args: &[String]) -> anyhow::Result<()> {
    let mut path: Option<PathBuf> = None;
    let mut kind = String::from("search");

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--kind" => {
                kind = iter
                    .next()
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("--kind needs a value"))?;
            }
            other if path.is_none() => path = Some(PathBuf::from(other)),
            other => anyhow::bail!("Unexpected argument: {}", other),
        }
    }
    let path = path.ok_or_else(|| anyhow::anyhow!("Usage: domus scan <file> [--kind <kind>]"))?;

    let bytes = std::fs::read(&path)?;
    let extractor = PdfTextExtractor::new(ScanConfig::default());
    let output = run_pipeline(
        DocumentSource::Bytes(&bytes),
        DocumentType::from_kind(&kind),
        &extractor,
    );

    let report = serde_json::json!({
        "file": path.display().to_string(),
        "doc_type": output.doc_type,
        "ocr_applied": output.ocr_applied,
        "overall_score": output.risk.overall_score,
        "band": output.risk.band.as_str(),
        "findings": output.risk.findings,
        "fields": output.fields,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "scan" => return scan_file(&args[2..]),
            "--help" | "-h" | "help" => {
                print_usage();
                return Ok(());
            }
            _ => {
                eprintln!("Unknown command: {}. Use 'domus help' for usage.", args[1]);
                std::process::exit(1);
            }
        }
    }

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let config = DomusConfig::from_env(&data_dir)?;
    let port = config.port;

    let store = domus_store::SqliteStore::open(&config.data_paths.db)
        .map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))?;

    let state = Arc::new(AppState::new(config, store)?);

    state.coordinator.start_worker();
    state.coordinator.start_reaper(REAPER_INTERVAL);

    let app = build_router(state.clone());

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Domus server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
