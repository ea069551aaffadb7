//! XO Parts Scanner
//!
//! Reads screenshots of the item inspection overlay, extracts the part's
//! name, category, stats and features, and stores each scan in parts.db.
//!
//! Usage: `xo-parts-scanner [config.json]`, then one screenshot path per line
//! on stdin. `quit` or end of input shuts down.

mod config;
mod error;
mod extract;
mod geometry;
mod icons;
mod logging;
mod ocr;
mod paths;
mod pipeline;
mod storage;
mod trigger;

use anyhow::{Context, Result};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{default_config_path, load_config};
use crate::extract::RecordExtractor;
use crate::icons::{IconCatalog, IconClassifier};
use crate::ocr::{ensure_tessdata, recognizer_from_config};
use crate::pipeline::{Pipeline, PipelineSettings};

fn main() -> Result<()> {
    logging::install_panic_hook();

    // Ensure output directories exist
    paths::ensure_directories()?;
    logging::init_logging(&paths::get_logs_dir());

    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    let config = load_config(&config_path);

    // Tesseract is an external program; without it every field comes back empty.
    if let Err(e) = ensure_tessdata(config.tessdata_dir.as_deref(), config.download_tessdata) {
        warn!("Failed to setup Tesseract data: {}", e);
        warn!("OCR features may not work correctly.");
    }
    let recognizer = recognizer_from_config(&config);

    let catalog = IconCatalog::load_dir(&config.icons_dir, config.icon_marker_value)
        .context("cannot run without feature icons")?;

    let classifier = IconClassifier::new(Arc::new(catalog), config.icon_marker_value);
    let extractor = RecordExtractor::new(recognizer, classifier, config.icon_match_threshold);

    let pipeline = Pipeline::start(&PipelineSettings::from_config(&config), extractor)?;
    info!("OCR listener started. Enter a screenshot path to scan it, or 'quit' to exit.");

    let stats = trigger::run_trigger(std::io::stdin().lock(), |captured| {
        pipeline.submit(captured)
    });
    info!(
        "Trigger stopped: {} queued, {} dropped, {} unreadable",
        stats.queued, stats.dropped, stats.unreadable
    );

    for (name, state) in pipeline.worker_states() {
        info!("{}: {}", name, state);
    }
    let report = pipeline.shutdown();
    if !report.detached.is_empty() {
        warn!("Workers still running at exit: {}", report.detached.join(", "));
    }

    Ok(())
}
