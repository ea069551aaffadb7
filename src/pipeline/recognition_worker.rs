//! Recognition worker: capture → bright-box detection → field extraction.
//!
//! Several of these run side by side, all pulling from the shared capture
//! queue. Any failure on one image is logged and the image dropped; a worker
//! only stops on the shutdown flag, a sentinel, or a closed queue.

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::queue::{
    offer, poll_shared, send_within, CaptureReceiver, CaptureSender, CapturedImage, Polled,
    RecordSender, Sent, Submitted, WorkMessage,
};
use super::state::{StateCell, WorkerState};
use crate::error::{ScanError, ScanResult};
use crate::extract::{RecordExtractor, ScanRecord};
use crate::geometry::{crop_rect, detect_bright_box};
use crate::ocr::to_gray;

/// Runs detection and extraction on one capture.
pub fn process_capture(
    extractor: &RecordExtractor,
    captured: &CapturedImage,
    overlay_marker: u8,
) -> ScanResult<ScanRecord> {
    let gray = to_gray(&captured.image);
    let bbox = detect_bright_box(&gray, overlay_marker).ok_or(ScanError::Detection {
        marker: overlay_marker,
    })?;
    debug!("Using bbox for {}: {}", captured.source, bbox);

    let overlay = crop_rect(&captured.image, &bbox);
    Ok(extractor.extract_record(&overlay))
}

pub struct RecognitionWorker {
    pub id: usize,
    pub captures: CaptureReceiver,
    pub records: RecordSender,
    pub extractor: RecordExtractor,
    pub shutdown: Arc<AtomicBool>,
    pub state: StateCell,
    pub poll_interval: Duration,
    pub overlay_marker: u8,
}

impl RecognitionWorker {
    pub fn spawn(self) -> Result<JoinHandle<()>> {
        let name = format!("recognition-{}", self.id);
        thread::Builder::new()
            .name(name.clone())
            .spawn(move || self.run())
            .with_context(|| format!("failed to spawn {name}"))
    }

    /// Worker loop. Blocks until shutdown, so run it on its own thread.
    pub fn run(self) {
        debug!("Recognition worker {} started", self.id);

        while !self.shutdown.load(Ordering::SeqCst) {
            match poll_shared(&self.captures, self.poll_interval) {
                Polled::Item(captured) => {
                    self.state.set(WorkerState::Processing);
                    self.handle(captured);
                    self.state.set(WorkerState::Idle);
                }
                Polled::Empty => continue,
                Polled::Shutdown => {
                    debug!("Recognition worker {}: sentinel received", self.id);
                    break;
                }
                Polled::Closed => {
                    debug!("Recognition worker {}: capture queue closed", self.id);
                    break;
                }
            }
        }

        self.state.set(WorkerState::ShuttingDown);
        debug!("Recognition worker {} finished", self.id);
        self.state.set(WorkerState::Stopped);
    }

    fn handle(&self, captured: CapturedImage) {
        info!(
            "Worker {}: processing capture from {} ({}x{}, captured {})",
            self.id,
            captured.source,
            captured.image.width(),
            captured.image.height(),
            captured.captured_at.format("%H:%M:%S%.3f")
        );

        let record = match process_capture(&self.extractor, &captured, self.overlay_marker) {
            Ok(record) => record,
            Err(ScanError::Detection { .. }) => {
                warn!("No box found in capture from {}, dropping it", captured.source);
                return;
            }
            Err(e) => {
                error!("Error during OCR of {}: {}", captured.source, e);
                return;
            }
        };

        match serde_json::to_string(&record) {
            Ok(json) => info!("OCR result: {}", json),
            Err(e) => warn!("Failed to serialize OCR result: {}", e),
        }

        self.forward(record);
    }

    /// Hands the record to the persistence queue. Waits in poll-interval
    /// steps while the queue is full, but gives up once shutdown is requested.
    fn forward(&self, record: ScanRecord) {
        let mut message = WorkMessage::Item(record);
        loop {
            match send_within(&self.records, message, self.poll_interval) {
                Sent::Queued => {
                    info!("Enqueued OCR result for saving");
                    return;
                }
                Sent::TimedOut(returned) => {
                    if self.shutdown.load(Ordering::SeqCst) {
                        warn!("Shutdown requested with record queue full, record dropped");
                        return;
                    }
                    debug!("Record queue full, worker {} still waiting", self.id);
                    message = returned;
                }
                Sent::Closed => {
                    error!("Persistence queue closed, record dropped");
                    return;
                }
            }
        }
    }
}

/// Wakes one recognition worker per sentinel. Returns how many were queued.
pub fn send_sentinels(sender: &CaptureSender, count: usize) -> usize {
    (0..count)
        .filter(|_| offer(sender, WorkMessage::Shutdown) == Submitted::Queued)
        .count()
}
