//! Pipeline coordinator: owns the queues, the shutdown flag and every worker
//! handle.

use anyhow::Result;
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::persistence_worker::PersistenceWorker;
use super::queue::{
    create_capture_queue, create_record_queue, offer, CaptureSender, CapturedImage,
    RecordSender, Submitted, WorkMessage,
};
use super::recognition_worker::{send_sentinels, RecognitionWorker};
use super::state::{StateCell, WorkerState};
use crate::config::ScannerConfig;
use crate::extract::RecordExtractor;

/// Pipeline sizing and timing.
#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub database_path: PathBuf,
    pub worker_count: usize,
    pub capture_queue_capacity: usize,
    pub record_queue_capacity: usize,
    pub poll_interval: Duration,
    pub join_timeout: Duration,
    pub overlay_marker: u8,
}

impl PipelineSettings {
    pub fn from_config(config: &ScannerConfig) -> Self {
        Self {
            database_path: config.database_path.clone(),
            worker_count: config.effective_worker_count(),
            capture_queue_capacity: config.capture_queue_capacity,
            record_queue_capacity: config.record_queue_capacity,
            poll_interval: config.poll_interval(),
            join_timeout: config.join_timeout(),
            overlay_marker: config.overlay_marker_value,
        }
    }
}

struct WorkerHandle {
    name: String,
    state: StateCell,
    handle: JoinHandle<()>,
}

/// Outcome of `Pipeline::shutdown`.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub joined: usize,
    /// Workers still running at the deadline; their threads are left behind.
    pub detached: Vec<String>,
}

pub struct Pipeline {
    captures: CaptureSender,
    records: RecordSender,
    shutdown: Arc<AtomicBool>,
    recognition: Vec<WorkerHandle>,
    persistence: WorkerHandle,
    join_timeout: Duration,
}

impl Pipeline {
    /// Starts the persistence worker, then the recognition pool.
    ///
    /// Fails if the database cannot be opened or a thread cannot be spawned.
    pub fn start(settings: &PipelineSettings, extractor: RecordExtractor) -> Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let (capture_tx, capture_rx) = create_capture_queue(settings.capture_queue_capacity);
        let (record_tx, record_rx) = create_record_queue(settings.record_queue_capacity);

        let persistence_state = StateCell::new();
        let handle = PersistenceWorker {
            database_path: settings.database_path.clone(),
            records: record_rx,
            shutdown: shutdown.clone(),
            state: persistence_state.clone(),
            poll_interval: settings.poll_interval,
        }
        .spawn()?;
        let persistence = WorkerHandle {
            name: "persistence".to_string(),
            state: persistence_state,
            handle,
        };

        let worker_count = settings.worker_count.max(1);
        let mut recognition = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let state = StateCell::new();
            let spawned = RecognitionWorker {
                id,
                captures: capture_rx.clone(),
                records: record_tx.clone(),
                extractor: extractor.clone(),
                shutdown: shutdown.clone(),
                state: state.clone(),
                poll_interval: settings.poll_interval,
                overlay_marker: settings.overlay_marker,
            }
            .spawn();

            match spawned {
                Ok(handle) => recognition.push(WorkerHandle {
                    name: format!("recognition-{id}"),
                    state,
                    handle,
                }),
                Err(e) => {
                    // Stop what already runs before reporting.
                    let partial = Pipeline {
                        captures: capture_tx,
                        records: record_tx,
                        shutdown,
                        recognition,
                        persistence,
                        join_timeout: settings.join_timeout,
                    };
                    partial.shutdown();
                    return Err(e);
                }
            }
        }

        info!(
            "Pipeline started: {} recognition workers, database {}",
            worker_count,
            settings.database_path.display()
        );

        Ok(Self {
            captures: capture_tx,
            records: record_tx,
            shutdown,
            recognition,
            persistence,
            join_timeout: settings.join_timeout,
        })
    }

    /// Queues a capture without blocking. A full queue drops it.
    pub fn submit(&self, captured: CapturedImage) -> Submitted {
        if self.shutdown.load(Ordering::SeqCst) {
            return Submitted::Closed;
        }
        let source = captured.source.clone();
        let outcome = offer(&self.captures, WorkMessage::Item(captured));
        match outcome {
            Submitted::Queued => info!("Queued capture from {}", source),
            Submitted::Full => warn!("Capture queue full, dropping capture from {}", source),
            Submitted::Closed => error!("Capture queue closed, dropping capture from {}", source),
        }
        outcome
    }

    /// Current state of every worker, persistence worker last.
    pub fn worker_states(&self) -> Vec<(String, WorkerState)> {
        self.recognition
            .iter()
            .chain(std::iter::once(&self.persistence))
            .map(|w| (w.name.clone(), w.state.get()))
            .collect()
    }

    /// Stops every worker: flag, sentinels, then a join bounded by the join
    /// timeout. Workers that miss the deadline are left running.
    pub fn shutdown(self) -> ShutdownReport {
        info!("Shutting down...");
        self.shutdown.store(true, Ordering::SeqCst);

        let queued = send_sentinels(&self.captures, self.recognition.len());
        if queued < self.recognition.len() {
            warn!(
                "Capture queue full, queued {}/{} sentinels; workers will stop on the flag",
                queued,
                self.recognition.len()
            );
        }
        if offer(&self.records, WorkMessage::Shutdown) != Submitted::Queued {
            warn!("Could not queue persistence sentinel; worker will stop on the flag");
        }

        let deadline = Instant::now() + self.join_timeout;
        let mut report = ShutdownReport::default();
        for worker in self
            .recognition
            .into_iter()
            .chain(std::iter::once(self.persistence))
        {
            if join_until(worker.handle, &worker.name, deadline) {
                report.joined += 1;
            } else {
                warn!(
                    "{} did not stop within {:?} (state: {}), leaving it",
                    worker.name,
                    self.join_timeout,
                    worker.state.get()
                );
                report.detached.push(worker.name);
            }
        }

        info!("Exited.");
        report
    }
}

/// Joins `handle` if it finishes before `deadline`. Returns false when the
/// thread is still running at the deadline.
fn join_until(handle: JoinHandle<()>, name: &str, deadline: Instant) -> bool {
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(10));
    }
    if handle.join().is_err() {
        error!("{} panicked", name);
    }
    true
}
