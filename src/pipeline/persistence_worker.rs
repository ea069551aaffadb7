//! The single persistence worker.
//!
//! Owns the only database connection: it is opened on the worker thread and
//! never leaves it. Records are written one at a time; a failed write is
//! logged and the worker moves on to the next record.

use anyhow::{Context, Result};
use chrono::Utc;
use log::{error, info};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::queue::{poll, Polled, RecordReceiver};
use super::state::{StateCell, WorkerState};
use crate::storage::PartsStore;

pub struct PersistenceWorker {
    pub database_path: PathBuf,
    pub records: RecordReceiver,
    pub shutdown: Arc<AtomicBool>,
    pub state: StateCell,
    pub poll_interval: Duration,
}

impl PersistenceWorker {
    /// Spawns the worker and waits until its connection is open.
    ///
    /// Fails if the database cannot be opened; no thread is left running in
    /// that case.
    pub fn spawn(self) -> Result<JoinHandle<()>> {
        let (ready_tx, ready_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("persistence".into())
            .spawn(move || {
                let store = match PartsStore::open(&self.database_path) {
                    Ok(store) => store,
                    Err(err) => {
                        self.state.set(WorkerState::Stopped);
                        let _ = ready_tx.send(Err(anyhow::Error::new(err).context(format!(
                            "failed to open database {}",
                            self.database_path.display()
                        ))));
                        return;
                    }
                };
                if ready_tx.send(Ok(())).is_err() {
                    error!("Persistence worker: startup receiver dropped before ready signal");
                    self.state.set(WorkerState::Stopped);
                    return;
                }
                self.run(store);
            })
            .context("failed to spawn persistence worker thread")?;

        ready_rx
            .recv()
            .context("persistence worker exited before signaling readiness")??;

        Ok(handle)
    }

    /// Worker loop; the store is dropped (connection closed) on return.
    pub fn run(self, mut store: PartsStore) {
        info!("Persistence worker started");

        while !self.shutdown.load(Ordering::SeqCst) {
            match poll(&self.records, self.poll_interval) {
                Polled::Item(mut record) => {
                    self.state.set(WorkerState::Processing);
                    // Rows are stamped in write order, not extraction order.
                    record.timestamp = Utc::now();
                    match store.save(&record) {
                        Ok(id) => info!("Saved OCR result as row {}", id),
                        Err(e) => error!("Error saving OCR result: {}", e),
                    }
                    self.state.set(WorkerState::Idle);
                }
                Polled::Empty => continue,
                Polled::Shutdown => {
                    info!("Persistence worker: sentinel received");
                    break;
                }
                Polled::Closed => {
                    info!("Persistence worker: record queue closed");
                    break;
                }
            }
        }

        self.state.set(WorkerState::ShuttingDown);
        drop(store);
        info!("Persistence worker finished");
        self.state.set(WorkerState::Stopped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{format_timestamp, ScanRecord};
    use crate::pipeline::queue::{create_record_queue, WorkMessage};
    use chrono::TimeZone;
    use rusqlite::Connection;
    use std::time::Instant;
    use tempfile::tempdir;

    fn record(name: &str) -> ScanRecord {
        let mut record = ScanRecord::new(Utc::now());
        record.name = Some(name.to_string());
        record.mass = Some(420);
        record
    }

    fn worker(path: PathBuf, records: RecordReceiver) -> PersistenceWorker {
        PersistenceWorker {
            database_path: path,
            records,
            shutdown: Arc::new(AtomicBool::new(false)),
            state: StateCell::new(),
            poll_interval: Duration::from_millis(20),
        }
    }

    fn stored_names(path: &std::path::Path) -> Vec<String> {
        let conn = Connection::open(path).unwrap();
        let mut stmt = conn.prepare("SELECT name FROM parts ORDER BY id").unwrap();
        let names = stmt
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<Result<Vec<String>, _>>()
            .unwrap();
        names
    }

    fn wait_until_idle(state: &StateCell) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if state.get() == WorkerState::Idle {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_bad_record_does_not_stop_the_worker() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("parts.db");
        let (sender, receiver) = create_record_queue(8);

        let mut bad = record("second");
        bad.durability = Some(9_999_999_999_999_999_999);

        sender.send(WorkMessage::Item(record("first"))).unwrap();
        sender.send(WorkMessage::Item(bad)).unwrap();
        sender.send(WorkMessage::Item(record("third"))).unwrap();

        let w = worker(path.clone(), receiver);
        let state = w.state.clone();
        let handle = w.spawn().unwrap();

        // All three are consumed and the worker is still waiting for more.
        let deadline = Instant::now() + Duration::from_secs(5);
        while stored_names(&path).len() < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        wait_until_idle(&state);
        assert!(!handle.is_finished());
        assert_ne!(state.get(), WorkerState::Stopped);
        assert_eq!(stored_names(&path), vec!["first", "third"]);

        sender.send(WorkMessage::Item(record("fourth"))).unwrap();
        sender.send(WorkMessage::Shutdown).unwrap();
        handle.join().unwrap();
        assert_eq!(state.get(), WorkerState::Stopped);
        assert_eq!(stored_names(&path), vec!["first", "third", "fourth"]);
    }

    #[test]
    fn test_spawn_fails_when_database_cannot_open() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"x").unwrap();
        let (_sender, receiver) = create_record_queue(1);
        let result = worker(blocker.join("parts.db"), receiver).spawn();
        assert!(result.is_err());
    }

    #[test]
    fn test_worker_exits_on_flag() {
        let dir = tempdir().unwrap();
        let (_sender, receiver) = create_record_queue(1);
        let w = worker(dir.path().join("parts.db"), receiver);
        let shutdown = w.shutdown.clone();
        let handle = w.spawn().unwrap();

        shutdown.store(true, Ordering::SeqCst);
        handle.join().unwrap();
    }

    #[test]
    fn test_rows_are_stamped_at_write_time() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("parts.db");
        let (sender, receiver) = create_record_queue(4);

        let mut stale = record("stale");
        stale.timestamp = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();

        let started = format_timestamp(&Utc::now());
        sender.send(WorkMessage::Item(stale)).unwrap();
        sender.send(WorkMessage::Shutdown).unwrap();
        worker(path.clone(), receiver).spawn().unwrap().join().unwrap();
        let finished = format_timestamp(&Utc::now());

        let stored: String = Connection::open(&path)
            .unwrap()
            .query_row("SELECT timestamp FROM parts WHERE name = 'stale'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert!(stored.ends_with('Z'), "{}", stored);
        assert!(
            started <= stored && stored <= finished,
            "{} not within {}..{}",
            stored,
            started,
            finished
        );
    }
}
