//! Bounded work queues between the trigger, the recognition workers and the
//! persistence worker.
//!
//! Both queues carry `WorkMessage`s so a consumer can be woken by an explicit
//! `Shutdown` sentinel instead of waiting out its poll timeout. The capture
//! queue has several consumers, so its receiver sits behind a mutex.

use chrono::{DateTime, Utc};
use image::RgbImage;
use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::extract::ScanRecord;

/// A queue entry: real work, or the request to stop consuming.
#[derive(Debug)]
pub enum WorkMessage<T> {
    Item(T),
    Shutdown,
}

/// A raw capture waiting for recognition.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub image: RgbImage,
    pub captured_at: DateTime<Utc>,
    /// Where the capture came from, for log lines
    pub source: String,
}

impl CapturedImage {
    pub fn new(image: RgbImage, source: impl Into<String>) -> Self {
        Self {
            image,
            captured_at: Utc::now(),
            source: source.into(),
        }
    }
}

pub type CaptureSender = SyncSender<WorkMessage<CapturedImage>>;
pub type CaptureReceiver = Arc<Mutex<Receiver<WorkMessage<CapturedImage>>>>;
pub type RecordSender = SyncSender<WorkMessage<ScanRecord>>;
pub type RecordReceiver = Receiver<WorkMessage<ScanRecord>>;

/// Creates the capture queue. The receiver can be cloned into every
/// recognition worker.
pub fn create_capture_queue(capacity: usize) -> (CaptureSender, CaptureReceiver) {
    let (tx, rx) = sync_channel(capacity.max(1));
    (tx, Arc::new(Mutex::new(rx)))
}

/// Creates the record queue feeding the single persistence worker.
pub fn create_record_queue(capacity: usize) -> (RecordSender, RecordReceiver) {
    sync_channel(capacity.max(1))
}

/// Outcome of one bounded wait on a queue.
#[derive(Debug)]
pub enum Polled<T> {
    Item(T),
    Shutdown,
    /// Nothing arrived within the poll interval.
    Empty,
    /// Every sender is gone; no more work can arrive.
    Closed,
}

impl<T> From<Result<WorkMessage<T>, RecvTimeoutError>> for Polled<T> {
    fn from(result: Result<WorkMessage<T>, RecvTimeoutError>) -> Self {
        match result {
            Ok(WorkMessage::Item(item)) => Polled::Item(item),
            Ok(WorkMessage::Shutdown) => Polled::Shutdown,
            Err(RecvTimeoutError::Timeout) => Polled::Empty,
            Err(RecvTimeoutError::Disconnected) => Polled::Closed,
        }
    }
}

/// Waits up to `timeout` for a message on a receiver.
pub fn poll<T>(receiver: &Receiver<WorkMessage<T>>, timeout: Duration) -> Polled<T> {
    receiver.recv_timeout(timeout).into()
}

/// Waits up to `timeout` for a message on a receiver shared between workers.
///
/// A poisoned lock means another worker panicked while holding it; the
/// receiver itself is still sound, so the guard is recovered.
pub fn poll_shared<T>(receiver: &Arc<Mutex<Receiver<WorkMessage<T>>>>, timeout: Duration) -> Polled<T> {
    let guard = match receiver.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    guard.recv_timeout(timeout).into()
}

/// Result of a non-blocking submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submitted {
    Queued,
    /// The queue was full and the item was dropped.
    Full,
    /// No consumer is listening anymore.
    Closed,
}

/// Pushes without blocking; a full queue drops the message.
pub fn offer<T>(sender: &SyncSender<WorkMessage<T>>, message: WorkMessage<T>) -> Submitted {
    match sender.try_send(message) {
        Ok(()) => Submitted::Queued,
        Err(TrySendError::Full(_)) => Submitted::Full,
        Err(TrySendError::Disconnected(_)) => Submitted::Closed,
    }
}

/// Pause between attempts while `send_within` waits for room.
const SEND_RETRY_STEP: Duration = Duration::from_millis(5);

/// Result of a bounded wait for room in a queue.
#[derive(Debug)]
pub enum Sent<T> {
    Queued,
    /// Still full at the deadline; the message is handed back.
    TimedOut(WorkMessage<T>),
    Closed,
}

/// Waits up to `timeout` for room in the queue. The sending side of `poll`.
pub fn send_within<T>(
    sender: &SyncSender<WorkMessage<T>>,
    message: WorkMessage<T>,
    timeout: Duration,
) -> Sent<T> {
    let deadline = Instant::now() + timeout;
    let mut message = message;
    loop {
        match sender.try_send(message) {
            Ok(()) => return Sent::Queued,
            Err(TrySendError::Disconnected(_)) => return Sent::Closed,
            Err(TrySendError::Full(returned)) => {
                let now = Instant::now();
                if now >= deadline {
                    return Sent::TimedOut(returned);
                }
                message = returned;
                thread::sleep(SEND_RETRY_STEP.min(deadline - now));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(tag: &str) -> CapturedImage {
        CapturedImage::new(RgbImage::new(4, 4), tag)
    }

    #[test]
    fn test_capture_queue_send_receive() {
        let (sender, receiver) = create_capture_queue(4);
        assert_eq!(offer(&sender, WorkMessage::Item(capture("first"))), Submitted::Queued);

        match poll_shared(&receiver, Duration::from_millis(50)) {
            Polled::Item(img) => assert_eq!(img.source, "first"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_full_queue_drops_instead_of_blocking() {
        let (sender, _receiver) = create_capture_queue(2);
        assert_eq!(offer(&sender, WorkMessage::Item(capture("a"))), Submitted::Queued);
        assert_eq!(offer(&sender, WorkMessage::Item(capture("b"))), Submitted::Queued);
        assert_eq!(offer(&sender, WorkMessage::Item(capture("c"))), Submitted::Full);
    }

    #[test]
    fn test_poll_reports_empty_then_sentinel() {
        let (sender, receiver) = create_record_queue(2);
        assert!(matches!(poll(&receiver, Duration::from_millis(10)), Polled::Empty));

        sender.send(WorkMessage::Shutdown).unwrap();
        assert!(matches!(poll(&receiver, Duration::from_millis(10)), Polled::Shutdown));
    }

    #[test]
    fn test_poll_reports_closed_when_senders_dropped() {
        let (sender, receiver) = create_capture_queue(1);
        drop(sender);
        assert!(matches!(
            poll_shared(&receiver, Duration::from_millis(10)),
            Polled::Closed
        ));
    }

    #[test]
    fn test_offer_to_closed_queue() {
        let (sender, receiver) = create_record_queue(1);
        drop(receiver);
        assert_eq!(offer(&sender, WorkMessage::Shutdown), Submitted::Closed);
    }

    #[test]
    fn test_items_arrive_in_order() {
        let (sender, receiver) = create_capture_queue(8);
        for i in 0..5 {
            offer(&sender, WorkMessage::Item(capture(&format!("shot_{}", i))));
        }
        for i in 0..5 {
            match poll_shared(&receiver, Duration::from_millis(10)) {
                Polled::Item(img) => assert_eq!(img.source, format!("shot_{}", i)),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_send_within_times_out_and_returns_message() {
        let (sender, _receiver) = create_record_queue(1);
        sender.send(WorkMessage::Shutdown).unwrap();

        let started = Instant::now();
        match send_within(&sender, WorkMessage::Shutdown, Duration::from_millis(30)) {
            Sent::TimedOut(WorkMessage::Shutdown) => {}
            other => panic!("unexpected {:?}", other),
        }
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(30), "waited {:?}", waited);
        assert!(waited < Duration::from_secs(1), "waited {:?}", waited);
    }

    #[test]
    fn test_send_within_succeeds_once_consumer_drains() {
        let (sender, receiver) = create_capture_queue(1);
        offer(&sender, WorkMessage::Item(capture("first")));

        let consumer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            let mut sources = Vec::new();
            for _ in 0..2 {
                if let Polled::Item(img) = poll_shared(&receiver, Duration::from_secs(2)) {
                    sources.push(img.source);
                }
            }
            sources
        });

        let sent = send_within(
            &sender,
            WorkMessage::Item(capture("second")),
            Duration::from_secs(2),
        );
        assert!(matches!(sent, Sent::Queued));
        assert_eq!(consumer.join().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_send_within_reports_closed() {
        let (sender, receiver) = create_record_queue(1);
        drop(receiver);
        assert!(matches!(
            send_within(&sender, WorkMessage::Shutdown, Duration::from_secs(1)),
            Sent::Closed
        ));
    }
}
