//! Background directory scans.
//!
//! Filesystem walks run on a small fixed pool of worker threads. Results come
//! back as [`ScanOutcome`] messages which the owner drains on its own thread;
//! workers never touch player state.

use crate::error::Result;
use crate::library;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

const MAX_WORKERS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPurpose {
    /// Replaces the directory pool.
    Library,
    /// Appended to the playlist after a drop.
    PlaylistImport,
}

#[derive(Debug)]
struct ScanJob {
    ticket: u64,
    purpose: ScanPurpose,
    root: PathBuf,
}

#[derive(Debug)]
pub struct ScanOutcome {
    pub ticket: u64,
    pub purpose: ScanPurpose,
    pub root: PathBuf,
    pub result: Result<Vec<PathBuf>>,
}

pub struct ScanPool {
    job_tx: Option<Sender<ScanJob>>,
    cancel: Arc<AtomicBool>,
    outcome_rx: Receiver<ScanOutcome>,
    workers: Vec<JoinHandle<()>>,
    next_ticket: u64,
}

impl ScanPool {
    pub fn new(workers: usize) -> Self {
        let (job_tx, job_rx) = mpsc::channel::<ScanJob>();
        let (outcome_tx, outcome_rx) = mpsc::channel();
        let job_rx = Arc::new(Mutex::new(job_rx));
        let cancel = Arc::new(AtomicBool::new(false));

        let workers = (0..workers.clamp(1, MAX_WORKERS))
            .map(|id| {
                let job_rx = Arc::clone(&job_rx);
                let outcome_tx = outcome_tx.clone();
                let cancel = Arc::clone(&cancel);
                thread::spawn(move || worker_loop(id, &job_rx, &outcome_tx, &cancel))
            })
            .collect();

        Self {
            job_tx: Some(job_tx),
            cancel,
            outcome_rx,
            workers,
            next_ticket: 0,
        }
    }

    pub fn with_default_workers() -> Self {
        let workers = thread::available_parallelism().map_or(1, usize::from);
        Self::new(workers)
    }

    /// Queues a walk of `root` and returns the ticket its outcome will carry.
    pub fn submit(&mut self, purpose: ScanPurpose, root: PathBuf) -> u64 {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let job = ScanJob {
            ticket,
            purpose,
            root,
        };

        match &self.job_tx {
            Some(tx) => {
                if let Err(err) = tx.send(job) {
                    warn!(ticket, "scan pool has no live workers: {err}");
                }
            }
            None => warn!(ticket, "scan submitted after shutdown"),
        }
        ticket
    }

    pub fn try_next(&self) -> Option<ScanOutcome> {
        match self.outcome_rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub fn next_timeout(&self, timeout: Duration) -> Option<ScanOutcome> {
        match self.outcome_rx.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Cancels queued and in-flight walks, then joins the workers. Cancelled
    /// walks deliver no outcome.
    pub fn shutdown(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        self.job_tx.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("scan worker panicked");
            }
        }
    }
}

impl Drop for ScanPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    id: usize,
    jobs: &Mutex<Receiver<ScanJob>>,
    outcomes: &Sender<ScanOutcome>,
    cancel: &AtomicBool,
) {
    loop {
        let job = {
            let Ok(guard) = jobs.lock() else {
                return;
            };
            match guard.recv() {
                Ok(job) => job,
                Err(_) => return,
            }
        };

        if cancel.load(Ordering::Relaxed) {
            debug!(worker = id, ticket = job.ticket, "scan cancelled before start");
            continue;
        }

        debug!(worker = id, ticket = job.ticket, root = %job.root.display(), "scanning");
        let result = library::scan_directory_until(&job.root, cancel);
        if cancel.load(Ordering::Relaxed) {
            debug!(worker = id, ticket = job.ticket, "scan cancelled");
            continue;
        }
        let outcome = ScanOutcome {
            ticket: job.ticket,
            purpose: job.purpose,
            root: job.root,
            result,
        };
        if outcomes.send(outcome).is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn outcome_carries_ticket_and_tracks() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("a.mp3"), b"x").expect("write");
        fs::write(dir.path().join("b.txt"), b"x").expect("write");

        let mut pool = ScanPool::new(2);
        let ticket = pool.submit(ScanPurpose::Library, dir.path().to_path_buf());
        let outcome = pool.next_timeout(WAIT).expect("outcome");

        assert_eq!(outcome.ticket, ticket);
        assert_eq!(outcome.purpose, ScanPurpose::Library);
        let tracks = outcome.result.expect("scan ok");
        assert_eq!(tracks.len(), 1);
        assert!(tracks[0].ends_with("a.mp3"));
    }

    #[test]
    fn failures_are_delivered_as_messages() {
        let dir = tempdir().expect("tempdir");
        let mut pool = ScanPool::new(1);
        pool.submit(ScanPurpose::PlaylistImport, dir.path().join("missing"));

        let outcome = pool.next_timeout(WAIT).expect("outcome");
        assert!(outcome.result.is_err());
        assert_eq!(outcome.purpose, ScanPurpose::PlaylistImport);
    }

    #[test]
    fn tickets_increase_per_submission() {
        let dir = tempdir().expect("tempdir");
        let mut pool = ScanPool::new(1);
        let first = pool.submit(ScanPurpose::Library, dir.path().to_path_buf());
        let second = pool.submit(ScanPurpose::Library, dir.path().to_path_buf());
        assert!(second > first);

        let mut seen = vec![
            pool.next_timeout(WAIT).expect("first").ticket,
            pool.next_timeout(WAIT).expect("second").ticket,
        ];
        seen.sort_unstable();
        assert_eq!(seen, vec![first, second]);
    }

    #[test]
    fn shutdown_drops_queued_scans() {
        let dir = tempdir().expect("tempdir");
        for album in 0..20 {
            for track in 0..20 {
                let path = dir.path().join(format!("album{album}"));
                fs::create_dir_all(&path).expect("mkdir");
                fs::write(path.join(format!("{track}.mp3")), b"x").expect("write");
            }
        }

        let queued = 200;
        let mut pool = ScanPool::new(1);
        for _ in 0..queued {
            pool.submit(ScanPurpose::Library, dir.path().to_path_buf());
        }
        pool.shutdown();

        let mut delivered = 0;
        while pool.try_next().is_some() {
            delivered += 1;
        }
        assert!(delivered < queued);
        assert!(pool.workers.is_empty());
    }

    #[test]
    fn shutdown_is_idempotent() {
        let mut pool = ScanPool::new(3);
        pool.shutdown();
        pool.shutdown();
        assert!(pool.try_next().is_none());
    }
}
