//! Background thread that runs the dispatcher until stopped.

use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::signal::{drain, CommitSignal, Signal};
use super::OutboxDispatcher;
use crate::bus::Publisher;
use crate::config::DispatcherConfig;
use crate::store::OutboxStore;

/// Statistics from the dispatcher thread.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkerStats {
    pub cycles: usize,
    pub delivered: usize,
    pub failed: usize,
    pub lease_lost: usize,
    pub storage_errors: usize,
    /// Set by `stop` when the thread outlived the shutdown grace.
    pub detached: bool,
}

/// Runs [`OutboxDispatcher::dispatch_once`] in a loop on its own thread.
///
/// Between cycles the thread waits for `poll_interval` or until a
/// [`CommitSignal`] arrives, whichever comes first. A full batch skips the
/// wait so a backlog drains without polling delay.
///
/// ```ignore
/// let worker = DispatcherThread::spawn(dispatcher, &config);
/// let handler = CommandHandler::new(store).with_signal(worker.signal());
///
/// handler.submit(request)?;
///
/// let stats = worker.stop();
/// ```
pub struct DispatcherThread {
    tx: Sender<Signal>,
    stats: Arc<Mutex<WorkerStats>>,
    shutdown_grace: Duration,
    handle: Option<JoinHandle<()>>,
}

impl DispatcherThread {
    /// Spawn the loop with the poll interval and shutdown grace from `config`.
    pub fn spawn<S, P>(dispatcher: OutboxDispatcher<S, P>, config: &DispatcherConfig) -> Self
    where
        S: OutboxStore + 'static,
        P: Publisher + 'static,
    {
        Self::spawn_with(dispatcher, config.poll_interval, config.shutdown_grace)
    }

    pub fn spawn_with<S, P>(
        dispatcher: OutboxDispatcher<S, P>,
        poll_interval: Duration,
        shutdown_grace: Duration,
    ) -> Self
    where
        S: OutboxStore + 'static,
        P: Publisher + 'static,
    {
        let (tx, rx) = channel();
        let stats = Arc::new(Mutex::new(WorkerStats::default()));
        let shared = Arc::clone(&stats);

        let handle = thread::spawn(move || {
            let worker_id = dispatcher.worker_id().to_string();
            tracing::info!(%worker_id, "outbox dispatcher started");

            loop {
                let outcome = dispatcher.dispatch_once();
                let backlog = {
                    let mut stats = shared.lock().unwrap_or_else(PoisonError::into_inner);
                    stats.cycles += 1;
                    match outcome {
                        Ok(report) => {
                            stats.delivered += report.delivered;
                            stats.failed += report.failed;
                            stats.lease_lost += report.lease_lost;
                            report.claimed >= dispatcher.batch_size()
                        }
                        Err(err) => {
                            stats.storage_errors += 1;
                            tracing::error!(%worker_id, error = %err, "outbox dispatch cycle failed");
                            false
                        }
                    }
                };

                if backlog {
                    if drain(&rx) {
                        break;
                    }
                    continue;
                }

                match rx.recv_timeout(poll_interval) {
                    Ok(Signal::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                    Ok(Signal::Wake) => {
                        if drain(&rx) {
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                }
            }

            tracing::info!(%worker_id, "outbox dispatcher stopped");
        });

        Self {
            tx,
            stats,
            shutdown_grace,
            handle: Some(handle),
        }
    }

    /// A sender that wakes this thread after a commit.
    pub fn signal(&self) -> CommitSignal {
        CommitSignal::new(self.tx.clone())
    }

    /// Snapshot of the counters so far.
    pub fn stats(&self) -> WorkerStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Signal the worker to stop without waiting.
    pub fn signal_stop(&self) {
        let _ = self.tx.send(Signal::Stop);
    }

    /// Stop after the in-flight batch and wait up to the shutdown grace.
    /// A thread still running after the grace is detached.
    pub fn stop(mut self) -> WorkerStats {
        self.signal_stop();

        if let Some(handle) = self.handle.take() {
            let deadline = Instant::now().checked_add(self.shutdown_grace);
            while !handle.is_finished() && deadline.map_or(true, |at| Instant::now() < at) {
                thread::sleep(Duration::from_millis(5));
            }

            if handle.is_finished() {
                if handle.join().is_err() {
                    tracing::error!("outbox dispatcher thread panicked");
                }
            } else {
                tracing::warn!(
                    grace_ms = self.shutdown_grace.as_millis() as u64,
                    "outbox dispatcher did not stop within shutdown grace, detaching"
                );
                let mut stats = self.stats();
                stats.detached = true;
                return stats;
            }
        }

        self.stats()
    }
}

impl Drop for DispatcherThread {
    fn drop(&mut self) {
        let _ = self.tx.send(Signal::Stop);
    }
}
