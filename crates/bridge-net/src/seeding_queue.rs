//! Bounded-concurrency seeding worker pool with per-job retry/backoff
//! (component design §4.10). Shared by `bridged` (publish-triggered and
//! reseed-triggered seeding) and `relayd` (ingest-triggered seeding).

use bridge_core::types::Event;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Semaphore};

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_secs(5);
const BACKOFF_FACTOR: u32 = 2;

/// Point-in-time snapshot of queue health, for operational logging.
#[derive(Debug, Clone, Default)]
pub struct QueueStats {
    pub queue_depth: usize,
    pub in_flight: usize,
    pub attempts: HashMap<String, u32>,
}

struct Job {
    event: Event,
}

/// Bounded FIFO of seeding jobs, drained by up to `concurrency` workers.
/// Each job is retried up to [`MAX_ATTEMPTS`] times with exponential
/// backoff before being dropped.
pub struct SeedingQueue {
    sender: mpsc::UnboundedSender<Job>,
    semaphore: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    queued: Arc<AtomicUsize>,
    attempts: Arc<Mutex<HashMap<String, u32>>>,
    closed: Arc<AtomicBool>,
}

impl SeedingQueue {
    /// Spawn the worker loop. `work` is invoked once per attempt and
    /// should return `Ok(())` on success.
    pub fn new<F, Fut>(concurrency: usize, work: F) -> Self
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), String>> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let queued = Arc::new(AtomicUsize::new(0));
        let attempts = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let work = Arc::new(work);

        let loop_semaphore = semaphore.clone();
        let loop_in_flight = in_flight.clone();
        let loop_queued = queued.clone();
        let loop_attempts = attempts.clone();

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                loop_queued.fetch_sub(1, Ordering::SeqCst);
                let permit = loop_semaphore.clone().acquire_owned().await;
                let Ok(permit) = permit else { break };
                let work = work.clone();
                let in_flight = loop_in_flight.clone();
                let attempts = loop_attempts.clone();
                in_flight.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let _permit = permit;
                    let event_id = job.event.id.clone();
                    let mut delay = BACKOFF_BASE;
                    for attempt in 1..=MAX_ATTEMPTS {
                        attempts.lock().await.insert(event_id.clone(), attempt);
                        match work(job.event.clone()).await {
                            Ok(()) => {
                                attempts.lock().await.remove(&event_id);
                                break;
                            }
                            Err(err) => {
                                tracing::warn!(
                                    event_id = %event_id,
                                    attempt,
                                    %err,
                                    "seeding attempt failed"
                                );
                                if attempt == MAX_ATTEMPTS {
                                    attempts.lock().await.remove(&event_id);
                                } else {
                                    tokio::time::sleep(delay).await;
                                    delay *= BACKOFF_FACTOR;
                                }
                            }
                        }
                    }
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });

        Self {
            sender: tx,
            semaphore,
            in_flight,
            queued,
            attempts,
            closed,
        }
    }

    /// Enqueue `event` for seeding. No-op if the queue has been closed.
    pub fn enqueue(&self, event: Event) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        self.queued.fetch_add(1, Ordering::SeqCst);
        let _ = self.sender.send(Job { event });
    }

    /// Stop accepting new jobs and wait for all in-flight work to finish.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let total_permits = self.semaphore.available_permits();
        loop {
            if self.in_flight.load(Ordering::SeqCst) == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let _ = total_permits;
    }

    pub async fn stats(&self) -> QueueStats {
        QueueStats {
            queue_depth: self.queued.load(Ordering::SeqCst),
            in_flight: self.in_flight.load(Ordering::SeqCst),
            attempts: self.attempts.lock().await.clone(),
        }
    }
}
