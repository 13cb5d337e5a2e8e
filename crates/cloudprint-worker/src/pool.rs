//! Worker pool: core workers, burst workers and the single-flight registry.
//!
//! Shutdown: [`WorkerPool::shutdown`] closes the queue. Jobs already queued still run;
//! core workers exit once the queue is empty and `shutdown` returns after they and any
//! burst workers have finished.

use async_channel::{Receiver, Sender, TrySendError};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::job::{JobError, JobHandle, JobKey, SubmitError};

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Workers that live for the whole lifetime of the pool.
    pub core_workers: usize,
    /// Upper bound on concurrent workers, burst workers included.
    pub max_workers: usize,
    /// Jobs that may wait in the queue.
    pub queue_capacity: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            core_workers: 2,
            max_workers: 5,
            queue_capacity: 100,
        }
    }
}

impl WorkerPoolConfig {
    fn normalized(mut self) -> Self {
        self.core_workers = self.core_workers.max(1);
        self.max_workers = self.max_workers.max(self.core_workers);
        self.queue_capacity = self.queue_capacity.max(1);
        self
    }

    fn burst_limit(&self) -> usize {
        self.max_workers - self.core_workers
    }
}

struct Job {
    key: JobKey,
    task: BoxFuture<'static, ()>,
}

type InFlight = Arc<DashMap<JobKey, ()>>;

/// Releases a job's key when the job finishes or is dropped unrun.
struct InFlightGuard {
    in_flight: InFlight,
    key: JobKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}

struct Shared {
    sender: Sender<Job>,
    receiver: Receiver<Job>,
    in_flight: InFlight,
    bursting: AtomicUsize,
    workers: Mutex<Vec<JoinHandle<()>>>,
    config: WorkerPoolConfig,
}

/// Cheap to clone; clones share the same queue and workers.
#[derive(Clone)]
pub struct WorkerPool {
    shared: Arc<Shared>,
}

impl WorkerPool {
    /// Start the core workers. Must be called from within a Tokio runtime.
    pub fn new(config: WorkerPoolConfig) -> Self {
        let config = config.normalized();
        let (sender, receiver) = async_channel::bounded(config.queue_capacity);
        let shared = Arc::new(Shared {
            sender,
            receiver,
            in_flight: Arc::new(DashMap::new()),
            bursting: AtomicUsize::new(0),
            workers: Mutex::new(Vec::new()),
            config,
        });

        let handles: Vec<JoinHandle<()>> = (0..shared.config.core_workers)
            .map(|index| {
                let receiver = shared.receiver.clone();
                tokio::spawn(core_worker(index, receiver))
            })
            .collect();
        if let Ok(mut workers) = shared.workers.lock() {
            workers.extend(handles);
        }

        tracing::info!(
            core_workers = shared.config.core_workers,
            max_workers = shared.config.max_workers,
            queue_capacity = shared.config.queue_capacity,
            "Worker pool started"
        );

        WorkerPool { shared }
    }

    pub fn config(&self) -> &WorkerPoolConfig {
        &self.shared.config
    }

    /// Queue `future` under `key`.
    ///
    /// Fails immediately when a job with the same key is queued or running, or when the
    /// queue is full and no burst worker can be started.
    pub fn submit<F, T>(&self, key: JobKey, future: F) -> Result<JobHandle<T>, SubmitError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        match self.shared.in_flight.entry(key) {
            Entry::Occupied(_) => {
                tracing::warn!(job = %key, "Rejected duplicate job submission");
                return Err(SubmitError::AlreadyInFlight(key));
            }
            Entry::Vacant(slot) => {
                slot.insert(());
            }
        }

        let guard = InFlightGuard {
            in_flight: self.shared.in_flight.clone(),
            key,
        };
        let (tx, rx) = oneshot::channel();
        let task = async move {
            let outcome = AssertUnwindSafe(future)
                .catch_unwind()
                .await
                .map_err(|payload| JobError::Panicked(panic_message(payload.as_ref())));
            // Release the key before the caller can observe completion.
            drop(guard);
            let _ = tx.send(outcome);
        }
        .boxed();

        match self.shared.sender.try_send(Job { key, task }) {
            Ok(()) => {
                tracing::debug!(job = %key, queued = self.shared.receiver.len(), "Job queued");
                Ok(JobHandle::new(key, rx))
            }
            Err(TrySendError::Full(job)) => {
                if self.try_start_burst(job) {
                    Ok(JobHandle::new(key, rx))
                } else {
                    tracing::warn!(
                        job = %key,
                        capacity = self.shared.config.queue_capacity,
                        "Worker queue full, rejecting job"
                    );
                    Err(SubmitError::QueueFull {
                        capacity: self.shared.config.queue_capacity,
                    })
                }
            }
            Err(TrySendError::Closed(_)) => Err(SubmitError::ShuttingDown),
        }
    }

    /// Hand `job` to a new burst worker if the worker limit allows it. On refusal the
    /// job is dropped, which releases its key.
    fn try_start_burst(&self, job: Job) -> bool {
        let limit = self.shared.config.burst_limit();
        let acquired = self
            .shared
            .bursting
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then_some(n + 1)
            })
            .is_ok();
        if !acquired {
            return false;
        }

        let shared = self.shared.clone();
        let handle = tokio::spawn(async move {
            tracing::debug!(job = %job.key, "Burst worker started");
            run_job(job).await;
            while let Ok(next) = shared.receiver.try_recv() {
                run_job(next).await;
            }
            shared.bursting.fetch_sub(1, Ordering::AcqRel);
            tracing::debug!("Burst worker idle, exiting");
        });
        if let Ok(mut workers) = self.shared.workers.lock() {
            workers.retain(|h| !h.is_finished());
            workers.push(handle);
        }
        true
    }

    pub fn is_in_flight(&self, key: &JobKey) -> bool {
        self.shared.in_flight.contains_key(key)
    }

    pub fn queued(&self) -> usize {
        self.shared.receiver.len()
    }

    pub fn burst_workers(&self) -> usize {
        self.shared.bursting.load(Ordering::Acquire)
    }

    /// Stop accepting jobs, let queued jobs finish and wait for every worker to exit.
    pub async fn shutdown(&self) {
        tracing::info!(queued = self.queued(), "Worker pool shutting down");
        self.shared.sender.close();
        let handles = match self.shared.workers.lock() {
            Ok(mut workers) => std::mem::take(&mut *workers),
            Err(_) => Vec::new(),
        };
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Worker task ended abnormally");
            }
        }
        tracing::info!("Worker pool stopped");
    }
}

async fn core_worker(index: usize, receiver: Receiver<Job>) {
    tracing::debug!(worker = index, "Core worker started");
    while let Ok(job) = receiver.recv().await {
        run_job(job).await;
    }
    tracing::debug!(worker = index, "Core worker stopped");
}

async fn run_job(job: Job) {
    let started = Instant::now();
    job.task.await;
    tracing::debug!(
        job = %job.key,
        duration_ms = started.elapsed().as_millis() as u64,
        "Job finished"
    );
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
