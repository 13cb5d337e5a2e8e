//! Bounded worker pool.
//!
//! A fixed set of core workers drains a bounded queue. When the queue is full the pool
//! may start short-lived burst workers up to `max_workers`; past that, submission fails
//! fast with [`SubmitError::QueueFull`]. Every job carries a [`JobKey`] and at most one
//! job per key is queued or running at a time.

pub mod job;
pub mod pool;

pub use job::{JobError, JobHandle, JobKey, JobKind, SubmitError};
pub use pool::{WorkerPool, WorkerPoolConfig};
