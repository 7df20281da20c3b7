//! Background execution of long-running catalog work.
//!
//! Scans, bulk imports, catalog loads and refreshes run on a small rayon
//! pool. Each job gets a [`ProgressSender`] for human-readable status
//! messages and hands back its typed result through the returned [`Task`].

use std::panic::{catch_unwind, AssertUnwindSafe};

use crossbeam::channel::{unbounded, Receiver, Sender};
use log::{debug, error};

use crate::error::{Error, Result};

/// Extract panic info from panic value
pub fn extract_panic_info(panic_err: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic_err.downcast_ref::<&str>() {
        format!("Panic with message: {}", s)
    } else if let Some(s) = panic_err.downcast_ref::<String>() {
        format!("Panic with message: {}", s)
    } else {
        "Unknown panic occurred".to_string()
    }
}

/// Write end of a task's progress channel
#[derive(Debug, Clone)]
pub struct ProgressSender(Sender<String>);

impl ProgressSender {
    /// A sender nobody listens to, for running jobs synchronously
    pub fn detached() -> Self {
        let (tx, _) = unbounded();
        Self(tx)
    }

    pub fn send(&self, message: impl Into<String>) {
        // The receiver may be gone; progress is best effort
        let _ = self.0.send(message.into());
    }
}

/// Handle to a job running on the worker pool
pub struct Task<T> {
    progress: Receiver<String>,
    result: Receiver<Result<T>>,
}

impl<T> Task<T> {
    /// Progress messages, in the order the job sent them
    pub fn progress(&self) -> &Receiver<String> {
        &self.progress
    }

    /// Drain progress messages that are already queued
    pub fn pending_progress(&self) -> Vec<String> {
        self.progress.try_iter().collect()
    }

    pub(crate) fn result_receiver(&self) -> &Receiver<Result<T>> {
        &self.result
    }

    /// Block until the job finishes
    pub fn wait(self) -> Result<T> {
        self.result.recv().map_err(|_| lost_result())?
    }
}

pub(crate) fn lost_result() -> Error {
    Error::Task("worker exited without a result".to_string())
}

/// Thread pool for background catalog jobs
pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|index| format!("phototag-worker-{}", index))
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build worker pool: {}", e)))?;
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `op` inside the pool so parallel iterators use its threads
    pub fn install<R, F>(&self, op: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        self.pool.install(op)
    }

    /// Run `job` on the pool. A panic inside the job is reported as an
    /// [`Error::Task`] result.
    pub fn spawn<T, F>(&self, name: &str, job: F) -> Task<T>
    where
        T: Send + 'static,
        F: FnOnce(&ProgressSender) -> Result<T> + Send + 'static,
    {
        let (progress_tx, progress_rx) = unbounded();
        let (result_tx, result_rx) = unbounded();
        let name = name.to_string();

        self.pool.spawn(move || {
            debug!("Task started: {}", name);
            let progress = ProgressSender(progress_tx);
            let outcome = catch_unwind(AssertUnwindSafe(|| job(&progress)));
            drop(progress);

            let result = match outcome {
                Ok(result) => result,
                Err(panic_err) => {
                    let info = extract_panic_info(panic_err);
                    error!("Task {} panicked: {}", name, info);
                    Err(Error::Task(info))
                }
            };
            debug!("Task finished: {} (ok: {})", name, result.is_ok());
            let _ = result_tx.send(result);
        });

        Task {
            progress: progress_rx,
            result: result_rx,
        }
    }
}
