use std::time::{Duration, Instant};

use crossbeam::select;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::info;

use crate::error::Result;
use crate::tasks::{lost_result, Task};

/// Terminal spinner showing the latest progress message of a background task
pub struct ProgressTracker {
    progress: ProgressBar,
    start_time: Instant,
}

impl ProgressTracker {
    pub fn new(label: &str) -> Self {
        let progress = ProgressBar::new_spinner();
        progress.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} [{elapsed_precise}] {prefix}: {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        progress.set_prefix(label.to_string());
        progress.enable_steady_tick(Duration::from_millis(100));

        Self {
            progress,
            start_time: Instant::now(),
        }
    }

    /// A tracker that draws nothing, for non-interactive output
    pub fn hidden(label: &str) -> Self {
        let tracker = Self::new(label);
        tracker.progress.set_draw_target(ProgressDrawTarget::hidden());
        tracker
    }

    pub fn set_message(&self, message: String) {
        self.progress.set_message(message);
    }

    /// Show every progress message of `task` until it finishes, then return
    /// its result. The last message stays on screen.
    pub fn follow<T>(self, task: Task<T>) -> Result<T> {
        let mut last_message = None;

        loop {
            select! {
                recv(task.progress()) -> message => match message {
                    Ok(message) => {
                        self.set_message(message.clone());
                        last_message = Some(message);
                    }
                    // The job has returned; its result is on the way
                    Err(_) => break,
                },
                recv(task.result_receiver()) -> result => {
                    for message in task.pending_progress() {
                        last_message = Some(message);
                    }
                    let result = result.map_err(|_| lost_result())?;
                    self.finish(last_message);
                    return result;
                }
            }
        }

        let result = task.wait();
        self.finish(last_message);
        result
    }

    fn finish(&self, last_message: Option<String>) {
        let elapsed = self.start_time.elapsed();
        match last_message {
            Some(message) => {
                info!("{} ({:.1?})", message, elapsed);
                self.progress.finish_with_message(message);
            }
            None => self.progress.finish_and_clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::tasks::WorkerPool;

    #[test]
    fn test_follow_returns_task_result() {
        let pool = WorkerPool::new(1).unwrap();
        let task = pool.spawn("count", |progress| {
            for i in 1..=3 {
                progress.send(format!("Step {}", i));
            }
            Ok(3usize)
        });

        let result = ProgressTracker::hidden("Counting").follow(task).unwrap();
        assert_eq!(result, 3);
    }

    #[test]
    fn test_follow_returns_task_error() {
        let pool = WorkerPool::new(1).unwrap();
        let task: Task<()> = pool.spawn("fail", |_| Err(Error::Task("nope".to_string())));
        assert!(ProgressTracker::hidden("Failing").follow(task).is_err());
    }
}
