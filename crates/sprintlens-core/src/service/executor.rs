//! Where metric runs execute.

use std::io;

/// A unit of background work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Schedules runs off the caller's thread.
///
/// The default [`ThreadExecutor`] starts one named OS thread per run. Tests
/// substitute an executor that queues jobs to control interleavings.
pub trait Executor: Send + Sync {
    /// # Errors
    ///
    /// Returns an error when the job could not be scheduled.
    fn execute(&self, job: Job) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadExecutor;

impl Executor for ThreadExecutor {
    fn execute(&self, job: Job) -> io::Result<()> {
        std::thread::Builder::new()
            .name("sprintlens-run".to_string())
            .spawn(job)
            .map(drop)
    }
}
