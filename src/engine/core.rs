use crate::engine::target::Target;
use crate::engine::{execute, prepare, sorter, BuildError};
use std::sync::Arc;

/// Outcome of a build: how many targets were stale and how many of them
/// executed successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildResult {
    pub total_jobs: usize,
    pub completed_jobs: usize,
}

impl BuildResult {
    pub fn none() -> Self {
        Self {
            total_jobs: 0,
            completed_jobs: 0,
        }
    }

    pub fn success(&self) -> bool {
        self.total_jobs == self.completed_jobs
    }
}

type ExecutingCallback = Box<dyn Fn(usize) + Send>;

/// The build facade: sort, prepare, execute.
///
/// ```no_run
/// use mcx::engine::Builder;
///
/// let mut builder = Builder::new();
/// builder.set_max_threads(4);
/// builder.on_executing(|jobs| println!("Building {jobs} targets..."));
/// # let root: Option<std::sync::Arc<dyn mcx::engine::Target>> = None;
/// let result = builder.execute(root).unwrap();
/// assert!(result.success());
/// ```
pub struct Builder {
    max_threads: usize,
    on_executing: Option<ExecutingCallback>,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            max_threads: num_cpus::get(),
            on_executing: None,
        }
    }

    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    /// Set the worker cap, clamped to `[1, hardware cores]`.
    pub fn set_max_threads(&mut self, max_threads: usize) {
        self.max_threads = max_threads.clamp(1, num_cpus::get());
    }

    /// Register a callback fired between prepare and execute with the number
    /// of jobs about to run, so the caller can size progress reporting.
    pub fn on_executing(&mut self, callback: impl Fn(usize) + Send + 'static) {
        self.on_executing = Some(Box::new(callback));
    }

    /// Run a full build of the graph rooted at `root`.
    ///
    /// An absent root, like a graph with nothing outdated, is a no-op build
    /// reported as `{0, 0}`. A cyclic graph fails before any target hook
    /// runs; every other failure lands on a target's `outdated` flag and is
    /// reflected in the returned counts.
    pub fn execute(&self, root: Option<Arc<dyn Target>>) -> Result<BuildResult, BuildError> {
        let root = match root {
            Some(root) => root,
            None => return Ok(BuildResult::none()),
        };

        let sorted = sorter::sort(&root)?;
        let outdated = prepare::run(self.max_threads, &sorted)?;
        if outdated.is_empty() {
            return Ok(BuildResult::none());
        }

        let total_jobs = outdated.len();
        if let Some(callback) = &self.on_executing {
            callback(total_jobs);
        }

        let completed_jobs = execute::run(self.max_threads, outdated);
        Ok(BuildResult {
            total_jobs,
            completed_jobs,
        })
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}
