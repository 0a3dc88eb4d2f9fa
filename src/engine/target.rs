use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Engine-managed per-target state.
///
/// The only flag is `outdated`, which doubles as "must execute this build"
/// before the execute phase and "execute failed" after it. Concrete targets
/// embed one of these and hand it out through [`Target::state`].
#[derive(Debug, Default)]
pub struct TargetState {
    outdated: AtomicBool,
}

impl TargetState {
    pub fn new() -> Self {
        Self::default()
    }

    /// One-way switch: once a target is marked outdated during prepare it
    /// stays outdated. Only the engine clears the flag (at sort time, and on
    /// a successful execute).
    pub fn set_outdated(&self) {
        self.outdated.store(true, Ordering::SeqCst);
    }

    pub fn is_outdated(&self) -> bool {
        self.outdated.load(Ordering::SeqCst)
    }

    pub(crate) fn mark(&self, outdated: bool) {
        self.outdated.store(outdated, Ordering::SeqCst);
    }
}

/// A unit of work in the build graph.
///
/// Targets are created by the caller, wired into a DAG through their
/// predecessor lists, and retained for the duration of the build. Identity is
/// reference identity of the `Arc`; two targets are the same only if they are
/// the same allocation.
///
/// Lifecycle hooks:
///
/// - `prepare` runs once per build from any worker thread and answers "is
///   this target stale?". It may perform I/O and may call `set_outdated` on
///   *other* targets (a fan-in side channel the prepare phase makes visible
///   before staleness is propagated).
/// - `execute` is the payload. It runs on a worker thread strictly after
///   every predecessor executed successfully.
/// - `executed` is the completion report. The scheduler serializes all
///   `executed` calls on one thread, so implementations may print to stdout
///   without locking.
pub trait Target: Send + Sync {
    fn state(&self) -> &TargetState;

    /// Direct predecessors. Duplicates are tolerated and carry no extra
    /// meaning.
    fn predecessors(&self) -> Vec<Arc<dyn Target>>;

    /// Decide staleness. Returning `true` marks this target outdated.
    fn prepare(&self) -> bool {
        false
    }

    /// Do the work. Returning `false` records a failure and stops the
    /// scheduler from offering further targets.
    fn execute(&self) -> bool {
        true
    }

    /// Post-execution notification, serialized on the scheduler thread.
    fn executed(&self) {}
}

/// Pointer-identity key for hashing targets in the engine's marker sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TargetKey(*const ());

impl TargetKey {
    pub(crate) fn of(target: &Arc<dyn Target>) -> Self {
        Self(Arc::as_ptr(target) as *const ())
    }
}
