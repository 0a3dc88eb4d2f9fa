mod core;
mod execute;
mod prepare;
mod sorter;
mod target;

pub use self::core::{BuildResult, Builder};
pub use self::target::{Target, TargetState};

/// The engine's only fatal error. Everything else a build can go through is
/// data: it lands on a target's `outdated` flag and is reported through
/// `executed()`.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("cyclic dependency detected in the target graph")]
    CyclicDependency,

    #[error("failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}
