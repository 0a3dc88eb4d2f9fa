//! # mcx - Incremental Build Tool for Microcontroller C/C++
//!
//! mcx compiles and links C/C++ firmware projects incrementally: it builds a
//! dependency graph of targets, decides which ones are stale, and executes the
//! stale ones in parallel while respecting dependency order.
//!
//! ## Features
//!
//! - **Header-Aware Rebuilds**: A persisted dependency database tracks every
//!   header a source transitively includes; touch one and exactly the right
//!   translation units recompile.
//! - **Parallel Execution**: A bounded worker pool drains the target graph in
//!   dependency order across all CPU cores.
//! - **Fail Fast**: The first failing target stops new work from being
//!   scheduled; in-flight compilations finish and report.
//! - **Cross Toolchain**: Defaults to `arm-none-eabi-*`, overridable per
//!   project or through `CC`/`CXX`/`OBJCOPY`.
//!
//! ## Quick Start
//!
//! ```bash
//! # Build the firmware in the current project
//! mcx build
//!
//! # Release image, four jobs
//! mcx build --release --jobs 4
//! ```
//!
//! ## Module Organization
//!
//! - [`engine`] - Target graph, staleness propagation, parallel executor
//! - [`depend`] - Header dependency database (`.d` files, JSON snapshot)
//! - [`targets`] - Concrete targets: compile, link, firmware image, version
//! - [`project`] - Source discovery and graph assembly
//! - [`config`] - Project manifest parsing (`mcx.toml`)

/// Project manifest parsing (`mcx.toml`).
pub mod config;

/// Header dependency database.
pub mod depend;

/// The incremental build engine.
pub mod engine;

/// Source discovery and build graph assembly.
pub mod project;

/// Concrete build targets (compile, link, firmware image, version stamp).
pub mod targets;

/// Toolchain resolution (compiler, objcopy).
pub mod toolchain;

/// Filesystem helpers shared across modules.
pub mod util;
