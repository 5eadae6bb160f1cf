//! # framesched
//!
//! Parallel stage scheduler for per-frame entity-component simulations.
//!
//! Many independent "systems" must run every tick over a shared world;
//! this crate decides which of them may legally run at the same time and
//! executes them that way:
//!
//! - Each system declares the component types it reads and writes.
//! - A conflict graph over those declarations partitions the systems into
//!   an ordered sequence of conflict-free **stages**.
//! - Each stage runs fork-join over a shared worker pool; a single
//!   system's entity iteration can fan out further through the
//!   [`QueryExecutor`].
//!
//! The concurrency invariant is proved once, at plan-build time, and
//! relied upon every frame — no locks are held during stage or query
//! execution. Declarations are a trusted contract; the engine does not
//! verify that a system touches only its declared types.
//!
//! This crate builds as both:
//! - `rlib` (for Rust usage & integration tests)
//! - `cdylib` (for FFI / DLL usage)

#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![allow(clippy::module_inception)]

pub mod engine;
pub mod profiling;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

// Core scheduling types

pub use engine::scheduler::{
    Scheduler,
    SchedulerConfig,
};

pub use engine::system::{
    FnSystem,
    FrameContext,
    System,
};

pub use engine::world::{
    WorldCell,
    WorldRef,
};

pub use engine::component::{
    component_id_of,
    freeze_components,
    register_component,
    ComponentDesc,
};

pub use engine::types::{
    AccessSets,
    ComponentId,
    ComponentSet,
    EntityId,
    Priority,
    SystemId,
    Tick,
};

pub use engine::graph::{DependencyGraph, SystemMeta};
pub use engine::plan::{ExecutionPlan, Stage};

pub use engine::query::{
    Chunk1,
    Chunk2,
    Chunk3,
    Chunk4,
    QueryDiagnostics,
    QueryExecutor,
    ReadChunk,
};

pub use engine::reduce::{Count, MinMax, Sum, Welford};

pub use engine::stats::{FrameSummary, SystemReport, SystemStats};

pub use engine::error::{
    PlanBuildError,
    PoolError,
    RegistrationError,
    SchedResult,
    SchedulerError,
    SystemError,
    SystemFailure,
    SystemResult,
};

pub use profiling::profiler;

// ─────────────────────────────────────────────────────────────────────────────
// Prelude (Optional but recommended)
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used scheduler types.
///
/// Import with:
/// ```rust
/// use framesched::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        component_id_of,
        freeze_components,
        register_component,
        AccessSets,
        FnSystem,
        FrameContext,
        QueryExecutor,
        Scheduler,
        SchedulerConfig,
        System,
        SystemResult,
        WorldCell,
        WorldRef,
    };
}
