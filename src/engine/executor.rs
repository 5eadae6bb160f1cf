//! Stage execution: fork-join dispatch with per-system failure isolation.
//!
//! A stage is a set of systems proven mutually non-conflicting at
//! plan-build time, so its members may run concurrently without locks.
//! This module runs one stage:
//!
//! * a **singleton** stage executes inline on the calling thread — pool
//!   dispatch would cost more than it buys,
//! * a **multi-member** stage dispatches each system to the worker pool
//!   and blocks until all complete (fork-join; no partial continuation).
//!
//! No ordering between stage members is assumed or enforced — safety comes
//! entirely from the conflict-freedom proof, never from runtime locking.
//!
//! ## Failure isolation
//!
//! Each dispatched system runs inside its own error boundary. An `Err`
//! from `update` and a panic are both captured as a [`SystemFailure`],
//! logged with the system's identity, stage index, and elapsed time, and
//! turned into data in the stage's reports. One misbehaving system never
//! aborts its siblings or the frame; only infrastructure failure (the pool
//! itself) surfaces as an error, elsewhere.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{error, trace};

use crate::engine::error::SystemFailure;
use crate::engine::stats::SystemReport;
use crate::engine::system::{FrameContext, System};
use crate::engine::world::WorldCell;
use crate::profiling::profiler;


/// Executes one conflict-free stage over the shared worker pool.
pub struct StageExecutor {
    pool: Arc<ThreadPool>,
}

impl StageExecutor {
    /// Creates a stage executor on top of an existing worker pool.
    ///
    /// The pool is the process-wide resource shared with the query
    /// executor; it is created once and reused across all frames.
    pub fn new(pool: Arc<ThreadPool>) -> Self {
        Self { pool }
    }

    /// Runs every member of a stage and reports each outcome.
    ///
    /// Members run concurrently when the stage has more than one; the call
    /// returns only after all members have completed (join barrier).
    /// Reports come back in member order regardless of completion order.
    pub fn run_stage<W: Send>(
        &self,
        stage_index: usize,
        members: &[&dyn System<W>],
        world: &WorldCell<W>,
        ctx: &FrameContext<'_>,
    ) -> Vec<SystemReport> {
        let _span = profiler::span_fmt(format_args!("stage::{stage_index}"))
            .arg("systems", profiler::Arg::U64(members.len() as u64));

        if members.len() == 1 {
            return vec![run_system(stage_index, members[0], world, ctx)];
        }

        self.pool.install(|| {
            members
                .par_iter()
                .map(|system| run_system(stage_index, *system, world, ctx))
                .collect()
        })
    }
}

/// Runs one system inside its own error boundary.
///
/// Shared by the staged path and the sequential fallback so both produce
/// identical reports and identical isolation behavior.
pub(crate) fn run_system<W>(
    stage_index: usize,
    system: &dyn System<W>,
    world: &WorldCell<W>,
    ctx: &FrameContext<'_>,
) -> SystemReport {
    let _span = profiler::span_fmt(format_args!("system::{}", system.name()));
    let started = Instant::now();

    // AssertUnwindSafe: the only state observable across the boundary is
    // the world, and the declared-access contract already governs it.
    let result = catch_unwind(AssertUnwindSafe(|| system.update(world.world_ref(), ctx)));
    let duration = started.elapsed();

    let outcome = match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(SystemFailure::Failed {
            system_id: system.id(),
            name: system.name().to_string(),
            source,
        }),
        Err(payload) => Err(SystemFailure::Panicked {
            system_id: system.id(),
            name: system.name().to_string(),
            message: panic_message(payload),
        }),
    };

    match &outcome {
        Ok(()) => trace!(
            system = system.name(),
            stage = stage_index,
            elapsed_us = duration.as_micros() as u64,
            "system completed"
        ),
        Err(failure) => error!(
            system = system.name(),
            stage = stage_index,
            elapsed_us = duration.as_micros() as u64,
            "{failure}"
        ),
    }

    SystemReport {
        system_id: system.id(),
        name: system.name().to_string(),
        stage: stage_index,
        duration,
        outcome,
    }
}

/// Renders a caught panic payload for logging.
fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "opaque panic payload".to_string()
    }
}
