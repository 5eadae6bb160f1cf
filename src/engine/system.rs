//! System abstractions: the per-frame unit of scheduled logic.
//!
//! A **system** is a unit of logic that operates over the world once per
//! frame. Systems:
//! - declare which components they read and write,
//! - are scheduled into stages based on access conflicts,
//! - may be executed sequentially or in parallel,
//! - operate through a controlled [`WorldRef`] rather than direct world
//!   access.
//!
//! ## Scheduling Model
//!
//! Systems are scheduled by the engine using their declared access sets:
//!
//! - Systems with *non-conflicting* access may share a stage and run in
//!   parallel.
//! - Systems with conflicting access are serialized across stages, in
//!   priority order.
//! - A system that opts out of parallelism (`allows_parallel() == false`)
//!   always runs alone in its own stage.
//!
//! ## System Trait
//!
//! The [`System`] trait defines the minimal capability interface required
//! for execution: a stable id, a name for logs, the access declaration, the
//! parallel-eligibility flag, and the fallible [`System::update`] entry
//! point. All systems must be `Send + Sync` so they can be dispatched to
//! worker threads.
//!
//! ## Function-backed Systems
//!
//! [`FnSystem`] defines systems from closures or functions without a
//! dedicated type. This is the preferred mechanism for most simulation
//! logic, as it avoids boilerplate while remaining fully schedulable.
//!
//! ## Trust
//!
//! The declared access sets are a contract: the engine relies on them to
//! prove stage safety but never verifies that `update` stays inside them.
//! An undeclared access is an undetected correctness bug.

use std::marker::PhantomData;

use crate::engine::error::SystemResult;
use crate::engine::query::QueryExecutor;
use crate::engine::types::{AccessSets, SystemId, Tick};
use crate::engine::world::WorldRef;


/// Per-frame inputs handed to every system.
///
/// Besides the timestep, the context carries a borrow of the shared
/// [`QueryExecutor`] so systems can fan their own entity iteration out
/// across the worker pool.
pub struct FrameContext<'a> {
    /// Seconds elapsed since the previous frame.
    pub dt: f32,

    /// Monotonic frame counter.
    pub tick: Tick,

    /// Intra-system parallel iteration, backed by the shared worker pool.
    pub queries: &'a QueryExecutor,
}

/// A unit of executable logic operating on the world.
///
/// A `System` represents a scheduled computation that:
/// - declares which components it reads and writes,
/// - can be ordered and parallelized based on access conflicts,
/// - is executed once per frame with a shared reference to the world.
///
/// `W` is the storage engine's world type; the scheduler is generic over it
/// and never inspects it.
pub trait System<W>: Send + Sync {
    /// Returns the unique identifier of this system.
    fn id(&self) -> SystemId;

    /// Returns the human-readable name used in logs and plan listings.
    fn name(&self) -> &str;

    /// Returns the component access sets declared by this system.
    fn access(&self) -> AccessSets;

    /// Returns `false` if this system must run alone in its own stage.
    ///
    /// Non-parallel systems conflict with every other system by definition,
    /// which forces the plan builder to give them a singleton stage.
    fn allows_parallel(&self) -> bool {
        true
    }

    /// Executes the system logic against the world.
    ///
    /// Failures are isolated by the stage executor: an `Err` (or a panic)
    /// is captured, logged, and counted, and does not affect sibling
    /// systems or abort the frame.
    fn update(&self, world: WorldRef<'_, W>, ctx: &FrameContext<'_>) -> SystemResult;
}

/// A concrete [`System`] backed by a function or closure.
///
/// `FnSystem` stores:
/// - a system id and human-readable name,
/// - declared component access used for scheduling,
/// - the parallel-eligibility flag,
/// - and the executable function itself.
pub struct FnSystem<W, F>
where
    F: Fn(WorldRef<'_, W>, &FrameContext<'_>) -> SystemResult + Send + Sync,
{
    id: SystemId,
    name: &'static str,
    access: AccessSets,
    parallel: bool,
    f: F,
    _world: PhantomData<fn(&W)>,
}

impl<W, F> FnSystem<W, F>
where
    F: Fn(WorldRef<'_, W>, &FrameContext<'_>) -> SystemResult + Send + Sync,
{
    /// Creates a new function-backed system.
    ///
    /// # Parameters
    /// - `id`: Unique identifier for the system.
    /// - `name`: Human-readable name, used in logs and plan listings.
    /// - `access`: Declared component access used for scheduling.
    /// - `f`: The function or closure executed when the system runs.
    pub fn new(id: SystemId, name: &'static str, access: AccessSets, f: F) -> Self {
        Self {
            id,
            name,
            access,
            parallel: true,
            f,
            _world: PhantomData,
        }
    }

    /// Creates a function-backed system that must run alone in its stage.
    ///
    /// Use this for systems whose effects cannot be captured by component
    /// access sets (e.g. ones touching external state).
    pub fn exclusive(id: SystemId, name: &'static str, access: AccessSets, f: F) -> Self {
        Self {
            id,
            name,
            access,
            parallel: false,
            f,
            _world: PhantomData,
        }
    }
}

impl<W, F> System<W> for FnSystem<W, F>
where
    F: Fn(WorldRef<'_, W>, &FrameContext<'_>) -> SystemResult + Send + Sync,
{
    fn id(&self) -> SystemId {
        self.id
    }

    fn name(&self) -> &str {
        self.name
    }

    fn access(&self) -> AccessSets {
        self.access
    }

    fn allows_parallel(&self) -> bool {
        self.parallel
    }

    fn update(&self, world: WorldRef<'_, W>, ctx: &FrameContext<'_>) -> SystemResult {
        (self.f)(world, ctx)
    }
}
