//! System registry and per-frame execution driver.
//!
//! The scheduler owns the registered systems and everything derived from
//! them: the conflict graph, the cached execution plan, the process-wide
//! worker pool, and per-system statistics. The owning application calls
//! [`Scheduler::run_frame`] once per simulation tick.
//!
//! ## Plan lifecycle
//!
//! The cached plan is an explicit two-state value: *no plan* or *built
//! plan*.
//!
//! * Registering a system marks the cached state dirty; a duplicate id is
//!   rejected without touching it.
//! * [`Scheduler::rebuild_execution_plan`] derives the conflict graph and
//!   the stage partition, and swaps both in only once fully built —
//!   partial plans are never observable.
//! * Before the first successful rebuild, and whenever parallelism is
//!   globally disabled, [`Scheduler::run_frame`] falls back to running
//!   every system sequentially in priority order, with the same
//!   per-system failure isolation as the staged path.
//! * Once a plan exists, a dirtied registry is rebuilt lazily at the start
//!   of the next frame; an unchanged registry reuses the cached plan every
//!   frame.
//!
//! ## Worker pool
//!
//! The pool is created once at scheduler construction (default size =
//! available hardware parallelism, configurable) and shared by the stage
//! executor and the query executor for the scheduler's whole lifetime.
//! Failure to create it is the one fatal error and propagates to the
//! caller; there is no safe fallback without a pool.

use std::sync::Arc;
use std::time::Instant;

use rayon::ThreadPoolBuilder;
use tracing::{debug, trace};

use crate::engine::error::{PoolError, RegistrationError, SchedResult};
use crate::engine::executor::{run_system, StageExecutor};
use crate::engine::graph::{DependencyGraph, SystemMeta};
use crate::engine::plan::{build_plan, ExecutionPlan};
use crate::engine::query::QueryExecutor;
use crate::engine::stats::{FrameSummary, SystemReport, SystemStats};
use crate::engine::system::{FnSystem, FrameContext, System};
use crate::engine::types::{AccessSets, Priority, SystemId, Tick};
use crate::engine::world::{WorldCell, WorldRef};
use crate::profiling::profiler;


/// Tuning knobs of a scheduler instance.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Worker pool size; `None` uses the available hardware parallelism.
    pub worker_threads: Option<usize>,

    /// Global switch: `false` forces sequential execution of every frame,
    /// regardless of the cached plan.
    pub parallel: bool,

    /// Entity count at or below which a query dispatch runs inline on the
    /// calling thread.
    pub inline_threshold: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            parallel: true,
            inline_threshold: 128,
        }
    }
}

impl SchedulerConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the worker pool size.
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }

    /// Enables or disables parallel execution globally.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Overrides the query inline threshold.
    pub fn with_inline_threshold(mut self, threshold: usize) -> Self {
        self.inline_threshold = threshold;
        self
    }
}

/// One registered system with its registry-side metadata.
struct SystemEntry<W: 'static> {
    system: Box<dyn System<W>>,
    priority: Priority,
    stats: SystemStats,
}

/// Owns registered systems and drives per-frame execution.
///
/// `W` is the storage engine's world type; the scheduler is generic over
/// it and never inspects it.
pub struct Scheduler<W: 'static> {
    entries: Vec<SystemEntry<W>>,
    graph: Option<DependencyGraph>,
    plan: Option<ExecutionPlan>,
    dirty: bool,
    tick: Tick,
    config: SchedulerConfig,
    stages: StageExecutor,
    queries: QueryExecutor,
}

impl<W: Send + 'static> Scheduler<W> {
    /// Creates a scheduler with the default configuration.
    ///
    /// ## Errors
    /// Returns [`SchedulerError::Pool`](crate::engine::error::SchedulerError::Pool)
    /// if the worker pool cannot be created.
    pub fn new() -> SchedResult<Self> {
        Self::with_config(SchedulerConfig::default())
    }

    /// Creates a scheduler with an explicit configuration.
    ///
    /// The worker pool is built here, once, and shared by stage and query
    /// execution for the scheduler's lifetime.
    pub fn with_config(config: SchedulerConfig) -> SchedResult<Self> {
        let mut builder = ThreadPoolBuilder::new();
        if let Some(threads) = config.worker_threads {
            builder = builder.num_threads(threads);
        }
        let pool = Arc::new(
            builder
                .build()
                .map_err(|e| PoolError { reason: e.to_string() })?,
        );

        Ok(Self {
            entries: Vec::new(),
            graph: None,
            plan: None,
            dirty: false,
            tick: 0,
            stages: StageExecutor::new(Arc::clone(&pool)),
            queries: QueryExecutor::new(pool, config.inline_threshold),
            config,
        })
    }

    /// Number of registered systems.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no systems are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds a system to the registry.
    ///
    /// Lower `priority` runs earlier; ties are broken by registration
    /// order. Registering marks the cached plan dirty.
    ///
    /// ## Errors
    /// Rejects a duplicate system id; the registry and the cached plan are
    /// left untouched.
    pub fn register_system(
        &mut self,
        system: impl System<W> + 'static,
        priority: Priority,
    ) -> SchedResult<SystemId> {
        let id = system.id();
        if let Some(existing) = self.entries.iter().find(|entry| entry.system.id() == id) {
            return Err(RegistrationError {
                system_id: id,
                existing_name: existing.system.name().to_string(),
            }
            .into());
        }

        debug!(system = system.name(), id, priority, "system registered");
        self.entries.push(SystemEntry {
            system: Box::new(system),
            priority,
            stats: SystemStats::default(),
        });
        self.dirty = true;
        Ok(id)
    }

    /// Registers a closure-backed parallel system, exposing its read/write
    /// sets directly.
    pub fn register_fn<F>(
        &mut self,
        id: SystemId,
        name: &'static str,
        priority: Priority,
        access: AccessSets,
        f: F,
    ) -> SchedResult<SystemId>
    where
        F: Fn(WorldRef<'_, W>, &FrameContext<'_>) -> crate::engine::error::SystemResult
            + Send
            + Sync
            + 'static,
    {
        self.register_system(FnSystem::new(id, name, access, f), priority)
    }

    /// Registers a closure-backed system that must run alone in its stage.
    pub fn register_fn_exclusive<F>(
        &mut self,
        id: SystemId,
        name: &'static str,
        priority: Priority,
        access: AccessSets,
        f: F,
    ) -> SchedResult<SystemId>
    where
        F: Fn(WorldRef<'_, W>, &FrameContext<'_>) -> crate::engine::error::SystemResult
            + Send
            + Sync
            + 'static,
    {
        self.register_system(FnSystem::exclusive(id, name, access, f), priority)
    }

    fn metas(&self) -> Vec<SystemMeta> {
        self.entries
            .iter()
            .map(|entry| SystemMeta {
                id: entry.system.id(),
                priority: entry.priority,
                access: entry.system.access(),
                allows_parallel: entry.system.allows_parallel(),
            })
            .collect()
    }

    /// Recomputes the conflict graph and the stage partition.
    ///
    /// The new plan replaces the cached one only once fully built and
    /// validated; on error the previous state is kept unchanged.
    pub fn rebuild_execution_plan(&mut self) -> SchedResult<()> {
        let metas = self.metas();
        let graph = DependencyGraph::build(&metas);
        let plan = build_plan(&metas, &graph)?;

        debug!(
            systems = plan.system_count(),
            stages = plan.stage_count(),
            conflicts = graph.conflict_pairs().len(),
            "execution plan rebuilt"
        );

        self.graph = Some(graph);
        self.plan = Some(plan);
        self.dirty = false;
        Ok(())
    }

    /// Executes one simulation frame.
    ///
    /// Runs the cached plan stage by stage when one exists; with no plan,
    /// or with parallelism globally disabled, runs every system
    /// sequentially in priority order with identical failure isolation.
    /// A dirtied registry with an existing plan is rebuilt lazily before
    /// the frame starts.
    ///
    /// ## Errors
    /// Only plan validation on a lazy rebuild can fail here (defensive);
    /// per-system failures are reported through the returned
    /// [`FrameSummary`], never as an `Err`.
    pub fn run_frame(&mut self, world: &WorldCell<W>, dt: f32) -> SchedResult<FrameSummary> {
        self.tick += 1;
        let _span = profiler::span_fmt(format_args!("frame::{}", self.tick));

        if self.config.parallel && self.plan.is_some() && self.dirty {
            self.rebuild_execution_plan()?;
        }

        let summary = if self.config.parallel && self.plan.is_some() {
            self.run_staged(world, dt)
        } else {
            self.run_sequential(world, dt)
        };

        trace!(
            tick = summary.tick,
            parallel = summary.parallel,
            stages = summary.stage_count,
            failed = summary.failed(),
            elapsed_us = summary.duration.as_micros() as u64,
            "frame complete"
        );

        for report in &summary.reports {
            if let Some(entry) = self
                .entries
                .iter_mut()
                .find(|entry| entry.system.id() == report.system_id)
            {
                entry.stats.record(report);
            }
        }

        Ok(summary)
    }

    fn run_staged(&self, world: &WorldCell<W>, dt: f32) -> FrameSummary {
        let started = Instant::now();
        let ctx = FrameContext {
            dt,
            tick: self.tick,
            queries: &self.queries,
        };

        let mut reports: Vec<SystemReport> = Vec::with_capacity(self.entries.len());
        let mut stage_count = 0;

        if let Some(plan) = &self.plan {
            for (stage_index, stage) in plan.stages().iter().enumerate() {
                let members: Vec<&dyn System<W>> = stage
                    .members
                    .iter()
                    .map(|&index| self.entries[index].system.as_ref())
                    .collect();
                reports.extend(self.stages.run_stage(stage_index, &members, world, &ctx));
            }
            stage_count = plan.stage_count();
        }

        FrameSummary {
            tick: self.tick,
            parallel: true,
            stage_count,
            duration: started.elapsed(),
            reports,
        }
    }

    fn run_sequential(&self, world: &WorldCell<W>, dt: f32) -> FrameSummary {
        let started = Instant::now();
        let ctx = FrameContext {
            dt,
            tick: self.tick,
            queries: &self.queries,
        };

        let mut order: Vec<usize> = (0..self.entries.len()).collect();
        order.sort_by_key(|&index| (self.entries[index].priority, index));

        let reports: Vec<SystemReport> = order
            .iter()
            .enumerate()
            .map(|(position, &index)| {
                run_system(position, self.entries[index].system.as_ref(), world, &ctx)
            })
            .collect();

        FrameSummary {
            tick: self.tick,
            parallel: false,
            stage_count: reports.len(),
            duration: started.elapsed(),
            reports,
        }
    }

    /// Returns the cached plan as stage-ordered lists of system names.
    ///
    /// `None` while the scheduler is in the no-plan state.
    pub fn execution_plan(&self) -> Option<Vec<Vec<String>>> {
        self.plan.as_ref().map(|plan| {
            plan.stages()
                .iter()
                .map(|stage| {
                    stage
                        .members
                        .iter()
                        .map(|&index| self.entries[index].system.name().to_string())
                        .collect()
                })
                .collect()
        })
    }

    /// Returns the conflict graph of the last successful rebuild.
    pub fn dependency_graph(&self) -> Option<&DependencyGraph> {
        self.graph.as_ref()
    }

    /// Lists the conflicting system pairs of the last successful rebuild.
    pub fn conflict_pairs(&self) -> Vec<(SystemId, SystemId)> {
        self.graph
            .as_ref()
            .map(DependencyGraph::conflict_pairs)
            .unwrap_or_default()
    }

    /// Returns the cumulative stats of one system.
    pub fn stats(&self, system_id: SystemId) -> Option<SystemStats> {
        self.entries
            .iter()
            .find(|entry| entry.system.id() == system_id)
            .map(|entry| entry.stats.clone())
    }

    /// Returns `(id, name, stats)` for every registered system.
    pub fn all_stats(&self) -> Vec<(SystemId, String, SystemStats)> {
        self.entries
            .iter()
            .map(|entry| {
                (
                    entry.system.id(),
                    entry.system.name().to_string(),
                    entry.stats.clone(),
                )
            })
            .collect()
    }

    /// The shared query executor handed to systems through
    /// [`FrameContext`].
    pub fn queries(&self) -> &QueryExecutor {
        &self.queries
    }

    /// Creates a fresh query executor on the shared pool.
    ///
    /// Use this when a system wants diagnostics of its own instead of the
    /// shared, aggregated counters.
    pub fn query_executor(&self) -> QueryExecutor {
        QueryExecutor::new(self.queries.pool(), self.config.inline_threshold)
    }

    /// The configuration this scheduler was built with.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }
}
