use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use framesched::{
    register_component, AccessSets, Chunk1, Chunk2, FrameContext, Scheduler, SchedulerConfig,
    System, SystemError, SystemResult, WorldCell, WorldRef,
};

#[derive(Clone, Copy, Debug, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Clone, Copy)]
struct Velocity {
    dx: f32,
    dy: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Durability(f32);

/// Minimal stand-in for the external storage engine: parallel columns cut
/// into fixed-size chunks.
struct SimWorld {
    entities: Vec<u64>,
    positions: Vec<Position>,
    velocities: Vec<Velocity>,
    durabilities: Vec<Durability>,
    chunk_rows: usize,
}

impl SimWorld {
    fn new(count: usize, chunk_rows: usize) -> Self {
        Self {
            entities: (0..count as u64).collect(),
            positions: vec![Position { x: 0.0, y: 0.0 }; count],
            velocities: (0..count)
                .map(|i| Velocity {
                    dx: (i % 7) as f32 * 0.5,
                    dy: (i % 3) as f32 - 1.0,
                })
                .collect(),
            durabilities: vec![Durability(100.0); count],
            chunk_rows,
        }
    }

    fn motion_chunks(&mut self) -> Vec<Chunk2<'_, Velocity, Position>> {
        self.entities
            .chunks(self.chunk_rows)
            .zip(self.velocities.chunks(self.chunk_rows))
            .zip(self.positions.chunks_mut(self.chunk_rows))
            .map(|((entities, a), b)| Chunk2 { entities, a, b })
            .collect()
    }

    fn wear_chunks(&mut self) -> Vec<Chunk1<'_, Durability>> {
        self.entities
            .chunks(self.chunk_rows)
            .zip(self.durabilities.chunks_mut(self.chunk_rows))
            .map(|(entities, a)| Chunk1 { entities, a })
            .collect()
    }
}

fn init_components() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let _ = register_component::<Position>();
    let _ = register_component::<Velocity>();
    let _ = register_component::<Durability>();
}

struct MotionSystem;

impl System<SimWorld> for MotionSystem {
    fn id(&self) -> u16 {
        1
    }

    fn name(&self) -> &str {
        "motion"
    }

    fn access(&self) -> AccessSets {
        AccessSets::new().reads::<Velocity>().writes::<Position>()
    }

    fn update(&self, world: WorldRef<'_, SimWorld>, ctx: &FrameContext<'_>) -> SystemResult {
        let dt = ctx.dt;
        let sim = world.data_mut();
        ctx.queries.for_each2(sim.motion_chunks(), |_, vel, pos| {
            pos.x += vel.dx * dt;
            pos.y += vel.dy * dt;
        });
        Ok(())
    }
}

struct WearSystem;

impl System<SimWorld> for WearSystem {
    fn id(&self) -> u16 {
        2
    }

    fn name(&self) -> &str {
        "wear"
    }

    fn access(&self) -> AccessSets {
        AccessSets::new().writes::<Durability>()
    }

    fn update(&self, world: WorldRef<'_, SimWorld>, ctx: &FrameContext<'_>) -> SystemResult {
        let dt = ctx.dt;
        let sim = world.data_mut();
        ctx.queries.for_each(sim.wear_chunks(), |_, durability| {
            durability.0 -= 0.25 * dt;
        });
        Ok(())
    }
}

struct FailingSystem;

impl System<SimWorld> for FailingSystem {
    fn id(&self) -> u16 {
        10
    }

    fn name(&self) -> &str {
        "sensor"
    }

    fn access(&self) -> AccessSets {
        AccessSets::new().reads::<Position>()
    }

    fn update(&self, _world: WorldRef<'_, SimWorld>, _ctx: &FrameContext<'_>) -> SystemResult {
        Err(SystemError::msg("sensor offline"))
    }
}

struct PanickingSystem;

impl System<SimWorld> for PanickingSystem {
    fn id(&self) -> u16 {
        11
    }

    fn name(&self) -> &str {
        "unstable"
    }

    fn access(&self) -> AccessSets {
        AccessSets::new().reads::<Position>()
    }

    fn update(&self, _world: WorldRef<'_, SimWorld>, _ctx: &FrameContext<'_>) -> SystemResult {
        panic!("lost calibration");
    }
}

struct CountingSystem {
    id: u16,
    calls: Arc<AtomicU64>,
}

impl System<SimWorld> for CountingSystem {
    fn id(&self) -> u16 {
        self.id
    }

    fn name(&self) -> &str {
        "counter"
    }

    fn access(&self) -> AccessSets {
        AccessSets::new()
    }

    fn update(&self, _world: WorldRef<'_, SimWorld>, _ctx: &FrameContext<'_>) -> SystemResult {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[test]
fn fallback_matches_staged_execution() {
    init_components();

    let frames = 8;
    let dt = 0.25;

    // No rebuild: every frame takes the sequential fallback.
    let fallback_world = WorldCell::new(SimWorld::new(4_000, 256));
    let mut fallback = Scheduler::new().unwrap();
    fallback.register_system(MotionSystem, 10).unwrap();
    fallback.register_system(WearSystem, 20).unwrap();
    assert!(fallback.execution_plan().is_none());
    for _ in 0..frames {
        let summary = fallback.run_frame(&fallback_world, dt).unwrap();
        assert!(!summary.parallel);
    }

    // Explicit rebuild: every frame runs the staged plan.
    let staged_world = WorldCell::new(SimWorld::new(4_000, 256));
    let mut staged = Scheduler::new().unwrap();
    staged.register_system(MotionSystem, 10).unwrap();
    staged.register_system(WearSystem, 20).unwrap();
    staged.rebuild_execution_plan().unwrap();
    for _ in 0..frames {
        let summary = staged.run_frame(&staged_world, dt).unwrap();
        assert!(summary.parallel);
    }

    // Same per-entity arithmetic either way, so the end states are
    // bitwise identical; only the concurrency differed.
    let a = fallback_world.into_inner();
    let b = staged_world.into_inner();
    assert_eq!(a.positions, b.positions);
    assert_eq!(a.durabilities, b.durabilities);
}

#[test]
fn failing_system_does_not_stall_the_frame() {
    init_components();

    let world = WorldCell::new(SimWorld::new(1_000, 128));
    let calls = Arc::new(AtomicU64::new(0));

    let mut scheduler = Scheduler::new().unwrap();
    scheduler.register_system(MotionSystem, 10).unwrap();
    scheduler.register_system(FailingSystem, 20).unwrap();
    scheduler
        .register_system(
            CountingSystem {
                id: 30,
                calls: Arc::clone(&calls),
            },
            30,
        )
        .unwrap();
    scheduler.rebuild_execution_plan().unwrap();

    for _ in 0..5 {
        let summary = scheduler.run_frame(&world, 0.016).unwrap();
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.succeeded(), 2);
    }

    // Every sibling ran every frame despite the failures.
    assert_eq!(calls.load(Ordering::Relaxed), 5);

    let sensor = scheduler.stats(10).unwrap();
    assert_eq!(sensor.calls, 5);
    assert_eq!(sensor.failures, 5);
    assert!(sensor.last_error.unwrap().contains("sensor offline"));

    let motion = scheduler.stats(1).unwrap();
    assert_eq!(motion.calls, 5);
    assert_eq!(motion.failures, 0);
}

#[test]
fn panicking_system_is_isolated() {
    init_components();

    let world = WorldCell::new(SimWorld::new(100, 32));
    let calls = Arc::new(AtomicU64::new(0));

    let mut scheduler = Scheduler::new().unwrap();
    scheduler.register_system(PanickingSystem, 10).unwrap();
    scheduler
        .register_system(
            CountingSystem {
                id: 30,
                calls: Arc::clone(&calls),
            },
            20,
        )
        .unwrap();
    scheduler.rebuild_execution_plan().unwrap();

    for _ in 0..3 {
        let summary = scheduler.run_frame(&world, 0.016).unwrap();
        assert_eq!(summary.failed(), 1);
    }

    assert_eq!(calls.load(Ordering::Relaxed), 3);

    let unstable = scheduler.stats(11).unwrap();
    assert_eq!(unstable.failures, 3);
    assert!(unstable.last_error.unwrap().contains("lost calibration"));
}

#[test]
fn dirtied_plan_is_rebuilt_before_the_next_frame() {
    init_components();

    let world = WorldCell::new(SimWorld::new(500, 64));
    let mut scheduler = Scheduler::new().unwrap();
    scheduler.register_system(MotionSystem, 10).unwrap();
    scheduler.rebuild_execution_plan().unwrap();
    scheduler.run_frame(&world, 0.016).unwrap();

    // Registering after a successful build dirties the plan; the next
    // frame rebuilds lazily and already includes the new system.
    scheduler.register_system(WearSystem, 20).unwrap();
    let summary = scheduler.run_frame(&world, 0.016).unwrap();
    assert!(summary.parallel);
    assert_eq!(summary.reports.len(), 2);
    assert!(summary.reports.iter().any(|r| r.name == "wear"));

    let plan = scheduler.execution_plan().unwrap();
    assert!(plan.iter().flatten().any(|name| name == "wear"));
}

#[test]
fn disabling_parallelism_forces_sequential_frames() {
    init_components();

    let world = WorldCell::new(SimWorld::new(200, 64));
    let mut scheduler =
        Scheduler::with_config(SchedulerConfig::new().with_parallel(false)).unwrap();
    scheduler.register_system(MotionSystem, 10).unwrap();
    scheduler.register_system(WearSystem, 20).unwrap();
    scheduler.rebuild_execution_plan().unwrap();

    let summary = scheduler.run_frame(&world, 0.5).unwrap();
    assert!(!summary.parallel);
    assert_eq!(summary.reports.len(), 2);

    // The fallback still runs the systems for real.
    let sim = world.into_inner();
    assert!(sim.positions.iter().skip(1).any(|p| *p != Position { x: 0.0, y: 0.0 }));
}

#[test]
fn frame_summaries_carry_ticks_and_reports() {
    init_components();

    let world = WorldCell::new(SimWorld::new(100, 32));
    let mut scheduler = Scheduler::new().unwrap();
    scheduler.register_system(MotionSystem, 10).unwrap();
    scheduler.rebuild_execution_plan().unwrap();

    let first = scheduler.run_frame(&world, 0.016).unwrap();
    let second = scheduler.run_frame(&world, 0.016).unwrap();
    assert_eq!(first.tick, 1);
    assert_eq!(second.tick, 2);
    assert_eq!(first.reports.len(), 1);
    assert_eq!(first.reports[0].name, "motion");
    assert!(first.reports[0].outcome.is_ok());

    let stats = scheduler.stats(1).unwrap();
    assert_eq!(stats.calls, 2);
    assert!(stats.mean_duration() <= stats.total_duration);
}

#[test]
fn register_fn_variant_schedules_like_a_trait_system() {
    init_components();

    let world = WorldCell::new(SimWorld::new(300, 64));
    let mut scheduler = Scheduler::new().unwrap();
    scheduler.register_system(MotionSystem, 10).unwrap();
    scheduler
        .register_fn(
            40,
            "decay",
            20,
            AccessSets::new().writes::<Durability>(),
            |world, ctx| {
                let dt = ctx.dt;
                let sim = world.data_mut();
                ctx.queries.for_each(sim.wear_chunks(), |_, durability| {
                    durability.0 *= 1.0 - 0.5 * dt;
                });
                Ok(())
            },
        )
        .unwrap();
    scheduler.rebuild_execution_plan().unwrap();

    let summary = scheduler.run_frame(&world, 0.1).unwrap();
    assert_eq!(summary.failed(), 0);

    let sim = world.into_inner();
    assert!(sim.durabilities.iter().all(|d| d.0 < 100.0));
}
