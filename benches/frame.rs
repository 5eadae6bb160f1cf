use criterion::*;
use std::hint::black_box;

use framesched::{AccessSets, FnSystem, Scheduler, WorldCell};

mod common;
use common::*;

fn frame_benchmark(c: &mut Criterion) {
    init_components();

    let mut group = c.benchmark_group("frame");

    group.bench_function("tick_2_systems_100k", |b| {
        b.iter_batched(
            || {
                let world = WorldCell::new(BenchWorld::new(AGENTS_MED));

                let mut scheduler = Scheduler::<BenchWorld>::new().unwrap();

                // System 1: position += velocity * dt
                scheduler
                    .register_system(
                        FnSystem::new(
                            1,
                            "motion",
                            AccessSets::new().reads::<Velocity>().writes::<Position>(),
                            |world, ctx| {
                                let dt = ctx.dt;
                                let sim = world.data_mut();
                                ctx.queries.for_each2(sim.motion_chunks(), |_, vel, pos| {
                                    pos.x += vel.dx * dt;
                                    pos.y += vel.dy * dt;
                                });
                                Ok(())
                            },
                        ),
                        10,
                    )
                    .unwrap();

                // System 2: wealth decay
                scheduler
                    .register_system(
                        FnSystem::new(
                            2,
                            "decay",
                            AccessSets::new().writes::<Wealth>(),
                            |world, ctx| {
                                let sim = world.data_mut();
                                ctx.queries.for_each(sim.wealth_chunks(), |_, wealth| {
                                    wealth.value *= 0.9999;
                                });
                                Ok(())
                            },
                        ),
                        20,
                    )
                    .unwrap();

                scheduler.rebuild_execution_plan().unwrap();
                (world, scheduler)
            },
            |(world, mut scheduler)| {
                scheduler.run_frame(&world, 0.016).unwrap();
                black_box(world);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("rebuild_plan_16_systems", |b| {
        b.iter_batched(
            || {
                let mut scheduler = Scheduler::<BenchWorld>::new().unwrap();
                for i in 0..16u16 {
                    let access = if i % 2 == 0 {
                        AccessSets::new().reads::<Velocity>().writes::<Position>()
                    } else {
                        AccessSets::new().writes::<Wealth>()
                    };
                    scheduler
                        .register_system(
                            FnSystem::new(i + 1, "bench_system", access, |_, _| Ok(())),
                            i as i32,
                        )
                        .unwrap();
                }
                scheduler
            },
            |mut scheduler| {
                scheduler.rebuild_execution_plan().unwrap();
                black_box(scheduler.execution_plan());
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, frame_benchmark);
criterion_main!(benches);
