//! Intra-system parallel iteration over storage chunks.
//!
//! This module parallelizes a *single* system's entity iteration: the
//! storage engine resolves a typed query into a sequence of contiguous
//! chunk views, and the [`QueryExecutor`] distributes those chunks across
//! the worker pool, invoking a per-entity callback (or folding a
//! map-reduce aggregation) with by-reference component access.
//!
//! ## Execution model
//!
//! * The **chunk** is the atomic unit of partitioning. Chunks are never
//!   subdivided, so two workers never touch the same chunk concurrently,
//!   and the mutable column of each chunk is a disjoint `&mut` slice owned
//!   by exactly one worker for the duration of the dispatch.
//! * Dispatch is fork-join: the calling thread blocks until every chunk has
//!   been processed, then returns. No ordering between chunks or workers is
//!   guaranteed.
//! * Degenerate inputs skip the pool entirely: zero matching entities
//!   return immediately, and totals at or below the configured inline
//!   threshold run on the calling thread to avoid dispatch overhead.
//!
//! ## Chunk views
//!
//! [`Chunk1`] through [`Chunk4`] carry one to four component columns over
//! the same rows (reads first, the final column mutable) plus the entity
//! ids for those rows. [`ReadChunk`] is the read-only view used by
//! reductions. The effective row count of a view is the shortest of its
//! slices; well-formed storage produces equal lengths, and the clamp keeps
//! a malformed view from panicking mid-frame.
//!
//! ## Reduction
//!
//! [`QueryExecutor::reduce`] folds a per-worker accumulator across each
//! chunk in parallel, then combines the partial accumulators on the
//! calling thread. The combine operation must be associative; combination
//! order across chunks is unspecified.
//!
//! ## Diagnostics
//!
//! Each executor tracks invocation count, total entities processed, the
//! duration of the last dispatch, and an estimated speed-up (worker busy
//! time over wall time) behind relaxed atomics; see
//! [`QueryExecutor::diagnostics`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use rayon::ThreadPool;

use crate::engine::types::EntityId;
use crate::profiling::profiler;


/// A contiguous batch of entities with one mutable component column.
pub struct Chunk1<'w, A> {
    /// Entity ids for the rows of this chunk.
    pub entities: &'w [EntityId],
    /// Mutable component column.
    pub a: &'w mut [A],
}

impl<A> Chunk1<'_, A> {
    /// Effective row count of this view.
    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len().min(self.a.len())
    }

    /// Returns `true` if the view holds no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A chunk view over two components: one read, one written.
pub struct Chunk2<'w, A, B> {
    /// Entity ids for the rows of this chunk.
    pub entities: &'w [EntityId],
    /// Read-only component column.
    pub a: &'w [A],
    /// Mutable component column.
    pub b: &'w mut [B],
}

impl<A, B> Chunk2<'_, A, B> {
    /// Effective row count of this view.
    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len().min(self.a.len()).min(self.b.len())
    }

    /// Returns `true` if the view holds no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A chunk view over three components: two read, one written.
pub struct Chunk3<'w, A, B, C> {
    /// Entity ids for the rows of this chunk.
    pub entities: &'w [EntityId],
    /// First read-only component column.
    pub a: &'w [A],
    /// Second read-only component column.
    pub b: &'w [B],
    /// Mutable component column.
    pub c: &'w mut [C],
}

impl<A, B, C> Chunk3<'_, A, B, C> {
    /// Effective row count of this view.
    #[inline]
    pub fn len(&self) -> usize {
        self.entities
            .len()
            .min(self.a.len())
            .min(self.b.len())
            .min(self.c.len())
    }

    /// Returns `true` if the view holds no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A chunk view over four components: three read, one written.
pub struct Chunk4<'w, A, B, C, D> {
    /// Entity ids for the rows of this chunk.
    pub entities: &'w [EntityId],
    /// First read-only component column.
    pub a: &'w [A],
    /// Second read-only component column.
    pub b: &'w [B],
    /// Third read-only component column.
    pub c: &'w [C],
    /// Mutable component column.
    pub d: &'w mut [D],
}

impl<A, B, C, D> Chunk4<'_, A, B, C, D> {
    /// Effective row count of this view.
    #[inline]
    pub fn len(&self) -> usize {
        self.entities
            .len()
            .min(self.a.len())
            .min(self.b.len())
            .min(self.c.len())
            .min(self.d.len())
    }

    /// Returns `true` if the view holds no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A read-only chunk view over one component, used by reductions.
pub struct ReadChunk<'w, A> {
    /// Entity ids for the rows of this chunk.
    pub entities: &'w [EntityId],
    /// Read-only component column.
    pub a: &'w [A],
}

impl<A> ReadChunk<'_, A> {
    /// Effective row count of this view.
    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len().min(self.a.len())
    }

    /// Returns `true` if the view holds no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Atomic diagnostic counters of one executor.
#[derive(Default)]
struct QueryStats {
    invocations: AtomicU64,
    entities: AtomicU64,
    last_wall_ns: AtomicU64,
    last_busy_ns: AtomicU64,
}

impl QueryStats {
    fn record(&self, entities: usize, wall: Duration, busy_ns: u64) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        self.entities.fetch_add(entities as u64, Ordering::Relaxed);
        self.last_wall_ns
            .store(wall.as_nanos() as u64, Ordering::Relaxed);
        self.last_busy_ns.store(busy_ns, Ordering::Relaxed);
    }
}

/// Snapshot of an executor's diagnostic counters.
#[derive(Clone, Copy, Debug)]
pub struct QueryDiagnostics {
    /// Number of dispatches performed by this executor.
    pub invocations: u64,

    /// Total entities visited across all dispatches.
    pub entities_processed: u64,

    /// Wall time of the most recent dispatch.
    pub last_duration: Duration,

    /// Worker busy time over wall time for the most recent dispatch; a
    /// value near the pool width means the dispatch scaled, a value near
    /// 1.0 means it did not.
    pub estimated_speedup: f64,
}

/// Parallel executor for one system's entity iteration.
///
/// Executors share the process-wide worker pool through `Arc`, so they are
/// cheap to construct: a system wanting private diagnostics can hold its
/// own executor while still drawing from the same threads as everyone
/// else.
pub struct QueryExecutor {
    pool: Arc<ThreadPool>,
    inline_threshold: usize,
    stats: QueryStats,
}

impl QueryExecutor {
    /// Creates an executor on top of an existing worker pool.
    ///
    /// `inline_threshold` is the entity count at or below which a dispatch
    /// runs on the calling thread instead of the pool.
    pub fn new(pool: Arc<ThreadPool>, inline_threshold: usize) -> Self {
        Self {
            pool,
            inline_threshold,
            stats: QueryStats::default(),
        }
    }

    /// Number of worker threads in the underlying pool.
    pub fn worker_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Shares the underlying pool, e.g. to construct a sibling executor.
    pub(crate) fn pool(&self) -> Arc<ThreadPool> {
        Arc::clone(&self.pool)
    }

    /// Returns a snapshot of this executor's diagnostic counters.
    pub fn diagnostics(&self) -> QueryDiagnostics {
        let wall_ns = self.stats.last_wall_ns.load(Ordering::Relaxed);
        let busy_ns = self.stats.last_busy_ns.load(Ordering::Relaxed);
        QueryDiagnostics {
            invocations: self.stats.invocations.load(Ordering::Relaxed),
            entities_processed: self.stats.entities.load(Ordering::Relaxed),
            last_duration: Duration::from_nanos(wall_ns),
            estimated_speedup: if wall_ns == 0 {
                1.0
            } else {
                busy_ns as f64 / wall_ns as f64
            },
        }
    }

    /// Visits every row of every chunk with mutable access to one
    /// component column.
    ///
    /// ## Returns
    /// The number of entities visited.
    pub fn for_each<A, F>(&self, chunks: Vec<Chunk1<'_, A>>, f: F) -> usize
    where
        A: Send,
        F: Fn(EntityId, &mut A) + Send + Sync,
    {
        let _span = profiler::span("QueryExecutor::for_each");
        self.dispatch(chunks, Chunk1::len, move |mut chunk| {
            let n = chunk.len();
            for i in 0..n {
                f(chunk.entities[i], &mut chunk.a[i]);
            }
        })
    }

    /// Visits every row of every chunk with one read column and one write
    /// column.
    ///
    /// ## Returns
    /// The number of entities visited.
    pub fn for_each2<A, B, F>(&self, chunks: Vec<Chunk2<'_, A, B>>, f: F) -> usize
    where
        A: Sync,
        B: Send,
        F: Fn(EntityId, &A, &mut B) + Send + Sync,
    {
        let _span = profiler::span("QueryExecutor::for_each2");
        self.dispatch(chunks, Chunk2::len, move |mut chunk| {
            let n = chunk.len();
            for i in 0..n {
                f(chunk.entities[i], &chunk.a[i], &mut chunk.b[i]);
            }
        })
    }

    /// Visits every row of every chunk with two read columns and one write
    /// column.
    ///
    /// ## Returns
    /// The number of entities visited.
    pub fn for_each3<A, B, C, F>(&self, chunks: Vec<Chunk3<'_, A, B, C>>, f: F) -> usize
    where
        A: Sync,
        B: Sync,
        C: Send,
        F: Fn(EntityId, &A, &B, &mut C) + Send + Sync,
    {
        let _span = profiler::span("QueryExecutor::for_each3");
        self.dispatch(chunks, Chunk3::len, move |mut chunk| {
            let n = chunk.len();
            for i in 0..n {
                f(chunk.entities[i], &chunk.a[i], &chunk.b[i], &mut chunk.c[i]);
            }
        })
    }

    /// Visits every row of every chunk with three read columns and one
    /// write column.
    ///
    /// ## Returns
    /// The number of entities visited.
    pub fn for_each4<A, B, C, D, F>(&self, chunks: Vec<Chunk4<'_, A, B, C, D>>, f: F) -> usize
    where
        A: Sync,
        B: Sync,
        C: Sync,
        D: Send,
        F: Fn(EntityId, &A, &B, &C, &mut D) + Send + Sync,
    {
        let _span = profiler::span("QueryExecutor::for_each4");
        self.dispatch(chunks, Chunk4::len, move |mut chunk| {
            let n = chunk.len();
            for i in 0..n {
                f(
                    chunk.entities[i],
                    &chunk.a[i],
                    &chunk.b[i],
                    &chunk.c[i],
                    &mut chunk.d[i],
                );
            }
        })
    }

    /// Parallel map-reduce over a read-only component column.
    ///
    /// ## Execution
    /// Each chunk is folded into a fresh accumulator (`init`, then `fold`
    /// per row) on whichever worker picks it up; the partial accumulators
    /// are then combined with `combine` on the calling thread. `combine`
    /// must be associative — combination order is unspecified.
    ///
    /// ## Degenerate cases
    /// Zero matching entities return `init()` immediately; small totals
    /// fold inline without touching the pool.
    pub fn reduce<A, Acc, I, F, C>(
        &self,
        chunks: Vec<ReadChunk<'_, A>>,
        init: I,
        fold: F,
        combine: C,
    ) -> Acc
    where
        A: Sync,
        Acc: Send,
        I: Fn() -> Acc + Send + Sync,
        F: Fn(&mut Acc, EntityId, &A) + Send + Sync,
        C: Fn(&mut Acc, Acc) + Send + Sync,
    {
        let _span = profiler::span("QueryExecutor::reduce");
        let total: usize = chunks.iter().map(ReadChunk::len).sum();
        if total == 0 {
            self.stats.record(0, Duration::ZERO, 0);
            return init();
        }

        let started = Instant::now();
        let busy_ns;
        let mut acc = init();

        if total <= self.inline_threshold {
            for chunk in &chunks {
                let n = chunk.len();
                for i in 0..n {
                    fold(&mut acc, chunk.entities[i], &chunk.a[i]);
                }
            }
            busy_ns = started.elapsed().as_nanos() as u64;
        } else {
            let busy = AtomicU64::new(0);
            let partials: Vec<Acc> = self.pool.install(|| {
                chunks
                    .into_par_iter()
                    .map(|chunk| {
                        let chunk_started = Instant::now();
                        let mut partial = init();
                        let n = chunk.len();
                        for i in 0..n {
                            fold(&mut partial, chunk.entities[i], &chunk.a[i]);
                        }
                        busy.fetch_add(
                            chunk_started.elapsed().as_nanos() as u64,
                            Ordering::Relaxed,
                        );
                        partial
                    })
                    .collect()
            });
            for partial in partials {
                combine(&mut acc, partial);
            }
            busy_ns = busy.load(Ordering::Relaxed);
        }

        self.stats.record(total, started.elapsed(), busy_ns);
        acc
    }

    /// Shared dispatch skeleton for the `for_each` family.
    ///
    /// `len` measures a chunk, `run` consumes it; the split keeps the
    /// degenerate-case handling and the diagnostics in one place.
    fn dispatch<Ch, L, R>(&self, chunks: Vec<Ch>, len: L, run: R) -> usize
    where
        Ch: Send,
        L: Fn(&Ch) -> usize,
        R: Fn(Ch) + Send + Sync,
    {
        let total: usize = chunks.iter().map(&len).sum();
        if total == 0 {
            self.stats.record(0, Duration::ZERO, 0);
            return 0;
        }

        let started = Instant::now();
        let busy_ns;

        if total <= self.inline_threshold {
            for chunk in chunks {
                run(chunk);
            }
            busy_ns = started.elapsed().as_nanos() as u64;
        } else {
            let busy = AtomicU64::new(0);
            self.pool.install(|| {
                chunks.into_par_iter().for_each(|chunk| {
                    let chunk_started = Instant::now();
                    run(chunk);
                    busy.fetch_add(
                        chunk_started.elapsed().as_nanos() as u64,
                        Ordering::Relaxed,
                    );
                });
            });
            busy_ns = busy.load(Ordering::Relaxed);
        }

        self.stats.record(total, started.elapsed(), busy_ns);
        total
    }
}
