/// Chrome Trace (flame-style) execution profiler.
///
/// This module provides a **feature-gated, zero-overhead (when disabled)**
/// profiling API for the scheduler. When enabled, it records structured
/// execution spans — frames, stages, individual systems, and query
/// dispatches — and emits a **Chrome Trace Event JSON** file that can be
/// inspected using:
///
/// - `chrome://tracing`
/// - <https://ui.perfetto.dev>
///
/// ## Feature flag
///
/// This module is only compiled with full functionality when the
/// `profiling` feature is enabled:
///
/// ```bash
/// cargo test --features profiling
/// ```
///
/// When the feature is disabled, all profiling calls compile to no-ops and
/// impose **zero runtime overhead** (no allocations, no atomics, no
/// branches).
///
/// ## Design notes
///
/// - Spans are recorded using RAII guards (`SpanGuard`)
/// - Events are timestamped using a monotonic clock
/// - Each OS thread is assigned a stable logical thread ID
/// - Output format follows the Chrome Trace `"X"` (complete event)
///   specification
///
/// This profiler is intended for **performance analysis** of stage
/// partitioning quality, fork-join overhead, and query fan-out.
pub mod profiler;
