//! Per-system and per-frame execution statistics.
//!
//! Every system run produces a [`SystemReport`]; the reports of one frame
//! are collected into a [`FrameSummary`] and folded into the cumulative
//! [`SystemStats`] held by the registry. Failures are data here, not
//! errors: a failing system is counted and carried in the summary while the
//! frame keeps going.
//!
//! Operators observe scheduler health exclusively through these values and
//! the log events emitted alongside them.

use std::time::Duration;

use crate::engine::error::SystemFailure;
use crate::engine::types::{SystemId, Tick};


/// Outcome of one system's update during one frame.
#[derive(Debug)]
pub struct SystemReport {
    /// Id of the system that ran.
    pub system_id: SystemId,

    /// Name of the system that ran.
    pub name: String,

    /// Stage index the system ran in. In the sequential fallback path each
    /// system counts as its own stage, in run order.
    pub stage: usize,

    /// Wall time spent inside the system's update.
    pub duration: Duration,

    /// `Ok` on success; the captured failure otherwise.
    pub outcome: Result<(), SystemFailure>,
}

/// Typed result of one `run_frame` call.
///
/// Per-system failures are isolated and recovered locally; the summary is
/// where they become visible to the caller.
#[derive(Debug)]
pub struct FrameSummary {
    /// The tick this frame executed.
    pub tick: Tick,

    /// `true` if the frame ran through the staged plan, `false` for the
    /// sequential fallback.
    pub parallel: bool,

    /// Number of stages executed (systems run, for the fallback path).
    pub stage_count: usize,

    /// Wall time of the whole frame.
    pub duration: Duration,

    /// One report per registered system, in execution order.
    pub reports: Vec<SystemReport>,
}

impl FrameSummary {
    /// Number of systems that completed without failure.
    pub fn succeeded(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_ok()).count()
    }

    /// Number of systems that failed or panicked.
    pub fn failed(&self) -> usize {
        self.reports.len() - self.succeeded()
    }
}

/// Cumulative execution counters for one registered system.
#[derive(Clone, Debug, Default)]
pub struct SystemStats {
    /// Total number of update invocations.
    pub calls: u64,

    /// Number of invocations that failed or panicked.
    pub failures: u64,

    /// Duration of the most recent invocation.
    pub last_duration: Duration,

    /// Sum of all invocation durations.
    pub total_duration: Duration,

    /// Rendered message of the most recent failure, if any.
    pub last_error: Option<String>,
}

impl SystemStats {
    /// Folds one report into the counters.
    pub fn record(&mut self, report: &SystemReport) {
        self.calls += 1;
        self.last_duration = report.duration;
        self.total_duration += report.duration;
        if let Err(failure) = &report.outcome {
            self.failures += 1;
            self.last_error = Some(failure.to_string());
        }
    }

    /// Mean duration across all invocations so far.
    pub fn mean_duration(&self) -> Duration {
        if self.calls == 0 {
            Duration::ZERO
        } else {
            self.total_duration / self.calls as u32
        }
    }
}
