//! Error types for system registration, plan construction, and execution.
//!
//! This module declares focused, composable error types used across the
//! scheduler. Each error carries enough context to make failures actionable
//! while remaining small and cheap to pass around or convert into the
//! aggregate [`SchedulerError`].
//!
//! ## Goals
//! * **Specificity:** Each error type models a single failure mode (e.g.
//!   duplicate system ids, a stage that violates the no-conflict invariant,
//!   a worker pool that failed to start).
//! * **Ergonomics:** All errors implement [`std::error::Error`] and
//!   [`fmt::Display`], and provide `From<T>` conversions into the aggregate.
//! * **Actionability:** Structured fields (offending system ids and names,
//!   stage indices) make logs useful without reproducing the issue.
//!
//! ## Propagation policy
//! Per-system failures during a frame are **not** errors at this level:
//! they are captured as [`SystemFailure`] values inside the frame summary
//! and never abort siblings or the frame (fail-open). Only
//! infrastructure-level failures — the worker pool failing to start —
//! surface through `Result` to the caller.
//!
//! ## Display vs. Debug
//! * [`fmt::Display`] is optimized for operator logs (short, imperative
//!   phrasing).
//! * [`fmt::Debug`] (derived) retains full structure for diagnostics.

use std::fmt;

use crate::engine::types::SystemId;


/// Returned when a system cannot be added to the registry because another
/// system with the same id is already registered.
///
/// Registration is rejected atomically: the registry and the cached plan
/// are left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationError {
    /// The id that was already taken.
    pub system_id: SystemId,

    /// Name of the system currently holding the id.
    pub existing_name: String,
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "system id {} already registered (held by '{}')",
            self.system_id, self.existing_name
        )
    }
}

impl std::error::Error for RegistrationError {}

/// Returned when a freshly built execution plan fails validation.
///
/// The greedy builder always terminates (a system can always open a new
/// stage), so these variants are a defensive path: they indicate a bug in
/// stage placement, not a user error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanBuildError {
    /// Two systems sharing a stage have conflicting access sets.
    ConflictWithinStage {
        /// Index of the offending stage.
        stage: usize,
        /// First member of the conflicting pair.
        first: SystemId,
        /// Second member of the conflicting pair.
        second: SystemId,
    },

    /// A system with `allows_parallel() == false` shares a stage.
    ExclusiveNotSingleton {
        /// Index of the offending stage.
        stage: usize,
        /// The non-parallel system.
        system: SystemId,
    },

    /// Two conflicting systems are staged against their priority order.
    StageOrderViolation {
        /// The system that should run earlier.
        earlier: SystemId,
        /// The system that should run later.
        later: SystemId,
    },
}

impl fmt::Display for PlanBuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanBuildError::ConflictWithinStage { stage, first, second } => write!(
                f,
                "stage {stage} holds conflicting systems {first} and {second}"
            ),
            PlanBuildError::ExclusiveNotSingleton { stage, system } => write!(
                f,
                "non-parallel system {system} shares stage {stage}"
            ),
            PlanBuildError::StageOrderViolation { earlier, later } => write!(
                f,
                "conflicting systems {earlier} and {later} staged against priority order"
            ),
        }
    }
}

impl std::error::Error for PlanBuildError {}

/// Error reported by a system's own update logic.
///
/// Systems return whatever error type suits them; the scheduler only needs
/// something displayable to log and count. `SystemError` boxes the source
/// and offers cheap conversions from strings for ad-hoc failures.
#[derive(Debug)]
pub struct SystemError(Box<dyn std::error::Error + Send + Sync>);

impl SystemError {
    /// Wraps an arbitrary error value.
    pub fn new(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self(source.into())
    }

    /// Creates an error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self(message.into().into())
    }
}

impl fmt::Display for SystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for SystemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.0)
    }
}

impl From<String> for SystemError {
    fn from(message: String) -> Self {
        Self::msg(message)
    }
}

impl From<&str> for SystemError {
    fn from(message: &str) -> Self {
        Self::msg(message)
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for SystemError {
    fn from(source: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self(source)
    }
}

/// Result type returned by a system's `update`.
pub type SystemResult = Result<(), SystemError>;

/// Captured outcome of one system that did not complete its update.
///
/// A failure is recorded in the frame summary and in the per-system stats;
/// it never propagates to sibling systems or aborts the frame.
#[derive(Debug)]
pub enum SystemFailure {
    /// The update returned an error.
    Failed {
        /// Id of the failing system.
        system_id: SystemId,
        /// Name of the failing system.
        name: String,
        /// The error the system returned.
        source: SystemError,
    },

    /// The update panicked; the panic was caught at the system boundary.
    Panicked {
        /// Id of the failing system.
        system_id: SystemId,
        /// Name of the failing system.
        name: String,
        /// Panic payload rendered to a string, when possible.
        message: String,
    },
}

impl SystemFailure {
    /// Id of the system this failure belongs to.
    pub fn system_id(&self) -> SystemId {
        match self {
            SystemFailure::Failed { system_id, .. } => *system_id,
            SystemFailure::Panicked { system_id, .. } => *system_id,
        }
    }
}

impl fmt::Display for SystemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SystemFailure::Failed { name, source, .. } => {
                write!(f, "system '{name}' failed: {source}")
            }
            SystemFailure::Panicked { name, message, .. } => {
                write!(f, "system '{name}' panicked: {message}")
            }
        }
    }
}

impl std::error::Error for SystemFailure {}

/// Returned when the worker pool cannot be created.
///
/// This is the one fatal error of the scheduler: without a pool there is no
/// safe parallel fallback, so it propagates to the caller.
#[derive(Debug, Clone)]
pub struct PoolError {
    /// Human-readable reason reported by the pool builder.
    pub reason: String,
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker pool unavailable: {}", self.reason)
    }
}

impl std::error::Error for PoolError {}

/// Aggregate error for scheduler operations.
#[derive(Debug)]
pub enum SchedulerError {
    /// A system could not be registered.
    Registration(RegistrationError),

    /// A built plan failed validation (defensive; should never occur).
    PlanBuild(PlanBuildError),

    /// The worker pool could not be created.
    Pool(PoolError),
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerError::Registration(e) => write!(f, "{e}"),
            SchedulerError::PlanBuild(e) => write!(f, "{e}"),
            SchedulerError::Pool(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SchedulerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SchedulerError::Registration(e) => Some(e),
            SchedulerError::PlanBuild(e) => Some(e),
            SchedulerError::Pool(e) => Some(e),
        }
    }
}

impl From<RegistrationError> for SchedulerError {
    fn from(e: RegistrationError) -> Self {
        SchedulerError::Registration(e)
    }
}

impl From<PlanBuildError> for SchedulerError {
    fn from(e: PlanBuildError) -> Self {
        SchedulerError::PlanBuild(e)
    }
}

impl From<PoolError> for SchedulerError {
    fn from(e: PoolError) -> Self {
        SchedulerError::Pool(e)
    }
}

/// Result type for scheduler operations.
pub type SchedResult<T> = Result<T, SchedulerError>;
