//! Shared access to externally-owned world storage.
//!
//! The scheduler never owns or allocates component storage — the storage
//! engine is an external collaborator. What the scheduler does own is the
//! *access discipline*: during a stage, several systems may touch the same
//! world concurrently, and the only thing keeping them apart is the
//! conflict-freedom invariant proved at plan-build time.
//!
//! ## Concurrency model
//!
//! The world is wrapped in [`WorldCell`], which uses `UnsafeCell` to allow
//! aliasing between shared (`&`) and exclusive (`&mut`) access paths.
//! Safety is enforced by *API discipline*, not the Rust borrow checker:
//!
//! * Stage members are proven pairwise non-conflicting before they run,
//! * each system only touches the component types it declared,
//! * structural mutations happen outside `run_frame`, through
//!   [`WorldCell::get_mut`], which takes `&mut self` and is therefore
//!   exclusive by construction.
//!
//! **No locks are held during stage or query execution.** If a declaration
//! is wrong, behavior is an undetected race, by contract.
//!
//! ## Safety
//!
//! This module contains unsafe code for:
//! * interior mutability (`UnsafeCell`),
//! * sharing the cell across worker threads (`unsafe impl Sync`).
//!
//! All unsafe blocks rely on the invariants documented at each boundary.

use std::cell::UnsafeCell;


/// Thread-shareable owner of the simulation world.
///
/// ## Role
/// `WorldCell` holds the storage engine's world value and hands out
/// lightweight [`WorldRef`] handles to systems during frame execution. It
/// is designed to be shared across worker threads while enforcing safety
/// via the plan-level conflict-freedom proof.
///
/// ## Concurrency
/// * `WorldCell<W>` is `Sync` when `W: Send`
/// * All mutation during a frame occurs through `UnsafeCell<W>`
/// * Users must respect the declared-access contract
pub struct WorldCell<W> {
    /// Interior-mutable world state.
    inner: UnsafeCell<W>,
}

// Safety: concurrent access through WorldRef is restricted to systems that
// were proven non-conflicting at plan-build time; the cell itself adds no
// sharing beyond what the plan already permits.
unsafe impl<W: Send> Sync for WorldCell<W> {}

impl<W> WorldCell<W> {
    /// Wraps a world value for scheduled execution.
    pub fn new(world: W) -> Self {
        Self { inner: UnsafeCell::new(world) }
    }

    /// Returns a lightweight reference handle to the world.
    ///
    /// ## Safety
    /// The returned handle permits both shared and mutable access via
    /// [`WorldRef`], relying on the conflict-freedom proof to avoid data
    /// races.
    #[inline]
    pub fn world_ref(&self) -> WorldRef<'_, W> {
        WorldRef { inner: &self.inner }
    }

    /// Returns exclusive access to the world.
    ///
    /// Takes `&mut self`, so this cannot overlap with any frame execution;
    /// use it for setup, structural mutation, and inspection between
    /// frames.
    #[inline]
    pub fn get_mut(&mut self) -> &mut W {
        self.inner.get_mut()
    }

    /// Unwraps the world value.
    pub fn into_inner(self) -> W {
        self.inner.into_inner()
    }
}

/// A non-owning handle granting access to the world during a frame.
///
/// ## Role
/// `WorldRef` allows systems to read or mutate their declared component
/// storage while the [`WorldCell`] remains shared across the stage's
/// workers.
///
/// ## Safety
/// This type exposes raw access to `W` via `UnsafeCell` and relies on the
/// execution plan to avoid conflicting mutable accesses.
pub struct WorldRef<'a, W> {
    /// Pointer to the interior world data.
    inner: &'a UnsafeCell<W>,
}

impl<W> Clone for WorldRef<'_, W> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<W> Copy for WorldRef<'_, W> {}

impl<'a, W> WorldRef<'a, W> {
    /// Returns an immutable reference to the world.
    ///
    /// ## Safety
    /// No aliasing guarantees are enforced at compile time; callers must
    /// stay within their declared read set.
    #[inline]
    pub fn data(&self) -> &'a W {
        unsafe { &*self.inner.get() }
    }

    /// Returns a mutable reference to the world.
    ///
    /// ## Safety
    /// Callers must stay within their declared write set. Two systems in
    /// the same stage may both hold this reference; the plan guarantees
    /// their declared sets are disjoint, and the declarations are trusted.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub fn data_mut(&self) -> &'a mut W {
        unsafe { &mut *self.inner.get() }
    }
}
