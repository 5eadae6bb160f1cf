//! Pairwise conflict analysis between registered systems.
//!
//! The dependency graph is the first half of plan construction: for every
//! unordered pair of systems it decides whether the two may legally share a
//! stage. The result is a symmetric adjacency matrix consumed by the plan
//! builder and exposed to tooling as a list of conflict pairs.
//!
//! ## Conflict predicate
//!
//! Systems `A` and `B` conflict when
//!
//! * `write(A) ∩ (read(B) ∪ write(B)) ≠ ∅` (or the symmetric case), or
//! * either system has `allows_parallel() == false`.
//!
//! The second clause folds exclusivity into the same relation the builder
//! already consumes: a non-parallel system conflicts with everything, so it
//! can never share a stage.
//!
//! ## Cost
//!
//! `O(S² · C)` for `S` systems with access sets of word-width `C`. `S` is
//! small (tens) and the graph is rebuilt only when the registry changes,
//! never per frame.

use crate::engine::types::{AccessSets, Priority, SystemId};


/// Scheduling-relevant metadata of one registered system.
///
/// A flat view extracted from the registry so that graph and plan
/// construction do not borrow the system objects themselves.
#[derive(Clone, Copy, Debug)]
pub struct SystemMeta {
    /// Stable id of the system.
    pub id: SystemId,
    /// Scheduling priority; lower runs earlier.
    pub priority: Priority,
    /// Declared component access.
    pub access: AccessSets,
    /// Whether the system may share a stage.
    pub allows_parallel: bool,
}

/// Symmetric conflict adjacency over the registered systems.
///
/// Node indices follow registration order; rows are packed bitsets.
pub struct DependencyGraph {
    ids: Vec<SystemId>,
    rows: Vec<Vec<u64>>,
}

impl DependencyGraph {
    /// Computes pairwise conflicts for the given systems.
    pub fn build(systems: &[SystemMeta]) -> Self {
        let n = systems.len();
        let words = n.div_ceil(64);
        let mut rows = vec![vec![0u64; words]; n];

        for a in 0..n {
            for b in (a + 1)..n {
                if Self::conflict(&systems[a], &systems[b]) {
                    rows[a][b / 64] |= 1u64 << (b % 64);
                    rows[b][a / 64] |= 1u64 << (a % 64);
                }
            }
        }

        Self {
            ids: systems.iter().map(|s| s.id).collect(),
            rows,
        }
    }

    #[inline]
    fn conflict(a: &SystemMeta, b: &SystemMeta) -> bool {
        if !a.allows_parallel || !b.allows_parallel {
            return true;
        }
        a.access.conflicts_with(&b.access)
    }

    /// Number of systems in the graph.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns `true` if the graph holds no systems.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Returns `true` if the systems at indices `a` and `b` conflict.
    ///
    /// Indices follow registration order; `conflicts(i, i)` is `false`.
    #[inline]
    pub fn conflicts(&self, a: usize, b: usize) -> bool {
        (self.rows[a][b / 64] >> (b % 64)) & 1 == 1
    }

    /// Lists every conflicting pair as `(SystemId, SystemId)`.
    ///
    /// Intended for tooling and diagnostics; each unordered pair appears
    /// once, with the pair ordered by registration.
    pub fn conflict_pairs(&self) -> Vec<(SystemId, SystemId)> {
        let n = self.ids.len();
        let mut pairs = Vec::new();
        for a in 0..n {
            for b in (a + 1)..n {
                if self.conflicts(a, b) {
                    pairs.push((self.ids[a], self.ids[b]));
                }
            }
        }
        pairs
    }
}
