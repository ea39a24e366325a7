//! Progressive-mesh level of detail.
//!
//! [`reduce`] orders every vertex of a mesh by repeatedly collapsing the
//! cheapest edge. The result converts into the on-disk form used by the
//! skeletal formats: vertices sorted so that the last one collapses first,
//! plus a map from each vertex to the vertex it folds into.

mod reducer;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use reducer::{reduce, ISOLATED_COST, SILHOUETTE_PENALTY};

/// Map entry for a vertex that vanishes without a target.
pub const NO_TARGET: i32 = -1;

/// Shared flag for cancelling a running reduction from another thread.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Bounds on a reduction run.
#[derive(Clone, Debug)]
pub struct ReduceOptions {
    /// Meshes with more vertices are rejected with `LimitExceeded`.
    pub max_vertices: usize,
    /// Polled every `check_interval` collapses.
    pub cancel: Option<CancelToken>,
    pub check_interval: usize,
}

impl Default for ReduceOptions {
    fn default() -> Self {
        Self {
            max_vertices: 65536,
            cancel: None,
            check_interval: 256,
        }
    }
}

impl ReduceOptions {
    pub fn with_max_vertices(mut self, max_vertices: usize) -> Self {
        self.max_vertices = max_vertices;
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }
}

/// Collapse ordering of one mesh, in original vertex numbering.
#[derive(Clone, Debug, PartialEq)]
pub struct Reduction {
    /// Step at which each vertex collapsed; a permutation of `0..n`.
    pub rank: Vec<u32>,
    /// Vertex each one folded into, `None` if it vanished.
    pub target: Vec<Option<u32>>,
    /// Vertex count at which silhouette edges start to erode, or 0.
    pub min_lod: u32,
}

/// A [`Reduction`] renumbered into storage order.
#[derive(Clone, Debug, PartialEq)]
pub struct CollapseOrder {
    /// New position of each original vertex.
    pub new_index: Vec<u32>,
    /// Per new position: new position of the collapse target, or [`NO_TARGET`].
    pub map: Vec<i32>,
}

impl CollapseOrder {
    /// Original vertex stored at each new position.
    pub fn old_index(&self) -> Vec<u32> {
        let mut old = vec![0u32; self.new_index.len()];
        for (o, &n) in self.new_index.iter().enumerate() {
            old[n as usize] = o as u32;
        }
        old
    }
}

impl Reduction {
    /// Vertex count.
    pub fn len(&self) -> usize {
        self.rank.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rank.is_empty()
    }

    /// Sort vertices so the first collapsed is stored last.
    ///
    /// Every target is stored before its source, so keeping the first `k`
    /// vertices and following the map for the rest always lands inside the
    /// kept prefix.
    pub fn collapse_order(&self) -> CollapseOrder {
        let n = self.len() as u32;
        let new_index: Vec<u32> = self.rank.iter().map(|&r| n - 1 - r).collect();
        let mut map = vec![NO_TARGET; self.len()];
        for (old, target) in self.target.iter().enumerate() {
            if let Some(t) = target {
                map[new_index[old] as usize] = new_index[*t as usize] as i32;
            }
        }
        CollapseOrder { new_index, map }
    }
}

/// Follow a collapse map until a vertex below `keep` is reached.
///
/// Returns `None` if the chain ends in a vanished vertex.
pub fn resolve_collapse(map: &[i32], mut vertex: usize, keep: usize) -> Option<usize> {
    while vertex >= keep {
        let next = *map.get(vertex)?;
        if next < 0 {
            return None;
        }
        vertex = next as usize;
    }
    Some(vertex)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Reduction {
        // vertex 2 collapses into 0 first, then 0 into 1, then 1 vanishes
        Reduction {
            rank: vec![1, 2, 0],
            target: vec![Some(1), None, Some(0)],
            min_lod: 0,
        }
    }

    #[test]
    fn test_collapse_order() {
        let order = sample().collapse_order();
        assert_eq!(order.new_index, vec![1, 0, 2]);
        assert_eq!(order.old_index(), vec![1, 0, 2]);
        assert_eq!(order.map, vec![NO_TARGET, 0, 1]);
        for (i, &t) in order.map.iter().enumerate() {
            assert!(t < i as i32);
        }
    }

    #[test]
    fn test_resolve_collapse() {
        let map = sample().collapse_order().map;
        assert_eq!(resolve_collapse(&map, 2, 1), Some(0));
        assert_eq!(resolve_collapse(&map, 2, 3), Some(2));
        assert_eq!(resolve_collapse(&map, 0, 0), None);
    }

    #[test]
    fn test_cancel_token_shared() {
        let token = CancelToken::new();
        let opts = ReduceOptions::default().with_cancel(token.clone());
        assert!(!opts.is_cancelled());
        token.cancel();
        assert!(opts.is_cancelled());
    }
}
