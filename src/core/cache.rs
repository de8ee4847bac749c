//! Per-engine memo table for derived grids

use crate::types::{Grid, TopoResult};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::Arc;

/// Identity of a cached computation: the producing operation together with
/// its (hashable) arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    /// Partial derivative of order (dx, dy) in X/Y terms
    Diff(u32, u32),
    /// `diff(1, 1) * D1x * D1y`
    CrossTerm,
    SquaredSlopeX,
    SquaredSlopeY,
    /// `D1x^2 + D1y^2`
    SquaredSlope,
    /// `D1x^2 + D1y^2 + 1`
    SquaredSlopePlusOne,
    Slope,
    Curvature,
    PlanCurvature,
    TangCurvature,
    ProfCurvature,
    GradDir,
    Aspect,
    Northness,
    Eastness,
    SlopeAngle,
    SlopeAngleX,
    SlopeAngleY,
    Verticality,
    VerticalityX,
    VerticalityY,
    Latitude,
    /// Keyed by the bit pattern of the declination
    SunExposure(u64),
    RadAngle(u64),
}

/// Memoizes grids by [`Node`] for the lifetime of one engine.
///
/// There is no eviction; the quantity space is small and fixed. Interior
/// mutability lets `&self` accessors populate the table. The cache is not
/// `Sync`: concurrent use of one engine needs external locking.
#[derive(Debug, Default)]
pub struct DerivativeCache {
    entries: RefCell<HashMap<Node, Arc<Grid>>>,
    hits: Cell<usize>,
    misses: Cell<usize>,
}

impl DerivativeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the stored grid for `node`, computing and storing it first if
    /// absent. A failed computation stores nothing.
    pub fn get_or_try_insert<F>(&self, node: Node, compute: F) -> TopoResult<Arc<Grid>>
    where
        F: FnOnce() -> TopoResult<Grid>,
    {
        if let Some(value) = self.entries.borrow().get(&node) {
            log::trace!("cache hit for {:?}", node);
            self.hits.set(self.hits.get() + 1);
            return Ok(Arc::clone(value));
        }

        // The borrow is released before computing: `compute` may recurse
        // into the cache for the nodes it depends on.
        let value = Arc::new(compute()?);
        self.misses.set(self.misses.get() + 1);
        self.entries.borrow_mut().insert(node, Arc::clone(&value));
        Ok(value)
    }

    pub fn contains(&self, node: Node) -> bool {
        self.entries.borrow().contains_key(&node)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of lookups answered from the table
    pub fn hits(&self) -> usize {
        self.hits.get()
    }

    /// Number of lookups that had to compute
    pub fn misses(&self) -> usize {
        self.misses.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TopoError;
    use ndarray::Array2;

    #[test]
    fn test_computes_once() {
        let cache = DerivativeCache::new();
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            Ok(Array2::from_elem((2, 2), 1.0))
        };

        let first = cache.get_or_try_insert(Node::Diff(1, 0), compute).unwrap();
        let second = cache
            .get_or_try_insert(Node::Diff(1, 0), || panic!("must not recompute"))
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_arguments_are_part_of_the_key() {
        let cache = DerivativeCache::new();
        cache
            .get_or_try_insert(Node::Diff(1, 0), || Ok(Array2::zeros((1, 1))))
            .unwrap();
        assert!(cache.contains(Node::Diff(1, 0)));
        assert!(!cache.contains(Node::Diff(0, 1)));
    }

    #[test]
    fn test_errors_are_not_cached() {
        let cache = DerivativeCache::new();
        let err = cache.get_or_try_insert(Node::Latitude, || {
            Err(TopoError::Reprojection("unavailable".to_string()))
        });
        assert!(err.is_err());
        assert!(cache.is_empty());

        let ok = cache.get_or_try_insert(Node::Latitude, || Ok(Array2::zeros((1, 1))));
        assert!(ok.is_ok());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_nested_population() {
        let cache = DerivativeCache::new();
        let outer = cache
            .get_or_try_insert(Node::Slope, || {
                let inner = cache.get_or_try_insert(Node::SquaredSlope, || {
                    Ok(Array2::from_elem((1, 1), 4.0))
                })?;
                Ok(inner.mapv(f64::sqrt))
            })
            .unwrap();
        assert_eq!(outer[[0, 0]], 2.0);
        assert_eq!(cache.len(), 2);
    }
}
