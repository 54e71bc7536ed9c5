//! Shared cross-run executor quota pool.
//!
//! The pool is the only mutable state shared between runs. Executors without
//! an entry are treated as unlimited.

use crate::core::ExecutorId;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Remaining call quota per executor.
#[derive(Debug, Default)]
pub struct QuotaPool {
    limits: Mutex<HashMap<ExecutorId, u32>>,
}

/// Point-in-time view of the pool for pure selection.
#[derive(Debug, Clone, Default)]
pub struct QuotaView {
    limits: HashMap<ExecutorId, u32>,
}

impl QuotaPool {
    /// Creates a pool with no limits (everything unlimited).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the remaining quota for an executor.
    pub fn set_limit(&self, id: ExecutorId, remaining: u32) {
        self.limits.lock().insert(id, remaining);
    }

    /// Returns the remaining quota, or `None` for unlimited executors.
    #[must_use]
    pub fn remaining(&self, id: &ExecutorId) -> Option<u32> {
        self.limits.lock().get(id).copied()
    }

    /// Consumes one unit of quota. Returns false when the executor is
    /// tracked and exhausted.
    pub fn try_consume(&self, id: &ExecutorId) -> bool {
        let mut limits = self.limits.lock();
        match limits.get_mut(id) {
            Some(0) => false,
            Some(remaining) => {
                *remaining -= 1;
                true
            }
            None => true,
        }
    }

    /// Captures a point-in-time view of the pool.
    #[must_use]
    pub fn view(&self) -> QuotaView {
        QuotaView {
            limits: self.limits.lock().clone(),
        }
    }
}

impl QuotaView {
    /// Returns true if the executor has quota left in this view.
    #[must_use]
    pub fn has_quota(&self, id: &ExecutorId) -> bool {
        self.limits.get(id).map_or(true, |remaining| *remaining > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untracked_is_unlimited() {
        let pool = QuotaPool::new();
        let id = ExecutorId::new("free");

        assert_eq!(pool.remaining(&id), None);
        assert!(pool.try_consume(&id));
        assert!(pool.view().has_quota(&id));
    }

    #[test]
    fn test_consume_until_exhausted() {
        let pool = QuotaPool::new();
        let id = ExecutorId::new("metered");
        pool.set_limit(id.clone(), 2);

        assert!(pool.try_consume(&id));
        assert!(pool.try_consume(&id));
        assert!(!pool.try_consume(&id));
        assert_eq!(pool.remaining(&id), Some(0));
    }

    #[test]
    fn test_view_is_a_snapshot() {
        let pool = QuotaPool::new();
        let id = ExecutorId::new("metered");
        pool.set_limit(id.clone(), 1);

        let view = pool.view();
        assert!(pool.try_consume(&id));

        // The view reflects the pool at capture time, not now.
        assert!(view.has_quota(&id));
        assert!(!pool.view().has_quota(&id));
    }
}
