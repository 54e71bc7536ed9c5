//! Registration-ordered executor registry.

use super::{Executor, ExecutorProfile};
use crate::core::ExecutorId;
use crate::errors::ValidationError;
use parking_lot::RwLock;
use std::sync::Arc;

/// Holds every registered executor in registration order.
///
/// Registration order is load-bearing: the router breaks selection ties by
/// it, which keeps routing reproducible under test.
#[derive(Debug, Default)]
pub struct ExecutorRegistry {
    executors: RwLock<Vec<Arc<dyn Executor>>>,
}

/// Point-in-time view of the registry for pure selection.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    /// Profiles in registration order.
    pub profiles: Vec<ExecutorProfile>,
}

impl ExecutorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an executor.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if an executor with the same id is
    /// already registered.
    pub fn register(&self, executor: Arc<dyn Executor>) -> Result<(), ValidationError> {
        let mut executors = self.executors.write();
        if executors.iter().any(|e| e.id() == executor.id()) {
            return Err(ValidationError::new(format!(
                "executor '{}' is already registered",
                executor.id()
            )));
        }
        executors.push(executor);
        Ok(())
    }

    /// Looks up an executor by id.
    #[must_use]
    pub fn get(&self, id: &ExecutorId) -> Option<Arc<dyn Executor>> {
        self.executors.read().iter().find(|e| e.id() == id).cloned()
    }

    /// Returns the number of registered executors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.executors.read().len()
    }

    /// Returns true if no executors are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.executors.read().is_empty()
    }

    /// Captures a snapshot of the profiles in registration order.
    #[must_use]
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            profiles: self
                .executors
                .read()
                .iter()
                .map(|e| e.profile().clone())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Capability;
    use crate::testing::ScriptedExecutor;

    #[test]
    fn test_register_and_get() {
        let registry = ExecutorRegistry::new();
        assert!(registry.is_empty());

        let exec = Arc::new(ScriptedExecutor::new(
            "exec-a",
            &[Capability::Drafting],
            &["hello"],
        ));
        registry.register(exec).unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.get(&ExecutorId::new("exec-a")).is_some());
        assert!(registry.get(&ExecutorId::new("exec-b")).is_none());
    }

    #[test]
    fn test_register_duplicate_rejected() {
        let registry = ExecutorRegistry::new();
        let make = || {
            Arc::new(ScriptedExecutor::new(
                "exec-a",
                &[Capability::Drafting],
                &["x"],
            ))
        };

        registry.register(make()).unwrap();
        assert!(registry.register(make()).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_snapshot_preserves_registration_order() {
        let registry = ExecutorRegistry::new();
        for name in ["first", "second", "third"] {
            registry
                .register(Arc::new(ScriptedExecutor::new(
                    name,
                    &[Capability::Analysis],
                    &["x"],
                )))
                .unwrap();
        }

        let snapshot = registry.snapshot();
        let ids: Vec<&str> = snapshot.profiles.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }
}
