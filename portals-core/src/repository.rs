//! Per-repository transaction locks.
//!
//! The publish tool accepts a single open transaction per repository, so two
//! concurrent publishes into the same repository corrupt it. Every repository
//! gets one [`Repository`] with its own mutex; the [`RepositoryTable`] is
//! built once at startup and handed to every portal that publishes there.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

/// A named publishing target and the lock serializing its transactions.
#[derive(Debug)]
pub struct Repository {
    name: String,
    transaction: Mutex<()>,
}

impl Repository {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transaction: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for exclusive access to the repository.
    /// The transaction stays open until the returned guard is dropped.
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.transaction.lock().await
    }
}

/// All repositories known to the process, keyed by name.
#[derive(Debug, Default, Clone)]
pub struct RepositoryTable {
    repositories: HashMap<String, Arc<Repository>>,
}

impl RepositoryTable {
    /// Build one [`Repository`] per distinct name.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut repositories = HashMap::new();
        for name in names {
            let name = name.into();
            repositories
                .entry(name.clone())
                .or_insert_with(|| Arc::new(Repository::new(name)));
        }
        Self { repositories }
    }

    pub fn get(&self, name: &str) -> Option<Arc<Repository>> {
        self.repositories.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn duplicate_names_share_one_repository() {
        let table = RepositoryTable::from_names(["a.example.org", "b.example.org", "a.example.org"]);
        assert!(!table.is_empty());
        assert_eq!(table.len(), 2);
        let first = table.get("a.example.org").unwrap();
        let second = table.get("a.example.org").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(table.get("missing").is_none());
    }

    #[test]
    fn no_names_make_an_empty_table() {
        let table = RepositoryTable::from_names(Vec::<String>::new());
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
    }

    #[tokio::test]
    async fn lock_is_exclusive_per_repository() {
        let table = RepositoryTable::from_names(["a", "b"]);
        let a = table.get("a").unwrap();
        let b = table.get("b").unwrap();

        let guard = a.lock().await;
        // Another repository is unaffected.
        let other = tokio::time::timeout(Duration::from_millis(50), b.lock()).await;
        assert!(other.is_ok());
        // The same repository is not.
        let same = tokio::time::timeout(Duration::from_millis(50), a.lock()).await;
        assert!(same.is_err());
        drop(guard);
        assert!(tokio::time::timeout(Duration::from_millis(50), a.lock())
            .await
            .is_ok());
    }
}
