//! In-memory thread storage
//!
//! Threads live in a `HashMap` behind a tokio `RwLock`. Suitable for the
//! CLI, tests and single-instance deployments; everything is lost on exit.

use crate::error::StorageError;
use crate::session::Thread;
use crate::storage::ThreadStore;
use crate::types::ThreadId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// # Examples
///
/// ```
/// use flyagent::session::Thread;
/// use flyagent::storage::{InMemoryThreadStore, ThreadStore};
/// use flyagent::types::ThreadId;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = InMemoryThreadStore::new();
///     let id = store.create(Thread::new(ThreadId::from("demo"))).await?;
///
///     assert!(store.get(&id).await?.is_some());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryThreadStore {
    threads: Arc<RwLock<HashMap<ThreadId, Thread>>>,
}

impl InMemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.threads.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.threads.read().await.is_empty()
    }
}

#[async_trait]
impl ThreadStore for InMemoryThreadStore {
    async fn create(&self, thread: Thread) -> Result<ThreadId, StorageError> {
        let id = thread.id.clone();
        let mut threads = self.threads.write().await;

        if threads.contains_key(&id) {
            return Err(StorageError::AlreadyExists(format!(
                "Thread with ID {} already exists",
                id
            )));
        }

        threads.insert(id.clone(), thread);
        Ok(id)
    }

    async fn get(&self, id: &ThreadId) -> Result<Option<Thread>, StorageError> {
        let threads = self.threads.read().await;
        Ok(threads.get(id).cloned())
    }

    async fn update(&self, id: &ThreadId, thread: Thread) -> Result<(), StorageError> {
        let mut threads = self.threads.write().await;

        match threads.get_mut(id) {
            Some(slot) => {
                *slot = thread;
                Ok(())
            }
            None => Err(StorageError::NotFound(format!(
                "Thread with ID {} not found",
                id
            ))),
        }
    }

    async fn list(&self) -> Result<Vec<ThreadId>, StorageError> {
        let threads = self.threads.read().await;
        Ok(threads.keys().cloned().collect())
    }

    async fn exists(&self, id: &ThreadId) -> Result<bool, StorageError> {
        Ok(self.threads.read().await.contains_key(id))
    }
}
