//! Thread storage backends
//!
//! The turn engine loads a [`Thread`] before a turn and writes it back
//! after; backends only need whole-record reads and writes.

use crate::error::StorageError;
use crate::session::Thread;
use crate::types::ThreadId;
use async_trait::async_trait;

pub mod memory;
#[cfg(feature = "redis-storage")]
pub mod redis;

pub use memory::InMemoryThreadStore;
#[cfg(feature = "redis-storage")]
pub use self::redis::RedisThreadStore;

/// Storage backend for conversation threads
///
/// There is no delete: a thread is abandoned by starting a new thread id.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Insert a new thread
    ///
    /// Fails with [`StorageError::AlreadyExists`] when the id is taken.
    async fn create(&self, thread: Thread) -> Result<ThreadId, StorageError>;

    /// Get a thread by id, `None` if unknown
    async fn get(&self, id: &ThreadId) -> Result<Option<Thread>, StorageError>;

    /// Replace an existing thread
    ///
    /// Fails with [`StorageError::NotFound`] when the id is unknown.
    async fn update(&self, id: &ThreadId, thread: Thread) -> Result<(), StorageError>;

    /// Ids of every stored thread
    async fn list(&self) -> Result<Vec<ThreadId>, StorageError>;

    async fn exists(&self, id: &ThreadId) -> Result<bool, StorageError> {
        Ok(self.get(id).await?.is_some())
    }
}
