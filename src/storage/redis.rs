//! Redis thread storage (feature `redis-storage`)
//!
//! One JSON document per thread under `flyagent:thread:{id}`.

use crate::error::StorageError;
use crate::session::Thread;
use crate::storage::ThreadStore;
use crate::types::ThreadId;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::debug;

const KEY_PREFIX: &str = "flyagent:thread:";

#[derive(Clone)]
pub struct RedisThreadStore {
    connection: ConnectionManager,
}

fn key(id: &ThreadId) -> String {
    format!("{KEY_PREFIX}{id}")
}

fn query_error(e: redis::RedisError) -> StorageError {
    StorageError::Query(e.to_string())
}

impl RedisThreadStore {
    /// Connect to `url`, e.g. `redis://127.0.0.1:6379`
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let client =
            redis::Client::open(url).map_err(|e| StorageError::Connection(e.to_string()))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        debug!(url = %url, "Connected to Redis");
        Ok(Self { connection })
    }

    fn encode(thread: &Thread) -> Result<String, StorageError> {
        serde_json::to_string(thread).map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl ThreadStore for RedisThreadStore {
    async fn create(&self, thread: Thread) -> Result<ThreadId, StorageError> {
        let mut conn = self.connection.clone();
        let body = Self::encode(&thread)?;
        let created: bool = conn
            .set_nx(key(&thread.id), body)
            .await
            .map_err(query_error)?;
        if !created {
            return Err(StorageError::AlreadyExists(format!(
                "Thread with ID {} already exists",
                thread.id
            )));
        }
        Ok(thread.id)
    }

    async fn get(&self, id: &ThreadId) -> Result<Option<Thread>, StorageError> {
        let mut conn = self.connection.clone();
        let body: Option<String> = conn.get(key(id)).await.map_err(query_error)?;
        body.map(|raw| {
            serde_json::from_str(&raw).map_err(|e| StorageError::Deserialization(e.to_string()))
        })
        .transpose()
    }

    async fn update(&self, id: &ThreadId, thread: Thread) -> Result<(), StorageError> {
        let mut conn = self.connection.clone();
        let body = Self::encode(&thread)?;
        // SET XX only writes when the key already exists
        let written: Option<String> = redis::cmd("SET")
            .arg(key(id))
            .arg(body)
            .arg("XX")
            .query_async(&mut conn)
            .await
            .map_err(query_error)?;
        match written {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound(format!(
                "Thread with ID {} not found",
                id
            ))),
        }
    }

    async fn list(&self) -> Result<Vec<ThreadId>, StorageError> {
        let mut conn = self.connection.clone();
        let keys: Vec<String> = conn
            .keys(format!("{KEY_PREFIX}*"))
            .await
            .map_err(query_error)?;
        Ok(keys
            .into_iter()
            .filter_map(|k| k.strip_prefix(KEY_PREFIX).map(ThreadId::from))
            .collect())
    }

    async fn exists(&self, id: &ThreadId) -> Result<bool, StorageError> {
        let mut conn = self.connection.clone();
        conn.exists(key(id)).await.map_err(query_error)
    }
}
