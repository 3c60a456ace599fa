use chrono::NaiveDate;
use redis::AsyncCommands;
use redis::Client;
use std::fmt::Display;
use tokio::sync::{mpsc, oneshot};

use crate::error::AppError;
use crate::error::AppResult;

pub const WEEKLY_WINDOW_TTL: u64 = 3600; // 1 hour

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Freshness window of a region, anchored at its first day
    WeeklyWindow { region: String, start: NaiveDate },
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::WeeklyWindow { region, start } => {
                write!(f, "weekly:{}:{}", region.trim().to_lowercase(), start)
            }
        }
    }
}

/// Creates a Redis client for caching
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Message for the cache writer; applied strictly in send order
enum CacheWriteMessage {
    Set {
        key: String,
        value: String,
        ttl: u64,
    },
    Delete {
        key: String,
        done: oneshot::Sender<AppResult<()>>,
    },
}

/// Cache handler for storing and retrieving data from Redis
#[derive(Clone)]
pub struct Cache {
    redis_client: Client,
    write_tx: mpsc::UnboundedSender<CacheWriteMessage>,
}

/// Handle for gracefully shutting down the cache writer
pub struct CacheWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl CacheWriterHandle {
    /// Signals the writer task to flush pending writes and stop
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Cache writer shutdown signal sent");
    }
}

impl Cache {
    /// Creates a cache and spawns its background writer
    pub async fn new(redis_client: Client) -> (Self, CacheWriterHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let client = redis_client.clone();
        tokio::spawn(async move {
            Self::cache_writer_task(client, write_rx, shutdown_rx).await;
        });

        let cache = Self {
            redis_client,
            write_tx,
        };

        (cache, CacheWriterHandle { shutdown_tx })
    }

    async fn cache_writer_task(
        client: Client,
        mut write_rx: mpsc::UnboundedReceiver<CacheWriteMessage>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!("Cache writer task started");
        let mut pending_writes = 0;

        loop {
            tokio::select! {
                Some(msg) = write_rx.recv() => {
                    pending_writes += 1;
                    if let Err(e) = Self::write_to_redis(&client, msg).await {
                        tracing::error!(error = %e, "Failed to write to Redis cache");
                    } else {
                        pending_writes -= 1;
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!(pending = pending_writes, "Cache writer shutting down, flushing remaining writes");

                    // Senders live in every Cache clone, so drain only what is queued now
                    while let Ok(msg) = write_rx.try_recv() {
                        if let Err(e) = Self::write_to_redis(&client, msg).await {
                            tracing::error!(error = %e, "Failed to flush cache write during shutdown");
                        }
                    }

                    tracing::info!("Cache writer task stopped");
                    break;
                }
            }
        }
    }

    async fn write_to_redis(client: &Client, msg: CacheWriteMessage) -> AppResult<()> {
        match msg {
            CacheWriteMessage::Set { key, value, ttl } => {
                let mut conn = client.get_multiplexed_async_connection().await?;
                let _: () = conn.set_ex(key, value, ttl).await?;
                Ok(())
            }
            CacheWriteMessage::Delete { key, done } => {
                let result = Self::delete(client, key).await;
                let failed = result.is_err();
                // The caller may have stopped waiting
                let _ = done.send(result);
                if failed {
                    return Err(AppError::Internal("Cache delete failed".to_string()));
                }
                Ok(())
            }
        }
    }

    async fn delete(client: &Client, key: String) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }

    /// Retrieves a value from the cache by key
    ///
    /// Returns `None` when the key is absent. Connection and decoding
    /// failures are returned as errors; callers decide whether a broken
    /// cache is fatal.
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.get(key.to_string()).await?;

        match cached {
            Some(json) => {
                let data = serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Cache deserialization error: {}", e))
                })?;
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }

    /// Queues a write for the background task and returns immediately
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                return;
            }
        };

        let msg = CacheWriteMessage::Set {
            key: key.to_string(),
            value: json,
            ttl,
        };

        if let Err(e) = self.write_tx.send(msg) {
            tracing::error!(error = %e, "Failed to send cache write message");
        }
    }

    /// Deletes a key and waits until Redis confirms
    ///
    /// The delete is queued behind every write sent before it, so a write
    /// queued earlier can never land after the key was removed.
    pub async fn invalidate(&self, key: &CacheKey) -> AppResult<()> {
        let (done, confirmed) = oneshot::channel();
        self.write_tx
            .send(CacheWriteMessage::Delete {
                key: key.to_string(),
                done,
            })
            .map_err(|_| AppError::Internal("Cache writer is not running".to_string()))?;

        confirmed
            .await
            .map_err(|_| AppError::Internal("Cache writer dropped an invalidation".to_string()))?
    }
}
