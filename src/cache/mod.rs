//! Key-value cache adapter.
//!
//! Thin wrapper over `redis::aio::ConnectionManager`. `Get`/`Set`/`FlushAll`
//! return `Result<_, AppError>` so call sites can log-and-recover
//! ("CacheError — never surfaced"); nothing in this module itself decides
//! to swallow errors — that's the aggregation core's job.

use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::errors::AppError;

#[derive(Clone)]
pub struct CacheAdapter {
    conn: ConnectionManager,
}

impl CacheAdapter {
    pub async fn connect(redis_url: &str) -> Result<Self, AppError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| AppError::CacheError(format!("invalid redis url: {e}")))?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }

    /// Read raw bytes for `key`. Returns `Ok(None)` on a clean miss.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AppError> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    pub async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    /// `POST /dev/reset-db` support: wipe every cached entry.
    pub async fn flush_all(&self) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("FLUSHALL").query_async(&mut conn).await?;
        Ok(())
    }
}

/// Cache key for one forecast kind and location.
pub fn cache_key(prefix: &str, location_id: uuid::Uuid) -> String {
    format!("{prefix}:{location_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_format() {
        let id = uuid::Uuid::nil();
        assert_eq!(
            cache_key("currentweather", id),
            format!("currentweather:{id}")
        );
    }
}
