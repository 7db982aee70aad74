use std::sync::Arc;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::{cmd, Client, ErrorKind, RedisError};
use tokio::sync::RwLock;

/// Upper bound for one connection attempt, so a request never hangs on an
/// unreachable server.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Shared Redis connection. Status and alias operations reconnect on demand
/// when the connection was never established.
#[derive(Clone)]
pub(crate) struct RedisHandle {
    url: String,
    manager: Arc<RwLock<Option<ConnectionManager>>>,
}

#[derive(Debug, Clone)]
pub(crate) enum RedisHealth {
    Healthy,
    Disconnected,
    Unhealthy(String),
}

impl RedisHandle {
    pub(crate) fn new(url: String) -> Self {
        Self { url, manager: Arc::new(RwLock::new(None)) }
    }

    pub(crate) async fn connect(&self) -> Result<(), RedisError> {
        let manager = self.open().await?;
        let mut guard = self.manager.write().await;
        *guard = Some(manager);
        Ok(())
    }

    pub(crate) async fn disconnect(&self) {
        let mut guard = self.manager.write().await;
        *guard = None;
    }

    pub(crate) async fn health(&self) -> RedisHealth {
        let manager = { self.manager.read().await.clone() };
        let Some(mut manager) = manager else {
            return RedisHealth::Disconnected;
        };

        match cmd("PING").query_async::<_, String>(&mut manager).await {
            Ok(_) => RedisHealth::Healthy,
            Err(err) => RedisHealth::Unhealthy(err.to_string()),
        }
    }

    /// `SET key value EX ttl`; last write wins.
    pub(crate) async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<(), RedisError> {
        let mut manager = self.connected().await?;
        cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_seconds)
            .query_async::<_, ()>(&mut manager)
            .await
    }

    /// `SET key value NX EX ttl`; returns `false` when the key already exists.
    pub(crate) async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<bool, RedisError> {
        let mut manager = self.connected().await?;
        let reply: Option<String> = cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut manager)
            .await?;
        Ok(reply.is_some())
    }

    pub(crate) async fn get(&self, key: &str) -> Result<Option<String>, RedisError> {
        let mut manager = self.connected().await?;
        cmd("GET").arg(key).query_async(&mut manager).await
    }

    pub(crate) async fn rate_limit(
        &self,
        key: &str,
        limit: u64,
        window_seconds: u64,
    ) -> Result<bool, RedisError> {
        let manager = { self.manager.read().await.clone() };
        let Some(mut manager) = manager else {
            return Ok(true);
        };

        let script = redis::Script::new(
            r#"
            local current = redis.call("INCR", KEYS[1])
            if current == 1 then
                redis.call("EXPIRE", KEYS[1], ARGV[1])
            end
            return current
        "#,
        );

        let current: i64 =
            script.key(key).arg(window_seconds as i64).invoke_async(&mut manager).await?;

        Ok(current <= limit as i64)
    }

    async fn connected(&self) -> Result<ConnectionManager, RedisError> {
        if let Some(manager) = self.manager.read().await.clone() {
            return Ok(manager);
        }

        let mut guard = self.manager.write().await;
        if let Some(manager) = guard.clone() {
            return Ok(manager);
        }

        let manager = self.open().await.map_err(|err| {
            tracing::warn!(error = %err, "Redis reconnect failed");
            err
        })?;
        *guard = Some(manager.clone());
        tracing::info!("Redis reconnected");
        Ok(manager)
    }

    async fn open(&self) -> Result<ConnectionManager, RedisError> {
        let client = Client::open(self.url.clone())?;
        tokio::time::timeout(CONNECT_TIMEOUT, ConnectionManager::new(client))
            .await
            .map_err(|_| RedisError::from((ErrorKind::IoError, "redis connect timed out")))?
    }
}

#[cfg(test)]
mod tests {
    use super::{RedisHandle, RedisHealth};
    use crate::core::config::Settings;
    use crate::test_support;
    use uuid::Uuid;

    #[tokio::test]
    async fn unreachable_server_fails_each_status_call() {
        let redis = RedisHandle::new("redis://127.0.0.1:1/0".to_string());

        assert!(redis.set_with_ttl("task_status:x", "{}", 10).await.is_err());
        assert!(redis.get("task_status:x").await.is_err());
        assert!(redis.set_if_absent("task_status:x", "{}", 10).await.is_err());
        assert!(redis.rate_limit("rl:x", 1, 5).await.expect("rate limit passes through"));
        assert!(matches!(redis.health().await, RedisHealth::Disconnected));
    }

    #[tokio::test]
    async fn invalid_url_is_reported_on_use() {
        let redis = RedisHandle::new("not-a-redis-url".to_string());

        assert!(redis.connect().await.is_err());
        assert!(redis.get("task_status:x").await.is_err());
    }

    #[tokio::test]
    #[ignore = "requires a running Redis instance"]
    async fn status_calls_connect_when_startup_connect_was_skipped() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();

        let settings = Settings::load().expect("settings");
        let redis = RedisHandle::new(settings.redis().redis_url());
        assert!(matches!(redis.health().await, RedisHealth::Disconnected));

        let key = format!("task_status:{}", Uuid::new_v4());
        redis.set_with_ttl(&key, "x", 30).await.expect("lazy connect");

        assert!(matches!(redis.health().await, RedisHealth::Healthy));
        assert_eq!(redis.get(&key).await.expect("get").as_deref(), Some("x"));
    }

    #[tokio::test]
    #[ignore = "requires a running Redis instance"]
    async fn set_if_absent_only_claims_once() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();

        let settings = Settings::load().expect("settings");
        let redis = RedisHandle::new(settings.redis().redis_url());
        redis.connect().await.expect("redis connect");

        let key = format!("task_status:{}", Uuid::new_v4());
        assert!(redis.set_if_absent(&key, "a", 30).await.expect("first claim"));
        assert!(!redis.set_if_absent(&key, "b", 30).await.expect("second claim"));
        assert_eq!(redis.get(&key).await.expect("get").as_deref(), Some("a"));
    }
}
