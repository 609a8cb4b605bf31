/// Namespaced Redis cache with graceful degradation.
///
/// Every key is stored under `{namespace}:` so a whole namespace can be dropped with one
/// SCAN-based sweep. On any Redis error the operation logs a warning and reports a miss;
/// callers compute from source. The system is fully functional without Redis.
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

pub struct RedisCache {
    client: Option<redis::Client>,
    namespace: String,
}

impl RedisCache {
    /// Build a cache for `namespace`. A missing or unparseable URL yields a cache whose
    /// operations are all no-ops.
    pub fn new(url: Option<&str>, namespace: &str) -> Self {
        let client = url.and_then(|u| {
            redis::Client::open(u)
                .inspect_err(|e| warn!(error = %e, url = u, "failed to create redis client, cache disabled"))
                .ok()
        });
        Self {
            client,
            namespace: namespace.trim_end_matches(':').to_string(),
        }
    }

    /// A cache that never stores anything.
    pub fn disabled(namespace: &str) -> Self {
        Self::new(None, namespace)
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Send a PING. Returns `true` if Redis is reachable.
    pub async fn is_available(&self) -> bool {
        let Some(mut conn) = self.connection().await else {
            return false;
        };
        let result: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
        result.is_ok()
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}:{key}", self.namespace)
    }

    async fn connection(&self) -> Option<redis::aio::MultiplexedConnection> {
        let client = self.client.as_ref()?;
        client
            .get_multiplexed_async_connection()
            .await
            .inspect_err(|e| warn!(error = %e, "redis connection failed"))
            .ok()
    }

    /// Fetch and deserialize a JSON value. Misses, Redis failures and stale payloads that
    /// no longer deserialize all come back as `None`.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.connection().await?;
        let key = self.full_key(key);
        let raw: Option<String> = conn
            .get(&key)
            .await
            .inspect_err(|e| warn!(error = %e, key, "redis GET failed"))
            .ok()?;
        serde_json::from_str(&raw?)
            .inspect_err(|e| warn!(error = %e, key, "cache deserialization failed"))
            .ok()
    }

    /// Serialize and store a JSON value with a TTL in seconds. Returns `true` on success.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) -> bool {
        let Ok(json) = serde_json::to_string(value) else {
            return false;
        };
        let Some(mut conn) = self.connection().await else {
            return false;
        };
        let key = self.full_key(key);
        conn.set_ex::<_, _, ()>(&key, json, ttl_secs)
            .await
            .inspect_err(|e| warn!(error = %e, key, "redis SETEX failed"))
            .is_ok()
    }

    /// Delete every key in this namespace using SCAN (not KEYS, which blocks).
    pub async fn clear(&self) -> bool {
        let Some(mut conn) = self.connection().await else {
            return false;
        };

        let pattern = format!("{}:*", self.namespace);
        let mut cursor: u64 = 0;
        loop {
            let (next_cursor, keys): (u64, Vec<String>) = match redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    warn!(error = %e, pattern, "redis SCAN failed");
                    return false;
                }
            };

            if !keys.is_empty() {
                if let Err(e) = conn.del::<_, ()>(&keys).await {
                    warn!(error = %e, "redis batch DEL failed during namespace clear");
                    return false;
                }
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced() {
        let cache = RedisCache::disabled("rfp:v1:");
        assert_eq!(cache.full_key("search:abc"), "rfp:v1:search:abc");
        assert!(!cache.is_enabled());
    }

    #[tokio::test]
    async fn disabled_cache_always_misses() {
        let cache = RedisCache::disabled("rfp:v1");
        assert!(!cache.set_json("k", &vec![1, 2, 3], 60).await);
        assert_eq!(cache.get_json::<Vec<i32>>("k").await, None);
        assert!(!cache.is_available().await);
        assert!(!cache.clear().await);
    }
}
