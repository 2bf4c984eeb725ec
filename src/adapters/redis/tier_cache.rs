//! Redis-backed tier cache for multi-instance deployments.
//!
//! Each account has two keys:
//! - `<prefix><user_id>:tier` holds the JSON-encoded `EffectiveTier`, written
//!   with a millisecond expiry so a grant's remaining lifetime is honoured
//! - `<prefix><user_id>:gen` counts invalidations
//!
//! Invalidation deletes the entry and increments the counter in one
//! transaction. `put` runs as a script that writes only while the counter
//! still matches the reader's generation, so the check and the write cannot
//! interleave with an invalidation on another instance.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Script;
use std::time::Duration;

use crate::domain::entitlement::EffectiveTier;
use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::ports::{CacheLookup, TierCache};

/// Default idle lifetime of a generation counter. Refreshed by every invalidation.
pub const DEFAULT_GENERATION_TTL: Duration = Duration::from_secs(86_400);

const PUT_IF_CURRENT: &str = r#"
local current = tonumber(redis.call('GET', KEYS[2]) or '0')
if current > tonumber(ARGV[2]) then
    return 0
end
redis.call('SET', KEYS[1], ARGV[1], 'PX', ARGV[3])
return 1
"#;

#[derive(Clone)]
pub struct RedisTierCache {
    conn: MultiplexedConnection,
    key_prefix: String,
    generation_ttl_secs: i64,
    put_script: Script,
}

impl RedisTierCache {
    pub fn new(conn: MultiplexedConnection, key_prefix: impl Into<String>) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.into(),
            generation_ttl_secs: DEFAULT_GENERATION_TTL.as_secs() as i64,
            put_script: Script::new(PUT_IF_CURRENT),
        }
    }

    pub fn with_generation_ttl(mut self, ttl: Duration) -> Self {
        self.generation_ttl_secs = ttl.as_secs().max(1) as i64;
        self
    }

    fn keys(&self, user_id: &UserId) -> (String, String) {
        cache_keys(&self.key_prefix, user_id)
    }
}

fn cache_keys(prefix: &str, user_id: &UserId) -> (String, String) {
    (
        format!("{}{}:tier", prefix, user_id.as_str()),
        format!("{}{}:gen", prefix, user_id.as_str()),
    )
}

fn cache_error(op: &str, e: impl std::fmt::Display) -> DomainError {
    DomainError::new(ErrorCode::CacheError, format!("Tier cache {} failed: {}", op, e))
}

#[async_trait]
impl TierCache for RedisTierCache {
    async fn get(&self, user_id: &UserId) -> Result<CacheLookup, DomainError> {
        let (tier_key, gen_key) = self.keys(user_id);
        let mut conn = self.conn.clone();
        let (raw, generation): (Option<String>, Option<u64>) = redis::cmd("MGET")
            .arg(&tier_key)
            .arg(&gen_key)
            .query_async(&mut conn)
            .await
            .map_err(|e| cache_error("read", e))?;
        let generation = generation.unwrap_or(0);

        match raw {
            Some(json) => match serde_json::from_str(&json) {
                Ok(tier) => Ok(CacheLookup::Hit(tier)),
                Err(e) => {
                    // Treat an unreadable entry as a miss; the next put overwrites it.
                    tracing::warn!(user_id = %user_id, error = %e, "Discarding unreadable cached tier");
                    Ok(CacheLookup::Miss { generation })
                }
            },
            None => Ok(CacheLookup::Miss { generation }),
        }
    }

    async fn put(
        &self,
        user_id: &UserId,
        tier: &EffectiveTier,
        generation: u64,
        ttl: Duration,
    ) -> Result<bool, DomainError> {
        let millis = ttl.as_millis() as u64;
        if millis == 0 {
            return Ok(false);
        }
        let json = serde_json::to_string(tier).map_err(|e| cache_error("encode", e))?;
        let (tier_key, gen_key) = self.keys(user_id);

        let mut conn = self.conn.clone();
        let written: i64 = self
            .put_script
            .key(tier_key)
            .key(gen_key)
            .arg(json)
            .arg(generation)
            .arg(millis)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| cache_error("write", e))?;

        Ok(written == 1)
    }

    async fn invalidate(&self, user_id: &UserId) -> Result<(), DomainError> {
        let (tier_key, gen_key) = self.keys(user_id);
        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .del(&tier_key)
            .ignore()
            .incr(&gen_key, 1)
            .ignore()
            .expire(&gen_key, self.generation_ttl_secs)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| cache_error("invalidate", e))
    }
}
