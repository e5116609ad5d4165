//! # Cache
//!
//! The ephemeral key/value + set store backing full-hash verdicts,
//! per-list threat cursors, the index counter, and the prefix-membership
//! bloom set (spec.md §3, §4.6). A single Redis tier — unlike the
//! teacher's `database/cache.rs`, which layers L1 (moka)/L2 (sled)/L3
//! (redis), spec.md names Redis as the sole cache authority and the
//! Prefix Store (not a local disk tier) backs durability, so the L1/L2
//! tiers are dropped here (see DESIGN.md).

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

use crate::error::AppError;

/// Cache key builder for consistent key generation, ported from the
/// teacher's `CacheKeyBuilder`.
pub struct CacheKeyBuilder {
    parts: Vec<String>,
}

impl CacheKeyBuilder {
    pub fn new() -> Self {
        Self { parts: Vec::new() }
    }

    pub fn part(mut self, part: impl ToString) -> Self {
        self.parts.push(part.to_string());
        self
    }

    pub fn build(self) -> String {
        self.parts.join(":")
    }
}

impl Default for CacheKeyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache key prefix for Safe-Browsing-confirmed full-hash verdicts.
pub const FULL_HASH_PREFIX: &str = "fullHash";

/// Cache key for the prefix-membership mirror set (spec.md's `PrefixMembershipSet`).
pub const PREFIX_HASHES_SET: &str = "prefixHashes";

/// Cache key for the monotonic index counter.
pub const IDX_KEY: &str = "idx";

/// Cache key for a per-list threat cursor.
pub fn state_key(list: &str) -> String {
    CacheKeyBuilder::new().part("state").part(list).build()
}

/// Cache key for a Safe-Browsing-confirmed full-hash verdict.
pub fn full_hash_key(hash: &str) -> String {
    CacheKeyBuilder::new().part(FULL_HASH_PREFIX).part(hash).build()
}

/// Thin typed wrapper over a shared Redis connection manager.
#[derive(Clone)]
pub struct Cache {
    conn: ConnectionManager,
}

impl Cache {
    pub async fn connect(redis_url: &str) -> Result<Self, AppError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| AppError::StoreError(format!("invalid redis url: {e}")))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::StoreError(format!("failed to connect to redis: {e}")))?;

        let cache = Self { conn };
        cache.seed_defaults().await?;
        Ok(cache)
    }

    /// Seed `idx` and the three per-list cursors to their documented
    /// initial values (spec.md §3), mirroring `store/store.go`'s
    /// `ConnectRedis` which `SetNX`s the same four keys at connect time.
    async fn seed_defaults(&self) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let _: bool = conn.set_nx(IDX_KEY, 0i64).await?;
        for list in ["MALWARE", "SOCIAL_ENGINEERING", "UNWANTED_SOFTWARE"] {
            let _: bool = conn.set_nx(state_key(list), "").await?;
        }
        Ok(())
    }

    /// `GET key`.
    pub async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    /// `SET key value EX ttl_secs`. A `ttl` of `None` sets with no expiry.
    pub async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) => {
                let _: () = conn.set_ex(key, value, ttl.as_secs()).await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }
        Ok(())
    }

    /// `SETNX key value` — atomic set-if-absent, no TTL (used for BlacklistEntry writes).
    pub async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, AppError> {
        let mut conn = self.conn.clone();
        let set: bool = conn.set_nx(key, value).await?;
        Ok(set)
    }

    /// Read the `idx` counter.
    pub async fn get_idx(&self) -> Result<i64, AppError> {
        let mut conn = self.conn.clone();
        let value: Option<i64> = conn.get(IDX_KEY).await?;
        Ok(value.unwrap_or(0))
    }

    /// Persist the `idx` counter.
    pub async fn set_idx(&self, value: i64) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(IDX_KEY, value).await?;
        Ok(())
    }

    /// `SADD prefixHashes member...`.
    pub async fn add_prefix_members(&self, prefixes: &[String]) -> Result<(), AppError> {
        if prefixes.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = conn.sadd(PREFIX_HASHES_SET, prefixes).await?;
        Ok(())
    }

    /// `SMISMEMBER prefixHashes member...` — parallel membership test.
    pub async fn prefix_members(&self, prefixes: &[String]) -> Result<Vec<bool>, AppError> {
        if prefixes.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let result: Vec<bool> = conn.smismember(PREFIX_HASHES_SET, prefixes).await?;
        Ok(result)
    }

    /// Execute a best-effort pipeline: failures are logged, never propagated,
    /// since every write in this system is idempotent (spec.md §4.6).
    pub async fn pipeline_set_ex(&self, entries: Vec<(String, String, Duration)>) {
        if entries.is_empty() {
            return;
        }
        let mut pipe = redis::pipe();
        for (key, value, ttl) in &entries {
            pipe.set_ex(key, value, ttl.as_secs());
        }

        let mut conn = self.conn.clone();
        let result: Result<(), redis::RedisError> = pipe.query_async(&mut conn).await;
        if let Err(e) = result {
            tracing::warn!(error = %e, count = entries.len(), "cache pipeline failed, relying on next cycle");
        }
    }

    /// Execute a best-effort set-if-absent pipeline (used by the Blacklist Loader).
    pub async fn pipeline_set_nx(&self, entries: Vec<(String, String)>) {
        if entries.is_empty() {
            return;
        }
        let mut pipe = redis::pipe();
        for (key, value) in &entries {
            pipe.cmd("SETNX").arg(key).arg(value);
        }

        let mut conn = self.conn.clone();
        let result: Result<(), redis::RedisError> = pipe.query_async(&mut conn).await;
        if let Err(e) = result {
            tracing::warn!(error = %e, count = entries.len(), "blacklist pipeline failed, batch skipped");
        }
    }

    /// Stage and atomically apply the per-list cursor advancement at the
    /// end of an update cycle (spec.md §4.3 step 4: "execute the cursor
    /// pipeline atomically").
    pub async fn advance_cursors(&self, cursors: Vec<(String, String)>) -> Result<(), AppError> {
        if cursors.is_empty() {
            return Ok(());
        }
        let mut pipe = redis::pipe();
        for (list, new_state) in &cursors {
            pipe.set(state_key(list), new_state);
        }

        let mut conn = self.conn.clone();
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::StoreError(format!("cursor pipeline failed: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_builder_joins_with_colon() {
        let key = CacheKeyBuilder::new().part("fullHash").part("abc123").build();
        assert_eq!(key, "fullHash:abc123");
    }

    #[test]
    fn full_hash_key_matches_spec_convention() {
        assert_eq!(full_hash_key("XXX"), "fullHash:XXX");
    }

    #[test]
    fn state_key_matches_spec_convention() {
        assert_eq!(state_key("MALWARE"), "state:MALWARE");
    }
}
