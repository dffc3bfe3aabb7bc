//! Cycle mutual exclusion
//!
//! A refresh cycle must never overlap with another one for the same
//! deployment. `RedisCycleLock` leases a fixed key across instances,
//! `LocalCycleLock` guards a single process.
//!
//! # Redis lease
//! - `SET key token NX EX ttl` acquires
//! - release deletes the key only while it still holds our token, so a lease
//!   that expired and was re-acquired elsewhere is left alone

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{InsightError, Result};

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Proof of a held lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockLease {
    pub key: String,
    pub token: String,
}

#[async_trait]
pub trait CycleLock: Send + Sync {
    /// `None` when another holder owns the lock
    async fn try_acquire(&self) -> Result<Option<LockLease>>;

    async fn release(&self, lease: LockLease) -> Result<()>;
}

/// Redis-backed leased lock
#[derive(Clone)]
pub struct RedisCycleLock {
    conn: ConnectionManager,
    key: String,
    ttl: Duration,
}

impl RedisCycleLock {
    pub async fn connect(redis_url: &str, key: impl Into<String>, ttl: Duration) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Self::new(conn, key, ttl)
    }

    pub fn new(conn: ConnectionManager, key: impl Into<String>, ttl: Duration) -> Result<Self> {
        if ttl.as_secs() == 0 {
            return Err(InsightError::Lock("lock TTL must be at least one second".to_string()));
        }
        Ok(Self {
            conn,
            key: key.into(),
            ttl,
        })
    }
}

#[async_trait]
impl CycleLock for RedisCycleLock {
    async fn try_acquire(&self) -> Result<Option<LockLease>> {
        let token = Uuid::new_v4().to_string();
        let ttl = usize::try_from(self.ttl.as_secs())
            .map_err(|_| InsightError::Lock("lock TTL exceeds platform limits".to_string()))?;

        let mut conn = self.conn.clone();
        let acquired: bool = redis::cmd("SET")
            .arg(&self.key)
            .arg(&token)
            .arg("NX")
            .arg("EX")
            .arg(ttl)
            .query_async(&mut conn)
            .await?;

        if acquired {
            debug!(lock_key = %self.key, ttl_sec = ttl, "Acquired cycle lock");
            Ok(Some(LockLease {
                key: self.key.clone(),
                token,
            }))
        } else {
            debug!(lock_key = %self.key, "Cycle lock held elsewhere");
            Ok(None)
        }
    }

    async fn release(&self, lease: LockLease) -> Result<()> {
        let mut conn = self.conn.clone();
        let deleted: i64 = redis::Script::new(RELEASE_SCRIPT)
            .key(&lease.key)
            .arg(&lease.token)
            .invoke_async(&mut conn)
            .await?;

        if deleted == 0 {
            warn!(
                lock_key = %lease.key,
                "Cycle lock lease expired before release"
            );
        } else {
            debug!(lock_key = %lease.key, "Released cycle lock");
        }

        Ok(())
    }
}

/// In-process lock
///
/// Holds the token of the live lease; release with any other token is a
/// no-op, matching the Redis compare-and-delete.
#[derive(Debug)]
pub struct LocalCycleLock {
    key: String,
    holder: Mutex<Option<String>>,
}

impl LocalCycleLock {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            holder: Mutex::new(None),
        }
    }

    pub fn is_held(&self) -> bool {
        self.holder().is_some()
    }

    fn holder(&self) -> MutexGuard<'_, Option<String>> {
        self.holder.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CycleLock for LocalCycleLock {
    async fn try_acquire(&self) -> Result<Option<LockLease>> {
        let mut holder = self.holder();
        if holder.is_some() {
            return Ok(None);
        }

        let token = Uuid::new_v4().to_string();
        *holder = Some(token.clone());
        Ok(Some(LockLease {
            key: self.key.clone(),
            token,
        }))
    }

    async fn release(&self, lease: LockLease) -> Result<()> {
        if lease.key != self.key {
            return Err(InsightError::Lock(format!(
                "lease for {} released on {}",
                lease.key, self.key
            )));
        }

        let mut holder = self.holder();
        if holder.as_deref() == Some(lease.token.as_str()) {
            *holder = None;
            debug!(lock_key = %self.key, "Released cycle lock");
        } else {
            warn!(lock_key = %self.key, "Ignoring release of a stale cycle lock lease");
        }
        Ok(())
    }
}
