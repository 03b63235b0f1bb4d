//! SQLite-backed implementation of the recovery cache port.
//!
//! Entries are immutable once written: `put` replaces wholesale, reads
//! treat expired rows as absent, and eviction deletes. The capacity bound
//! is enforced at insert time so the table can never grow past
//! `max_entries` between sweeps.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::Row;
use stash_core::RecoveryCache;
use stash_domain::{
    CacheConfig, ProviderKind, RecoveryCacheEntry, Result as DomainResult, StashError,
};
use tokio::task;
use tracing::{debug, warn};

use super::manager::{map_sql_error, DbManager};

/// SQLite-backed recovery outcome cache.
pub struct SqliteRecoveryCache {
    db: Arc<DbManager>,
    config: CacheConfig,
}

impl SqliteRecoveryCache {
    /// Construct a cache backed by the shared database manager.
    pub fn new(db: Arc<DbManager>, config: CacheConfig) -> Self {
        Self { db, config }
    }

    /// Delete every entry whose TTL has lapsed at `now`. Returns the number
    /// of rows removed.
    pub async fn evict_expired(&self, now: i64) -> DomainResult<usize> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<usize> {
            let conn = db.get_connection()?;
            let evicted = conn
                .execute("DELETE FROM recovery_cache WHERE expires_at <= ?1", [now])
                .map_err(map_sql_error)?;

            if evicted > 0 {
                debug!(evicted, "expired recovery cache entries removed");
            }
            Ok(evicted)
        })
        .await
        .map_err(map_join_error)?
    }

    /// Evict oldest-first until the entry count is back at the configured
    /// ceiling. Returns the number of rows removed.
    pub async fn evict_over_capacity(&self) -> DomainResult<usize> {
        let db = Arc::clone(&self.db);
        let max_entries = self.config.max_entries;

        task::spawn_blocking(move || -> DomainResult<usize> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(map_sql_error)?;
            let evicted = evict_overflow(&tx, max_entries)?;
            tx.commit().map_err(map_sql_error)?;
            Ok(evicted)
        })
        .await
        .map_err(map_join_error)?
    }

    /// Current number of entries, expired ones included.
    pub async fn len(&self) -> DomainResult<u64> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<u64> {
            let conn = db.get_connection()?;
            conn.query_row("SELECT COUNT(*) FROM recovery_cache", [], |row| row.get(0))
                .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    /// Whether the cache currently holds no entries.
    pub async fn is_empty(&self) -> DomainResult<bool> {
        Ok(self.len().await? == 0)
    }
}

#[async_trait]
impl RecoveryCache for SqliteRecoveryCache {
    async fn get(&self, key: &str) -> DomainResult<Option<RecoveryCacheEntry>> {
        let db = Arc::clone(&self.db);
        let key = key.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<RecoveryCacheEntry>> {
            let conn = db.get_connection()?;
            let mut stmt = conn.prepare(CACHE_SELECT_SQL).map_err(map_sql_error)?;
            let mut rows =
                stmt.query_map([&key], map_cache_row).map_err(map_sql_error)?;

            let Some(entry) = rows.next() else {
                return Ok(None);
            };
            let entry = entry.map_err(map_sql_error)?;

            // Expired rows behave as absent; the sweeper deletes them later.
            if entry.is_expired(Utc::now().timestamp()) {
                return Ok(None);
            }
            Ok(Some(entry))
        })
        .await
        .map_err(map_join_error)?
    }

    async fn put(&self, entry: &RecoveryCacheEntry) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let max_entries = self.config.max_entries;
        let entry = entry.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(map_sql_error)?;

            tx.execute(
                CACHE_UPSERT_SQL,
                rusqlite::params![
                    entry.key,
                    entry.original_url,
                    entry.recovered_url,
                    entry.provider.map(|p| p.to_string()),
                    entry.created_at,
                    entry.expires_at,
                ],
            )
            .map_err(map_sql_error)?;

            evict_overflow(&tx, max_entries)?;
            tx.commit().map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

const CACHE_SELECT_SQL: &str =
    "SELECT key, original_url, recovered_url, provider, created_at, expires_at
    FROM recovery_cache
    WHERE key = ?1";

const CACHE_UPSERT_SQL: &str = "INSERT OR REPLACE INTO recovery_cache (
        key, original_url, recovered_url, provider, created_at, expires_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

const OVERFLOW_DELETE_SQL: &str = "DELETE FROM recovery_cache WHERE key IN (
        SELECT key FROM recovery_cache ORDER BY created_at ASC, key ASC LIMIT ?1
    )";

fn evict_overflow(conn: &rusqlite::Connection, max_entries: u64) -> DomainResult<usize> {
    let count: u64 = conn
        .query_row("SELECT COUNT(*) FROM recovery_cache", [], |row| row.get(0))
        .map_err(map_sql_error)?;

    if count <= max_entries {
        return Ok(0);
    }

    let overflow = count - max_entries;
    let evicted = conn
        .execute(OVERFLOW_DELETE_SQL, [overflow])
        .map_err(map_sql_error)?;

    debug!(evicted, "recovery cache capacity eviction");
    Ok(evicted)
}

fn map_cache_row(row: &Row<'_>) -> rusqlite::Result<RecoveryCacheEntry> {
    let key: String = row.get(0)?;
    let provider_raw: Option<String> = row.get(3)?;

    Ok(RecoveryCacheEntry {
        original_url: row.get(1)?,
        recovered_url: row.get(2)?,
        provider: provider_raw.as_deref().and_then(|raw| parse_provider(&key, raw)),
        created_at: row.get(4)?,
        expires_at: row.get(5)?,
        key,
    })
}

fn parse_provider(key: &str, raw: &str) -> Option<ProviderKind> {
    match raw.parse::<ProviderKind>() {
        Ok(provider) => Some(provider),
        Err(err) => {
            warn!(
                key = %key,
                raw_provider = %raw,
                error = %err,
                "invalid provider in recovery cache row"
            );
            None
        }
    }
}

fn map_join_error(err: task::JoinError) -> StashError {
    if err.is_cancelled() {
        StashError::Internal("recovery cache task cancelled".into())
    } else {
        StashError::Internal(format!("recovery cache task panic: {err}"))
    }
}
