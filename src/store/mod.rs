//! # Prefix Store
//!
//! The durable index of 4-byte hash prefixes (spec.md §4.1). Backed by
//! PostgreSQL through [`pool::ConnectionPool`]. The Updater is the sole
//! writer; the Lookup Pipeline only reads.
//!
//! Batch fan-out is grounded in `examples/original_source/services/get_prefix_hash.go`'s
//! `AddWorker`/`RemoveWorker`: a bounded channel feeds a fixed pool of
//! workers, each accumulating a local buffer of `BATCH_SIZE` before
//! issuing one statement and clearing the buffer — translated from Go
//! channels + `sync.WaitGroup` into `tokio::sync::mpsc` + spawned tasks
//! joined with `futures::future::join_all`.

pub mod pool;

use futures::future::join_all;
use pool::ConnectionPool;
use std::time::Instant;
use tokio::sync::mpsc;

use crate::error::AppError;

/// Number of concurrent workers draining the insert/delete channel (spec.md §5).
const NUM_WORKERS: usize = 10;

/// Rows accumulated per worker before a batch statement is issued (spec.md §4.1).
const BATCH_SIZE: usize = 100;

/// A single row to be inserted: base64-encoded 4-byte prefix plus its assigned index.
#[derive(Debug, Clone)]
pub struct PrefixEntry {
    pub prefix: String,
    pub index: i64,
}

/// Durable index of hash prefixes.
#[derive(Clone)]
pub struct PrefixStore {
    pool: ConnectionPool,
}

impl PrefixStore {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Insert a batch of `(prefix, index)` pairs, conflict-do-nothing on
    /// an existing `prefix_hash`. Never leaves a half-applied batch
    /// visible: each worker's flush is one atomic `INSERT ... ON CONFLICT`
    /// statement, so partial failure only ever drops whole 100-row
    /// chunks, never a fraction of one.
    pub async fn insert_batch(&self, entries: Vec<PrefixEntry>) -> Result<(), AppError> {
        if entries.is_empty() {
            return Ok(());
        }

        let (tx, rx) = mpsc::channel::<PrefixEntry>(NUM_WORKERS);
        let mut workers = Vec::with_capacity(NUM_WORKERS);
        let rx = std::sync::Arc::new(tokio::sync::Mutex::new(rx));

        for _ in 0..NUM_WORKERS {
            let pool = self.pool.clone();
            let rx = rx.clone();
            workers.push(tokio::spawn(async move {
                let mut buffer: Vec<PrefixEntry> = Vec::with_capacity(BATCH_SIZE);
                loop {
                    let item = {
                        let mut rx = rx.lock().await;
                        rx.recv().await
                    };
                    match item {
                        Some(entry) => {
                            buffer.push(entry);
                            if buffer.len() >= BATCH_SIZE {
                                flush_insert(&pool, &mut buffer).await;
                            }
                        }
                        None => {
                            if !buffer.is_empty() {
                                flush_insert(&pool, &mut buffer).await;
                            }
                            break;
                        }
                    }
                }
            }));
        }

        for entry in entries {
            // Channel capacity is bounded per spec.md §5; a full channel
            // back-pressures the producer rather than growing unbounded.
            if tx.send(entry).await.is_err() {
                break;
            }
        }
        drop(tx);

        join_all(workers).await;
        Ok(())
    }

    /// Delete rows whose `index` appears in `indices`. Unknown indices are
    /// silently ignored (a plain `DELETE ... WHERE index = ANY($1)` already
    /// has this property — no row matches, no error).
    pub async fn delete_by_indices(&self, indices: Vec<i64>) -> Result<(), AppError> {
        if indices.is_empty() {
            return Ok(());
        }

        let (tx, rx) = mpsc::channel::<i64>(NUM_WORKERS);
        let mut workers = Vec::with_capacity(NUM_WORKERS);
        let rx = std::sync::Arc::new(tokio::sync::Mutex::new(rx));

        for _ in 0..NUM_WORKERS {
            let pool = self.pool.clone();
            let rx = rx.clone();
            workers.push(tokio::spawn(async move {
                let mut buffer: Vec<i64> = Vec::with_capacity(BATCH_SIZE);
                loop {
                    let item = {
                        let mut rx = rx.lock().await;
                        rx.recv().await
                    };
                    match item {
                        Some(idx) => {
                            buffer.push(idx);
                            if buffer.len() >= BATCH_SIZE {
                                flush_delete(&pool, &mut buffer).await;
                            }
                        }
                        None => {
                            if !buffer.is_empty() {
                                flush_delete(&pool, &mut buffer).await;
                            }
                            break;
                        }
                    }
                }
            }));
        }

        for idx in indices {
            if tx.send(idx).await.is_err() {
                break;
            }
        }
        drop(tx);

        join_all(workers).await;
        Ok(())
    }

    /// Return the subset of `prefixes` present in the store.
    pub async fn exists_in(&self, prefixes: &[String]) -> Result<std::collections::HashSet<String>, AppError> {
        if prefixes.is_empty() {
            return Ok(std::collections::HashSet::new());
        }

        let start = Instant::now();
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT prefix_hash FROM hash_entries WHERE prefix_hash = ANY($1) AND deleted_at IS NULL",
        )
        .bind(prefixes)
        .fetch_all(self.pool.inner())
        .await
        .map_err(|e| {
            self.pool.record(start.elapsed(), true);
            AppError::StoreError(format!("exists_in query failed: {e}"))
        })?;
        self.pool.record(start.elapsed(), false);

        Ok(rows.into_iter().map(|(p,)| p).collect())
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }
}

async fn flush_insert(pool: &ConnectionPool, buffer: &mut Vec<PrefixEntry>) {
    let start = Instant::now();

    let prefixes: Vec<&str> = buffer.iter().map(|e| e.prefix.as_str()).collect();
    let indices: Vec<i64> = buffer.iter().map(|e| e.index).collect();

    let result = sqlx::query(
        r#"
        INSERT INTO hash_entries (prefix_hash, index)
        SELECT * FROM UNNEST($1::text[], $2::bigint[])
        ON CONFLICT (prefix_hash) DO NOTHING
        "#,
    )
    .bind(&prefixes)
    .bind(&indices)
    .execute(pool.inner())
    .await;

    pool.record(start.elapsed(), result.is_err());
    if let Err(e) = result {
        tracing::error!(error = %e, batch_size = buffer.len(), "failed to insert prefix batch");
    }

    buffer.clear();
}

async fn flush_delete(pool: &ConnectionPool, buffer: &mut Vec<i64>) {
    let start = Instant::now();

    let result = sqlx::query("DELETE FROM hash_entries WHERE index = ANY($1)")
        .bind(&buffer[..])
        .execute(pool.inner())
        .await;

    pool.record(start.elapsed(), result.is_err());
    if let Err(e) = result {
        tracing::error!(error = %e, batch_size = buffer.len(), "failed to delete prefix batch");
    }

    buffer.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_entry_carries_index() {
        let entry = PrefixEntry {
            prefix: "YWJjZA==".to_string(),
            index: 42,
        };
        assert_eq!(entry.index, 42);
        assert_eq!(entry.prefix, "YWJjZA==");
    }
}
