//! Connection pool management for the Prefix Store.
//!
//! Ported from the teacher's `database/connection_pool.rs`: same wrapper
//! shape (a pool handle plus statistics plus a background health-check
//! task), retargeted from SQLite to PostgreSQL per spec.md §6's
//! persisted-state layout and §5's `max_open=20-50` / `max_idle=10-25` /
//! `conn_lifetime≈5 min` resource limits.

use parking_lot::RwLock;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::interval;

use crate::error::AppError;

/// Database configuration, sized per spec.md §5's resource limits.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
    pub connect_timeout: u64,
    pub idle_timeout: u64,
    pub max_lifetime: u64,
    pub health_check_interval: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            min_connections: 10,
            max_connections: 50,
            connect_timeout: 30,
            idle_timeout: 600,
            max_lifetime: 300,
            health_check_interval: 60,
        }
    }
}

/// Connection pool statistics.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    pub total_queries: u64,
    pub total_errors: u64,
    pub avg_query_time_us: u64,
    pub last_health_check: Option<Instant>,
    pub is_healthy: bool,
}

/// Connection pool with health monitoring, wrapping `sqlx::PgPool`.
#[derive(Clone)]
pub struct ConnectionPool {
    pool: PgPool,
    config: DatabaseConfig,
    stats: Arc<RwLock<PoolStats>>,
}

impl ConnectionPool {
    /// Connect and run pending migrations.
    pub async fn connect(config: DatabaseConfig) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout)))
            .max_lifetime(Some(Duration::from_secs(config.max_lifetime)))
            .connect(&config.url)
            .await
            .map_err(|e| AppError::StoreError(format!("failed to connect to database: {e}")))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| AppError::StoreError(format!("migration failed: {e}")))?;

        let pool_instance = Self {
            pool,
            config: config.clone(),
            stats: Arc::new(RwLock::new(PoolStats {
                is_healthy: true,
                ..Default::default()
            })),
        };

        pool_instance.start_health_check_task();

        Ok(pool_instance)
    }

    /// Access the underlying sqlx pool.
    pub fn inner(&self) -> &PgPool {
        &self.pool
    }

    /// Record latency and error stats for a query issued against `inner()`.
    pub fn record(&self, elapsed: Duration, is_error: bool) {
        let mut stats = self.stats.write();
        stats.total_queries += 1;
        if is_error {
            stats.total_errors += 1;
        }
        let us = elapsed.as_micros() as u64;
        stats.avg_query_time_us = if stats.total_queries == 1 {
            us
        } else {
            (stats.avg_query_time_us * 9 + us) / 10
        };
    }

    /// Run a lightweight connectivity probe.
    pub async fn health_check(&self) -> Result<bool, AppError> {
        let result = sqlx::query("SELECT 1").execute(&self.pool).await;
        let is_healthy = result.is_ok();

        let mut stats = self.stats.write();
        stats.last_health_check = Some(Instant::now());
        stats.is_healthy = is_healthy;

        Ok(is_healthy)
    }

    pub fn stats(&self) -> PoolStats {
        self.stats.read().clone()
    }

    fn start_health_check_task(&self) {
        let pool = self.clone();
        let check_interval = Duration::from_secs(self.config.health_check_interval);

        tokio::spawn(async move {
            let mut ticker = interval(check_interval);
            loop {
                ticker.tick().await;
                if let Err(e) = pool.health_check().await {
                    tracing::error!(error = %e, "prefix store health check failed");
                }
            }
        });
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
