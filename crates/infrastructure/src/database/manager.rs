use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use scanner_core::{DatabaseConfig, ScannerError, ScannerResult};
use scanner_domain::repositories::{DomainRepository, JobRepository, ScanRepository};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use tracing::info;

use super::postgres::PostgresScanStore;
use super::schema::{POSTGRES_SCHEMA, SQLITE_SCHEMA};
use super::sqlite::SqliteScanStore;

/// Database type detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    PostgreSQL,
    SQLite,
}

impl DatabaseType {
    pub fn from_url(url: &str) -> Self {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            DatabaseType::PostgreSQL
        } else {
            DatabaseType::SQLite
        }
    }
}

/// Database connection pool enum
#[derive(Clone)]
pub enum DatabasePool {
    PostgreSQL(sqlx::PgPool),
    SQLite(sqlx::SqlitePool),
}

impl DatabasePool {
    /// Create pool from config with automatic type detection
    pub async fn new(config: &DatabaseConfig) -> ScannerResult<Self> {
        match DatabaseType::from_url(&config.url) {
            DatabaseType::PostgreSQL => {
                let pool = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .min_connections(config.min_connections)
                    .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
                    .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
                    .connect(&config.url)
                    .await?;
                Ok(DatabasePool::PostgreSQL(pool))
            }
            DatabaseType::SQLite => {
                // WAL 允许多个连接并发读，写入由 busy_timeout 串行化
                let options = SqliteConnectOptions::from_str(&config.url)?
                    .create_if_missing(true)
                    .foreign_keys(true)
                    .journal_mode(SqliteJournalMode::Wal)
                    .busy_timeout(Duration::from_secs(config.connection_timeout_seconds));

                let pool = sqlx::sqlite::SqlitePoolOptions::new()
                    .max_connections(config.max_connections)
                    .min_connections(config.min_connections)
                    .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
                    .connect_with(options)
                    .await?;
                Ok(DatabasePool::SQLite(pool))
            }
        }
    }

    pub fn database_type(&self) -> DatabaseType {
        match self {
            DatabasePool::PostgreSQL(_) => DatabaseType::PostgreSQL,
            DatabasePool::SQLite(_) => DatabaseType::SQLite,
        }
    }

    pub async fn health_check(&self) -> ScannerResult<()> {
        match self {
            DatabasePool::PostgreSQL(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
            }
            DatabasePool::SQLite(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
            }
        }
        Ok(())
    }

    pub async fn close(&self) {
        match self {
            DatabasePool::PostgreSQL(pool) => pool.close().await,
            DatabasePool::SQLite(pool) => pool.close().await,
        }
    }
}

/// 统一的数据库管理器，负责连接、建表与仓储创建
pub struct DatabaseManager {
    pool: DatabasePool,
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig) -> ScannerResult<Self> {
        let pool = DatabasePool::new(config).await?;
        info!("数据库连接池已创建: {:?}", pool.database_type());
        Ok(Self { pool })
    }

    pub fn from_pool(pool: DatabasePool) -> Self {
        Self { pool }
    }

    pub fn database_type(&self) -> DatabaseType {
        self.pool.database_type()
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// 创建 domains、scans、scan_jobs 三张表
    pub async fn migrate(&self) -> ScannerResult<()> {
        match &self.pool {
            DatabasePool::PostgreSQL(pool) => {
                for statement in POSTGRES_SCHEMA {
                    sqlx::query(statement).execute(pool).await.map_err(|e| {
                        ScannerError::database_error(format!("数据库迁移失败: {e}"))
                    })?;
                }
            }
            DatabasePool::SQLite(pool) => {
                for statement in SQLITE_SCHEMA {
                    sqlx::query(statement).execute(pool).await.map_err(|e| {
                        ScannerError::database_error(format!("数据库迁移失败: {e}"))
                    })?;
                }
            }
        }
        info!("数据库迁移完成");
        Ok(())
    }

    pub async fn health_check(&self) -> ScannerResult<()> {
        self.pool.health_check().await
    }

    pub async fn close(&self) {
        self.pool.close().await
    }

    pub fn domain_repository(&self) -> Arc<dyn DomainRepository> {
        match &self.pool {
            DatabasePool::PostgreSQL(pool) => Arc::new(PostgresScanStore::new(pool.clone())),
            DatabasePool::SQLite(pool) => Arc::new(SqliteScanStore::new(pool.clone())),
        }
    }

    pub fn scan_repository(&self) -> Arc<dyn ScanRepository> {
        match &self.pool {
            DatabasePool::PostgreSQL(pool) => Arc::new(PostgresScanStore::new(pool.clone())),
            DatabasePool::SQLite(pool) => Arc::new(SqliteScanStore::new(pool.clone())),
        }
    }

    pub fn job_repository(&self) -> Arc<dyn JobRepository> {
        match &self.pool {
            DatabasePool::PostgreSQL(pool) => Arc::new(PostgresScanStore::new(pool.clone())),
            DatabasePool::SQLite(pool) => Arc::new(SqliteScanStore::new(pool.clone())),
        }
    }
}
