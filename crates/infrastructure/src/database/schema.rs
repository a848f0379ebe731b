//! 内嵌的建表语句
//!
//! 每条语句单独执行，重复执行是安全的。

pub const POSTGRES_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS domains (
        id UUID PRIMARY KEY,
        registrable_domain TEXT NOT NULL UNIQUE,
        first_seen_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS scans (
        id UUID PRIMARY KEY,
        domain_id UUID NOT NULL REFERENCES domains(id),
        url TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'queued'
            CHECK (status IN ('queued', 'running', 'completed', 'failed')),
        progress DOUBLE PRECISION NOT NULL DEFAULT 0
            CHECK (progress >= 0 AND progress <= 1),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        started_at TIMESTAMPTZ,
        finished_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS scan_jobs (
        id UUID PRIMARY KEY,
        scan_id UUID NOT NULL UNIQUE REFERENCES scans(id) ON DELETE CASCADE,
        status TEXT NOT NULL DEFAULT 'queued'
            CHECK (status IN ('queued', 'running', 'completed', 'failed')),
        attempts INTEGER NOT NULL DEFAULT 0,
        queued_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        started_at TIMESTAMPTZ,
        finished_at TIMESTAMPTZ,
        last_error TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_scans_domain_id ON scans(domain_id)",
    "CREATE INDEX IF NOT EXISTS idx_scan_jobs_queued ON scan_jobs(queued_at) WHERE status = 'queued'",
];

/// SQLite 没有行锁，`seq` 提供稳定的先进先出顺序
pub const SQLITE_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS domains (
        id BLOB PRIMARY KEY,
        registrable_domain TEXT NOT NULL UNIQUE,
        first_seen_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS scans (
        id BLOB PRIMARY KEY,
        domain_id BLOB NOT NULL REFERENCES domains(id),
        url TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'queued'
            CHECK (status IN ('queued', 'running', 'completed', 'failed')),
        progress REAL NOT NULL DEFAULT 0
            CHECK (progress >= 0 AND progress <= 1),
        created_at TEXT NOT NULL,
        started_at TEXT,
        finished_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS scan_jobs (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id BLOB NOT NULL UNIQUE,
        scan_id BLOB NOT NULL UNIQUE REFERENCES scans(id) ON DELETE CASCADE,
        status TEXT NOT NULL DEFAULT 'queued'
            CHECK (status IN ('queued', 'running', 'completed', 'failed')),
        attempts INTEGER NOT NULL DEFAULT 0,
        queued_at TEXT NOT NULL,
        started_at TEXT,
        finished_at TEXT,
        last_error TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_scans_domain_id ON scans(domain_id)",
    "CREATE INDEX IF NOT EXISTS idx_scan_jobs_status_seq ON scan_jobs(status, seq)",
];
