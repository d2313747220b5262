/// Schema for the job store.
///
/// `seq` defines creation order; `id` is the job's public identifier.
pub const JOBS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    action TEXT NOT NULL,
    payload TEXT NOT NULL,
    status TEXT NOT NULL,
    error TEXT,
    attempts INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status, seq);
"#;

/// Schema for the cache snapshot store.
pub const CACHE_SCHEMA: &str = r#"
-- Single row holding snapshot metadata
CREATE TABLE IF NOT EXISTS snapshot_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    synced_at TEXT,
    version INTEGER NOT NULL
);

-- One row per cached collection (serialized JSON, items included)
CREATE TABLE IF NOT EXISTS cached_collections (
    collection_id TEXT PRIMARY KEY,
    ordinal INTEGER NOT NULL,
    data BLOB NOT NULL
);
"#;
