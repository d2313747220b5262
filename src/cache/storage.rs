//! SQLite storage for the cache snapshot.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use crate::db::{self, schema::CACHE_SCHEMA};
use crate::error::Result;

use super::model::{CacheSnapshot, Collection};

/// Durable home of the cache snapshot.
///
/// Writes always replace the whole snapshot inside one transaction.
pub struct CacheStore {
  conn: Mutex<Connection>,
}

impl CacheStore {
  /// Open or create the cache store at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    Ok(Self {
      conn: Mutex::new(db::open(path, CACHE_SCHEMA)?),
    })
  }

  pub fn open_in_memory() -> Result<Self> {
    Ok(Self {
      conn: Mutex::new(db::open_in_memory(CACHE_SCHEMA)?),
    })
  }

  /// Load the stored snapshot, or `None` if nothing was ever written.
  pub fn load(&self) -> Result<Option<CacheSnapshot>> {
    let conn = self.conn.lock()?;

    let meta: Option<(Option<String>, u64)> = conn
      .query_row(
        "SELECT synced_at, version FROM snapshot_meta WHERE id = 1",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()?;

    let Some((synced_at, version)) = meta else {
      return Ok(None);
    };

    let synced_at = synced_at
      .map(|s| DateTime::parse_from_rfc3339(&s).map(|dt| dt.with_timezone(&Utc)))
      .transpose()
      .map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
      })?;

    let mut stmt = conn.prepare("SELECT data FROM cached_collections ORDER BY ordinal")?;
    let collections = stmt
      .query_map([], |row| row.get::<_, Vec<u8>>(0))?
      .map(|data| -> Result<Collection> { Ok(serde_json::from_slice(&data?)?) })
      .collect::<Result<Vec<_>>>()?;

    Ok(Some(CacheSnapshot {
      collections,
      synced_at,
      version,
    }))
  }

  /// Replace the stored snapshot with `snapshot`.
  pub fn replace(&self, snapshot: &CacheSnapshot) -> Result<()> {
    let rows = snapshot
      .collections
      .iter()
      .map(|c| -> Result<(String, Vec<u8>)> { Ok((c.id.clone(), serde_json::to_vec(c)?)) })
      .collect::<Result<Vec<_>>>()?;

    let mut conn = self.conn.lock()?;
    let tx = conn.transaction()?;

    tx.execute("DELETE FROM cached_collections", [])?;
    {
      let mut stmt = tx.prepare(
        "INSERT OR REPLACE INTO cached_collections (collection_id, ordinal, data) VALUES (?, ?, ?)",
      )?;
      for (ordinal, (id, data)) in rows.iter().enumerate() {
        stmt.execute(params![id, ordinal, data])?;
      }
    }
    tx.execute(
      "INSERT OR REPLACE INTO snapshot_meta (id, synced_at, version) VALUES (1, ?, ?)",
      params![
        snapshot
          .synced_at
          .map(|at| at.to_rfc3339_opts(SecondsFormat::Nanos, true)),
        snapshot.version,
      ],
    )?;

    tx.commit()?;
    Ok(())
  }
}
