pub mod schema;

use rusqlite::Connection;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Open or create a SQLite database at `path` and apply `schema`.
pub fn open(path: &Path, schema: &str) -> Result<Connection> {
  // Ensure parent directory exists
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent)?;
  }

  let conn = Connection::open(path)?;
  prepare(&conn, schema)?;
  Ok(conn)
}

/// Open a private in-memory database with `schema` applied.
pub fn open_in_memory(schema: &str) -> Result<Connection> {
  let conn = Connection::open_in_memory()?;
  prepare(&conn, schema)?;
  Ok(conn)
}

fn prepare(conn: &Connection, schema: &str) -> Result<()> {
  conn.execute_batch(schema)?;
  Ok(())
}

/// Get the default data directory
pub fn default_data_dir() -> Option<PathBuf> {
  dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .map(|p| p.join("collsync"))
}
