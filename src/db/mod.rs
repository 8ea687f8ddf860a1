pub mod schema;

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

use crate::backend::types::Session;

/// On-disk store for the signed-in session
pub struct SessionStore {
  conn: Mutex<Connection>,
}

impl SessionStore {
  /// Open or create the store at the default location
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create database directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open database at {}: {}", path.display(), e))?;
    Self::with_connection(conn)
  }

  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(schema::SCHEMA)
      .map_err(|e| eyre!("Failed to run migrations: {}", e))?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// Get the default database path
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("notefie").join("session.db"))
  }

  fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  /// Stored session, if any. A row that no longer parses is dropped.
  pub fn load(&self) -> Result<Option<Session>> {
    let conn = self.conn()?;
    let data: Option<String> = conn
      .query_row("SELECT data FROM session WHERE id = 1", [], |row| row.get(0))
      .optional()
      .map_err(|e| eyre!("Failed to read session: {}", e))?;

    let Some(data) = data else {
      return Ok(None);
    };
    match serde_json::from_str(&data) {
      Ok(session) => Ok(Some(session)),
      Err(e) => {
        warn!(error = %e, "discarding unreadable stored session");
        conn
          .execute("DELETE FROM session", [])
          .map_err(|e| eyre!("Failed to clear session: {}", e))?;
        Ok(None)
      }
    }
  }

  pub fn save(&self, session: &Session) -> Result<()> {
    let data =
      serde_json::to_string(session).map_err(|e| eyre!("Failed to serialize session: {}", e))?;
    self
      .conn()?
      .execute(
        "INSERT OR REPLACE INTO session (id, data, saved_at) VALUES (1, ?, datetime('now'))",
        params![data],
      )
      .map_err(|e| eyre!("Failed to store session: {}", e))?;
    Ok(())
  }

  pub fn clear(&self) -> Result<()> {
    self
      .conn()?
      .execute("DELETE FROM session", [])
      .map_err(|e| eyre!("Failed to clear session: {}", e))?;
    Ok(())
  }
}
