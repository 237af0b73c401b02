//! SQLite-backed snapshot store.
//!
//! Channels are stored whole as JSON, keyed by cid. Filters are evaluated in
//! Rust after loading so local results use exactly the same predicate as
//! the live view.

use crate::{select, SnapshotStore, StoreError, StoreResult};
use async_trait::async_trait;
use chanlist_query::ChannelListQuery;
use chanlist_types::Channel;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Persistent snapshot store backed by SQLite.
#[derive(Clone)]
pub struct SqliteSnapshotStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSnapshotStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS channels (
                cid TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                body TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS channels_kind ON channels (kind);
            ",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Number of stored channels.
    pub fn count(&self) -> StoreResult<usize> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM channels", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    fn load_all(conn: &Connection) -> StoreResult<Vec<Channel>> {
        let mut stmt = conn.prepare("SELECT body FROM channels")?;
        let bodies = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        bodies
            .iter()
            .map(|body| serde_json::from_str(body).map_err(StoreError::from))
            .collect()
    }

    fn upsert_all(conn: &mut Connection, channels: &[Channel]) -> StoreResult<()> {
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO channels (cid, kind, updated_at, body) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(cid) DO UPDATE SET
                    kind = excluded.kind,
                    updated_at = excluded.updated_at,
                    body = excluded.body",
            )?;
            for channel in channels {
                stmt.execute(params![
                    channel.key.to_string(),
                    channel.key.kind,
                    channel.updated_at.as_millis(),
                    serde_json::to_string(channel)?,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn fetch_local(&self, query: &ChannelListQuery) -> StoreResult<Vec<Channel>> {
        let conn = Arc::clone(&self.conn);
        let query = query.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StoreError::Poisoned)?;
            let all = Self::load_all(&conn)?;
            let selected = select(&query, all);
            debug!("Loaded {} local channels for query", selected.len());
            Ok(selected)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    async fn persist(&self, channels: Vec<Channel>) -> StoreResult<()> {
        if channels.is_empty() {
            return Ok(());
        }
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| StoreError::Poisoned)?;
            Self::upsert_all(&mut conn, &channels)?;
            debug!("Persisted {} channels", channels.len());
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}
