mod schedule;
mod transcript;
pub mod types;

pub use schedule::ScheduleBook;
pub use transcript::{Transcript, WELCOME_MESSAGE};

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::info;

pub const MESSAGES_KEY: &str = "messages";
pub const SCHEDULES_KEY: &str = "schedules";

/// Flat string-to-string blob store. Values are whole JSON documents.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

pub struct SqliteKvStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteKvStore {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await?;
        }
        let db = Connection::open(path)?;
        info!("Opened key-value store at {:?}", path);
        Self::with_connection(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(db: Connection) -> Result<Self> {
        db.execute(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }
}

#[async_trait]
impl KvStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare("SELECT value FROM kv_store WHERE key = ?1")?;
        let mut rows = stmt.query([key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value",
            (key, value),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_overwrites_and_get_reads_back() {
        let store = SqliteKvStore::open_in_memory().unwrap();
        assert_eq!(store.get("schedules").await.unwrap(), None);

        store.set("schedules", "[]").await.unwrap();
        store.set("schedules", "[1]").await.unwrap();
        assert_eq!(store.get("schedules").await.unwrap().as_deref(), Some("[1]"));
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("daymate.db");
        {
            let store = SqliteKvStore::open(&path).await.unwrap();
            store.set("messages", "[\"hi\"]").await.unwrap();
        }
        let store = SqliteKvStore::open(&path).await.unwrap();
        assert_eq!(store.get("messages").await.unwrap().as_deref(), Some("[\"hi\"]"));
    }
}
