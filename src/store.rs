use std::future::Future;
use std::sync::Mutex;

use crate::error::{Result, StudioError};
use crate::types::GeneratedImage;

/// Persistent storage for generated images.
///
/// The orchestrator writes every successful result here and reads the
/// collection back on [`load_history`](crate::GenerationOrchestrator::load_history).
pub trait ImageStore: Send + Sync {
    /// Store an image, replacing any entry with the same id.
    fn persist(&self, image: &GeneratedImage) -> impl Future<Output = Result<()>> + Send;

    /// Every stored image, newest first.
    fn list_all(&self) -> impl Future<Output = Result<Vec<GeneratedImage>>> + Send;

    /// Remove one image. Deleting an unknown id is not an error.
    fn delete_one(&self, id: &str) -> impl Future<Output = Result<()>> + Send;

    fn clear_all(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Volatile store, useful for tests and hosts that manage persistence themselves.
#[derive(Debug, Default)]
pub struct MemoryStore {
    images: Mutex<Vec<GeneratedImage>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<GeneratedImage>>> {
        self.images
            .lock()
            .map_err(|e| StudioError::Storage(e.to_string()))
    }
}

impl ImageStore for MemoryStore {
    async fn persist(&self, image: &GeneratedImage) -> Result<()> {
        let mut images = self.lock()?;
        images.retain(|i| i.id != image.id);
        images.push(image.clone());
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<GeneratedImage>> {
        let mut images = self.lock()?.clone();
        images.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(images)
    }

    async fn delete_one(&self, id: &str) -> Result<()> {
        self.lock()?.retain(|i| i.id != id);
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }
}

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

#[cfg(feature = "sqlite")]
mod sqlite {
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use rusqlite::Connection;

    use super::ImageStore;
    use crate::db;
    use crate::error::{Result, StudioError};
    use crate::types::GeneratedImage;

    /// SQLite-backed store. Cheap to clone; clones share one connection.
    #[derive(Debug, Clone)]
    pub struct SqliteStore {
        conn: Arc<Mutex<Connection>>,
    }

    impl SqliteStore {
        /// Open (or create) a database file.
        pub fn open(path: &Path) -> Result<Self> {
            db::open_database(Some(path))
                .map(Self::from_connection)
                .map_err(storage_err)
        }

        pub fn in_memory() -> Result<Self> {
            db::open_database(None)
                .map(Self::from_connection)
                .map_err(storage_err)
        }

        fn from_connection(conn: Connection) -> Self {
            Self {
                conn: Arc::new(Mutex::new(conn)),
            }
        }

        fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> anyhow::Result<T>) -> Result<T> {
            let conn = self
                .conn
                .lock()
                .map_err(|e| StudioError::Storage(e.to_string()))?;
            f(&*conn).map_err(storage_err)
        }
    }

    fn storage_err(err: anyhow::Error) -> StudioError {
        StudioError::Storage(format!("{:#}", err))
    }

    impl ImageStore for SqliteStore {
        async fn persist(&self, image: &GeneratedImage) -> Result<()> {
            self.with_conn(|conn| db::insert_image(conn, image))
        }

        async fn list_all(&self) -> Result<Vec<GeneratedImage>> {
            self.with_conn(db::list_images)
        }

        async fn delete_one(&self, id: &str) -> Result<()> {
            self.with_conn(|conn| db::delete_image(conn, id).map(|_| ()))
        }

        async fn clear_all(&self) -> Result<()> {
            self.with_conn(|conn| db::clear_images(conn).map(|_| ()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Angle, Resolution};

    fn image(id: &str, timestamp: i64) -> GeneratedImage {
        GeneratedImage {
            id: id.to_string(),
            image_data: "data:image/png;base64,AAAA".to_string(),
            angle: Angle::Front,
            prompt: "cup".to_string(),
            timestamp,
            resolution: Resolution::OneK,
        }
    }

    async fn exercise<S: ImageStore>(store: &S) {
        store.persist(&image("a", 1)).await.unwrap();
        store.persist(&image("b", 3)).await.unwrap();
        store.persist(&image("c", 2)).await.unwrap();

        let ids: Vec<String> = store.list_all().await.unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);

        store.delete_one("c").await.unwrap();
        store.delete_one("missing").await.unwrap();
        assert_eq!(store.list_all().await.unwrap().len(), 2);

        store.clear_all().await.unwrap();
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_store() {
        exercise(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_memory_store_replaces_same_id() {
        let store = MemoryStore::new();
        store.persist(&image("a", 1)).await.unwrap();
        store.persist(&image("a", 5)).await.unwrap();
        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].timestamp, 5);
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_sqlite_store() {
        exercise(&SqliteStore::in_memory().unwrap()).await;
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_sqlite_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("images.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.persist(&image("kept", 42)).await.unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        let all = store.list_all().await.unwrap();
        assert_eq!(all, vec![image("kept", 42)]);
    }
}
