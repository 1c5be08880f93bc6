//! Durable embedding tier.
//!
//! The generic key/value engine behind this tier is someone else's concern;
//! the store only needs get, put and remove by ticket id.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

/// Persistence for embeddings across process restarts.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Fetch the stored embedding for a ticket, if any.
    async fn get(&self, id: &str) -> Result<Option<Embedding>>;

    /// Store (or overwrite) the embedding for a ticket.
    async fn put(&self, id: &str, embedding: &Embedding) -> Result<()>;

    /// Forget the embedding for a ticket.
    async fn remove(&self, id: &str) -> Result<()>;

    /// Make every accepted `put` and `remove` durable.
    async fn sync(&self) -> Result<()> {
        Ok(())
    }
}

/// A durable tier that stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDurableStore;

#[async_trait]
impl DurableStore for NoopDurableStore {
    async fn get(&self, _id: &str) -> Result<Option<Embedding>> {
        Ok(None)
    }

    async fn put(&self, _id: &str, _embedding: &Embedding) -> Result<()> {
        Ok(())
    }

    async fn remove(&self, _id: &str) -> Result<()> {
        Ok(())
    }
}

/// Embeddings kept in a single JSON file, keyed by ticket id.
///
/// The whole map is loaded at open. Mutations only touch memory; the file is
/// rewritten by [`DurableStore::sync`], and only when something changed.
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, Embedding>>,
    dirty: AtomicBool,
}

impl JsonFileStore {
    /// Open (or create on first write) the store at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = if fs::try_exists(&path).await? {
            let content = fs::read_to_string(&path).await?;
            let entries: HashMap<String, Embedding> = serde_json::from_str(&content)?;
            info!("Loaded {} durable embeddings from {}", entries.len(), path.display());
            entries
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
            dirty: AtomicBool::new(false),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn save(&self, entries: &HashMap<String, Embedding>) -> Result<()> {
        let content = serde_json::to_string(entries)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| EmbeddingError::Storage(format!("{}: {e}", parent.display())))?;
        }

        // Write to a sibling file first so a crash never leaves half a map.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &self.path).await?;
        debug!("Saved {} durable embeddings", entries.len());
        Ok(())
    }
}

#[async_trait]
impl DurableStore for JsonFileStore {
    async fn get(&self, id: &str) -> Result<Option<Embedding>> {
        Ok(self.entries.lock().await.get(id).cloned())
    }

    async fn put(&self, id: &str, embedding: &Embedding) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(id.to_string(), embedding.clone());
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        if self.entries.lock().await.remove(id).is_some() {
            self.dirty.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn sync(&self) -> Result<()> {
        let entries = self.entries.lock().await;
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let saved = self.save(&entries).await;
        if saved.is_err() {
            self.dirty.store(true, Ordering::SeqCst);
        }
        saved
    }
}
