//! Progress store - owner of the per-user `HuntProgress` aggregate.

use crate::key::progress_key;
use crate::users::UserProvider;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use yapp_core::{initial_progress, Hunt, HuntId, HuntProgress};
use yapp_storage::{load_json, save_json, KeyValueStore};

/// Loads, caches, persists and publishes the progress of the current user.
///
/// The in-memory copy is the single source of truth for the process: a failed
/// write is logged and the cache keeps the committed value.
pub struct ProgressStore {
    store: Arc<dyn KeyValueStore>,
    users: Arc<dyn UserProvider>,
    key: String,
    progress: HuntProgress,
    tx: watch::Sender<HuntProgress>,
}

impl ProgressStore {
    /// Create a store and load the current user's progress.
    pub async fn open(store: Arc<dyn KeyValueStore>, users: Arc<dyn UserProvider>) -> Self {
        let progress = initial_progress();
        let (tx, _rx) = watch::channel(progress.clone());
        let mut this = Self {
            store,
            users,
            key: progress_key(None),
            progress,
            tx,
        };
        this.load().await;
        this
    }

    /// Reload from storage under the key of whoever is logged in now.
    ///
    /// The previous aggregate is discarded entirely. Missing or unreadable
    /// data falls back to a freshly seeded catalog.
    pub async fn load(&mut self) -> HuntProgress {
        let user = self.users.current_user_name().await;
        self.key = progress_key(user.as_deref());

        let mut progress = match load_json::<HuntProgress>(self.store.as_ref(), &self.key).await {
            Ok(Some(progress)) => {
                debug!(key = %self.key, "loaded hunt progress");
                progress
            }
            Ok(None) => {
                debug!(key = %self.key, "no stored progress, seeding catalog");
                initial_progress()
            }
            Err(e) => {
                error!(
                    key = %self.key,
                    error = %e,
                    "failed to load hunt progress, seeding catalog"
                );
                initial_progress()
            }
        };

        if !progress.active_pointer_is_valid() {
            warn!(
                key = %self.key,
                active = ?progress.current_active_hunt,
                "stored active hunt is not runnable, clearing it"
            );
            progress.current_active_hunt = None;
        }

        self.progress = progress.clone();
        self.tx.send_replace(progress.clone());
        progress
    }

    /// The committed aggregate.
    pub fn current(&self) -> &HuntProgress {
        &self.progress
    }

    /// Persist `progress` and publish it to subscribers.
    pub async fn commit(&mut self, progress: HuntProgress) {
        if let Err(e) = save_json(self.store.as_ref(), &self.key, &progress).await {
            error!(key = %self.key, error = %e, "failed to persist hunt progress");
        }
        self.progress = progress.clone();
        self.tx.send_replace(progress);
    }

    /// Replace everything with the seeded catalog.
    pub async fn reset_to_initial(&mut self) -> &HuntProgress {
        info!(key = %self.key, "resetting hunt progress");
        self.commit(initial_progress()).await;
        &self.progress
    }

    /// Receive every committed aggregate.
    pub fn subscribe(&self) -> watch::Receiver<HuntProgress> {
        self.tx.subscribe()
    }

    /// Key the aggregate is persisted under.
    pub fn storage_key(&self) -> &str {
        &self.key
    }

    /// Look up a hunt in the committed aggregate.
    pub fn find_hunt(&self, id: HuntId) -> Option<&Hunt> {
        self.progress.find(id)
    }

    /// Budget of a hunt.
    pub fn hunt_max_duration(&self, id: HuntId) -> Option<u64> {
        self.find_hunt(id).and_then(|h| h.max_duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::UserDirectory;
    use async_trait::async_trait;
    use yapp_storage::{MemoryStore, Result as StorageResult, StorageError};

    struct FailingStore;

    #[async_trait]
    impl KeyValueStore for FailingStore {
        async fn get(&self, _key: &str) -> StorageResult<Option<String>> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: &str) -> StorageResult<()> {
            Err(StorageError::Other("disk full".to_string()))
        }

        async fn remove(&self, _key: &str) -> StorageResult<()> {
            Ok(())
        }
    }

    async fn open_for(
        store: MemoryStore,
        name: Option<&str>) -> (ProgressStore, Arc<UserDirectory>,
    ) {
        let directory = Arc::new(UserDirectory::load(Arc::new(store.clone())).await);
        if let Some(name) = name {
            directory.register(name, chrono::Utc::now()).await.unwrap();
        }
        let progress = ProgressStore::open(Arc::new(store), directory.clone()).await;
        (progress, directory)
    }

    #[tokio::test]
    async fn test_first_use_seeds_catalog() {
        let (store, _) = open_for(MemoryStore::new(), Some("Ada")).await;
        assert_eq!(store.current(), &initial_progress());
        assert_eq!(store.storage_key(), "ada_hunt_progress");
    }

    #[tokio::test]
    async fn test_commit_persists_and_publishes() {
        let memory = MemoryStore::new();
        let (mut store, _) = open_for(memory.clone(), Some("Ada")).await;
        let mut rx = store.subscribe();

        let mut progress = store.current().clone();
        progress.hunts[1].is_unlocked = true;
        store.commit(progress.clone()).await;

        assert_eq!(store.current(), &progress);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), progress);

        let (reopened, _) = open_for(memory, Some("Ada")).await;
        assert!(reopened.current().hunts[1].is_unlocked);
    }

    #[tokio::test]
    async fn test_corrupt_data_falls_back_to_seed() {
        let memory = MemoryStore::new();
        memory.set("ada_hunt_progress", "{\"hunts\": [tru").await.unwrap();

        let (store, _) = open_for(memory, Some("Ada")).await;
        assert_eq!(store.current(), &initial_progress());
    }

    #[tokio::test]
    async fn test_user_switch_does_not_leak_progress() {
        let memory = MemoryStore::new();
        let (mut store, directory) = open_for(memory.clone(), Some("Ada")).await;

        let mut progress = store.current().clone();
        progress.total_completed = 3;
        store.commit(progress).await;

        directory.register("Grace Hopper", chrono::Utc::now()).await.unwrap();
        let loaded = store.load().await;
        assert_eq!(store.storage_key(), "grace_hopper_hunt_progress");
        assert_eq!(loaded.total_completed, 0);

        directory.register("Ada", chrono::Utc::now()).await.unwrap();
        assert_eq!(store.load().await.total_completed, 3);
    }

    #[tokio::test]
    async fn test_unnamed_user_uses_shared_key() {
        let (store, _) = open_for(MemoryStore::new(), None).await;
        assert_eq!(store.storage_key(), "hunt_progress");
    }

    #[tokio::test]
    async fn test_write_failure_keeps_memory_state() {
        let directory = Arc::new(UserDirectory::load(Arc::new(MemoryStore::new())).await);
        let mut store = ProgressStore::open(Arc::new(FailingStore), directory).await;

        let mut progress = store.current().clone();
        progress.total_completed = 1;
        store.commit(progress.clone()).await;

        assert_eq!(store.current(), &progress);
    }

    #[tokio::test]
    async fn test_dangling_active_pointer_is_cleared() {
        let memory = MemoryStore::new();
        let mut stored = initial_progress();
        stored.current_active_hunt = Some(HuntId::new(1));
        save_json(&memory, "ada_hunt_progress", &stored).await.unwrap();

        let (store, _) = open_for(memory, Some("Ada")).await;
        assert!(store.current().current_active_hunt.is_none());
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let (mut store, _) = open_for(MemoryStore::new(), Some("Ada")).await;
        let mut progress = store.current().clone();
        progress.hunts[0].is_completed = true;
        store.commit(progress).await;

        let once = store.reset_to_initial().await.clone();
        let twice = store.reset_to_initial().await.clone();
        assert_eq!(once, twice);
        assert_eq!(once, initial_progress());
        assert_eq!(store.hunt_max_duration(HuntId::new(1)), Some(300));
    }
}
