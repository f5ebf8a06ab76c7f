//! Fixtures shared by the engine tests.

use crate::orchestrator::HuntOrchestrator;
use crate::stats::{StatsReporter, StatsTransport, TransportError};
use crate::timer::TimerEngine;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use yapp_core::{Clock, FinalStats, ManualClock};
use yapp_progress::{ProgressStore, UserDirectory};
use yapp_storage::{KeyValueStore, MemoryStore, Result as StorageResult, StorageError};

#[derive(Default)]
pub(crate) struct RecordingTransport {
    pub sent: Mutex<Vec<FinalStats>>,
}

#[async_trait]
impl StatsTransport for RecordingTransport {
    async fn submit(&self, stats: &FinalStats) -> Result<(), TransportError> {
        self.sent.lock().await.push(stats.clone());
        Ok(())
    }
}

/// Memory store whose writes can be switched to fail.
#[derive(Default)]
pub(crate) struct BrittleStore {
    inner: MemoryStore,
    fail_writes: AtomicBool,
}

impl BrittleStore {
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyValueStore for BrittleStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Other("disk full".to_string()));
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        self.inner.remove(key).await
    }
}

pub(crate) struct Fixture {
    pub clock: ManualClock,
    pub store: MemoryStore,
    pub users: Arc<UserDirectory>,
    pub transport: Arc<RecordingTransport>,
}

impl Fixture {
    pub async fn new() -> Self {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        let store = MemoryStore::new();
        let users = Arc::new(UserDirectory::load(Arc::new(store.clone())).await);
        users.register("Ada Lovelace", clock.now()).await.unwrap();
        Self {
            clock,
            store,
            users,
            transport: Arc::new(RecordingTransport::default()),
        }
    }

    pub async fn orchestrator(&self) -> HuntOrchestrator {
        let clock = Arc::new(self.clock.clone());
        let store = Arc::new(self.store.clone());
        let progress = ProgressStore::open(store.clone(), self.users.clone()).await;
        let timer = TimerEngine::new(clock.clone()).with_mirror(store);
        let stats = StatsReporter::new(self.users.clone(), self.transport.clone(), clock.clone());
        HuntOrchestrator::new(progress, timer, stats, self.users.clone(), clock)
    }
}
