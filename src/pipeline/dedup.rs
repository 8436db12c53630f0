//! Durable set of already-handled event ids.
//!
//! `should_process` is the single atomic claim point shared by the webhook,
//! the poller and anything else that feeds the [`EventProcessor`]. The set
//! lives under a synchronous mutex that is never held across an await.
//! Writes to the store are serialized, and each one snapshots the set only
//! after it holds the write lock, so the last write always carries every
//! claim made before it.
//!
//! [`EventProcessor`]: crate::pipeline::processor::EventProcessor

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::pipeline::store::ProcessedStore;

/// What to do when the set grows past its ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Drop the `remove` oldest ids.
    TruncateOldest { remove: usize },
    /// Forget everything except the id that triggered the eviction.
    Clear,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        EvictionPolicy::TruncateOldest { remove: 500 }
    }
}

#[derive(Default)]
struct DedupState {
    order: VecDeque<String>,
    ids: HashSet<String>,
    version: u64,
}

impl DedupState {
    fn insert(&mut self, id: &str) -> bool {
        if !self.ids.insert(id.to_string()) {
            return false;
        }
        self.order.push_back(id.to_string());
        self.version += 1;
        true
    }

    fn remove(&mut self, id: &str) -> bool {
        if !self.ids.remove(id) {
            return false;
        }
        self.order.retain(|existing| existing != id);
        self.version += 1;
        true
    }

    /// Apply the policy. The newest id always survives.
    fn evict(&mut self, ceiling: usize, policy: EvictionPolicy) -> usize {
        if self.order.len() <= ceiling {
            return 0;
        }
        let keep_newest = self.order.len() - 1;
        let count = match policy {
            EvictionPolicy::TruncateOldest { remove } => remove.clamp(1, keep_newest),
            EvictionPolicy::Clear => keep_newest,
        };
        for id in self.order.drain(..count) {
            self.ids.remove(&id);
        }
        self.version += 1;
        count
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: self.version,
            ids: self.order.iter().cloned().collect(),
        }
    }
}

struct Snapshot {
    version: u64,
    ids: Vec<String>,
}

pub struct EventDeduplicator {
    state: Mutex<DedupState>,
    ceiling: usize,
    policy: EvictionPolicy,
    store: Option<Arc<dyn ProcessedStore>>,
    /// Highest snapshot version written so far. Held across the store write.
    written: tokio::sync::Mutex<u64>,
}

impl EventDeduplicator {
    /// Memory-only deduplicator.
    pub fn new(ceiling: usize, policy: EvictionPolicy) -> Self {
        Self {
            state: Mutex::new(DedupState::default()),
            ceiling: ceiling.max(1),
            policy,
            store: None,
            written: tokio::sync::Mutex::new(0),
        }
    }

    /// Deduplicator mirrored to `store`, seeded from whatever it holds.
    ///
    /// A store that fails to load is logged and treated as empty.
    pub async fn with_store(
        ceiling: usize,
        policy: EvictionPolicy,
        store: Arc<dyn ProcessedStore>,
    ) -> Self {
        let mut dedup = Self::new(ceiling, policy);
        match store.load().await {
            Ok(ids) => {
                let state = dedup
                    .state
                    .get_mut()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                for id in &ids {
                    state.insert(id);
                }
                state.evict(dedup.ceiling, policy);
                info!(count = state.order.len(), "Dedup set restored");
            }
            Err(e) => warn!(error = %e, "Failed to load processed ids, starting empty"),
        }
        dedup.store = Some(store);
        dedup
    }

    fn lock(&self) -> MutexGuard<'_, DedupState> {
        // The state is always left consistent, so a poisoned lock is still usable.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Atomically claim `id`. Returns `true` for exactly one caller per id.
    pub async fn should_process(&self, id: &str) -> bool {
        {
            let mut state = self.lock();
            if !state.insert(id) {
                debug!(event_id = %id, "Event already claimed");
                return false;
            }
            let evicted = state.evict(self.ceiling, self.policy);
            if evicted > 0 {
                info!(evicted, policy = ?self.policy, "Dedup set hit ceiling");
            }
        }
        self.persist().await;
        true
    }

    /// Record `id` as handled. Idempotent.
    pub async fn mark_processed(&self, id: &str) {
        {
            let mut state = self.lock();
            if !state.insert(id) {
                return;
            }
            state.evict(self.ceiling, self.policy);
        }
        self.persist().await;
    }

    /// Drop a claim so a later delivery of `id` can be processed.
    pub async fn release(&self, id: &str) {
        if !self.lock().remove(id) {
            return;
        }
        self.persist().await;
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let mut written = self.written.lock().await;
        let snapshot = self.lock().snapshot();
        if snapshot.version <= *written {
            // An earlier writer already saved this state or a newer one.
            return;
        }
        match store.save(&snapshot.ids).await {
            Ok(()) => *written = snapshot.version,
            Err(e) => warn!(error = %e, "Failed to persist processed ids"),
        }
    }
}
