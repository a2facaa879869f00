//! Bounded memo of blend results keyed by inventory and profile identity.
//!
//! Entries are inserted only after a full scoring pass completes; lookups take
//! a shared read lock. The oldest entry is evicted first.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use crate::domain::chemotype::Inventory;
use crate::domain::output::BlendOutput;
use crate::domain::profile::TargetProfile;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub inventory_fingerprint: String,
    pub profile_key: String,
}

impl CacheKey {
    pub fn new(inventory: &Inventory, profile: &TargetProfile) -> Self {
        Self::from_fingerprint(inventory.fingerprint(), profile)
    }

    pub fn from_fingerprint(inventory_fingerprint: String, profile: &TargetProfile) -> Self {
        Self { inventory_fingerprint, profile_key: profile.cache_key() }
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, Arc<BlendOutput>>,
    order: VecDeque<CacheKey>,
}

#[derive(Debug)]
pub struct RecommendationCache {
    capacity: usize,
    state: RwLock<CacheState>,
}

impl RecommendationCache {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), state: RwLock::new(CacheState::default()) }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// A poisoned lock reads as a miss.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<BlendOutput>> {
        let state = self.state.read().ok()?;
        state.entries.get(key).cloned()
    }

    pub fn insert(&self, key: CacheKey, output: Arc<BlendOutput>) {
        let Ok(mut state) = self.state.write() else {
            return;
        };

        if state.entries.insert(key.clone(), output).is_some() {
            return;
        }
        state.order.push_back(key);
        while state.order.len() > self.capacity {
            if let Some(evicted) = state.order.pop_front() {
                state.entries.remove(&evicted);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.state.read().map(|state| state.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut state) = self.state.write() {
            state.entries.clear();
            state.order.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{CacheKey, RecommendationCache};
    use crate::domain::output::{Audit, BlendOutput, EngineErrorCode};
    use crate::intent::IntentInterpreter;

    fn key(fingerprint: &str) -> CacheKey {
        CacheKey::from_fingerprint(fingerprint.to_string(), &IntentInterpreter::default_profile())
    }

    fn output() -> Arc<BlendOutput> {
        Arc::new(BlendOutput::empty(
            IntentInterpreter::default_profile(),
            EngineErrorCode::InsufficientInventory,
            Audit::default(),
        ))
    }

    #[test]
    fn returns_inserted_entries() {
        let cache = RecommendationCache::new(4);
        cache.insert(key("a"), output());

        assert!(cache.get(&key("a")).is_some());
        assert!(cache.get(&key("b")).is_none());
    }

    #[test]
    fn evicts_oldest_entry_past_capacity() {
        let cache = RecommendationCache::new(2);
        cache.insert(key("a"), output());
        cache.insert(key("b"), output());
        cache.insert(key("c"), output());

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("a")).is_none());
        assert!(cache.get(&key("c")).is_some());
    }

    #[test]
    fn reinserting_a_key_does_not_grow_the_queue() {
        let cache = RecommendationCache::new(2);
        cache.insert(key("a"), output());
        cache.insert(key("a"), output());
        cache.insert(key("b"), output());

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("a")).is_some());
        cache.clear();
        assert!(cache.is_empty());
    }
}
