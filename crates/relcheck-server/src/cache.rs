use std::time::Duration;

use moka::sync::Cache;
use relcheck_core::engine::{Decision, FailClosed};
use relcheck_core::model::ModelId;
use relcheck_core::tuple::Revision;

use crate::config::CacheConfig;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecisionKey {
    pub model_id: ModelId,
    pub revision: Revision,
    pub user: String,
    pub relation: String,
    pub object: String,
}

/// Bounded cache of check decisions.
///
/// Entries are pinned to a model id and revision, so they stay correct
/// until a write; every successful write clears the cache anyway.
#[derive(Clone)]
pub struct DecisionCache {
    inner: Option<Cache<DecisionKey, Decision>>,
}

impl DecisionCache {
    pub fn new(config: &CacheConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(Duration::from_secs(config.ttl_secs))
            .build();
        Self { inner: Some(cache) }
    }

    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn get(&self, key: &DecisionKey) -> Option<Decision> {
        self.inner.as_ref()?.get(key)
    }

    /// Timeouts depend on load, not on data, and are never stored.
    pub fn insert(&self, key: DecisionKey, decision: &Decision) {
        if decision.fail_closed == Some(FailClosed::Timeout) {
            return;
        }
        if let Some(cache) = &self.inner {
            cache.insert(key, decision.clone());
        }
    }

    pub fn invalidate_all(&self) {
        if let Some(cache) = &self.inner {
            cache.invalidate_all();
        }
    }
}
