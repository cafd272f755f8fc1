//! Discovery Cache (spec §3, §4.4, §5): per (tenant, source, domain) TTL
//! cache plus exponential cooldown backoff on repeated probe failure, with
//! singleflight-style dedup of in-flight probes.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

use crate::config::Config;
use crate::ids::TenantId;

use super::model::{DiscoveryResult, DiscoverySource};

#[derive(Debug, Clone)]
struct CacheEntry {
    result: DiscoveryResult,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct CooldownEntry {
    failure_count: u32,
    next_allowed_at: Option<DateTime<Utc>>,
}

type Key = (TenantId, DiscoverySource, String);

enum Slot {
    InFlight(Arc<Notify>),
    Ready(CacheEntry),
}

/// Single-writer-per-key coordinator. Concurrent callers for the same key
/// while a probe is in flight attach to the same future rather than firing
/// a second probe (spec §5: "Discovery Cache: single-writer per key via a
/// singleflight-style coordinator").
pub struct DiscoveryCache {
    cfg: Config,
    slots: Mutex<HashMap<Key, Slot>>,
    cooldowns: Mutex<HashMap<Key, CooldownEntry>>,
}

impl DiscoveryCache {
    pub fn new(cfg: Config) -> Self {
        Self { cfg, slots: Mutex::new(HashMap::new()), cooldowns: Mutex::new(HashMap::new()) }
    }

    pub async fn in_cooldown(&self, tenant: &TenantId, source: DiscoverySource, domain: &str) -> bool {
        let key = (tenant.clone(), source, domain.to_string());
        let cooldowns = self.cooldowns.lock().await;
        match cooldowns.get(&key) {
            Some(entry) => entry.next_allowed_at.map(|t| Utc::now() < t).unwrap_or(false),
            None => false,
        }
    }

    /// Returns the cached result if fresh, or coordinates a single fetch via
    /// `probe` if not — joining an in-flight probe if one already started.
    pub async fn get_or_probe<F, Fut>(
        &self,
        tenant: &TenantId,
        source: DiscoverySource,
        domain: &str,
        probe: F,
    ) -> DiscoveryResult
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = DiscoveryResult>,
    {
        let key = (tenant.clone(), source, domain.to_string());

        loop {
            let notify = {
                let mut slots = self.slots.lock().await;
                match slots.get(&key) {
                    Some(Slot::Ready(entry)) if entry.expires_at > Utc::now() => return entry.result.clone(),
                    Some(Slot::InFlight(notify)) => Some(notify.clone()),
                    _ => {
                        slots.insert(key.clone(), Slot::InFlight(Arc::new(Notify::new())));
                        None
                    }
                }
            };

            if let Some(notify) = notify {
                notify.notified().await;
                continue;
            }

            let result = probe().await;
            self.record_outcome(&key, result.clone()).await;
            return result;
        }
    }

    async fn record_outcome(&self, key: &Key, result: DiscoveryResult) {
        let expires_at = Utc::now() + ChronoDuration::from_std(self.cfg.discovery_cache_ttl).unwrap_or(ChronoDuration::hours(1));
        let notify = {
            let mut slots = self.slots.lock().await;
            let prev = slots.insert(key.clone(), Slot::Ready(CacheEntry { result: result.clone(), expires_at }));
            match prev {
                Some(Slot::InFlight(n)) => Some(n),
                _ => None,
            }
        };
        if let Some(notify) = notify {
            notify.notify_waiters();
        }

        let mut cooldowns = self.cooldowns.lock().await;
        let entry = cooldowns.entry(key.clone()).or_default();
        if result.error.is_none() {
            entry.failure_count = 0;
            entry.next_allowed_at = None;
        } else {
            let step = self
                .cfg
                .discovery_cooldown_steps
                .get(entry.failure_count as usize)
                .or_else(|| self.cfg.discovery_cooldown_steps.last())
                .copied()
                .unwrap_or(std::time::Duration::from_secs(60));
            entry.failure_count += 1;
            entry.next_allowed_at = Some(Utc::now() + ChronoDuration::from_std(step).unwrap_or(ChronoDuration::minutes(1)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn concurrent_probes_for_same_key_run_once() {
        let cache = Arc::new(DiscoveryCache::new(Config::default()));
        let calls = Arc::new(AtomicU32::new(0));
        let tenant = TenantId::new("t1");

        let mut handles = vec![];
        for _ in 0..5 {
            let cache = cache.clone();
            let calls = calls.clone();
            let tenant = tenant.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_probe(&tenant, DiscoverySource::OpenApi, "example.com", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        DiscoveryResult::not_found(DiscoverySource::OpenApi, std::time::Duration::from_millis(20))
                    })
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn repeated_failures_enter_cooldown() {
        let cache = DiscoveryCache::new(Config::default());
        let tenant = TenantId::new("t1");
        for _ in 0..1 {
            cache
                .get_or_probe(&tenant, DiscoverySource::OpenApi, "flaky.example.com", || async {
                    DiscoveryResult::failed(DiscoverySource::OpenApi, std::time::Duration::from_millis(5), "timeout")
                })
                .await;
        }
        assert!(cache.in_cooldown(&tenant, DiscoverySource::OpenApi, "flaky.example.com").await);
    }
}
