//! Health store and background prober
//!
//! Tracks one [`ProviderHealth`] record per provider instance and flips it
//! unhealthy after a run of consecutive probe failures. Recovery is
//! immediate: a single successful probe clears the failure streak and marks
//! the instance healthy again, with no separate cooldown state — matching
//! the hysteresis of the system this gateway's routing design was distilled
//! from.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::{info, warn};

use crate::core::providers::Provider;

/// Number of consecutive probe failures before an instance is marked unhealthy.
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 5;

/// Live health record for one provider instance.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub provider_id: String,
    pub is_healthy: bool,
    pub consecutive_failures: u32,
    pub total_checks: u64,
    pub total_failures: u64,
    pub last_check: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub response_time_ms: Option<u64>,
}

impl ProviderHealth {
    /// Reconstruct a record from a persisted row, for seeding the store at boot.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        provider_id: impl Into<String>,
        is_healthy: bool,
        consecutive_failures: u32,
        total_checks: u64,
        total_failures: u64,
        last_check: Option<DateTime<Utc>>,
        last_error: Option<String>,
        response_time_ms: Option<u64>,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            is_healthy,
            consecutive_failures,
            total_checks,
            total_failures,
            last_check,
            last_error,
            response_time_ms,
        }
    }

    fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            is_healthy: true,
            consecutive_failures: 0,
            total_checks: 0,
            total_failures: 0,
            last_check: None,
            last_error: None,
            response_time_ms: None,
        }
    }

    /// Fraction of probes that have succeeded over the record's lifetime.
    pub fn success_rate(&self) -> f64 {
        if self.total_checks == 0 {
            return 1.0;
        }
        1.0 - (self.total_failures as f64 / self.total_checks as f64)
    }

    fn record_success(&mut self, response_time_ms: u64) {
        self.total_checks += 1;
        self.consecutive_failures = 0;
        self.is_healthy = true;
        self.last_check = Some(Utc::now());
        self.last_error = None;
        self.response_time_ms = Some(response_time_ms);
    }

    fn record_failure(&mut self, error: impl Into<String>, max_failures: u32) {
        self.total_checks += 1;
        self.total_failures += 1;
        self.consecutive_failures += 1;
        self.last_check = Some(Utc::now());
        self.last_error = Some(error.into());
        if self.consecutive_failures >= max_failures {
            self.is_healthy = false;
        }
    }
}

/// Shared, concurrently-updatable health record table.
#[derive(Clone, Default)]
pub struct HealthStore {
    records: Arc<DashMap<String, ProviderHealth>>,
    max_consecutive_failures: u32,
}

impl HealthStore {
    pub fn new(max_consecutive_failures: u32) -> Self {
        Self {
            records: Arc::new(DashMap::new()),
            max_consecutive_failures,
        }
    }

    pub fn is_healthy(&self, provider_id: &str) -> bool {
        self.records.get(provider_id).map(|r| r.is_healthy).unwrap_or(true)
    }

    pub fn get(&self, provider_id: &str) -> Option<ProviderHealth> {
        self.records.get(provider_id).map(|r| r.clone())
    }

    pub fn snapshot(&self) -> HashMap<String, ProviderHealth> {
        self.records
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    /// Seed a record from persisted state at boot, without going through the
    /// success/failure hysteresis logic.
    pub fn seed(&self, record: ProviderHealth) {
        self.records.insert(record.provider_id.clone(), record);
    }

    pub fn record_success(&self, provider_id: &str, response_time_ms: u64) {
        self.records
            .entry(provider_id.to_string())
            .or_insert_with(|| ProviderHealth::new(provider_id))
            .record_success(response_time_ms);
    }

    pub fn record_failure(&self, provider_id: &str, error: impl Into<String>) {
        let max = self.max_consecutive_failures;
        let mut entry = self
            .records
            .entry(provider_id.to_string())
            .or_insert_with(|| ProviderHealth::new(provider_id));
        let was_healthy = entry.is_healthy;
        entry.record_failure(error, max);
        if was_healthy && !entry.is_healthy {
            warn!(provider_id, "provider marked unhealthy after {} consecutive failures", entry.consecutive_failures);
        }
    }
}

/// One entry the prober checks each interval: an instance id plus a handle
/// to actually call it.
#[derive(Clone)]
pub struct ProbeTarget {
    pub provider_id: String,
    pub provider: Provider,
}

/// Background loop that concurrently probes every registered provider
/// instance on a fixed interval and writes results into a [`HealthStore`].
pub struct Prober {
    store: HealthStore,
    targets: Vec<ProbeTarget>,
    interval: Duration,
}

impl Prober {
    pub fn new(store: HealthStore, targets: Vec<ProbeTarget>, interval: Duration) -> Self {
        Self { store, targets, interval }
    }

    /// Run the probe loop until the process exits. Intended to be spawned as
    /// a background tokio task.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            self.check_all().await;
        }
    }

    /// Probe every target concurrently; used by both the loop and the manual
    /// on-demand check path.
    pub async fn check_all(&self) {
        let checks = self.targets.iter().map(|target| {
            let store = self.store.clone();
            let target = target.clone();
            async move {
                let start = std::time::Instant::now();
                let healthy = target.provider.probe().await;
                let elapsed_ms = start.elapsed().as_millis() as u64;
                if healthy {
                    store.record_success(&target.provider_id, elapsed_ms);
                } else {
                    store.record_failure(&target.provider_id, "probe request failed");
                }
            }
        });
        futures::future::join_all(checks).await;
        info!(count = self.targets.len(), "health probe cycle complete");
    }

    /// Probe a single provider instance on demand, bypassing the interval.
    pub async fn manual_check(&self, provider_id: &str) -> Option<ProviderHealth> {
        let target = self.targets.iter().find(|t| t.provider_id == provider_id)?;
        let start = std::time::Instant::now();
        let healthy = target.provider.probe().await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        if healthy {
            self.store.record_success(provider_id, elapsed_ms);
        } else {
            self.store.record_failure(provider_id, "probe request failed");
        }
        self.store.get(provider_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flips_unhealthy_after_max_consecutive_failures() {
        let store = HealthStore::new(3);
        store.record_failure("p1", "e1");
        store.record_failure("p1", "e2");
        assert!(store.is_healthy("p1"));
        store.record_failure("p1", "e3");
        assert!(!store.is_healthy("p1"));
    }

    #[test]
    fn one_success_clears_failure_streak_immediately() {
        let store = HealthStore::new(2);
        store.record_failure("p1", "e1");
        store.record_failure("p1", "e2");
        assert!(!store.is_healthy("p1"));
        store.record_success("p1", 42);
        assert!(store.is_healthy("p1"));
        assert_eq!(store.get("p1").unwrap().consecutive_failures, 0);
    }

    #[test]
    fn unknown_provider_defaults_healthy() {
        let store = HealthStore::new(5);
        assert!(store.is_healthy("never-seen"));
    }

    #[test]
    fn success_rate_tracks_lifetime_totals() {
        let store = HealthStore::new(5);
        store.record_success("p1", 10);
        store.record_failure("p1", "e");
        store.record_success("p1", 10);
        let record = store.get("p1").unwrap();
        assert!((record.success_rate() - (2.0 / 3.0)).abs() < 1e-9);
    }
}
