//! Engine counters
//!
//! - Counters only, monotonic
//! - Reset only when the registry is rebuilt
//! - Thread-safe but lock-free

use std::sync::atomic::{AtomicU64, Ordering};

/// Operational counters owned by a [`Registry`](crate::Registry)
///
/// Relaxed ordering is enough: counters are read for reporting and tests,
/// never used for synchronization.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Queries executed (store-backed or simulated)
    queries_executed: AtomicU64,
    /// Store calls dispatched by the engine
    store_calls: AtomicU64,
    /// Resolver executions that produced a fresh value
    resolver_executions: AtomicU64,
    /// Resolver executions answered from instance state
    resolver_cache_hits: AtomicU64,
    /// Resources inserted
    resources_created: AtomicU64,
    /// Resources updated
    resources_updated: AtomicU64,
    /// Resources deleted
    resources_deleted: AtomicU64,
    /// Resources generated to pad query results
    resources_backfilled: AtomicU64,
    /// Writes rejected by field validation
    validation_failures: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment queries executed
    pub fn increment_queries_executed(&self) {
        self.queries_executed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment store calls
    pub fn increment_store_calls(&self) {
        self.store_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment resolver executions
    pub fn increment_resolver_executions(&self) {
        self.resolver_executions.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment resolver cache hits
    pub fn increment_resolver_cache_hits(&self) {
        self.resolver_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Add to resources created
    pub fn add_resources_created(&self, count: u64) {
        self.resources_created.fetch_add(count, Ordering::Relaxed);
    }

    /// Add to resources updated
    pub fn add_resources_updated(&self, count: u64) {
        self.resources_updated.fetch_add(count, Ordering::Relaxed);
    }

    /// Add to resources deleted
    pub fn add_resources_deleted(&self, count: u64) {
        self.resources_deleted.fetch_add(count, Ordering::Relaxed);
    }

    /// Add to resources backfilled
    pub fn add_resources_backfilled(&self, count: u64) {
        self.resources_backfilled.fetch_add(count, Ordering::Relaxed);
    }

    /// Increment validation failures
    pub fn increment_validation_failures(&self) {
        self.validation_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries_executed: self.queries_executed.load(Ordering::Relaxed),
            store_calls: self.store_calls.load(Ordering::Relaxed),
            resolver_executions: self.resolver_executions.load(Ordering::Relaxed),
            resolver_cache_hits: self.resolver_cache_hits.load(Ordering::Relaxed),
            resources_created: self.resources_created.load(Ordering::Relaxed),
            resources_updated: self.resources_updated.load(Ordering::Relaxed),
            resources_deleted: self.resources_deleted.load(Ordering::Relaxed),
            resources_backfilled: self.resources_backfilled.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub queries_executed: u64,
    pub store_calls: u64,
    pub resolver_executions: u64,
    pub resolver_cache_hits: u64,
    pub resources_created: u64,
    pub resources_updated: u64,
    pub resources_deleted: u64,
    pub resources_backfilled: u64,
    pub validation_failures: u64,
}

impl MetricsSnapshot {
    /// Render as a JSON object
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
