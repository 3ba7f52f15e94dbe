//! Enum Lookup Cache
//!
//! Translates coded values (e.g. `Timesheets.StatusId = 5`) into display
//! labels. Two sources are consulted in order:
//!
//! 1. A hardcoded critical table that is authoritative for its keys.
//! 2. A dynamic snapshot loaded from the backing store, refreshed when older
//!    than the TTL.
//!
//! The snapshot is replaced wholesale behind an `Arc`, so readers never see a
//! half-built mapping. At most one reload runs at a time; lookups that arrive
//! while a reload is in flight are answered from the previous snapshot.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumMappingEntry {
    pub entity_name: String,
    pub field_name: String,
    pub coded_value: i64,
    pub display_label: String,
}

/// Backing store for the dynamic mappings.
#[async_trait]
pub trait EnumStore: Send + Sync {
    /// Every active mapping row.
    async fn load_active(&self) -> Result<Vec<EnumMappingEntry>>;

    /// Coded value for an exact `(entity, field, label)` match.
    async fn find_value(&self, entity: &str, field: &str, label: &str) -> Result<Option<i64>>;
}

/// Hardcoded mapping that always wins over the dynamic snapshot.
#[derive(Debug)]
pub struct CriticalMapping {
    pub entity: &'static str,
    pub field: &'static str,
    pub values: &'static [(i64, &'static str)],
}

pub const CRITICAL_ENUM_MAPPINGS: &[CriticalMapping] = &[CriticalMapping {
    entity: "Timesheets",
    field: "StatusId",
    values: &[
        (1, "Incomplete"),
        (2, "PartiallyComplete"),
        (3, "Complete"),
        (4, "Approved"),
        (5, "Submitted"),
        (6, "Rejected"),
        (7, "WaitingForAdjustApproval"),
        (8, "AwaitingPACSProcessing"),
        (10, "TemplatePayrollTimesheets"),
        (11, "CandidateSDSNotificationAwaitingReview"),
        (12, "SentForAuthorization"),
    ],
}];

fn critical_mapping(entity: &str, field: &str) -> Option<&'static CriticalMapping> {
    CRITICAL_ENUM_MAPPINGS
        .iter()
        .find(|m| m.entity == entity && m.field == field)
}

pub fn critical_label(entity: &str, field: &str, value: i64) -> Option<&'static str> {
    critical_mapping(entity, field)?
        .values
        .iter()
        .find(|(v, _)| *v == value)
        .map(|(_, label)| *label)
}

pub fn critical_value(entity: &str, field: &str, label: &str) -> Option<i64> {
    critical_mapping(entity, field)?
        .values
        .iter()
        .find(|(_, l)| l.eq_ignore_ascii_case(label))
        .map(|(v, _)| *v)
}

fn mapping_key(entity: &str, field: &str) -> String {
    format!("{}.{}", entity, field)
}

/// Immutable view of the dynamic mappings at one point in time.
#[derive(Debug, Default)]
pub struct EnumSnapshot {
    mappings: HashMap<String, HashMap<i64, String>>,
    loaded_at: Option<Instant>,
}

impl EnumSnapshot {
    pub fn from_entries(entries: Vec<EnumMappingEntry>, loaded_at: Instant) -> Self {
        let mut mappings: HashMap<String, HashMap<i64, String>> = HashMap::new();
        for entry in entries {
            mappings
                .entry(mapping_key(&entry.entity_name, &entry.field_name))
                .or_default()
                .insert(entry.coded_value, entry.display_label);
        }
        Self {
            mappings,
            loaded_at: Some(loaded_at),
        }
    }

    pub fn label(&self, entity: &str, field: &str, value: i64) -> Option<&str> {
        self.mappings
            .get(&mapping_key(entity, field))?
            .get(&value)
            .map(String::as_str)
    }

    pub fn value_for_label(&self, entity: &str, field: &str, label: &str) -> Option<i64> {
        self.mappings
            .get(&mapping_key(entity, field))?
            .iter()
            .find(|(_, l)| l.as_str() == label)
            .map(|(v, _)| *v)
    }

    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.loaded_at
            .map(|at| at.elapsed() <= ttl)
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.mappings.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct EnumCache {
    store: Arc<dyn EnumStore>,
    ttl: Duration,
    snapshot: RwLock<Arc<EnumSnapshot>>,
    reload_lock: Mutex<()>,
    reloads: AtomicU64,
}

impl EnumCache {
    pub fn new(store: Arc<dyn EnumStore>) -> Self {
        Self::with_ttl(store, DEFAULT_TTL)
    }

    pub fn with_ttl(store: Arc<dyn EnumStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            snapshot: RwLock::new(Arc::new(EnumSnapshot::default())),
            reload_lock: Mutex::new(()),
            reloads: AtomicU64::new(0),
        }
    }

    /// Number of backing-store reloads attempted so far.
    pub fn reload_count(&self) -> u64 {
        self.reloads.load(Ordering::Relaxed)
    }

    async fn load_entries(&self) -> Result<Vec<EnumMappingEntry>> {
        let entries = self.store.load_active().await?;
        info!(count = entries.len(), "Loaded enum mappings");
        Ok(entries)
    }

    /// Full load from the backing store. Failures yield an empty collection.
    pub async fn load_dynamic_mappings(&self) -> Vec<EnumMappingEntry> {
        self.load_entries().await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load enum mappings");
            Vec::new()
        })
    }

    /// Reload now and publish the new snapshot. A failed load keeps the
    /// previous mappings but restarts the TTL so the store is not hammered.
    pub async fn refresh(&self) -> Arc<EnumSnapshot> {
        let _guard = self.reload_lock.lock().await;
        self.reload_locked().await
    }

    async fn reload_locked(&self) -> Arc<EnumSnapshot> {
        self.reloads.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();

        let next = match self.load_entries().await {
            Ok(entries) => EnumSnapshot::from_entries(entries, now),
            Err(e) => {
                warn!(error = %e, "Enum mapping reload failed, serving previous snapshot");
                let previous = self.snapshot.read().await.clone();
                EnumSnapshot {
                    mappings: previous.mappings.clone(),
                    loaded_at: Some(now),
                }
            }
        };

        let next = Arc::new(next);
        *self.snapshot.write().await = next.clone();
        next
    }

    /// Current snapshot, reloading first when it has outlived the TTL.
    ///
    /// A stale snapshot is served as-is while another caller reloads. A cache
    /// that has never loaded has nothing worth serving, so those callers wait
    /// for the in-flight load and reuse what it published.
    pub async fn snapshot(&self) -> Arc<EnumSnapshot> {
        let current = self.snapshot.read().await.clone();
        if current.is_fresh(self.ttl) {
            return current;
        }

        let _guard = match self.reload_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) if current.loaded_at.is_some() => {
                debug!("Enum reload already in flight, serving current snapshot");
                return current;
            }
            Err(_) => {
                debug!("Initial enum load in flight, waiting for it");
                self.reload_lock.lock().await
            }
        };

        // Another caller may have published while we waited.
        let latest = self.snapshot.read().await.clone();
        if latest.is_fresh(self.ttl) {
            return latest;
        }
        self.reload_locked().await
    }

    pub async fn get_display_label(&self, entity: &str, field: &str, value: i64) -> Option<String> {
        if let Some(label) = critical_label(entity, field, value) {
            return Some(label.to_string());
        }
        self.snapshot()
            .await
            .label(entity, field, value)
            .map(str::to_string)
    }

    pub async fn get_coded_value_from_label(&self, entity: &str, field: &str, label: &str) -> Option<i64> {
        if let Some(value) = critical_value(entity, field, label) {
            return Some(value);
        }
        if let Some(value) = self.snapshot().await.value_for_label(entity, field, label) {
            return Some(value);
        }
        match self.store.find_value(entity, field, label).await {
            Ok(value) => value,
            Err(e) => {
                warn!(entity, field, label, error = %e, "Enum value lookup failed");
                None
            }
        }
    }
}
