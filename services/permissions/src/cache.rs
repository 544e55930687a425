//! Per-rendering permission snapshot cache.
//!
//! # Purpose
//! Serves permission snapshots from memory and keeps them close to the
//! authoritative copy without putting a network round trip on every check.
//!
//! # Key invariants
//! - At most one entry per rendering; a refresh swaps the whole entry.
//! - At most one fetch in flight per rendering. Synchronous callers queue on
//!   the rendering's load lock and reuse whatever the in-flight fetch stored.
//! - A stale entry is still served; the first caller to observe it spawns a
//!   single background refresh and never waits for it.
//! - Every fetch is bounded by the configured timeout, and the in-flight
//!   markers are released however the fetch ends.
//!
//! # Concurrency model
//! The map only hands out per-rendering slots. Each slot carries its own
//! entry lock (never held across an await), its own async load lock, and its
//! own refresh flag, so unrelated renderings never contend.
use crate::config::PermissionsConfig;
use crate::fetcher::{FetchError, SnapshotFetcher};
use dashmap::DashMap;
use parking_lot::RwLock;
use rendering_authz::{AuthzError, AuthzResult, RenderingId, RenderingPermissionSnapshot};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Clone)]
pub struct PermissionSnapshotCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    fetcher: Arc<dyn SnapshotFetcher>,
    slots: DashMap<RenderingId, Arc<RenderingSlot>>,
    ttl: Duration,
    fetch_timeout: Duration,
}

#[derive(Default)]
struct RenderingSlot {
    entry: RwLock<Option<CacheEntry>>,
    load: Mutex<()>,
    refreshing: AtomicBool,
}

#[derive(Clone)]
struct CacheEntry {
    snapshot: Arc<RenderingPermissionSnapshot>,
    fetched_at: Instant,
    invalidated: bool,
    // Set when a synchronous reload failed and the previous entry was kept.
    refresh_due: bool,
}

impl CacheEntry {
    fn is_stale(&self, now: Instant, ttl: Duration) -> bool {
        self.refresh_due || now.saturating_duration_since(self.fetched_at) >= ttl
    }
}

impl RenderingSlot {
    fn usable(&self) -> Option<CacheEntry> {
        self.entry
            .read()
            .as_ref()
            .filter(|entry| !entry.invalidated)
            .cloned()
    }

    fn store(&self, snapshot: RenderingPermissionSnapshot) -> Arc<RenderingPermissionSnapshot> {
        let snapshot = Arc::new(snapshot);
        *self.entry.write() = Some(CacheEntry {
            snapshot: Arc::clone(&snapshot),
            fetched_at: Instant::now(),
            invalidated: false,
            refresh_due: false,
        });
        snapshot
    }

    fn invalidate(&self) {
        if let Some(entry) = self.entry.write().as_mut() {
            entry.invalidated = true;
        }
    }

    // Put an invalidated entry back in service after a failed reload and
    // leave it due for a background refresh. Returns false when nothing was
    // cached.
    fn restore(&self) -> bool {
        match self.entry.write().as_mut() {
            Some(entry) => {
                entry.invalidated = false;
                entry.refresh_due = true;
                true
            }
            None => false,
        }
    }
}

// Clears the refresh flag when the background task ends, including on
// cancellation.
struct RefreshFlag(Arc<RenderingSlot>);

impl Drop for RefreshFlag {
    fn drop(&mut self) {
        self.0.refreshing.store(false, Ordering::Release);
    }
}

impl PermissionSnapshotCache {
    pub fn new(fetcher: Arc<dyn SnapshotFetcher>, config: &PermissionsConfig) -> Self {
        Self::with_settings(fetcher, config.snapshot_ttl, config.fetch_timeout)
    }

    pub fn with_settings(
        fetcher: Arc<dyn SnapshotFetcher>,
        ttl: Duration,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                fetcher,
                slots: DashMap::new(),
                ttl,
                fetch_timeout,
            }),
        }
    }

    /// Return the snapshot for `rendering`.
    ///
    /// # Behavior
    /// - No usable entry: fetch synchronously (single-flight) and store it.
    /// - Stale entry: return it and schedule one background refresh.
    /// - Fresh entry: return it without I/O.
    ///
    /// # Errors
    /// - [`AuthzError::SnapshotUnavailable`] if the synchronous fetch fails.
    ///   Nothing is stored in that case.
    pub async fn get(
        &self,
        rendering: RenderingId,
    ) -> AuthzResult<Arc<RenderingPermissionSnapshot>> {
        let slot = self.inner.slot(rendering);
        if let Some(entry) = slot.usable() {
            if entry.is_stale(Instant::now(), self.inner.ttl) {
                self.schedule_refresh(rendering, &slot);
            }
            return Ok(entry.snapshot);
        }
        self.inner.load(rendering, &slot).await
    }

    /// Mark the rendering's entry invalid so the next read re-fetches.
    /// Other renderings are untouched.
    pub fn invalidate(&self, rendering: RenderingId) {
        if let Some(slot) = self.inner.slots.get(&rendering) {
            slot.invalidate();
        }
    }

    /// Invalidate and synchronously reload the rendering's snapshot.
    ///
    /// Callers arriving while another load for the same rendering is in
    /// flight wait for it and reuse its result. A failed reload reaches only
    /// its callers: the previous snapshot stays readable and is refreshed in
    /// the background on the next read.
    pub async fn force_reload(
        &self,
        rendering: RenderingId,
    ) -> AuthzResult<Arc<RenderingPermissionSnapshot>> {
        let slot = self.inner.slot(rendering);
        slot.invalidate();
        self.inner.load(rendering, &slot).await
    }

    /// `Some(true)` when the cached entry is stale or invalidated, `None`
    /// when nothing is cached for the rendering.
    pub fn is_stale(&self, rendering: RenderingId) -> Option<bool> {
        let slot = self.inner.slots.get(&rendering)?;
        let entry = slot.entry.read();
        entry
            .as_ref()
            .map(|entry| entry.invalidated || entry.is_stale(Instant::now(), self.inner.ttl))
    }

    /// Number of renderings with a cached snapshot.
    pub fn len(&self) -> usize {
        self.inner
            .slots
            .iter()
            .filter(|slot| slot.entry.read().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    fn schedule_refresh(&self, rendering: RenderingId, slot: &Arc<RenderingSlot>) {
        // First stale observer wins; later ones keep serving the cached value.
        if slot
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let inner = Arc::clone(&self.inner);
        let flag = RefreshFlag(Arc::clone(slot));
        tokio::spawn(async move {
            let flag = flag;
            inner.refresh(rendering, &flag.0).await;
        });
    }
}

impl CacheInner {
    fn slot(&self, rendering: RenderingId) -> Arc<RenderingSlot> {
        if let Some(slot) = self.slots.get(&rendering) {
            return Arc::clone(&slot);
        }
        Arc::clone(&self.slots.entry(rendering).or_default())
    }

    // Drop a slot that never held a snapshot once no other caller is waiting
    // on it, so failed lookups of unknown renderings do not accumulate.
    fn discard_empty_slot(&self, rendering: RenderingId, slot: &Arc<RenderingSlot>) {
        self.slots.remove_if(&rendering, |_, current| {
            Arc::ptr_eq(current, slot)
                && Arc::strong_count(slot) <= 2
                && current.entry.read().is_none()
        });
    }

    async fn load(
        &self,
        rendering: RenderingId,
        slot: &Arc<RenderingSlot>,
    ) -> AuthzResult<Arc<RenderingPermissionSnapshot>> {
        let guard = slot.load.lock().await;
        // Another caller may have completed the load while this one waited.
        if let Some(entry) = slot.usable() {
            return Ok(entry.snapshot);
        }
        match self.fetch(rendering).await {
            Ok(snapshot) => Ok(slot.store(snapshot)),
            Err(err) => {
                tracing::warn!(
                    rendering = %rendering,
                    error = %err,
                    "permission snapshot fetch failed"
                );
                let kept = slot.restore();
                drop(guard);
                if !kept {
                    self.discard_empty_slot(rendering, slot);
                }
                Err(AuthzError::SnapshotUnavailable {
                    rendering: rendering.to_string(),
                    reason: err.to_string(),
                })
            }
        }
    }

    async fn refresh(&self, rendering: RenderingId, slot: &RenderingSlot) {
        let _load = slot.load.lock().await;
        if slot
            .usable()
            .is_some_and(|entry| !entry.is_stale(Instant::now(), self.ttl))
        {
            return;
        }
        match self.fetch(rendering).await {
            Ok(snapshot) => {
                slot.store(snapshot);
                metrics::counter!("authz_snapshot_refresh_total", "outcome" => "ok").increment(1);
                tracing::debug!(rendering = %rendering, "permission snapshot refreshed");
            }
            Err(err) => {
                // The previous entry stays in place and keeps being served.
                metrics::counter!("authz_snapshot_refresh_total", "outcome" => "error")
                    .increment(1);
                tracing::warn!(
                    rendering = %rendering,
                    error = %err,
                    "background permission refresh failed; serving cached snapshot"
                );
            }
        }
    }

    async fn fetch(
        &self,
        rendering: RenderingId,
    ) -> Result<RenderingPermissionSnapshot, FetchError> {
        let fetch = self.fetcher.fetch(rendering);
        let result = match tokio::time::timeout(self.fetch_timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.fetch_timeout)),
        };
        let outcome = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!("authz_snapshot_fetch_total", "outcome" => outcome).increment(1);
        result
    }
}
