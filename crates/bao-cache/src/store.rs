use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use chrono::Utc;
use dashmap::DashMap;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::query::{CacheConfig, FetchOutcome, Fetcher, QueryKey, QueryState};

type SharedFetch<V> = Shared<BoxFuture<'static, FetchOutcome<V>>>;

struct InFlight<V> {
    generation: u64,
    fetch: SharedFetch<V>,
}

/// Per key state machine.
///
/// `started` counts every fetch ever issued for the slot and tags it; a
/// completion is only applied when its tag is newer than `applied`.
/// `revalidate_queued` holds at most one block driven re-fetch while a fetch
/// is in flight.
struct Slot<V> {
    id: u64,
    fetcher: Fetcher<V>,
    state: watch::Sender<QueryState<V>>,
    in_flight: Option<InFlight<V>>,
    revalidate_queued: bool,
    started: u64,
    applied: u64,
    completed_at: Option<Instant>,
    subscribers: usize,
    scheduler: Option<CancellationToken>,
}

impl<V> Slot<V> {
    fn new(id: u64, fetcher: Fetcher<V>) -> Self {
        let (state, _) = watch::channel(QueryState::default());
        Self {
            id,
            fetcher,
            state,
            in_flight: None,
            revalidate_queued: false,
            started: 0,
            applied: 0,
            completed_at: None,
            subscribers: 0,
            scheduler: None,
        }
    }

    fn is_fresh(&self, dedupe_interval: Duration) -> bool {
        let state = self.state.borrow();
        state.value.is_some()
            && state.error.is_none()
            && self
                .completed_at
                .is_some_and(|at| at.elapsed() < dedupe_interval)
    }

    fn pending(&self) -> Option<SharedFetch<V>> {
        self.in_flight.as_ref().map(|in_flight| in_flight.fetch.clone())
    }

    fn stop_scheduler(&mut self) {
        if let Some(token) = self.scheduler.take() {
            token.cancel();
        }
    }
}

struct Inner<V> {
    slots: DashMap<QueryKey, Slot<V>>,
    next_slot_id: AtomicU64,
    config: CacheConfig,
}

impl<V: Send + Sync + 'static> Inner<V> {
    /// Starts a new generation for `slot`, superseding whatever is in flight.
    /// Callers wait on it through [`Slot::pending`].
    fn start_fetch(inner: &Arc<Self>, key: &QueryKey, slot: &mut Slot<V>) {
        slot.started += 1;
        slot.revalidate_queued = false;
        let generation = slot.started;
        let slot_id = slot.id;
        let fetcher = Arc::clone(&slot.fetcher);
        let weak: Weak<Self> = Arc::downgrade(inner);
        let task_key = key.clone();

        slot.state.send_if_modified(|state| {
            let was_loading = state.is_loading;
            state.is_loading = true;
            !was_loading
        });

        tracing::debug!(key = %key, generation, "Fetching");
        let task = tokio::spawn(async move {
            let outcome: FetchOutcome<V> = fetcher().await.map(Arc::new).map_err(Arc::new);
            if let Some(inner) = weak.upgrade() {
                Self::complete(&inner, &task_key, slot_id, generation, &outcome);
            }
            outcome
        });

        let fetch = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => Err(Arc::new(anyhow!("fetch task failed: {e}"))),
            }
        }
        .boxed()
        .shared();

        slot.in_flight = Some(InFlight { generation, fetch });
    }

    fn complete(
        inner: &Arc<Self>,
        key: &QueryKey,
        slot_id: u64,
        generation: u64,
        outcome: &FetchOutcome<V>,
    ) {
        let Some(mut slot) = inner.slots.get_mut(key) else {
            tracing::debug!(key = %key, generation, "Ignoring result for a removed query");
            return;
        };
        if slot.id != slot_id {
            tracing::debug!(key = %key, generation, "Ignoring result for a replaced query");
            return;
        }

        if slot
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.generation == generation)
        {
            slot.in_flight = None;
        }
        let restart = slot.in_flight.is_none() && slot.revalidate_queued && slot.subscribers > 0;
        let still_loading = slot.in_flight.is_some() || restart;

        if generation <= slot.applied {
            tracing::debug!(
                key = %key,
                generation,
                applied = slot.applied,
                "Discarding out of order result"
            );
            slot.state.send_if_modified(|state| {
                let changed = state.is_loading != still_loading;
                state.is_loading = still_loading;
                changed
            });
        } else {
            slot.applied = generation;
            slot.completed_at = Some(Instant::now());

            match outcome {
                Ok(value) => {
                    slot.state.send_modify(|state| {
                        state.value = Some(Arc::clone(value));
                        state.error = None;
                        state.updated_at = Some(Utc::now());
                        state.is_loading = still_loading;
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        key = %key,
                        generation,
                        "Fetch failed, keeping last value: {e:#}"
                    );
                    slot.state.send_modify(|state| {
                        state.error = Some(Arc::clone(e));
                        state.is_loading = still_loading;
                    });
                }
            }
        }

        slot.revalidate_queued = false;
        if restart {
            tracing::debug!(key = %key, "Running queued revalidation");
            Self::start_fetch(inner, key, &mut slot);
        }
    }
}

/// Explicit key -> slot store with in-flight deduplication and
/// stale-while-revalidate semantics.
pub struct QueryCache<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for QueryCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Send + Sync + 'static> Default for QueryCache<V> {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl<V: Send + Sync + 'static> QueryCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: DashMap::new(),
                next_slot_id: AtomicU64::new(1),
                config,
            }),
        }
    }

    /// Attaches to `key`, creating its slot on first use.
    ///
    /// The first subscriber of a slot triggers a fetch (unless a fresh value is
    /// already there) and starts the slot scheduler, which re-fetches every
    /// `refresh_interval`. A zero interval disables the scheduler.
    pub fn subscribe(
        &self,
        key: QueryKey,
        fetcher: Fetcher<V>,
        refresh_interval: Duration,
    ) -> Subscription<V> {
        let (slot_id, receiver) = {
            let mut slot = self.inner.slots.entry(key.clone()).or_insert_with(|| {
                let id = self.inner.next_slot_id.fetch_add(1, Ordering::Relaxed);
                Slot::new(id, Arc::clone(&fetcher))
            });

            slot.subscribers += 1;
            if slot.subscribers == 1 {
                slot.fetcher = fetcher;
                if slot.in_flight.is_none() && !slot.is_fresh(self.inner.config.dedupe_interval) {
                    Inner::start_fetch(&self.inner, &key, &mut slot);
                }
                if !refresh_interval.is_zero() {
                    slot.scheduler = Some(self.spawn_scheduler(key.clone(), refresh_interval));
                }
            }
            (slot.id, slot.state.subscribe())
        };

        Subscription {
            key,
            slot_id,
            cache: self.clone(),
            receiver,
        }
    }

    fn spawn_scheduler(&self, key: QueryKey, refresh_interval: Duration) -> CancellationToken {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let weak = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(refresh_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately, the subscribe fetch covers it.
            ticker.tick().await;

            loop {
                tokio::select! {
                    () = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(inner) = weak.upgrade() else { break };
                        Self { inner }.trigger(&key);
                    }
                }
            }
            tracing::debug!(key = %key, "Scheduler stopped");
        });

        token
    }

    /// Starts a fetch unless one is already in flight. Does not wait.
    fn trigger(&self, key: &QueryKey) {
        if let Some(mut slot) = self.inner.slots.get_mut(key) {
            if slot.in_flight.is_none() {
                Inner::start_fetch(&self.inner, key, &mut slot);
            }
        }
    }

    /// Returns the current value of `key`, fetching it if needed.
    ///
    /// Joins the in-flight fetch when there is one, so concurrent callers
    /// observe a single read. Within the dedupe window of a successful fetch
    /// the cached value is returned as is. `None` when the key is unknown.
    pub async fn refresh(&self, key: &QueryKey) -> Option<Result<Arc<V>, Arc<anyhow::Error>>> {
        let fetch = {
            let mut slot = self.inner.slots.get_mut(key)?;
            if slot.in_flight.is_none() {
                if slot.is_fresh(self.inner.config.dedupe_interval) {
                    let value = slot.state.borrow().value.clone()?;
                    return Some(Ok(value));
                }
                Inner::start_fetch(&self.inner, key, &mut slot);
            }
            slot.pending()?
        };
        Some(fetch.await)
    }

    /// Forces a new fetch for `key` even if one is in flight. The older one's
    /// result is dropped if it lands after this one.
    pub async fn revalidate(&self, key: &QueryKey) -> Option<Result<Arc<V>, Arc<anyhow::Error>>> {
        let fetch = {
            let mut slot = self.inner.slots.get_mut(key)?;
            Inner::start_fetch(&self.inner, key, &mut slot);
            slot.pending()?
        };
        Some(fetch.await)
    }

    /// Re-fetches every subscribed key, without waiting.
    ///
    /// A key with a fetch in flight gets one follow-up fetch once it lands,
    /// however many times this is called meanwhile. Returns the number of
    /// keys started or queued.
    pub fn revalidate_all(&self) -> usize {
        let mut scheduled = 0;
        for mut entry in self.inner.slots.iter_mut() {
            if entry.subscribers == 0 {
                continue;
            }
            if entry.in_flight.is_some() {
                entry.revalidate_queued = true;
            } else {
                let key = entry.key().clone();
                Inner::start_fetch(&self.inner, &key, entry.value_mut());
            }
            scheduled += 1;
        }
        scheduled
    }

    /// Drops the slot of `key`: its scheduler stops and late results are ignored.
    pub fn remove(&self, key: &QueryKey) -> bool {
        match self.inner.slots.remove(key) {
            Some((_, mut slot)) => {
                slot.stop_scheduler();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, key: &QueryKey) -> Option<QueryState<V>> {
        self.inner
            .slots
            .get(key)
            .map(|slot| slot.state.borrow().clone())
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.inner.slots.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.slots.is_empty()
    }

    /// Detaches from the slot `slot_id`. A slot that replaced it under the
    /// same key is left alone.
    fn unsubscribe(&self, key: &QueryKey, slot_id: u64) {
        if let Some(mut slot) = self.inner.slots.get_mut(key) {
            if slot.id != slot_id {
                return;
            }
            slot.subscribers = slot.subscribers.saturating_sub(1);
            if slot.subscribers == 0 {
                slot.stop_scheduler();
            }
        }
    }

    fn remove_unused(&self, key: &QueryKey, slot_id: u64) -> bool {
        let removed = self
            .inner
            .slots
            .remove_if(key, |_, slot| slot.id == slot_id && slot.subscribers == 0);
        match removed {
            Some((_, mut slot)) => {
                slot.stop_scheduler();
                true
            }
            None => false,
        }
    }
}

/// A live attachment to one cache key. Dropping it detaches.
pub struct Subscription<V: Send + Sync + 'static> {
    key: QueryKey,
    slot_id: u64,
    cache: QueryCache<V>,
    receiver: watch::Receiver<QueryState<V>>,
}

impl<V: Send + Sync + 'static> Subscription<V> {
    pub const fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn state(&self) -> QueryState<V> {
        self.receiver.borrow().clone()
    }

    /// Waits for the next state change. `false` once the slot is gone.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }

    pub async fn refresh(&self) -> Option<Result<Arc<V>, Arc<anyhow::Error>>> {
        self.cache.refresh(&self.key).await
    }

    /// Detaches and drops the slot if nobody else is subscribed to it.
    /// Returns whether the slot was dropped.
    pub fn release(self) -> bool {
        let cache = self.cache.clone();
        let key = self.key.clone();
        let slot_id = self.slot_id;
        drop(self);
        cache.remove_unused(&key, slot_id)
    }
}

impl<V: Send + Sync + 'static> Drop for Subscription<V> {
    fn drop(&mut self) {
        self.cache.unsubscribe(&self.key, self.slot_id);
    }
}
