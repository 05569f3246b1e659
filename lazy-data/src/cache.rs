use std::{
    any::Any,
    collections::HashMap,
    fmt::Debug,
    hash::Hash,
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
};

use color_eyre::eyre::eyre;
use dashmap::DashMap;
use futures::FutureExt;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::{
    error::{LoadFailure, Missing, PotentialResult, ScopeTornDown},
    reader::{LoaderId, ResourceReader},
    slot::{ResourceSlot, SlotStatus},
    suspension::Suspension,
};

/// Memoizes async loads per (loader, key).
///
/// A cache is only ever created by a [`CacheScope`](crate::scope::CacheScope)
/// and handed to views by reference. Settlement tasks keep a weak pointer, so
/// once the scope releases the cache late results are dropped on the floor.
pub struct ResourceCache {
    shared: Arc<CacheShared>,
}

struct CacheShared {
    scope: Arc<str>,
    tables: DashMap<LoaderId, Arc<dyn ErasedTable>>,
    released: AtomicBool,
}

/// Slot counts by status, summed over every loader in a cache.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub pending: usize,
    pub resolved: usize,
    pub rejected: usize,
}

impl CacheStats {
    pub fn total(&self) -> usize {
        self.pending + self.resolved + self.rejected
    }
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} slots ({} pending, {} resolved, {} rejected)",
            self.total(),
            self.pending,
            self.resolved,
            self.rejected
        )
    }
}

struct SlotTable<K, V> {
    slots: Mutex<HashMap<K, ResourceSlot<V>>>,
}

impl<K, V> Default for SlotTable<K, V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

/// Lets one map hold slot tables of different key and value types.
trait ErasedTable: Send + Sync + 'static {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
    fn stats(&self) -> CacheStats;
    fn abandon(&self);
}

impl<K, V> ErasedTable for SlotTable<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        for slot in self.slots.lock().values() {
            match slot.status() {
                SlotStatus::Pending => stats.pending += 1,
                SlotStatus::Resolved => stats.resolved += 1,
                SlotStatus::Rejected => stats.rejected += 1,
            }
        }
        stats
    }

    fn abandon(&self) {
        self.slots.lock().clear();
    }
}

fn downcast<K, V>(table: Arc<dyn ErasedTable>) -> Arc<SlotTable<K, V>>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    table
        .into_any()
        .downcast::<SlotTable<K, V>>()
        .unwrap_or_else(|_| unreachable!("a loader id is only ever used with one key and value type"))
}

impl CacheShared {
    fn existing_table<K, V>(&self, id: LoaderId) -> Option<Arc<SlotTable<K, V>>>
    where
        K: Eq + Hash + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let table = self.tables.get(&id)?.value().clone();
        Some(downcast(table))
    }
}

impl ResourceCache {
    pub(crate) fn new(scope: Arc<str>) -> Self {
        Self {
            shared: Arc::new(CacheShared {
                scope,
                tables: DashMap::new(),
                released: AtomicBool::new(false),
            }),
        }
    }

    pub fn scope_name(&self) -> &str {
        &self.shared.scope
    }

    fn table<K, V>(&self, reader: &ResourceReader<K, V>) -> Arc<SlotTable<K, V>>
    where
        K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let table = self
            .shared
            .tables
            .entry(reader.id())
            .or_insert_with(|| Arc::new(SlotTable::<K, V>::default()))
            .value()
            .clone();
        downcast(table)
    }

    /// Returns the value if the slot resolved, the stored error if it
    /// rejected, or `Missing::InFlight` with the slot's handle if it is
    /// still loading. The first read of an unseen key starts the load.
    pub fn read<K, V>(&self, reader: &ResourceReader<K, V>, key: K) -> PotentialResult<V>
    where
        K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let table = self.table(reader);

        let suspension = {
            // only sync code in this block
            let mut slots = table.slots.lock();

            if let Some(slot) = slots.get(&key) {
                trace!(resource = reader.name(), ?key, status = ?slot.status(), "Memoized read");
                return slot.observe();
            }

            let suspension = Suspension::new(reader.name_arc());
            slots.insert(key.clone(), ResourceSlot::Pending(suspension.clone()));
            suspension
        };

        debug!(scope = %self.shared.scope, resource = reader.name(), ?key, "Starting load");

        let fut = reader.load(key.clone());
        let shared = Arc::downgrade(&self.shared);
        let id = reader.id();
        let resource = reader.name_arc();
        let handle = suspension.clone();

        tokio::spawn(async move {
            let res = match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(res) => res.map_err(|err| LoadFailure::new(resource.clone(), err)),
                Err(panic) => Err(LoadFailure::new(
                    resource.clone(),
                    eyre!("In-Flight load panicked: {}", panic_message(&*panic)),
                )),
            };

            if let Err(ScopeTornDown) = settle(&shared, id, &key, &handle, res) {
                debug!(%resource, ?key, "Scope released before load settled, discarding result");
            }
        });

        Err(Missing::InFlight(suspension))
    }

    /// Starts a load without asking the caller to wait for it.
    pub fn preload<K, V>(&self, reader: &ResourceReader<K, V>, key: K)
    where
        K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        if let Err(Missing::Failed(err)) = self.read(reader, key) {
            trace!(%err, "Preloaded resource already failed");
        }
    }

    /// Forgets the slot for `key` so the next read loads again.
    pub fn invalidate<K, V>(&self, reader: &ResourceReader<K, V>, key: &K) -> bool
    where
        K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let Some(table) = self.shared.existing_table::<K, V>(reader.id()) else {
            return false;
        };
        let removed = table.slots.lock().remove(key).is_some();
        if removed {
            debug!(resource = reader.name(), ?key, "Invalidated slot");
        }
        removed
    }

    pub fn status<K, V>(&self, reader: &ResourceReader<K, V>, key: &K) -> Option<SlotStatus>
    where
        K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let table = self.shared.existing_table::<K, V>(reader.id())?;
        let slots = table.slots.lock();
        slots.get(key).map(ResourceSlot::status)
    }

    pub fn stats(&self) -> CacheStats {
        self.shared
            .tables
            .iter()
            .map(|table| table.value().stats())
            .fold(CacheStats::default(), |acc, s| CacheStats {
                pending: acc.pending + s.pending,
                resolved: acc.resolved + s.resolved,
                rejected: acc.rejected + s.rejected,
            })
    }

    /// Abandons every slot. Loads still running will find the cache gone
    /// and never touch a slot or wake a waiter.
    pub(crate) fn release(&self) {
        self.shared.released.store(true, Ordering::SeqCst);
        for table in self.shared.tables.iter() {
            table.value().abandon();
        }
        self.shared.tables.clear();
    }
}

impl Debug for ResourceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCache")
            .field("scope", &self.shared.scope)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Writes a load's outcome back into its slot. Runs on the settlement task,
/// which is the only writer besides reads on the owning scope.
fn settle<K, V>(
    shared: &Weak<CacheShared>,
    id: LoaderId,
    key: &K,
    handle: &Suspension,
    outcome: Result<V, LoadFailure>,
) -> Result<(), ScopeTornDown>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    let shared = shared.upgrade().ok_or(ScopeTornDown)?;
    let table = shared.existing_table::<K, V>(id).ok_or(ScopeTornDown)?;

    // only sync code in this block
    let mut slots = table.slots.lock();
    if shared.released.load(Ordering::SeqCst) {
        return Err(ScopeTornDown);
    }

    let ok = outcome.is_ok();
    match slots.get_mut(key).map(|slot| slot.settle(handle, outcome)) {
        Some(true) => debug!(resource = handle.resource(), ?key, ok, "Load settled"),
        _ => trace!(resource = handle.resource(), ?key, "Slot was invalidated while loading"),
    }
    // Waiters still retry even if the slot was replaced; they'll pick up the new one.
    handle.settle();
    Ok(())
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}
