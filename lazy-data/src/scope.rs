use std::sync::Arc;

use tracing::debug;

use crate::cache::ResourceCache;

/// Owns the one [`ResourceCache`] of a mounted subtree.
///
/// Views below the scope borrow the cache through [`CacheScope::cache`].
/// Releasing the scope (or dropping it) abandons every slot: loads still in
/// flight run to completion but their results are discarded.
#[derive(Debug)]
pub struct CacheScope {
    cache: ResourceCache,
}

impl CacheScope {
    pub fn acquire(name: impl Into<Arc<str>>) -> Self {
        let name = name.into();
        debug!(scope = %name, "Acquired cache scope");
        Self {
            cache: ResourceCache::new(name),
        }
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    /// Same as dropping the scope; spelled out for call sites that unmount.
    pub fn release(self) {}
}

impl Drop for CacheScope {
    fn drop(&mut self) {
        let stats = self.cache.stats();
        self.cache.release();
        debug!(scope = self.cache.scope_name(), abandoned = stats.pending, "Released cache scope");
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use parking_lot::Mutex;
    use tokio::sync::oneshot;

    use super::*;
    use crate::{error::Missing, reader::ResourceReader, slot::SlotStatus};

    type Gates = Arc<Mutex<Vec<oneshot::Sender<u32>>>>;

    /// Reader whose loads finish only when the test sends through the gate.
    fn gated_reader(gates: Gates, settled: Arc<AtomicUsize>) -> ResourceReader<u32, u32> {
        ResourceReader::from_future_source("gated", move |_key: u32| {
            let (tx, rx) = oneshot::channel();
            gates.lock().push(tx);
            let settled = settled.clone();
            async move {
                let value = rx.await?;
                settled.fetch_add(1, Ordering::SeqCst);
                Ok::<_, color_eyre::Report>(value)
            }
        })
    }

    #[tokio::test]
    async fn release_discards_late_results() {
        let gates = Gates::default();
        let settled = Arc::new(AtomicUsize::new(0));
        let reader = gated_reader(gates.clone(), settled.clone());

        let live = CacheScope::acquire("live");
        let doomed = CacheScope::acquire("doomed");

        let Err(Missing::InFlight(handle)) = reader.read(doomed.cache(), 1) else {
            panic!("Expected the first read to suspend");
        };
        doomed.release();

        for gate in gates.lock().drain(..) {
            gate.send(5).expect("loader dropped its gate");
        }
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        // The loader itself completed, but nothing was written or woken.
        assert_eq!(settled.load(Ordering::SeqCst), 1);
        assert!(!handle.is_settled());
        assert!(
            tokio::time::timeout(Duration::from_millis(50), handle.settled())
                .await
                .is_err()
        );
        assert_eq!(live.cache().stats().total(), 0);
        assert_eq!(live.cache().status(&reader, &1), None);
    }

    #[tokio::test]
    async fn scopes_do_not_share_slots() {
        let gates = Gates::default();
        let settled = Arc::new(AtomicUsize::new(0));
        let reader = gated_reader(gates.clone(), settled);

        let a = CacheScope::acquire("a");
        let b = CacheScope::acquire("b");

        let Err(Missing::InFlight(from_a)) = reader.read(a.cache(), 1) else {
            panic!("Expected suspension");
        };
        let Err(Missing::InFlight(from_b)) = reader.read(b.cache(), 1) else {
            panic!("Expected suspension");
        };
        assert!(!from_a.same_handle(&from_b));

        let first = gates.lock().remove(0);
        first.send(1).expect("loader dropped its gate");
        from_a.settled().await;

        assert_eq!(a.cache().status(&reader, &1), Some(SlotStatus::Resolved));
        assert_eq!(b.cache().status(&reader, &1), Some(SlotStatus::Pending));
    }
}
