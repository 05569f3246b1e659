use std::{
    fmt::Debug,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use tokio::sync::Notify;

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Handle to one outstanding load.
///
/// Every read of a pending slot hands out a clone of the same handle, so
/// whoever is waiting can compare handles with [`Suspension::same_handle`]
/// and await [`Suspension::settled`] to know when to retry.
#[derive(Clone)]
pub struct Suspension {
    inner: Arc<SuspensionInner>,
}

struct SuspensionInner {
    id: u64,
    resource: Arc<str>,
    settled: AtomicBool,
    notify: Notify,
}

impl Suspension {
    pub(crate) fn new(resource: Arc<str>) -> Self {
        Self {
            inner: Arc::new(SuspensionInner {
                id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
                resource,
                settled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Unique per load, stable across clones.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Name of the reader that started the load.
    pub fn resource(&self) -> &str {
        &self.inner.resource
    }

    pub fn is_settled(&self) -> bool {
        self.inner.settled.load(Ordering::SeqCst)
    }

    pub fn same_handle(&self, other: &Suspension) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Resolves once the load has resolved or rejected.
    ///
    /// Never resolves if the owning cache scope was released first.
    pub async fn settled(&self) {
        loop {
            // Created before the check so a concurrent `settle` can't slip in between.
            let notified = self.inner.notify.notified();
            if self.is_settled() {
                return;
            }
            notified.await;
        }
    }

    pub(crate) fn settle(&self) {
        self.inner.settled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }
}

impl Debug for Suspension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Suspension")
            .field("id", &self.inner.id)
            .field("resource", &self.inner.resource)
            .field("settled", &self.is_settled())
            .finish()
    }
}
