use std::{
    fmt::Debug,
    future::Future,
    hash::Hash,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use color_eyre::Report;
use futures::{FutureExt, TryFutureExt};

use crate::{cache::ResourceCache, error::PotentialResult, BoxFut};

/// Identity of one reader. Two readers wrapping the same function are still
/// different loaders and never share slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoaderId(usize);

impl LoaderId {
    fn next() -> Self {
        static CNTR: AtomicUsize = AtomicUsize::new(0);
        LoaderId(CNTR.fetch_add(1, Ordering::SeqCst))
    }
}

type Source<K, V> = dyn Fn(K) -> BoxFut<'static, Result<V, Report>> + Send + Sync;

/// An async loader bound to a name, readable against any [`ResourceCache`].
///
/// ```ignore
/// let read_movie = ResourceReader::from_future_source("movie", |id: u64| async move {
///     catalog.movie(id).await
/// });
/// let movie = read_movie.read(cache, 42)?;
/// ```
pub struct ResourceReader<K, V> {
    inner: Arc<ReaderInner<K, V>>,
}

struct ReaderInner<K, V> {
    id: LoaderId,
    name: Arc<str>,
    source: Box<Source<K, V>>,
}

impl<K, V> Clone for ResourceReader<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V> Debug for ResourceReader<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceReader")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .finish()
    }
}

impl<K, V> ResourceReader<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn from_future_source<F, Fut, E>(name: impl Into<Arc<str>>, source: F) -> Self
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Into<Report> + 'static,
    {
        Self {
            inner: Arc::new(ReaderInner {
                id: LoaderId::next(),
                name: name.into(),
                source: Box::new(move |key| -> BoxFut<'static, Result<V, Report>> {
                    let fut = source(key);
                    fut.map_err(Into::<Report>::into).boxed()
                }),
            }),
        }
    }

    pub fn id(&self) -> LoaderId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        self.inner.name.clone()
    }

    /// Invokes the underlying loader. Only the cache should call this.
    pub(crate) fn load(&self, key: K) -> BoxFut<'static, Result<V, Report>> {
        (self.inner.source)(key)
    }

    pub fn read(&self, cache: &ResourceCache, key: K) -> PotentialResult<V> {
        cache.read(self, key)
    }

    pub fn preload(&self, cache: &ResourceCache, key: K) {
        cache.preload(self, key);
    }

    pub fn invalidate(&self, cache: &ResourceCache, key: &K) -> bool {
        cache.invalidate(self, key)
    }
}
