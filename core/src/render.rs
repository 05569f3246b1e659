use std::{fmt::Debug, hash::Hash, time::Duration};

use movie_search_lazy_data::{PotentialResult, ResourceCache, ResourceReader, Suspension};
use tokio::time::Instant;

use crate::{element::Element, suspense::BoundaryTable};

/// What a view produces: an element, or the reason it can't yet.
pub type ViewResult = PotentialResult<Element>;

/// Priority of a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    /// Applied synchronously. Suspensions go to the nearest boundary.
    Urgent,
    /// Low-priority catch-up of deferred state. A suspension that would hide
    /// already committed content discards the whole pass instead.
    Deferred,
    /// Deferred catch-up past its timeout. Commits like an urgent pass.
    Forced,
}

/// Both tiers of the application state as seen by one pass.
#[derive(Debug)]
pub struct Tiers<'a, S> {
    /// Latest value, always current.
    pub urgent: &'a S,
    /// Value async-sensitive views should key their reads off.
    pub deferred: &'a S,
}

impl<S> Clone for Tiers<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for Tiers<'_, S> {}

/// Handles collected while rendering that decide what happens to the pass.
#[derive(Debug, Default)]
pub(crate) struct PassOutcome {
    /// Suspensions that would have hidden committed content in a deferred pass.
    pub blocked: Vec<Suspension>,
    /// Suspensions boundaries are waiting on to retry.
    pub waiting: Vec<Suspension>,
    /// Earliest grace deadline still running.
    pub wake_at: Option<Instant>,
}

/// Everything a view can reach while rendering.
pub struct RenderCx<'a> {
    cache: &'a ResourceCache,
    lane: Lane,
    now: Instant,
    default_grace: Duration,
    pub(crate) boundaries: &'a mut BoundaryTable,
    /// Ids of the boundaries enclosing the view being rendered, innermost last.
    path: Vec<String>,
    pub(crate) outcome: PassOutcome,
}

impl<'a> RenderCx<'a> {
    pub(crate) fn new(
        cache: &'a ResourceCache,
        lane: Lane,
        now: Instant,
        default_grace: Duration,
        boundaries: &'a mut BoundaryTable,
    ) -> Self {
        Self {
            cache,
            lane,
            now,
            default_grace,
            boundaries,
            path: Vec::new(),
            outcome: PassOutcome::default(),
        }
    }

    pub fn cache(&self) -> &'a ResourceCache {
        self.cache
    }

    pub fn lane(&self) -> Lane {
        self.lane
    }

    pub fn now(&self) -> Instant {
        self.now
    }

    /// Grace period of boundaries that don't set one.
    pub fn default_grace(&self) -> Duration {
        self.default_grace
    }

    /// Reads through `reader` against this subtree's cache.
    pub fn read<K, V>(&self, reader: &ResourceReader<K, V>, key: K) -> PotentialResult<V>
    where
        K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        reader.read(self.cache, key)
    }

    pub fn preload<K, V>(&self, reader: &ResourceReader<K, V>, key: K)
    where
        K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        reader.preload(self.cache, key);
    }

    /// Full path of a boundary named `key` under the current one.
    pub(crate) fn boundary_id(&self, key: &str) -> String {
        match self.path.last() {
            Some(parent) => format!("{parent}/{key}"),
            None => key.to_string(),
        }
    }

    pub(crate) fn enter(&mut self, id: String) {
        self.path.push(id);
    }

    pub(crate) fn exit(&mut self) {
        self.path.pop();
    }

    pub(crate) fn block_on(&mut self, suspension: Suspension) {
        push_unique(&mut self.outcome.blocked, suspension);
    }

    pub(crate) fn wait_on(&mut self, suspension: Suspension) {
        push_unique(&mut self.outcome.waiting, suspension);
    }

    pub(crate) fn wake_at(&mut self, at: Instant) {
        self.outcome.wake_at = Some(match self.outcome.wake_at {
            Some(prev) => prev.min(at),
            None => at,
        });
    }

    pub(crate) fn finish(self) -> PassOutcome {
        self.outcome
    }
}

pub(crate) fn push_unique(handles: &mut Vec<Suspension>, suspension: Suspension) {
    if !handles.iter().any(|h| h.same_handle(&suspension)) {
        handles.push(suspension);
    }
}
