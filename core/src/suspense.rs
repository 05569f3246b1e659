use std::{collections::HashMap, time::Duration};

use movie_search_lazy_data::{Missing, Suspension};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::{
    element::Element,
    render::{Lane, RenderCx, ViewResult},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundaryPhase {
    ShowingPrimary,
    ShowingFallback,
    /// Children rendered after having suspended; next pass settles back to
    /// `ShowingPrimary`.
    CommittingPrimary,
}

#[derive(Debug, Clone)]
pub(crate) struct BoundaryState {
    phase: BoundaryPhase,
    /// When the children first suspended, if they still are.
    suspended_since: Option<Instant>,
    awaiting: Option<Suspension>,
    /// Last primary content that rendered without suspending.
    committed: Option<Element>,
    visited: bool,
}

impl BoundaryState {
    fn new() -> Self {
        Self {
            phase: BoundaryPhase::ShowingPrimary,
            suspended_since: None,
            awaiting: None,
            committed: None,
            visited: false,
        }
    }

    /// Whether real content is on screen that a suspension would replace.
    fn shows_committed_primary(&self) -> bool {
        self.phase != BoundaryPhase::ShowingFallback
            && self.suspended_since.is_none()
            && self.committed.is_some()
    }

    fn held(&self) -> Element {
        self.committed.clone().unwrap_or_default()
    }
}

/// Per-boundary state that survives between render passes, keyed by the
/// boundary's path.
///
/// A pass renders against a copy; only committed passes replace the table.
#[derive(Debug, Clone, Default)]
pub struct BoundaryTable {
    states: HashMap<String, BoundaryState>,
}

impl BoundaryTable {
    pub fn phase(&self, id: &str) -> Option<BoundaryPhase> {
        self.states.get(id).map(|state| state.phase)
    }

    /// The handle a boundary is currently waiting on, if any.
    pub fn awaiting(&self, id: &str) -> Option<&Suspension> {
        self.states.get(id)?.awaiting.as_ref()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub(crate) fn begin_pass(&mut self) {
        for state in self.states.values_mut() {
            state.visited = false;
        }
    }

    /// Drops boundaries the pass didn't reach; they were unmounted.
    pub(crate) fn end_pass(&mut self) {
        self.states.retain(|id, state| {
            if !state.visited {
                debug!(boundary = %id, "Unmounted suspense boundary");
            }
            state.visited
        });
    }
}

/// Catches suspensions raised while rendering its children.
///
/// Children that suspend keep showing their last committed content for up
/// to `grace`, then switch to `fallback` until the awaited load settles.
#[derive(Debug, Clone)]
pub struct SuspenseBoundary {
    key: String,
    fallback: Element,
    grace: Option<Duration>,
    error_fallback: Option<Element>,
}

enum Caught {
    Blocked(Suspension, Element),
    Held(Suspension, Element, Instant),
    Fallback(Suspension),
}

impl SuspenseBoundary {
    /// `key` must be unique among the boundary's siblings.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            fallback: Element::Empty,
            grace: None,
            error_fallback: None,
        }
    }

    pub fn fallback(mut self, fallback: impl Into<Element>) -> Self {
        self.fallback = fallback.into();
        self
    }

    /// Defaults to [`RenderConfig::default_grace`](crate::RenderConfig::default_grace).
    pub fn grace(mut self, grace: Duration) -> Self {
        self.grace = Some(grace);
        self
    }

    /// Renders `error_fallback` instead of propagating a load failure.
    pub fn error_fallback(mut self, error_fallback: impl Into<Element>) -> Self {
        self.error_fallback = Some(error_fallback.into());
        self
    }

    pub fn render<F>(&self, cx: &mut RenderCx<'_>, children: F) -> ViewResult
    where
        F: FnOnce(&mut RenderCx<'_>) -> ViewResult,
    {
        let id = cx.boundary_id(&self.key);
        cx.enter(id.clone());
        let result = children(cx);
        cx.exit();

        let now = cx.now();
        let lane = cx.lane();
        let grace = self.grace.unwrap_or(cx.default_grace());
        let state = cx
            .boundaries
            .states
            .entry(id.clone())
            .or_insert_with(BoundaryState::new);
        state.visited = true;

        let suspension = match result {
            Ok(element) => {
                state.phase = if state.suspended_since.is_some()
                    || state.phase == BoundaryPhase::ShowingFallback
                {
                    BoundaryPhase::CommittingPrimary
                } else {
                    BoundaryPhase::ShowingPrimary
                };
                state.suspended_since = None;
                state.awaiting = None;
                state.committed = Some(element.clone());
                return Ok(element);
            }
            Err(Missing::Failed(err)) => {
                let Some(error_fallback) = &self.error_fallback else {
                    return Err(Missing::Failed(err));
                };
                warn!(boundary = %id, %err, "Load failed, showing error fallback");
                state.phase = BoundaryPhase::ShowingPrimary;
                state.suspended_since = None;
                state.awaiting = None;
                state.committed = Some(error_fallback.clone());
                return Ok(error_fallback.clone());
            }
            Err(Missing::InFlight(suspension)) => suspension,
        };

        let caught = if lane == Lane::Deferred && state.shows_committed_primary() {
            Caught::Blocked(suspension, state.held())
        } else {
            let since = *state.suspended_since.get_or_insert(now);
            state.awaiting = Some(suspension.clone());
            let deadline = since + grace;
            if now >= deadline {
                if state.phase != BoundaryPhase::ShowingFallback {
                    debug!(boundary = %id, resource = suspension.resource(), "Showing fallback");
                }
                state.phase = BoundaryPhase::ShowingFallback;
                Caught::Fallback(suspension)
            } else {
                Caught::Held(suspension, state.held(), deadline)
            }
        };

        match caught {
            Caught::Blocked(suspension, held) => {
                cx.block_on(suspension);
                Ok(held)
            }
            Caught::Held(suspension, held, deadline) => {
                cx.wait_on(suspension);
                cx.wake_at(deadline);
                Ok(held)
            }
            Caught::Fallback(suspension) => {
                cx.wait_on(suspension);
                Ok(self.fallback.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use color_eyre::eyre::eyre;
    use movie_search_lazy_data::{CacheScope, ResourceCache, ResourceReader};

    use super::*;
    use crate::render::PassOutcome;

    /// Loads `"loaded {ms}"` after `ms` milliseconds; `0` fails.
    fn slow_reader() -> ResourceReader<u64, String> {
        ResourceReader::from_future_source("slow", |ms: u64| async move {
            if ms == 0 {
                return Err(eyre!("nothing to load"));
            }
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(format!("loaded {ms}"))
        })
    }

    fn pass<F>(
        cache: &ResourceCache,
        table: &mut BoundaryTable,
        lane: Lane,
        view: F,
    ) -> (ViewResult, PassOutcome)
    where
        F: FnOnce(&mut RenderCx<'_>) -> ViewResult,
    {
        table.begin_pass();
        let mut cx = RenderCx::new(cache, lane, Instant::now(), Duration::ZERO, table);
        let result = view(&mut cx);
        let outcome = cx.finish();
        table.end_pass();
        (result, outcome)
    }

    fn text_view(reader: &ResourceReader<u64, String>, key: u64) -> impl Fn(&mut RenderCx<'_>) -> ViewResult + '_ {
        move |cx| Ok(Element::text(cx.read(reader, key)?))
    }

    #[tokio::test(start_paused = true)]
    async fn falls_back_after_grace_then_commits() {
        let reader = slow_reader();
        let scope = CacheScope::acquire("test");
        let mut table = BoundaryTable::default();
        let boundary = SuspenseBoundary::new("body")
            .fallback("loading")
            .grace(Duration::from_millis(100));

        let (result, outcome) = pass(scope.cache(), &mut table, Lane::Urgent, |cx| {
            boundary.render(cx, text_view(&reader, 500))
        });
        assert_eq!(result.unwrap(), Element::Empty);
        assert_eq!(outcome.waiting.len(), 1);
        assert!(outcome.wake_at.is_some());
        assert_eq!(table.phase("body"), Some(BoundaryPhase::ShowingPrimary));

        tokio::time::advance(Duration::from_millis(100)).await;
        let (result, outcome) = pass(scope.cache(), &mut table, Lane::Urgent, |cx| {
            boundary.render(cx, text_view(&reader, 500))
        });
        assert_eq!(result.unwrap(), Element::text("loading"));
        assert_eq!(outcome.wake_at, None);
        assert_eq!(table.phase("body"), Some(BoundaryPhase::ShowingFallback));

        outcome.waiting[0].settled().await;
        let (result, outcome) = pass(scope.cache(), &mut table, Lane::Urgent, |cx| {
            boundary.render(cx, text_view(&reader, 500))
        });
        assert_eq!(result.unwrap(), Element::text("loaded 500"));
        assert!(outcome.waiting.is_empty());
        assert_eq!(table.phase("body"), Some(BoundaryPhase::CommittingPrimary));

        let (result, _) = pass(scope.cache(), &mut table, Lane::Urgent, |cx| {
            boundary.render(cx, text_view(&reader, 500))
        });
        assert_eq!(result.unwrap(), Element::text("loaded 500"));
        assert_eq!(table.phase("body"), Some(BoundaryPhase::ShowingPrimary));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_grace_falls_back_immediately() {
        let reader = slow_reader();
        let scope = CacheScope::acquire("test");
        let mut table = BoundaryTable::default();
        let boundary = SuspenseBoundary::new("poster").fallback("loading");

        let (result, _) = pass(scope.cache(), &mut table, Lane::Urgent, |cx| {
            boundary.render(cx, text_view(&reader, 10))
        });
        assert_eq!(result.unwrap(), Element::text("loading"));
        assert_eq!(table.phase("poster"), Some(BoundaryPhase::ShowingFallback));
    }

    #[tokio::test(start_paused = true)]
    async fn deferred_pass_blocks_instead_of_hiding_content() {
        let reader = slow_reader();
        let scope = CacheScope::acquire("test");
        let mut table = BoundaryTable::default();
        let boundary = SuspenseBoundary::new("results").fallback("loading");

        let (_, outcome) = pass(scope.cache(), &mut table, Lane::Urgent, |cx| {
            boundary.render(cx, text_view(&reader, 10))
        });
        outcome.waiting[0].settled().await;
        for _ in 0..2 {
            let (result, _) = pass(scope.cache(), &mut table, Lane::Urgent, |cx| {
                boundary.render(cx, text_view(&reader, 10))
            });
            assert_eq!(result.unwrap(), Element::text("loaded 10"));
        }
        assert_eq!(table.phase("results"), Some(BoundaryPhase::ShowingPrimary));

        let mut scratch = table.clone();
        let (result, outcome) = pass(scope.cache(), &mut scratch, Lane::Deferred, |cx| {
            boundary.render(cx, text_view(&reader, 20))
        });
        assert_eq!(result.unwrap(), Element::text("loaded 10"));
        assert_eq!(outcome.blocked.len(), 1);
        assert!(outcome.waiting.is_empty());
        assert_eq!(scratch.phase("results"), Some(BoundaryPhase::ShowingPrimary));

        // Forced passes show the fallback like an urgent one would.
        let (result, outcome) = pass(scope.cache(), &mut scratch, Lane::Forced, |cx| {
            boundary.render(cx, text_view(&reader, 20))
        });
        assert_eq!(result.unwrap(), Element::text("loading"));
        assert!(outcome.blocked.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn suspension_stays_inside_the_nearest_boundary() {
        let reader = slow_reader();
        let scope = CacheScope::acquire("test");
        let mut table = BoundaryTable::default();
        let outer = SuspenseBoundary::new("outer").fallback("outer loading");
        let inner = SuspenseBoundary::new("inner").fallback("inner loading");

        let (result, outcome) = pass(scope.cache(), &mut table, Lane::Urgent, |cx| {
            outer.render(cx, |cx| {
                Ok(Element::column([
                    Element::text("sibling"),
                    inner.render(cx, text_view(&reader, 50))?,
                ]))
            })
        });
        let element = result.unwrap();
        assert!(element.contains("sibling"));
        assert!(element.contains("inner loading"));
        assert!(!element.contains("outer loading"));
        assert_eq!(outcome.waiting.len(), 1);
        assert_eq!(table.phase("outer"), Some(BoundaryPhase::ShowingPrimary));
        assert_eq!(table.phase("outer/inner"), Some(BoundaryPhase::ShowingFallback));
    }

    #[tokio::test(start_paused = true)]
    async fn failures_propagate_unless_an_error_fallback_is_set() {
        let reader = slow_reader();
        let scope = CacheScope::acquire("test");
        let mut table = BoundaryTable::default();

        let (_, outcome) = pass(scope.cache(), &mut table, Lane::Urgent, |cx| {
            SuspenseBoundary::new("plain").render(cx, text_view(&reader, 0))
        });
        outcome.waiting[0].settled().await;

        let (result, _) = pass(scope.cache(), &mut table, Lane::Urgent, |cx| {
            SuspenseBoundary::new("plain").render(cx, text_view(&reader, 0))
        });
        assert!(matches!(result, Err(Missing::Failed(_))));

        let (result, _) = pass(scope.cache(), &mut table, Lane::Urgent, |cx| {
            SuspenseBoundary::new("guarded")
                .error_fallback("no poster")
                .render(cx, text_view(&reader, 0))
        });
        assert_eq!(result.unwrap(), Element::text("no poster"));
    }

    #[tokio::test(start_paused = true)]
    async fn unvisited_boundaries_are_dropped() {
        let reader = slow_reader();
        let scope = CacheScope::acquire("test");
        let mut table = BoundaryTable::default();

        let (result, _) = pass(scope.cache(), &mut table, Lane::Urgent, |cx| {
            SuspenseBoundary::new("details").render(cx, text_view(&reader, 10))
        });
        assert_eq!(result.unwrap(), Element::Empty);
        assert_eq!(table.len(), 1);

        let (result, _) = pass(scope.cache(), &mut table, Lane::Urgent, |_| Ok(Element::Empty));
        assert!(result.is_ok());
        assert!(table.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dependent_loads_keep_the_fallback_and_await_the_next_handle() {
        let movie = slow_reader();
        let poster = ResourceReader::from_future_source("poster", |title: String| async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Ok::<_, color_eyre::Report>(format!("{title} poster"))
        });
        let scope = CacheScope::acquire("test");
        let mut table = BoundaryTable::default();
        let boundary = SuspenseBoundary::new("details").fallback("loading");
        let view = |cx: &mut RenderCx<'_>| -> ViewResult {
            let title = cx.read(&movie, 50)?;
            Ok(Element::text(cx.read(&poster, title)?))
        };

        let (result, outcome) = pass(scope.cache(), &mut table, Lane::Urgent, |cx| {
            boundary.render(cx, view)
        });
        assert_eq!(result.unwrap(), Element::text("loading"));
        let first = outcome.waiting[0].clone();
        assert!(table.awaiting("details").unwrap().same_handle(&first));

        first.settled().await;
        let (result, outcome) = pass(scope.cache(), &mut table, Lane::Urgent, |cx| {
            boundary.render(cx, view)
        });
        assert_eq!(result.unwrap(), Element::text("loading"));
        assert_eq!(table.phase("details"), Some(BoundaryPhase::ShowingFallback));
        let second = table.awaiting("details").unwrap().clone();
        assert!(!second.same_handle(&first));
        assert_eq!(second.resource(), "poster");
        assert!(outcome.waiting[0].same_handle(&second));

        second.settled().await;
        let (result, outcome) = pass(scope.cache(), &mut table, Lane::Urgent, |cx| {
            boundary.render(cx, view)
        });
        assert_eq!(result.unwrap(), Element::text("loaded 50 poster"));
        assert!(outcome.waiting.is_empty());
        assert_eq!(table.phase("details"), Some(BoundaryPhase::CommittingPrimary));
        assert!(table.awaiting("details").is_none());
    }
}
