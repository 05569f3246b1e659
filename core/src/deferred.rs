use std::time::Duration;

use movie_search_lazy_data::Suspension;
use tokio::time::Instant;
use tracing::trace;

use crate::render::{push_unique, Lane};

/// A piece of state split into an urgent and a deferred tier.
///
/// `urgent` changes immediately. `deferred` only catches up once a render
/// pass using the urgent value completes without suspending, or once
/// `timeout` has passed since the oldest update it hasn't caught up with.
#[derive(Debug, Clone)]
pub struct DualPriorityState<S> {
    urgent: S,
    deferred: S,
    timeout: Duration,
    catch_up: Option<CatchUp>,
}

#[derive(Debug, Clone)]
struct CatchUp {
    deadline: Instant,
    /// Handles the last attempt suspended on. Empty until an attempt was made.
    parked_on: Vec<Suspension>,
}

impl<S: Clone> DualPriorityState<S> {
    pub fn new(initial: S, timeout: Duration) -> Self {
        Self {
            urgent: initial.clone(),
            deferred: initial,
            timeout,
            catch_up: None,
        }
    }

    pub fn urgent(&self) -> &S {
        &self.urgent
    }

    pub fn deferred(&self) -> &S {
        &self.deferred
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_urgent(&mut self, value: S, now: Instant) {
        self.urgent = value;
        self.schedule(now);
    }

    pub fn update_urgent(&mut self, now: Instant, f: impl FnOnce(&mut S)) {
        f(&mut self.urgent);
        self.schedule(now);
    }

    /// Coalesces with an outstanding catch-up: the deadline of the oldest
    /// pending update is kept, and the next attempt simply uses the latest
    /// urgent value.
    fn schedule(&mut self, now: Instant) {
        let timeout = self.timeout;
        let catch_up = self.catch_up.get_or_insert_with(|| CatchUp {
            deadline: now + timeout,
            parked_on: Vec::new(),
        });
        // A new value might not suspend at all, so try again right away.
        catch_up.parked_on.clear();
    }

    pub fn is_caught_up(&self) -> bool {
        self.catch_up.is_none()
    }

    pub fn catch_up_deadline(&self) -> Option<Instant> {
        self.catch_up.as_ref().map(|c| c.deadline)
    }

    pub fn parked_on(&self) -> &[Suspension] {
        self.catch_up
            .as_ref()
            .map_or(&[][..], |c| c.parked_on.as_slice())
    }

    /// Which lane a catch-up attempt should run in right now, if one is due.
    ///
    /// A parked attempt isn't retried until one of its handles settles or the
    /// deadline passes.
    pub fn catch_up_due(&self, now: Instant) -> Option<Lane> {
        let catch_up = self.catch_up.as_ref()?;
        if now >= catch_up.deadline {
            return Some(Lane::Forced);
        }
        let parked = !catch_up.parked_on.is_empty();
        if parked && !catch_up.parked_on.iter().any(Suspension::is_settled) {
            return None;
        }
        Some(Lane::Deferred)
    }

    /// Records that an attempt suspended; `deferred` keeps its old value.
    pub fn park(&mut self, handles: Vec<Suspension>) {
        let Some(catch_up) = self.catch_up.as_mut() else {
            return;
        };
        trace!(handles = handles.len(), "Deferred catch-up suspended");
        catch_up.parked_on.clear();
        for handle in handles {
            push_unique(&mut catch_up.parked_on, handle);
        }
    }

    pub fn commit_deferred(&mut self) {
        self.deferred = self.urgent.clone();
        self.catch_up = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> (DualPriorityState<String>, Instant) {
        (
            DualPriorityState::new(String::new(), Duration::from_secs(5)),
            Instant::now(),
        )
    }

    #[tokio::test]
    async fn urgent_is_visible_immediately() {
        let (mut state, now) = state();
        state.set_urgent("a".to_string(), now);
        assert_eq!(state.urgent(), "a");
        assert_eq!(state.deferred(), "");
        assert!(!state.is_caught_up());
        assert_eq!(state.catch_up_due(now), Some(Lane::Deferred));

        state.commit_deferred();
        assert_eq!(state.deferred(), "a");
        assert!(state.is_caught_up());
        assert_eq!(state.catch_up_due(now), None);
    }

    #[tokio::test]
    async fn updates_coalesce_and_keep_the_oldest_deadline() {
        let (mut state, now) = state();
        state.set_urgent("ab".to_string(), now);
        state.update_urgent(now + Duration::from_secs(1), |q| q.push('c'));

        assert_eq!(state.catch_up_deadline(), Some(now + Duration::from_secs(5)));
        state.commit_deferred();
        assert_eq!(state.deferred(), "abc");
    }

    #[tokio::test]
    async fn parked_attempt_waits_for_a_settled_handle_or_the_deadline() {
        let (mut state, now) = state();
        state.set_urgent("ab".to_string(), now);

        let scope = movie_search_lazy_data::CacheScope::acquire("test");
        let reader = movie_search_lazy_data::ResourceReader::from_future_source(
            "never",
            |_: u8| futures::future::pending::<Result<u8, color_eyre::Report>>(),
        );
        let handle = reader
            .read(scope.cache(), 1)
            .unwrap_err()
            .suspension()
            .cloned()
            .expect("read should suspend");

        state.park(vec![handle.clone(), handle]);
        assert_eq!(state.parked_on().len(), 1);
        assert_eq!(state.catch_up_due(now), None);
        assert_eq!(
            state.catch_up_due(now + Duration::from_secs(5)),
            Some(Lane::Forced)
        );

        // Another keystroke retries right away.
        state.set_urgent("abc".to_string(), now);
        assert!(state.parked_on().is_empty());
        assert_eq!(state.catch_up_due(now), Some(Lane::Deferred));
    }
}
