use std::collections::VecDeque;

use futures::future::{pending, select_all};
use movie_search_lazy_data::Suspension;
use tokio::time::{sleep_until, Instant};

use crate::render::push_unique;

/// Why the drain loop woke up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// Nothing to wait for.
    Idle,
    /// A load the renderer was waiting on settled.
    Settled,
    /// A grace period or a deferred timeout ran out.
    Timer,
}

/// The two lanes of pending work.
///
/// Urgent messages are applied in arrival order, all before any deferred
/// work. Deferred work is whatever the renderer still waits on: suspended
/// boundaries, parked catch-ups and their deadlines.
#[derive(Debug)]
pub struct Scheduler<M> {
    urgent: VecDeque<M>,
}

impl<M> Default for Scheduler<M> {
    fn default() -> Self {
        Self {
            urgent: VecDeque::new(),
        }
    }
}

impl<M> Scheduler<M> {
    pub fn push_urgent(&mut self, message: M) {
        self.urgent.push_back(message);
    }

    pub fn pop_urgent(&mut self) -> Option<M> {
        self.urgent.pop_front()
    }

    pub fn has_urgent(&self) -> bool {
        !self.urgent.is_empty()
    }
}

/// Owned snapshot of what the drain loop is waiting for.
///
/// Detached from the renderer so it can be awaited while new messages are
/// still accepted.
#[derive(Debug, Default, Clone)]
pub struct WaitSet {
    handles: Vec<Suspension>,
    deadline: Option<Instant>,
}

impl WaitSet {
    pub fn add_handles<'a>(&mut self, handles: impl IntoIterator<Item = &'a Suspension>) {
        for handle in handles {
            push_unique(&mut self.handles, handle.clone());
        }
    }

    pub fn add_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = match (self.deadline, deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
    }

    pub fn handles(&self) -> &[Suspension] {
        &self.handles
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_idle(&self) -> bool {
        self.handles.is_empty() && self.deadline.is_none()
    }

    /// Resolves as soon as any handle settles or the deadline passes.
    pub async fn wait(self) -> Wake {
        if self.is_idle() {
            return Wake::Idle;
        }
        let WaitSet { handles, deadline } = self;

        let settled = async {
            if handles.is_empty() {
                pending::<()>().await;
            }
            select_all(handles.iter().map(|h| Box::pin(h.settled()))).await;
        };
        let timer = async {
            match deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = settled => Wake::Settled,
            _ = timer => Wake::Timer,
        }
    }
}
