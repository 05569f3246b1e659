use std::{fmt::Debug, time::Duration};

use movie_search_lazy_data::{LoadFailure, Missing, ResourceCache, Suspension};
use tokio::{sync::mpsc, time::Instant};
use tracing::{debug, error, trace};

use crate::{
    config::RenderConfig,
    deferred::DualPriorityState,
    element::Element,
    render::{push_unique, Lane, PassOutcome, RenderCx, Tiers, ViewResult},
    scheduler::{Scheduler, WaitSet, Wake},
    suspense::BoundaryTable,
};

/// A view over one piece of dual-priority state.
pub trait Application {
    type State: Clone + Debug;
    type Message: Debug;

    fn initial_state(&self) -> Self::State;

    fn update(&self, state: &mut Self::State, message: Self::Message);

    /// Must be a pure function of `state` and the resources it reads. It runs
    /// again on every retry and on every deferred attempt, including ones that
    /// are thrown away.
    fn view(&self, cx: &mut RenderCx<'_>, state: Tiers<'_, Self::State>) -> ViewResult;
}

/// The last output that made it to the screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub element: Element,
    /// Counts commits, starting at 1 for the mount.
    pub sequence: u64,
}

/// Drives an [`Application`] against the cache of its scope.
///
/// Single-threaded: urgent messages are applied and rendered synchronously,
/// then the drain loop sleeps until a load it waits on settles or a timer
/// runs out, and renders again.
pub struct Renderer<'c, A: Application> {
    app: A,
    cache: &'c ResourceCache,
    default_grace: Duration,
    state: DualPriorityState<A::State>,
    scheduler: Scheduler<A::Message>,
    boundaries: BoundaryTable,
    frame: Option<Frame>,
    commits: u64,
    /// Suspensions the committed output is waiting on.
    waiting: Vec<Suspension>,
    /// Earliest pending grace deadline of the committed output.
    wake_at: Option<Instant>,
    error: Option<LoadFailure>,
}

impl<'c, A: Application> Renderer<'c, A> {
    /// Mounts `app` and runs its first urgent render.
    pub fn mount(app: A, cache: &'c ResourceCache, config: &RenderConfig) -> Self {
        let state = DualPriorityState::new(app.initial_state(), config.deferred_timeout());
        let mut renderer = Self {
            app,
            cache,
            default_grace: config.default_grace(),
            state,
            scheduler: Scheduler::default(),
            boundaries: BoundaryTable::default(),
            frame: None,
            commits: 0,
            waiting: Vec::new(),
            wake_at: None,
            error: None,
        };
        renderer.render(Lane::Urgent);
        renderer
    }

    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    pub fn state(&self) -> &DualPriorityState<A::State> {
        &self.state
    }

    pub fn boundaries(&self) -> &BoundaryTable {
        &self.boundaries
    }

    /// The load failure no boundary caught in the last render, if any.
    pub fn error(&self) -> Option<&LoadFailure> {
        self.error.as_ref()
    }

    pub fn app(&self) -> &A {
        &self.app
    }

    /// Queues `message` without applying it.
    pub fn enqueue(&mut self, message: A::Message) {
        self.scheduler.push_urgent(message);
    }

    /// Applies `message` and renders right away.
    pub fn dispatch(&mut self, message: A::Message) {
        self.enqueue(message);
        self.drain();
    }

    /// Everything the drain loop would currently wait for.
    pub fn wait_set(&self) -> WaitSet {
        let mut set = WaitSet::default();
        set.add_handles(&self.waiting);
        set.add_handles(self.state.parked_on());
        set.add_deadline(self.wake_at);
        set.add_deadline(self.state.catch_up_deadline());
        set
    }

    /// Whether a deferred catch-up or a suspended boundary is outstanding.
    pub fn is_settled(&self) -> bool {
        self.state.is_caught_up() && self.waiting.is_empty() && self.wake_at.is_none()
    }

    /// Waits for the next event and reacts to it.
    pub async fn step(&mut self) -> Wake {
        let wake = self.wait_set().wait().await;
        if wake != Wake::Idle {
            self.drain();
        }
        wake
    }

    /// Steps until there's nothing left to wait for.
    ///
    /// Never returns while a boundary waits on a load that never settles.
    pub async fn run_until_settled(&mut self) {
        while self.step().await != Wake::Idle {}
    }

    /// Accepts messages from `rx` until it closes, rendering in between.
    /// `on_commit` sees every new frame.
    pub async fn run(
        &mut self,
        mut rx: mpsc::UnboundedReceiver<A::Message>,
        mut on_commit: impl FnMut(&Frame, &DualPriorityState<A::State>),
    ) {
        let mut seen = 0;
        if let Some(frame) = &self.frame {
            on_commit(frame, &self.state);
            seen = frame.sequence;
        }

        loop {
            let wait_set = self.wait_set();
            let idle = wait_set.is_idle();
            let wait = wait_set.wait();
            tokio::select! {
                biased;
                message = rx.recv() => match message {
                    Some(message) => {
                        self.enqueue(message);
                        // Batch whatever else already arrived.
                        while let Ok(message) = rx.try_recv() {
                            self.enqueue(message);
                        }
                        self.drain();
                    }
                    None => break,
                },
                wake = wait, if !idle => {
                    trace!(?wake, "Drain loop woke up");
                    self.drain();
                }
            }

            if let Some(frame) = &self.frame {
                if frame.sequence != seen {
                    seen = frame.sequence;
                    on_commit(frame, &self.state);
                }
            }
        }
    }

    /// Applies queued urgent messages, then whatever deferred work is due.
    pub fn drain(&mut self) {
        let now = Instant::now();

        let mut applied = false;
        while let Some(message) = self.scheduler.pop_urgent() {
            debug!(?message, "Applying urgent update");
            let app = &self.app;
            self.state.update_urgent(now, |state| app.update(state, message));
            applied = true;
        }
        if applied {
            self.render(Lane::Urgent);
        }

        if let Some(lane) = self.state.catch_up_due(now) {
            self.render(lane);
        }

        let retry = self.waiting.iter().any(Suspension::is_settled)
            || self.wake_at.is_some_and(|at| at <= now);
        if retry {
            self.render(Lane::Urgent);
        }
    }

    fn pass(&self, lane: Lane, table: &mut BoundaryTable) -> (ViewResult, PassOutcome) {
        let urgent = self.state.urgent();
        let tiers = match lane {
            Lane::Urgent => Tiers {
                urgent,
                deferred: self.state.deferred(),
            },
            // The candidate for the deferred tier is the latest urgent value.
            Lane::Deferred | Lane::Forced => Tiers {
                urgent,
                deferred: urgent,
            },
        };

        table.begin_pass();
        let mut cx = RenderCx::new(self.cache, lane, Instant::now(), self.default_grace, table);
        let result = self.app.view(&mut cx, tiers);
        (result, cx.finish())
    }

    fn render(&mut self, lane: Lane) {
        let mut table = self.boundaries.clone();
        let (result, mut outcome) = self.pass(lane, &mut table);

        if lane == Lane::Deferred {
            let mut blocked = std::mem::take(&mut outcome.blocked);
            if let Err(Missing::InFlight(suspension)) = &result {
                push_unique(&mut blocked, suspension.clone());
            }
            if !blocked.is_empty() {
                trace!(blocked = blocked.len(), "Discarding deferred pass");
                self.state.park(blocked);
                return;
            }
        }
        if lane != Lane::Urgent {
            debug!(?lane, "Deferred state caught up");
            self.state.commit_deferred();
        }

        match result {
            Ok(element) => {
                table.end_pass();
                self.boundaries = table;
                self.waiting = outcome.waiting;
                self.wake_at = outcome.wake_at;
                self.error = None;
                self.commit(element);
            }
            Err(Missing::InFlight(suspension)) => {
                // Nothing caught it: keep the previous frame until it settles.
                debug!(
                    resource = suspension.resource(),
                    "Suspension reached the root, holding previous frame"
                );
                self.waiting = outcome.waiting;
                push_unique(&mut self.waiting, suspension);
                self.wake_at = outcome.wake_at;
            }
            Err(Missing::Failed(err)) => {
                error!(%err, "Render failed");
                self.waiting = outcome.waiting;
                self.wake_at = outcome.wake_at;
                self.error = Some(err);
            }
        }
    }

    fn commit(&mut self, element: Element) {
        if self.frame.as_ref().is_some_and(|frame| frame.element == element) {
            return;
        }
        self.commits += 1;
        trace!(sequence = self.commits, "Committed frame");
        self.frame = Some(Frame {
            element,
            sequence: self.commits,
        });
    }
}
