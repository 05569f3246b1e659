use crate::{
    error::{LoadFailure, Missing, PotentialResult},
    suspension::Suspension,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotStatus {
    Pending,
    Resolved,
    Rejected,
}

/// Cached state of one (loader, key) pair.
///
/// Only ever moves forward: `Pending -> Resolved` or `Pending -> Rejected`.
/// Fresh data means a fresh slot, never a rewound one.
#[derive(Debug, Clone)]
pub enum ResourceSlot<V> {
    Pending(Suspension),
    Resolved(V),
    Rejected(LoadFailure),
}

impl<V: Clone> ResourceSlot<V> {
    pub fn status(&self) -> SlotStatus {
        match self {
            ResourceSlot::Pending(_) => SlotStatus::Pending,
            ResourceSlot::Resolved(_) => SlotStatus::Resolved,
            ResourceSlot::Rejected(_) => SlotStatus::Rejected,
        }
    }

    pub fn observe(&self) -> PotentialResult<V> {
        match self {
            ResourceSlot::Pending(suspension) => Err(Missing::InFlight(suspension.clone())),
            ResourceSlot::Resolved(value) => Ok(value.clone()),
            ResourceSlot::Rejected(err) => Err(Missing::Failed(err.clone())),
        }
    }

    pub(crate) fn is_pending_on(&self, handle: &Suspension) -> bool {
        matches!(self, ResourceSlot::Pending(suspension) if suspension.same_handle(handle))
    }

    /// Moves a pending slot to its terminal state.
    ///
    /// Returns `false` and leaves the slot untouched if it isn't pending on
    /// `handle` anymore.
    pub(crate) fn settle(&mut self, handle: &Suspension, outcome: Result<V, LoadFailure>) -> bool {
        if !self.is_pending_on(handle) {
            return false;
        }
        *self = match outcome {
            Ok(value) => ResourceSlot::Resolved(value),
            Err(err) => ResourceSlot::Rejected(err),
        };
        true
    }
}
