use std::sync::Arc;

use color_eyre::Report;

use crate::suspension::Suspension;

/// Result of reading a resource that may not be available yet.
pub type PotentialResult<T> = Result<T, Missing>;

/// Why a read could not hand out a value.
///
/// `InFlight` is a control signal, not an error: the caller should stop
/// producing its output and retry once the attached [`Suspension`] settles.
/// Only `Failed` is a real failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Missing {
    #[error("{0:?} has not settled yet")]
    InFlight(Suspension),
    #[error(transparent)]
    Failed(#[from] LoadFailure),
}

impl Missing {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Missing::InFlight(_))
    }

    pub fn suspension(&self) -> Option<&Suspension> {
        match self {
            Missing::InFlight(suspension) => Some(suspension),
            Missing::Failed(_) => None,
        }
    }
}

/// A loader rejected. Stored on the slot and handed out on every read until
/// the key is invalidated.
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to load {resource}: {inner}")]
pub struct LoadFailure {
    resource: Arc<str>,
    inner: Arc<Report>,
}

impl LoadFailure {
    pub fn new(resource: impl Into<Arc<str>>, inner: impl Into<Report>) -> Self {
        Self {
            resource: resource.into(),
            inner: Arc::new(inner.into()),
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn report(&self) -> &Report {
        &self.inner
    }
}

/// A settlement arrived for a cache whose scope has already been released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cache scope was released before the load settled")]
pub struct ScopeTornDown;
