#![warn(clippy::complexity)]
#![warn(clippy::correctness)]
#![warn(clippy::perf)]
#![warn(clippy::style)]
#![warn(clippy::suspicious)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]

//! Suspend-on-miss resource cache.
//!
//! A [`ResourceReader`] binds an async loader to a name. Reading it against a
//! [`ResourceCache`] either hands out the memoized value, the memoized error,
//! or [`Missing::InFlight`] carrying the [`Suspension`] of the one outstanding
//! load for that key.

pub mod cache;
pub mod error;
pub mod reader;
pub mod scope;
pub mod slot;
pub mod suspension;

use std::{future::Future, pin::Pin};

pub type BoxFut<'a, O> = Pin<Box<dyn Future<Output = O> + Send + 'a>>;

pub use cache::{CacheStats, ResourceCache};
pub use error::{LoadFailure, Missing, PotentialResult, ScopeTornDown};
pub use reader::{LoaderId, ResourceReader};
pub use scope::CacheScope;
pub use slot::{ResourceSlot, SlotStatus};
pub use suspension::Suspension;
