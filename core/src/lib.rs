#![warn(clippy::complexity)]
#![warn(clippy::correctness)]
#![warn(clippy::perf)]
#![warn(clippy::style)]
#![warn(clippy::suspicious)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]

//! Two-lane render pipeline on top of the suspend-on-miss resource cache.

pub mod config;
pub mod deferred;
pub mod element;
pub mod render;
pub mod renderer;
pub mod scheduler;
pub mod suspense;

pub use config::RenderConfig;
pub use deferred::DualPriorityState;
pub use element::Element;
pub use render::{Lane, RenderCx, Tiers, ViewResult};
pub use renderer::{Application, Frame, Renderer};
pub use scheduler::{Scheduler, WaitSet, Wake};
pub use suspense::{BoundaryPhase, BoundaryTable, SuspenseBoundary};
