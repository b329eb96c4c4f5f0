//! Steady-state frame loop: fence-gated slot reuse and image presentation.

mod scheduler;

pub use scheduler::{FrameOutcome, FrameResources, FrameScheduler};
