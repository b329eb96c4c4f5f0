//! Frame pacing statistics for the render loop.
//!
//! One [`FrameClock`] per loop produces clamped frame deltas; an
//! [`FpsCounter`] turns those deltas into a periodic frames-per-second figure.

mod fps;
mod frame_clock;

pub use fps::FpsCounter;
pub use frame_clock::{FrameClock, FrameTime};
