//! Platform window.
//!
//! Owns the `winit` event loop and the single window the renderer presents to.
//! The loop is pumped from the render loop instead of owning the thread.

mod platform;

pub use platform::{EventPump, PlatformWindow, WindowConfig};
