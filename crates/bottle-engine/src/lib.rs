//! Bottle engine crate.
//!
//! Owns the Vulkan bring-up sequence, the triangle pipeline and the per-frame
//! submission loop. Higher layers (the `bottle-triangle` binary) only open a
//! window, build a [`core::Renderer`] and run it.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::undocumented_unsafe_blocks)]

pub mod core;
pub mod device;
pub mod event;
pub mod frame;
pub mod logging;
pub mod render;
pub mod time;
pub mod window;

pub use ash;
