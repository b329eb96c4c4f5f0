//! The renderer component tying the device, render objects and frame loop
//! together.

mod renderer;

pub use renderer::{Renderer, RunSummary, ShaderSet};
