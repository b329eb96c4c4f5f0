//! GPU objects built on top of a [`crate::device::GraphicsContext`]: shader
//! modules, the render pass, framebuffers, the graphics pipeline, command
//! buffers and per-frame synchronization.

mod command;
mod framebuffer;
mod pipeline;
mod render_pass;
mod shader;
mod sync;

pub use command::{CommandBufferPool, DrawCommand};
pub use framebuffer::{FramebufferError, FramebufferSet};
pub use pipeline::{
    ColorBlendState, GraphicsPipeline, InputAssemblyState, LayoutDesc, MultisampleState,
    PipelineError, PipelineLayoutSource, PipelineOverrides, PipelineState, RasterizationState,
    VertexInputState, ViewportState,
};
pub use render_pass::RenderPass;
pub use shader::{ENTRY_POINT, Shader, ShaderError, ShaderStage};
pub use sync::{FrameSyncSet, SlotSync};

#[cfg(test)]
pub(crate) use shader::tests as shader_tests;
