use std::sync::Arc;

use ash::vk;

use crate::device::{DeviceApi, GpuResult, VkResultExt};

/// Everything one triangle recording needs, borrowed from the renderer.
#[derive(Debug, Copy, Clone)]
pub struct DrawCommand {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub pipeline: vk::Pipeline,
    pub extent: vk::Extent2D,
    pub clear_color: [f32; 4],
}

/// Command pool on the graphics family with one primary buffer per frame slot.
pub struct CommandBufferPool<D: DeviceApi> {
    device: Arc<D>,
    pool: vk::CommandPool,
    buffers: Vec<vk::CommandBuffer>,
}

impl<D: DeviceApi> std::fmt::Debug for CommandBufferPool<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBufferPool")
            .field("pool", &self.pool)
            .field("buffers", &self.buffers)
            .finish_non_exhaustive()
    }
}

impl<D: DeviceApi> CommandBufferPool<D> {
    pub fn new(device: &Arc<D>, graphics_family: u32, slots: usize) -> GpuResult<Self> {
        let info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(graphics_family);
        // SAFETY: plain create info, no borrowed arrays.
        let pool = unsafe { device.create_raw_command_pool(&info) }.vk_op("vkCreateCommandPool")?;

        let mut this = Self {
            device: Arc::clone(device),
            pool,
            buffers: Vec::new(),
        };

        let alloc = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(slots as u32);
        // SAFETY: the pool was just created on this device.
        this.buffers = unsafe { device.allocate_command_buffers(&alloc) }
            .vk_op("vkAllocateCommandBuffers")?;

        Ok(this)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn buffer(&self, slot: usize) -> Option<vk::CommandBuffer> {
        self.buffers.get(slot).copied()
    }

    /// Re-records the buffer of `slot` with a single clear-and-draw pass.
    ///
    /// The caller must have waited the slot's fence first.
    pub fn record_triangle(&self, slot: usize, draw: &DrawCommand) -> GpuResult<vk::CommandBuffer> {
        let cmd = self.buffers[slot];
        let device = &self.device;

        let clear = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: draw.clear_color,
            },
        }];
        let area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: draw.extent,
        };
        let pass_info = vk::RenderPassBeginInfo::default()
            .render_pass(draw.render_pass)
            .framebuffer(draw.framebuffer)
            .render_area(area)
            .clear_values(&clear);
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: draw.extent.width as f32,
            height: draw.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };

        // SAFETY: the slot fence was waited, so `cmd` is not in use by the GPU;
        // every handle in `draw` outlives the submission.
        unsafe {
            device
                .reset_command_buffer(cmd)
                .vk_op("vkResetCommandBuffer")?;
            device
                .begin_command_buffer(cmd, &vk::CommandBufferBeginInfo::default())
                .vk_op("vkBeginCommandBuffer")?;
            device.cmd_begin_render_pass(cmd, &pass_info);
            device.cmd_bind_graphics_pipeline(cmd, draw.pipeline);
            device.cmd_set_viewport(cmd, &[viewport]);
            device.cmd_set_scissor(cmd, &[area]);
            device.cmd_draw(cmd, 3, 1, 0, 0);
            device.cmd_end_render_pass(cmd);
            device
                .end_command_buffer(cmd)
                .vk_op("vkEndCommandBuffer")?;
        }
        Ok(cmd)
    }
}

impl<D: DeviceApi> Drop for CommandBufferPool<D> {
    fn drop(&mut self) {
        log::debug!("destroying command pool {:?}", self.pool);
        // SAFETY: buffers are freed with the pool; no submission is pending.
        unsafe { self.device.destroy_raw_command_pool(self.pool) };
    }
}
