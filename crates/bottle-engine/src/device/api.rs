use ash::prelude::VkResult;
use ash::vk;

/// Raw device operations used by the render components.
///
/// Every wrapper in [`crate::render`] and the swapchain holds an `Arc<D>` where
/// `D: DeviceApi` and issues its create/destroy/record calls through it. The
/// production implementation is [`super::VulkanDevice`].
///
/// The methods mirror the Vulkan entry points one to one and keep their safety
/// contracts: create infos and every handle they reference must be valid and
/// derived from this device, destroyed handles must no longer be used by
/// pending GPU work, and command buffer calls must respect the recording state
/// machine.
pub trait DeviceApi {
    // ── shaders and pipelines ──

    /// # Safety
    /// `info.p_code` must point at `info.code_size` bytes of SPIR-V.
    unsafe fn create_raw_shader_module(
        &self,
        info: &vk::ShaderModuleCreateInfo<'_>,
    ) -> VkResult<vk::ShaderModule>;

    /// # Safety
    /// `module` was created by this device and is destroyed once.
    unsafe fn destroy_raw_shader_module(&self, module: vk::ShaderModule);

    /// # Safety
    /// Referenced set layouts must be valid.
    unsafe fn create_raw_pipeline_layout(
        &self,
        info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> VkResult<vk::PipelineLayout>;

    /// # Safety
    /// No live pipeline may still be bound through `layout` on pending work.
    unsafe fn destroy_raw_pipeline_layout(&self, layout: vk::PipelineLayout);

    /// # Safety
    /// All sub-state pointers in `info` must be valid for the duration of the call.
    unsafe fn create_raw_graphics_pipeline(
        &self,
        info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> VkResult<vk::Pipeline>;

    /// # Safety
    /// No pending work may reference `pipeline`.
    unsafe fn destroy_raw_pipeline(&self, pipeline: vk::Pipeline);

    // ── render pass and framebuffers ──

    /// # Safety
    /// Attachment, subpass and dependency arrays must be valid.
    unsafe fn create_raw_render_pass(
        &self,
        info: &vk::RenderPassCreateInfo<'_>,
    ) -> VkResult<vk::RenderPass>;

    /// # Safety
    /// Every framebuffer and pipeline built against `render_pass` is gone.
    unsafe fn destroy_raw_render_pass(&self, render_pass: vk::RenderPass);

    /// # Safety
    /// The render pass and attachments in `info` must be live.
    unsafe fn create_raw_framebuffer(
        &self,
        info: &vk::FramebufferCreateInfo<'_>,
    ) -> VkResult<vk::Framebuffer>;

    /// # Safety
    /// No pending work may reference `framebuffer`.
    unsafe fn destroy_raw_framebuffer(&self, framebuffer: vk::Framebuffer);

    // ── swapchain ──

    /// # Safety
    /// `info.image` must be a live image of this device.
    unsafe fn create_raw_image_view(
        &self,
        info: &vk::ImageViewCreateInfo<'_>,
    ) -> VkResult<vk::ImageView>;

    /// # Safety
    /// Framebuffers using `view` are destroyed first.
    unsafe fn destroy_raw_image_view(&self, view: vk::ImageView);

    /// # Safety
    /// `info.surface` must be the surface this device was created for.
    unsafe fn create_raw_swapchain(
        &self,
        info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> VkResult<vk::SwapchainKHR>;

    /// # Safety
    /// `swapchain` must be live.
    unsafe fn get_raw_swapchain_images(
        &self,
        swapchain: vk::SwapchainKHR,
    ) -> VkResult<Vec<vk::Image>>;

    /// # Safety
    /// Views of the swapchain images are destroyed first.
    unsafe fn destroy_raw_swapchain(&self, swapchain: vk::SwapchainKHR);

    /// Returns `(image_index, suboptimal)`.
    ///
    /// # Safety
    /// `semaphore` must be unsignaled with no pending signal operation.
    unsafe fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout_ns: u64,
        semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)>;

    /// Returns `true` when the swapchain is suboptimal.
    ///
    /// # Safety
    /// Wait semaphores must have a pending signal and the image must be in
    /// `PRESENT_SRC_KHR` layout.
    unsafe fn queue_present(
        &self,
        queue: vk::Queue,
        info: &vk::PresentInfoKHR<'_>,
    ) -> VkResult<bool>;

    // ── synchronization ──

    /// # Safety
    /// `info` must be a valid create info.
    unsafe fn create_raw_fence(&self, info: &vk::FenceCreateInfo<'_>) -> VkResult<vk::Fence>;

    /// # Safety
    /// `fence` must not be pending on a queue.
    unsafe fn destroy_raw_fence(&self, fence: vk::Fence);

    /// Blocks until `fence` is signaled or `timeout_ns` elapses (`TIMEOUT`).
    ///
    /// # Safety
    /// `fence` must be live.
    unsafe fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> VkResult<()>;

    /// # Safety
    /// `fence` must not be pending on a queue.
    unsafe fn reset_fence(&self, fence: vk::Fence) -> VkResult<()>;

    /// # Safety
    /// `info` must be a valid create info.
    unsafe fn create_raw_semaphore(
        &self,
        info: &vk::SemaphoreCreateInfo<'_>,
    ) -> VkResult<vk::Semaphore>;

    /// # Safety
    /// No pending operation may wait on or signal `semaphore`.
    unsafe fn destroy_raw_semaphore(&self, semaphore: vk::Semaphore);

    // ── commands ──

    /// # Safety
    /// `info.queue_family_index` must be a family this device created a queue on.
    unsafe fn create_raw_command_pool(
        &self,
        info: &vk::CommandPoolCreateInfo<'_>,
    ) -> VkResult<vk::CommandPool>;

    /// Frees every command buffer allocated from `pool`.
    ///
    /// # Safety
    /// None of the pool's command buffers may be pending.
    unsafe fn destroy_raw_command_pool(&self, pool: vk::CommandPool);

    /// # Safety
    /// `info.command_pool` must be live.
    unsafe fn allocate_command_buffers(
        &self,
        info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::CommandBuffer>>;

    /// # Safety
    /// `cmd` must not be pending and its pool must allow individual resets.
    unsafe fn reset_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()>;

    /// # Safety
    /// `cmd` must be in the initial state.
    unsafe fn begin_command_buffer(
        &self,
        cmd: vk::CommandBuffer,
        info: &vk::CommandBufferBeginInfo<'_>,
    ) -> VkResult<()>;

    /// # Safety
    /// `cmd` must be recording with no open render pass.
    unsafe fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()>;

    /// # Safety
    /// `cmd` must be recording; the framebuffer must match the render pass.
    unsafe fn cmd_begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        info: &vk::RenderPassBeginInfo<'_>,
    );

    /// # Safety
    /// `cmd` must be recording and `pipeline` live.
    unsafe fn cmd_bind_graphics_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline);

    /// # Safety
    /// `cmd` must be recording.
    unsafe fn cmd_set_viewport(&self, cmd: vk::CommandBuffer, viewports: &[vk::Viewport]);

    /// # Safety
    /// `cmd` must be recording.
    unsafe fn cmd_set_scissor(&self, cmd: vk::CommandBuffer, scissors: &[vk::Rect2D]);

    /// # Safety
    /// `cmd` must be inside a render pass with a pipeline bound.
    unsafe fn cmd_draw(
        &self,
        cmd: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    );

    /// # Safety
    /// `cmd` must be inside a render pass.
    unsafe fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer);

    /// # Safety
    /// Command buffers must be executable and `fence` unsignaled.
    unsafe fn queue_submit(
        &self,
        queue: vk::Queue,
        submits: &[vk::SubmitInfo<'_>],
        fence: vk::Fence,
    ) -> VkResult<()>;

    /// Blocks until all queues of the device are idle.
    fn wait_idle(&self) -> VkResult<()>;
}
