use std::ffi::c_char;
use std::sync::Arc;

use ash::prelude::VkResult;
use ash::vk;

use super::api::DeviceApi;
use super::error::{GpuResult, VkResultExt};
use super::instance::Instance;
use super::physical::{DeviceCandidate, QueueFamilies};
use super::surface::{Surface, SurfaceSupport};

/// The logical device, backed by `ash`.
///
/// Owns the surface and shares the instance, so dropping the last `Arc` to the
/// device tears down device, surface, debug messenger and instance in that order.
pub struct VulkanDevice {
    handle: ash::Device,
    swapchain_loader: ash::khr::swapchain::Device,
    physical_device: vk::PhysicalDevice,
    surface: Surface,
    instance: Arc<Instance>,
}

impl std::fmt::Debug for VulkanDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanDevice")
            .field("handle", &self.handle.handle())
            .field("physical_device", &self.physical_device)
            .finish_non_exhaustive()
    }
}

impl VulkanDevice {
    /// Creates the logical device with one queue per distinct family.
    pub fn new(
        instance: Arc<Instance>,
        surface: Surface,
        candidate: &DeviceCandidate,
        families: QueueFamilies,
    ) -> GpuResult<Self> {
        let priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo<'_>> = families
            .unique()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
            })
            .collect();

        let mut extensions: Vec<*const c_char> = vec![ash::khr::swapchain::NAME.as_ptr()];
        if candidate.portability_subset {
            extensions.push(ash::khr::portability_subset::NAME.as_ptr());
        }

        let features = vk::PhysicalDeviceFeatures::default()
            .geometry_shader(candidate.geometry_shader);

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        // SAFETY: `candidate.handle` was enumerated from `instance`; every array
        // referenced by `create_info` outlives the call.
        let handle = unsafe {
            instance
                .handle()
                .create_device(candidate.handle, &create_info, None)
        }
        .vk_op("vkCreateDevice")?;

        let swapchain_loader = ash::khr::swapchain::Device::new(instance.handle(), &handle);

        log::info!(
            "logical device created on {} (graphics family {}, present family {})",
            candidate.name,
            families.graphics,
            families.present
        );

        Ok(Self {
            handle,
            swapchain_loader,
            physical_device: candidate.handle,
            surface,
            instance,
        })
    }

    /// Queue 0 of `family`.
    pub fn queue(&self, family: u32) -> vk::Queue {
        // SAFETY: the device was created with one queue for every family it hands out.
        unsafe { self.handle.get_device_queue(family, 0) }
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }

    /// Re-queries capabilities, formats and present modes of the owned surface.
    pub fn surface_support(&self) -> GpuResult<SurfaceSupport> {
        // SAFETY: surface and physical device share the owning instance.
        unsafe { self.surface.support(self.physical_device) }
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        log::debug!("destroying device {:?}", self.handle.handle());
        // SAFETY: every dependent wrapper holds an `Arc` to this device, so
        // nothing created from it is still alive.
        unsafe { self.handle.destroy_device(None) };
    }
}

impl DeviceApi for VulkanDevice {
    unsafe fn create_raw_shader_module(
        &self,
        info: &vk::ShaderModuleCreateInfo<'_>,
    ) -> VkResult<vk::ShaderModule> {
        // SAFETY: forwarded caller contract.
        unsafe { self.handle.create_shader_module(info, None) }
    }

    unsafe fn destroy_raw_shader_module(&self, module: vk::ShaderModule) {
        // SAFETY: forwarded caller contract.
        unsafe { self.handle.destroy_shader_module(module, None) }
    }

    unsafe fn create_raw_pipeline_layout(
        &self,
        info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> VkResult<vk::PipelineLayout> {
        // SAFETY: forwarded caller contract.
        unsafe { self.handle.create_pipeline_layout(info, None) }
    }

    unsafe fn destroy_raw_pipeline_layout(&self, layout: vk::PipelineLayout) {
        // SAFETY: forwarded caller contract.
        unsafe { self.handle.destroy_pipeline_layout(layout, None) }
    }

    unsafe fn create_raw_graphics_pipeline(
        &self,
        info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> VkResult<vk::Pipeline> {
        // SAFETY: forwarded caller contract.
        let created = unsafe {
            self.handle.create_graphics_pipelines(
                vk::PipelineCache::null(),
                std::slice::from_ref(info),
                None,
            )
        };
        match created {
            Ok(pipelines) => Ok(pipelines[0]),
            Err((partial, result)) => {
                for pipeline in partial.into_iter().filter(|p| *p != vk::Pipeline::null()) {
                    // SAFETY: just created by this device and never handed out.
                    unsafe { self.handle.destroy_pipeline(pipeline, None) };
                }
                Err(result)
            }
        }
    }

    unsafe fn destroy_raw_pipeline(&self, pipeline: vk::Pipeline) {
        // SAFETY: forwarded caller contract.
        unsafe { self.handle.destroy_pipeline(pipeline, None) }
    }

    unsafe fn create_raw_render_pass(
        &self,
        info: &vk::RenderPassCreateInfo<'_>,
    ) -> VkResult<vk::RenderPass> {
        // SAFETY: forwarded caller contract.
        unsafe { self.handle.create_render_pass(info, None) }
    }

    unsafe fn destroy_raw_render_pass(&self, render_pass: vk::RenderPass) {
        // SAFETY: forwarded caller contract.
        unsafe { self.handle.destroy_render_pass(render_pass, None) }
    }

    unsafe fn create_raw_framebuffer(
        &self,
        info: &vk::FramebufferCreateInfo<'_>,
    ) -> VkResult<vk::Framebuffer> {
        // SAFETY: forwarded caller contract.
        unsafe { self.handle.create_framebuffer(info, None) }
    }

    unsafe fn destroy_raw_framebuffer(&self, framebuffer: vk::Framebuffer) {
        // SAFETY: forwarded caller contract.
        unsafe { self.handle.destroy_framebuffer(framebuffer, None) }
    }

    unsafe fn create_raw_image_view(
        &self,
        info: &vk::ImageViewCreateInfo<'_>,
    ) -> VkResult<vk::ImageView> {
        // SAFETY: forwarded caller contract.
        unsafe { self.handle.create_image_view(info, None) }
    }

    unsafe fn destroy_raw_image_view(&self, view: vk::ImageView) {
        // SAFETY: forwarded caller contract.
        unsafe { self.handle.destroy_image_view(view, None) }
    }

    unsafe fn create_raw_swapchain(
        &self,
        info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> VkResult<vk::SwapchainKHR> {
        // SAFETY: forwarded caller contract.
        unsafe { self.swapchain_loader.create_swapchain(info, None) }
    }

    unsafe fn get_raw_swapchain_images(
        &self,
        swapchain: vk::SwapchainKHR,
    ) -> VkResult<Vec<vk::Image>> {
        // SAFETY: forwarded caller contract.
        unsafe { self.swapchain_loader.get_swapchain_images(swapchain) }
    }

    unsafe fn destroy_raw_swapchain(&self, swapchain: vk::SwapchainKHR) {
        // SAFETY: forwarded caller contract.
        unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) }
    }

    unsafe fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout_ns: u64,
        semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        // SAFETY: forwarded caller contract.
        unsafe {
            self.swapchain_loader
                .acquire_next_image(swapchain, timeout_ns, semaphore, vk::Fence::null())
        }
    }

    unsafe fn queue_present(
        &self,
        queue: vk::Queue,
        info: &vk::PresentInfoKHR<'_>,
    ) -> VkResult<bool> {
        // SAFETY: forwarded caller contract.
        unsafe { self.swapchain_loader.queue_present(queue, info) }
    }

    unsafe fn create_raw_fence(&self, info: &vk::FenceCreateInfo<'_>) -> VkResult<vk::Fence> {
        // SAFETY: forwarded caller contract.
        unsafe { self.handle.create_fence(info, None) }
    }

    unsafe fn destroy_raw_fence(&self, fence: vk::Fence) {
        // SAFETY: forwarded caller contract.
        unsafe { self.handle.destroy_fence(fence, None) }
    }

    unsafe fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> VkResult<()> {
        // SAFETY: forwarded caller contract.
        unsafe { self.handle.wait_for_fences(&[fence], true, timeout_ns) }
    }

    unsafe fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        // SAFETY: forwarded caller contract.
        unsafe { self.handle.reset_fences(&[fence]) }
    }

    unsafe fn create_raw_semaphore(
        &self,
        info: &vk::SemaphoreCreateInfo<'_>,
    ) -> VkResult<vk::Semaphore> {
        // SAFETY: forwarded caller contract.
        unsafe { self.handle.create_semaphore(info, None) }
    }

    unsafe fn destroy_raw_semaphore(&self, semaphore: vk::Semaphore) {
        // SAFETY: forwarded caller contract.
        unsafe { self.handle.destroy_semaphore(semaphore, None) }
    }

    unsafe fn create_raw_command_pool(
        &self,
        info: &vk::CommandPoolCreateInfo<'_>,
    ) -> VkResult<vk::CommandPool> {
        // SAFETY: forwarded caller contract.
        unsafe { self.handle.create_command_pool(info, None) }
    }

    unsafe fn destroy_raw_command_pool(&self, pool: vk::CommandPool) {
        // SAFETY: forwarded caller contract.
        unsafe { self.handle.destroy_command_pool(pool, None) }
    }

    unsafe fn allocate_command_buffers(
        &self,
        info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        // SAFETY: forwarded caller contract.
        unsafe { self.handle.allocate_command_buffers(info) }
    }

    unsafe fn reset_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        // SAFETY: forwarded caller contract.
        unsafe {
            self.handle
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
        }
    }

    unsafe fn begin_command_buffer(
        &self,
        cmd: vk::CommandBuffer,
        info: &vk::CommandBufferBeginInfo<'_>,
    ) -> VkResult<()> {
        // SAFETY: forwarded caller contract.
        unsafe { self.handle.begin_command_buffer(cmd, info) }
    }

    unsafe fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        // SAFETY: forwarded caller contract.
        unsafe { self.handle.end_command_buffer(cmd) }
    }

    unsafe fn cmd_begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        info: &vk::RenderPassBeginInfo<'_>,
    ) {
        // SAFETY: forwarded caller contract.
        unsafe {
            self.handle
                .cmd_begin_render_pass(cmd, info, vk::SubpassContents::INLINE)
        }
    }

    unsafe fn cmd_bind_graphics_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline) {
        // SAFETY: forwarded caller contract.
        unsafe {
            self.handle
                .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline)
        }
    }

    unsafe fn cmd_set_viewport(&self, cmd: vk::CommandBuffer, viewports: &[vk::Viewport]) {
        // SAFETY: forwarded caller contract.
        unsafe { self.handle.cmd_set_viewport(cmd, 0, viewports) }
    }

    unsafe fn cmd_set_scissor(&self, cmd: vk::CommandBuffer, scissors: &[vk::Rect2D]) {
        // SAFETY: forwarded caller contract.
        unsafe { self.handle.cmd_set_scissor(cmd, 0, scissors) }
    }

    unsafe fn cmd_draw(
        &self,
        cmd: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        // SAFETY: forwarded caller contract.
        unsafe {
            self.handle
                .cmd_draw(cmd, vertex_count, instance_count, first_vertex, first_instance)
        }
    }

    unsafe fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer) {
        // SAFETY: forwarded caller contract.
        unsafe { self.handle.cmd_end_render_pass(cmd) }
    }

    unsafe fn queue_submit(
        &self,
        queue: vk::Queue,
        submits: &[vk::SubmitInfo<'_>],
        fence: vk::Fence,
    ) -> VkResult<()> {
        // SAFETY: forwarded caller contract.
        unsafe { self.handle.queue_submit(queue, submits, fence) }
    }

    fn wait_idle(&self) -> VkResult<()> {
        // SAFETY: the device is live for `self`; no pointer arguments.
        unsafe { self.handle.device_wait_idle() }
    }
}
