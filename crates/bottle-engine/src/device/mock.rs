//! Recording in-memory device used by the unit tests.
//!
//! Handles are plain counters. Every call is appended to a shared [`Journal`]
//! that outlives the device, and misuse of the Vulkan state machine (resetting
//! a pending fence, re-recording a command buffer whose submission was never
//! fence-confirmed, waiting on a semaphore that nothing signals, destroying an
//! unknown handle) is collected as a violation string.

use std::collections::{HashMap, HashSet};
use std::ffi::CStr;
use std::sync::{Arc, Mutex, MutexGuard};

use ash::prelude::VkResult;
use ash::vk::{self, Handle};

use super::api::DeviceApi;
use super::context::GraphicsContext;
use super::physical::QueueFamilies;
use super::surface::SurfaceSupport;

const GRAPHICS_QUEUE: u64 = 0xA0;
const PRESENT_QUEUE: u64 = 0xB0;
const SURFACE: u64 = 0x5F;

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    CreateShaderModule { module: u64, code_size: usize },
    DestroyShaderModule(u64),
    CreatePipelineLayout(u64),
    DestroyPipelineLayout(u64),
    CreatePipeline(u64),
    DestroyPipeline(u64),
    CreateRenderPass(u64),
    DestroyRenderPass(u64),
    CreateFramebuffer {
        framebuffer: u64,
        render_pass: u64,
        attachments: Vec<u64>,
        width: u32,
        height: u32,
        layers: u32,
    },
    DestroyFramebuffer(u64),
    CreateImageView { view: u64, image: u64 },
    DestroyImageView(u64),
    CreateSwapchain(u64),
    DestroySwapchain(u64),
    CreateFence { fence: u64, signaled: bool },
    DestroyFence(u64),
    WaitFence(u64),
    ResetFence(u64),
    CreateSemaphore(u64),
    DestroySemaphore(u64),
    CreateCommandPool { pool: u64, family: u32, flags: vk::CommandPoolCreateFlags },
    DestroyCommandPool(u64),
    AllocateCommandBuffers { pool: u64, count: u32, level: vk::CommandBufferLevel },
    ResetCommandBuffer(u64),
    BeginCommandBuffer(u64),
    EndCommandBuffer(u64),
    BeginRenderPass { cmd: u64, render_pass: u64, framebuffer: u64, width: u32, height: u32, clear: [f32; 4] },
    BindPipeline { cmd: u64, pipeline: u64 },
    SetViewport { cmd: u64, width: f32, height: f32 },
    SetScissor { cmd: u64, width: u32, height: u32 },
    Draw { cmd: u64, vertices: u32, instances: u32 },
    EndRenderPass(u64),
    Acquire { semaphore: u64, image_index: u32 },
    Submit { queue: u64, command_buffers: Vec<u64>, wait: Vec<u64>, signal: Vec<u64>, fence: u64 },
    Present { queue: u64, image_index: u32, wait: Vec<u64> },
    WaitIdle,
    DestroyDevice,
}

impl Op {
    fn created(&self) -> Option<u64> {
        match self {
            Op::CreateShaderModule { module, .. } => Some(*module),
            Op::CreatePipelineLayout(h)
            | Op::CreatePipeline(h)
            | Op::CreateRenderPass(h)
            | Op::CreateSwapchain(h)
            | Op::CreateSemaphore(h) => Some(*h),
            Op::CreateFramebuffer { framebuffer, .. } => Some(*framebuffer),
            Op::CreateImageView { view, .. } => Some(*view),
            Op::CreateFence { fence, .. } => Some(*fence),
            Op::CreateCommandPool { pool, .. } => Some(*pool),
            _ => None,
        }
    }

    fn destroyed(&self) -> Option<u64> {
        match self {
            Op::DestroyShaderModule(h)
            | Op::DestroyPipelineLayout(h)
            | Op::DestroyPipeline(h)
            | Op::DestroyRenderPass(h)
            | Op::DestroyFramebuffer(h)
            | Op::DestroyImageView(h)
            | Op::DestroySwapchain(h)
            | Op::DestroyFence(h)
            | Op::DestroySemaphore(h)
            | Op::DestroyCommandPool(h) => Some(*h),
            _ => None,
        }
    }
}

/// Shared, append-only call log.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Op>>>);

impl Journal {
    fn push(&self, op: Op) {
        lock(&self.0).push(op);
    }

    pub fn ops(&self) -> Vec<Op> {
        lock(&self.0).clone()
    }

    pub fn contains(&self, op: &Op) -> bool {
        lock(&self.0).contains(op)
    }

    pub fn position(&self, op: &Op) -> Option<usize> {
        lock(&self.0).iter().position(|o| o == op)
    }

    pub fn count(&self, pred: impl Fn(&Op) -> bool) -> usize {
        lock(&self.0).iter().filter(|o| pred(o)).count()
    }

    /// Handles created but never destroyed.
    pub fn live_handles(&self) -> HashSet<u64> {
        let mut live = HashSet::new();
        for op in lock(&self.0).iter() {
            if let Some(h) = op.created() {
                live.insert(h);
            }
            if let Some(h) = op.destroyed() {
                live.remove(&h);
            }
        }
        live
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum FenceState {
    Signaled,
    Unsignaled,
    Pending,
}

/// Sub-state values the pipeline was created with.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRecord {
    pub stages: Vec<(vk::ShaderStageFlags, u64, String)>,
    pub vertex_bindings: u32,
    pub vertex_attributes: u32,
    pub topology: vk::PrimitiveTopology,
    pub primitive_restart: bool,
    pub viewport_count: u32,
    pub scissor_count: u32,
    pub viewport_extent: Option<(f32, f32, f32, f32)>,
    pub dynamic_states: Vec<vk::DynamicState>,
    pub depth_clamp: bool,
    pub discard: bool,
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub depth_bias: bool,
    pub line_width: f32,
    pub samples: vk::SampleCountFlags,
    pub sample_shading: bool,
    pub logic_op_enable: bool,
    pub logic_op: vk::LogicOp,
    pub blend: Vec<BlendRecord>,
    pub layout: u64,
    pub render_pass: u64,
    pub subpass: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlendRecord {
    pub enable: bool,
    pub write_mask: vk::ColorComponentFlags,
    pub src_color: vk::BlendFactor,
    pub dst_color: vk::BlendFactor,
    pub color_op: vk::BlendOp,
    pub src_alpha: vk::BlendFactor,
    pub dst_alpha: vk::BlendFactor,
    pub alpha_op: vk::BlendOp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderPassRecord {
    pub format: vk::Format,
    pub samples: vk::SampleCountFlags,
    pub load_op: vk::AttachmentLoadOp,
    pub store_op: vk::AttachmentStoreOp,
    pub initial_layout: vk::ImageLayout,
    pub final_layout: vk::ImageLayout,
    pub subpass_count: u32,
    pub color_refs: Vec<(u32, vk::ImageLayout)>,
    pub dependencies: Vec<(u32, u32, vk::PipelineStageFlags, vk::PipelineStageFlags, vk::AccessFlags)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwapchainRecord {
    pub surface: u64,
    pub min_image_count: u32,
    pub format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
    pub extent: (u32, u32),
    pub usage: vk::ImageUsageFlags,
    pub sharing_mode: vk::SharingMode,
    pub queue_families: Vec<u32>,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
    pub present_mode: vk::PresentModeKHR,
    pub clipped: bool,
}

#[derive(Default)]
struct State {
    next_handle: u64,
    live: HashSet<u64>,
    fences: HashMap<u64, FenceState>,
    completions: HashMap<u64, u32>,
    semaphores: HashMap<u64, bool>,
    in_flight: HashMap<u64, u64>,
    swapchain_images: HashMap<u64, u32>,
    next_image: u32,
    calls: HashMap<&'static str, usize>,
    failures: Vec<(&'static str, usize, vk::Result)>,
    violations: Vec<String>,
    forced_image_index: Option<u32>,
    acquire_suboptimal: bool,
    present_suboptimal: bool,
    gpu_hung: bool,
    draws: usize,
    wait_idles: usize,
    pipeline: Option<PipelineRecord>,
    render_pass: Option<RenderPassRecord>,
    swapchain: Option<SwapchainRecord>,
}

impl State {
    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        let h = 0x1000 + self.next_handle;
        self.live.insert(h);
        h
    }

    fn release(&mut self, what: &str, h: u64) {
        if !self.live.remove(&h) {
            self.violations.push(format!("destroy of unknown {what} {h:#x}"));
        }
    }

    /// Counts the call and returns the injected failure, if any.
    fn call(&mut self, op: &'static str) -> VkResult<()> {
        let n = self.calls.entry(op).or_insert(0);
        let nth = *n;
        *n += 1;
        match self
            .failures
            .iter()
            .find(|(name, at, _)| *name == op && *at == nth)
        {
            Some(&(_, _, result)) => Err(result),
            None => Ok(()),
        }
    }

    fn complete(&mut self, fence: u64) {
        self.fences.insert(fence, FenceState::Signaled);
        *self.completions.entry(fence).or_insert(0) += 1;
        self.in_flight.retain(|_, f| *f != fence);
    }

    fn check_reusable(&mut self, what: &str, cmd: u64) {
        if self.in_flight.contains_key(&cmd) {
            self.violations
                .push(format!("{what} of command buffer {cmd:#x} before its fence was waited"));
        }
    }
}

pub struct MockDevice {
    state: Mutex<State>,
    journal: Journal,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockDevice {
    pub fn new() -> (Self, Journal) {
        let journal = Journal::default();
        let device = Self {
            state: Mutex::new(State::default()),
            journal: journal.clone(),
        };
        (device, journal)
    }

    /// Context over a fresh mock device with fixed queue and surface handles.
    pub fn context(families: QueueFamilies) -> (GraphicsContext<MockDevice>, Journal) {
        let (device, journal) = Self::new();
        let present = if families.is_shared() {
            GRAPHICS_QUEUE
        } else {
            PRESENT_QUEUE
        };
        let ctx = GraphicsContext::new(
            Arc::new(device),
            vk::PhysicalDevice::from_raw(1),
            families,
            vk::Queue::from_raw(GRAPHICS_QUEUE),
            vk::Queue::from_raw(present),
            vk::SurfaceKHR::from_raw(SURFACE),
        );
        (ctx, journal)
    }

    /// Surface allowing between `min` and `max` images (0 = unbounded) at a fixed extent.
    pub fn surface_support(min: u32, max: u32) -> SurfaceSupport {
        SurfaceSupport {
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: min,
                max_image_count: max,
                current_extent: vk::Extent2D {
                    width: 640,
                    height: 480,
                },
                min_image_extent: vk::Extent2D {
                    width: 1,
                    height: 1,
                },
                max_image_extent: vk::Extent2D {
                    width: 4096,
                    height: 4096,
                },
                max_image_array_layers: 1,
                supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY,
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
                supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            },
            formats: vec![
                vk::SurfaceFormatKHR {
                    format: vk::Format::R8G8B8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_SRGB,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
            ],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }

    // ── knobs ──

    /// Makes the `nth` (0-based) call of `op` fail with `result`.
    pub fn fail_on(&self, op: &'static str, nth: usize, result: vk::Result) {
        self.state().failures.push((op, nth, result));
    }

    pub fn force_image_index(&self, index: Option<u32>) {
        self.state().forced_image_index = index;
    }

    pub fn set_acquire_suboptimal(&self, suboptimal: bool) {
        self.state().acquire_suboptimal = suboptimal;
    }

    pub fn set_present_suboptimal(&self, suboptimal: bool) {
        self.state().present_suboptimal = suboptimal;
    }

    /// Submitted work never completes; fence waits time out.
    pub fn hang_gpu(&self, hung: bool) {
        self.state().gpu_hung = hung;
    }

    // ── observations ──

    pub fn violations(&self) -> Vec<String> {
        self.state().violations.clone()
    }

    pub fn draws(&self) -> usize {
        self.state().draws
    }

    pub fn wait_idles(&self) -> usize {
        self.state().wait_idles
    }

    /// Times each fence went from pending back to signaled.
    pub fn fence_completions(&self, fence: vk::Fence) -> u32 {
        self.state()
            .completions
            .get(&fence.as_raw())
            .copied()
            .unwrap_or(0)
    }

    pub fn fence_signaled(&self, fence: vk::Fence) -> bool {
        self.state().fences.get(&fence.as_raw()) == Some(&FenceState::Signaled)
    }

    pub fn pipeline(&self) -> Option<PipelineRecord> {
        self.state().pipeline.clone()
    }

    pub fn render_pass(&self) -> Option<RenderPassRecord> {
        self.state().render_pass.clone()
    }

    pub fn swapchain(&self) -> Option<SwapchainRecord> {
        self.state().swapchain.clone()
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.journal.push(Op::DestroyDevice);
    }
}

/// # Safety
/// `ptr` must point at `len` valid elements or `len` must be zero.
unsafe fn slice<'a, T>(ptr: *const T, len: u32) -> &'a [T] {
    if len == 0 || ptr.is_null() {
        &[]
    } else {
        // SAFETY: guaranteed by the caller.
        unsafe { std::slice::from_raw_parts(ptr, len as usize) }
    }
}

impl DeviceApi for MockDevice {
    unsafe fn create_raw_shader_module(
        &self,
        info: &vk::ShaderModuleCreateInfo<'_>,
    ) -> VkResult<vk::ShaderModule> {
        let mut s = self.state();
        s.call("vkCreateShaderModule")?;
        let module = s.handle();
        self.journal.push(Op::CreateShaderModule {
            module,
            code_size: info.code_size,
        });
        Ok(vk::ShaderModule::from_raw(module))
    }

    unsafe fn destroy_raw_shader_module(&self, module: vk::ShaderModule) {
        self.state().release("shader module", module.as_raw());
        self.journal.push(Op::DestroyShaderModule(module.as_raw()));
    }

    unsafe fn create_raw_pipeline_layout(
        &self,
        _info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> VkResult<vk::PipelineLayout> {
        let mut s = self.state();
        s.call("vkCreatePipelineLayout")?;
        let h = s.handle();
        self.journal.push(Op::CreatePipelineLayout(h));
        Ok(vk::PipelineLayout::from_raw(h))
    }

    unsafe fn destroy_raw_pipeline_layout(&self, layout: vk::PipelineLayout) {
        self.state().release("pipeline layout", layout.as_raw());
        self.journal.push(Op::DestroyPipelineLayout(layout.as_raw()));
    }

    unsafe fn create_raw_graphics_pipeline(
        &self,
        info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> VkResult<vk::Pipeline> {
        let mut s = self.state();
        s.call("vkCreateGraphicsPipelines")?;

        // SAFETY: the caller keeps every sub-state alive for the call.
        let record = unsafe {
            let stages = slice(info.p_stages, info.stage_count)
                .iter()
                .map(|st| {
                    (
                        st.stage,
                        st.module.as_raw(),
                        CStr::from_ptr(st.p_name).to_string_lossy().into_owned(),
                    )
                })
                .collect();
            let vi = &*info.p_vertex_input_state;
            let ia = &*info.p_input_assembly_state;
            let vp = &*info.p_viewport_state;
            let rs = &*info.p_rasterization_state;
            let ms = &*info.p_multisample_state;
            let cb = &*info.p_color_blend_state;
            let dynamic_states = info
                .p_dynamic_state
                .as_ref()
                .map(|d| slice(d.p_dynamic_states, d.dynamic_state_count).to_vec())
                .unwrap_or_default();
            let viewport_extent = slice(vp.p_viewports, vp.viewport_count)
                .first()
                .map(|v| (v.width, v.height, v.min_depth, v.max_depth));
            let blend = slice(cb.p_attachments, cb.attachment_count)
                .iter()
                .map(|a| BlendRecord {
                    enable: a.blend_enable == vk::TRUE,
                    write_mask: a.color_write_mask,
                    src_color: a.src_color_blend_factor,
                    dst_color: a.dst_color_blend_factor,
                    color_op: a.color_blend_op,
                    src_alpha: a.src_alpha_blend_factor,
                    dst_alpha: a.dst_alpha_blend_factor,
                    alpha_op: a.alpha_blend_op,
                })
                .collect();

            PipelineRecord {
                stages,
                vertex_bindings: vi.vertex_binding_description_count,
                vertex_attributes: vi.vertex_attribute_description_count,
                topology: ia.topology,
                primitive_restart: ia.primitive_restart_enable == vk::TRUE,
                viewport_count: vp.viewport_count,
                scissor_count: vp.scissor_count,
                viewport_extent,
                dynamic_states,
                depth_clamp: rs.depth_clamp_enable == vk::TRUE,
                discard: rs.rasterizer_discard_enable == vk::TRUE,
                polygon_mode: rs.polygon_mode,
                cull_mode: rs.cull_mode,
                front_face: rs.front_face,
                depth_bias: rs.depth_bias_enable == vk::TRUE,
                line_width: rs.line_width,
                samples: ms.rasterization_samples,
                sample_shading: ms.sample_shading_enable == vk::TRUE,
                logic_op_enable: cb.logic_op_enable == vk::TRUE,
                logic_op: cb.logic_op,
                blend,
                layout: info.layout.as_raw(),
                render_pass: info.render_pass.as_raw(),
                subpass: info.subpass,
            }
        };

        let h = s.handle();
        s.pipeline = Some(record);
        self.journal.push(Op::CreatePipeline(h));
        Ok(vk::Pipeline::from_raw(h))
    }

    unsafe fn destroy_raw_pipeline(&self, pipeline: vk::Pipeline) {
        self.state().release("pipeline", pipeline.as_raw());
        self.journal.push(Op::DestroyPipeline(pipeline.as_raw()));
    }

    unsafe fn create_raw_render_pass(
        &self,
        info: &vk::RenderPassCreateInfo<'_>,
    ) -> VkResult<vk::RenderPass> {
        let mut s = self.state();
        s.call("vkCreateRenderPass")?;

        // SAFETY: the caller keeps the description arrays alive for the call.
        let record = unsafe {
            let attachment = slice(info.p_attachments, info.attachment_count)
                .first()
                .copied()
                .unwrap_or_default();
            let color_refs = slice(info.p_subpasses, info.subpass_count)
                .iter()
                .flat_map(|sp| slice(sp.p_color_attachments, sp.color_attachment_count))
                .map(|r| (r.attachment, r.layout))
                .collect();
            let dependencies = slice(info.p_dependencies, info.dependency_count)
                .iter()
                .map(|d| {
                    (
                        d.src_subpass,
                        d.dst_subpass,
                        d.src_stage_mask,
                        d.dst_stage_mask,
                        d.dst_access_mask,
                    )
                })
                .collect();
            RenderPassRecord {
                format: attachment.format,
                samples: attachment.samples,
                load_op: attachment.load_op,
                store_op: attachment.store_op,
                initial_layout: attachment.initial_layout,
                final_layout: attachment.final_layout,
                subpass_count: info.subpass_count,
                color_refs,
                dependencies,
            }
        };

        let h = s.handle();
        s.render_pass = Some(record);
        self.journal.push(Op::CreateRenderPass(h));
        Ok(vk::RenderPass::from_raw(h))
    }

    unsafe fn destroy_raw_render_pass(&self, render_pass: vk::RenderPass) {
        self.state().release("render pass", render_pass.as_raw());
        self.journal.push(Op::DestroyRenderPass(render_pass.as_raw()));
    }

    unsafe fn create_raw_framebuffer(
        &self,
        info: &vk::FramebufferCreateInfo<'_>,
    ) -> VkResult<vk::Framebuffer> {
        let mut s = self.state();
        s.call("vkCreateFramebuffer")?;
        let h = s.handle();
        // SAFETY: the caller keeps the attachment array alive for the call.
        let attachments = unsafe { slice(info.p_attachments, info.attachment_count) }
            .iter()
            .map(|v| v.as_raw())
            .collect();
        self.journal.push(Op::CreateFramebuffer {
            framebuffer: h,
            render_pass: info.render_pass.as_raw(),
            attachments,
            width: info.width,
            height: info.height,
            layers: info.layers,
        });
        Ok(vk::Framebuffer::from_raw(h))
    }

    unsafe fn destroy_raw_framebuffer(&self, framebuffer: vk::Framebuffer) {
        self.state().release("framebuffer", framebuffer.as_raw());
        self.journal.push(Op::DestroyFramebuffer(framebuffer.as_raw()));
    }

    unsafe fn create_raw_image_view(
        &self,
        info: &vk::ImageViewCreateInfo<'_>,
    ) -> VkResult<vk::ImageView> {
        let mut s = self.state();
        s.call("vkCreateImageView")?;
        let range = info.subresource_range;
        let well_formed = info.view_type == vk::ImageViewType::TYPE_2D
            && range.aspect_mask == vk::ImageAspectFlags::COLOR
            && range.level_count == 1
            && range.layer_count == 1;
        if !well_formed {
            s.violations.push("unexpected image view description".to_string());
        }
        let view = s.handle();
        self.journal.push(Op::CreateImageView {
            view,
            image: info.image.as_raw(),
        });
        Ok(vk::ImageView::from_raw(view))
    }

    unsafe fn destroy_raw_image_view(&self, view: vk::ImageView) {
        self.state().release("image view", view.as_raw());
        self.journal.push(Op::DestroyImageView(view.as_raw()));
    }

    unsafe fn create_raw_swapchain(
        &self,
        info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> VkResult<vk::SwapchainKHR> {
        let mut s = self.state();
        s.call("vkCreateSwapchainKHR")?;
        // SAFETY: the caller keeps the family index array alive for the call.
        let queue_families =
            unsafe { slice(info.p_queue_family_indices, info.queue_family_index_count) }.to_vec();
        let h = s.handle();
        s.swapchain_images.insert(h, info.min_image_count);
        s.swapchain = Some(SwapchainRecord {
            surface: info.surface.as_raw(),
            min_image_count: info.min_image_count,
            format: info.image_format,
            color_space: info.image_color_space,
            extent: (info.image_extent.width, info.image_extent.height),
            usage: info.image_usage,
            sharing_mode: info.image_sharing_mode,
            queue_families,
            pre_transform: info.pre_transform,
            composite_alpha: info.composite_alpha,
            present_mode: info.present_mode,
            clipped: info.clipped == vk::TRUE,
        });
        self.journal.push(Op::CreateSwapchain(h));
        Ok(vk::SwapchainKHR::from_raw(h))
    }

    unsafe fn get_raw_swapchain_images(
        &self,
        swapchain: vk::SwapchainKHR,
    ) -> VkResult<Vec<vk::Image>> {
        let mut s = self.state();
        s.call("vkGetSwapchainImagesKHR")?;
        let count = s
            .swapchain_images
            .get(&swapchain.as_raw())
            .copied()
            .unwrap_or(0);
        Ok((0..count)
            .map(|i| vk::Image::from_raw((swapchain.as_raw() << 8) | u64::from(i)))
            .collect())
    }

    unsafe fn destroy_raw_swapchain(&self, swapchain: vk::SwapchainKHR) {
        self.state().release("swapchain", swapchain.as_raw());
        self.journal.push(Op::DestroySwapchain(swapchain.as_raw()));
    }

    unsafe fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        _timeout_ns: u64,
        semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        let mut s = self.state();
        s.call("vkAcquireNextImageKHR")?;
        let sem = semaphore.as_raw();
        if s.semaphores.get(&sem) == Some(&true) {
            s.violations
                .push(format!("acquire signals semaphore {sem:#x} that is already signaled"));
        }
        s.semaphores.insert(sem, true);

        let count = s
            .swapchain_images
            .get(&swapchain.as_raw())
            .copied()
            .unwrap_or(1)
            .max(1);
        let image_index = match s.forced_image_index {
            Some(i) => i,
            None => {
                let i = s.next_image % count;
                s.next_image = s.next_image.wrapping_add(1);
                i
            }
        };
        self.journal.push(Op::Acquire {
            semaphore: sem,
            image_index,
        });
        Ok((image_index, s.acquire_suboptimal))
    }

    unsafe fn queue_present(
        &self,
        queue: vk::Queue,
        info: &vk::PresentInfoKHR<'_>,
    ) -> VkResult<bool> {
        let mut s = self.state();
        // SAFETY: the caller keeps the present arrays alive for the call.
        let (wait, indices) = unsafe {
            (
                slice(info.p_wait_semaphores, info.wait_semaphore_count).to_vec(),
                slice(info.p_image_indices, info.swapchain_count).to_vec(),
            )
        };
        let wait: Vec<u64> = wait.iter().map(|w| w.as_raw()).collect();
        for w in &wait {
            if s.semaphores.insert(*w, false) != Some(true) {
                s.violations
                    .push(format!("present waits on semaphore {w:#x} that nothing signals"));
            }
        }
        s.call("vkQueuePresentKHR")?;
        self.journal.push(Op::Present {
            queue: queue.as_raw(),
            image_index: indices.first().copied().unwrap_or(u32::MAX),
            wait,
        });
        Ok(s.present_suboptimal)
    }

    unsafe fn create_raw_fence(&self, info: &vk::FenceCreateInfo<'_>) -> VkResult<vk::Fence> {
        let mut s = self.state();
        s.call("vkCreateFence")?;
        let h = s.handle();
        let signaled = info.flags.contains(vk::FenceCreateFlags::SIGNALED);
        s.fences.insert(
            h,
            if signaled {
                FenceState::Signaled
            } else {
                FenceState::Unsignaled
            },
        );
        self.journal.push(Op::CreateFence { fence: h, signaled });
        Ok(vk::Fence::from_raw(h))
    }

    unsafe fn destroy_raw_fence(&self, fence: vk::Fence) {
        let mut s = self.state();
        let h = fence.as_raw();
        if s.fences.remove(&h) == Some(FenceState::Pending) {
            s.violations.push(format!("destroy of pending fence {h:#x}"));
        }
        s.release("fence", h);
        self.journal.push(Op::DestroyFence(h));
    }

    unsafe fn wait_for_fence(&self, fence: vk::Fence, _timeout_ns: u64) -> VkResult<()> {
        let mut s = self.state();
        let h = fence.as_raw();
        self.journal.push(Op::WaitFence(h));
        s.call("vkWaitForFences")?;
        match s.fences.get(&h).copied() {
            Some(FenceState::Signaled) => Ok(()),
            Some(FenceState::Pending) if !s.gpu_hung => {
                s.complete(h);
                Ok(())
            }
            _ => Err(vk::Result::TIMEOUT),
        }
    }

    unsafe fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        let mut s = self.state();
        let h = fence.as_raw();
        s.call("vkResetFences")?;
        if s.fences.get(&h) == Some(&FenceState::Pending) {
            s.violations.push(format!("reset of pending fence {h:#x}"));
        }
        s.fences.insert(h, FenceState::Unsignaled);
        self.journal.push(Op::ResetFence(h));
        Ok(())
    }

    unsafe fn create_raw_semaphore(
        &self,
        _info: &vk::SemaphoreCreateInfo<'_>,
    ) -> VkResult<vk::Semaphore> {
        let mut s = self.state();
        s.call("vkCreateSemaphore")?;
        let h = s.handle();
        s.semaphores.insert(h, false);
        self.journal.push(Op::CreateSemaphore(h));
        Ok(vk::Semaphore::from_raw(h))
    }

    unsafe fn destroy_raw_semaphore(&self, semaphore: vk::Semaphore) {
        let mut s = self.state();
        s.semaphores.remove(&semaphore.as_raw());
        s.release("semaphore", semaphore.as_raw());
        self.journal.push(Op::DestroySemaphore(semaphore.as_raw()));
    }

    unsafe fn create_raw_command_pool(
        &self,
        info: &vk::CommandPoolCreateInfo<'_>,
    ) -> VkResult<vk::CommandPool> {
        let mut s = self.state();
        s.call("vkCreateCommandPool")?;
        let h = s.handle();
        self.journal.push(Op::CreateCommandPool {
            pool: h,
            family: info.queue_family_index,
            flags: info.flags,
        });
        Ok(vk::CommandPool::from_raw(h))
    }

    unsafe fn destroy_raw_command_pool(&self, pool: vk::CommandPool) {
        let mut s = self.state();
        if !s.in_flight.is_empty() {
            s.violations
                .push("command pool destroyed with pending command buffers".to_string());
        }
        s.release("command pool", pool.as_raw());
        self.journal.push(Op::DestroyCommandPool(pool.as_raw()));
    }

    unsafe fn allocate_command_buffers(
        &self,
        info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        let mut s = self.state();
        s.call("vkAllocateCommandBuffers")?;
        let buffers = (0..info.command_buffer_count)
            .map(|_| {
                let h = s.handle();
                // Freed with the pool, not individually.
                s.live.remove(&h);
                vk::CommandBuffer::from_raw(h)
            })
            .collect();
        self.journal.push(Op::AllocateCommandBuffers {
            pool: info.command_pool.as_raw(),
            count: info.command_buffer_count,
            level: info.level,
        });
        Ok(buffers)
    }

    unsafe fn reset_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        let mut s = self.state();
        s.call("vkResetCommandBuffer")?;
        s.check_reusable("reset", cmd.as_raw());
        self.journal.push(Op::ResetCommandBuffer(cmd.as_raw()));
        Ok(())
    }

    unsafe fn begin_command_buffer(
        &self,
        cmd: vk::CommandBuffer,
        _info: &vk::CommandBufferBeginInfo<'_>,
    ) -> VkResult<()> {
        let mut s = self.state();
        s.call("vkBeginCommandBuffer")?;
        s.check_reusable("begin", cmd.as_raw());
        self.journal.push(Op::BeginCommandBuffer(cmd.as_raw()));
        Ok(())
    }

    unsafe fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        self.state().call("vkEndCommandBuffer")?;
        self.journal.push(Op::EndCommandBuffer(cmd.as_raw()));
        Ok(())
    }

    unsafe fn cmd_begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        info: &vk::RenderPassBeginInfo<'_>,
    ) {
        // SAFETY: the caller keeps the clear values alive; the color member is
        // the one written for a color attachment.
        let clear = unsafe {
            slice(info.p_clear_values, info.clear_value_count)
                .first()
                .map(|c| c.color.float32)
                .unwrap_or_default()
        };
        self.journal.push(Op::BeginRenderPass {
            cmd: cmd.as_raw(),
            render_pass: info.render_pass.as_raw(),
            framebuffer: info.framebuffer.as_raw(),
            width: info.render_area.extent.width,
            height: info.render_area.extent.height,
            clear,
        });
    }

    unsafe fn cmd_bind_graphics_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline) {
        self.journal.push(Op::BindPipeline {
            cmd: cmd.as_raw(),
            pipeline: pipeline.as_raw(),
        });
    }

    unsafe fn cmd_set_viewport(&self, cmd: vk::CommandBuffer, viewports: &[vk::Viewport]) {
        let (width, height) = viewports
            .first()
            .map(|v| (v.width, v.height))
            .unwrap_or_default();
        self.journal.push(Op::SetViewport {
            cmd: cmd.as_raw(),
            width,
            height,
        });
    }

    unsafe fn cmd_set_scissor(&self, cmd: vk::CommandBuffer, scissors: &[vk::Rect2D]) {
        let (width, height) = scissors
            .first()
            .map(|r| (r.extent.width, r.extent.height))
            .unwrap_or_default();
        self.journal.push(Op::SetScissor {
            cmd: cmd.as_raw(),
            width,
            height,
        });
    }

    unsafe fn cmd_draw(
        &self,
        cmd: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        _first_vertex: u32,
        _first_instance: u32,
    ) {
        self.state().draws += 1;
        self.journal.push(Op::Draw {
            cmd: cmd.as_raw(),
            vertices: vertex_count,
            instances: instance_count,
        });
    }

    unsafe fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer) {
        self.journal.push(Op::EndRenderPass(cmd.as_raw()));
    }

    unsafe fn queue_submit(
        &self,
        queue: vk::Queue,
        submits: &[vk::SubmitInfo<'_>],
        fence: vk::Fence,
    ) -> VkResult<()> {
        let mut s = self.state();
        s.call("vkQueueSubmit")?;
        let f = fence.as_raw();
        if f != 0 && s.fences.get(&f) != Some(&FenceState::Unsignaled) {
            s.violations
                .push(format!("submit with fence {f:#x} that is not unsignaled"));
        }

        for submit in submits {
            // SAFETY: the caller keeps the submit arrays alive for the call.
            let (cmds, wait, signal) = unsafe {
                (
                    slice(submit.p_command_buffers, submit.command_buffer_count).to_vec(),
                    slice(submit.p_wait_semaphores, submit.wait_semaphore_count).to_vec(),
                    slice(submit.p_signal_semaphores, submit.signal_semaphore_count).to_vec(),
                )
            };
            let cmds: Vec<u64> = cmds.iter().map(|c| c.as_raw()).collect();
            let wait: Vec<u64> = wait.iter().map(|w| w.as_raw()).collect();
            let signal: Vec<u64> = signal.iter().map(|w| w.as_raw()).collect();

            for w in &wait {
                if s.semaphores.insert(*w, false) != Some(true) {
                    s.violations
                        .push(format!("submit waits on semaphore {w:#x} that nothing signals"));
                }
            }
            for sig in &signal {
                s.semaphores.insert(*sig, true);
            }
            for c in &cmds {
                s.in_flight.insert(*c, f);
            }
            self.journal.push(Op::Submit {
                queue: queue.as_raw(),
                command_buffers: cmds,
                wait,
                signal,
                fence: f,
            });
        }

        if f != 0 {
            s.fences.insert(f, FenceState::Pending);
        }
        Ok(())
    }

    fn wait_idle(&self) -> VkResult<()> {
        let mut s = self.state();
        s.wait_idles += 1;
        self.journal.push(Op::WaitIdle);
        s.call("vkDeviceWaitIdle")?;
        let pending: Vec<u64> = s
            .fences
            .iter()
            .filter(|(_, st)| **st == FenceState::Pending)
            .map(|(h, _)| *h)
            .collect();
        for f in pending {
            s.complete(f);
        }
        s.in_flight.clear();
        Ok(())
    }
}
