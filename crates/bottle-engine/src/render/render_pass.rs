use std::sync::Arc;

use ash::vk;

use crate::device::{DeviceApi, GpuResult, VkResultExt};

/// Single-subpass render pass with one presentable color attachment.
///
/// The attachment is cleared on load and stored, transitioning from
/// `UNDEFINED` to `PRESENT_SRC_KHR`. An external dependency orders the
/// attachment write after the acquire semaphore wait at
/// `COLOR_ATTACHMENT_OUTPUT`.
pub struct RenderPass<D: DeviceApi> {
    device: Arc<D>,
    handle: vk::RenderPass,
    format: vk::Format,
}

impl<D: DeviceApi> std::fmt::Debug for RenderPass<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPass")
            .field("handle", &self.handle)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl<D: DeviceApi> RenderPass<D> {
    pub fn new(device: &Arc<D>, format: vk::Format) -> GpuResult<Self> {
        let attachment = vk::AttachmentDescription::default()
            .format(format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);

        let color_ref = vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        };

        let subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(std::slice::from_ref(&color_ref));

        let dependency = vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE);

        let info = vk::RenderPassCreateInfo::default()
            .attachments(std::slice::from_ref(&attachment))
            .subpasses(std::slice::from_ref(&subpass))
            .dependencies(std::slice::from_ref(&dependency));

        // SAFETY: all arrays referenced by `info` are locals alive for the call.
        let handle = unsafe { device.create_raw_render_pass(&info) }
            .vk_op("vkCreateRenderPass")?;

        log::debug!("render pass created for {format:?}");

        Ok(Self {
            device: Arc::clone(device),
            handle,
            format,
        })
    }

    pub fn handle(&self) -> vk::RenderPass {
        self.handle
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }
}

impl<D: DeviceApi> Drop for RenderPass<D> {
    fn drop(&mut self) {
        log::debug!("destroying render pass {:?}", self.handle);
        // SAFETY: framebuffers and pipelines built on the pass are dropped first.
        unsafe { self.device.destroy_raw_render_pass(self.handle) };
    }
}
