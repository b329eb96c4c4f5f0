use std::sync::Arc;

use ash::vk;
use thiserror::Error;

use crate::device::{DeviceApi, GpuError};

use super::render_pass::RenderPass;

#[derive(Debug, Error)]
#[error("framebuffer {index} could not be created")]
pub struct FramebufferError {
    pub index: usize,
    #[source]
    pub source: GpuError,
}

/// One framebuffer per swapchain image view.
pub struct FramebufferSet<D: DeviceApi> {
    device: Arc<D>,
    framebuffers: Vec<vk::Framebuffer>,
    extent: vk::Extent2D,
}

impl<D: DeviceApi> std::fmt::Debug for FramebufferSet<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramebufferSet")
            .field("framebuffers", &self.framebuffers)
            .field("extent", &self.extent)
            .finish_non_exhaustive()
    }
}

impl<D: DeviceApi> FramebufferSet<D> {
    /// Builds framebuffers in view order. A failure at index `i` reports `i`;
    /// framebuffers `0..i` are destroyed before returning.
    pub fn new(
        device: &Arc<D>,
        render_pass: &RenderPass<D>,
        views: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> Result<Self, FramebufferError> {
        let mut set = Self {
            device: Arc::clone(device),
            framebuffers: Vec::with_capacity(views.len()),
            extent,
        };

        for (index, view) in views.iter().enumerate() {
            let info = vk::FramebufferCreateInfo::default()
                .render_pass(render_pass.handle())
                .attachments(std::slice::from_ref(view))
                .width(extent.width)
                .height(extent.height)
                .layers(1);

            // SAFETY: the render pass and the view are live for the call.
            let framebuffer = unsafe { device.create_raw_framebuffer(&info) }
                .map_err(|result| FramebufferError {
                    index,
                    source: GpuError::from_vk("vkCreateFramebuffer", result),
                })?;
            set.framebuffers.push(framebuffer);
        }

        log::debug!("{} framebuffers created", set.framebuffers.len());
        Ok(set)
    }

    pub fn get(&self, index: usize) -> Option<vk::Framebuffer> {
        self.framebuffers.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.framebuffers.is_empty()
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl<D: DeviceApi> Drop for FramebufferSet<D> {
    fn drop(&mut self) {
        for framebuffer in self.framebuffers.drain(..).rev() {
            // SAFETY: the device was idled before teardown.
            unsafe { self.device.destroy_raw_framebuffer(framebuffer) };
        }
    }
}
