use std::sync::Arc;

use ash::vk;

use super::api::DeviceApi;
use super::context::GraphicsContext;
use super::error::{GpuError, GpuResult, VkResultExt};
use super::physical::QueueFamilies;
use super::surface::SurfaceSupport;

const PREFERRED_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// B8G8R8A8_SRGB with the sRGB non-linear color space wherever it appears,
/// else the first reported format.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == PREFERRED_FORMAT.format && f.color_space == PREFERRED_FORMAT.color_space
        })
        .or_else(|| formats.first().copied())
}

/// MAILBOX when available, FIFO otherwise (always supported).
pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    modes
        .iter()
        .copied()
        .find(|m| *m == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// The surface's current extent, unless it reports the `u32::MAX` sentinel.
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, fallback: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }

    vk::Extent2D {
        width: fallback
            .width
            .clamp(caps.min_image_extent.width, caps.max_image_extent.width.max(caps.min_image_extent.width)),
        height: fallback
            .height
            .clamp(caps.min_image_extent.height, caps.max_image_extent.height.max(caps.min_image_extent.height)),
    }
}

/// One image above the minimum, capped by the maximum (0 = unbounded).
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let wanted = caps.min_image_count.saturating_add(1);
    if caps.max_image_count > 0 {
        wanted.min(caps.max_image_count)
    } else {
        wanted
    }
}

pub fn choose_composite_alpha(caps: &vk::SurfaceCapabilitiesKHR) -> vk::CompositeAlphaFlagsKHR {
    [
        vk::CompositeAlphaFlagsKHR::OPAQUE,
        vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::INHERIT,
    ]
    .into_iter()
    .find(|mode| caps.supported_composite_alpha.contains(*mode))
    .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE)
}

/// CONCURRENT across both families when they differ, EXCLUSIVE otherwise.
pub fn choose_sharing(families: QueueFamilies) -> (vk::SharingMode, Vec<u32>) {
    if families.is_shared() {
        (vk::SharingMode::EXCLUSIVE, Vec::new())
    } else {
        (
            vk::SharingMode::CONCURRENT,
            vec![families.graphics, families.present],
        )
    }
}

/// Negotiated swapchain parameters.
#[derive(Debug, Clone)]
pub struct SwapchainPlan {
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub sharing_mode: vk::SharingMode,
    pub queue_family_indices: Vec<u32>,
}

impl SwapchainPlan {
    pub fn negotiate(
        support: &SurfaceSupport,
        families: QueueFamilies,
        fallback_extent: vk::Extent2D,
    ) -> GpuResult<Self> {
        let format = choose_surface_format(&support.formats).ok_or(GpuError::NoSurfaceFormats)?;
        if support.present_modes.is_empty() {
            return Err(GpuError::NoPresentModes);
        }
        let caps = &support.capabilities;
        let (sharing_mode, queue_family_indices) = choose_sharing(families);

        Ok(Self {
            format,
            present_mode: choose_present_mode(&support.present_modes),
            extent: choose_extent(caps, fallback_extent),
            image_count: choose_image_count(caps),
            composite_alpha: choose_composite_alpha(caps),
            pre_transform: caps.current_transform,
            sharing_mode,
            queue_family_indices,
        })
    }
}

/// The swapchain, its images and one color view per image.
pub struct SurfacePresentationChain<D: DeviceApi> {
    device: Arc<D>,
    handle: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    plan: SwapchainPlan,
}

impl<D: DeviceApi> std::fmt::Debug for SurfacePresentationChain<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfacePresentationChain")
            .field("handle", &self.handle)
            .field("images", &self.images.len())
            .field("plan", &self.plan)
            .finish_non_exhaustive()
    }
}

impl<D: DeviceApi> SurfacePresentationChain<D> {
    /// Negotiates and creates the swapchain, then one image view per image.
    pub fn new(
        ctx: &GraphicsContext<D>,
        support: &SurfaceSupport,
        fallback_extent: vk::Extent2D,
    ) -> GpuResult<Self> {
        let plan = SwapchainPlan::negotiate(support, ctx.queue_families(), fallback_extent)?;

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(ctx.surface())
            .min_image_count(plan.image_count)
            .image_format(plan.format.format)
            .image_color_space(plan.format.color_space)
            .image_extent(plan.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(plan.sharing_mode)
            .queue_family_indices(&plan.queue_family_indices)
            .pre_transform(plan.pre_transform)
            .composite_alpha(plan.composite_alpha)
            .present_mode(plan.present_mode)
            .clipped(true);

        let device = Arc::clone(ctx.device());
        // SAFETY: the surface belongs to the context's device; the family
        // index slice outlives the call.
        let handle = unsafe { device.create_raw_swapchain(&create_info) }
            .vk_op("vkCreateSwapchainKHR")?;

        // From here on, Drop releases whatever was created.
        let mut chain = Self {
            device,
            handle,
            images: Vec::new(),
            views: Vec::new(),
            plan,
        };

        // SAFETY: the swapchain was just created.
        chain.images = unsafe { chain.device.get_raw_swapchain_images(handle) }
            .vk_op("vkGetSwapchainImagesKHR")?;

        for &image in &chain.images {
            let info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(chain.plan.format.format)
                .components(vk::ComponentMapping::default())
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .base_mip_level(0)
                        .level_count(1)
                        .base_array_layer(0)
                        .layer_count(1),
                );
            // SAFETY: `image` is owned by the live swapchain.
            let view = unsafe { chain.device.create_raw_image_view(&info) }
                .vk_op("vkCreateImageView")?;
            chain.views.push(view);
        }

        log::info!(
            "swapchain created: {} images, {:?} {:?}, {}x{}, {:?}",
            chain.images.len(),
            chain.plan.format.format,
            chain.plan.format.color_space,
            chain.plan.extent.width,
            chain.plan.extent.height,
            chain.plan.present_mode
        );

        Ok(chain)
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    pub fn format(&self) -> vk::Format {
        self.plan.format.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.plan.extent
    }

    pub fn plan(&self) -> &SwapchainPlan {
        &self.plan
    }

    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.views
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

impl<D: DeviceApi> Drop for SurfacePresentationChain<D> {
    fn drop(&mut self) {
        log::debug!("destroying swapchain {:?}", self.handle);
        for view in self.views.drain(..).rev() {
            // SAFETY: framebuffers using the view were dropped before the chain.
            unsafe { self.device.destroy_raw_image_view(view) };
        }
        // SAFETY: no views remain and the renderer idled the device.
        unsafe { self.device.destroy_raw_swapchain(self.handle) };
    }
}
