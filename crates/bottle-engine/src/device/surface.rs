use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::window::Window;

use super::error::{GpuResult, VkResultExt};
use super::instance::Instance;

/// Everything the swapchain negotiation needs to know about a surface on one
/// physical device.
#[derive(Debug, Clone, Default)]
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    /// At least one format and one present mode are reported.
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// A `VkSurfaceKHR` bound to a window.
///
/// Holds the window and the instance alive until the surface is destroyed.
pub struct Surface {
    instance: Arc<Instance>,
    handle: vk::SurfaceKHR,
    _window: Arc<Window>,
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl Surface {
    pub fn new(instance: &Arc<Instance>, window: Arc<Window>) -> GpuResult<Self> {
        let display = window.display_handle()?.as_raw();
        let raw_window = window.window_handle()?.as_raw();

        // SAFETY: both handles come from a live window that the surface keeps alive.
        let handle = unsafe {
            ash_window::create_surface(
                instance.entry(),
                instance.handle(),
                display,
                raw_window,
                None,
            )
        }
        .vk_op("vkCreateSurfaceKHR")?;

        log::debug!("created surface {handle:?}");

        Ok(Self {
            instance: Arc::clone(instance),
            handle,
            _window: window,
        })
    }

    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// # Safety
    /// `physical_device` must come from the same instance.
    pub unsafe fn supports_present(
        &self,
        physical_device: vk::PhysicalDevice,
        family: u32,
    ) -> GpuResult<bool> {
        // SAFETY: caller guarantees provenance; the surface is live.
        unsafe {
            self.instance
                .surface_loader()
                .get_physical_device_surface_support(physical_device, family, self.handle)
        }
        .vk_op("vkGetPhysicalDeviceSurfaceSupportKHR")
    }

    /// # Safety
    /// `physical_device` must come from the same instance.
    pub unsafe fn support(&self, physical_device: vk::PhysicalDevice) -> GpuResult<SurfaceSupport> {
        let loader = self.instance.surface_loader();
        // SAFETY: caller guarantees provenance; the surface is live.
        let capabilities = unsafe {
            loader.get_physical_device_surface_capabilities(physical_device, self.handle)
        }
        .vk_op("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")?;
        // SAFETY: as above.
        let formats =
            unsafe { loader.get_physical_device_surface_formats(physical_device, self.handle) }
                .vk_op("vkGetPhysicalDeviceSurfaceFormatsKHR")?;
        // SAFETY: as above.
        let present_modes = unsafe {
            loader.get_physical_device_surface_present_modes(physical_device, self.handle)
        }
        .vk_op("vkGetPhysicalDeviceSurfacePresentModesKHR")?;

        Ok(SurfaceSupport {
            capabilities,
            formats,
            present_modes,
        })
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        log::debug!("destroying surface {:?}", self.handle);
        // SAFETY: the swapchain built on this surface belongs to the device,
        // which owns this surface and is destroyed before it.
        unsafe { self.instance.surface_loader().destroy_surface(self.handle, None) };
    }
}
