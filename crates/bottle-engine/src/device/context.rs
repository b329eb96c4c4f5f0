use std::sync::Arc;

use anyhow::{Context, Result};
use ash::vk;
use raw_window_handle::HasDisplayHandle;
use winit::window::Window;

use super::error::{GpuError, VkResultExt};
use super::init::GpuInit;
use super::instance::Instance;
use super::physical::{self, QueueFamilies};
use super::surface::{Surface, SurfaceSupport};
use super::vulkan::VulkanDevice;

/// Device-level state shared by every GPU object of the process.
///
/// This is an explicitly passed value. Each dependent wrapper clones the
/// `Arc<D>`, so dropping the context early never destroys the device.
#[derive(Debug)]
pub struct GraphicsContext<D> {
    device: Arc<D>,
    physical_device: vk::PhysicalDevice,
    queue_families: QueueFamilies,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    surface: vk::SurfaceKHR,
}

impl<D> GraphicsContext<D> {
    pub fn new(
        device: Arc<D>,
        physical_device: vk::PhysicalDevice,
        queue_families: QueueFamilies,
        graphics_queue: vk::Queue,
        present_queue: vk::Queue,
        surface: vk::SurfaceKHR,
    ) -> Self {
        Self {
            device,
            physical_device,
            queue_families,
            graphics_queue,
            present_queue,
            surface,
        }
    }

    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn queue_families(&self) -> QueueFamilies {
        self.queue_families
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }
}

impl GraphicsContext<VulkanDevice> {
    /// Runs instance, surface, physical device and logical device creation in order.
    ///
    /// Returns the context together with the surface support of the selected
    /// device, which feeds swapchain negotiation. Any failure releases what was
    /// already created.
    pub fn bring_up(window: Arc<Window>, init: &GpuInit) -> Result<(Self, SurfaceSupport)> {
        let display = window
            .display_handle()
            .map_err(GpuError::from)
            .context("failed to get display handle")?
            .as_raw();

        let instance = Arc::new(
            Instance::new(display, init).context("failed to create vulkan instance")?,
        );
        let surface =
            Surface::new(&instance, window).context("failed to create window surface")?;

        // SAFETY: the instance is live.
        let physical_devices = unsafe { instance.handle().enumerate_physical_devices() }
            .vk_op("vkEnumeratePhysicalDevices")
            .context("failed to enumerate physical devices")?;

        let mut candidates = Vec::with_capacity(physical_devices.len());
        for pd in physical_devices {
            // SAFETY: `pd` was enumerated from `instance`, which created `surface`.
            match unsafe { physical::probe(&instance, &surface, pd) } {
                Ok(candidate) => {
                    log::debug!(
                        "candidate {}: geometry shader {}, swapchain {}, families {:?}",
                        candidate.name,
                        candidate.geometry_shader,
                        candidate.swapchain,
                        candidate.families
                    );
                    candidates.push(candidate);
                }
                Err(e) => log::debug!("skipping physical device {pd:?}: {e}"),
            }
        }

        let chosen = physical::pick_physical_device(&candidates, init.require_geometry_shader)
            .ok_or(GpuError::NoSuitableDevice)
            .context("failed to select a physical device")?;
        let families = chosen.families.ok_or(GpuError::NoSuitableDevice)?;

        log::info!("selected physical device: {}", chosen.name);

        let device = VulkanDevice::new(Arc::clone(&instance), surface, chosen, families)
            .context("failed to create logical device")?;

        let graphics_queue = device.queue(families.graphics);
        let present_queue = device.queue(families.present);
        let physical_device = device.physical_device();
        let surface = device.surface().handle();
        let support = chosen.surface.clone();

        Ok((
            Self::new(
                Arc::new(device),
                physical_device,
                families,
                graphics_queue,
                present_queue,
                surface,
            ),
            support,
        ))
    }
}
