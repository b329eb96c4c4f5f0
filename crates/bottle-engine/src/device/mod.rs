//! GPU device + surface management.
//!
//! This module is responsible for:
//! - creating the Vulkan instance, debug messenger and window surface
//! - selecting the physical device and queue families
//! - creating the logical device and its queues
//! - negotiating and creating the swapchain and its image views
//!
//! Components above this layer talk to the device only through [`DeviceApi`].

mod api;
mod context;
mod error;
mod init;
mod instance;
mod physical;
mod surface;
mod swapchain;
mod vulkan;

#[cfg(test)]
pub(crate) mod mock;

pub use api::DeviceApi;
pub use context::GraphicsContext;
pub use error::{GpuError, GpuResult, VkResultExt};
pub use init::{GpuInit, ValidationLevel, timeout_ns};
pub use instance::Instance;
pub use physical::{DeviceCandidate, QueueFamilies, pick_physical_device, select_queue_families};
pub use surface::{Surface, SurfaceSupport};
pub use swapchain::{
    SurfacePresentationChain, SwapchainPlan, choose_composite_alpha, choose_extent,
    choose_image_count, choose_present_mode, choose_sharing, choose_surface_format,
};
pub use vulkan::VulkanDevice;
