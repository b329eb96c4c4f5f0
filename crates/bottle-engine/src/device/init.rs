use std::time::Duration;

use ash::vk;

/// Minimum severity forwarded from the validation layer to the logger.
///
/// Ordered least to most severe.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub enum ValidationLevel {
    Verbose,
    Info,
    Warning,
    Error,
}

/// Initialization parameters for the GPU layer.
///
/// Keep this structure small. Every field has a default that draws the triangle
/// on any conformant desktop driver.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Application name reported in `VkApplicationInfo`.
    pub app_name: String,

    /// Validation layer and debug messenger.
    ///
    /// `None` disables both. When a level is requested but the layer or the
    /// debug-utils extension is not installed, bring-up continues without them.
    pub validation: Option<ValidationLevel>,

    /// Fail bring-up instead of continuing when the requested validation layer
    /// is not installed.
    pub require_validation: bool,

    /// Number of frames the CPU may record ahead of the GPU.
    pub frames_in_flight: usize,

    /// Swapchain extent used when the surface leaves the choice to the application.
    pub default_extent: vk::Extent2D,

    /// Reject physical devices without geometry shader support.
    pub require_geometry_shader: bool,

    /// Upper bound for the per-slot fence wait. `None` waits forever.
    pub fence_timeout: Option<Duration>,

    /// Upper bound for swapchain image acquisition. `None` waits forever.
    pub acquire_timeout: Option<Duration>,

    /// Color the single attachment is cleared to each frame.
    pub clear_color: [f32; 4],
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            app_name: "bottle".to_string(),
            validation: cfg!(debug_assertions).then_some(ValidationLevel::Warning),
            require_validation: false,
            frames_in_flight: 2,
            default_extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            require_geometry_shader: true,
            fence_timeout: Some(Duration::from_secs(2)),
            acquire_timeout: Some(Duration::from_secs(2)),
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Converts an optional wait bound into the nanosecond form Vulkan expects.
pub fn timeout_ns(timeout: Option<Duration>) -> u64 {
    match timeout {
        Some(d) => u64::try_from(d.as_nanos()).unwrap_or(u64::MAX),
        None => u64::MAX,
    }
}
