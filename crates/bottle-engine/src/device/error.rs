use ash::vk;
use thiserror::Error;

/// Errors raised by device bring-up and by the per-frame submission path.
///
/// Every failing Vulkan call is reported with the entry point name and the raw
/// `VkResult` code so console diagnostics are enough to locate the failure.
#[derive(Debug, Error)]
pub enum GpuError {
    #[error("{op} failed: {result} (VkResult {code})", code = result.as_raw())]
    Vulkan { op: &'static str, result: vk::Result },

    #[error("{op} timed out")]
    Timeout { op: &'static str },

    #[error("{op} reported the surface as out of date")]
    SurfaceOutOfDate { op: &'static str },

    #[error("could not load the Vulkan library: {0}")]
    Loading(String),

    #[error("missing mandatory instance extensions: {0:?}")]
    MissingExtensions(Vec<String>),

    #[error("validation requested but layer {0} is not installed")]
    MissingLayer(String),

    #[error("no suitable device")]
    NoSuitableDevice,

    #[error("window handle unavailable: {0}")]
    WindowHandle(#[from] raw_window_handle::HandleError),

    #[error("surface reports no supported formats")]
    NoSurfaceFormats,

    #[error("surface reports no supported present modes")]
    NoPresentModes,

    #[error("frame slots disagree: {sync} sync sets, {commands} command buffers")]
    SlotMismatch { sync: usize, commands: usize },
}

impl GpuError {
    /// Classifies a failed Vulkan call.
    ///
    /// `TIMEOUT`/`NOT_READY` become [`GpuError::Timeout`] and `ERROR_OUT_OF_DATE_KHR`
    /// becomes [`GpuError::SurfaceOutOfDate`]; everything else keeps the raw code.
    pub fn from_vk(op: &'static str, result: vk::Result) -> Self {
        match result {
            vk::Result::TIMEOUT | vk::Result::NOT_READY => GpuError::Timeout { op },
            vk::Result::ERROR_OUT_OF_DATE_KHR => GpuError::SurfaceOutOfDate { op },
            result => GpuError::Vulkan { op, result },
        }
    }

    /// Returns `true` for the bounded-wait failure kind.
    pub fn is_timeout(&self) -> bool {
        matches!(self, GpuError::Timeout { .. })
    }
}

pub type GpuResult<T> = Result<T, GpuError>;

/// Attaches the Vulkan entry point name to a raw `VkResult` failure.
pub trait VkResultExt<T> {
    fn vk_op(self, op: &'static str) -> GpuResult<T>;
}

impl<T> VkResultExt<T> for Result<T, vk::Result> {
    fn vk_op(self, op: &'static str) -> GpuResult<T> {
        self.map_err(|result| GpuError::from_vk(op, result))
    }
}
