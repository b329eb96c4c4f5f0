use std::ffi::CStr;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ash::vk;
use thiserror::Error;

use crate::device::{DeviceApi, GpuError, VkResultExt};

/// Entry point every shader module is expected to export.
pub const ENTRY_POINT: &CStr = c"main";

/// Pipeline stage a module is bound to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Geometry,
    Compute,
}

impl ShaderStage {
    pub fn flags(self) -> vk::ShaderStageFlags {
        match self {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
            ShaderStage::Geometry => vk::ShaderStageFlags::GEOMETRY,
            ShaderStage::Compute => vk::ShaderStageFlags::COMPUTE,
        }
    }
}

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("shader path is empty")]
    EmptyPath,

    #[error("{}: not a .spv file", path.display())]
    WrongExtension { path: PathBuf },

    #[error("{}: file not found", path.display())]
    NotFound { path: PathBuf },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: code is empty", path.display())]
    EmptyCode { path: PathBuf },

    #[error("{}: invalid SPIR-V: {reason}", path.display())]
    InvalidSpirv { path: PathBuf, reason: String },

    #[error(transparent)]
    Gpu(#[from] GpuError),
}

/// A SPIR-V module loaded from disk.
///
/// The module is destroyed by [`Shader::cleanup`] or on drop, whichever comes
/// first.
pub struct Shader<D: DeviceApi> {
    device: Arc<D>,
    module: vk::ShaderModule,
    stage: ShaderStage,
    path: PathBuf,
    code_len: usize,
}

impl<D: DeviceApi> std::fmt::Debug for Shader<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shader")
            .field("module", &self.module)
            .field("stage", &self.stage)
            .field("path", &self.path)
            .field("code_len", &self.code_len)
            .finish_non_exhaustive()
    }
}

impl<D: DeviceApi> Shader<D> {
    /// Reads `path` verbatim and creates a shader module from it.
    ///
    /// The path is validated before the file is touched: it must be non-empty
    /// and end in `.spv`.
    pub fn load(
        device: &Arc<D>,
        path: impl AsRef<Path>,
        stage: ShaderStage,
    ) -> Result<Self, ShaderError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(ShaderError::EmptyPath);
        }
        if path.extension().is_none_or(|ext| ext != "spv") {
            return Err(ShaderError::WrongExtension {
                path: path.to_path_buf(),
            });
        }

        let bytes = std::fs::read(path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ShaderError::NotFound {
                path: path.to_path_buf(),
            },
            _ => ShaderError::Io {
                path: path.to_path_buf(),
                source,
            },
        })?;

        if bytes.is_empty() {
            return Err(ShaderError::EmptyCode {
                path: path.to_path_buf(),
            });
        }

        let words = ash::util::read_spv(&mut Cursor::new(&bytes)).map_err(|e| {
            ShaderError::InvalidSpirv {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        let info = vk::ShaderModuleCreateInfo::default().code(&words);
        // SAFETY: `words` is aligned SPIR-V and lives across the call.
        let module = unsafe { device.create_raw_shader_module(&info) }
            .vk_op("vkCreateShaderModule")?;

        log::debug!(
            "loaded {:?} shader {} ({} bytes)",
            stage,
            path.display(),
            bytes.len()
        );

        Ok(Self {
            device: Arc::clone(device),
            module,
            stage,
            path: path.to_path_buf(),
            code_len: bytes.len(),
        })
    }

    pub fn module(&self) -> vk::ShaderModule {
        self.module
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Byte length of the loaded binary.
    pub fn code_len(&self) -> usize {
        self.code_len
    }

    /// Destroys the module. Calling it again is a no-op.
    pub fn cleanup(&mut self) {
        if self.module != vk::ShaderModule::null() {
            // SAFETY: the module was created by this device and is nulled
            // right after, so it is destroyed exactly once.
            unsafe { self.device.destroy_raw_shader_module(self.module) };
            self.module = vk::ShaderModule::null();
        }
    }
}

impl<D: DeviceApi> Drop for Shader<D> {
    fn drop(&mut self) {
        self.cleanup();
    }
}
