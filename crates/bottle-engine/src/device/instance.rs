use std::ffi::{CStr, CString, c_char, c_void};

use ash::vk;
use raw_window_handle::RawDisplayHandle;

use super::error::{GpuError, GpuResult, VkResultExt};
use super::init::{GpuInit, ValidationLevel};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";
const ENGINE_NAME: &CStr = c"Bottle Graphics Engine";

/// Owns the Vulkan loader, the instance and the optional debug messenger.
///
/// Shared through `Arc` by the surface and the logical device so it is always
/// destroyed last.
pub struct Instance {
    entry: ash::Entry,
    handle: ash::Instance,
    debug: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    surface_loader: ash::khr::surface::Instance,
    portability: bool,
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("handle", &self.handle.handle())
            .field("validation", &self.debug.is_some())
            .finish_non_exhaustive()
    }
}

impl Instance {
    /// Loads Vulkan and creates an instance able to present to `display`.
    pub fn new(display: RawDisplayHandle, init: &GpuInit) -> GpuResult<Self> {
        // SAFETY: loading the system Vulkan library runs its initialisers; the
        // entry outlives every object created from it (dropped with `self`).
        let entry = unsafe { ash::Entry::load() }.map_err(|e| GpuError::Loading(e.to_string()))?;

        let surface_exts = ash_window::enumerate_required_extensions(display)
            .vk_op("vkEnumerateInstanceExtensionProperties")?;
        let mandatory: Vec<&CStr> = surface_exts
            .iter()
            // SAFETY: ash-window hands out static nul-terminated extension names.
            .map(|&ptr| unsafe { CStr::from_ptr(ptr) })
            .collect();

        // SAFETY: `None` queries the implementation's own extensions.
        let available_exts = unsafe { entry.enumerate_instance_extension_properties(None) }
            .vk_op("vkEnumerateInstanceExtensionProperties")?;
        // SAFETY: no preconditions beyond a loaded entry.
        let available_layers = unsafe { entry.enumerate_instance_layer_properties() }
            .vk_op("vkEnumerateInstanceLayerProperties")?;

        let has_ext = |name: &CStr| {
            available_exts
                .iter()
                .any(|p| p.extension_name_as_c_str() == Ok(name))
        };

        let missing: Vec<String> = mandatory
            .iter()
            .filter(|name| !has_ext(name))
            .map(|name| name.to_string_lossy().into_owned())
            .collect();
        if !missing.is_empty() {
            return Err(GpuError::MissingExtensions(missing));
        }

        let mut ext_ptrs: Vec<*const c_char> = mandatory.iter().map(|n| n.as_ptr()).collect();
        let mut layer_ptrs: Vec<*const c_char> = Vec::new();

        let portability = has_ext(ash::khr::portability_enumeration::NAME);
        if portability {
            ext_ptrs.push(ash::khr::portability_enumeration::NAME.as_ptr());
        }

        let validation = match init.validation {
            Some(level) => {
                let layer_present = available_layers
                    .iter()
                    .any(|l| l.layer_name_as_c_str() == Ok(VALIDATION_LAYER));
                let debug_utils = has_ext(ash::ext::debug_utils::NAME);
                if layer_present && debug_utils {
                    ext_ptrs.push(ash::ext::debug_utils::NAME.as_ptr());
                    layer_ptrs.push(VALIDATION_LAYER.as_ptr());
                    Some(level)
                } else if init.require_validation {
                    return Err(GpuError::MissingLayer(
                        VALIDATION_LAYER.to_string_lossy().into_owned(),
                    ));
                } else {
                    log::warn!("validation requested but not available; continuing without it");
                    None
                }
            }
            None => None,
        };

        let app_name = CString::new(init.app_name.replace('\0', "")).unwrap_or_default();
        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(ENGINE_NAME)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let flags = if portability {
            vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR
        } else {
            vk::InstanceCreateFlags::empty()
        };

        let mut messenger_info = validation.map(messenger_create_info);

        let mut create_info = vk::InstanceCreateInfo::default()
            .flags(flags)
            .application_info(&app_info)
            .enabled_extension_names(&ext_ptrs)
            .enabled_layer_names(&layer_ptrs);
        if let Some(info) = messenger_info.as_mut() {
            // Chained so instance creation and destruction are covered too.
            create_info = create_info.push_next(info);
        }

        // SAFETY: every pointer in `create_info` borrows locals alive for the call.
        let handle = unsafe { entry.create_instance(&create_info, None) }
            .vk_op("vkCreateInstance")?;

        let debug = match validation {
            Some(level) => {
                let loader = ash::ext::debug_utils::Instance::new(&entry, &handle);
                let info = messenger_create_info(level);
                // SAFETY: `info` is self-contained and the instance is live.
                match unsafe { loader.create_debug_utils_messenger(&info, None) } {
                    Ok(messenger) => Some((loader, messenger)),
                    Err(result) => {
                        log::warn!("vkCreateDebugUtilsMessengerEXT failed: {result}");
                        None
                    }
                }
            }
            None => None,
        };

        let surface_loader = ash::khr::surface::Instance::new(&entry, &handle);

        log::info!(
            "vulkan instance created (validation: {}, portability: {portability})",
            debug.is_some()
        );

        Ok(Self {
            entry,
            handle,
            debug,
            surface_loader,
            portability,
        })
    }

    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    pub fn handle(&self) -> &ash::Instance {
        &self.handle
    }

    pub fn surface_loader(&self) -> &ash::khr::surface::Instance {
        &self.surface_loader
    }

    /// Whether devices may be portability (non-conformant) implementations.
    pub fn portability(&self) -> bool {
        self.portability
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        log::debug!("destroying instance {:?}", self.handle.handle());
        if let Some((loader, messenger)) = self.debug.take() {
            // SAFETY: the messenger was created from this instance and is not used again.
            unsafe { loader.destroy_debug_utils_messenger(messenger, None) };
        }
        // SAFETY: surface and device hold an `Arc<Instance>`, so both are gone.
        unsafe { self.handle.destroy_instance(None) };
    }
}

fn messenger_create_info(level: ValidationLevel) -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(severity_mask(level))
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback))
}

fn severity_mask(level: ValidationLevel) -> vk::DebugUtilsMessageSeverityFlagsEXT {
    use vk::DebugUtilsMessageSeverityFlagsEXT as S;
    match level {
        ValidationLevel::Verbose => S::VERBOSE | S::INFO | S::WARNING | S::ERROR,
        ValidationLevel::Info => S::INFO | S::WARNING | S::ERROR,
        ValidationLevel::Warning => S::WARNING | S::ERROR,
        ValidationLevel::Error => S::ERROR,
    }
}

fn log_level(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> log::Level {
    use vk::DebugUtilsMessageSeverityFlagsEXT as S;
    if severity.contains(S::ERROR) {
        log::Level::Error
    } else if severity.contains(S::WARNING) {
        log::Level::Warn
    } else if severity.contains(S::INFO) {
        log::Level::Info
    } else {
        log::Level::Trace
    }
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    kind: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    // SAFETY: the loader passes valid callback data for the duration of the call.
    let message = unsafe { data.as_ref() }
        .filter(|d| !d.p_message.is_null())
        // SAFETY: `p_message` is a nul-terminated string owned by the loader.
        .map(|d| unsafe { CStr::from_ptr(d.p_message) }.to_string_lossy())
        .unwrap_or_default();

    log::log!(target: "vulkan", log_level(severity), "[{kind:?}] {message}");
    vk::FALSE
}
