use ash::vk;

use super::error::{GpuResult, VkResultExt};
use super::instance::Instance;
use super::surface::{Surface, SurfaceSupport};

/// Queue family indices used for rendering and presentation.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    /// Both roles are served by one family.
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Distinct family indices, graphics first. One queue is created per entry.
    pub fn unique(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// Picks the graphics family and a present-capable family.
///
/// Graphics is the first family with `GRAPHICS`. It doubles as the present
/// family when it can present; otherwise the first present-capable family wins.
pub fn select_queue_families(
    families: &[vk::QueueFamilyProperties],
    mut can_present: impl FnMut(u32) -> bool,
) -> Option<QueueFamilies> {
    let graphics = families
        .iter()
        .position(|f| f.queue_count > 0 && f.queue_flags.contains(vk::QueueFlags::GRAPHICS))?
        as u32;

    let present = if can_present(graphics) {
        graphics
    } else {
        (0..families.len() as u32)
            .filter(|&i| families[i as usize].queue_count > 0)
            .find(|&i| can_present(i))?
    };

    Some(QueueFamilies { graphics, present })
}

/// What bring-up learned about one physical device.
#[derive(Debug, Clone)]
pub struct DeviceCandidate {
    pub handle: vk::PhysicalDevice,
    pub name: String,
    pub geometry_shader: bool,
    pub swapchain: bool,
    pub portability_subset: bool,
    pub families: Option<QueueFamilies>,
    pub surface: SurfaceSupport,
}

impl DeviceCandidate {
    pub fn is_suitable(&self, require_geometry_shader: bool) -> bool {
        (self.geometry_shader || !require_geometry_shader)
            && self.swapchain
            && self.families.is_some()
            && self.surface.is_adequate()
    }
}

/// First suitable device in enumeration order. No scoring.
pub fn pick_physical_device(
    candidates: &[DeviceCandidate],
    require_geometry_shader: bool,
) -> Option<&DeviceCandidate> {
    candidates
        .iter()
        .find(|c| c.is_suitable(require_geometry_shader))
}

/// Queries features, extensions, queue families and surface support of `device`.
///
/// # Safety
/// `device` must be enumerated from `instance`, which also created `surface`.
pub unsafe fn probe(
    instance: &Instance,
    surface: &Surface,
    device: vk::PhysicalDevice,
) -> GpuResult<DeviceCandidate> {
    let raw = instance.handle();
    // SAFETY: caller guarantees `device` belongs to this instance.
    let props = unsafe { raw.get_physical_device_properties(device) };
    // SAFETY: as above.
    let features = unsafe { raw.get_physical_device_features(device) };
    // SAFETY: as above.
    let families = unsafe { raw.get_physical_device_queue_family_properties(device) };
    // SAFETY: as above.
    let extensions = unsafe { raw.enumerate_device_extension_properties(device) }
        .vk_op("vkEnumerateDeviceExtensionProperties")?;

    let has_ext = |name: &std::ffi::CStr| {
        extensions
            .iter()
            .any(|e| e.extension_name_as_c_str() == Ok(name))
    };

    let name = props
        .device_name_as_c_str()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());

    let families = select_queue_families(&families, |family| {
        // SAFETY: same instance for device and surface.
        match unsafe { surface.supports_present(device, family) } {
            Ok(supported) => supported,
            Err(e) => {
                log::debug!("{name}: present query for family {family} failed: {e}");
                false
            }
        }
    });

    // SAFETY: same instance for device and surface.
    let surface = unsafe { surface.support(device) }?;

    Ok(DeviceCandidate {
        handle: device,
        geometry_shader: features.geometry_shader == vk::TRUE,
        swapchain: has_ext(ash::khr::swapchain::NAME),
        portability_subset: has_ext(ash::khr::portability_subset::NAME),
        families,
        surface,
        name,
    })
}
