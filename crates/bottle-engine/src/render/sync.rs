use std::sync::Arc;

use ash::vk;

use crate::device::{DeviceApi, GpuResult, VkResultExt};

/// Sync objects of one frame-in-flight slot.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SlotSync {
    pub in_flight: vk::Fence,
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
}

/// One fence and two semaphores per frame-in-flight slot.
///
/// Fences start signaled so the first wait of every slot returns at once.
pub struct FrameSyncSet<D: DeviceApi> {
    device: Arc<D>,
    fences: Vec<vk::Fence>,
    image_available: Vec<vk::Semaphore>,
    render_finished: Vec<vk::Semaphore>,
}

impl<D: DeviceApi> std::fmt::Debug for FrameSyncSet<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSyncSet")
            .field("fences", &self.fences)
            .field("image_available", &self.image_available)
            .field("render_finished", &self.render_finished)
            .finish_non_exhaustive()
    }
}

impl<D: DeviceApi> FrameSyncSet<D> {
    pub fn new(device: &Arc<D>, slots: usize) -> GpuResult<Self> {
        let mut set = Self {
            device: Arc::clone(device),
            fences: Vec::with_capacity(slots),
            image_available: Vec::with_capacity(slots),
            render_finished: Vec::with_capacity(slots),
        };

        let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
        let semaphore_info = vk::SemaphoreCreateInfo::default();
        for _ in 0..slots {
            // SAFETY: plain create infos; each handle is pushed right away so
            // Drop releases it if a later create fails.
            unsafe {
                set.fences
                    .push(device.create_raw_fence(&fence_info).vk_op("vkCreateFence")?);
                set.image_available.push(
                    device
                        .create_raw_semaphore(&semaphore_info)
                        .vk_op("vkCreateSemaphore")?,
                );
                set.render_finished.push(
                    device
                        .create_raw_semaphore(&semaphore_info)
                        .vk_op("vkCreateSemaphore")?,
                );
            }
        }

        log::debug!("sync objects created for {slots} frames in flight");
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.fences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fences.is_empty()
    }

    /// # Panics
    /// If `slot` is out of range.
    pub fn slot(&self, slot: usize) -> SlotSync {
        SlotSync {
            in_flight: self.fences[slot],
            image_available: self.image_available[slot],
            render_finished: self.render_finished[slot],
        }
    }

    pub fn fences(&self) -> &[vk::Fence] {
        &self.fences
    }
}

impl<D: DeviceApi> Drop for FrameSyncSet<D> {
    fn drop(&mut self) {
        log::debug!("destroying {} frame sync slots", self.fences.len());
        // SAFETY: the device is idle, so no fence or semaphore is pending.
        unsafe {
            for semaphore in self.render_finished.drain(..) {
                self.device.destroy_raw_semaphore(semaphore);
            }
            for semaphore in self.image_available.drain(..) {
                self.device.destroy_raw_semaphore(semaphore);
            }
            for fence in self.fences.drain(..) {
                self.device.destroy_raw_fence(fence);
            }
        }
    }
}
