use ash::vk;

use crate::device::{
    DeviceApi, GpuError, GpuInit, GpuResult, GraphicsContext, SurfacePresentationChain, VkResultExt,
    timeout_ns,
};
use crate::render::{CommandBufferPool, DrawCommand, FrameSyncSet, FramebufferSet};

/// Borrowed view of everything one frame touches.
pub struct FrameResources<'a, D: DeviceApi> {
    pub context: &'a GraphicsContext<D>,
    pub swapchain: &'a SurfacePresentationChain<D>,
    pub render_pass: vk::RenderPass,
    pub pipeline: vk::Pipeline,
    pub framebuffers: &'a FramebufferSet<D>,
    pub commands: &'a CommandBufferPool<D>,
    pub sync: &'a FrameSyncSet<D>,
}

/// What happened to one iteration of the frame loop.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrameOutcome {
    Presented {
        frame: u64,
        slot: usize,
        image_index: u32,
        /// Acquire or present reported `SUBOPTIMAL_KHR`.
        suboptimal: bool,
    },
    /// The acquired index had no framebuffer; nothing was drawn.
    Skipped {
        frame: u64,
        slot: usize,
        image_index: u32,
    },
}

impl FrameOutcome {
    pub fn frame(&self) -> u64 {
        match *self {
            FrameOutcome::Presented { frame, .. } | FrameOutcome::Skipped { frame, .. } => frame,
        }
    }

    pub fn slot(&self) -> usize {
        match *self {
            FrameOutcome::Presented { slot, .. } | FrameOutcome::Skipped { slot, .. } => slot,
        }
    }
}

/// Drives the per-slot wait / acquire / record / submit / present sequence.
///
/// Slot `i` is only reused after its fence confirmed the previous submission,
/// so at most `sync.len()` frames are queued on the GPU.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    slot: usize,
    frame: u64,
    fence_timeout_ns: u64,
    acquire_timeout_ns: u64,
    clear_color: [f32; 4],
}

impl FrameScheduler {
    pub fn new(init: &GpuInit) -> Self {
        Self {
            slot: 0,
            frame: 0,
            fence_timeout_ns: timeout_ns(init.fence_timeout),
            acquire_timeout_ns: timeout_ns(init.acquire_timeout),
            clear_color: init.clear_color,
        }
    }

    /// Slot the next call to [`FrameScheduler::draw_frame`] will use.
    pub fn current_slot(&self) -> usize {
        self.slot
    }

    /// Frames started so far, presented or skipped.
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    pub fn draw_frame<D: DeviceApi>(&mut self, res: &FrameResources<'_, D>) -> GpuResult<FrameOutcome> {
        let slots = res.sync.len();
        if slots == 0 || slots != res.commands.len() {
            return Err(GpuError::SlotMismatch {
                sync: slots,
                commands: res.commands.len(),
            });
        }

        let device = res.context.device();
        let slot = self.slot % slots;
        let frame = self.frame;
        let sync = res.sync.slot(slot);

        // SAFETY: the fence belongs to this device and outlives the call.
        unsafe {
            device
                .wait_for_fence(sync.in_flight, self.fence_timeout_ns)
                .vk_op("vkWaitForFences")?;
            device
                .reset_fence(sync.in_flight)
                .vk_op("vkResetFences")?;
        }

        // SAFETY: the semaphore is unsignaled: its previous signal was consumed
        // by the submission this slot's fence just confirmed.
        let acquired = unsafe {
            device.acquire_next_image(
                res.swapchain.handle(),
                self.acquire_timeout_ns,
                sync.image_available,
            )
        }
        .vk_op("vkAcquireNextImageKHR");

        let (image_index, acquire_suboptimal) = match acquired {
            Ok(acquired) => acquired,
            Err(e) => {
                // Nothing signals the reset fence otherwise; the next wait on
                // this slot would never return.
                // SAFETY: an empty batch borrows nothing.
                let resignal = unsafe {
                    device.queue_submit(
                        res.context.graphics_queue(),
                        &[vk::SubmitInfo::default()],
                        sync.in_flight,
                    )
                };
                if let Err(result) = resignal {
                    log::error!("could not re-signal fence of slot {slot}: {result}");
                }
                return Err(e);
            }
        };

        self.frame += 1;
        self.slot = (slot + 1) % slots;

        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let wait = [sync.image_available];

        let Some(framebuffer) = res.framebuffers.get(image_index as usize) else {
            log::warn!(
                "acquired image {image_index} has no framebuffer ({} available), skipping frame {frame}",
                res.framebuffers.len()
            );
            // Consume the acquire signal and re-signal the fence so the slot
            // stays usable.
            let submit = vk::SubmitInfo::default()
                .wait_semaphores(&wait)
                .wait_dst_stage_mask(&wait_stages);
            // SAFETY: arrays borrowed by `submit` are locals alive for the call.
            unsafe {
                device.queue_submit(
                    res.context.graphics_queue(),
                    std::slice::from_ref(&submit),
                    sync.in_flight,
                )
            }
            .vk_op("vkQueueSubmit")?;
            return Ok(FrameOutcome::Skipped {
                frame,
                slot,
                image_index,
            });
        };

        let cmd = res.commands.record_triangle(
            slot,
            &DrawCommand {
                render_pass: res.render_pass,
                framebuffer,
                pipeline: res.pipeline,
                extent: res.framebuffers.extent(),
                clear_color: self.clear_color,
            },
        )?;

        let cmds = [cmd];
        let signal = [sync.render_finished];
        let submit = vk::SubmitInfo::default()
            .wait_semaphores(&wait)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&cmds)
            .signal_semaphores(&signal);
        // SAFETY: `cmd` finished recording; arrays are locals alive for the call.
        unsafe {
            device.queue_submit(
                res.context.graphics_queue(),
                std::slice::from_ref(&submit),
                sync.in_flight,
            )
        }
        .vk_op("vkQueueSubmit")?;

        let swapchains = [res.swapchain.handle()];
        let indices = [image_index];
        let present = vk::PresentInfoKHR::default()
            .wait_semaphores(&signal)
            .swapchains(&swapchains)
            .image_indices(&indices);
        // SAFETY: the image was acquired this frame and its render is queued
        // ahead of the wait semaphore.
        let present_suboptimal =
            unsafe { device.queue_present(res.context.present_queue(), &present) }
                .vk_op("vkQueuePresentKHR")?;

        log::trace!("frame {frame} presented image {image_index} from slot {slot}");

        Ok(FrameOutcome::Presented {
            frame,
            slot,
            image_index,
            suboptimal: acquire_suboptimal || present_suboptimal,
        })
    }
}
