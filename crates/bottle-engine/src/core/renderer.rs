use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::device::{
    DeviceApi, GpuInit, GpuResult, GraphicsContext, SurfacePresentationChain, SurfaceSupport,
    VkResultExt, VulkanDevice,
};
use crate::event::{Event, EventBus};
use crate::frame::{FrameOutcome, FrameResources, FrameScheduler};
use crate::render::{
    CommandBufferPool, FrameSyncSet, FramebufferSet, GraphicsPipeline, PipelineOverrides,
    RenderPass, Shader, ShaderStage,
};
use crate::time::{FpsCounter, FrameClock};
use crate::window::{EventPump, PlatformWindow};

/// Paths of the two SPIR-V binaries the triangle pipeline is built from.
#[derive(Debug, Clone)]
pub struct ShaderSet {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

impl ShaderSet {
    /// `vert.spv` and `frag.spv` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            vertex: dir.join("vert.spv"),
            fragment: dir.join("frag.spv"),
        }
    }
}

/// Frames handled by one [`Renderer::run`].
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct RunSummary {
    pub presented: u64,
    pub skipped: u64,
}

/// The triangle renderer: every GPU object after device bring-up plus the
/// frame scheduler that drives them.
pub struct Renderer<D: DeviceApi> {
    scheduler: FrameScheduler,
    // Dependents first: fields drop in declaration order.
    sync: FrameSyncSet<D>,
    commands: CommandBufferPool<D>,
    pipeline: GraphicsPipeline<D>,
    framebuffers: FramebufferSet<D>,
    render_pass: RenderPass<D>,
    swapchain: SurfacePresentationChain<D>,
    context: GraphicsContext<D>,
    idle: bool,
}

impl<D: DeviceApi> Renderer<D> {
    /// Builds swapchain, render pass, framebuffers, pipeline, command buffers
    /// and sync objects, in that order.
    pub fn new(
        context: GraphicsContext<D>,
        support: &SurfaceSupport,
        init: &GpuInit,
        shaders: &ShaderSet,
    ) -> Result<Self> {
        let device = Arc::clone(context.device());

        let swapchain = SurfacePresentationChain::new(&context, support, init.default_extent)
            .context("failed to create swapchain")?;

        let render_pass =
            RenderPass::new(&device, swapchain.format()).context("failed to create render pass")?;

        let framebuffers = FramebufferSet::new(
            &device,
            &render_pass,
            swapchain.image_views(),
            swapchain.extent(),
        )
        .context("failed to create framebuffers")?;

        let modules = vec![
            Shader::load(&device, &shaders.vertex, ShaderStage::Vertex)
                .context("failed to load vertex shader")?,
            Shader::load(&device, &shaders.fragment, ShaderStage::Fragment)
                .context("failed to load fragment shader")?,
        ];

        let pipeline = GraphicsPipeline::new(
            &device,
            modules,
            &render_pass,
            swapchain.extent(),
            PipelineOverrides::default(),
        )
        .context("failed to create graphics pipeline")?;

        let slots = init.frames_in_flight.max(1);
        let commands = CommandBufferPool::new(&device, context.queue_families().graphics, slots)
            .context("failed to allocate command buffers")?;
        let sync = FrameSyncSet::new(&device, slots).context("failed to create sync objects")?;

        log::info!("renderer ready: {slots} frames in flight");

        Ok(Self {
            scheduler: FrameScheduler::new(init),
            sync,
            commands,
            pipeline,
            framebuffers,
            render_pass,
            swapchain,
            context,
            idle: true,
        })
    }

    pub fn context(&self) -> &GraphicsContext<D> {
        &self.context
    }

    pub fn swapchain(&self) -> &SurfacePresentationChain<D> {
        &self.swapchain
    }

    pub fn pipeline(&self) -> &GraphicsPipeline<D> {
        &self.pipeline
    }

    pub fn framebuffers(&self) -> &FramebufferSet<D> {
        &self.framebuffers
    }

    pub fn sync(&self) -> &FrameSyncSet<D> {
        &self.sync
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    /// Runs one iteration of the frame loop.
    pub fn draw_frame(&mut self) -> GpuResult<FrameOutcome> {
        self.idle = false;
        self.scheduler.draw_frame(&FrameResources {
            context: &self.context,
            swapchain: &self.swapchain,
            render_pass: self.render_pass.handle(),
            pipeline: self.pipeline.handle(),
            framebuffers: &self.framebuffers,
            commands: &self.commands,
            sync: &self.sync,
        })
    }

    /// Blocks until the device has finished all submitted work.
    ///
    /// A failed wait is not retried on drop.
    pub fn wait_idle(&mut self) -> Result<()> {
        self.idle = true;
        self.context
            .device()
            .wait_idle()
            .vk_op("vkDeviceWaitIdle")
            .context("failed to wait for device idle")
    }

    /// Draws until `pump` reports a close request, then waits for the device
    /// to go idle exactly once, whether the loop ended normally or not.
    pub fn run(&mut self, pump: &mut impl EventPump, bus: &mut EventBus) -> Result<RunSummary> {
        let result = self.run_loop(pump, bus);
        let idle = self.wait_idle();
        let summary = result?;
        idle?;
        Ok(summary)
    }

    fn run_loop(&mut self, pump: &mut impl EventPump, bus: &mut EventBus) -> Result<RunSummary> {
        let mut clock = FrameClock::new();
        let mut fps = FpsCounter::default();
        let mut summary = RunSummary::default();

        loop {
            pump.poll_events();
            for event in pump.take_events() {
                bus.publish(&event);
            }
            if pump.should_close() {
                break;
            }

            let time = clock.tick();
            let outcome = self
                .draw_frame()
                .with_context(|| format!("frame {} failed", self.scheduler.frame_count()))?;

            let event = match outcome {
                FrameOutcome::Presented {
                    frame,
                    image_index,
                    suboptimal,
                    ..
                } => {
                    summary.presented += 1;
                    Event::FramePresented {
                        frame,
                        image_index,
                        suboptimal,
                    }
                }
                FrameOutcome::Skipped {
                    frame, image_index, ..
                } => {
                    summary.skipped += 1;
                    Event::FrameSkipped { frame, image_index }
                }
            };
            bus.publish(&event);

            if let Some(rate) = fps.record(time.dt) {
                log::debug!("{rate:.1} fps");
            }
        }

        log::info!(
            "render loop finished: {} presented, {} skipped",
            summary.presented,
            summary.skipped
        );
        Ok(summary)
    }
}

impl Renderer<VulkanDevice> {
    /// Full bring-up against the real driver for `window`.
    pub fn bring_up(window: &PlatformWindow, init: &GpuInit, shaders: &ShaderSet) -> Result<Self> {
        let (context, support) = GraphicsContext::bring_up(window.window(), init)?;
        Self::new(context, &support, init, shaders)
    }
}

impl<D: DeviceApi> Drop for Renderer<D> {
    fn drop(&mut self) {
        if !self.idle {
            if let Err(e) = self.context.device().wait_idle() {
                log::error!("vkDeviceWaitIdle failed during teardown: {e}");
            }
        }
        log::debug!("destroying renderer");
    }
}
