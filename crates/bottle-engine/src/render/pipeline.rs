use std::sync::Arc;

use ash::vk;
use thiserror::Error;

use crate::device::{DeviceApi, GpuError, VkResultExt};

use super::render_pass::RenderPass;
use super::shader::{ENTRY_POINT, Shader, ShaderStage};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("shader {index} has a null module")]
    NullShaderModule { index: usize },

    #[error("no {0:?} shader supplied")]
    MissingStage(ShaderStage),

    #[error("shader {index} is a {stage:?} module, not usable in a graphics pipeline")]
    InvalidStage { index: usize, stage: ShaderStage },

    #[error("shader {index} repeats the {stage:?} stage")]
    DuplicateStage { index: usize, stage: ShaderStage },

    #[error(transparent)]
    Gpu(#[from] GpuError),
}

#[derive(Debug, Clone, Default)]
pub struct VertexInputState {
    pub bindings: Vec<vk::VertexInputBindingDescription>,
    pub attributes: Vec<vk::VertexInputAttributeDescription>,
}

#[derive(Debug, Clone)]
pub struct InputAssemblyState {
    pub topology: vk::PrimitiveTopology,
    pub primitive_restart: bool,
}

impl Default for InputAssemblyState {
    fn default() -> Self {
        Self {
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            primitive_restart: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ViewportState {
    pub viewports: Vec<vk::Viewport>,
    pub scissors: Vec<vk::Rect2D>,
}

impl ViewportState {
    /// One viewport (depth 0..1) and one scissor covering `extent`.
    pub fn covering(extent: vk::Extent2D) -> Self {
        Self {
            viewports: vec![vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            }],
            scissors: vec![vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            }],
        }
    }
}

#[derive(Debug, Clone)]
pub struct RasterizationState {
    pub depth_clamp: bool,
    pub rasterizer_discard: bool,
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub depth_bias: bool,
    pub line_width: f32,
}

impl Default for RasterizationState {
    fn default() -> Self {
        Self {
            depth_clamp: false,
            rasterizer_discard: false,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::CLOCKWISE,
            depth_bias: false,
            line_width: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MultisampleState {
    pub samples: vk::SampleCountFlags,
    pub sample_shading: bool,
    pub min_sample_shading: f32,
}

impl Default for MultisampleState {
    fn default() -> Self {
        Self {
            samples: vk::SampleCountFlags::TYPE_1,
            sample_shading: false,
            min_sample_shading: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColorBlendState {
    pub attachments: Vec<vk::PipelineColorBlendAttachmentState>,
    pub logic_op_enable: bool,
    pub logic_op: vk::LogicOp,
    pub blend_constants: [f32; 4],
}

impl Default for ColorBlendState {
    fn default() -> Self {
        let opaque = vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(false)
            .src_color_blend_factor(vk::BlendFactor::ONE)
            .dst_color_blend_factor(vk::BlendFactor::ZERO)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
            .alpha_blend_op(vk::BlendOp::ADD)
            .color_write_mask(vk::ColorComponentFlags::RGBA);
        Self {
            attachments: vec![opaque],
            logic_op_enable: false,
            logic_op: vk::LogicOp::COPY,
            blend_constants: [0.0; 4],
        }
    }
}

/// Descriptor set layouts and push constant ranges of an owned layout.
#[derive(Debug, Clone, Default)]
pub struct LayoutDesc {
    pub set_layouts: Vec<vk::DescriptorSetLayout>,
    pub push_constants: Vec<vk::PushConstantRange>,
}

/// Where the pipeline layout comes from.
///
/// An `External` layout is borrowed: the pipeline never destroys it.
#[derive(Debug, Clone)]
pub enum PipelineLayoutSource {
    Owned(LayoutDesc),
    External(vk::PipelineLayout),
}

impl Default for PipelineLayoutSource {
    fn default() -> Self {
        PipelineLayoutSource::Owned(LayoutDesc::default())
    }
}

/// Per-sub-state replacements. `None` keeps the default.
#[derive(Debug, Clone, Default)]
pub struct PipelineOverrides {
    pub vertex_input: Option<VertexInputState>,
    pub input_assembly: Option<InputAssemblyState>,
    pub viewport: Option<ViewportState>,
    pub dynamic_states: Option<Vec<vk::DynamicState>>,
    pub rasterization: Option<RasterizationState>,
    pub multisample: Option<MultisampleState>,
    pub color_blend: Option<ColorBlendState>,
    pub layout: Option<PipelineLayoutSource>,
}

/// Fully resolved fixed-function state of a graphics pipeline.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub vertex_input: VertexInputState,
    pub input_assembly: InputAssemblyState,
    pub viewport: ViewportState,
    pub dynamic_states: Vec<vk::DynamicState>,
    pub rasterization: RasterizationState,
    pub multisample: MultisampleState,
    pub color_blend: ColorBlendState,
    pub layout: PipelineLayoutSource,
}

impl PipelineState {
    pub fn defaults(extent: vk::Extent2D) -> Self {
        Self::resolve(PipelineOverrides::default(), extent)
    }

    pub fn resolve(overrides: PipelineOverrides, extent: vk::Extent2D) -> Self {
        Self {
            vertex_input: overrides.vertex_input.unwrap_or_default(),
            input_assembly: overrides.input_assembly.unwrap_or_default(),
            viewport: overrides
                .viewport
                .unwrap_or_else(|| ViewportState::covering(extent)),
            dynamic_states: overrides
                .dynamic_states
                .unwrap_or_else(|| vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR]),
            rasterization: overrides.rasterization.unwrap_or_default(),
            multisample: overrides.multisample.unwrap_or_default(),
            color_blend: overrides.color_blend.unwrap_or_default(),
            layout: overrides.layout.unwrap_or_default(),
        }
    }

    pub fn is_dynamic(&self, state: vk::DynamicState) -> bool {
        self.dynamic_states.contains(&state)
    }
}

/// A graphics pipeline together with the shaders and layout it was built from.
///
/// Teardown order: pipeline, owned layout, then every shader module.
pub struct GraphicsPipeline<D: DeviceApi> {
    device: Arc<D>,
    handle: vk::Pipeline,
    layout: vk::PipelineLayout,
    owns_layout: bool,
    shaders: Vec<Shader<D>>,
    state: PipelineState,
}

impl<D: DeviceApi> std::fmt::Debug for GraphicsPipeline<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsPipeline")
            .field("handle", &self.handle)
            .field("layout", &self.layout)
            .field("owns_layout", &self.owns_layout)
            .field("shaders", &self.shaders)
            .finish_non_exhaustive()
    }
}

impl<D: DeviceApi> GraphicsPipeline<D> {
    pub fn new(
        device: &Arc<D>,
        shaders: Vec<Shader<D>>,
        render_pass: &RenderPass<D>,
        extent: vk::Extent2D,
        overrides: PipelineOverrides,
    ) -> Result<Self, PipelineError> {
        if let Some(index) = shaders
            .iter()
            .position(|s| s.module() == vk::ShaderModule::null())
        {
            return Err(PipelineError::NullShaderModule { index });
        }
        for (index, shader) in shaders.iter().enumerate() {
            let stage = shader.stage();
            if stage == ShaderStage::Compute {
                return Err(PipelineError::InvalidStage { index, stage });
            }
            if shaders[..index].iter().any(|s| s.stage() == stage) {
                return Err(PipelineError::DuplicateStage { index, stage });
            }
        }
        for required in [ShaderStage::Vertex, ShaderStage::Fragment] {
            if !shaders.iter().any(|s| s.stage() == required) {
                return Err(PipelineError::MissingStage(required));
            }
        }

        let state = PipelineState::resolve(overrides, extent);

        let (layout, owns_layout) = match &state.layout {
            PipelineLayoutSource::External(layout) => (*layout, false),
            PipelineLayoutSource::Owned(desc) => {
                let info = vk::PipelineLayoutCreateInfo::default()
                    .set_layouts(&desc.set_layouts)
                    .push_constant_ranges(&desc.push_constants);
                // SAFETY: the set layouts are owned by the caller and live.
                let layout = unsafe { device.create_raw_pipeline_layout(&info) }
                    .vk_op("vkCreatePipelineLayout")?;
                (layout, true)
            }
        };

        // Owns everything from here; Drop skips the null pipeline on failure.
        let mut pipeline = Self {
            device: Arc::clone(device),
            handle: vk::Pipeline::null(),
            layout,
            owns_layout,
            shaders,
            state,
        };
        pipeline.handle = pipeline.create(render_pass)?;

        log::debug!(
            "graphics pipeline created with {} stages",
            pipeline.shaders.len()
        );
        Ok(pipeline)
    }

    fn create(&self, render_pass: &RenderPass<D>) -> Result<vk::Pipeline, PipelineError> {
        let state = &self.state;

        let stages: Vec<vk::PipelineShaderStageCreateInfo<'_>> = self
            .shaders
            .iter()
            .map(|s| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(s.stage().flags())
                    .module(s.module())
                    .name(ENTRY_POINT)
            })
            .collect();

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&state.vertex_input.bindings)
            .vertex_attribute_descriptions(&state.vertex_input.attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(state.input_assembly.topology)
            .primitive_restart_enable(state.input_assembly.primitive_restart);

        let viewport = vk::PipelineViewportStateCreateInfo::default()
            .viewports(&state.viewport.viewports)
            .scissors(&state.viewport.scissors);

        let dynamic = vk::PipelineDynamicStateCreateInfo::default()
            .dynamic_states(&state.dynamic_states);

        let r = &state.rasterization;
        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(r.depth_clamp)
            .rasterizer_discard_enable(r.rasterizer_discard)
            .polygon_mode(r.polygon_mode)
            .cull_mode(r.cull_mode)
            .front_face(r.front_face)
            .depth_bias_enable(r.depth_bias)
            .line_width(r.line_width);

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(state.multisample.samples)
            .sample_shading_enable(state.multisample.sample_shading)
            .min_sample_shading(state.multisample.min_sample_shading);

        let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(state.color_blend.logic_op_enable)
            .logic_op(state.color_blend.logic_op)
            .attachments(&state.color_blend.attachments)
            .blend_constants(state.color_blend.blend_constants);

        let mut info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .color_blend_state(&color_blend)
            .layout(self.layout)
            .render_pass(render_pass.handle())
            .subpass(0);
        if !state.dynamic_states.is_empty() {
            info = info.dynamic_state(&dynamic);
        }

        // SAFETY: every sub-state borrows locals or `self`, all alive for the call.
        let handle = unsafe { self.device.create_raw_graphics_pipeline(&info) }
            .vk_op("vkCreateGraphicsPipelines")?;
        Ok(handle)
    }

    pub fn handle(&self) -> vk::Pipeline {
        self.handle
    }

    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn shaders(&self) -> &[Shader<D>] {
        &self.shaders
    }
}

impl<D: DeviceApi> Drop for GraphicsPipeline<D> {
    fn drop(&mut self) {
        log::debug!("destroying pipeline {:?}", self.handle);
        if self.handle != vk::Pipeline::null() {
            // SAFETY: no pending work; the renderer idles the device first.
            unsafe { self.device.destroy_raw_pipeline(self.handle) };
        }
        if self.owns_layout {
            // SAFETY: created by this pipeline; the pipeline using it is gone.
            unsafe { self.device.destroy_raw_pipeline_layout(self.layout) };
        }
        for shader in &mut self.shaders {
            shader.cleanup();
        }
    }
}
