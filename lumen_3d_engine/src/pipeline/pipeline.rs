/// A named graphics pipeline, configured step by step then finalized once
///
/// Lifecycle:
/// 1. `PipelineRegistry::create_pipeline(name, shaders, binding)`
/// 2. `add_vertex_binding` / `add_vertex_attribute` / fixed-function setters
/// 3. `create_pipeline_layout(set_layouts, push_constant_ranges)`
/// 4. `create_pipeline(render_pass, viewport, scissor)` (finalize)
///
/// After finalization every setter is a contract violation.

use crate::error::Result;
use crate::graphics_device::{
    BlendMode, CompareOp, CullMode, DepthState, DescriptorSetLayoutId, FrontFace, GpuPipelineId,
    GraphicsDevice, GraphicsPipelineDesc, PipelineLayoutDesc, PipelineLayoutId, PushConstantRange,
    RasterizationState, Rect2D, RenderPassId, ShaderDesc, ShaderStage, ShaderStageFlags, VertexAttribute,
    VertexBinding, Viewport,
};

/// SPIR-V bytecode of a vertex + fragment shader pair (entry point `main`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSources {
    pub vertex: Vec<u8>,
    pub fragment: Vec<u8>,
}

impl ShaderSources {
    pub fn new(vertex: impl Into<Vec<u8>>, fragment: impl Into<Vec<u8>>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }
}

const SHADER_ENTRY_POINT: &str = "main";

#[derive(Debug)]
pub struct Pipeline {
    name: String,
    shaders: ShaderSources,
    bindings: Vec<VertexBinding>,
    attributes: Vec<VertexAttribute>,
    rasterization: RasterizationState,
    depth: DepthState,
    blend: BlendMode,
    layout: Option<PipelineLayoutId>,
    set_layouts: Vec<DescriptorSetLayoutId>,
    push_constant_ranges: Vec<PushConstantRange>,
    pipeline: Option<GpuPipelineId>,
    viewport: Viewport,
    scissor: Rect2D,
}

impl Pipeline {
    pub(crate) fn new(name: &str, shaders: &ShaderSources, binding: VertexBinding) -> Self {
        Self {
            name: name.to_string(),
            shaders: shaders.clone(),
            bindings: vec![binding],
            attributes: Vec::new(),
            rasterization: RasterizationState::default(),
            depth: DepthState::default(),
            blend: BlendMode::Opaque,
            layout: None,
            set_layouts: Vec::new(),
            push_constant_ranges: Vec::new(),
            pipeline: None,
            viewport: Viewport::full(Default::default()),
            scissor: Rect2D::full(Default::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finalized(&self) -> bool {
        self.pipeline.is_some()
    }

    fn require_mutable(&self, what: &str) -> Result<()> {
        if self.is_finalized() {
            engine_bail_violation!(
                "lumen3d::Pipeline",
                "Pipeline '{}': {} changed after finalization",
                self.name, what
            );
        }
        Ok(())
    }

    // ===== VERTEX INPUT =====

    /// Add another vertex buffer binding (per-instance data)
    pub fn add_vertex_binding(&mut self, binding: VertexBinding) -> Result<()> {
        self.require_mutable("vertex binding")?;
        if self.bindings.iter().any(|b| b.binding == binding.binding) {
            engine_bail_violation!(
                "lumen3d::Pipeline",
                "Pipeline '{}': vertex binding {} declared twice",
                self.name, binding.binding
            );
        }
        self.bindings.push(binding);
        Ok(())
    }

    pub fn add_vertex_attribute(&mut self, attribute: VertexAttribute) -> Result<()> {
        self.require_mutable("vertex attribute")?;
        let Some(binding) = self.bindings.iter().find(|b| b.binding == attribute.binding) else {
            engine_bail_violation!(
                "lumen3d::Pipeline",
                "Pipeline '{}': attribute {} reads undeclared binding {}",
                self.name, attribute.location, attribute.binding
            );
        };
        if attribute.offset + attribute.format.size_bytes() > binding.stride {
            engine_bail_violation!(
                "lumen3d::Pipeline",
                "Pipeline '{}': attribute {} overruns the {}-byte stride",
                self.name, attribute.location, binding.stride
            );
        }
        self.attributes.push(attribute);
        Ok(())
    }

    // ===== FIXED FUNCTION =====

    pub fn set_cull_mode(&mut self, cull_mode: CullMode) -> Result<()> {
        self.require_mutable("cull mode")?;
        self.rasterization.cull_mode = cull_mode;
        Ok(())
    }

    pub fn set_front_face(&mut self, front_face: FrontFace) -> Result<()> {
        self.require_mutable("front face")?;
        self.rasterization.front_face = front_face;
        Ok(())
    }

    pub fn set_depth_test(&mut self, enable: bool) -> Result<()> {
        self.require_mutable("depth test")?;
        self.depth.test_enable = enable;
        Ok(())
    }

    pub fn set_depth_write(&mut self, enable: bool) -> Result<()> {
        self.require_mutable("depth write")?;
        self.depth.write_enable = enable;
        Ok(())
    }

    pub fn set_depth_compare(&mut self, compare_op: CompareOp) -> Result<()> {
        self.require_mutable("depth compare")?;
        self.depth.compare_op = compare_op;
        Ok(())
    }

    pub fn set_blend(&mut self, blend: BlendMode) -> Result<()> {
        self.require_mutable("blend mode")?;
        self.blend = blend;
        Ok(())
    }

    pub fn rasterization(&self) -> RasterizationState {
        self.rasterization
    }

    pub fn depth(&self) -> DepthState {
        self.depth
    }

    pub fn blend(&self) -> BlendMode {
        self.blend
    }

    // ===== LAYOUT AND FINALIZATION =====

    /// Create the pipeline layout: descriptor set layouts in set order, then push constants
    pub fn create_pipeline_layout(
        &mut self,
        device: &mut dyn GraphicsDevice,
        set_layouts: &[DescriptorSetLayoutId],
        push_constant_ranges: &[PushConstantRange],
    ) -> Result<()> {
        self.require_mutable("layout")?;
        if self.layout.is_some() {
            engine_bail_violation!("lumen3d::Pipeline", "Pipeline '{}': layout created twice", self.name);
        }
        self.layout = Some(device.create_pipeline_layout(&PipelineLayoutDesc {
            set_layouts: set_layouts.to_vec(),
            push_constant_ranges: push_constant_ranges.to_vec(),
        })?);
        self.set_layouts = set_layouts.to_vec();
        self.push_constant_ranges = push_constant_ranges.to_vec();
        Ok(())
    }

    /// Build the GPU pipeline
    ///
    /// `viewport` and `scissor` are recorded with every bind; the pipeline
    /// itself declares them dynamic.
    pub fn create_pipeline(
        &mut self,
        device: &mut dyn GraphicsDevice,
        render_pass: RenderPassId,
        viewport: Viewport,
        scissor: Rect2D,
    ) -> Result<()> {
        self.require_mutable("pipeline")?;
        let Some(layout) = self.layout else {
            engine_bail_violation!(
                "lumen3d::Pipeline",
                "Pipeline '{}': create_pipeline_layout must precede create_pipeline",
                self.name
            );
        };

        let vertex_shader = device.create_shader(&ShaderDesc {
            stage: ShaderStage::Vertex,
            code: &self.shaders.vertex,
            entry_point: SHADER_ENTRY_POINT,
        })?;
        let fragment_shader = match device.create_shader(&ShaderDesc {
            stage: ShaderStage::Fragment,
            code: &self.shaders.fragment,
            entry_point: SHADER_ENTRY_POINT,
        }) {
            Ok(shader) => shader,
            Err(e) => {
                device.destroy_shader(vertex_shader);
                return Err(e);
            }
        };

        let result = device.create_graphics_pipeline(&GraphicsPipelineDesc {
            vertex_shader,
            fragment_shader,
            bindings: self.bindings.clone(),
            attributes: self.attributes.clone(),
            layout,
            render_pass,
            rasterization: self.rasterization,
            depth: self.depth,
            blend: self.blend,
        });

        // Modules are only needed during pipeline creation.
        device.destroy_shader(vertex_shader);
        device.destroy_shader(fragment_shader);

        self.pipeline = Some(result?);
        self.viewport = viewport;
        self.scissor = scissor;
        engine_debug!("lumen3d::Pipeline", "Pipeline '{}' created", self.name);
        Ok(())
    }

    // ===== ACCESS =====

    pub fn gpu_pipeline(&self) -> Result<GpuPipelineId> {
        self.pipeline.ok_or_else(|| {
            engine_violation!("lumen3d::Pipeline", "Pipeline '{}' used before create_pipeline", self.name)
        })
    }

    pub fn layout(&self) -> Result<PipelineLayoutId> {
        self.layout.ok_or_else(|| {
            engine_violation!("lumen3d::Pipeline", "Pipeline '{}' has no layout", self.name)
        })
    }

    /// Descriptor set layouts of sets 0..n
    pub fn set_layouts(&self) -> &[DescriptorSetLayoutId] {
        &self.set_layouts
    }

    pub fn push_constant_ranges(&self) -> &[PushConstantRange] {
        &self.push_constant_ranges
    }

    /// True when a single declared range covers `stages` over `[offset, offset + size)`
    pub fn accepts_push_constants(&self, stages: ShaderStageFlags, offset: u32, size: u32) -> bool {
        self.push_constant_ranges
            .iter()
            .any(|range| range.stages.contains(stages) && range.contains(offset, size))
    }

    pub fn bindings(&self) -> &[VertexBinding] {
        &self.bindings
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn scissor(&self) -> Rect2D {
        self.scissor
    }

    pub(crate) fn set_viewport_scissor(&mut self, viewport: Viewport, scissor: Rect2D) {
        self.viewport = viewport;
        self.scissor = scissor;
    }

    pub(crate) fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(pipeline) = self.pipeline.take() {
            device.destroy_pipeline(pipeline);
        }
        if let Some(layout) = self.layout.take() {
            device.destroy_pipeline_layout(layout);
        }
    }
}
