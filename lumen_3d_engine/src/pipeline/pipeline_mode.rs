/// Built-in draw modes and the shader library that feeds them
///
/// Each mode fixes its vertex layout, descriptor sets, push constants,
/// render pass and fixed-function state. Only the shader bytecode comes
/// from the application.

use rustc_hash::FxHashMap;

use crate::descriptor::DescriptorKind;
use crate::error::Result;
use crate::graphics_device::{
    BlendMode, CompareOp, CullMode, PushConstantRange, ShaderStageFlags, VertexBinding,
};
use crate::pipeline::pipeline::{Pipeline, ShaderSources};
use crate::render_pass::RenderPassKind;
use crate::vertex::{InstanceData, Vertex2d, Vertex3d};

/// Push constant block of the Opaque and Sprite modes: one mat4
pub const TRANSFORM_PUSH_CONSTANT_SIZE: u32 = 64;
/// Push constant block of the Text mode: mat4 transform + vec4 color
pub const TEXT_PUSH_CONSTANT_SIZE: u32 = 80;

/// Draw mode of a built-in pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineMode {
    /// Lit 3D meshes. Sets: globals, texture. Push: model matrix.
    Opaque,
    /// 3D meshes with a per-instance model matrix stream. Sets: globals, texture.
    Instanced,
    /// Alpha-blended 2D quads. Sets: texture. Push: transform.
    Sprite,
    /// Cubemap background drawn at the far plane. Sets: globals, cubemap.
    Skybox,
    /// Alpha-blended glyph quads. Sets: glyph atlas. Push: transform + color.
    Text,
    /// Fullscreen quad compositing one render target onto the swapchain. Sets: texture.
    Present,
}

impl PipelineMode {
    pub const ALL: [PipelineMode; 6] = [
        PipelineMode::Opaque,
        PipelineMode::Instanced,
        PipelineMode::Sprite,
        PipelineMode::Skybox,
        PipelineMode::Text,
        PipelineMode::Present,
    ];

    /// Registry name of the mode's pipeline
    pub fn name(self) -> &'static str {
        match self {
            PipelineMode::Opaque => "opaque",
            PipelineMode::Instanced => "instanced",
            PipelineMode::Sprite => "sprite",
            PipelineMode::Skybox => "skybox",
            PipelineMode::Text => "text",
            PipelineMode::Present => "present",
        }
    }

    /// Descriptor kinds of sets 0..n
    pub fn set_kinds(self) -> &'static [DescriptorKind] {
        match self {
            PipelineMode::Opaque | PipelineMode::Instanced => &[DescriptorKind::Uniform, DescriptorKind::Texture],
            PipelineMode::Skybox => &[DescriptorKind::Uniform, DescriptorKind::Cubemap],
            PipelineMode::Sprite | PipelineMode::Text | PipelineMode::Present => &[DescriptorKind::Texture],
        }
    }

    pub fn push_constant_ranges(self) -> Vec<PushConstantRange> {
        match self {
            PipelineMode::Opaque | PipelineMode::Sprite => vec![PushConstantRange {
                stages: ShaderStageFlags::VERTEX,
                offset: 0,
                size: TRANSFORM_PUSH_CONSTANT_SIZE,
            }],
            PipelineMode::Text => vec![PushConstantRange {
                stages: ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT,
                offset: 0,
                size: TEXT_PUSH_CONSTANT_SIZE,
            }],
            PipelineMode::Instanced | PipelineMode::Skybox | PipelineMode::Present => Vec::new(),
        }
    }

    pub fn render_pass(self) -> RenderPassKind {
        match self {
            PipelineMode::Present => RenderPassKind::Main,
            _ => RenderPassKind::Offscreen,
        }
    }

    /// Binding 0 of the mode's vertex input
    pub fn vertex_binding(self) -> VertexBinding {
        match self {
            PipelineMode::Opaque | PipelineMode::Instanced | PipelineMode::Skybox => Vertex3d::binding(0),
            PipelineMode::Sprite | PipelineMode::Text | PipelineMode::Present => Vertex2d::binding(0),
        }
    }

    /// Declare attributes and fixed-function state on a freshly created pipeline
    pub(crate) fn configure(self, pipeline: &mut Pipeline) -> Result<()> {
        match self {
            PipelineMode::Opaque => {
                for attribute in Vertex3d::attributes(0) {
                    pipeline.add_vertex_attribute(attribute)?;
                }
            }
            PipelineMode::Instanced => {
                for attribute in Vertex3d::attributes(0) {
                    pipeline.add_vertex_attribute(attribute)?;
                }
                pipeline.add_vertex_binding(InstanceData::binding(1))?;
                for attribute in InstanceData::attributes(1, 3) {
                    pipeline.add_vertex_attribute(attribute)?;
                }
            }
            PipelineMode::Skybox => {
                for attribute in Vertex3d::attributes(0) {
                    pipeline.add_vertex_attribute(attribute)?;
                }
                // Viewed from inside, written at depth 1.0
                pipeline.set_cull_mode(CullMode::None)?;
                pipeline.set_depth_write(false)?;
                pipeline.set_depth_compare(CompareOp::LessOrEqual)?;
            }
            PipelineMode::Sprite | PipelineMode::Text => {
                for attribute in Vertex2d::attributes(0) {
                    pipeline.add_vertex_attribute(attribute)?;
                }
                pipeline.set_cull_mode(CullMode::None)?;
                pipeline.set_depth_test(false)?;
                pipeline.set_depth_write(false)?;
                pipeline.set_blend(BlendMode::Alpha)?;
            }
            PipelineMode::Present => {
                for attribute in Vertex2d::attributes(0) {
                    pipeline.add_vertex_attribute(attribute)?;
                }
                pipeline.set_cull_mode(CullMode::None)?;
                pipeline.set_depth_test(false)?;
                pipeline.set_depth_write(false)?;
                // Targets are layered in creation order over the clear color
                pipeline.set_blend(BlendMode::Alpha)?;
            }
        }
        Ok(())
    }
}

/// Shader bytecode per draw mode, supplied by the application
///
/// `Present` is required. Every other mode is built only when present here.
#[derive(Debug, Clone, Default)]
pub struct ShaderLibrary {
    sources: FxHashMap<PipelineMode, ShaderSources>,
}

impl ShaderLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, mode: PipelineMode, sources: ShaderSources) -> Self {
        self.insert(mode, sources);
        self
    }

    pub fn insert(&mut self, mode: PipelineMode, sources: ShaderSources) {
        self.sources.insert(mode, sources);
    }

    pub fn get(&self, mode: PipelineMode) -> Option<&ShaderSources> {
        self.sources.get(&mode)
    }

    pub fn contains(&self, mode: PipelineMode) -> bool {
        self.sources.contains_key(&mode)
    }
}
