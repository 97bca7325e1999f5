/// Recording primitives used by observers during `on_offscreen` / `on_draw`

use crate::buffer::{Handle, IndexBuffer, VertexBuffer};
use crate::descriptor::DescriptorKind;
use crate::error::Result;
use crate::graphics_device::{CommandBufferId, ShaderStageFlags};
use crate::render_pass::RenderPassKind;
use crate::render_target::RenderTarget;
use crate::renderer::renderer::{initialized, GpuState, Renderer};

/// A descriptor set to bind, by kind and allocator index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorRef {
    /// The global uniforms (view / projection) of the frame being recorded
    GlobalUniforms,
    Texture(usize),
    Cubemap(usize),
    Uniform(usize),
    Storage(usize),
}

impl DescriptorRef {
    fn resolve(self, gpu: &GpuState, frame: usize) -> Result<(DescriptorKind, usize)> {
        Ok(match self {
            DescriptorRef::GlobalUniforms => match gpu.globals.get(frame) {
                Some(globals) => (DescriptorKind::Uniform, globals.descriptor),
                None => engine_bail_violation!("lumen3d::Renderer", "No global uniforms for frame {}", frame),
            },
            DescriptorRef::Texture(index) => (DescriptorKind::Texture, index),
            DescriptorRef::Cubemap(index) => (DescriptorKind::Cubemap, index),
            DescriptorRef::Uniform(index) => (DescriptorKind::Uniform, index),
            DescriptorRef::Storage(index) => (DescriptorKind::Storage, index),
        })
    }
}

impl Renderer {
    // ===== RENDER TARGETS =====

    /// Begin recording `target` for `frame`: its command buffer opens inside the offscreen pass
    ///
    /// Only valid while the renderer records `frame`.
    pub fn begin_render_target(&mut self, target: Handle<RenderTarget>, frame: usize) -> Result<CommandBufferId> {
        self.require_recording(frame)?;
        let pass = initialized(&self.gpu)?.passes.get(RenderPassKind::Offscreen);
        let cmd = self.render_targets.get_mut(target)?.begin(self.device.as_mut(), frame, pass)?;
        self.pipelines.clear_binding();
        Ok(cmd)
    }

    /// Close the offscreen pass of `target`; its commands join this frame's submission
    pub fn end_render_target(&mut self, target: Handle<RenderTarget>, frame: usize) -> Result<()> {
        self.require_recording(frame)?;
        self.render_targets.get_mut(target)?.end(self.device.as_mut(), frame)?;
        self.pipelines.clear_binding();
        Ok(())
    }

    fn require_recording(&self, frame: usize) -> Result<()> {
        if self.recording_frame != Some(frame) {
            engine_bail_violation!(
                "lumen3d::Renderer",
                "Render target used for frame {} outside its recording ({:?})",
                frame, self.recording_frame
            );
        }
        Ok(())
    }

    // ===== BINDING =====

    /// Bind a registered pipeline with its viewport and scissor
    pub fn bind_pipeline(&mut self, cmd: CommandBufferId, name: &str) -> Result<()> {
        self.pipelines.bind_pipeline(self.device.as_mut(), cmd, name)
    }

    /// Bind `sets` to set numbers 0.. of the bound pipeline
    ///
    /// # Errors
    ///
    /// `ContractViolation` when no pipeline is bound, when more sets are
    /// given than the pipeline declares, or when a set's kind does not match
    /// the layout the pipeline declares for that set number.
    pub fn bind_descriptor_sets(&mut self, cmd: CommandBufferId, sets: &[DescriptorRef], frame: usize) -> Result<()> {
        let pipeline = self.pipelines.bound_pipeline()?;
        let gpu = initialized(&self.gpu)?;
        let layouts = pipeline.set_layouts();
        if sets.len() > layouts.len() {
            engine_bail_violation!(
                "lumen3d::Renderer",
                "Pipeline '{}' declares {} descriptor sets, {} given",
                pipeline.name(), layouts.len(), sets.len()
            );
        }

        let mut resolved = Vec::with_capacity(sets.len());
        for (set_number, reference) in sets.iter().enumerate() {
            let (kind, index) = reference.resolve(gpu, frame)?;
            if gpu.descriptors.layout(kind) != layouts[set_number] {
                engine_bail_violation!(
                    "lumen3d::Renderer",
                    "Set {} of pipeline '{}' does not take a {:?} descriptor",
                    set_number, pipeline.name(), kind
                );
            }
            resolved.push(gpu.descriptors.get_descriptor_set(kind, index)?);
        }
        self.device.cmd_bind_descriptor_sets(cmd, pipeline.layout()?, 0, &resolved)
    }

    /// Push constants into a range declared by the bound pipeline
    pub fn bind_push_constants(
        &mut self,
        cmd: CommandBufferId,
        stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) -> Result<()> {
        let pipeline = self.pipelines.bound_pipeline()?;
        if !pipeline.accepts_push_constants(stages, offset, data.len() as u32) {
            engine_bail_violation!(
                "lumen3d::Renderer",
                "Pipeline '{}' declares no push constant range {:?} at {}..{}",
                pipeline.name(), stages, offset, offset as usize + data.len()
            );
        }
        self.device.cmd_push_constants(cmd, pipeline.layout()?, stages, offset, data)
    }

    /// Bind per-instance data to binding 1
    pub fn bind_instance_buffer(&mut self, cmd: CommandBufferId, instances: Handle<VertexBuffer>) -> Result<()> {
        let buffer = self.vertex_buffers.get(instances)?.gpu_buffer()?;
        self.device.cmd_bind_vertex_buffer(cmd, 1, buffer)
    }

    // ===== DRAWING =====

    /// Bind `vertices` (binding 0) and `indices`, then draw every index
    ///
    /// # Errors
    ///
    /// `ContractViolation` when no pipeline is bound.
    pub fn draw_buffers(
        &mut self,
        vertices: Handle<VertexBuffer>,
        indices: Handle<IndexBuffer>,
        cmd: CommandBufferId,
        instance_count: u32,
    ) -> Result<()> {
        self.pipelines.bound_pipeline()?;
        let vertex_buffer = self.vertex_buffers.get(vertices)?.gpu_buffer()?;
        let index_buffer = self.index_buffers.get(indices)?;
        let index_count = index_buffer.index_count();

        self.device.cmd_bind_vertex_buffer(cmd, 0, vertex_buffer)?;
        self.device.cmd_bind_index_buffer(cmd, index_buffer.gpu_buffer()?, index_buffer.index_type())?;
        self.device.cmd_draw_indexed(cmd, index_count, instance_count)?;

        self.stats.draw_calls += 1;
        self.stats.triangles += u64::from(index_count / 3) * u64::from(instance_count);
        Ok(())
    }

    /// Draw the valid vertices of a buffer without indices
    ///
    /// Nothing is recorded for an empty buffer. Fails like `draw_buffers`
    /// when no pipeline is bound.
    pub fn draw_vertices(&mut self, vertices: Handle<VertexBuffer>, cmd: CommandBufferId, instance_count: u32) -> Result<()> {
        self.pipelines.bound_pipeline()?;
        let buffer = self.vertex_buffers.get(vertices)?;
        let vertex_count = buffer.vertex_count();
        if vertex_count == 0 {
            return Ok(());
        }

        self.device.cmd_bind_vertex_buffer(cmd, 0, buffer.gpu_buffer()?)?;
        self.device.cmd_draw(cmd, vertex_count, instance_count)?;

        self.stats.draw_calls += 1;
        self.stats.triangles += u64::from(vertex_count / 3) * u64::from(instance_count);
        Ok(())
    }
}
