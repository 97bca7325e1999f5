/// Named pipelines and the currently bound one
///
/// Descriptor binding and push constants need to know the layout of the
/// pipeline they apply to, so the registry remembers the last pipeline bound
/// by `bind_pipeline` until `clear_binding`.

use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::graphics_device::{CommandBufferId, GraphicsDevice, Rect2D, VertexBinding, Viewport};
use crate::pipeline::pipeline::{Pipeline, ShaderSources};

#[derive(Default)]
pub struct PipelineRegistry {
    pipelines: FxHashMap<String, Pipeline>,
    bound: Option<String>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pipeline and return it for configuration
    ///
    /// # Errors
    ///
    /// `ContractViolation` if `name` is already registered.
    pub fn create_pipeline(
        &mut self,
        name: &str,
        shaders: &ShaderSources,
        binding: VertexBinding,
    ) -> Result<&mut Pipeline> {
        if self.pipelines.contains_key(name) {
            engine_bail_violation!("lumen3d::PipelineRegistry", "Pipeline '{}' already exists", name);
        }
        Ok(self
            .pipelines
            .entry(name.to_string())
            .or_insert_with(|| Pipeline::new(name, shaders, binding)))
    }

    /// # Errors
    ///
    /// `ContractViolation` if no pipeline is registered under `name`.
    pub fn get_pipeline(&self, name: &str) -> Result<&Pipeline> {
        self.pipelines
            .get(name)
            .ok_or_else(|| engine_violation!("lumen3d::PipelineRegistry", "Pipeline '{}' not found", name))
    }

    pub fn get_pipeline_mut(&mut self, name: &str) -> Result<&mut Pipeline> {
        self.pipelines
            .get_mut(name)
            .ok_or_else(|| engine_violation!("lumen3d::PipelineRegistry", "Pipeline '{}' not found", name))
    }

    /// Destroy and unregister `name`; unknown names are ignored
    pub fn remove_pipeline(&mut self, device: &mut dyn GraphicsDevice, name: &str) {
        if let Some(mut pipeline) = self.pipelines.remove(name) {
            pipeline.destroy(device);
        }
        if self.bound.as_deref() == Some(name) {
            self.bound = None;
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pipelines.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Record a bind of `name` followed by its viewport and scissor
    pub fn bind_pipeline(&mut self, device: &mut dyn GraphicsDevice, cmd: CommandBufferId, name: &str) -> Result<()> {
        let pipeline = self.get_pipeline(name)?;
        device.cmd_bind_pipeline(cmd, pipeline.gpu_pipeline()?)?;
        device.cmd_set_viewport(cmd, pipeline.viewport())?;
        device.cmd_set_scissor(cmd, pipeline.scissor())?;
        if self.bound.as_deref() != Some(name) {
            self.bound = Some(name.to_string());
        }
        Ok(())
    }

    /// Pipeline of the last `bind_pipeline`
    ///
    /// # Errors
    ///
    /// `ContractViolation` when nothing is bound.
    pub fn bound_pipeline(&self) -> Result<&Pipeline> {
        match &self.bound {
            Some(name) => self.get_pipeline(name),
            None => Err(engine_violation!(
                "lumen3d::PipelineRegistry",
                "No pipeline bound: call bind_pipeline first"
            )),
        }
    }

    /// Forget the bound pipeline (start of a new command buffer)
    pub fn clear_binding(&mut self) {
        self.bound = None;
    }

    /// New viewport and scissor for every pipeline, recorded from the next bind on
    pub fn update_viewport_scissor(&mut self, viewport: Viewport, scissor: Rect2D) {
        for pipeline in self.pipelines.values_mut() {
            pipeline.set_viewport_scissor(viewport, scissor);
        }
    }

    pub fn destroy_all(&mut self, device: &mut dyn GraphicsDevice) {
        for pipeline in self.pipelines.values_mut() {
            pipeline.destroy(device);
        }
        self.pipelines.clear();
        self.bound = None;
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
