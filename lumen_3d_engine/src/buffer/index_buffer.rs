/// Index buffer: device-local u32 indices filled through staging

use crate::buffer::buffer_state::{BufferState, GpuResource};
use crate::buffer::staging;
use crate::error::Result;
use crate::graphics_device::{BufferUsage, GpuBufferId, GraphicsDevice, IndexType};

#[derive(Debug)]
pub struct IndexBuffer {
    state: BufferState,
    index_count: u32,
    buffer: Option<GpuBufferId>,
}

impl IndexBuffer {
    pub fn new() -> Self {
        Self {
            state: BufferState::None,
            index_count: 0,
            buffer: None,
        }
    }

    /// Upload `indices` to device-local memory
    pub fn create(&mut self, device: &mut dyn GraphicsDevice, indices: &[u32]) -> Result<()> {
        self.state.require_none(Self::KIND)?;
        if indices.is_empty() {
            engine_bail_violation!("lumen3d::IndexBuffer", "Index buffer created without indices");
        }
        let bytes: &[u8] = bytemuck::cast_slice(indices);
        self.buffer = Some(staging::upload_buffer(device, bytes, BufferUsage::INDEX)?);
        self.index_count = indices.len() as u32;
        self.state = BufferState::Initialized;
        Ok(())
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn index_type(&self) -> IndexType {
        IndexType::U32
    }

    pub fn gpu_buffer(&self) -> Result<GpuBufferId> {
        self.state.require_initialized(Self::KIND, "gpu_buffer")?;
        self.buffer.ok_or_else(|| engine_violation!("lumen3d::IndexBuffer", "Initialized buffer without GPU memory"))
    }
}

impl Default for IndexBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuResource for IndexBuffer {
    const KIND: &'static str = "index buffer";

    fn state(&self) -> BufferState {
        self.state
    }

    fn dispose(&mut self, device: &mut dyn GraphicsDevice) -> Result<()> {
        if !self.state.begin_dispose(Self::KIND)? {
            return Ok(());
        }
        if let Some(buffer) = self.buffer.take() {
            device.destroy_buffer(buffer);
        }
        self.state = BufferState::Disposed;
        Ok(())
    }
}
