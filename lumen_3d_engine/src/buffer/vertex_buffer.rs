/// Vertex buffers: Static (device-local, immutable) and Dynamic (host-visible, growable)

use crate::buffer::buffer_state::{BufferState, GpuResource};
use crate::buffer::staging;
use crate::error::Result;
use crate::graphics_device::{BufferDesc, BufferUsage, GpuBufferId, GraphicsDevice, MemoryLocation};

/// Vertex buffer variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexBufferKind {
    /// Device-local, filled once through staging. The host copy is not kept.
    Static,
    /// Host-visible and persistently mapped. Rewritten with `update`.
    Dynamic,
}

/// A vertex buffer
///
/// A Dynamic buffer tracks `capacity` (allocated vertex slots) apart from
/// `vertex_count` (valid vertices). Updates within capacity copy exactly the
/// new data's bytes; larger updates reallocate to the new count.
#[derive(Debug)]
pub struct VertexBuffer {
    kind: VertexBufferKind,
    state: BufferState,
    stride: u32,
    vertex_count: u32,
    capacity: u32,
    buffer: Option<GpuBufferId>,
    reallocations: u32,
}

impl VertexBuffer {
    /// A buffer in the `None` state with `stride` bytes per vertex
    pub fn new(kind: VertexBufferKind, stride: u32) -> Self {
        Self {
            kind,
            state: BufferState::None,
            stride,
            vertex_count: 0,
            capacity: 0,
            buffer: None,
            reallocations: 0,
        }
    }

    /// Allocate GPU memory and upload `data`
    ///
    /// # Arguments
    ///
    /// * `device` - Graphics device
    /// * `data` - Packed vertices, a whole multiple of the stride
    /// * `capacity` - Dynamic only: vertex slots to reserve (raised to the data's count)
    ///
    /// # Errors
    ///
    /// `ContractViolation` when called twice, when `data` is not a whole
    /// number of vertices, or for an empty Static buffer.
    pub fn create(&mut self, device: &mut dyn GraphicsDevice, data: &[u8], capacity: u32) -> Result<()> {
        self.state.require_none(Self::KIND)?;
        let count = self.vertex_count_of(data)?;

        match self.kind {
            VertexBufferKind::Static => {
                if count == 0 {
                    engine_bail_violation!("lumen3d::VertexBuffer", "Static vertex buffer created without vertices");
                }
                self.buffer = Some(staging::upload_buffer(device, data, BufferUsage::VERTEX)?);
                self.capacity = count;
            }
            VertexBufferKind::Dynamic => {
                let capacity = capacity.max(count).max(1);
                let buffer = self.allocate_dynamic(device, capacity)?;
                if !data.is_empty() {
                    if let Err(e) = device.write_buffer(buffer, 0, data) {
                        device.destroy_buffer(buffer);
                        return Err(e);
                    }
                }
                self.buffer = Some(buffer);
                self.capacity = capacity;
            }
        }

        self.vertex_count = count;
        self.state = BufferState::Initialized;
        Ok(())
    }

    /// Replace the contents of a Dynamic buffer
    ///
    /// Returns the superseded GPU buffer when the update outgrew the capacity.
    /// The caller owns it and must destroy it once no frame in flight can
    /// still read it.
    pub fn update(&mut self, device: &mut dyn GraphicsDevice, data: &[u8]) -> Result<Option<GpuBufferId>> {
        self.state.require_initialized(Self::KIND, "update")?;
        if self.kind == VertexBufferKind::Static {
            engine_bail_violation!("lumen3d::VertexBuffer", "Static vertex buffers are immutable");
        }
        let count = self.vertex_count_of(data)?;
        let current = self.gpu_buffer()?;

        if count > self.capacity {
            let replacement = self.allocate_dynamic(device, count)?;
            if let Err(e) = device.write_buffer(replacement, 0, data) {
                device.destroy_buffer(replacement);
                return Err(e);
            }
            engine_debug!(
                "lumen3d::VertexBuffer",
                "Dynamic vertex buffer grew from {} to {} vertices",
                self.capacity, count
            );
            self.buffer = Some(replacement);
            self.capacity = count;
            self.vertex_count = count;
            self.reallocations += 1;
            return Ok(Some(current));
        }

        // Copy the data's own length, never the capacity.
        if !data.is_empty() {
            device.write_buffer(current, 0, data)?;
        }
        self.vertex_count = count;
        Ok(None)
    }

    pub fn kind(&self) -> VertexBufferKind {
        self.kind
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Valid vertices
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Allocated vertex slots
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of times an update reallocated the GPU buffer
    pub fn reallocation_count(&self) -> u32 {
        self.reallocations
    }

    /// GPU buffer, only while Initialized
    pub fn gpu_buffer(&self) -> Result<GpuBufferId> {
        self.state.require_initialized(Self::KIND, "gpu_buffer")?;
        self.buffer.ok_or_else(|| engine_violation!("lumen3d::VertexBuffer", "Initialized buffer without GPU memory"))
    }

    fn vertex_count_of(&self, data: &[u8]) -> Result<u32> {
        if self.stride == 0 || data.len() % self.stride as usize != 0 {
            engine_bail_violation!(
                "lumen3d::VertexBuffer",
                "{} bytes is not a whole number of {}-byte vertices",
                data.len(), self.stride
            );
        }
        Ok((data.len() / self.stride as usize) as u32)
    }

    fn allocate_dynamic(&self, device: &mut dyn GraphicsDevice, capacity: u32) -> Result<GpuBufferId> {
        device.create_buffer(&BufferDesc {
            size: capacity as u64 * self.stride as u64,
            usage: BufferUsage::VERTEX,
            location: MemoryLocation::HostVisible,
        })
    }
}

impl GpuResource for VertexBuffer {
    const KIND: &'static str = "vertex buffer";

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
        self.vertex_count = 0;
        self.state = BufferState::Disposed;
        Ok(())
    }
}

#[cfg(test)]
#[path = "vertex_buffer_tests.rs"]
mod tests;
