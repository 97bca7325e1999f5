/// Uniform and storage buffers: host-visible, persistently mapped, fixed size
///
/// Writes are bounds-checked against the allocation: `offset + size` past
/// the end is a contract violation, never a truncated copy.

use crate::buffer::buffer_state::{BufferState, GpuResource};
use crate::error::Result;
use crate::graphics_device::{BufferDesc, BufferUsage, GpuBufferId, GraphicsDevice, MemoryLocation};

/// Shared implementation of the fixed-size mapped buffers
#[derive(Debug)]
struct MappedBuffer {
    kind: &'static str,
    usage: BufferUsage,
    state: BufferState,
    size: u64,
    buffer: Option<GpuBufferId>,
}

impl MappedBuffer {
    fn new(kind: &'static str, usage: BufferUsage) -> Self {
        Self {
            kind,
            usage,
            state: BufferState::None,
            size: 0,
            buffer: None,
        }
    }

    fn create(&mut self, device: &mut dyn GraphicsDevice, size: u64, initial: Option<&[u8]>) -> Result<()> {
        self.state.require_none(self.kind)?;
        if size == 0 {
            engine_bail_violation!("lumen3d::HostBuffer", "{} created with size 0", self.kind);
        }
        if let Some(data) = initial {
            if data.len() as u64 > size {
                engine_bail_violation!(
                    "lumen3d::HostBuffer",
                    "{}: initial data ({} bytes) exceeds size {}",
                    self.kind, data.len(), size
                );
            }
        }

        let buffer = device.create_buffer(&BufferDesc {
            size,
            usage: self.usage,
            location: MemoryLocation::HostVisible,
        })?;
        if let Some(data) = initial.filter(|d| !d.is_empty()) {
            if let Err(e) = device.write_buffer(buffer, 0, data) {
                device.destroy_buffer(buffer);
                return Err(e);
            }
        }

        self.buffer = Some(buffer);
        self.size = size;
        self.state = BufferState::Initialized;
        Ok(())
    }

    fn update(&mut self, device: &mut dyn GraphicsDevice, offset: u64, data: &[u8]) -> Result<()> {
        self.state.require_initialized(self.kind, "update")?;
        let end = offset.checked_add(data.len() as u64);
        if end.map_or(true, |end| end > self.size) {
            engine_bail_violation!(
                "lumen3d::HostBuffer",
                "{} overflow: offset {} + {} bytes > capacity {}",
                self.kind, offset, data.len(), self.size
            );
        }
        device.write_buffer(self.gpu_buffer()?, offset, data)
    }

    fn gpu_buffer(&self) -> Result<GpuBufferId> {
        self.state.require_initialized(self.kind, "gpu_buffer")?;
        self.buffer.ok_or_else(|| engine_violation!("lumen3d::HostBuffer", "Initialized buffer without GPU memory"))
    }

    fn dispose(&mut self, device: &mut dyn GraphicsDevice) -> Result<()> {
        if !self.state.begin_dispose(self.kind)? {
            return Ok(());
        }
        if let Some(buffer) = self.buffer.take() {
            device.destroy_buffer(buffer);
        }
        self.state = BufferState::Disposed;
        Ok(())
    }
}

// ============================================================================
// UNIFORM BUFFER
// ============================================================================

/// Uniform buffer
#[derive(Debug)]
pub struct UniformBuffer(MappedBuffer);

impl UniformBuffer {
    pub fn new() -> Self {
        Self(MappedBuffer::new(Self::KIND, BufferUsage::UNIFORM))
    }

    /// Allocate `size` bytes, optionally filled with `initial`
    pub fn create(&mut self, device: &mut dyn GraphicsDevice, size: u64, initial: Option<&[u8]>) -> Result<()> {
        self.0.create(device, size, initial)
    }

    /// Copy `data` at `offset`
    pub fn update(&mut self, device: &mut dyn GraphicsDevice, offset: u64, data: &[u8]) -> Result<()> {
        self.0.update(device, offset, data)
    }

    /// Copy a plain-data value at offset 0
    pub fn update_value<T: bytemuck::Pod>(&mut self, device: &mut dyn GraphicsDevice, value: &T) -> Result<()> {
        self.0.update(device, 0, bytemuck::bytes_of(value))
    }

    pub fn size(&self) -> u64 {
        self.0.size
    }

    pub fn gpu_buffer(&self) -> Result<GpuBufferId> {
        self.0.gpu_buffer()
    }
}

impl Default for UniformBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuResource for UniformBuffer {
    const KIND: &'static str = "uniform buffer";

    fn state(&self) -> BufferState {
        self.0.state
    }

    fn dispose(&mut self, device: &mut dyn GraphicsDevice) -> Result<()> {
        self.0.dispose(device)
    }
}

// ============================================================================
// STORAGE BUFFER
// ============================================================================

/// Storage buffer
#[derive(Debug)]
pub struct StorageBuffer(MappedBuffer);

impl StorageBuffer {
    pub fn new() -> Self {
        Self(MappedBuffer::new(Self::KIND, BufferUsage::STORAGE))
    }

    pub fn create(&mut self, device: &mut dyn GraphicsDevice, size: u64, initial: Option<&[u8]>) -> Result<()> {
        self.0.create(device, size, initial)
    }

    pub fn update(&mut self, device: &mut dyn GraphicsDevice, offset: u64, data: &[u8]) -> Result<()> {
        self.0.update(device, offset, data)
    }

    /// Copy a slice of plain-data elements starting at element `first`
    pub fn update_elements<T: bytemuck::Pod>(
        &mut self,
        device: &mut dyn GraphicsDevice,
        first: u64,
        elements: &[T],
    ) -> Result<()> {
        let Some(offset) = first.checked_mul(std::mem::size_of::<T>() as u64) else {
            engine_bail_violation!(
                "lumen3d::HostBuffer",
                "{} overflow: element {} is past any capacity",
                self.0.kind, first
            );
        };
        self.0.update(device, offset, bytemuck::cast_slice(elements))
    }

    pub fn size(&self) -> u64 {
        self.0.size
    }

    pub fn gpu_buffer(&self) -> Result<GpuBufferId> {
        self.0.gpu_buffer()
    }
}

impl Default for StorageBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuResource for StorageBuffer {
    const KIND: &'static str = "storage buffer";

    fn state(&self) -> BufferState {
        self.0.state
    }

    fn dispose(&mut self, device: &mut dyn GraphicsDevice) -> Result<()> {
        self.0.dispose(device)
    }
}

#[cfg(test)]
#[path = "host_buffer_tests.rs"]
mod tests;
