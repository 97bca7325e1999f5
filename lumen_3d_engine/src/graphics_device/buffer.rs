/// GPU buffer description types

use bitflags::bitflags;

bitflags! {
    /// How a GPU buffer will be used
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const UNIFORM = 1 << 2;
        const STORAGE = 1 << 3;
        /// Source of a copy (staging buffers)
        const TRANSFER_SRC = 1 << 4;
        /// Destination of a copy (device-local buffers filled from staging)
        const TRANSFER_DST = 1 << 5;
    }
}

/// Where the buffer memory lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryLocation {
    /// Fast device memory, not visible from the CPU. Filled through staging.
    DeviceLocal,
    /// CPU-visible memory, persistently mapped for the buffer's lifetime
    HostVisible,
}

/// Buffer creation description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    /// Size in bytes (must be > 0)
    pub size: u64,
    /// Usage flags
    pub usage: BufferUsage,
    /// Memory location
    pub location: MemoryLocation,
}

impl BufferDesc {
    /// Host-visible staging buffer of `size` bytes
    pub fn staging(size: u64) -> Self {
        Self {
            size,
            usage: BufferUsage::TRANSFER_SRC,
            location: MemoryLocation::HostVisible,
        }
    }
}
