/// Buffer - a VkBuffer with its gpu-allocator allocation

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use lumen_3d_engine::lumen3d::device::{BufferDesc, MemoryLocation};
use lumen_3d_engine::lumen3d::{Error, Result};
use lumen_3d_engine::{engine_err, engine_error};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{buffer_usage_to_vk, memory_location_to_vk};

pub(crate) struct Buffer {
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    pub(crate) size: u64,
    location: MemoryLocation,
}

impl Buffer {
    /// Create the buffer and bind freshly allocated memory
    ///
    /// Host-visible buffers stay persistently mapped.
    pub(crate) fn new(ctx: &mut GpuContext, desc: &BufferDesc) -> Result<Self> {
        if desc.size == 0 {
            return Err(Error::InvalidResource("Buffer size must be greater than zero".to_string()));
        }

        unsafe {
            let buffer_create_info = vk::BufferCreateInfo::default()
                .size(desc.size)
                .usage(buffer_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = ctx.device.create_buffer(&buffer_create_info, None)
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to create buffer of size {} bytes: {:?}", desc.size, e))?;

            let requirements = ctx.device.get_buffer_memory_requirements(buffer);

            let allocation = match ctx.allocator.allocate(&AllocationCreateDesc {
                name: "buffer",
                requirements,
                location: memory_location_to_vk(desc.location),
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            }) {
                Ok(allocation) => allocation,
                Err(_) => {
                    ctx.device.destroy_buffer(buffer, None);
                    let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                    engine_error!("lumen3d::vulkan", "Out of GPU memory for buffer (required: {:.2} MB)", size_mb);
                    return Err(Error::OutOfMemory);
                }
            };

            if let Err(e) = ctx.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
                ctx.device.destroy_buffer(buffer, None);
                ctx.allocator.free(allocation).ok();
                return Err(engine_err!("lumen3d::vulkan", "Failed to bind buffer memory: {:?}", e));
            }

            Ok(Self {
                buffer,
                allocation: Some(allocation),
                size: desc.size,
                location: desc.location,
            })
        }
    }

    /// Copy `data` into the mapped memory at `offset`
    pub(crate) fn write(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        if self.location != MemoryLocation::HostVisible {
            return Err(Error::InvalidResource("Write to a device-local buffer".to_string()));
        }
        let end = offset.checked_add(data.len() as u64);
        if end.map_or(true, |end| end > self.size) {
            return Err(Error::InvalidResource(format!(
                "Write of {} bytes at offset {} past the end of a {} byte buffer",
                data.len(), offset, self.size
            )));
        }

        let mapped_ptr = self.allocation
            .as_ref()
            .and_then(|allocation| allocation.mapped_ptr())
            .ok_or_else(|| Error::BackendError("Buffer is not CPU-accessible".to_string()))?
            .as_ptr() as *mut u8;

        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped_ptr.add(offset as usize), data.len());
        }
        Ok(())
    }

    pub(crate) fn destroy(mut self, ctx: &mut GpuContext) {
        unsafe {
            ctx.device.destroy_buffer(self.buffer, None);
        }
        if let Some(allocation) = self.allocation.take() {
            ctx.allocator.free(allocation).ok();
        }
    }
}
