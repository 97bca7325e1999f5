/// GpuContext - the Vulkan objects every resource module needs
///
/// Contains:
/// - Instance and logical device for Vulkan API calls
/// - Allocator for memory management
/// - Graphics queue for command submission
/// - Command pool for one-shot upload operations
///
/// Destruction is driven by `VulkanGraphicsDevice::drop()`, which releases
/// every resource first and then calls `destroy`.

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use lumen_3d_engine::lumen3d::{Error, Result};
use lumen_3d_engine::{engine_err, engine_error};
use std::mem::ManuallyDrop;

pub(crate) struct GpuContext {
    pub instance: ash::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub device: ash::Device,

    /// Dropped explicitly before the device is destroyed
    pub allocator: ManuallyDrop<Allocator>,

    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,
    pub present_queue: vk::Queue,

    /// TRANSIENT + RESET_COMMAND_BUFFER pool for one-shot uploads
    upload_command_pool: vk::CommandPool,
}

/// Score a physical device, or `None` when it cannot be used
///
/// Discrete GPUs win over integrated ones, which win over everything else.
pub(crate) fn rate_physical_device(properties: &vk::PhysicalDeviceProperties, has_queues: bool) -> Option<u32> {
    if !has_queues {
        return None;
    }
    let score = match properties.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 500,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 250,
        _ => 100,
    };
    Some(score)
}

impl GpuContext {
    /// Create the allocator and the upload pool on top of an existing device
    pub(crate) fn new(
        instance: ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        graphics_queue_family: u32,
        present_queue_family: u32,
    ) -> Result<Self> {
        unsafe {
            let graphics_queue = device.get_device_queue(graphics_queue_family, 0);
            let present_queue = device.get_device_queue(present_queue_family, 0);

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| {
                engine_error!("lumen3d::vulkan", "Failed to create GPU allocator: {:?}", e);
                Error::InitializationFailed(format!("Failed to create allocator: {:?}", e))
            })?;

            let upload_pool_create_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(graphics_queue_family)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

            let upload_command_pool = device.create_command_pool(&upload_pool_create_info, None)
                .map_err(|e| {
                    engine_error!("lumen3d::vulkan", "Failed to create upload command pool: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create upload command pool: {:?}", e))
                })?;

            Ok(Self {
                instance,
                physical_device,
                device,
                allocator: ManuallyDrop::new(allocator),
                graphics_queue,
                graphics_queue_family,
                present_queue,
                upload_command_pool,
            })
        }
    }

    /// Record `record` into a fresh command buffer, submit it and wait
    pub(crate) fn immediate_submit<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        unsafe {
            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(self.upload_command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            let command_buffer = self.device.allocate_command_buffers(&alloc_info)
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to allocate upload command buffer: {:?}", e))?[0];

            let result = self.record_and_wait(command_buffer, record);
            self.device.free_command_buffers(self.upload_command_pool, &[command_buffer]);
            result
        }
    }

    unsafe fn record_and_wait<F>(&self, command_buffer: vk::CommandBuffer, record: F) -> Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        self.device.begin_command_buffer(command_buffer, &begin_info)
            .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to begin upload command buffer: {:?}", e))?;

        record(&self.device, command_buffer);

        self.device.end_command_buffer(command_buffer)
            .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to end upload command buffer: {:?}", e))?;

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        self.device.queue_submit(self.graphics_queue, &[submit_info], vk::Fence::null())
            .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to submit upload commands: {:?}", e))?;
        self.device.queue_wait_idle(self.graphics_queue)
            .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to wait for upload completion: {:?}", e))
    }

    /// Free the allocator and destroy the upload pool and the device
    ///
    /// Every allocation must have been returned to the allocator.
    pub(crate) unsafe fn destroy(&mut self) {
        self.device.destroy_command_pool(self.upload_command_pool, None);
        ManuallyDrop::drop(&mut self.allocator);
        self.device.destroy_device(None);
    }
}

#[cfg(test)]
#[path = "vulkan_context_tests.rs"]
mod tests;
