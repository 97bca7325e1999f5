/// Descriptor pools and descriptor set updates

use ash::vk;
use lumen_3d_engine::engine_err;
use lumen_3d_engine::lumen3d::device::{DescriptorPoolDesc, DescriptorPoolId};
use lumen_3d_engine::lumen3d::Result;

use crate::vulkan_format::descriptor_type_to_vk;

/// Allocated set and the pool it came from
pub(crate) struct DescriptorSet {
    pub(crate) set: vk::DescriptorSet,
    pub(crate) pool: DescriptorPoolId,
}

/// Descriptor write with its resource already resolved to Vulkan handles
pub(crate) struct ResolvedWrite {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub resource: ResolvedResource,
}

pub(crate) enum ResolvedResource {
    Buffer { buffer: vk::Buffer, range: vk::DeviceSize },
    Image { view: vk::ImageView, sampler: vk::Sampler },
}

/// Pool for `max_sets` sets of one descriptor each, all of one type
pub(crate) fn pool_sizes(desc: &DescriptorPoolDesc) -> [vk::DescriptorPoolSize; 1] {
    [vk::DescriptorPoolSize {
        ty: descriptor_type_to_vk(desc.descriptor_type),
        descriptor_count: desc.max_sets,
    }]
}

pub(crate) fn create_descriptor_pool(device: &ash::Device, desc: &DescriptorPoolDesc) -> Result<vk::DescriptorPool> {
    let pool_sizes = pool_sizes(desc);
    let info = vk::DescriptorPoolCreateInfo::default()
        .pool_sizes(&pool_sizes)
        .max_sets(desc.max_sets);

    unsafe {
        device.create_descriptor_pool(&info, None)
            .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to create descriptor pool ({:?} x{}): {:?}", desc.descriptor_type, desc.max_sets, e))
    }
}

pub(crate) fn allocate_descriptor_set(
    device: &ash::Device,
    pool: vk::DescriptorPool,
    layout: vk::DescriptorSetLayout,
) -> Result<vk::DescriptorSet> {
    let layouts = [layout];
    let alloc_info = vk::DescriptorSetAllocateInfo::default()
        .descriptor_pool(pool)
        .set_layouts(&layouts);

    let sets = unsafe {
        device.allocate_descriptor_sets(&alloc_info)
            .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to allocate descriptor set: {:?}", e))?
    };
    sets.into_iter()
        .next()
        .ok_or_else(|| engine_err!("lumen3d::vulkan", "Descriptor set allocation returned no set"))
}

pub(crate) fn write_descriptor_set(device: &ash::Device, set: vk::DescriptorSet, writes: &[ResolvedWrite]) {
    // Info structs must outlive the write array that points into them
    let buffer_infos: Vec<vk::DescriptorBufferInfo> = writes
        .iter()
        .map(|write| match write.resource {
            ResolvedResource::Buffer { buffer, range } => vk::DescriptorBufferInfo {
                buffer,
                offset: 0,
                range: if range == 0 { vk::WHOLE_SIZE } else { range },
            },
            ResolvedResource::Image { .. } => vk::DescriptorBufferInfo::default(),
        })
        .collect();

    let image_infos: Vec<vk::DescriptorImageInfo> = writes
        .iter()
        .map(|write| match write.resource {
            ResolvedResource::Image { view, sampler } => vk::DescriptorImageInfo {
                sampler,
                image_view: view,
                image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            },
            ResolvedResource::Buffer { .. } => vk::DescriptorImageInfo::default(),
        })
        .collect();

    let descriptor_writes: Vec<vk::WriteDescriptorSet> = writes
        .iter()
        .enumerate()
        .map(|(i, write)| {
            let base = vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(write.binding)
                .dst_array_element(0)
                .descriptor_type(write.descriptor_type);
            match write.resource {
                ResolvedResource::Buffer { .. } => base.buffer_info(std::slice::from_ref(&buffer_infos[i])),
                ResolvedResource::Image { .. } => base.image_info(std::slice::from_ref(&image_infos[i])),
            }
        })
        .collect();

    unsafe {
        device.update_descriptor_sets(&descriptor_writes, &[]);
    }
}

#[cfg(test)]
#[path = "vulkan_descriptor_tests.rs"]
mod tests;
