/// Descriptor set layout, pool and write description types

use crate::graphics_device::{GpuBufferId, GpuImageId, ShaderStageFlags};

/// Descriptor type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    UniformBuffer,
    StorageBuffer,
    CombinedImageSampler,
}

/// One binding of a descriptor set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    pub stages: ShaderStageFlags,
}

/// Descriptor set layout creation description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorSetLayoutDesc {
    pub bindings: Vec<DescriptorBinding>,
}

/// Descriptor pool creation description
///
/// A pool serves a single descriptor type and holds at most `max_sets` sets,
/// each with one descriptor of that type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorPoolDesc {
    pub descriptor_type: DescriptorType,
    pub max_sets: u32,
}

/// Sampler configuration used with a combined image sampler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerKind {
    /// Linear filtering, repeat addressing (material textures)
    LinearRepeat,
    /// Linear filtering, clamp-to-edge addressing (render targets, cubemaps)
    LinearClamp,
}

/// Resource written into a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorResource {
    Buffer { buffer: GpuBufferId, range: u64 },
    Image { image: GpuImageId, sampler: SamplerKind },
}

/// A single descriptor update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorWrite {
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    pub resource: DescriptorResource,
}
