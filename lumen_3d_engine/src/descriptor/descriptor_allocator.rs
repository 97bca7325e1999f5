/// Fixed-capacity descriptor pools, one per descriptor kind
///
/// Every kind has a single-binding set layout (binding 0) and a pool sized
/// once at startup. Allocations append to the kind's list and return the
/// index, which stays valid until the allocator is destroyed. Sets are never
/// freed individually.

use crate::config::DescriptorPoolConfig;
use crate::error::Result;
use crate::graphics_device::{
    DescriptorBinding, DescriptorPoolDesc, DescriptorPoolId, DescriptorResource, DescriptorSetId,
    DescriptorSetLayoutDesc, DescriptorSetLayoutId, DescriptorType, DescriptorWrite, GpuBufferId,
    GpuImageId, GraphicsDevice, SamplerKind, ShaderStageFlags,
};

/// What a descriptor set points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    Uniform,
    Storage,
    Texture,
    Cubemap,
}

impl DescriptorKind {
    pub const ALL: [DescriptorKind; 4] = [
        DescriptorKind::Uniform,
        DescriptorKind::Storage,
        DescriptorKind::Texture,
        DescriptorKind::Cubemap,
    ];

    pub fn descriptor_type(self) -> DescriptorType {
        match self {
            DescriptorKind::Uniform => DescriptorType::UniformBuffer,
            DescriptorKind::Storage => DescriptorType::StorageBuffer,
            DescriptorKind::Texture | DescriptorKind::Cubemap => DescriptorType::CombinedImageSampler,
        }
    }

    fn stages(self) -> ShaderStageFlags {
        match self {
            DescriptorKind::Uniform | DescriptorKind::Storage => {
                ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT
            }
            DescriptorKind::Texture | DescriptorKind::Cubemap => ShaderStageFlags::FRAGMENT,
        }
    }

    fn capacity(self, config: &DescriptorPoolConfig) -> u32 {
        match self {
            DescriptorKind::Uniform => config.uniform,
            DescriptorKind::Storage => config.storage,
            DescriptorKind::Texture => config.textures,
            DescriptorKind::Cubemap => config.cubemaps,
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

struct KindPool {
    layout: DescriptorSetLayoutId,
    pool: DescriptorPoolId,
    capacity: u32,
    sets: Vec<DescriptorSetId>,
}

/// Owner of every descriptor pool, layout and set
pub struct DescriptorAllocator {
    pools: Vec<KindPool>,
}

impl DescriptorAllocator {
    /// Create one layout and one pool per kind
    pub fn new(device: &mut dyn GraphicsDevice, config: &DescriptorPoolConfig) -> Result<Self> {
        let mut allocator = Self { pools: Vec::with_capacity(DescriptorKind::ALL.len()) };
        for kind in DescriptorKind::ALL {
            match Self::create_kind_pool(device, kind, kind.capacity(config)) {
                Ok(pool) => allocator.pools.push(pool),
                Err(e) => {
                    allocator.destroy(device);
                    return Err(e);
                }
            }
        }
        engine_debug!(
            "lumen3d::DescriptorAllocator",
            "Descriptor pools ready (uniform {}, storage {}, textures {}, cubemaps {})",
            config.uniform, config.storage, config.textures, config.cubemaps
        );
        Ok(allocator)
    }

    fn create_kind_pool(device: &mut dyn GraphicsDevice, kind: DescriptorKind, capacity: u32) -> Result<KindPool> {
        let layout = device.create_descriptor_set_layout(&DescriptorSetLayoutDesc {
            bindings: vec![DescriptorBinding {
                binding: 0,
                descriptor_type: kind.descriptor_type(),
                stages: kind.stages(),
            }],
        })?;
        let pool = match device.create_descriptor_pool(&DescriptorPoolDesc {
            descriptor_type: kind.descriptor_type(),
            max_sets: capacity,
        }) {
            Ok(pool) => pool,
            Err(e) => {
                device.destroy_descriptor_set_layout(layout);
                return Err(e);
            }
        };
        Ok(KindPool { layout, pool, capacity, sets: Vec::new() })
    }

    // ===== ALLOCATION =====

    /// Descriptor for a sampled 2D image
    pub fn create_texture_descriptor(
        &mut self,
        device: &mut dyn GraphicsDevice,
        image: GpuImageId,
        sampler: SamplerKind,
    ) -> Result<usize> {
        self.allocate(device, DescriptorKind::Texture, DescriptorResource::Image { image, sampler })
    }

    /// Descriptor for a cubemap, sampled with clamped edges
    pub fn create_cubemap_descriptor(&mut self, device: &mut dyn GraphicsDevice, image: GpuImageId) -> Result<usize> {
        let sampler = SamplerKind::LinearClamp;
        self.allocate(device, DescriptorKind::Cubemap, DescriptorResource::Image { image, sampler })
    }

    /// Descriptor for the first `range` bytes of a uniform buffer
    pub fn create_uniform_descriptor(
        &mut self,
        device: &mut dyn GraphicsDevice,
        buffer: GpuBufferId,
        range: u64,
    ) -> Result<usize> {
        self.allocate(device, DescriptorKind::Uniform, DescriptorResource::Buffer { buffer, range })
    }

    /// Descriptor for the first `range` bytes of a storage buffer
    pub fn create_storage_descriptor(
        &mut self,
        device: &mut dyn GraphicsDevice,
        buffer: GpuBufferId,
        range: u64,
    ) -> Result<usize> {
        self.allocate(device, DescriptorKind::Storage, DescriptorResource::Buffer { buffer, range })
    }

    /// Point an existing texture descriptor at another image, keeping its index
    ///
    /// The set must not be in use by a pending frame.
    pub fn rewrite_texture_descriptor(
        &mut self,
        device: &mut dyn GraphicsDevice,
        index: usize,
        image: GpuImageId,
        sampler: SamplerKind,
    ) -> Result<()> {
        let set = self.get_descriptor_set(DescriptorKind::Texture, index)?;
        device.write_descriptor_set(set, &[Self::write(DescriptorKind::Texture, DescriptorResource::Image { image, sampler })])
    }

    fn allocate(
        &mut self,
        device: &mut dyn GraphicsDevice,
        kind: DescriptorKind,
        resource: DescriptorResource,
    ) -> Result<usize> {
        let entry = &mut self.pools[kind.slot()];
        if entry.sets.len() as u32 >= entry.capacity {
            engine_bail_violation!(
                "lumen3d::DescriptorAllocator",
                "{:?} descriptor pool exhausted (capacity {})",
                kind, entry.capacity
            );
        }
        let set = device.allocate_descriptor_set(entry.pool, entry.layout)?;
        device.write_descriptor_set(set, &[Self::write(kind, resource)])?;
        entry.sets.push(set);
        Ok(entry.sets.len() - 1)
    }

    fn write(kind: DescriptorKind, resource: DescriptorResource) -> DescriptorWrite {
        DescriptorWrite {
            binding: 0,
            descriptor_type: kind.descriptor_type(),
            resource,
        }
    }

    // ===== ACCESS =====

    /// Resolve an index returned by one of the `create_*_descriptor` calls
    pub fn get_descriptor_set(&self, kind: DescriptorKind, index: usize) -> Result<DescriptorSetId> {
        let entry = &self.pools[kind.slot()];
        match entry.sets.get(index) {
            Some(set) => Ok(*set),
            None => Err(engine_violation!(
                "lumen3d::DescriptorAllocator",
                "{:?} descriptor {} out of range ({} allocated)",
                kind, index, entry.sets.len()
            )),
        }
    }

    /// Set layout shared by every set of `kind`
    pub fn layout(&self, kind: DescriptorKind) -> DescriptorSetLayoutId {
        self.pools[kind.slot()].layout
    }

    pub fn allocated(&self, kind: DescriptorKind) -> usize {
        self.pools[kind.slot()].sets.len()
    }

    pub fn capacity(&self, kind: DescriptorKind) -> u32 {
        self.pools[kind.slot()].capacity
    }

    /// Release every pool (and with it every set) and layout
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        for entry in self.pools.drain(..) {
            device.destroy_descriptor_pool(entry.pool);
            device.destroy_descriptor_set_layout(entry.layout);
        }
    }
}

#[cfg(test)]
#[path = "descriptor_allocator_tests.rs"]
mod tests;
