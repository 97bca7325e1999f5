/// SamplerCache - VkSampler per `SamplerKind`, created on first use

use ash::vk;
use lumen_3d_engine::engine_err;
use lumen_3d_engine::lumen3d::device::SamplerKind;
use lumen_3d_engine::lumen3d::Result;
use rustc_hash::FxHashMap;

#[derive(Default)]
pub(crate) struct SamplerCache {
    cache: FxHashMap<SamplerKind, vk::Sampler>,
}

impl SamplerCache {
    /// Get or create the sampler for `kind`
    pub(crate) fn get(&mut self, device: &ash::Device, kind: SamplerKind, max_anisotropy: f32) -> Result<vk::Sampler> {
        if let Some(&sampler) = self.cache.get(&kind) {
            return Ok(sampler);
        }

        let create_info = sampler_create_info(kind, max_anisotropy);
        let sampler = unsafe {
            device.create_sampler(&create_info, None)
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to create sampler {:?}: {:?}", kind, e))?
        };
        self.cache.insert(kind, sampler);
        Ok(sampler)
    }

    /// Destroy every cached sampler. Must run while the device is alive.
    pub(crate) fn shutdown(&mut self, device: &ash::Device) {
        for (_, sampler) in self.cache.drain() {
            unsafe { device.destroy_sampler(sampler, None); }
        }
    }
}

pub(crate) fn sampler_create_info(kind: SamplerKind, max_anisotropy: f32) -> vk::SamplerCreateInfo<'static> {
    let address = match kind {
        SamplerKind::LinearRepeat => vk::SamplerAddressMode::REPEAT,
        SamplerKind::LinearClamp => vk::SamplerAddressMode::CLAMP_TO_EDGE,
    };

    vk::SamplerCreateInfo::default()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .address_mode_u(address)
        .address_mode_v(address)
        .address_mode_w(address)
        .mip_lod_bias(0.0)
        .min_lod(0.0)
        .max_lod(vk::LOD_CLAMP_NONE)
        .border_color(vk::BorderColor::FLOAT_OPAQUE_BLACK)
        .unnormalized_coordinates(false)
        .compare_enable(false)
        .compare_op(vk::CompareOp::ALWAYS)
        .anisotropy_enable(max_anisotropy > 1.0)
        .max_anisotropy(max_anisotropy.max(1.0))
}

#[cfg(test)]
#[path = "vulkan_sampler_tests.rs"]
mod tests;
