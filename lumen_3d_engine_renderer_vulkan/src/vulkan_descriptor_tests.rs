use super::*;
use lumen_3d_engine::lumen3d::device::DescriptorType;

#[test]
fn test_pool_sizes_single_type() {
    let sizes = pool_sizes(&DescriptorPoolDesc {
        descriptor_type: DescriptorType::CombinedImageSampler,
        max_sets: 256,
    });

    assert_eq!(sizes.len(), 1);
    assert_eq!(sizes[0].ty, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
    assert_eq!(sizes[0].descriptor_count, 256);
}

#[test]
fn test_pool_sizes_uniform() {
    let sizes = pool_sizes(&DescriptorPoolDesc {
        descriptor_type: DescriptorType::UniformBuffer,
        max_sets: 64,
    });

    assert_eq!(sizes[0].ty, vk::DescriptorType::UNIFORM_BUFFER);
    assert_eq!(sizes[0].descriptor_count, 64);
}
