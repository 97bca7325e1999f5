/// Image - a VkImage, its default view and its allocation
///
/// Swapchain images are wrapped too (without an allocation) so framebuffers
/// can reference them by `GpuImageId` like any other attachment.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use lumen_3d_engine::lumen3d::device::{ImageDesc, ImageFormat, ImageKind, ImageLayout};
use lumen_3d_engine::lumen3d::{Error, Result};
use lumen_3d_engine::{engine_err, engine_error};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{aspect_of, format_to_vk, image_usage_to_vk, image_view_type_to_vk};

pub(crate) struct Image {
    pub(crate) image: vk::Image,
    pub(crate) view: vk::ImageView,
    /// `None` for swapchain images, owned by the swapchain
    allocation: Option<Allocation>,
    pub(crate) format: ImageFormat,
    pub(crate) kind: ImageKind,
    pub(crate) extent: vk::Extent2D,
}

impl Image {
    pub(crate) fn new(ctx: &mut GpuContext, desc: &ImageDesc) -> Result<Self> {
        if desc.width == 0 || desc.height == 0 {
            return Err(Error::InvalidResource(format!(
                "Image extent must be non-zero ({}x{})",
                desc.width, desc.height
            )));
        }

        let format = format_to_vk(desc.format);
        let flags = match desc.kind {
            ImageKind::Tex2D => vk::ImageCreateFlags::empty(),
            ImageKind::Cube => vk::ImageCreateFlags::CUBE_COMPATIBLE,
        };

        unsafe {
            let image_create_info = vk::ImageCreateInfo::default()
                .flags(flags)
                .image_type(vk::ImageType::TYPE_2D)
                .format(format)
                .extent(vk::Extent3D {
                    width: desc.width,
                    height: desc.height,
                    depth: 1,
                })
                .mip_levels(1)
                .array_layers(desc.kind.layer_count())
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(image_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = ctx.device.create_image(&image_create_info, None)
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to create image: {:?}", e))?;

            let requirements = ctx.device.get_image_memory_requirements(image);

            let allocation = match ctx.allocator.allocate(&AllocationCreateDesc {
                name: "image",
                requirements,
                location: gpu_allocator::MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            }) {
                Ok(allocation) => allocation,
                Err(_) => {
                    ctx.device.destroy_image(image, None);
                    let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                    engine_error!(
                        "lumen3d::vulkan",
                        "Out of GPU memory for image (size: {}x{}, layers: {}, {:.2} MB)",
                        desc.width, desc.height, desc.kind.layer_count(), size_mb
                    );
                    return Err(Error::OutOfMemory);
                }
            };

            if let Err(e) = ctx.device.bind_image_memory(image, allocation.memory(), allocation.offset()) {
                ctx.device.destroy_image(image, None);
                ctx.allocator.free(allocation).ok();
                return Err(engine_err!("lumen3d::vulkan", "Failed to bind image memory: {:?}", e));
            }

            let view = match create_view(&ctx.device, image, format, desc.format, desc.kind) {
                Ok(view) => view,
                Err(e) => {
                    ctx.device.destroy_image(image, None);
                    ctx.allocator.free(allocation).ok();
                    return Err(e);
                }
            };

            Ok(Self {
                image,
                view,
                allocation: Some(allocation),
                format: desc.format,
                kind: desc.kind,
                extent: vk::Extent2D { width: desc.width, height: desc.height },
            })
        }
    }

    /// Wrap a swapchain image with a fresh 2D view
    pub(crate) fn from_swapchain(
        device: &ash::Device,
        image: vk::Image,
        format: ImageFormat,
        extent: vk::Extent2D,
    ) -> Result<Self> {
        let view = create_view(device, image, format_to_vk(format), format, ImageKind::Tex2D)?;
        Ok(Self {
            image,
            view,
            allocation: None,
            format,
            kind: ImageKind::Tex2D,
            extent,
        })
    }

    pub(crate) fn subresource_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: aspect_of(self.format),
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: self.kind.layer_count(),
        }
    }

    /// Record a transition of every layer from `old` to `new`
    pub(crate) fn record_transition(
        &self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        old: vk::ImageLayout,
        new: vk::ImageLayout,
    ) {
        let (src_access, src_stage) = layout_access(old, true);
        let (dst_access, dst_stage) = layout_access(new, false);

        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(old)
            .new_layout(new)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.image)
            .subresource_range(self.subresource_range())
            .src_access_mask(src_access)
            .dst_access_mask(dst_access);

        unsafe {
            device.cmd_pipeline_barrier(
                cmd,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
    }

    /// Record a copy of a tightly packed buffer into every layer, leaving the image shader-readable
    pub(crate) fn record_upload(&self, device: &ash::Device, cmd: vk::CommandBuffer, src: vk::Buffer) {
        self.record_transition(device, cmd, vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL);

        let layer_size = self.extent.width as u64
            * self.extent.height as u64
            * self.format.bytes_per_texel() as u64;
        let regions: Vec<vk::BufferImageCopy> = (0..self.kind.layer_count())
            .map(|layer| vk::BufferImageCopy {
                buffer_offset: layer as u64 * layer_size,
                buffer_row_length: 0,
                buffer_image_height: 0,
                image_subresource: vk::ImageSubresourceLayers {
                    aspect_mask: aspect_of(self.format),
                    mip_level: 0,
                    base_array_layer: layer,
                    layer_count: 1,
                },
                image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
                image_extent: vk::Extent3D {
                    width: self.extent.width,
                    height: self.extent.height,
                    depth: 1,
                },
            })
            .collect();

        unsafe {
            device.cmd_copy_buffer_to_image(
                cmd,
                src,
                self.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &regions,
            );
        }

        self.record_transition(
            device,
            cmd,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        );
    }

    /// Bytes a tightly packed upload must contain
    pub(crate) fn upload_size(&self) -> u64 {
        ImageDesc {
            width: self.extent.width,
            height: self.extent.height,
            format: self.format,
            usage: lumen_3d_engine::lumen3d::device::ImageUsage::empty(),
            kind: self.kind,
        }
        .upload_size()
    }

    pub(crate) fn destroy(mut self, ctx: &mut GpuContext) {
        unsafe {
            ctx.device.destroy_image_view(self.view, None);
            if let Some(allocation) = self.allocation.take() {
                ctx.device.destroy_image(self.image, None);
                ctx.allocator.free(allocation).ok();
            }
        }
    }
}

fn create_view(
    device: &ash::Device,
    image: vk::Image,
    vk_format: vk::Format,
    format: ImageFormat,
    kind: ImageKind,
) -> Result<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(image_view_type_to_vk(kind))
        .format(vk_format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: aspect_of(format),
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: kind.layer_count(),
        });

    unsafe {
        device.create_image_view(&create_info, None)
            .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to create image view: {:?}", e))
    }
}

/// Access mask and pipeline stage on one side of a layout transition
pub(crate) fn layout_access(layout: vk::ImageLayout, source: bool) -> (vk::AccessFlags, vk::PipelineStageFlags) {
    match layout {
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => (vk::AccessFlags::TRANSFER_WRITE, vk::PipelineStageFlags::TRANSFER),
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL => (vk::AccessFlags::TRANSFER_READ, vk::PipelineStageFlags::TRANSFER),
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => (vk::AccessFlags::SHADER_READ, vk::PipelineStageFlags::FRAGMENT_SHADER),
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => (
            vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        ),
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL => (
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        ),
        vk::ImageLayout::PRESENT_SRC_KHR => (vk::AccessFlags::empty(), vk::PipelineStageFlags::BOTTOM_OF_PIPE),
        _ if source => (vk::AccessFlags::empty(), vk::PipelineStageFlags::TOP_OF_PIPE),
        _ => (vk::AccessFlags::empty(), vk::PipelineStageFlags::BOTTOM_OF_PIPE),
    }
}

#[cfg(test)]
#[path = "vulkan_image_tests.rs"]
mod tests;
