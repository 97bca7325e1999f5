/// Render pass and framebuffer creation

use ash::vk;
use lumen_3d_engine::engine_err;
use lumen_3d_engine::lumen3d::device::{AttachmentDesc, Extent2D, ImageLayout, RenderPassDesc};
use lumen_3d_engine::lumen3d::Result;

use crate::vulkan_format::{format_to_vk, image_layout_to_vk, load_op_to_vk, store_op_to_vk};

fn attachment_to_vk(attachment: &AttachmentDesc) -> vk::AttachmentDescription {
    vk::AttachmentDescription::default()
        .format(format_to_vk(attachment.format))
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(load_op_to_vk(attachment.load_op))
        .store_op(store_op_to_vk(attachment.store_op))
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(image_layout_to_vk(attachment.initial_layout))
        .final_layout(image_layout_to_vk(attachment.final_layout))
}

/// Subpass dependencies of a single-subpass pass
///
/// The external -> 0 dependency orders attachment writes against the previous
/// use of the attachments. A pass whose color output is sampled afterwards
/// also gets a 0 -> external dependency towards fragment shader reads.
pub(crate) fn subpass_dependencies(desc: &RenderPassDesc) -> Vec<vk::SubpassDependency> {
    let (stage_mask, access_mask) = if desc.depth_attachment.is_some() {
        (
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        )
    } else {
        (
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        )
    };

    let mut dependencies = vec![vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(stage_mask | vk::PipelineStageFlags::FRAGMENT_SHADER)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(stage_mask)
        .dst_access_mask(access_mask)];

    let sampled_after = desc
        .color_attachments
        .iter()
        .any(|attachment| attachment.final_layout == ImageLayout::ShaderReadOnly);
    if sampled_after {
        dependencies.push(
            vk::SubpassDependency::default()
                .src_subpass(0)
                .dst_subpass(vk::SUBPASS_EXTERNAL)
                .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
                .src_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
                .dst_stage_mask(vk::PipelineStageFlags::FRAGMENT_SHADER)
                .dst_access_mask(vk::AccessFlags::SHADER_READ),
        );
    }
    dependencies
}

pub(crate) fn create_render_pass(device: &ash::Device, desc: &RenderPassDesc) -> Result<vk::RenderPass> {
    let mut attachments: Vec<vk::AttachmentDescription> =
        desc.color_attachments.iter().map(attachment_to_vk).collect();

    let color_attachment_refs: Vec<vk::AttachmentReference> = (0..desc.color_attachments.len())
        .map(|i| {
            vk::AttachmentReference::default()
                .attachment(i as u32)
                .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
        })
        .collect();

    let depth_attachment_ref = desc.depth_attachment.as_ref().map(|depth| {
        let depth_index = attachments.len() as u32;
        attachments.push(attachment_to_vk(depth));
        vk::AttachmentReference::default()
            .attachment(depth_index)
            .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
    });

    let mut subpass = vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_attachment_refs);
    if let Some(ref depth_ref) = depth_attachment_ref {
        subpass = subpass.depth_stencil_attachment(depth_ref);
    }

    let dependencies = subpass_dependencies(desc);

    let render_pass_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(std::slice::from_ref(&subpass))
        .dependencies(&dependencies);

    unsafe {
        device.create_render_pass(&render_pass_info, None)
            .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to create render pass: {:?}", e))
    }
}

pub(crate) fn create_framebuffer(
    device: &ash::Device,
    render_pass: vk::RenderPass,
    attachments: &[vk::ImageView],
    extent: Extent2D,
) -> Result<vk::Framebuffer> {
    let framebuffer_info = vk::FramebufferCreateInfo::default()
        .render_pass(render_pass)
        .attachments(attachments)
        .width(extent.width)
        .height(extent.height)
        .layers(1);

    unsafe {
        device.create_framebuffer(&framebuffer_info, None)
            .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to create framebuffer: {:?}", e))
    }
}

#[cfg(test)]
#[path = "vulkan_render_pass_tests.rs"]
mod tests;
