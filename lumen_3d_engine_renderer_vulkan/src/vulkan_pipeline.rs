/// Shader modules, layouts and graphics pipeline creation

use ash::vk;
use lumen_3d_engine::lumen3d::device::{
    DescriptorSetLayoutDesc, GraphicsPipelineDesc, PipelineLayoutDesc, ShaderDesc, ShaderStage,
};
use lumen_3d_engine::lumen3d::{Error, Result};
use lumen_3d_engine::{engine_err, engine_warn};
use std::ffi::CString;

use crate::vulkan_format::{
    blend_attachment_to_vk, compare_op_to_vk, cull_mode_to_vk, descriptor_type_to_vk, front_face_to_vk,
    input_rate_to_vk, shader_stage_to_vk, stage_flags_to_vk, vertex_format_to_vk,
};

/// Compiled shader module with its stage and entry point
pub(crate) struct Shader {
    pub(crate) module: vk::ShaderModule,
    pub(crate) stage: ShaderStage,
    pub(crate) entry_point: CString,
}

pub(crate) fn create_shader(device: &ash::Device, desc: &ShaderDesc<'_>) -> Result<Shader> {
    // read_spv copies into u32 words, so the byte slice needs no alignment
    let code = ash::util::read_spv(&mut std::io::Cursor::new(desc.code)).map_err(|e| {
        engine_warn!("lumen3d::vulkan", "Invalid SPIR-V ({} bytes): {}", desc.code.len(), e);
        Error::InvalidResource(format!("Invalid SPIR-V: {}", e))
    })?;

    let entry_point = CString::new(desc.entry_point)
        .map_err(|_| Error::InvalidResource(format!("Invalid shader entry point {:?}", desc.entry_point)))?;

    let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
    let module = unsafe {
        device.create_shader_module(&create_info, None)
            .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to create shader module: {:?}", e))?
    };

    Ok(Shader {
        module,
        stage: desc.stage,
        entry_point,
    })
}

pub(crate) fn create_descriptor_set_layout(
    device: &ash::Device,
    desc: &DescriptorSetLayoutDesc,
) -> Result<vk::DescriptorSetLayout> {
    let bindings: Vec<vk::DescriptorSetLayoutBinding> = desc.bindings
        .iter()
        .map(|binding| {
            vk::DescriptorSetLayoutBinding::default()
                .binding(binding.binding)
                .descriptor_type(descriptor_type_to_vk(binding.descriptor_type))
                .descriptor_count(1)
                .stage_flags(stage_flags_to_vk(binding.stages))
        })
        .collect();

    let layout_create = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);

    unsafe {
        device.create_descriptor_set_layout(&layout_create, None)
            .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to create descriptor set layout: {:?}", e))
    }
}

pub(crate) fn create_pipeline_layout(
    device: &ash::Device,
    desc: &PipelineLayoutDesc,
    set_layouts: &[vk::DescriptorSetLayout],
) -> Result<vk::PipelineLayout> {
    let push_constant_ranges: Vec<vk::PushConstantRange> = desc.push_constant_ranges
        .iter()
        .map(|range| vk::PushConstantRange {
            stage_flags: stage_flags_to_vk(range.stages),
            offset: range.offset,
            size: range.size,
        })
        .collect();

    let layout_create_info = vk::PipelineLayoutCreateInfo::default()
        .set_layouts(set_layouts)
        .push_constant_ranges(&push_constant_ranges);

    unsafe {
        device.create_pipeline_layout(&layout_create_info, None)
            .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to create pipeline layout: {:?}", e))
    }
}

/// Build a triangle-list pipeline with dynamic viewport and scissor
pub(crate) fn create_graphics_pipeline(
    device: &ash::Device,
    desc: &GraphicsPipelineDesc,
    vertex_shader: &Shader,
    fragment_shader: &Shader,
    layout: vk::PipelineLayout,
    render_pass: vk::RenderPass,
) -> Result<vk::Pipeline> {
    if vertex_shader.stage != ShaderStage::Vertex || fragment_shader.stage != ShaderStage::Fragment {
        return Err(Error::InvalidResource(format!(
            "Pipeline shader stages mismatch (vertex slot: {:?}, fragment slot: {:?})",
            vertex_shader.stage, fragment_shader.stage
        )));
    }

    let shader_stages = [
        vk::PipelineShaderStageCreateInfo::default()
            .stage(shader_stage_to_vk(vertex_shader.stage))
            .module(vertex_shader.module)
            .name(&vertex_shader.entry_point),
        vk::PipelineShaderStageCreateInfo::default()
            .stage(shader_stage_to_vk(fragment_shader.stage))
            .module(fragment_shader.module)
            .name(&fragment_shader.entry_point),
    ];

    let vertex_bindings: Vec<vk::VertexInputBindingDescription> = desc.bindings
        .iter()
        .map(|binding| vk::VertexInputBindingDescription {
            binding: binding.binding,
            stride: binding.stride,
            input_rate: input_rate_to_vk(binding.input_rate),
        })
        .collect();

    let vertex_attributes: Vec<vk::VertexInputAttributeDescription> = desc.attributes
        .iter()
        .map(|attribute| vk::VertexInputAttributeDescription {
            location: attribute.location,
            binding: attribute.binding,
            format: vertex_format_to_vk(attribute.format),
            offset: attribute.offset,
        })
        .collect();

    let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
        .vertex_binding_descriptions(&vertex_bindings)
        .vertex_attribute_descriptions(&vertex_attributes);

    let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
        .primitive_restart_enable(false);

    // Viewport state (dynamic)
    let viewports = [vk::Viewport::default()];
    let scissors = [vk::Rect2D::default()];
    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewports(&viewports)
        .scissors(&scissors);

    let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(1.0)
        .cull_mode(cull_mode_to_vk(desc.rasterization.cull_mode))
        .front_face(front_face_to_vk(desc.rasterization.front_face))
        .depth_bias_enable(false);

    let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
        .depth_test_enable(desc.depth.test_enable)
        .depth_write_enable(desc.depth.write_enable)
        .depth_compare_op(compare_op_to_vk(desc.depth.compare_op))
        .depth_bounds_test_enable(false)
        .stencil_test_enable(false);

    let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
        .sample_shading_enable(false)
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);

    let color_blend_attachment = blend_attachment_to_vk(desc.blend);
    let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
        .logic_op_enable(false)
        .attachments(std::slice::from_ref(&color_blend_attachment));

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state = vk::PipelineDynamicStateCreateInfo::default()
        .dynamic_states(&dynamic_states);

    let pipeline_create_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&shader_stages)
        .vertex_input_state(&vertex_input_state)
        .input_assembly_state(&input_assembly_state)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization_state)
        .depth_stencil_state(&depth_stencil_state)
        .multisample_state(&multisample_state)
        .color_blend_state(&color_blend_state)
        .dynamic_state(&dynamic_state)
        .layout(layout)
        .render_pass(render_pass)
        .subpass(0);

    let pipelines = unsafe {
        device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_create_info], None)
            .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to create graphics pipeline: {:?}", e.1))?
    };

    pipelines
        .into_iter()
        .next()
        .ok_or_else(|| engine_err!("lumen3d::vulkan", "Graphics pipeline creation returned no pipeline"))
}
