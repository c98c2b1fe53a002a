use std::{ffi::CStr, fs, path::Path};

use anyhow::{ensure, Context, Result};
use ash::vk::{
    AccessFlags, AttachmentDescription, AttachmentLoadOp, AttachmentReference, AttachmentStoreOp,
    ColorComponentFlags, CullModeFlags, Extent2D, Format, FrontFace, GraphicsPipelineCreateInfo,
    ImageLayout, Pipeline, PipelineBindPoint, PipelineCache, PipelineColorBlendAttachmentState,
    PipelineColorBlendStateCreateInfo, PipelineInputAssemblyStateCreateInfo, PipelineLayout,
    PipelineLayoutCreateInfo, PipelineMultisampleStateCreateInfo,
    PipelineRasterizationStateCreateInfo, PipelineShaderStageCreateInfo, PipelineStageFlags,
    PipelineVertexInputStateCreateInfo, PipelineViewportStateCreateInfo, PolygonMode,
    PrimitiveTopology, Rect2D, RenderPass, RenderPassCreateInfo, SampleCountFlags, ShaderModule,
    ShaderModuleCreateInfo, ShaderStageFlags, SubpassDependency, SubpassDescription, Viewport,
    SUBPASS_EXTERNAL,
};
use tracing::debug;

/// What the render loop consumes from the pipeline layer: a render pass to
/// begin, a layout, and the pipeline to bind. Built once at startup from
/// shader bytecode on disk; the engine destroys the three handles at
/// shutdown.
pub struct PipelineBundle {
    pub render_pass: RenderPass,
    pub pipeline_layout: PipelineLayout,
    pub pipeline: Pipeline,
}

impl PipelineBundle {
    pub fn new(
        device: &ash::Device,
        color_format: Format,
        extent: Extent2D,
        vertex_shader_path: &Path,
        fragment_shader_path: &Path,
    ) -> Result<Self> {
        let vertex_shader = load_shader_module(device, vertex_shader_path)?;
        let fragment_shader = load_shader_module(device, fragment_shader_path)?;

        let render_pass = create_render_pass(device, color_format)?;
        let pipeline_layout = create_pipeline_layout(device)?;
        let pipeline = create_graphics_pipeline(
            device,
            &[
                (vertex_shader, ShaderStageFlags::VERTEX),
                (fragment_shader, ShaderStageFlags::FRAGMENT),
            ],
            render_pass,
            pipeline_layout,
            extent,
        )?;

        // the modules are compiled into the pipeline and no longer needed
        unsafe {
            device.destroy_shader_module(vertex_shader, None);
            device.destroy_shader_module(fragment_shader, None);
        }

        Ok(Self {
            render_pass,
            pipeline_layout,
            pipeline,
        })
    }
}

/// Reads SPIR-V from disk and wraps it in a shader module.
fn load_shader_module(device: &ash::Device, path: &Path) -> Result<ShaderModule> {
    let bytes = fs::read(path).with_context(|| format!("reading shader {}", path.display()))?;
    ensure!(
        bytes.len() % 4 == 0,
        "shader {} is not valid SPIR-V",
        path.display()
    );
    let code = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect::<Vec<_>>();

    let shader_module_create_info = ShaderModuleCreateInfo::default().code(&code);
    let shader_module =
        unsafe { device.create_shader_module(&shader_module_create_info, None)? };
    debug!("loaded shader module from {}", path.display());
    Ok(shader_module)
}

/// One color attachment in the swapchain's format: cleared on load, stored
/// for presentation, with a single graphics subpass gated on color
/// attachment output from the acquire.
fn create_render_pass(device: &ash::Device, color_format: Format) -> Result<RenderPass> {
    let attachment_descriptions = [AttachmentDescription::default()
        .format(color_format)
        // no multisampling
        .samples(SampleCountFlags::TYPE_1)
        // clear the attachment before rendering
        .load_op(AttachmentLoadOp::CLEAR)
        // previous contents are cleared anyway, layout does not matter
        .initial_layout(ImageLayout::UNDEFINED)
        // keep the results for presentation
        .store_op(AttachmentStoreOp::STORE)
        .final_layout(ImageLayout::PRESENT_SRC_KHR)
        // no stencil
        .stencil_load_op(AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(AttachmentStoreOp::DONT_CARE)];

    let attachment_refs = [AttachmentReference::default()
        .attachment(0)
        .layout(ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];

    let subpass_descriptions = [SubpassDescription::default()
        .pipeline_bind_point(PipelineBindPoint::GRAPHICS)
        .color_attachments(&attachment_refs)];

    let subpass_dependencies = [SubpassDependency::default()
        .src_subpass(SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(AccessFlags::empty())
        .dst_stage_mask(PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(AccessFlags::COLOR_ATTACHMENT_WRITE)];

    let render_pass_create_info = RenderPassCreateInfo::default()
        .attachments(&attachment_descriptions)
        .subpasses(&subpass_descriptions)
        .dependencies(&subpass_dependencies);

    let render_pass = unsafe { device.create_render_pass(&render_pass_create_info, None)? };
    Ok(render_pass)
}

/// No descriptor sets and no push constants yet, so the layout is empty.
fn create_pipeline_layout(device: &ash::Device) -> Result<PipelineLayout> {
    let pipeline_layout_create_info = PipelineLayoutCreateInfo::default();
    let pipeline_layout =
        unsafe { device.create_pipeline_layout(&pipeline_layout_create_info, None)? };
    Ok(pipeline_layout)
}

fn create_graphics_pipeline(
    device: &ash::Device,
    shader_stages: &[(ShaderModule, ShaderStageFlags)],
    render_pass: RenderPass,
    pipeline_layout: PipelineLayout,
    extent: Extent2D,
) -> Result<Pipeline> {
    let shader_entrypoint_name = CStr::from_bytes_with_nul(b"main\0")?;
    let shader_stage_create_infos = shader_stages
        .iter()
        .map(|(shader_module, shader_stage)| {
            PipelineShaderStageCreateInfo::default()
                .stage(*shader_stage)
                .module(*shader_module)
                .name(shader_entrypoint_name)
        })
        .collect::<Vec<_>>();

    // no vertex buffers are bound, the geometry lives in the vertex shader
    let vertex_input_state_create_info = PipelineVertexInputStateCreateInfo::default();

    let input_assembly_state_create_info = PipelineInputAssemblyStateCreateInfo::default()
        .topology(PrimitiveTopology::TRIANGLE_LIST)
        .primitive_restart_enable(false);

    // one viewport covering the whole swapchain extent, no depth filtering
    let viewports = [Viewport::default()
        .x(0.0f32)
        .y(0.0f32)
        .width(extent.width as f32)
        .height(extent.height as f32)
        .min_depth(0.0f32)
        .max_depth(1.0f32)];
    let scissors = [Rect2D::default().extent(extent)];
    let viewport_state_create_info = PipelineViewportStateCreateInfo::default()
        .viewports(&viewports)
        .scissors(&scissors);

    let rasterization_state_create_info = PipelineRasterizationStateCreateInfo::default()
        // discard fragments outside the depth range instead of clamping
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        // filled polygons, default line width
        .polygon_mode(PolygonMode::FILL)
        .line_width(1.0f32)
        // cull back faces; clockwise winding is front facing
        .cull_mode(CullModeFlags::BACK)
        .front_face(FrontFace::CLOCKWISE)
        // depth biasing is for shadow mapping, not used here
        .depth_bias_enable(false);

    // multisampling disabled
    let multisample_state_create_info = PipelineMultisampleStateCreateInfo::default()
        .sample_shading_enable(false)
        .rasterization_samples(SampleCountFlags::TYPE_1);

    // no blending, the fragment shader output passes through
    let color_blend_attachment_states = [PipelineColorBlendAttachmentState::default()
        .blend_enable(false)
        .color_write_mask(ColorComponentFlags::RGBA)];
    let color_blend_state_create_info = PipelineColorBlendStateCreateInfo::default()
        .logic_op_enable(false)
        .attachments(&color_blend_attachment_states);

    let graphics_pipeline_create_infos = [GraphicsPipelineCreateInfo::default()
        .stages(&shader_stage_create_infos)
        .vertex_input_state(&vertex_input_state_create_info)
        .input_assembly_state(&input_assembly_state_create_info)
        .viewport_state(&viewport_state_create_info)
        .rasterization_state(&rasterization_state_create_info)
        .multisample_state(&multisample_state_create_info)
        .color_blend_state(&color_blend_state_create_info)
        .render_pass(render_pass)
        .layout(pipeline_layout)];

    let graphics_pipelines = unsafe {
        device.create_graphics_pipelines(PipelineCache::null(), &graphics_pipeline_create_infos, None)
    }
    .map_err(|(_, err)| err)?;

    Ok(graphics_pipelines[0])
}
