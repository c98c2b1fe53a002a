use anyhow::Result;
use ash::vk::{self, Extent2D, FramebufferCreateInfo, ImageView, RenderPass};

/// Binds each swapchain image view to the render pass, one framebuffer per
/// view. A single failure aborts the whole build: a frame with a missing
/// framebuffer can never be rendered safely, so the caller treats this as
/// fatal.
pub fn create_framebuffers(
    device: &ash::Device,
    render_pass: RenderPass,
    extent: Extent2D,
    image_views: &[ImageView],
) -> Result<Vec<vk::Framebuffer>> {
    let framebuffers = image_views
        .iter()
        .map(|image_view| {
            let attachments = [*image_view];
            let create_info = FramebufferCreateInfo::default()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);
            let framebuffer = unsafe { device.create_framebuffer(&create_info, None)? };
            Ok::<_, vk::Result>(framebuffer)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(framebuffers)
}
