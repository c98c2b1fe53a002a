use std::path::Path;

use anyhow::{Context, Result};
use ash::{
    vk::{
        self, ClearColorValue, ClearValue, CommandBuffer, CommandBufferBeginInfo,
        CommandBufferResetFlags, CommandPool, Image, ImageView, PipelineBindPoint,
        PipelineStageFlags, Rect2D, RenderPassBeginInfo, SubmitInfo, SubpassContents,
    },
    Device, Entry,
};
use tracing::{error, info};
use winit::{raw_window_handle::HasDisplayHandle, window::Window};

use crate::{
    commands,
    device::{create_logical_device, QueueHandles, REQUIRED_DEVICE_EXTENSIONS},
    error::{FrameError, FrameStatus},
    framebuffer::create_framebuffers,
    physical_device::select_physical_device,
    pipeline::PipelineBundle,
    surface::Surface,
    swapchain::Swapchain,
    sync::{drive_frame, AcquiredImage, FrameDriver, FrameSync, FRAME_TIMEOUT_NS},
    Instance,
};

/// Fixed background color for the render pass clear.
const CLEAR_COLOR: [f32; 4] = [0.67, 0.08, 0.16, 1.0];

/// The two fixed paths the pipeline layer loads shader bytecode from.
const VERTEX_SHADER_PATH: &str = "shaders/vert.spv";
const FRAGMENT_SHADER_PATH: &str = "shaders/frag.spv";

/// Per-swapchain-image resources, fully populated before the first frame.
/// The image is borrowed from the swapchain and never destroyed
/// individually; view and framebuffer are destroyed in reverse order at
/// shutdown, the command buffer goes away with the pool.
pub struct SwapchainFrame {
    pub image: Image,
    pub view: ImageView,
    pub framebuffer: vk::Framebuffer,
    pub command_buffer: CommandBuffer,
}

/// Root of the ownership graph. Every long-lived handle is owned here and
/// handed to components as a borrow; nothing is global.
///
/// Field order matters for the implicit drops: the surface must go before
/// the instance, and both only after `shutdown()` has destroyed everything
/// created from the logical device.
pub struct RenderEngine {
    frames: Vec<SwapchainFrame>,
    sync: FrameSync,
    command_pool: CommandPool,
    pipeline: PipelineBundle,
    swapchain: Swapchain,
    queues: QueueHandles,
    device: Device,
    // held only for destruction order: surface drops before instance
    _surface: Surface,
    _instance: Instance,
    _entry: Entry,
    shut_down: bool,
}

impl RenderEngine {
    /// Brings up the whole rendering side against an existing window. Any
    /// failure here is fatal: a renderer without a drawable surface has no
    /// recovery path.
    pub fn new(window: &Window) -> Result<Self> {
        let entry = unsafe { Entry::load() }.context("loading the vulkan library")?;

        let required_extensions =
            ash_window::enumerate_required_extensions(window.display_handle()?.as_raw())?;
        let instance = Instance::new(&entry, required_extensions)?;
        let surface = Surface::new(&entry, &instance, window)?;

        let physical_device =
            select_physical_device(&instance, &surface, REQUIRED_DEVICE_EXTENSIONS)?;
        let (device, queues, families) =
            create_logical_device(&instance, &physical_device, &surface)?;

        let window_size = window.inner_size();
        let (swapchain, images) = Swapchain::new(
            &instance,
            &device,
            &physical_device,
            &surface,
            &families,
            window_size.width,
            window_size.height,
        )?;

        let pipeline = PipelineBundle::new(
            &device,
            swapchain.format,
            swapchain.extent,
            Path::new(VERTEX_SHADER_PATH),
            Path::new(FRAGMENT_SHADER_PATH),
        )?;

        let image_views = images.iter().map(|image| image.view).collect::<Vec<_>>();
        let framebuffers =
            create_framebuffers(&device, pipeline.render_pass, swapchain.extent, &image_views)?;

        let command_pool = commands::create_command_pool(&device, &families)?;
        let command_buffers =
            commands::allocate_command_buffers(&device, command_pool, images.len() as u32)?;

        let frames = images
            .into_iter()
            .zip(framebuffers)
            .zip(command_buffers)
            .map(|((image, framebuffer), command_buffer)| SwapchainFrame {
                image: image.image,
                view: image.view,
                framebuffer,
                command_buffer,
            })
            .collect::<Vec<_>>();

        let sync = FrameSync::new(&device)?;

        info!(
            "render engine ready, {} swapchain images at {}x{}",
            frames.len(),
            swapchain.extent.width,
            swapchain.extent.height
        );

        Ok(Self {
            frames,
            sync,
            command_pool,
            pipeline,
            swapchain,
            queues,
            device,
            _surface: surface,
            _instance: instance,
            _entry: entry,
            shut_down: false,
        })
    }

    /// Renders one frame. Call once per event-loop iteration; the fence
    /// wait at the head of the protocol throttles submission to a single
    /// frame in flight.
    pub fn render(&mut self) -> Result<FrameStatus, FrameError> {
        drive_frame(self)
    }

    /// Waits for the device to go idle, then destroys every owned handle
    /// in reverse creation order. Idempotent; `Drop` calls it if the
    /// caller did not.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        info!("shutting down render engine");

        if let Err(err) = unsafe { self.device.device_wait_idle() } {
            error!("device_wait_idle failed during shutdown: {err}");
        }

        unsafe {
            self.device.destroy_fence(self.sync.in_flight, None);
            self.device
                .destroy_semaphore(self.sync.image_available, None);
            self.device
                .destroy_semaphore(self.sync.render_finished, None);

            self.device.destroy_command_pool(self.command_pool, None);

            self.device.destroy_pipeline(self.pipeline.pipeline, None);
            self.device
                .destroy_pipeline_layout(self.pipeline.pipeline_layout, None);
            self.device
                .destroy_render_pass(self.pipeline.render_pass, None);

            for frame in &self.frames {
                self.device.destroy_framebuffer(frame.framebuffer, None);
                self.device.destroy_image_view(frame.view, None);
            }
        }

        self.swapchain.destroy();

        unsafe { self.device.destroy_device(None) };
        // surface and instance drop with the engine, in that order
    }

    fn record_draw_commands(&self, frame: &SwapchainFrame) -> Result<(), vk::Result> {
        let command_buffer_begin_info = CommandBufferBeginInfo::default();
        unsafe {
            self.device
                .begin_command_buffer(frame.command_buffer, &command_buffer_begin_info)?
        };

        let render_area = Rect2D::default().extent(self.swapchain.extent);
        let clear_values = [ClearValue {
            color: ClearColorValue {
                float32: CLEAR_COLOR,
            },
        }];

        let render_pass_begin_info = RenderPassBeginInfo::default()
            .render_pass(self.pipeline.render_pass)
            .framebuffer(frame.framebuffer)
            .render_area(render_area)
            .clear_values(&clear_values);
        unsafe {
            self.device.cmd_begin_render_pass(
                frame.command_buffer,
                &render_pass_begin_info,
                SubpassContents::INLINE,
            );
            self.device.cmd_bind_pipeline(
                frame.command_buffer,
                PipelineBindPoint::GRAPHICS,
                self.pipeline.pipeline,
            );
            // the triangle is generated entirely in the vertex shader
            self.device.cmd_draw(frame.command_buffer, 3, 1, 0, 0);
            self.device.cmd_end_render_pass(frame.command_buffer);
            self.device.end_command_buffer(frame.command_buffer)?;
        };

        Ok(())
    }
}

impl FrameDriver for RenderEngine {
    fn wait_for_fence(&mut self) -> Result<(), FrameError> {
        let fences = [self.sync.in_flight];
        match unsafe { self.device.wait_for_fences(&fences, true, FRAME_TIMEOUT_NS) } {
            Ok(()) => Ok(()),
            Err(vk::Result::TIMEOUT) => Err(FrameError::Timeout(FRAME_TIMEOUT_NS)),
            Err(err) => Err(FrameError::Device(err)),
        }
    }

    fn reset_fence(&mut self) -> Result<(), FrameError> {
        let fences = [self.sync.in_flight];
        unsafe { self.device.reset_fences(&fences)? };
        Ok(())
    }

    fn acquire_image(&mut self) -> Result<AcquiredImage, FrameError> {
        self.swapchain
            .acquire_next_image(self.sync.image_available, FRAME_TIMEOUT_NS)
    }

    fn record(&mut self, image_index: u32) -> Result<(), FrameError> {
        let frame = &self.frames[image_index as usize];
        unsafe {
            self.device
                .reset_command_buffer(frame.command_buffer, CommandBufferResetFlags::empty())?
        };
        self.record_draw_commands(frame)?;
        Ok(())
    }

    fn submit(&mut self, image_index: u32) -> Result<(), FrameError> {
        let frame = &self.frames[image_index as usize];
        let wait_semaphores = [self.sync.image_available];
        let signal_semaphores = [self.sync.render_finished];
        let wait_stages = [PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [frame.command_buffer];
        let submit_info = [SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)];
        unsafe {
            self.device
                .queue_submit(self.queues.graphics, &submit_info, self.sync.in_flight)?
        };
        Ok(())
    }

    fn present(&mut self, image_index: u32) -> Result<bool, FrameError> {
        self.swapchain
            .present(self.queues.present, self.sync.render_finished, image_index)
    }
}

impl Drop for RenderEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
