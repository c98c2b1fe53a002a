use anyhow::Result;
use ash::{
    khr::swapchain,
    vk::{
        self, ColorSpaceKHR, ComponentMapping, ComponentSwizzle, CompositeAlphaFlagsKHR, Extent2D,
        Fence, Format, Image, ImageAspectFlags, ImageSubresourceRange, ImageUsageFlags, ImageView,
        ImageViewCreateInfo, ImageViewType, PhysicalDevice, PresentInfoKHR, PresentModeKHR, Queue,
        Semaphore, SharingMode, SurfaceCapabilitiesKHR, SurfaceFormatKHR, SwapchainCreateInfoKHR,
        SwapchainKHR,
    },
};
use tracing::debug;

use crate::{
    error::{FrameError, StartupError},
    queue_families::QueueFamilies,
    sync::AcquiredImage,
    Instance, Surface,
};

/// What the surface supports, queried fresh for every swapchain build and
/// never persisted.
pub struct SwapchainSupportDetails {
    pub capabilities: SurfaceCapabilitiesKHR,
    /// color format / color space combinations available on the surface
    pub formats: Vec<SurfaceFormatKHR>,
    pub present_modes: Vec<PresentModeKHR>,
}

impl SwapchainSupportDetails {
    pub fn query(physical_device: &PhysicalDevice, surface: &Surface) -> Result<Self> {
        let capabilities = surface.get_physical_device_surface_capabilities(physical_device)?;
        let formats = surface.get_physical_device_surface_formats(physical_device)?;
        let present_modes = surface.get_physical_device_surface_present_modes(physical_device)?;

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// Prefers 8-bit BGRA unorm with non-linear sRGB; falls back to the
    /// first supported entry, which is only acceptable for a renderer of
    /// this size.
    pub fn choose_surface_format(&self) -> Result<SurfaceFormatKHR> {
        if let Some(format) = self.formats.iter().find(|format| {
            format.format == Format::B8G8R8A8_UNORM
                && format.color_space == ColorSpaceKHR::SRGB_NONLINEAR
        }) {
            return Ok(*format);
        }
        Ok(self
            .formats
            .first()
            .copied()
            .ok_or(StartupError::NoSurfaceFormats)?)
    }

    /// Prefers mailbox, where rendering faster than the screen presents
    /// replaces the queued image with the most recent one. Falls back to
    /// FIFO, the only mode guaranteed to exist.
    pub fn choose_present_mode(&self) -> PresentModeKHR {
        if self.present_modes.contains(&PresentModeKHR::MAILBOX) {
            return PresentModeKHR::MAILBOX;
        }
        PresentModeKHR::FIFO
    }

    /// Clamps the requested dimensions componentwise into the surface's
    /// supported range.
    pub fn choose_extent(&self, width: u32, height: u32) -> Extent2D {
        Extent2D {
            width: width.clamp(
                self.capabilities.min_image_extent.width,
                self.capabilities.max_image_extent.width,
            ),
            height: height.clamp(
                self.capabilities.min_image_extent.height,
                self.capabilities.max_image_extent.height,
            ),
        }
    }

    /// One more image than the minimum, capped by the surface's maximum.
    /// A maximum of zero means the surface imposes no upper bound.
    pub fn image_count(&self) -> u32 {
        let min_image_count = self.capabilities.min_image_count;
        match self.capabilities.max_image_count {
            0 => min_image_count + 1,
            max_image_count => u32::min(max_image_count, min_image_count + 1),
        }
    }
}

/// Sharing mode for the swapchain images: exclusive when one family owns
/// both roles, otherwise concurrent across exactly the two families.
pub fn image_sharing_config(families: &QueueFamilies) -> (SharingMode, Vec<u32>) {
    if families.graphics == families.present {
        (SharingMode::EXCLUSIVE, Vec::new())
    } else {
        (
            SharingMode::CONCURRENT,
            vec![families.graphics, families.present],
        )
    }
}

/// One presentable image and the view the framebuffer binds to. The image
/// is owned by the swapchain and never destroyed individually; the view is
/// owned by the engine.
pub struct SwapchainImage {
    pub image: Image,
    pub view: ImageView,
}

/// The negotiated swapchain. Format and extent are fixed for its lifetime;
/// recreation is out of scope, which is why acquire/present surface the
/// out-of-date signal instead of handling it.
pub struct Swapchain {
    swapchain_fn: swapchain::Device,
    swapchain_ptr: SwapchainKHR,
    pub format: Format,
    pub extent: Extent2D,
}

impl Swapchain {
    /// Negotiates format, present mode, extent and image count against
    /// fresh support details, creates the swapchain and one 2D color view
    /// per image. Failure here is fatal to startup.
    pub fn new(
        instance: &Instance,
        device: &ash::Device,
        physical_device: &PhysicalDevice,
        surface: &Surface,
        families: &QueueFamilies,
        width: u32,
        height: u32,
    ) -> Result<(Self, Vec<SwapchainImage>)> {
        let support = SwapchainSupportDetails::query(physical_device, surface)?;
        let surface_format = support.choose_surface_format()?;
        let present_mode = support.choose_present_mode();
        let extent = support.choose_extent(width, height);
        let image_count = support.image_count();
        let (sharing_mode, queue_family_indices) = image_sharing_config(families);

        debug!(
            ?present_mode,
            image_count,
            width = extent.width,
            height = extent.height,
            "swapchain negotiated"
        );

        let mut swapchain_create_info = SwapchainCreateInfoKHR::default()
            .surface(**surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .present_mode(present_mode)
            // always 1 unless doing stereoscopic 3D
            .image_array_layers(1)
            // the images are drawn to as color attachments
            .image_usage(ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(support.capabilities.current_transform)
            // ignore the alpha channel when compositing
            .composite_alpha(CompositeAlphaFlagsKHR::OPAQUE)
            // discard pixels hidden by other windows
            .clipped(true)
            .image_sharing_mode(sharing_mode)
            .old_swapchain(SwapchainKHR::null());
        if sharing_mode == SharingMode::CONCURRENT {
            swapchain_create_info =
                swapchain_create_info.queue_family_indices(&queue_family_indices);
        }

        let swapchain_fn = swapchain::Device::new(instance, device);
        let swapchain_ptr =
            unsafe { swapchain_fn.create_swapchain(&swapchain_create_info, None)? };

        let images = unsafe { swapchain_fn.get_swapchain_images(swapchain_ptr)? };
        let images = images
            .into_iter()
            .map(|image| {
                let view = create_image_view(device, image, surface_format.format)?;
                Ok(SwapchainImage { image, view })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok((
            Self {
                swapchain_fn,
                swapchain_ptr,
                format: surface_format.format,
                extent,
            },
            images,
        ))
    }

    /// Requests the next presentable image, signaling `signal_semaphore`
    /// once the swapchain has handed it over.
    pub fn acquire_next_image(
        &self,
        signal_semaphore: Semaphore,
        timeout_ns: u64,
    ) -> Result<AcquiredImage, FrameError> {
        match unsafe {
            self.swapchain_fn.acquire_next_image(
                self.swapchain_ptr,
                timeout_ns,
                signal_semaphore,
                Fence::null(),
            )
        } {
            Ok((index, suboptimal)) => Ok(AcquiredImage { index, suboptimal }),
            Err(vk::Result::TIMEOUT) => Err(FrameError::Timeout(timeout_ns)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Err(FrameError::SwapchainOutOfDate),
            Err(err) => Err(FrameError::Device(err)),
        }
    }

    /// Presents the acquired image once `wait_semaphore` signals. Returns
    /// whether the swapchain reported itself suboptimal.
    pub fn present(
        &self,
        queue: Queue,
        wait_semaphore: Semaphore,
        image_index: u32,
    ) -> Result<bool, FrameError> {
        let wait_semaphores = [wait_semaphore];
        let swapchains = [self.swapchain_ptr];
        let image_indices = [image_index];
        let present_info = PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.swapchain_fn.queue_present(queue, &present_info) } {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Err(FrameError::SwapchainOutOfDate),
            Err(err) => Err(FrameError::Device(err)),
        }
    }

    /// Must run after the per-image views and framebuffers are gone and
    /// before the logical device is destroyed.
    pub fn destroy(&mut self) {
        unsafe {
            self.swapchain_fn
                .destroy_swapchain(self.swapchain_ptr, None)
        }
    }
}

fn create_image_view(device: &ash::Device, image: Image, format: Format) -> Result<ImageView> {
    let image_view_create_info = ImageViewCreateInfo::default()
        .image(image)
        .view_type(ImageViewType::TYPE_2D)
        .format(format)
        // no swizzling
        .components(
            ComponentMapping::default()
                .r(ComponentSwizzle::IDENTITY)
                .g(ComponentSwizzle::IDENTITY)
                .b(ComponentSwizzle::IDENTITY)
                .a(ComponentSwizzle::IDENTITY),
        )
        // color target, single mip level, single layer
        .subresource_range(
            ImageSubresourceRange::default()
                .aspect_mask(ImageAspectFlags::COLOR)
                .base_mip_level(0)
                .level_count(1)
                .base_array_layer(0)
                .layer_count(1),
        );
    let image_view = unsafe { device.create_image_view(&image_view_create_info, None)? };
    Ok(image_view)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details_with_formats(formats: Vec<SurfaceFormatKHR>) -> SwapchainSupportDetails {
        SwapchainSupportDetails {
            capabilities: SurfaceCapabilitiesKHR::default(),
            formats,
            present_modes: Vec::new(),
        }
    }

    fn details_with_present_modes(present_modes: Vec<PresentModeKHR>) -> SwapchainSupportDetails {
        SwapchainSupportDetails {
            capabilities: SurfaceCapabilitiesKHR::default(),
            formats: Vec::new(),
            present_modes,
        }
    }

    fn details_with_capabilities(capabilities: SurfaceCapabilitiesKHR) -> SwapchainSupportDetails {
        SwapchainSupportDetails {
            capabilities,
            formats: Vec::new(),
            present_modes: Vec::new(),
        }
    }

    fn surface_format(format: Format, color_space: ColorSpaceKHR) -> SurfaceFormatKHR {
        SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    #[test]
    fn prefers_bgra_unorm_with_nonlinear_srgb() {
        let details = details_with_formats(vec![
            surface_format(Format::R8G8B8A8_UNORM, ColorSpaceKHR::SRGB_NONLINEAR),
            surface_format(Format::B8G8R8A8_UNORM, ColorSpaceKHR::SRGB_NONLINEAR),
        ]);
        let chosen = details.choose_surface_format().unwrap();
        assert_eq!(chosen.format, Format::B8G8R8A8_UNORM);
        assert_eq!(chosen.color_space, ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn falls_back_to_first_supported_format() {
        let details = details_with_formats(vec![
            surface_format(Format::R8G8B8A8_SRGB, ColorSpaceKHR::SRGB_NONLINEAR),
            surface_format(Format::B8G8R8A8_SRGB, ColorSpaceKHR::SRGB_NONLINEAR),
        ]);
        let chosen = details.choose_surface_format().unwrap();
        assert_eq!(chosen.format, Format::R8G8B8A8_SRGB);
    }

    #[test]
    fn empty_format_list_is_an_error() {
        let details = details_with_formats(Vec::new());
        assert!(details.choose_surface_format().is_err());
    }

    #[test]
    fn mailbox_wins_when_supported() {
        let details = details_with_present_modes(vec![
            PresentModeKHR::FIFO,
            PresentModeKHR::MAILBOX,
            PresentModeKHR::IMMEDIATE,
        ]);
        assert_eq!(details.choose_present_mode(), PresentModeKHR::MAILBOX);
    }

    #[test]
    fn fifo_is_the_fallback_present_mode() {
        let details = details_with_present_modes(vec![PresentModeKHR::IMMEDIATE]);
        assert_eq!(details.choose_present_mode(), PresentModeKHR::FIFO);

        let details = details_with_present_modes(Vec::new());
        assert_eq!(details.choose_present_mode(), PresentModeKHR::FIFO);
    }

    fn extent_capabilities() -> SurfaceCapabilitiesKHR {
        SurfaceCapabilitiesKHR {
            min_image_extent: Extent2D {
                width: 200,
                height: 200,
            },
            max_image_extent: Extent2D {
                width: 1024,
                height: 768,
            },
            ..Default::default()
        }
    }

    #[test]
    fn extent_within_bounds_is_unchanged() {
        let details = details_with_capabilities(extent_capabilities());
        let extent = details.choose_extent(640, 480);
        assert_eq!(extent.width, 640);
        assert_eq!(extent.height, 480);
    }

    #[test]
    fn extent_is_clamped_to_the_minimum() {
        let details = details_with_capabilities(extent_capabilities());
        let extent = details.choose_extent(50, 50);
        assert_eq!(extent.width, 200);
        assert_eq!(extent.height, 200);
    }

    #[test]
    fn extent_is_clamped_to_the_maximum() {
        let details = details_with_capabilities(extent_capabilities());
        let extent = details.choose_extent(2000, 2000);
        assert_eq!(extent.width, 1024);
        assert_eq!(extent.height, 768);
    }

    fn count_capabilities(min_image_count: u32, max_image_count: u32) -> SurfaceCapabilitiesKHR {
        SurfaceCapabilitiesKHR {
            min_image_count,
            max_image_count,
            ..Default::default()
        }
    }

    #[test]
    fn image_count_is_one_over_the_minimum() {
        let details = details_with_capabilities(count_capabilities(2, 8));
        assert_eq!(details.image_count(), 3);
    }

    #[test]
    fn image_count_is_capped_by_the_maximum() {
        let details = details_with_capabilities(count_capabilities(2, 2));
        assert_eq!(details.image_count(), 2);

        let details = details_with_capabilities(count_capabilities(3, 4));
        assert_eq!(details.image_count(), 4);
    }

    #[test]
    fn zero_maximum_means_unbounded() {
        let details = details_with_capabilities(count_capabilities(2, 0));
        assert_eq!(details.image_count(), 3);
    }

    #[test]
    fn coinciding_families_share_exclusively() {
        let families = QueueFamilies {
            graphics: 0,
            present: 0,
        };
        let (sharing_mode, indices) = image_sharing_config(&families);
        assert_eq!(sharing_mode, SharingMode::EXCLUSIVE);
        assert!(indices.is_empty());
    }

    #[test]
    fn distinct_families_share_concurrently() {
        let families = QueueFamilies {
            graphics: 0,
            present: 2,
        };
        let (sharing_mode, indices) = image_sharing_config(&families);
        assert_eq!(sharing_mode, SharingMode::CONCURRENT);
        assert_eq!(indices, vec![0, 2]);
    }
}
