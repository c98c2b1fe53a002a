use std::ops::Deref;

use anyhow::Result;
use ash::{
    khr::surface,
    vk::{PhysicalDevice, PresentModeKHR, SurfaceCapabilitiesKHR, SurfaceFormatKHR, SurfaceKHR},
    Entry,
};
use tracing::trace;
use winit::{
    raw_window_handle::{HasDisplayHandle, HasWindowHandle},
    window::Window,
};

use crate::Instance;

/// The drawable area of the native window, as Vulkan sees it. The engine
/// never creates or owns the window itself, only this handle onto it.
/// Must be destroyed before the instance that created it.
pub struct Surface {
    surface_fn: surface::Instance,
    surface_ptr: SurfaceKHR,
}

impl Surface {
    pub fn new(entry: &Entry, instance: &Instance, window: &Window) -> Result<Self> {
        let surface_fn = surface::Instance::new(entry, instance);
        let surface_ptr = unsafe {
            ash_window::create_surface(
                entry,
                instance,
                window.display_handle()?.as_raw(),
                window.window_handle()?.as_raw(),
                None,
            )?
        };
        trace!("surface created");
        Ok(Self {
            surface_fn,
            surface_ptr,
        })
    }

    pub(crate) fn get_physical_device_surface_capabilities(
        &self,
        physical_device: &PhysicalDevice,
    ) -> Result<SurfaceCapabilitiesKHR> {
        let capabilities = unsafe {
            self.surface_fn
                .get_physical_device_surface_capabilities(*physical_device, self.surface_ptr)
        }?;
        Ok(capabilities)
    }

    pub(crate) fn get_physical_device_surface_formats(
        &self,
        physical_device: &PhysicalDevice,
    ) -> Result<Vec<SurfaceFormatKHR>> {
        let formats = unsafe {
            self.surface_fn
                .get_physical_device_surface_formats(*physical_device, self.surface_ptr)
        }?;
        Ok(formats)
    }

    pub(crate) fn get_physical_device_surface_present_modes(
        &self,
        physical_device: &PhysicalDevice,
    ) -> Result<Vec<PresentModeKHR>> {
        let modes = unsafe {
            self.surface_fn
                .get_physical_device_surface_present_modes(*physical_device, self.surface_ptr)
        }?;
        Ok(modes)
    }

    pub(crate) fn get_physical_device_surface_support(
        &self,
        physical_device: &PhysicalDevice,
        queue_family_index: u32,
    ) -> Result<bool> {
        let supported = unsafe {
            self.surface_fn.get_physical_device_surface_support(
                *physical_device,
                queue_family_index,
                self.surface_ptr,
            )
        }?;
        Ok(supported)
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe { self.surface_fn.destroy_surface(self.surface_ptr, None) }
    }
}

impl Deref for Surface {
    type Target = SurfaceKHR;

    fn deref(&self) -> &Self::Target {
        &self.surface_ptr
    }
}
