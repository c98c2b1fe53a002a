use std::{collections::HashSet, ffi::CStr};

use anyhow::{Context, Result};
use ash::vk::{
    DeviceCreateInfo, DeviceQueueCreateInfo, PhysicalDevice, PhysicalDeviceFeatures, Queue,
    KHR_SWAPCHAIN_NAME,
};
use tracing::debug;

use crate::{
    queue_families::{find_queue_families, QueueFamilies},
    Instance, Surface,
};

/// Device extensions the engine cannot run without.
pub const REQUIRED_DEVICE_EXTENSIONS: &[&CStr] = &[KHR_SWAPCHAIN_NAME];

/// Queues retrieved from the logical device. The two handles are identical
/// when the graphics and present families coincide.
pub struct QueueHandles {
    pub graphics: Queue,
    pub present: Queue,
}

/// Creates the logical device with one queue (priority 1.0) per unique
/// family, the swapchain extension enabled and zero device layers
/// (validation layers, if any, belong to the instance).
///
/// This is the final queue family resolution for the lifetime of the
/// device; the returned [`QueueFamilies`] is passed around from here on.
pub fn create_logical_device(
    instance: &Instance,
    physical_device: &PhysicalDevice,
    surface: &Surface,
) -> Result<(ash::Device, QueueHandles, QueueFamilies)> {
    let families = find_queue_families(instance, physical_device, surface)?
        .complete()
        .context("selected device no longer resolves both queue families")?;

    let unique_family_indices = HashSet::from([families.graphics, families.present]);

    let queue_priorities = [1.0f32];
    let queue_create_infos = unique_family_indices
        .into_iter()
        .map(|queue_family_index| {
            DeviceQueueCreateInfo::default()
                .queue_family_index(queue_family_index)
                .queue_priorities(&queue_priorities)
        })
        .collect::<Vec<_>>();

    let physical_device_features = PhysicalDeviceFeatures::default();

    let extension_names = REQUIRED_DEVICE_EXTENSIONS
        .iter()
        .map(|extension_name| extension_name.as_ptr())
        .collect::<Vec<_>>();

    let device_create_info = DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_features(&physical_device_features)
        .enabled_extension_names(&extension_names);

    let device = unsafe { instance.create_device(*physical_device, &device_create_info, None)? };

    let queues = QueueHandles {
        graphics: unsafe { device.get_device_queue(families.graphics, 0) },
        present: unsafe { device.get_device_queue(families.present, 0) },
    };

    debug!(
        graphics_family = families.graphics,
        present_family = families.present,
        "logical device created"
    );

    Ok((device, queues, families))
}
