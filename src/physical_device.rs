use std::{collections::HashSet, ffi::CStr};

use anyhow::Result;
use ash::vk::PhysicalDevice;
use tracing::{debug, info};

use crate::{error::StartupError, queue_families::find_queue_families, Instance, Surface};

/// Picks the first enumerated device that supports every required extension
/// and resolves both queue families. First match wins, no scoring.
pub fn select_physical_device(
    instance: &Instance,
    surface: &Surface,
    required_extensions: &[&CStr],
) -> Result<PhysicalDevice> {
    let candidates = unsafe { instance.enumerate_physical_devices()? };
    for candidate in candidates {
        if is_device_suitable(instance, &candidate, surface, required_extensions)? {
            let properties = unsafe { instance.get_physical_device_properties(candidate) };
            if let Ok(name) = properties.device_name_as_c_str() {
                info!("using physical device {:?}", name);
            }
            return Ok(candidate);
        }
    }
    Err(StartupError::NoSuitableDevice.into())
}

fn is_device_suitable(
    instance: &Instance,
    physical_device: &PhysicalDevice,
    surface: &Surface,
    required_extensions: &[&CStr],
) -> Result<bool> {
    if !supports_required_extensions(instance, physical_device, required_extensions)? {
        return Ok(false);
    }
    // a device without both families cannot drive the surface
    let indices = find_queue_families(instance, physical_device, surface)?;
    Ok(indices.is_complete())
}

fn supports_required_extensions(
    instance: &Instance,
    physical_device: &PhysicalDevice,
    required_extensions: &[&CStr],
) -> Result<bool> {
    let extension_properties =
        unsafe { instance.enumerate_device_extension_properties(*physical_device)? };

    let mut supported_names = HashSet::new();
    for extension in &extension_properties {
        supported_names.insert(extension.extension_name_as_c_str()?.to_owned());
    }

    for required_extension in required_extensions {
        if !supported_names.contains(*required_extension) {
            debug!("device rejected, missing extension {:?}", required_extension);
            return Ok(false);
        }
    }
    Ok(true)
}
