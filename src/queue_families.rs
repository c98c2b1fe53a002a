use anyhow::Result;
use ash::vk::{PhysicalDevice, QueueFamilyProperties, QueueFlags};

use crate::{Instance, Surface};

/// Queue family lookup for one device/surface pair. Transient: recomputed
/// while probing devices, converted to [`QueueFamilies`] once a device is
/// chosen.
#[derive(Debug, Clone, Copy)]
pub struct QueueFamilyIndices {
    /// family capable of running graphics commands
    pub graphics_family: Option<u32>,
    /// family capable of presenting to the surface
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// The non-optional form, or `None` when the device lacks either family.
    pub fn complete(self) -> Option<QueueFamilies> {
        Some(QueueFamilies {
            graphics: self.graphics_family?,
            present: self.present_family?,
        })
    }
}

/// Fully resolved family indices. Resolved once per logical device and
/// passed by reference afterwards, never re-queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

/// Queries the device's queue family properties and resolves indices
/// against the real surface.
pub fn find_queue_families(
    instance: &Instance,
    device: &PhysicalDevice,
    surface: &Surface,
) -> Result<QueueFamilyIndices> {
    let properties = unsafe { instance.get_physical_device_queue_family_properties(*device) };
    resolve_from_properties(&properties, |index| {
        surface.get_physical_device_surface_support(device, index)
    })
}

/// Walks the family list in index order. The first graphics-capable index
/// and the first present-capable index win and are never overwritten;
/// iteration stops as soon as both are known. The two lookups are
/// independent, so the indices may coincide or differ.
pub fn resolve_from_properties(
    properties: &[QueueFamilyProperties],
    mut supports_present: impl FnMut(u32) -> Result<bool>,
) -> Result<QueueFamilyIndices> {
    let mut indices = QueueFamilyIndices {
        graphics_family: None,
        present_family: None,
    };

    for (index, family) in properties.iter().enumerate() {
        let index = index as u32;
        if indices.graphics_family.is_none() && family.queue_flags.contains(QueueFlags::GRAPHICS) {
            indices.graphics_family = Some(index);
        }
        if indices.present_family.is_none() && supports_present(index)? {
            indices.present_family = Some(index);
        }
        if indices.is_complete() {
            break;
        }
    }

    Ok(indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: QueueFlags) -> QueueFamilyProperties {
        QueueFamilyProperties {
            queue_flags: flags,
            ..Default::default()
        }
    }

    #[test]
    fn graphics_family_is_lowest_matching_index() {
        let families = [
            family(QueueFlags::COMPUTE),
            family(QueueFlags::GRAPHICS),
            family(QueueFlags::GRAPHICS | QueueFlags::COMPUTE),
        ];
        let indices = resolve_from_properties(&families, |_| Ok(false)).unwrap();
        assert_eq!(indices.graphics_family, Some(1));
        assert_eq!(indices.present_family, None);
        assert!(!indices.is_complete());
    }

    #[test]
    fn present_family_is_resolved_independently() {
        let families = [family(QueueFlags::GRAPHICS), family(QueueFlags::COMPUTE)];
        let indices = resolve_from_properties(&families, |index| Ok(index == 1)).unwrap();
        assert_eq!(indices.graphics_family, Some(0));
        assert_eq!(indices.present_family, Some(1));
        assert!(indices.is_complete());
    }

    #[test]
    fn resolution_stops_once_both_families_are_known() {
        let families = [
            family(QueueFlags::GRAPHICS),
            family(QueueFlags::GRAPHICS),
            family(QueueFlags::GRAPHICS),
        ];
        let mut probed = Vec::new();
        let indices = resolve_from_properties(&families, |index| {
            probed.push(index);
            Ok(true)
        })
        .unwrap();
        assert_eq!(indices.graphics_family, Some(0));
        assert_eq!(indices.present_family, Some(0));
        // both lived on index 0, so no further indices were examined
        assert_eq!(probed, vec![0]);
    }

    #[test]
    fn exhausted_family_list_yields_incomplete_indices() {
        let families = [family(QueueFlags::TRANSFER), family(QueueFlags::COMPUTE)];
        let indices = resolve_from_properties(&families, |_| Ok(false)).unwrap();
        assert!(!indices.is_complete());
        assert!(indices.complete().is_none());
    }

    #[test]
    fn complete_conversion_drops_the_options() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(2),
        };
        let families = indices.complete().unwrap();
        assert_eq!(
            families,
            QueueFamilies {
                graphics: 0,
                present: 2
            }
        );
    }
}
