use std::{
    ffi::{c_char, CString},
    ops::Deref,
};

use anyhow::Result;
use ash::{
    vk::{make_api_version, ApplicationInfo, InstanceCreateInfo, API_VERSION_1_3},
    Entry,
};
use tracing::debug;

/// Vulkan API version the engine is written against, negotiated once at
/// instance creation.
const API_VERSION: u32 = API_VERSION_1_3;

/// Owns the connection to the Vulkan core. Destroyed last, after every
/// object created from it.
pub struct Instance {
    instance: ash::Instance,
}

impl Instance {
    /// Creates the instance, enabling exactly the extension names the
    /// windowing layer requires to present to its native surface type.
    /// No layers are enabled here; layers belong to the loader.
    pub fn new(entry: &Entry, required_extensions: &[*const c_char]) -> Result<Self> {
        let app_name = CString::new(env!("CARGO_PKG_NAME"))?;
        let version_major = env!("CARGO_PKG_VERSION_MAJOR").parse::<u32>()?;
        let version_minor = env!("CARGO_PKG_VERSION_MINOR").parse::<u32>()?;
        let version_patch = env!("CARGO_PKG_VERSION_PATCH").parse::<u32>()?;
        let app_version = make_api_version(0, version_major, version_minor, version_patch);

        let app_info = ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(app_version)
            .engine_name(&app_name)
            .engine_version(app_version)
            .api_version(API_VERSION);

        let instance_create_info = InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(required_extensions);

        debug!(
            "creating instance with {} window extensions",
            required_extensions.len()
        );
        let instance = unsafe { entry.create_instance(&instance_create_info, None)? };

        Ok(Self { instance })
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe { self.instance.destroy_instance(None) }
    }
}

impl Deref for Instance {
    type Target = ash::Instance;

    fn deref(&self) -> &Self::Target {
        &self.instance
    }
}
