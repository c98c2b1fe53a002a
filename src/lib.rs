pub mod commands;
pub mod device;
pub mod engine;
pub mod error;
pub mod framebuffer;
pub mod instance;
pub mod logging;
pub mod physical_device;
pub mod pipeline;
pub mod queue_families;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use engine::RenderEngine;
pub use error::{FrameError, FrameStatus};
pub use instance::Instance;
pub use surface::Surface;
