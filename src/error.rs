use ash::vk;
use thiserror::Error;

/// Startup conditions that leave the engine with nothing to render to.
/// All of these are fatal; there is no degraded mode for a renderer
/// without a drawable surface.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("no physical device supports the required device extensions")]
    NoSuitableDevice,
    #[error("surface reports no supported formats")]
    NoSurfaceFormats,
}

/// A `render()` call that did not run to a clean present.
#[derive(Debug, Error)]
pub enum FrameError {
    /// A bounded CPU-side wait (fence or image acquire) exhausted its budget.
    #[error("gpu did not signal within {0} ns")]
    Timeout(u64),
    /// The swapchain no longer matches the surface and must be recreated
    /// before any further rendering.
    #[error("swapchain is out of date")]
    SwapchainOutOfDate,
    /// Any other driver-reported failure.
    #[error("vulkan call failed: {0}")]
    Device(#[from] vk::Result),
}

/// Outcome of a frame that made it all the way to present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Presented,
    /// Presented, but the swapchain no longer matches the surface exactly.
    /// Rendering can continue; a resize-aware engine would recreate here.
    Suboptimal,
}
