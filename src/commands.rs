use anyhow::Result;
use ash::vk::{
    self, CommandBuffer, CommandBufferAllocateInfo, CommandBufferLevel, CommandPoolCreateFlags,
    CommandPoolCreateInfo,
};

use crate::queue_families::QueueFamilies;

/// One pool on the graphics family. Buffers may be reset individually
/// without resetting the whole pool.
pub fn create_command_pool(
    device: &ash::Device,
    families: &QueueFamilies,
) -> Result<vk::CommandPool> {
    let create_info = CommandPoolCreateInfo::default()
        .flags(CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
        .queue_family_index(families.graphics);
    let command_pool = unsafe { device.create_command_pool(&create_info, None)? };
    Ok(command_pool)
}

/// Allocates one primary command buffer per swapchain image. An allocation
/// failure aborts startup; a frame without a command buffer can never be
/// recorded.
pub fn allocate_command_buffers(
    device: &ash::Device,
    command_pool: vk::CommandPool,
    count: u32,
) -> Result<Vec<CommandBuffer>> {
    let allocate_info = CommandBufferAllocateInfo::default()
        .command_pool(command_pool)
        .level(CommandBufferLevel::PRIMARY)
        .command_buffer_count(count);
    let command_buffers = unsafe { device.allocate_command_buffers(&allocate_info)? };
    Ok(command_buffers)
}
