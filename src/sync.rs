use anyhow::Result;
use ash::vk::{Fence, FenceCreateFlags, FenceCreateInfo, Semaphore, SemaphoreCreateInfo};

use crate::error::{FrameError, FrameStatus};

/// Budget for the two bounded CPU-side waits (fence wait, image acquire).
/// Exceeding it surfaces [`FrameError::Timeout`] instead of blocking
/// forever.
pub const FRAME_TIMEOUT_NS: u64 = 1_000_000_000;

/// The engine's one and only synchronization set. A single set, rather than
/// one per swapchain image, caps the engine at a single frame in flight:
/// every `render()` call reuses these three handles, so the CPU cannot
/// start frame N+1 until frame N's fence has signaled.
pub struct FrameSync {
    /// signaled by the swapchain when the acquired image is ready to draw to
    pub image_available: Semaphore,
    /// signaled by the graphics queue when the render pass work is done;
    /// presentation waits on it
    pub render_finished: Semaphore,
    /// signaled by the graphics queue when the whole submission has
    /// retired; created pre-signaled so the very first wait returns
    /// immediately
    pub in_flight: Fence,
}

impl FrameSync {
    pub fn new(device: &ash::Device) -> Result<Self> {
        let semaphore_create_info = SemaphoreCreateInfo::default();
        let fence_create_info = FenceCreateInfo::default().flags(FenceCreateFlags::SIGNALED);

        let image_available = unsafe { device.create_semaphore(&semaphore_create_info, None)? };
        let render_finished = unsafe { device.create_semaphore(&semaphore_create_info, None)? };
        let in_flight = unsafe { device.create_fence(&fence_create_info, None)? };

        Ok(Self {
            image_available,
            render_finished,
            in_flight,
        })
    }
}

/// Index of the swapchain image handed over for this frame.
#[derive(Debug, Clone, Copy)]
pub struct AcquiredImage {
    pub index: u32,
    /// the image is usable, but the swapchain no longer matches the surface
    pub suboptimal: bool,
}

/// The driver-facing steps of one `render()` call. Keeping the protocol
/// separate from the Vulkan calls makes the ordering testable without a
/// GPU.
pub(crate) trait FrameDriver {
    fn wait_for_fence(&mut self) -> Result<(), FrameError>;
    fn reset_fence(&mut self) -> Result<(), FrameError>;
    fn acquire_image(&mut self) -> Result<AcquiredImage, FrameError>;
    fn record(&mut self, image_index: u32) -> Result<(), FrameError>;
    fn submit(&mut self, image_index: u32) -> Result<(), FrameError>;
    /// Returns whether the swapchain reported itself suboptimal.
    fn present(&mut self, image_index: u32) -> Result<bool, FrameError>;
}

/// Runs one frame through the fixed sequence: wait on the in-flight fence,
/// reset it, acquire an image, record the draw, submit, present. The steps
/// of call N+1 cannot start before call N's fence wait has observed the
/// previous submission retiring. Any error abandons the frame and must be
/// treated as fatal by the caller, since an abandoned frame leaves the
/// fence unsignaled.
pub(crate) fn drive_frame<D: FrameDriver>(driver: &mut D) -> Result<FrameStatus, FrameError> {
    driver.wait_for_fence()?;
    driver.reset_fence()?;
    let acquired = driver.acquire_image()?;
    driver.record(acquired.index)?;
    driver.submit(acquired.index)?;
    let present_suboptimal = driver.present(acquired.index)?;

    if acquired.suboptimal || present_suboptimal {
        Ok(FrameStatus::Suboptimal)
    } else {
        Ok(FrameStatus::Presented)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Step {
        Wait,
        Reset,
        Acquire,
        Record,
        Submit,
        Present,
    }

    #[derive(Default)]
    struct MockDriver {
        calls: Vec<Step>,
        time_out_on_wait: bool,
        out_of_date_on_acquire: bool,
        suboptimal_on_acquire: bool,
        suboptimal_on_present: bool,
        acquired_index: u32,
        recorded_indices: Vec<u32>,
        presented_indices: Vec<u32>,
    }

    impl FrameDriver for MockDriver {
        fn wait_for_fence(&mut self) -> Result<(), FrameError> {
            self.calls.push(Step::Wait);
            if self.time_out_on_wait {
                return Err(FrameError::Timeout(FRAME_TIMEOUT_NS));
            }
            Ok(())
        }

        fn reset_fence(&mut self) -> Result<(), FrameError> {
            self.calls.push(Step::Reset);
            Ok(())
        }

        fn acquire_image(&mut self) -> Result<AcquiredImage, FrameError> {
            self.calls.push(Step::Acquire);
            if self.out_of_date_on_acquire {
                return Err(FrameError::SwapchainOutOfDate);
            }
            Ok(AcquiredImage {
                index: self.acquired_index,
                suboptimal: self.suboptimal_on_acquire,
            })
        }

        fn record(&mut self, image_index: u32) -> Result<(), FrameError> {
            self.calls.push(Step::Record);
            self.recorded_indices.push(image_index);
            Ok(())
        }

        fn submit(&mut self, _image_index: u32) -> Result<(), FrameError> {
            self.calls.push(Step::Submit);
            Ok(())
        }

        fn present(&mut self, image_index: u32) -> Result<bool, FrameError> {
            self.calls.push(Step::Present);
            self.presented_indices.push(image_index);
            Ok(self.suboptimal_on_present)
        }
    }

    #[test]
    fn frames_execute_in_strict_sequence() {
        let mut driver = MockDriver {
            acquired_index: 2,
            ..Default::default()
        };
        for _ in 0..3 {
            assert_eq!(drive_frame(&mut driver).unwrap(), FrameStatus::Presented);
        }

        let one_frame = [
            Step::Wait,
            Step::Reset,
            Step::Acquire,
            Step::Record,
            Step::Submit,
            Step::Present,
        ];
        let expected = one_frame.iter().copied().cycle().take(18).collect::<Vec<_>>();
        assert_eq!(driver.calls, expected);
        assert_eq!(driver.recorded_indices, vec![2, 2, 2]);
        assert_eq!(driver.presented_indices, vec![2, 2, 2]);
    }

    #[test]
    fn timeout_abandons_the_frame_before_acquire() {
        let mut driver = MockDriver {
            time_out_on_wait: true,
            ..Default::default()
        };
        let result = drive_frame(&mut driver);
        assert!(matches!(result, Err(FrameError::Timeout(_))));
        assert_eq!(driver.calls, vec![Step::Wait]);
    }

    #[test]
    fn out_of_date_abandons_the_frame_before_record() {
        let mut driver = MockDriver {
            out_of_date_on_acquire: true,
            ..Default::default()
        };
        let result = drive_frame(&mut driver);
        assert!(matches!(result, Err(FrameError::SwapchainOutOfDate)));
        assert_eq!(driver.calls, vec![Step::Wait, Step::Reset, Step::Acquire]);
        assert!(driver.recorded_indices.is_empty());
    }

    #[test]
    fn suboptimal_acquire_still_presents() {
        let mut driver = MockDriver {
            suboptimal_on_acquire: true,
            ..Default::default()
        };
        assert_eq!(drive_frame(&mut driver).unwrap(), FrameStatus::Suboptimal);
        assert_eq!(driver.calls.last(), Some(&Step::Present));
    }

    #[test]
    fn suboptimal_present_is_reported() {
        let mut driver = MockDriver {
            suboptimal_on_present: true,
            ..Default::default()
        };
        assert_eq!(drive_frame(&mut driver).unwrap(), FrameStatus::Suboptimal);
    }
}
